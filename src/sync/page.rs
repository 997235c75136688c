//! The browser surface the engine drives.
//!
//! Everything above this module talks to a [`Page`]: a single open tab with
//! a signed-in session. Waits built on top of it are bounded and poll the
//! page at the configured interval.

use std::time::Duration;

use regex::Regex;

use crate::core::entry::EntryError;

/// An element found on the page. Only valid until the page navigates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementRef(pub String);

impl ElementRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementState {
    Attached,
    Detached,
    Visible,
}

#[derive(Debug, thiserror::Error)]
pub enum UiError {
    #[error("nothing matches {0}")]
    NotFound(String),

    #[error("timed out after {elapsed:?} waiting for {what}")]
    Timeout { what: String, elapsed: Duration },

    #[error("webdriver {error}: {message}")]
    WebDriver { error: String, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response: {0}")]
    Protocol(String),

    #[error("invalid URL {url}: {reason}")]
    Url { url: String, reason: String },
}

impl UiError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// The element was removed from the page after it was located.
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::WebDriver { error, .. } if error == "stale element reference")
    }
}

impl From<UiError> for EntryError {
    fn from(e: UiError) -> Self {
        EntryError::Ui(e.to_string())
    }
}

/// Operations the engine needs from a browser page.
///
/// Calls are issued one at a time; implementations don't need to be
/// shareable across tasks.
#[allow(async_fn_in_trait)]
pub trait Page {
    async fn goto(&self, url: &str) -> Result<(), UiError>;

    async fn current_url(&self) -> Result<String, UiError>;

    /// All elements matching a CSS selector, in document order. When
    /// `scope` is given only its descendants are searched.
    async fn locate_all(
        &self,
        scope: Option<&ElementRef>,
        selector: &str,
    ) -> Result<Vec<ElementRef>, UiError>;

    async fn text(&self, element: &ElementRef) -> Result<String, UiError>;

    async fn click(&self, element: &ElementRef) -> Result<(), UiError>;

    /// Replace the element's content with `value`.
    async fn fill(&self, element: &ElementRef, value: &str) -> Result<(), UiError>;

    async fn press_enter(&self, element: &ElementRef) -> Result<(), UiError>;

    async fn hover(&self, element: &ElementRef) -> Result<(), UiError>;

    async fn is_visible(&self, element: &ElementRef) -> Result<bool, UiError>;

    /// Wait until the page has finished loading, up to `timeout`.
    async fn wait_for_load_idle(&self, timeout: Duration) -> Result<(), UiError>;

    async fn pause(&self, duration: Duration);
}

/// First element matching `selector`.
pub async fn locate<P: Page>(page: &P, selector: &str) -> Result<ElementRef, UiError> {
    locate_within(page, None, selector).await
}

pub async fn locate_within<P: Page>(
    page: &P,
    scope: Option<&ElementRef>,
    selector: &str,
) -> Result<ElementRef, UiError> {
    page.locate_all(scope, selector)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| UiError::NotFound(selector.to_string()))
}

pub async fn click_selector<P: Page>(page: &P, selector: &str) -> Result<(), UiError> {
    let element = locate(page, selector).await?;
    page.click(&element).await
}

pub async fn fill_selector<P: Page>(page: &P, selector: &str, value: &str) -> Result<(), UiError> {
    let element = locate(page, selector).await?;
    page.fill(&element, value).await
}

pub async fn text_of<P: Page>(page: &P, selector: &str) -> Result<String, UiError> {
    let element = locate(page, selector).await?;
    page.text(&element).await
}

/// Whether any element matching `selector` is currently visible.
pub async fn is_visible<P: Page>(page: &P, selector: &str) -> Result<bool, UiError> {
    for element in page.locate_all(None, selector).await? {
        if page.is_visible(&element).await? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Number of polls that fit in `timeout`, at least one.
fn attempts(timeout: Duration, poll: Duration) -> u32 {
    let poll = poll.max(Duration::from_millis(1));
    (timeout.as_millis() / poll.as_millis()).clamp(1, u128::from(u32::MAX)) as u32
}

/// Wait until the first element matching `selector` reaches `state`.
pub async fn wait_for<P: Page>(
    page: &P,
    selector: &str,
    state: ElementState,
    timeout: Duration,
    poll: Duration,
) -> Result<(), UiError> {
    for attempt in 0..attempts(timeout, poll) {
        if attempt > 0 {
            page.pause(poll).await;
        }
        let found = page.locate_all(None, selector).await?;
        let reached = match state {
            ElementState::Attached => !found.is_empty(),
            ElementState::Detached => found.is_empty(),
            ElementState::Visible => match found.first() {
                Some(element) => match page.is_visible(element).await {
                    Ok(visible) => visible,
                    // Re-rendered between locate and check; locate again next poll
                    Err(e) if e.is_stale() => {
                        log::debug!("{} went stale, retrying", selector);
                        false
                    }
                    Err(e) => return Err(e),
                },
                None => false,
            },
        };
        if reached {
            return Ok(());
        }
    }
    Err(UiError::Timeout {
        what: format!("{} to be {:?}", selector, state),
        elapsed: timeout,
    })
}

/// Wait until the page URL matches `pattern`.
pub async fn wait_for_url<P: Page>(
    page: &P,
    pattern: &Regex,
    timeout: Duration,
    poll: Duration,
) -> Result<String, UiError> {
    for attempt in 0..attempts(timeout, poll) {
        if attempt > 0 {
            page.pause(poll).await;
        }
        let url = page.current_url().await?;
        if pattern.is_match(&url) {
            return Ok(url);
        }
    }
    Err(UiError::Timeout {
        what: format!("URL matching {}", pattern),
        elapsed: timeout,
    })
}
