pub mod auth;
pub mod capture;
pub mod controller;
pub mod matcher;
pub mod navigator;
pub mod page;
pub mod selectors;
pub mod webdriver;

#[cfg(test)]
mod fake;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::core::entry::Category;
use page::UiError;

pub use capture::CaptureOptions;
pub use controller::{Controller, ImportResult};
pub use page::Page;
pub use webdriver::WebDriverPage;

/// Where the signed-in session lives. AutoTask spreads tenants over several
/// hosts (`ww1`, `ww5`, ...), so this is only known once sign-in has landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    base_url: String,
}

impl SessionContext {
    /// Derive the session from any URL on the tenant's host.
    pub fn from_page_url(url: &str) -> Result<Self, UiError> {
        let invalid = |reason: &str| UiError::Url {
            url: url.to_string(),
            reason: reason.to_string(),
        };
        let parsed = reqwest::Url::parse(url).map_err(|e| invalid(&e.to_string()))?;
        let host = parsed.host_str().ok_or_else(|| invalid("no host"))?;

        let mut base_url = format!("{}://{}", parsed.scheme(), host);
        if let Some(port) = parsed.port() {
            base_url.push_str(&format!(":{}", port));
        }
        Ok(Self { base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn detail_url(&self, category: Category, id: u64) -> String {
        let path = match category {
            Category::Ticket => selectors::ticket_detail_path(id),
            Category::Task => selectors::task_detail_path(id),
        };
        format!("{}{}", self.base_url, path)
    }

    pub fn landing_url(&self) -> String {
        format!("{}{}", self.base_url, selectors::LANDING_SUFFIX)
    }
}

/// Cooperative stop flag, checked before each parent item is opened.
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_from_landing_url() {
        let session = SessionContext::from_page_url(
            "https://ww5.autotask.net/Mvc/Framework/Navigation.mvc/Landing?x=1",
        )
        .unwrap();
        assert_eq!(session.base_url(), "https://ww5.autotask.net");
        assert_eq!(
            session.detail_url(Category::Task, 278364),
            "https://ww5.autotask.net/Mvc/Projects/TaskDetail.mvc?taskID=278364"
        );
        assert_eq!(
            session.detail_url(Category::Ticket, 279750),
            "https://ww5.autotask.net/Mvc/ServiceDesk/TicketDetail.mvc?ticketID=279750"
        );
        assert_eq!(
            session.landing_url(),
            "https://ww5.autotask.net/Mvc/Framework/Navigation.mvc/Landing"
        );
    }

    #[test]
    fn session_keeps_port() {
        let session = SessionContext::from_page_url("http://localhost:8080/a/b").unwrap();
        assert_eq!(session.base_url(), "http://localhost:8080");
    }

    #[test]
    fn session_rejects_garbage() {
        assert!(matches!(
            SessionContext::from_page_url("not a url"),
            Err(UiError::Url { .. })
        ));
    }

    #[test]
    fn cancellation_is_shared() {
        let cancel = Cancellation::new();
        let clone = cancel.clone();
        assert!(!clone.is_cancelled());
        cancel.cancel();
        assert!(clone.is_cancelled());
    }
}
