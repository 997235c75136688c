//! Signing in to and out of the service.
//!
//! Sign-in goes through the company identity provider. Credentials are
//! filled in when known; anything else (MFA, a missing password) is left to
//! the person at the browser while we wait for the landing page.

use std::time::Duration;

use regex::Regex;

use crate::config::Timeouts;

use super::SessionContext;
use super::page::{self, ElementState, Page, UiError};
use super::selectors as sel;

/// How long the "set status out" prompt gets to show up after logout.
const STATUS_DIALOG_WAIT: Duration = Duration::from_secs(2);

fn pattern(re: &str) -> Result<Regex, UiError> {
    Regex::new(re).map_err(|e| UiError::Protocol(format!("bad URL pattern {}: {}", re, e)))
}

fn landing_pattern() -> Result<Regex, UiError> {
    pattern(&format!("{}$", regex::escape(sel::LANDING_SUFFIX)))
}

/// Sign in and return the session the browser landed in.
pub async fn login<P: Page>(
    page: &P,
    username: &str,
    password: Option<&str>,
    timeouts: &Timeouts,
) -> Result<SessionContext, UiError> {
    log::info!("Opening {}", sel::SERVICE_URL);
    page.goto(sel::SERVICE_URL).await?;
    page::wait_for_url(
        page,
        &pattern(sel::AUTH_URL_PATTERN)?,
        timeouts.navigation(),
        timeouts.poll(),
    )
    .await?;

    let textbox = page::locate(page, sel::USERNAME_TEXTBOX).await?;
    page.fill(&textbox, username).await?;
    page.press_enter(&textbox).await?;

    let landing = landing_pattern()?;
    if !landing.is_match(&page.current_url().await?) {
        sign_in_with_identity_provider(page, username, password, timeouts).await;
    }

    log::info!("Waiting for sign-in to complete, MFA may be required");
    let url = page::wait_for_url(page, &landing, timeouts.login(), timeouts.poll()).await?;
    let session = SessionContext::from_page_url(&url)?;
    log::info!("Signed in at {}", session.base_url());
    Ok(session)
}

/// Fill the identity provider's prompts. Anything that goes wrong is left
/// for the user to finish by hand.
async fn sign_in_with_identity_provider<P: Page>(
    page: &P,
    username: &str,
    password: Option<&str>,
    timeouts: &Timeouts,
) {
    if let Err(e) = page::wait_for(
        page,
        sel::IDP_USERNAME,
        ElementState::Attached,
        timeouts.navigation(),
        timeouts.poll(),
    )
    .await
    {
        log::warn!("No identity provider prompt: {}", e);
        return;
    }

    if let Err(e) = submit_field(page, sel::IDP_USERNAME, username).await {
        log::warn!("Could not fill in the username: {}", e);
        return;
    }

    let Some(password) = password.filter(|p| !p.is_empty()) else {
        log::info!("No password configured, enter it in the browser");
        return;
    };

    if let Err(e) = submit_password(page, password, timeouts).await {
        log::warn!("Could not fill in the password: {}", e);
    }
}

async fn submit_password<P: Page>(
    page: &P,
    password: &str,
    timeouts: &Timeouts,
) -> Result<(), UiError> {
    // The password prompt slides in after the username is accepted
    page::wait_for(
        page,
        sel::IDP_PASSWORD,
        ElementState::Visible,
        timeouts.dialog(),
        timeouts.poll(),
    )
    .await?;
    submit_field(page, sel::IDP_PASSWORD, password).await
}

async fn submit_field<P: Page>(page: &P, selector: &str, value: &str) -> Result<(), UiError> {
    page::fill_selector(page, selector, value).await?;
    page::click_selector(page, sel::IDP_SUBMIT).await
}

/// Sign out, declining the "set status out" prompt. Never fails; problems
/// are only logged.
pub async fn logout<P: Page>(page: &P, session: &SessionContext, timeouts: &Timeouts) {
    log::info!("Signing out");

    if let Err(e) = page.goto(&session.landing_url()).await {
        log::warn!("Could not open the landing page: {}", e);
    }
    if let Ok(landing) = landing_pattern() {
        if let Err(e) = page::wait_for_url(page, &landing, timeouts.load_idle(), timeouts.poll()).await {
            log::warn!("Landing page did not load: {}", e);
        }
    }

    // The logout entry only appears while the profile menu is hovered
    match page::locate(page, sel::PROFILE_MENU).await {
        Ok(menu) => {
            if let Err(e) = page.hover(&menu).await {
                log::warn!("Could not open the profile menu: {}", e);
            }
        }
        Err(e) => log::warn!("Could not find the profile menu: {}", e),
    }
    if let Err(e) = page::click_selector(page, sel::PROFILE_LOGOUT).await {
        log::warn!("Could not click logout: {}", e);
    }

    let status_prompt = page::wait_for(
        page,
        sel::STATUS_DIALOG_CLOSE,
        ElementState::Visible,
        STATUS_DIALOG_WAIT,
        timeouts.poll(),
    )
    .await;
    if status_prompt.is_ok() {
        if let Err(e) = page::click_selector(page, sel::STATUS_DIALOG_CLOSE).await {
            log::warn!("Could not close the status prompt: {}", e);
        }
    }

    match pattern(sel::SIGNED_OUT_URL_PATTERN) {
        Ok(signed_out) => {
            match page::wait_for_url(page, &signed_out, timeouts.navigation(), timeouts.poll()).await {
                Ok(_) => log::info!("Signed out"),
                Err(e) => log::warn!("Sign-out did not complete: {}", e),
            }
        }
        Err(e) => log::warn!("{}", e),
    }
}
