//! [`Page`] backed by a W3C WebDriver server such as chromedriver or
//! geckodriver.

use std::time::Duration;

use reqwest::{Client, Method};
use serde_json::{Value, json};

use crate::config::Browser;

use super::page::{ElementRef, Page, UiError};

/// Key under which WebDriver returns element references.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";
const ENTER_KEY: &str = "\u{E007}";
const READY_POLL: Duration = Duration::from_millis(100);

/// A browser session on a WebDriver server. Delete it with [`close`].
///
/// [`close`]: WebDriverPage::close
pub struct WebDriverPage {
    http: Client,
    endpoint: String,
    session_id: String,
}

impl WebDriverPage {
    /// Start a new browser session on the server at `endpoint`.
    pub async fn connect(endpoint: &str, browser: Browser, headless: bool) -> Result<Self, UiError> {
        let http = Client::builder().build()?;
        let endpoint = endpoint.trim_end_matches('/').to_string();

        log::info!("Starting {} session on {}", browser.as_str(), endpoint);
        let resp = http
            .post(format!("{}/session", endpoint))
            .json(&capabilities(browser, headless))
            .send()
            .await?;
        let status = resp.status();
        let body: Value = resp.json().await?;
        if !status.is_success() {
            return Err(error_from(&body, status.as_u16()));
        }

        let session_id = body["value"]["sessionId"]
            .as_str()
            .ok_or_else(|| UiError::Protocol(format!("no session id in {}", body)))?
            .to_string();
        log::debug!("WebDriver session {}", session_id);

        Ok(Self {
            http,
            endpoint,
            session_id,
        })
    }

    /// End the browser session.
    pub async fn close(self) -> Result<(), UiError> {
        self.command(Method::DELETE, "", None).await?;
        log::info!("Closed WebDriver session {}", self.session_id);
        Ok(())
    }

    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, UiError> {
        let url = format!("{}/session/{}{}", self.endpoint, self.session_id, path);
        let mut request = self.http.request(method.clone(), &url);
        if method == Method::POST {
            request = request.json(&body.unwrap_or_else(|| json!({})));
        }

        let resp = request.send().await?;
        let status = resp.status();
        let mut reply: Value = resp.json().await?;
        if !status.is_success() {
            return Err(error_from(&reply, status.as_u16()));
        }
        Ok(reply.get_mut("value").map(Value::take).unwrap_or(Value::Null))
    }

    async fn element_command(
        &self,
        method: Method,
        element: &ElementRef,
        action: &str,
        body: Option<Value>,
    ) -> Result<Value, UiError> {
        let path = format!("/element/{}/{}", element.id(), action);
        self.command(method, &path, body).await
    }

    async fn ready_state(&self) -> Result<String, UiError> {
        let value = self
            .command(
                Method::POST,
                "/execute/sync",
                Some(json!({ "script": "return document.readyState", "args": [] })),
            )
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }
}

fn capabilities(browser: Browser, headless: bool) -> Value {
    let always_match = match browser {
        Browser::Chrome => {
            let mut args = vec!["--window-size=1600,1000"];
            if headless {
                args.push("--headless=new");
            }
            json!({ "browserName": "chrome", "goog:chromeOptions": { "args": args } })
        }
        Browser::Firefox => {
            let args: Vec<&str> = if headless { vec!["-headless"] } else { Vec::new() };
            json!({ "browserName": "firefox", "moz:firefoxOptions": { "args": args } })
        }
    };
    json!({ "capabilities": { "alwaysMatch": always_match } })
}

fn error_from(body: &Value, status: u16) -> UiError {
    let value = &body["value"];
    match value["error"].as_str() {
        Some(error) => UiError::WebDriver {
            error: error.to_string(),
            message: value["message"].as_str().unwrap_or_default().to_string(),
        },
        None => UiError::Protocol(format!("HTTP {}: {}", status, body)),
    }
}

fn element_refs(value: &Value) -> Result<Vec<ElementRef>, UiError> {
    let items = value
        .as_array()
        .ok_or_else(|| UiError::Protocol(format!("expected element list, got {}", value)))?;
    items
        .iter()
        .map(|item| {
            item[ELEMENT_KEY]
                .as_str()
                .map(ElementRef::new)
                .ok_or_else(|| UiError::Protocol(format!("not an element: {}", item)))
        })
        .collect()
}

impl Page for WebDriverPage {
    async fn goto(&self, url: &str) -> Result<(), UiError> {
        log::debug!("goto {}", url);
        self.command(Method::POST, "/url", Some(json!({ "url": url })))
            .await?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, UiError> {
        let value = self.command(Method::GET, "/url", None).await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| UiError::Protocol(format!("URL is not a string: {}", value)))
    }

    async fn locate_all(
        &self,
        scope: Option<&ElementRef>,
        selector: &str,
    ) -> Result<Vec<ElementRef>, UiError> {
        let path = match scope {
            Some(element) => format!("/element/{}/elements", element.id()),
            None => "/elements".to_string(),
        };
        let query = json!({ "using": "css selector", "value": selector });
        let value = self.command(Method::POST, &path, Some(query)).await?;
        element_refs(&value)
    }

    async fn text(&self, element: &ElementRef) -> Result<String, UiError> {
        let value = self
            .element_command(Method::GET, element, "text", None)
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn click(&self, element: &ElementRef) -> Result<(), UiError> {
        self.element_command(Method::POST, element, "click", None)
            .await?;
        Ok(())
    }

    async fn fill(&self, element: &ElementRef, value: &str) -> Result<(), UiError> {
        self.element_command(Method::POST, element, "clear", None)
            .await?;
        self.element_command(Method::POST, element, "value", Some(json!({ "text": value })))
            .await?;
        Ok(())
    }

    async fn press_enter(&self, element: &ElementRef) -> Result<(), UiError> {
        self.element_command(Method::POST, element, "value", Some(json!({ "text": ENTER_KEY })))
            .await?;
        Ok(())
    }

    async fn hover(&self, element: &ElementRef) -> Result<(), UiError> {
        let actions = json!({
            "actions": [{
                "type": "pointer",
                "id": "mouse",
                "parameters": { "pointerType": "mouse" },
                "actions": [{
                    "type": "pointerMove",
                    "duration": 100,
                    "origin": { ELEMENT_KEY: element.id() },
                    "x": 0,
                    "y": 0
                }]
            }]
        });
        self.command(Method::POST, "/actions", Some(actions)).await?;
        Ok(())
    }

    async fn is_visible(&self, element: &ElementRef) -> Result<bool, UiError> {
        let value = self
            .element_command(Method::GET, element, "displayed", None)
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn wait_for_load_idle(&self, timeout: Duration) -> Result<(), UiError> {
        let attempts = (timeout.as_millis() / READY_POLL.as_millis()).max(1);
        for attempt in 0..attempts {
            if attempt > 0 {
                tokio::time::sleep(READY_POLL).await;
            }
            if self.ready_state().await? == "complete" {
                return Ok(());
            }
        }
        Err(UiError::Timeout {
            what: "page load".into(),
            elapsed: timeout,
        })
    }

    async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
