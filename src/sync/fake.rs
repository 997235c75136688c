//! Scripted in-memory page for engine tests.
//!
//! Knows just enough about the AutoTask dialogs to react the way the real
//! UI does: buttons open and close the active dialog, the week arrows move
//! the timesheet, and each detail URL has its own conversation list.
//! Saving a dialog re-renders that list, so conversation elements located
//! before the save go stale.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::{Days, NaiveDate};

use super::page::{ElementRef, Page, UiError};
use super::selectors as sel;

const WEEK_LABEL_ID: &str = "week-label";

/// Controls that exist while the active dialog is open.
const DIALOG_CONTROLS: &[&str] = &[
    sel::WEEK_PREVIOUS,
    sel::WEEK_NEXT,
    sel::WEEK_DAY_EDIT,
    sel::DAY_NEXT,
    sel::DAY_DURATION,
    sel::DAY_SUMMARY,
    sel::DAY_OK,
    sel::WEEK_SAVE_AND_CLOSE,
    sel::ACTIVE_DIALOG_CLOSE,
    sel::TICKET_DATE,
    sel::TICKET_START_TIME,
    sel::TICKET_SUMMARY,
    sel::TICKET_SAVE,
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoadIdle {
    #[default]
    Idle,
    Timeout,
    Fail,
}

#[derive(Debug, Clone)]
struct Conversation {
    author: String,
    title: String,
}

#[derive(Default)]
struct State {
    url: String,
    shown: HashSet<String>,
    missing: HashSet<String>,
    texts: HashMap<String, String>,
    conversations: HashMap<String, Vec<Conversation>>,
    renders: HashMap<String, u32>,
    week_start: Option<NaiveDate>,
    day_format: String,
    load_idle: LoadIdle,
    goto_redirects: HashMap<String, String>,
    click_urls: HashMap<String, String>,
    failing_values: HashSet<String>,
    failing_clicks: HashSet<String>,
    failing_gotos: HashSet<String>,
    visibility_errors: HashMap<String, String>,
    dialogs_opened: usize,
    gotos: Vec<String>,
    clicks: Vec<String>,
    fills: Vec<(String, String)>,
    pauses: usize,
}

impl State {
    fn dialog_open(&self) -> bool {
        self.shown.contains(sel::ACTIVE_DIALOG)
    }

    fn open_dialog(&mut self) {
        self.shown.insert(sel::ACTIVE_DIALOG.to_string());
        self.dialogs_opened += 1;
    }

    /// Save re-renders the conversation list of the current page.
    fn rerender(&mut self) {
        *self.renders.entry(self.url.clone()).or_default() += 1;
    }

    fn render(&self) -> u32 {
        self.renders.get(&self.url).copied().unwrap_or(0)
    }

    fn current_conversations(&self) -> &[Conversation] {
        self.conversations
            .get(&self.url)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[derive(Default)]
pub struct FakePage {
    state: RefCell<State>,
}

impl FakePage {
    pub fn new() -> Self {
        Self::default()
    }

    // Setup

    pub fn show(&self, selector: &str) {
        self.state.borrow_mut().shown.insert(selector.to_string());
    }

    /// Make a selector match nothing, even inside an open dialog.
    pub fn remove(&self, selector: &str) {
        let mut state = self.state.borrow_mut();
        state.shown.remove(selector);
        state.missing.insert(selector.to_string());
    }

    pub fn set_url(&self, url: &str) {
        self.state.borrow_mut().url = url.to_string();
    }

    pub fn set_text(&self, selector: &str, text: &str) {
        self.state
            .borrow_mut()
            .texts
            .insert(selector.to_string(), text.to_string());
    }

    pub fn add_conversation(&self, url: &str, author: &str, title: &str) {
        self.state
            .borrow_mut()
            .conversations
            .entry(url.to_string())
            .or_default()
            .push(Conversation {
                author: author.to_string(),
                title: title.to_string(),
            });
    }

    /// The week the timesheet shows when it opens.
    pub fn set_week(&self, start: NaiveDate, day_format: &str) {
        let mut state = self.state.borrow_mut();
        state.week_start = Some(start);
        state.day_format = day_format.to_string();
    }

    pub fn set_load_idle(&self, load_idle: LoadIdle) {
        self.state.borrow_mut().load_idle = load_idle;
    }

    pub fn redirect_goto(&self, from: &str, to: &str) {
        self.state
            .borrow_mut()
            .goto_redirects
            .insert(from.to_string(), to.to_string());
    }

    pub fn url_after_click(&self, selector: &str, url: &str) {
        self.state
            .borrow_mut()
            .click_urls
            .insert(selector.to_string(), url.to_string());
    }

    pub fn fail_fill_value(&self, value: &str) {
        self.state.borrow_mut().failing_values.insert(value.to_string());
    }

    pub fn fail_click(&self, element: &str) {
        self.state.borrow_mut().failing_clicks.insert(element.to_string());
    }

    pub fn fail_goto(&self, url: &str) {
        self.state.borrow_mut().failing_gotos.insert(url.to_string());
    }

    /// Visibility checks on `selector` fail with the given WebDriver error.
    pub fn fail_visibility(&self, selector: &str, error: &str) {
        self.state
            .borrow_mut()
            .visibility_errors
            .insert(selector.to_string(), error.to_string());
    }

    // Inspection

    pub fn gotos(&self) -> Vec<String> {
        self.state.borrow().gotos.clone()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.state.borrow().clicks.clone()
    }

    pub fn fills(&self) -> Vec<(String, String)> {
        self.state.borrow().fills.clone()
    }

    pub fn filled_values(&self) -> Vec<String> {
        self.state.borrow().fills.iter().map(|(_, v)| v.clone()).collect()
    }

    pub fn clicked(&self, element: &str) -> usize {
        self.state.borrow().clicks.iter().filter(|c| *c == element).count()
    }

    /// Clicks and fills: anything that could change remote state.
    pub fn mutations(&self) -> usize {
        let state = self.state.borrow();
        state.clicks.len() + state.fills.len()
    }

    pub fn pauses(&self) -> usize {
        self.state.borrow().pauses
    }

    pub fn week_start(&self) -> Option<NaiveDate> {
        self.state.borrow().week_start
    }

    pub fn dialog_open(&self) -> bool {
        self.state.borrow().dialog_open()
    }

    pub fn dialogs_opened(&self) -> usize {
        self.state.borrow().dialogs_opened
    }
}

/// `conversation-{index}` on the first render, `conversation-{index}~{render}` after.
fn conversation_id(index: usize, render: u32) -> String {
    if render == 0 {
        format!("conversation-{}", index)
    } else {
        format!("conversation-{}~{}", index, render)
    }
}

/// (index, render, part) of a conversation element id.
fn conversation_part(id: &str) -> Option<(usize, u32, &str)> {
    let rest = id.strip_prefix("conversation-")?;
    let (element, part) = rest.split_once('/').unwrap_or((rest, ""));
    let (index, render) = element.split_once('~').unwrap_or((element, "0"));
    Some((index.parse().ok()?, render.parse().ok()?, part))
}

fn stale(id: &str) -> UiError {
    UiError::WebDriver {
        error: "stale element reference".into(),
        message: id.to_string(),
    }
}

impl Page for FakePage {
    async fn goto(&self, url: &str) -> Result<(), UiError> {
        let mut state = self.state.borrow_mut();
        state.gotos.push(url.to_string());
        if state.failing_gotos.contains(url) {
            return Err(UiError::WebDriver {
                error: "unknown error".into(),
                message: format!("net::ERR_CONNECTION_RESET at {}", url),
            });
        }
        let target = state
            .goto_redirects
            .get(url)
            .cloned()
            .unwrap_or_else(|| url.to_string());
        state.url = target;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, UiError> {
        Ok(self.state.borrow().url.clone())
    }

    async fn locate_all(
        &self,
        scope: Option<&ElementRef>,
        selector: &str,
    ) -> Result<Vec<ElementRef>, UiError> {
        let state = self.state.borrow();

        if let Some(scope) = scope {
            let Some((_, render, "")) = conversation_part(scope.id()) else {
                return Ok(Vec::new());
            };
            if render != state.render() {
                return Err(stale(scope.id()));
            }
            let base = scope.id();
            let found = match selector {
                sel::CONVERSATION_AUTHOR => vec![format!("{}/author", base)],
                sel::CONVERSATION_TITLE => vec![format!("{}/title", base)],
                sel::CONVERSATION_ACTIONS => (0..4).map(|k| format!("{}/action-{}", base, k)).collect(),
                _ => Vec::new(),
            };
            return Ok(found.into_iter().map(ElementRef).collect());
        }

        if state.missing.contains(selector) {
            return Ok(Vec::new());
        }

        if selector == sel::CONVERSATION_DETAILS {
            let render = state.render();
            return Ok((0..state.current_conversations().len())
                .map(|i| ElementRef(conversation_id(i, render)))
                .collect());
        }

        if selector == sel::TICKET_DURATION {
            return Ok(if state.dialog_open() {
                vec![ElementRef::new("ticket-hours"), ElementRef::new("ticket-minutes")]
            } else {
                Vec::new()
            });
        }

        if selector == sel::WEEK_START_LABEL {
            return Ok(if state.dialog_open() && state.week_start.is_some() {
                vec![ElementRef::new(WEEK_LABEL_ID)]
            } else {
                Vec::new()
            });
        }

        let present = state.shown.contains(selector)
            || (state.dialog_open() && DIALOG_CONTROLS.contains(&selector));
        Ok(if present {
            vec![ElementRef::new(selector)]
        } else {
            Vec::new()
        })
    }

    async fn text(&self, element: &ElementRef) -> Result<String, UiError> {
        let state = self.state.borrow();
        let id = element.id();

        if let Some(text) = state.texts.get(id) {
            return Ok(text.clone());
        }

        if id == WEEK_LABEL_ID {
            if let Some(start) = state.week_start {
                return Ok(start.format(&state.day_format).to_string());
            }
        }

        if let Some((index, render, part)) = conversation_part(id) {
            if render != state.render() {
                return Err(stale(id));
            }
            if let Some(conversation) = state.current_conversations().get(index) {
                match part {
                    "author" => return Ok(conversation.author.clone()),
                    "title" => return Ok(conversation.title.clone()),
                    _ => {}
                }
            }
        }

        Err(UiError::NotFound(id.to_string()))
    }

    async fn click(&self, element: &ElementRef) -> Result<(), UiError> {
        let mut state = self.state.borrow_mut();
        let id = element.id().to_string();
        state.clicks.push(id.clone());

        if state.failing_clicks.contains(&id) {
            return Err(UiError::WebDriver {
                error: "element click intercepted".into(),
                message: id,
            });
        }

        if let Some(url) = state.click_urls.get(&id).cloned() {
            state.url = url;
        }

        match id.as_str() {
            sel::TICKET_NEW_ENTRY | sel::TASK_NEW_ENTRY => {
                // The open dialog is modal and covers the page behind it
                if state.dialog_open() {
                    return Err(UiError::WebDriver {
                        error: "element click intercepted".into(),
                        message: id.clone(),
                    });
                }
                state.open_dialog();
            }
            sel::TICKET_SAVE | sel::WEEK_SAVE_AND_CLOSE => {
                state.shown.remove(sel::ACTIVE_DIALOG);
                state.rerender();
            }
            sel::ACTIVE_DIALOG_CLOSE => {
                state.shown.remove(sel::ACTIVE_DIALOG);
            }
            sel::ALERT_OK => {
                state.shown.remove(sel::ALERT_DIALOG);
            }
            sel::WEEK_NEXT => {
                state.week_start = state.week_start.map(|d| d + Days::new(7));
            }
            sel::WEEK_PREVIOUS => {
                state.week_start = state.week_start.map(|d| d - Days::new(7));
            }
            other => {
                if let Some((_, render, "action-3")) = conversation_part(other) {
                    if render != state.render() {
                        return Err(stale(other));
                    }
                    state.open_dialog();
                }
            }
        }
        Ok(())
    }

    async fn fill(&self, element: &ElementRef, value: &str) -> Result<(), UiError> {
        let mut state = self.state.borrow_mut();
        state.fills.push((element.id().to_string(), value.to_string()));
        if state.failing_values.contains(value) {
            return Err(UiError::WebDriver {
                error: "element not interactable".into(),
                message: element.id().to_string(),
            });
        }
        Ok(())
    }

    async fn press_enter(&self, element: &ElementRef) -> Result<(), UiError> {
        let mut state = self.state.borrow_mut();
        state.clicks.push(format!("{}#enter", element.id()));
        if let Some(url) = state.click_urls.get(&format!("{}#enter", element.id())).cloned() {
            state.url = url;
        }
        Ok(())
    }

    async fn hover(&self, _element: &ElementRef) -> Result<(), UiError> {
        Ok(())
    }

    async fn is_visible(&self, element: &ElementRef) -> Result<bool, UiError> {
        match self.state.borrow().visibility_errors.get(element.id()) {
            Some(error) => Err(UiError::WebDriver {
                error: error.clone(),
                message: element.id().to_string(),
            }),
            None => Ok(true),
        }
    }

    async fn wait_for_load_idle(&self, timeout: Duration) -> Result<(), UiError> {
        match self.state.borrow().load_idle {
            LoadIdle::Idle => Ok(()),
            LoadIdle::Timeout => Err(UiError::Timeout {
                what: "load idle".into(),
                elapsed: timeout,
            }),
            LoadIdle::Fail => Err(UiError::WebDriver {
                error: "no such window".into(),
                message: "target window already closed".into(),
            }),
        }
    }

    async fn pause(&self, _duration: Duration) {
        self.state.borrow_mut().pauses += 1;
    }
}
