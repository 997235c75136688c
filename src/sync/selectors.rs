//! CSS selectors and URLs for the AutoTask web UI.
//!
//! Most controls carry a stable `data-eii` attribute; the rest are matched
//! on AutoTask's own class names.

pub const SERVICE_URL: &str = "https://www.autotask.net";
pub const LANDING_SUFFIX: &str = "/Mvc/Framework/Navigation.mvc/Landing";

pub fn ticket_detail_path(id: u64) -> String {
    format!("/Mvc/ServiceDesk/TicketDetail.mvc?ticketID={}", id)
}

pub fn task_detail_path(id: u64) -> String {
    format!("/Mvc/Projects/TaskDetail.mvc?taskID={}", id)
}

// Sign-in

pub const AUTH_URL_PATTERN: &str = r"Authentication\.mvc";
pub const SIGNED_OUT_URL_PATTERN: &str = r"Authenticat";
pub const USERNAME_TEXTBOX: &str = "input[type='text'], input[type='email']";
pub const IDP_USERNAME: &str = "#i0116";
pub const IDP_PASSWORD: &str = "#i0118";
pub const IDP_SUBMIT: &str = "#idSIButton9";

// Sign-out

pub const PROFILE_MENU: &str = "[data-eii='05008GVH']";
pub const PROFILE_LOGOUT: &str = "[data-eii='0100014V']";
pub const STATUS_DIALOG_CLOSE: &str = "div.Dialog1 div.DialogTitleBarIcon";

// Detail pages

pub const ALERT_DIALOG: &str = "#AlertDialog.Active";
pub const ALERT_OK: &str = "#AlertDialogOkayButton";
pub const CONVERSATION_DETAILS: &str = "div > .ConversationChunk > .ConversationItem .Details";
pub const CONVERSATION_AUTHOR: &str = "div > .Author div.Text2";
pub const CONVERSATION_TITLE: &str = "div.Title div.Text > span";
pub const CONVERSATION_ACTIONS: &str = "div.FooterActions div.LinkButton2";
/// Position of "Edit" among a conversation's footer actions.
pub const CONVERSATION_EDIT_INDEX: usize = 3;

pub const ACTIVE_DIALOG: &str = "body > div.Dialog1.Dialog2.Normal.Active";
/// Title bar close icon of the active dialog; discards unsaved input.
pub const ACTIVE_DIALOG_CLOSE: &str =
    "body > div.Dialog1.Dialog2.Normal.Active div.DialogTitleBarIcon";
pub const LOADING_INDICATOR: &str = "#LoadingIndicator.Active";

// Ticket time entry dialog

pub const TICKET_NEW_ENTRY: &str = "[data-eii='000001Bb']";
pub const TICKET_DATE: &str = "[data-eii='010000xs'] > input[type=text]";
pub const TICKET_START_TIME: &str = "[data-eii='010000xt'] > input[type=text]";
/// Hours then minutes.
pub const TICKET_DURATION: &str = "[data-eii='000001GH'] input[type='text']";
pub const TICKET_SUMMARY: &str =
    "[data-eii='000001GK'] > div.Content2 > div.InputWrapper2 > div.ContentEditable2.Small";
pub const TICKET_SAVE: &str = "[data-eii='010000xo']";

// Task weekly timesheet dialog

pub const TASK_NEW_ENTRY: &str = "[data-eii='00000135']";
pub const WEEK_START_LABEL: &str =
    "body > div.Dialog1.Dialog2.Normal.Active tr.Heading > td.TextCell div.Label";
pub const WEEK_PREVIOUS: &str = "body > div.Dialog1.Dialog2.Normal.Active .MoveLeft";
pub const WEEK_NEXT: &str = "body > div.Dialog1.Dialog2.Normal.Active .MoveRight";
/// Edit icons of the week's days; the first one is Sunday.
pub const WEEK_DAY_EDIT: &str = "div.Body > div.Scrolling > table > tbody div.Icon";
pub const DAY_NEXT: &str = "[data-eii='0100014L']";
pub const DAY_DURATION: &str = "[data-eii='0100014M']";
pub const DAY_SUMMARY: &str =
    "[data-eii='0100014N'] > div.Content2 > div.InputWrapper2 > div.ContentEditable2.Small";
pub const DAY_OK: &str = "[data-eii='0100014J']";
pub const WEEK_SAVE_AND_CLOSE: &str = "[data-eii='010000p7']";
