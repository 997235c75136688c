//! Writes pending entries into the service, one week group at a time.
//!
//! Tasks are captured through the weekly timesheet: open it (new or via an
//! existing conversation's edit action), move to the right week, then walk
//! the days Sunday to Saturday filling one entry per day. Tickets have no
//! weekly view and are captured one entry per dialog.
//!
//! Nothing here returns an error. Failures are attached to the entries they
//! affect and the caller carries on with the next group.

use chrono::{Days, Local, NaiveDate};

use crate::config::{Config, Timeouts};
use crate::core::calendar::sunday_of_week;
use crate::core::entry::{self, Category, EntryError, TimeEntry, WeekPeer};

use super::matcher::ConversationScan;
use super::navigator::align_to_week;
use super::page::{self, ElementState, Page, UiError};
use super::selectors as sel;

/// Everything the capture and matching steps need besides the page.
#[derive(Clone, Debug)]
pub struct CaptureOptions {
    pub display_name: String,
    pub date_format: String,
    pub day_format: String,
    pub timeouts: Timeouts,
    /// Match only, never open a capture dialog.
    pub dry_run: bool,
    /// Reference date for week labels without a year.
    pub today: fn() -> NaiveDate,
}

fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

impl CaptureOptions {
    pub fn from_config(config: &Config, dry_run: bool) -> Self {
        Self {
            display_name: config.display_name.clone(),
            date_format: config.date_format.clone(),
            day_format: config.day_format.clone(),
            timeouts: config.timeouts.clone(),
            dry_run,
            today: local_today,
        }
    }
}

/// Capture the pending entries of one week group of a single parent.
///
/// `scan` must be the conversation scan the group's week peers came from.
pub async fn capture_week<P: Page>(
    page: &P,
    group: &mut [&mut TimeEntry],
    scan: &ConversationScan,
    options: &CaptureOptions,
) {
    match group.first().map(|e| e.category) {
        Some(Category::Ticket) => capture_tickets(page, group, options).await,
        Some(Category::Task) => capture_task_week(page, group, scan, options).await,
        None => {}
    }
}

// Tasks

async fn capture_task_week<P: Page>(
    page: &P,
    group: &mut [&mut TimeEntry],
    scan: &ConversationScan,
    options: &CaptureOptions,
) {
    let Some(first) = group.first() else {
        return;
    };
    let (id, sunday) = (first.id, sunday_of_week(first.date));

    let pending = group.iter().filter(|e| e.is_pending()).count();
    if pending == 0 {
        log::info!("Task {}: week of {} has nothing to capture", id, sunday);
        return;
    }

    let peer = group.iter().find_map(|e| e.week_peer);
    log::info!(
        "Task {}: capturing {} entries for week of {} ({})",
        id,
        pending,
        sunday,
        if peer.is_some() { "edit" } else { "new" }
    );

    let outcome = match open_week(page, peer, scan, sunday, options).await {
        Ok(()) => fill_week(page, group, sunday, pending, options).await,
        Err(e) => Err(e),
    };

    match outcome {
        Ok(()) => {
            for entry in group.iter_mut().filter(|e| e.is_pending()) {
                entry.submitted = true;
            }
        }
        Err(e) => {
            log::error!("Task {}: week of {} not captured: {}", id, sunday, e);
            for entry in group.iter_mut().filter(|e| e.is_pending()) {
                entry.fail(e.clone());
            }
            if let Err(e) = discard_dialog(page, &options.timeouts).await {
                log::warn!("Task {}: could not close the timesheet: {}", id, e);
            }
        }
    }
}

/// Close the active dialog without saving, if one is open.
async fn discard_dialog<P: Page>(page: &P, timeouts: &Timeouts) -> Result<(), UiError> {
    if page.locate_all(None, sel::ACTIVE_DIALOG).await?.is_empty() {
        return Ok(());
    }
    log::debug!("Discarding the open dialog");
    page::click_selector(page, sel::ACTIVE_DIALOG_CLOSE).await?;
    page::wait_for(
        page,
        sel::ACTIVE_DIALOG,
        ElementState::Detached,
        timeouts.dialog(),
        timeouts.poll(),
    )
    .await
}

/// Open the timesheet and align it to the week starting `sunday`.
async fn open_week<P: Page>(
    page: &P,
    peer: Option<WeekPeer>,
    scan: &ConversationScan,
    sunday: NaiveDate,
    options: &CaptureOptions,
) -> Result<(), EntryError> {
    let timeouts = &options.timeouts;

    match peer {
        Some(peer) => {
            let conversation = scan.resolve(&peer)?;
            let actions = page
                .locate_all(Some(&conversation.element), sel::CONVERSATION_ACTIONS)
                .await?;
            let edit = actions.get(sel::CONVERSATION_EDIT_INDEX).ok_or_else(|| {
                UiError::NotFound(format!("edit action of {}", conversation.element.id()))
            })?;
            page.click(edit).await?;
        }
        None => page::click_selector(page, sel::TASK_NEW_ENTRY).await?,
    }

    page::wait_for(
        page,
        sel::ACTIVE_DIALOG,
        ElementState::Attached,
        timeouts.dialog(),
        timeouts.poll(),
    )
    .await?;

    align_to_week(page, sunday, &options.day_format, (options.today)(), timeouts).await
}

/// Walk the days of the open week and save it.
///
/// Returns an error only when moving between days or saving fails; problems
/// with a single day stay on that day's entry.
async fn fill_week<P: Page>(
    page: &P,
    group: &mut [&mut TimeEntry],
    sunday: NaiveDate,
    pending: usize,
    options: &CaptureOptions,
) -> Result<(), EntryError> {
    let timeouts = &options.timeouts;

    // Sunday's edit icon opens the per-day editor
    page::click_selector(page, sel::WEEK_DAY_EDIT).await?;
    page::wait_for(
        page,
        sel::DAY_NEXT,
        ElementState::Attached,
        timeouts.dialog(),
        timeouts.poll(),
    )
    .await?;

    let mut captured = 0;
    for offset in 0..7 {
        let day = sunday + Days::new(offset);
        let members = entry::on_date(group, day);

        match members.as_slice() {
            [] => {}
            [index] => {
                let entry = &mut *group[*index];
                if entry.is_pending() {
                    if let Err(e) = fill_day(page, entry, timeouts).await {
                        log::warn!("Task {}: could not fill {}: {}", entry.id, day, e);
                        entry.fail(e.into());
                    }
                    captured += 1;
                }
            }
            _ => {
                log::warn!("{} entries for {}, skipping the day", members.len(), day);
                for &index in &members {
                    group[index].fail(EntryError::MultipleEntriesForDay(day));
                }
            }
        }

        if offset == 6 || captured >= pending {
            return save_week(page, timeouts).await.map_err(EntryError::from);
        }

        page::click_selector(page, sel::DAY_NEXT).await?;
        page::wait_for(
            page,
            sel::DAY_NEXT,
            ElementState::Attached,
            timeouts.dialog(),
            timeouts.poll(),
        )
        .await?;
    }

    Ok(())
}

async fn fill_day<P: Page>(page: &P, entry: &TimeEntry, timeouts: &Timeouts) -> Result<(), UiError> {
    log::debug!("Filling {} with {}h", entry.date, entry.duration_hours);
    page::fill_selector(page, sel::DAY_DURATION, &entry.duration_hours.to_string()).await?;
    page::fill_selector(page, sel::DAY_SUMMARY, &entry.summary).await?;
    page.pause(timeouts.settle()).await;
    Ok(())
}

async fn save_week<P: Page>(page: &P, timeouts: &Timeouts) -> Result<(), UiError> {
    page::click_selector(page, sel::DAY_OK).await?;
    page::click_selector(page, sel::WEEK_SAVE_AND_CLOSE).await?;
    page::wait_for(
        page,
        sel::ACTIVE_DIALOG,
        ElementState::Detached,
        timeouts.dialog(),
        timeouts.poll(),
    )
    .await
}

// Tickets

async fn capture_tickets<P: Page>(page: &P, group: &mut [&mut TimeEntry], options: &CaptureOptions) {
    for entry in group.iter_mut().filter(|e| e.is_pending()) {
        match capture_ticket_entry(page, &**entry, &options.timeouts).await {
            Ok(()) => entry.submitted = true,
            Err(e) => {
                log::warn!("Ticket {}: entry on {} not captured: {}", entry.id, entry.date, e);
                entry.fail(e.into());
                if let Err(e) = discard_dialog(page, &options.timeouts).await {
                    log::warn!("Ticket {}: could not close the entry dialog: {}", entry.id, e);
                }
            }
        }
    }
}

async fn capture_ticket_entry<P: Page>(
    page: &P,
    entry: &TimeEntry,
    timeouts: &Timeouts,
) -> Result<(), UiError> {
    log::info!(
        "Ticket {}: capturing {} {} ({}h)",
        entry.id,
        entry.date_label(),
        entry.start_time,
        entry.duration_hours
    );

    page::click_selector(page, sel::TICKET_NEW_ENTRY).await?;
    page::wait_for(
        page,
        sel::ACTIVE_DIALOG,
        ElementState::Attached,
        timeouts.dialog(),
        timeouts.poll(),
    )
    .await?;

    page::fill_selector(page, sel::TICKET_DATE, entry.date_label()).await?;
    page::fill_selector(page, sel::TICKET_START_TIME, &entry.start_time).await?;

    let duration = page.locate_all(None, sel::TICKET_DURATION).await?;
    let [hours, minutes, ..] = duration.as_slice() else {
        return Err(UiError::NotFound(format!(
            "hours and minutes in {}",
            sel::TICKET_DURATION
        )));
    };
    page.fill(hours, &entry.hours_part().to_string()).await?;
    page.fill(minutes, &entry.minutes_part().to_string()).await?;

    page::fill_selector(page, sel::TICKET_SUMMARY, &entry.summary).await?;
    page.pause(timeouts.settle()).await;

    page::click_selector(page, sel::TICKET_SAVE).await?;
    page::wait_for(
        page,
        sel::ACTIVE_DIALOG,
        ElementState::Detached,
        timeouts.dialog(),
        timeouts.poll(),
    )
    .await
}
