//! Moves the open timesheet dialog to a given week.

use chrono::NaiveDate;

use crate::config::Timeouts;
use crate::core::calendar::{parse_day_label, resolve_day_label};
use crate::core::entry::EntryError;

use super::page::{self, ElementState, Page};
use super::selectors as sel;

/// Label reads before giving up. Each miss clicks one week further.
pub const MAX_WEEK_STEPS: usize = 4;

/// The Sunday the dialog currently shows, with the year inferred from
/// `today`.
pub async fn displayed_week<P: Page>(
    page: &P,
    day_format: &str,
    today: NaiveDate,
) -> Result<NaiveDate, EntryError> {
    let label = page::text_of(page, sel::WEEK_START_LABEL).await?;
    let (month, day) =
        parse_day_label(&label, day_format).map_err(|e| EntryError::Parse(e.to_string()))?;
    resolve_day_label(month, day, today)
        .ok_or_else(|| EntryError::Parse(format!("week label {:?} is not a date", label)))
}

/// Step the timesheet dialog until it shows the week starting `target`.
///
/// The dialog must already be open. Labels carry no year, so it's inferred
/// from `today`; weeks more than a few months away can't be reached.
pub async fn align_to_week<P: Page>(
    page: &P,
    target: NaiveDate,
    day_format: &str,
    today: NaiveDate,
    timeouts: &Timeouts,
) -> Result<(), EntryError> {
    for step in 0..MAX_WEEK_STEPS {
        let shown = displayed_week(page, day_format, today).await?;
        if shown == target {
            log::debug!("Timesheet at week {} after {} steps", target, step);
            return Ok(());
        }

        let control = if target < shown {
            sel::WEEK_PREVIOUS
        } else {
            sel::WEEK_NEXT
        };
        log::debug!("Timesheet shows {}, want {}", shown, target);
        page::click_selector(page, control).await?;
        page::wait_for(
            page,
            sel::LOADING_INDICATOR,
            ElementState::Detached,
            timeouts.navigation(),
            timeouts.poll(),
        )
        .await?;
    }

    log::warn!("Gave up looking for week {} after {} steps", target, MAX_WEEK_STEPS);
    Err(EntryError::WeekNotFound(target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::fake::FakePage;

    const DAY_FORMAT: &str = "%a %m/%d";

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn open_at(start: NaiveDate) -> FakePage {
        let page = FakePage::new();
        page.show(sel::ACTIVE_DIALOG);
        page.set_week(start, DAY_FORMAT);
        page
    }

    #[tokio::test]
    async fn already_aligned() {
        let page = open_at(date(2023, 9, 10));
        align_to_week(&page, date(2023, 9, 10), DAY_FORMAT, date(2023, 9, 20), &Timeouts::default())
            .await
            .unwrap();
        assert!(page.clicks().is_empty());
    }

    #[tokio::test]
    async fn steps_back() {
        let page = open_at(date(2023, 9, 17));
        align_to_week(&page, date(2023, 9, 3), DAY_FORMAT, date(2023, 9, 20), &Timeouts::default())
            .await
            .unwrap();
        assert_eq!(page.clicked(sel::WEEK_PREVIOUS), 2);
        assert_eq!(page.clicked(sel::WEEK_NEXT), 0);
        assert_eq!(page.week_start(), Some(date(2023, 9, 3)));
    }

    #[tokio::test]
    async fn steps_forward_across_new_year() {
        let page = open_at(date(2023, 12, 24));
        align_to_week(&page, date(2024, 1, 7), DAY_FORMAT, date(2024, 1, 10), &Timeouts::default())
            .await
            .unwrap();
        assert_eq!(page.clicked(sel::WEEK_NEXT), 2);
    }

    #[tokio::test]
    async fn gives_up_after_four_steps() {
        let page = open_at(date(2023, 8, 6));
        let err = align_to_week(
            &page,
            date(2023, 9, 10),
            DAY_FORMAT,
            date(2023, 9, 20),
            &Timeouts::default(),
        )
        .await
        .unwrap_err();
        assert_eq!(err, EntryError::WeekNotFound(date(2023, 9, 10)));
        assert_eq!(page.clicked(sel::WEEK_NEXT), MAX_WEEK_STEPS);
    }

    #[tokio::test]
    async fn stuck_label_gives_up() {
        let page = open_at(date(2023, 9, 3));
        // The label never changes, whatever is clicked.
        page.set_text("week-label", "Sun 09/03");
        let err = align_to_week(
            &page,
            date(2023, 9, 10),
            DAY_FORMAT,
            date(2023, 9, 20),
            &Timeouts::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, EntryError::WeekNotFound(_)));
    }

    #[tokio::test]
    async fn unreadable_label() {
        let page = open_at(date(2023, 9, 3));
        page.set_text("week-label", "Loading...");
        let err = align_to_week(
            &page,
            date(2023, 9, 10),
            DAY_FORMAT,
            date(2023, 9, 20),
            &Timeouts::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, EntryError::Parse(_)));
    }

    #[tokio::test]
    async fn closed_dialog_is_ui_error() {
        let page = FakePage::new();
        let err = displayed_week(&page, DAY_FORMAT, date(2023, 9, 20))
            .await
            .unwrap_err();
        assert!(matches!(err, EntryError::Ui(_)));
    }
}
