use chrono::format::{self, Parsed, StrftimeItems};
use chrono::{Datelike, Days, Months, NaiveDate};

/// Months either side of "today" that the remote week picker is assumed to
/// stay within. Used to recover the year from labels that only show a month
/// and a day.
pub const YEAR_INFERENCE_WINDOW_MONTHS: u32 = 3;

/// Week number of `date` within its year, with weeks starting on Sunday.
///
/// Days before the first Sunday of the year form a leading partial week and
/// are always week 1, so the first full week is week 2.
pub fn week_number(date: NaiveDate) -> u32 {
    let jan1 = NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date);
    let offset = (7 - jan1.weekday().num_days_from_sunday()) % 7;
    let first_sunday = jan1 + Days::new(u64::from(offset));

    if date < first_sunday {
        return 1;
    }

    let days_passed = (date - first_sunday).num_days();
    (days_passed / 7) as u32 + 2
}

/// The Sunday that starts the week containing `date`.
pub fn sunday_of_week(date: NaiveDate) -> NaiveDate {
    let offset = date.weekday().num_days_from_sunday();
    date - Days::new(u64::from(offset))
}

/// Infer the most likely year for `month` given a reference date and a
/// window of `window_months` either side of it.
///
/// Assumes the window crosses at most one year boundary. Windows of 12
/// months or more can straddle two boundaries and the result then always
/// lands in one of the two outer years.
pub fn infer_year(month: u32, window_months: u32, reference: NaiveDate) -> i32 {
    let range_start = reference
        .checked_sub_months(Months::new(window_months))
        .unwrap_or(reference);
    let range_end = reference
        .checked_add_months(Months::new(window_months))
        .unwrap_or(reference);

    if range_start.year() == range_end.year() {
        return range_start.year();
    }

    if month >= range_start.month() && month <= 12 {
        range_start.year()
    } else {
        range_end.year()
    }
}

/// Why a calendar label could not be read.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LabelError {
    #[error("label {label:?} does not match format {format:?}: {source}")]
    Mismatch {
        label: String,
        format: String,
        source: format::ParseError,
    },

    #[error("format {0:?} does not contain both a month and a day")]
    Incomplete(String),
}

/// Parse a year-less label such as `Sun 09/10` into `(month, day)`.
///
/// `day_format` uses strftime syntax. Any weekday in the label is accepted
/// but not checked against the date, since the year is not known yet.
pub fn parse_day_label(label: &str, day_format: &str) -> Result<(u32, u32), LabelError> {
    let mut parsed = Parsed::new();
    format::parse(&mut parsed, label.trim(), StrftimeItems::new(day_format)).map_err(|source| {
        LabelError::Mismatch {
            label: label.to_string(),
            format: day_format.to_string(),
            source,
        }
    })?;

    match (parsed.month(), parsed.day()) {
        (Some(month), Some(day)) => Ok((month, day)),
        _ => Err(LabelError::Incomplete(day_format.to_string())),
    }
}

/// Resolve a year-less `(month, day)` against `today` using the standard
/// inference window.
pub fn resolve_day_label(month: u32, day: u32, today: NaiveDate) -> Option<NaiveDate> {
    let year = infer_year(month, YEAR_INFERENCE_WINDOW_MONTHS, today);
    NaiveDate::from_ymd_opt(year, month, day)
}
