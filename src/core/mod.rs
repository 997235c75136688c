//! Local time records and the calendar arithmetic used to address them.

pub mod calendar;
pub mod entry;

pub use calendar::{infer_year, sunday_of_week, week_number};
pub use entry::{Category, EntryError, ScanId, TimeEntry, WeekPeer};
