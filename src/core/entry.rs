use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;

use chrono::{DateTime, Datelike, NaiveDate};
use serde::{Deserialize, Deserializer};

use super::calendar::week_number;

/// Which kind of remote item an entry belongs to. Tickets and tasks live in
/// different parts of the service and use different capture dialogs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Ticket,
    Task,
}

impl Category {
    /// Short marker used in the summary table.
    pub fn marker(&self) -> &'static str {
        match self {
            Self::Ticket => "S",
            Self::Task => "P",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ticket => write!(f, "ticket"),
            Self::Task => write!(f, "task"),
        }
    }
}

/// Identifies one read of a parent item's conversation list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScanId {
    pub parent_id: u64,
    pub generation: u64,
}

/// Back-reference to a remote conversation for the same parent and week.
///
/// Only meaningful against the scan that produced it; resolving it against
/// any other scan fails instead of pointing at the wrong element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekPeer {
    pub scan: ScanId,
    pub conversation: usize,
}

/// Why an entry could not be captured.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntryError {
    #[error("could not parse {0}")]
    Parse(String),

    #[error("week starting {0} not found in the calendar")]
    WeekNotFound(NaiveDate),

    #[error("more than one entry for {0}")]
    MultipleEntriesForDay(NaiveDate),

    #[error("{0}")]
    Ui(String),

    #[error("{category} {id} unavailable: {reason}")]
    ParentUnavailable {
        category: Category,
        id: u64,
        reason: String,
    },

    #[error("week peer belongs to a different conversation scan")]
    StalePeer,

    #[error("cancelled before processing")]
    Cancelled,
}

/// A single local time record and what happened to it.
#[derive(Debug, Clone)]
pub struct TimeEntry {
    pub id: u64,
    pub category: Category,
    pub date: NaiveDate,
    pub start_time: String,
    pub duration_hours: f64,
    pub summary: String,
    pub project: String,

    // Derived at construction
    date_label: String,
    week_number: u32,
    hours_part: u32,
    minutes_part: u32,

    // Outcome
    pub exists: bool,
    pub submitted: bool,
    pub week_peer: Option<WeekPeer>,
    pub error: Option<EntryError>,
}

impl TimeEntry {
    /// Build an entry, rendering its date with `date_format` the way the
    /// remote service displays dates.
    pub fn new(
        id: u64,
        category: Category,
        date: NaiveDate,
        start_time: impl Into<String>,
        duration_hours: f64,
        summary: impl Into<String>,
        date_format: &str,
    ) -> Self {
        let duration_hours = duration_hours.max(0.0);
        let (hours_part, minutes_part) = split_duration(duration_hours);
        Self {
            id,
            category,
            date,
            start_time: start_time.into(),
            duration_hours,
            summary: summary.into(),
            project: String::new(),
            date_label: date.format(date_format).to_string(),
            week_number: week_number(date),
            hours_part,
            minutes_part,
            exists: false,
            submitted: false,
            week_peer: None,
            error: None,
        }
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = project.into();
        self
    }

    pub fn from_record(record: EntryRecord, date_format: &str) -> Self {
        let category = if record.is_ticket {
            Category::Ticket
        } else {
            Category::Task
        };
        Self::new(
            record.id,
            category,
            record.date,
            record.start_time,
            record.duration,
            record.summary,
            date_format,
        )
        .with_project(record.project)
    }

    /// The date as the remote service renders it.
    pub fn date_label(&self) -> &str {
        &self.date_label
    }

    pub fn week_number(&self) -> u32 {
        self.week_number
    }

    /// `(year, week number)`; equal week numbers of different years differ here.
    pub fn week_key(&self) -> (i32, u32) {
        (self.date.year(), self.week_number)
    }

    pub fn hours_part(&self) -> u32 {
        self.hours_part
    }

    pub fn minutes_part(&self) -> u32 {
        self.minutes_part
    }

    /// Whether the engine may still touch this entry in the remote UI.
    pub fn is_pending(&self) -> bool {
        !self.exists && !self.submitted && self.error.is_none()
    }

    /// Attach an error, keeping the first one if several occur.
    pub fn fail(&mut self, error: EntryError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }
}

fn split_duration(hours: f64) -> (u32, u32) {
    let whole = hours.trunc();
    let minutes = ((hours - whole) * 60.0).round() as u32;
    if minutes >= 60 {
        (whole as u32 + 1, minutes - 60)
    } else {
        (whole as u32, minutes)
    }
}

/// One record of the import file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryRecord {
    pub id: u64,
    pub is_ticket: bool,
    #[serde(deserialize_with = "deserialize_date")]
    pub date: NaiveDate,
    #[serde(default)]
    pub start_time: String,
    pub duration: f64,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub project: String,
}

/// Accepts `2023-09-14` or a full RFC 3339 timestamp, in which case the
/// calendar date in the timestamp's own offset is used.
fn deserialize_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(date) = NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
        return Ok(date);
    }
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.date_naive())
        .map_err(|e| serde::de::Error::custom(format!("invalid date {:?}: {}", raw, e)))
}

/// Errors reading the import file.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("file does not exist: {0}")]
    Missing(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid entries: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn parse_entries(json: &str, date_format: &str) -> Result<Vec<TimeEntry>, LoadError> {
    let records: Vec<EntryRecord> = serde_json::from_str(json)?;
    Ok(records
        .into_iter()
        .map(|r| TimeEntry::from_record(r, date_format))
        .collect())
}

pub fn load_entries(path: &Path, date_format: &str) -> Result<Vec<TimeEntry>, LoadError> {
    if !path.exists() {
        return Err(LoadError::Missing(path.display().to_string()));
    }
    let content = std::fs::read_to_string(path)?;
    log::info!("Read {} bytes of entries from {}", content.len(), path.display());
    parse_entries(&content, date_format)
}

// Collection views

/// Distinct parent ids in first-seen order.
pub fn distinct_ids<'a>(entries: impl IntoIterator<Item = &'a TimeEntry>) -> Vec<u64> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|e| seen.insert(e.id))
        .map(|e| e.id)
        .collect()
}

/// Split into `(tickets, tasks)`, preserving input order within each.
pub fn split_by_category(
    entries: &mut [TimeEntry],
) -> (Vec<&mut TimeEntry>, Vec<&mut TimeEntry>) {
    entries
        .iter_mut()
        .partition(|e| e.category == Category::Ticket)
}

/// Entries belonging to one parent id.
pub fn by_id<'a>(entries: &'a mut [&mut TimeEntry], id: u64) -> Vec<&'a mut TimeEntry> {
    entries
        .iter_mut()
        .filter(|e| e.id == id)
        .map(|e| &mut **e)
        .collect()
}

/// Group entries by `(year, week number)`. Groups come out in chronological
/// order, and every member of a group shares the same Sunday.
pub fn group_by_week<'a>(
    entries: &'a mut [&mut TimeEntry],
) -> BTreeMap<(i32, u32), Vec<&'a mut TimeEntry>> {
    let mut groups: BTreeMap<(i32, u32), Vec<&'a mut TimeEntry>> = BTreeMap::new();
    for entry in entries.iter_mut() {
        let key = entry.week_key();
        groups.entry(key).or_default().push(&mut **entry);
    }
    groups
}

/// Positions of the entries dated `date`.
pub fn on_date(entries: &[&mut TimeEntry], date: NaiveDate) -> Vec<usize> {
    entries
        .iter()
        .enumerate()
        .filter(|(_, e)| e.date == date)
        .map(|(i, _)| i)
        .collect()
}
