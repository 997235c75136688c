//! Plain-text summary of an import run.

use std::fmt::Write;

use crate::core::entry::TimeEntry;

const PROJECT_WIDTH: usize = 45;

fn yes_no(flag: bool) -> &'static str {
    if flag { "Y" } else { "N" }
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Entries in the order the summary shows them: by date, then start time.
fn sorted(entries: &[TimeEntry]) -> Vec<&TimeEntry> {
    let mut rows: Vec<&TimeEntry> = entries.iter().collect();
    rows.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| a.start_time.cmp(&b.start_time))
    });
    rows
}

/// The summary table followed by one line per failed entry.
pub fn render(entries: &[TimeEntry]) -> String {
    let mut out = String::new();
    let rows = sorted(entries);

    let _ = writeln!(
        out,
        "{:>3}  {:>8}  {}  {:<10}  {:<5}  {:>6}  {}  {}  {}  {}",
        "#", "ID", "T", "Date", "Start", "Hrs", "EXS", "SAV", "ERR", "Project"
    );
    let _ = writeln!(out, "{}", "-".repeat(78));

    let mut total = 0.0;
    for (i, e) in rows.iter().enumerate() {
        total += e.duration_hours;
        let _ = writeln!(
            out,
            "{:>3}  {:>8}  {}  {:<10}  {:<5}  {:>6.2}  {:^3}  {:^3}  {:^3}  {}",
            i + 1,
            e.id,
            e.category.marker(),
            e.date_label(),
            e.start_time,
            e.duration_hours,
            yes_no(e.exists),
            yes_no(e.submitted),
            if e.error.is_some() { "Y" } else { "" },
            truncate(&e.project, PROJECT_WIDTH)
        );
    }

    let _ = writeln!(out, "{}", "-".repeat(78));
    let _ = writeln!(out, "{:>34}  {:>6.2}", "Total", total);

    let failed: Vec<&&TimeEntry> = rows.iter().filter(|e| e.error.is_some()).collect();
    if !failed.is_empty() {
        let _ = writeln!(out, "\nErrors:");
        for e in failed {
            if let Some(error) = &e.error {
                let _ = writeln!(
                    out,
                    "  {} {} {} {}: {}",
                    e.category, e.id, e.date_label(), e.start_time, error
                );
            }
        }
    }

    out
}

pub fn has_errors(entries: &[TimeEntry]) -> bool {
    entries.iter().any(|e| e.error.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entry::{Category, EntryError};
    use chrono::NaiveDate;

    fn entry(id: u64, d: u32, start: &str, hours: f64) -> TimeEntry {
        let date = NaiveDate::from_ymd_opt(2023, 9, d).unwrap();
        TimeEntry::new(id, Category::Ticket, date, start, hours, "work", "%Y/%m/%d")
    }

    #[test]
    fn rows_sorted_with_total() {
        let mut entries = vec![
            entry(3, 14, "09:00", 1.0),
            entry(1, 13, "15:00", 0.5),
            entry(2, 13, "08:00", 0.25),
        ];
        entries[0].exists = true;
        entries[1].submitted = true;

        let out = render(&entries);
        let lines: Vec<&str> = out.lines().collect();

        assert!(lines[0].contains("EXS"));
        assert!(lines[2].contains("2023/09/13") && lines[2].contains("08:00"));
        assert!(lines[3].contains("15:00"));
        assert!(lines[4].contains("2023/09/14"));
        assert!(lines[6].contains("Total") && lines[6].ends_with("1.75"));
        assert!(!out.contains("Errors:"));
    }

    #[test]
    fn errors_listed() {
        let mut entries = vec![entry(7, 13, "10:00", 1.0)];
        let day = entries[0].date;
        entries[0].fail(EntryError::MultipleEntriesForDay(day));

        let out = render(&entries);
        assert!(out.contains("Errors:"));
        assert!(out.contains("ticket 7 2023/09/13 10:00: more than one entry for 2023-09-13"));
        assert!(has_errors(&entries));
    }

    #[test]
    fn long_project_truncated() {
        let mut e = entry(1, 13, "10:00", 1.0);
        e.project = "x".repeat(80);
        let out = render(&[e]);
        assert!(out.contains(&"x".repeat(PROJECT_WIDTH)));
        assert!(!out.contains(&"x".repeat(PROJECT_WIDTH + 1)));
    }
}
