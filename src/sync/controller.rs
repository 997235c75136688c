use crate::core::entry::{self, Category, EntryError, ScanId, TimeEntry};

use super::capture::{CaptureOptions, capture_week};
use super::matcher::{self, ConversationScan};
use super::page::{self, Page, UiError};
use super::selectors as sel;
use super::{Cancellation, SessionContext};

/// Outcome of one import run, per parent item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportResult {
    /// Parent items opened and matched (and captured, unless dry run).
    pub processed: usize,
    /// Parent items that could not be opened or read.
    pub failed: usize,
    /// Parent items skipped because the run was cancelled.
    pub cancelled: usize,
    /// One line per failed parent item.
    pub errors: Vec<String>,
}

/// Drives a batch of entries through the service, one parent item at a time.
pub struct Controller<'a, P: Page> {
    page: &'a P,
    session: SessionContext,
    options: CaptureOptions,
    cancel: Cancellation,
    generation: u64,
}

impl<'a, P: Page> Controller<'a, P> {
    pub fn new(
        page: &'a P,
        session: SessionContext,
        options: CaptureOptions,
        cancel: Cancellation,
    ) -> Self {
        Self {
            page,
            session,
            options,
            cancel,
            generation: 0,
        }
    }

    /// Process all entries: tickets first, then tasks. Results are written
    /// back onto the entries; a failing parent never stops the batch.
    pub async fn run(&mut self, entries: &mut [TimeEntry]) -> ImportResult {
        let mut result = ImportResult::default();
        let (mut tickets, mut tasks) = entry::split_by_category(entries);

        log::info!(
            "Importing {} ticket and {} task entries{}",
            tickets.len(),
            tasks.len(),
            if self.options.dry_run { " (dry run)" } else { "" }
        );

        self.run_category(Category::Ticket, &mut tickets, &mut result)
            .await;
        self.run_category(Category::Task, &mut tasks, &mut result)
            .await;

        log::info!(
            "Import complete: {} processed, {} failed, {} cancelled",
            result.processed,
            result.failed,
            result.cancelled
        );
        result
    }

    async fn run_category(
        &mut self,
        category: Category,
        entries: &mut [&mut TimeEntry],
        result: &mut ImportResult,
    ) {
        let ids = entry::distinct_ids(entries.iter().map(|e| &**e));

        for id in ids {
            let mut parent = entry::by_id(entries, id);

            if self.cancel.is_cancelled() {
                log::info!("Cancelled, skipping {} {}", category, id);
                for e in parent.iter_mut().filter(|e| e.is_pending()) {
                    e.fail(EntryError::Cancelled);
                }
                result.cancelled += 1;
                continue;
            }

            match self.process_parent(category, id, &mut parent).await {
                Ok(()) => result.processed += 1,
                Err(e) => {
                    log::error!("Could not process {} {}: {}", category, id, e);
                    let error = EntryError::ParentUnavailable {
                        category,
                        id,
                        reason: e.to_string(),
                    };
                    for entry in parent.iter_mut().filter(|e| e.is_pending()) {
                        entry.fail(error.clone());
                    }
                    result.failed += 1;
                    result.errors.push(error.to_string());
                }
            }
        }
    }

    async fn process_parent(
        &mut self,
        category: Category,
        id: u64,
        parent: &mut [&mut TimeEntry],
    ) -> Result<(), UiError> {
        let url = self.session.detail_url(category, id);
        log::info!("Opening {} {} ({} entries)", category, id, parent.len());
        self.page.goto(&url).await?;

        match self
            .page
            .wait_for_load_idle(self.options.timeouts.load_idle())
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_timeout() => {
                log::warn!("{} {} still loading, reading what is there", category, id)
            }
            Err(e) => return Err(e),
        }

        if matches!(page::is_visible(self.page, sel::ALERT_DIALOG).await, Ok(true)) {
            log::debug!("Dismissing alert on {} {}", category, id);
            if let Err(e) = page::click_selector(self.page, sel::ALERT_OK).await {
                log::warn!("Could not dismiss alert: {}", e);
            }
        }

        let mut scan = self.scan(id).await?;
        matcher::mark_existing(
            parent,
            &scan,
            &self.options.display_name,
            &self.options.date_format,
        );

        if self.options.dry_run {
            log::info!("Dry run, not capturing {} {}", category, id);
            return Ok(());
        }

        let mut list_changed = false;
        for ((year, week), group) in entry::group_by_week(parent).iter_mut() {
            let pending = group.iter().any(|e| e.is_pending());

            // A saved timesheet re-renders the conversation list, so peers
            // from the earlier scan point at elements that are gone.
            if pending && list_changed && category == Category::Task {
                self.page.pause(self.options.timeouts.settle()).await;
                scan = self.scan(id).await?;
                matcher::repoint_peers(
                    group,
                    &scan,
                    &self.options.display_name,
                    &self.options.date_format,
                );
            }

            log::debug!("{} {}: week {} of {}, {} entries", category, id, week, year, group.len());
            capture_week(self.page, group, &scan, &self.options).await;
            list_changed |= pending;
        }

        Ok(())
    }

    /// Read the conversation list under a new scan id.
    async fn scan(&mut self, id: u64) -> Result<ConversationScan, UiError> {
        self.generation += 1;
        let scan_id = ScanId {
            parent_id: id,
            generation: self.generation,
        };
        ConversationScan::capture(self.page, scan_id).await
    }
}
