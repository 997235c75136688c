//! Finds which local entries already exist on a ticket or task.
//!
//! The detail page lists every time entry as a "conversation": an author
//! line and a title that starts with the entry's date. Matching is done
//! against a snapshot of that list so the page is read exactly once.

use chrono::{Datelike, NaiveDate};

use crate::core::calendar::week_number;
use crate::core::entry::{EntryError, ScanId, TimeEntry, WeekPeer};

use super::page::{ElementRef, Page, UiError};
use super::selectors as sel;

/// One conversation element as read from the page.
#[derive(Debug, Clone)]
pub struct Conversation {
    pub element: ElementRef,
    pub author: String,
    pub title: String,
}

/// Snapshot of a parent item's conversation list.
#[derive(Debug, Clone)]
pub struct ConversationScan {
    pub id: ScanId,
    pub conversations: Vec<Conversation>,
}

impl ConversationScan {
    /// Read every conversation currently on the page. Conversations whose
    /// author or title can't be read are logged and left out.
    pub async fn capture<P: Page>(page: &P, id: ScanId) -> Result<Self, UiError> {
        let elements = page.locate_all(None, sel::CONVERSATION_DETAILS).await?;
        log::info!("Found {} conversations for {}", elements.len(), id.parent_id);

        let mut conversations = Vec::with_capacity(elements.len());
        for element in elements {
            match read_conversation(page, &element).await {
                Ok((author, title)) => conversations.push(Conversation {
                    element,
                    author,
                    title,
                }),
                Err(e) => log::warn!("Skipping unreadable conversation {}: {}", element.id(), e),
            }
        }

        Ok(Self { id, conversations })
    }

    /// The conversation a week peer points at.
    pub fn resolve(&self, peer: &WeekPeer) -> Result<&Conversation, EntryError> {
        if peer.scan != self.id {
            return Err(EntryError::StalePeer);
        }
        self.conversations
            .get(peer.conversation)
            .ok_or(EntryError::StalePeer)
    }
}

async fn read_conversation<P: Page>(
    page: &P,
    element: &ElementRef,
) -> Result<(String, String), UiError> {
    let author = super::page::locate_within(page, Some(element), sel::CONVERSATION_AUTHOR).await?;
    let title = super::page::locate_within(page, Some(element), sel::CONVERSATION_TITLE).await?;
    Ok((page.text(&author).await?, page.text(&title).await?))
}

/// The date a conversation title starts with, e.g. `2023/09/14 10:30 - 11:00`.
pub fn conversation_date(title: &str, date_format: &str) -> Result<NaiveDate, EntryError> {
    NaiveDate::parse_and_remainder(title.trim_start(), date_format)
        .map(|(date, _)| date)
        .map_err(|e| EntryError::Parse(format!("conversation date in {:?}: {}", title, e)))
}

/// Mark entries that already exist remotely and remember a same-week
/// conversation for each entry.
///
/// Only conversations by `display_name` count. For every entry the
/// conversations are scanned in page order: the first one in the same week
/// becomes the entry's week peer, and scanning stops as soon as one starts
/// with the entry's date. Nothing is written to the page.
pub fn mark_existing(
    entries: &mut [&mut TimeEntry],
    scan: &ConversationScan,
    display_name: &str,
    date_format: &str,
) {
    let candidates = own_conversations(scan, display_name, date_format);

    for entry in entries.iter_mut() {
        for &(index, title, week) in &candidates {
            if week == entry.week_key() && entry.week_peer.is_none() {
                entry.week_peer = Some(WeekPeer {
                    scan: scan.id,
                    conversation: index,
                });
            }

            if title.starts_with(entry.date_label()) {
                log::info!("Found existing entry for {} on {}", entry.id, entry.date_label());
                entry.exists = true;
                break;
            }
        }
    }
}

/// Point week peers at `scan`, a newer read of the same conversation list.
/// Existence flags are left as they are.
pub fn repoint_peers(
    entries: &mut [&mut TimeEntry],
    scan: &ConversationScan,
    display_name: &str,
    date_format: &str,
) {
    let candidates = own_conversations(scan, display_name, date_format);
    for entry in entries.iter_mut() {
        entry.week_peer = candidates
            .iter()
            .find(|&&(_, _, week)| week == entry.week_key())
            .map(|&(index, _, _)| WeekPeer {
                scan: scan.id,
                conversation: index,
            });
    }
}

/// (index into scan, title, (year, week)) of the user's own conversations.
fn own_conversations<'s>(
    scan: &'s ConversationScan,
    display_name: &str,
    date_format: &str,
) -> Vec<(usize, &'s str, (i32, u32))> {
    let display_name = display_name.trim();

    let mut candidates = Vec::new();
    for (index, conversation) in scan.conversations.iter().enumerate() {
        if conversation.author.trim() != display_name {
            continue;
        }
        match conversation_date(&conversation.title, date_format) {
            Ok(date) => candidates.push((
                index,
                conversation.title.trim_start(),
                (date.year(), week_number(date)),
            )),
            Err(e) => log::warn!("Skipping conversation {}: {}", index, e),
        }
    }

    log::debug!(
        "{} of {} conversations belong to {}",
        candidates.len(),
        scan.conversations.len(),
        display_name
    );
    candidates
}
