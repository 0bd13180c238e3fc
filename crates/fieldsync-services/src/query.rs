//! Query / filter layer over store snapshots.
//!
//! Filtering is pure and synchronous. [`FilterState`] holds the filter a UI
//! is editing: search text changes are debounced, every other change applies
//! immediately.

use chrono::{DateTime, Utc};
use fieldsync_core::constants::SEARCHABLE_METADATA_KEYS;
use fieldsync_core::models::{MediaItem, MediaType, SyncStatus};
use std::time::{Duration, Instant};

/// Ticket linkage predicate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TicketFilter {
    #[default]
    Any,
    /// Items with no ticket yet.
    Unassigned,
    Ticket(String),
}

impl TicketFilter {
    fn matches(&self, item: &MediaItem) -> bool {
        match self {
            TicketFilter::Any => true,
            TicketFilter::Unassigned => !item.is_assigned(),
            TicketFilter::Ticket(ticket) => item.ticket_id() == Some(ticket.as_str()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaFilter {
    pub media_type: Option<MediaType>,
    pub ticket: TicketFilter,
    pub sync_status: Option<SyncStatus>,
    /// Inclusive lower bound on `created_at`.
    pub created_from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `created_at`.
    pub created_to: Option<DateTime<Utc>>,
    /// Case-insensitive text matched against the file name and selected
    /// metadata fields.
    pub search: Option<String>,
}

impl MediaFilter {
    pub fn matches(&self, item: &MediaItem) -> bool {
        if let Some(media_type) = self.media_type {
            if item.media_type != media_type {
                return false;
            }
        }
        if !self.ticket.matches(item) {
            return false;
        }
        if let Some(status) = self.sync_status {
            if item.sync_status != status {
                return false;
            }
        }
        if let Some(from) = self.created_from {
            if item.created_at < from {
                return false;
            }
        }
        if let Some(to) = self.created_to {
            if item.created_at > to {
                return false;
            }
        }
        match self.search.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => matches_text(item, &needle.to_lowercase()),
            _ => true,
        }
    }

    /// Items matching the filter, in input order.
    pub fn apply(&self, items: &[MediaItem]) -> Vec<MediaItem> {
        items
            .iter()
            .filter(|item| self.matches(item))
            .cloned()
            .collect()
    }
}

fn matches_text(item: &MediaItem, needle: &str) -> bool {
    if item.file_name.to_lowercase().contains(needle) {
        return true;
    }
    SEARCHABLE_METADATA_KEYS.iter().any(|key| {
        item.metadata
            .get(*key)
            .is_some_and(|value| value.to_lowercase().contains(needle))
    })
}

/// Filter being edited, with debounced search.
#[derive(Debug, Clone)]
pub struct FilterState {
    applied: MediaFilter,
    pending_search: Option<(Option<String>, Instant)>,
    debounce: Duration,
}

impl FilterState {
    pub fn new(debounce: Duration) -> Self {
        Self {
            applied: MediaFilter::default(),
            pending_search: None,
            debounce,
        }
    }

    /// The filter currently in effect.
    pub fn current(&self) -> &MediaFilter {
        &self.applied
    }

    pub fn set_media_type(&mut self, media_type: Option<MediaType>) {
        self.applied.media_type = media_type;
    }

    pub fn set_ticket(&mut self, ticket: TicketFilter) {
        self.applied.ticket = ticket;
    }

    pub fn set_sync_status(&mut self, status: Option<SyncStatus>) {
        self.applied.sync_status = status;
    }

    pub fn set_date_range(&mut self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) {
        self.applied.created_from = from;
        self.applied.created_to = to;
    }

    pub fn set_search(&mut self, query: Option<String>) {
        self.set_search_at(query, Instant::now());
    }

    /// Record a search change typed at `now`. Each change restarts the
    /// debounce window.
    pub fn set_search_at(&mut self, query: Option<String>, now: Instant) {
        self.pending_search = Some((query, now));
    }

    /// When the pending search becomes due, if any.
    pub fn search_due_at(&self) -> Option<Instant> {
        self.pending_search
            .as_ref()
            .map(|(_, changed_at)| *changed_at + self.debounce)
    }

    pub fn poll(&mut self) -> bool {
        self.poll_at(Instant::now())
    }

    /// Apply the pending search if its debounce window has elapsed at `now`.
    /// Returns whether the filter changed.
    pub fn poll_at(&mut self, now: Instant) -> bool {
        match self.search_due_at() {
            Some(due) if now >= due => {}
            _ => return false,
        }
        match self.pending_search.take() {
            Some((query, _)) => {
                let changed = self.applied.search != query;
                self.applied.search = query;
                changed
            }
            None => false,
        }
    }

    /// Wait out the debounce window and apply the pending search.
    pub async fn settle(&mut self) -> bool {
        if let Some(due) = self.search_due_at() {
            tokio::time::sleep_until(tokio::time::Instant::from_std(due)).await;
        }
        self.poll()
    }

    pub fn apply(&self, items: &[MediaItem]) -> Vec<MediaItem> {
        self.applied.apply(items)
    }
}
