//! Cached, paginated event index.
//!
//! Browsing UIs page through a merged view of the event store and the
//! roster backend's listing. Rebuilding that view hits a remote backend,
//! so it is cached and refreshed only when older than the staleness
//! window or explicitly invalidated by a mutation. The cache is advisory,
//! never authoritative: statuses of store-backed entries are re-derived
//! on every page read, and the snapshot is persisted so a process restart
//! doesn't force an immediate refresh.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{RegattaError, RegattaResult};
use crate::event::{classify_at, looks_like_event_ref, Event};
use crate::roster::RosterBackend;
use crate::settings::write_atomically;
use crate::store::EventStore;

pub const DEFAULT_PAGE_SIZE: usize = 5;

/// How old cached state may get before a read forces a refresh.
pub fn default_staleness() -> Duration {
    Duration::minutes(5)
}

/// One listing row: a point-in-time copy of an event plus roster
/// metadata. `event` is `None` for placeholder entries surfacing rosters
/// that have no matching event record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub event_id: String,
    pub roster_ref: String,
    pub event: Option<Event>,
}

/// The last-computed index snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexState {
    pub fetched_at: DateTime<Utc>,
    pub items: Vec<IndexEntry>,
}

/// One page of the index.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub items: Vec<IndexEntry>,
    pub total_pages: usize,
    pub total: usize,
    /// The page actually served after clamping into `[1, total_pages]`.
    pub page: usize,
}

pub struct EventIndexCache {
    store: Arc<EventStore>,
    roster: Arc<dyn RosterBackend>,
    snapshot_path: PathBuf,
    staleness: Duration,
    state: Mutex<Option<IndexState>>,
}

impl EventIndexCache {
    pub fn new(
        store: Arc<EventStore>,
        roster: Arc<dyn RosterBackend>,
        snapshot_path: impl Into<PathBuf>,
    ) -> Self {
        let snapshot_path = snapshot_path.into();
        let state = load_snapshot(&snapshot_path);
        EventIndexCache {
            store,
            roster,
            snapshot_path,
            staleness: default_staleness(),
            state: Mutex::new(state),
        }
    }

    pub fn with_staleness(mut self, staleness: Duration) -> Self {
        self.staleness = staleness;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Option<IndexState>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Rebuild the index: merge store records with the roster backend's
    /// listing, sort, stamp `fetched_at`, and persist the snapshot.
    ///
    /// Store errors propagate; a roster backend outage degrades to an
    /// events-only index with a warning.
    pub async fn refresh(&self, now: DateTime<Utc>) -> RegattaResult<()> {
        let mut events = self.store.list()?;
        events.sort_by(|a, b| {
            a.status
                .rank()
                .cmp(&b.status.rank())
                .then_with(|| b.start_at.cmp(&a.start_at))
                .then_with(|| a.title.to_lowercase().cmp(&b.title.to_lowercase()))
        });

        let rosters = match self.roster.list_rosters().await {
            Ok(rosters) => rosters,
            Err(err) => {
                warn!(error = %err, "roster listing unavailable, indexing events only");
                Vec::new()
            }
        };

        let mut items: Vec<IndexEntry> = Vec::with_capacity(events.len());
        let mut seen: std::collections::HashSet<String> = std::collections::HashSet::new();
        for event in events {
            seen.insert(event.roster_ref.clone());
            seen.insert(event.event_id.clone());
            items.push(IndexEntry {
                event_id: event.event_id.clone(),
                roster_ref: event.roster_ref.clone(),
                event: Some(event),
            });
        }

        // Rosters following the event naming convention but missing an
        // event record become placeholder rows at the end of the listing.
        let mut orphans: Vec<IndexEntry> = rosters
            .into_iter()
            .filter(|r| !seen.contains(&r.display_name) && !seen.contains(&r.roster_ref))
            .filter(|r| looks_like_event_ref(&r.display_name))
            .map(|r| IndexEntry {
                event_id: r.display_name,
                roster_ref: r.roster_ref,
                event: None,
            })
            .collect();
        orphans.sort_by(|a, b| a.event_id.cmp(&b.event_id));
        items.extend(orphans);

        let state = IndexState {
            fetched_at: now,
            items,
        };
        self.persist_snapshot(&state);
        *self.lock() = Some(state);
        Ok(())
    }

    /// Serve one page, refreshing first when no fresh state exists.
    ///
    /// Statuses of store-backed entries are re-derived at `now`; an empty
    /// index still reports a single (empty) page.
    pub async fn get_page(
        &self,
        page: usize,
        page_size: usize,
        now: DateTime<Utc>,
    ) -> RegattaResult<Page> {
        if self.needs_refresh(now) {
            self.refresh(now).await?;
        }

        let guard = self.lock();
        let state = guard
            .as_ref()
            .ok_or_else(|| RegattaError::Backend("index refresh yielded no state".to_string()))?;

        let page_size = if page_size == 0 { DEFAULT_PAGE_SIZE } else { page_size };
        let total = state.items.len();
        let total_pages = if total == 0 { 1 } else { total.div_ceil(page_size) };
        let page = page.clamp(1, total_pages);
        let start = (page - 1) * page_size;

        let boundary = self.store.boundary();
        let items: Vec<IndexEntry> = state
            .items
            .iter()
            .skip(start)
            .take(page_size)
            .cloned()
            .map(|mut entry| {
                if let Some(event) = &mut entry.event {
                    event.status = classify_at(event, now, boundary);
                }
                entry
            })
            .collect();

        Ok(Page {
            items,
            total_pages,
            total,
            page,
        })
    }

    /// Drop the cached state so the next read forces a refresh. Called by
    /// the engine after every store mutation.
    pub fn invalidate(&self) {
        *self.lock() = None;
    }

    /// Age of the cached state at `now`, if any.
    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.lock().as_ref().map(|s| s.fetched_at)
    }

    fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        match self.lock().as_ref() {
            None => true,
            Some(state) => now - state.fetched_at >= self.staleness,
        }
    }

    fn persist_snapshot(&self, state: &IndexState) {
        let result = serde_json::to_string_pretty(state)
            .map_err(|e| RegattaError::Serialization(e.to_string()))
            .and_then(|content| {
                if let Some(parent) = self.snapshot_path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                write_atomically(&self.snapshot_path, &content)
            });
        if let Err(err) = result {
            // The snapshot only saves a refresh after restart; losing it
            // is not worth failing the read path.
            warn!(error = %err, "failed to persist index snapshot");
        }
    }
}

fn load_snapshot(path: &std::path::Path) -> Option<IndexState> {
    if !path.exists() {
        return None;
    }
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            warn!(error = %err, "failed to read index snapshot");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(state) => Some(state),
        Err(err) => {
            warn!(error = %err, "failed to parse index snapshot");
            None
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
