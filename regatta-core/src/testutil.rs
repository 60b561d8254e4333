//! Shared test doubles for the engine's collaborators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{RegattaError, RegattaResult};
use crate::event::EventDraft;
use crate::roster::{RosterBackend, RosterInfo};
use crate::settings::{CurrentEventProjection, SettingsMirror};
use crate::store::EventStore;
use crate::transport::ChatTransport;

pub fn make_draft(title: &str, start_at: DateTime<Utc>) -> EventDraft {
    EventDraft {
        title: title.to_string(),
        description: "A test event".to_string(),
        start_at,
        timezone: "Europe/Berlin".to_string(),
        join_url: Some("https://example.com/join".to_string()),
        payment_url: None,
    }
}

pub fn make_store(dir: &tempfile::TempDir) -> EventStore {
    EventStore::new(
        dir.path().join("events.json"),
        Box::new(crate::settings::NoopSettingsMirror),
    )
    .with_default_timezone("Europe/Berlin")
}

/// Mirror that records every pushed projection.
#[derive(Default)]
pub struct RecordingMirror {
    pushes: Mutex<Vec<Option<CurrentEventProjection>>>,
}

impl RecordingMirror {
    /// The most recent push, or `None` when nothing was pushed yet.
    pub fn last(&self) -> Option<Option<CurrentEventProjection>> {
        self.pushes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }
}

impl SettingsMirror for RecordingMirror {
    fn push(&self, current: Option<&CurrentEventProjection>) -> RegattaResult<()> {
        self.pushes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(current.cloned());
        Ok(())
    }
}

/// Roster backend double: a fixed chat list for every roster, an optional
/// extra listing, and call counters. Clones share state.
#[derive(Clone, Default)]
pub struct MockRoster {
    inner: Arc<MockRosterInner>,
}

#[derive(Default)]
struct MockRosterInner {
    chats: Mutex<Vec<i64>>,
    rosters: Mutex<Vec<RosterInfo>>,
    list_calls: AtomicUsize,
    link_calls: AtomicUsize,
    fail_listing: std::sync::atomic::AtomicBool,
}

impl MockRoster {
    pub fn with_chats(chats: Vec<i64>) -> Self {
        let roster = MockRoster::default();
        *roster.inner.chats.lock().unwrap_or_else(|e| e.into_inner()) = chats;
        roster
    }

    pub fn with_rosters(self, rosters: Vec<RosterInfo>) -> Self {
        *self.inner.rosters.lock().unwrap_or_else(|e| e.into_inner()) = rosters;
        self
    }

    pub fn with_failing_listing(self) -> Self {
        self.inner.fail_listing.store(true, Ordering::SeqCst);
        self
    }

    pub fn list_calls(&self) -> usize {
        self.inner.list_calls.load(Ordering::SeqCst)
    }

    pub fn link_calls(&self) -> usize {
        self.inner.link_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RosterBackend for MockRoster {
    async fn list_rosters(&self) -> RegattaResult<Vec<RosterInfo>> {
        self.inner.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.inner.fail_listing.load(Ordering::SeqCst) {
            return Err(RegattaError::Backend("listing unavailable".to_string()));
        }
        Ok(self
            .inner
            .rosters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }

    async fn get_roster(&self, _roster_ref: &str) -> RegattaResult<Vec<i64>> {
        Ok(self.inner.chats.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    async fn create_or_get_roster(&self, name: &str) -> RegattaResult<String> {
        Ok(name.to_string())
    }

    async fn roster_link(&self, roster_ref: &str) -> RegattaResult<String> {
        self.inner.link_calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("https://rosters.example/{}", roster_ref))
    }
}

/// Transport double recording every send, with optional per-chat failures.
#[derive(Default)]
pub struct MockTransport {
    sent: Mutex<Vec<(i64, String)>>,
    failing: Vec<i64>,
}

impl MockTransport {
    pub fn failing_for(failing: Vec<i64>) -> Self {
        MockTransport {
            sent: Mutex::new(Vec::new()),
            failing,
        }
    }

    pub fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    async fn send(&self, chat_id: i64, text: &str) -> RegattaResult<()> {
        if self.failing.contains(&chat_id) {
            return Err(RegattaError::Transport(format!("chat {} unreachable", chat_id)));
        }
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((chat_id, text.to_string()));
        Ok(())
    }
}
