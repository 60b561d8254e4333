//! Durable event storage.
//!
//! The store owns a single JSON document `{current_event_id, events}` and
//! every mutation of `Event` records goes through it. Reads classify
//! statuses on the fly and never write; the persisted `status` field is
//! only refreshed by [`EventStore::reconcile`] and by the mutation paths,
//! which call it before saving anyway.
//!
//! The store deliberately enforces a single-live-event policy: creating a
//! new event force-pastes every non-cancelled prior event. Callers that
//! need downstream effects (reminder re-planning, index invalidation)
//! sequence them after the mutation; the store itself owns no scheduling.

use std::collections::HashSet;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{RegattaError, RegattaResult};
use crate::event::{
    classify_at, generate_event_id, Event, EventDraft, EventPatch, EventStatus, PastBoundary,
};
use crate::settings::{write_atomically, CurrentEventProjection, SettingsMirror};

/// Persisted layout of the events document.
#[derive(Debug, Default, Serialize, Deserialize)]
struct EventsDoc {
    current_event_id: Option<String>,
    events: Vec<Event>,
}

pub struct EventStore {
    path: PathBuf,
    mirror: Box<dyn SettingsMirror>,
    default_timezone: String,
    boundary: PastBoundary,
}

impl EventStore {
    pub fn new(path: impl Into<PathBuf>, mirror: Box<dyn SettingsMirror>) -> Self {
        EventStore {
            path: path.into(),
            mirror,
            default_timezone: "UTC".to_string(),
            boundary: PastBoundary::default(),
        }
    }

    /// Zone applied when an event draft carries an unknown IANA name.
    pub fn with_default_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.default_timezone = timezone.into();
        self
    }

    pub fn with_boundary(mut self, boundary: PastBoundary) -> Self {
        self.boundary = boundary;
        self
    }

    pub fn boundary(&self) -> PastBoundary {
        self.boundary
    }

    // =========================================================================
    // Document I/O
    // =========================================================================

    fn load_doc(&self) -> RegattaResult<EventsDoc> {
        if !self.path.exists() {
            return Ok(EventsDoc::default());
        }
        let raw = std::fs::read_to_string(&self.path)?;
        serde_json::from_str(&raw).map_err(|e| RegattaError::Serialization(e.to_string()))
    }

    fn save_doc(&self, doc: &EventsDoc) -> RegattaResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(doc)
            .map_err(|e| RegattaError::Serialization(e.to_string()))?;
        write_atomically(&self.path, &content)
    }

    /// Refresh the cached `status` fields in a loaded document. Returns
    /// whether anything changed, so callers can skip needless writes.
    fn reconcile_doc(&self, doc: &mut EventsDoc, now: DateTime<Utc>) -> bool {
        let mut changed = false;
        for event in &mut doc.events {
            let computed = classify_at(event, now, self.boundary);
            if event.status != computed {
                event.status = computed;
                event.updated_at = now;
                changed = true;
            }
        }
        changed
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Create a new event and make it current.
    ///
    /// Any existing non-cancelled event is transitioned to `past` first:
    /// the system supports exactly one live event at a time.
    pub fn create(&self, draft: EventDraft) -> RegattaResult<Event> {
        let now = Utc::now();
        let mut doc = self.load_doc()?;
        self.reconcile_doc(&mut doc, now);

        for existing in &mut doc.events {
            if existing.status == EventStatus::Active {
                existing.status = EventStatus::Past;
                existing.updated_at = now;
            }
        }

        let timezone = match draft.timezone.parse::<Tz>() {
            Ok(_) => draft.timezone,
            Err(_) => self.default_timezone.clone(),
        };
        let zone: Tz = timezone.parse().unwrap_or(chrono_tz::UTC);

        let existing_ids: HashSet<String> =
            doc.events.iter().map(|e| e.event_id.clone()).collect();
        let event_id =
            generate_event_id(&draft.title, draft.start_at.with_timezone(&zone), &existing_ids);

        let event = Event {
            event_id: event_id.clone(),
            title: draft.title,
            description: draft.description,
            start_at: draft.start_at,
            timezone,
            join_url: draft.join_url,
            payment_url: draft.payment_url,
            roster_ref: event_id.clone(),
            roster_link: None,
            status: EventStatus::Active,
            created_at: now,
            updated_at: now,
        };

        doc.events.push(event.clone());
        doc.current_event_id = Some(event_id);
        self.save_doc(&doc)?;
        self.mirror.push(Some(&CurrentEventProjection::from_event(&event)))?;
        Ok(event)
    }

    /// Fetch a single event with a freshly classified status.
    pub fn get(&self, event_id: &str) -> RegattaResult<Event> {
        let doc = self.load_doc()?;
        let now = Utc::now();
        doc.events
            .into_iter()
            .find(|e| e.event_id == event_id)
            .map(|mut event| {
                event.status = classify_at(&event, now, self.boundary);
                event
            })
            .ok_or_else(|| RegattaError::NotFound(event_id.to_string()))
    }

    /// Merge the provided patch fields into an event.
    ///
    /// Rejects patches that set `event_id` (immutable) or `status`
    /// (derived state; cancellation goes through [`EventStore::cancel`],
    /// which also maintains the current pointer and the mirror).
    pub fn update(&self, event_id: &str, patch: EventPatch) -> RegattaResult<Event> {
        if patch.event_id.is_some() {
            return Err(RegattaError::InvalidTransition(
                "event_id is immutable and cannot be set on update".to_string(),
            ));
        }
        if patch.status.is_some() {
            return Err(RegattaError::InvalidTransition(
                "status cannot be set on update; cancel the event instead".to_string(),
            ));
        }

        let now = Utc::now();
        let mut doc = self.load_doc()?;
        let idx = doc
            .events
            .iter()
            .position(|e| e.event_id == event_id)
            .ok_or_else(|| RegattaError::NotFound(event_id.to_string()))?;

        {
            let event = &mut doc.events[idx];
            if let Some(title) = patch.title {
                event.title = title;
            }
            if let Some(description) = patch.description {
                event.description = description;
            }
            if let Some(start_at) = patch.start_at {
                event.start_at = start_at;
            }
            if let Some(timezone) = patch.timezone {
                event.timezone = timezone;
            }
            if let Some(join_url) = patch.join_url {
                event.join_url = Some(join_url);
            }
            if let Some(payment_url) = patch.payment_url {
                event.payment_url = Some(payment_url);
            }
            if let Some(roster_ref) = patch.roster_ref {
                event.roster_ref = roster_ref;
            }
            if let Some(roster_link) = patch.roster_link {
                event.roster_link = Some(roster_link);
            }
            event.updated_at = now;
        }

        self.reconcile_doc(&mut doc, now);
        self.save_doc(&doc)?;

        let event = doc.events[idx].clone();
        if doc.current_event_id.as_deref() == Some(event_id) {
            self.mirror.push(Some(&CurrentEventProjection::from_event(&event)))?;
        }
        Ok(event)
    }

    /// Cancel an event. Terminal and idempotent; clears the current-event
    /// pointer when the cancelled event was current.
    pub fn cancel(&self, event_id: &str) -> RegattaResult<()> {
        let now = Utc::now();
        let mut doc = self.load_doc()?;
        let event = doc
            .events
            .iter_mut()
            .find(|e| e.event_id == event_id)
            .ok_or_else(|| RegattaError::NotFound(event_id.to_string()))?;

        if event.status != EventStatus::Cancelled {
            event.status = EventStatus::Cancelled;
            event.updated_at = now;
        }

        let was_current = doc.current_event_id.as_deref() == Some(event_id);
        if was_current {
            doc.current_event_id = None;
        }
        self.save_doc(&doc)?;
        if was_current {
            self.mirror.push(None)?;
        }
        Ok(())
    }

    /// Resolve the current event.
    ///
    /// Returns the pointed-to event when it is still active; otherwise
    /// falls back to the earliest-starting active event, and `None` when
    /// no event is active.
    pub fn current(&self) -> RegattaResult<Option<Event>> {
        let doc = self.load_doc()?;
        let now = Utc::now();

        if let Some(current_id) = doc.current_event_id.as_deref() {
            if let Some(event) = doc.events.iter().find(|e| e.event_id == current_id) {
                if classify_at(event, now, self.boundary) == EventStatus::Active {
                    let mut event = event.clone();
                    event.status = EventStatus::Active;
                    return Ok(Some(event));
                }
            }
        }

        let mut active: Vec<Event> = doc
            .events
            .into_iter()
            .filter(|e| classify_at(e, now, self.boundary) == EventStatus::Active)
            .collect();
        active.sort_by(|a, b| {
            a.start_at
                .cmp(&b.start_at)
                .then_with(|| a.event_id.cmp(&b.event_id))
        });
        Ok(active.into_iter().next().map(|mut event| {
            event.status = EventStatus::Active;
            event
        }))
    }

    /// Point the store at a different event (or clear the pointer) and
    /// push the matching settings projection.
    pub fn set_current(&self, event_id: Option<&str>) -> RegattaResult<()> {
        let mut doc = self.load_doc()?;
        let projection = match event_id {
            Some(id) => {
                let event = doc
                    .events
                    .iter()
                    .find(|e| e.event_id == id)
                    .ok_or_else(|| RegattaError::NotFound(id.to_string()))?;
                Some(CurrentEventProjection::from_event(event))
            }
            None => None,
        };
        doc.current_event_id = event_id.map(str::to_string);
        self.save_doc(&doc)?;
        self.mirror.push(projection.as_ref())?;
        Ok(())
    }

    /// All events with freshly classified statuses, in stored order.
    pub fn list(&self) -> RegattaResult<Vec<Event>> {
        let doc = self.load_doc()?;
        let now = Utc::now();
        Ok(doc
            .events
            .into_iter()
            .map(|mut event| {
                event.status = classify_at(&event, now, self.boundary);
                event
            })
            .collect())
    }

    /// A sorted, filtered page of events straight from the store.
    ///
    /// Sorted by `(status rank, newest start first, title)`, the same
    /// order the index uses; `page` is clamped into the valid range and
    /// an empty result still reports one page.
    pub fn list_page(
        &self,
        page: usize,
        page_size: usize,
        status_filter: Option<&[EventStatus]>,
    ) -> RegattaResult<(Vec<Event>, usize, usize)> {
        let mut events = self.list()?;
        if let Some(allowed) = status_filter {
            events.retain(|e| allowed.contains(&e.status));
        }
        events.sort_by(|a, b| {
            a.status
                .rank()
                .cmp(&b.status.rank())
                .then_with(|| b.start_at.cmp(&a.start_at))
                .then_with(|| a.title.to_lowercase().cmp(&b.title.to_lowercase()))
        });

        let page_size = if page_size == 0 { 5 } else { page_size };
        let total = events.len();
        let total_pages = if total == 0 { 1 } else { total.div_ceil(page_size) };
        let page = page.clamp(1, total_pages);
        let start = (page - 1) * page_size;
        let items = events.into_iter().skip(start).take(page_size).collect();
        Ok((items, total_pages, total))
    }

    /// Explicit write path refreshing the persisted status cache. Writes
    /// only when a computed status differs from the stored one.
    pub fn reconcile(&self) -> RegattaResult<bool> {
        let mut doc = self.load_doc()?;
        let changed = self.reconcile_doc(&mut doc, Utc::now());
        if changed {
            self.save_doc(&doc)?;
        }
        Ok(changed)
    }
}

// =============================================================================
// Tests
// =============================================================================
