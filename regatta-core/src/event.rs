//! Event records and lifecycle classification.
//!
//! An `Event` is one scheduled occurrence administered through the engine.
//! Status transitions are one-way: [`classify_at`] moves `Active` to
//! `Past` once the start instant passes, and neither `Past` nor
//! `Cancelled` is ever revisited. A recorded `Past` is authoritative even
//! for a future-dated event, so the store's forced transition on create
//! survives re-derivation.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Lifecycle status of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Active,
    Past,
    Cancelled,
}

impl EventStatus {
    /// Sort rank used by listings: active events first, cancelled last.
    pub fn rank(self) -> u8 {
        match self {
            EventStatus::Active => 0,
            EventStatus::Past => 1,
            EventStatus::Cancelled => 2,
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventStatus::Active => "active",
            EventStatus::Past => "past",
            EventStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// How the classify boundary treats an event at its exact start instant.
///
/// The comparison lives here and nowhere else, so changing the boundary is
/// a single configuration choice rather than an edge case scattered across
/// call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PastBoundary {
    /// `start_at <= now` means past: an event is past at its start instant.
    #[default]
    AtStart,
    /// `start_at < now` means past: an event is still active at its start
    /// instant.
    AfterStart,
}

impl PastBoundary {
    pub fn is_past(self, start_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self {
            PastBoundary::AtStart => start_at <= now,
            PastBoundary::AfterStart => start_at < now,
        }
    }
}

/// One scheduled occurrence administered through the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Stable `YYYY-MM-DD__<slug>` key, immutable after creation.
    pub event_id: String,
    pub title: String,
    pub description: String,
    /// Authoritative wall-clock instant. All temporal comparisons use this.
    pub start_at: DateTime<Utc>,
    /// IANA zone name used to render `start_at` for humans. Informational
    /// only; an unparseable name falls back to UTC at render time.
    pub timezone: String,
    pub join_url: Option<String>,
    pub payment_url: Option<String>,
    /// Opaque handle to the external participant roster for this event.
    pub roster_ref: String,
    /// Lazily-resolved cached URL to the roster resource.
    pub roster_link: Option<String>,
    /// Lifecycle status. `Past` and `Cancelled` are terminal once
    /// recorded; only `Active` is re-derived against the clock on reads.
    pub status: EventStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// The event's rendering zone, falling back to UTC when the stored
    /// name is not a valid IANA zone.
    pub fn zone(&self) -> Tz {
        self.timezone.parse().unwrap_or(chrono_tz::UTC)
    }

    /// Start instant rendered in the event's own zone.
    pub fn start_local(&self) -> DateTime<Tz> {
        self.start_at.with_timezone(&self.zone())
    }
}

/// Fields required to create a new event.
#[derive(Debug, Clone)]
pub struct EventDraft {
    pub title: String,
    pub description: String,
    pub start_at: DateTime<Utc>,
    pub timezone: String,
    pub join_url: Option<String>,
    pub payment_url: Option<String>,
}

/// Partial update for an event. `None` means "keep the stored value".
///
/// `event_id` and `status` are present only so the store can reject
/// attempts to set them: the id is immutable after creation, and status
/// is derived state (cancellation goes through [`EventStore::cancel`]).
///
/// [`EventStore::cancel`]: crate::store::EventStore::cancel
#[derive(Debug, Clone, Default)]
pub struct EventPatch {
    pub event_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_at: Option<DateTime<Utc>>,
    pub timezone: Option<String>,
    pub join_url: Option<String>,
    pub payment_url: Option<String>,
    pub roster_ref: Option<String>,
    pub roster_link: Option<String>,
    pub status: Option<EventStatus>,
}

/// Classify an event's lifecycle status at `now`.
///
/// Pure and deterministic. `Past` and `Cancelled` are terminal and
/// short-circuit regardless of `start_at`; only an `Active` event is
/// subject to the boundary comparison of `now` against the absolute
/// start instant.
pub fn classify_at(event: &Event, now: DateTime<Utc>, boundary: PastBoundary) -> EventStatus {
    match event.status {
        EventStatus::Cancelled => EventStatus::Cancelled,
        EventStatus::Past => EventStatus::Past,
        EventStatus::Active => {
            if boundary.is_past(event.start_at, now) {
                EventStatus::Past
            } else {
                EventStatus::Active
            }
        }
    }
}

/// Generate a collision-free event id of the form `YYYY-MM-DD__<slug>`,
/// suffixing `-2`, `-3`, ... while the candidate is taken.
pub fn generate_event_id(
    title: &str,
    start_local: DateTime<Tz>,
    existing: &HashSet<String>,
) -> String {
    let mut slug = slug::slugify(title);
    if slug.is_empty() {
        slug = "event".to_string();
    }
    let base = format!("{}__{}", start_local.format("%Y-%m-%d"), slug);

    if !existing.contains(&base) {
        return base;
    }
    let mut suffix = 2;
    loop {
        let candidate = format!("{}-{}", base, suffix);
        if !existing.contains(&candidate) {
            return candidate;
        }
        suffix += 1;
    }
}

/// Whether a roster display name follows the event-ref naming convention
/// (`YYYY-MM-DD__slug` with an optional `-N` suffix). Rosters that don't
/// match are unrelated sheets and never surface as index placeholders.
pub fn looks_like_event_ref(name: &str) -> bool {
    let Some((date_part, rest)) = name.split_once("__") else {
        return false;
    };
    if NaiveDate::parse_from_str(date_part, "%Y-%m-%d").is_err() {
        return false;
    }
    !rest.is_empty()
        && rest
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

// =============================================================================
// Tests
// =============================================================================
