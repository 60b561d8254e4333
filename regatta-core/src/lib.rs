//! Event lifecycle and reminder scheduling engine for the regatta
//! registration bot.
//!
//! The engine tracks a single live event at a time, keeps a cached
//! paginated index of all events, and schedules the time-triggered
//! notifications around an event's start: broadcast reminders for the
//! whole roster and personal reminders per registered chat.
//!
//! The chat transport, the participant roster storage and the settings
//! store are external collaborators behind traits; everything in this
//! crate is deterministic engine logic over them.

pub mod engine;
pub mod error;
pub mod event;
pub mod feedback;
pub mod index;
pub mod jobs;
pub mod messages;
pub mod personal;
pub mod roster;
pub mod scheduler;
pub mod settings;
pub mod store;
pub mod transport;

#[cfg(test)]
pub(crate) mod testutil;

pub use engine::Engine;
pub use error::{RegattaError, RegattaResult};
pub use event::{classify_at, Event, EventDraft, EventPatch, EventStatus, PastBoundary};
pub use feedback::FeedbackState;
pub use index::{EventIndexCache, IndexEntry, IndexState, Page};
pub use jobs::{JobKey, JobKind, JobRegistry};
pub use personal::PersonalReminderPlanner;
pub use roster::{ensure_roster_link, RosterBackend, RosterInfo};
pub use scheduler::ReminderScheduler;
pub use settings::{
    CurrentEventProjection, JsonSettingsMirror, NoopSettingsMirror, SettingsMirror,
};
pub use store::EventStore;
pub use transport::ChatTransport;
