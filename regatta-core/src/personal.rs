//! Per-participant reminder planning.
//!
//! Personal jobs are keyed by `(event, chat)` and cover only the two
//! lead-up reminders; the at-start and feedback broadcasts are handled by
//! the global scheduler. A participant may unregister between scheduling
//! and firing, so the firing callback re-checks roster membership and
//! treats a missing chat as a silent no-op.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::error::RegattaResult;
use crate::event::EventStatus;
use crate::jobs::{JobKey, JobKind, JobRegistry};
use crate::messages;
use crate::roster::RosterBackend;
use crate::store::EventStore;
use crate::transport::ChatTransport;

pub struct PersonalReminderPlanner {
    store: Arc<EventStore>,
    registry: Arc<JobRegistry>,
    roster: Arc<dyn RosterBackend>,
    transport: Arc<dyn ChatTransport>,
}

impl PersonalReminderPlanner {
    pub fn new(
        store: Arc<EventStore>,
        roster: Arc<dyn RosterBackend>,
        transport: Arc<dyn ChatTransport>,
    ) -> Self {
        PersonalReminderPlanner {
            store,
            registry: Arc::new(JobRegistry::new()),
            roster,
            transport,
        }
    }

    /// Schedule the lead-up reminders for one chat, replacing any jobs
    /// already keyed to `(event, chat)`. Does nothing for events that are
    /// not active or have already started; each reminder is skipped
    /// individually when its fire time has passed. Returns how many jobs
    /// were scheduled.
    pub fn plan_for(self: &Arc<Self>, event_id: &str, chat_id: i64) -> RegattaResult<usize> {
        self.registry.cancel_participant(event_id, chat_id);

        let event = self.store.get(event_id)?;
        let now = Utc::now();
        if event.status != EventStatus::Active || event.start_at <= now {
            debug!(event_id, chat_id, "not planning personal reminders");
            return Ok(0);
        }

        let mut scheduled = 0;
        for kind in JobKind::PERSONAL {
            let fire_at = event.start_at + kind.offset();
            if fire_at <= now {
                continue;
            }
            let planner = Arc::clone(self);
            let id = event.event_id.clone();
            self.registry.schedule(
                JobKey::personal(event.event_id.clone(), chat_id, kind),
                fire_at,
                async move {
                    planner.deliver(&id, chat_id, kind).await;
                },
            );
            scheduled += 1;
        }
        Ok(scheduled)
    }

    /// Remove every job keyed to `(event, chat)`. Called on
    /// unregistration and when an admin resets a participant's session.
    pub fn cancel_for(&self, event_id: &str, chat_id: i64) -> usize {
        self.registry.cancel_participant(event_id, chat_id)
    }

    /// Re-plan the whole event after a date edit: cancel every personal
    /// job under the event, then plan for each chat currently on the
    /// roster. A roster outage aborts the replan silently; the next
    /// registration or edit will retry.
    pub async fn replan_all(self: &Arc<Self>, event_id: &str) -> RegattaResult<usize> {
        self.registry.cancel_event(event_id);

        let event = self.store.get(event_id)?;
        let now = Utc::now();
        if event.status != EventStatus::Active || event.start_at <= now {
            return Ok(0);
        }

        let chats = match self.roster.get_roster(&event.roster_ref).await {
            Ok(chats) => chats,
            Err(err) => {
                warn!(event_id, error = %err, "roster unavailable, personal replan skipped");
                return Ok(0);
            }
        };

        let mut scheduled = 0;
        for chat_id in chats {
            scheduled += self.plan_for(event_id, chat_id)?;
        }
        Ok(scheduled)
    }

    /// Firing callback for a personal job. Re-validates the event and the
    /// chat's roster membership at fire time.
    pub async fn deliver(&self, event_id: &str, chat_id: i64, kind: JobKind) {
        let event = match self.store.get(event_id) {
            Ok(event) => event,
            Err(err) => {
                debug!(event_id, error = %err, "skipping personal reminder for unknown event");
                return;
            }
        };
        if event.status == EventStatus::Cancelled {
            debug!(event_id, chat_id, "event cancelled, skipping personal reminder");
            return;
        }

        let chats = match self.roster.get_roster(&event.roster_ref).await {
            Ok(chats) => chats,
            Err(err) => {
                warn!(event_id, chat_id, error = %err, "roster unavailable, skipping personal reminder");
                return;
            }
        };
        if !chats.contains(&chat_id) {
            // Unregistered between scheduling and firing.
            debug!(event_id, chat_id, "chat no longer on roster, skipping");
            return;
        }

        let text = messages::personal_text(kind, &event);
        if let Err(err) = self.transport.send(chat_id, &text).await {
            warn!(event_id, chat_id, error = %err, "personal reminder delivery failed");
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }
}

// =============================================================================
// Tests
// =============================================================================
