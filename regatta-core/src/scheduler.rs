//! Broadcast reminder scheduling.
//!
//! One plan per event: day-before, hour-before, at-start and a post-event
//! feedback request, each fanned out to every chat on the event's roster
//! at fire time. Planning is idempotent (clear slate, then schedule), and
//! firing re-validates cancellation because an event may be cancelled
//! between scheduling and firing.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::error::RegattaResult;
use crate::event::EventStatus;
use crate::feedback::FeedbackState;
use crate::jobs::{JobKey, JobKind, JobRegistry};
use crate::messages;
use crate::roster::RosterBackend;
use crate::store::EventStore;
use crate::transport::ChatTransport;

pub struct ReminderScheduler {
    store: Arc<EventStore>,
    registry: Arc<JobRegistry>,
    roster: Arc<dyn RosterBackend>,
    transport: Arc<dyn ChatTransport>,
    feedback: Arc<FeedbackState>,
}

impl ReminderScheduler {
    pub fn new(
        store: Arc<EventStore>,
        roster: Arc<dyn RosterBackend>,
        transport: Arc<dyn ChatTransport>,
        feedback: Arc<FeedbackState>,
    ) -> Self {
        ReminderScheduler {
            store,
            registry: Arc::new(JobRegistry::new()),
            roster,
            transport,
            feedback,
        }
    }

    /// Re-plan the broadcast jobs for an event.
    ///
    /// Previously scheduled jobs for the event are always cancelled first.
    /// Nothing is scheduled for past or cancelled events, and each job is
    /// skipped individually when its fire time has already passed (editing
    /// an event to start in <24h must not retroactively fire the
    /// day-before reminder). Returns how many jobs were scheduled.
    pub fn plan(self: &Arc<Self>, event_id: &str) -> RegattaResult<usize> {
        self.registry.cancel_event(event_id);

        let event = self.store.get(event_id)?;
        let now = Utc::now();
        if event.status != EventStatus::Active || event.start_at <= now {
            debug!(event_id, status = %event.status, "not planning reminders");
            return Ok(0);
        }

        let mut scheduled = 0;
        for kind in JobKind::ALL {
            let fire_at = event.start_at + kind.offset();
            if fire_at <= now {
                continue;
            }
            let scheduler = Arc::clone(self);
            let id = event.event_id.clone();
            self.registry.schedule(
                JobKey::broadcast(event.event_id.clone(), kind),
                fire_at,
                async move {
                    scheduler.deliver(&id, kind).await;
                },
            );
            scheduled += 1;
        }
        debug!(event_id, scheduled, "planned broadcast reminders");
        Ok(scheduled)
    }

    /// Tear down every broadcast job for an event.
    pub fn cancel(&self, event_id: &str) -> usize {
        self.registry.cancel_event(event_id)
    }

    /// Firing callback for a broadcast job.
    ///
    /// Re-validates at fire time: a missing or cancelled event is a silent
    /// no-op. A send failure for one recipient is logged and skipped so it
    /// never aborts the remaining fan-out. The feedback broadcast marks
    /// every recipient as awaiting free-text feedback and then tears down
    /// the event's remaining jobs (it is the terminal broadcast).
    pub async fn deliver(&self, event_id: &str, kind: JobKind) {
        let event = match self.store.get(event_id) {
            Ok(event) => event,
            Err(err) => {
                debug!(event_id, error = %err, "skipping reminder for unknown event");
                return;
            }
        };
        if event.status == EventStatus::Cancelled {
            debug!(event_id, kind = kind.as_str(), "event cancelled, skipping reminder");
            return;
        }

        let chats = match self.roster.get_roster(&event.roster_ref).await {
            Ok(chats) => chats,
            Err(err) => {
                warn!(event_id, error = %err, "roster unavailable, skipping broadcast");
                return;
            }
        };

        let text = messages::broadcast_text(kind, &event);
        for chat_id in chats {
            if kind == JobKind::Feedback {
                self.feedback.mark(chat_id);
            }
            if let Err(err) = self.transport.send(chat_id, &text).await {
                warn!(event_id, chat_id, error = %err, "reminder delivery failed");
            }
        }

        if kind == JobKind::Feedback {
            self.registry.cancel_event(event_id);
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventPatch;
    use crate::testutil::{make_draft, make_store, MockRoster, MockTransport};
    use chrono::Duration;

    fn make_scheduler(
        dir: &tempfile::TempDir,
        chats: Vec<i64>,
    ) -> (Arc<ReminderScheduler>, Arc<EventStore>, Arc<MockTransport>) {
        let store = Arc::new(make_store(dir));
        let transport = Arc::new(MockTransport::default());
        let scheduler = Arc::new(ReminderScheduler::new(
            Arc::clone(&store),
            Arc::new(MockRoster::with_chats(chats)),
            Arc::clone(&transport) as Arc<dyn ChatTransport>,
            Arc::new(FeedbackState::new()),
        ));
        (scheduler, store, transport)
    }

    #[tokio::test]
    async fn plan_schedules_four_jobs_at_fixed_offsets() {
        let dir = tempfile::tempdir().unwrap();
        let (scheduler, store, _) = make_scheduler(&dir, vec![555]);
        let event = store
            .create(make_draft("Intro Talk", Utc::now() + Duration::days(2)))
            .unwrap();

        assert_eq!(scheduler.plan(&event.event_id).unwrap(), 4);
        let keys = scheduler.registry().keys_for_event(&event.event_id);
        assert_eq!(keys.len(), 4);
        assert!(keys.iter().all(|k| k.chat_id.is_none()));

        let day_before = JobKey::broadcast(event.event_id.clone(), JobKind::DayBefore);
        assert_eq!(
            scheduler.registry().fire_at(&day_before),
            Some(event.start_at - Duration::hours(24))
        );
        let feedback = JobKey::broadcast(event.event_id.clone(), JobKind::Feedback);
        assert_eq!(
            scheduler.registry().fire_at(&feedback),
            Some(event.start_at + Duration::hours(24))
        );
    }

    #[tokio::test]
    async fn replanning_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let (scheduler, store, _) = make_scheduler(&dir, vec![555]);
        let event = store
            .create(make_draft("Intro Talk", Utc::now() + Duration::days(2)))
            .unwrap();

        scheduler.plan(&event.event_id).unwrap();
        let first = scheduler.registry().keys_for_event(&event.event_id);
        scheduler.plan(&event.event_id).unwrap();
        let second = scheduler.registry().keys_for_event(&event.event_id);

        assert_eq!(first, second);
        assert_eq!(scheduler.registry().len(), 4);
    }

    #[tokio::test]
    async fn imminent_event_skips_already_passed_offsets() {
        let dir = tempfile::tempdir().unwrap();
        let (scheduler, store, _) = make_scheduler(&dir, vec![555]);
        let event = store
            .create(make_draft("Soon", Utc::now() + Duration::minutes(30)))
            .unwrap();

        // <1h away: day-before and hour-before are already in the past.
        assert_eq!(scheduler.plan(&event.event_id).unwrap(), 2);
        let keys = scheduler.registry().keys_for_event(&event.event_id);
        let kinds: Vec<JobKind> = keys.iter().map(|k| k.kind).collect();
        assert_eq!(kinds, vec![JobKind::AtStart, JobKind::Feedback]);
    }

    #[tokio::test]
    async fn editing_start_to_imminent_drops_lead_up_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let (scheduler, store, _) = make_scheduler(&dir, vec![555]);
        let event = store
            .create(make_draft("Intro Talk", Utc::now() + Duration::days(2)))
            .unwrap();
        scheduler.plan(&event.event_id).unwrap();
        assert_eq!(scheduler.registry().len(), 4);

        store
            .update(
                &event.event_id,
                EventPatch {
                    start_at: Some(Utc::now() + Duration::minutes(30)),
                    ..EventPatch::default()
                },
            )
            .unwrap();
        scheduler.plan(&event.event_id).unwrap();

        let kinds: Vec<JobKind> = scheduler
            .registry()
            .keys_for_event(&event.event_id)
            .iter()
            .map(|k| k.kind)
            .collect();
        assert_eq!(kinds, vec![JobKind::AtStart, JobKind::Feedback]);
    }

    #[tokio::test]
    async fn past_or_cancelled_events_get_no_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let (scheduler, store, _) = make_scheduler(&dir, vec![555]);

        let past = store
            .create(make_draft("Done", Utc::now() - Duration::hours(1)))
            .unwrap();
        assert_eq!(scheduler.plan(&past.event_id).unwrap(), 0);

        let cancelled = store
            .create(make_draft("Called Off", Utc::now() + Duration::days(2)))
            .unwrap();
        store.cancel(&cancelled.event_id).unwrap();
        assert_eq!(scheduler.plan(&cancelled.event_id).unwrap(), 0);
        assert!(scheduler.registry().is_empty());
    }

    #[tokio::test]
    async fn cancel_tears_down_all_jobs_and_firing_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let (scheduler, store, transport) = make_scheduler(&dir, vec![555, 556]);
        let event = store
            .create(make_draft("Intro Talk", Utc::now() + Duration::days(2)))
            .unwrap();
        scheduler.plan(&event.event_id).unwrap();

        store.cancel(&event.event_id).unwrap();
        assert_eq!(scheduler.cancel(&event.event_id), 4);
        assert!(scheduler.registry().is_empty());

        // Driving a captured callback after cancellation sends nothing.
        for kind in JobKind::ALL {
            scheduler.deliver(&event.event_id, kind).await;
        }
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn delivery_fans_out_to_the_whole_roster() {
        let dir = tempfile::tempdir().unwrap();
        let (scheduler, store, transport) = make_scheduler(&dir, vec![555, 556, 557]);
        let event = store
            .create(make_draft("Intro Talk", Utc::now() + Duration::days(2)))
            .unwrap();

        scheduler.deliver(&event.event_id, JobKind::HourBefore).await;
        let sent = transport.sent();
        assert_eq!(sent.len(), 3);
        assert!(sent.iter().all(|(_, text)| text.contains("Intro Talk")));
    }

    #[tokio::test]
    async fn one_failing_recipient_does_not_abort_the_fan_out() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(make_store(&dir));
        let transport = Arc::new(MockTransport::failing_for(vec![556]));
        let scheduler = Arc::new(ReminderScheduler::new(
            Arc::clone(&store),
            Arc::new(MockRoster::with_chats(vec![555, 556, 557])),
            Arc::clone(&transport) as Arc<dyn ChatTransport>,
            Arc::new(FeedbackState::new()),
        ));
        let event = store
            .create(make_draft("Intro Talk", Utc::now() + Duration::days(2)))
            .unwrap();

        scheduler.deliver(&event.event_id, JobKind::DayBefore).await;
        let delivered: Vec<i64> = transport.sent().iter().map(|(chat, _)| *chat).collect();
        assert_eq!(delivered, vec![555, 557]);
    }

    #[tokio::test]
    async fn feedback_marks_recipients_and_tears_down() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(make_store(&dir));
        let transport = Arc::new(MockTransport::default());
        let feedback = Arc::new(FeedbackState::new());
        let scheduler = Arc::new(ReminderScheduler::new(
            Arc::clone(&store),
            Arc::new(MockRoster::with_chats(vec![555, 556])),
            Arc::clone(&transport) as Arc<dyn ChatTransport>,
            Arc::clone(&feedback),
        ));
        let event = store
            .create(make_draft("Intro Talk", Utc::now() + Duration::days(2)))
            .unwrap();
        scheduler.plan(&event.event_id).unwrap();

        scheduler.deliver(&event.event_id, JobKind::Feedback).await;

        assert!(feedback.contains(555));
        assert!(feedback.contains(556));
        assert_eq!(transport.sent().len(), 2);
        assert!(scheduler.registry().is_empty());
    }
}
