//! Engine façade wiring the components together.
//!
//! Sequences the control flow around every mutation: store write, then
//! reminder re-planning, then index invalidation. Registration flows go
//! through the personal planner against the current event.

use std::sync::Arc;

use chrono::Utc;

use crate::error::RegattaResult;
use crate::event::{Event, EventDraft, EventPatch};
use crate::feedback::FeedbackState;
use crate::index::{EventIndexCache, Page};
use crate::personal::PersonalReminderPlanner;
use crate::roster::RosterBackend;
use crate::scheduler::ReminderScheduler;
use crate::store::EventStore;
use crate::transport::ChatTransport;

pub struct Engine {
    store: Arc<EventStore>,
    index: Arc<EventIndexCache>,
    scheduler: Arc<ReminderScheduler>,
    personal: Arc<PersonalReminderPlanner>,
    feedback: Arc<FeedbackState>,
}

impl Engine {
    pub fn new(
        store: Arc<EventStore>,
        roster: Arc<dyn RosterBackend>,
        transport: Arc<dyn ChatTransport>,
        index_snapshot_path: impl Into<std::path::PathBuf>,
    ) -> Self {
        let feedback = Arc::new(FeedbackState::new());
        let index = Arc::new(EventIndexCache::new(
            Arc::clone(&store),
            Arc::clone(&roster),
            index_snapshot_path,
        ));
        let scheduler = Arc::new(ReminderScheduler::new(
            Arc::clone(&store),
            Arc::clone(&roster),
            Arc::clone(&transport),
            Arc::clone(&feedback),
        ));
        let personal = Arc::new(PersonalReminderPlanner::new(
            Arc::clone(&store),
            roster,
            transport,
        ));
        Engine {
            store,
            index,
            scheduler,
            personal,
            feedback,
        }
    }

    /// Startup path: warm the index and re-plan reminders for the current
    /// event, since in-process jobs do not survive a restart.
    pub async fn bootstrap(&self) -> RegattaResult<()> {
        self.index.refresh(Utc::now()).await?;
        if let Some(current) = self.store.current()? {
            self.scheduler.plan(&current.event_id)?;
        }
        Ok(())
    }

    pub fn create_event(&self, draft: EventDraft) -> RegattaResult<Event> {
        let event = self.store.create(draft)?;
        self.scheduler.plan(&event.event_id)?;
        self.index.invalidate();
        Ok(event)
    }

    /// Edit an event. A date change additionally re-plans every personal
    /// reminder, since the old firing times are no longer valid.
    pub async fn update_event(&self, event_id: &str, patch: EventPatch) -> RegattaResult<Event> {
        let before = self.store.get(event_id)?;
        let event = self.store.update(event_id, patch)?;
        self.scheduler.plan(event_id)?;
        if event.start_at != before.start_at {
            self.personal.replan_all(event_id).await?;
        }
        self.index.invalidate();
        Ok(event)
    }

    pub fn cancel_event(&self, event_id: &str) -> RegattaResult<()> {
        self.store.cancel(event_id)?;
        self.scheduler.cancel(event_id);
        self.personal.registry().cancel_event(event_id);
        self.index.invalidate();
        Ok(())
    }

    /// A participant registered: schedule their personal reminders for
    /// the current event. Returns the event planned against, if any.
    pub fn register(&self, chat_id: i64) -> RegattaResult<Option<Event>> {
        match self.store.current()? {
            Some(current) => {
                self.personal.plan_for(&current.event_id, chat_id)?;
                Ok(Some(current))
            }
            None => Ok(None),
        }
    }

    /// A participant unregistered: drop their personal reminders and any
    /// pending feedback mark.
    pub fn unregister(&self, chat_id: i64) -> RegattaResult<()> {
        if let Some(current) = self.store.current()? {
            self.personal.cancel_for(&current.event_id, chat_id);
        }
        self.feedback.take(chat_id);
        Ok(())
    }

    pub async fn events_page(&self, page: usize, page_size: usize) -> RegattaResult<Page> {
        self.index.get_page(page, page_size, Utc::now()).await
    }

    pub fn store(&self) -> &Arc<EventStore> {
        &self.store
    }

    pub fn index(&self) -> &Arc<EventIndexCache> {
        &self.index
    }

    pub fn scheduler(&self) -> &Arc<ReminderScheduler> {
        &self.scheduler
    }

    pub fn personal(&self) -> &Arc<PersonalReminderPlanner> {
        &self.personal
    }

    pub fn feedback(&self) -> &Arc<FeedbackState> {
        &self.feedback
    }
}

// =============================================================================
// Tests
// =============================================================================
