//! Structured registry for time-triggered jobs.
//!
//! Jobs are keyed by `(event_id, chat_id, kind)` so that re-scheduling is
//! idempotent (same key replaces, never duplicates) and cancellation is
//! precise: exact-cancel by participant, range-cancel by event. A cancelled
//! job simply never fires; there is no mid-flight abort, which is why the
//! firing callbacks re-validate event status instead of trusting
//! scheduling-time conditions.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use tokio::task::AbortHandle;

/// The notification kinds the engine schedules, with their fixed offsets
/// from the event's start instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JobKind {
    DayBefore,
    HourBefore,
    AtStart,
    Feedback,
}

impl JobKind {
    /// All broadcast kinds, in firing order.
    pub const ALL: [JobKind; 4] = [
        JobKind::DayBefore,
        JobKind::HourBefore,
        JobKind::AtStart,
        JobKind::Feedback,
    ];

    /// The personal planner only schedules the two lead-up reminders.
    pub const PERSONAL: [JobKind; 2] = [JobKind::DayBefore, JobKind::HourBefore];

    pub fn offset(self) -> Duration {
        match self {
            JobKind::DayBefore => -Duration::hours(24),
            JobKind::HourBefore => -Duration::hours(1),
            JobKind::AtStart => Duration::zero(),
            JobKind::Feedback => Duration::hours(24),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::DayBefore => "day_before",
            JobKind::HourBefore => "hour_before",
            JobKind::AtStart => "at_start",
            JobKind::Feedback => "feedback",
        }
    }
}

/// Deterministic job identifier: `(event_id, chat_id_or_none, kind)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobKey {
    pub event_id: String,
    pub chat_id: Option<i64>,
    pub kind: JobKind,
}

impl JobKey {
    pub fn broadcast(event_id: impl Into<String>, kind: JobKind) -> Self {
        JobKey {
            event_id: event_id.into(),
            chat_id: None,
            kind,
        }
    }

    pub fn personal(event_id: impl Into<String>, chat_id: i64, kind: JobKind) -> Self {
        JobKey {
            event_id: event_id.into(),
            chat_id: Some(chat_id),
            kind,
        }
    }
}

struct Entry {
    fire_at: DateTime<Utc>,
    seq: u64,
    handle: AbortHandle,
}

/// In-process timer queue over tokio tasks.
#[derive(Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<JobKey, Entry>>,
    seq: AtomicU64,
}

impl JobRegistry {
    pub fn new() -> Self {
        JobRegistry::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<JobKey, Entry>> {
        self.jobs.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Schedule `callback` to run at the absolute instant `fire_at`,
    /// replacing any job already registered under `key`.
    pub fn schedule<F>(self: &Arc<Self>, key: JobKey, fire_at: DateTime<Utc>, callback: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let delay = (fire_at - Utc::now())
            .to_std()
            .unwrap_or(std::time::Duration::ZERO);

        let registry = Arc::clone(self);
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Deregister before running so a re-plan issued from inside the
            // callback starts from a clean slate.
            registry.remove_fired(&task_key, seq);
            callback.await;
        })
        .abort_handle();

        let mut jobs = self.lock();
        if let Some(old) = jobs.insert(key, Entry { fire_at, seq, handle }) {
            old.handle.abort();
        }
    }

    /// Remove a fired job, but only if it wasn't replaced while sleeping.
    fn remove_fired(&self, key: &JobKey, seq: u64) {
        let mut jobs = self.lock();
        if jobs.get(key).is_some_and(|entry| entry.seq == seq) {
            jobs.remove(key);
        }
    }

    /// Cancel one job. Returns whether it existed.
    pub fn cancel(&self, key: &JobKey) -> bool {
        match self.lock().remove(key) {
            Some(entry) => {
                entry.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Cancel every job scheduled under an event, broadcast and personal
    /// alike. Returns how many were removed.
    pub fn cancel_event(&self, event_id: &str) -> usize {
        self.cancel_where(|key| key.event_id == event_id)
    }

    /// Cancel every job keyed to `(event_id, chat_id)`.
    pub fn cancel_participant(&self, event_id: &str, chat_id: i64) -> usize {
        self.cancel_where(|key| key.event_id == event_id && key.chat_id == Some(chat_id))
    }

    fn cancel_where(&self, predicate: impl Fn(&JobKey) -> bool) -> usize {
        let mut jobs = self.lock();
        let keys: Vec<JobKey> = jobs.keys().filter(|k| predicate(k)).cloned().collect();
        for key in &keys {
            if let Some(entry) = jobs.remove(key) {
                entry.handle.abort();
            }
        }
        keys.len()
    }

    /// Registered keys under an event, sorted for deterministic assertions.
    pub fn keys_for_event(&self, event_id: &str) -> Vec<JobKey> {
        let jobs = self.lock();
        let mut keys: Vec<JobKey> = jobs
            .keys()
            .filter(|k| k.event_id == event_id)
            .cloned()
            .collect();
        keys.sort_by(|a, b| (a.chat_id, a.kind).cmp(&(b.chat_id, b.kind)));
        keys
    }

    pub fn fire_at(&self, key: &JobKey) -> Option<DateTime<Utc>> {
        self.lock().get(key).map(|entry| entry.fire_at)
    }

    pub fn contains(&self, key: &JobKey) -> bool {
        self.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter_callback(counter: &Arc<AtomicUsize>) -> impl Future<Output = ()> + Send + 'static {
        let counter = Arc::clone(counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn replace_by_key_keeps_a_single_job() {
        let registry = Arc::new(JobRegistry::new());
        let counter = Arc::new(AtomicUsize::new(0));
        let key = JobKey::broadcast("2025-03-20__talk", JobKind::DayBefore);

        let far = Utc::now() + Duration::days(1);
        registry.schedule(key.clone(), far, counter_callback(&counter));
        registry.schedule(key.clone(), far + Duration::hours(1), counter_callback(&counter));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.fire_at(&key), Some(far + Duration::hours(1)));
    }

    #[tokio::test]
    async fn due_job_fires_once_and_deregisters() {
        let registry = Arc::new(JobRegistry::new());
        let counter = Arc::new(AtomicUsize::new(0));
        let key = JobKey::broadcast("2025-03-20__talk", JobKind::AtStart);

        registry.schedule(
            key.clone(),
            Utc::now() + Duration::milliseconds(10),
            counter_callback(&counter),
        );
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(!registry.contains(&key));
    }

    #[tokio::test]
    async fn cancelled_job_never_fires() {
        let registry = Arc::new(JobRegistry::new());
        let counter = Arc::new(AtomicUsize::new(0));
        let key = JobKey::broadcast("2025-03-20__talk", JobKind::AtStart);

        registry.schedule(
            key.clone(),
            Utc::now() + Duration::milliseconds(20),
            counter_callback(&counter),
        );
        assert!(registry.cancel(&key));
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(!registry.cancel(&key));
    }

    #[tokio::test]
    async fn range_cancel_by_event_spares_other_events() {
        let registry = Arc::new(JobRegistry::new());
        let counter = Arc::new(AtomicUsize::new(0));
        let far = Utc::now() + Duration::days(1);

        for kind in JobKind::ALL {
            registry.schedule(JobKey::broadcast("a", kind), far, counter_callback(&counter));
        }
        registry.schedule(
            JobKey::personal("a", 555, JobKind::HourBefore),
            far,
            counter_callback(&counter),
        );
        registry.schedule(JobKey::broadcast("b", JobKind::AtStart), far, counter_callback(&counter));

        assert_eq!(registry.cancel_event("a"), 5);
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(&JobKey::broadcast("b", JobKind::AtStart)));
    }

    #[tokio::test]
    async fn exact_cancel_by_participant() {
        let registry = Arc::new(JobRegistry::new());
        let counter = Arc::new(AtomicUsize::new(0));
        let far = Utc::now() + Duration::days(1);

        registry.schedule(
            JobKey::personal("a", 555, JobKind::DayBefore),
            far,
            counter_callback(&counter),
        );
        registry.schedule(
            JobKey::personal("a", 556, JobKind::DayBefore),
            far,
            counter_callback(&counter),
        );
        registry.schedule(JobKey::broadcast("a", JobKind::DayBefore), far, counter_callback(&counter));

        assert_eq!(registry.cancel_participant("a", 555), 1);
        assert_eq!(registry.keys_for_event("a").len(), 2);
    }
}
