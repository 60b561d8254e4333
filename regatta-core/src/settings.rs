//! Settings mirror for legacy readers of the "current event".
//!
//! The store pushes a denormalized projection of the current event into a
//! settings document whenever the pointer or the pointed-to event changes.
//! This is a write-only side effect with no invariants of its own; readers
//! that still consume the settings file get a fresh snapshot for free.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RegattaError, RegattaResult};
use crate::event::Event;

/// Denormalized "current event" fields pushed to the settings store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentEventProjection {
    pub event_id: String,
    pub title: String,
    pub description: String,
    pub start_at: DateTime<Utc>,
    pub timezone: String,
    pub join_url: Option<String>,
    pub payment_url: Option<String>,
    pub roster_ref: String,
}

impl CurrentEventProjection {
    pub fn from_event(event: &Event) -> Self {
        CurrentEventProjection {
            event_id: event.event_id.clone(),
            title: event.title.clone(),
            description: event.description.clone(),
            start_at: event.start_at,
            timezone: event.timezone.clone(),
            join_url: event.join_url.clone(),
            payment_url: event.payment_url.clone(),
            roster_ref: event.roster_ref.clone(),
        }
    }
}

/// Receives current-event projections. `None` clears the projection.
pub trait SettingsMirror: Send + Sync {
    fn push(&self, current: Option<&CurrentEventProjection>) -> RegattaResult<()>;
}

/// Mirror that merges the projection into a JSON settings document,
/// preserving unrelated keys owned by other writers.
pub struct JsonSettingsMirror {
    path: PathBuf,
}

impl JsonSettingsMirror {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonSettingsMirror { path: path.into() }
    }

    fn load(&self) -> RegattaResult<serde_json::Map<String, serde_json::Value>> {
        if !self.path.exists() {
            return Ok(serde_json::Map::new());
        }
        let raw = std::fs::read_to_string(&self.path)?;
        let value: serde_json::Value = serde_json::from_str(&raw)
            .map_err(|e| RegattaError::Serialization(e.to_string()))?;
        match value {
            serde_json::Value::Object(map) => Ok(map),
            _ => Ok(serde_json::Map::new()),
        }
    }

    fn save(&self, map: &serde_json::Map<String, serde_json::Value>) -> RegattaResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(map)
            .map_err(|e| RegattaError::Serialization(e.to_string()))?;
        write_atomically(&self.path, &content)
    }
}

impl SettingsMirror for JsonSettingsMirror {
    fn push(&self, current: Option<&CurrentEventProjection>) -> RegattaResult<()> {
        let mut settings = self.load()?;
        let value = match current {
            Some(projection) => serde_json::to_value(projection)
                .map_err(|e| RegattaError::Serialization(e.to_string()))?,
            None => serde_json::Value::Null,
        };
        settings.insert("current_event".to_string(), value);
        self.save(&settings)
    }
}

impl<T: SettingsMirror> SettingsMirror for std::sync::Arc<T> {
    fn push(&self, current: Option<&CurrentEventProjection>) -> RegattaResult<()> {
        (**self).push(current)
    }
}

/// Mirror that drops every push. Useful when no legacy reader exists.
pub struct NoopSettingsMirror;

impl SettingsMirror for NoopSettingsMirror {
    fn push(&self, _current: Option<&CurrentEventProjection>) -> RegattaResult<()> {
        Ok(())
    }
}

/// Write through a temp file and rename for crash consistency.
pub(crate) fn write_atomically(path: &Path, content: &str) -> RegattaResult<()> {
    let temp = path.with_extension("tmp");
    std::fs::write(&temp, content)?;
    std::fs::rename(&temp, path)?;
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
