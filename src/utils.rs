//! Shared helpers for the CLI commands.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use regatta_core::{Event, EventStore, JsonSettingsMirror};
use std::path::PathBuf;

/// Open the event store in the given (or default) data directory.
pub fn open_store(data_dir: Option<PathBuf>) -> Result<EventStore> {
    let dir = match data_dir {
        Some(dir) => dir,
        None => dirs::data_dir()
            .map(|d| d.join("regatta"))
            .unwrap_or_else(|| PathBuf::from("data")),
    };
    let mirror = JsonSettingsMirror::new(dir.join("settings.json"));
    Ok(EventStore::new(dir.join("events.json"), Box::new(mirror)))
}

/// Parse a `YYYY-MM-DDTHH:MM` wall-clock time in the given zone into the
/// absolute instant.
pub fn parse_start(start: &str, timezone: &str) -> Result<DateTime<Utc>> {
    let tz: Tz = timezone
        .parse()
        .map_err(|_| anyhow!("Unknown timezone '{}'", timezone))?;
    let naive = NaiveDateTime::parse_from_str(start, "%Y-%m-%dT%H:%M")
        .with_context(|| format!("Invalid start '{}'. Expected YYYY-MM-DDTHH:MM", start))?;
    let local = naive
        .and_local_timezone(tz)
        .single()
        .ok_or_else(|| anyhow!("'{}' is ambiguous or skipped in {}", start, timezone))?;
    Ok(local.with_timezone(&Utc))
}

pub fn print_event(event: &Event) {
    println!("{}", event.event_id);
    println!("  title:     {}", event.title);
    if !event.description.is_empty() {
        println!("  about:     {}", event.description);
    }
    println!(
        "  starts:    {} ({})",
        event.start_local().format("%Y-%m-%d %H:%M %Z"),
        event.timezone
    );
    println!("  status:    {}", event.status);
    if let Some(url) = &event.join_url {
        println!("  join:      {}", url);
    }
    if let Some(url) = &event.payment_url {
        println!("  payment:   {}", url);
    }
    println!("  roster:    {}", event.roster_ref);
    if let Some(link) = &event.roster_link {
        println!("  roster url {}", link);
    }
}
