use anyhow::Result;
use owo_colors::OwoColorize;
use regatta_core::{EventPatch, EventStore};

use crate::utils;

#[allow(clippy::too_many_arguments)]
pub fn run(
    store: &EventStore,
    event_id: &str,
    title: Option<String>,
    description: Option<String>,
    start: Option<&str>,
    timezone: Option<String>,
    join_url: Option<String>,
    payment_url: Option<String>,
) -> Result<()> {
    let current = store.get(event_id)?;

    // A new start time is interpreted in the new zone when one was given.
    let start_at = match start {
        Some(raw) => {
            let zone = timezone.as_deref().unwrap_or(&current.timezone);
            Some(utils::parse_start(raw, zone)?)
        }
        None => None,
    };

    let event = store.update(
        event_id,
        EventPatch {
            title,
            description,
            start_at,
            timezone,
            join_url,
            payment_url,
            ..EventPatch::default()
        },
    )?;

    println!("{} {}", "Updated".green(), event.event_id.bold());
    utils::print_event(&event);
    if start_at.is_some() {
        println!("\nNote: the running bot re-plans reminders for the new start time.");
    }
    Ok(())
}
