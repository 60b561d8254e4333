use anyhow::Result;
use owo_colors::OwoColorize;
use regatta_core::{EventDraft, EventStore};

use crate::utils;

pub fn run(
    store: &EventStore,
    title: String,
    start: &str,
    timezone: String,
    description: String,
    join_url: Option<String>,
    payment_url: Option<String>,
) -> Result<()> {
    let start_at = utils::parse_start(start, &timezone)?;
    let event = store.create(EventDraft {
        title,
        description,
        start_at,
        timezone,
        join_url,
        payment_url,
    })?;

    println!("{} {}", "Created".green(), event.event_id.bold());
    utils::print_event(&event);
    println!(
        "\nNote: reminders are (re)planned when the bot process starts or the event is edited there."
    );
    Ok(())
}
