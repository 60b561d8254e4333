use anyhow::Result;
use owo_colors::OwoColorize;
use regatta_core::EventStore;

use crate::utils;

pub fn run(store: &EventStore, set: Option<&str>, clear: bool) -> Result<()> {
    if clear {
        store.set_current(None)?;
        println!("Current event pointer cleared.");
        return Ok(());
    }
    if let Some(event_id) = set {
        store.set_current(Some(event_id))?;
        println!("{} is now the current event.", event_id.bold());
        return Ok(());
    }

    match store.current()? {
        Some(event) => utils::print_event(&event),
        None => println!("{}", "No current event.".dimmed()),
    }
    Ok(())
}
