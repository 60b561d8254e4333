use anyhow::Result;
use owo_colors::OwoColorize;
use regatta_core::EventStore;

pub fn run(store: &EventStore, event_id: &str) -> Result<()> {
    store.cancel(event_id)?;
    println!("{} {}", "Cancelled".red(), event_id.bold());
    Ok(())
}
