use anyhow::Result;
use regatta_core::EventStore;

use crate::utils;

pub fn run(store: &EventStore, event_id: &str) -> Result<()> {
    let event = store.get(event_id)?;
    utils::print_event(&event);
    Ok(())
}
