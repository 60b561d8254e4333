use anyhow::Result;
use owo_colors::OwoColorize;
use regatta_core::{EventStatus, EventStore};

pub fn run(store: &EventStore, page: usize, page_size: usize) -> Result<()> {
    let (events, total_pages, total) = store.list_page(page, page_size, None)?;

    if events.is_empty() {
        println!("No events yet.");
        return Ok(());
    }

    for event in &events {
        let status = match event.status {
            EventStatus::Active => format!("{}", "active".green()),
            EventStatus::Past => format!("{}", "past".dimmed()),
            EventStatus::Cancelled => format!("{}", "cancelled".red()),
        };
        println!(
            "{:<40} {} {}  {}",
            event.event_id,
            event.start_local().format("%Y-%m-%d %H:%M"),
            status,
            event.title
        );
    }
    println!("\n{} events, page {}/{}", total, page.min(total_pages), total_pages);
    Ok(())
}
