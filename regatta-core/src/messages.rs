//! Reminder message texts.

use crate::event::Event;
use crate::jobs::JobKind;

/// Start instant rendered in the event's own zone, e.g.
/// "Thursday, 20 March at 15:00 CET".
pub fn format_start(event: &Event) -> String {
    event.start_local().format("%A, %-d %B at %H:%M %Z").to_string()
}

/// Text for a broadcast reminder of the given kind.
pub fn broadcast_text(kind: JobKind, event: &Event) -> String {
    match kind {
        JobKind::DayBefore => {
            let mut text = format!(
                "Reminder: \"{}\" is tomorrow, {}.",
                event.title,
                format_start(event)
            );
            if let Some(url) = &event.join_url {
                text.push_str(&format!("\nYour join link: {}", url));
            }
            text
        }
        JobKind::HourBefore => match &event.join_url {
            Some(url) => format!(
                "Starting soon! \"{}\" begins in an hour. Your join link: {}",
                event.title, url
            ),
            None => format!(
                "Starting soon! \"{}\" begins in an hour. The join link will follow shortly.",
                event.title
            ),
        },
        JobKind::AtStart => match &event.join_url {
            Some(url) => format!("We're live! \"{}\" is starting now: {}", event.title, url),
            None => format!("We're live! \"{}\" is starting now.", event.title),
        },
        JobKind::Feedback => format!(
            "Thank you for joining \"{}\"! We'd love to hear your impressions, just reply to this message.",
            event.title
        ),
    }
}

/// Text for a personal reminder. Same lead-up content as the broadcast
/// variants; only the two lead-up kinds are ever scheduled per chat.
pub fn personal_text(kind: JobKind, event: &Event) -> String {
    broadcast_text(kind, event)
}
