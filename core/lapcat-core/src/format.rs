//! Text formatting shared by the overlay and the CLI.

use chrono::{DateTime, Local, TimeZone, Utc};
use std::fmt::Display;

use crate::stats::StatsStore;

/// Placeholder for a timestamp that was never set.
pub const NEVER: &str = "—";

/// `"1h 02m 03s"`, `"4m 05s"` or `"7s"`.
pub fn format_duration(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{hours}h {minutes:02}m {seconds:02}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds:02}s")
    } else {
        format!("{seconds}s")
    }
}

/// Relative time for recent interactions, local date and time for older ones.
pub fn format_last_seen(at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    format_last_seen_in(at, now, &Local)
}

pub fn format_last_seen_in<Tz>(at: Option<DateTime<Utc>>, now: DateTime<Utc>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let Some(at) = at else {
        return NEVER.to_string();
    };

    let delta = now.signed_duration_since(at);
    if delta.num_seconds() < 60 {
        "just now".to_string()
    } else if delta.num_minutes() < 60 {
        format!("{}m ago", delta.num_minutes())
    } else if delta.num_hours() < 24 {
        format!("{}h ago", delta.num_hours())
    } else {
        at.with_timezone(tz).format("%b %-d, %-I:%M %p").to_string()
    }
}

/// Plain-text totals block for copying to the clipboard.
pub fn totals_text(store: &StatsStore, limit: usize) -> String {
    let mut lines = vec![
        "Lap Cat Counter Totals".to_string(),
        format!("Sat in laps: {}", store.total_lap_count()),
        format!("Sat on you: {}", store.total_sat_on_you_count()),
        format!("Unique People: {}", store.unique_actor_count()),
        String::new(),
        "People (SatIn / SatOnYou):".to_string(),
    ];
    lines.extend(store.top_entries(limit).into_iter().map(|entry| {
        format!(
            "{}: {} / {}",
            entry.stats.display_name, entry.stats.lap_count, entry.stats.sat_on_you_count
        )
    }));

    let mut out = lines.join("\n");
    out.push('\n');
    out
}
