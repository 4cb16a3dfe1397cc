//! Subcommand implementations. Rendering is split out so it can be tested
//! without capturing stdout.

use chrono::{DateTime, Utc};
use std::path::Path;
use tracing::info;

use lapcat_core::{
    format_duration, format_last_seen, totals_text, JsonConfigFile, LapConfig, LapEngine,
    LapError, PersonStats, StatsStore,
};

use crate::replay;

const NAME_WIDTH: usize = 24;

fn open(path: &Path) -> Result<LapEngine<JsonConfigFile>, LapError> {
    let mut file = JsonConfigFile::new(path);
    let config = file.load_migrated(None)?;
    Ok(LapEngine::new(config, file))
}

/// Opens the file for a command that saves. An unreadable file is an error
/// so it is never replaced by defaults.
fn open_for_update(path: &Path) -> Result<LapEngine<JsonConfigFile>, LapError> {
    let mut file = JsonConfigFile::new(path);
    let config = file.load_for_update(None)?;
    Ok(LapEngine::new(config, file))
}

pub fn totals(path: &Path) -> Result<(), String> {
    let engine = open(path)?;
    println!("{}", engine.totals_summary());
    Ok(())
}

pub fn top(path: &Path, limit: usize, as_text: bool) -> Result<(), String> {
    let engine = open(path)?;
    let stats = &engine.config().stats;
    if as_text {
        print!("{}", totals_text(stats, limit));
    } else {
        print!("{}", render_table(stats, limit, Utc::now()));
    }
    Ok(())
}

pub fn show(path: &Path, name: &str) -> Result<(), String> {
    let engine = open(path)?;
    let person = engine
        .config()
        .stats
        .get(name)
        .ok_or_else(|| LapError::EntryNotFound(name.to_string()))?;
    print!("{}", render_person(name, person, Utc::now()));
    Ok(())
}

pub fn reset(path: &Path, name: &str) -> Result<(), String> {
    let mut engine = open_for_update(path)?;
    let removed = engine.remove_entry(name)?;
    println!(
        "Removed {} ({} laps, sat on you {} times)",
        name, removed.lap_count, removed.sat_on_you_count
    );
    Ok(())
}

pub fn reset_all(path: &Path, confirmed: bool) -> Result<(), String> {
    if !confirmed {
        return Err("Refusing to reset all statistics without --yes".to_string());
    }
    let mut engine = open_for_update(path)?;
    let people = engine.config().stats.unique_actor_count();
    engine.reset_all()?;
    println!("Reset all statistics ({people} people removed)");
    Ok(())
}

pub fn recalc(path: &Path) -> Result<(), String> {
    let mut engine = open_for_update(path)?;
    engine.recalculate_aggregates()?;
    info!(path = %path.display(), "Recalculated aggregates");
    println!("{}", engine.totals_summary());
    Ok(())
}

pub fn replay(config_path: &Path, trace_path: &Path, debug: bool) -> Result<(), String> {
    let config = LapConfig::load(config_path)?;
    let trace = replay::load_trace(trace_path)?;
    let outcome = replay::replay(&trace, config, debug);

    for notice in &outcome.notices {
        println!("{}  {}", notice.at.format("%H:%M:%S%.3f"), notice.message);
    }
    println!("{}", outcome.summary);
    println!();
    print!("{}", totals_text(&outcome.config.stats, usize::MAX));
    Ok(())
}

fn table_row(
    name: &str,
    laps: impl std::fmt::Display,
    sat_on_you: impl std::fmt::Display,
    lap_time: &str,
    longest: &str,
    last_seen: &str,
) -> String {
    format!("{name:<NAME_WIDTH$} {laps:>5} {sat_on_you:>10} {lap_time:>12} {longest:>12}  {last_seen}\n")
}

pub fn render_table(store: &StatsStore, limit: usize, now: DateTime<Utc>) -> String {
    let mut out = table_row("Name", "Laps", "Sat on you", "Lap time", "Longest", "Last seen");
    for entry in store.top_entries(limit) {
        let stats = entry.stats;
        let name = if stats.display_name.trim().is_empty() {
            entry.key
        } else {
            stats.display_name.as_str()
        };
        out.push_str(&table_row(
            name,
            stats.lap_count,
            stats.sat_on_you_count,
            &format_duration(stats.total_lap_seconds),
            &format_duration(stats.longest_lap_seconds),
            &format_last_seen(stats.last_seen(), now),
        ));
    }
    out
}

pub fn render_person(key: &str, stats: &PersonStats, now: DateTime<Utc>) -> String {
    let mut lines = vec![stats.display_name.clone()];
    if key != stats.display_name {
        lines.push(format!("  key:               {key}"));
    }
    lines.extend([
        format!("  laps:              {}", stats.lap_count),
        format!(
            "  last lap:          {}",
            format_last_seen(stats.last_lap_at, now)
        ),
        format!(
            "  lap time:          {} (longest {})",
            format_duration(stats.total_lap_seconds),
            format_duration(stats.longest_lap_seconds)
        ),
        format!("  sat on you:        {}", stats.sat_on_you_count),
        format!(
            "  last sat on you:   {}",
            format_last_seen(stats.last_sat_on_you_at, now)
        ),
        format!(
            "  sat on you time:   {} (longest {})",
            format_duration(stats.total_sat_on_you_seconds),
            format_duration(stats.longest_sat_on_you_seconds)
        ),
    ]);

    let mut out = lines.join("\n");
    out.push('\n');
    out
}
