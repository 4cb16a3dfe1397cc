//! Per-player lap statistics.
//!
//! Entries are keyed by display name. Two players sharing a name share an
//! entry; that collision is accepted rather than keyed on a session-scoped
//! actor id that would not survive a relog.
//!
//! The store is persisted inside [`LapConfig`](crate::config::LapConfig) and is
//! only mutated by the trackers' count/session commits and the explicit reset
//! operations here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::types::Direction;

// ═══════════════════════════════════════════════════════════════════════════════
// Entries
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PersonStats {
    /// Last seen display name for this key.
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub lap_count: u32,
    #[serde(default)]
    pub sat_on_you_count: u32,
    #[serde(default)]
    pub last_lap_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_sat_on_you_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_lap_seconds: u64,
    #[serde(default)]
    pub longest_lap_seconds: u64,
    #[serde(default)]
    pub total_sat_on_you_seconds: u64,
    #[serde(default)]
    pub longest_sat_on_you_seconds: u64,
}

impl PersonStats {
    pub fn count(&self, direction: Direction) -> u32 {
        match direction {
            Direction::Outgoing => self.lap_count,
            Direction::Incoming => self.sat_on_you_count,
        }
    }

    pub fn last_interaction(&self, direction: Direction) -> Option<DateTime<Utc>> {
        match direction {
            Direction::Outgoing => self.last_lap_at,
            Direction::Incoming => self.last_sat_on_you_at,
        }
    }

    /// Most recent interaction in either direction.
    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        self.last_lap_at.max(self.last_sat_on_you_at)
    }

    pub fn record_interaction(&mut self, direction: Direction, now: DateTime<Utc>) {
        match direction {
            Direction::Outgoing => {
                self.lap_count = self.lap_count.saturating_add(1);
                self.last_lap_at = Some(now);
            }
            Direction::Incoming => {
                self.sat_on_you_count = self.sat_on_you_count.saturating_add(1);
                self.last_sat_on_you_at = Some(now);
            }
        }
    }

    pub fn durations(&self, direction: Direction) -> DurationTotals {
        match direction {
            Direction::Outgoing => DurationTotals {
                total_seconds: self.total_lap_seconds,
                longest_seconds: self.longest_lap_seconds,
            },
            Direction::Incoming => DurationTotals {
                total_seconds: self.total_sat_on_you_seconds,
                longest_seconds: self.longest_sat_on_you_seconds,
            },
        }
    }

    /// Folds one finished session (whole seconds) into the duration fields.
    pub fn add_session(&mut self, direction: Direction, seconds: u64) {
        let (total, longest) = match direction {
            Direction::Outgoing => (&mut self.total_lap_seconds, &mut self.longest_lap_seconds),
            Direction::Incoming => (
                &mut self.total_sat_on_you_seconds,
                &mut self.longest_sat_on_you_seconds,
            ),
        };
        *total = total.saturating_add(seconds);
        if seconds > *longest {
            *longest = seconds;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DurationTotals {
    pub total_seconds: u64,
    pub longest_seconds: u64,
}

/// Borrowed entry with its key, for display.
#[derive(Debug, Clone, Copy)]
pub struct EntryView<'a> {
    pub key: &'a str,
    pub stats: &'a PersonStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryOrder {
    #[default]
    LapsDescending,
    LapsAscending,
    NameAscending,
    NameDescending,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Store
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StatsStore {
    #[serde(default)]
    people: HashMap<String, PersonStats>,
    #[serde(default)]
    total_lap_seconds: u64,
    #[serde(default)]
    longest_lap_seconds: u64,
    #[serde(default)]
    total_sat_on_you_seconds: u64,
    #[serde(default)]
    longest_sat_on_you_seconds: u64,
}

impl StatsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_lap_count(&self) -> u64 {
        self.people.values().map(|p| u64::from(p.lap_count)).sum()
    }

    pub fn total_sat_on_you_count(&self) -> u64 {
        self.people.values().map(|p| u64::from(p.sat_on_you_count)).sum()
    }

    pub fn total_count(&self, direction: Direction) -> u64 {
        match direction {
            Direction::Outgoing => self.total_lap_count(),
            Direction::Incoming => self.total_sat_on_you_count(),
        }
    }

    pub fn unique_actor_count(&self) -> usize {
        self.people.len()
    }

    pub fn count_for(&self, key: &str) -> u32 {
        self.people.get(key).map_or(0, |p| p.lap_count)
    }

    pub fn sat_on_you_count_for(&self, key: &str) -> u32 {
        self.people.get(key).map_or(0, |p| p.sat_on_you_count)
    }

    pub fn get(&self, key: &str) -> Option<&PersonStats> {
        self.people.get(key)
    }

    pub fn entry_mut(&mut self, key: &str) -> Option<&mut PersonStats> {
        self.people.get_mut(key)
    }

    /// Looks up or creates the entry for `key`, keeping the latest non-blank name.
    pub fn get_or_create(&mut self, key: &str, display_name: &str) -> &mut PersonStats {
        let stats = self
            .people
            .entry(key.to_string())
            .or_insert_with(|| PersonStats {
                display_name: display_name.to_string(),
                ..Default::default()
            });

        if !display_name.trim().is_empty() {
            stats.display_name = display_name.to_string();
        }

        stats
    }

    /// All entries by lap count (highest first), ties by display name ignoring case.
    pub fn top_entries(&self, limit: usize) -> Vec<EntryView<'_>> {
        let mut entries = self.sorted_entries(EntryOrder::LapsDescending);
        entries.truncate(limit);
        entries
    }

    pub fn sorted_entries(&self, order: EntryOrder) -> Vec<EntryView<'_>> {
        let mut entries: Vec<EntryView<'_>> = self
            .people
            .iter()
            .map(|(key, stats)| EntryView { key, stats })
            .collect();

        entries.sort_by(|a, b| {
            let primary = match order {
                EntryOrder::LapsDescending => b.stats.lap_count.cmp(&a.stats.lap_count),
                EntryOrder::LapsAscending => a.stats.lap_count.cmp(&b.stats.lap_count),
                EntryOrder::NameAscending => Ordering::Equal,
                EntryOrder::NameDescending => {
                    compare_names(&b.stats.display_name, &a.stats.display_name)
                }
            };
            primary
                .then_with(|| compare_names(&a.stats.display_name, &b.stats.display_name))
                .then_with(|| a.key.cmp(b.key))
        });

        entries
    }

    pub fn remove_entry(&mut self, key: &str) -> Option<PersonStats> {
        self.people.remove(key)
    }

    /// Removes every entry. Duration aggregates are left for
    /// [`recalculate_aggregates_from_entries`](Self::recalculate_aggregates_from_entries).
    pub fn clear_all(&mut self) {
        self.people.clear();
    }

    pub fn recalculate_aggregates_from_entries(&mut self) {
        for direction in Direction::ALL {
            let totals = self
                .people
                .values()
                .map(|p| p.durations(direction))
                .fold(DurationTotals::default(), |acc, d| DurationTotals {
                    total_seconds: acc.total_seconds.saturating_add(d.total_seconds),
                    longest_seconds: acc.longest_seconds.max(d.longest_seconds),
                });
            self.set_duration_totals(direction, totals);
        }
    }

    pub fn duration_totals(&self, direction: Direction) -> DurationTotals {
        match direction {
            Direction::Outgoing => DurationTotals {
                total_seconds: self.total_lap_seconds,
                longest_seconds: self.longest_lap_seconds,
            },
            Direction::Incoming => DurationTotals {
                total_seconds: self.total_sat_on_you_seconds,
                longest_seconds: self.longest_sat_on_you_seconds,
            },
        }
    }

    pub fn set_duration_totals(&mut self, direction: Direction, totals: DurationTotals) {
        match direction {
            Direction::Outgoing => {
                self.total_lap_seconds = totals.total_seconds;
                self.longest_lap_seconds = totals.longest_seconds;
            }
            Direction::Incoming => {
                self.total_sat_on_you_seconds = totals.total_seconds;
                self.longest_sat_on_you_seconds = totals.longest_seconds;
            }
        }
    }
}

fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}
