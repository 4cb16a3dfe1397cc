//! Per-frame wiring of gates, trackers and persistence.
//!
//! The host calls [`LapEngine::tick`] once per rendered frame with its
//! spatial snapshot and gesture feed. Everything runs on that thread; the
//! only cross-thread state lives in the feed.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, trace, warn};

use crate::config::{ConfigSink, LapConfig};
use crate::error::{LapError, Result};
use crate::feed::{GestureFeed, SpatialSnapshotProvider};
use crate::format::format_duration;
use crate::gate::{GateController, GateInput, GateSignal};
use crate::stats::PersonStats;
use crate::tracker::{CountEvent, LapDebugInfo, LapTracker, TrackerFrame, TrackerPolicy};
use crate::types::{ActorSnapshot, Direction};

/// Prefix for every user-facing status line.
pub const MESSAGE_PREFIX: &str = "[Lap Cat Counter]";
/// Minimum spacing of diagnostic log lines while debug is on.
pub const DEBUG_LOG_INTERVAL_MS: i64 = 250;

const FALLBACK_DT: f32 = 1.0 / 60.0;

/// A committed count, ready to be shown to the player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountNotice {
    pub direction: Direction,
    pub key: String,
    pub display_name: String,
    pub count: u32,
    pub at: DateTime<Utc>,
    pub message: String,
}

impl CountNotice {
    fn from_event(event: &CountEvent) -> Self {
        let who = &event.display_name;
        let message = match event.direction {
            Direction::Outgoing => format!(
                "{MESSAGE_PREFIX} You sat in {who}'s lap! You have sat in their lap {} time(s).",
                event.count
            ),
            Direction::Incoming => format!(
                "{MESSAGE_PREFIX} {who} sat in your lap! They have sat in your lap {} time(s).",
                event.count
            ),
        };
        Self {
            direction: event.direction,
            key: event.key.clone(),
            display_name: event.display_name.clone(),
            count: event.count,
            at: event.at,
            message,
        }
    }
}

pub struct LapEngine<S> {
    config: LapConfig,
    sink: S,
    gates: GateController,
    trackers: [LapTracker; 2],
    signals: [GateSignal; 2],
    notices: Vec<CountNotice>,

    debug_enabled: bool,
    next_debug_log_at: Option<DateTime<Utc>>,
}

impl<S: ConfigSink> LapEngine<S> {
    pub fn new(config: LapConfig, sink: S) -> Self {
        let trackers = [
            LapTracker::new(TrackerPolicy::outgoing(), &config.stats),
            LapTracker::new(TrackerPolicy::incoming(), &config.stats),
        ];
        Self {
            config,
            sink,
            gates: GateController::new(),
            trackers,
            signals: [GateSignal::default(); 2],
            notices: Vec::new(),
            debug_enabled: false,
            next_debug_log_at: None,
        }
    }

    pub fn config(&self) -> &LapConfig {
        &self.config
    }

    /// Mutable access for settings changes. Call [`save`](Self::save) after.
    pub fn config_mut(&mut self) -> &mut LapConfig {
        &mut self.config
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn tracker(&self, direction: Direction) -> &LapTracker {
        &self.trackers[direction.index()]
    }

    pub fn gate_signal(&self, direction: Direction) -> GateSignal {
        self.signals[direction.index()]
    }

    pub fn last_debug(&self, direction: Direction) -> Option<&LapDebugInfo> {
        self.tracker(direction).last_debug()
    }

    pub fn debug_enabled(&self) -> bool {
        self.debug_enabled
    }

    pub fn set_debug_enabled(&mut self, enabled: bool) {
        self.debug_enabled = enabled;
    }

    pub fn tick(
        &mut self,
        dt: f32,
        now: DateTime<Utc>,
        world: &dyn SpatialSnapshotProvider,
        feed: &dyn GestureFeed,
    ) {
        let dt = if dt > 0.0 && dt.is_finite() {
            dt
        } else {
            FALLBACK_DT
        };

        let Some(local) = world.local_actor() else {
            self.deactivate();
            return;
        };

        let actors: Vec<ActorSnapshot> = world
            .nearby_actors()
            .into_iter()
            .filter_map(|actor| match actor {
                Ok(actor) if actor.id != local.id => Some(actor),
                Ok(_) => None,
                Err(err) => {
                    trace!(error = %err, "Skipping unreadable actor");
                    None
                }
            })
            .collect();

        let input = GateInput {
            dt,
            now,
            local_position: local.position,
            gesture_ids: self.config.sit_gesture_ids(),
            hook_seconds: self.config.emote_hook_seconds,
            require_gesture: self.config.require_sit_emote,
        };
        self.signals = self.gates.update(feed, &input);

        let mut counted: Vec<CountEvent> = Vec::new();
        for direction in Direction::ALL {
            let signal = self.signals[direction.index()];
            let frame = TrackerFrame {
                dt,
                now,
                gate_active: signal.active,
                local: local.position,
                others: &actors,
                required_actor: signal.required_actor,
                latch_allowed: self.config.require_sit_emote,
            };
            let info = self.trackers[direction.index()].update(&mut self.config, &frame, |event| {
                counted.push(event.clone())
            });
            if info.has_candidate() {
                self.gates.sustain(direction, self.config.emote_hook_seconds);
            }
        }

        if !counted.is_empty() {
            self.notices
                .extend(counted.iter().map(CountNotice::from_event));
            if let Err(err) = self.save() {
                warn!(error = %err, "Failed to save after count");
            }
        }

        if self.debug_enabled && self.debug_log_due(now) {
            self.log_diagnostics(feed.is_ready());
        }
    }

    /// Ends both sessions and forgets candidates. The gates stay as they are.
    pub fn reset_current_session(&mut self) {
        for tracker in &mut self.trackers {
            tracker.reset_current_session(&mut self.config.stats);
        }
    }

    /// Removes one person and saves. Returns the removed entry.
    ///
    /// A running session with that person is dropped first so it cannot
    /// recreate the entry when it ends.
    pub fn remove_entry(&mut self, key: &str) -> Result<PersonStats> {
        if self.config.stats.get(key).is_none() {
            return Err(LapError::EntryNotFound(key.to_string()));
        }
        for tracker in &mut self.trackers {
            if tracker.session_key() == Some(key) {
                tracker.discard_current_session();
            }
        }
        let removed = self
            .config
            .stats
            .remove_entry(key)
            .ok_or_else(|| LapError::EntryNotFound(key.to_string()))?;
        info!(key, "Removed statistics entry");
        self.save()?;
        Ok(removed)
    }

    /// Removes every person, drops the running sessions and saves.
    pub fn reset_all(&mut self) -> Result<()> {
        for tracker in &mut self.trackers {
            tracker.discard_current_session();
        }
        self.config.stats.clear_all();
        info!("Cleared all statistics entries");
        self.save()
    }

    /// Rebuilds duration aggregates from the entries and saves.
    pub fn recalculate_aggregates(&mut self) -> Result<()> {
        self.config.stats.recalculate_aggregates_from_entries();
        for tracker in &mut self.trackers {
            tracker.reload_time_totals(&self.config.stats);
        }
        self.save()
    }

    /// Writes running time totals into the config and hands it to the sink.
    pub fn save(&mut self) -> Result<()> {
        for tracker in &self.trackers {
            tracker.write_time_totals(&mut self.config.stats);
        }
        self.sink.save(&self.config)
    }

    pub fn drain_notices(&mut self) -> Vec<CountNotice> {
        std::mem::take(&mut self.notices)
    }

    /// Handles `on`, `off`, `overlay` or an empty argument (toggle) and
    /// returns the status line to show.
    pub fn apply_debug_command(&mut self, args: &str) -> String {
        let on_off = |flag: bool| if flag { "ON" } else { "OFF" };

        match args.trim().to_lowercase().as_str() {
            "overlay" => {
                self.config.overlay_enabled = !self.config.overlay_enabled;
                return format!(
                    "{MESSAGE_PREFIX} Debug overlay: {}",
                    on_off(self.config.overlay_enabled)
                );
            }
            "on" => self.debug_enabled = true,
            "off" => self.debug_enabled = false,
            _ => self.debug_enabled = !self.debug_enabled,
        }

        format!(
            "{MESSAGE_PREFIX} Debug: {} (overlay {})",
            on_off(self.debug_enabled),
            on_off(self.config.overlay_enabled)
        )
    }

    pub fn totals_summary(&self) -> String {
        let outgoing = self.tracker(Direction::Outgoing);
        format!(
            "{MESSAGE_PREFIX} Total laps: {} across {} people. Total lap time: {}. Longest lap: {}.",
            outgoing.total_count(&self.config.stats),
            outgoing.unique_actor_count(&self.config.stats),
            format_duration(outgoing.total_seconds() as u64),
            format_duration(outgoing.longest_seconds() as u64),
        )
    }

    fn deactivate(&mut self) {
        self.reset_current_session();
        self.gates.clear_all();
        self.signals = [GateSignal::default(); 2];
        for tracker in &mut self.trackers {
            tracker.clear_last_debug();
        }
    }

    /// True at most once per [`DEBUG_LOG_INTERVAL_MS`] of frame time. A clock
    /// that jumps backwards restarts the interval.
    fn debug_log_due(&mut self, now: DateTime<Utc>) -> bool {
        let interval = Duration::milliseconds(DEBUG_LOG_INTERVAL_MS);
        let due = match self.next_debug_log_at {
            Some(next) => now >= next || next - now > interval,
            None => true,
        };
        if due {
            self.next_debug_log_at = Some(now + interval);
        }
        due
    }

    fn log_diagnostics(&self, feed_ready: bool) {
        for direction in Direction::ALL {
            let gate_active = self.signals[direction.index()].active;
            match self.last_debug(direction) {
                Some(info) => debug!(
                    direction = %direction,
                    gate_active,
                    feed_ready,
                    stable_target = self.config.stable_seconds_to_count,
                    "{info}"
                ),
                None => debug!(direction = %direction, gate_active, feed_ready, "No debug info"),
            }
        }
    }
}
