//! Lap tracking: candidate selection, stability debounce and cooldown-gated counting.
//!
//! One [`LapTracker`] runs per [`Direction`]. Each frame it is told whether the
//! gate is open, where the local player is, and who is nearby:
//!
//! ```text
//! gate closed        → end session, clear candidate             (GateInactive)
//! latched            → ignore everything until the gate closes  (Latched)
//! nobody qualifies   → end session, latch or start idle timer   (NoCandidatePassed)
//! best candidate     → accumulate stability, maybe count        (BestCandidateSelected)
//! ```
//!
//! A count needs the same candidate for `stable_seconds_to_count` and the
//! per-person cooldown to have elapsed. At most one count happens per candidate
//! per continuous open gate.
//!
//! Statistics are never copied: the tracker borrows the store for the duration
//! of a call and only writes to it on a count or when a session ends.

mod candidate;
mod debug;

pub use candidate::{scan, CandidateMetrics, Measured, ScanResult, Thresholds};
pub use debug::{DebugReason, LapDebugInfo};

use chrono::{DateTime, Utc};
use tracing::{debug, info, trace};

use crate::config::LapConfig;
use crate::stats::{DurationTotals, StatsStore};
use crate::types::{ActorId, ActorSnapshot, Direction, Vec3};

/// Idle time with no candidate before an unlatched tracker forgets its candidate.
pub const NO_CANDIDATE_RESET_SECS: f32 = 15.0;
/// Radius ceiling for the incoming direction, whatever the configured radius.
pub const INCOMING_RADIUS_CAP: f32 = 0.6;

/// Per-direction behaviour of the shared state machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerPolicy {
    pub direction: Direction,
    /// One frame without a candidate ends the gate for this tracker.
    pub latch_until_regate: bool,
    pub radius_cap: Option<f32>,
}

impl TrackerPolicy {
    pub fn outgoing() -> Self {
        Self {
            direction: Direction::Outgoing,
            latch_until_regate: true,
            radius_cap: None,
        }
    }

    pub fn incoming() -> Self {
        Self {
            direction: Direction::Incoming,
            latch_until_regate: false,
            radius_cap: Some(INCOMING_RADIUS_CAP),
        }
    }
}

/// Everything a tracker needs for one frame.
#[derive(Debug, Clone, Copy)]
pub struct TrackerFrame<'a> {
    pub dt: f32,
    pub now: DateTime<Utc>,
    pub gate_active: bool,
    pub local: Vec3,
    pub others: &'a [ActorSnapshot],
    /// Only this actor may be selected (incoming gates).
    pub required_actor: Option<ActorId>,
    /// False while the outgoing gate is held open without a gesture, since
    /// nothing would ever release a latch.
    pub latch_allowed: bool,
}

/// Raised once per committed count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountEvent {
    pub direction: Direction,
    pub key: String,
    pub display_name: String,
    /// Count for this person after the increment.
    pub count: u32,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
struct LapSession {
    key: String,
    display_name: String,
    elapsed: f32,
}

#[derive(Debug, Clone)]
pub struct LapTracker {
    policy: TrackerPolicy,

    current_key: String,
    current_display_name: String,

    candidate_key: String,
    stable_seconds: f32,
    counted_this_gate: bool,
    no_candidate_seconds: f32,
    latched: bool,

    session: Option<LapSession>,
    total_seconds: f64,
    longest_seconds: f64,

    last_debug: Option<LapDebugInfo>,
}

impl LapTracker {
    /// Seeds the running time totals from the store's persisted aggregates.
    pub fn new(policy: TrackerPolicy, store: &StatsStore) -> Self {
        let totals = store.duration_totals(policy.direction);
        Self {
            policy,
            current_key: String::new(),
            current_display_name: String::new(),
            candidate_key: String::new(),
            stable_seconds: 0.0,
            counted_this_gate: false,
            no_candidate_seconds: 0.0,
            latched: false,
            session: None,
            total_seconds: totals.total_seconds as f64,
            longest_seconds: totals.longest_seconds as f64,
            last_debug: None,
        }
    }

    pub fn direction(&self) -> Direction {
        self.policy.direction
    }

    pub fn policy(&self) -> &TrackerPolicy {
        &self.policy
    }

    pub fn current_candidate_key(&self) -> &str {
        &self.current_key
    }

    pub fn current_candidate_display_name(&self) -> &str {
        &self.current_display_name
    }

    pub fn stable_seconds(&self) -> f32 {
        self.stable_seconds
    }

    pub fn counted_this_gate(&self) -> bool {
        self.counted_this_gate
    }

    pub fn is_latched(&self) -> bool {
        self.latched
    }

    pub fn last_debug(&self) -> Option<&LapDebugInfo> {
        self.last_debug.as_ref()
    }

    pub fn clear_last_debug(&mut self) {
        self.last_debug = None;
    }

    pub fn total_count(&self, store: &StatsStore) -> u64 {
        store.total_count(self.policy.direction)
    }

    pub fn unique_actor_count(&self, store: &StatsStore) -> usize {
        store.unique_actor_count()
    }

    pub fn count_for(&self, store: &StatsStore, key: &str) -> u32 {
        store.get(key).map_or(0, |p| p.count(self.policy.direction))
    }

    /// Key of the person the running session is with.
    pub fn session_key(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.key.as_str())
    }

    pub fn current_session_seconds(&self) -> f32 {
        self.session.as_ref().map_or(0.0, |s| s.elapsed)
    }

    pub fn total_seconds(&self) -> f64 {
        self.total_seconds
    }

    /// Longest finished session, or the running one if it is already longer.
    pub fn longest_seconds(&self) -> f64 {
        self.longest_seconds
            .max(f64::from(self.current_session_seconds()))
    }

    pub fn write_time_totals(&self, store: &mut StatsStore) {
        store.set_duration_totals(
            self.policy.direction,
            DurationTotals {
                total_seconds: self.total_seconds as u64,
                longest_seconds: self.longest_seconds as u64,
            },
        );
    }

    pub fn reload_time_totals(&mut self, store: &StatsStore) {
        let totals = store.duration_totals(self.policy.direction);
        self.total_seconds = totals.total_seconds as f64;
        self.longest_seconds = totals.longest_seconds as f64;
    }

    /// Ends any running session and forgets the current candidate and latch.
    pub fn reset_current_session(&mut self, store: &mut StatsStore) {
        self.end_session(store);
        self.clear_candidate();
        self.no_candidate_seconds = 0.0;
        self.latched = false;
    }

    /// Forgets all transient state without committing the running session.
    pub fn discard_current_session(&mut self) {
        self.session = None;
        self.clear_candidate();
        self.no_candidate_seconds = 0.0;
        self.latched = false;
    }

    pub fn update<F>(
        &mut self,
        config: &mut LapConfig,
        frame: &TrackerFrame<'_>,
        on_counted: F,
    ) -> LapDebugInfo
    where
        F: FnOnce(&CountEvent),
    {
        let debug = self.step(config, frame, on_counted);
        self.last_debug = Some(debug.clone());
        debug
    }

    fn step<F>(&mut self, config: &mut LapConfig, frame: &TrackerFrame<'_>, on_counted: F) -> LapDebugInfo
    where
        F: FnOnce(&CountEvent),
    {
        let dt = frame.dt.max(0.0);

        if !frame.gate_active {
            self.reset_current_session(&mut config.stats);
            return LapDebugInfo::bare(DebugReason::GateInactive, 0.0, false);
        }

        if self.latched {
            return LapDebugInfo::bare(
                DebugReason::Latched,
                self.stable_seconds,
                self.counted_this_gate,
            );
        }

        let thresholds =
            Thresholds::resolve(config, self.policy.direction, self.policy.radius_cap);
        let result = scan(frame.local, frame.others, frame.required_actor, &thresholds);

        let Some(best) = result.best else {
            return self.no_candidate(&mut config.stats, frame, &result);
        };

        self.no_candidate_seconds = 0.0;

        let key = best.actor.display_name.clone();
        self.current_key.clone_from(&key);
        self.current_display_name.clone_from(&best.actor.display_name);

        if self.session.as_ref().map_or(true, |s| s.key != key) {
            self.end_session(&mut config.stats);
            self.start_session(&key, &best.actor.display_name);
        }

        if self.candidate_key == key {
            self.stable_seconds += dt;
        } else {
            self.candidate_key.clone_from(&key);
            self.stable_seconds = 0.0;
            self.counted_this_gate = false;
        }

        if let Some(session) = self.session.as_mut() {
            session.elapsed += dt;
        }
        self.total_seconds += f64::from(dt);

        if !self.counted_this_gate && self.stable_seconds >= config.stable_seconds_to_count {
            self.try_count(config, &key, &best.actor.display_name, frame.now, on_counted);
        }

        LapDebugInfo::measured(
            best.actor,
            &best.metrics,
            DebugReason::BestCandidateSelected,
            self.stable_seconds,
            self.counted_this_gate,
        )
    }

    fn no_candidate(
        &mut self,
        store: &mut StatsStore,
        frame: &TrackerFrame<'_>,
        result: &ScanResult<'_>,
    ) -> LapDebugInfo {
        self.end_session(store);
        self.no_candidate_seconds += frame.dt.max(0.0);

        if self.policy.latch_until_regate && frame.latch_allowed {
            if !self.latched {
                debug!(direction = %self.policy.direction, "No candidate; latched until re-gated");
            }
            self.latched = true;
            self.clear_candidate();
        } else if self.no_candidate_seconds >= NO_CANDIDATE_RESET_SECS {
            self.clear_candidate();
            self.no_candidate_seconds = 0.0;
        }

        match result.nearest {
            Some(nearest) => LapDebugInfo::measured(
                nearest.actor,
                &nearest.metrics,
                DebugReason::NoCandidatePassed,
                self.stable_seconds,
                self.counted_this_gate,
            ),
            None => LapDebugInfo::bare(
                DebugReason::NoPlayersInRange,
                self.stable_seconds,
                self.counted_this_gate,
            ),
        }
    }

    fn try_count<F>(
        &mut self,
        config: &mut LapConfig,
        key: &str,
        display_name: &str,
        now: DateTime<Utc>,
        on_counted: F,
    ) where
        F: FnOnce(&CountEvent),
    {
        let direction = self.policy.direction;
        let cooldown = config.cooldown();
        let person = config.stats.get_or_create(key, display_name);

        let cooled_down = person
            .last_interaction(direction)
            .map_or(true, |last| now.signed_duration_since(last) >= cooldown);
        if !cooled_down {
            trace!(direction = %direction, key, "Candidate still in cooldown");
            return;
        }

        person.record_interaction(direction, now);
        self.counted_this_gate = true;

        let event = CountEvent {
            direction,
            key: key.to_string(),
            display_name: person.display_name.clone(),
            count: person.count(direction),
            at: now,
        };
        info!(
            direction = %direction,
            key = %event.key,
            count = event.count,
            "Lap counted"
        );
        on_counted(&event);
    }

    fn start_session(&mut self, key: &str, display_name: &str) {
        self.session = Some(LapSession {
            key: key.to_string(),
            display_name: display_name.to_string(),
            elapsed: 0.0,
        });
    }

    /// Commits the running session's whole seconds to its person, creating the
    /// entry if this is the first time they were held.
    fn end_session(&mut self, store: &mut StatsStore) {
        let Some(session) = self.session.take() else {
            return;
        };

        let seconds = f64::from(session.elapsed.max(0.0));
        if seconds > self.longest_seconds {
            self.longest_seconds = seconds;
        }

        let direction = self.policy.direction;
        store
            .get_or_create(&session.key, &session.display_name)
            .add_session(direction, seconds as u64);
        debug!(
            direction = %direction,
            key = %session.key,
            seconds,
            "Lap session ended"
        );
    }

    fn clear_candidate(&mut self) {
        self.current_key.clear();
        self.current_display_name.clear();
        self.candidate_key.clear();
        self.stable_seconds = 0.0;
        self.counted_this_gate = false;
    }
}
