//! Replays a recorded frame trace through the engine.
//!
//! A trace is JSON:
//!
//! ```json
//! {
//!   "start": "2026-03-01T20:00:00Z",
//!   "frames": [
//!     {
//!       "dt": 0.125,
//!       "local": { "id": 1, "position": { "x": 0.0, "y": 0.0, "z": 0.0 } },
//!       "actors": [{ "id": 2, "display_name": "Alice", "position": { "x": 0.1, "y": -0.3, "z": 0.1 } }],
//!       "gestures": [{ "gesture_id": 50, "origin": 1, "target": 0 }]
//!     }
//!   ]
//! }
//! ```
//!
//! Frame time starts at `start` (or now) and advances by each frame's `dt`.
//! Gestures are stamped with their frame's time. Counts land in an in-memory
//! copy of the config; the file on disk is never touched.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

use lapcat_core::{
    ActorId, ActorSnapshot, CountNotice, GestureCell, GestureEvent, GestureId, LapConfig,
    LapEngine, LapError, LocalActor, MemorySink, StaticSnapshot,
};

#[derive(Debug, Clone, Deserialize)]
pub struct FrameTrace {
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub frames: Vec<TraceFrame>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TraceFrame {
    #[serde(default)]
    pub dt: f32,
    #[serde(default)]
    pub local: Option<LocalActor>,
    #[serde(default)]
    pub actors: Vec<ActorSnapshot>,
    #[serde(default)]
    pub gestures: Vec<TraceGesture>,
    #[serde(default = "default_true")]
    pub feed_ready: bool,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TraceGesture {
    pub gesture_id: GestureId,
    pub origin: ActorId,
    #[serde(default)]
    pub target: ActorId,
}

fn default_true() -> bool {
    true
}

#[derive(Debug)]
pub struct ReplayOutcome {
    pub frames: usize,
    pub notices: Vec<CountNotice>,
    pub summary: String,
    pub config: LapConfig,
}

pub fn load_trace(path: &Path) -> Result<FrameTrace, LapError> {
    let content = fs_err::read_to_string(path).map_err(|source| LapError::Io {
        context: format!("reading trace {}", path.display()),
        source,
    })?;
    parse_trace(&content)
}

pub fn parse_trace(content: &str) -> Result<FrameTrace, LapError> {
    serde_json::from_str(content).map_err(|source| LapError::Json {
        context: "parsing frame trace".to_string(),
        source,
    })
}

pub fn replay(trace: &FrameTrace, config: LapConfig, debug_enabled: bool) -> ReplayOutcome {
    let mut engine = LapEngine::new(config, MemorySink::default());
    engine.set_debug_enabled(debug_enabled);

    let cell = GestureCell::new();
    let mut now = trace.start.unwrap_or_else(Utc::now);
    let mut notices = Vec::new();

    for (index, frame) in trace.frames.iter().enumerate() {
        cell.set_ready(frame.feed_ready);
        cell.set_local_actor(frame.local.map(|local| local.id));
        for gesture in &frame.gestures {
            cell.observe(GestureEvent {
                gesture_id: gesture.gesture_id,
                origin: gesture.origin,
                target: gesture.target,
                at: now,
            });
        }

        let world = StaticSnapshot {
            local: frame.local,
            actors: frame.actors.clone(),
        };
        engine.tick(frame.dt, now, &world, &cell);

        for notice in engine.drain_notices() {
            debug!(frame = index, key = %notice.key, "Replay count");
            notices.push(notice);
        }

        let step = if frame.dt > 0.0 { frame.dt } else { 1.0 / 60.0 };
        now += Duration::microseconds((f64::from(step) * 1_000_000.0).round() as i64);
    }

    // Close any lap still running at the end of the trace.
    engine.reset_current_session();
    if let Err(err) = engine.save() {
        tracing::warn!(error = %err, "Replay save failed");
    }

    info!(frames = trace.frames.len(), counts = notices.len(), "Replay finished");
    ReplayOutcome {
        frames: trace.frames.len(),
        notices,
        summary: engine.totals_summary(),
        config: engine.config().clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sit_trace(frames_after_sit: usize) -> String {
        let local = r#"{ "id": 1, "position": { "x": 0.0, "y": 0.0, "z": 0.0 } }"#;
        let alice = r#"{ "id": 2, "display_name": "Alice", "position": { "x": 0.1, "y": -0.3, "z": 0.1 } }"#;
        let mut frames = vec![format!(
            r#"{{ "dt": 0.125, "local": {local}, "actors": [{alice}], "gestures": [{{ "gesture_id": 50, "origin": 1 }}] }}"#
        )];
        for _ in 0..frames_after_sit {
            frames.push(format!(
                r#"{{ "dt": 0.125, "local": {local}, "actors": [{alice}] }}"#
            ));
        }
        format!(
            r#"{{ "start": "2026-03-01T20:00:00Z", "frames": [{}] }}"#,
            frames.join(",")
        )
    }

    #[test]
    fn test_replay_counts_held_lap() {
        let trace = parse_trace(&sit_trace(20)).unwrap();
        let outcome = replay(&trace, LapConfig::default(), false);

        assert_eq!(outcome.frames, 21);
        assert_eq!(outcome.notices.len(), 1);
        assert_eq!(outcome.config.stats.count_for("Alice"), 1);
        assert!(outcome.summary.starts_with("[Lap Cat Counter] Total laps: 1 across 1 people."));
    }

    #[test]
    fn test_short_trace_does_not_count() {
        let trace = parse_trace(&sit_trace(8)).unwrap();
        let outcome = replay(&trace, LapConfig::default(), true);
        assert!(outcome.notices.is_empty());
        assert_eq!(outcome.config.stats.count_for("Alice"), 0);
    }

    #[test]
    fn test_frames_without_local_actor_are_tolerated() {
        let trace = parse_trace(r#"{ "frames": [{ "dt": 0.1 }, {}] }"#).unwrap();
        let outcome = replay(&trace, LapConfig::default(), false);
        assert_eq!(outcome.frames, 2);
        assert!(outcome.notices.is_empty());
    }

    #[test]
    fn test_malformed_trace_is_an_error() {
        let err = parse_trace("{ \"frames\": 3 }").unwrap_err();
        assert!(matches!(err, LapError::Json { .. }));
    }

    #[test]
    fn test_load_trace_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.json");
        fs_err::write(&path, sit_trace(20)).unwrap();
        let trace = load_trace(&path).unwrap();
        assert_eq!(trace.frames.len(), 21);
        assert!(trace.frames[0].feed_ready);
    }
}
