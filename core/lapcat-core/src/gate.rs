//! Turns sit gestures into a per-direction "lap may be happening" gate.
//!
//! ```text
//!            sit gesture seen                settle delay elapsed
//! closed ─────────────────────▶ settling ─────────────────────────▶ open
//!   ▲                               │                                 │
//!   │   hook lifetime expired, moved > MOVE_CANCEL_DISTANCE in a frame, │
//!   └───────────── or gesture feed not ready ◀──────────────────────────┘
//! ```
//!
//! The settle delay covers the gesture's own wind-up animation, during which the
//! character is still sliding into place. Movement is measured frame to frame,
//! not from where the gesture happened, so slow drift does not cancel a session.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::feed::GestureFeed;
use crate::gesture_ids::GestureId;
use crate::types::{ActorId, Direction, Vec3};

/// How old a gesture may be and still open a gate. Wide enough to survive a
/// long frame while the gesture loads; `last_trigger_at` stops re-reads.
pub const DETECTION_WINDOW_MS: i64 = 2_000;
/// Delay between the gesture and the gate opening.
pub const SETTLE_DELAY_SECS: f32 = 0.5;
/// Per-frame movement that cancels an open or settling gate.
pub const MOVE_CANCEL_DISTANCE: f32 = 0.25;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GateState {
    pub remaining_active: f32,
    pub remaining_settle: f32,
    /// Local position last frame while the gate was alive.
    pub anchor: Option<Vec3>,
    /// Incoming only: the actor whose gesture opened the gate.
    pub required_actor: Option<ActorId>,
    last_trigger_at: Option<DateTime<Utc>>,
}

impl GateState {
    pub fn is_active(&self) -> bool {
        self.remaining_active > 0.0 && self.remaining_settle <= 0.0
    }

    pub fn is_alive(&self) -> bool {
        self.remaining_active > 0.0
    }

    /// Closes the gate. The last trigger time survives so the same gesture
    /// cannot reopen it.
    fn close(&mut self) {
        self.remaining_active = 0.0;
        self.remaining_settle = 0.0;
        self.anchor = None;
        self.required_actor = None;
    }
}

/// What the trackers consume each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GateSignal {
    pub active: bool,
    pub required_actor: Option<ActorId>,
}

#[derive(Debug, Clone, Copy)]
pub struct GateInput {
    pub dt: f32,
    pub now: DateTime<Utc>,
    pub local_position: Vec3,
    pub gesture_ids: [GestureId; 2],
    pub hook_seconds: f32,
    /// When false the outgoing gate stays open and counts on proximity alone.
    /// The incoming gate stays closed.
    pub require_gesture: bool,
}

#[derive(Debug, Default)]
pub struct GateController {
    states: [GateState; 2],
    bypassed: bool,
    feed_unavailable_reported: bool,
}

impl GateController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, direction: Direction) -> &GateState {
        &self.states[direction.index()]
    }

    pub fn signal(&self, direction: Direction) -> GateSignal {
        if self.bypassed {
            return GateSignal {
                active: direction == Direction::Outgoing,
                required_actor: None,
            };
        }
        let state = self.state(direction);
        GateSignal {
            active: state.is_active(),
            required_actor: if state.is_active() {
                state.required_actor
            } else {
                None
            },
        }
    }

    pub fn clear_all(&mut self) {
        for state in &mut self.states {
            state.close();
        }
    }

    /// Refreshes the lifetime of an open gate while a lap is being held.
    pub fn sustain(&mut self, direction: Direction, hook_seconds: f32) {
        let state = &mut self.states[direction.index()];
        if state.is_active() && state.remaining_active < hook_seconds {
            state.remaining_active = hook_seconds;
        }
    }

    pub fn update(&mut self, feed: &dyn GestureFeed, input: &GateInput) -> [GateSignal; 2] {
        if !input.require_gesture {
            if !self.bypassed {
                debug!("Sit gesture not required; outgoing gate held open");
            }
            self.bypassed = true;
            self.clear_all();
            return [
                self.signal(Direction::Outgoing),
                self.signal(Direction::Incoming),
            ];
        }
        self.bypassed = false;

        if !feed.is_ready() {
            if !self.feed_unavailable_reported {
                warn!("Gesture feed unavailable; lap counting is disabled");
                self.feed_unavailable_reported = true;
            }
            self.clear_all();
            return [GateSignal::default(); 2];
        }

        for direction in Direction::ALL {
            self.update_direction(direction, feed, input);
        }

        [
            self.signal(Direction::Outgoing),
            self.signal(Direction::Incoming),
        ]
    }

    fn update_direction(&mut self, direction: Direction, feed: &dyn GestureFeed, input: &GateInput) {
        let state = &mut self.states[direction.index()];
        let dt = input.dt.max(0.0);

        state.remaining_active = (state.remaining_active - dt).max(0.0);
        state.remaining_settle = (state.remaining_settle - dt).max(0.0);

        let window = Duration::milliseconds(DETECTION_WINDOW_MS);
        let hit = input
            .gesture_ids
            .iter()
            .filter_map(|&gesture| feed.recent(direction, gesture, window, input.now))
            .find(|hit| state.last_trigger_at != Some(hit.at));

        if let Some(hit) = hit {
            state.last_trigger_at = Some(hit.at);
            state.remaining_active = input.hook_seconds.max(0.0);
            state.remaining_settle = SETTLE_DELAY_SECS;
            state.anchor = Some(input.local_position);
            state.required_actor = match direction {
                Direction::Outgoing => None,
                Direction::Incoming => Some(hit.origin),
            };
            debug!(
                direction = %direction,
                origin = hit.origin,
                hook_seconds = input.hook_seconds,
                "Sit gesture opened gate"
            );
        }

        if !state.is_alive() {
            if state.anchor.is_some() {
                debug!(direction = %direction, "Gate expired");
            }
            state.close();
            return;
        }

        let moved = state
            .anchor
            .map_or(0.0, |anchor| input.local_position.distance(anchor));
        if moved > MOVE_CANCEL_DISTANCE {
            debug!(direction = %direction, moved, "Gate cancelled by movement");
            state.close();
            return;
        }
        state.anchor = Some(input.local_position);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{GestureCell, GestureEvent};
    use chrono::TimeZone;

    const LOCAL: ActorId = 1;
    const OTHER: ActorId = 2;
    const SIT: GestureId = 50;
    const GROUND_SIT: GestureId = 52;
    const FRAME: f32 = 0.1;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 20, 0, 0).unwrap()
    }

    fn ready_cell() -> GestureCell {
        let cell = GestureCell::new();
        cell.set_ready(true);
        cell.set_local_actor(Some(LOCAL));
        cell
    }

    fn input(now: DateTime<Utc>, position: Vec3) -> GateInput {
        GateInput {
            dt: FRAME,
            now,
            local_position: position,
            gesture_ids: [SIT, GROUND_SIT],
            hook_seconds: 6.0,
            require_gesture: true,
        }
    }

    /// Runs `frames` frames starting at `start`, returning the last signals.
    fn run(
        gate: &mut GateController,
        cell: &GestureCell,
        start: DateTime<Utc>,
        frames: usize,
        position: Vec3,
    ) -> [GateSignal; 2] {
        let mut signals = [GateSignal::default(); 2];
        for i in 0..frames {
            let now = start + Duration::milliseconds(100 * i as i64);
            signals = gate.update(cell, &input(now, position));
        }
        signals
    }

    #[test]
    fn test_local_sit_opens_outgoing_after_settle() {
        let cell = ready_cell();
        let mut gate = GateController::new();
        cell.observe(GestureEvent {
            gesture_id: SIT,
            origin: LOCAL,
            target: 0,
            at: t0(),
        });

        let signals = gate.update(&cell, &input(t0(), Vec3::ZERO));
        assert!(!signals[0].active, "settling gate must not be active");
        assert!(gate.state(Direction::Outgoing).is_alive());

        let signals = run(&mut gate, &cell, t0() + Duration::milliseconds(100), 7, Vec3::ZERO);
        assert!(signals[0].active);
        assert!(!signals[1].active);
        assert_eq!(signals[0].required_actor, None);
    }

    #[test]
    fn test_incoming_gate_requires_origin_actor() {
        let cell = ready_cell();
        let mut gate = GateController::new();
        cell.observe(GestureEvent {
            gesture_id: GROUND_SIT,
            origin: OTHER,
            target: LOCAL,
            at: t0(),
        });

        let signals = run(&mut gate, &cell, t0(), 7, Vec3::ZERO);
        assert!(signals[1].active);
        assert_eq!(signals[1].required_actor, Some(OTHER));
        assert!(!signals[0].active);
    }

    #[test]
    fn test_gate_expires_after_hook_lifetime() {
        let cell = ready_cell();
        let mut gate = GateController::new();
        cell.observe(GestureEvent {
            gesture_id: SIT,
            origin: LOCAL,
            target: 0,
            at: t0(),
        });

        let signals = run(&mut gate, &cell, t0(), 59, Vec3::ZERO);
        assert!(signals[0].active);
        let signals = run(&mut gate, &cell, t0() + Duration::seconds(6), 3, Vec3::ZERO);
        assert!(!signals[0].active);
        assert_eq!(gate.state(Direction::Outgoing).anchor, None);
    }

    #[test]
    fn test_same_event_does_not_reopen() {
        let cell = ready_cell();
        let mut gate = GateController::new();
        cell.observe(GestureEvent {
            gesture_id: SIT,
            origin: LOCAL,
            target: 0,
            at: t0(),
        });

        gate.update(&cell, &input(t0(), Vec3::ZERO));
        gate.update(&cell, &input(t0() + Duration::milliseconds(100), Vec3::ZERO));
        // Second read inside the window must not restart the settle delay.
        assert!(gate.state(Direction::Outgoing).remaining_settle < SETTLE_DELAY_SECS);
    }

    #[test]
    fn test_movement_cancels_gate() {
        let cell = ready_cell();
        let mut gate = GateController::new();
        cell.observe(GestureEvent {
            gesture_id: SIT,
            origin: LOCAL,
            target: 0,
            at: t0(),
        });

        let signals = run(&mut gate, &cell, t0(), 7, Vec3::ZERO);
        assert!(signals[0].active);

        let later = t0() + Duration::milliseconds(700);
        let signals = gate.update(&cell, &input(later, Vec3::new(0.3, 0.0, 0.0)));
        assert!(!signals[0].active);
        assert!(!gate.state(Direction::Outgoing).is_alive());
    }

    #[test]
    fn test_slow_drift_does_not_cancel() {
        let cell = ready_cell();
        let mut gate = GateController::new();
        cell.observe(GestureEvent {
            gesture_id: SIT,
            origin: LOCAL,
            target: 0,
            at: t0(),
        });

        let mut signals = [GateSignal::default(); 2];
        for i in 0..10 {
            let now = t0() + Duration::milliseconds(100 * i);
            let position = Vec3::new(0.1 * i as f32, 0.0, 0.0);
            signals = gate.update(&cell, &input(now, position));
        }
        assert!(signals[0].active);
    }

    #[test]
    fn test_feed_not_ready_forces_closed() {
        let cell = ready_cell();
        let mut gate = GateController::new();
        cell.observe(GestureEvent {
            gesture_id: SIT,
            origin: LOCAL,
            target: 0,
            at: t0(),
        });
        run(&mut gate, &cell, t0(), 7, Vec3::ZERO);

        cell.set_ready(false);
        let signals = gate.update(&cell, &input(t0() + Duration::milliseconds(700), Vec3::ZERO));
        assert_eq!(signals, [GateSignal::default(); 2]);
        assert!(!gate.state(Direction::Outgoing).is_alive());
        assert_eq!(gate.state(Direction::Outgoing).anchor, None);
    }

    #[test]
    fn test_unresolved_gesture_ids_never_open() {
        let cell = ready_cell();
        let mut gate = GateController::new();
        cell.observe(GestureEvent {
            gesture_id: SIT,
            origin: LOCAL,
            target: 0,
            at: t0(),
        });
        let mut frame = input(t0(), Vec3::ZERO);
        frame.gesture_ids = [0, 0];
        for _ in 0..10 {
            assert!(!gate.update(&cell, &frame)[0].active);
        }
    }

    #[test]
    fn test_gesture_not_required_opens_outgoing_only() {
        let cell = GestureCell::new();
        let mut gate = GateController::new();
        let mut frame = input(t0(), Vec3::ZERO);
        frame.require_gesture = false;

        let signals = gate.update(&cell, &frame);
        assert!(signals[0].active);
        assert_eq!(signals[1], GateSignal::default());
    }

    #[test]
    fn test_gesture_not_required_ignores_incoming_gestures() {
        let cell = ready_cell();
        let mut gate = GateController::new();
        cell.observe(GestureEvent {
            gesture_id: SIT,
            origin: OTHER,
            target: LOCAL,
            at: t0(),
        });
        let mut signals = [GateSignal::default(); 2];
        for i in 0..10 {
            let mut frame = input(t0() + Duration::milliseconds(100 * i), Vec3::ZERO);
            frame.require_gesture = false;
            signals = gate.update(&cell, &frame);
        }
        assert!(signals[0].active);
        assert!(!signals[1].active);
    }

    #[test]
    fn test_late_first_frame_still_opens() {
        let cell = ready_cell();
        let mut gate = GateController::new();
        cell.observe(GestureEvent {
            gesture_id: SIT,
            origin: LOCAL,
            target: 0,
            at: t0(),
        });

        // First frame after the gesture arrives 300 ms late.
        let signals = run(&mut gate, &cell, t0() + Duration::milliseconds(300), 7, Vec3::ZERO);
        assert!(signals[0].active);
    }

    #[test]
    fn test_gesture_older_than_window_is_ignored() {
        let cell = ready_cell();
        let mut gate = GateController::new();
        cell.observe(GestureEvent {
            gesture_id: SIT,
            origin: LOCAL,
            target: 0,
            at: t0(),
        });

        let late = t0() + Duration::milliseconds(DETECTION_WINDOW_MS + 100);
        gate.update(&cell, &input(late, Vec3::ZERO));
        assert!(!gate.state(Direction::Outgoing).is_alive());
    }

    #[test]
    fn test_sustain_extends_open_gate_only() {
        let cell = ready_cell();
        let mut gate = GateController::new();
        gate.sustain(Direction::Outgoing, 6.0);
        assert!(!gate.state(Direction::Outgoing).is_alive());

        cell.observe(GestureEvent {
            gesture_id: SIT,
            origin: LOCAL,
            target: 0,
            at: t0(),
        });
        run(&mut gate, &cell, t0(), 30, Vec3::ZERO);
        let before = gate.state(Direction::Outgoing).remaining_active;
        gate.sustain(Direction::Outgoing, 6.0);
        assert!(gate.state(Direction::Outgoing).remaining_active > before);
    }
}
