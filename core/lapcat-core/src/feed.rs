//! Inputs from the host: gesture events and spatial snapshots.
//!
//! # Threading
//!
//! ```text
//! native emote call ──▶ GestureCell::observe   (host thread, any time)
//!                             │  last-value slots behind a Mutex
//!                             ▼
//!            GateController::update ──▶ GestureFeed queries   (frame thread)
//! ```
//!
//! Writers overwrite the latest event per direction (last writer wins). The
//! frame thread only ever holds the lock long enough to copy one record out.

use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::trace;

use crate::error::Result;
use crate::gesture_ids::GestureId;
use crate::types::{ActorId, ActorSnapshot, Direction, LocalActor};

/// Sentinel stored in the local-actor slot while no local player exists.
const NO_LOCAL_ACTOR: u64 = 0;

// ═══════════════════════════════════════════════════════════════════════════════
// Gesture Feed
// ═══════════════════════════════════════════════════════════════════════════════

/// One executed gesture, as seen by the interception callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureEvent {
    pub gesture_id: GestureId,
    pub origin: ActorId,
    /// Target of the gesture; 0 when untargeted.
    pub target: ActorId,
    pub at: DateTime<Utc>,
}

/// A recent gesture matched by a feed query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureHit {
    pub at: DateTime<Utc>,
    /// Actor that performed the gesture.
    pub origin: ActorId,
}

/// Read side of the gesture interception.
///
/// `now` is passed in so the frame thread, not the feed, owns the clock.
pub trait GestureFeed {
    /// False until the interception point is established.
    fn is_ready(&self) -> bool;

    /// Gesture `gesture` performed by the local player within `window` of `now`.
    fn performed_by_local(
        &self,
        gesture: GestureId,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Option<GestureHit>;

    /// Gesture `gesture` performed by someone else targeting the local player.
    fn targeted_at_local(
        &self,
        gesture: GestureId,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Option<GestureHit>;

    fn recent(
        &self,
        direction: Direction,
        gesture: GestureId,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Option<GestureHit> {
        match direction {
            Direction::Outgoing => self.performed_by_local(gesture, window, now),
            Direction::Incoming => self.targeted_at_local(gesture, window, now),
        }
    }
}

/// Last-value cell shared between the interception callback and the frame loop.
#[derive(Debug, Default)]
pub struct GestureCell {
    ready: AtomicBool,
    local_actor: AtomicU64,
    slots: [Mutex<Option<GestureEvent>>; 2],
}

impl GestureCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Release);
    }

    /// Called by the frame thread so the callback can classify events.
    pub fn set_local_actor(&self, actor: Option<ActorId>) {
        self.local_actor
            .store(actor.unwrap_or(NO_LOCAL_ACTOR), Ordering::Release);
    }

    pub fn local_actor(&self) -> Option<ActorId> {
        match self.local_actor.load(Ordering::Acquire) {
            NO_LOCAL_ACTOR => None,
            id => Some(id),
        }
    }

    /// Records an event if it involves the local player. Safe from any thread.
    pub fn observe(&self, event: GestureEvent) {
        let Some(local) = self.local_actor() else {
            return;
        };

        if event.origin == local {
            self.store(Direction::Outgoing, event);
        } else if event.target == local {
            self.store(Direction::Incoming, event);
        } else {
            trace!(
                gesture = event.gesture_id,
                origin = event.origin,
                "Ignoring gesture between other actors"
            );
        }
    }

    pub fn latest(&self, direction: Direction) -> Option<GestureEvent> {
        *self.slots[direction.index()]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn clear(&self) {
        for direction in Direction::ALL {
            self.write_slot(direction, None);
        }
    }

    fn store(&self, direction: Direction, event: GestureEvent) {
        self.write_slot(direction, Some(event));
    }

    fn write_slot(&self, direction: Direction, value: Option<GestureEvent>) {
        let mut slot = self.slots[direction.index()]
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = value;
    }

    fn matching(
        &self,
        direction: Direction,
        gesture: GestureId,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Option<GestureHit> {
        if gesture == 0 {
            return None;
        }
        let event = self.latest(direction)?;
        if event.gesture_id != gesture {
            return None;
        }
        let age = now.signed_duration_since(event.at);
        if age > window {
            return None;
        }
        Some(GestureHit {
            at: event.at,
            origin: event.origin,
        })
    }
}

impl GestureFeed for GestureCell {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    fn performed_by_local(
        &self,
        gesture: GestureId,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Option<GestureHit> {
        self.matching(Direction::Outgoing, gesture, window, now)
    }

    fn targeted_at_local(
        &self,
        gesture: GestureId,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Option<GestureHit> {
        self.matching(Direction::Incoming, gesture, window, now)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Spatial Snapshots
// ═══════════════════════════════════════════════════════════════════════════════

/// Per-frame view of the world around the local player.
pub trait SpatialSnapshotProvider {
    /// `None` while there is no local player (loading screens, logout).
    fn local_actor(&self) -> Option<LocalActor>;

    /// Nearby players excluding the local one. An `Err` item is an actor whose
    /// fields could not be read this frame; it is skipped, not propagated.
    fn nearby_actors(&self) -> Vec<Result<ActorSnapshot>>;
}

/// A fixed snapshot, for replays and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticSnapshot {
    pub local: Option<LocalActor>,
    pub actors: Vec<ActorSnapshot>,
}

impl SpatialSnapshotProvider for StaticSnapshot {
    fn local_actor(&self) -> Option<LocalActor> {
        self.local
    }

    fn nearby_actors(&self) -> Vec<Result<ActorSnapshot>> {
        self.actors.iter().cloned().map(Ok).collect()
    }
}
