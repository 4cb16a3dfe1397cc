//! Core types shared by the gate controller, trackers and statistics store.
//!
//! Positions use the game's axis convention: X and Z span the ground plane,
//! Y is height.

use serde::{Deserialize, Serialize};
use std::fmt;

// ═══════════════════════════════════════════════════════════════════════════════
// Geometry
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn distance(self, other: Vec3) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Actors
// ═══════════════════════════════════════════════════════════════════════════════

/// Unique per actor instance for the lifetime of a zone.
pub type ActorId = u64;

/// One visible actor for one frame. Borrowed by the trackers for a single update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorSnapshot {
    pub id: ActorId,
    pub display_name: String,
    pub position: Vec3,
}

impl ActorSnapshot {
    pub fn new(id: ActorId, display_name: impl Into<String>, position: Vec3) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            position,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocalActor {
    pub id: ActorId,
    pub position: Vec3,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Interaction Direction
// ═══════════════════════════════════════════════════════════════════════════════

/// Which way a lap interaction points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// The local player sat in someone else's lap.
    Outgoing,
    /// Someone else sat in the local player's lap.
    Incoming,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::Outgoing, Direction::Incoming];

    pub fn index(self) -> usize {
        match self {
            Direction::Outgoing => 0,
            Direction::Incoming => 1,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Outgoing => write!(f, "outgoing"),
            Direction::Incoming => write!(f, "incoming"),
        }
    }
}
