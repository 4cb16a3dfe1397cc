//! Per-frame diagnostics for tuning thresholds.

use serde::Serialize;
use std::fmt;

use super::candidate::CandidateMetrics;
use crate::types::{ActorId, ActorSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DebugReason {
    GateInactive,
    /// A failed check ended this gate; waiting for a fresh gesture.
    Latched,
    NoPlayersInRange,
    /// Metrics describe the nearest player, who failed at least one check.
    NoCandidatePassed,
    BestCandidateSelected,
}

impl fmt::Display for DebugReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DebugReason::GateInactive => "gate inactive",
            DebugReason::Latched => "latched until re-gated",
            DebugReason::NoPlayersInRange => "no players in range to evaluate",
            DebugReason::NoCandidatePassed => "no candidate passed thresholds (showing nearest)",
            DebugReason::BestCandidateSelected => "best candidate selected",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LapDebugInfo {
    pub candidate_name: String,
    pub candidate_id: Option<ActorId>,
    pub distance_3d: f32,
    pub horizontal_xz: f32,
    pub dx: f32,
    pub dy: f32,
    pub dz: f32,
    pub pass_radius: bool,
    pub pass_xy: bool,
    pub pass_z: bool,
    pub stable_seconds: f32,
    pub counted_this_gate: bool,
    pub reason: DebugReason,
}

impl LapDebugInfo {
    /// Diagnostic without a measured player.
    pub fn bare(reason: DebugReason, stable_seconds: f32, counted_this_gate: bool) -> Self {
        Self {
            candidate_name: String::new(),
            candidate_id: None,
            distance_3d: 0.0,
            horizontal_xz: 0.0,
            dx: 0.0,
            dy: 0.0,
            dz: 0.0,
            pass_radius: false,
            pass_xy: false,
            pass_z: false,
            stable_seconds,
            counted_this_gate,
            reason,
        }
    }

    pub fn measured(
        actor: &ActorSnapshot,
        metrics: &CandidateMetrics,
        reason: DebugReason,
        stable_seconds: f32,
        counted_this_gate: bool,
    ) -> Self {
        Self {
            candidate_name: actor.display_name.clone(),
            candidate_id: Some(actor.id),
            distance_3d: metrics.distance_3d,
            horizontal_xz: metrics.horizontal_xz,
            dx: metrics.dx,
            dy: metrics.dy,
            dz: metrics.dz,
            pass_radius: metrics.pass_radius,
            pass_xy: metrics.pass_xy,
            pass_z: metrics.pass_z,
            stable_seconds,
            counted_this_gate,
            reason,
        }
    }

    pub fn has_candidate(&self) -> bool {
        self.reason == DebugReason::BestCandidateSelected
    }
}

impl fmt::Display for LapDebugInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.candidate_id.is_none() {
            return write!(f, "reason={}", self.reason);
        }
        write!(
            f,
            "cand={} dist3={:.2} horizXZ={:.2} dx={:.2} dz={:.2} dy={:.2} \
             pass(R/XY/Z)={}/{}/{} stable={:.2} counted={} reason={}",
            self.candidate_name,
            self.distance_3d,
            self.horizontal_xz,
            self.dx,
            self.dz,
            self.dy,
            self.pass_radius,
            self.pass_xy,
            self.pass_z,
            self.stable_seconds,
            self.counted_this_gate,
            self.reason
        )
    }
}
