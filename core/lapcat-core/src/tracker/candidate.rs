//! Candidate selection: which nearby player, if any, is the lap partner.
//!
//! Offsets are local minus other, so a positive `dy` means the local player is
//! higher. All bounds are inclusive.

use crate::config::LapConfig;
use crate::types::{ActorId, ActorSnapshot, Direction, Vec3};

/// Threshold set for one direction, resolved from config and policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub radius: f32,
    pub xy: f32,
    pub dy_min: f32,
    pub dy_max: f32,
}

impl Thresholds {
    pub fn resolve(config: &LapConfig, direction: Direction, radius_cap: Option<f32>) -> Self {
        let radius = match radius_cap {
            Some(cap) => config.radius.min(cap),
            None => config.radius,
        };
        let (dy_min, dy_max) = match direction {
            Direction::Outgoing => (config.min_z_above, config.max_z_above),
            Direction::Incoming => (-config.max_z_above, config.sat_on_you_equal_z_tolerance),
        };
        Self {
            radius,
            xy: config.xy_threshold,
            dy_min,
            dy_max,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateMetrics {
    pub dx: f32,
    pub dy: f32,
    pub dz: f32,
    pub horizontal_xz: f32,
    pub distance_3d: f32,
    pub pass_radius: bool,
    pub pass_xy: bool,
    pub pass_z: bool,
}

impl CandidateMetrics {
    pub fn measure(local: Vec3, other: Vec3, thresholds: &Thresholds) -> Self {
        let dx = local.x - other.x;
        let dz = local.z - other.z;
        let dy = local.y - other.y;

        let horizontal_xz = (dx * dx + dz * dz).sqrt();
        let distance_3d = (dx * dx + dz * dz + dy * dy).sqrt();

        Self {
            dx,
            dy,
            dz,
            horizontal_xz,
            distance_3d,
            pass_radius: distance_3d <= thresholds.radius,
            pass_xy: dx.abs() <= thresholds.xy && dz.abs() <= thresholds.xy,
            pass_z: dy >= thresholds.dy_min && dy <= thresholds.dy_max,
        }
    }

    pub fn qualifies(&self) -> bool {
        self.pass_radius && self.pass_xy && self.pass_z
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Measured<'a> {
    pub actor: &'a ActorSnapshot,
    pub metrics: CandidateMetrics,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScanResult<'a> {
    /// Closest qualifying player; the first one wins ties.
    pub best: Option<Measured<'a>>,
    /// Closest evaluated player regardless of thresholds.
    pub nearest: Option<Measured<'a>>,
    pub evaluated: usize,
}

pub fn scan<'a>(
    local: Vec3,
    others: &'a [ActorSnapshot],
    required_actor: Option<ActorId>,
    thresholds: &Thresholds,
) -> ScanResult<'a> {
    let mut result = ScanResult::default();

    for actor in others {
        if required_actor.is_some_and(|id| id != actor.id) {
            continue;
        }
        if actor.display_name.trim().is_empty() || !actor.position.is_finite() {
            continue;
        }

        let metrics = CandidateMetrics::measure(local, actor.position, thresholds);
        let measured = Measured { actor, metrics };
        result.evaluated += 1;

        if result
            .nearest
            .map_or(true, |n| metrics.distance_3d < n.metrics.distance_3d)
        {
            result.nearest = Some(measured);
        }

        if metrics.qualifies()
            && result
                .best
                .map_or(true, |b| metrics.distance_3d < b.metrics.distance_3d)
        {
            result.best = Some(measured);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> Thresholds {
        Thresholds::resolve(&LapConfig::default(), Direction::Outgoing, None)
    }

    fn actor(id: ActorId, name: &str, x: f32, y: f32, z: f32) -> ActorSnapshot {
        ActorSnapshot::new(id, name, Vec3::new(x, y, z))
    }

    #[test]
    fn test_player_below_qualifies_outgoing() {
        let others = [actor(2, "Alice", 0.1, -0.3, 0.1)];
        let result = scan(Vec3::ZERO, &others, None, &thresholds());
        let best = result.best.unwrap();
        assert_eq!(best.actor.display_name, "Alice");
        assert!((best.metrics.distance_3d - 0.3317).abs() < 1e-3);
        assert!((best.metrics.dy - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_player_above_fails_outgoing_band() {
        let others = [actor(2, "Alice", 0.1, 0.1, 0.1)];
        let result = scan(Vec3::ZERO, &others, None, &thresholds());
        assert!(result.best.is_none());
        let nearest = result.nearest.unwrap();
        assert!(nearest.metrics.pass_radius && nearest.metrics.pass_xy);
        assert!(!nearest.metrics.pass_z);
    }

    #[test]
    fn test_incoming_band_allows_level_or_below() {
        let config = LapConfig::default();
        let t = Thresholds::resolve(&config, Direction::Incoming, None);
        assert_eq!(t.dy_min, -config.max_z_above);
        assert_eq!(t.dy_max, config.sat_on_you_equal_z_tolerance);

        let others = [actor(2, "Bob", 0.0, 0.3, 0.1)];
        assert!(scan(Vec3::ZERO, &others, None, &t).best.is_some());
        let others = [actor(2, "Bob", 0.0, -0.3, 0.1)];
        assert!(scan(Vec3::ZERO, &others, None, &t).best.is_none());
    }

    #[test]
    fn test_radius_cap_tightens_radius() {
        let t = Thresholds::resolve(&LapConfig::default(), Direction::Incoming, Some(0.5));
        assert_eq!(t.radius, 0.5);
        let t = Thresholds::resolve(&LapConfig::default(), Direction::Incoming, Some(2.0));
        assert_eq!(t.radius, 0.90);
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let t = Thresholds {
            radius: 1.0,
            xy: 0.5,
            dy_min: 0.0,
            dy_max: 0.25,
        };
        let on_xy = CandidateMetrics::measure(Vec3::new(0.5, 0.25, -0.5), Vec3::ZERO, &t);
        assert!(on_xy.pass_xy && on_xy.pass_z && on_xy.pass_radius);

        let beyond = CandidateMetrics::measure(
            Vec3::new(f32::from_bits(0.5f32.to_bits() + 1), 0.25, 0.0),
            Vec3::ZERO,
            &t,
        );
        assert!(!beyond.pass_xy);

        let too_high = CandidateMetrics::measure(
            Vec3::new(0.0, f32::from_bits(0.25f32.to_bits() + 1), 0.0),
            Vec3::ZERO,
            &t,
        );
        assert!(!too_high.pass_z);
    }

    fn next_up(v: f32) -> f32 {
        f32::from_bits(v.to_bits() + 1)
    }

    fn next_down(v: f32) -> f32 {
        f32::from_bits(v.to_bits() - 1)
    }

    #[test]
    fn test_radius_bound_is_exact() {
        let t = Thresholds {
            radius: 1.0,
            xy: 2.0,
            dy_min: -2.0,
            dy_max: 2.0,
        };
        let at = CandidateMetrics::measure(Vec3::new(1.0, 0.0, 0.0), Vec3::ZERO, &t);
        assert_eq!(at.distance_3d, 1.0);
        assert!(at.pass_radius);

        let past = CandidateMetrics::measure(Vec3::new(next_up(1.0), 0.0, 0.0), Vec3::ZERO, &t);
        assert!(past.distance_3d > 1.0);
        assert!(!past.pass_radius);
    }

    #[test]
    fn test_min_height_bound_is_exact() {
        let config = LapConfig::default();
        let t = Thresholds::resolve(&config, Direction::Outgoing, None);

        let at = CandidateMetrics::measure(Vec3::new(0.0, config.min_z_above, 0.0), Vec3::ZERO, &t);
        assert_eq!(at.dy, config.min_z_above);
        assert!(at.pass_z && at.qualifies());

        let under = CandidateMetrics::measure(
            Vec3::new(0.0, next_down(config.min_z_above), 0.0),
            Vec3::ZERO,
            &t,
        );
        assert!(!under.pass_z);
    }

    #[test]
    fn test_depth_offset_bound_is_exact() {
        let t = Thresholds {
            radius: 1.0,
            xy: 0.5,
            dy_min: 0.0,
            dy_max: 0.25,
        };
        let at = CandidateMetrics::measure(Vec3::new(0.0, 0.1, -0.5), Vec3::ZERO, &t);
        assert!(at.pass_xy);

        let past = CandidateMetrics::measure(Vec3::new(0.0, 0.1, -next_up(0.5)), Vec3::ZERO, &t);
        assert!(past.pass_radius && past.pass_z);
        assert!(!past.pass_xy);
    }

    #[test]
    fn test_closest_qualifier_wins_and_ties_keep_first() {
        let others = [
            actor(2, "Far", 0.2, -0.3, 0.2),
            actor(3, "Near", 0.05, -0.3, 0.0),
            actor(4, "NearTwin", -0.05, -0.3, 0.0),
        ];
        let result = scan(Vec3::ZERO, &others, None, &thresholds());
        assert_eq!(result.best.unwrap().actor.display_name, "Near");
    }

    #[test]
    fn test_required_actor_filters_others() {
        let others = [actor(2, "Near", 0.0, -0.3, 0.0), actor(3, "Gesturer", 0.2, -0.3, 0.2)];
        let result = scan(Vec3::ZERO, &others, Some(3), &thresholds());
        assert_eq!(result.best.unwrap().actor.id, 3);
        assert_eq!(result.evaluated, 1);
    }

    #[test]
    fn test_blank_names_and_bad_positions_skipped() {
        let others = [
            actor(2, "  ", 0.0, -0.3, 0.0),
            actor(3, "Ghost", f32::NAN, -0.3, 0.0),
        ];
        let result = scan(Vec3::ZERO, &others, None, &thresholds());
        assert!(result.best.is_none());
        assert!(result.nearest.is_none());
        assert_eq!(result.evaluated, 0);
    }
}
