//! Battle engine constants - all tunable values in one place

// Squads
pub const SQUAD_SIZE: usize = 8;
pub const STARTING_AMMO: u16 = 30;

// Pathfinding
/// Extra traversal cost for a cell the availability check rejects.
/// Soft penalty: squads prefer to go around but can force through.
pub const BLOCKED_TILE_PENALTY: f64 = 20.0;
/// Upper bound on A* expansions before the search gives up and the squad
/// stays put for the tick.
pub const MAX_PATH_EXPANSIONS: usize = 2_500;

// Combat
pub const MELEE_RANGE: f64 = 2.0;
pub const BASE_HIT_PROBABILITY: f64 = 0.5;

// Orders
/// A fleeing squad aims to be this much farther from the nearest enemy
/// than it currently is.
pub const FLEE_SAFETY_MARGIN: f64 = 10.0;
/// Below this living-soldier ratio an AI-controlled unit flees.
pub const AI_FLEE_RATIO: f64 = 0.6;
/// AI units advance in formation until this turn, then charge.
pub const AI_ADVANCE_TURNS: u32 = 10;

// Battlefield geometry
/// Units whose squads all drift outside this bound (both axes) leave the
/// battle and regroup.
pub const BATTLEFIELD_BOUND: i32 = 50;
/// The battle ends by disengagement once the closest opposing squads are
/// farther apart than this.
pub const DISENGAGE_DISTANCE: f64 = 40.0;
/// Distance from the midline to each side's advanced line (line 0).
pub const DEPLOYMENT_DEPTH: i32 = 10;

// Reinforcement placement scan (relative to the joining side, before
// side mirroring)
pub const REINFORCE_Z_MIN: i32 = 30;
pub const REINFORCE_Z_MAX: i32 = 48;
pub const REINFORCE_X_MAX: i32 = 20;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_separation_within_disengage_radius() {
        // Both sides deploy DEPLOYMENT_DEPTH from the midline; if that gap
        // exceeded the disengagement radius every battle would end on turn 1.
        assert!(((DEPLOYMENT_DEPTH * 2) as f64) < DISENGAGE_DISTANCE);
    }

    #[test]
    fn test_reinforcements_arrive_inside_battlefield() {
        assert!(REINFORCE_Z_MAX <= BATTLEFIELD_BOUND);
        assert!(REINFORCE_X_MAX <= BATTLEFIELD_BOUND);
    }

    #[test]
    fn test_blocked_penalty_dominates_step_cost() {
        // A diagonal step costs sqrt(2); the penalty must dwarf it so a
        // detour is always preferred when one exists.
        assert!(BLOCKED_TILE_PENALTY > 10.0 * std::f64::consts::SQRT_2);
    }
}
