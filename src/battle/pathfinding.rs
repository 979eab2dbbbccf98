//! A* pathfinding over the battlefield grid
//!
//! The goal is not a fixed cell: the caller supplies a scalar distance
//! field and any cell where it drops to zero or below counts as reached.
//! This lets the same search serve "reach this cell", "get within melee
//! range of an enemy" and "be ten cells farther from the nearest enemy".

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use ahash::AHashMap;

use crate::battle::constants::{BLOCKED_TILE_PENALTY, MAX_PATH_EXPANSIONS};
use crate::battle::grid::Coord;

/// Node in the A* open set
#[derive(Debug, Clone)]
struct PathNode {
    coord: Coord,
    f_cost: f64, // g_cost + heuristic
}

impl PartialEq for PathNode {
    fn eq(&self, other: &Self) -> bool {
        self.coord == other.coord
    }
}

impl Eq for PathNode {}

impl Ord for PathNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap
        other
            .f_cost
            .partial_cmp(&self.f_cost)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for PathNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Find a path from `start` to any cell where `target_distance` is <= 0
///
/// Steps cost their Euclidean length; a cell rejected by `tile_available`
/// costs an extra [`BLOCKED_TILE_PENALTY`] instead of being impassable.
/// The distance field doubles as the heuristic, which is only consistent
/// when it behaves like a true distance - an accepted approximation.
///
/// Returns an empty path when the search hits its expansion cap or
/// when the reconstructed path crosses a non-start cell that fails
/// `tile_available`. Returns the single-element path `[start]` when the
/// goal is already satisfied; callers treat length-1 paths as "no move
/// needed".
pub fn find_path<D, A>(start: Coord, target_distance: D, tile_available: A) -> Vec<Coord>
where
    D: Fn(Coord) -> f64,
    A: Fn(Coord) -> bool,
{
    if target_distance(start) <= 0.0 {
        return vec![start];
    }

    let mut open_set = BinaryHeap::new();
    let mut came_from: AHashMap<Coord, Coord> = AHashMap::new();
    let mut g_scores: AHashMap<Coord, f64> = AHashMap::new();

    g_scores.insert(start, 0.0);
    open_set.push(PathNode {
        coord: start,
        f_cost: target_distance(start),
    });

    let mut expansions = 0usize;

    while let Some(current) = open_set.pop() {
        if target_distance(current.coord) <= 0.0 {
            return reconstruct_path(&came_from, current.coord, start, &tile_available);
        }

        expansions += 1;
        if expansions > MAX_PATH_EXPANSIONS {
            return Vec::new();
        }

        let current_g = *g_scores.get(&current.coord).unwrap_or(&f64::INFINITY);

        for neighbor in current.coord.neighbors() {
            let mut step_cost = current.coord.distance(&neighbor);
            if !tile_available(neighbor) {
                step_cost += BLOCKED_TILE_PENALTY;
            }

            let tentative_g = current_g + step_cost;
            let neighbor_g = *g_scores.get(&neighbor).unwrap_or(&f64::INFINITY);

            if tentative_g < neighbor_g {
                came_from.insert(neighbor, current.coord);
                g_scores.insert(neighbor, tentative_g);

                let f_cost = tentative_g + target_distance(neighbor);
                open_set.push(PathNode {
                    coord: neighbor,
                    f_cost,
                });
            }
        }
    }

    Vec::new() // Open set drained without reaching the goal
}

/// Reconstruct the path from the came_from map
///
/// Every cell except `start` must still pass `tile_available`; otherwise
/// the whole path is rejected. This is how safe-mode callers refuse routes
/// through cells that were merely penalized during the search.
fn reconstruct_path<A>(
    came_from: &AHashMap<Coord, Coord>,
    mut current: Coord,
    start: Coord,
    tile_available: &A,
) -> Vec<Coord>
where
    A: Fn(Coord) -> bool,
{
    let mut path = vec![current];
    while let Some(&prev) = came_from.get(&current) {
        if current != start && !tile_available(current) {
            return Vec::new();
        }
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    fn distance_to(target: Coord) -> impl Fn(Coord) -> f64 {
        move |c| c.distance(&target)
    }

    #[test]
    fn test_path_reaches_fixed_target() {
        let start = Coord::new(0, 0);
        let goal = Coord::new(5, 3);

        let path = find_path(start, distance_to(goal), |_| true);

        assert_eq!(path.first(), Some(&start));
        assert_eq!(path.last(), Some(&goal));
    }

    #[test]
    fn test_path_steps_are_adjacent() {
        let start = Coord::new(0, 0);
        let goal = Coord::new(6, -2);

        let path = find_path(start, distance_to(goal), |_| true);

        for pair in path.windows(2) {
            assert!(pair[0].distance(&pair[1]) < 1.5);
        }
    }

    #[test]
    fn test_already_at_goal_returns_trivial_path() {
        let start = Coord::new(4, 4);
        let path = find_path(start, distance_to(start), |_| true);
        assert_eq!(path, vec![start]);
    }

    #[test]
    fn test_goal_field_accepts_any_satisfying_cell() {
        // Goal: be at least 3 cells away from the origin.
        let start = Coord::new(0, 0);
        let path = find_path(start, |c| 3.0 - c.distance(&Coord::new(0, 0)), |_| true);

        let end = *path.last().unwrap();
        assert!(end.distance(&Coord::new(0, 0)) >= 3.0);
    }

    #[test]
    fn test_penalized_cell_is_avoided() {
        let start = Coord::new(0, 0);
        let goal = Coord::new(4, 0);
        let blocked = Coord::new(2, 0);

        let path = find_path(start, distance_to(goal), |c| c != blocked);

        assert_eq!(path.last(), Some(&goal));
        assert!(!path.contains(&blocked));
    }

    #[test]
    fn test_optimistic_mode_ignores_availability() {
        let start = Coord::new(0, 0);
        let goal = Coord::new(4, 0);

        let path = find_path(start, distance_to(goal), |_| true);
        assert_eq!(path.last(), Some(&goal));
    }

    #[test]
    fn test_unavailable_wall_rejected_at_reconstruction() {
        // An unbroken wall across every route: the search crosses it by
        // paying the penalty, but reconstruction refuses the crossing cell,
        // so no path is returned.
        let start = Coord::new(0, 0);
        let goal = Coord::new(4, 0);
        let available = |c: Coord| c.x != 2;

        let path = find_path(start, distance_to(goal), available);
        assert!(path.is_empty());
    }

    #[test]
    fn test_unreachable_goal_returns_empty() {
        // No cell ever satisfies the goal; the expansion cap stops the
        // search on the unbounded grid.
        let start = Coord::new(0, 0);
        let path = find_path(start, |_| 1.0, |_| true);
        assert!(path.is_empty());
    }

    #[test]
    fn test_safe_mode_rejects_occupied_goal() {
        let start = Coord::new(0, 0);
        let goal = Coord::new(3, 0);

        let path = find_path(start, distance_to(goal), |c| c != goal);
        assert!(path.is_empty());
    }

    #[test]
    fn test_first_step_decreases_distance() {
        let start = Coord::new(0, 0);
        let goal = Coord::new(7, 7);

        let path = find_path(start, distance_to(goal), |_| true);
        assert!(path.len() > 1);
        assert!(path[1].distance(&goal) < start.distance(&goal));
    }
}
