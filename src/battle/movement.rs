//! Per-tick movement resolution
//!
//! Three passes over every living squad of the current turn:
//!
//! 1. Desire formulation: each squad pathfinds optimistically (every cell
//!    available) and records the first step as a non-binding desire.
//! 2. Desire arbitration: desires drain one contested cell at a time -
//!    free cells go to the highest-priority contender, mutual swaps are
//!    committed through a sentinel position, everything else is blocked.
//! 3. Safe fallback: squads that did not move repath over unoccupied
//!    cells only and step directly.
//!
//! Arbitration must fully drain before combat runs; the resolver owns the
//! turn's position index for the whole tick.

use ahash::AHashSet;
use serde::{Deserialize, Serialize};

use crate::battle::execution::Battle;
use crate::battle::grid::{floored_centroid, Coord};
use crate::battle::orders::{
    self, Order, OrderContext, OrderKind, TargetDistanceFn, NO_ORDER_PRIORITY,
};
use crate::battle::pathfinding::find_path;
use crate::battle::turns::Turn;
use crate::battle::units::{BattleUnit, Squad, UnitId};
use crate::core::error::{BattleError, Result};
use crate::core::types::Tick;

/// Off-grid holding cell used while committing a position swap, so the
/// uniqueness invariant holds even mid-swap. Never externally observable.
const SWAP_SENTINEL: Coord = Coord {
    x: i32::MIN,
    z: i32::MIN,
};

/// Counters from one movement pass
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MovementReport {
    pub desires_granted: usize,
    pub swaps: usize,
    pub blocked: usize,
    pub fallback_moves: usize,
    /// Fallback commits dropped because the cell was already taken - the
    /// tolerated edge case, counted for diagnosis
    pub collisions_dropped: usize,
}

/// Resolve movement for the latest turn
pub(crate) fn resolve_movement(battle: &mut Battle) -> Result<MovementReport> {
    let mut report = MovementReport::default();
    let mut completed_moves: Vec<UnitId> = Vec::new();

    {
        let Battle {
            ref units,
            ref squads,
            ref soldiers,
            ref mut turns,
            ref mut fallback_collisions,
            ..
        } = *battle;
        let turn = turns.last_mut().ok_or(BattleError::NotStarted)?;
        let turn_num = turn.num;

        // Resolve every unit's order for this turn up front; AI orders
        // depend on the soldier-count ratio as of turn start.
        let living = turn.living_by_side(units, squads, soldiers);
        for row in &mut turn.units {
            row.order = orders::resolved_order(&units[row.unit.index()], living, turn_num);
        }

        // Liveness and side are fixed for the duration of the tick's
        // movement; positions are not.
        let wounds = turn.wound_map();
        let alive: Vec<bool> = turn
            .squads
            .iter()
            .map(|row| {
                squads[row.squad.index()]
                    .soldiers
                    .iter()
                    .any(|s| wounds.get(s).is_some_and(|w| !w.is_dead()))
            })
            .collect();
        let side_of: Vec<bool> = turn
            .squads
            .iter()
            .map(|row| units[squads[row.squad.index()].unit.index()].side_z)
            .collect();

        // ===== PASS 1: optimistic desires =====
        for si in 0..turn.squads.len() {
            let Some(f) = squad_distance(turn, units, squads, &alive, &side_of, si, turn_num)
            else {
                continue;
            };
            let pos = turn.squads[si].pos;
            if f(pos) <= 0.0 {
                continue;
            }
            let path = find_path(pos, |c| f(c), |_| true);
            if let Some(&step) = path.get(1) {
                turn.squads[si].desired_pos = Some(step);
            }
        }

        // ===== PASS 2: desire arbitration =====
        let priority_of: Vec<u8> = turn
            .squads
            .iter()
            .map(|row| {
                let unit_id = squads[row.squad.index()].unit;
                match turn.unit_row(unit_id).and_then(|r| r.order) {
                    Some(order) => order.kind.priority(),
                    None => NO_ORDER_PRIORITY,
                }
            })
            .collect();

        loop {
            let Some(first) = turn.squads.iter().position(|s| s.desired_pos.is_some()) else {
                break;
            };
            let want = turn.squads[first].desired_pos.unwrap();
            let contenders: Vec<usize> = (0..turn.squads.len())
                .filter(|&i| turn.squads[i].desired_pos == Some(want))
                .collect();

            match turn.squad_at(want) {
                None => {
                    // Free cell: highest priority wins, the rest lose
                    // their desire without moving.
                    let &winner = contenders
                        .iter()
                        .max_by_key(|&&i| priority_of[i])
                        .expect("at least one contender");
                    for &c in &contenders {
                        turn.squads[c].desired_pos = None;
                    }
                    turn.squads[winner].pos = want;
                    turn.squads[winner].moved_this_turn = true;
                    report.desires_granted += 1;
                }
                Some(occupier) => {
                    let occupier_want = turn.squads[occupier].desired_pos;
                    let partner = occupier_want.and_then(|ow| {
                        contenders.iter().copied().find(|&c| turn.squads[c].pos == ow)
                    });
                    match partner {
                        Some(partner) => {
                            // Mutual swap: commit through the sentinel so
                            // no two rows ever share a cell.
                            let occupier_dest = occupier_want.expect("partner implies desire");
                            turn.squads[occupier].pos = SWAP_SENTINEL;
                            turn.squads[partner].pos = want;
                            turn.squads[partner].moved_this_turn = true;
                            turn.squads[occupier].pos = occupier_dest;
                            turn.squads[occupier].moved_this_turn = true;
                            turn.squads[occupier].desired_pos = None;
                            for &c in &contenders {
                                turn.squads[c].desired_pos = None;
                            }
                            report.swaps += 1;
                        }
                        None => {
                            // Occupied and no swap possible: everyone
                            // contesting the cell is blocked.
                            report.blocked += contenders.len();
                            for &c in &contenders {
                                turn.squads[c].desired_pos = None;
                            }
                        }
                    }
                }
            }
        }

        // ===== PASS 3: safe fallback =====
        let mut occupied: AHashSet<Coord> = turn.squads.iter().map(|s| s.pos).collect();
        for si in 0..turn.squads.len() {
            if turn.squads[si].moved_this_turn {
                continue;
            }
            let Some(f) = squad_distance(turn, units, squads, &alive, &side_of, si, turn_num)
            else {
                continue;
            };
            let pos = turn.squads[si].pos;
            if f(pos) <= 0.0 {
                continue;
            }
            let path = find_path(pos, |c| f(c), |c| !occupied.contains(&c));
            if let Some(&step) = path.get(1) {
                if occupied.contains(&step) {
                    // Reconstruction already filtered occupied cells, so a
                    // hit here means this tick's bookkeeping went stale.
                    // Drop the move rather than break the uniqueness
                    // invariant, and keep count.
                    *fallback_collisions += 1;
                    report.collisions_dropped += 1;
                    tracing::warn!(x = step.x, z = step.z, "fallback move dropped: cell taken");
                    continue;
                }
                occupied.remove(&pos);
                occupied.insert(step);
                turn.squads[si].pos = step;
                turn.squads[si].moved_this_turn = true;
                report.fallback_moves += 1;
            }
        }

        // ===== FINALIZE: unit centroids and order completion =====
        for ui in 0..turn.units.len() {
            let unit_id = turn.units[ui].unit;
            let unit = &units[unit_id.index()];
            let positions: Vec<Coord> = unit
                .squads
                .iter()
                .filter_map(|&sq| {
                    let row = turn.squads.iter().position(|r| r.squad == sq)?;
                    alive[row].then(|| turn.squads[row].pos)
                })
                .collect();
            if !positions.is_empty() {
                turn.units[ui].pos = floored_centroid(&positions);
            }

            if let Some(order) = turn.units[ui].order {
                if let OrderKind::Move { target } = order.kind {
                    if !order.done && turn.units[ui].pos == target {
                        turn.units[ui].order = Some(Order { done: true, ..order });
                        completed_moves.push(unit_id);
                    }
                }
            }
        }
    }

    // Completion sticks to the unit's standing order so later turns see
    // it done.
    for unit_id in completed_moves {
        if let Some(order) = battle.units[unit_id.index()].order.as_mut() {
            if matches!(order.kind, OrderKind::Move { .. }) {
                order.done = true;
            }
        }
    }

    Ok(report)
}

/// Positions of living squads on the opposite side
fn enemy_positions(turn: &Turn, alive: &[bool], side_of: &[bool], my_side: bool) -> Vec<Coord> {
    turn.squads
        .iter()
        .enumerate()
        .filter(|&(i, _)| alive[i] && side_of[i] != my_side)
        .map(|(_, row)| row.pos)
        .collect()
}

/// Build the distance-to-goal field for one squad row, if its order moves
/// it at all
fn squad_distance(
    turn: &Turn,
    units: &[BattleUnit],
    squads: &[Squad],
    alive: &[bool],
    side_of: &[bool],
    si: usize,
    turn_num: Tick,
) -> Option<TargetDistanceFn> {
    if !alive[si] {
        return None;
    }
    let row = &turn.squads[si];
    let squad = &squads[row.squad.index()];
    let order = turn.unit_row(squad.unit)?.order?;
    let ctx = OrderContext {
        squad_pos: row.pos,
        offset_to_unit: squad.offset_to_unit,
        squad_starting_pos: squad.starting_pos,
        side_z: side_of[si],
        turn: turn_num,
        enemy_positions: enemy_positions(turn, alive, side_of, side_of[si]),
    };
    orders::target_distance(&order, &ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::execution::testkit::{duel, duel_distance};
    use crate::battle::execution::Battle;
    use crate::battle::turns;

    /// Advance to a fresh turn and resolve movement on it
    fn step(battle: &mut Battle) -> MovementReport {
        let prev = battle.turns.last().unwrap();
        let (next, _) = turns::create_next_turn(prev, &mut battle.units, &battle.squads);
        battle.turns.push(next);
        resolve_movement(battle).unwrap()
    }

    #[test]
    fn test_charging_squad_closes_distance() {
        let mut battle = duel(
            Coord::new(0, -5),
            Some(OrderKind::Charge),
            Coord::new(0, 5),
            Some(OrderKind::Stand),
            4,
        );
        let before = duel_distance(&battle);
        step(&mut battle);
        assert!(duel_distance(&battle) < before);
        battle
            .latest_turn()
            .unwrap()
            .verify_unique_positions()
            .unwrap();
    }

    #[test]
    fn test_charge_stops_inside_melee_range() {
        let mut battle = duel(
            Coord::new(0, 0),
            Some(OrderKind::Charge),
            Coord::new(0, 2),
            Some(OrderKind::Stand),
            4,
        );
        step(&mut battle);
        assert_eq!(duel_distance(&battle), 1.0);

        // Already in range: no further movement.
        let report = step(&mut battle);
        assert_eq!(duel_distance(&battle), 1.0);
        assert_eq!(report.desires_granted, 0);
        assert_eq!(report.fallback_moves, 0);
    }

    #[test]
    fn test_fleeing_squad_never_closes_the_gap() {
        let mut battle = duel(
            Coord::new(0, -2),
            Some(OrderKind::Flee),
            Coord::new(0, 3),
            Some(OrderKind::Stand),
            4,
        );
        let start = duel_distance(&battle);
        let mut last = start;
        for _ in 0..6 {
            step(&mut battle);
            let now = duel_distance(&battle);
            assert!(now >= start);
            assert!(now >= last);
            last = now;
        }
        assert!(last > start);
    }

    #[test]
    fn test_stand_means_no_movement() {
        let mut battle = duel(
            Coord::new(0, -3),
            Some(OrderKind::Stand),
            Coord::new(0, 3),
            Some(OrderKind::Stand),
            4,
        );
        let report = step(&mut battle);
        assert_eq!(duel_distance(&battle), 6.0);
        assert_eq!(report.desires_granted + report.fallback_moves, 0);
        let turn = battle.latest_turn().unwrap();
        assert!(turn.squads.iter().all(|s| !s.moved_this_turn));
    }

    #[test]
    fn test_mutual_swap_exchanges_positions() {
        let a = Coord::new(0, 0);
        let b = Coord::new(0, 1);
        let mut battle = duel(
            a,
            Some(OrderKind::Move { target: b }),
            b,
            Some(OrderKind::Move { target: a }),
            4,
        );
        let report = step(&mut battle);

        assert_eq!(report.swaps, 1);
        let turn = battle.latest_turn().unwrap();
        assert_eq!(turn.squads[0].pos, b);
        assert_eq!(turn.squads[1].pos, a);
        turn.verify_unique_positions().unwrap();

        // Both MOVE orders completed the moment the swap landed them on
        // their targets.
        for row in &turn.units {
            assert!(row.order.unwrap().done);
        }
    }

    #[test]
    fn test_move_order_completes_exactly_on_target() {
        let target = Coord::new(0, -4);
        let mut battle = duel(
            Coord::new(0, -5),
            Some(OrderKind::Move { target }),
            Coord::new(0, 5),
            Some(OrderKind::Stand),
            4,
        );
        step(&mut battle);

        let turn = battle.latest_turn().unwrap();
        assert_eq!(turn.squads[0].pos, target);
        assert_eq!(turn.units[0].pos, target);
        assert!(turn.units[0].order.unwrap().done);
        assert!(battle.units[0].order.unwrap().done);

        // The completed order stays done and stops producing movement.
        step(&mut battle);
        let turn = battle.latest_turn().unwrap();
        assert_eq!(turn.squads[0].pos, target);
        assert!(turn.units[0].order.unwrap().done);
    }

    #[test]
    fn test_blocked_squad_sidesteps_through_fallback() {
        // Bravo stands in the way; Alpha's desire is blocked and the safe
        // fallback routes around the occupied cell.
        let mut battle = duel(
            Coord::new(0, 0),
            Some(OrderKind::Move { target: Coord::new(0, 2) }),
            Coord::new(0, 1),
            Some(OrderKind::Stand),
            4,
        );
        let report = step(&mut battle);

        assert_eq!(report.desires_granted, 0);
        assert!(report.blocked >= 1);
        assert_eq!(report.fallback_moves, 1);

        let turn = battle.latest_turn().unwrap();
        let alpha = turn.squads[0].pos;
        assert!(alpha.z == 1 && alpha.x != 0, "sidestep, got {alpha:?}");
        turn.verify_unique_positions().unwrap();
    }

    #[test]
    fn test_advance_in_formation_walks_forward() {
        let mut battle = duel(
            Coord::new(0, -5),
            Some(OrderKind::AdvanceInFormation),
            Coord::new(0, 5),
            Some(OrderKind::Stand),
            4,
        );
        step(&mut battle);
        // Side z=false advances toward positive z, one cell per turn.
        assert_eq!(battle.latest_turn().unwrap().squads[0].pos, Coord::new(0, -4));
        step(&mut battle);
        assert_eq!(battle.latest_turn().unwrap().squads[0].pos, Coord::new(0, -3));
    }

    #[test]
    fn test_dead_squads_do_not_move() {
        use crate::battle::units::WoundStatus;

        let mut battle = duel(
            Coord::new(0, -5),
            Some(OrderKind::Charge),
            Coord::new(0, 5),
            Some(OrderKind::Stand),
            2,
        );
        // Kill Alpha's soldiers outright.
        {
            let turn = battle.turns.last_mut().unwrap();
            for s in &mut turn.soldiers[0..2] {
                s.wound_status = WoundStatus::Dead;
            }
        }
        // The unit still has rows this turn; movement must skip it, and
        // the next copy-forward prunes it.
        let report = {
            let prev = battle.turns.last().unwrap();
            let (next, pruned) =
                turns::create_next_turn(prev, &mut battle.units, &battle.squads);
            assert_eq!(pruned.len(), 1);
            battle.turns.push(next);
            resolve_movement(&mut battle).unwrap()
        };
        assert_eq!(report.desires_granted + report.fallback_moves, 0);
    }
}
