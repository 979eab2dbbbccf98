//! Append-only turn history
//!
//! One `Turn` per tick; every row is a snapshot of one identity entity for
//! that turn. Turns are created by copying the previous turn forward and
//! are never mutated once a later turn exists. Pruned units simply stop
//! being copied; dead soldiers keep being copied so their terminal wound
//! state stays visible in the history.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::battle::constants::BATTLEFIELD_BOUND;
use crate::battle::grid::Coord;
use crate::battle::orders::Order;
use crate::battle::units::{
    BattleUnit, CharacterId, Soldier, SoldierId, Squad, SquadId, UnitId, WoundStatus,
};
use crate::core::error::{BattleError, Result};
use crate::core::types::Tick;

/// Existence marker: the character was present on this turn
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CharacterInTurn {
    pub character: CharacterId,
}

/// A unit's snapshot for one turn
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UnitInTurn {
    pub unit: UnitId,
    /// Centroid of the unit's living squads this turn
    pub pos: Coord,
    /// The order the unit followed this turn (resolved, for AI units)
    pub order: Option<Order>,
}

/// What a squad last did, for presentation only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttackKind {
    Melee,
    Ranged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackRecord {
    pub kind: AttackKind,
    pub target: SquadId,
}

/// A squad's snapshot for one turn
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SquadInTurn {
    pub squad: SquadId,
    pub pos: Coord,
    /// Set once the squad has committed a move this tick
    pub moved_this_turn: bool,
    /// The cell this squad wants next, pending arbitration
    pub desired_pos: Option<Coord>,
    pub ammo_remaining: u16,
    pub last_attack: Option<AttackRecord>,
}

impl SquadInTurn {
    pub fn desires_position(&self) -> bool {
        self.desired_pos.is_some()
    }
}

/// A soldier's snapshot for one turn
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SoldierInTurn {
    pub soldier: SoldierId,
    pub wound_status: WoundStatus,
}

/// One tick's worth of battle state
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Turn {
    pub num: Tick,
    pub characters: Vec<CharacterInTurn>,
    pub units: Vec<UnitInTurn>,
    pub squads: Vec<SquadInTurn>,
    pub soldiers: Vec<SoldierInTurn>,
}

impl Turn {
    /// Row index of the squad occupying `pos`, if any
    pub fn squad_at(&self, pos: Coord) -> Option<usize> {
        self.squads.iter().position(|s| s.pos == pos)
    }

    pub fn unit_row(&self, unit: UnitId) -> Option<&UnitInTurn> {
        self.units.iter().find(|u| u.unit == unit)
    }

    pub fn unit_row_mut(&mut self, unit: UnitId) -> Option<&mut UnitInTurn> {
        self.units.iter_mut().find(|u| u.unit == unit)
    }

    pub fn squad_row(&self, squad: SquadId) -> Option<&SquadInTurn> {
        self.squads.iter().find(|s| s.squad == squad)
    }

    /// Wound status of every soldier present this turn
    pub fn wound_map(&self) -> AHashMap<SoldierId, WoundStatus> {
        self.soldiers
            .iter()
            .map(|s| (s.soldier, s.wound_status))
            .collect()
    }

    /// Does the squad have at least one soldier still able to fight?
    pub fn squad_has_living(&self, squad: &Squad) -> bool {
        let wounds = self.wound_map();
        squad
            .soldiers
            .iter()
            .any(|s| wounds.get(s).is_some_and(|w| !w.is_dead()))
    }

    /// Living soldier count per side, indexed by side z
    pub fn living_by_side(
        &self,
        units: &[BattleUnit],
        squads: &[Squad],
        soldiers: &[Soldier],
    ) -> [usize; 2] {
        let mut counts = [0usize; 2];
        for row in &self.soldiers {
            if row.wound_status.is_dead() {
                continue;
            }
            let squad = &squads[soldiers[row.soldier.index()].squad.index()];
            let unit = &units[squad.unit.index()];
            counts[unit.side_z as usize] += 1;
        }
        counts
    }

    /// Check the position-uniqueness invariant across all squad rows
    ///
    /// A violation is a correctness bug in the movement resolver, never a
    /// condition to paper over.
    pub fn verify_unique_positions(&self) -> Result<()> {
        let mut seen: AHashMap<Coord, SquadId> = AHashMap::with_capacity(self.squads.len());
        for row in &self.squads {
            if seen.insert(row.pos, row.squad).is_some() {
                return Err(BattleError::PositionConflict(row.pos));
            }
        }
        Ok(())
    }
}

/// Copy the latest turn forward into a new one, pruning spent units
///
/// A unit is pruned - marked out of battle, excluded from all future
/// turns - when none of its squads remain within the battlefield bounds or
/// when it has no living soldier left. Pruned units are returned so the
/// caller can flag the external records as regrouping.
pub fn create_next_turn(
    prev: &Turn,
    units: &mut [BattleUnit],
    squads: &[Squad],
) -> (Turn, Vec<UnitId>) {
    let mut next = Turn {
        num: prev.num + 1,
        characters: prev.characters.clone(),
        units: Vec::with_capacity(prev.units.len()),
        squads: Vec::with_capacity(prev.squads.len()),
        soldiers: Vec::with_capacity(prev.soldiers.len()),
    };
    let mut pruned = Vec::new();

    let wounds = prev.wound_map();

    for unit_row in &prev.units {
        let unit = &units[unit_row.unit.index()];
        if !unit.in_battle {
            continue;
        }

        let squad_rows: Vec<&SquadInTurn> = unit
            .squads
            .iter()
            .filter_map(|&sq| prev.squad_row(sq))
            .collect();

        let in_bounds = squad_rows
            .iter()
            .any(|row| row.pos.within_bound(BATTLEFIELD_BOUND));
        let has_living = unit.squads.iter().any(|&sq| {
            squads[sq.index()]
                .soldiers
                .iter()
                .any(|s| wounds.get(s).is_some_and(|w| !w.is_dead()))
        });

        if !in_bounds || !has_living {
            units[unit_row.unit.index()].in_battle = false;
            pruned.push(unit_row.unit);
            continue;
        }

        next.units.push(*unit_row);
        for row in squad_rows {
            next.squads.push(SquadInTurn {
                moved_this_turn: false,
                desired_pos: None,
                last_attack: None,
                ..*row
            });
            // Dead soldiers are copied too; their terminal wound state
            // stays visible in the history.
            for &soldier in &squads[row.squad.index()].soldiers {
                if let Some(prev_row) = prev.soldiers.iter().find(|s| s.soldier == soldier) {
                    next.soldiers.push(*prev_row);
                }
            }
        }
    }

    (next, pruned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::orders::OrderKind;
    use crate::core::types::{NpcRef, WorldUnitRef};

    fn one_unit_fixture(pos: Coord) -> (Vec<BattleUnit>, Vec<Squad>, Vec<Soldier>, Turn) {
        let soldiers: Vec<Soldier> = (0..3)
            .map(|i| Soldier {
                id: SoldierId(i),
                squad: SquadId(0),
                npc: NpcRef::new(),
            })
            .collect();
        let squad = Squad {
            id: SquadId(0),
            unit: UnitId(0),
            offset_to_unit: Coord::new(0, 0),
            offset_to_formation: Coord::new(0, 0),
            starting_pos: pos,
            soldiers: soldiers.iter().map(|s| s.id).collect(),
        };
        let unit = BattleUnit {
            id: UnitId(0),
            organization: crate::battle::units::OrganizationId(0),
            side_z: false,
            owner: None,
            world_unit: WorldUnitRef::new(),
            name: "Test unit".into(),
            kind: crate::battle::units::UnitKind::Infantry,
            starting_manpower: 3,
            battle_line: 0,
            battle_side_pos: 0,
            starting_pos: pos,
            in_battle: true,
            squads: vec![SquadId(0)],
            order: None,
        };
        let turn = Turn {
            num: 0,
            characters: vec![],
            units: vec![UnitInTurn {
                unit: UnitId(0),
                pos,
                order: Some(Order::new(OrderKind::Stand)),
            }],
            squads: vec![SquadInTurn {
                squad: SquadId(0),
                pos,
                moved_this_turn: true,
                desired_pos: Some(Coord::new(1, 1)),
                ammo_remaining: 30,
                last_attack: Some(AttackRecord {
                    kind: AttackKind::Melee,
                    target: SquadId(0),
                }),
            }],
            soldiers: soldiers
                .iter()
                .map(|s| SoldierInTurn {
                    soldier: s.id,
                    wound_status: WoundStatus::Uninjured,
                })
                .collect(),
        };
        (vec![unit], vec![squad], soldiers, turn)
    }

    #[test]
    fn test_copy_forward_resets_transient_flags() {
        let (mut units, squads, _soldiers, turn) = one_unit_fixture(Coord::new(0, 0));
        let (next, pruned) = create_next_turn(&turn, &mut units, &squads);

        assert!(pruned.is_empty());
        assert_eq!(next.num, 1);
        let row = &next.squads[0];
        assert!(!row.moved_this_turn);
        assert!(row.desired_pos.is_none());
        assert!(row.last_attack.is_none());
        assert_eq!(row.ammo_remaining, 30);
        assert_eq!(next.soldiers.len(), 3);
    }

    #[test]
    fn test_out_of_bounds_unit_is_pruned() {
        let (mut units, squads, _soldiers, turn) = one_unit_fixture(Coord::new(0, 60));
        let (next, pruned) = create_next_turn(&turn, &mut units, &squads);

        assert_eq!(pruned, vec![UnitId(0)]);
        assert!(!units[0].in_battle);
        assert!(next.units.is_empty());
        assert!(next.squads.is_empty());
        assert!(next.soldiers.is_empty());
    }

    #[test]
    fn test_unit_with_no_living_soldier_is_pruned() {
        let (mut units, squads, _soldiers, mut turn) = one_unit_fixture(Coord::new(0, 0));
        for s in &mut turn.soldiers {
            s.wound_status = WoundStatus::Dead;
        }
        let (_, pruned) = create_next_turn(&turn, &mut units, &squads);
        assert_eq!(pruned, vec![UnitId(0)]);
    }

    #[test]
    fn test_dead_soldiers_are_still_copied_while_unit_lives() {
        let (mut units, squads, _soldiers, mut turn) = one_unit_fixture(Coord::new(0, 0));
        turn.soldiers[0].wound_status = WoundStatus::Dead;

        let (next, pruned) = create_next_turn(&turn, &mut units, &squads);
        assert!(pruned.is_empty());
        assert_eq!(next.soldiers.len(), 3);
        assert_eq!(next.soldiers[0].wound_status, WoundStatus::Dead);
    }

    #[test]
    fn test_pruned_unit_never_returns() {
        let (mut units, squads, _soldiers, turn) = one_unit_fixture(Coord::new(0, 60));
        let (next, _) = create_next_turn(&turn, &mut units, &squads);
        let (after, pruned_again) = create_next_turn(&next, &mut units, &squads);

        assert!(pruned_again.is_empty());
        assert!(after.units.is_empty());
    }

    #[test]
    fn test_verify_unique_positions() {
        let (_, _, _, mut turn) = one_unit_fixture(Coord::new(0, 0));
        assert!(turn.verify_unique_positions().is_ok());

        let dup = SquadInTurn {
            squad: SquadId(1),
            ..turn.squads[0]
        };
        turn.squads.push(dup);
        assert!(matches!(
            turn.verify_unique_positions(),
            Err(BattleError::PositionConflict(_))
        ));
    }
}
