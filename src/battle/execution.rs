//! Battle lifecycle
//!
//! Callers drive a battle through three entry points: initialize from a
//! conflict roster, start (deploy and snapshot turn zero), then tick until
//! the battle reports itself ended. Reinforcements can join any time while
//! the battle is active.
//!
//! Each tick is synchronous and runs to completion: copy the previous turn
//! forward (pruning spent units), resolve movement, resolve combat, then
//! evaluate the end condition.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::battle::combat::{self, CombatReport};
use crate::battle::constants::{
    DISENGAGE_DISTANCE, REINFORCE_X_MAX, REINFORCE_Z_MAX, REINFORCE_Z_MIN, SQUAD_SIZE,
    STARTING_AMMO,
};
use crate::battle::formation::{self, FormationEntry, FormationSettings};
use crate::battle::grid::{floored_centroid, Coord};
use crate::battle::movement::{self, MovementReport};
use crate::battle::orders::{self, Order, OrderKind};
use crate::battle::turns::{
    self, CharacterInTurn, SoldierInTurn, SquadInTurn, Turn, UnitInTurn,
};
use crate::battle::units::{
    BattleCharacter, BattleOrganization, BattleSide, BattleUnit, CharacterId, OrganizationId,
    Soldier, SoldierId, Squad, SquadId, UnitId, UnitKind, WoundStatus,
};
use crate::core::error::{BattleError, Result};
use crate::core::types::{CharacterRef, FactionRef, Tick, WorldUnitRef};

/// A unit as handed over by the world simulation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalUnit {
    pub world_unit: WorldUnitRef,
    pub faction: FactionRef,
    /// None for AI-controlled units (barbarians)
    pub owner: Option<CharacterRef>,
    pub name: String,
    pub kind: UnitKind,
    /// Living fighting soldiers at join time
    pub soldiers: Vec<crate::core::types::NpcRef>,
    /// Configured depth: 0 = advanced .. 4 = rearguard
    pub battle_line: u8,
    /// Configured lateral slot: -5 .. 5
    pub battle_side_pos: i8,
    /// Standing order for player-owned units
    pub default_order: Option<OrderKind>,
}

/// Outcome of one tick, reported back to the world simulation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickReport {
    pub turn: Tick,
    /// External units pruned this tick; the world layer flags them as
    /// regrouping
    pub regrouping: Vec<WorldUnitRef>,
    pub movement: MovementReport,
    pub combat: CombatReport,
    pub ended: bool,
}

/// The full state of one battle: identity arenas plus the turn history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Battle {
    pub started: bool,
    pub active: bool,
    pub sides: [BattleSide; 2],
    pub organizations: Vec<BattleOrganization>,
    pub characters: Vec<BattleCharacter>,
    pub units: Vec<BattleUnit>,
    pub squads: Vec<Squad>,
    pub soldiers: Vec<Soldier>,
    pub turns: Vec<Turn>,
    pub formation_settings: FormationSettings,
    /// Lifetime count of dropped safe-fallback moves (see movement)
    pub fallback_collisions: u64,
}

/// Build a battle from a detected conflict
///
/// `sides` holds the factions fighting on each side; `units` the world
/// units present at the location. Units whose faction is not part of the
/// conflict are left out, mirroring how the world layer scopes a battle
/// to its belligerents.
pub fn initialize_battle(sides: [Vec<FactionRef>; 2], units: Vec<ExternalUnit>) -> Result<Battle> {
    let mut battle = Battle {
        started: false,
        active: false,
        sides: [
            BattleSide {
                z: false,
                organizations: Vec::new(),
            },
            BattleSide {
                z: true,
                organizations: Vec::new(),
            },
        ],
        organizations: Vec::new(),
        characters: Vec::new(),
        units: Vec::new(),
        squads: Vec::new(),
        soldiers: Vec::new(),
        turns: Vec::new(),
        formation_settings: FormationSettings::default(),
        fallback_collisions: 0,
    };

    for (side_index, factions) in sides.into_iter().enumerate() {
        for faction in factions {
            let id = OrganizationId(battle.organizations.len() as u32);
            battle.organizations.push(BattleOrganization {
                id,
                side_z: side_index == 1,
                faction,
                characters: Vec::new(),
                units: Vec::new(),
            });
            battle.sides[side_index].organizations.push(id);
        }
    }

    for unit in units {
        let Some(org) = battle
            .organizations
            .iter()
            .find(|o| o.faction == unit.faction)
            .map(|o| o.id)
        else {
            tracing::debug!(name = %unit.name, "unit's faction not in conflict, left out");
            continue;
        };
        battle.add_unit(org, unit)?;
    }

    Ok(battle)
}

impl Battle {
    pub fn latest_turn(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn turn_count(&self) -> usize {
        self.turns.len()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    fn organization_by_faction(&self, faction: FactionRef) -> Option<OrganizationId> {
        self.organizations
            .iter()
            .find(|o| o.faction == faction)
            .map(|o| o.id)
    }

    /// Create the identity records for one joining unit: the unit itself,
    /// its owner's battle character, and its squads and soldiers.
    fn add_unit(&mut self, org_id: OrganizationId, external: ExternalUnit) -> Result<UnitId> {
        if external.battle_line > 4 || !(-5..=5).contains(&external.battle_side_pos) {
            return Err(BattleError::InvalidDeployment {
                name: external.name,
                line: external.battle_line,
                lane: external.battle_side_pos,
            });
        }

        let side_z = self.organizations[org_id.index()].side_z;
        let owner = match external.owner {
            None => None,
            Some(character) => {
                let existing = self.organizations[org_id.index()]
                    .characters
                    .iter()
                    .copied()
                    .find(|&c| self.characters[c.index()].character == character);
                Some(existing.unwrap_or_else(|| {
                    let id = CharacterId(self.characters.len() as u32);
                    self.characters.push(BattleCharacter {
                        id,
                        organization: org_id,
                        character,
                        present_in_battle: true,
                    });
                    self.organizations[org_id.index()].characters.push(id);
                    id
                }))
            }
        };

        let unit_id = UnitId(self.units.len() as u32);
        let mut unit = BattleUnit {
            id: unit_id,
            organization: org_id,
            side_z,
            owner,
            world_unit: external.world_unit,
            name: external.name,
            kind: external.kind,
            starting_manpower: external.soldiers.len() as u32,
            battle_line: external.battle_line,
            battle_side_pos: external.battle_side_pos,
            starting_pos: Coord::default(),
            in_battle: true,
            squads: Vec::new(),
            order: external.default_order.map(Order::new),
        };

        let mut roster = external.soldiers.into_iter();
        for squad_size in partition_soldiers(unit.starting_manpower as usize) {
            let squad_id = SquadId(self.squads.len() as u32);
            let mut squad = Squad {
                id: squad_id,
                unit: unit_id,
                offset_to_unit: Coord::default(),
                offset_to_formation: Coord::default(),
                starting_pos: Coord::default(),
                soldiers: Vec::with_capacity(squad_size),
            };
            for npc in roster.by_ref().take(squad_size) {
                let soldier_id = SoldierId(self.soldiers.len() as u32);
                self.soldiers.push(Soldier {
                    id: soldier_id,
                    squad: squad_id,
                    npc,
                });
                squad.soldiers.push(soldier_id);
            }
            unit.squads.push(squad_id);
            self.squads.push(squad);
        }

        self.organizations[org_id.index()].units.push(unit_id);
        self.units.push(unit);
        Ok(unit_id)
    }

    /// Deploy both sides and snapshot turn zero
    ///
    /// Fails if the battle has already been started.
    pub fn start(&mut self) -> Result<()> {
        if self.started {
            return Err(BattleError::AlreadyStarted);
        }

        for side_index in 0..2 {
            let side_z = side_index == 1;
            let entries: Vec<FormationEntry> = self
                .units
                .iter()
                .filter(|u| u.side_z == side_z)
                .flat_map(|u| {
                    u.squads.iter().map(|&squad| FormationEntry {
                        squad,
                        battle_line: u.battle_line,
                        side_pos: u.battle_side_pos,
                    })
                })
                .collect();

            for (squad_id, offset) in formation::layout(&entries, &self.formation_settings)? {
                let squad = &mut self.squads[squad_id.index()];
                squad.offset_to_formation = offset;
                squad.starting_pos = formation::to_absolute(side_z, offset);
            }
        }

        // Anchor each unit at the floored centroid of its squads and fix
        // the per-squad offsets; both are write-once.
        for unit in &mut self.units {
            let positions: Vec<Coord> = unit
                .squads
                .iter()
                .map(|&sq| self.squads[sq.index()].starting_pos)
                .collect();
            if positions.is_empty() {
                continue;
            }
            unit.starting_pos = floored_centroid(&positions);
            for &sq in &unit.squads {
                let squad = &mut self.squads[sq.index()];
                squad.offset_to_unit = squad.starting_pos - unit.starting_pos;
            }
        }

        self.started = true;
        self.active = true;
        let turn_zero = self.build_turn_zero();
        self.turns.push(turn_zero);

        tracing::info!(
            units = self.units.len(),
            soldiers = self.soldiers.len(),
            "battle started"
        );
        Ok(())
    }

    fn build_turn_zero(&self) -> Turn {
        let mut turn = Turn {
            num: 0,
            characters: self
                .characters
                .iter()
                .map(|c| CharacterInTurn { character: c.id })
                .collect(),
            units: self
                .units
                .iter()
                .map(|u| UnitInTurn {
                    unit: u.id,
                    pos: u.starting_pos,
                    order: None,
                })
                .collect(),
            squads: self
                .squads
                .iter()
                .map(|s| SquadInTurn {
                    squad: s.id,
                    pos: s.starting_pos,
                    moved_this_turn: false,
                    desired_pos: None,
                    ammo_remaining: STARTING_AMMO,
                    last_attack: None,
                })
                .collect(),
            soldiers: self
                .soldiers
                .iter()
                .map(|s| SoldierInTurn {
                    soldier: s.id,
                    wound_status: WoundStatus::Uninjured,
                })
                .collect(),
        };

        let living = turn.living_by_side(&self.units, &self.squads, &self.soldiers);
        for row in &mut turn.units {
            row.order = orders::resolved_order(&self.units[row.unit.index()], living, 0);
        }
        turn
    }

    /// Advance the battle by one turn
    pub fn tick(&mut self, rng: &mut impl Rng) -> Result<TickReport> {
        if !self.started {
            return Err(BattleError::NotStarted);
        }
        if !self.active {
            return Err(BattleError::NotActive);
        }

        let prev = self.turns.last().expect("started battle has a turn");
        let (next, pruned) = turns::create_next_turn(prev, &mut self.units, &self.squads);
        let turn_num = next.num;
        self.turns.push(next);

        let regrouping: Vec<WorldUnitRef> = pruned
            .iter()
            .map(|&u| self.units[u.index()].world_unit)
            .collect();
        if !pruned.is_empty() {
            tracing::debug!(turn = turn_num, count = pruned.len(), "units left to regroup");
            for character in &mut self.characters {
                character.present_in_battle = self
                    .units
                    .iter()
                    .any(|u| u.owner == Some(character.id) && u.in_battle);
            }
        }

        let movement = movement::resolve_movement(self)?;
        let combat = combat::resolve_combat(self, rng);

        debug_assert!(self
            .turns
            .last()
            .expect("turn exists")
            .verify_unique_positions()
            .is_ok());

        if let Some(reason) = self.end_reason() {
            self.active = false;
            tracing::info!(turn = turn_num, reason, "battle ended");
        }

        Ok(TickReport {
            turn: turn_num,
            regrouping,
            movement,
            combat,
            ended: !self.active,
        })
    }

    /// The end condition: a side without living soldiers, or full
    /// disengagement of the two sides
    fn end_reason(&self) -> Option<&'static str> {
        let turn = self.turns.last()?;
        let living = turn.living_by_side(&self.units, &self.squads, &self.soldiers);
        if living[0] == 0 || living[1] == 0 {
            return Some("side annihilated");
        }

        // Closest pair across the two opposing sides.
        let mut closest = f64::INFINITY;
        for a in &turn.squads {
            let a_side = self.units[self.squads[a.squad.index()].unit.index()].side_z;
            if a_side {
                continue;
            }
            for b in &turn.squads {
                let b_side = self.units[self.squads[b.squad.index()].unit.index()].side_z;
                if !b_side {
                    continue;
                }
                closest = closest.min(a.pos.distance(&b.pos));
            }
        }
        (closest > DISENGAGE_DISTANCE).then_some("sides disengaged")
    }

    /// Add a reinforcement unit to an organization already in the battle
    ///
    /// Squads are placed on the first unoccupied cells of a deterministic
    /// scan behind the side's deployment, mirrored like the initial
    /// layout.
    pub fn join(&mut self, faction: FactionRef, external: ExternalUnit) -> Result<UnitId> {
        if !self.started {
            return Err(BattleError::NotStarted);
        }
        if !self.active {
            return Err(BattleError::NotActive);
        }

        let org_id = self
            .organization_by_faction(faction)
            .ok_or(BattleError::UnknownOrganization(faction))?;
        let side_z = self.organizations[org_id.index()].side_z;
        let name = external.name.clone();

        let unit_id = self.add_unit(org_id, external)?;

        let squad_count = self.units[unit_id.index()].squads.len();
        let turn = self.turns.last().expect("started battle has a turn");
        let mut taken: Vec<Coord> = turn.squads.iter().map(|s| s.pos).collect();
        let mut cells = Vec::with_capacity(squad_count);
        let mut offsets = Vec::with_capacity(squad_count);

        'scan: for z in REINFORCE_Z_MIN..REINFORCE_Z_MAX {
            for x in 0..REINFORCE_X_MAX {
                for sx in [x, -x] {
                    let offset = Coord::new(sx, z);
                    let cell = if side_z {
                        Coord::new(-offset.x, offset.z)
                    } else {
                        Coord::new(offset.x, -offset.z)
                    };
                    if taken.contains(&cell) {
                        continue;
                    }
                    taken.push(cell);
                    cells.push(cell);
                    offsets.push(offset);
                    if cells.len() == squad_count {
                        break 'scan;
                    }
                }
            }
        }
        if cells.len() < squad_count {
            return Err(BattleError::NoDeploymentSpace);
        }

        let unit_pos = floored_centroid(&cells);
        {
            let unit = &mut self.units[unit_id.index()];
            unit.starting_pos = unit_pos;
            for (i, &sq) in unit.squads.iter().enumerate() {
                let squad = &mut self.squads[sq.index()];
                squad.starting_pos = cells[i];
                squad.offset_to_formation = offsets[i];
                squad.offset_to_unit = cells[i] - unit_pos;
            }
        }

        // The reinforcement appears in the current turn.
        let turn = self.turns.last_mut().expect("started battle has a turn");
        turn.units.push(UnitInTurn {
            unit: unit_id,
            pos: unit_pos,
            order: None,
        });
        let unit = &self.units[unit_id.index()];
        for (i, &sq) in unit.squads.iter().enumerate() {
            turn.squads.push(SquadInTurn {
                squad: sq,
                pos: cells[i],
                moved_this_turn: false,
                desired_pos: None,
                ammo_remaining: STARTING_AMMO,
                last_attack: None,
            });
            for &soldier in &self.squads[sq.index()].soldiers {
                turn.soldiers.push(SoldierInTurn {
                    soldier,
                    wound_status: WoundStatus::Uninjured,
                });
            }
        }
        if let Some(owner) = unit.owner {
            if !turn.characters.iter().any(|c| c.character == owner) {
                turn.characters.push(CharacterInTurn { character: owner });
            }
        }

        let living = turn.living_by_side(&self.units, &self.squads, &self.soldiers);
        let turn_num = turn.num;
        let resolved = orders::resolved_order(&self.units[unit_id.index()], living, turn_num);
        if let Some(row) = turn.unit_row_mut(unit_id) {
            row.order = resolved;
        }

        tracing::info!(unit = %name, turn = turn_num, "reinforcement joined");
        Ok(unit_id)
    }
}

/// Split `n` soldiers into squads of at most [`SQUAD_SIZE`], the earlier
/// squads taking the remainder
pub fn partition_soldiers(n: usize) -> Vec<usize> {
    if n == 0 {
        return Vec::new();
    }
    let count = n.div_ceil(SQUAD_SIZE);
    let base = n / count;
    let extra = n % count;
    (0..count)
        .map(|i| if i < extra { base + 1 } else { base })
        .collect()
}
