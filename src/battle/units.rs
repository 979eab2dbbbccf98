//! Identity entities: sides, organizations, characters, units, squads,
//! soldiers
//!
//! Identity entities are created once - at battle initialization or when a
//! reinforcement joins - and persist for the whole battle. All per-turn
//! mutable state lives in the turn snapshot layer (`turns`), which holds
//! handles into these arenas.

use serde::{Deserialize, Serialize};

use crate::battle::grid::Coord;
use crate::battle::orders::Order;
use crate::core::types::{CharacterRef, NpcRef, WorldUnitRef};

/// Handle into the organization arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrganizationId(pub u32);

/// Handle into the character arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CharacterId(pub u32);

/// Handle into the unit arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub u32);

/// Handle into the squad arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SquadId(pub u32);

/// Handle into the soldier arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SoldierId(pub u32);

macro_rules! impl_index {
    ($($id:ident),*) => {
        $(impl $id {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        })*
    };
}

impl_index!(OrganizationId, CharacterId, UnitId, SquadId, SoldierId);

/// A soldier's wound state, strictly non-decreasing over a battle
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub enum WoundStatus {
    #[default]
    Uninjured,
    Light,
    Medium,
    Heavy,
    Dead,
}

impl WoundStatus {
    pub fn is_dead(self) -> bool {
        self == WoundStatus::Dead
    }

    /// One wound step worse, capped at dead
    pub fn worsened(self) -> Self {
        match self {
            WoundStatus::Uninjured => WoundStatus::Light,
            WoundStatus::Light => WoundStatus::Medium,
            WoundStatus::Medium => WoundStatus::Heavy,
            WoundStatus::Heavy | WoundStatus::Dead => WoundStatus::Dead,
        }
    }

    /// How well a soldier in this state still fights
    pub fn hit_multiplier(self) -> f64 {
        match self {
            WoundStatus::Uninjured => 1.0,
            WoundStatus::Light => 0.75,
            WoundStatus::Medium => 0.4,
            WoundStatus::Heavy => 0.1,
            WoundStatus::Dead => 0.0,
        }
    }
}

/// Display classification of a unit, carried through from the world layer
///
/// The engine treats every kind identically; this exists for the
/// presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum UnitKind {
    #[default]
    Infantry,
    Pikemen,
    Archers,
    LightCavalry,
    HeavyCavalry,
}

/// One of the two sides of a battle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleSide {
    /// Side index; the engine mirrors deployments by this flag
    pub z: bool,
    pub organizations: Vec<OrganizationId>,
}

/// Battle-scoped wrapper around an external faction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleOrganization {
    pub id: OrganizationId,
    pub side_z: bool,
    pub faction: crate::core::types::FactionRef,
    pub characters: Vec<CharacterId>,
    pub units: Vec<UnitId>,
}

/// Battle-scoped wrapper around a player character
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleCharacter {
    pub id: CharacterId,
    pub organization: OrganizationId,
    pub character: CharacterRef,
    pub present_in_battle: bool,
}

/// A unit fielded in the battle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleUnit {
    pub id: UnitId,
    pub organization: OrganizationId,
    pub side_z: bool,
    /// None means the unit is AI-controlled (barbarians and the like)
    pub owner: Option<CharacterId>,
    pub world_unit: WorldUnitRef,
    pub name: String,
    pub kind: UnitKind,
    pub starting_manpower: u32,
    /// Configured depth: 0 = advanced .. 4 = rearguard
    pub battle_line: u8,
    /// Configured lateral slot: -5 far-left-flank .. 5 far-right-flank
    pub battle_side_pos: i8,
    /// Centroid of the unit's squads at deployment; write-once
    pub starting_pos: Coord,
    /// Cleared when the unit is pruned; pruned units are never copied into
    /// later turns
    pub in_battle: bool,
    pub squads: Vec<SquadId>,
    /// Standing order for player-owned units. AI units derive theirs on
    /// demand and ignore this field.
    pub order: Option<Order>,
}

impl BattleUnit {
    pub fn is_ai(&self) -> bool {
        self.owner.is_none()
    }
}

/// A contubernium: up to eight soldiers moving and fighting as one cell
///
/// The offsets are fixed at deployment and never recomputed; they anchor
/// "advance in formation" movement for the rest of the battle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Squad {
    pub id: SquadId,
    pub unit: UnitId,
    pub offset_to_unit: Coord,
    pub offset_to_formation: Coord,
    pub starting_pos: Coord,
    pub soldiers: Vec<SoldierId>,
}

/// Identity record linking a battle soldier to its external combatant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Soldier {
    pub id: SoldierId,
    pub squad: SquadId,
    pub npc: NpcRef,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wound_ordering() {
        assert!(WoundStatus::Uninjured < WoundStatus::Light);
        assert!(WoundStatus::Heavy < WoundStatus::Dead);
    }

    #[test]
    fn test_wound_worsens_stepwise_and_caps() {
        let mut w = WoundStatus::Uninjured;
        for expected in [
            WoundStatus::Light,
            WoundStatus::Medium,
            WoundStatus::Heavy,
            WoundStatus::Dead,
            WoundStatus::Dead,
        ] {
            w = w.worsened();
            assert_eq!(w, expected);
        }
    }

    #[test]
    fn test_hit_multiplier_decreases_with_wounds() {
        let mut last = f64::INFINITY;
        let mut w = WoundStatus::Uninjured;
        loop {
            let m = w.hit_multiplier();
            assert!(m < last);
            last = m;
            if w.is_dead() {
                break;
            }
            w = w.worsened();
        }
        assert_eq!(WoundStatus::Dead.hit_multiplier(), 0.0);
    }

    #[test]
    fn test_handles_index() {
        assert_eq!(SquadId(7).index(), 7);
        assert_eq!(UnitId(0).index(), 0);
    }
}
