//! Read-only projection of a battle's full history
//!
//! Produces the serializable tree the presentation layer consumes:
//! organization -> character / unit -> turn -> squad -> soldier. No
//! business logic lives here; everything is copied out of the turn store.

use serde::Serialize;

use crate::battle::execution::Battle;
use crate::battle::grid::Coord;
use crate::battle::orders::Order;
use crate::battle::turns::AttackRecord;
use crate::battle::units::{UnitId, UnitKind, WoundStatus};
use crate::core::types::{CharacterRef, FactionRef, NpcRef, Tick, WorldUnitRef};

#[derive(Debug, Clone, Serialize)]
pub struct BattleRender {
    pub started: bool,
    pub active: bool,
    pub turn_count: usize,
    pub organizations: Vec<OrganizationRender>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrganizationRender {
    pub faction: FactionRef,
    pub side: bool,
    pub characters: Vec<CharacterRender>,
    pub units: Vec<UnitRender>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CharacterRender {
    pub character: CharacterRef,
    pub present_in_battle: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnitRender {
    pub world_unit: WorldUnitRef,
    pub name: String,
    pub kind: UnitKind,
    pub owner: Option<CharacterRef>,
    pub starting_manpower: u32,
    pub turns: Vec<UnitTurnRender>,
    pub squads: Vec<SquadRender>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnitTurnRender {
    pub turn: Tick,
    pub pos: Coord,
    pub order: Option<Order>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SquadRender {
    pub turns: Vec<SquadTurnRender>,
    pub soldiers: Vec<SoldierRender>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SquadTurnRender {
    pub turn: Tick,
    pub pos: Coord,
    pub ammo_remaining: u16,
    pub attack: Option<AttackRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SoldierRender {
    pub npc: NpcRef,
    pub turns: Vec<SoldierTurnRender>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SoldierTurnRender {
    pub turn: Tick,
    pub wound_status: WoundStatus,
}

/// Project the whole battle history into a presentation tree
pub fn render_battle_state(battle: &Battle) -> BattleRender {
    BattleRender {
        started: battle.started,
        active: battle.active,
        turn_count: battle.turn_count(),
        organizations: battle
            .organizations
            .iter()
            .map(|org| OrganizationRender {
                faction: org.faction,
                side: org.side_z,
                characters: org
                    .characters
                    .iter()
                    .map(|&c| {
                        let character = &battle.characters[c.index()];
                        CharacterRender {
                            character: character.character,
                            present_in_battle: character.present_in_battle,
                        }
                    })
                    .collect(),
                units: org
                    .units
                    .iter()
                    .map(|&u| render_unit(battle, u))
                    .collect(),
            })
            .collect(),
    }
}

fn render_unit(battle: &Battle, unit_id: UnitId) -> UnitRender {
    let unit = &battle.units[unit_id.index()];
    UnitRender {
        world_unit: unit.world_unit,
        name: unit.name.clone(),
        kind: unit.kind,
        owner: unit.owner.map(|c| battle.characters[c.index()].character),
        starting_manpower: unit.starting_manpower,
        turns: battle
            .turns
            .iter()
            .filter_map(|turn| {
                turn.unit_row(unit_id).map(|row| UnitTurnRender {
                    turn: turn.num,
                    pos: row.pos,
                    order: row.order,
                })
            })
            .collect(),
        squads: unit
            .squads
            .iter()
            .map(|&sq| {
                let squad = &battle.squads[sq.index()];
                SquadRender {
                    turns: battle
                        .turns
                        .iter()
                        .filter_map(|turn| {
                            turn.squad_row(sq).map(|row| SquadTurnRender {
                                turn: turn.num,
                                pos: row.pos,
                                ammo_remaining: row.ammo_remaining,
                                attack: row.last_attack,
                            })
                        })
                        .collect(),
                    soldiers: squad
                        .soldiers
                        .iter()
                        .map(|&soldier_id| SoldierRender {
                            npc: battle.soldiers[soldier_id.index()].npc,
                            turns: battle
                                .turns
                                .iter()
                                .filter_map(|turn| {
                                    turn.soldiers
                                        .iter()
                                        .find(|s| s.soldier == soldier_id)
                                        .map(|row| SoldierTurnRender {
                                            turn: turn.num,
                                            wound_status: row.wound_status,
                                        })
                                })
                                .collect(),
                        })
                        .collect(),
                }
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::execution::testkit::duel;
    use crate::battle::orders::OrderKind;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_render_covers_every_entity_and_turn() {
        let mut battle = duel(
            Coord::new(0, -2),
            Some(OrderKind::Charge),
            Coord::new(0, 2),
            Some(OrderKind::Stand),
            4,
        );
        let mut rng = ChaCha8Rng::seed_from_u64(17);
        for _ in 0..3 {
            if battle.tick(&mut rng).unwrap().ended {
                break;
            }
        }

        let render = render_battle_state(&battle);
        assert_eq!(render.turn_count, battle.turn_count());
        assert_eq!(render.organizations.len(), 2);

        for org in &render.organizations {
            for unit in &org.units {
                assert!(!unit.turns.is_empty());
                for squad in &unit.squads {
                    assert_eq!(squad.turns.len(), unit.turns.len());
                    for soldier in &squad.soldiers {
                        assert_eq!(soldier.turns.len(), unit.turns.len());
                    }
                }
            }
        }
    }

    #[test]
    fn test_render_serializes_to_json() {
        let battle = duel(
            Coord::new(0, -2),
            Some(OrderKind::Stand),
            Coord::new(0, 2),
            Some(OrderKind::Stand),
            2,
        );
        let render = render_battle_state(&battle);
        let json = serde_json::to_value(&render).unwrap();
        assert_eq!(json["turn_count"], 1);
        assert!(json["organizations"].as_array().unwrap().len() == 2);
    }
}
