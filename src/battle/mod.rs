//! Battle simulation engine - turn-based formation combat
//!
//! The world layer detects a conflict and hands over a roster; the engine
//! deploys formations, then resolves movement and melee one synchronous
//! tick at a time, keeping an append-only per-turn history of positions
//! and wounds until one side is annihilated or the sides disengage.

pub mod combat;
pub mod constants;
pub mod execution;
pub mod formation;
pub mod grid;
pub mod movement;
pub mod orders;
pub mod pathfinding;
pub mod render;
pub mod turns;
pub mod units;

// Re-exports for convenient access
pub use combat::CombatReport;
pub use constants::*;
pub use execution::{initialize_battle, partition_soldiers, Battle, ExternalUnit, TickReport};
pub use formation::{FormationEntry, FormationKind, FormationSettings};
pub use grid::{floored_centroid, Coord};
pub use movement::MovementReport;
pub use orders::{derive_ai_order, Order, OrderKind};
pub use pathfinding::find_path;
pub use render::{render_battle_state, BattleRender};
pub use turns::{AttackKind, AttackRecord, SquadInTurn, Turn, UnitInTurn};
pub use units::{
    BattleCharacter, BattleOrganization, BattleSide, BattleUnit, CharacterId, OrganizationId,
    Soldier, SoldierId, Squad, SquadId, UnitId, UnitKind, WoundStatus,
};
