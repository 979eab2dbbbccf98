//! Core type definitions used throughout the engine
//!
//! External references point at records owned by the surrounding world
//! simulation (factions, characters, world units, combatants). The engine
//! never dereferences them; it only carries them through battle state and
//! reports them back to the caller.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reference to an external faction (the organization fielding troops)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FactionRef(pub Uuid);

impl FactionRef {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FactionRef {
    fn default() -> Self {
        Self::new()
    }
}

/// Reference to an external player character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CharacterRef(pub Uuid);

impl CharacterRef {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CharacterRef {
    fn default() -> Self {
        Self::new()
    }
}

/// Reference to an external world unit record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorldUnitRef(pub Uuid);

impl WorldUnitRef {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WorldUnitRef {
    fn default() -> Self {
        Self::new()
    }
}

/// Reference to an external combatant record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NpcRef(pub Uuid);

impl NpcRef {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NpcRef {
    fn default() -> Self {
        Self::new()
    }
}

/// Battle turn counter (simulation time unit)
pub type Tick = u32;
