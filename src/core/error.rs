use thiserror::Error;

use crate::battle::grid::Coord;
use crate::core::types::FactionRef;

#[derive(Error, Debug)]
pub enum BattleError {
    #[error("battle has already been started")]
    AlreadyStarted,

    #[error("battle has not been started yet")]
    NotStarted,

    #[error("battle is no longer active")]
    NotActive,

    #[error("formation kind not implemented: {0}")]
    UnknownFormation(String),

    #[error("faction not part of this battle: {0:?}")]
    UnknownOrganization(FactionRef),

    #[error("invalid deployment for unit '{name}': line {line}, lane {lane}")]
    InvalidDeployment { name: String, line: u8, lane: i8 },

    #[error("two squads occupy the same cell: {0:?}")]
    PositionConflict(Coord),

    #[error("no free deployment cell for reinforcements")]
    NoDeploymentSpace,
}

pub type Result<T> = std::result::Result<T, BattleError>;
