//! Orders and their movement semantics
//!
//! Every order kind maps to a scalar "distance to goal" field consumed by
//! the pathfinder, or to no movement at all. The mapping is the single
//! place where order behavior is defined; the movement resolver never
//! inspects order kinds itself.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::battle::constants::{
    AI_ADVANCE_TURNS, AI_FLEE_RATIO, FLEE_SAFETY_MARGIN, MELEE_RANGE,
};
use crate::battle::formation;
use crate::battle::grid::Coord;
use crate::battle::units::BattleUnit;
use crate::core::types::Tick;

/// What a unit has been told to do
///
/// The ranged family is declared - it participates in priority arbitration
/// and keeps its ammo bookkeeping - but has no movement or combat
/// resolution yet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OrderKind {
    Stand,
    Move { target: Coord },
    Flee,
    Charge,
    AdvanceInFormation,
    RangedAttack,
    RangedAndStand,
    RangedAndCharge,
    RangedAndFlee,
}

impl OrderKind {
    /// Arbitration priority when several squads desire the same cell;
    /// higher wins
    pub fn priority(self) -> u8 {
        match self {
            OrderKind::Stand => 4,
            OrderKind::Flee => 3,
            OrderKind::AdvanceInFormation => 2,
            OrderKind::RangedAttack
            | OrderKind::RangedAndStand
            | OrderKind::RangedAndCharge
            | OrderKind::RangedAndFlee => 1,
            OrderKind::Move { .. } => 0,
            OrderKind::Charge => 0,
        }
    }
}

/// Priority of a squad with no order at all: it behaves like STAND
pub const NO_ORDER_PRIORITY: u8 = 4;

/// An order with its completion flag
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub kind: OrderKind,
    pub done: bool,
}

impl Order {
    pub fn new(kind: OrderKind) -> Self {
        Self { kind, done: false }
    }
}

/// Derive the order an AI-controlled unit follows this turn
///
/// Outnumbered AI units run; early in the battle they advance in
/// formation; afterwards they charge.
pub fn derive_ai_order(own_living: usize, enemy_living: usize, turn: Tick) -> OrderKind {
    let outnumbered = match enemy_living {
        0 => false,
        n => (own_living as f64 / n as f64) < AI_FLEE_RATIO,
    };
    if outnumbered {
        OrderKind::Flee
    } else if turn < AI_ADVANCE_TURNS {
        OrderKind::AdvanceInFormation
    } else {
        OrderKind::Charge
    }
}

/// Resolve the order a unit follows on the given turn
///
/// Player-owned units follow their standing order; AI units derive one
/// from the current soldier-count ratio. `living_by_side` is indexed by
/// side z.
pub fn resolved_order(unit: &BattleUnit, living_by_side: [usize; 2], turn: Tick) -> Option<Order> {
    if unit.is_ai() {
        let own = living_by_side[unit.side_z as usize];
        let enemy = living_by_side[usize::from(!unit.side_z)];
        Some(Order::new(derive_ai_order(own, enemy, turn)))
    } else {
        unit.order
    }
}

/// Scalar distance-to-goal field fed to the pathfinder
pub type TargetDistanceFn = Box<dyn Fn(Coord) -> f64>;

/// Everything an order needs to know about the squad executing it
#[derive(Debug, Clone)]
pub struct OrderContext {
    pub squad_pos: Coord,
    pub offset_to_unit: Coord,
    pub squad_starting_pos: Coord,
    pub side_z: bool,
    pub turn: Tick,
    /// Positions of living enemy squads this turn
    pub enemy_positions: Vec<Coord>,
}

fn nearest_enemy_distance(from: Coord, enemies: &[Coord]) -> Option<f64> {
    enemies
        .iter()
        .map(|e| OrderedFloat(from.distance(e)))
        .min()
        .map(|d| d.0)
}

/// Build the distance field for an order, or `None` for orders that do
/// not move the squad
///
/// Completed orders and distance-based orders with no enemy in sight
/// resolve to no movement.
pub fn target_distance(order: &Order, ctx: &OrderContext) -> Option<TargetDistanceFn> {
    if order.done {
        return None;
    }
    match order.kind {
        OrderKind::Stand => None,

        OrderKind::Move { target } => {
            // Each squad aims for the unit target shifted by its own
            // offset, so the unit arrives as a block.
            let goal = target + ctx.offset_to_unit;
            Some(Box::new(move |c| c.distance(&goal)))
        }

        OrderKind::Flee => {
            let enemies = ctx.enemy_positions.clone();
            let d0 = nearest_enemy_distance(ctx.squad_pos, &enemies)?;
            Some(Box::new(move |c| {
                match nearest_enemy_distance(c, &enemies) {
                    Some(d) => (d0 + FLEE_SAFETY_MARGIN) - d,
                    None => 0.0,
                }
            }))
        }

        OrderKind::Charge => {
            let enemies = ctx.enemy_positions.clone();
            nearest_enemy_distance(ctx.squad_pos, &enemies)?;
            Some(Box::new(move |c| {
                match nearest_enemy_distance(c, &enemies) {
                    Some(d) if d < MELEE_RANGE => 0.0,
                    Some(d) => d,
                    None => 0.0,
                }
            }))
        }

        OrderKind::AdvanceInFormation => {
            // The fixed deployment anchor walks one cell per turn along
            // the side's forward axis.
            let goal = Coord::new(
                ctx.squad_starting_pos.x,
                ctx.squad_starting_pos.z + formation::forward(ctx.side_z) * ctx.turn as i32,
            );
            Some(Box::new(move |c| c.distance(&goal)))
        }

        // Declared but unimplemented: no movement.
        OrderKind::RangedAttack
        | OrderKind::RangedAndStand
        | OrderKind::RangedAndCharge
        | OrderKind::RangedAndFlee => None,
    }
}
