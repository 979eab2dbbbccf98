//! Melee combat resolution
//!
//! Runs after movement, over the same turn. Squads act in a freshly
//! shuffled order each tick; there is no stable ordering guarantee and a
//! soldier can be hit by several squads within one tick.

use ahash::AHashMap;
use ordered_float::OrderedFloat;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::battle::constants::{BASE_HIT_PROBABILITY, MELEE_RANGE};
use crate::battle::execution::Battle;
use crate::battle::turns::{AttackKind, AttackRecord, Turn};
use crate::battle::units::{SoldierId, Squad};

/// Counters from one combat pass
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CombatReport {
    pub squads_engaged: usize,
    pub wounds_inflicted: usize,
    pub kills: usize,
}

/// Resolve melee for the latest turn
pub(crate) fn resolve_combat(battle: &mut Battle, rng: &mut impl Rng) -> CombatReport {
    let mut report = CombatReport::default();

    let Battle {
        ref units,
        ref squads,
        ref mut turns,
        ..
    } = *battle;
    let Some(turn) = turns.last_mut() else {
        return report;
    };

    let soldier_rows: AHashMap<SoldierId, usize> = turn
        .soldiers
        .iter()
        .enumerate()
        .map(|(i, row)| (row.soldier, i))
        .collect();

    let side_of: Vec<bool> = turn
        .squads
        .iter()
        .map(|row| units[squads[row.squad.index()].unit.index()].side_z)
        .collect();

    // Fresh shuffle every tick.
    let mut acting: Vec<usize> = (0..turn.squads.len()).collect();
    acting.shuffle(rng);

    for si in acting {
        // Re-check liveness: this squad may have been wiped out earlier in
        // the same tick.
        let attackers = living_soldiers(turn, squads, &soldier_rows, si);
        if attackers.is_empty() {
            continue;
        }

        let my_pos = turn.squads[si].pos;
        let target = (0..turn.squads.len())
            .filter(|&i| {
                side_of[i] != side_of[si]
                    && !living_soldiers(turn, squads, &soldier_rows, i).is_empty()
            })
            .min_by_key(|&i| OrderedFloat(my_pos.distance(&turn.squads[i].pos)));
        let Some(ti) = target else {
            continue;
        };
        if my_pos.distance(&turn.squads[ti].pos) >= MELEE_RANGE {
            continue;
        }

        turn.squads[si].last_attack = Some(AttackRecord {
            kind: AttackKind::Melee,
            target: turn.squads[ti].squad,
        });
        report.squads_engaged += 1;

        for attacker in &attackers {
            let defenders = living_soldiers(turn, squads, &soldier_rows, ti);
            if defenders.is_empty() {
                break;
            }
            let target_row = defenders[rng.gen_range(0..defenders.len())];

            let hit_chance =
                BASE_HIT_PROBABILITY * turn.soldiers[*attacker].wound_status.hit_multiplier();
            if hit_chance <= 0.0 {
                continue;
            }

            // Keep swinging at the same soldier until a miss or the
            // target goes down.
            while rng.gen_bool(hit_chance) {
                let wound = turn.soldiers[target_row].wound_status.worsened();
                turn.soldiers[target_row].wound_status = wound;
                report.wounds_inflicted += 1;
                if wound.is_dead() {
                    report.kills += 1;
                    break;
                }
            }
        }
    }

    report
}

/// Soldier-row indices of a squad's soldiers still able to fight
fn living_soldiers(
    turn: &Turn,
    squads: &[Squad],
    soldier_rows: &AHashMap<SoldierId, usize>,
    si: usize,
) -> Vec<usize> {
    squads[turn.squads[si].squad.index()]
        .soldiers
        .iter()
        .filter_map(|s| soldier_rows.get(s).copied())
        .filter(|&row| !turn.soldiers[row].wound_status.is_dead())
        .collect()
}
