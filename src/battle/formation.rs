//! Formation layout computation
//!
//! Arranges a side's squads into a line formation: five main battle lines
//! split into seven lanes, plus flank and far-flank blocks. Output offsets
//! are relative to the formation center and are mirrored per side so the
//! two deployments face each other across the midline.

use serde::{Deserialize, Serialize};

use crate::battle::constants::DEPLOYMENT_DEPTH;
use crate::battle::grid::Coord;
use crate::battle::units::SquadId;
use crate::core::error::{BattleError, Result};

/// Formation kinds an organization can configure
///
/// Only `Line` has a layout; the rest are recognized configuration values
/// that fail fast when a battle tries to deploy with them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FormationKind {
    #[default]
    Line,
    Column,
    Square,
    Wedge,
    InvertedWedge,
}

impl FormationKind {
    pub fn name(&self) -> &'static str {
        match self {
            FormationKind::Line => "line",
            FormationKind::Column => "column",
            FormationKind::Square => "square",
            FormationKind::Wedge => "wedge",
            FormationKind::InvertedWedge => "iwedge",
        }
    }
}

/// Tunables for a side's formation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormationSettings {
    pub kind: FormationKind,
    /// Squads per column before a lane starts a new column
    pub element_size: usize,
    /// Cell gap between battle lines and flank blocks
    pub spacing: i32,
}

impl Default for FormationSettings {
    fn default() -> Self {
        Self {
            kind: FormationKind::Line,
            element_size: 4,
            spacing: 1,
        }
    }
}

/// One squad's deployment bucket: its unit's configured line and lane
#[derive(Debug, Clone, Copy)]
pub struct FormationEntry {
    pub squad: SquadId,
    /// 0 = advanced .. 4 = rearguard
    pub battle_line: u8,
    /// -5 far-left-flank .. 5 far-right-flank; |4| flank, |5| far-flank
    pub side_pos: i8,
}

const MAIN_LINES: usize = 5;
const MAIN_LANE_MAX: i8 = 3;
const FLANK_LANE: i8 = 4;
const FAR_FLANK_LANE: i8 = 5;

/// A battle line: columns of squads, ordered left to right
#[derive(Debug, Default)]
struct Line {
    columns: Vec<Vec<SquadId>>,
}

impl Line {
    fn width(&self) -> usize {
        self.columns.len()
    }

    /// Append a lane's squads as new columns growing outward:
    /// rightward for the center and positive lanes, leftward for negative.
    fn push_lane(&mut self, squads: &[SquadId], element_size: usize, outward_right: bool) {
        for chunk in squads.chunks(element_size.max(1)) {
            if outward_right {
                self.columns.push(chunk.to_vec());
            } else {
                self.columns.insert(0, chunk.to_vec());
            }
        }
    }
}

/// Lay out a side's squads, producing offsets relative to the formation
/// center
///
/// Fails fast on formation kinds without a layout.
pub fn layout(
    entries: &[FormationEntry],
    settings: &FormationSettings,
) -> Result<Vec<(SquadId, Coord)>> {
    match settings.kind {
        FormationKind::Line => Ok(layout_line(entries, settings)),
        other => Err(BattleError::UnknownFormation(other.name().to_string())),
    }
}

fn layout_line(entries: &[FormationEntry], settings: &FormationSettings) -> Vec<(SquadId, Coord)> {
    let mut placements = Vec::with_capacity(entries.len());

    // Main block: lanes -3..=3 over five lines.
    let mut main_lines: Vec<Line> = (0..MAIN_LINES).map(|_| Line::default()).collect();
    for (line_index, line) in main_lines.iter_mut().enumerate() {
        // Center first, then alternating outward so inner lanes sit nearer
        // the middle of the line.
        line.push_lane(
            &lane_squads(entries, line_index as u8, 0),
            settings.element_size,
            true,
        );
        for lane in 1..=MAIN_LANE_MAX {
            line.push_lane(
                &lane_squads(entries, line_index as u8, lane),
                settings.element_size,
                true,
            );
            line.push_lane(
                &lane_squads(entries, line_index as u8, -lane),
                settings.element_size,
                false,
            );
        }
    }

    let widest_main = main_lines.iter().map(Line::width).max().unwrap_or(0);

    for (line_index, line) in main_lines.iter().enumerate() {
        let half_width = (line.width() / 2) as i32;
        emit_block(
            &mut placements,
            line,
            line_index,
            settings,
            |column| column as i32 - half_width,
        );
    }

    // Flank blocks: lanes +-4, five lines deep, offset beyond the widest
    // main line and growing outward.
    let flank_offset = (widest_main / 2) as i32 + settings.spacing;
    let mut flank_extreme = [flank_offset, flank_offset]; // [left, right], absolute |x|

    for (side_index, lane) in [(-1i32, -FLANK_LANE), (1i32, FLANK_LANE)] {
        for line_index in 0..MAIN_LINES {
            let mut line = Line::default();
            line.push_lane(
                &lane_squads(entries, line_index as u8, lane),
                settings.element_size,
                true,
            );
            let extreme = flank_offset + line.width().saturating_sub(1) as i32;
            let slot = if side_index < 0 { 0 } else { 1 };
            flank_extreme[slot] = flank_extreme[slot].max(extreme);
            emit_block(&mut placements, &line, line_index, settings, |column| {
                side_index * (flank_offset + column as i32)
            });
        }
    }

    // Far flanks: lanes +-5, a further spacing * 2 beyond the observed
    // extreme of the flank block.
    for (side_index, lane) in [(-1i32, -FAR_FLANK_LANE), (1i32, FAR_FLANK_LANE)] {
        let slot = if side_index < 0 { 0 } else { 1 };
        let far_offset = flank_extreme[slot] + settings.spacing * 2;
        for line_index in 0..MAIN_LINES {
            let mut line = Line::default();
            line.push_lane(
                &lane_squads(entries, line_index as u8, lane),
                settings.element_size,
                true,
            );
            emit_block(&mut placements, &line, line_index, settings, |column| {
                side_index * (far_offset + column as i32)
            });
        }
    }

    placements
}

fn lane_squads(entries: &[FormationEntry], battle_line: u8, lane: i8) -> Vec<SquadId> {
    entries
        .iter()
        .filter(|e| e.battle_line == battle_line && e.side_pos == lane)
        .map(|e| e.squad)
        .collect()
}

fn emit_block<F>(
    placements: &mut Vec<(SquadId, Coord)>,
    line: &Line,
    line_index: usize,
    settings: &FormationSettings,
    x_of_column: F,
) where
    F: Fn(usize) -> i32,
{
    let line_stride = settings.element_size as i32 + settings.spacing;
    for (column, squads) in line.columns.iter().enumerate() {
        for (row, &squad) in squads.iter().enumerate() {
            let coord = Coord::new(
                x_of_column(column),
                line_index as i32 * line_stride + row as i32,
            );
            placements.push((squad, coord));
        }
    }
}

/// Translate a formation-relative offset into an absolute starting
/// coordinate for the given side
///
/// Side z=false deploys at negative z with line 0 nearest the midline;
/// side z=true mirrors through the origin.
pub fn to_absolute(side_z: bool, offset: Coord) -> Coord {
    if side_z {
        Coord::new(-offset.x, DEPLOYMENT_DEPTH + offset.z)
    } else {
        Coord::new(offset.x, -(DEPLOYMENT_DEPTH + offset.z))
    }
}

/// The z direction in which a side advances toward its opponent
pub fn forward(side_z: bool) -> i32 {
    if side_z {
        -1
    } else {
        1
    }
}
