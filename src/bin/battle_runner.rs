//! Headless Battle Runner
//!
//! Builds a two-sided scenario, runs it to its end condition and prints a
//! JSON or text report. Seeded runs are fully deterministic.

use clap::Parser;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use warfield::battle::{initialize_battle, ExternalUnit, OrderKind, UnitKind};
use warfield::core::types::{CharacterRef, FactionRef, NpcRef, WorldUnitRef};

/// Headless battle runner - deterministic engine scenarios
#[derive(Parser, Debug)]
#[command(name = "battle_runner")]
#[command(about = "Run a two-sided battle to completion and report the outcome")]
struct Args {
    /// Units fielded by side A
    #[arg(long, default_value_t = 3)]
    side_a_units: usize,

    /// Units fielded by side B
    #[arg(long, default_value_t = 3)]
    side_b_units: usize,

    /// Soldiers per unit
    #[arg(long, default_value_t = 24)]
    soldiers: usize,

    /// Side A follows player orders (charge); side B is AI-controlled
    #[arg(long)]
    player_side_a: bool,

    /// Maximum ticks before giving up
    #[arg(long, default_value_t = 500)]
    max_ticks: u32,

    /// Random seed for deterministic runs
    #[arg(long)]
    seed: Option<u64>,

    /// Output format: json or text
    #[arg(long, default_value = "json")]
    format: String,

    /// Print per-tick progress to stderr
    #[arg(long, short = 'v')]
    verbose: bool,
}

#[derive(Serialize)]
struct RunReport {
    ended: bool,
    ticks: u32,
    side_a_living: usize,
    side_b_living: usize,
    regrouped_units: usize,
    fallback_collisions: u64,
    seed: u64,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warfield=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let seed = args.seed.unwrap_or_else(rand::random);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let faction_a = FactionRef::new();
    let faction_b = FactionRef::new();

    let mut units = Vec::new();
    for i in 0..args.side_a_units {
        units.push(scenario_unit(
            faction_a,
            args.player_side_a.then(CharacterRef::new),
            format!("A-{i}"),
            args.soldiers,
            i,
            args.player_side_a.then_some(OrderKind::Charge),
        ));
    }
    for i in 0..args.side_b_units {
        units.push(scenario_unit(
            faction_b,
            None,
            format!("B-{i}"),
            args.soldiers,
            i,
            None,
        ));
    }

    let mut battle = initialize_battle([vec![faction_a], vec![faction_b]], units)
        .expect("scenario roster is valid");
    battle.start().expect("fresh battle starts");

    let mut regrouped = 0usize;
    let mut ticks = 0u32;
    while battle.is_active() && ticks < args.max_ticks {
        let report = battle.tick(&mut rng).expect("active battle ticks");
        ticks = report.turn;
        regrouped += report.regrouping.len();

        if args.verbose {
            let turn = battle.latest_turn().expect("battle has turns");
            let living =
                turn.living_by_side(&battle.units, &battle.squads, &battle.soldiers);
            eprintln!(
                "tick {:3}  living {}/{}  moved {}  wounds {}",
                report.turn,
                living[0],
                living[1],
                report.movement.desires_granted + report.movement.fallback_moves,
                report.combat.wounds_inflicted,
            );
        }
    }

    let living = battle
        .latest_turn()
        .map(|t| t.living_by_side(&battle.units, &battle.squads, &battle.soldiers))
        .unwrap_or([0, 0]);

    let report = RunReport {
        ended: !battle.is_active(),
        ticks,
        side_a_living: living[0],
        side_b_living: living[1],
        regrouped_units: regrouped,
        fallback_collisions: battle.fallback_collisions,
        seed,
    };

    match args.format.as_str() {
        "text" => {
            println!("Battle Report");
            println!("=============");
            println!("Ended: {}", report.ended);
            println!("Ticks: {}", report.ticks);
            println!("Side A living: {}", report.side_a_living);
            println!("Side B living: {}", report.side_b_living);
            println!("Regrouped units: {}", report.regrouped_units);
            println!("Fallback collisions: {}", report.fallback_collisions);
            println!("Seed: {}", report.seed);
        }
        _ => {
            println!("{}", serde_json::to_string_pretty(&report).expect("report serializes"));
        }
    }
}

fn scenario_unit(
    faction: FactionRef,
    owner: Option<CharacterRef>,
    name: String,
    soldiers: usize,
    index: usize,
    default_order: Option<OrderKind>,
) -> ExternalUnit {
    // Spread units over the central lanes of the front line.
    let lanes: [i8; 5] = [0, 1, -1, 2, -2];
    ExternalUnit {
        world_unit: WorldUnitRef::new(),
        faction,
        owner,
        name,
        kind: UnitKind::Infantry,
        soldiers: (0..soldiers).map(|_| NpcRef::new()).collect(),
        battle_line: (index / lanes.len()) as u8 % 5,
        battle_side_pos: lanes[index % lanes.len()],
        default_order,
    }
}
