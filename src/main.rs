use std::process;

use clap::Parser;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use abyss_engine::coords::WindowPos;
use abyss_engine::export;
use abyss_engine::population::{Population, Roster};
use abyss_engine::storage::AbyssStorage;
use abyss_engine::{Abyss, AbyssConfig, AdvanceModifiers, GameProgress, Result};

#[derive(Parser, Debug)]
#[command(name = "abyss")]
#[command(about = "Wander a procedurally shifting Abyss level and export what it looks like")]
struct Args {
    /// Random seed (uses random seed if not specified)
    #[arg(short, long)]
    seed: Option<u64>,

    /// JSON configuration file; missing fields take defaults
    #[arg(short, long)]
    config: Option<String>,

    /// Override the window width in tiles
    #[arg(short = 'W', long)]
    width: Option<usize>,

    /// Override the window height in tiles
    #[arg(short = 'H', long)]
    height: Option<usize>,

    /// Level within the Abyss branch
    #[arg(short, long, default_value = "1")]
    level: u32,

    /// Number of player turns to simulate
    #[arg(short, long, default_value = "200")]
    turns: u32,

    /// Time units per turn
    #[arg(long, default_value = "10")]
    turn_length: u32,

    /// Treat the Abyss as hostile (faster churn)
    #[arg(long)]
    hostile: bool,

    /// Teleport every N turns (0 disables)
    #[arg(long, default_value = "0")]
    teleport_every: u32,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log: String,

    /// Directory for saved levels
    #[arg(long)]
    save_dir: Option<String>,

    /// Resume the saved level instead of entering a fresh one
    #[arg(long)]
    resume: bool,

    /// Export the final window to a PNG
    #[arg(long)]
    export_png: Option<String>,

    /// Pixels per tile in the PNG export
    #[arg(long, default_value = "4")]
    png_scale: u32,

    /// Export the final window as ASCII text
    #[arg(long)]
    export_ascii: Option<String>,

    /// Print the final window to stdout
    #[arg(long)]
    print: bool,
}

fn main() {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log));
    tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(filter)
        .init();

    if let Err(e) = run(args) {
        eprintln!("abyss: {}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => AbyssConfig::load(path)?,
        None => AbyssConfig::default(),
    };
    if let Some(width) = args.width {
        config.window_width = width;
    }
    if let Some(height) = args.height {
        config.window_height = height;
    }
    config.validate()?;

    let seed = args.seed.unwrap_or_else(rand::random);
    let storage = args.save_dir.as_ref().map(|dir| AbyssStorage::new(dir, seed));
    let progress = GameProgress { abyss_level: args.level, has_rune: false };
    let mut roster = Roster::new();

    println!("Abyss seed {} level {}", seed, args.level);
    println!("Window {}x{}", config.window_width, config.window_height);

    let saved = match (&storage, args.resume) {
        (Some(storage), true) => storage.load(args.level)?,
        _ => None,
    };
    let mut abyss = match saved {
        Some(saved) => Abyss::from_saved(config, saved)?,
        None => {
            if args.resume {
                warn!(level = args.level, "nothing saved for this level, entering fresh");
            }
            let mut abyss = Abyss::new(config, seed)?.with_progress(progress);
            abyss.enter_fresh(&mut roster)?;
            abyss
        }
    };

    // The player wanders at random over walkable ground
    let mut walker = ChaCha8Rng::seed_from_u64(seed ^ 0x5eed_0f_a55);
    let modifiers = AdvanceModifiers { hostile: args.hostile, surge: 1.0 };
    let mut shifts = 0;
    let mut written = 0;
    let mut teleports = 0;

    for turn in 1..=args.turns {
        let player = abyss.player_pos();
        let steps: Vec<WindowPos> = abyss
            .grid()
            .neighbors_8(player)
            .into_iter()
            .filter(|p| abyss.tile(*p).map_or(false, |t| t.feature.is_walkable()))
            .filter(|p| roster.monster_at(*p).is_none())
            .collect();
        if let Some(&next) = steps.choose(&mut walker) {
            if abyss.request_shift_if_needed(next, &mut roster).is_some() {
                shifts += 1;
            }
        }

        if args.teleport_every > 0 && turn % args.teleport_every == 0 {
            abyss.teleport(walker.gen_bool(0.5), &mut roster);
            teleports += 1;
        }

        let report = abyss.tick(args.turn_length, modifiers, &mut roster);
        written += report.written + report.downgraded;
    }

    let state = abyss.state();
    info!(
        depth = state.depth,
        origin = %state.origin_offset,
        shifts,
        teleports,
        written,
        "session finished"
    );
    println!(
        "After {} turns: depth {}, {} shifts, {} teleports, {} tiles rewritten",
        args.turns, state.depth, shifts, teleports, written
    );
    println!(
        "{} monsters, {} items, {} vaults on the level",
        roster.monster_count(),
        roster.item_count(),
        abyss.fragments().len()
    );

    if let Some(storage) = &storage {
        let path = storage.save(&abyss.to_saved())?;
        println!("Saved to {}", path.display());
    }
    if let Some(path) = &args.export_png {
        match export::export_png(&abyss, &roster, path, args.png_scale) {
            Ok(()) => println!("Exported PNG to {}", path),
            Err(e) => warn!(error = %e, path = %path, "PNG export failed"),
        }
    }
    if let Some(path) = &args.export_ascii {
        export::export_ascii(&abyss, &roster, path)?;
        println!("Exported ASCII to {}", path);
    }
    if args.print {
        print!("{}", export::render_ascii(&abyss, &roster));
    }
    Ok(())
}
