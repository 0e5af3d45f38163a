//! # engine_app: demo runner
//!
//! ## Startup Sequence
//!
//! 1. Load the tick configuration (`--config`, defaults otherwise).
//! 2. Apply command-line overrides and validate.
//! 3. Populate the demo world and register the demo systems.
//! 4. Enter the fixed-timestep tick loop.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use engine_app::{TickConfig, TickLoop, demo};

#[derive(Parser)]
#[command(name = "engine_app", about = "Runs the ECS query demo on a fixed timestep")]
struct Args {
    /// Path to a JSON tick configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of ticks to run (0 = unlimited)
    #[arg(short, long)]
    ticks: Option<u64>,

    /// Number of entities to spawn
    #[arg(short, long)]
    entities: Option<usize>,

    /// Target ticks per second
    #[arg(long)]
    tick_rate: Option<f64>,
}

fn main() -> Result<()> {
    // Initialise structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("engine_app=info".parse()?))
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => TickConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => TickConfig::default(),
    };
    if let Some(ticks) = args.ticks {
        config.max_ticks = ticks;
    }
    if let Some(entities) = args.entities {
        config.entities = entities;
    }
    if let Some(tick_rate) = args.tick_rate {
        config.tick_rate = tick_rate;
    }
    config.validate()?;

    info!(
        tick_rate = config.tick_rate,
        max_ticks = config.max_ticks,
        entities = config.entities,
        "engine demo starting"
    );

    let entities = config.entities;
    let mut tick_loop = TickLoop::new(config);
    demo::populate(tick_loop.world_mut(), entities);
    demo::register_systems(&mut tick_loop)?;
    tick_loop.run();

    info!("engine demo shut down");
    Ok(())
}
