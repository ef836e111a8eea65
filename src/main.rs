mod app;
mod data;

use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use facet_bubbles::{EngineConfig, JitterSource};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// JSON array of `{ "id": ..., "facets": { ... } }` objects.
    #[arg(long)]
    entities: Option<PathBuf>,

    /// Engine configuration as JSON; missing fields use defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Facet to activate at start-up, oldest first. Repeatable.
    #[arg(long = "facet")]
    facets: Vec<String>,

    /// Seed for placement jitter. Without it every run looks different.
    #[arg(long)]
    seed: Option<u64>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = match &args.config {
        Some(path) => EngineConfig::from_json_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let entities = data::load_or_sample(args.entities.as_deref())?;
    let jitter = match args.seed {
        Some(seed) => JitterSource::seeded(seed),
        None => JitterSource::entropy(),
    };
    info!(
        entities = entities.len(),
        facets = args.facets.len(),
        seeded = args.seed.is_some(),
        "starting viewer"
    );

    let state = app::BubbleApp::new(config, jitter, entities, args.facets)?;
    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default().with_inner_size([1280.0, 820.0]),
        ..Default::default()
    };

    eframe::run_native(
        "facet-bubbles",
        options,
        Box::new(move |_cc| Ok(Box::new(state))),
    )
    .map_err(|error| anyhow::anyhow!("viewer failed: {error}"))
}
