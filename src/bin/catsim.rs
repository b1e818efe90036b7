use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand_pcg::Pcg64;

use catsim::model::item_information;
use catsim::{
    AbilityDistribution, CatConfig, CatEngine, ItemBank, Responder, SimulatedResponder,
    ValidationHarness,
};

#[derive(Debug, Parser)]
#[command(name = "catsim", version, about = "Adaptive testing engine and recovery harness")]
struct Cli {
    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Monte Carlo recovery study over a standard normal population
    Validate {
        #[arg(long)]
        bank: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(short = 'n', long, default_value_t = 10_000)]
        examinees: usize,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run one simulated session and print every step
    Simulate {
        #[arg(long)]
        bank: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, allow_hyphen_values = true)]
        theta: f64,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Rank bank items by information at a given ability
    Information {
        #[arg(long)]
        bank: PathBuf,
        #[arg(long, allow_hyphen_values = true)]
        theta: f64,
    },
}

fn main() {
    if let Err(error) = run() {
        eprintln!("catsim error: {error:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose)?;

    match cli.command {
        Command::Validate {
            bank,
            config,
            examinees,
            seed,
            json,
        } => {
            let engine = load_engine(&bank, config.as_ref())?;
            let harness = ValidationHarness::new(engine);
            let report = harness
                .run(&AbilityDistribution::StandardNormal { n: examinees }, seed)
                .context("validation run failed")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{report}");
            }
        }
        Command::Simulate {
            bank,
            config,
            theta,
            seed,
        } => {
            let engine = load_engine(&bank, config.as_ref())?;
            simulate(&engine, theta, seed)?;
        }
        Command::Information { bank, theta } => {
            let bank = ItemBank::from_json_file(&bank)
                .with_context(|| format!("failed to load item bank {}", bank.display()))?;
            let mut ranked: Vec<_> = bank
                .items()
                .iter()
                .map(|item| (item, item_information(item, theta)))
                .collect();
            ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.id().cmp(&b.0.id())));
            println!("{:>6} {:>8} {:>10}  text", "item", "reverse", "info");
            for (item, info) in ranked {
                println!(
                    "{:>6} {:>8} {:>10.4}  {}",
                    item.id(),
                    item.is_reverse(),
                    info,
                    item.display_text()
                );
            }
        }
    }

    Ok(())
}

fn load_engine(bank: &Path, config: Option<&PathBuf>) -> anyhow::Result<Arc<CatEngine>> {
    let items = ItemBank::from_json_file(bank)
        .with_context(|| format!("failed to load item bank {}", bank.display()))?;
    let config = match config {
        Some(path) => CatConfig::from_toml_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => CatConfig::default(),
    };
    let engine = CatEngine::new(Arc::new(items), config).context("invalid engine configuration")?;
    Ok(Arc::new(engine))
}

fn simulate(engine: &Arc<CatEngine>, theta: f64, seed: u64) -> anyhow::Result<()> {
    let mut session = engine.start_session("cli", seed);
    let mut responder = SimulatedResponder::new(theta, Pcg64::seed_from_u64(seed.wrapping_add(1)));

    println!("{:>4} {:>6} {:>9} {:>8} {:>8}", "step", "item", "category", "theta", "sem");
    let mut step = 1;
    while let Some(item) = session.pending_item() {
        let item_id = item.id();
        let category = responder.respond(item);
        session.submit_response(item_id, category)?;
        println!(
            "{:>4} {:>6} {:>9} {:>8.3} {:>8.3}",
            step,
            item_id,
            category,
            session.theta(),
            session.sem()
        );
        step += 1;
    }

    let result = session.result();
    println!(
        "status={} theta_hat={:.3} sem={:.3} items={} degraded={}",
        result.status,
        result.theta_hat,
        result.sem,
        result.administered_count(),
        result.degraded_estimate
    );
    if let Some(score) = session.legacy_score() {
        println!(
            "legacy raw={} range=[{}, {}] percent={:.1}",
            score.raw, score.min_raw, score.max_raw, score.percent
        );
    }
    Ok(())
}

fn init_tracing(quiet: bool, verbose: bool) -> anyhow::Result<()> {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env("CATSIM_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}
