//! TickLab CLI — run, validate and synthetic-data commands.
//!
//! Commands:
//! - `run` — walk-forward backtest of a TOML config over a Parquet/CSV tick file
//! - `validate` — check a config (and optionally a dataset) without running
//! - `synth` — write a deterministic synthetic tick dataset
//!
//! Logging goes to stderr and honours `RUST_LOG` (default `info`).

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ticklab_core::config::BacktestConfig;
use ticklab_core::data::{generate, load_ticks, write_ticks, SyntheticSpec};
use ticklab_runner::{run_pipeline, save_artifacts, RunArtifacts, WalkForwardOptions};

#[derive(Parser)]
#[command(
    name = "ticklab",
    about = "TickLab CLI — walk-forward tick-level alpha backtester"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a walk-forward backtest and save its artifacts.
    Run {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Tick dataset (.parquet or .csv).
        #[arg(long)]
        data: PathBuf,

        /// Output directory; artifacts land in `{output_dir}/{name}/`.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Evaluate days one at a time instead of on the thread pool.
        #[arg(long, default_value_t = false)]
        sequential: bool,
    },
    /// Validate a config, and its columns against a dataset if given.
    Validate {
        #[arg(long)]
        config: PathBuf,

        #[arg(long)]
        data: Option<PathBuf>,
    },
    /// Write a synthetic tick dataset with planted imbalance signal.
    Synth {
        /// Output file (.parquet or .csv).
        #[arg(long)]
        out: PathBuf,

        #[arg(long, default_value_t = 20)]
        days: usize,

        #[arg(long, default_value_t = 2_000)]
        ticks_per_day: usize,

        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            data,
            output_dir,
            sequential,
        } => run_backtest_cmd(&config, &data, &output_dir, sequential),
        Commands::Validate { config, data } => run_validate(&config, data.as_deref()),
        Commands::Synth {
            out,
            days,
            ticks_per_day,
            seed,
        } => run_synth(&out, days, ticks_per_day, seed),
    }
}

fn run_backtest_cmd(
    config_path: &Path,
    data_path: &Path,
    output_dir: &Path,
    sequential: bool,
) -> Result<()> {
    let config = BacktestConfig::from_file(config_path)?;
    let frame = load_ticks(data_path)
        .with_context(|| format!("failed to load ticks from {}", data_path.display()))?;

    let options = WalkForwardOptions {
        parallel: !sequential,
    };
    let artifacts = run_pipeline(&frame, &config, options)?;

    print_summary(&artifacts);

    let run_dir = save_artifacts(&artifacts, output_dir)?;
    println!("Artifacts saved to: {}", run_dir.display());
    Ok(())
}

fn run_validate(config_path: &Path, data_path: Option<&Path>) -> Result<()> {
    let config = BacktestConfig::from_file(config_path)?;
    config.validate()?;
    println!("Config OK: {} (target {})", config.name, config.target_column());

    if let Some(path) = data_path {
        let frame = load_ticks(path)?;
        config.validate_against(&frame)?;
        let days = frame.days().len();
        if days <= config.training_period {
            bail!(
                "dataset has {days} trading day(s); training_period {} leaves nothing to evaluate",
                config.training_period
            );
        }
        println!(
            "Dataset OK: {} rows, {} days, {} evaluation days",
            frame.len(),
            days,
            days - config.training_period
        );
    }
    Ok(())
}

fn run_synth(out: &Path, days: usize, ticks_per_day: usize, seed: u64) -> Result<()> {
    let spec = SyntheticSpec {
        days,
        ticks_per_day,
        seed,
        ..Default::default()
    };
    let frame = generate(&spec)?;
    write_ticks(&frame, out)?;
    info!(path = %out.display(), rows = frame.len(), "synthetic dataset written");
    println!("Wrote {} rows over {} days to {}", frame.len(), days, out.display());
    Ok(())
}

fn print_summary(artifacts: &RunArtifacts) {
    let s = &artifacts.summary;
    println!();
    println!("=== Backtest Result ===");
    println!("Run:            {}", artifacts.config.name);
    println!("Target:         {}", artifacts.config.target_column());
    println!(
        "Days:           {} evaluated ({} fitted, {} failed)",
        artifacts.fitting_stats.len(),
        artifacts.fitted_days(),
        artifacts.failed_days()
    );
    println!("Rows:           {}", artifacts.table.len());
    println!("Trades:         {}", s.n_trades);
    println!("Trading Days:   {}", s.n_trading_days);
    println!();
    println!("--- Performance ---");
    println!("Total PnL:      {:.2}", s.total_pnl);
    println!("Total Net PnL:  {:.2}", s.total_net_pnl);
    println!("Win Rate:       {:.1}%", s.winning_rate * 100.0);
    println!("Net Win Rate:   {:.1}%", s.net_winning_rate * 100.0);
    println!("Net PnL / Day:  {:.2}", s.avg_net_pnl_per_day);
    if let Some(avg) = s.avg_net_pnl_per_trade {
        println!("Net PnL / Trade:{avg:.4}");
    }
    if let Some(corr) = s.corr_alpha_pnl {
        println!("Corr(a, PnL):   {corr:.4}");
    }
    if artifacts.failed_days() > 0 {
        println!();
        println!(
            "WARNING: {} day(s) failed to fit; see fitting_stats.csv",
            artifacts.failed_days()
        );
    }
    println!();
}
