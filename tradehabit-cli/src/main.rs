//! TradeHabit CLI: analyze broker order logs for trading-habit mistakes.
//!
//! Commands:
//! - `analyze`: full analysis of one or more logs, JSON report per log
//! - `trades`: reconstructed, tagged trades; optional CSV or JSON export
//! - `goals`: clean-streak progress toward a custom goal
//! - `show`: summary of a previously saved artifact directory
//! - `config`: print the default thresholds as TOML

mod logging;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tradehabit_core::domain::Mistake;
use tradehabit_core::ingest::{offset_from_hours, NormalizeOptions};
use tradehabit_runner::export::{export_trades_csv, export_trades_json, load_artifacts, save_artifacts};
use tradehabit_runner::{
    AnalysisConfig, AnalysisReport, AnalysisSession, ConfigOverrides, Goal, StreakMetric,
};

use logging::{init_logging, LogFormat};

#[derive(Parser)]
#[command(
    name = "tradehabit",
    about = "TradeHabit CLI: find costly habits in broker order logs"
)]
struct Cli {
    /// Log output format. Falls back to LOG_FORMAT, then pretty.
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command that reads a log.
#[derive(Args, Clone)]
struct LoadArgs {
    /// Threshold file (TOML). Missing keys take their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Hours east of UTC for timestamps without an offset.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    utc_offset_hours: i32,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze order logs and print (or save) one report per log.
    Analyze {
        /// Broker CSV exports.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        load: LoadArgs,

        /// Excessive-risk sigma.
        #[arg(long)]
        sigma_risk: Option<f64>,

        /// Outsized-loss sigma.
        #[arg(long)]
        sigma_loss: Option<f64>,

        /// Revenge window as a multiple of the median hold time.
        #[arg(long)]
        revenge_k: Option<f64>,

        /// Risk-sizing variation threshold.
        #[arg(long)]
        variability: Option<f64>,

        /// OCO pairing window in seconds.
        #[arg(long)]
        oco_window: Option<f64>,

        /// Save report.json, trades.csv and report.md per log under this directory.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// List reconstructed, tagged trades.
    Trades {
        file: PathBuf,

        #[command(flatten)]
        load: LoadArgs,

        /// Write the trades to this path: JSON for a `.json` extension, CSV otherwise.
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Print the summary of a saved analysis (`analyze --output` directory).
    Show {
        dir: PathBuf,
    },
    /// Evaluate a clean-streak goal.
    Goals {
        file: PathBuf,

        #[command(flatten)]
        load: LoadArgs,

        /// Count streaks in trades or trading days.
        #[arg(long, default_value_t = StreakMetric::Trades)]
        metric: StreakMetric,

        /// Mistake that breaks the streak (repeatable; none = any mistake).
        #[arg(long = "mistake")]
        mistakes: Vec<String>,

        /// Streak length to reach.
        #[arg(long, default_value_t = 50)]
        target: u32,

        /// Ignore trades entered before this date (YYYY-MM-DD).
        #[arg(long)]
        start: Option<String>,
    },
    /// Print the default configuration as TOML.
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let format = cli
        .log_format
        .or_else(LogFormat::from_env)
        .unwrap_or_default();
    init_logging(format, "info")?;

    match cli.command {
        Commands::Analyze {
            files,
            load,
            sigma_risk,
            sigma_loss,
            revenge_k,
            variability,
            oco_window,
            output,
        } => {
            let overrides = ConfigOverrides {
                sigma_excessive_risk: sigma_risk,
                sigma_outsized_loss: sigma_loss,
                revenge_multiplier: revenge_k,
                risk_variability_threshold: variability,
                oco_window_seconds: oco_window,
            };
            run_analyze(&files, &load, &overrides, output.as_deref())
        }
        Commands::Trades { file, load, export } => run_trades(&file, &load, export.as_deref()),
        Commands::Goals {
            file,
            load,
            metric,
            mistakes,
            target,
            start,
        } => run_goals(&file, &load, metric, &mistakes, target, start.as_deref()),
        Commands::Show { dir } => {
            let report = load_artifacts(&dir)
                .with_context(|| format!("failed to load artifacts from {}", dir.display()))?;
            print_summary(&dir, &report);
            Ok(())
        }
        Commands::Config => {
            print!("{}", AnalysisConfig::default().to_toml()?);
            Ok(())
        }
    }
}

fn load_config(load: &LoadArgs, overrides: &ConfigOverrides) -> Result<AnalysisConfig> {
    let base = match &load.config {
        Some(path) => AnalysisConfig::from_file(path)?,
        None => AnalysisConfig::default(),
    };
    Ok(base.with_overrides(overrides)?)
}

fn open_session(path: &Path, load: &LoadArgs, config: AnalysisConfig) -> Result<AnalysisSession> {
    let opts = NormalizeOptions {
        utc_offset: offset_from_hours(load.utc_offset_hours),
    };
    let session = AnalysisSession::from_csv_path(path, &opts, config)
        .with_context(|| format!("failed to load {}", path.display()))?;
    if !session.dropped_rows().is_empty() {
        info!(
            file = %path.display(),
            dropped = session.dropped_rows().len(),
            "rows skipped during ingest"
        );
    }
    Ok(session)
}

fn run_analyze(
    files: &[PathBuf],
    load: &LoadArgs,
    overrides: &ConfigOverrides,
    output: Option<&Path>,
) -> Result<()> {
    let config = load_config(load, overrides)?;
    info!(fingerprint = %config.fingerprint(), files = files.len(), "analyzing");

    // One independent session per file.
    let results: Vec<(PathBuf, Result<AnalysisSession>)> = files
        .par_iter()
        .map(|path| {
            let session = open_session(path, load, config).map(|mut s| {
                s.analyze();
                s
            });
            (path.clone(), session)
        })
        .collect();

    let mut reports: BTreeMap<String, &AnalysisReport> = BTreeMap::new();
    let mut failures = 0usize;
    for (path, result) in &results {
        let session = match result {
            Ok(s) => s,
            Err(e) => {
                error!(file = %path.display(), "{e:#}");
                failures += 1;
                continue;
            }
        };
        let Some(report) = session.report() else {
            continue;
        };
        if let Some(dir) = output {
            let run_dir = save_artifacts(report, session.trades(), dir, path)
                .with_context(|| format!("failed to save artifacts for {}", path.display()))?;
            print_summary(path, report);
            println!("Artifacts saved to: {}", run_dir.display());
        } else {
            reports.insert(path.display().to_string(), report);
        }
    }

    if output.is_none() {
        let json = match (files.len(), reports.values().next()) {
            (1, Some(report)) => serde_json::to_string_pretty(report)?,
            _ => serde_json::to_string_pretty(&reports)?,
        };
        println!("{json}");
    }

    if failures > 0 {
        bail!("{failures} of {} logs failed to analyze", files.len());
    }
    Ok(())
}

fn print_summary(path: &Path, report: &AnalysisReport) {
    let s = &report.summary;
    let d = &report.detectors;
    println!("{}", path.display());
    println!("  Trades:           {}", report.trade_count);
    println!(
        "  Clean:            {} ({:.1}%)",
        s.clean_trades,
        s.clean_rate * 100.0
    );
    for (mistake, count) in &s.counts {
        println!("  {:<18}{}", format!("{mistake}:"), count);
    }
    println!("  Risk sizing:      {:?}", d.risk_sizing.verdict);
    println!(
        "  Win rate:         {:.1}% (breakeven {:.1}%, {:?})",
        report.breakeven.win_rate * 100.0,
        report.breakeven.breakeven_win_rate * 100.0,
        report.breakeven.band
    );
}

fn run_trades(file: &Path, load: &LoadArgs, export: Option<&Path>) -> Result<()> {
    let config = load_config(load, &ConfigOverrides::default())?;
    let mut session = open_session(file, load, config)?;
    session.analyze();
    let trades = session.trades();

    if let Some(path) = export {
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let body = if is_json {
            export_trades_json(trades)?
        } else {
            export_trades_csv(trades)?
        };
        std::fs::write(path, body)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Wrote {} trades to {}", trades.len(), path.display());
        return Ok(());
    }

    println!(
        "{:<6} {:<8} {:<6} {:<20} {:>10} {:>10} {:>6} {:>10} {:>8}  Mistakes",
        "Id", "Symbol", "Side", "Entry", "Entry Px", "Exit Px", "Qty", "PnL", "Risk"
    );
    println!("{}", "-".repeat(100));
    for t in trades {
        let mistakes: Vec<&str> = t.mistakes.iter().map(|m| m.label()).collect();
        println!(
            "{:<6} {:<8} {:<6} {:<20} {:>10.2} {:>10.2} {:>6} {:>10.2} {:>8}  {}",
            t.id.to_string(),
            t.symbol,
            format!("{:?}", t.side),
            t.entry_time.format("%Y-%m-%d %H:%M:%S"),
            t.entry_price,
            t.exit_price,
            t.exit_qty,
            t.pnl,
            t.risk_points.map_or_else(|| "-".to_string(), |r| format!("{r:.2}")),
            mistakes.join(", ")
        );
    }
    Ok(())
}

fn parse_mistakes(labels: &[String]) -> Result<Vec<Mistake>> {
    labels
        .iter()
        .map(|l| {
            Mistake::from_label(l).with_context(|| {
                let known: Vec<&str> = Mistake::ALL.iter().map(|m| m.label()).collect();
                format!("unknown mistake '{l}'. Valid: {}", known.join(", "))
            })
        })
        .collect()
}

fn run_goals(
    file: &Path,
    load: &LoadArgs,
    metric: StreakMetric,
    mistakes: &[String],
    target: u32,
    start: Option<&str>,
) -> Result<()> {
    let mistakes = parse_mistakes(mistakes)?;
    let start_date = start
        .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .transpose()
        .context("--start must be YYYY-MM-DD")?;

    let title = if mistakes.is_empty() {
        "No mistakes".to_string()
    } else {
        let labels: Vec<&str> = mistakes.iter().map(|m| m.label()).collect();
        format!("No {}", labels.join(" / "))
    };
    let goal = Goal {
        title,
        target,
        mistakes,
        metric,
        start_date,
    };

    let config = load_config(load, &ConfigOverrides::default())?;
    let mut session = open_session(file, load, config)?;
    session.set_goals(vec![goal]);
    let report = session.analyze();

    for g in &report.goals {
        println!("{}", g.title);
        println!("  Current streak: {} {}", g.current_streak, g.metric);
        println!("  Best streak:    {} {}", g.best_streak, g.metric);
        println!(
            "  Progress:       {:.0}% of {} {}",
            g.progress * 100.0,
            g.target,
            g.metric
        );
    }
    Ok(())
}
