//! Export: JSON, CSV and Markdown artifacts for an analysis.
//!
//! - **JSON**: the full [`AnalysisReport`] with schema versioning, plus the
//!   tagged trade list
//! - **CSV**: one row per trade, mistakes joined with `;`
//! - **Markdown**: a human-readable summary of one report
//!
//! Persisted reports carry `schema_version`; newer versions are rejected on load.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tradehabit_core::domain::Trade;

use crate::report::{AnalysisReport, SCHEMA_VERSION};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to flush CSV writer: {0}")]
    Flush(String),

    #[error("CSV output is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported schema version {found} (max supported: {supported})")]
    UnsupportedSchema { found: u32, supported: u32 },
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> ExportError + '_ {
    move |source| ExportError::Io {
        path: path.display().to_string(),
        source,
    }
}

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_report_json(report: &AnalysisReport) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Deserialize a report, rejecting schema versions newer than this build.
pub fn import_report_json(json: &str) -> Result<AnalysisReport, ExportError> {
    let report: AnalysisReport = serde_json::from_str(json)?;
    if report.schema_version > SCHEMA_VERSION {
        return Err(ExportError::UnsupportedSchema {
            found: report.schema_version,
            supported: SCHEMA_VERSION,
        });
    }
    Ok(report)
}

pub fn export_trades_json(trades: &[Trade]) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(trades)?)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Columns: id, symbol, side, entry_time, entry_price, entry_qty, exit_time,
/// exit_price, exit_qty, exit_order_id, pnl, points_lost, risk_points,
/// hold_seconds, mistakes
pub fn export_trades_csv(trades: &[Trade]) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "id",
        "symbol",
        "side",
        "entry_time",
        "entry_price",
        "entry_qty",
        "exit_time",
        "exit_price",
        "exit_qty",
        "exit_order_id",
        "pnl",
        "points_lost",
        "risk_points",
        "hold_seconds",
        "mistakes",
    ])?;

    for t in trades {
        let mistakes: Vec<&str> = t.mistakes.iter().map(|m| m.label()).collect();
        wtr.write_record([
            &t.id.0.to_string(),
            &t.symbol,
            &format!("{:?}", t.side),
            &t.entry_time.to_rfc3339(),
            &t.entry_price.to_string(),
            &t.entry_qty.to_string(),
            &t.exit_time.to_rfc3339(),
            &t.exit_price.to_string(),
            &t.exit_qty.to_string(),
            t.exit_order_id.as_str(),
            &format!("{:.2}", t.pnl),
            &format!("{:.2}", t.points_lost),
            &t.risk_points.map(|r| format!("{r:.2}")).unwrap_or_default(),
            &format!("{:.3}", t.hold_seconds()),
            &mistakes.join(";"),
        ])?;
    }

    let data = wtr
        .into_inner()
        .map_err(|e| ExportError::Flush(e.to_string()))?;
    Ok(String::from_utf8(data)?)
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Artifact directory name for the log at `source`:
/// `{stem}_{path hash prefix}_{fingerprint prefix}`.
///
/// Logs that share a file name but live in different directories get
/// different names; re-running one log with the same config reuses its
/// directory.
pub fn artifact_dir_name(report: &AnalysisReport, source: &Path) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "log".to_string());
    let resolved = source.canonicalize().unwrap_or_else(|_| source.to_path_buf());
    let path_hash = blake3::hash(resolved.to_string_lossy().as_bytes()).to_hex();
    let path_prefix = &path_hash.as_str()[..8];
    let config_prefix: String = report.config_fingerprint.chars().take(8).collect();
    format!("{stem}_{path_prefix}_{config_prefix}")
}

/// Save the artifact set for the log at `source`.
///
/// Creates [`artifact_dir_name`] under `output_dir` containing
/// `report.json`, `trades.csv` and `report.md`. Returns the directory.
pub fn save_artifacts(
    report: &AnalysisReport,
    trades: &[Trade],
    output_dir: &Path,
    source: &Path,
) -> Result<PathBuf, ExportError> {
    let run_dir = output_dir.join(artifact_dir_name(report, source));
    std::fs::create_dir_all(&run_dir).map_err(io_err(&run_dir))?;

    let files = [
        ("report.json", export_report_json(report)?),
        ("trades.csv", export_trades_csv(trades)?),
        ("report.md", generate_report(report)),
    ];
    for (name, content) in files {
        let path = run_dir.join(name);
        std::fs::write(&path, content).map_err(io_err(&path))?;
    }
    Ok(run_dir)
}

/// Load the report from an artifact directory's report.json.
pub fn load_artifacts(dir: &Path) -> Result<AnalysisReport, ExportError> {
    let path = dir.join("report.json");
    let json = std::fs::read_to_string(&path).map_err(io_err(&path))?;
    import_report_json(&json)
}

// ─── Markdown report ────────────────────────────────────────────────

fn opt(v: Option<f64>, decimals: usize) -> String {
    v.map_or_else(|| "n/a".to_string(), |x| format!("{x:.decimals$}"))
}

pub fn generate_report(report: &AnalysisReport) -> String {
    let mut md = String::with_capacity(2048);
    let d = &report.detectors;

    md.push_str("# Trading Habit Report\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Trades | {} |\n", report.trade_count));
    md.push_str(&format!("| Dropped fills | {} |\n", report.dropped_fills.len()));
    md.push_str(&format!("| Open positions | {} |\n", report.open_positions.len()));
    md.push_str(&format!("| Config | {} |\n", report.config_fingerprint));
    md.push('\n');

    let s = &report.summary;
    md.push_str("## Mistakes\n\n");
    md.push_str("| Mistake | Trades |\n");
    md.push_str("| --- | ---: |\n");
    for (mistake, count) in &s.counts {
        md.push_str(&format!("| {mistake} | {count} |\n"));
    }
    md.push_str(&format!(
        "\nClean trades: {} of {} ({:.1}%)\n\n",
        s.clean_trades,
        s.total_trades,
        s.clean_rate * 100.0
    ));

    md.push_str("## Detectors\n\n");
    md.push_str("| Detector | Threshold | Flagged |\n");
    md.push_str("| --- | ---: | ---: |\n");
    md.push_str(&format!(
        "| No stop-loss | n/a | {} ({:.1}%) |\n",
        d.no_protection.unprotected, d.no_protection.percent_unprotected
    ));
    md.push_str(&format!(
        "| Excessive risk (σ={}) | {:.2} | {} ({:.1}%) |\n",
        d.excessive_risk.sigma,
        d.excessive_risk.threshold,
        d.excessive_risk.excessive_count,
        d.excessive_risk.excessive_percent
    ));
    md.push_str(&format!(
        "| Outsized loss (σ={}) | {:.2} | {} ({:.1}%) |\n",
        d.outsized_loss.sigma,
        d.outsized_loss.threshold,
        d.outsized_loss.outsized_count,
        d.outsized_loss.outsized_percent
    ));
    md.push_str(&format!(
        "| Revenge (k={}) | {:.0}s | {} ({:.1}%) |\n",
        d.revenge.multiplier,
        d.revenge.window_seconds,
        d.revenge.revenge_count,
        d.revenge.revenge_percent
    ));
    md.push_str(&format!(
        "\nRisk sizing: {:?} (variation {} vs {})\n\n",
        d.risk_sizing.verdict,
        opt(d.risk_sizing.variation_ratio, 3),
        d.risk_sizing.variation_threshold
    ));

    let b = &report.breakeven;
    md.push_str("## Breakeven\n\n");
    md.push_str("| Metric | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Win Rate | {:.1}% |\n", b.win_rate * 100.0));
    md.push_str(&format!("| Payoff Ratio | {} |\n", opt(b.payoff_ratio, 2)));
    md.push_str(&format!("| Expectancy | {:.2} |\n", b.expectancy));
    md.push_str(&format!(
        "| Breakeven Win Rate | {:.1}% |\n",
        b.breakeven_win_rate * 100.0
    ));
    md.push_str(&format!("| Band | {:?} |\n", b.band));
    md.push('\n');

    if !report.goals.is_empty() {
        md.push_str("## Goals\n\n");
        md.push_str("| Goal | Current | Best | Target | Progress |\n");
        md.push_str("| --- | ---: | ---: | ---: | ---: |\n");
        for g in &report.goals {
            md.push_str(&format!(
                "| {} | {} | {} | {} {} | {:.0}% |\n",
                g.title,
                g.current_streak,
                g.best_streak,
                g.target,
                g.metric,
                g.progress * 100.0
            ));
        }
        md.push('\n');
    }

    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::session::AnalysisSession;
    use chrono::{Duration, TimeZone, Utc};
    use tradehabit_core::domain::{Mistake, OrderEvent, OrderId, OrderKind, OrderSide, OrderStatus};

    fn fill(id: u64, side: OrderSide, price: f64, secs: i64) -> OrderEvent {
        let at = Utc.with_ymd_and_hms(2024, 7, 1, 14, 0, 0).unwrap() + Duration::seconds(secs);
        OrderEvent {
            sequence: id as usize,
            order_id: OrderId::from(id),
            symbol: "MES".into(),
            side,
            kind: OrderKind::Market,
            status: OrderStatus::Filled,
            quantity: 2.0,
            fill_price: Some(price),
            limit_price: None,
            stop_price: None,
            timestamp: Some(at),
            fill_time: Some(at),
        }
    }

    fn analyzed() -> AnalysisSession {
        let events = vec![
            fill(1, OrderSide::Buy, 100.0, 0),
            fill(2, OrderSide::Sell, 90.0, 60),
            fill(3, OrderSide::Buy, 89.0, 65),
            fill(4, OrderSide::Sell, 91.5, 125),
        ];
        let mut session = AnalysisSession::new(events, AnalysisConfig::default()).unwrap();
        session.analyze();
        session
    }

    #[test]
    fn trades_csv_has_header_and_rows() {
        let session = analyzed();
        let csv = export_trades_csv(session.trades()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("id,symbol,side,"));
        assert!(lines[1].contains("-20.00"));
        assert!(lines[2].contains("no stop-loss order;revenge trade"));
    }

    #[test]
    fn trades_csv_empty_has_only_header() {
        let csv = export_trades_csv(&[]).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn report_json_round_trips() {
        let session = analyzed();
        let report = session.report().unwrap();
        let json = export_report_json(report).unwrap();
        assert!(json.contains("\"revenge trade\""));
        let back = import_report_json(&json).unwrap();
        assert_eq!(&back, report);
    }

    #[test]
    fn newer_schema_rejected() {
        let session = analyzed();
        let mut report = session.report().unwrap().clone();
        report.schema_version = SCHEMA_VERSION + 1;
        let json = export_report_json(&report).unwrap();
        assert!(matches!(
            import_report_json(&json),
            Err(ExportError::UnsupportedSchema { .. })
        ));
    }

    #[test]
    fn trades_json_keeps_labels() {
        let session = analyzed();
        let json = export_trades_json(session.trades()).unwrap();
        let back: Vec<Trade> = serde_json::from_str(&json).unwrap();
        assert!(back[1].has_mistake(Mistake::RevengeTrade));
    }

    #[test]
    fn artifacts_saved_and_loaded() {
        let session = analyzed();
        let report = session.report().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("july.csv");
        let run_dir = save_artifacts(report, session.trades(), dir.path(), &source).unwrap();
        assert!(run_dir.join("trades.csv").exists());
        assert!(run_dir.join("report.md").exists());
        assert_eq!(&load_artifacts(&run_dir).unwrap(), report);
    }

    #[test]
    fn same_file_name_in_two_folders_gets_two_directories() {
        let session = analyzed();
        let report = session.report().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");

        let a = save_artifacts(report, session.trades(), &out, &dir.path().join("a/june.csv")).unwrap();
        let b = save_artifacts(report, session.trades(), &out, &dir.path().join("b/june.csv")).unwrap();
        assert_ne!(a, b);
        assert!(a.join("report.json").exists());
        assert!(b.join("report.json").exists());
        assert_eq!(std::fs::read_dir(&out).unwrap().count(), 2);

        let again = save_artifacts(report, session.trades(), &out, &dir.path().join("a/june.csv")).unwrap();
        assert_eq!(a, again);
    }

    #[test]
    fn markdown_lists_every_mistake() {
        let session = analyzed();
        let md = generate_report(session.report().unwrap());
        for m in Mistake::ALL {
            assert!(md.contains(m.label()), "missing {m}");
        }
        assert!(md.contains("## Goals"));
    }
}
