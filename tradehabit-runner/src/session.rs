//! Analysis session: owns one trade set and re-analyzes it on demand.
//!
//! Reconstruction happens once, in [`AnalysisSession::new`]. Every
//! [`analyze`](AnalysisSession::analyze) clears detector output, runs the
//! detectors in order and rebuilds the report. Both entry points take
//! `&mut self`, so re-analysis of one session is serialized by the borrow
//! checker; separate sessions share nothing.

use std::path::Path;

use chrono::{FixedOffset, Offset, Utc};
use thiserror::Error;
use tracing::info;
use tradehabit_core::domain::{DetectorKind, OrderEvent, Trade};
use tradehabit_core::ingest::{normalize_path, DroppedRow, IngestError, NormalizeOptions, NormalizedLog};
use tradehabit_core::reconstruct::{reconstruct, DroppedFill, OpenPosition};
use tradehabit_core::stops::StopResolver;

use crate::aggregate::{
    breakeven, default_goals, goal_report, mistake_summary, revenge_outcomes, stop_loss_stats,
    streak, Goal, StreakMetric,
};
use crate::config::{AnalysisConfig, ConfigError, ConfigOverrides};
use crate::detectors::{
    clear_detector, Detector, ExcessiveRisk, NoProtection, OutsizedLoss, Revenge, RiskSizing,
};
use crate::report::{AnalysisReport, DetectorReport, SCHEMA_VERSION};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("ingest error: {0}")]
    Ingest(#[from] IngestError),
}

#[derive(Debug)]
pub struct AnalysisSession {
    events: Vec<OrderEvent>,
    dropped_rows: Vec<DroppedRow>,
    trades: Vec<Trade>,
    dropped_fills: Vec<DroppedFill>,
    open_positions: Vec<OpenPosition>,
    config: AnalysisConfig,
    goals: Vec<Goal>,
    /// Offset used to place trades on calendar days.
    day_offset: FixedOffset,
    report: Option<AnalysisReport>,
}

impl AnalysisSession {
    /// Reconstruct trades from `events`. Nothing is analyzed yet.
    pub fn new(events: Vec<OrderEvent>, config: AnalysisConfig) -> Result<Self, SessionError> {
        config.validate()?;
        let reconstruction = reconstruct(&events);
        Ok(Self {
            events,
            dropped_rows: Vec::new(),
            trades: reconstruction.trades,
            dropped_fills: reconstruction.dropped,
            open_positions: reconstruction.open_positions,
            config,
            goals: default_goals(),
            day_offset: Utc.fix(),
            report: None,
        })
    }

    /// Start from a normalized log, keeping its row diagnostics.
    pub fn from_log(log: NormalizedLog, config: AnalysisConfig) -> Result<Self, SessionError> {
        let mut session = Self::new(log.events, config)?;
        session.dropped_rows = log.dropped;
        Ok(session)
    }

    /// Load a broker CSV export and start a session over it.
    pub fn from_csv_path(
        path: &Path,
        opts: &NormalizeOptions,
        config: AnalysisConfig,
    ) -> Result<Self, SessionError> {
        let log = normalize_path(path, opts)?;
        let mut session = Self::from_log(log, config)?;
        session.day_offset = opts.utc_offset;
        Ok(session)
    }

    /// Set the trader's local offset for day streaks and goal start dates.
    pub fn set_day_offset(&mut self, offset: FixedOffset) {
        self.day_offset = offset;
        self.report = None;
    }

    pub fn set_goals(&mut self, goals: Vec<Goal>) {
        self.goals = goals;
        self.report = None;
    }

    /// Run every detector in order and rebuild the report.
    pub fn analyze(&mut self) -> &AnalysisReport {
        let config = self.config;
        let trades = &mut self.trades;

        for kind in DetectorKind::ORDER {
            clear_detector(trades, kind);
        }

        let resolver = StopResolver::new(&self.events, config.oco_window_seconds);
        let no_protection = NoProtection::new(&resolver).run(trades);
        let excessive_risk = ExcessiveRisk {
            sigma: config.sigma_excessive_risk,
        }
        .run(trades);
        let outsized_loss = OutsizedLoss {
            sigma: config.sigma_outsized_loss,
        }
        .run(trades);
        let revenge = Revenge {
            multiplier: config.revenge_multiplier,
        }
        .run(trades);
        let risk_sizing = RiskSizing {
            variation_threshold: config.risk_variability_threshold,
        }
        .run(trades);

        let trades = &self.trades;
        let report = AnalysisReport {
            schema_version: SCHEMA_VERSION,
            config_fingerprint: config.fingerprint(),
            config,
            trade_count: trades.len(),
            dropped_fills: self.dropped_fills.clone(),
            open_positions: self.open_positions.clone(),
            detectors: DetectorReport {
                no_protection,
                excessive_risk,
                outsized_loss,
                revenge,
                risk_sizing,
            },
            summary: mistake_summary(trades),
            breakeven: breakeven(trades),
            clean_streak: streak(trades, &[], StreakMetric::Trades, None, self.day_offset),
            goals: goal_report(trades, &self.goals, self.day_offset),
            stop_loss: stop_loss_stats(trades),
            revenge_outcomes: revenge_outcomes(trades),
        };
        info!(
            trades = report.trade_count,
            flagged = report.summary.flagged_trades,
            fingerprint = %report.config_fingerprint,
            "analysis complete"
        );
        self.report.insert(report)
    }

    /// Apply threshold overrides and re-analyze. On a validation error the
    /// session keeps its previous config and report.
    pub fn retune(&mut self, overrides: &ConfigOverrides) -> Result<&AnalysisReport, SessionError> {
        self.config = self.config.with_overrides(overrides)?;
        Ok(self.analyze())
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn events(&self) -> &[OrderEvent] {
        &self.events
    }

    pub fn dropped_rows(&self) -> &[DroppedRow] {
        &self.dropped_rows
    }

    /// The latest report, if [`analyze`](Self::analyze) has run since the last change.
    pub fn report(&self) -> Option<&AnalysisReport> {
        self.report.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use tradehabit_core::domain::{Mistake, OrderId, OrderKind, OrderSide, OrderStatus};

    fn fill(id: u64, side: OrderSide, price: f64, secs: i64) -> OrderEvent {
        let at = Utc.with_ymd_and_hms(2024, 7, 1, 14, 0, 0).unwrap() + Duration::seconds(secs);
        OrderEvent {
            sequence: id as usize,
            order_id: OrderId::from(id),
            symbol: "MNQ".into(),
            side,
            kind: OrderKind::Market,
            status: OrderStatus::Filled,
            quantity: 1.0,
            fill_price: Some(price),
            limit_price: None,
            stop_price: None,
            timestamp: Some(at),
            fill_time: Some(at),
        }
    }

    fn revenge_log() -> Vec<OrderEvent> {
        vec![
            fill(1, OrderSide::Buy, 100.0, 0),
            fill(2, OrderSide::Sell, 90.0, 60),
            fill(3, OrderSide::Buy, 89.0, 65),
            fill(4, OrderSide::Sell, 91.0, 125),
        ]
    }

    #[test]
    fn rejects_invalid_config() {
        let bad = AnalysisConfig {
            sigma_excessive_risk: -1.0,
            ..AnalysisConfig::default()
        };
        assert!(matches!(
            AnalysisSession::new(Vec::new(), bad),
            Err(SessionError::Config(_))
        ));
    }

    #[test]
    fn analyze_tags_and_reports() {
        let mut session = AnalysisSession::new(revenge_log(), AnalysisConfig::default()).unwrap();
        assert!(session.report().is_none());

        let report = session.analyze();
        assert_eq!(report.trade_count, 2);
        assert_eq!(report.detectors.revenge.revenge_count, 1);
        assert_eq!(report.summary.counts[&Mistake::NoStopLoss], 2);

        let trades = session.trades();
        assert!(trades[1].has_mistake(Mistake::RevengeTrade));
        assert!(session.report().is_some());
    }

    #[test]
    fn analyze_twice_is_idempotent() {
        let mut session = AnalysisSession::new(revenge_log(), AnalysisConfig::default()).unwrap();
        let first = session.analyze().clone();
        let trades_first = session.trades().to_vec();
        let second = session.analyze().clone();
        assert_eq!(first, second);
        assert_eq!(trades_first, session.trades());
    }

    #[test]
    fn retune_replaces_tags() {
        let mut session = AnalysisSession::new(revenge_log(), AnalysisConfig::default()).unwrap();
        session.analyze();

        // Window shrinks to 0 s: the 5 s re-entry is no longer revenge.
        let report = session
            .retune(&ConfigOverrides {
                revenge_multiplier: Some(0.0),
                ..ConfigOverrides::default()
            })
            .unwrap();
        assert_eq!(report.detectors.revenge.revenge_count, 0);
        assert!(!session.trades()[1].has_mistake(Mistake::RevengeTrade));
        assert_eq!(session.config().revenge_multiplier, 0.0);
    }

    #[test]
    fn failed_retune_keeps_previous_state() {
        let mut session = AnalysisSession::new(revenge_log(), AnalysisConfig::default()).unwrap();
        let before = session.analyze().clone();
        let err = session.retune(&ConfigOverrides {
            risk_variability_threshold: Some(0.0),
            ..ConfigOverrides::default()
        });
        assert!(err.is_err());
        assert_eq!(session.config(), &AnalysisConfig::default());
        assert_eq!(session.report(), Some(&before));
    }

    #[test]
    fn day_offset_moves_goal_start_boundary() {
        let goal = Goal {
            title: "No excessive risk".into(),
            target: 5,
            mistakes: vec![Mistake::ExcessiveRisk],
            metric: StreakMetric::Days,
            start_date: chrono::NaiveDate::from_ymd_opt(2024, 7, 2),
        };
        let mut session = AnalysisSession::new(revenge_log(), AnalysisConfig::default()).unwrap();
        session.set_goals(vec![goal]);
        assert_eq!(session.analyze().goals[0].current_streak, 0);

        // 14:00 UTC is already midnight on 2 July at UTC+10.
        session.set_day_offset(FixedOffset::east_opt(10 * 3600).unwrap());
        assert!(session.report().is_none());
        assert_eq!(session.analyze().goals[0].current_streak, 1);
    }

    #[test]
    fn empty_session_reports_zeroes() {
        let mut session = AnalysisSession::new(Vec::new(), AnalysisConfig::default()).unwrap();
        let report = session.analyze();
        assert_eq!(report.trade_count, 0);
        assert_eq!(report.summary.clean_rate, 0.0);
        assert!(!report.has_findings());
    }
}
