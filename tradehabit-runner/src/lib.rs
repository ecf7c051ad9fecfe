//! TradeHabit Runner: mistake detectors, aggregation, sessions and reports.
//!
//! This crate builds on `tradehabit-core` to provide:
//! - Analysis configuration (TOML, overrides, validation, fingerprint)
//! - The five mistake detectors, run in a fixed order over a session's trades
//! - Aggregation: mistake summary, breakeven band, streaks and goals,
//!   stop-loss and revenge companion statistics
//! - `AnalysisSession`, the per-log handle that owns trades and re-analyzes
//! - Report export to JSON, CSV and Markdown

pub mod aggregate;
pub mod config;
pub mod detectors;
pub mod export;
pub mod report;
pub mod session;

pub use aggregate::{
    breakeven, goal_report, mistake_summary, streak, BreakevenBand, BreakevenStats, Goal,
    GoalProgress, MistakeSummary, Streak, StreakMetric,
};
pub use config::{AnalysisConfig, ConfigError, ConfigFingerprint, ConfigOverrides};
pub use detectors::{
    Detector, ExcessiveRisk, NoProtection, OutsizedLoss, Revenge, RiskSizing, SizingVerdict,
    TagDelta,
};
pub use export::ExportError;
pub use report::{AnalysisReport, DetectorReport, SCHEMA_VERSION};
pub use session::{AnalysisSession, SessionError};
