//! AnalysisReport: everything one analysis pass computed, in one record.

use serde::{Deserialize, Serialize};
use tradehabit_core::reconstruct::{DroppedFill, OpenPosition};

use crate::aggregate::{
    BreakevenStats, GoalProgress, MistakeSummary, RevengeOutcomeStats, StopLossStats, Streak,
};
use crate::config::{AnalysisConfig, ConfigFingerprint};
use crate::detectors::{
    ExcessiveRiskStats, NoProtectionStats, OutsizedLossStats, RevengeStats, RiskSizingStats,
};

/// Current schema version for persisted reports.
pub const SCHEMA_VERSION: u32 = 1;

/// Statistics of each detector, in invocation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorReport {
    pub no_protection: NoProtectionStats,
    pub excessive_risk: ExcessiveRiskStats,
    pub outsized_loss: OutsizedLossStats,
    pub revenge: RevengeStats,
    pub risk_sizing: RiskSizingStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub schema_version: u32,
    pub config_fingerprint: ConfigFingerprint,
    pub config: AnalysisConfig,

    // ── Input ──
    pub trade_count: usize,
    pub dropped_fills: Vec<DroppedFill>,
    pub open_positions: Vec<OpenPosition>,

    // ── Detectors ──
    pub detectors: DetectorReport,

    // ── Aggregates ──
    pub summary: MistakeSummary,
    pub breakeven: BreakevenStats,
    pub clean_streak: Streak,
    pub goals: Vec<GoalProgress>,
    pub stop_loss: StopLossStats,
    pub revenge_outcomes: RevengeOutcomeStats,
}

impl AnalysisReport {
    /// True when any detector flagged anything, including the sizing pattern.
    pub fn has_findings(&self) -> bool {
        self.summary.flagged_trades > 0 || self.detectors.risk_sizing.is_inconsistent()
    }
}
