//! Aggregation layer: pure functions from tagged trades to summary records.

pub mod breakeven;
pub mod discipline;
pub mod streaks;

pub use breakeven::{breakeven, classify_delta, BreakevenBand, BreakevenStats};
pub use discipline::{revenge_outcomes, stop_loss_stats, OutcomeProfile, RevengeOutcomeStats, StopLossStats};
pub use streaks::{
    default_goals, evaluate_goal, goal_report, streak, Goal, GoalProgress, Streak, StreakMetric,
};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tradehabit_core::domain::{Mistake, Trade};

/// Mistake counts across the trade set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MistakeSummary {
    pub total_trades: usize,
    /// Trades with at least one mistake.
    pub flagged_trades: usize,
    pub clean_trades: usize,
    /// clean / total; 0.0 for an empty set.
    pub clean_rate: f64,
    /// Sum of tags over all trades.
    pub total_mistakes: usize,
    pub counts: BTreeMap<Mistake, usize>,
}

pub fn mistake_summary(trades: &[Trade]) -> MistakeSummary {
    let mut counts: BTreeMap<Mistake, usize> = Mistake::ALL.iter().map(|m| (*m, 0)).collect();
    for m in trades.iter().flat_map(|t| t.mistakes.iter()) {
        *counts.entry(*m).or_default() += 1;
    }
    let clean = trades.iter().filter(|t| t.is_clean()).count();
    MistakeSummary {
        total_trades: trades.len(),
        flagged_trades: trades.len() - clean,
        clean_trades: clean,
        clean_rate: if trades.is_empty() {
            0.0
        } else {
            clean as f64 / trades.len() as f64
        },
        total_mistakes: counts.values().sum(),
        counts,
    }
}
