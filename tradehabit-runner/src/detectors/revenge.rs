//! Revenge-Trade detector.
//!
//! Window = median hold time × multiplier. Walking trades in chronological
//! order, a trade is tagged when the trade immediately before it lost money
//! and this entry came no later than `window` after that exit. A negative gap
//! (entered while the loser was still open) also counts. The one exception is
//! a trade sharing the loser's entry order: that is a partial exit of the same
//! leg, not a new decision.

use super::{percent, Detection, Detector, TagDelta};
use serde::{Deserialize, Serialize};
use tradehabit_core::domain::{DetectorKind, Trade};
use tradehabit_core::stats::median;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RevengeStats {
    pub multiplier: f64,
    pub total_trades: usize,
    pub median_hold_seconds: f64,
    pub window_seconds: f64,
    pub revenge_count: usize,
    pub revenge_percent: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct Revenge {
    pub multiplier: f64,
}

/// Trades in chronological order: entry time, then exit time. Stable.
pub fn chronological(trades: &[Trade]) -> Vec<&Trade> {
    let mut ordered: Vec<&Trade> = trades.iter().collect();
    ordered.sort_by_key(|t| (t.entry_time, t.exit_time));
    ordered
}

impl Detector for Revenge {
    type Stats = RevengeStats;

    fn kind(&self) -> DetectorKind {
        DetectorKind::Revenge
    }

    fn detect(&self, trades: &[Trade]) -> Detection<RevengeStats> {
        let mut delta = TagDelta::empty(self.kind());
        let mut stats = RevengeStats {
            multiplier: self.multiplier,
            total_trades: trades.len(),
            ..RevengeStats::default()
        };
        if trades.is_empty() {
            return Detection { delta, stats };
        }

        let holds: Vec<f64> = trades.iter().map(Trade::hold_seconds).collect();
        stats.median_hold_seconds = median(&holds);
        stats.window_seconds = stats.median_hold_seconds * self.multiplier;

        let ordered = chronological(trades);
        for pair in ordered.windows(2) {
            let (prev, curr) = (pair[0], pair[1]);
            if !prev.is_loser() || curr.entry_order_id == prev.entry_order_id {
                continue;
            }
            let gap = (curr.entry_time - prev.exit_time).num_milliseconds() as f64 / 1000.0;
            if gap <= stats.window_seconds {
                delta.tagged.insert(curr.id);
            }
        }
        stats.revenge_count = delta.tagged.len();
        stats.revenge_percent = percent(stats.revenge_count, stats.total_trades);

        info!(
            window_seconds = stats.window_seconds,
            tagged = stats.revenge_count,
            "revenge detector"
        );
        Detection { delta, stats }
    }
}
