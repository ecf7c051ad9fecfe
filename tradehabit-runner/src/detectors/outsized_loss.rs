//! Outsized-Loss detector.
//!
//! Population: per-unit points lost on losing trades only. Winners are never
//! in the population and never tagged.

use super::{percent, Detection, Detector, TagDelta};
use serde::{Deserialize, Serialize};
use tradehabit_core::domain::{DetectorKind, Trade};
use tradehabit_core::stats::PopulationStats;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutsizedLossStats {
    pub sigma: f64,
    pub total_trades: usize,
    pub losing_trades: usize,
    /// Points-lost population over losing trades.
    pub population: PopulationStats,
    pub threshold: f64,
    pub outsized_count: usize,
    /// Of all trades.
    pub outsized_percent: f64,
    /// Points lost beyond the mean, summed over tagged trades.
    pub excess_loss_points: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct OutsizedLoss {
    pub sigma: f64,
}

impl Detector for OutsizedLoss {
    type Stats = OutsizedLossStats;

    fn kind(&self) -> DetectorKind {
        DetectorKind::OutsizedLoss
    }

    fn detect(&self, trades: &[Trade]) -> Detection<OutsizedLossStats> {
        let mut delta = TagDelta::empty(self.kind());
        let losers: Vec<&Trade> = trades.iter().filter(|t| t.is_loser()).collect();
        let mut stats = OutsizedLossStats {
            sigma: self.sigma,
            total_trades: trades.len(),
            losing_trades: losers.len(),
            ..OutsizedLossStats::default()
        };
        if losers.is_empty() {
            return Detection { delta, stats };
        }

        let losses: Vec<f64> = losers.iter().map(|t| t.points_lost).collect();
        stats.population = PopulationStats::compute(&losses);
        stats.threshold = stats.population.threshold(self.sigma);

        let (threshold, mean_loss) = (stats.threshold, stats.population.mean);
        for trade in losers.iter().filter(|t| t.points_lost > threshold) {
            delta.tagged.insert(trade.id);
            stats.excess_loss_points += trade.points_lost - mean_loss;
        }
        stats.outsized_count = delta.tagged.len();
        stats.outsized_percent = percent(stats.outsized_count, stats.total_trades);

        info!(
            threshold = stats.threshold,
            tagged = stats.outsized_count,
            "outsized-loss detector"
        );
        Detection { delta, stats }
    }
}
