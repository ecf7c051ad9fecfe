//! Excessive-Risk detector.
//!
//! Population: resolved risk distances. Trades whose risk is strictly above
//! `mean + sigma × pstdev` are tagged. Median/MAD ride along as an
//! outlier-resistant view of the same population.

use super::{percent, Detection, Detector, TagDelta};
use serde::{Deserialize, Serialize};
use tradehabit_core::domain::{DetectorKind, Trade};
use tradehabit_core::stats::{mean, PopulationStats};
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExcessiveRiskStats {
    pub sigma: f64,
    /// Risk-distance population (`count` = trades with a resolved risk).
    pub population: PopulationStats,
    pub threshold: f64,
    pub excessive_count: usize,
    /// Of trades with a resolved risk.
    pub excessive_percent: f64,
    /// Mean risk of the tagged trades.
    pub avg_excessive_risk: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct ExcessiveRisk {
    pub sigma: f64,
}

impl Detector for ExcessiveRisk {
    type Stats = ExcessiveRiskStats;

    fn kind(&self) -> DetectorKind {
        DetectorKind::ExcessiveRisk
    }

    fn detect(&self, trades: &[Trade]) -> Detection<ExcessiveRiskStats> {
        let mut delta = TagDelta::empty(self.kind());
        let risks: Vec<f64> = trades.iter().filter_map(|t| t.risk_points).collect();
        if risks.is_empty() {
            return Detection {
                delta,
                stats: ExcessiveRiskStats {
                    sigma: self.sigma,
                    ..ExcessiveRiskStats::default()
                },
            };
        }

        let population = PopulationStats::compute(&risks);
        let threshold = population.threshold(self.sigma);

        let mut excessive = Vec::new();
        for trade in trades {
            if let Some(risk) = trade.risk_points {
                if risk > threshold {
                    delta.tagged.insert(trade.id);
                    excessive.push(risk);
                }
            }
        }

        let stats = ExcessiveRiskStats {
            sigma: self.sigma,
            population,
            threshold,
            excessive_count: excessive.len(),
            excessive_percent: percent(excessive.len(), risks.len()),
            avg_excessive_risk: mean(&excessive),
        };
        info!(
            threshold = stats.threshold,
            tagged = stats.excessive_count,
            "excessive-risk detector"
        );
        Detection { delta, stats }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{trade, with_risk};
    use super::*;
    use tradehabit_core::domain::Mistake;

    fn risk_trades(risks: &[f64]) -> Vec<Trade> {
        risks
            .iter()
            .enumerate()
            .map(|(i, r)| with_risk(trade(i as u32 + 1, i as i64 * 600, 60, 1.0), *r))
            .collect()
    }

    #[test]
    fn one_outlier_of_five() {
        let mut trades = risk_trades(&[10.0, 10.0, 10.0, 10.0, 50.0]);
        let stats = ExcessiveRisk { sigma: 1.5 }.run(&mut trades);
        assert!((stats.threshold - 42.0).abs() < 1e-9);
        assert_eq!(stats.excessive_count, 1);
        assert_eq!(stats.excessive_percent, 20.0);
        assert_eq!(stats.avg_excessive_risk, 50.0);
        assert!(trades[4].has_mistake(Mistake::ExcessiveRisk));
        assert_eq!(trades.iter().filter(|t| t.is_clean()).count(), 4);
    }

    #[test]
    fn median_and_mad_companion() {
        let mut trades = risk_trades(&[40.0, 50.0, 60.0]);
        let stats = ExcessiveRisk { sigma: 1.5 }.run(&mut trades);
        assert_eq!(stats.population.median, 50.0);
        assert_eq!(stats.population.mad, 10.0);
        assert!((stats.population.mad_cv - 0.2).abs() < 1e-12);
        assert_eq!(stats.excessive_count, 0);
    }

    #[test]
    fn value_equal_to_threshold_not_tagged() {
        // Identical risks: pstdev 0, threshold equals every value.
        let mut trades = risk_trades(&[7.0, 7.0, 7.0]);
        let stats = ExcessiveRisk { sigma: 1.5 }.run(&mut trades);
        assert_eq!(stats.threshold, 7.0);
        assert_eq!(stats.excessive_count, 0);
    }

    #[test]
    fn trades_without_risk_are_outside_population() {
        let mut trades = risk_trades(&[10.0, 10.0, 10.0, 10.0, 50.0]);
        trades.push(trade(6, 9_000, 60, -20.0));
        let stats = ExcessiveRisk { sigma: 1.5 }.run(&mut trades);
        assert_eq!(stats.population.count, 5);
        assert!(!trades[5].has_mistake(Mistake::ExcessiveRisk));
    }

    #[test]
    fn zero_population() {
        let mut trades = vec![trade(1, 0, 60, 1.0)];
        let stats = ExcessiveRisk { sigma: 1.5 }.run(&mut trades);
        assert_eq!(stats.population.count, 0);
        assert_eq!(stats.excessive_count, 0);
        assert_eq!(stats.sigma, 1.5);
    }
}
