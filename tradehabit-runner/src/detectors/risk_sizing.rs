//! Risk-Sizing-Consistency detector: a pattern over the whole set, not a tag.

use super::{Detection, Detector, TagDelta};
use serde::{Deserialize, Serialize};
use tradehabit_core::domain::{DetectorKind, Trade};
use tradehabit_core::stats::{coefficient_of_variation, mean, pstdev};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizingVerdict {
    Consistent,
    Inconsistent,
    /// Fewer than two resolved risk distances.
    InsufficientData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSizingStats {
    pub variation_threshold: f64,
    pub total_trades: usize,
    pub trades_with_risk: usize,
    pub verdict: SizingVerdict,
    /// `None` with insufficient data.
    pub mean_risk: Option<f64>,
    pub std_dev_risk: Option<f64>,
    /// pstdev / mean.
    pub variation_ratio: Option<f64>,
    pub min_risk: Option<f64>,
    pub max_risk: Option<f64>,
}

impl RiskSizingStats {
    pub fn is_inconsistent(&self) -> bool {
        self.verdict == SizingVerdict::Inconsistent
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RiskSizing {
    pub variation_threshold: f64,
}

impl Detector for RiskSizing {
    type Stats = RiskSizingStats;

    fn kind(&self) -> DetectorKind {
        DetectorKind::RiskSizing
    }

    fn detect(&self, trades: &[Trade]) -> Detection<RiskSizingStats> {
        let delta = TagDelta::empty(self.kind());
        let risks: Vec<f64> = trades.iter().filter_map(|t| t.risk_points).collect();

        if risks.len() < 2 {
            return Detection {
                delta,
                stats: RiskSizingStats {
                    variation_threshold: self.variation_threshold,
                    total_trades: trades.len(),
                    trades_with_risk: risks.len(),
                    verdict: SizingVerdict::InsufficientData,
                    mean_risk: None,
                    std_dev_risk: None,
                    variation_ratio: None,
                    min_risk: None,
                    max_risk: None,
                },
            };
        }

        let ratio = coefficient_of_variation(&risks);
        let verdict = if ratio >= self.variation_threshold {
            SizingVerdict::Inconsistent
        } else {
            SizingVerdict::Consistent
        };
        let stats = RiskSizingStats {
            variation_threshold: self.variation_threshold,
            total_trades: trades.len(),
            trades_with_risk: risks.len(),
            verdict,
            mean_risk: Some(mean(&risks)),
            std_dev_risk: Some(pstdev(&risks)),
            variation_ratio: Some(ratio),
            min_risk: risks.iter().copied().reduce(f64::min),
            max_risk: risks.iter().copied().reduce(f64::max),
        };
        info!(ratio, ?verdict, "risk-sizing detector");
        Detection { delta, stats }
    }
}
