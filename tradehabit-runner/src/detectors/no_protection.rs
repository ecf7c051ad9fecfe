//! No-Protection detector: tags trades without a qualifying protective stop
//! and resolves risk distances for the rest.

use super::{percent, Detection, Detector, TagDelta};
use serde::{Deserialize, Serialize};
use tradehabit_core::domain::{DetectorKind, Trade, TradeId};
use tradehabit_core::stops::{StopResolution, StopResolver, UnprotectedReason};
use tracing::info;

/// Per-trade resolution, kept for reporting why a trade was tagged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeResolution {
    pub trade_id: TradeId,
    pub resolution: StopResolution,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoProtectionStats {
    pub total_trades: usize,
    pub protected: usize,
    pub unprotected: usize,
    /// Protected by a stop that carried no price, so no risk distance.
    pub protected_without_risk: usize,
    /// Unprotected only because stop events lacked timestamps.
    pub missing_timestamps: usize,
    pub percent_unprotected: f64,
    pub resolutions: Vec<TradeResolution>,
}

pub struct NoProtection<'r, 'e> {
    resolver: &'r StopResolver<'e>,
}

impl<'r, 'e> NoProtection<'r, 'e> {
    pub fn new(resolver: &'r StopResolver<'e>) -> Self {
        Self { resolver }
    }
}

impl Detector for NoProtection<'_, '_> {
    type Stats = NoProtectionStats;

    fn kind(&self) -> DetectorKind {
        DetectorKind::NoProtection
    }

    fn detect(&self, trades: &[Trade]) -> Detection<NoProtectionStats> {
        let mut delta = TagDelta::empty(self.kind());
        let mut stats = NoProtectionStats {
            total_trades: trades.len(),
            ..NoProtectionStats::default()
        };

        for trade in trades {
            let resolution = self.resolver.resolve(trade);
            match &resolution {
                StopResolution::Protected { risk_points, .. } => {
                    stats.protected += 1;
                    match risk_points {
                        Some(risk) => {
                            delta.risk_points.insert(trade.id, *risk);
                        }
                        None => stats.protected_without_risk += 1,
                    }
                }
                StopResolution::Unprotected { reason } => {
                    stats.unprotected += 1;
                    if *reason == UnprotectedReason::MissingTimestamps {
                        stats.missing_timestamps += 1;
                    }
                    delta.tagged.insert(trade.id);
                }
            }
            stats.resolutions.push(TradeResolution {
                trade_id: trade.id,
                resolution,
            });
        }
        stats.percent_unprotected = percent(stats.unprotected, stats.total_trades);

        info!(
            protected = stats.protected,
            unprotected = stats.unprotected,
            "no-protection detector"
        );
        Detection { delta, stats }
    }
}
