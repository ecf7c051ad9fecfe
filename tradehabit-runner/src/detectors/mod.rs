//! Mistake detectors.
//!
//! Each detector reads the trade set and returns an immutable [`TagDelta`]
//! plus its statistics. Nothing is mutated during detection; the caller
//! clears the detector's previous tags and merges the delta, so running a
//! detector twice with the same configuration yields the same trades.
//!
//! Detectors must run in [`DetectorKind::ORDER`]: Excessive-Risk and
//! Risk-Sizing read the risk distances that No-Protection resolves.

pub mod excessive_risk;
pub mod no_protection;
pub mod outsized_loss;
pub mod revenge;
pub mod risk_sizing;

pub use excessive_risk::{ExcessiveRisk, ExcessiveRiskStats};
pub use no_protection::{NoProtection, NoProtectionStats};
pub use outsized_loss::{OutsizedLoss, OutsizedLossStats};
pub use revenge::{Revenge, RevengeStats};
pub use risk_sizing::{RiskSizing, RiskSizingStats, SizingVerdict};

use std::collections::{BTreeMap, BTreeSet};
use tradehabit_core::domain::{DetectorKind, Mistake, Trade, TradeId};

/// Changes one detector wants applied to the trade set.
#[derive(Debug, Clone, PartialEq)]
pub struct TagDelta {
    pub detector: DetectorKind,
    /// Trades to tag with the detector's mistake.
    pub tagged: BTreeSet<TradeId>,
    /// Resolved risk distances (No-Protection only).
    pub risk_points: BTreeMap<TradeId, f64>,
}

impl TagDelta {
    pub fn empty(detector: DetectorKind) -> Self {
        Self {
            detector,
            tagged: BTreeSet::new(),
            risk_points: BTreeMap::new(),
        }
    }

    /// The mistake this delta tags with; `None` for pattern-only detectors.
    pub fn mistake(&self) -> Option<Mistake> {
        Mistake::ALL.into_iter().find(|m| m.detector() == self.detector)
    }

    /// Merge into `trades`. Tags are a set, so re-applying is harmless.
    pub fn apply(&self, trades: &mut [Trade]) {
        let mistake = self.mistake();
        for trade in trades.iter_mut() {
            if let Some(m) = mistake {
                if self.tagged.contains(&trade.id) {
                    trade.mistakes.insert(m);
                }
            }
            if let Some(risk) = self.risk_points.get(&trade.id) {
                trade.risk_points = Some(*risk);
            }
        }
    }
}

/// Detector output: the delta to merge plus the statistics record.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection<S> {
    pub delta: TagDelta,
    pub stats: S,
}

/// A parameterized scan over the trade set.
pub trait Detector {
    type Stats;

    fn kind(&self) -> DetectorKind;

    /// Pure: reads `trades`, returns what to change.
    fn detect(&self, trades: &[Trade]) -> Detection<Self::Stats>;

    /// Clear this detector's previous output, detect, merge. Returns the stats.
    fn run(&self, trades: &mut [Trade]) -> Self::Stats {
        clear_detector(trades, self.kind());
        let Detection { delta, stats } = self.detect(trades);
        delta.apply(trades);
        stats
    }
}

/// Remove everything `kind` owns: its tag and, for No-Protection, risk distances.
pub fn clear_detector(trades: &mut [Trade], kind: DetectorKind) {
    for trade in trades.iter_mut() {
        trade.mistakes.retain(|m| m.detector() != kind);
        if kind == DetectorKind::NoProtection {
            trade.risk_points = None;
        }
    }
}

/// Percentage of `part` in `whole`, one decimal. 0.0 for an empty whole.
pub(crate) fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    tradehabit_core::stats::round_to(100.0 * part as f64 / whole as f64, 1)
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use tradehabit_core::domain::{OrderId, PositionSide, Trade, TradeId, TradeLegs};

    pub fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 5, 14, 30, 0).unwrap() + Duration::seconds(secs)
    }

    /// Long trade of one unit: entry at `entry_s`, held `hold_s`, given pnl.
    pub fn trade(id: u32, entry_s: i64, hold_s: i64, pnl: f64) -> Trade {
        Trade::from_legs(
            TradeId(id),
            TradeLegs {
                symbol: "MNQ".into(),
                side: PositionSide::Long,
                entry_time: at(entry_s),
                entry_price: 100.0,
                entry_order_id: OrderId::from(u64::from(id) * 10),
                exit_time: at(entry_s + hold_s),
                exit_price: 100.0 + pnl,
                exit_order_id: OrderId::from(u64::from(id) * 10 + 1),
                quantity: 1.0,
            },
        )
    }

    pub fn with_risk(mut t: Trade, risk: f64) -> Trade {
        t.risk_points = Some(risk);
        t
    }
}
