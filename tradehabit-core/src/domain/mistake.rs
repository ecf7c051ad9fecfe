//! Mistake taxonomy.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A behavioral mistake a trade can be tagged with.
///
/// Serialized as the human label, e.g. `"revenge trade"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Mistake {
    #[serde(rename = "no stop-loss order")]
    NoStopLoss,
    #[serde(rename = "excessive risk")]
    ExcessiveRisk,
    #[serde(rename = "outsized loss")]
    OutsizedLoss,
    #[serde(rename = "revenge trade")]
    RevengeTrade,
}

impl Mistake {
    pub const ALL: [Mistake; 4] = [
        Mistake::NoStopLoss,
        Mistake::ExcessiveRisk,
        Mistake::OutsizedLoss,
        Mistake::RevengeTrade,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::NoStopLoss => "no stop-loss order",
            Self::ExcessiveRisk => "excessive risk",
            Self::OutsizedLoss => "outsized loss",
            Self::RevengeTrade => "revenge trade",
        }
    }

    /// Parse a label. Also accepts snake_case names (`no_stop_loss`, `revenge`).
    pub fn from_label(label: &str) -> Option<Self> {
        let key = label.trim().to_ascii_lowercase().replace(['_', '-'], " ");
        match key.as_str() {
            "no stop loss order" | "no stop loss" | "no stop" => Some(Self::NoStopLoss),
            "excessive risk" => Some(Self::ExcessiveRisk),
            "outsized loss" => Some(Self::OutsizedLoss),
            "revenge trade" | "revenge" => Some(Self::RevengeTrade),
            _ => None,
        }
    }

    /// The detector that owns this tag. Re-running a detector clears only its own tags.
    pub fn detector(self) -> DetectorKind {
        match self {
            Self::NoStopLoss => DetectorKind::NoProtection,
            Self::ExcessiveRisk => DetectorKind::ExcessiveRisk,
            Self::OutsizedLoss => DetectorKind::OutsizedLoss,
            Self::RevengeTrade => DetectorKind::Revenge,
        }
    }
}

impl fmt::Display for Mistake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The five detectors, in their required invocation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    NoProtection,
    ExcessiveRisk,
    OutsizedLoss,
    Revenge,
    RiskSizing,
}

impl DetectorKind {
    pub const ORDER: [DetectorKind; 5] = [
        DetectorKind::NoProtection,
        DetectorKind::ExcessiveRisk,
        DetectorKind::OutsizedLoss,
        DetectorKind::Revenge,
        DetectorKind::RiskSizing,
    ];
}
