//! Trade: a completed round-trip position change reconstructed from fills.

use super::ids::{OrderId, TradeId};
use super::mistake::Mistake;
use crate::stats::round_to;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Direction of the opening leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    /// +1 for long, -1 for short.
    pub fn sign(self) -> f64 {
        match self {
            Self::Long => 1.0,
            Self::Short => -1.0,
        }
    }

    pub fn from_signed_qty(qty: f64) -> Self {
        if qty >= 0.0 {
            Self::Long
        } else {
            Self::Short
        }
    }
}

/// A completed round-trip trade: opening leg entry, reducing fill exit.
///
/// Partial exits of one opening leg yield several trades sharing the entry
/// fields. Detectors only ever add tags and set `risk_points`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub symbol: String,
    pub side: PositionSide,

    // ── Entry ──
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,
    pub entry_qty: f64,
    pub entry_order_id: OrderId,

    // ── Exit ──
    pub exit_time: DateTime<Utc>,
    pub exit_price: f64,
    pub exit_qty: f64,
    pub exit_order_id: OrderId,

    // ── Outcome ──
    /// Realized profit/loss in price points × quantity, rounded to cents.
    pub pnl: f64,
    /// Per-unit adverse move; zero for flat and winning trades.
    pub points_lost: f64,

    // ── Analysis ──
    pub mistakes: BTreeSet<Mistake>,
    /// Distance from entry to the protective stop. `None` when no qualifying stop was found.
    pub risk_points: Option<f64>,
}

/// Fields known when the reducing fill is processed.
#[derive(Debug, Clone)]
pub struct TradeLegs {
    pub symbol: String,
    pub side: PositionSide,
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,
    pub entry_order_id: OrderId,
    pub exit_time: DateTime<Utc>,
    pub exit_price: f64,
    pub exit_order_id: OrderId,
    pub quantity: f64,
}

impl Trade {
    pub fn from_legs(id: TradeId, legs: TradeLegs) -> Self {
        let move_points = (legs.exit_price - legs.entry_price) * legs.side.sign();
        Self {
            id,
            symbol: legs.symbol,
            side: legs.side,
            entry_time: legs.entry_time,
            entry_price: legs.entry_price,
            entry_qty: legs.quantity,
            entry_order_id: legs.entry_order_id,
            exit_time: legs.exit_time,
            exit_price: legs.exit_price,
            exit_qty: legs.quantity,
            exit_order_id: legs.exit_order_id,
            pnl: round_to(move_points * legs.quantity, 2),
            points_lost: if move_points < 0.0 { -move_points } else { 0.0 },
            mistakes: BTreeSet::new(),
            risk_points: None,
        }
    }

    /// Holding duration in seconds (may be zero for same-instant round trips).
    pub fn hold_seconds(&self) -> f64 {
        (self.exit_time - self.entry_time).num_milliseconds() as f64 / 1000.0
    }

    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }

    pub fn is_loser(&self) -> bool {
        self.pnl < 0.0
    }

    pub fn has_mistake(&self, mistake: Mistake) -> bool {
        self.mistakes.contains(&mistake)
    }

    pub fn is_clean(&self) -> bool {
        self.mistakes.is_empty()
    }
}
