//! Normalized order lifecycle events, one per row of a broker order log.

use super::ids::OrderId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Side of an order: buying opens/extends longs, selling opens/extends shorts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn opposite(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    /// +1 for buys, -1 for sells.
    pub fn sign(self) -> f64 {
        match self {
            Self::Buy => 1.0,
            Self::Sell => -1.0,
        }
    }

    /// Parse a broker side label ("Buy", "B", "Sell", "S", case-insensitive).
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "buy" | "b" | "long" => Some(Self::Buy),
            "sell" | "s" | "short" => Some(Self::Sell),
            _ => None,
        }
    }
}

/// Order kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderKind {
    Market,
    Limit,
    Stop,
    StopLimit,
}

impl OrderKind {
    /// Stop and stop-limit orders are the only candidates for protective stops.
    pub fn is_stop(self) -> bool {
        matches!(self, Self::Stop | Self::StopLimit)
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let normalized: String = label
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        match normalized.as_str() {
            "market" | "mkt" => Some(Self::Market),
            "limit" | "lmt" => Some(Self::Limit),
            "stop" | "stopmarket" | "stp" => Some(Self::Stop),
            "stoplimit" | "stplmt" => Some(Self::StopLimit),
            _ => None,
        }
    }
}

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Submitted,
    Accepted,
    Working,
    Filled,
    Canceled,
    Rejected,
}

impl OrderStatus {
    /// Resting at the broker and able to trigger.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Submitted | Self::Accepted | Self::Working)
    }

    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "submitted" | "pending" | "pendingsubmit" => Some(Self::Submitted),
            "accepted" => Some(Self::Accepted),
            "working" => Some(Self::Working),
            "filled" => Some(Self::Filled),
            "canceled" | "cancelled" => Some(Self::Canceled),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// One normalized lifecycle event for an order.
///
/// Events sharing an `order_id` progress toward exactly one terminal status.
/// `sequence` is the position in the source log and breaks timestamp ties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEvent {
    pub sequence: usize,
    pub order_id: OrderId,
    pub symbol: String,
    pub side: OrderSide,
    pub kind: OrderKind,
    pub status: OrderStatus,
    pub quantity: f64,
    /// Average fill price, present on fills.
    pub fill_price: Option<f64>,
    pub limit_price: Option<f64>,
    pub stop_price: Option<f64>,
    /// Event timestamp. `None` when the log carries no usable timestamp column.
    pub timestamp: Option<DateTime<Utc>>,
    /// Present only on fills.
    pub fill_time: Option<DateTime<Utc>>,
}

impl OrderEvent {
    pub fn is_fill(&self) -> bool {
        self.status == OrderStatus::Filled
    }

    /// Time at which a fill took effect: fill timestamp, else event timestamp.
    pub fn effective_fill_time(&self) -> Option<DateTime<Utc>> {
        self.fill_time.or(self.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_labels() {
        assert_eq!(OrderSide::from_label(" Buy "), Some(OrderSide::Buy));
        assert_eq!(OrderSide::from_label("S"), Some(OrderSide::Sell));
        assert_eq!(OrderSide::from_label("hold"), None);
        assert_eq!(OrderSide::Buy.opposite(), OrderSide::Sell);
    }

    #[test]
    fn kind_labels_ignore_spacing() {
        assert_eq!(OrderKind::from_label("Stop Limit"), Some(OrderKind::StopLimit));
        assert_eq!(OrderKind::from_label("stop-limit"), Some(OrderKind::StopLimit));
        assert_eq!(OrderKind::from_label("Stop Market"), Some(OrderKind::Stop));
        assert_eq!(OrderKind::from_label("MIT"), None);
        assert!(OrderKind::StopLimit.is_stop());
        assert!(!OrderKind::Limit.is_stop());
    }

    #[test]
    fn status_activity() {
        assert_eq!(OrderStatus::from_label("Cancelled"), Some(OrderStatus::Canceled));
        assert!(OrderStatus::Working.is_active());
        assert!(OrderStatus::Accepted.is_active());
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Rejected.is_terminal());
    }
}
