//! Trade reconstruction: turn a stream of fills into round-trip trades.
//!
//! One position per symbol. Fills are processed in fill-time order (stable on
//! ties). Scale-ins grow the open quantity without emitting; every reducing
//! fill emits one trade for `min(fill_qty, |open_qty|)`; a fill that crosses
//! through flat opens a new leg at its own price and time.

use crate::domain::{
    OrderEvent, OrderId, PositionSide, Trade, TradeId, TradeLegs,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Open quantity below this is treated as flat.
pub const QTY_EPSILON: f64 = 1e-9;

/// Why a filled event was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    NonPositiveQuantity,
    MissingFillPrice,
    MissingFillTime,
}

/// Diagnostic for a fill that could not be used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DroppedFill {
    pub sequence: usize,
    pub order_id: OrderId,
    pub reason: DropReason,
}

/// A position still open when the log ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenPosition {
    pub symbol: String,
    pub side: PositionSide,
    pub quantity: f64,
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,
}

/// Output of [`reconstruct`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Reconstruction {
    pub trades: Vec<Trade>,
    pub dropped: Vec<DroppedFill>,
    pub open_positions: Vec<OpenPosition>,
}

// ── Position state ──

#[derive(Debug, Clone)]
struct PositionState {
    /// Signed: positive long, negative short.
    qty: f64,
    entry_time: DateTime<Utc>,
    entry_price: f64,
    entry_order_id: OrderId,
}

struct UsableFill<'a> {
    event: &'a OrderEvent,
    time: DateTime<Utc>,
    price: f64,
}

fn usable_fill(event: &OrderEvent) -> Result<UsableFill<'_>, DropReason> {
    if !(event.quantity.is_finite() && event.quantity > 0.0) {
        return Err(DropReason::NonPositiveQuantity);
    }
    let price = event
        .fill_price
        .filter(|p| p.is_finite())
        .ok_or(DropReason::MissingFillPrice)?;
    let time = event
        .effective_fill_time()
        .ok_or(DropReason::MissingFillTime)?;
    Ok(UsableFill { event, time, price })
}

/// Reconstruct round-trip trades from normalized order events.
///
/// Non-fill events are ignored. Malformed fills are reported in
/// `Reconstruction::dropped` and never abort the run.
pub fn reconstruct(events: &[OrderEvent]) -> Reconstruction {
    let mut dropped = Vec::new();
    let mut fills: Vec<UsableFill<'_>> = Vec::new();

    for event in events.iter().filter(|e| e.is_fill()) {
        match usable_fill(event) {
            Ok(fill) => fills.push(fill),
            Err(reason) => {
                warn!(
                    order_id = %event.order_id,
                    sequence = event.sequence,
                    ?reason,
                    "dropping fill"
                );
                dropped.push(DroppedFill {
                    sequence: event.sequence,
                    order_id: event.order_id.clone(),
                    reason,
                });
            }
        }
    }

    // Stable: equal fill times keep source order.
    fills.sort_by_key(|f| f.time);

    let mut positions: HashMap<&str, PositionState> = HashMap::new();
    let mut trades = Vec::new();
    let mut next_id = 1u32;

    for fill in &fills {
        let event = fill.event;
        let signed = event.side.sign() * event.quantity;

        let Some(pos) = positions.get_mut(event.symbol.as_str()) else {
            positions.insert(
                event.symbol.as_str(),
                PositionState {
                    qty: signed,
                    entry_time: fill.time,
                    entry_price: fill.price,
                    entry_order_id: event.order_id.clone(),
                },
            );
            continue;
        };

        if pos.qty.signum() == signed.signum() {
            // Scale-in: entry price and time stay with the first fill.
            pos.qty += signed;
            continue;
        }

        let closed = event.quantity.min(pos.qty.abs());
        trades.push(Trade::from_legs(
            TradeId(next_id),
            TradeLegs {
                symbol: event.symbol.clone(),
                side: PositionSide::from_signed_qty(pos.qty),
                entry_time: pos.entry_time,
                entry_price: pos.entry_price,
                entry_order_id: pos.entry_order_id.clone(),
                exit_time: fill.time,
                exit_price: fill.price,
                exit_order_id: event.order_id.clone(),
                quantity: closed,
            },
        ));
        next_id += 1;

        let remaining = pos.qty + signed;
        if remaining.abs() < QTY_EPSILON {
            positions.remove(event.symbol.as_str());
        } else if remaining.signum() != pos.qty.signum() {
            debug!(symbol = %event.symbol, remaining, "position flipped");
            *pos = PositionState {
                qty: remaining,
                entry_time: fill.time,
                entry_price: fill.price,
                entry_order_id: event.order_id.clone(),
            };
        } else {
            pos.qty = remaining;
        }
    }

    let mut open_positions: Vec<OpenPosition> = positions
        .into_iter()
        .map(|(symbol, p)| OpenPosition {
            symbol: symbol.to_string(),
            side: PositionSide::from_signed_qty(p.qty),
            quantity: p.qty.abs(),
            entry_time: p.entry_time,
            entry_price: p.entry_price,
        })
        .collect();
    open_positions.sort_by(|a, b| a.symbol.cmp(&b.symbol));

    info!(
        fills = fills.len(),
        trades = trades.len(),
        dropped = dropped.len(),
        open = open_positions.len(),
        "reconstructed trades"
    );

    Reconstruction {
        trades,
        dropped,
        open_positions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OrderKind, OrderSide, OrderStatus};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 13, 30, 0).unwrap()
    }

    fn fill(seq: usize, symbol: &str, side: OrderSide, qty: f64, price: f64, secs: i64) -> OrderEvent {
        let at = t0() + Duration::seconds(secs);
        OrderEvent {
            sequence: seq,
            order_id: OrderId::from(seq as u64),
            symbol: symbol.into(),
            side,
            kind: OrderKind::Market,
            status: OrderStatus::Filled,
            quantity: qty,
            fill_price: Some(price),
            limit_price: None,
            stop_price: None,
            timestamp: Some(at),
            fill_time: Some(at),
        }
    }

    #[test]
    fn simple_round_trip() {
        let events = vec![
            fill(1, "NQ", OrderSide::Buy, 1.0, 100.0, 0),
            fill(2, "NQ", OrderSide::Sell, 1.0, 90.0, 60),
        ];
        let r = reconstruct(&events);
        assert_eq!(r.trades.len(), 1);
        let t = &r.trades[0];
        assert_eq!(t.side, PositionSide::Long);
        assert_eq!(t.pnl, -10.0);
        assert_eq!(t.exit_order_id, OrderId::from(2));
        assert!(r.open_positions.is_empty());
    }

    #[test]
    fn scale_in_keeps_first_entry() {
        let events = vec![
            fill(1, "NQ", OrderSide::Buy, 1.0, 100.0, 0),
            fill(2, "NQ", OrderSide::Buy, 2.0, 102.0, 10),
            fill(3, "NQ", OrderSide::Sell, 3.0, 105.0, 20),
        ];
        let r = reconstruct(&events);
        assert_eq!(r.trades.len(), 1);
        assert_eq!(r.trades[0].entry_price, 100.0);
        assert_eq!(r.trades[0].entry_time, t0());
        assert_eq!(r.trades[0].exit_qty, 3.0);
    }

    #[test]
    fn partial_exits_share_entry() {
        let events = vec![
            fill(1, "ES", OrderSide::Sell, 3.0, 50.0, 0),
            fill(2, "ES", OrderSide::Buy, 1.0, 49.0, 5),
            fill(3, "ES", OrderSide::Buy, 2.0, 51.0, 9),
        ];
        let r = reconstruct(&events);
        assert_eq!(r.trades.len(), 2);
        assert!(r.trades.iter().all(|t| t.side == PositionSide::Short));
        assert!(r.trades.iter().all(|t| t.entry_price == 50.0));
        assert_eq!(r.trades[0].pnl, 1.0);
        assert_eq!(r.trades[1].pnl, -2.0);
        assert_eq!(r.trades[0].id, TradeId(1));
        assert_eq!(r.trades[1].id, TradeId(2));
    }

    #[test]
    fn flip_opens_new_leg_at_fill() {
        let events = vec![
            fill(1, "CL", OrderSide::Buy, 1.0, 70.0, 0),
            fill(2, "CL", OrderSide::Sell, 3.0, 71.0, 30),
            fill(3, "CL", OrderSide::Buy, 2.0, 72.0, 90),
        ];
        let r = reconstruct(&events);
        assert_eq!(r.trades.len(), 2);
        assert_eq!(r.trades[0].exit_qty, 1.0);
        let second = &r.trades[1];
        assert_eq!(second.side, PositionSide::Short);
        assert_eq!(second.entry_price, 71.0);
        assert_eq!(second.entry_time, t0() + Duration::seconds(30));
        assert_eq!(second.entry_qty, 2.0);
    }

    #[test]
    fn symbols_are_independent() {
        let events = vec![
            fill(1, "A", OrderSide::Buy, 1.0, 10.0, 0),
            fill(2, "B", OrderSide::Sell, 1.0, 20.0, 1),
            fill(3, "A", OrderSide::Sell, 1.0, 11.0, 2),
        ];
        let r = reconstruct(&events);
        assert_eq!(r.trades.len(), 1);
        assert_eq!(r.trades[0].symbol, "A");
        assert_eq!(r.open_positions.len(), 1);
        assert_eq!(r.open_positions[0].symbol, "B");
    }

    #[test]
    fn fills_sorted_by_time_not_file_order() {
        let events = vec![
            fill(1, "A", OrderSide::Sell, 1.0, 11.0, 60),
            fill(2, "A", OrderSide::Buy, 1.0, 10.0, 0),
        ];
        let r = reconstruct(&events);
        assert_eq!(r.trades.len(), 1);
        assert_eq!(r.trades[0].side, PositionSide::Long);
        assert_eq!(r.trades[0].pnl, 1.0);
    }

    #[test]
    fn malformed_fills_are_dropped() {
        let mut no_price = fill(2, "A", OrderSide::Buy, 1.0, 10.0, 0);
        no_price.fill_price = None;
        let mut no_time = fill(3, "A", OrderSide::Buy, 1.0, 10.0, 0);
        no_time.fill_time = None;
        no_time.timestamp = None;
        let events = vec![fill(1, "A", OrderSide::Buy, 0.0, 10.0, 0), no_price, no_time];

        let r = reconstruct(&events);
        assert!(r.trades.is_empty());
        let reasons: Vec<DropReason> = r.dropped.iter().map(|d| d.reason).collect();
        assert_eq!(
            reasons,
            vec![
                DropReason::NonPositiveQuantity,
                DropReason::MissingFillPrice,
                DropReason::MissingFillTime
            ]
        );
    }

    #[test]
    fn non_fill_events_ignored() {
        let mut working = fill(1, "A", OrderSide::Buy, 1.0, 10.0, 0);
        working.status = OrderStatus::Working;
        let r = reconstruct(&[working]);
        assert!(r.trades.is_empty());
        assert!(r.dropped.is_empty());
        assert!(r.open_positions.is_empty());
    }
}
