//! Property tests for reconstruction and stop-resolution invariants.
//!
//! Uses proptest to verify:
//! 1. Quantity conservation: a log that ends flat closes exactly what it opened
//! 2. Trade sizing: no trade is larger than the fill that closed it
//! 3. Stop resolution: risk is never negative and never resolved for
//!    trades whose stops all sit on the profit side

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use tradehabit_core::domain::{OrderEvent, OrderId, OrderKind, OrderSide, OrderStatus};
use tradehabit_core::reconstruct::reconstruct;
use tradehabit_core::stops::StopResolver;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_side() -> impl Strategy<Value = OrderSide> {
    prop::bool::ANY.prop_map(|b| if b { OrderSide::Buy } else { OrderSide::Sell })
}

fn arb_quantity() -> impl Strategy<Value = f64> {
    (1u32..10).prop_map(f64::from)
}

fn arb_price() -> impl Strategy<Value = f64> {
    (10.0..500.0_f64).prop_map(|p| (p * 100.0).round() / 100.0)
}

fn arb_fills() -> impl Strategy<Value = Vec<(OrderSide, f64, f64)>> {
    prop::collection::vec((arb_side(), arb_quantity(), arb_price()), 1..40)
}

// ── Helpers ──────────────────────────────────────────────────────────

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap()
}

fn fill(seq: usize, side: OrderSide, qty: f64, price: f64) -> OrderEvent {
    let at = base() + Duration::seconds(seq as i64 * 30);
    OrderEvent {
        sequence: seq,
        order_id: OrderId::from(seq as u64),
        symbol: "ES".into(),
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

/// Build fills and append one that flattens the net position.
fn flattened_log(raw: &[(OrderSide, f64, f64)]) -> Vec<OrderEvent> {
    let mut events: Vec<OrderEvent> = raw
        .iter()
        .enumerate()
        .map(|(i, (side, qty, price))| fill(i, *side, *qty, *price))
        .collect();
    let net: f64 = raw.iter().map(|(side, qty, _)| side.sign() * qty).sum();
    if net != 0.0 {
        let side = if net > 0.0 { OrderSide::Sell } else { OrderSide::Buy };
        events.push(fill(raw.len(), side, net.abs(), 100.0));
    }
    events
}

// ── 1. Quantity conservation ─────────────────────────────────────────

proptest! {
    /// Every unit opened is closed exactly once, so closed volume is half the
    /// total traded volume when the log ends flat.
    #[test]
    fn flat_log_conserves_quantity(raw in arb_fills()) {
        let events = flattened_log(&raw);
        let volume: f64 = events.iter().map(|e| e.quantity).sum();

        let r = reconstruct(&events);

        prop_assert!(r.open_positions.is_empty());
        let closed: f64 = r.trades.iter().map(|t| t.exit_qty).sum();
        let opened: f64 = r.trades.iter().map(|t| t.entry_qty).sum();
        prop_assert!((closed - volume / 2.0).abs() < 1e-9);
        prop_assert!((opened - closed).abs() < 1e-9);
    }
}

// ── 2. Trade sizing ──────────────────────────────────────────────────

proptest! {
    /// A trade never exceeds the reducing fill that produced it.
    #[test]
    fn trade_never_exceeds_its_exit_fill(raw in arb_fills()) {
        let events = flattened_log(&raw);
        let r = reconstruct(&events);

        for trade in &r.trades {
            let exit_fill = events
                .iter()
                .find(|e| e.order_id == trade.exit_order_id)
                .expect("exit fill present");
            prop_assert!(trade.exit_qty > 0.0);
            prop_assert!(trade.exit_qty <= exit_fill.quantity + 1e-9);
        }

        let ids: Vec<u32> = r.trades.iter().map(|t| t.id.0).collect();
        let expected: Vec<u32> = (1..=r.trades.len() as u32).collect();
        prop_assert_eq!(ids, expected);
    }
}

// ── 3. Stop resolution ───────────────────────────────────────────────

proptest! {
    /// Risk distances are non-negative, and profit-side stops never protect.
    #[test]
    fn risk_is_non_negative_and_loss_side_only(
        entry in arb_price(),
        offset in -20.0..20.0_f64,
    ) {
        let stop_price = ((entry + offset) * 100.0).round() / 100.0;
        let events = vec![
            fill(0, OrderSide::Buy, 1.0, entry),
            OrderEvent {
                kind: OrderKind::Stop,
                status: OrderStatus::Working,
                stop_price: Some(stop_price),
                fill_price: None,
                fill_time: None,
                ..fill(1, OrderSide::Sell, 1.0, entry)
            },
            fill(2, OrderSide::Sell, 1.0, entry),
        ];
        let r = reconstruct(&events);
        prop_assert_eq!(r.trades.len(), 1);

        let resolver = StopResolver::new(&events, 60.0);
        let resolution = resolver.resolve(&r.trades[0]);

        if stop_price < entry {
            let risk = resolution.risk_points().expect("loss-side stop resolves");
            prop_assert!(risk >= 0.0);
            prop_assert!((risk - (entry - stop_price)).abs() < 0.006);
        } else {
            prop_assert!(!resolution.is_protected());
        }
    }
}
