//! Protective-stop resolution.
//!
//! A trade is protected when an opposite-side stop or stop-limit order was in
//! force during its life:
//!
//! - not terminally resolved before entry, and first seen within the trade's
//!   life (at or after entry, no later than exit);
//! - stop price on the loss side of entry (break-even and profit stops do not count);
//! - reaches a protective outcome no later than one OCO window past exit:
//!   filled, canceled by an OCO sibling (a same-side limit target filled
//!   within the OCO window of the cancel), or still active at exit.
//!
//! Events without an event timestamp cannot be placed in time and are skipped.

use crate::domain::{OrderEvent, OrderId, OrderKind, OrderSide, OrderStatus, PositionSide, Trade};
use crate::stats::round_to;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Default half-width of the OCO matching window.
pub const DEFAULT_OCO_WINDOW_SECONDS: f64 = 60.0;

/// Why a trade resolved without protection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnprotectedReason {
    /// No opposite-side stop order exists for the symbol.
    NoStopOrder,
    /// Stop orders exist but none was in force during the trade.
    NoQualifyingStop,
    /// Opposite-side stops exist but none carries a timestamp.
    MissingTimestamps,
}

/// Outcome of resolving one trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StopResolution {
    Protected {
        stop_order_id: OrderId,
        /// `None` only for a stop without a price that closed the trade itself.
        stop_price: Option<f64>,
        risk_points: Option<f64>,
    },
    Unprotected { reason: UnprotectedReason },
}

impl StopResolution {
    pub fn is_protected(&self) -> bool {
        matches!(self, Self::Protected { .. })
    }

    pub fn risk_points(&self) -> Option<f64> {
        match self {
            Self::Protected { risk_points, .. } => *risk_points,
            Self::Unprotected { .. } => None,
        }
    }
}

/// Distance from entry to stop, rounded to cents.
pub fn risk_distance(entry_price: f64, stop_price: f64) -> f64 {
    round_to((entry_price - stop_price).abs(), 2)
}

/// The order side that reduces a position of `side`.
pub fn exit_side(side: PositionSide) -> OrderSide {
    match side {
        PositionSide::Long => OrderSide::Sell,
        PositionSide::Short => OrderSide::Buy,
    }
}

// ── Index ──

/// Timestamped lifecycle of one stop order, oldest first.
#[derive(Debug)]
struct StopHistory<'a> {
    order_id: &'a OrderId,
    side: OrderSide,
    events: Vec<(DateTime<Utc>, &'a OrderEvent)>,
}

impl StopHistory<'_> {
    fn first_seen(&self) -> Option<DateTime<Utc>> {
        self.events.first().map(|(ts, _)| *ts)
    }

    /// Latest stop price known at or before `at`, else the earliest one seen.
    fn stop_price_at(&self, at: DateTime<Utc>) -> Option<f64> {
        self.events
            .iter()
            .rev()
            .filter(|(ts, _)| *ts <= at)
            .find_map(|(_, e)| e.stop_price)
            .or_else(|| self.events.iter().find_map(|(_, e)| e.stop_price))
    }

    fn status_at(&self, at: DateTime<Utc>) -> Option<OrderStatus> {
        self.events
            .iter()
            .rev()
            .find(|(ts, _)| *ts <= at)
            .map(|(_, e)| e.status)
    }
}

#[derive(Debug, Default)]
struct SymbolBook<'a> {
    stops: Vec<StopHistory<'a>>,
    /// Filled limit orders: (side, fill time).
    targets: Vec<(OrderSide, DateTime<Utc>)>,
    /// Sides of stop events that had no timestamp.
    untimed_stop_sides: Vec<OrderSide>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disqualified {
    PlacedBeforeEntry,
    PlacedAfterExit,
    ResolvedBeforeEntry,
    NotLossSide,
    NoPriceNotExit,
    NoProtectiveOutcome,
}

/// Resolves protective stops for trades against one event log.
///
/// Builds a per-symbol index once; `resolve` is then a read-only lookup.
#[derive(Debug)]
pub struct StopResolver<'a> {
    books: HashMap<&'a str, SymbolBook<'a>>,
    oco_window: Duration,
}

impl<'a> StopResolver<'a> {
    pub fn new(events: &'a [OrderEvent], oco_window_seconds: f64) -> Self {
        let oco_window = Duration::milliseconds((oco_window_seconds.max(0.0) * 1000.0).round() as i64);
        let mut books: HashMap<&'a str, SymbolBook<'a>> = HashMap::new();
        let mut stop_index: HashMap<(&'a str, &'a OrderId), usize> = HashMap::new();

        for event in events {
            let book = books.entry(event.symbol.as_str()).or_default();

            if event.kind == OrderKind::Limit && event.is_fill() {
                if let Some(at) = event.effective_fill_time() {
                    book.targets.push((event.side, at));
                }
            }

            if !event.kind.is_stop() {
                continue;
            }
            let Some(ts) = event.timestamp else {
                book.untimed_stop_sides.push(event.side);
                continue;
            };
            let key = (event.symbol.as_str(), &event.order_id);
            let idx = *stop_index.entry(key).or_insert_with(|| {
                book.stops.push(StopHistory {
                    order_id: &event.order_id,
                    side: event.side,
                    events: Vec::new(),
                });
                book.stops.len() - 1
            });
            book.stops[idx].events.push((ts, event));
        }

        for book in books.values_mut() {
            for stop in &mut book.stops {
                stop.events
                    .sort_by(|(ta, a), (tb, b)| ta.cmp(tb).then(a.sequence.cmp(&b.sequence)));
            }
            // Earliest-placed stop wins ties between qualifying candidates.
            book.stops.sort_by_key(|s| s.first_seen());
        }

        Self { books, oco_window }
    }

    /// Resolve the protective stop for `trade`.
    pub fn resolve(&self, trade: &Trade) -> StopResolution {
        let side = exit_side(trade.side);
        let unprotected = |reason| StopResolution::Unprotected { reason };

        let Some(book) = self.books.get(trade.symbol.as_str()) else {
            return unprotected(UnprotectedReason::NoStopOrder);
        };

        let mut candidates = book.stops.iter().filter(|s| s.side == side).peekable();
        if candidates.peek().is_none() {
            return if book.untimed_stop_sides.contains(&side) {
                unprotected(UnprotectedReason::MissingTimestamps)
            } else {
                unprotected(UnprotectedReason::NoStopOrder)
            };
        }

        let mut priceless: Option<&OrderId> = None;
        for stop in candidates {
            match self.evaluate(trade, book, stop) {
                Ok(Some(stop_price)) => {
                    return StopResolution::Protected {
                        stop_order_id: stop.order_id.clone(),
                        stop_price: Some(stop_price),
                        risk_points: Some(risk_distance(trade.entry_price, stop_price)),
                    };
                }
                Ok(None) => {
                    priceless.get_or_insert(stop.order_id);
                }
                Err(why) => {
                    debug!(trade = %trade.id, stop = %stop.order_id, ?why, "stop does not qualify");
                }
            }
        }

        match priceless {
            Some(order_id) => StopResolution::Protected {
                stop_order_id: order_id.clone(),
                stop_price: None,
                risk_points: None,
            },
            None => unprotected(UnprotectedReason::NoQualifyingStop),
        }
    }

    /// `Ok(Some(price))` for a qualifying priced stop, `Ok(None)` for a
    /// qualifying stop without a price.
    fn evaluate(
        &self,
        trade: &Trade,
        book: &SymbolBook<'_>,
        stop: &StopHistory<'_>,
    ) -> Result<Option<f64>, Disqualified> {
        let entry = trade.entry_time;
        let exit = trade.exit_time;

        if stop
            .events
            .iter()
            .any(|(ts, e)| *ts < entry && e.status.is_terminal())
        {
            return Err(Disqualified::ResolvedBeforeEntry);
        }

        match stop.first_seen() {
            Some(first) if first < entry => return Err(Disqualified::PlacedBeforeEntry),
            Some(first) if first > exit => return Err(Disqualified::PlacedAfterExit),
            Some(_) => {}
            None => return Err(Disqualified::PlacedBeforeEntry),
        }

        let price = stop.stop_price_at(exit);
        match price {
            Some(p) => {
                let loss_side = match trade.side {
                    PositionSide::Long => p < trade.entry_price,
                    PositionSide::Short => p > trade.entry_price,
                };
                if !loss_side {
                    return Err(Disqualified::NotLossSide);
                }
            }
            None if *stop.order_id == trade.exit_order_id => {}
            None => return Err(Disqualified::NoPriceNotExit),
        }

        if self.has_protective_outcome(trade, book, stop) {
            Ok(price)
        } else {
            Err(Disqualified::NoProtectiveOutcome)
        }
    }

    fn has_protective_outcome(
        &self,
        trade: &Trade,
        book: &SymbolBook<'_>,
        stop: &StopHistory<'_>,
    ) -> bool {
        // Broker stamps on the closing stop or its OCO cancel may trail the
        // exit fill slightly; outcomes past this bound belong to later trades.
        let in_life =
            |ts: &DateTime<Utc>| *ts >= trade.entry_time && *ts <= trade.exit_time + self.oco_window;

        let filled = stop
            .events
            .iter()
            .any(|(ts, e)| e.status == OrderStatus::Filled && in_life(ts));
        if filled {
            return true;
        }

        let oco_cancel = stop
            .events
            .iter()
            .filter(|(ts, e)| e.status == OrderStatus::Canceled && in_life(ts))
            .any(|(cancel_ts, _)| self.oco_target_filled(book, stop.side, *cancel_ts));
        if oco_cancel {
            return true;
        }

        matches!(stop.status_at(trade.exit_time), Some(s) if s.is_active())
    }

    fn oco_target_filled(&self, book: &SymbolBook<'_>, side: OrderSide, cancel_ts: DateTime<Utc>) -> bool {
        book.targets.iter().any(|(target_side, filled_at)| {
            *target_side == side && (*filled_at - cancel_ts).abs() <= self.oco_window
        })
    }
}

/// Resolve a single trade against `events`. Builds a throwaway index; prefer
/// [`StopResolver`] when resolving many trades.
pub fn resolve(trade: &Trade, events: &[OrderEvent], oco_window_seconds: f64) -> StopResolution {
    StopResolver::new(events, oco_window_seconds).resolve(trade)
}
