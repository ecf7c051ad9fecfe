//! Domain types for TradeHabit

pub mod ids;
pub mod mistake;
pub mod order_event;
pub mod trade;

pub use ids::{OrderId, TradeId};
pub use mistake::{DetectorKind, Mistake};
pub use order_event::{OrderEvent, OrderKind, OrderSide, OrderStatus};
pub use trade::{PositionSide, Trade, TradeLegs};
