//! TradeHabit Core: order-log normalization, trade reconstruction, stop resolution.
//!
//! This crate contains the data half of the analysis pipeline:
//! - Domain types (order events, trades, mistake taxonomy, ids)
//! - Broker CSV ingest with per-row diagnostics
//! - Trade reconstruction from scaling/partial fills
//! - Protective-stop resolution with OCO awareness
//! - Population statistics used by the detectors

pub mod domain;
pub mod ingest;
pub mod reconstruct;
pub mod stats;
pub mod stops;

pub use domain::{
    DetectorKind, Mistake, OrderEvent, OrderId, OrderKind, OrderSide, OrderStatus, PositionSide,
    Trade, TradeId,
};
pub use ingest::{normalize_csv, normalize_path, DroppedRow, IngestError, NormalizeOptions, NormalizedLog};
pub use reconstruct::{reconstruct, DroppedFill, OpenPosition, Reconstruction};
pub use stats::PopulationStats;
pub use stops::{StopResolution, StopResolver, UnprotectedReason, DEFAULT_OCO_WINDOW_SECONDS};
