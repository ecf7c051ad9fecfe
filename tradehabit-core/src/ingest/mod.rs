//! Order-log ingest: broker CSV exports to normalized [`OrderEvent`]s.
//!
//! Row-level problems never fail the load: the row is skipped and reported
//! as a [`DroppedRow`], including rows that are not valid UTF-8. Only
//! structural problems (unreadable input or header, missing required
//! columns) are errors.

pub mod timestamp;

pub use timestamp::{offset_from_hours, parse_timestamp};

use crate::domain::{OrderEvent, OrderId, OrderKind, OrderSide, OrderStatus};
use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

/// Structural ingest failures.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("missing required column(s): {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("failed to read order log: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to open '{path}': {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Why a row was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RowIssue {
    MissingSymbol,
    MissingOrderId,
    UnknownSide(String),
    UnknownKind(String),
    UnknownStatus(String),
    BadTimestamp(String),
    BadNumber(String),
    /// Not valid UTF-8, or not parseable as a CSV record.
    Undecodable(String),
}

/// A skipped row and the 1-based line it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedRow {
    pub line: u64,
    pub issue: RowIssue,
}

#[derive(Debug, Clone, Copy)]
pub struct NormalizeOptions {
    /// Offset applied to timestamps that carry none.
    pub utc_offset: FixedOffset,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            utc_offset: Utc.fix(),
        }
    }
}

/// Output of [`normalize_csv`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormalizedLog {
    /// In file order; `sequence` is the index in this vector.
    pub events: Vec<OrderEvent>,
    pub dropped: Vec<DroppedRow>,
    /// False when the export had no `Timestamp` column at all.
    pub has_timestamps: bool,
}

impl NormalizedLog {
    fn drop_row(&mut self, line: u64, issue: RowIssue) {
        warn!(line, ?issue, "dropping row");
        self.dropped.push(DroppedRow { line, issue });
    }
}

// ── Column mapping ──

const COL_SYMBOL: &[&str] = &["contract", "symbol"];
const COL_SIDE: &[&str] = &["b/s", "side"];
const COL_KIND: &[&str] = &["type", "order type"];
const COL_STATUS: &[&str] = &["status"];
const COL_ORDER_ID: &[&str] = &["order id", "orderid"];
const COL_QTY: &[&str] = &["filledqty", "filled qty", "filled", "qty", "quantity"];
const COL_FILL_PRICE: &[&str] = &["avgprice", "avg fill price", "avg price", "fill price"];
const COL_LIMIT: &[&str] = &["limit price", "limitprice"];
const COL_STOP: &[&str] = &["stop price", "stopprice"];
const COL_TIMESTAMP: &[&str] = &["timestamp", "time"];
const COL_FILL_TIME: &[&str] = &["fill time", "filltime"];

#[derive(Debug)]
struct Columns {
    symbol: usize,
    side: usize,
    kind: usize,
    status: usize,
    order_id: usize,
    qty: Option<usize>,
    fill_price: Option<usize>,
    limit: Option<usize>,
    stop: Option<usize>,
    timestamp: Option<usize>,
    fill_time: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self, IngestError> {
        let names: Vec<String> = headers.iter().map(|h| h.trim().to_ascii_lowercase()).collect();
        let find = |aliases: &[&str]| names.iter().position(|n| aliases.contains(&n.as_str()));

        let mut missing = Vec::new();
        let mut require = |aliases: &[&str], display: &str| {
            let found = find(aliases);
            if found.is_none() {
                missing.push(display.to_string());
            }
            found.unwrap_or_default()
        };
        let symbol = require(COL_SYMBOL, "Contract");
        let side = require(COL_SIDE, "B/S");
        let kind = require(COL_KIND, "Type");
        let status = require(COL_STATUS, "Status");
        let order_id = require(COL_ORDER_ID, "Order ID");
        if !missing.is_empty() {
            return Err(IngestError::MissingColumns(missing));
        }

        Ok(Self {
            symbol,
            side,
            kind,
            status,
            order_id,
            qty: find(COL_QTY),
            fill_price: find(COL_FILL_PRICE),
            limit: find(COL_LIMIT),
            stop: find(COL_STOP),
            timestamp: find(COL_TIMESTAMP),
            fill_time: find(COL_FILL_TIME),
        })
    }
}

// ─── Entry points ───────────────────────────────────────────────────

/// Normalize a broker CSV export.
pub fn normalize_csv<R: Read>(reader: R, opts: &NormalizeOptions) -> Result<NormalizedLog, IngestError> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let cols = Columns::from_headers(rdr.headers()?)?;
    if cols.timestamp.is_none() {
        warn!("order log has no Timestamp column; stop-loss resolution will be degraded");
    }

    let mut log = NormalizedLog {
        has_timestamps: cols.timestamp.is_some(),
        ..NormalizedLog::default()
    };

    for result in rdr.byte_records() {
        let raw = match result {
            Ok(raw) => raw,
            Err(err) if err.is_io_error() => return Err(err.into()),
            Err(err) => {
                let line = err.position().map_or(0, |p| p.line());
                log.drop_row(line, RowIssue::Undecodable(err.to_string()));
                continue;
            }
        };
        let line = raw.position().map_or(0, |p| p.line());
        let record = match csv::StringRecord::from_byte_record(raw) {
            Ok(record) => record,
            Err(err) => {
                log.drop_row(line, RowIssue::Undecodable(err.utf8_error().to_string()));
                continue;
            }
        };
        match parse_row(&record, &cols, opts, log.events.len()) {
            Ok(event) => log.events.push(event),
            Err(issue) => log.drop_row(line, issue),
        }
    }

    info!(
        events = log.events.len(),
        dropped = log.dropped.len(),
        "normalized order log"
    );
    Ok(log)
}

/// Open and normalize a CSV file.
pub fn normalize_path(path: &Path, opts: &NormalizeOptions) -> Result<NormalizedLog, IngestError> {
    let file = File::open(path).map_err(|source| IngestError::Open {
        path: path.display().to_string(),
        source,
    })?;
    normalize_csv(file, opts)
}

// ─── Helpers ────────────────────────────────────────────────────────

fn cell<'r>(record: &'r csv::StringRecord, idx: Option<usize>) -> &'r str {
    idx.and_then(|i| record.get(i)).unwrap_or("").trim()
}

fn parse_number(raw: &str) -> Result<Option<f64>, RowIssue> {
    if raw.is_empty() {
        return Ok(None);
    }
    let cleaned: String = raw.chars().filter(|c| *c != ',' && *c != '$').collect();
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(Some)
        .ok_or_else(|| RowIssue::BadNumber(raw.to_string()))
}

fn parse_time(raw: &str, offset: FixedOffset) -> Result<Option<chrono::DateTime<Utc>>, RowIssue> {
    if raw.is_empty() {
        return Ok(None);
    }
    parse_timestamp(raw, offset)
        .map(Some)
        .ok_or_else(|| RowIssue::BadTimestamp(raw.to_string()))
}

fn parse_row(
    record: &csv::StringRecord,
    cols: &Columns,
    opts: &NormalizeOptions,
    sequence: usize,
) -> Result<OrderEvent, RowIssue> {
    let symbol = cell(record, Some(cols.symbol));
    if symbol.is_empty() {
        return Err(RowIssue::MissingSymbol);
    }
    let order_id = cell(record, Some(cols.order_id));
    if order_id.is_empty() {
        return Err(RowIssue::MissingOrderId);
    }

    let side_raw = cell(record, Some(cols.side));
    let side = OrderSide::from_label(side_raw).ok_or_else(|| RowIssue::UnknownSide(side_raw.to_string()))?;
    let kind_raw = cell(record, Some(cols.kind));
    let kind = OrderKind::from_label(kind_raw).ok_or_else(|| RowIssue::UnknownKind(kind_raw.to_string()))?;
    let status_raw = cell(record, Some(cols.status));
    let status =
        OrderStatus::from_label(status_raw).ok_or_else(|| RowIssue::UnknownStatus(status_raw.to_string()))?;

    let timestamp = parse_time(cell(record, cols.timestamp), opts.utc_offset)?;
    let fill_time = if status == OrderStatus::Filled {
        parse_time(cell(record, cols.fill_time), opts.utc_offset)?
    } else {
        None
    };

    Ok(OrderEvent {
        sequence,
        order_id: OrderId::new(order_id),
        symbol: symbol.to_string(),
        side,
        kind,
        status,
        quantity: parse_number(cell(record, cols.qty))?.unwrap_or(0.0),
        fill_price: parse_number(cell(record, cols.fill_price))?,
        limit_price: parse_number(cell(record, cols.limit))?,
        stop_price: parse_number(cell(record, cols.stop))?,
        timestamp,
        fill_time,
    })
}
