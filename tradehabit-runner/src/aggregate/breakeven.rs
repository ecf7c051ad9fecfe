//! Win rate, payoff, expectancy and the breakeven band.

use serde::{Deserialize, Serialize};
use tradehabit_core::domain::Trade;
use tradehabit_core::stats::mean;

/// Cushion added to the raw breakeven win rate.
pub const BREAKEVEN_BUFFER: f64 = 0.01;
/// Delta at or above which the trader is comfortably above breakeven.
pub const COMFORT_MARGIN: f64 = 0.02;

/// Where the actual win rate sits relative to the breakeven win rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakevenBand {
    /// delta ≥ 0.02
    ComfortablyAbove,
    /// 0 < delta < 0.02
    JustAbove,
    /// -0.02 ≤ delta ≤ 0
    Around,
    /// delta < -0.02
    Below,
    /// No trades, or no losses to size against.
    InsufficientData,
}

/// Classify a win-rate delta. Snapped to 1e-9 so float noise around the
/// band edges (0.6 - 0.58) lands on the intended side.
pub fn classify_delta(delta: f64) -> BreakevenBand {
    let d = (delta * 1e9).round() / 1e9;
    if d >= COMFORT_MARGIN {
        BreakevenBand::ComfortablyAbove
    } else if d > 0.0 {
        BreakevenBand::JustAbove
    } else if d >= -COMFORT_MARGIN {
        BreakevenBand::Around
    } else {
        BreakevenBand::Below
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakevenStats {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    /// Mean PnL of winners.
    pub avg_win: f64,
    /// Mean absolute PnL of losers.
    pub avg_loss: f64,
    /// `None` when there is no average loss.
    pub payoff_ratio: Option<f64>,
    pub expectancy: f64,
    pub breakeven_win_rate: f64,
    pub delta: f64,
    pub band: BreakevenBand,
}

/// Compute breakeven statistics over `trades`. Flat trades count toward the
/// total but are neither wins nor losses.
pub fn breakeven(trades: &[Trade]) -> BreakevenStats {
    let wins: Vec<f64> = trades.iter().filter(|t| t.is_winner()).map(|t| t.pnl).collect();
    let losses: Vec<f64> = trades.iter().filter(|t| t.is_loser()).map(|t| t.pnl.abs()).collect();
    let total = trades.len();

    let win_rate = if total == 0 {
        0.0
    } else {
        wins.len() as f64 / total as f64
    };
    let avg_win = mean(&wins);
    let avg_loss = mean(&losses);

    let mut stats = BreakevenStats {
        total_trades: total,
        winning_trades: wins.len(),
        losing_trades: losses.len(),
        win_rate,
        avg_win,
        avg_loss,
        payoff_ratio: None,
        expectancy: win_rate * avg_win - (1.0 - win_rate) * avg_loss,
        breakeven_win_rate: 0.0,
        delta: 0.0,
        band: BreakevenBand::InsufficientData,
    };
    if total == 0 || avg_loss == 0.0 {
        return stats;
    }

    stats.payoff_ratio = Some(avg_win / avg_loss);
    stats.breakeven_win_rate = avg_loss / (avg_win + avg_loss) + BREAKEVEN_BUFFER;
    stats.delta = win_rate - stats.breakeven_win_rate;
    stats.band = classify_delta(stats.delta);
    stats
}
