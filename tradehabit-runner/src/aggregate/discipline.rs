//! Companion statistics: what stop-loss discipline and revenge trading cost.

use serde::{Deserialize, Serialize};
use tradehabit_core::domain::{Mistake, Trade};
use tradehabit_core::stats::mean;

use crate::detectors::percent;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StopLossStats {
    pub total_trades: usize,
    pub trades_with_stops: usize,
    pub trades_without_stops: usize,
    pub percent_without_stops: f64,
    /// Mean absolute PnL of losing trades that had a stop.
    pub avg_loss_with_stops: f64,
    pub avg_loss_without_stops: f64,
    pub max_loss_without_stops: f64,
    /// How much larger (in percent) the average unprotected loss is.
    /// `None` without protected losses to compare against.
    pub loss_difference_percent: Option<f64>,
}

fn loss_sizes(trades: &[&Trade]) -> Vec<f64> {
    trades.iter().filter(|t| t.is_loser()).map(|t| t.pnl.abs()).collect()
}

pub fn stop_loss_stats(trades: &[Trade]) -> StopLossStats {
    let (without, with): (Vec<&Trade>, Vec<&Trade>) =
        trades.iter().partition(|t| t.has_mistake(Mistake::NoStopLoss));
    let with_losses = loss_sizes(&with);
    let without_losses = loss_sizes(&without);

    let avg_with = mean(&with_losses);
    let avg_without = mean(&without_losses);

    StopLossStats {
        total_trades: trades.len(),
        trades_with_stops: with.len(),
        trades_without_stops: without.len(),
        percent_without_stops: percent(without.len(), trades.len()),
        avg_loss_with_stops: avg_with,
        avg_loss_without_stops: avg_without,
        max_loss_without_stops: without_losses.iter().copied().fold(0.0, f64::max),
        loss_difference_percent: (avg_with > 0.0 && !without_losses.is_empty())
            .then(|| 100.0 * (avg_without - avg_with) / avg_with),
    }
}

/// Win/loss profile of one trade population.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OutcomeProfile {
    pub count: usize,
    pub win_rate: Option<f64>,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub payoff_ratio: Option<f64>,
    pub net_pnl: f64,
    pub pnl_per_trade: f64,
}

impl OutcomeProfile {
    pub fn of<'a>(trades: impl IntoIterator<Item = &'a Trade>) -> Self {
        let trades: Vec<&Trade> = trades.into_iter().collect();
        let wins: Vec<f64> = trades.iter().filter(|t| t.is_winner()).map(|t| t.pnl).collect();
        let losses: Vec<f64> = trades.iter().filter(|t| t.is_loser()).map(|t| t.pnl.abs()).collect();
        let count = trades.len();
        let net_pnl: f64 = trades.iter().map(|t| t.pnl).sum();
        let avg_win = mean(&wins);
        let avg_loss = mean(&losses);
        Self {
            count,
            win_rate: (count > 0).then(|| wins.len() as f64 / count as f64),
            avg_win,
            avg_loss,
            payoff_ratio: (avg_loss > 0.0).then(|| avg_win / avg_loss),
            net_pnl,
            pnl_per_trade: if count == 0 { 0.0 } else { net_pnl / count as f64 },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RevengeOutcomeStats {
    pub total_trades: usize,
    pub revenge_percent: f64,
    pub revenge: OutcomeProfile,
    pub overall: OutcomeProfile,
}

pub fn revenge_outcomes(trades: &[Trade]) -> RevengeOutcomeStats {
    let revenge = OutcomeProfile::of(trades.iter().filter(|t| t.has_mistake(Mistake::RevengeTrade)));
    RevengeOutcomeStats {
        total_trades: trades.len(),
        revenge_percent: percent(revenge.count, trades.len()),
        revenge,
        overall: OutcomeProfile::of(trades),
    }
}
