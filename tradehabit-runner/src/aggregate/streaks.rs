//! Clean streaks and goal progress.
//!
//! A trade is clean for a goal when it carries none of the goal's mistakes
//! (an empty mistake list means any mistake). Day granularity groups trades
//! by entry date in the trader's local offset; a day is clean only if every
//! trade that day is clean, and days without trades are skipped rather than
//! breaking the streak. Goal start dates are local dates too.

use crate::detectors::revenge::chronological;
use chrono::{FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tradehabit_core::domain::{Mistake, Trade};
use tradehabit_core::stats::round_to;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakMetric {
    #[default]
    Trades,
    Days,
}

impl fmt::Display for StreakMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trades => write!(f, "trades"),
            Self::Days => write!(f, "days"),
        }
    }
}

impl FromStr for StreakMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trades" | "trade" => Ok(Self::Trades),
            "days" | "day" => Ok(Self::Days),
            other => Err(format!("unknown streak metric '{other}' (expected trades or days)")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Streak {
    /// Length of the run ending at the most recent trade/day.
    pub current: usize,
    pub best: usize,
}

/// A streak goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub title: String,
    pub target: u32,
    /// Mistakes that break the streak; empty = any mistake.
    pub mistakes: Vec<Mistake>,
    pub metric: StreakMetric,
    pub start_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalProgress {
    pub title: String,
    pub target: u32,
    pub metric: StreakMetric,
    pub start_date: Option<NaiveDate>,
    pub current_streak: usize,
    pub best_streak: usize,
    /// current / target, two decimals; 0 for a zero target.
    pub progress: f64,
}

/// The built-in goal set.
pub fn default_goals() -> Vec<Goal> {
    vec![
        Goal {
            title: "Clean Trades".into(),
            target: 50,
            mistakes: Vec::new(),
            metric: StreakMetric::Trades,
            start_date: None,
        },
        Goal {
            title: "Risk Management".into(),
            target: 100,
            mistakes: vec![Mistake::NoStopLoss, Mistake::ExcessiveRisk, Mistake::OutsizedLoss],
            metric: StreakMetric::Trades,
            start_date: None,
        },
        Goal {
            title: "Revenge Trades".into(),
            target: 100,
            mistakes: vec![Mistake::RevengeTrade],
            metric: StreakMetric::Trades,
            start_date: None,
        },
    ]
}

fn is_clean_for(trade: &Trade, mistakes: &[Mistake]) -> bool {
    if mistakes.is_empty() {
        trade.is_clean()
    } else {
        !mistakes.iter().any(|m| trade.has_mistake(*m))
    }
}

fn run_lengths(flags: impl IntoIterator<Item = bool>) -> Streak {
    let mut streak = Streak::default();
    for clean in flags {
        if clean {
            streak.current += 1;
            streak.best = streak.best.max(streak.current);
        } else {
            streak.current = 0;
        }
    }
    streak
}

fn local_date(trade: &Trade, offset: FixedOffset) -> NaiveDate {
    trade.entry_time.with_timezone(&offset).date_naive()
}

/// Current and best clean streak. `day_offset` places entries on calendar days.
pub fn streak(
    trades: &[Trade],
    mistakes: &[Mistake],
    metric: StreakMetric,
    start_date: Option<NaiveDate>,
    day_offset: FixedOffset,
) -> Streak {
    let ordered: Vec<&Trade> = chronological(trades)
        .into_iter()
        .filter(|t| start_date.map_or(true, |d| local_date(t, day_offset) >= d))
        .collect();

    match metric {
        StreakMetric::Trades => run_lengths(ordered.iter().map(|t| is_clean_for(t, mistakes))),
        StreakMetric::Days => {
            let mut days: BTreeMap<NaiveDate, bool> = BTreeMap::new();
            for t in &ordered {
                let clean = days.entry(local_date(t, day_offset)).or_insert(true);
                *clean = *clean && is_clean_for(t, mistakes);
            }
            run_lengths(days.into_values())
        }
    }
}

pub fn evaluate_goal(trades: &[Trade], goal: &Goal, day_offset: FixedOffset) -> GoalProgress {
    let s = streak(trades, &goal.mistakes, goal.metric, goal.start_date, day_offset);
    let progress = if goal.target == 0 {
        0.0
    } else {
        round_to(s.current as f64 / f64::from(goal.target), 2)
    };
    GoalProgress {
        title: goal.title.clone(),
        target: goal.target,
        metric: goal.metric,
        start_date: goal.start_date,
        current_streak: s.current,
        best_streak: s.best,
        progress,
    }
}

pub fn goal_report(trades: &[Trade], goals: &[Goal], day_offset: FixedOffset) -> Vec<GoalProgress> {
    goals.iter().map(|g| evaluate_goal(trades, g, day_offset)).collect()
}
