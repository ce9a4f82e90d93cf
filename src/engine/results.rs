// 8.0.2: result types and errors for the simulation.

use crate::config::{ConfigError, RunParams};
use crate::events::Event;
use crate::market::MarketDataError;
use crate::position::{Counters, PositionSnapshot};
use crate::types::{Leg, Price, Quote};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One row of the daily trace, recorded after the day's actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaySnapshot {
    pub date: NaiveDate,
    pub close: Price,
    pub position: PositionSnapshot,
    pub carry: Quote,
    pub funding: Quote,
    // (sol_quantity before accrual - short_contracts) * close-to-close move
    pub price_effect: Quote,
    pub fees: Quote,
    pub penalty: Quote,
    pub liquidated: Option<Leg>,
    pub rebalanced: bool,
    pub equity: Quote,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityCounts {
    pub rebalances: usize,
    pub skipped_transfers: usize,
    pub liquidations: usize,
    pub rotations: usize,
    pub anomalies: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub venue: String,
    pub params: RunParams,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    // observations in the series, day 0 included
    pub days: usize,
    pub initial_capital: Quote,
    // total equity right after the open fees
    pub opening_equity: Quote,
    pub final_equity: Quote,
    pub close_fee: Quote,
    pub price_return: Decimal,
    pub counters: Counters,
    pub activity: ActivityCounts,
    pub events: Vec<Event>,
    pub trace: Vec<DaySnapshot>,
}

impl RunResult {
    pub fn net_return(&self) -> Quote {
        self.final_equity.sub(self.initial_capital)
    }

    pub fn equity_return(&self) -> Decimal {
        self.net_return().value() / self.initial_capital.value()
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SimulationError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Market data error: {0}")]
    MarketData(#[from] MarketDataError),

    #[error("Invariant violated on {date}: {reason}")]
    InvariantViolation {
        date: NaiveDate,
        reason: String,
        snapshot: Box<PositionSnapshot>,
    },

    #[error("Both legs breached maintenance on {date}")]
    DoubleLiquidation {
        date: NaiveDate,
        snapshot: Box<PositionSnapshot>,
    },

    #[error("Capital exhausted on {date}: {remaining} left to reopen with")]
    CapitalExhausted { date: NaiveDate, remaining: Quote },

    #[error("PnL waterfall does not reconcile, residual {residual} (first off on {date})")]
    WaterfallResidual {
        // first day whose equity change is not explained by its own components
        date: NaiveDate,
        residual: Decimal,
        snapshot: Option<Box<PositionSnapshot>>,
    },

    #[error("Day {date} already applied")]
    DayAlreadyApplied { date: NaiveDate },

    #[error("Simulation already terminated")]
    Terminated,
}
