//! P&L attribution.
//!
//! Reduces a finished run into a waterfall that reconciles exactly:
//!
//! ```text
//! carry + funding - trading_fees - liquidation_penalties - mark_to_market_drag = net_return
//! ```
//!
//! The drag is the balancing term, so the identity holds by construction. It is
//! also summed independently from the daily close-to-close price effects in the
//! trace; if the two disagree by more than the configured epsilon, some equity
//! change went unattributed and the run is rejected.

use crate::engine::{DaySnapshot, RunResult, SimulationError};
use crate::types::{Quote, DAYS_PER_YEAR};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PnlWaterfall {
    pub carry_income: Quote,
    pub funding_income: Quote,
    /// Every one-off charge: open, reopen and close fees plus transfer costs.
    pub trading_fees: Quote,
    /// The part of `trading_fees` paid for capital transfers.
    pub transfer_costs: Quote,
    pub liquidation_penalties: Quote,
    /// Positive when price moves cost money.
    pub mark_to_market_drag: Quote,
    pub net_return: Quote,
    pub annualized_return: Decimal,
}

impl PnlWaterfall {
    pub fn attribute(result: &RunResult, epsilon: Decimal) -> Result<Self, SimulationError> {
        let carry_income: Quote = result.trace.iter().map(|d| d.carry).sum();
        let funding_income: Quote = result.trace.iter().map(|d| d.funding).sum();
        let trading_fees = result.counters.total_trading_fees;
        let liquidation_penalties = result.counters.total_liquidation_penalty;
        let net_return = result.net_return();

        let explained = carry_income
            .add(funding_income)
            .sub(trading_fees)
            .sub(liquidation_penalties);
        let mark_to_market_drag = explained.sub(net_return);

        let residual = mark_to_market_drag.sub(price_drag(&result.trace)).value();
        if residual.abs() > epsilon {
            let culprit = first_unexplained_day(result, epsilon).or(result.trace.last());
            return Err(SimulationError::WaterfallResidual {
                date: culprit.map_or(result.end_date, |d| d.date),
                residual,
                snapshot: culprit.map(|d| Box::new(d.position.clone())),
            });
        }

        Ok(Self {
            carry_income,
            funding_income,
            trading_fees,
            transfer_costs: result.counters.total_transfer_costs,
            liquidation_penalties,
            mark_to_market_drag,
            net_return,
            annualized_return: annualized_return(net_return, result.initial_capital, result.days),
        })
    }

    pub fn gross_income(&self) -> Quote {
        self.carry_income.add(self.funding_income)
    }

    /// Left side of the identity minus the right. Zero for any waterfall built by
    /// [`PnlWaterfall::attribute`].
    pub fn residual(&self) -> Quote {
        self.gross_income()
            .sub(self.trading_fees)
            .sub(self.liquidation_penalties)
            .sub(self.mark_to_market_drag)
            .sub(self.net_return)
    }

    /// Fees as a percentage of carry plus funding. None without positive gross income.
    pub fn fees_pct_of_gross(&self) -> Option<Decimal> {
        let gross = self.gross_income();
        if gross.is_positive() {
            Some(self.trading_fees.value() / gross.value() * Decimal::ONE_HUNDRED)
        } else {
            None
        }
    }
}

/// First day whose equity change differs from its carry, funding, fees, penalty and
/// price effect by more than `epsilon`. Day 0 is checked against the initial capital.
pub fn first_unexplained_day(result: &RunResult, epsilon: Decimal) -> Option<&DaySnapshot> {
    let mut previous = result.initial_capital;
    for day in &result.trace {
        let explained = day
            .carry
            .add(day.funding)
            .add(day.price_effect)
            .sub(day.fees)
            .sub(day.penalty);
        let actual = day.equity.sub(previous);
        if actual.sub(explained).value().abs() > epsilon {
            return Some(day);
        }
        previous = day.equity;
    }
    None
}

/// Drag summed from the trace: minus the sum of daily price effects.
pub fn price_drag(trace: &[DaySnapshot]) -> Quote {
    trace.iter().map(|d| d.price_effect).sum::<Quote>().negate()
}

/// `net / initial * 365 / days`. Simple, not compounded.
pub fn annualized_return(net_return: Quote, initial_capital: Quote, days: usize) -> Decimal {
    if days == 0 || !initial_capital.is_positive() {
        return Decimal::ZERO;
    }
    net_return.value() / initial_capital.value() * DAYS_PER_YEAR / Decimal::from(days)
}

/// Maximum drawdown as a negative fraction (e.g., -0.15 = 15% drawdown).
pub fn max_drawdown(equity_curve: &[Quote]) -> Decimal {
    let Some(first) = equity_curve.first() else {
        return Decimal::ZERO;
    };
    let mut peak = *first;
    let mut max_dd = Decimal::ZERO;

    for &eq in equity_curve {
        if eq > peak {
            peak = eq;
        }
        if peak.is_positive() {
            let dd = (eq.value() - peak.value()) / peak.value();
            if dd < max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

/// Initial capital, each day's closing equity, then the final equity after the close fee.
pub fn equity_curve(result: &RunResult) -> Vec<Quote> {
    std::iter::once(result.initial_capital)
        .chain(result.trace.iter().map(|d| d.equity))
        .chain(std::iter::once(result.final_equity))
        .collect()
}

/// Everything a sweep ranks on or a report prints for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub venue: String,
    pub target_leverage: Decimal,
    pub trigger_multiple: Decimal,
    pub initial_capital: Quote,
    pub final_equity: Quote,
    pub days: usize,
    pub equity_return: Decimal,
    pub price_return: Decimal,
    pub waterfall: PnlWaterfall,
    pub liquidations: usize,
    pub rotations: usize,
    pub rebalances: usize,
    pub skipped_transfers: usize,
    pub anomalies: usize,
    pub max_drawdown: Decimal,
    pub fees_pct_of_gross: Option<Decimal>,
}

impl RunSummary {
    pub fn annualized_return(&self) -> Decimal {
        self.waterfall.annualized_return
    }
}

pub fn summarize(result: &RunResult, epsilon: Decimal) -> Result<RunSummary, SimulationError> {
    let waterfall = PnlWaterfall::attribute(result, epsilon)?;
    let curve = equity_curve(result);

    Ok(RunSummary {
        venue: result.venue.clone(),
        target_leverage: result.params.target_leverage,
        trigger_multiple: result.params.trigger_multiple,
        initial_capital: result.initial_capital,
        final_equity: result.final_equity,
        days: result.days,
        equity_return: result.equity_return(),
        price_return: result.price_return,
        fees_pct_of_gross: waterfall.fees_pct_of_gross(),
        waterfall,
        liquidations: result.activity.liquidations,
        rotations: result.activity.rotations,
        rebalances: result.activity.rebalances,
        skipped_transfers: result.activity.skipped_transfers,
        anomalies: result.activity.anomalies,
        max_drawdown: max_drawdown(&curve),
    })
}
