//! The daily fold: accrue, check liquidation, check rebalance, record.

use super::core::{Simulation, SimulationStatus};
use super::results::{DaySnapshot, SimulationError};
use crate::liquidation::{detect_breach, Breach};
use crate::market::{DailyObservation, MarketDataError};
use crate::types::Quote;
use chrono::Duration;
use rust_decimal::Decimal;
use tracing::warn;

impl<'a> Simulation<'a> {
    /// Applies the next day of the series. `None` once the series is exhausted.
    pub fn step(&mut self) -> Result<Option<&DaySnapshot>, SimulationError> {
        if self.is_halted() {
            return Err(SimulationError::Terminated);
        }
        let series = self.series;
        let Some(day) = series.days().get(self.next_index) else {
            return Ok(None);
        };
        let funding_rate = self.funding[self.next_index];
        self.apply_day(day, funding_rate).map(Some)
    }

    /// Applies one day. Each date is applied exactly once and in order: a date at or
    /// before the last applied one is rejected, as is a gap. A failure once the day
    /// has started rolls the position back to the previous close and halts the run;
    /// every later call returns `Terminated`.
    pub fn apply_day(
        &mut self,
        day: &DailyObservation,
        funding_rate: Decimal,
    ) -> Result<&DaySnapshot, SimulationError> {
        if self.is_halted() {
            return Err(SimulationError::Terminated);
        }
        if day.date <= self.last_date {
            return Err(SimulationError::DayAlreadyApplied { date: day.date });
        }
        let expected = self.last_date + Duration::days(1);
        if day.date != expected {
            return Err(MarketDataError::MissingDate { missing: expected }.into());
        }
        day.validate()?;

        let state_before = self.state.clone();
        let activity_before = self.activity;
        let first_new_event = self.next_event_id;

        if let Err(err) = self.advance(day, funding_rate) {
            self.state = state_before;
            self.activity = activity_before;
            self.events.retain(|e| e.id.0 < first_new_event);
            self.status = SimulationStatus::Failed;
            warn!(
                venue = %self.venue.name,
                date = %day.date,
                error = %err,
                "run halted"
            );
            return Err(err);
        }

        Ok(&self.trace[self.trace.len() - 1])
    }

    fn advance(&mut self, day: &DailyObservation, funding_rate: Decimal) -> Result<(), SimulationError> {
        let close = day.close;
        let quantity_before = self.state.sol_quantity();
        let contracts = self.state.short_contracts();
        let fees_before = self.state.counters.total_trading_fees;

        // 8.3: accrual, then the close-to-close move on what was held overnight
        let accrual = self
            .state
            .accrue(close, day.lending_rate, day.borrowing_rate, funding_rate);
        let price_effect =
            Quote::new((quantity_before - contracts) * (close.value() - self.last_close.value()));

        self.state
            .check_invariants()
            .map_err(|e| self.invariant_violation(day.date, close, e.to_string()))?;

        // 8.4: liquidation pre-empts rebalancing
        let mut penalty = Quote::zero();
        let mut liquidated = None;
        let mut rebalanced = false;

        match detect_breach(&self.state, day, self.venue) {
            Breach::Both => {
                return Err(SimulationError::DoubleLiquidation {
                    date: day.date,
                    snapshot: Box::new(self.state.snapshot(close)),
                });
            }
            Breach::Single(leg) => {
                penalty = self.liquidate_and_reopen(leg, day)?;
                liquidated = Some(leg);
            }
            Breach::None => {
                rebalanced = self.rebalance(day)?;
            }
        }

        self.state
            .check_invariants()
            .map_err(|e| self.invariant_violation(day.date, close, e.to_string()))?;

        let position = self.state.snapshot(close);
        self.trace.push(DaySnapshot {
            date: day.date,
            close,
            equity: position.total_equity(),
            position,
            carry: accrual.carry,
            funding: accrual.funding,
            price_effect,
            fees: self.state.counters.total_trading_fees.sub(fees_before),
            penalty,
            liquidated,
            rebalanced,
        });

        self.last_date = day.date;
        self.last_close = close;
        self.next_index += 1;
        Ok(())
    }
}
