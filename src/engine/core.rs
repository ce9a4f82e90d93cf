// 8.0 engine/core.rs: one simulation run. holds the position, the venue it trades on,
// the run knobs, the event log and the daily trace.

use super::config::EngineConfig;
use super::results::{ActivityCounts, DaySnapshot, RunResult, SimulationError};
use crate::config::{LongLegParams, RunParams, VenueConfig};
use crate::events::{CloseEvent, Event, EventId, EventPayload, OpenEvent};
use crate::liquidation::rotation_fees;
use crate::market::{MarketDataError, MarketSeries};
use crate::position::PositionState;
use crate::types::{Leverage, Price, Quote};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimulationStatus {
    Active,
    // between a liquidation and the reopen on the same close
    LiquidatedPendingReopen,
    Terminated,
    // a day failed. the position stays as of the last good close
    Failed,
}

/** 8.1: one run over one series. all state lives here */
#[derive(Debug)]
pub struct Simulation<'a> {
    pub(super) config: EngineConfig,
    pub(super) series: &'a MarketSeries,
    pub(super) venue: &'a VenueConfig,
    // venue funding aligned index-for-index with the series
    pub(super) funding: Vec<Decimal>,
    pub(super) long_params: LongLegParams,
    pub(super) params: RunParams,
    pub(super) target: Leverage,
    pub(super) trigger_leverage: Decimal,
    pub(super) state: PositionState,
    pub(super) status: SimulationStatus,
    pub(super) opening_equity: Quote,
    pub(super) last_date: NaiveDate,
    pub(super) last_close: Price,
    pub(super) next_index: usize,
    pub(super) activity: ActivityCounts,
    pub(super) trace: Vec<DaySnapshot>,
    pub(super) events: Vec<Event>,
    pub(super) next_event_id: u64,
}

impl<'a> Simulation<'a> {
    /// Validates every input and opens the position at the first day's close.
    /// Nothing is simulated if any check fails.
    pub fn new(
        series: &'a MarketSeries,
        venue: &'a VenueConfig,
        long_params: LongLegParams,
        params: RunParams,
        config: EngineConfig,
    ) -> Result<Self, SimulationError> {
        venue.validate()?;
        long_params.validate()?;
        params.validate()?;
        let target = params.leverage()?;

        if series.is_empty() {
            return Err(MarketDataError::Empty.into());
        }
        let funding = venue.funding.align_to(series, &venue.name)?;

        let day0 = series.first();
        let price = day0.close;

        // 8.2: open. fees come off the capital before the split so both legs start on target
        let fees = rotation_fees(
            params.initial_capital.half().mul(target.value()),
            Quote::zero(),
            venue,
            &long_params,
        );
        let equity = params.initial_capital.sub(fees.total());
        let mut state = PositionState::fresh(equity, target, price).map_err(|_| {
            SimulationError::CapitalExhausted {
                date: day0.date,
                remaining: equity,
            }
        })?;
        state.charge_fee(fees.total());

        let opening = state.snapshot(price);
        let notional_per_leg = state.long_notional(price);
        let capital = params.initial_capital;
        let trigger_leverage = params.trigger_leverage();

        let mut sim = Self {
            config,
            series,
            venue,
            funding,
            long_params,
            params,
            target,
            trigger_leverage,
            state,
            status: SimulationStatus::Active,
            opening_equity: opening.total_equity(),
            last_date: day0.date,
            last_close: price,
            next_index: 1,
            activity: ActivityCounts::default(),
            trace: Vec::with_capacity(series.len()),
            events: Vec::new(),
            next_event_id: 1,
        };

        sim.emit_event(
            day0.date,
            EventPayload::Open(OpenEvent {
                price,
                capital,
                notional_per_leg,
                fees,
                long_equity: opening.long_equity,
                short_equity: opening.short_equity,
            }),
        );

        sim.trace.push(DaySnapshot {
            date: day0.date,
            close: price,
            equity: opening.total_equity(),
            position: opening,
            carry: Quote::zero(),
            funding: Quote::zero(),
            price_effect: Quote::zero(),
            fees: fees.total(),
            penalty: Quote::zero(),
            liquidated: None,
            rebalanced: false,
        });

        debug!(
            venue = %sim.venue.name,
            leverage = %sim.target,
            capital = %capital,
            date = %day0.date,
            price = %price,
            "opened position"
        );

        Ok(sim)
    }

    /// Applies every remaining day and closes out.
    pub fn run(mut self) -> Result<RunResult, SimulationError> {
        while self.step()?.is_some() {}
        self.finish()
    }

    /// Charges the short-leg close fee on the still-open position and returns the
    /// run. State is not reset, but no further day can be applied.
    pub fn finish(&mut self) -> Result<RunResult, SimulationError> {
        if self.is_halted() {
            return Err(SimulationError::Terminated);
        }

        let close = self.last_close;
        let short_notional = self.state.short_notional(close);
        let close_fee = short_notional
            .mul(self.venue.taker_fee_rate)
            .add(self.venue.slippage_on(short_notional));
        self.state.charge_fee(close_fee);
        let final_equity = self.state.total_equity(close).sub(close_fee);
        self.status = SimulationStatus::Terminated;

        let date = self.last_date;
        self.emit_event(
            date,
            EventPayload::Close(CloseEvent {
                price: close,
                close_fee,
                final_equity,
            }),
        );

        info!(
            venue = %self.venue.name,
            leverage = %self.target,
            trigger = %self.params.trigger_multiple,
            final_equity = %final_equity,
            liquidations = self.activity.liquidations,
            rebalances = self.activity.rebalances,
            "run complete"
        );

        let start_close = self.series.first().close;
        Ok(RunResult {
            venue: self.venue.name.clone(),
            start_date: self.series.start_date(),
            end_date: date,
            days: self.trace.len(),
            initial_capital: self.params.initial_capital,
            opening_equity: self.opening_equity,
            final_equity,
            close_fee,
            price_return: start_close.return_to(close),
            counters: self.state.counters.clone(),
            activity: self.activity,
            params: self.params.clone(),
            events: self.events.clone(),
            trace: self.trace.clone(),
        })
    }

    pub fn status(&self) -> SimulationStatus {
        self.status
    }

    pub fn state(&self) -> &PositionState {
        &self.state
    }

    pub fn target_leverage(&self) -> Leverage {
        self.target
    }

    pub fn trigger_leverage(&self) -> Decimal {
        self.trigger_leverage
    }

    pub fn last_date(&self) -> NaiveDate {
        self.last_date
    }

    /// True once the run was closed out or a day failed.
    pub fn is_halted(&self) -> bool {
        matches!(self.status, SimulationStatus::Terminated | SimulationStatus::Failed)
    }

    pub fn is_complete(&self) -> bool {
        self.next_index >= self.series.len()
    }

    pub fn activity(&self) -> ActivityCounts {
        self.activity
    }

    pub fn trace(&self) -> &[DaySnapshot] {
        &self.trace
    }

    pub fn recent_events(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub(super) fn invariant_violation(&self, date: NaiveDate, price: Price, reason: String) -> SimulationError {
        SimulationError::InvariantViolation {
            date,
            reason,
            snapshot: Box::new(self.state.snapshot(price)),
        }
    }

    pub(super) fn emit_event(&mut self, date: NaiveDate, payload: EventPayload) {
        let event = Event::new(EventId(self.next_event_id), date, payload);
        self.next_event_id += 1;

        if self.config.verbose {
            debug!(id = event.id.0, date = %event.date, kind = ?event.kind(), payload = ?event.payload, "event");
        } else {
            trace!(id = event.id.0, date = %event.date, kind = ?event.kind(), "event");
        }

        self.events.push(event);

        if self.events.len() > self.config.max_events {
            let drain_count = self.events.len() - self.config.max_events;
            self.events.drain(0..drain_count);
        }
    }
}

/// Builds a simulation and runs it to the end of the series.
pub fn run_simulation(
    series: &MarketSeries,
    venue: &VenueConfig,
    long_params: LongLegParams,
    params: RunParams,
    config: EngineConfig,
) -> Result<RunResult, SimulationError> {
    Simulation::new(series, venue, long_params, params, config)?.run()
}
