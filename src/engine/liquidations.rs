//! Liquidation and the full rotation that follows it.

use super::core::{Simulation, SimulationStatus};
use super::results::SimulationError;
use crate::events::{EventPayload, LiquidationEvent, ReopenEvent};
use crate::liquidation::{liquidation_penalty, rotation_fees, stress_price};
use crate::market::DailyObservation;
use crate::types::{Leg, Quote};
use tracing::debug;

impl<'a> Simulation<'a> {
    /// Liquidates `leg`, then closes and rebuilds both legs at the day's close from
    /// whatever equity is left. Returns the penalty charged.
    pub(super) fn liquidate_and_reopen(
        &mut self,
        leg: Leg,
        day: &DailyObservation,
    ) -> Result<Quote, SimulationError> {
        let close = day.close;
        self.status = SimulationStatus::LiquidatedPendingReopen;

        let long_equity = self.state.long_equity(close);
        let short_equity = self.state.short_equity(close);
        let penalty = liquidation_penalty(&self.state, leg, close, self.venue);
        let remaining = long_equity.add(short_equity).sub(penalty);

        self.state.record_penalty(penalty);
        self.activity.liquidations += 1;

        debug!(
            date = %day.date,
            leg = %leg,
            trigger_price = %stress_price(leg, day),
            close = %close,
            penalty = %penalty,
            remaining = %remaining,
            "liquidation"
        );

        self.emit_event(
            day.date,
            EventPayload::Liquidation(LiquidationEvent {
                leg,
                price: close,
                trigger_price: stress_price(leg, day),
                penalty,
                long_equity,
                short_equity,
            }),
        );

        if !remaining.is_positive() {
            return Err(SimulationError::CapitalExhausted {
                date: day.date,
                remaining,
            });
        }

        // 8.5: reopen. new legs sized off the post-penalty equity, old short closed at the close
        let fees = rotation_fees(
            remaining.half().mul(self.target.value()),
            self.state.short_notional(close),
            self.venue,
            &self.long_params,
        );
        let equity = remaining.sub(fees.total());

        self.state
            .reset(equity, self.target, close)
            .map_err(|_| SimulationError::CapitalExhausted {
                date: day.date,
                remaining: equity,
            })?;
        self.state.charge_fee(fees.total());
        self.activity.rotations += 1;

        let notional_per_leg = self.state.long_notional(close);
        let reopened = self.state.snapshot(close);

        debug!(
            date = %day.date,
            equity = %equity,
            fees = %fees.total(),
            "reopened position"
        );

        self.emit_event(
            day.date,
            EventPayload::Reopen(ReopenEvent {
                price: close,
                notional_per_leg,
                fees,
                long_equity: reopened.long_equity,
                short_equity: reopened.short_equity,
            }),
        );

        self.status = SimulationStatus::Active;
        Ok(penalty)
    }
}
