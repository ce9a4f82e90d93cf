//! Capital rebalancing between legs.

use super::core::Simulation;
use super::results::SimulationError;
use crate::events::{EventPayload, RebalanceEvent};
use crate::market::DailyObservation;
use crate::rebalance::{self, RebalanceAction};
use tracing::{debug, trace, warn};

impl<'a> Simulation<'a> {
    /// At most one transfer per day. Returns whether one was made.
    pub(super) fn rebalance(&mut self, day: &DailyObservation) -> Result<bool, SimulationError> {
        let close = day.close;
        let action = rebalance::evaluate(
            &self.state,
            close,
            self.target,
            self.trigger_leverage,
            self.params.min_transfer,
        )
        .map_err(|e| self.invariant_violation(day.date, close, e.to_string()))?;

        let decision = match action {
            RebalanceAction::Hold => return Ok(false),
            RebalanceAction::BelowMinimum(decision) => {
                self.activity.skipped_transfers += 1;
                trace!(
                    date = %day.date,
                    leg = %decision.breaching_leg,
                    amount = %decision.amount,
                    "transfer below minimum, skipped"
                );
                return Ok(false);
            }
            RebalanceAction::Transfer(decision) => decision,
        };

        let cost = self.venue.transfer_cost;
        let still_over = rebalance::apply(&mut self.state, &decision, cost, close, self.trigger_leverage);
        self.activity.rebalances += 1;

        debug!(
            date = %day.date,
            from = %decision.source_leg,
            to = %decision.breaching_leg,
            amount = %decision.amount,
            leverage_before = %decision.leverage_before,
            "capital rebalance"
        );

        if still_over {
            self.activity.anomalies += 1;
            warn!(
                date = %day.date,
                long_leverage = ?self.state.effective_long_leverage(close),
                short_leverage = ?self.state.effective_short_leverage(close),
                trigger = %self.trigger_leverage,
                "leverage still above trigger after transfer"
            );
        }

        let long_equity = self.state.long_equity(close);
        let short_equity = self.state.short_equity(close);
        self.emit_event(
            day.date,
            EventPayload::Rebalance(RebalanceEvent {
                price: close,
                source_leg: decision.source_leg,
                destination_leg: decision.breaching_leg,
                amount: decision.amount,
                cost,
                leverage_before: decision.leverage_before,
                long_equity,
                short_equity,
                anomaly: still_over,
            }),
        );

        Ok(true)
    }
}
