//! Liquidation detection, penalties and rotation costs.
//!
//! A leg is liquidated when its equity at the day's worst price falls to the
//! venue's maintenance margin on the notional at that price. The long leg is
//! tested at the day's low, the short leg at the day's high. Penalties are
//! dispatched over the closed [`PenaltyFormula`] set so the engine never
//! branches on venue identity.
//!
//! After a liquidation both legs are closed and rebuilt, which costs a full
//! rotation: long open fee, short open fee, short close fee on the old
//! position, plus the flat operation cost.

use crate::config::{LongLegParams, PenaltyFormula, VenueConfig};
use crate::market::DailyObservation;
use crate::position::PositionState;
use crate::types::{Leg, Price, Quote};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Which legs breached maintenance margin on a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Breach {
    None,
    Single(Leg),
    Both,
}

/// The price each leg is tested at: low for the long, high for the short.
pub fn stress_price(leg: Leg, day: &DailyObservation) -> Price {
    match leg {
        Leg::Long => day.low,
        Leg::Short => day.high,
    }
}

/// Equity at `extreme` is at or below maintenance margin on notional at `extreme`.
pub fn is_breached(state: &PositionState, leg: Leg, extreme: Price, maintenance_margin_rate: Decimal) -> bool {
    let equity = state.equity(leg, extreme);
    let maintenance = state.notional(leg, extreme).mul(maintenance_margin_rate);
    equity <= maintenance
}

pub fn detect_breach(state: &PositionState, day: &DailyObservation, venue: &VenueConfig) -> Breach {
    let mm = venue.maintenance_margin_rate;
    let long = is_breached(state, Leg::Long, stress_price(Leg::Long, day), mm);
    let short = is_breached(state, Leg::Short, stress_price(Leg::Short, day), mm);

    match (long, short) {
        (false, false) => Breach::None,
        (true, false) => Breach::Single(Leg::Long),
        (false, true) => Breach::Single(Leg::Short),
        (true, true) => Breach::Both,
    }
}

/// Price at which `leg` hits maintenance margin given current primitives.
pub fn liquidation_price(state: &PositionState, leg: Leg, maintenance_margin_rate: Decimal) -> Option<Price> {
    match leg {
        Leg::Long => {
            // q*P - D = mm*q*P  =>  P = D / (q * (1 - mm))
            let denominator = state.sol_quantity() * (Decimal::ONE - maintenance_margin_rate);
            if denominator <= Decimal::ZERO {
                return None;
            }
            Price::new(state.usdc_debt().value() / denominator)
        }
        Leg::Short => {
            // M + c*(E - P) = mm*c*P  =>  P = (M + c*E) / (c * (1 + mm))
            let contracts = state.short_contracts();
            let denominator = contracts * (Decimal::ONE + maintenance_margin_rate);
            if denominator <= Decimal::ZERO {
                return None;
            }
            let numerator = state.short_margin().value() + contracts * state.short_entry_price().value();
            Price::new(numerator / denominator)
        }
    }
}

/// Penalty on a liquidated leg. Negative equity is never charged.
pub fn calculate_penalty(formula: PenaltyFormula, equity: Quote, notional: Quote) -> Quote {
    let remaining = equity.floor_zero();
    match formula {
        PenaltyFormula::EquityFraction(f) => remaining.mul(f),
        PenaltyFormula::NotionalFractionCappedByEquity(f) => notional.mul(f).min(remaining),
    }
}

/// Penalty for `leg` valued at the day's close, the price the reset happens at.
pub fn liquidation_penalty(state: &PositionState, leg: Leg, close: Price, venue: &VenueConfig) -> Quote {
    calculate_penalty(
        venue.liquidation_penalty,
        state.equity(leg, close),
        state.notional(leg, close),
    )
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RotationFees {
    pub long_open: Quote,
    pub short_open: Quote,
    pub short_close: Quote,
    pub operation: Quote,
    // price impact on the short fills, open and close
    #[serde(default)]
    pub slippage: Quote,
}

impl RotationFees {
    pub fn total(&self) -> Quote {
        self.long_open
            .add(self.short_open)
            .add(self.short_close)
            .add(self.operation)
            .add(self.slippage)
    }
}

/// Fees to open `new_notional` per leg, closing a short worth `old_short_notional`.
/// A first open passes zero for the old notional. Slippage applies to both short
/// fills when the venue models it.
pub fn rotation_fees(
    new_notional: Quote,
    old_short_notional: Quote,
    venue: &VenueConfig,
    long: &LongLegParams,
) -> RotationFees {
    RotationFees {
        long_open: new_notional.mul(long.open_fee_rate),
        short_open: new_notional.mul(venue.taker_fee_rate),
        short_close: old_short_notional.mul(venue.taker_fee_rate),
        operation: long.operation_cost,
        slippage: venue
            .slippage_on(new_notional)
            .add(venue.slippage_on(old_short_notional)),
    }
}
