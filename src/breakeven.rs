// 12.0 breakeven.rs: what a position has to earn to pay for itself, and how far price can
// move before a fresh position loses a leg. both read off the same formulas the engine runs:
// net_carry_apy for income, rotation_fees for costs, liquidation_price for the margin test.
// 12.1 fee drag, 12.2 breakeven funding, 12.3 price move limits, 12.4 tables.

use crate::config::{ConfigError, LongLegParams, VenueConfig};
use crate::funding::{daily_to_annual_rate, net_carry_apy};
use crate::liquidation::{liquidation_price, rotation_fees};
use crate::position::{PositionError, PositionState};
use crate::types::{Leg, Leverage, Price, Quote};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BreakevenError {
    #[error("holding period must be at least one day")]
    EmptyHoldingPeriod,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Position(#[from] PositionError),
}

/// How long a position is held and how often capital crosses between venues.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BreakevenAssumptions {
    // one full open + close per holding period
    pub holding_days: u32,
    pub rebalances_per_year: Decimal,
}

impl Default for BreakevenAssumptions {
    fn default() -> Self {
        Self {
            holding_days: 365,
            rebalances_per_year: dec!(6),
        }
    }
}

// 12.1: one open and one close at notional capital/2 * leverage per leg.
// the close is the short leg only, the same charge the engine takes at the end of a run.
pub fn round_trip_fees(capital: Quote, leverage: Leverage, venue: &VenueConfig, long: &LongLegParams) -> Quote {
    let notional = capital.half().mul(leverage.value());
    let open = rotation_fees(notional, Quote::zero(), venue, long).total();
    let close = notional.mul(venue.taker_fee_rate).add(venue.slippage_on(notional));
    open.add(close)
}

/// Round-trip fees as a fraction of capital per year, one round trip per holding period.
pub fn annual_fee_drag(
    capital: Quote,
    leverage: Leverage,
    venue: &VenueConfig,
    long: &LongLegParams,
    holding_days: u32,
) -> Result<Decimal, BreakevenError> {
    if holding_days == 0 {
        return Err(BreakevenError::EmptyHoldingPeriod);
    }
    if !capital.is_positive() {
        return Err(ConfigError::InvalidCapital(capital).into());
    }
    let per_day = round_trip_fees(capital, leverage, venue, long).value()
        / capital.value()
        / Decimal::from(holding_days);
    Ok(daily_to_annual_rate(per_day))
}

/// Transfer costs as a fraction of capital per year.
pub fn transfer_drag(capital: Quote, venue: &VenueConfig, rebalances_per_year: Decimal) -> Result<Decimal, BreakevenError> {
    if !capital.is_positive() {
        return Err(ConfigError::InvalidCapital(capital).into());
    }
    Ok(venue.transfer_cost.value() * rebalances_per_year / capital.value())
}

/** 12.2: the funding rate at which carry exactly pays the fee and transfer drag */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakevenFunding {
    pub venue: String,
    pub leverage: Leverage,
    pub capital: Quote,
    pub fee_drag: Decimal,
    pub transfer_drag: Decimal,
    // lend + funding - borrow * (L - 1) / L needed to cover the drag
    pub breakeven_spread: Decimal,
    pub funding_rate: Decimal,
}

impl BreakevenFunding {
    pub fn total_drag(&self) -> Decimal {
        self.fee_drag + self.transfer_drag
    }

    /// Observed funding above breakeven. Negative means the position loses money.
    pub fn margin_of_safety(&self, observed_funding: Decimal) -> Decimal {
        observed_funding - self.funding_rate
    }
}

/// Solves `net_carry_apy(lend, borrow, f, L) = fee drag + transfer drag` for `f`.
/// Carry is linear in funding, so the solve is exact.
pub fn breakeven_funding_rate(
    lending_rate: Decimal,
    borrowing_rate: Decimal,
    leverage: Leverage,
    capital: Quote,
    venue: &VenueConfig,
    long: &LongLegParams,
    assumptions: &BreakevenAssumptions,
) -> Result<BreakevenFunding, BreakevenError> {
    venue.validate()?;
    long.validate()?;

    let fee_drag = annual_fee_drag(capital, leverage, venue, long, assumptions.holding_days)?;
    let transfer_drag = transfer_drag(capital, venue, assumptions.rebalances_per_year)?;
    let drag = fee_drag + transfer_drag;

    let unfunded = net_carry_apy(lending_rate, borrowing_rate, Decimal::ZERO, leverage);
    let per_unit_funding = net_carry_apy(lending_rate, borrowing_rate, Decimal::ONE, leverage) - unfunded;

    Ok(BreakevenFunding {
        venue: venue.name.clone(),
        leverage,
        capital,
        fee_drag,
        transfer_drag,
        breakeven_spread: drag / per_unit_funding,
        funding_rate: (drag - unfunded) / per_unit_funding,
    })
}

/** 12.3: how far price can run from the open before a fresh position hits maintenance.
fractions of the opening price */
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceMoveLimit {
    pub leverage: Leverage,
    // fall that takes the long leg to maintenance. 1 when the long carries no debt
    pub long_drop: Decimal,
    pub short_rise: Decimal,
}

impl PriceMoveLimit {
    /// The leg that goes first and the move that takes it.
    pub fn binding(&self) -> (Leg, Decimal) {
        if self.short_rise <= self.long_drop {
            (Leg::Short, self.short_rise)
        } else {
            (Leg::Long, self.long_drop)
        }
    }
}

// any open works: the limit is a ratio, independent of size and price level
const REFERENCE_PRICE: Decimal = dec!(100);
const REFERENCE_EQUITY: Decimal = dec!(10_000);

pub fn max_price_move(leverage: Leverage, maintenance_margin_rate: Decimal) -> Result<PriceMoveLimit, BreakevenError> {
    let open = Price::new_unchecked(REFERENCE_PRICE);
    let state = PositionState::fresh(Quote::new(REFERENCE_EQUITY), leverage, open)?;

    let long_drop = liquidation_price(&state, Leg::Long, maintenance_margin_rate)
        .map_or(Decimal::ONE, |p| (Decimal::ONE - p.value() / open.value()).max(Decimal::ZERO));

    let short_liq = liquidation_price(&state, Leg::Short, maintenance_margin_rate)
        .ok_or_else(|| PositionError::Invariant("short leg opened without contracts".to_string()))?;
    let short_rise = (short_liq.value() / open.value() - Decimal::ONE).max(Decimal::ZERO);

    Ok(PriceMoveLimit {
        leverage,
        long_drop,
        short_rise,
    })
}

// 12.4: venue x leverage grids for the report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveLimitRow {
    pub venue: String,
    pub limit: PriceMoveLimit,
}

pub fn move_limit_table(venues: &[VenueConfig], leverages: &[Decimal]) -> Result<Vec<MoveLimitRow>, BreakevenError> {
    let mut rows = Vec::with_capacity(venues.len() * leverages.len());
    for venue in venues {
        venue.validate()?;
        for &raw in leverages {
            let leverage = Leverage::new(raw).ok_or(ConfigError::InvalidLeverage(raw))?;
            rows.push(MoveLimitRow {
                venue: venue.name.clone(),
                limit: max_price_move(leverage, venue.maintenance_margin_rate)?,
            });
        }
    }
    Ok(rows)
}

/// Breakeven funding for every venue and leverage at one capital and one set of rates.
pub fn breakeven_table(
    lending_rate: Decimal,
    borrowing_rate: Decimal,
    capital: Quote,
    venues: &[VenueConfig],
    leverages: &[Decimal],
    long: &LongLegParams,
    assumptions: &BreakevenAssumptions,
) -> Result<Vec<BreakevenFunding>, BreakevenError> {
    let mut rows = Vec::with_capacity(venues.len() * leverages.len());
    for venue in venues {
        for &raw in leverages {
            let leverage = Leverage::new(raw).ok_or(ConfigError::InvalidLeverage(raw))?;
            rows.push(breakeven_funding_rate(
                lending_rate,
                borrowing_rate,
                leverage,
                capital,
                venue,
                long,
                assumptions,
            )?);
        }
    }
    Ok(rows)
}
