// 5.0: rate math. every rate in the simulator is an annualized fraction and settles once per day.
// 5.1 daily conversion, 5.2 funding settlement, 5.3 lending/borrowing accrual, 5.4 naive apy estimate.

use crate::types::{Leverage, Price, Quote, DAYS_PER_YEAR};
use rust_decimal::Decimal;

// 5.1: 7% APR -> 0.07 / 365 per day
pub fn annual_to_daily_rate(annual_rate: Decimal) -> Decimal {
    annual_rate / DAYS_PER_YEAR
}

pub fn daily_to_annual_rate(daily_rate: Decimal) -> Decimal {
    daily_rate * DAYS_PER_YEAR
}

// 5.2: what the short leg receives today. contracts * today's price * daily rate.
// valued at mark, not entry: entry-notional funding drifts as price moves.
pub fn funding_settlement(contracts: Decimal, mark_price: Price, annual_rate: Decimal) -> Quote {
    Quote::new(annual_to_daily_rate(annual_rate) * contracts * mark_price.value())
}

// 5.3: lending yield is paid in the asset. returns the SOL earned today.
pub fn lending_accrual(sol_quantity: Decimal, annual_rate: Decimal) -> Decimal {
    sol_quantity * annual_to_daily_rate(annual_rate)
}

pub fn borrow_accrual(debt: Quote, annual_rate: Decimal) -> Quote {
    debt.mul(annual_to_daily_rate(annual_rate))
}

// 5.4: instantaneous net APY on total capital, split 50/50 across legs.
// long earns lend on L/2 notional and pays borrow on (L-1)/2 debt; short earns funding on L/2.
pub fn net_carry_apy(
    lending_rate: Decimal,
    borrowing_rate: Decimal,
    funding_rate: Decimal,
    leverage: Leverage,
) -> Decimal {
    let half_notional = leverage.value() / Decimal::TWO;
    let half_debt = leverage.debt_fraction() / Decimal::TWO;
    half_notional * (lending_rate + funding_rate) - half_debt * borrowing_rate
}
