// 4.0: both legs of the basis position. four primitives, everything else derived on demand.
// long: sol_quantity lent out, usdc_debt borrowed against it. short: contracts, entry, margin.
// equity and leverage are functions of (primitives, price), never fields. one formula each.
// 4.1 derived values, 4.2 accrual, 4.3 capital transfer, 4.4 fresh build (open/reopen).

use crate::funding::{borrow_accrual, funding_settlement, lending_accrual};
use crate::types::{Leg, Leverage, Price, Quote};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PositionError {
    #[error("cannot build a position from non-positive equity {0}")]
    NonPositiveEquity(Quote),

    #[error("{0}")]
    Invariant(String),
}

/// Running totals that survive a liquidation reset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Counters {
    pub total_trading_fees: Quote,
    pub total_transfer_costs: Quote,
    pub total_liquidation_penalty: Quote,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionState {
    sol_quantity: Decimal,
    usdc_debt: Quote,
    short_contracts: Decimal,
    short_entry_price: Price,
    short_margin: Quote,
    pub counters: Counters,
}

/// What one day of accrual did. carry and funding are valued at the day's close.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Accrual {
    pub sol_earned: Decimal,
    pub debt_increase: Quote,
    pub carry: Quote,
    pub funding: Quote,
}

impl PositionState {
    // 4.4: both legs at exactly `leverage`, equity split 50/50, short entered at `price`
    pub fn fresh(equity: Quote, leverage: Leverage, price: Price) -> Result<Self, PositionError> {
        Self::fresh_with_counters(equity, leverage, price, Counters::default())
    }

    pub(crate) fn fresh_with_counters(
        equity: Quote,
        leverage: Leverage,
        price: Price,
        counters: Counters,
    ) -> Result<Self, PositionError> {
        if !equity.is_positive() {
            return Err(PositionError::NonPositiveEquity(equity));
        }

        let half = equity.half();
        let notional = half.mul(leverage.value());
        let quantity = notional.value() / price.value();

        Ok(Self {
            sol_quantity: quantity,
            usdc_debt: half.mul(leverage.debt_fraction()),
            short_contracts: quantity,
            short_entry_price: price,
            short_margin: half,
            counters,
        })
    }

    // rebuild at a new price keeping the counters. only called after a liquidation.
    pub fn reset(&mut self, equity: Quote, leverage: Leverage, price: Price) -> Result<(), PositionError> {
        *self = Self::fresh_with_counters(equity, leverage, price, self.counters.clone())?;
        Ok(())
    }

    pub fn sol_quantity(&self) -> Decimal {
        self.sol_quantity
    }

    pub fn usdc_debt(&self) -> Quote {
        self.usdc_debt
    }

    pub fn short_contracts(&self) -> Decimal {
        self.short_contracts
    }

    pub fn short_entry_price(&self) -> Price {
        self.short_entry_price
    }

    pub fn short_margin(&self) -> Quote {
        self.short_margin
    }

    // 4.1: derived values
    pub fn long_notional(&self, price: Price) -> Quote {
        Quote::new(self.sol_quantity * price.value())
    }

    pub fn short_notional(&self, price: Price) -> Quote {
        Quote::new(self.short_contracts * price.value())
    }

    pub fn notional(&self, leg: Leg, price: Price) -> Quote {
        match leg {
            Leg::Long => self.long_notional(price),
            Leg::Short => self.short_notional(price),
        }
    }

    pub fn long_equity(&self, price: Price) -> Quote {
        self.long_notional(price).sub(self.usdc_debt)
    }

    pub fn short_equity(&self, price: Price) -> Quote {
        let unrealized = self.short_contracts * (self.short_entry_price.value() - price.value());
        self.short_margin.add(Quote::new(unrealized))
    }

    pub fn equity(&self, leg: Leg, price: Price) -> Quote {
        match leg {
            Leg::Long => self.long_equity(price),
            Leg::Short => self.short_equity(price),
        }
    }

    pub fn total_equity(&self, price: Price) -> Quote {
        self.long_equity(price).add(self.short_equity(price))
    }

    // notional / equity. None when the leg has no equity left to lever.
    pub fn effective_leverage(&self, leg: Leg, price: Price) -> Option<Decimal> {
        let equity = self.equity(leg, price);
        if equity.is_positive() {
            Some(self.notional(leg, price).value() / equity.value())
        } else {
            None
        }
    }

    pub fn effective_long_leverage(&self, price: Price) -> Option<Decimal> {
        self.effective_leverage(Leg::Long, price)
    }

    pub fn effective_short_leverage(&self, price: Price) -> Option<Decimal> {
        self.effective_leverage(Leg::Short, price)
    }

    // net base exposure. zero when delta neutral.
    pub fn net_exposure(&self) -> Decimal {
        self.sol_quantity - self.short_contracts
    }

    // 4.2: one day of lending yield, borrow interest and funding at the close
    pub fn accrue(
        &mut self,
        close: Price,
        lending_rate: Decimal,
        borrowing_rate: Decimal,
        funding_rate: Decimal,
    ) -> Accrual {
        let sol_earned = lending_accrual(self.sol_quantity, lending_rate);
        let debt_increase = borrow_accrual(self.usdc_debt, borrowing_rate);
        let funding = funding_settlement(self.short_contracts, close, funding_rate);

        self.sol_quantity += sol_earned;
        self.usdc_debt = self.usdc_debt.add(debt_increase);
        self.short_margin = self.short_margin.add(funding);

        Accrual {
            sol_earned,
            debt_increase,
            carry: Quote::new(sol_earned * close.value()).sub(debt_increase),
            funding,
        }
    }

    // 4.3: move `amount` of capital out of `source` into the other leg. `cost` comes out of
    // the source too. only usdc_debt and short_margin move; sizes stay put.
    pub fn transfer(&mut self, source: Leg, amount: Quote, cost: Quote) {
        let outflow = amount.add(cost);
        match source {
            Leg::Long => {
                // borrow more against the SOL and send it over
                self.usdc_debt = self.usdc_debt.add(outflow);
                self.short_margin = self.short_margin.add(amount);
            }
            Leg::Short => {
                // withdraw margin and repay debt with it
                self.short_margin = self.short_margin.sub(outflow);
                self.usdc_debt = self.usdc_debt.sub(amount);
            }
        }
        self.counters.total_transfer_costs = self.counters.total_transfer_costs.add(cost);
        self.counters.total_trading_fees = self.counters.total_trading_fees.add(cost);
    }

    pub fn charge_fee(&mut self, fee: Quote) {
        self.counters.total_trading_fees = self.counters.total_trading_fees.add(fee);
    }

    pub fn record_penalty(&mut self, penalty: Quote) {
        self.counters.total_liquidation_penalty = self.counters.total_liquidation_penalty.add(penalty);
    }

    pub fn check_invariants(&self) -> Result<(), PositionError> {
        if self.sol_quantity < Decimal::ZERO {
            return Err(PositionError::Invariant(format!(
                "negative sol quantity {}",
                self.sol_quantity
            )));
        }
        if self.short_contracts < Decimal::ZERO {
            return Err(PositionError::Invariant(format!(
                "negative short contracts {}",
                self.short_contracts
            )));
        }
        Ok(())
    }

    pub fn snapshot(&self, price: Price) -> PositionSnapshot {
        PositionSnapshot {
            price,
            sol_quantity: self.sol_quantity,
            usdc_debt: self.usdc_debt,
            short_contracts: self.short_contracts,
            short_entry_price: self.short_entry_price,
            short_margin: self.short_margin,
            long_equity: self.long_equity(price),
            short_equity: self.short_equity(price),
            long_leverage: self.effective_long_leverage(price),
            short_leverage: self.effective_short_leverage(price),
        }
    }
}

/// Point-in-time copy of the primitives plus their derived values at `price`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub price: Price,
    pub sol_quantity: Decimal,
    pub usdc_debt: Quote,
    pub short_contracts: Decimal,
    pub short_entry_price: Price,
    pub short_margin: Quote,
    pub long_equity: Quote,
    pub short_equity: Quote,
    pub long_leverage: Option<Decimal>,
    pub short_leverage: Option<Decimal>,
}

impl PositionSnapshot {
    pub fn total_equity(&self) -> Quote {
        self.long_equity.add(self.short_equity)
    }
}
