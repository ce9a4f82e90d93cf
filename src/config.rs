// 7.0 config.rs: all settings in one place. venue fees, margins, penalty formula, run params.
// 7.1 nothing here is global. every run gets its own immutable copy passed in explicitly.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::market::FundingSeries;
use crate::types::{Bps, Leverage, Quote};

// trigger multiple that never fires on any realistic path
pub const TRIGGER_NEVER: Decimal = dec!(1000);

/** 7.2: how a venue charges for liquidating the short leg. closed set, dispatched in liquidation.rs */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "fraction", rename_all = "snake_case")]
pub enum PenaltyFormula {
    // lose f of remaining equity (hyperliquid style)
    EquityFraction(Decimal),
    // lose f of notional, never more than what's left (drift style)
    NotionalFractionCappedByEquity(Decimal),
}

impl PenaltyFormula {
    pub fn coefficient(&self) -> Decimal {
        match self {
            PenaltyFormula::EquityFraction(f) => *f,
            PenaltyFormula::NotionalFractionCappedByEquity(f) => *f,
        }
    }
}

/** 7.3: one short-leg venue. fee rate, margin, penalty, transfer cost, and its funding history */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueConfig {
    pub name: String,
    // charged on notional for every open and close of the short leg
    pub taker_fee_rate: Decimal,
    pub maintenance_margin_rate: Decimal,
    pub liquidation_penalty: PenaltyFormula,
    // flat cost per capital rebalance (bridge + gas)
    pub transfer_cost: Quote,
    pub funding: FundingSeries,
    // price impact on every short-leg fill. none means fills at the close
    #[serde(default)]
    pub slippage: Option<SlippageModel>,
}

impl VenueConfig {
    pub fn hyperliquid(funding: FundingSeries) -> Self {
        Self {
            name: "hyperliquid".to_string(),
            taker_fee_rate: Bps::new(dec!(3.5)).as_fraction(),
            maintenance_margin_rate: dec!(0.05),
            liquidation_penalty: PenaltyFormula::EquityFraction(dec!(0.50)),
            transfer_cost: Quote::new(dec!(3.0)), // arbitrum <-> solana bridge
            funding,
            slippage: None,
        }
    }

    pub fn drift(funding: FundingSeries) -> Self {
        Self {
            name: "drift".to_string(),
            taker_fee_rate: Bps::new(dec!(3.5)).as_fraction(),
            maintenance_margin_rate: dec!(0.03),
            liquidation_penalty: PenaltyFormula::NotionalFractionCappedByEquity(dec!(0.025)),
            transfer_cost: Quote::new(dec!(0.001)), // same chain, gas only
            funding,
            slippage: None,
        }
    }

    pub fn with_slippage(mut self, model: SlippageModel) -> Self {
        self.slippage = Some(model);
        self
    }

    /// One-way price impact of filling `notional` on this venue.
    pub fn slippage_on(&self, notional: Quote) -> Quote {
        match &self.slippage {
            Some(model) => model.slippage_cost(notional),
            None => Quote::zero(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.maintenance_margin_rate <= Decimal::ZERO
            || self.maintenance_margin_rate >= Decimal::ONE
        {
            return Err(ConfigError::InvalidVenue {
                venue: self.name.clone(),
                reason: "maintenance margin rate must be between 0 and 1".to_string(),
            });
        }

        if self.taker_fee_rate < Decimal::ZERO {
            return Err(ConfigError::InvalidVenue {
                venue: self.name.clone(),
                reason: "taker fee rate must be non-negative".to_string(),
            });
        }

        if self.transfer_cost.is_negative() {
            return Err(ConfigError::InvalidVenue {
                venue: self.name.clone(),
                reason: "transfer cost must be non-negative".to_string(),
            });
        }

        if let Some(model) = &self.slippage {
            model.validate().map_err(|reason| ConfigError::InvalidVenue {
                venue: self.name.clone(),
                reason,
            })?;
        }

        let f = self.liquidation_penalty.coefficient();
        if f < Decimal::ZERO || f > Decimal::ONE {
            return Err(ConfigError::InvalidVenue {
                venue: self.name.clone(),
                reason: "penalty fraction must be within [0, 1]".to_string(),
            });
        }

        Ok(())
    }
}

/** 7.3.1: size-dependent price impact on the short venue's book, one way, in bps.
flat up to `flat_below`, then growing linearly with the excess */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlippageModel {
    pub flat_below: Quote,
    pub flat_bps: Decimal,
    // extra bps per 10k of notional above flat_below
    pub bps_per_10k_above: Decimal,
    // 2x / 5x sensitivity on top of the fitted book
    pub multiplier: Decimal,
}

impl SlippageModel {
    /// Fitted to a SOL-PERP book snapshot: ~0.1 bps under $20k, ~1.7 bps at $200k.
    pub fn sol_perp_book() -> Self {
        Self {
            flat_below: Quote::new(dec!(20_000)),
            flat_bps: dec!(0.1),
            bps_per_10k_above: dec!(0.09),
            multiplier: Decimal::ONE,
        }
    }

    pub fn scaled(self, multiplier: Decimal) -> Self {
        Self { multiplier, ..self }
    }

    pub fn estimate_slippage_bps(&self, notional: Quote) -> Bps {
        let excess = notional.sub(self.flat_below).floor_zero().value();
        let base = self.flat_bps + excess / dec!(10_000) * self.bps_per_10k_above;
        Bps::new(base * self.multiplier)
    }

    /// One-way cost of filling `notional`.
    pub fn slippage_cost(&self, notional: Quote) -> Quote {
        notional.abs().mul(self.estimate_slippage_bps(notional.abs()).as_fraction())
    }

    /// Entry plus exit at the same size.
    pub fn round_trip_cost(&self, notional: Quote) -> Quote {
        self.slippage_cost(notional).mul(Decimal::TWO)
    }

    fn validate(&self) -> Result<(), String> {
        if self.flat_below.is_negative()
            || self.flat_bps < Decimal::ZERO
            || self.bps_per_10k_above < Decimal::ZERO
            || self.multiplier < Decimal::ZERO
        {
            return Err("slippage parameters must be non-negative".to_string());
        }
        Ok(())
    }
}

/** 7.4: long-leg (lending protocol) costs. paid on every open and reopen */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LongLegParams {
    pub open_fee_rate: Decimal,
    // flat on-chain cost per open/reopen
    pub operation_cost: Quote,
}

impl Default for LongLegParams {
    fn default() -> Self {
        Self {
            open_fee_rate: Bps::new(dec!(15)).as_fraction(), // 0.15% on notional
            operation_cost: Quote::new(dec!(2.0)),
        }
    }
}

impl LongLegParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.open_fee_rate < Decimal::ZERO || self.operation_cost.is_negative() {
            return Err(ConfigError::InvalidLongLeg {
                reason: "long-leg fees must be non-negative".to_string(),
            });
        }
        Ok(())
    }
}

/** 7.5: per-run knobs. the sweep varies these */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunParams {
    pub target_leverage: Decimal,
    pub initial_capital: Quote,
    // rebalance when a leg's effective leverage exceeds trigger_multiple * target
    pub trigger_multiple: Decimal,
    // transfers smaller than this are skipped
    pub min_transfer: Quote,
}

impl RunParams {
    pub fn new(target_leverage: Decimal, initial_capital: Decimal, trigger_multiple: Decimal) -> Self {
        Self {
            target_leverage,
            initial_capital: Quote::new(initial_capital),
            trigger_multiple,
            min_transfer: Quote::new(dec!(5)),
        }
    }

    pub fn leverage(&self) -> Result<Leverage, ConfigError> {
        Leverage::new(self.target_leverage).ok_or(ConfigError::InvalidLeverage(self.target_leverage))
    }

    pub fn trigger_leverage(&self) -> Decimal {
        self.trigger_multiple * self.target_leverage
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.leverage()?;

        if !self.initial_capital.is_positive() {
            return Err(ConfigError::InvalidCapital(self.initial_capital));
        }

        if self.trigger_multiple <= Decimal::ONE {
            return Err(ConfigError::InvalidTrigger(self.trigger_multiple));
        }

        if self.min_transfer.is_negative() {
            return Err(ConfigError::InvalidCapital(self.min_transfer));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid venue {venue}: {reason}")]
    InvalidVenue { venue: String, reason: String },

    #[error("invalid long leg params: {reason}")]
    InvalidLongLeg { reason: String },

    #[error("target leverage must be >= 1, got {0}")]
    InvalidLeverage(Decimal),

    #[error("capital amounts must be positive, got {0}")]
    InvalidCapital(Quote),

    #[error("trigger multiple must be > 1, got {0}")]
    InvalidTrigger(Decimal),
}
