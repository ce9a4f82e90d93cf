// 1.0: all the primitives live here. nothing in the simulator works without these types.
// prices, money, leverage, fee rates, leg tags. each is a newtype so the compiler catches type mixups.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;

pub const DAYS_PER_YEAR: Decimal = dec!(365);

// Long = collateralized spot leg (lend SOL, borrow USDC). Short = perp leg on the venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Leg {
    Long,
    Short,
}

impl Leg {
    pub fn opposite(&self) -> Self {
        match self {
            Leg::Long => Leg::Short,
            Leg::Short => Leg::Long,
        }
    }
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Leg::Long => write!(f, "long"),
            Leg::Short => write!(f, "short"),
        }
    }
}

// 1.1: price in quote currency per unit of base. must be positive, also when deserialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl TryFrom<Decimal> for Price {
    type Error = String;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("price must be positive, got {value}"))
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

impl Price {
    #[must_use]
    pub fn new(value: Decimal) -> Option<Self> {
        if value > Decimal::ZERO {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn new_unchecked(value: Decimal) -> Self {
        debug_assert!(value > Decimal::ZERO);
        Self(value)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    // fractional change from self to later. 189.44 -> 79.87 is -0.578
    pub fn return_to(&self, later: Price) -> Decimal {
        (later.0 - self.0) / self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 1.2: quote currency amount (USDC). equity, debt, margin, fees, pnl all use this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Quote(Decimal);

impl Quote {
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    // floor at zero. penalties never apply to negative equity.
    pub fn floor_zero(&self) -> Self {
        Self(self.0.max(Decimal::ZERO))
    }

    pub fn add(&self, other: Quote) -> Self {
        Self(self.0 + other.0)
    }

    pub fn sub(&self, other: Quote) -> Self {
        Self(self.0 - other.0)
    }

    pub fn mul(&self, factor: Decimal) -> Self {
        Self(self.0 * factor)
    }

    pub fn half(&self) -> Self {
        Self(self.0 / dec!(2))
    }

    pub fn negate(&self) -> Self {
        Self(-self.0)
    }
}

impl fmt::Display for Quote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialOrd for Quote {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Quote {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl Sum for Quote {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, q| acc.add(q))
    }
}

impl<'a> Sum<&'a Quote> for Quote {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, q| acc.add(*q))
    }
}

// 1.3: leverage multiplier. must be >= 1x.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Leverage(Decimal);

impl TryFrom<Decimal> for Leverage {
    type Error = String;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("leverage must be at least 1x, got {value}"))
    }
}

impl From<Leverage> for Decimal {
    fn from(leverage: Leverage) -> Self {
        leverage.0
    }
}

impl Leverage {
    #[must_use]
    pub fn new(value: Decimal) -> Option<Self> {
        if value >= Decimal::ONE {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    // 3x on $5k of equity borrows $10k against $15k of SOL
    pub fn debt_fraction(&self) -> Decimal {
        self.0 - Decimal::ONE
    }
}

impl fmt::Display for Leverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.0)
    }
}

// 1.4: basis points. 100 bps = 1%. fractional bps allowed (3.5 bps taker).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bps(Decimal);

impl Bps {
    pub fn new(bps: Decimal) -> Self {
        Self(bps)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn as_fraction(&self) -> Decimal {
        self.0 / dec!(10_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn leverage_debt_fraction() {
        let lev_3x = Leverage::new(dec!(3)).unwrap();
        assert_eq!(lev_3x.debt_fraction(), dec!(2));
        assert!(Leverage::new(dec!(0.5)).is_none());
    }

    #[test]
    fn bps_conversion() {
        assert_eq!(Bps::new(dec!(100)).as_fraction(), dec!(0.01)); // 1%
        assert_eq!(Bps::new(dec!(3.5)).as_fraction(), dec!(0.00035));
    }

    #[test]
    fn price_rejects_non_positive() {
        assert!(Price::new(Decimal::ZERO).is_none());
        assert!(Price::new(dec!(-1)).is_none());
        let p = Price::new(dec!(200)).unwrap();
        assert_eq!(p.return_to(Price::new_unchecked(dec!(100))), dec!(-0.5));
    }

    #[test]
    fn deserialize_rejects_what_new_rejects() {
        assert!(serde_json::from_str::<Price>("\"0\"").is_err());
        assert!(serde_json::from_str::<Price>("\"-3.5\"").is_err());
        assert_eq!(serde_json::from_str::<Price>("\"189.44\"").unwrap().value(), dec!(189.44));
        assert!(serde_json::from_str::<Leverage>("\"0.5\"").is_err());

        let lev = Leverage::new(dec!(3)).unwrap();
        let back: Leverage = serde_json::from_str(&serde_json::to_string(&lev).unwrap()).unwrap();
        assert_eq!(back, lev);
    }

    #[test]
    fn quote_floor_and_sum() {
        assert_eq!(Quote::new(dec!(-12)).floor_zero(), Quote::zero());
        let total: Quote = [Quote::new(dec!(1)), Quote::new(dec!(2.5))].iter().sum();
        assert_eq!(total.value(), dec!(3.5));
    }
}
