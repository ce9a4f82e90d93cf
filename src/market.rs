//! Daily market data consumed by the simulator.
//!
//! A [`MarketSeries`] is an aligned, gap-free run of daily observations: spot
//! OHLC for the base asset plus the long leg's lending and borrowing rates.
//! Short-leg funding lives in a per-venue [`FundingSeries`] so the same price
//! path can be replayed against several venues.
//!
//! Construction is the only place data quality is checked. A missing date or a
//! malformed candle is rejected here, never interpolated, so the daily fold can
//! assume every index it touches is present.

use crate::types::Price;
use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;

#[derive(Debug, Clone, thiserror::Error)]
pub enum MarketDataError {
    #[error("market series is empty")]
    Empty,

    #[error("date {date} does not follow {previous}")]
    NonIncreasingDate { previous: NaiveDate, date: NaiveDate },

    #[error("gap in market series: {missing} is missing")]
    MissingDate { missing: NaiveDate },

    #[error("malformed candle on {date}: {reason}")]
    MalformedCandle { date: NaiveDate, reason: String },

    #[error("funding series for {venue} does not cover {missing}")]
    FundingGap { venue: String, missing: NaiveDate },

    #[error("csv error: {0}")]
    Csv(String),
}

impl From<csv::Error> for MarketDataError {
    fn from(e: csv::Error) -> Self {
        MarketDataError::Csv(e.to_string())
    }
}

/// One calendar day of spot prices and long-leg rates. Rates are annualized
/// fractions (0.07 = 7% APR).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyObservation {
    pub date: NaiveDate,
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    pub lending_rate: Decimal,
    pub borrowing_rate: Decimal,
}

impl DailyObservation {
    /// Rejects non-positive prices and a range that does not contain open and close.
    pub fn validate(&self) -> Result<(), MarketDataError> {
        let malformed = |reason: &str| MarketDataError::MalformedCandle {
            date: self.date,
            reason: reason.to_string(),
        };

        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| p.value() <= Decimal::ZERO) {
            return Err(malformed("non-positive price"));
        }
        if self.low > self.high {
            return Err(malformed("low above high"));
        }
        if self.close < self.low || self.close > self.high {
            return Err(malformed("close outside low/high range"));
        }
        if self.open < self.low || self.open > self.high {
            return Err(malformed("open outside low/high range"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "Vec<DailyObservation>", into = "Vec<DailyObservation>")]
pub struct MarketSeries {
    days: Vec<DailyObservation>,
}

impl TryFrom<Vec<DailyObservation>> for MarketSeries {
    type Error = MarketDataError;

    fn try_from(days: Vec<DailyObservation>) -> Result<Self, Self::Error> {
        Self::new(days)
    }
}

impl From<MarketSeries> for Vec<DailyObservation> {
    fn from(series: MarketSeries) -> Self {
        series.days
    }
}

impl MarketSeries {
    pub fn new(days: Vec<DailyObservation>) -> Result<Self, MarketDataError> {
        let first = days.first().ok_or(MarketDataError::Empty)?;
        first.validate()?;

        for pair in days.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            next.validate()?;

            if next.date <= prev.date {
                return Err(MarketDataError::NonIncreasingDate {
                    previous: prev.date,
                    date: next.date,
                });
            }
            let expected = prev.date + Duration::days(1);
            if next.date != expected {
                return Err(MarketDataError::MissingDate { missing: expected });
            }
        }

        Ok(Self { days })
    }

    pub fn days(&self) -> &[DailyObservation] {
        &self.days
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn first(&self) -> &DailyObservation {
        &self.days[0]
    }

    pub fn last(&self) -> &DailyObservation {
        &self.days[self.days.len() - 1]
    }

    pub fn start_date(&self) -> NaiveDate {
        self.first().date
    }

    pub fn end_date(&self) -> NaiveDate {
        self.last().date
    }

    pub fn price_return(&self) -> Decimal {
        self.first().close.return_to(self.last().close)
    }

    /// Reads an already-aligned CSV with header
    /// `date,open,high,low,close,lending_rate,borrowing_rate,funding_rate`.
    /// The funding column becomes the returned [`FundingSeries`].
    pub fn from_csv_reader<R: io::Read>(
        reader: R,
    ) -> Result<(MarketSeries, FundingSeries), MarketDataError> {
        let mut rdr = csv::Reader::from_reader(reader);
        let mut days = Vec::new();
        let mut funding = BTreeMap::new();

        for row in rdr.deserialize::<CsvRow>() {
            let row = row?;
            let price = |v: Decimal, field: &str| {
                Price::new(v).ok_or_else(|| MarketDataError::MalformedCandle {
                    date: row.date,
                    reason: format!("non-positive {field}"),
                })
            };

            days.push(DailyObservation {
                date: row.date,
                open: price(row.open, "open")?,
                high: price(row.high, "high")?,
                low: price(row.low, "low")?,
                close: price(row.close, "close")?,
                lending_rate: row.lending_rate,
                borrowing_rate: row.borrowing_rate,
            });
            funding.insert(row.date, row.funding_rate);
        }

        Ok((MarketSeries::new(days)?, FundingSeries::new(funding)))
    }
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    date: NaiveDate,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    lending_rate: Decimal,
    borrowing_rate: Decimal,
    funding_rate: Decimal,
}

/// Annualized short-leg funding rate per date for one venue. Positive means
/// shorts receive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FundingSeries {
    rates: BTreeMap<NaiveDate, Decimal>,
}

impl FundingSeries {
    pub fn new(rates: BTreeMap<NaiveDate, Decimal>) -> Self {
        Self { rates }
    }

    pub fn constant(series: &MarketSeries, rate: Decimal) -> Self {
        Self::new(series.days().iter().map(|d| (d.date, rate)).collect())
    }

    pub fn rate_on(&self, date: NaiveDate) -> Option<Decimal> {
        self.rates.get(&date).copied()
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// Rates aligned index-for-index with `series`. Fails on the first date the
    /// venue has no rate for.
    pub fn align_to(
        &self,
        series: &MarketSeries,
        venue: &str,
    ) -> Result<Vec<Decimal>, MarketDataError> {
        series
            .days()
            .iter()
            .map(|d| {
                self.rate_on(d.date).ok_or_else(|| MarketDataError::FundingGap {
                    venue: venue.to_string(),
                    missing: d.date,
                })
            })
            .collect()
    }
}
