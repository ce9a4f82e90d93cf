//! Synthetic market data shared by the integration tests.

#![allow(dead_code)]

use basis_core::*;
use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

pub fn date(i: usize) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(i as i64)
}

pub fn p(v: Decimal) -> Price {
    Price::new(v).unwrap()
}

/// Candle with open = close and a symmetric intraday range of `range` (0.02 = +-2%).
pub fn candle(i: usize, close: Decimal, range: Decimal, lend: Decimal, borrow: Decimal) -> DailyObservation {
    DailyObservation {
        date: date(i),
        open: p(close),
        high: p(close * (Decimal::ONE + range)),
        low: p(close * (Decimal::ONE - range)),
        close: p(close),
        lending_rate: lend,
        borrowing_rate: borrow,
    }
}

pub fn series_from_closes(closes: &[Decimal], range: Decimal, lend: Decimal, borrow: Decimal) -> MarketSeries {
    let days = closes
        .iter()
        .enumerate()
        .map(|(i, &c)| candle(i, c, range, lend, borrow))
        .collect();
    MarketSeries::new(days).unwrap()
}

fn linear(from: Decimal, to: Decimal, steps: u32) -> impl Iterator<Item = Decimal> {
    let n = Decimal::from(steps);
    (1..=steps).map(move |i| from + (to - from) * Decimal::from(i) / n)
}

pub const SPIKE_DAY: usize = 61;

/// Annual funding paid to the short over the study path.
pub const STUDY_FUNDING: Decimal = dec!(0.07);

/// 410 closes: 189.44 rallying to 270, a two day pullback to 233, the squeeze to 262.20
/// on the spike day, then the slide to 79.87 (-57.8%).
pub fn study_closes() -> Vec<Decimal> {
    let mut closes = vec![dec!(189.44)];
    closes.extend(linear(dec!(189.44), dec!(270), 58));
    closes.extend(linear(dec!(270), dec!(233), 2));
    closes.push(dec!(262.20));
    closes.extend(linear(dec!(262.20), dec!(79.87), 348));
    closes
}

/// The study path with +-2% candles and an intraday wick to `spike_high` on the spike day.
pub fn study_series(spike_high: Decimal, lend: Decimal, borrow: Decimal) -> MarketSeries {
    let days = study_closes()
        .into_iter()
        .enumerate()
        .map(|(i, c)| {
            let mut day = candle(i, c, dec!(0.02), lend, borrow);
            if i == SPIKE_DAY {
                day.high = p(spike_high);
            }
            day
        })
        .collect();
    MarketSeries::new(days).unwrap()
}

/// Lend 7%, borrow 9%, wick to 285.
pub fn study() -> MarketSeries {
    study_series(dec!(285), dec!(0.07), dec!(0.09))
}

pub fn hyperliquid(series: &MarketSeries, funding: Decimal) -> VenueConfig {
    VenueConfig::hyperliquid(FundingSeries::constant(series, funding))
}

pub fn drift(series: &MarketSeries, funding: Decimal) -> VenueConfig {
    VenueConfig::drift(FundingSeries::constant(series, funding))
}

pub fn run(series: &MarketSeries, venue: &VenueConfig, leverage: Decimal, trigger: Decimal) -> RunResult {
    let params = RunParams::new(leverage, dec!(10_000), trigger);
    run_simulation(series, venue, LongLegParams::default(), params, EngineConfig::default()).unwrap()
}

pub fn close_enough(a: Decimal, b: Decimal, tolerance: Decimal) -> bool {
    (a - b).abs() <= tolerance
}
