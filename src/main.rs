//! Basis position simulator.
//!
//! Replays a daily series through the simulator and prints the scenarios the
//! model was built to answer: what a liquidation costs, what leverage survives,
//! how the venues compare, and where the rebalance trigger should sit.
//!
//! Usage: `basis-sim [series.csv]`. The CSV has the header
//! `date,open,high,low,close,lending_rate,borrowing_rate,funding_rate`. Without
//! one, a synthetic 410-day path is used: a rally to a spike, then a long slide.
//! Set `RUST_LOG=basis_core=debug` to see every rebalance and liquidation.

use anyhow::{Context, Result};
use basis_core::*;
use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::fs::File;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let (series, funding) = match std::env::args().nth(1) {
        Some(path) => {
            let file = File::open(&path).with_context(|| format!("opening {path}"))?;
            MarketSeries::from_csv_reader(file).with_context(|| format!("reading {path}"))?
        }
        None => synthetic_series()?,
    };

    println!("Delta-Neutral Basis Simulation");
    println!(
        "{} to {} ({} days), price {} -> {} ({:.1}%)\n",
        series.start_date(),
        series.end_date(),
        series.len(),
        series.first().close,
        series.last().close,
        series.price_return() * Decimal::ONE_HUNDRED
    );

    let hyperliquid = VenueConfig::hyperliquid(funding.clone());
    let drift = VenueConfig::drift(funding);

    scenario_1_liquidation(&series, &hyperliquid)?;
    scenario_2_safe_leverage(&series, &hyperliquid)?;
    scenario_3_venue_comparison(&series, &[&hyperliquid, &drift])?;
    scenario_4_trigger_sensitivity(&series, &hyperliquid)?;
    scenario_5_sweep(&series, vec![hyperliquid.clone(), drift.clone()])?;
    scenario_6_breakeven(&series, &[hyperliquid, drift])?;

    println!("\nAll simulations completed.");
    Ok(())
}

fn run(series: &MarketSeries, venue: &VenueConfig, leverage: Decimal, trigger: Decimal) -> Result<RunSummary> {
    let config = EngineConfig::default();
    let params = RunParams::new(leverage, dec!(10_000), trigger);
    let result = run_simulation(series, venue, LongLegParams::default(), params, config.clone())?;
    Ok(summarize(&result, config.waterfall_epsilon)?)
}

fn print_waterfall(s: &RunSummary) {
    let w = &s.waterfall;
    println!("    carry income        {:>12.2}", w.carry_income.value());
    println!("    funding income      {:>12.2}", w.funding_income.value());
    println!("    trading fees        {:>12.2}", -w.trading_fees.value());
    println!("    liquidation penalty {:>12.2}", -w.liquidation_penalties.value());
    println!("    mark-to-market drag {:>12.2}", -w.mark_to_market_drag.value());
    println!("    net return          {:>12.2}", w.net_return.value());
    println!(
        "    annualized {:.2}%, max drawdown {:.2}%",
        w.annualized_return * Decimal::ONE_HUNDRED,
        s.max_drawdown * Decimal::ONE_HUNDRED
    );
}

/// 3x with a 2x trigger: the spike liquidates the short leg once.
fn scenario_1_liquidation(series: &MarketSeries, venue: &VenueConfig) -> Result<()> {
    println!("Scenario 1: 3x Leverage, Rebalance at 6x\n");

    let config = EngineConfig::default();
    let params = RunParams::new(dec!(3), dec!(10_000), dec!(2));
    let sim = Simulation::new(series, venue, LongLegParams::default(), params, config.clone())?;

    let mm = venue.maintenance_margin_rate;
    if let (Some(long), Some(short)) = (
        liquidation_price(sim.state(), Leg::Long, mm),
        liquidation_price(sim.state(), Leg::Short, mm),
    ) {
        println!(
            "  opened at {}: long liquidates below {:.2}, short above {:.2}",
            series.first().close,
            long.value(),
            short.value()
        );
    }

    let result = sim.run()?;

    for event in &result.events {
        match &event.payload {
            EventPayload::Liquidation(e) => println!(
                "  {} LIQUIDATION {} leg at {} (extreme {}), penalty ${:.2}",
                event.date,
                e.leg,
                e.price,
                e.trigger_price,
                e.penalty.value()
            ),
            EventPayload::Reopen(e) => println!(
                "  {} REOPEN {:.2} per leg, fees ${:.2}",
                event.date,
                e.notional_per_leg.value(),
                e.fees.total().value()
            ),
            _ => {}
        }
    }

    let summary = summarize(&result, config.waterfall_epsilon)?;
    println!(
        "  {} rebalances, {} liquidations, final equity ${:.2}",
        summary.rebalances,
        summary.liquidations,
        summary.final_equity.value()
    );
    print_waterfall(&summary);
    println!();
    Ok(())
}

/// 2x with a 2.5x trigger rides the same path without a liquidation.
fn scenario_2_safe_leverage(series: &MarketSeries, venue: &VenueConfig) -> Result<()> {
    println!("Scenario 2: 2x Leverage, Rebalance at 5x\n");

    let summary = run(series, venue, dec!(2), dec!(2.5))?;
    println!(
        "  {} rebalances, {} liquidations, equity {:.2}% vs price {:.2}%",
        summary.rebalances,
        summary.liquidations,
        summary.equity_return * Decimal::ONE_HUNDRED,
        summary.price_return * Decimal::ONE_HUNDRED
    );
    print_waterfall(&summary);
    println!();
    Ok(())
}

/// Same position on both venues. Only the short-leg parameters differ.
fn scenario_3_venue_comparison(series: &MarketSeries, venues: &[&VenueConfig]) -> Result<()> {
    println!("Scenario 3: Venue Comparison at 3x\n");

    let day0 = series.first();
    for venue in venues {
        let funding = venue.funding.rate_on(day0.date).unwrap_or(Decimal::ZERO);
        let leverage = Leverage::new(dec!(3)).context("3x is a valid leverage")?;
        let naive = net_carry_apy(day0.lending_rate, day0.borrowing_rate, funding, leverage);

        let summary = run(series, venue, dec!(3), dec!(2))?;
        println!(
            "  {:<12} naive apy {:>6.2}%  realized {:>7.2}%  liquidations {}  penalties ${:.2}",
            venue.name,
            naive * Decimal::ONE_HUNDRED,
            summary.annualized_return() * Decimal::ONE_HUNDRED,
            summary.liquidations,
            summary.waterfall.liquidation_penalties.value()
        );
    }
    println!();
    Ok(())
}

fn scenario_4_trigger_sensitivity(series: &MarketSeries, venue: &VenueConfig) -> Result<()> {
    println!("Scenario 4: Trigger Sensitivity at 3x\n");

    let triggers = [dec!(1.1), dec!(1.5), dec!(2), dec!(3), TRIGGER_NEVER];
    let rows = trigger_sensitivity(
        series,
        venue,
        &LongLegParams::default(),
        &RunParams::new(dec!(3), dec!(10_000), dec!(2)),
        &triggers,
        &EngineConfig::default(),
    )?;

    println!("  {:>8}  {:>5}  {:>5}  {:>9}", "trigger", "liqs", "rebal", "annual");
    for row in rows {
        let label = if row.trigger_multiple == TRIGGER_NEVER {
            "never".to_string()
        } else {
            format!("{}x", row.trigger_multiple)
        };
        println!(
            "  {:>8}  {:>5}  {:>5}  {:>8.2}%",
            label,
            row.liquidations,
            row.rebalances,
            row.annualized_return * Decimal::ONE_HUNDRED
        );
    }
    println!();
    Ok(())
}

fn scenario_5_sweep(series: &MarketSeries, venues: Vec<VenueConfig>) -> Result<()> {
    println!("Scenario 5: Best Trigger per Leverage and Venue\n");

    let grid = SweepGrid::standard(venues);
    let report = ParameterSweep::new(EngineConfig::default()).run(series, &grid)?;

    for ((leverage, venue), best) in report.best_by_leverage_and_venue() {
        println!(
            "  {:>4}x {:<12} trigger {:>6}  annual {:>7.2}%  liquidations {}",
            leverage,
            venue,
            best.coord.trigger_multiple,
            best.summary.annualized_return() * Decimal::ONE_HUNDRED,
            best.summary.liquidations
        );
    }
    for (coord, err) in report.failures() {
        println!("  {}x {} trigger {}: {}", coord.leverage, coord.venue, coord.trigger_multiple, err);
    }
    println!();
    Ok(())
}

/// Funding needed to cover fees at the series' average rates, and how far price can
/// run before a fresh position loses a leg.
fn scenario_6_breakeven(series: &MarketSeries, venues: &[VenueConfig]) -> Result<()> {
    println!("Scenario 6: Breakeven Funding and Liquidation Distance\n");

    let n = Decimal::from(series.len());
    let lend = series.days().iter().map(|d| d.lending_rate).sum::<Decimal>() / n;
    let borrow = series.days().iter().map(|d| d.borrowing_rate).sum::<Decimal>() / n;
    let leverages = [dec!(2), dec!(3), dec!(4)];

    let rows = breakeven_table(
        lend,
        borrow,
        Quote::new(dec!(10_000)),
        venues,
        &leverages,
        &LongLegParams::default(),
        &BreakevenAssumptions::default(),
    )?;
    println!("  {:<12} {:>4}  {:>9}  {:>9}", "venue", "lev", "drag", "funding");
    for row in &rows {
        println!(
            "  {:<12} {:>3}x  {:>8.3}%  {:>8.2}%",
            row.venue,
            row.leverage,
            row.total_drag() * Decimal::ONE_HUNDRED,
            row.funding_rate * Decimal::ONE_HUNDRED
        );
    }

    println!();
    for row in move_limit_table(venues, &leverages)? {
        let (leg, _) = row.limit.binding();
        println!(
            "  {:<12} {:>3}x  long -{:.1}%  short +{:.1}%  ({} goes first)",
            row.venue,
            row.limit.leverage,
            row.limit.long_drop * Decimal::ONE_HUNDRED,
            row.limit.short_rise * Decimal::ONE_HUNDRED,
            leg
        );
    }
    Ok(())
}

/// 410 days: 189.44 rallying to 270, a pullback to 233, a wick to 285 on the day the
/// close prints 262.20, then a slide to 79.87. Lend 7%, borrow 9%, funding 7%.
fn synthetic_series() -> Result<(MarketSeries, FundingSeries)> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).context("valid start date")?;

    let mut closes = vec![dec!(189.44)];
    closes.extend(linear(dec!(189.44), dec!(270), 58));
    closes.extend(linear(dec!(270), dec!(233), 2));
    closes.push(dec!(262.20));
    closes.extend(linear(dec!(262.20), dec!(79.87), 348));

    let mut days = Vec::with_capacity(closes.len());
    for (i, close) in closes.into_iter().enumerate() {
        let high = if i == 61 { dec!(285) } else { close * dec!(1.02) };
        let price = |v: Decimal| Price::new(v).context("synthetic prices are positive");
        days.push(DailyObservation {
            date: start + Duration::days(i as i64),
            open: price(close)?,
            high: price(high)?,
            low: price(close * dec!(0.98))?,
            close: price(close)?,
            lending_rate: dec!(0.07),
            borrowing_rate: dec!(0.09),
        });
    }

    let series = MarketSeries::new(days)?;
    let funding = FundingSeries::constant(&series, dec!(0.07));
    Ok((series, funding))
}

fn linear(from: Decimal, to: Decimal, steps: u32) -> impl Iterator<Item = Decimal> {
    let n = Decimal::from(steps);
    (1..=steps).map(move |i| from + (to - from) * Decimal::from(i) / n)
}
