//! Parameter sweep tests: determinism across execution modes, failure isolation,
//! best-trigger selection and the trigger sensitivity curve.

mod common;

use basis_core::*;
use common::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeMap;

fn small_grid(series: &MarketSeries) -> SweepGrid {
    let mut grid = SweepGrid::standard(vec![hyperliquid(series, STUDY_FUNDING), drift(series, STUDY_FUNDING)]);
    grid.leverages = vec![dec!(2), dec!(3)];
    grid.trigger_multiples = vec![dec!(1.5), dec!(2), TRIGGER_NEVER];
    grid
}

/// Funding present for every day except one in the middle.
fn gappy_venue(series: &MarketSeries) -> VenueConfig {
    let rates: BTreeMap<_, _> = series
        .days()
        .iter()
        .filter(|d| d.date != date(100))
        .map(|d| (d.date, STUDY_FUNDING))
        .collect();
    let mut venue = VenueConfig::hyperliquid(FundingSeries::new(rates));
    venue.name = "gappy".to_string();
    venue
}

#[test]
fn parallel_matches_sequential() {
    let series = study();
    let grid = small_grid(&series);

    let parallel = ParameterSweep::new(EngineConfig::default()).run(&series, &grid).unwrap();
    let sequential = ParameterSweep::new(EngineConfig::default())
        .with_parallelism(false)
        .run(&series, &grid)
        .unwrap();

    assert_eq!(parallel.len(), grid.size());
    assert_eq!(parallel.len(), sequential.len());

    for ((ca, a), (cb, b)) in parallel.cells.iter().zip(sequential.cells.iter()) {
        assert_eq!(ca, cb);
        match (a, b) {
            (Ok(a), Ok(b)) => assert_eq!(a, b),
            (Err(a), Err(b)) => assert_eq!(a.to_string(), b.to_string()),
            _ => panic!("outcome differs at {:?}", ca),
        }
    }
}

#[test]
fn failing_cells_do_not_poison_the_grid() {
    let series = study();
    let mut grid = SweepGrid::standard(vec![hyperliquid(&series, STUDY_FUNDING), gappy_venue(&series)]);
    grid.leverages = vec![dec!(2)];
    grid.trigger_multiples = vec![dec!(0.5), dec!(2.5)];

    let report = ParameterSweep::new(EngineConfig::default()).run(&series, &grid).unwrap();
    assert_eq!(report.len(), 4);

    let coord = |trigger: Decimal, venue: &str| GridCoord {
        leverage: dec!(2),
        capital: Quote::new(dec!(10_000)),
        trigger_multiple: trigger,
        venue: venue.to_string(),
    };

    assert!(matches!(
        report.get(&coord(dec!(0.5), "hyperliquid")),
        Some(Err(SimulationError::Config(ConfigError::InvalidTrigger(_))))
    ));
    assert!(matches!(
        report.get(&coord(dec!(2.5), "gappy")),
        Some(Err(SimulationError::MarketData(_)))
    ));

    let ok = report.get(&coord(dec!(2.5), "hyperliquid"));
    assert!(matches!(ok, Some(Ok(s)) if s.liquidations == 0 && s.rebalances > 0));

    assert_eq!(report.successes().count(), 1);
    assert_eq!(report.failures().count(), 3);
}

#[test]
fn best_cell_has_the_highest_return_in_its_group() {
    let series = study();
    let grid = small_grid(&series);
    let report = ParameterSweep::new(EngineConfig::default()).run(&series, &grid).unwrap();
    let best = report.best_by_leverage_and_venue();

    // 2 leverages x 2 venues
    assert_eq!(best.len(), 4);

    for ((leverage, venue), cell) in &best {
        assert_eq!(&cell.coord.leverage, leverage);
        assert_eq!(&cell.coord.venue, venue);
        let top = report
            .successes()
            .filter(|(c, _)| &c.leverage == leverage && &c.venue == venue)
            .map(|(_, s)| s.annualized_return())
            .max()
            .unwrap();
        assert_eq!(cell.summary.annualized_return(), top);
    }
}

#[test]
fn summaries_carry_the_cell_parameters() {
    let series = study();
    let grid = small_grid(&series);
    let report = ParameterSweep::new(EngineConfig::default()).run(&series, &grid).unwrap();

    for (coord, summary) in report.successes() {
        assert_eq!(summary.target_leverage, coord.leverage);
        assert_eq!(summary.trigger_multiple, coord.trigger_multiple);
        assert_eq!(summary.venue, coord.venue);
        assert_eq!(summary.days, series.len());
        assert!(summary.max_drawdown <= Decimal::ZERO);
    }
}

mod trigger_sensitivity {
    use super::*;

    fn rows() -> Vec<SensitivityRow> {
        let series = study();
        let venue = hyperliquid(&series, STUDY_FUNDING);
        let triggers = [dec!(1.1), dec!(1.25), dec!(1.5), dec!(2), dec!(2.5), dec!(3), TRIGGER_NEVER];
        basis_core::trigger_sensitivity(
            &series,
            &venue,
            &LongLegParams::default(),
            &RunParams::new(dec!(3), dec!(10_000), dec!(2)),
            &triggers,
            &EngineConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn never_rebalancing_liquidates_most() {
        let rows = rows();
        assert_eq!(rows.len(), 7);

        let never = rows.last().unwrap();
        assert_eq!(never.trigger_multiple, TRIGGER_NEVER);
        assert_eq!(never.rebalances, 0);
        assert_eq!(never.liquidations, 4);

        // at most the spike gets through once capital is being moved
        for row in &rows[..rows.len() - 1] {
            assert!(row.liquidations <= 1, "trigger {}", row.trigger_multiple);
            assert!(row.rebalances > 0);
        }
    }

    #[test]
    fn tighter_triggers_rebalance_more() {
        let rows = rows();
        let most = rows.iter().map(|r| r.rebalances).max().unwrap();
        assert_eq!(rows[0].rebalances, most);
        // 1.1x rebalances far more often than 2x
        assert!(rows[0].rebalances > 5 * rows[3].rebalances);
        assert!(rows[3].rebalances >= rows[5].rebalances);
    }

    #[test]
    fn rows_use_the_given_long_leg_and_min_transfer() {
        let series = study();
        let venue = hyperliquid(&series, STUDY_FUNDING);
        let long = LongLegParams {
            open_fee_rate: dec!(0.003),
            operation_cost: Quote::new(dec!(25)),
        };
        let mut params = RunParams::new(dec!(3), dec!(10_000), dec!(2));
        params.min_transfer = Quote::new(dec!(400));
        let triggers = [dec!(1.5), dec!(3)];

        let rows =
            basis_core::trigger_sensitivity(&series, &venue, &long, &params, &triggers, &EngineConfig::default())
                .unwrap();
        assert_eq!(rows.len(), 2);

        for row in &rows {
            let direct = RunParams {
                trigger_multiple: row.trigger_multiple,
                ..params.clone()
            };
            let result =
                run_simulation(&series, &venue, long.clone(), direct, EngineConfig::default()).unwrap();
            let summary = summarize(&result, EngineConfig::default().waterfall_epsilon).unwrap();
            assert_eq!(row.liquidations, summary.liquidations);
            assert_eq!(row.rebalances, summary.rebalances);
            assert_eq!(row.annualized_return, summary.annualized_return());
        }

        // dearer opens cost return against the default long leg
        let cheap = basis_core::trigger_sensitivity(
            &series,
            &venue,
            &LongLegParams::default(),
            &params,
            &[dec!(3)],
            &EngineConfig::default(),
        )
        .unwrap();
        assert!(rows[1].annualized_return < cheap[0].annualized_return);
    }
}

#[test]
fn duplicate_venue_names_are_rejected_not_merged() {
    let series = study();
    let mut grid = small_grid(&series);
    let mut twin = drift(&series, dec!(0.20));
    twin.name = "hyperliquid".to_string();
    grid.venues.push(twin);

    let err = ParameterSweep::new(EngineConfig::default())
        .run(&series, &grid)
        .unwrap_err();
    assert_eq!(err, SweepError::DuplicateVenue("hyperliquid".to_string()));

    grid.venues.pop();
    let report = ParameterSweep::new(EngineConfig::default()).run(&series, &grid).unwrap();
    assert_eq!(report.len(), grid.size());
}
