//! Property-based tests for the simulation core.
//!
//! These tests verify invariants hold over random price paths and parameters.

mod common;

use basis_core::*;
use common::*;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// Strategies for generating test data
fn leverage_strategy() -> impl Strategy<Value = Decimal> {
    (15i64..=40i64).prop_map(|x| Decimal::new(x, 1)) // 1.5x to 4.0x
}

fn trigger_strategy() -> impl Strategy<Value = Decimal> {
    (12i64..=30i64).prop_map(|x| Decimal::new(x, 1)) // 1.2 to 3.0
}

fn rate_strategy(max_bps: i64) -> impl Strategy<Value = Decimal> {
    (-max_bps..=max_bps).prop_map(|x| Decimal::new(x, 4))
}

fn price_strategy() -> impl Strategy<Value = Decimal> {
    (1_000i64..100_000i64).prop_map(|x| Decimal::new(x, 2)) // $10 to $1,000
}

// daily close-to-close moves in bps
fn moves_strategy() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(-400i64..=400i64, 10..60)
}

fn closes_from_moves(start: Decimal, moves: &[i64]) -> Vec<Decimal> {
    let mut closes = vec![start];
    let mut price = start;
    for &m in moves {
        price = (price * (Decimal::ONE + Decimal::new(m, 4))).round_dp(8);
        closes.push(price);
    }
    closes
}

proptest! {
    /// carry + funding - fees - penalties - drag == net, and the drag matches
    /// the sum of daily price effects
    #[test]
    fn waterfall_reconciles(
        moves in moves_strategy(),
        range_bps in 50i64..=500i64,
        leverage in leverage_strategy(),
        trigger in trigger_strategy(),
        lend in (0i64..=1500i64).prop_map(|x| Decimal::new(x, 4)),
        borrow in (0i64..=2000i64).prop_map(|x| Decimal::new(x, 4)),
        funding in rate_strategy(3000),
    ) {
        let closes = closes_from_moves(dec!(100), &moves);
        let series = series_from_closes(&closes, Decimal::new(range_bps, 4), lend, borrow);
        let venue = hyperliquid(&series, funding);
        let params = RunParams::new(leverage, dec!(10_000), trigger);

        match run_simulation(&series, &venue, LongLegParams::default(), params, EngineConfig::default()) {
            Ok(result) => {
                let w = PnlWaterfall::attribute(&result, dec!(0.000001));
                prop_assert!(w.is_ok(), "waterfall rejected: {:?}", w.err());
                let w = w.unwrap();
                prop_assert!(w.residual().value().abs() < dec!(0.000000001));
                prop_assert_eq!(w.net_return, result.final_equity.sub(result.initial_capital));
            }
            Err(SimulationError::DoubleLiquidation { .. }) | Err(SimulationError::CapitalExhausted { .. }) => {}
            Err(other) => prop_assert!(false, "unexpected failure: {}", other),
        }
    }

    /// A rebalance moves only debt and margin, and puts the breaching leg back on target
    #[test]
    fn rebalance_preserves_sizes(
        leverage in leverage_strategy(),
        entry in price_strategy(),
        move_bps in -4000i64..=4000i64,
        trigger in trigger_strategy(),
    ) {
        let target = Leverage::new(leverage).unwrap();
        let mut pos = PositionState::fresh(Quote::new(dec!(10_000)), target, Price::new_unchecked(entry)).unwrap();
        let price = Price::new_unchecked(entry * (Decimal::ONE + Decimal::new(move_bps, 4)));
        let trigger_leverage = trigger * leverage;

        let Ok(RebalanceAction::Transfer(decision)) =
            rebalance::evaluate(&pos, price, target, trigger_leverage, Quote::zero())
        else {
            return Ok(());
        };

        let qty = pos.sol_quantity();
        let contracts = pos.short_contracts();
        let entry_price = pos.short_entry_price();
        rebalance::apply(&mut pos, &decision, Quote::new(dec!(3)), price, trigger_leverage);

        prop_assert_eq!(pos.sol_quantity(), qty);
        prop_assert_eq!(pos.short_contracts(), contracts);
        prop_assert_eq!(pos.short_entry_price(), entry_price);

        let after = pos.effective_leverage(decision.breaching_leg, price).unwrap();
        prop_assert!((after - leverage).abs() < dec!(0.000000001), "landed at {}", after);
    }

    /// After a reset both legs sit exactly on target leverage with no net exposure
    #[test]
    fn reset_lands_on_target(
        leverage in leverage_strategy(),
        entry in price_strategy(),
        reset_price in price_strategy(),
        equity in (1_000i64..1_000_000i64).prop_map(|x| Decimal::new(x, 2)),
    ) {
        let target = Leverage::new(leverage).unwrap();
        let mut pos = PositionState::fresh(Quote::new(dec!(10_000)), target, Price::new_unchecked(entry)).unwrap();
        pos.charge_fee(Quote::new(dec!(12)));

        let at = Price::new_unchecked(reset_price);
        pos.reset(Quote::new(equity), target, at).unwrap();

        let tolerance = dec!(0.000000001);
        prop_assert!((pos.effective_long_leverage(at).unwrap() - leverage).abs() < tolerance);
        prop_assert!((pos.effective_short_leverage(at).unwrap() - leverage).abs() < tolerance);
        prop_assert_eq!(pos.net_exposure(), Decimal::ZERO);
        prop_assert!((pos.total_equity(at).value() - equity).abs() < tolerance);
        prop_assert_eq!(pos.counters.total_trading_fees.value(), dec!(12));
    }

    /// Equity moves far less than price when nothing but price changes
    #[test]
    fn delta_neutral_bound(
        drift_bps in 50i64..=150i64,
        down in any::<bool>(),
        noise in prop::collection::vec(-50i64..=50i64, 60),
        leverage in (15i64..=25i64).prop_map(|x| Decimal::new(x, 1)),
    ) {
        let drift = if down { -drift_bps } else { drift_bps };
        let moves: Vec<i64> = noise.iter().map(|n| drift + n).collect();
        let closes = closes_from_moves(dec!(150), &moves);
        let series = series_from_closes(&closes, dec!(0.01), Decimal::ZERO, Decimal::ZERO);
        let price_return = series.price_return();
        prop_assume!(price_return.abs() > dec!(0.2));

        let venue = hyperliquid(&series, Decimal::ZERO);
        let result = run(&series, &venue, leverage, dec!(2.5));

        prop_assert_eq!(result.activity.liquidations, 0);
        prop_assert!(
            result.equity_return().abs() < price_return.abs() / dec!(5),
            "equity {} vs price {}", result.equity_return(), price_return
        );
    }

    /// Activity counters agree with the event log when nothing is dropped
    #[test]
    fn counts_match_events(
        moves in moves_strategy(),
        leverage in leverage_strategy(),
        trigger in trigger_strategy(),
    ) {
        let closes = closes_from_moves(dec!(100), &moves);
        let series = series_from_closes(&closes, dec!(0.02), dec!(0.07), dec!(0.09));
        let venue = hyperliquid(&series, dec!(0.10));
        let params = RunParams::new(leverage, dec!(10_000), trigger);

        let Ok(result) = run_simulation(&series, &venue, LongLegParams::default(), params, EngineConfig::default()) else {
            return Ok(());
        };

        let count = |kind: EventKind| count_events(&result.events, kind);
        prop_assert_eq!(count(EventKind::Open), 1);
        prop_assert_eq!(count(EventKind::Close), 1);
        prop_assert_eq!(count(EventKind::Rebalance), result.activity.rebalances);
        prop_assert_eq!(count(EventKind::Liquidation), result.activity.liquidations);
        prop_assert_eq!(count(EventKind::Reopen), result.activity.rotations);
        prop_assert_eq!(result.trace.iter().filter(|d| d.rebalanced).count(), result.activity.rebalances);
    }
}

mod deterministic {
    use super::*;

    #[test]
    fn flat_market_earns_carry_and_funding() {
        let closes = vec![dec!(100); 31];
        let series = series_from_closes(&closes, dec!(0.01), dec!(0.07), dec!(0.09));
        let venue = hyperliquid(&series, dec!(0.10));
        let result = run(&series, &venue, dec!(3), dec!(2));
        let w = PnlWaterfall::attribute(&result, dec!(0.000001)).unwrap();

        assert_eq!(result.activity.rebalances, 0);
        assert_eq!(result.activity.liquidations, 0);
        assert!(w.mark_to_market_drag.value().abs() < dec!(0.000000001));
        assert!(w.carry_income.is_positive());
        assert!(w.funding_income.is_positive());
        // gross roughly matches the naive apy on 30 days
        let apy = net_carry_apy(dec!(0.07), dec!(0.09), dec!(0.10), Leverage::new(dec!(3)).unwrap());
        let naive = apy * dec!(10_000) * dec!(30) / dec!(365);
        assert!((w.gross_income().value() - naive).abs() < dec!(2));
    }

    #[test]
    fn never_trigger_never_rebalances() {
        let closes = closes_from_moves(dec!(100), &[150; 40]);
        let series = series_from_closes(&closes, dec!(0.01), Decimal::ZERO, Decimal::ZERO);
        let venue = hyperliquid(&series, Decimal::ZERO);
        let result = run(&series, &venue, dec!(3), TRIGGER_NEVER);

        assert_eq!(result.activity.rebalances, 0);
        assert_eq!(result.activity.skipped_transfers, 0);
    }

    #[test]
    fn tiny_transfers_skipped_and_counted() {
        let closes = closes_from_moves(dec!(100), &[5; 20]);
        let series = series_from_closes(&closes, dec!(0.001), Decimal::ZERO, Decimal::ZERO);
        let venue = hyperliquid(&series, Decimal::ZERO);
        let mut params = RunParams::new(dec!(3), dec!(10_000), dec!(1.001));
        params.min_transfer = Quote::new(dec!(1_000));

        let result =
            run_simulation(&series, &venue, LongLegParams::default(), params, EngineConfig::default()).unwrap();

        assert_eq!(result.activity.rebalances, 0);
        assert!(result.activity.skipped_transfers > 0);
    }
}
