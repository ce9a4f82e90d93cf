// 6.0: capital rebalancing. when a leg's effective leverage drifts past the trigger, move
// exactly enough capital from the other leg to put the breaching leg back on target.
// a transfer, never a resize: sol_quantity and short_contracts don't change here.

use crate::position::PositionState;
use crate::types::{Leg, Leverage, Price, Quote};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RebalanceError {
    #[error("{0} leg has no equity, leverage undefined")]
    NoEquity(Leg),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RebalanceDecision {
    pub breaching_leg: Leg,
    pub source_leg: Leg,
    pub amount: Quote,
    // effective leverage of the breaching leg that fired the trigger
    pub leverage_before: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RebalanceAction {
    Hold,
    Transfer(RebalanceDecision),
    // trigger fired but the transfer is too small to be worth the cost
    BelowMinimum(RebalanceDecision),
}

// 6.1: capital that brings a leg at `current` leverage back to `target`.
// equity needed is notional / target, notional = current * equity, so the gap is
// (current - target) * equity / target
pub fn transfer_to_target(current: Decimal, equity: Quote, target: Leverage) -> Quote {
    equity.mul((current - target.value()) / target.value())
}

// 6.2: once per day, after accrual and only if no liquidation fired
pub fn evaluate(
    state: &PositionState,
    price: Price,
    target: Leverage,
    trigger_leverage: Decimal,
    min_transfer: Quote,
) -> Result<RebalanceAction, RebalanceError> {
    let long = state
        .effective_long_leverage(price)
        .ok_or(RebalanceError::NoEquity(Leg::Long))?;
    let short = state
        .effective_short_leverage(price)
        .ok_or(RebalanceError::NoEquity(Leg::Short))?;

    let breaching = match (long > trigger_leverage, short > trigger_leverage) {
        (false, false) => return Ok(RebalanceAction::Hold),
        (true, false) => Leg::Long,
        (false, true) => Leg::Short,
        // both over: fix the worse one
        (true, true) => {
            if long >= short {
                Leg::Long
            } else {
                Leg::Short
            }
        }
    };

    let leverage_before = match breaching {
        Leg::Long => long,
        Leg::Short => short,
    };
    let amount = transfer_to_target(leverage_before, state.equity(breaching, price), target);

    let decision = RebalanceDecision {
        breaching_leg: breaching,
        source_leg: breaching.opposite(),
        amount,
        leverage_before,
    };

    if amount < min_transfer {
        Ok(RebalanceAction::BelowMinimum(decision))
    } else {
        Ok(RebalanceAction::Transfer(decision))
    }
}

/// Applies the transfer and reports whether any leg is still above the trigger.
pub fn apply(
    state: &mut PositionState,
    decision: &RebalanceDecision,
    transfer_cost: Quote,
    price: Price,
    trigger_leverage: Decimal,
) -> bool {
    state.transfer(decision.source_leg, decision.amount, transfer_cost);

    [Leg::Long, Leg::Short].iter().any(|&leg| {
        state
            .effective_leverage(leg, price)
            .map_or(true, |lev| lev > trigger_leverage)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn p(v: Decimal) -> Price {
        Price::new_unchecked(v)
    }

    fn three_x() -> (PositionState, Leverage) {
        let lev = Leverage::new(dec!(3)).unwrap();
        let pos = PositionState::fresh(Quote::new(dec!(10_000)), lev, p(dec!(100))).unwrap();
        (pos, lev)
    }

    #[test]
    fn transfer_size_formula() {
        let lev = Leverage::new(dec!(3)).unwrap();
        // 6x on 1000 equity = 6000 notional, needs 2000 at 3x
        assert_eq!(transfer_to_target(dec!(6), Quote::new(dec!(1_000)), lev).value(), dec!(1_000));
    }

    #[test]
    fn hold_inside_trigger() {
        let (pos, lev) = three_x();
        let action = evaluate(&pos, p(dec!(110)), lev, dec!(6), Quote::new(dec!(5))).unwrap();
        assert_eq!(action, RebalanceAction::Hold);
    }

    #[test]
    fn short_breach_funded_by_long() {
        let (pos, lev) = three_x();
        // at 125: short eq = 5000 - 150*25 = 1250, notional 18750 -> 15x
        let price = p(dec!(125));
        let action = evaluate(&pos, price, lev, dec!(6), Quote::new(dec!(5))).unwrap();

        let RebalanceAction::Transfer(decision) = action else {
            panic!("expected transfer, got {action:?}");
        };
        assert_eq!(decision.breaching_leg, Leg::Short);
        assert_eq!(decision.source_leg, Leg::Long);
        assert_eq!(decision.leverage_before, dec!(15));
        // needs 18750 / 3 = 6250, has 1250
        assert_eq!(decision.amount.value(), dec!(5_000));
    }

    #[test]
    fn apply_lands_breaching_leg_on_target() {
        let (mut pos, lev) = three_x();
        let price = p(dec!(125));
        let RebalanceAction::Transfer(decision) =
            evaluate(&pos, price, lev, dec!(6), Quote::new(dec!(5))).unwrap()
        else {
            panic!("expected transfer");
        };

        let qty = pos.sol_quantity();
        let contracts = pos.short_contracts();
        let still_over = apply(&mut pos, &decision, Quote::new(dec!(3)), price, dec!(6));

        assert_eq!(pos.effective_short_leverage(price), Some(dec!(3)));
        assert_eq!(pos.sol_quantity(), qty);
        assert_eq!(pos.short_contracts(), contracts);
        // long: 18750 notional on 18750 - 15003 = 3747 equity, about 5x
        assert!(!still_over);
    }

    #[test]
    fn long_breach_funded_by_short() {
        let (pos, lev) = three_x();
        // at 75: long eq = 11250 - 10000 = 1250 -> 9x
        let price = p(dec!(75));
        let RebalanceAction::Transfer(decision) =
            evaluate(&pos, price, lev, dec!(6), Quote::new(dec!(5))).unwrap()
        else {
            panic!("expected transfer");
        };
        assert_eq!(decision.breaching_leg, Leg::Long);
        assert_eq!(decision.source_leg, Leg::Short);
        assert_eq!(decision.amount.value(), dec!(2_500));
    }

    #[test]
    fn tiny_transfer_skipped() {
        let (pos, lev) = three_x();
        // trigger just above target; the gap at 100.1 is a few dollars
        let action = evaluate(&pos, p(dec!(100.1)), lev, dec!(3.001), Quote::new(dec!(50))).unwrap();
        assert!(matches!(action, RebalanceAction::BelowMinimum(_)));
    }

    #[test]
    fn no_equity_is_an_error() {
        let (pos, lev) = three_x();
        let err = evaluate(&pos, p(dec!(140)), lev, dec!(6), Quote::zero()).unwrap_err();
        assert_eq!(err, RebalanceError::NoEquity(Leg::Short));
    }
}
