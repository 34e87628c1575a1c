//! Constant-Product AMM Engine
//!
//! Applies `reserve_a * reserve_b = k` to a hypothetical trade and reports the
//! resulting pool state, output amount and price impact. The engine is a pure
//! function of its inputs: the caller's pool is never mutated.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

use crate::config::BPS_DENOMINATOR;
use crate::error::{Result, SimError};
use crate::pools::{Asset, PoolState, TradeRequest};

/// Result of applying one trade to a pool
#[derive(Debug, Clone, PartialEq)]
pub struct TradeOutcome {
    /// Pool after the trade (independent copy)
    pub new_state: PoolState,
    /// Output asset received
    pub amount_out: Decimal,
    /// (execution - spot) / spot * 100, negative when the input asset cheapens
    pub price_impact_pct: Decimal,
    /// Portion of amount_in withheld as fee (leaves the pool)
    pub fee_paid: Decimal,
    /// Output per input before the trade
    pub spot_price: Decimal,
    /// Output per input actually received
    pub execution_price: Decimal,
}

/// Constant-product simulator with an optional input fee
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmmEngine {
    fee_bps: u32,
}

impl Default for AmmEngine {
    fn default() -> Self {
        Self { fee_bps: 0 }
    }
}

impl AmmEngine {
    pub fn new(fee_bps: u32) -> Result<Self> {
        if fee_bps >= BPS_DENOMINATOR {
            return Err(SimError::InvalidInput(format!(
                "fee must be below {} bps, got {}",
                BPS_DENOMINATOR, fee_bps
            )));
        }
        Ok(Self { fee_bps })
    }

    pub fn fee_bps(&self) -> u32 {
        self.fee_bps
    }

    /// Simulate `trade` against `pool`
    ///
    /// For A→B: `rA' = rA + in`, `out = rB * in / rA'`, `rB' = rB - out`, which
    /// keeps `rA' * rB' == rA * rB`. B→A is the mirror image. The fee is taken off the input before it
    /// reaches the curve, so `rA' * rB' == k` holds for any fee.
    pub fn simulate(&self, pool: &PoolState, trade: &TradeRequest) -> Result<TradeOutcome> {
        pool.validate()?;

        let amount_in = trade.amount_in();
        if amount_in <= Decimal::ZERO {
            return Err(SimError::InvalidInput(format!(
                "trade amount must be positive, got {}",
                amount_in
            )));
        }

        let direction = trade.direction();
        let input = direction.input();
        let reserve_in = pool.reserve(input);
        let reserve_out = pool.reserve(direction.output());

        let fee_paid = amount_in
            .checked_mul(Decimal::from(self.fee_bps))
            .and_then(|n| n.checked_div(Decimal::from(BPS_DENOMINATOR)))
            .ok_or_else(|| overflow("fee", amount_in))?;
        let effective_in = amount_in - fee_paid;

        let new_reserve_in = reserve_in
            .checked_add(effective_in)
            .ok_or_else(|| overflow("input reserve", amount_in))?;
        if new_reserve_in == reserve_in {
            return Err(below_precision(pool, input, amount_in));
        }

        // out = rOut * in / (rIn + in), divided first so k = rIn * rOut is never formed
        let amount_out = effective_in
            .checked_div(new_reserve_in)
            .and_then(|share| reserve_out.checked_mul(share))
            .ok_or_else(|| overflow("output amount", amount_in))?;
        if amount_out <= Decimal::ZERO {
            return Err(below_precision(pool, input, amount_in));
        }

        // Decimal precision bottoms out at 1e-28; a zero here would mean a drained pool
        let new_reserve_out = reserve_out - amount_out;
        if new_reserve_out <= Decimal::ZERO {
            return Err(SimError::InvalidInput(format!(
                "trade of {} {} exceeds the precision of pool {}",
                amount_in,
                pool.symbol(input),
                pool.address()
            )));
        }

        let spot_price = reserve_out
            .checked_div(reserve_in)
            .ok_or_else(|| overflow("spot price", amount_in))?;
        let execution_price = amount_out
            .checked_div(amount_in)
            .ok_or_else(|| overflow("execution price", amount_in))?;
        let price_impact_pct = (execution_price - spot_price)
            .checked_div(spot_price)
            .and_then(|r| r.checked_mul(dec!(100)))
            .ok_or_else(|| overflow("price impact", amount_in))?;

        let new_state = match input {
            Asset::A => pool.with_reserves(new_reserve_in, new_reserve_out),
            Asset::B => pool.with_reserves(new_reserve_out, new_reserve_in),
        };

        debug!(
            pool = pool.address(),
            %direction,
            %amount_in,
            %amount_out,
            %price_impact_pct,
            "simulated trade"
        );

        Ok(TradeOutcome {
            new_state,
            amount_out,
            price_impact_pct,
            fee_paid,
            spot_price,
            execution_price,
        })
    }
}

fn below_precision(pool: &PoolState, input: Asset, amount_in: Decimal) -> SimError {
    SimError::InvalidInput(format!(
        "trade of {} {} is below the precision of pool {}",
        amount_in,
        pool.symbol(input),
        pool.address()
    ))
}

fn overflow(what: &str, amount_in: Decimal) -> SimError {
    SimError::InvalidInput(format!("{} overflows for trade amount {}", what, amount_in))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pools::TradeDirection;

    fn pool() -> PoolState {
        PoolState::new("0xpool", "HEX", "WPLS", dec!(1000000), dec!(500)).unwrap()
    }

    fn trade(direction: TradeDirection, amount: Decimal) -> TradeRequest {
        TradeRequest::new(direction, amount).unwrap()
    }

    fn assert_k_conserved(before: &PoolState, after: &PoolState) {
        let drift = (after.k_ratio(before).unwrap() - Decimal::ONE).abs();
        assert!(drift < dec!(0.000000001), "k drifted by {}", drift);
    }

    #[test]
    fn test_reference_scenario() {
        let pool = pool();
        let outcome = AmmEngine::default()
            .simulate(&pool, &trade(TradeDirection::AToB, dec!(10000)))
            .unwrap();

        assert_eq!(pool.k().unwrap(), dec!(500000000));
        assert_eq!(outcome.new_state.reserve_a(), dec!(1010000));
        assert!((outcome.new_state.reserve_b() - dec!(495.0495049504950495)).abs() < dec!(0.000001));
        assert!((outcome.amount_out - dec!(4.9505)).abs() < dec!(0.0001));
        assert!((outcome.price_impact_pct - dec!(-0.990099)).abs() < dec!(0.000001));
        assert_eq!(outcome.spot_price, dec!(0.0005));
        assert_eq!(outcome.fee_paid, Decimal::ZERO);
    }

    #[test]
    fn test_input_pool_untouched() {
        let pool = pool();
        let copy = pool.clone();
        let _ = AmmEngine::default()
            .simulate(&pool, &trade(TradeDirection::AToB, dec!(10000)))
            .unwrap();
        assert_eq!(pool, copy);
    }

    #[test]
    fn test_k_conserved_both_directions() {
        let pool = pool();
        let engine = AmmEngine::default();
        for amount in [dec!(0.5), dec!(3), dec!(77.7), dec!(12345), dec!(9999999)] {
            for direction in [TradeDirection::AToB, TradeDirection::BToA] {
                let outcome = engine.simulate(&pool, &trade(direction, amount)).unwrap();
                assert_k_conserved(&pool, &outcome.new_state);
            }
        }
    }

    #[test]
    fn test_k_conserved_with_fee() {
        let pool = pool();
        let engine = AmmEngine::new(30).unwrap();
        let outcome = engine
            .simulate(&pool, &trade(TradeDirection::AToB, dec!(10000)))
            .unwrap();

        assert_eq!(outcome.fee_paid, dec!(30));
        assert_eq!(outcome.new_state.reserve_a(), dec!(1009970));
        assert_k_conserved(&pool, &outcome.new_state);

        let fee_free = AmmEngine::default()
            .simulate(&pool, &trade(TradeDirection::AToB, dec!(10000)))
            .unwrap();
        assert!(outcome.amount_out < fee_free.amount_out);
        assert!(outcome.price_impact_pct < fee_free.price_impact_pct);
    }

    #[test]
    fn test_output_and_impact_monotonic() {
        let pool = pool();
        let engine = AmmEngine::default();
        let amounts = [dec!(1), dec!(10), dec!(100), dec!(1000), dec!(10000), dec!(100000), dec!(1000000)];

        let mut last_out = Decimal::ZERO;
        let mut last_impact = Decimal::ZERO;
        for amount in amounts {
            let outcome = engine.simulate(&pool, &trade(TradeDirection::AToB, amount)).unwrap();
            assert!(outcome.amount_out > last_out, "out not increasing at {}", amount);
            assert!(
                outcome.price_impact_pct.abs() > last_impact,
                "impact not increasing at {}",
                amount
            );
            last_out = outcome.amount_out;
            last_impact = outcome.price_impact_pct.abs();
        }
    }

    #[test]
    fn test_pool_never_drained() {
        let pool = pool();
        let huge = pool.reserve_a() * dec!(1000000000);
        let outcome = AmmEngine::default()
            .simulate(&pool, &trade(TradeDirection::AToB, huge))
            .unwrap();

        assert!(outcome.amount_out < pool.reserve_b());
        assert!(outcome.new_state.reserve_b() > Decimal::ZERO);
    }

    #[test]
    fn test_vanishing_trade_has_no_impact() {
        let pool = pool();
        let outcome = AmmEngine::default()
            .simulate(&pool, &trade(TradeDirection::AToB, dec!(0.000001)))
            .unwrap();
        assert!(outcome.price_impact_pct.abs() < dec!(0.000001));
        assert!(outcome.price_impact_pct <= Decimal::ZERO);
    }

    #[test]
    fn test_reverse_direction_mirrors() {
        let pool = pool();
        let mirrored = PoolState::new("0xpool", "WPLS", "HEX", dec!(500), dec!(1000000)).unwrap();
        let engine = AmmEngine::default();

        let forward = engine.simulate(&pool, &trade(TradeDirection::AToB, dec!(2500))).unwrap();
        let backward = engine
            .simulate(&mirrored, &trade(TradeDirection::BToA, dec!(2500)))
            .unwrap();

        assert_eq!(forward.amount_out, backward.amount_out);
        assert_eq!(forward.price_impact_pct, backward.price_impact_pct);
        assert_eq!(backward.new_state.reserve_b(), dec!(1002500));
    }

    #[test]
    fn test_rejects_non_positive_reserve() {
        let broken: PoolState = serde_json::from_str(
            r#"{"address":"0xpool","symbol_a":"HEX","symbol_b":"WPLS","reserve_a":"0","reserve_b":"500"}"#,
        )
        .unwrap();
        let err = AmmEngine::default()
            .simulate(&broken, &trade(TradeDirection::AToB, dec!(1)))
            .unwrap_err();
        assert!(matches!(err, SimError::InvalidInput(_)));
    }

    #[test]
    fn test_rejects_full_fee() {
        assert!(matches!(AmmEngine::new(10_000), Err(SimError::InvalidInput(_))));
    }

    #[test]
    fn test_deep_pool_beyond_decimal_product() {
        // 1e18 * 1e11 does not fit in a Decimal, the trade must still price
        let pool = PoolState::new("0xdeep", "TOKEN", "WPLS", dec!(1000000000000000000), dec!(100000000000)).unwrap();
        assert!(pool.k().is_err());

        let outcome = AmmEngine::default()
            .simulate(&pool, &trade(TradeDirection::BToA, dec!(1000)))
            .unwrap();
        assert!((outcome.amount_out - dec!(9999999900.000001)).abs() < dec!(0.001));
        assert!(outcome.price_impact_pct < Decimal::ZERO);
        assert!(outcome.price_impact_pct > dec!(-0.000002));
        assert_k_conserved(&pool, &outcome.new_state);
    }

    #[test]
    fn test_trade_below_pool_precision_is_rejected() {
        let pool = PoolState::new("0xdeep", "HEX", "WPLS", dec!(1000000000000), dec!(1000000000000)).unwrap();
        let err = AmmEngine::default()
            .simulate(&pool, &trade(TradeDirection::AToB, dec!(0.00000000000000000001)))
            .unwrap_err();
        assert!(matches!(err, SimError::InvalidInput(ref msg) if msg.contains("below the precision")));
    }
}
