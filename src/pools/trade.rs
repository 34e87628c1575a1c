use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::state::{Asset, PoolState};
use crate::error::{Result, SimError};

/// Which reserve receives the input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeDirection {
    AToB,
    BToA,
}

impl TradeDirection {
    pub fn input(self) -> Asset {
        match self {
            TradeDirection::AToB => Asset::A,
            TradeDirection::BToA => Asset::B,
        }
    }

    pub fn output(self) -> Asset {
        self.input().other()
    }

    pub fn reversed(self) -> TradeDirection {
        match self {
            TradeDirection::AToB => TradeDirection::BToA,
            TradeDirection::BToA => TradeDirection::AToB,
        }
    }
}

impl std::fmt::Display for TradeDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeDirection::AToB => write!(f, "A→B"),
            TradeDirection::BToA => write!(f, "B→A"),
        }
    }
}

/// A hypothetical trade against one pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeRequest {
    direction: TradeDirection,
    amount_in: Decimal,
}

impl TradeRequest {
    pub fn new(direction: TradeDirection, amount_in: Decimal) -> Result<Self> {
        if amount_in <= Decimal::ZERO {
            return Err(SimError::InvalidInput(format!(
                "trade amount must be positive, got {}",
                amount_in
            )));
        }
        Ok(Self { direction, amount_in })
    }

    /// Signed amount, always counted in units of `direction`'s input asset
    ///
    /// Positive trades in `direction`. Negative trades in reverse, selling as
    /// much of the other asset as `|amount|` is worth at `pool`'s spot price.
    pub fn signed(direction: TradeDirection, amount: Decimal, pool: &PoolState) -> Result<Self> {
        if !amount.is_sign_negative() || amount.is_zero() {
            return Self::new(direction, amount);
        }

        let worth = amount
            .abs()
            .checked_mul(pool.price_of(direction.input())?)
            .ok_or_else(|| {
                SimError::InvalidInput(format!(
                    "{} {} overflows when converted to {}",
                    amount,
                    pool.symbol(direction.input()),
                    pool.symbol(direction.output())
                ))
            })?;
        Self::new(direction.reversed(), worth)
    }

    pub fn direction(&self) -> TradeDirection {
        self.direction
    }

    pub fn amount_in(&self) -> Decimal {
        self.amount_in
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_rejects_zero_and_negative() {
        assert!(matches!(
            TradeRequest::new(TradeDirection::AToB, dec!(0)),
            Err(SimError::InvalidInput(_))
        ));
        assert!(matches!(
            TradeRequest::new(TradeDirection::AToB, dec!(-5)),
            Err(SimError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_signed_amount_flips_direction() {
        // Token/USD pool: 1,000,000 HEX against $6,000, so HEX is $0.006
        let pool = PoolState::new("0xhex", "HEX", "USD", dec!(1000000), dec!(6000)).unwrap();

        let buy = TradeRequest::signed(TradeDirection::BToA, dec!(250), &pool).unwrap();
        assert_eq!(buy.direction(), TradeDirection::BToA);
        assert_eq!(buy.amount_in(), dec!(250));

        // -$1000 sells $1000 worth of HEX, not 1000 HEX
        let sell = TradeRequest::signed(TradeDirection::BToA, dec!(-1000), &pool).unwrap();
        assert_eq!(sell.direction(), TradeDirection::AToB);
        assert!((sell.amount_in() - dec!(166666.6666666667)).abs() < dec!(0.0001));

        assert!(TradeRequest::signed(TradeDirection::AToB, dec!(0), &pool).is_err());
    }

    #[test]
    fn test_direction_assets() {
        assert_eq!(TradeDirection::AToB.input(), Asset::A);
        assert_eq!(TradeDirection::AToB.output(), Asset::B);
        assert_eq!(TradeDirection::BToA.input(), Asset::B);
    }
}
