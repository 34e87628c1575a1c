use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

/// One side of a two-asset pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Asset {
    A,
    B,
}

impl Asset {
    pub fn other(self) -> Asset {
        match self {
            Asset::A => Asset::B,
            Asset::B => Asset::A,
        }
    }
}

impl std::fmt::Display for Asset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Asset::A => write!(f, "A"),
            Asset::B => write!(f, "B"),
        }
    }
}

/// Reserves of one constant-product pool at a point in simulated time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolState {
    address: String,
    symbol_a: String,
    symbol_b: String,
    reserve_a: Decimal,
    reserve_b: Decimal,
    /// Reference prices for display only; the invariant never reads them
    price_a_usd: Option<Decimal>,
    price_b_usd: Option<Decimal>,
}

impl PoolState {
    pub fn new(
        address: impl Into<String>,
        symbol_a: impl Into<String>,
        symbol_b: impl Into<String>,
        reserve_a: Decimal,
        reserve_b: Decimal,
    ) -> Result<Self> {
        let state = Self {
            address: address.into(),
            symbol_a: symbol_a.into(),
            symbol_b: symbol_b.into(),
            reserve_a,
            reserve_b,
            price_a_usd: None,
            price_b_usd: None,
        };
        state.validate()?;
        Ok(state)
    }

    pub fn with_usd_prices(mut self, price_a_usd: Option<Decimal>, price_b_usd: Option<Decimal>) -> Self {
        self.price_a_usd = price_a_usd;
        self.price_b_usd = price_b_usd;
        self
    }

    /// Both reserves must be strictly positive
    pub fn validate(&self) -> Result<()> {
        for asset in [Asset::A, Asset::B] {
            let reserve = self.reserve(asset);
            if reserve <= Decimal::ZERO {
                return Err(SimError::InvalidInput(format!(
                    "reserve {} ({}) of pool {} must be positive, got {}",
                    asset,
                    self.symbol(asset),
                    self.address,
                    reserve
                )));
            }
        }
        Ok(())
    }

    /// Copy of this pool with new reserves; labels and reference prices carry over
    pub(crate) fn with_reserves(&self, reserve_a: Decimal, reserve_b: Decimal) -> Self {
        Self {
            reserve_a,
            reserve_b,
            ..self.clone()
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn reserve_a(&self) -> Decimal {
        self.reserve_a
    }

    pub fn reserve_b(&self) -> Decimal {
        self.reserve_b
    }

    pub fn reserve(&self, asset: Asset) -> Decimal {
        match asset {
            Asset::A => self.reserve_a,
            Asset::B => self.reserve_b,
        }
    }

    pub fn symbol(&self, asset: Asset) -> &str {
        match asset {
            Asset::A => &self.symbol_a,
            Asset::B => &self.symbol_b,
        }
    }

    pub fn usd_price(&self, asset: Asset) -> Option<Decimal> {
        match asset {
            Asset::A => self.price_a_usd,
            Asset::B => self.price_b_usd,
        }
    }

    /// Find which side holds `symbol` (case-insensitive)
    pub fn resolve(&self, symbol: &str) -> Option<Asset> {
        if self.symbol_a.eq_ignore_ascii_case(symbol) {
            Some(Asset::A)
        } else if self.symbol_b.eq_ignore_ascii_case(symbol) {
            Some(Asset::B)
        } else {
            None
        }
    }

    /// Constant product k = reserve_a * reserve_b
    pub fn k(&self) -> Result<Decimal> {
        self.reserve_a.checked_mul(self.reserve_b).ok_or_else(|| {
            SimError::InvalidInput(format!(
                "reserve product {} * {} overflows",
                self.reserve_a, self.reserve_b
            ))
        })
    }

    /// This pool's k over `earlier`'s k, taken reserve by reserve so deep pools never overflow
    pub fn k_ratio(&self, earlier: &PoolState) -> Result<Decimal> {
        let ratio = |asset: Asset| self.reserve(asset).checked_div(earlier.reserve(asset));
        ratio(Asset::A)
            .zip(ratio(Asset::B))
            .and_then(|(a, b)| a.checked_mul(b))
            .ok_or_else(|| {
                SimError::InvalidInput(format!(
                    "cannot compare k of pool {} against {}",
                    self.address, earlier.address
                ))
            })
    }

    /// Price of `asset` quoted in units of the other asset
    pub fn price_of(&self, asset: Asset) -> Result<Decimal> {
        let base = self.reserve(asset);
        let quote = self.reserve(asset.other());
        quote.checked_div(base).ok_or_else(|| {
            SimError::InvalidInput(format!(
                "cannot price {} with reserves {} / {}",
                self.symbol(asset),
                quote,
                base
            ))
        })
    }

    /// Total value locked at the reference prices, if both are known
    pub fn usd_value(&self) -> Option<Decimal> {
        let a = self.reserve_a.checked_mul(self.price_a_usd?)?;
        let b = self.reserve_b.checked_mul(self.price_b_usd?)?;
        a.checked_add(b)
    }

    /// "SYMBOL_A/SYMBOL_B"
    pub fn pair_label(&self) -> String {
        format!("{}/{}", self.symbol_a, self.symbol_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn pool() -> PoolState {
        PoolState::new("0xpool", "HEX", "WPLS", dec!(1000000), dec!(500)).unwrap()
    }

    #[test]
    fn test_rejects_non_positive_reserves() {
        let err = PoolState::new("0xpool", "HEX", "WPLS", dec!(0), dec!(500)).unwrap_err();
        assert!(matches!(err, SimError::InvalidInput(_)));

        let err = PoolState::new("0xpool", "HEX", "WPLS", dec!(10), dec!(-1)).unwrap_err();
        assert!(matches!(err, SimError::InvalidInput(_)));
    }

    #[test]
    fn test_prices_and_k() {
        let pool = pool();
        assert_eq!(pool.k().unwrap(), dec!(500000000));
        assert_eq!(pool.price_of(Asset::A).unwrap(), dec!(0.0005));
        assert_eq!(pool.price_of(Asset::B).unwrap(), dec!(2000));
    }

    #[test]
    fn test_k_ratio_on_deep_pools() {
        let deep = PoolState::new("0xdeep", "TOKEN", "WPLS", dec!(1000000000000000000), dec!(100000000000)).unwrap();
        assert!(deep.k().is_err());

        let resized = deep.with_reserves(dec!(500000000000000000), dec!(200000000000));
        assert_eq!(resized.k_ratio(&deep).unwrap(), Decimal::ONE);

        let doubled = deep.with_reserves(dec!(2000000000000000000), dec!(100000000000));
        assert_eq!(doubled.k_ratio(&deep).unwrap(), dec!(2));
    }

    #[test]
    fn test_resolve_is_case_insensitive() {
        let pool = pool();
        assert_eq!(pool.resolve("hex"), Some(Asset::A));
        assert_eq!(pool.resolve("wpls"), Some(Asset::B));
        assert_eq!(pool.resolve("PLSX"), None);
    }

    #[test]
    fn test_usd_value_needs_both_prices() {
        let pool = pool();
        assert_eq!(pool.usd_value(), None);

        let priced = pool.with_usd_prices(Some(dec!(0.01)), Some(dec!(20)));
        assert_eq!(priced.usd_value(), Some(dec!(20000)));
    }
}
