//! Paired-Pool Correlation ("Hearts Law")
//!
//! Carries a simulated price move of an asset in one pool over to a second
//! pool that holds the same asset. The paired pool's other reserve is held
//! fixed and no arbitrage correction is modeled. Propagation only produces
//! an implied price; the paired pool changes only on an explicit commit.

use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::history::{SimulationHistory, SimulationStep};
use crate::error::{Result, SimError};
use crate::pools::{Asset, PoolState};

/// The asset two pools have in common, matched by symbol (case-insensitive)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SharedAsset {
    symbol: String,
}

impl SharedAsset {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self { symbol: symbol.into() }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Side of `pool` holding this asset
    pub fn resolve_in(&self, pool: &PoolState) -> Result<Asset> {
        pool.resolve(&self.symbol).ok_or_else(|| SimError::UnsharedAsset {
            symbol: self.symbol.clone(),
            pool: format!("{} ({})", pool.address(), pool.pair_label()),
        })
    }
}

/// Implied price of the shared asset in a paired pool after one primary step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationRecord {
    /// step_index of the primary trade that caused the move
    pub source_step: u64,
    pub shared_symbol: String,
    pub paired_pool: String,
    /// Side of the paired pool holding the shared asset
    pub paired_side: Asset,
    /// Shared asset priced in the paired pool's other asset, before propagation
    pub paired_price_before: Decimal,
    /// Primary post price / primary pre price
    pub change_ratio: Decimal,
    pub implied_price: Decimal,
    /// implied_price valued at the paired other asset's USD reference, if known
    pub implied_price_usd: Option<Decimal>,
}

impl CorrelationRecord {
    pub fn change_pct(&self) -> Result<Decimal> {
        (self.change_ratio - Decimal::ONE)
            .checked_mul(dec!(100))
            .ok_or_else(|| SimError::InvalidInput(format!("change ratio {} overflows", self.change_ratio)))
    }
}

/// Apply the fractional move `after / before` to `price`
pub fn scale_by_move(before: Decimal, after: Decimal, price: Decimal) -> Result<(Decimal, Decimal)> {
    let ratio = after.checked_div(before).ok_or_else(|| {
        SimError::InvalidInput(format!("cannot take price move {} -> {}", before, after))
    })?;
    let scaled = price.checked_mul(ratio).ok_or_else(|| {
        SimError::InvalidInput(format!("implied price {} * {} overflows", price, ratio))
    })?;
    Ok((ratio, scaled))
}

/// Derive the shared asset's implied price in `paired` from one primary step
pub fn propagate(
    step: &SimulationStep,
    paired: &PoolState,
    shared: &SharedAsset,
) -> Result<CorrelationRecord> {
    let paired_side = shared.resolve_in(paired)?;
    let primary_side = shared.resolve_in(step.pre_state())?;

    let before = step.pre_state().price_of(primary_side)?;
    let after = step.post_state().price_of(primary_side)?;
    let paired_price_before = paired.price_of(paired_side)?;

    let (change_ratio, implied_price) = scale_by_move(before, after, paired_price_before)?;
    let implied_price_usd = paired
        .usd_price(paired_side.other())
        .and_then(|usd| implied_price.checked_mul(usd));

    debug!(
        step = step.step_index(),
        paired = paired.address(),
        shared = shared.symbol(),
        %change_ratio,
        %implied_price,
        "propagated price move"
    );

    Ok(CorrelationRecord {
        source_step: step.step_index(),
        shared_symbol: paired.symbol(paired_side).to_string(),
        paired_pool: paired.address().to_string(),
        paired_side,
        paired_price_before,
        change_ratio,
        implied_price,
        implied_price_usd,
    })
}

/// Commit an implied price: resize the shared reserve, hold the other reserve fixed
///
/// This is a liquidity event for the paired pool, so its k changes.
pub fn apply_implied_price(paired: &mut PoolState, record: &CorrelationRecord) -> Result<()> {
    if !paired.address().eq_ignore_ascii_case(&record.paired_pool) {
        return Err(SimError::InvalidInput(format!(
            "record for pool {} cannot be applied to pool {}",
            record.paired_pool,
            paired.address()
        )));
    }

    let side = SharedAsset::new(record.shared_symbol.clone()).resolve_in(paired)?;
    if side != record.paired_side {
        return Err(SimError::UnsharedAsset {
            symbol: record.shared_symbol.clone(),
            pool: format!("{} side {}", paired.address(), record.paired_side),
        });
    }
    if record.implied_price <= Decimal::ZERO {
        return Err(SimError::InvalidInput(format!(
            "implied price must be positive, got {}",
            record.implied_price
        )));
    }

    let other = paired.reserve(side.other());
    let shared_reserve = other.checked_div(record.implied_price).ok_or_else(|| {
        SimError::InvalidInput(format!(
            "cannot size reserve for implied price {}",
            record.implied_price
        ))
    })?;
    if shared_reserve <= Decimal::ZERO {
        return Err(SimError::InvalidInput(format!(
            "implied price {} empties the {} reserve",
            record.implied_price, record.shared_symbol
        )));
    }

    let usd = |asset: Asset| {
        if asset == side {
            record.implied_price_usd.or(paired.usd_price(asset))
        } else {
            paired.usd_price(asset)
        }
    };
    let (price_a_usd, price_b_usd) = (usd(Asset::A), usd(Asset::B));

    let updated = match side {
        Asset::A => paired.with_reserves(shared_reserve, other),
        Asset::B => paired.with_reserves(other, shared_reserve),
    };
    *paired = updated.with_usd_prices(price_a_usd, price_b_usd);
    Ok(())
}

/// Follows a primary pool's history and records implied prices in one paired pool
#[derive(Debug, Clone)]
pub struct CorrelationTracker {
    paired: PoolState,
    shared: SharedAsset,
    records: Vec<CorrelationRecord>,
}

impl CorrelationTracker {
    pub fn new(paired: PoolState, shared: SharedAsset) -> Result<Self> {
        shared.resolve_in(&paired)?;
        Ok(Self {
            paired,
            shared,
            records: Vec::new(),
        })
    }

    pub fn paired(&self) -> &PoolState {
        &self.paired
    }

    pub fn shared(&self) -> &SharedAsset {
        &self.shared
    }

    pub fn records(&self) -> &[CorrelationRecord] {
        &self.records
    }

    pub fn latest(&self) -> Option<&CorrelationRecord> {
        self.records.last()
    }

    fn last_seen(&self) -> u64 {
        self.records.last().map(|r| r.source_step).unwrap_or(0)
    }

    /// Record the implied price for one primary step
    pub fn observe(&mut self, step: &SimulationStep) -> Result<&CorrelationRecord> {
        let last = self.last_seen();
        if !self.records.is_empty() && step.step_index() <= last {
            return Err(SimError::OutOfOrderAppend {
                last,
                attempted: step.step_index(),
            });
        }

        let record = propagate(step, &self.paired, &self.shared)?;
        self.records.push(record);
        Ok(&self.records[self.records.len() - 1])
    }

    /// Observe every history step newer than the last one seen; returns how many
    pub fn follow(&mut self, history: &SimulationHistory) -> Result<usize> {
        let last = self.last_seen();
        let mut observed = 0;
        for step in history.since(last) {
            self.observe(step)?;
            observed += 1;
        }
        Ok(observed)
    }

    /// Apply the implied price recorded for `source_step` to the paired pool
    pub fn commit(&mut self, source_step: u64) -> Result<()> {
        let record = self
            .records
            .iter()
            .find(|r| r.source_step == source_step)
            .cloned()
            .ok_or_else(|| {
                SimError::InvalidInput(format!("no correlation recorded for step {}", source_step))
            })?;

        apply_implied_price(&mut self.paired, &record)?;
        info!(
            pool = self.paired.address(),
            step = source_step,
            implied_price = %record.implied_price,
            "committed implied price"
        );
        Ok(())
    }
}

/// Hearts Law USD projection: token price quoted in its pair, times a what-if USD price of the pair asset
pub fn hearts_law_price(price_native: Decimal, experimental_paired_usd: Decimal) -> Result<Decimal> {
    price_native.checked_mul(experimental_paired_usd).ok_or_else(|| {
        SimError::InvalidInput(format!(
            "projected price {} * {} overflows",
            price_native, experimental_paired_usd
        ))
    })
}

/// How many times `future` is of `current`; 0 when there is no current price
pub fn potential_x(current: Decimal, future: Decimal) -> Result<Decimal> {
    if current <= Decimal::ZERO {
        return Ok(Decimal::ZERO);
    }
    future.checked_div(current).ok_or_else(|| {
        SimError::InvalidInput(format!("potential x {} / {} overflows", future, current))
    })
}

/// What-if USD price for one pair asset, written `SYMBOL=PRICE`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentalPrice {
    pub symbol: String,
    pub usd: Decimal,
}

impl FromStr for ExperimentalPrice {
    type Err = SimError;

    fn from_str(raw: &str) -> Result<Self> {
        let (symbol, price) = raw.split_once('=').ok_or_else(|| {
            SimError::InvalidInput(format!("expected SYMBOL=PRICE, got {}", raw))
        })?;
        let symbol = symbol.trim();
        if symbol.is_empty() {
            return Err(SimError::InvalidInput(format!("missing symbol in {}", raw)));
        }
        let usd = Decimal::from_str(price.trim())
            .map_err(|e| SimError::InvalidInput(format!("bad price in {}: {}", raw, e)))?;
        if usd <= Decimal::ZERO {
            return Err(SimError::InvalidInput(format!("price must be positive in {}", raw)));
        }
        Ok(Self {
            symbol: symbol.to_string(),
            usd,
        })
    }
}

/// Token's USD price in one pool if its pair asset traded at a what-if price
#[derive(Debug, Clone, PartialEq)]
pub struct HeartsLawProjection {
    pub pool: String,
    pub token_symbol: String,
    pub paired_symbol: String,
    /// Token priced in the pair asset
    pub price_native: Decimal,
    pub current_usd: Option<Decimal>,
    pub experimental_paired_usd: Decimal,
    pub projected_usd: Decimal,
    pub potential_x: Decimal,
}

/// Project `token` in `pool` using the what-if price given for the pool's pair asset
///
/// None when the token is not in the pool or no price names its pair asset.
pub fn project_hearts_law(
    pool: &PoolState,
    token: &str,
    prices: &[ExperimentalPrice],
) -> Result<Option<HeartsLawProjection>> {
    let Some(target) = pool.resolve(token) else {
        return Ok(None);
    };
    let paired_symbol = pool.symbol(target.other());
    let Some(experimental) = prices
        .iter()
        .find(|p| p.symbol.eq_ignore_ascii_case(paired_symbol))
    else {
        return Ok(None);
    };

    let price_native = pool.price_of(target)?;
    let projected_usd = hearts_law_price(price_native, experimental.usd)?;
    let current_usd = pool.usd_price(target);
    let potential_x = potential_x(current_usd.unwrap_or(Decimal::ZERO), projected_usd)?;

    Ok(Some(HeartsLawProjection {
        pool: pool.address().to_string(),
        token_symbol: pool.symbol(target).to_string(),
        paired_symbol: paired_symbol.to_string(),
        price_native,
        current_usd,
        experimental_paired_usd: experimental.usd,
        projected_usd,
        potential_x,
    }))
}
