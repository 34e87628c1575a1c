//! DexScreener API Client
//!
//! Reserve snapshots for the simulator. One request per lookup, no retries
//! and no cached fallback: any failure surfaces as `DataUnavailable`.

use std::str::FromStr;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::SimConfig;
use crate::error::{Result, SimError};
use crate::pools::PoolState;

#[derive(Debug, Deserialize)]
pub struct PairsResponse {
    #[serde(default)]
    pub pairs: Option<Vec<PairData>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairData {
    #[serde(default)]
    pub chain_id: String,
    #[serde(default)]
    pub dex_id: String,
    pub pair_address: String,
    pub base_token: TokenInfo,
    pub quote_token: TokenInfo,
    pub price_native: Option<String>,
    pub price_usd: Option<String>,
    pub liquidity: Option<Liquidity>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenInfo {
    pub address: String,
    #[serde(default)]
    pub name: String,
    pub symbol: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Liquidity {
    pub usd: Option<serde_json::Number>,
    pub base: Option<serde_json::Number>,
    pub quote: Option<serde_json::Number>,
}

/// Point-in-time reserves of one pool
#[derive(Debug, Clone, PartialEq)]
pub struct ReserveSnapshot {
    pub pool_address: String,
    pub dex_id: String,
    pub base_symbol: String,
    pub quote_symbol: String,
    pub base_reserve: Decimal,
    pub quote_reserve: Decimal,
    pub base_price_usd: Option<Decimal>,
    pub quote_price_usd: Option<Decimal>,
    /// Base token priced in quote token, as reported
    pub price_native: Option<Decimal>,
}

impl ReserveSnapshot {
    /// Pool state with base as asset A and quote as asset B
    pub fn into_pool_state(self) -> Result<PoolState> {
        if self.base_reserve <= Decimal::ZERO || self.quote_reserve <= Decimal::ZERO {
            return Err(SimError::DataUnavailable(format!(
                "pool {} reports unusable reserves {} {} / {} {}",
                self.pool_address,
                self.base_reserve,
                self.base_symbol,
                self.quote_reserve,
                self.quote_symbol
            )));
        }

        let pool = PoolState::new(
            self.pool_address,
            self.base_symbol,
            self.quote_symbol,
            self.base_reserve,
            self.quote_reserve,
        )?;
        Ok(pool.with_usd_prices(self.base_price_usd, self.quote_price_usd))
    }
}

/// Source of reserve snapshots keyed by pool (or token) address
#[async_trait]
pub trait ReserveSnapshotProvider: Send + Sync {
    /// Reserves of one pair
    async fn pair_snapshot(&self, pair_address: &str) -> Result<ReserveSnapshot>;

    /// Synthetic token/USD pool built from a token's total liquidity
    async fn token_snapshot(&self, token_address: &str) -> Result<ReserveSnapshot>;
}

/// Accepts `0x` followed by 40 hex digits
pub fn validate_address(address: &str) -> Result<()> {
    let digits = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .ok_or_else(|| SimError::InvalidInput(format!("address {} must start with 0x", address)))?;

    if digits.len() != 40 {
        return Err(SimError::InvalidInput(format!(
            "address {} must have 40 hex digits, found {}",
            address,
            digits.len()
        )));
    }
    hex::decode(digits)
        .map_err(|e| SimError::InvalidInput(format!("address {}: {}", address, e)))?;
    Ok(())
}

/// Parse a DexScreener number, plain or scientific
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}

fn number(value: &Option<serde_json::Number>) -> Option<Decimal> {
    value.as_ref().and_then(|n| parse_decimal(&n.to_string()))
}

/// Reserve snapshot from one pair record
pub fn snapshot_from_pair(pair: &PairData) -> Result<ReserveSnapshot> {
    let liquidity = pair.liquidity.as_ref().ok_or_else(|| {
        SimError::DataUnavailable(format!("pair {} has no liquidity data", pair.pair_address))
    })?;

    let base_reserve = number(&liquidity.base).ok_or_else(|| {
        SimError::DataUnavailable(format!("pair {} has no base reserve", pair.pair_address))
    })?;
    let quote_reserve = number(&liquidity.quote).ok_or_else(|| {
        SimError::DataUnavailable(format!("pair {} has no quote reserve", pair.pair_address))
    })?;

    let price_native = pair.price_native.as_deref().and_then(parse_decimal);
    let base_price_usd = pair.price_usd.as_deref().and_then(parse_decimal);

    // priceUsd is quoted for the base token; derive the quote side through priceNative
    let quote_price_usd = match (base_price_usd, price_native) {
        (Some(usd), Some(native)) if native > Decimal::ZERO => usd.checked_div(native),
        _ => None,
    };

    Ok(ReserveSnapshot {
        pool_address: pair.pair_address.clone(),
        dex_id: pair.dex_id.clone(),
        base_symbol: pair.base_token.symbol.clone(),
        quote_symbol: pair.quote_token.symbol.clone(),
        base_reserve,
        quote_reserve,
        base_price_usd,
        quote_price_usd,
        price_native,
    })
}

/// Token/USD pool holding half of the token's total USD liquidity on each side
pub fn synthetic_snapshot(token_address: &str, pairs: &[PairData]) -> Result<ReserveSnapshot> {
    let total_liquidity_usd: Decimal = pairs
        .iter()
        .filter_map(|p| p.liquidity.as_ref().and_then(|l| number(&l.usd)))
        .filter(|usd| *usd > Decimal::ZERO)
        .sum();

    if total_liquidity_usd <= Decimal::ZERO {
        return Err(SimError::DataUnavailable(format!(
            "token {} has no pooled liquidity",
            token_address
        )));
    }

    let reference = pairs
        .iter()
        .find(|p| p.base_token.address.eq_ignore_ascii_case(token_address))
        .or_else(|| pairs.first())
        .ok_or_else(|| SimError::DataUnavailable(format!("token {} has no pairs", token_address)))?;

    let price = reference
        .price_usd
        .as_deref()
        .and_then(parse_decimal)
        .filter(|p| *p > Decimal::ZERO)
        .ok_or_else(|| {
            SimError::DataUnavailable(format!("token {} has no USD price", token_address))
        })?;

    let usd_reserve = total_liquidity_usd / Decimal::TWO;
    let token_reserve = usd_reserve.checked_div(price).ok_or_else(|| {
        SimError::DataUnavailable(format!("token {} price {} is unusable", token_address, price))
    })?;

    Ok(ReserveSnapshot {
        pool_address: token_address.to_string(),
        dex_id: "aggregate".to_string(),
        base_symbol: reference.base_token.symbol.clone(),
        quote_symbol: "USD".to_string(),
        base_reserve: token_reserve,
        quote_reserve: usd_reserve,
        base_price_usd: Some(price),
        quote_price_usd: Some(Decimal::ONE),
        price_native: Some(price),
    })
}

pub struct DexScreenerClient {
    client: Client,
    base_url: String,
    chain: String,
}

impl DexScreenerClient {
    pub fn new(config: &SimConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| SimError::DataUnavailable(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.api_url.clone(),
            chain: config.chain.clone(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!("DexScreener API URL: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SimError::DataUnavailable(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SimError::DataUnavailable(format!("reading {} failed: {}", url, e)))?;

        debug!("DexScreener API status: {}, {} bytes", status, body.len());

        if !status.is_success() {
            return Err(SimError::DataUnavailable(format!(
                "{} returned status {}",
                url, status
            )));
        }

        serde_json::from_str(&body).map_err(|e| {
            SimError::DataUnavailable(format!("failed to parse response: {}. Body: {}", e, body))
        })
    }

    /// All pairs DexScreener lists for a token
    pub async fn get_token_pairs(&self, token_address: &str) -> Result<Vec<PairData>> {
        validate_address(token_address)?;
        let url = format!("{}/tokens/{}", self.base_url, token_address);
        let response: PairsResponse = self.get_json(&url).await?;
        Ok(response.pairs.unwrap_or_default())
    }

    /// One pair on the configured chain
    pub async fn get_pair(&self, pair_address: &str) -> Result<PairData> {
        validate_address(pair_address)?;
        let url = format!("{}/pairs/{}/{}", self.base_url, self.chain, pair_address);
        let response: PairsResponse = self.get_json(&url).await?;

        response
            .pairs
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or_else(|| {
                SimError::DataUnavailable(format!(
                    "no pair {} on {}",
                    pair_address, self.chain
                ))
            })
    }
}

#[async_trait]
impl ReserveSnapshotProvider for DexScreenerClient {
    async fn pair_snapshot(&self, pair_address: &str) -> Result<ReserveSnapshot> {
        let pair = self.get_pair(pair_address).await?;
        if !pair.chain_id.is_empty() && pair.chain_id != self.chain {
            warn!(
                pair = pair_address,
                chain = %pair.chain_id,
                expected = %self.chain,
                "pair reported on a different chain"
            );
        }
        snapshot_from_pair(&pair)
    }

    async fn token_snapshot(&self, token_address: &str) -> Result<ReserveSnapshot> {
        let pairs = self.get_token_pairs(token_address).await?;
        synthetic_snapshot(token_address, &pairs)
    }
}
