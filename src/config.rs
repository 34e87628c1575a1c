//! Liquidity Simulator Configuration

use std::time::Duration;

use crate::error::{Result, SimError};

// DexScreener public API (no key needed)
pub const DEXSCREENER_API: &str = "https://api.dexscreener.com/latest/dex";
pub const DEFAULT_CHAIN: &str = "pulsechain";

/// Basis points in 100%
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Zero fee unless configured; no DEX fee schedule is assumed
pub const DEFAULT_FEE_BPS: u32 = 0;

pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Runtime configuration for a simulation run
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// DexScreener base URL (without trailing slash)
    pub api_url: String,
    /// Chain slug used in pair lookups
    pub chain: String,
    /// Swap fee taken from the input amount, in bps
    pub fee_bps: u32,
    /// Timeout for the snapshot request
    pub http_timeout: Duration,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            api_url: DEXSCREENER_API.to_string(),
            chain: DEFAULT_CHAIN.to_string(),
            fee_bps: DEFAULT_FEE_BPS,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

impl SimConfig {
    /// Create configuration from environment variables (.env is loaded by main)
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let api_url = std::env::var("DEXSCREENER_API_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.api_url);

        let chain = std::env::var("DEXSCREENER_CHAIN").unwrap_or(defaults.chain);

        let fee_bps = match std::env::var("SIM_FEE_BPS") {
            Ok(raw) => raw.trim().parse::<u32>().map_err(|e| {
                SimError::InvalidInput(format!("SIM_FEE_BPS={}: {}", raw, e))
            })?,
            Err(_) => defaults.fee_bps,
        };

        let http_timeout = match std::env::var("HTTP_TIMEOUT_SECS") {
            Ok(raw) => Duration::from_secs(raw.trim().parse::<u64>().map_err(|e| {
                SimError::InvalidInput(format!("HTTP_TIMEOUT_SECS={}: {}", raw, e))
            })?),
            Err(_) => defaults.http_timeout,
        };

        let config = Self {
            api_url,
            chain,
            fee_bps,
            http_timeout,
        };
        config.validate()?;
        Ok(config)
    }

    /// Override the fee (CLI flag wins over env)
    pub fn with_fee_bps(mut self, fee_bps: Option<u32>) -> Result<Self> {
        if let Some(fee) = fee_bps {
            self.fee_bps = fee;
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        if self.fee_bps >= BPS_DENOMINATOR {
            return Err(SimError::InvalidInput(format!(
                "fee of {} bps leaves nothing to trade",
                self.fee_bps
            )));
        }
        Ok(())
    }

    /// Log configuration on startup for debugging
    pub fn log_config(&self) {
        tracing::info!(
            api_url = %self.api_url,
            chain = %self.chain,
            fee_bps = self.fee_bps,
            timeout_secs = self.http_timeout.as_secs(),
            "simulator configuration"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_fee_free() {
        let config = SimConfig::default();
        assert_eq!(config.fee_bps, 0);
        assert_eq!(config.chain, "pulsechain");
    }

    #[test]
    fn test_fee_override() {
        let config = SimConfig::default().with_fee_bps(Some(30)).unwrap();
        assert_eq!(config.fee_bps, 30);

        let unchanged = SimConfig::default().with_fee_bps(None).unwrap();
        assert_eq!(unchanged.fee_bps, 0);
    }

    #[test]
    fn test_full_fee_rejected() {
        let err = SimConfig::default().with_fee_bps(Some(10_000)).unwrap_err();
        assert!(matches!(err, SimError::InvalidInput(_)));
    }
}
