//! PulseChain liquidity simulator
//!
//! Constant-product price impact on live DexScreener reserves, chained trade
//! sessions and Hearts Law propagation into paired pools.

pub mod config;
pub mod dexscreener;
pub mod display;
pub mod error;
pub mod export;
pub mod pools;
pub mod simulation;

pub use config::SimConfig;
pub use error::{Result, SimError};
pub use pools::{Asset, PoolState, TradeDirection, TradeRequest};
pub use simulation::{AmmEngine, SimulationHistory, SimulationSession, SimulationStep};
