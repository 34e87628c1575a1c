//! Constant-Product Trade Simulation
//!
//! - AMM engine: applies x * y = k to hypothetical trades
//! - History log: append-only record of every simulated step
//! - Correlation: carries price moves into paired pools (Hearts Law)
//! - Session: chains trades on one live pool

pub mod correlation;
pub mod engine;
pub mod history;
pub mod session;

// Re-exports for external use
pub use correlation::{
    apply_implied_price, hearts_law_price, potential_x, project_hearts_law, propagate,
    CorrelationRecord, CorrelationTracker, ExperimentalPrice, HeartsLawProjection, SharedAsset,
};
pub use engine::{AmmEngine, TradeOutcome};
pub use history::{x_factor, SimulationHistory, SimulationStep};
pub use session::SimulationSession;
