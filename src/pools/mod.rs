pub mod state;
pub mod trade;

pub use state::{Asset, PoolState};
pub use trade::{TradeDirection, TradeRequest};
