use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Cannot simulate without live data: {0}")]
    DataUnavailable(String),

    #[error("Asset {symbol} is not held by pool {pool}")]
    UnsharedAsset { symbol: String, pool: String },

    #[error("Out-of-order append: step {attempted} does not follow step {last}")]
    OutOfOrderAppend { last: u64, attempted: u64 },
}

pub type Result<T> = std::result::Result<T, SimError>;
