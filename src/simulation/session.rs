//! Simulation session: one live pool, its engine and its history
//!
//! Sessions own all of their state, so independent sessions can run side by
//! side. Steps cannot be rolled back once appended.

use rust_decimal::Decimal;
use tracing::info;

use super::engine::AmmEngine;
use super::history::{SimulationHistory, SimulationStep};
use crate::dexscreener::ReserveSnapshotProvider;
use crate::error::Result;
use crate::pools::{PoolState, TradeDirection, TradeRequest};

#[derive(Debug, Clone)]
pub struct SimulationSession {
    pool: PoolState,
    engine: AmmEngine,
    history: SimulationHistory,
}

impl SimulationSession {
    pub fn new(pool: PoolState, engine: AmmEngine) -> Result<Self> {
        pool.validate()?;
        Ok(Self {
            pool,
            engine,
            history: SimulationHistory::new(),
        })
    }

    /// Start from a live pair snapshot; the provider call is the only I/O
    pub async fn from_provider<P>(provider: &P, pair_address: &str, engine: AmmEngine) -> Result<Self>
    where
        P: ReserveSnapshotProvider + ?Sized,
    {
        let snapshot = provider.pair_snapshot(pair_address).await?;
        let pool = snapshot.into_pool_state()?;
        info!(pool = pool.address(), pair = %pool.pair_label(), "session started");
        Self::new(pool, engine)
    }

    /// Run one trade on the live pool and log it
    pub fn execute(&mut self, request: TradeRequest) -> Result<&SimulationStep> {
        let outcome = self.engine.simulate(&self.pool, &request)?;
        let next_pool = outcome.new_state.clone();
        let step = SimulationStep::new(
            self.history.next_step_index(),
            request,
            self.pool.clone(),
            outcome,
        )?;

        let step = self.history.append(step)?;
        self.pool = next_pool;
        Ok(step)
    }

    /// Run a signed trade sized against the live pool, see [`TradeRequest::signed`]
    pub fn execute_signed(&mut self, direction: TradeDirection, amount: Decimal) -> Result<&SimulationStep> {
        let request = TradeRequest::signed(direction, amount, &self.pool)?;
        self.execute(request)
    }

    /// Run trades in order, stopping at the first failure
    pub fn execute_all<I>(&mut self, requests: I) -> Result<usize>
    where
        I: IntoIterator<Item = TradeRequest>,
    {
        let mut executed = 0;
        for request in requests {
            self.execute(request)?;
            executed += 1;
        }
        Ok(executed)
    }

    pub fn pool(&self) -> &PoolState {
        &self.pool
    }

    pub fn engine(&self) -> &AmmEngine {
        &self.engine
    }

    pub fn history(&self) -> &SimulationHistory {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dexscreener::{ReserveSnapshot, ReserveSnapshotProvider};
    use crate::error::SimError;
    use crate::pools::Asset;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    fn pool() -> PoolState {
        PoolState::new("0xpool", "HEX", "WPLS", dec!(1000000), dec!(500)).unwrap()
    }

    struct FixedProvider;

    #[async_trait]
    impl ReserveSnapshotProvider for FixedProvider {
        async fn pair_snapshot(&self, pair_address: &str) -> Result<ReserveSnapshot> {
            Ok(ReserveSnapshot {
                pool_address: pair_address.to_string(),
                dex_id: "pulsex".to_string(),
                base_symbol: "HEX".to_string(),
                quote_symbol: "WPLS".to_string(),
                base_reserve: dec!(1000000),
                quote_reserve: dec!(500),
                base_price_usd: Some(dec!(0.005)),
                quote_price_usd: Some(dec!(10)),
                price_native: Some(dec!(0.0005)),
            })
        }

        async fn token_snapshot(&self, _token_address: &str) -> Result<ReserveSnapshot> {
            Err(SimError::DataUnavailable("no token data".to_string()))
        }
    }

    struct OfflineProvider;

    #[async_trait]
    impl ReserveSnapshotProvider for OfflineProvider {
        async fn pair_snapshot(&self, _pair_address: &str) -> Result<ReserveSnapshot> {
            Err(SimError::DataUnavailable("connection refused".to_string()))
        }

        async fn token_snapshot(&self, _token_address: &str) -> Result<ReserveSnapshot> {
            Err(SimError::DataUnavailable("connection refused".to_string()))
        }
    }

    #[test]
    fn test_chained_trades() {
        let mut session = SimulationSession::new(pool(), AmmEngine::default()).unwrap();
        let start = session.pool().clone();

        let first = session
            .execute(TradeRequest::new(TradeDirection::AToB, dec!(10000)).unwrap())
            .unwrap()
            .clone();
        let second = session
            .execute(TradeRequest::new(TradeDirection::AToB, dec!(10000)).unwrap())
            .unwrap()
            .clone();

        assert_eq!(first.step_index(), 1);
        assert_eq!(second.step_index(), 2);
        assert_eq!(second.pre_state(), first.post_state());
        assert_eq!(session.pool(), second.post_state());
        assert_eq!(session.pool().reserve_a(), dec!(1020000));

        // Same size into a thinner pool costs more
        assert!(second.amount_out() < first.amount_out());
        assert!(second.price_impact_pct() < first.price_impact_pct());

        let drift = (session.pool().k_ratio(&start).unwrap() - Decimal::ONE).abs();
        assert!(drift < dec!(0.000000001));
    }

    #[test]
    fn test_round_trip_restores_pool() {
        let mut session = SimulationSession::new(pool(), AmmEngine::default()).unwrap();
        let out = session
            .execute(TradeRequest::new(TradeDirection::AToB, dec!(10000)).unwrap())
            .unwrap()
            .amount_out();
        session
            .execute(TradeRequest::new(TradeDirection::BToA, out).unwrap())
            .unwrap();

        assert!((session.pool().reserve_a() - dec!(1000000)).abs() < dec!(0.000001));
        assert!((session.pool().reserve_b() - dec!(500)).abs() < dec!(0.000001));
    }

    #[test]
    fn test_failed_trade_leaves_session_untouched() {
        let mut session = SimulationSession::new(pool(), AmmEngine::default()).unwrap();
        let before = session.pool().clone();

        let broken: TradeRequest =
            serde_json::from_str(r#"{"direction":"AToB","amount_in":"-1"}"#).unwrap();
        assert!(matches!(session.execute(broken), Err(SimError::InvalidInput(_))));
        assert_eq!(session.pool(), &before);
        assert!(session.history().is_empty());
    }

    #[test]
    fn test_execute_all_counts() {
        let mut session = SimulationSession::new(pool(), AmmEngine::new(30).unwrap()).unwrap();
        let requests = [dec!(100), dec!(200), dec!(300)]
            .into_iter()
            .map(|a| TradeRequest::new(TradeDirection::BToA, a).unwrap());
        assert_eq!(session.execute_all(requests).unwrap(), 3);
        assert_eq!(session.history().len(), 3);
        assert!(session.history().all_records().all(|s| s.fee_paid() > Decimal::ZERO));
    }

    #[test]
    fn test_signed_sell_priced_at_live_pool() {
        // 1,000,000 HEX against $6,000: buy $1000 then sell $500 worth at the moved price
        let usd_pool = PoolState::new("0xhex", "HEX", "USD", dec!(1000000), dec!(6000)).unwrap();
        let mut session = SimulationSession::new(usd_pool, AmmEngine::default()).unwrap();

        session.execute_signed(TradeDirection::BToA, dec!(1000)).unwrap();
        let moved = session.pool().clone();
        let sell = session.execute_signed(TradeDirection::BToA, dec!(-500)).unwrap();

        assert_eq!(sell.request().direction(), TradeDirection::AToB);
        let expected_hex = dec!(500) * moved.price_of(Asset::B).unwrap();
        assert_eq!(sell.request().amount_in(), expected_hex);
        // Worth $500 at the post-buy price, so fewer HEX than at the starting $0.006
        assert!(sell.request().amount_in() < dec!(83333));
        assert_eq!(session.history().len(), 2);
    }

    #[tokio::test]
    async fn test_from_provider() {
        let session = SimulationSession::from_provider(&FixedProvider, "0xabc", AmmEngine::default())
            .await
            .unwrap();
        assert_eq!(session.pool().address(), "0xabc");
        assert_eq!(session.pool().reserve_b(), dec!(500));
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn test_data_unavailable_propagates() {
        let err = SimulationSession::from_provider(&OfflineProvider, "0xabc", AmmEngine::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SimError::DataUnavailable(_)));
        assert!(err.to_string().starts_with("Cannot simulate without live data"));
    }
}
