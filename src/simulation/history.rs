//! Simulation history log
//!
//! Append-only record of every simulated step. Step indices must be strictly
//! increasing; anything else is an integrity violation of the session.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::engine::TradeOutcome;
use crate::error::{Result, SimError};
use crate::pools::{PoolState, TradeRequest};

/// One applied trade: the pool before and after, and what it cost
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationStep {
    step_index: u64,
    request: TradeRequest,
    pre_state: PoolState,
    post_state: PoolState,
    amount_out: Decimal,
    price_impact_pct: Decimal,
    fee_paid: Decimal,
    spot_price_before: Decimal,
    spot_price_after: Decimal,
    execution_price: Decimal,
}

impl SimulationStep {
    pub(crate) fn new(
        step_index: u64,
        request: TradeRequest,
        pre_state: PoolState,
        outcome: TradeOutcome,
    ) -> Result<Self> {
        let spot_price_after = outcome
            .new_state
            .price_of(request.direction().input())?;

        Ok(Self {
            step_index,
            request,
            pre_state,
            post_state: outcome.new_state,
            amount_out: outcome.amount_out,
            price_impact_pct: outcome.price_impact_pct,
            fee_paid: outcome.fee_paid,
            spot_price_before: outcome.spot_price,
            spot_price_after,
            execution_price: outcome.execution_price,
        })
    }

    pub fn step_index(&self) -> u64 {
        self.step_index
    }

    pub fn request(&self) -> &TradeRequest {
        &self.request
    }

    pub fn pre_state(&self) -> &PoolState {
        &self.pre_state
    }

    pub fn post_state(&self) -> &PoolState {
        &self.post_state
    }

    pub fn amount_out(&self) -> Decimal {
        self.amount_out
    }

    pub fn price_impact_pct(&self) -> Decimal {
        self.price_impact_pct
    }

    pub fn fee_paid(&self) -> Decimal {
        self.fee_paid
    }

    /// Price of the input asset (in output units) before the trade
    pub fn spot_price_before(&self) -> Decimal {
        self.spot_price_before
    }

    /// Price of the input asset (in output units) after the trade
    pub fn spot_price_after(&self) -> Decimal {
        self.spot_price_after
    }

    pub fn execution_price(&self) -> Decimal {
        self.execution_price
    }

    /// Shortfall of the received amount against a zero-impact fill, in percent
    pub fn slippage_pct(&self) -> Result<Decimal> {
        let expected = self
            .request
            .amount_in()
            .checked_mul(self.spot_price_before)
            .ok_or_else(|| overflow("expected fill", self.step_index))?;
        if expected.is_zero() {
            return Ok(Decimal::ZERO);
        }
        (expected - self.amount_out)
            .checked_div(expected)
            .and_then(|r| r.checked_mul(dec!(100)))
            .ok_or_else(|| overflow("slippage", self.step_index))
    }

    /// New spot over old spot, for the output asset priced in input units
    ///
    /// A buy of the output asset pushes this above 1.
    pub fn price_change_ratio(&self) -> Result<Decimal> {
        if self.spot_price_after.is_zero() {
            return Ok(Decimal::ZERO);
        }
        self.spot_price_before
            .checked_div(self.spot_price_after)
            .ok_or_else(|| overflow("price change", self.step_index))
    }

    pub fn x_factor(&self) -> Result<Decimal> {
        x_factor(self.price_change_ratio()?)
    }
}

fn overflow(what: &str, step_index: u64) -> SimError {
    SimError::InvalidInput(format!("{} of step {} overflows", what, step_index))
}

/// Multiple a price moved by; falls are reported as the negative reciprocal
pub fn x_factor(price_change_ratio: Decimal) -> Result<Decimal> {
    if price_change_ratio >= Decimal::ONE || price_change_ratio.is_zero() {
        Ok(price_change_ratio)
    } else {
        Decimal::ONE
            .checked_div(price_change_ratio)
            .map(|x| -x)
            .ok_or_else(|| SimError::InvalidInput(format!("x factor of {} overflows", price_change_ratio)))
    }
}

/// Ordered, append-only log of simulation steps
#[derive(Debug, Default, Clone)]
pub struct SimulationHistory {
    records: Vec<SimulationStep>,
}

impl SimulationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, step: SimulationStep) -> Result<&SimulationStep> {
        if let Some(last) = self.records.last() {
            if step.step_index <= last.step_index {
                return Err(SimError::OutOfOrderAppend {
                    last: last.step_index,
                    attempted: step.step_index,
                });
            }
        }
        self.records.push(step);
        Ok(&self.records[self.records.len() - 1])
    }

    /// Iterate in append order; call again to restart
    pub fn all_records(&self) -> std::slice::Iter<'_, SimulationStep> {
        self.records.iter()
    }

    pub fn latest(&self) -> Option<&SimulationStep> {
        self.records.last()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Index the next appended step should carry
    pub fn next_step_index(&self) -> u64 {
        self.records.last().map(|s| s.step_index + 1).unwrap_or(1)
    }

    /// Records strictly after `step_index`
    pub fn since(&self, step_index: u64) -> impl Iterator<Item = &SimulationStep> {
        self.records.iter().filter(move |s| s.step_index > step_index)
    }

    /// Price move of pool asset A (in B units) from the first step to the latest, in percent
    pub fn cumulative_change_pct(&self) -> Result<Option<Decimal>> {
        let (first, last) = match (self.records.first(), self.records.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Ok(None),
        };

        let start = first.pre_state.price_of(crate::pools::Asset::A)?;
        let end = last.post_state.price_of(crate::pools::Asset::A)?;
        (end - start)
            .checked_div(start)
            .and_then(|r| r.checked_mul(dec!(100)))
            .map(Some)
            .ok_or_else(|| {
                SimError::InvalidInput(format!("price change {} -> {} overflows", start, end))
            })
    }
}
