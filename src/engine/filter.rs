//! New-account detection.
//!
//! A subject's very first share is bought by the subject itself, for
//! free, taking supply from 0 to 1. Every other trade is ordinary market
//! activity and is ignored.

use alloy::primitives::U256;

use crate::types::{Direction, TradeEvent};

/// `true` iff `event` looks like a subject's first self-purchase.
pub fn is_account_creation(event: &TradeEvent) -> bool {
    event.trader == event.subject
        && event.direction == Direction::Buy
        && event.eth_amount.is_zero()
        && event.share_amount == U256::from(1)
        && event.supply == U256::from(1)
}
