// soulseer-core/src/config.rs

use std::time::Duration;
use rust_decimal::Decimal;
use soulseer_common::models::money::usd;

/// Business constants for metering, settlement, deposits and payouts.
#[derive(Debug, Clone)]
pub struct MeteringConfig {
    /// A client needs this many minutes' worth of balance to start a session.
    pub floor_minutes: i64,
    /// Fraction of each session's cost credited to the reader.
    pub reader_share: Decimal,
    pub minimum_payout: Decimal,
    pub minimum_deposit: Decimal,
    pub maximum_deposit: Decimal,
    /// How often the balance sweep runs. Also its look-ahead window.
    pub sweep_interval: Duration,
    pub max_message_len: usize,
}

impl Default for MeteringConfig {
    fn default() -> Self {
        Self {
            floor_minutes: 3,
            reader_share: Decimal::new(70, 2),
            minimum_payout: usd(1500),
            minimum_deposit: usd(500),
            maximum_deposit: usd(100_000),
            sweep_interval: Duration::from_secs(15),
            max_message_len: 4000,
        }
    }
}

impl MeteringConfig {
    /// Minimum balance needed to start a session at `rate_per_minute`.
    pub fn balance_floor(&self, rate_per_minute: Decimal) -> Decimal {
        rate_per_minute * Decimal::from(self.floor_minutes)
    }
}
