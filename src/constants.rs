//! Constants fixed by the platform chain design. None of these are
//! runtime-governable parameters; they are compiled-in network rules.

use chrono::{DateTime, TimeZone, Utc};
use chrono::Duration;

/// The minimum cushion between local wall-clock time and any tx's
/// start-time for that tx to be acceptable now.
pub const SYNCHRONY_BOUND_SECS: i64 = 10;

pub fn synchrony_bound() -> Duration {
  Duration::seconds(SYNCHRONY_BOUND_SECS)
}

pub const INFLATION_RATE: f64 = 1.04;
pub const BATCH_SIZE: usize = 30;
pub const MINIMUM_STAKE_AMOUNT: u64 = 10;
pub const NUMBER_OF_SHARES: u64 = 1_000_000;

pub fn minimum_staking_duration() -> Duration {
  Duration::hours(24)
}

pub fn maximum_staking_duration() -> Duration {
  Duration::days(365)
}

/// The latest representable second, used as the `+infinity` sentinel for
/// "no next event".
pub fn max_time() -> DateTime<Utc> {
  Utc.timestamp_opt(i32::MAX as i64, 0).single().expect("valid sentinel timestamp")
}

/// The distinguished subnet (id = zero) whose validators also secure the
/// platform chain.
pub const DEFAULT_SUBNET: [u8; 32] = [0u8; 32];

pub const MAINNET_ID: u32 = 1;
pub const TESTNET_ID: u32 = 2;
pub const LOCAL_ID: u32 = 12345;
