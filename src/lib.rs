pub mod aliases;
pub mod blocks;
pub mod cli;
pub mod codec;
pub mod constants;
pub mod consumer;
pub mod error;
pub mod event_heap;
pub mod genesis;
pub mod network_id;
pub mod primitives;
pub mod rpc;
pub mod scheduler;
pub mod state_store;
pub mod store;
pub mod txs;
pub mod vm;

/// Registers the crate's canonical wire types exactly once. Must be
/// called before any `genesis`/codec operation; a second call returns a
/// fatal error rather than silently succeeding.
pub fn init_codec() -> error::Result<()> {
  codec::init(&[
    (codec::tags::ACCOUNT, "account"),
    (codec::tags::STAKER_EVENT, "staker_event"),
    (codec::tags::CHAIN, "chain"),
    (codec::tags::GENESIS, "genesis"),
    (codec::tags::SUBNET, "subnet"),
  ])
}
