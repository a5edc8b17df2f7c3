//! The transaction set: staker events (add-validator, add-delegator),
//! proposal transactions (advance-time, reward-validator) and decision
//! transactions (create-chain, create-subnet).

mod decision;
mod proposal;

pub use decision::DecisionTx;
pub use proposal::{next_validator_change_time, ProposalTx};

use crate::primitives::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `(nodeId, startTime, endTime, stakeAmount, rewardAddress, subnetId,
/// delegationShares?)`. Always `startTime < endTime`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakerEvent {
  pub id: Vec<u8>,
  pub node_id: Address,
  pub start_time: DateTime<Utc>,
  pub end_time: DateTime<Utc>,
  pub stake_amount: u64,
  pub reward_address: Address,
  pub subnet_id: [u8; 32],
  pub delegation_shares: Option<u64>,
}

/// `(id, subnetId, networkId, vmId, fxIds[], name, genesisData, controlKeys,
/// threshold)`. Immutable after creation. `controlKeys`/`threshold` mirror
/// the creating subnet's control configuration at creation time; they are
/// carried on the record itself (rather than looked up by `subnetId`) so a
/// chain's genesis entry is self-contained on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chain {
  pub id: [u8; 32],
  pub subnet_id: [u8; 32],
  pub network_id: u32,
  pub vm_id: [u8; 32],
  pub fx_ids: Vec<[u8; 32]>,
  pub name: String,
  pub genesis_data: Vec<u8>,
  pub control_keys: Vec<Address>,
  pub threshold: u32,
}

/// `(id, controlKeys, threshold)`. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subnet {
  pub id: [u8; 32],
  pub control_keys: Vec<Address>,
  pub threshold: u32,
}
