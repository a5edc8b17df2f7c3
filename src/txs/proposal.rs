use super::StakerEvent;
use crate::{
  constants::{self, DEFAULT_SUBNET},
  error::{PlatformError, Result},
  event_heap::HeapKey,
  primitives::Address,
  state_store::StateStore,
  store::Overlay,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Proposal transactions: each produces a `(onCommit, onAbort)` pair of
/// speculative overlays, exactly one of which is ever accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ProposalTx {
  AddValidator(StakerEvent),
  AddDelegator(StakerEvent),
  AddNonDefaultSubnetValidator { event: StakerEvent, signatures: Vec<Vec<u8>> },
  AdvanceTime(DateTime<Utc>),
  RewardValidator(Vec<u8>),
}

impl ProposalTx {
  /// Local checks: fields in range, durations within bounds, stake above
  /// the minimum. Signature well-formedness is enforced by the caller
  /// (the outer block envelope carries and checks the signature itself;
  /// this method validates the staker-event fields the signature covers).
  pub fn syntactic_verify(&self) -> Result<()> {
    match self {
      ProposalTx::AddValidator(e) | ProposalTx::AddDelegator(e) => verify_event_fields(e),
      ProposalTx::AddNonDefaultSubnetValidator { event, signatures } => {
        if signatures.is_empty() {
          return Err(PlatformError::user("non-default subnet validator requires signatures"));
        }
        verify_event_fields(event)
      }
      ProposalTx::AdvanceTime(_) => Ok(()),
      ProposalTx::RewardValidator(id) => {
        if id.is_empty() {
          return Err(PlatformError::user("reward validator id must not be empty"));
        }
        Ok(())
      }
    }
  }

  /// Produces the `(onCommit, onAbort)` overlays this proposal would yield
  /// against `parent`.
  pub fn semantic_verify(
    &self,
    parent: &Arc<Overlay>,
    parent_time: DateTime<Utc>,
    now: DateTime<Utc>,
  ) -> Result<(Overlay, Overlay)> {
    match self {
      ProposalTx::AddValidator(e) => add_staker(parent, e, parent_time, now, true),
      ProposalTx::AddDelegator(e) => add_staker(parent, e, parent_time, now, false),
      ProposalTx::AddNonDefaultSubnetValidator { event, .. } => {
        add_non_default_validator(parent, event, parent_time, now)
      }
      ProposalTx::AdvanceTime(t) => advance_time(parent, parent_time, now, *t),
      ProposalTx::RewardValidator(id) => reward_validator(parent, parent_time, id),
    }
  }
}

fn verify_event_fields(e: &StakerEvent) -> Result<()> {
  if e.start_time >= e.end_time {
    return Err(PlatformError::user("startTime must be strictly before endTime"));
  }
  let duration = e.end_time - e.start_time;
  if duration < constants::minimum_staking_duration()
    || duration > constants::maximum_staking_duration()
  {
    return Err(PlatformError::user("staking duration out of bounds"));
  }
  if e.stake_amount < constants::MINIMUM_STAKE_AMOUNT {
    return Err(PlatformError::user("stake below minimum"));
  }
  Ok(())
}

fn is_staking_in_subnet(store: &StateStore, subnet: &[u8; 32], node_id: &Address) -> Result<bool> {
  let current = store.current_validators(subnet)?;
  let pending = store.pending_validators(subnet)?;
  Ok(current.iter().any(|e| &e.node_id == node_id) || pending.iter().any(|e| &e.node_id == node_id))
}

fn add_staker(
  parent: &Arc<Overlay>,
  event: &StakerEvent,
  parent_time: DateTime<Utc>,
  now: DateTime<Utc>,
  is_validator: bool,
) -> Result<(Overlay, Overlay)> {
  verify_event_fields(event)?;

  if event.start_time <= parent_time + constants::synchrony_bound() {
    return Err(PlatformError::user("startTime violates the synchrony bound"));
  }
  if event.start_time <= now {
    return Err(PlatformError::user("startTime must be in the future"));
  }

  let on_commit = {
    let mut commit = parent.child();
    let mut store = StateStore::new(&mut commit);

    if is_validator && is_staking_in_subnet(&store, &event.subnet_id, &event.node_id)? {
      return Err(PlatformError::user("validator already staking in this subnet"));
    }

    let mut account = store
      .account(&event.node_id)?
      .ok_or_else(|| PlatformError::user("unknown staker account"))?;
    account.debit(event.stake_amount)?;
    store.put_account(account)?;

    let mut pending = store.pending_validators(&event.subnet_id)?;
    pending.push(event.clone());
    store.put_pending_validators(&event.subnet_id, &pending)?;
    commit
  };

  let on_abort = parent.child();
  Ok((on_commit, on_abort))
}

fn add_non_default_validator(
  parent: &Arc<Overlay>,
  event: &StakerEvent,
  parent_time: DateTime<Utc>,
  now: DateTime<Utc>,
) -> Result<(Overlay, Overlay)> {
  verify_event_fields(event)?;
  if event.start_time <= parent_time + constants::synchrony_bound() {
    return Err(PlatformError::user("startTime violates the synchrony bound"));
  }
  if event.start_time <= now {
    return Err(PlatformError::user("startTime must be in the future"));
  }

  let on_commit = {
    let mut commit = parent.child();
    let mut store = StateStore::new(&mut commit);
    if is_staking_in_subnet(&store, &event.subnet_id, &event.node_id)? {
      return Err(PlatformError::user("validator already staking in this subnet"));
    }
    // no stake debit for non-default-subnet validators.
    let mut pending = store.pending_validators(&event.subnet_id)?;
    pending.push(event.clone());
    store.put_pending_validators(&event.subnet_id, &pending)?;
    commit
  };

  let on_abort = parent.child();
  Ok((on_commit, on_abort))
}

/// The earliest time any subnet's validator set would next change: the
/// min of the next Pending start-time or the next non-default-subnet
/// Current end-time, across all known subnets.
pub fn next_validator_change_time(store: &StateStore, subnets: &[[u8; 32]]) -> Result<DateTime<Utc>> {
  let mut next = constants::max_time();
  for subnet in subnets {
    let pending = store.pending_validators(subnet)?;
    if pending.timestamp() < next {
      next = pending.timestamp();
    }
    if subnet != &DEFAULT_SUBNET {
      let current = store.current_validators(subnet)?;
      if current.timestamp() < next {
        next = current.timestamp();
      }
    }
  }
  Ok(next)
}

fn advance_time(
  parent: &Arc<Overlay>,
  parent_time: DateTime<Utc>,
  now: DateTime<Utc>,
  target: DateTime<Utc>,
) -> Result<(Overlay, Overlay)> {
  if !(parent_time < target && target <= now + constants::synchrony_bound()) {
    return Err(PlatformError::user("advance-time target out of the allowed window"));
  }

  let mut commit = parent.child();
  let subnets = {
    let store = StateStore::new(&mut commit);
    let mut subnets = store.subnets()?.into_iter().map(|s| s.id).collect::<Vec<_>>();
    if !subnets.contains(&DEFAULT_SUBNET) {
      subnets.push(DEFAULT_SUBNET);
    }
    subnets
  };

  {
    let store = StateStore::new(&mut commit);
    let next_change = next_validator_change_time(&store, &subnets)?;
    if target > next_change {
      return Err(PlatformError::user(
        "advance-time target must not exceed the next validator change",
      ));
    }
  }

  let mut store = StateStore::new(&mut commit);
  for subnet in &subnets {
    let mut pending = store.pending_validators(subnet)?;
    let promoted = pending.drain_up_to(target);
    store.put_pending_validators(subnet, &pending)?;

    let mut current = store.current_validators(subnet)?;
    for event in promoted {
      current.push(event);
    }

    if subnet != &DEFAULT_SUBNET {
      // non-default-subnet current events whose end_time has passed are
      // removed here; default-subnet events are only removed by reward.
      let mut kept = crate::event_heap::EventHeap::new(HeapKey::EndTime);
      while let Some(event) = current.pop() {
        if event.end_time > target {
          kept.push(event);
        }
      }
      current = kept;
    }
    store.put_current_validators(subnet, &current)?;
  }
  store.set_chain_time(target)?;

  let on_abort = parent.child();
  Ok((commit, on_abort))
}

fn reward_validator(
  parent: &Arc<Overlay>,
  parent_time: DateTime<Utc>,
  id: &[u8],
) -> Result<(Overlay, Overlay)> {
  let mut probe = parent.child();
  let store = StateStore::new(&mut probe);
  let mut current = store.current_validators(&DEFAULT_SUBNET)?;
  let top = current
    .peek()
    .ok_or_else(|| PlatformError::user("no current default-subnet validator to reward"))?;
  if top.end_time != parent_time || top.id != id {
    return Err(PlatformError::user("reward-validator target is not the next to expire"));
  }
  let event = current.pop().unwrap();

  let on_commit = {
    let mut commit = parent.child();
    let mut store = StateStore::new(&mut commit);
    let mut current = store.current_validators(&DEFAULT_SUBNET)?;
    current.pop();
    store.put_current_validators(&DEFAULT_SUBNET, &current)?;

    let reward = compute_reward(&event);
    credit_reward(&mut store, &event, reward)?;
    commit
  };

  let on_abort = {
    let mut abort = parent.child();
    let mut store = StateStore::new(&mut abort);
    let mut current = store.current_validators(&DEFAULT_SUBNET)?;
    current.pop();
    store.put_current_validators(&DEFAULT_SUBNET, &current)?;
    // forfeiture: no reward credited, but bonded stake is still returned.
    let mut account = store
      .account(&event.node_id)?
      .ok_or_else(|| PlatformError::fatal("staker account vanished"))?;
    account.credit(event.stake_amount);
    store.put_account(account)?;
    abort
  };

  Ok((on_commit, on_abort))
}

/// `R = stake * duration * InflationRate`, split `shares / NumberOfShares`
/// to the validator and the rest pro-rata to delegators by delegated
/// stake. This model has no separate delegator records bonded against the
/// same event, so the full share split collapses to the validator when
/// `delegation_shares` is absent.
fn compute_reward(event: &StakerEvent) -> u64 {
  let duration_secs = (event.end_time - event.start_time).num_seconds().max(0) as f64;
  let base = event.stake_amount as f64 * duration_secs * (constants::INFLATION_RATE - 1.0)
    / constants::maximum_staking_duration().num_seconds() as f64;
  let reward = match event.delegation_shares {
    Some(shares) => base * (shares as f64 / constants::NUMBER_OF_SHARES as f64),
    None => base,
  };
  reward.max(0.0) as u64
}

fn credit_reward(store: &mut StateStore, event: &StakerEvent, reward: u64) -> Result<()> {
  let mut staker = store
    .account(&event.node_id)?
    .ok_or_else(|| PlatformError::fatal("staker account vanished"))?;
  staker.credit(event.stake_amount);
  store.put_account(staker)?;

  let mut reward_acct = store
    .account(&event.reward_address)?
    .unwrap_or_else(|| crate::primitives::Account::new(event.reward_address, 0));
  reward_acct.credit(reward);
  store.put_account(reward_acct)?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{primitives::Account, store::Store};
  use chrono::Duration;

  struct EmptyStore;
  impl Store for EmptyStore {
    fn get(&self, _key: &[u8]) -> Result<Option<Vec<u8>>> {
      Ok(None)
    }
  }

  fn base_overlay_with_account(addr: Address, balance: u64) -> Arc<Overlay> {
    let mut overlay = Overlay::new(Arc::new(EmptyStore));
    let mut store = StateStore::new(&mut overlay);
    store.put_account(Account::new(addr, balance)).unwrap();
    store.set_chain_time(Utc::now()).unwrap();
    Arc::new(overlay)
  }

  #[test]
  fn add_validator_debits_stake_on_commit_only() {
    let addr = Address::from_bytes([5u8; 20]);
    let now = Utc::now();
    let parent = base_overlay_with_account(addr, 100);
    let event = StakerEvent {
      id: vec![1],
      node_id: addr,
      start_time: now + Duration::hours(1),
      end_time: now + Duration::hours(25),
      stake_amount: 10,
      reward_address: addr,
      subnet_id: DEFAULT_SUBNET,
      delegation_shares: None,
    };
    let tx = ProposalTx::AddValidator(event);
    let (commit, abort) = tx.semantic_verify(&parent, now, now).unwrap();

    let mut commit = commit;
    let commit_store = StateStore::new(&mut commit);
    assert_eq!(commit_store.account(&addr).unwrap().unwrap().balance, 90);

    let mut abort = abort;
    let abort_store = StateStore::new(&mut abort);
    assert_eq!(abort_store.account(&addr).unwrap().unwrap().balance, 100);
  }

  #[test]
  fn add_validator_rejects_synchrony_bound_violation() {
    let addr = Address::from_bytes([5u8; 20]);
    let now = Utc::now();
    let parent = base_overlay_with_account(addr, 100);
    let event = StakerEvent {
      id: vec![1],
      node_id: addr,
      start_time: now + Duration::seconds(5),
      end_time: now + Duration::hours(25),
      stake_amount: 10,
      reward_address: addr,
      subnet_id: DEFAULT_SUBNET,
      delegation_shares: None,
    };
    let tx = ProposalTx::AddValidator(event);
    assert!(tx.semantic_verify(&parent, now, now).is_err());
  }

  #[test]
  fn reward_validator_requires_matching_top_of_current() {
    let addr = Address::from_bytes([5u8; 20]);
    let now = Utc::now();
    let parent = base_overlay_with_account(addr, 0);
    let tx = ProposalTx::RewardValidator(vec![1]);
    assert!(tx.semantic_verify(&parent, now, now).is_err());
  }
}
