use chrono::{Duration, Utc};
use platformvm::{
  blocks::{Block, BlockPayload},
  constants::{self, DEFAULT_SUBNET},
  genesis::Genesis,
  network_id::{network_id, network_name},
  primitives::Address,
  state_store::StateStore,
  store::{Overlay, Store},
  txs::{ProposalTx, StakerEvent},
};
use std::sync::Arc;

fn ensure_codec_registered() {
  let _ = platformvm::init_codec();
}

struct EmptyStore;
impl Store for EmptyStore {
  fn get(&self, _key: &[u8]) -> platformvm::error::Result<Option<Vec<u8>>> {
    Ok(None)
  }
}

fn fresh_overlay_with_account(addr: Address, balance: u64, chain_time: chrono::DateTime<Utc>) -> Arc<Overlay> {
  let mut overlay = Overlay::new(Arc::new(EmptyStore));
  let mut store = StateStore::new(&mut overlay);
  store.put_account(platformvm::primitives::Account::new(addr, balance)).unwrap();
  store.set_chain_time(chain_time).unwrap();
  Arc::new(overlay)
}

#[test]
fn network_id_resolves_canonical_and_literal_forms() {
  assert_eq!(network_id("mainnet").unwrap(), 1);
  assert_eq!(network_id("Mainnet").unwrap(), 1);
  assert_eq!(network_id("network-77").unwrap(), 77);
  assert!(network_id("network-4294967296").is_err());
  assert_eq!(network_id("local").unwrap(), 12345);
}

#[test]
fn network_name_maps_known_and_unknown_ids() {
  assert_eq!(network_name(1), "mainnet");
  assert_eq!(network_name(999), "network-999");
}

#[test]
fn genesis_succeeds_only_for_the_local_network() {
  ensure_codec_registered();
  assert!(Genesis::for_network(12345).is_ok());
  assert!(Genesis::for_network(7).is_err());
}

#[test]
fn add_default_subnet_validator_pending_flow_diverges_on_commit_vs_abort() {
  let addr = Address::from_bytes([7u8; 20]);
  let now = Utc::now();
  let parent = fresh_overlay_with_account(addr, 100, now);

  let event = StakerEvent {
    id: b"validator-1".to_vec(),
    node_id: addr,
    start_time: now + Duration::hours(1),
    end_time: now + Duration::hours(25),
    stake_amount: 10,
    reward_address: addr,
    subnet_id: DEFAULT_SUBNET,
    delegation_shares: None,
  };

  let mut proposal = Block::new([0; 32], 1, BlockPayload::Proposal(ProposalTx::AddValidator(event)), now, [1; 32]);
  proposal.verify(&parent, None, now, now).unwrap();
  let verified = proposal.as_verified_proposal().unwrap();

  let mut commit = Block::new(proposal.id, 2, BlockPayload::Commit, now, [2; 32]);
  commit.verify(&parent, Some(&verified), now, now).unwrap();
  let mut committed = (*commit.overlay().unwrap()).clone();
  let committed_store = StateStore::new(&mut committed);
  assert_eq!(committed_store.account(&addr).unwrap().unwrap().balance, 90);
  assert_eq!(committed_store.pending_validators(&DEFAULT_SUBNET).unwrap().len(), 1);

  let mut abort = Block::new(proposal.id, 2, BlockPayload::Abort, now, [3; 32]);
  abort.verify(&parent, Some(&verified), now, now).unwrap();
  let mut aborted = (*abort.overlay().unwrap()).clone();
  let aborted_store = StateStore::new(&mut aborted);
  assert_eq!(aborted_store.account(&addr).unwrap().unwrap().balance, 100);
  assert_eq!(aborted_store.pending_validators(&DEFAULT_SUBNET).unwrap().len(), 0);
}

#[test]
fn advance_time_fails_with_no_justifying_validator_change() {
  let addr = Address::from_bytes([8u8; 20]);
  let now = Utc::now();
  let parent = fresh_overlay_with_account(addr, 0, now);

  let tx = ProposalTx::AdvanceTime(now + Duration::hours(2));
  assert!(tx.semantic_verify(&parent, now, now).is_err());
}

#[test]
fn reward_validator_commit_credits_and_abort_forfeits() {
  let addr = Address::from_bytes([9u8; 20]);
  let now = Utc::now();
  let parent = fresh_overlay_with_account(addr, 0, now);

  let mut child = parent.child();
  {
    let mut store = StateStore::new(&mut child);
    let mut current = store.current_validators(&DEFAULT_SUBNET).unwrap();
    current.push(StakerEvent {
      id: b"validator-2".to_vec(),
      node_id: addr,
      start_time: now - Duration::hours(24),
      end_time: now,
      stake_amount: 100_000,
      reward_address: addr,
      subnet_id: DEFAULT_SUBNET,
      delegation_shares: None,
    });
    store.put_current_validators(&DEFAULT_SUBNET, &current).unwrap();
  }
  let parent = Arc::new(child);

  let tx = ProposalTx::RewardValidator(b"validator-2".to_vec());
  let (commit, abort) = tx.semantic_verify(&parent, now, now).unwrap();

  let mut commit = commit;
  let commit_store = StateStore::new(&mut commit);
  let balance_after_commit = commit_store.account(&addr).unwrap().unwrap().balance;
  assert!(balance_after_commit > 100_000, "reward should be credited on top of the returned stake");
  assert!(commit_store.current_validators(&DEFAULT_SUBNET).unwrap().is_empty());

  let mut abort = abort;
  let abort_store = StateStore::new(&mut abort);
  assert_eq!(
    abort_store.account(&addr).unwrap().unwrap().balance,
    100_000,
    "only the bonded stake is returned, no reward"
  );
  assert!(abort_store.current_validators(&DEFAULT_SUBNET).unwrap().is_empty());
}

#[test]
fn codec_round_trips_every_registered_type() {
  ensure_codec_registered();
  let genesis = Genesis::for_network(constants::LOCAL_ID).unwrap();
  let bytes = genesis.marshal().unwrap();
  let back = Genesis::unmarshal(&bytes).unwrap();
  assert_eq!(genesis, back);
}
