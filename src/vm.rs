//! The VM facade: implements the contract the outer consensus engine
//! calls (`initialize`, `build_block`, `parse_block`, `get_block`,
//! `set_preference`, `create_handlers`, `shutdown`), wiring together the
//! codec, store, event heaps, transactions, blocks and scheduler.
//!
//! The process-wide lock the outer engine's Context would otherwise hold
//! is modeled here as a single `tokio::sync::Mutex<VmInner>` owned by
//! this handle; every public method acquires it for the duration of the
//! call, so all state transitions are serialized.

use crate::{
  blocks::{Block, BlockId, BlockPayload},
  constants::{self, DEFAULT_SUBNET},
  consumer::ChainManagerNotifier,
  error::{PlatformError, Result},
  event_heap::{EventHeap, HeapKey},
  genesis::Genesis,
  scheduler::{ReadyReason, Scheduler, SchedulerHandle},
  state_store::StateStore,
  store::Overlay,
  txs::{DecisionTx, ProposalTx, StakerEvent},
};
use chrono::Utc;
use sha3::{Digest, Sha3_256};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::Mutex;
use tracing::{info, instrument};

struct VmInner {
  db: sled::Db,
  pending: HashMap<BlockId, Block>,
  accepted_tip: BlockId,
  accepted_height: u64,
  accepted_overlay: Arc<Overlay>,
  preference: BlockId,
  unissued_decision_txs: Vec<DecisionTx>,
  unissued_events: EventHeap,
  chain_manager: Option<Arc<ChainManagerNotifier>>,
  genesis: Arc<Genesis>,
}

const GENESIS_BLOCK_ID: BlockId = [0u8; 32];

pub struct Vm {
  inner: Mutex<VmInner>,
  scheduler: Scheduler,
}

impl Vm {
  /// `fxs` must be empty — feature extensions are unsupported.
  #[instrument(skip(db_path, genesis_bytes))]
  pub fn initialize(db_path: &std::path::Path, genesis_bytes: &[u8], fxs: &[String]) -> Result<(Arc<Self>, SchedulerHandle)> {
    if !fxs.is_empty() {
      return Err(PlatformError::fatal("unsupported feature extensions"));
    }
    let db = sled::open(db_path)?;
    let genesis = Genesis::unmarshal(genesis_bytes)?;

    let base: Arc<dyn crate::store::Store> = Arc::new(db.clone());
    let mut root = Overlay::new(base);
    {
      let mut store = StateStore::new(&mut root);
      if !store.is_initialized()? {
        for account in &genesis.accounts {
          store.put_account(account.clone())?;
        }
        let mut current = EventHeap::new(HeapKey::EndTime);
        let mut pending = EventHeap::new(HeapKey::StartTime);
        for v in &genesis.validators {
          if v.start_time <= genesis.timestamp {
            current.push(v.clone());
          } else {
            pending.push(v.clone());
          }
        }
        store.put_current_validators(&DEFAULT_SUBNET, &current)?;
        store.put_pending_validators(&DEFAULT_SUBNET, &pending)?;
        store.put_chains(&genesis.chains)?;
        store.put_subnets(&[])?;
        store.set_chain_time(genesis.timestamp)?;
        store.mark_initialized();
      }
      root.commit(&db)?;
    }

    let accepted_overlay = Arc::new(Overlay::new(Arc::new(db.clone())));
    let (scheduler, handle) = Scheduler::new();
    let vm = Arc::new(Self {
      inner: Mutex::new(VmInner {
        db,
        pending: HashMap::new(),
        accepted_tip: GENESIS_BLOCK_ID,
        accepted_height: 0,
        accepted_overlay,
        preference: GENESIS_BLOCK_ID,
        unissued_decision_txs: Vec::new(),
        unissued_events: EventHeap::new(HeapKey::StartTime),
        chain_manager: None,
        genesis: Arc::new(genesis),
      }),
      scheduler,
    });
    info!("platform chain vm initialized");
    Ok((vm, handle))
  }

  /// Attaches the chain manager notified whenever an accepted Standard
  /// block carries a `CreateChain` transaction. Unset by default, so the
  /// demo harness can run without one.
  pub async fn set_chain_manager(&self, manager: Arc<ChainManagerNotifier>) {
    self.inner.lock().await.chain_manager = Some(manager);
  }

  pub async fn issue_decision_tx(&self, tx: DecisionTx) {
    let mut inner = self.inner.lock().await;
    inner.unissued_decision_txs.push(tx);
    drop(inner);
    self.scheduler.notify_ready(ReadyReason::DecisionTxsPending);
  }

  pub async fn issue_staker_event(&self, event: StakerEvent) {
    let mut inner = self.inner.lock().await;
    inner.unissued_events.push(event);
  }

  pub async fn genesis(&self) -> Arc<Genesis> {
    self.inner.lock().await.genesis.clone()
  }

  pub async fn chain_time(&self) -> Result<chrono::DateTime<Utc>> {
    let inner = self.inner.lock().await;
    let mut child = inner.accepted_overlay.child();
    let store = StateStore::new(&mut child);
    store.chain_time()
  }

  pub async fn current_validators(&self, subnet: &[u8; 32]) -> Result<Vec<StakerEvent>> {
    let inner = self.inner.lock().await;
    let mut child = inner.accepted_overlay.child();
    let store = StateStore::new(&mut child);
    Ok(store.current_validators(subnet)?.iter().cloned().collect())
  }

  fn overlay_for(inner: &VmInner, id: &BlockId) -> Option<Arc<Overlay>> {
    if *id == inner.accepted_tip {
      Some(inner.accepted_overlay.clone())
    } else {
      inner.pending.get(id).and_then(|b| b.overlay())
    }
  }

  /// Re-runs the five-step decision procedure and returns the chosen
  /// block, or `None` when called early and nothing is ready to build
  /// (not an error). A preferred block that is itself an unresolved
  /// Proposal takes priority over all five steps: it must be resolved
  /// into a Commit or Abort before anything else can be built on top of
  /// it.
  #[instrument(skip(self))]
  pub async fn build_block(&self) -> Result<Option<Block>> {
    let mut inner = self.inner.lock().await;
    let now = Utc::now();

    // step 0: resolve a pending preferred proposal into Commit or Abort.
    if inner.preference != inner.accepted_tip {
      if let Some(pref) = inner.pending.get(&inner.preference).cloned() {
        if let BlockPayload::Proposal(tx) = &pref.payload {
          if pref.overlay().is_none() {
            let grandparent_overlay = Self::overlay_for(&inner, &pref.parent_id)
              .ok_or_else(|| PlatformError::block("preferred proposal's parent overlay is unavailable"))?;
            let grandparent_time = {
              let mut child = grandparent_overlay.child();
              let store = StateStore::new(&mut child);
              store.chain_time()?
            };
            let payload = match tx.semantic_verify(&grandparent_overlay, grandparent_time, now) {
              Ok(_) => BlockPayload::Commit,
              Err(_) => BlockPayload::Abort,
            };
            let height = pref.height + 1;
            let id = compute_block_id(&pref.id, height, &payload);
            return Ok(Some(Block::new(pref.id, height, payload, now, id)));
          }
        }
      }
    }

    // resolve the parent to build on: the preference, falling back to
    // the last accepted block when the preference is unset, unknown, or
    // itself already accepted.
    let (parent_id, parent_height, parent_overlay) = match inner.pending.get(&inner.preference).and_then(|b| b.overlay().map(|o| (b.id, b.height, o))) {
      Some(resolved) => resolved,
      None => (inner.accepted_tip, inner.accepted_height, inner.accepted_overlay.clone()),
    };
    let parent_time = {
      let mut child = parent_overlay.child();
      let store = StateStore::new(&mut child);
      store.chain_time()?
    };

    // step 1: decision txs pending.
    if !inner.unissued_decision_txs.is_empty() {
      let batch_len = constants::BATCH_SIZE.min(inner.unissued_decision_txs.len());
      let take = inner.unissued_decision_txs.drain(..batch_len).collect();
      let payload = BlockPayload::Standard(take);
      let height = parent_height + 1;
      let id = compute_block_id(&parent_id, height, &payload);
      let block = Block::new(parent_id, height, payload, now, id);
      return Ok(Some(block));
    }

    let subnets = {
      let mut probe = parent_overlay.child();
      let store = StateStore::new(&mut probe);
      let mut ids: Vec<_> = store.subnets()?.into_iter().map(|s| s.id).collect();
      if !ids.contains(&DEFAULT_SUBNET) {
        ids.push(DEFAULT_SUBNET);
      }
      ids
    };

    // step 2: default-subnet reward due.
    let end_ds = {
      let mut probe = parent_overlay.child();
      let store = StateStore::new(&mut probe);
      store.current_validators(&DEFAULT_SUBNET)?.timestamp()
    };
    if parent_time == end_ds {
      let mut probe = parent_overlay.child();
      let store = StateStore::new(&mut probe);
      let id = store.current_validators(&DEFAULT_SUBNET)?.peek().unwrap().id.clone();
      let payload = BlockPayload::Proposal(ProposalTx::RewardValidator(id));
      let height = parent_height + 1;
      let block_id = compute_block_id(&parent_id, height, &payload);
      return Ok(Some(Block::new(parent_id, height, payload, now, block_id)));
    }

    // step 3: an overdue validator-set change justifies AdvanceTime.
    let next_change = {
      let mut probe = parent_overlay.child();
      let store = StateStore::new(&mut probe);
      crate::txs::next_validator_change_time(&store, &subnets)?
    };
    if now >= next_change {
      let payload = BlockPayload::Proposal(ProposalTx::AdvanceTime(next_change));
      let height = parent_height + 1;
      let block_id = compute_block_id(&parent_id, height, &payload);
      return Ok(Some(Block::new(parent_id, height, payload, now, block_id)));
    }

    // step 4: drop events that slipped past the inclusion window, then
    // try to include the new head.
    let cutoff = now + constants::synchrony_bound();
    inner.unissued_events.drain_up_to(cutoff);
    if let Some(head) = inner.unissued_events.peek() {
      if head.start_time > cutoff {
        let event = inner.unissued_events.pop().unwrap();
        let payload = BlockPayload::Proposal(ProposalTx::AddValidator(event));
        let height = parent_height + 1;
        let block_id = compute_block_id(&parent_id, height, &payload);
        return Ok(Some(Block::new(parent_id, height, payload, now, block_id)));
      }
    }

    // step 5: nothing ready; schedule the next wakeup.
    let deadline = match inner.unissued_events.peek() {
      Some(head) => next_change.min(head.start_time),
      None => next_change,
    };
    self.scheduler.reset(deadline);
    Ok(None)
  }

  #[instrument(skip(self, block))]
  pub async fn verify_and_insert(&self, mut block: Block) -> Result<()> {
    let mut inner = self.inner.lock().await;
    let parent_proposal = inner.pending.get(&block.parent_id).and_then(|b| b.as_verified_proposal());
    // a Commit/Abort block whose parent is a genuinely unresolved
    // Proposal has no usable parent overlay yet (`overlay()` is `None`
    // until the Commit/Abort itself resolves it); `Block::verify`
    // doesn't read `parent_overlay` for that payload, so any overlay is
    // a safe placeholder in that case.
    let parent_overlay = match Self::overlay_for(&inner, &block.parent_id) {
      Some(overlay) => overlay,
      None if parent_proposal.is_some() => inner.accepted_overlay.clone(),
      None => return Err(PlatformError::block("unknown or unresolved parent block")),
    };
    let parent_time = {
      let mut child = parent_overlay.child();
      let store = StateStore::new(&mut child);
      store.chain_time()?
    };
    block.verify(&parent_overlay, parent_proposal.as_ref(), parent_time, Utc::now())?;
    inner.pending.insert(block.id, block);
    Ok(())
  }

  /// Checks pending blocks first, then the persisted store.
  pub async fn get_block(&self, id: &BlockId) -> Result<Option<Block>> {
    let inner = self.inner.lock().await;
    if let Some(block) = inner.pending.get(id) {
      return Ok(Some(block.clone()));
    }
    let base: Arc<dyn crate::store::Store> = Arc::new(inner.db.clone());
    let mut overlay = Overlay::new(base);
    let store = StateStore::new(&mut overlay);
    store.block(id)
  }

  /// Idempotent: returns the already-known instance (pending or
  /// persisted) if `bytes` decodes to a block id the VM has already
  /// seen, rather than constructing a fresh, unverified one.
  pub async fn parse_block(&self, bytes: &[u8]) -> Result<Block> {
    let decoded = Block::from_bytes(bytes)?;
    if let Some(known) = self.get_block(&decoded.id).await? {
      return Ok(known);
    }
    Ok(decoded)
  }

  /// May arbitrarily switch the speculative head.
  pub async fn set_preference(&self, id: BlockId) {
    let mut inner = self.inner.lock().await;
    inner.preference = id;
  }

  /// Persists the block's overlay and the block itself to the base
  /// store, evicts it from the pending map, and notifies the chain
  /// manager once per chain a batched `CreateChain` tx created. Returns
  /// those chain ids.
  #[instrument(skip(self))]
  pub async fn accept(&self, id: &BlockId) -> Result<Vec<[u8; 32]>> {
    let mut inner = self.inner.lock().await;
    let block = inner.pending.remove(id).ok_or_else(|| PlatformError::block("unknown block"))?;
    let overlay = block.overlay().ok_or_else(|| PlatformError::block("block has no resolved overlay"))?;
    overlay.commit(&inner.db)?;

    {
      let base: Arc<dyn crate::store::Store> = Arc::new(inner.db.clone());
      let mut persisted = Overlay::new(base);
      let mut store = StateStore::new(&mut persisted);
      store.put_block(&block)?;
      persisted.commit(&inner.db)?;
    }

    let created_chains = block.created_chains();
    inner.accepted_tip = block.id;
    inner.accepted_height = block.height;
    inner.accepted_overlay = Arc::new(Overlay::new(Arc::new(inner.db.clone())));
    if inner.preference == *id || inner.preference == block.parent_id {
      inner.preference = block.id;
    }
    if let Some(manager) = &inner.chain_manager {
      for chain_id in &created_chains {
        manager.notify(*chain_id);
      }
    }
    Ok(created_chains)
  }

  pub async fn reject(&self, id: &BlockId) {
    let mut inner = self.inner.lock().await;
    inner.pending.remove(id);
  }

  pub async fn shutdown(&self) {
    self.scheduler.cancel();
    let inner = self.inner.lock().await;
    let _ = inner.db.flush();
  }
}

fn compute_block_id(parent: &BlockId, height: u64, payload: &BlockPayload) -> BlockId {
  let mut hasher = Sha3_256::new();
  hasher.update(parent);
  hasher.update(height.to_be_bytes());
  hasher.update(format!("{payload:?}"));
  let digest = hasher.finalize();
  let mut out = [0u8; 32];
  out.copy_from_slice(&digest);
  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::codec;

  #[tokio::test]
  async fn initialize_then_build_block_yields_no_pending_blocks() {
    codec::ensure_test_registry();
    let dir = tempfile::tempdir().unwrap();
    let genesis = Genesis::for_network(constants::LOCAL_ID).unwrap();
    let bytes = genesis.marshal().unwrap();
    let (vm, _handle) = Vm::initialize(dir.path(), &bytes, &[]).unwrap();
    let built = vm.build_block().await.unwrap();
    assert!(built.is_none());
  }

  #[tokio::test]
  async fn issuing_a_decision_tx_makes_a_standard_block_ready() {
    codec::ensure_test_registry();
    let dir = tempfile::tempdir().unwrap();
    let genesis = Genesis::for_network(constants::LOCAL_ID).unwrap();
    let bytes = genesis.marshal().unwrap();
    let (vm, _handle) = Vm::initialize(dir.path(), &bytes, &[]).unwrap();
    vm.issue_decision_tx(DecisionTx::CreateSubnet(crate::txs::Subnet {
      id: [9u8; 32],
      control_keys: vec![crate::primitives::Address::from_bytes([1u8; 20])],
      threshold: 1,
    }))
    .await;
    let built = vm.build_block().await.unwrap();
    assert!(matches!(built.unwrap().payload, BlockPayload::Standard(_)));
  }

  #[tokio::test]
  async fn accepting_a_standard_block_persists_it_for_get_block() {
    codec::ensure_test_registry();
    let dir = tempfile::tempdir().unwrap();
    let genesis = Genesis::for_network(constants::LOCAL_ID).unwrap();
    let bytes = genesis.marshal().unwrap();
    let (vm, _handle) = Vm::initialize(dir.path(), &bytes, &[]).unwrap();
    vm.issue_decision_tx(DecisionTx::CreateSubnet(crate::txs::Subnet {
      id: [9u8; 32],
      control_keys: vec![crate::primitives::Address::from_bytes([1u8; 20])],
      threshold: 1,
    }))
    .await;
    let block = vm.build_block().await.unwrap().unwrap();
    let id = block.id;
    vm.verify_and_insert(block).await.unwrap();
    assert!(vm.get_block(&id).await.unwrap().is_some(), "still pending, found in memory");
    vm.accept(&id).await.unwrap();
    let persisted = vm.get_block(&id).await.unwrap();
    assert!(persisted.is_some(), "evicted from pending but readable from the store");
    assert_eq!(persisted.unwrap().id, id);
  }

  #[tokio::test]
  async fn preferring_a_pending_proposal_resolves_it_via_build_block() {
    codec::ensure_test_registry();
    let dir = tempfile::tempdir().unwrap();
    let genesis = Genesis::for_network(constants::LOCAL_ID).unwrap();
    let bytes = genesis.marshal().unwrap();
    let (vm, _handle) = Vm::initialize(dir.path(), &bytes, &[]).unwrap();

    let now = Utc::now();
    let event = StakerEvent {
      id: b"v1".to_vec(),
      node_id: crate::primitives::Address::from_bytes([1u8; 20]),
      start_time: now + chrono::Duration::hours(1),
      end_time: now + chrono::Duration::hours(25),
      stake_amount: 10,
      reward_address: crate::primitives::Address::from_bytes([1u8; 20]),
      subnet_id: DEFAULT_SUBNET,
      delegation_shares: None,
    };
    vm.issue_staker_event(event.clone()).await;

    let proposal = Block::new(
      GENESIS_BLOCK_ID,
      1,
      BlockPayload::Proposal(ProposalTx::AddValidator(event)),
      now,
      [7u8; 32],
    );
    let proposal_id = proposal.id;
    vm.verify_and_insert(proposal).await.unwrap();
    vm.set_preference(proposal_id).await;

    let resolution = vm.build_block().await.unwrap().unwrap();
    assert!(matches!(resolution.payload, BlockPayload::Commit | BlockPayload::Abort));
    assert_eq!(resolution.parent_id, proposal_id);
  }

  #[tokio::test]
  async fn parse_block_is_idempotent_for_known_ids() {
    codec::ensure_test_registry();
    let dir = tempfile::tempdir().unwrap();
    let genesis = Genesis::for_network(constants::LOCAL_ID).unwrap();
    let bytes = genesis.marshal().unwrap();
    let (vm, _handle) = Vm::initialize(dir.path(), &bytes, &[]).unwrap();
    vm.issue_decision_tx(DecisionTx::CreateSubnet(crate::txs::Subnet {
      id: [9u8; 32],
      control_keys: vec![crate::primitives::Address::from_bytes([1u8; 20])],
      threshold: 1,
    }))
    .await;
    let block = vm.build_block().await.unwrap().unwrap();
    let id = block.id;
    let wire = block.to_bytes().unwrap();
    vm.verify_and_insert(block).await.unwrap();

    let parsed = vm.parse_block(&wire).await.unwrap();
    assert_eq!(parsed.id, id);
    assert!(parsed.overlay().is_some(), "the known pending instance carries its verified overlay");
  }
}
