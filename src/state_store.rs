//! Typed get/put over a `store::Overlay`: accounts, per-subnet current and
//! pending validator heaps, chain list, subnet list, chain time, blocks.

use crate::{
  blocks::{Block, BlockId},
  error::{PlatformError, Result},
  event_heap::{EventHeap, HeapKey},
  primitives::{Account, Address},
  store::{Overlay, Store},
  txs::{Chain, Subnet},
};
use chrono::{DateTime, Utc};

const TIMESTAMP_KEY: &[u8] = b"timestamp";
const CHAINS_KEY: &[u8] = b"chains";
const SUBNETS_KEY: &[u8] = b"subnets";
const INITIALIZED_KEY: &[u8] = b"initialized";

fn block_key(id: &BlockId) -> Vec<u8> {
  let mut k = b"block:".to_vec();
  k.extend_from_slice(id);
  k
}

fn account_key(addr: &Address) -> Vec<u8> {
  let mut k = b"account:".to_vec();
  k.extend_from_slice(addr.as_bytes());
  k
}

fn current_validators_key(subnet: &[u8; 32]) -> Vec<u8> {
  let mut k = b"current:".to_vec();
  k.extend_from_slice(subnet);
  k
}

fn pending_validators_key(subnet: &[u8; 32]) -> Vec<u8> {
  let mut k = b"pending:".to_vec();
  k.extend_from_slice(subnet);
  k
}

/// A thin typed facade over any byte-level `Store` (base `sled::Db` or a
/// speculative `Overlay`).
pub struct StateStore<'s> {
  store: &'s mut Overlay,
}

impl<'s> StateStore<'s> {
  pub fn new(store: &'s mut Overlay) -> Self {
    Self { store }
  }

  fn get_json<T: serde::de::DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>> {
    match self.store.get(key)? {
      Some(bytes) => {
        let value = serde_json::from_slice(&bytes)
          .map_err(|e| PlatformError::fatal(format!("corrupt persisted state at key: {e}")))?;
        Ok(Some(value))
      }
      None => Ok(None),
    }
  }

  fn put_json<T: serde::Serialize>(&mut self, key: &[u8], value: &T) -> Result<()> {
    let bytes = serde_json::to_vec(value)
      .map_err(|e| PlatformError::fatal(format!("failed to serialize state: {e}")))?;
    self.store.put(key.to_vec(), bytes);
    Ok(())
  }

  pub fn is_initialized(&self) -> Result<bool> {
    Ok(self.store.get(INITIALIZED_KEY)?.is_some())
  }

  pub fn mark_initialized(&mut self) {
    self.store.put(INITIALIZED_KEY.to_vec(), vec![1]);
  }

  pub fn chain_time(&self) -> Result<DateTime<Utc>> {
    self
      .get_json(TIMESTAMP_KEY)?
      .ok_or_else(|| PlatformError::fatal("chain time not initialized"))
  }

  pub fn set_chain_time(&mut self, t: DateTime<Utc>) -> Result<()> {
    self.put_json(TIMESTAMP_KEY, &t)
  }

  pub fn account(&self, addr: &Address) -> Result<Option<Account>> {
    self.get_json(&account_key(addr))
  }

  pub fn put_account(&mut self, account: Account) -> Result<()> {
    self.put_json(&account_key(&account.address), &account)
  }

  pub fn current_validators(&self, subnet: &[u8; 32]) -> Result<EventHeap> {
    self.load_heap(&current_validators_key(subnet), HeapKey::EndTime)
  }

  pub fn put_current_validators(&mut self, subnet: &[u8; 32], heap: &EventHeap) -> Result<()> {
    self.store_heap(&current_validators_key(subnet), heap)
  }

  pub fn pending_validators(&self, subnet: &[u8; 32]) -> Result<EventHeap> {
    self.load_heap(&pending_validators_key(subnet), HeapKey::StartTime)
  }

  pub fn put_pending_validators(&mut self, subnet: &[u8; 32], heap: &EventHeap) -> Result<()> {
    self.store_heap(&pending_validators_key(subnet), heap)
  }

  fn load_heap(&self, key: &[u8], order: HeapKey) -> Result<EventHeap> {
    let events: Vec<_> = self.get_json(key)?.unwrap_or_default();
    let mut heap = EventHeap::new(order);
    for e in events {
      heap.push(e);
    }
    Ok(heap)
  }

  fn store_heap(&mut self, key: &[u8], heap: &EventHeap) -> Result<()> {
    let events: Vec<_> = heap.iter().cloned().collect();
    self.put_json(key, &events)
  }

  pub fn chains(&self) -> Result<Vec<Chain>> {
    Ok(self.get_json(CHAINS_KEY)?.unwrap_or_default())
  }

  pub fn put_chains(&mut self, chains: &[Chain]) -> Result<()> {
    self.put_json(CHAINS_KEY, &chains.to_vec())
  }

  pub fn subnets(&self) -> Result<Vec<Subnet>> {
    Ok(self.get_json(SUBNETS_KEY)?.unwrap_or_default())
  }

  pub fn put_subnets(&mut self, subnets: &[Subnet]) -> Result<()> {
    self.put_json(SUBNETS_KEY, &subnets.to_vec())
  }

  pub fn block(&self, id: &BlockId) -> Result<Option<Block>> {
    match self.store.get(&block_key(id))? {
      Some(bytes) => Ok(Some(Block::from_bytes(&bytes)?)),
      None => Ok(None),
    }
  }

  pub fn put_block(&mut self, block: &Block) -> Result<()> {
    let bytes = block.to_bytes()?;
    self.store.put(block_key(&block.id), bytes);
    Ok(())
  }
}
