//! The genesis byte blob: a single opaque payload decoded by the Codec
//! into accounts, initial validators, chains and a message. Bit-exact
//! reproduction for `LocalID` is required for network compatibility; any
//! other network id fails (an intentionally incomplete mainnet/testnet
//! genesis story, flagged by the design notes rather than hidden).

use crate::{
  codec::{self, read_bytes, read_string, read_slice, write_bytes, write_string, write_slice, Codec},
  constants::LOCAL_ID,
  error::{PlatformError, Result},
  primitives::{Account, Address},
  txs::{Chain, StakerEvent},
};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use chrono::{DateTime, TimeZone, Utc};
use sha3::{Digest, Sha3_256};
use std::io::{Read, Write};

#[derive(Debug, Clone, PartialEq)]
pub struct Genesis {
  pub timestamp: DateTime<Utc>,
  pub accounts: Vec<Account>,
  pub validators: Vec<StakerEvent>,
  pub chains: Vec<Chain>,
  pub message: String,
}

fn write_time<W: Write>(w: &mut W, t: DateTime<Utc>) -> std::io::Result<()> {
  w.write_u64::<BigEndian>(t.timestamp() as u64)
}

fn read_time<R: Read>(r: &mut R) -> Result<DateTime<Utc>> {
  let secs = r.read_u64::<BigEndian>().map_err(|e| PlatformError::Codec(e.to_string()))?;
  Utc
    .timestamp_opt(secs as i64, 0)
    .single()
    .ok_or_else(|| PlatformError::Codec("invalid timestamp in genesis blob".into()))
}

fn write_account<W: Write>(w: &mut W, a: &Account) -> std::io::Result<()> {
  w.write_all(a.address.as_bytes())?;
  w.write_u64::<BigEndian>(a.nonce)?;
  w.write_u64::<BigEndian>(a.balance)
}

fn read_account<R: Read>(r: &mut R) -> Result<Account> {
  let mut addr = [0u8; 20];
  r.read_exact(&mut addr).map_err(|e| PlatformError::Codec(e.to_string()))?;
  let nonce = r.read_u64::<BigEndian>().map_err(|e| PlatformError::Codec(e.to_string()))?;
  let balance = r.read_u64::<BigEndian>().map_err(|e| PlatformError::Codec(e.to_string()))?;
  Ok(Account { address: Address::from_bytes(addr), nonce, balance })
}

fn write_staker_event<W: Write>(w: &mut W, e: &StakerEvent) -> std::io::Result<()> {
  write_bytes(w, &e.id)?;
  w.write_all(e.node_id.as_bytes())?;
  write_time(w, e.start_time)?;
  write_time(w, e.end_time)?;
  w.write_u64::<BigEndian>(e.stake_amount)?;
  w.write_all(e.reward_address.as_bytes())?;
  w.write_all(&e.subnet_id)?;
  w.write_u64::<BigEndian>(e.delegation_shares.unwrap_or(0))
}

fn read_staker_event<R: Read>(r: &mut R) -> Result<StakerEvent> {
  let id = read_bytes(r)?;
  let mut node_id = [0u8; 20];
  r.read_exact(&mut node_id).map_err(|e| PlatformError::Codec(e.to_string()))?;
  let start_time = read_time(r)?;
  let end_time = read_time(r)?;
  let stake_amount = r.read_u64::<BigEndian>().map_err(|e| PlatformError::Codec(e.to_string()))?;
  let mut reward_address = [0u8; 20];
  r.read_exact(&mut reward_address).map_err(|e| PlatformError::Codec(e.to_string()))?;
  let mut subnet_id = [0u8; 32];
  r.read_exact(&mut subnet_id).map_err(|e| PlatformError::Codec(e.to_string()))?;
  let shares = r.read_u64::<BigEndian>().map_err(|e| PlatformError::Codec(e.to_string()))?;
  Ok(StakerEvent {
    id,
    node_id: Address::from_bytes(node_id),
    start_time,
    end_time,
    stake_amount,
    reward_address: Address::from_bytes(reward_address),
    subnet_id,
    delegation_shares: if shares == 0 { None } else { Some(shares) },
  })
}

/// The chain id is not itself part of the wire layout; it is derived
/// deterministically from the rest of the fields, the same way a block's
/// id is derived from its contents rather than carried on the wire.
fn compute_chain_id(c: &Chain) -> [u8; 32] {
  let mut hasher = Sha3_256::new();
  hasher.update(c.network_id.to_be_bytes());
  hasher.update(c.subnet_id);
  hasher.update(c.name.as_bytes());
  hasher.update(c.vm_id);
  for fx in &c.fx_ids {
    hasher.update(fx);
  }
  hasher.update(&c.genesis_data);
  for key in &c.control_keys {
    hasher.update(key.as_bytes());
  }
  hasher.update(c.threshold.to_be_bytes());
  let digest = hasher.finalize();
  let mut out = [0u8; 32];
  out.copy_from_slice(&digest);
  out
}

fn write_chain<W: Write>(w: &mut W, c: &Chain) -> std::io::Result<()> {
  w.write_u32::<BigEndian>(c.network_id)?;
  w.write_all(&c.subnet_id)?;
  write_string(w, &c.name)?;
  w.write_all(&c.vm_id)?;
  write_slice(w, &c.fx_ids, |w, fx| w.write_all(fx))?;
  write_bytes(w, &c.genesis_data)?;
  write_slice(w, &c.control_keys, |w, k| w.write_all(k.as_bytes()))?;
  w.write_u32::<BigEndian>(c.threshold)
}

fn read_chain<R: Read>(r: &mut R) -> Result<Chain> {
  let network_id = r.read_u32::<BigEndian>().map_err(|e| PlatformError::Codec(e.to_string()))?;
  let mut subnet_id = [0u8; 32];
  r.read_exact(&mut subnet_id).map_err(|e| PlatformError::Codec(e.to_string()))?;
  let name = read_string(r)?;
  let mut vm_id = [0u8; 32];
  r.read_exact(&mut vm_id).map_err(|e| PlatformError::Codec(e.to_string()))?;
  let fx_ids = read_slice(r, |r| {
    let mut fx = [0u8; 32];
    r.read_exact(&mut fx).map_err(|e| PlatformError::Codec(e.to_string()))?;
    Ok(fx)
  })?;
  let genesis_data = read_bytes(r)?;
  let control_keys = read_slice(r, |r| {
    let mut key = [0u8; 20];
    r.read_exact(&mut key).map_err(|e| PlatformError::Codec(e.to_string()))?;
    Ok(Address::from_bytes(key))
  })?;
  let threshold = r.read_u32::<BigEndian>().map_err(|e| PlatformError::Codec(e.to_string()))?;
  let mut chain = Chain {
    id: [0u8; 32],
    subnet_id,
    network_id,
    vm_id,
    fx_ids,
    name,
    genesis_data,
    control_keys,
    threshold,
  };
  chain.id = compute_chain_id(&chain);
  Ok(chain)
}

impl Codec for Genesis {
  const TAG: u32 = codec::tags::GENESIS;

  fn marshal_body<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
    write_time(w, self.timestamp)?;
    write_slice(w, &self.accounts, write_account)?;
    write_slice(w, &self.validators, write_staker_event)?;
    write_slice(w, &self.chains, write_chain)?;
    write_string(w, &self.message)
  }

  fn unmarshal_body<R: Read>(r: &mut R) -> Result<Self> {
    let timestamp = read_time(r)?;
    let accounts = read_slice(r, read_account)?;
    let validators = read_slice(r, read_staker_event)?;
    let chains = read_slice(r, read_chain)?;
    let message = read_string(r)?;
    Ok(Genesis { timestamp, accounts, validators, chains, message })
  }
}

impl Genesis {
  /// Returns the fixed local-network genesis, bit-exact across nodes.
  /// Any other network id is not yet supported — preserved deliberately
  /// incomplete, per the design notes, rather than silently faked.
  pub fn for_network(network_id: u32) -> Result<Self> {
    if network_id != LOCAL_ID {
      return Err(PlatformError::fatal(format!(
        "genesis for network id {network_id} is not available; only the local network ({LOCAL_ID}) is"
      )));
    }
    Ok(Self::local())
  }

  fn local() -> Self {
    Genesis {
      timestamp: Utc.timestamp_opt(1_000_000_000, 0).single().unwrap(),
      accounts: vec![Account::new(Address::from_bytes([1u8; 20]), 1_000_000)],
      validators: vec![],
      chains: vec![],
      message: "local".to_string(),
    }
  }

  pub fn marshal(&self) -> Result<Vec<u8>> {
    codec::marshal(self)
  }

  pub fn unmarshal(bytes: &[u8]) -> Result<Self> {
    codec::unmarshal(bytes)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn round_trips_through_the_binary_codec() {
    codec::ensure_test_registry();
    let genesis = Genesis::local();
    let bytes = genesis.marshal().unwrap();
    let back = Genesis::unmarshal(&bytes).unwrap();
    assert_eq!(genesis, back);
  }

  #[test]
  fn rejects_non_local_network_ids() {
    assert!(Genesis::for_network(1).is_err());
    assert!(Genesis::for_network(2).is_err());
  }

  #[test]
  fn local_network_id_succeeds() {
    codec::ensure_test_registry();
    assert!(Genesis::for_network(LOCAL_ID).is_ok());
  }
}
