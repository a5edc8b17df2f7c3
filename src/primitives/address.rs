use serde::{de::Visitor, Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Sha3_256};
use std::{fmt, str::FromStr};

pub const ADDRESS_LEN: usize = 20;

/// A 20-byte account/control-key/reward-address identifier.
///
/// Derived from an ed25519 public key by hashing it with SHA3-256 and
/// keeping the trailing 20 bytes, or built directly from raw bytes when no
/// public key is known (e.g. genesis control keys).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
  pub fn from_bytes(bytes: [u8; ADDRESS_LEN]) -> Self {
    Self(bytes)
  }

  pub fn from_pubkey(pubkey: &ed25519_dalek::PublicKey) -> Self {
    let digest = Sha3_256::digest(pubkey.as_bytes());
    let mut out = [0u8; ADDRESS_LEN];
    out.copy_from_slice(&digest[digest.len() - ADDRESS_LEN..]);
    Self(out)
  }

  pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
    &self.0
  }

  pub fn to_vec(self) -> Vec<u8> {
    self.0.to_vec()
  }
}

impl fmt::Debug for Address {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Address({})", bs58::encode(self.0).into_string())
  }
}

impl fmt::Display for Address {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", bs58::encode(self.0).into_string())
  }
}

#[derive(Debug, thiserror::Error)]
pub enum AddressParseError {
  #[error("invalid base58: {0}")]
  Base58(#[from] bs58::decode::Error),
  #[error("expected {ADDRESS_LEN} bytes, got {0}")]
  WrongLength(usize),
}

impl FromStr for Address {
  type Err = AddressParseError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let bytes = bs58::decode(s).into_vec()?;
    if bytes.len() != ADDRESS_LEN {
      return Err(AddressParseError::WrongLength(bytes.len()));
    }
    let mut out = [0u8; ADDRESS_LEN];
    out.copy_from_slice(&bytes);
    Ok(Self(out))
  }
}

impl Serialize for Address {
  fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&self.to_string())
  }
}

struct AddressVisitor;
impl<'de> Visitor<'de> for AddressVisitor {
  type Value = Address;

  fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "a base58-encoded 20-byte address")
  }

  fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Address, E> {
    Address::from_str(v).map_err(E::custom)
  }

  fn visit_bytes<E: serde::de::Error>(self, v: &[u8]) -> Result<Address, E> {
    if v.len() != ADDRESS_LEN {
      return Err(E::custom(format!("expected {ADDRESS_LEN} bytes, got {}", v.len())));
    }
    let mut out = [0u8; ADDRESS_LEN];
    out.copy_from_slice(v);
    Ok(Address(out))
  }
}

impl<'de> Deserialize<'de> for Address {
  fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
    d.deserialize_any(AddressVisitor)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn roundtrips_through_base58() {
    let addr = Address::from_bytes([7u8; ADDRESS_LEN]);
    let s = addr.to_string();
    let parsed: Address = s.parse().unwrap();
    assert_eq!(addr, parsed);
  }

  #[test]
  fn rejects_wrong_length() {
    let s = bs58::encode([1u8, 2, 3]).into_string();
    assert!(Address::from_str(&s).is_err());
  }
}
