use super::Address;
use ed25519_dalek::{PublicKey, SecretKey};
use std::{fmt, ops::Deref, str::FromStr};
use thiserror::Error;

/// A wallet keypair used to sign staker events, decision transactions and
/// rewards.
pub struct Keypair(ed25519_dalek::Keypair);

impl Keypair {
  pub fn generate<R: rand::RngCore + rand::CryptoRng>(rng: &mut R) -> Self {
    Self(ed25519_dalek::Keypair::generate(rng))
  }

  pub fn address(&self) -> Address {
    Address::from_pubkey(&self.0.public)
  }

  pub fn public(&self) -> PublicKey {
    self.0.public
  }

  pub fn secret(&self) -> &SecretKey {
    &self.0.secret
  }
}

impl Clone for Keypair {
  fn clone(&self) -> Self {
    Self(ed25519_dalek::Keypair::from_bytes(&self.0.to_bytes()).unwrap())
  }
}

impl Deref for Keypair {
  type Target = ed25519_dalek::Keypair;

  fn deref(&self) -> &Self::Target {
    &self.0
  }
}

impl fmt::Debug for Keypair {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("Keypair").field(&self.address()).finish()
  }
}

impl From<ed25519_dalek::Keypair> for Keypair {
  fn from(k: ed25519_dalek::Keypair) -> Self {
    Self(k)
  }
}

#[derive(Debug, Error)]
pub enum KeypairError {
  #[error("failed parsing base58 string: {0:?}")]
  Base58(#[from] bs58::decode::Error),
  #[error("{0}")]
  Ed25519(#[from] ed25519_dalek::ed25519::Error),
}

impl FromStr for Keypair {
  type Err = KeypairError;

  fn from_str(value: &str) -> Result<Self, Self::Err> {
    let bytes = bs58::decode(value).into_vec()?;
    let secret = SecretKey::from_bytes(&bytes)?;
    let public = (&secret).into();
    Ok(Keypair(ed25519_dalek::Keypair { secret, public }))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use rand::rngs::OsRng;

  #[test]
  fn address_is_stable_for_a_keypair() {
    let kp = Keypair::generate(&mut OsRng);
    assert_eq!(kp.address(), kp.address());
  }
}
