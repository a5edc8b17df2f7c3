use super::{Chain, Subnet};
use crate::{
  error::{PlatformError, Result},
  state_store::StateStore,
  store::Overlay,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Decision transactions: instantly-decided, applied via a single
/// `onAccept` overlay with no Commit/Abort choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DecisionTx {
  CreateSubnet(Subnet),
  CreateChain { chain: Chain, signatures: Vec<Vec<u8>> },
}

impl DecisionTx {
  pub fn syntactic_verify(&self) -> Result<()> {
    match self {
      DecisionTx::CreateSubnet(subnet) => {
        if subnet.control_keys.is_empty() {
          return Err(PlatformError::user("subnet must have at least one control key"));
        }
        if subnet.threshold == 0 || subnet.threshold as usize > subnet.control_keys.len() {
          return Err(PlatformError::user("subnet threshold out of range"));
        }
        Ok(())
      }
      DecisionTx::CreateChain { signatures, .. } => {
        if signatures.is_empty() {
          return Err(PlatformError::user("create-chain requires control signatures"));
        }
        Ok(())
      }
    }
  }

  /// Produces the single `onAccept` overlay this decision tx would yield,
  /// along with the id of the chain it creates, if any (only `CreateChain`
  /// creates one; the chain manager is notified of that id once the
  /// containing block is accepted).
  pub fn semantic_verify(&self, parent: &Arc<Overlay>) -> Result<(Overlay, Option<[u8; 32]>)> {
    match self {
      DecisionTx::CreateSubnet(subnet) => {
        let mut accept = parent.child();
        let mut store = StateStore::new(&mut accept);
        let mut subnets = store.subnets()?;
        if subnets.iter().any(|s| s.id == subnet.id) {
          return Err(PlatformError::user("duplicate subnet id"));
        }
        subnets.push(subnet.clone());
        store.put_subnets(&subnets)?;
        Ok((accept, None))
      }
      DecisionTx::CreateChain { chain, signatures } => {
        let mut accept = parent.child();
        let mut store = StateStore::new(&mut accept);
        let subnets = store.subnets()?;
        let subnet = subnets
          .iter()
          .find(|s| s.id == chain.subnet_id)
          .ok_or_else(|| PlatformError::user("unknown subnet for create-chain"))?;
        if signatures.len() < subnet.threshold as usize {
          return Err(PlatformError::user("create-chain signatures below subnet threshold"));
        }
        let mut chains = store.chains()?;
        if chains.iter().any(|c| c.id == chain.id) {
          return Err(PlatformError::user("duplicate chain id"));
        }
        chains.push(chain.clone());
        store.put_chains(&chains)?;
        Ok((accept, Some(chain.id)))
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{primitives::Address, store::Store};

  struct EmptyStore;
  impl Store for EmptyStore {
    fn get(&self, _key: &[u8]) -> Result<Option<Vec<u8>>> {
      Ok(None)
    }
  }

  #[test]
  fn create_subnet_then_create_chain() {
    let parent = Arc::new(Overlay::new(Arc::new(EmptyStore)));
    let subnet = Subnet { id: [9u8; 32], control_keys: vec![Address::from_bytes([1u8; 20])], threshold: 1 };
    let tx = DecisionTx::CreateSubnet(subnet.clone());
    let (accept, created) = tx.semantic_verify(&parent).unwrap();
    assert!(created.is_none());
    let parent = Arc::new(accept);

    let chain = Chain {
      id: [2u8; 32],
      subnet_id: subnet.id,
      network_id: 12345,
      vm_id: [3u8; 32],
      fx_ids: vec![],
      name: "demo".into(),
      genesis_data: vec![],
      control_keys: subnet.control_keys.clone(),
      threshold: subnet.threshold,
    };
    let tx = DecisionTx::CreateChain { chain, signatures: vec![vec![0u8; 64]] };
    let (_, created) = tx.semantic_verify(&parent).unwrap();
    assert_eq!(created, Some([2u8; 32]));
  }

  #[test]
  fn create_chain_rejects_unknown_subnet() {
    let parent = Arc::new(Overlay::new(Arc::new(EmptyStore)));
    let chain = Chain {
      id: [2u8; 32],
      subnet_id: [7u8; 32],
      network_id: 1,
      vm_id: [3u8; 32],
      fx_ids: vec![],
      name: "demo".into(),
      genesis_data: vec![],
      control_keys: vec![],
      threshold: 0,
    };
    let tx = DecisionTx::CreateChain { chain, signatures: vec![vec![0u8; 64]] };
    assert!(tx.semantic_verify(&parent).is_err());
  }
}
