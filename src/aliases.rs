//! Stable human-readable aliases for recognized VMs and every chain in
//! genesis.

use crate::txs::Chain;

pub const EXCHANGE_VM_ID: [u8; 32] = [1u8; 32];
pub const CONTRACT_VM_ID: [u8; 32] = [2u8; 32];
pub const PLATFORM_CHAIN_ID: [u8; 32] = [0u8; 32];

/// Produces the alias set for `chain`, or for the platform chain itself
/// when `chain` is `None` (its id is the all-zero chain id).
pub fn aliases_for_chain(chain: Option<&Chain>) -> Vec<String> {
  match chain {
    None => vec!["P".into(), "platform".into(), "bc/P".into(), "bc/platform".into()],
    Some(c) if c.vm_id == EXCHANGE_VM_ID => {
      vec!["X".into(), "avm".into(), "bc/X".into(), "bc/avm".into()]
    }
    Some(c) if c.vm_id == CONTRACT_VM_ID => {
      vec!["C".into(), "evm".into(), "bc/C".into(), "bc/evm".into()]
    }
    Some(c) => vec![
      bs58::encode(c.id).into_string(),
      format!("bc/{}", bs58::encode(c.id).into_string()),
    ],
  }
}

/// Builds the full alias table for genesis: the platform chain plus every
/// chain listed, and asserts pairwise disjointness (a genesis invariant,
/// not merely a test concern — the VM refuses to initialize otherwise).
pub fn alias_table(chains: &[Chain]) -> Result<Vec<(String, [u8; 32])>, String> {
  let mut table = Vec::new();
  for alias in aliases_for_chain(None) {
    table.push((alias, PLATFORM_CHAIN_ID));
  }
  for chain in chains {
    for alias in aliases_for_chain(Some(chain)) {
      table.push((alias, chain.id));
    }
  }
  let mut seen = std::collections::HashSet::new();
  for (alias, _) in &table {
    if !seen.insert(alias.clone()) {
      return Err(format!("duplicate alias: {alias}"));
    }
  }
  Ok(table)
}
