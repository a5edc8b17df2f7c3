//! The block family: Proposal, Commit, Abort and Standard. Blocks are
//! created by `BuildBlock`, verified immediately, and exist only as
//! "pending acceptance" in memory until the outer consensus engine calls
//! `Accept` (the overlay commits to the base store) or `Reject` (the
//! overlay is dropped).

use crate::{
  error::{PlatformError, Result},
  store::Overlay,
  txs::{DecisionTx, ProposalTx},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub type BlockId = [u8; 32];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BlockPayload {
  Proposal(ProposalTx),
  Commit,
  Abort,
  Standard(Vec<DecisionTx>),
}

/// `(parentId, height, payload)`.
#[derive(Clone, Serialize, Deserialize)]
pub struct Block {
  pub id: BlockId,
  pub parent_id: BlockId,
  pub height: u64,
  pub payload: BlockPayload,
  pub timestamp: DateTime<Utc>,
  /// Populated by `verify`: the overlay(s) this block would produce. Never
  /// persisted — reloaded blocks are re-verified by the caller if needed.
  #[serde(skip)]
  pub(crate) verified: Option<VerifiedOverlays>,
}

#[derive(Clone)]
pub(crate) enum VerifiedOverlays {
  Proposal { on_commit: Arc<Overlay>, on_abort: Arc<Overlay> },
  Resolved { overlay: Arc<Overlay> },
  Standard { on_accept: Arc<Overlay>, created_chains: Vec<[u8; 32]> },
}

impl Block {
  pub fn new(parent_id: BlockId, height: u64, payload: BlockPayload, timestamp: DateTime<Utc>, id: BlockId) -> Self {
    Self { id, parent_id, height, payload, timestamp, verified: None }
  }

  /// Recomputes this block's semantic db against `parent_overlay`. For
  /// Proposal blocks this caches both the `onCommit` and `onAbort`
  /// overlays; for Standard blocks the single `onAccept` overlay; Commit
  /// and Abort blocks bind to their parent Proposal's already-cached
  /// overlay and fail if the parent isn't an unresolved Proposal.
  pub fn verify(
    &mut self,
    parent_overlay: &Arc<Overlay>,
    parent_is_proposal: Option<&VerifiedProposal>,
    parent_time: DateTime<Utc>,
    now: DateTime<Utc>,
  ) -> Result<()> {
    match &self.payload {
      BlockPayload::Proposal(tx) => {
        tx.syntactic_verify()?;
        let (on_commit, on_abort) = tx.semantic_verify(parent_overlay, parent_time, now)?;
        self.verified = Some(VerifiedOverlays::Proposal {
          on_commit: Arc::new(on_commit),
          on_abort: Arc::new(on_abort),
        });
        Ok(())
      }
      BlockPayload::Commit => {
        let parent = parent_is_proposal
          .ok_or_else(|| PlatformError::block("commit block's parent is not an unresolved proposal"))?;
        self.verified = Some(VerifiedOverlays::Resolved { overlay: parent.on_commit.clone() });
        Ok(())
      }
      BlockPayload::Abort => {
        let parent = parent_is_proposal
          .ok_or_else(|| PlatformError::block("abort block's parent is not an unresolved proposal"))?;
        self.verified = Some(VerifiedOverlays::Resolved { overlay: parent.on_abort.clone() });
        Ok(())
      }
      BlockPayload::Standard(txs) => {
        if txs.is_empty() {
          return Err(PlatformError::block("standard block must carry at least one decision tx"));
        }
        let mut overlay = parent_overlay.clone();
        let mut created_chains = Vec::new();
        for tx in txs {
          tx.syntactic_verify()?;
          let (accepted, created) = tx.semantic_verify(&overlay)?;
          created_chains.extend(created);
          overlay = Arc::new(accepted);
        }
        self.verified = Some(VerifiedOverlays::Standard { on_accept: overlay, created_chains });
        Ok(())
      }
    }
  }

  /// The overlay this block would commit if accepted, once verified.
  pub fn overlay(&self) -> Option<Arc<Overlay>> {
    match &self.verified {
      Some(VerifiedOverlays::Proposal { .. }) => None, // unresolved; Commit/Abort decide
      Some(VerifiedOverlays::Resolved { overlay }) => Some(overlay.clone()),
      Some(VerifiedOverlays::Standard { on_accept, .. }) => Some(on_accept.clone()),
      None => None,
    }
  }

  pub fn as_verified_proposal(&self) -> Option<VerifiedProposal> {
    match &self.verified {
      Some(VerifiedOverlays::Proposal { on_commit, on_abort }) => {
        Some(VerifiedProposal { on_commit: on_commit.clone(), on_abort: on_abort.clone() })
      }
      _ => None,
    }
  }

  /// The ids of any chains a Standard block's `CreateChain` txs create,
  /// to be passed to the chain manager once the block is accepted. Empty
  /// for every other payload and for a Standard block with none.
  pub fn created_chains(&self) -> Vec<[u8; 32]> {
    match &self.verified {
      Some(VerifiedOverlays::Standard { created_chains, .. }) => created_chains.clone(),
      _ => Vec::new(),
    }
  }

  /// Encodes the block for the outer consensus engine's wire transport.
  pub fn to_bytes(&self) -> Result<Vec<u8>> {
    serde_json::to_vec(self).map_err(|e| PlatformError::fatal(format!("failed to serialize block: {e}")))
  }

  /// Decodes a block previously produced by `to_bytes`. The result is
  /// unverified — `verified` is always `None` regardless of what the
  /// encoding block had cached.
  pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
    serde_json::from_slice(bytes).map_err(|e| PlatformError::fatal(format!("corrupt block bytes: {e}")))
  }
}

/// The two cached overlays of a not-yet-resolved Proposal block, handed
/// to its eventual Commit or Abort child at verify time.
#[derive(Clone)]
pub struct VerifiedProposal {
  pub on_commit: Arc<Overlay>,
  pub on_abort: Arc<Overlay>,
}
