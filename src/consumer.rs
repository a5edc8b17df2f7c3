//! Fire-and-forget notification to the chain manager when an accepted
//! Standard block carries a `CreateChain` transaction. Modeled on the
//! teacher's `BlockConsumer`/`BlockConsumers` fan-out: notifying runs on
//! a spawned task so it can never call back into the VM while the VM's
//! lock is held (the reentrancy hazard called out in the concurrency
//! model).

use crate::blocks::BlockId;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tracing::warn;

#[async_trait]
pub trait ChainManager: Send + Sync {
  async fn create_chain(&self, chain_id: BlockId);
}

pub struct ChainManagerNotifier {
  sender: UnboundedSender<BlockId>,
}

impl ChainManagerNotifier {
  pub fn new(manager: Arc<dyn ChainManager>) -> Self {
    let (sender, mut receiver) = unbounded_channel::<BlockId>();
    tokio::spawn(async move {
      while let Some(chain_id) = receiver.recv().await {
        manager.create_chain(chain_id).await;
      }
    });
    Self { sender }
  }

  pub fn notify(&self, chain_id: BlockId) {
    if self.sender.send(chain_id).is_err() {
      warn!("chain manager notification channel closed");
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};

  struct CountingManager(Arc<AtomicUsize>);

  #[async_trait]
  impl ChainManager for CountingManager {
    async fn create_chain(&self, _chain_id: BlockId) {
      self.0.fetch_add(1, Ordering::SeqCst);
    }
  }

  #[tokio::test]
  async fn notifications_reach_the_chain_manager() {
    let count = Arc::new(AtomicUsize::new(0));
    let notifier = ChainManagerNotifier::new(Arc::new(CountingManager(count.clone())));
    notifier.notify([1u8; 32]);
    tokio::task::yield_now().await;
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    assert_eq!(count.load(Ordering::SeqCst), 1);
  }
}
