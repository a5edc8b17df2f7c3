//! The wall-clock-driven scheduler: on every wakeup it decides whether a
//! block is ready and, if so, notifies the outer consensus engine. This
//! is the only component allowed to say "block ready"; the consensus
//! engine then pulls the block via `build_block`.
//!
//! A spawned task holds a single-shot timer and relays readiness over a
//! `tokio::sync::watch` channel so the notification can be awaited as a
//! future. There is no stake-weighted leader schedule here — `build_block`
//! is invoked directly by the external consensus engine.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;
use tokio::sync::watch;
use tracing::warn;

/// What the scheduler decided is ready to be built, mirroring the 5-step
/// decision procedure. `build_block` re-runs the same decision and may
/// come to a different conclusion if state shifted since notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyReason {
  DecisionTxsPending,
  RewardValidator,
  AdvanceTime,
  AddValidator,
}

pub struct Scheduler {
  tx: watch::Sender<Option<ReadyReason>>,
  cancel: watch::Sender<()>,
}

pub struct SchedulerHandle {
  pub notify: watch::Receiver<Option<ReadyReason>>,
}

impl Scheduler {
  pub fn new() -> (Self, SchedulerHandle) {
    let (tx, rx) = watch::channel(None);
    let (cancel, _) = watch::channel(());
    (Self { tx, cancel }, SchedulerHandle { notify: rx })
  }

  /// Immediately signals "block ready" for `reason`.
  pub fn notify_ready(&self, reason: ReadyReason) {
    let _ = self.tx.send(Some(reason));
  }

  /// Replaces any outstanding single-shot timer with one that fires at
  /// `deadline`. Calling this again before the old timer fires cancels
  /// it, so only the most recently requested deadline ever wakes the VM.
  pub fn reset(&self, deadline: DateTime<Utc>) {
    let mut cancel_rx = self.cancel.subscribe();
    let tx = self.tx.clone();
    let wait = (deadline - Utc::now()).max(ChronoDuration::zero());
    let wait = Duration::from_millis(wait.num_milliseconds().max(0) as u64);
    tokio::spawn(async move {
      tokio::select! {
        _ = tokio::time::sleep(wait) => {
          // the actual re-decision happens in the VM, which holds the
          // state needed to run the 5-step procedure; this task only
          // guarantees a wakeup happens at the right time.
          if tx.send(Some(ReadyReason::AdvanceTime)).is_err() {
            warn!("scheduler notification channel closed");
          }
        }
        _ = cancel_rx.changed() => {
          // superseded by a newer reset() call.
        }
      }
    });
  }

  pub fn cancel(&self) {
    let _ = self.cancel.send(());
  }
}

impl Default for Scheduler {
  fn default() -> Self {
    Self::new().0
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn notify_ready_is_observed_by_the_handle() {
    let (scheduler, mut handle) = Scheduler::new();
    scheduler.notify_ready(ReadyReason::AddValidator);
    handle.notify.changed().await.unwrap();
    assert_eq!(*handle.notify.borrow(), Some(ReadyReason::AddValidator));
  }

  #[tokio::test]
  async fn reset_fires_after_the_deadline() {
    let (scheduler, mut handle) = Scheduler::new();
    scheduler.reset(Utc::now() + ChronoDuration::milliseconds(20));
    handle.notify.changed().await.unwrap();
    assert!(handle.notify.borrow().is_some());
  }
}
