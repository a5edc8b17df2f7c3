//! A min-heap of staker events, ordered by either `start_time` or
//! `end_time` depending on how it's constructed. Ties are broken by a
//! deterministic secondary key (the event id, byte-lexicographically) so
//! every node resolves the same event to the same heap position.

use crate::txs::StakerEvent;
use chrono::{DateTime, Utc};
use std::{cmp::Ordering, collections::BinaryHeap};

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum HeapKey {
  StartTime,
  EndTime,
}

#[derive(Clone)]
struct HeapEntry {
  key: HeapKey,
  event: StakerEvent,
}

impl HeapEntry {
  fn sort_key(&self) -> (DateTime<Utc>, &[u8]) {
    let t = match self.key {
      HeapKey::StartTime => self.event.start_time,
      HeapKey::EndTime => self.event.end_time,
    };
    (t, self.event.id.as_slice())
  }
}

impl PartialEq for HeapEntry {
  fn eq(&self, other: &Self) -> bool {
    self.sort_key() == other.sort_key()
  }
}
impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for HeapEntry {
  fn cmp(&self, other: &Self) -> Ordering {
    // BinaryHeap is a max-heap; reverse so the earliest timestamp sorts
    // to the top, giving min-heap semantics.
    other.sort_key().cmp(&self.sort_key())
  }
}

/// A min-heap of staker events ordered by `start_time` (the Pending
/// queue) or `end_time` (the Current queue), per-subnet.
#[derive(Clone)]
pub struct EventHeap {
  key: HeapKey,
  heap: BinaryHeap<HeapEntry>,
}

impl EventHeap {
  pub fn new(key: HeapKey) -> Self {
    Self { key, heap: BinaryHeap::new() }
  }

  pub fn push(&mut self, event: StakerEvent) {
    self.heap.push(HeapEntry { key: self.key, event });
  }

  pub fn peek(&self) -> Option<&StakerEvent> {
    self.heap.peek().map(|e| &e.event)
  }

  pub fn pop(&mut self) -> Option<StakerEvent> {
    self.heap.pop().map(|e| e.event)
  }

  pub fn len(&self) -> usize {
    self.heap.len()
  }

  pub fn is_empty(&self) -> bool {
    self.heap.is_empty()
  }

  /// The key of the top element, or the `max_time` sentinel if empty.
  pub fn timestamp(&self) -> DateTime<Utc> {
    self
      .peek()
      .map(|e| match self.key {
        HeapKey::StartTime => e.start_time,
        HeapKey::EndTime => e.end_time,
      })
      .unwrap_or_else(crate::constants::max_time)
  }

  pub fn iter(&self) -> impl Iterator<Item = &StakerEvent> {
    self.heap.iter().map(|e| &e.event)
  }

  /// Removes and returns every event whose ordering key is `<= when`,
  /// in ascending order. Used to drain Pending events whose start time
  /// has slipped past the inclusion window.
  pub fn drain_up_to(&mut self, when: DateTime<Utc>) -> Vec<StakerEvent> {
    let mut out = Vec::new();
    while let Some(top) = self.peek() {
      let key_time = match self.key {
        HeapKey::StartTime => top.start_time,
        HeapKey::EndTime => top.end_time,
      };
      if key_time > when {
        break;
      }
      out.push(self.pop().unwrap());
    }
    out
  }
}
