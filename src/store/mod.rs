//! A layered view over the persistent key-value store: each in-flight
//! block gets a speculative "if-accepted" overlay that commits atomically
//! on accept or is discarded on reject. Overlays may stack — a child
//! block's overlay reads through its parent's still-pending overlay.

use crate::error::Result;
use std::{collections::BTreeMap, sync::Arc};

/// Anything that can answer byte-level reads, the base case being the
/// real `sled` database.
pub trait Store: Send + Sync {
  fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;
}

impl Store for sled::Db {
  fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
    use std::ops::Deref;
    Ok(self.deref().get(key)?.map(|v| v.to_vec()))
  }
}

/// A speculative, in-memory overlay over a `Store`. `None` entries in the
/// journal are tombstones recording a delete.
#[derive(Clone)]
pub struct Overlay {
  parent: Arc<dyn Store>,
  journal: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl Overlay {
  pub fn new(parent: Arc<dyn Store>) -> Self {
    Self { parent, journal: BTreeMap::new() }
  }

  /// Builds a child overlay stacked on top of this one; reads on the
  /// child consult its own journal first, then fall through to this
  /// overlay (and, transitively, to the base store).
  pub fn child(self: &Arc<Self>) -> Overlay {
    Overlay::new(self.clone())
  }

  pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
    self.journal.insert(key, Some(value));
  }

  pub fn delete(&mut self, key: Vec<u8>) {
    self.journal.insert(key, None);
  }

  pub fn is_empty(&self) -> bool {
    self.journal.is_empty()
  }

  /// Applies the journal to a real `sled::Db` as a single atomic batch.
  /// Only meaningful on the overlay sitting directly atop the base store;
  /// stacked overlays are merged into their parent by `merge_into_parent`
  /// before the root ever calls `commit`.
  pub fn commit(&self, db: &sled::Db) -> Result<()> {
    let mut batch = sled::Batch::default();
    for (k, v) in &self.journal {
      match v {
        Some(value) => batch.insert(k.as_slice(), value.as_slice()),
        None => batch.remove(k.as_slice()),
      }
    }
    db.apply_batch(batch)?;
    Ok(())
  }

  /// Folds this overlay's journal into its parent overlay, newest wins.
  /// Used when a block's overlay must collapse into the chain of
  /// ancestors being committed on accept.
  pub fn merge_into_parent(self, parent: &mut Overlay) {
    for (k, v) in self.journal {
      parent.journal.insert(k, v);
    }
  }
}

impl Store for Overlay {
  fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
    match self.journal.get(key) {
      Some(Some(v)) => Ok(Some(v.clone())),
      Some(None) => Ok(None),
      None => self.parent.get(key),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  struct MapStore(BTreeMap<Vec<u8>, Vec<u8>>);
  impl Store for MapStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
      Ok(self.0.get(key).cloned())
    }
  }

  #[test]
  fn overlay_reads_through_to_base() {
    let mut base = BTreeMap::new();
    base.insert(b"a".to_vec(), b"1".to_vec());
    let base: Arc<dyn Store> = Arc::new(MapStore(base));
    let mut overlay = Overlay::new(base);
    assert_eq!(overlay.get(b"a").unwrap(), Some(b"1".to_vec()));
    overlay.put(b"a".to_vec(), b"2".to_vec());
    assert_eq!(overlay.get(b"a").unwrap(), Some(b"2".to_vec()));
  }

  #[test]
  fn overlay_delete_shadows_base() {
    let mut base = BTreeMap::new();
    base.insert(b"a".to_vec(), b"1".to_vec());
    let base: Arc<dyn Store> = Arc::new(MapStore(base));
    let mut overlay = Overlay::new(base);
    overlay.delete(b"a".to_vec());
    assert_eq!(overlay.get(b"a").unwrap(), None);
  }

  #[test]
  fn stacked_overlays_read_through_parent_overlay() {
    let base: Arc<dyn Store> = Arc::new(MapStore(BTreeMap::new()));
    let mut parent = Overlay::new(base);
    parent.put(b"x".to_vec(), b"parent".to_vec());
    let parent = Arc::new(parent);
    let mut child = parent.child();
    assert_eq!(child.get(b"x").unwrap(), Some(b"parent".to_vec()));
    child.put(b"x".to_vec(), b"child".to_vec());
    assert_eq!(child.get(b"x").unwrap(), Some(b"child".to_vec()));
  }
}
