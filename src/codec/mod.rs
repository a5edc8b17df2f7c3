//! Length-prefixed binary codec driven by a one-shot, process-wide type
//! registry keyed by a small integer tag.
//!
//! Wire format: every typed value is prefixed by a big-endian `u32` tag;
//! fields are emitted in declaration order; slices as a big-endian `u32`
//! length followed by element encodings; strings as a big-endian `u16`
//! length followed by UTF-8 bytes; integers big-endian.

use crate::error::PlatformError;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::io::{self, Read, Write};

static REGISTRY: OnceCell<HashMap<u32, &'static str>> = OnceCell::new();

/// Registers the fixed set of wire types exactly once. Calling it twice,
/// or registering a duplicate tag, is a fatal error.
pub fn init(types: &[(u32, &'static str)]) -> Result<(), PlatformError> {
  let mut map = HashMap::with_capacity(types.len());
  for &(tag, name) in types {
    if map.insert(tag, name).is_some() {
      return Err(PlatformError::fatal(format!("duplicate codec tag {tag}")));
    }
  }
  REGISTRY
    .set(map)
    .map_err(|_| PlatformError::fatal("codec registry already initialized"))
}

pub fn registered(tag: u32) -> bool {
  REGISTRY.get().map(|m| m.contains_key(&tag)).unwrap_or(false)
}

/// Canonical wire tags for every registered type in this crate.
pub mod tags {
  pub const ACCOUNT: u32 = 1;
  pub const STAKER_EVENT: u32 = 2;
  pub const CHAIN: u32 = 3;
  pub const GENESIS: u32 = 4;
  pub const SUBNET: u32 = 5;
}

/// Registers the crate's full canonical type set. Safe to call from many
/// test modules in the same process: a second call observes the registry
/// already initialized and is treated as a no-op rather than a failure.
#[cfg(test)]
pub fn ensure_test_registry() {
  let _ = init(&[
    (tags::ACCOUNT, "account"),
    (tags::STAKER_EVENT, "staker_event"),
    (tags::CHAIN, "chain"),
    (tags::GENESIS, "genesis"),
    (tags::SUBNET, "subnet"),
  ]);
}

/// Implemented by every wire type. `marshal`/`unmarshal` handle the tag
/// prefix; `marshal_body`/`unmarshal_body` handle just the fields.
pub trait Codec: Sized {
  const TAG: u32;

  fn marshal_body<W: Write>(&self, w: &mut W) -> io::Result<()>;
  fn unmarshal_body<R: Read>(r: &mut R) -> Result<Self, PlatformError>;
}

pub fn marshal<T: Codec>(value: &T) -> Result<Vec<u8>, PlatformError> {
  if !registered(T::TAG) {
    return Err(PlatformError::Codec(format!("unregistered tag {}", T::TAG)));
  }
  let mut out = Vec::new();
  out.write_u32::<BigEndian>(T::TAG).map_err(io_err)?;
  value.marshal_body(&mut out).map_err(io_err)?;
  Ok(out)
}

pub fn unmarshal<T: Codec>(bytes: &[u8]) -> Result<T, PlatformError> {
  let mut r = io::Cursor::new(bytes);
  let tag = r.read_u32::<BigEndian>().map_err(io_err)?;
  if tag != T::TAG {
    return Err(PlatformError::Codec(format!("tag mismatch: expected {}, got {tag}", T::TAG)));
  }
  if !registered(tag) {
    return Err(PlatformError::Codec(format!("unregistered tag {tag}")));
  }
  T::unmarshal_body(&mut r)
}

fn io_err(e: io::Error) -> PlatformError {
  PlatformError::Codec(e.to_string())
}

pub fn write_string<W: Write>(w: &mut W, s: &str) -> io::Result<()> {
  w.write_u16::<BigEndian>(s.len() as u16)?;
  w.write_all(s.as_bytes())
}

pub fn read_string<R: Read>(r: &mut R) -> Result<String, PlatformError> {
  let len = r.read_u16::<BigEndian>().map_err(io_err)? as usize;
  let mut buf = vec![0u8; len];
  r.read_exact(&mut buf).map_err(io_err)?;
  String::from_utf8(buf).map_err(|e| PlatformError::Codec(e.to_string()))
}

pub fn write_bytes<W: Write>(w: &mut W, b: &[u8]) -> io::Result<()> {
  w.write_u32::<BigEndian>(b.len() as u32)?;
  w.write_all(b)
}

pub fn read_bytes<R: Read>(r: &mut R) -> Result<Vec<u8>, PlatformError> {
  let len = r.read_u32::<BigEndian>().map_err(io_err)? as usize;
  let mut buf = vec![0u8; len];
  r.read_exact(&mut buf).map_err(io_err)?;
  Ok(buf)
}

pub fn write_slice<W: Write, T>(
  w: &mut W,
  items: &[T],
  mut write_one: impl FnMut(&mut W, &T) -> io::Result<()>,
) -> io::Result<()> {
  w.write_u32::<BigEndian>(items.len() as u32)?;
  for item in items {
    write_one(w, item)?;
  }
  Ok(())
}

pub fn read_slice<R: Read, T>(
  r: &mut R,
  mut read_one: impl FnMut(&mut R) -> Result<T, PlatformError>,
) -> Result<Vec<T>, PlatformError> {
  let len = r.read_u32::<BigEndian>().map_err(io_err)? as usize;
  let mut out = Vec::with_capacity(len);
  for _ in 0..len {
    out.push(read_one(r)?);
  }
  Ok(out)
}

#[cfg(test)]
mod tests {
  use super::*;

  struct Ping(u64);

  impl Codec for Ping {
    const TAG: u32 = tags::ACCOUNT;

    fn marshal_body<W: Write>(&self, w: &mut W) -> io::Result<()> {
      w.write_u64::<BigEndian>(self.0)
    }

    fn unmarshal_body<R: Read>(r: &mut R) -> Result<Self, PlatformError> {
      Ok(Ping(r.read_u64::<BigEndian>().map_err(io_err)?))
    }
  }

  #[test]
  fn round_trips() {
    ensure_test_registry();
    let p = Ping(42);
    let bytes = marshal(&p).unwrap();
    let back: Ping = unmarshal(&bytes).unwrap();
    assert_eq!(back.0, 42);
  }

  #[test]
  fn rejects_unregistered_tag() {
    ensure_test_registry();
    let bytes = vec![0, 0, 0, 99, 0, 0, 0, 0, 0, 0, 0, 1];
    let err = unmarshal::<Ping>(&bytes);
    assert!(err.is_err());
  }
}
