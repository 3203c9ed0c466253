//! Fixed-layout on-disk structures.

use crate::prelude::*;

pub trait SectorSerialize {
  /// Serialized length in bytes.
  fn extent(&self) -> usize;

  /// Serializes into the start of `out`, which must be at least [SectorSerialize::extent] bytes.
  fn serialize(&self, out: &mut [u8]) -> Result<()>;
}

pub trait SectorDeserialize: Sized {
  fn deserialize(bytes: &[u8]) -> Result<Self>;
}

pub(crate) fn ensure_len(bytes: &[u8], needed: usize) -> Result<()> {
  if bytes.len() < needed {
    return Err(Error::BufferTooSmall {
      needed,
      actual: bytes.len(),
    });
  }

  Ok(())
}
