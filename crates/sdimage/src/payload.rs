use std::path::Path;

use crate::prelude::*;

/// Partition type written for partition payloads unless overridden (Linux).
pub const DEFAULT_PARTITION_TYPE: u8 = 0x83;

/// A named binary blob to be embedded in the image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
  name: String,
  bytes: Vec<u8>,
}

impl Payload {
  pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
    Self {
      name: name.into(),
      bytes: bytes.into(),
    }
  }

  /// Reads the file at `path`. The payload is named after the file name.
  pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();

    let bytes = std::fs::read(path).map_err(|source| Error::ReadPayload {
      path: path.to_path_buf(),
      source,
    })?;

    let name = path
      .file_name()
      .map(|name| name.to_string_lossy().into_owned())
      .unwrap_or_else(|| path.display().to_string());

    log::debug!("Read payload {} ({} bytes)", name, bytes.len());

    Ok(Self { name, bytes })
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn bytes(&self) -> &[u8] {
    &self.bytes
  }

  pub fn len(&self) -> u64 {
    self.bytes.len() as u64
  }

  pub fn is_empty(&self) -> bool {
    self.bytes.is_empty()
  }
}

/// How a partition payload is described in the partition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionAttributes {
  pub partition_type: u8,
  pub bootable: bool,
}

impl Default for PartitionAttributes {
  fn default() -> Self {
    Self {
      partition_type: DEFAULT_PARTITION_TYPE,
      bootable: false,
    }
  }
}

/// A payload that also gets an entry in the partition table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionPayload {
  pub payload: Payload,
  pub attributes: PartitionAttributes,
}
