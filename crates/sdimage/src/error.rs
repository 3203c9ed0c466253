use std::path::PathBuf;

use crate::layout::Diagnostic;

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),
  #[error("Failed to read payload {path}: {source}")]
  ReadPayload {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("Failed to persist image: {0}")]
  Persist(#[from] tempfile::PersistError),
  #[error("At least one payload is required")]
  NoPayloads,
  #[error("LBA overflow while placing {name}")]
  LbaOverflow { name: String },
  #[error(
    "Partition {name} does not fit in an MBR entry (start LBA {start_lba}, {sector_count} sectors)"
  )]
  PartitionOutOfRange {
    name: String,
    start_lba: u64,
    sector_count: u64,
  },
  #[error("Missing MBR boot signature (found {0:#06x})")]
  InvalidSignature(u16),
  #[error("Buffer too small: need {needed} bytes, got {actual}")]
  BufferTooSmall { needed: usize, actual: usize },
  #[error("Build produced {} warning(s) and warnings are denied", .0.len())]
  WarningsDenied(Vec<Diagnostic>),
}
