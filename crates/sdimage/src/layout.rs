//! Layout planning: decides the starting LBA of every payload.
//!
//! Ordinary payloads are placed first, in order. Each may have a preferred
//! slot; a slot that would overlap data already placed is abandoned in favor
//! of the cursor and reported as a [Diagnostic]. Partition payloads follow,
//! packed at the cursor.

use std::fmt;

use crate::{
  lba::{self, LbaCursor, SECTOR_SIZE},
  payload::{PartitionPayload, Payload},
  prelude::*,
};

/// Sectors kept free at the start of the image for the MBR when partitions are present.
const MBR_SECTORS: u64 = 1;

/// Preferred starting LBAs, assigned positionally to ordinary payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreferredSlots(Vec<Option<u64>>);

impl PreferredSlots {
  /// Slots used by the reference boot flow: first-stage loader at 128,
  /// then 640 and 896.
  pub const REFERENCE: [u64; 3] = [128, 640, 896];

  /// No preferred slots; every payload is packed at the cursor.
  pub fn none() -> Self {
    Self(vec![])
  }

  pub fn from_lbas(lbas: impl IntoIterator<Item = u64>) -> Self {
    Self(lbas.into_iter().map(Some).collect())
  }

  /// Primary and secondary boot loader at fixed slots.
  pub fn dual_bootloader() -> Self {
    Self::from_lbas([Self::REFERENCE[0], Self::REFERENCE[1]])
  }

  /// Preferred LBA for the ordinary payload at `index`, if any.
  pub fn get(&self, index: usize) -> Option<u64> {
    self.0.get(index).copied().flatten()
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

impl Default for PreferredSlots {
  fn default() -> Self {
    Self::from_lbas(Self::REFERENCE)
  }
}

impl FromIterator<Option<u64>> for PreferredSlots {
  fn from_iter<I: IntoIterator<Item = Option<u64>>>(iter: I) -> Self {
    Self(iter.into_iter().collect())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
  Ordinary,
  Partition,
}

/// Where a payload ends up in the image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
  pub name: String,
  pub kind: PayloadKind,
  pub lba: u64,
  /// Unpadded payload length in bytes.
  pub size: u64,
  /// Length rounded up to a whole number of sectors.
  pub padded_size: u64,
}

impl Placement {
  pub fn sectors(&self) -> u64 {
    self.padded_size / SECTOR_SIZE
  }

  /// One past the last sector occupied by this placement.
  pub fn end_lba(&self) -> u64 {
    self.lba + self.sectors()
  }

  pub fn overlaps(&self, other: &Placement) -> bool {
    self.lba < other.end_lba() && other.lba < self.end_lba()
  }
}

/// A placed partition payload, as it should be described in the partition table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionRecord {
  pub name: String,
  pub start_lba: u64,
  pub sector_count: u64,
  pub partition_type: u8,
  pub bootable: bool,
}

/// Non-fatal problem found while building an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
  /// The preferred slot overlaps data already placed; the payload went to `fallback`.
  PreferredSlotOverlap {
    name: String,
    preferred: u64,
    fallback: u64,
  },
  /// Partition beyond the fourth; placed in the image but left out of the MBR.
  PartitionDropped { name: String, index: usize },
  /// An ordinary payload was supplied after partition payloads began.
  PayloadAfterPartition { name: String },
}

impl fmt::Display for Diagnostic {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Diagnostic::PreferredSlotOverlap {
        name,
        preferred,
        fallback,
      } => write!(
        f,
        "{name} cannot be placed at preferred LBA {preferred}, using {fallback} instead"
      ),
      Diagnostic::PartitionDropped { name, index } => write!(
        f,
        "partition {name} (#{}) exceeds the 4 MBR entries and is left out of the table",
        index + 1
      ),
      Diagnostic::PayloadAfterPartition { name } => write!(
        f,
        "{name} is listed after partition payloads; it is placed with the other payloads"
      ),
    }
  }
}

/// Outcome of choosing between a preferred slot and the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotChoice {
  Preferred(u64),
  Fallback(u64),
}

impl SlotChoice {
  pub fn lba(self) -> u64 {
    match self {
      SlotChoice::Preferred(lba) | SlotChoice::Fallback(lba) => lba,
    }
  }
}

/// Uses `preferred` unless it lies before `cursor`, i.e. over data already placed.
pub fn choose_lba(preferred: u64, cursor: u64) -> SlotChoice {
  if preferred >= cursor {
    SlotChoice::Preferred(preferred)
  } else {
    SlotChoice::Fallback(cursor)
  }
}

/// Resolved placement of every payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
  placements: Vec<Placement>,
  partitions: Vec<PartitionRecord>,
  diagnostics: Vec<Diagnostic>,
  end_lba: u64,
}

impl Layout {
  /// All placements in the order they were resolved: ordinary payloads, then partitions.
  pub fn placements(&self) -> &[Placement] {
    &self.placements
  }

  pub fn partitions(&self) -> &[PartitionRecord] {
    &self.partitions
  }

  pub fn diagnostics(&self) -> &[Diagnostic] {
    &self.diagnostics
  }

  /// Cursor after the last placement.
  pub fn end_lba(&self) -> u64 {
    self.end_lba
  }

  /// Size in bytes of the image holding every placement. Empty payloads occupy no space.
  pub fn image_size(&self) -> u64 {
    let end_lba = self
      .placements
      .iter()
      .filter(|p| p.padded_size > 0)
      .map(Placement::end_lba)
      .max()
      .unwrap_or(0);

    // Planning rejects placements whose end is not byte-addressable.
    lba::byte_offset(end_lba).unwrap_or(u64::MAX)
  }
}

/// Accumulator threaded through the planning fold.
struct PlanState {
  cursor: LbaCursor,
  placements: Vec<Placement>,
  partitions: Vec<PartitionRecord>,
  diagnostics: Vec<Diagnostic>,
}

impl PlanState {
  fn new(offset: u64) -> Self {
    Self {
      cursor: LbaCursor::new(offset),
      placements: vec![],
      partitions: vec![],
      diagnostics: vec![],
    }
  }

  fn place(mut self, payload: &Payload, kind: PayloadKind, lba: u64) -> Result<Self> {
    let padded_size = lba::padded_size(payload.len());

    self.cursor = self
      .cursor
      .advance_past(lba, padded_size)
      .ok_or_else(|| Error::LbaOverflow {
        name: payload.name().to_owned(),
      })?;

    log::debug!(
      "Placed {} at LBA {} ({} bytes, {} sectors)",
      payload.name(),
      lba,
      padded_size,
      padded_size / SECTOR_SIZE
    );

    self.placements.push(Placement {
      name: payload.name().to_owned(),
      kind,
      lba,
      size: payload.len(),
      padded_size,
    });

    Ok(self)
  }

  fn place_ordinary(mut self, payload: &Payload, preferred: Option<u64>) -> Result<Self> {
    let cursor = self.cursor.next_lba();

    let lba = match preferred.map(|preferred| (preferred, choose_lba(preferred, cursor))) {
      None => cursor,
      Some((_, SlotChoice::Preferred(lba))) => lba,
      Some((preferred, SlotChoice::Fallback(lba))) => {
        self.diagnostics.push(Diagnostic::PreferredSlotOverlap {
          name: payload.name().to_owned(),
          preferred,
          fallback: lba,
        });
        lba
      }
    };

    self.place(payload, PayloadKind::Ordinary, lba)
  }

  fn place_partition(self, partition: &PartitionPayload) -> Result<Self> {
    // Partitions take no placement hints: always packed at the cursor.
    let lba = self.cursor.next_lba();

    let mut state = self.place(&partition.payload, PayloadKind::Partition, lba)?;

    let sector_count = lba::sectors_for(partition.payload.len());

    state.partitions.push(PartitionRecord {
      name: partition.payload.name().to_owned(),
      start_lba: lba,
      sector_count,
      partition_type: partition.attributes.partition_type,
      bootable: partition.attributes.bootable,
    });

    Ok(state)
  }

  fn finish(self) -> Layout {
    Layout {
      end_lba: self.cursor.next_lba(),
      placements: self.placements,
      partitions: self.partitions,
      diagnostics: self.diagnostics,
    }
  }
}

/// Plans the placement of `payloads` followed by `partitions`.
///
/// Deterministic: identical inputs always yield identical layouts.
pub fn plan(
  slots: &PreferredSlots,
  payloads: &[Payload],
  partitions: &[PartitionPayload],
) -> Result<Layout> {
  if payloads.is_empty() {
    return Err(Error::NoPayloads);
  }

  let offset = if partitions.is_empty() { 0 } else { MBR_SECTORS };

  let state = payloads
    .iter()
    .enumerate()
    .try_fold(PlanState::new(offset), |state, (ix, payload)| {
      state.place_ordinary(payload, slots.get(ix))
    })?;

  let state = partitions
    .iter()
    .try_fold(state, |state, partition| state.place_partition(partition))?;

  Ok(state.finish())
}
