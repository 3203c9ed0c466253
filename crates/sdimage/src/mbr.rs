//! Master Boot Record partition table.
//!
//! Layout of the 512-byte sector:
//!
//! | Offset | Length | Contents                        |
//! |--------|--------|---------------------------------|
//! | 0      | 446    | Boot code (left zeroed)         |
//! | 446    | 4 * 16 | Partition entries               |
//! | 510    | 2      | Boot signature `0x55 0xAA`      |

use byteorder::{ByteOrder, LittleEndian};

use crate::{
  layout::{Diagnostic, PartitionRecord},
  prelude::*,
  serialize::{ensure_len, SectorDeserialize, SectorSerialize},
};

pub const MBR_SIZE: usize = 512;
pub const MAX_PARTITIONS: usize = 4;
pub const PARTITION_TABLE_OFFSET: usize = 446;
pub const PARTITION_ENTRY_SIZE: usize = 16;
pub const SIGNATURE_OFFSET: usize = 510;
/// `0x55 0xAA` read as a little-endian word.
pub const SIGNATURE: u16 = 0xAA55;

bitflags::bitflags! {
  /// Status byte of a partition entry.
  #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
  pub struct PartitionStatus: u8 {
    const BOOTABLE = 0x80;
  }
}

/// Raw on-disk partition entry. CHS fields are never filled in; LBA addressing only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
struct RawPartitionEntry {
  status: u8,
  chs_start: [u8; 3],
  partition_type: u8,
  chs_end: [u8; 3],
  start_lba: [u8; 4],
  sector_count: [u8; 4],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionEntry {
  pub status: PartitionStatus,
  pub partition_type: u8,
  pub start_lba: u32,
  pub sector_count: u32,
}

impl PartitionEntry {
  pub fn is_bootable(&self) -> bool {
    self.status.contains(PartitionStatus::BOOTABLE)
  }

  fn to_raw(self) -> RawPartitionEntry {
    let mut raw: RawPartitionEntry = bytemuck::Zeroable::zeroed();
    raw.status = self.status.bits();
    raw.partition_type = self.partition_type;
    LittleEndian::write_u32(&mut raw.start_lba, self.start_lba);
    LittleEndian::write_u32(&mut raw.sector_count, self.sector_count);
    raw
  }
}

impl TryFrom<&PartitionRecord> for PartitionEntry {
  type Error = Error;

  fn try_from(record: &PartitionRecord) -> Result<Self> {
    let out_of_range = || Error::PartitionOutOfRange {
      name: record.name.clone(),
      start_lba: record.start_lba,
      sector_count: record.sector_count,
    };

    Ok(Self {
      status: match record.bootable {
        true => PartitionStatus::BOOTABLE,
        false => PartitionStatus::empty(),
      },
      partition_type: record.partition_type,
      start_lba: u32::try_from(record.start_lba).map_err(|_| out_of_range())?,
      sector_count: u32::try_from(record.sector_count).map_err(|_| out_of_range())?,
    })
  }
}

impl SectorSerialize for PartitionEntry {
  fn extent(&self) -> usize {
    PARTITION_ENTRY_SIZE
  }

  fn serialize(&self, out: &mut [u8]) -> Result<()> {
    ensure_len(out, PARTITION_ENTRY_SIZE)?;

    out[..PARTITION_ENTRY_SIZE].copy_from_slice(bytemuck::bytes_of(&self.to_raw()));

    Ok(())
  }
}

impl SectorDeserialize for PartitionEntry {
  fn deserialize(bytes: &[u8]) -> Result<Self> {
    ensure_len(bytes, PARTITION_ENTRY_SIZE)?;

    let raw: RawPartitionEntry = bytemuck::pod_read_unaligned(&bytes[..PARTITION_ENTRY_SIZE]);

    Ok(Self {
      status: PartitionStatus::from_bits_retain(raw.status),
      partition_type: raw.partition_type,
      start_lba: LittleEndian::read_u32(&raw.start_lba),
      sector_count: LittleEndian::read_u32(&raw.sector_count),
    })
  }
}

/// Partition table written to sector 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MasterBootRecord {
  slots: [Option<PartitionEntry>; MAX_PARTITIONS],
}

impl MasterBootRecord {
  /// Builds the table from planned partitions, in order.
  ///
  /// Records past the fourth are left out and reported. A kept record whose
  /// start LBA or sector count does not fit in 32 bits is an error.
  pub fn from_partitions(records: &[PartitionRecord]) -> Result<(Self, Vec<Diagnostic>)> {
    let mut mbr = Self::default();
    let mut diagnostics = vec![];

    for (index, record) in records.iter().enumerate() {
      if index >= MAX_PARTITIONS {
        diagnostics.push(Diagnostic::PartitionDropped {
          name: record.name.clone(),
          index,
        });
        continue;
      }

      mbr.slots[index] = Some(PartitionEntry::try_from(record)?);
    }

    Ok((mbr, diagnostics))
  }

  /// Occupied entries in slot order.
  pub fn entries(&self) -> impl Iterator<Item = &PartitionEntry> {
    self.slots.iter().flatten()
  }

  pub fn slots(&self) -> &[Option<PartitionEntry>; MAX_PARTITIONS] {
    &self.slots
  }

  pub fn is_empty(&self) -> bool {
    self.entries().next().is_none()
  }

  /// Reads and decodes the first sector of `reader`.
  pub fn read_from<R>(mut reader: R) -> Result<Self>
  where
    R: std::io::Read + std::io::Seek,
  {
    let mut bytes = [0u8; MBR_SIZE];

    reader.seek(std::io::SeekFrom::Start(0))?;
    reader.read_exact(&mut bytes)?;

    Self::deserialize(&bytes)
  }
}

impl SectorSerialize for MasterBootRecord {
  fn extent(&self) -> usize {
    MBR_SIZE
  }

  /// Boot code and unused slots are zeroed.
  fn serialize(&self, out: &mut [u8]) -> Result<()> {
    ensure_len(out, self.extent())?;

    out[..MBR_SIZE].fill(0);

    for (ix, entry) in self.slots.iter().enumerate() {
      if let Some(entry) = entry {
        let offset = PARTITION_TABLE_OFFSET + ix * PARTITION_ENTRY_SIZE;
        entry.serialize(&mut out[offset..offset + entry.extent()])?;
      }
    }

    LittleEndian::write_u16(&mut out[SIGNATURE_OFFSET..], SIGNATURE);

    Ok(())
  }
}

impl SectorDeserialize for MasterBootRecord {
  fn deserialize(bytes: &[u8]) -> Result<Self> {
    ensure_len(bytes, MBR_SIZE)?;

    let signature = LittleEndian::read_u16(&bytes[SIGNATURE_OFFSET..]);

    if signature != SIGNATURE {
      return Err(Error::InvalidSignature(signature));
    }

    let mut mbr = Self::default();

    for (ix, slot) in mbr.slots.iter_mut().enumerate() {
      let offset = PARTITION_TABLE_OFFSET + ix * PARTITION_ENTRY_SIZE;
      let raw = &bytes[offset..offset + PARTITION_ENTRY_SIZE];

      // All-zero slot is unused.
      if raw.iter().all(|&b| b == 0) {
        continue;
      }

      *slot = Some(PartitionEntry::deserialize(raw)?);
    }

    Ok(mbr)
  }
}
