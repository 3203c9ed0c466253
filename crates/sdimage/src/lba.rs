/// Size of a sector in bytes. All offsets and lengths in an image are multiples of this.
pub const SECTOR_SIZE: u64 = 512;

/// Number of sectors needed to hold `size` bytes.
pub fn sectors_for(size: u64) -> u64 {
  size.div_ceil(SECTOR_SIZE)
}

/// `size` rounded up to the next sector boundary.
pub fn padded_size(size: u64) -> u64 {
  sectors_for(size) * SECTOR_SIZE
}

/// Byte offset of `lba`, `None` if it does not fit in 64 bits.
pub fn byte_offset(lba: u64) -> Option<u64> {
  lba.checked_mul(SECTOR_SIZE)
}

/// Next free LBA of an image under construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LbaCursor {
  next_lba: u64,
}

impl LbaCursor {
  pub fn new(offset: u64) -> Self {
    Self { next_lba: offset }
  }

  pub fn next_lba(&self) -> u64 {
    self.next_lba
  }

  /// Returns the cursor positioned right after `padded_size` bytes placed at `lba`.
  ///
  /// `None` when the end of the placement is not addressable as a byte offset.
  pub fn advance_past(self, lba: u64, padded_size: u64) -> Option<Self> {
    let next_lba = lba.checked_add(padded_size / SECTOR_SIZE)?;
    byte_offset(next_lba)?;
    Some(Self { next_lba })
  }
}
