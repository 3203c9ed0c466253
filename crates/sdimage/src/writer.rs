//! Writes planned payloads into an image.

use std::{
  io::{Seek, SeekFrom, Write},
  path::Path,
};

use crate::{
  lba::{self, SECTOR_SIZE},
  prelude::*,
};

const ZEROS: [u8; SECTOR_SIZE as usize] = [0; SECTOR_SIZE as usize];

/// A single write into the image: `data` at `lba`, zero-padded to a whole sector.
#[derive(Debug, Clone, Copy)]
pub struct WriteOp<'a> {
  pub name: &'a str,
  pub lba: u64,
  pub data: &'a [u8],
}

pub struct SectorWriter<Storage> {
  storage: Storage,
  /// Byte offset one past the furthest write so far.
  extent: u64,
}

impl<Storage> SectorWriter<Storage>
where
  Storage: Write + Seek,
{
  pub fn new(storage: Storage) -> Self {
    Self { storage, extent: 0 }
  }

  /// Writes `buf` starting at `lba`, padding with zeros up to the next sector boundary.
  ///
  /// Returns the padded length.
  pub fn write_aligned(&mut self, lba: u64, buf: &[u8]) -> std::io::Result<u64> {
    let pad = (SECTOR_SIZE - buf.len() as u64 % SECTOR_SIZE) % SECTOR_SIZE;
    let padded = buf.len() as u64 + pad;

    let Some(end) = lba::byte_offset(lba).and_then(|offset| offset.checked_add(padded)) else {
      return Err(std::io::Error::new(
        std::io::ErrorKind::InvalidInput,
        format!("sector {lba} is beyond the addressable range"),
      ));
    };
    let offset = end - padded;

    log::info!(
      "Writing {} bytes (+{} padding) at sector {}",
      buf.len(),
      pad,
      lba
    );

    self.storage.seek(SeekFrom::Start(offset))?;
    self.storage.write_all(buf)?;
    self.storage.write_all(&ZEROS[..pad as usize])?;

    self.extent = self.extent.max(end);

    Ok(padded)
  }

  /// Size in bytes of the image written so far.
  pub fn extent(&self) -> u64 {
    self.extent
  }

  pub fn into_inner(self) -> Storage {
    self.storage
  }
}

/// Performs `ops` in order against `writer`. Returns the resulting image size in bytes.
pub fn write_image<'a, W>(writer: W, ops: impl IntoIterator<Item = WriteOp<'a>>) -> Result<u64>
where
  W: Write + Seek,
{
  let mut sector_writer = SectorWriter::new(std::io::BufWriter::new(writer));

  for op in ops {
    log::debug!("Writing {} at LBA {}", op.name, op.lba);
    sector_writer.write_aligned(op.lba, op.data)?;
  }

  let extent = sector_writer.extent();

  sector_writer.into_inner().flush()?;

  Ok(extent)
}

/// Like [write_image], but to the file at `path`, replacing it only once every write succeeded.
///
/// The image is assembled in a temporary file next to `path` and renamed over it. An existing
/// image keeps its permissions.
pub fn write_image_atomic<'a>(
  path: impl AsRef<Path>,
  ops: impl IntoIterator<Item = WriteOp<'a>>,
) -> Result<u64> {
  let path = path.as_ref();

  let directory = match path.parent() {
    Some(parent) if !parent.as_os_str().is_empty() => parent,
    _ => Path::new("."),
  };

  let mut builder = tempfile::Builder::new();

  // New images get the usual 0666 & !umask, like a plain create.
  #[cfg(unix)]
  {
    use std::os::unix::fs::PermissionsExt;
    builder.permissions(std::fs::Permissions::from_mode(0o666));
  }

  let mut temp = builder.prefix(".sdimage").tempfile_in(directory)?;

  let extent = write_image(temp.as_file_mut(), ops)?;

  // A replaced image keeps its mode.
  match std::fs::metadata(path) {
    Ok(metadata) => temp.as_file().set_permissions(metadata.permissions())?,
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
    Err(e) => return Err(e.into()),
  }

  temp.as_file().sync_all()?;
  temp.persist(path)?;

  log::info!("Wrote {} ({} bytes)", path.display(), extent);

  Ok(extent)
}
