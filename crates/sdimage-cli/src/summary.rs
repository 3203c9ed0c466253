use std::fmt::Write;

use sdimage::{lba::SECTOR_SIZE, mbr::MasterBootRecord, BuildReport};

/// Table of every placement, followed by warnings and the partition count.
pub fn render(report: &BuildReport) -> String {
  let mut out = String::new();

  let _ = writeln!(out, "\n{:<25} {:<8} {:<10} {:<8}", "File", "LBA", "Size", "Blocks");
  let _ = writeln!(out, "{}", "-".repeat(55));

  for placement in &report.placements {
    let _ = writeln!(
      out,
      "{:<25} {:<8} {:<10} {:<8}",
      placement.name,
      placement.lba,
      placement.padded_size,
      placement.padded_size / SECTOR_SIZE
    );
  }

  if report.mbr_entries > 0 {
    let _ = writeln!(out, "\nMBR at LBA 0 with {} partition(s)", report.mbr_entries);
  }

  for diagnostic in &report.diagnostics {
    let _ = writeln!(out, "warning: {}", diagnostic);
  }

  let _ = writeln!(out, "\nImage size: {} bytes", report.image_size);

  out
}

/// One line per partition table entry.
pub fn render_mbr(mbr: &MasterBootRecord) -> String {
  let mut out = String::new();

  let _ = writeln!(
    out,
    "{:<4} {:<6} {:<6} {:<12} {:<10}",
    "#", "Boot", "Type", "Start LBA", "Sectors"
  );

  for (ix, slot) in mbr.slots().iter().enumerate() {
    let Some(entry) = slot else {
      continue;
    };

    let _ = writeln!(
      out,
      "{:<4} {:<6} {:<6} {:<12} {:<10}",
      ix + 1,
      if entry.is_bootable() { "*" } else { "" },
      format!("{:#04x}", entry.partition_type),
      entry.start_lba,
      entry.sector_count
    );
  }

  out
}
