use sdimage::{
  Diagnostic, ImageBuilder, ImageBuilderOptions, Payload, PreferredSlots,
  error::Error,
  layout::PayloadKind,
  mbr::MasterBootRecord,
  serialize::SectorDeserialize,
};

fn sector(bytes: &[u8], lba: usize) -> &[u8] {
  &bytes[lba * 512..(lba + 1) * 512]
}

#[test]
fn small_payloads_use_preferred_slots() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("sd.img");

  let mut builder = ImageBuilder::new(ImageBuilderOptions {
    preferred_slots: PreferredSlots::dual_bootloader(),
    ..Default::default()
  });
  builder
    .add_payload(Payload::new("a.bin", vec![0xAA; 300]))
    .add_payload(Payload::new("b.bin", vec![0xBB; 1200]));

  let report = builder.build_to_path(&path).unwrap();

  let summary: Vec<_> = report
    .placements
    .iter()
    .map(|p| (p.name.as_str(), p.lba, p.padded_size))
    .collect();
  assert_eq!(summary, [("a.bin", 128, 512), ("b.bin", 640, 1536)]);
  assert!(report.diagnostics.is_empty());
  assert_eq!(report.mbr_entries, 0);

  let bytes = std::fs::read(&path).unwrap();
  assert_eq!(bytes.len() as u64, report.image_size);
  assert_eq!(bytes.len(), 643 * 512);

  // No partitions: sector 0 stays zero.
  assert!(sector(&bytes, 0).iter().all(|&b| b == 0));

  let a = sector(&bytes, 128);
  assert!(a[..300].iter().all(|&b| b == 0xAA));
  assert!(a[300..].iter().all(|&b| b == 0));
  assert!(bytes[129 * 512..640 * 512].iter().all(|&b| b == 0));
  assert!(bytes[640 * 512..640 * 512 + 1200].iter().all(|&b| b == 0xBB));
  assert!(bytes[640 * 512 + 1200..].iter().all(|&b| b == 0));
}

#[test]
fn large_first_payload_pushes_second_past_its_slot() {
  let mut builder = ImageBuilder::default();
  builder
    .add_payload(Payload::new("a.bin", vec![1; 2_000_000]))
    .add_payload(Payload::new("b.bin", vec![2; 10]));

  let mut image = std::io::Cursor::new(vec![]);
  let report = builder.build(&mut image).unwrap();

  assert_eq!(report.placements[0].lba, 128);
  assert_eq!(report.placements[0].padded_size / 512, 3907);
  assert_eq!(report.placements[1].lba, 4035);
  assert_eq!(
    report.diagnostics,
    [Diagnostic::PreferredSlotOverlap {
      name: "b.bin".into(),
      preferred: 640,
      fallback: 4035,
    }]
  );

  let bytes = image.into_inner();
  assert_eq!(sector(&bytes, 4035)[0], 2);
  assert_eq!(sector(&bytes, 4034)[2_000_000 % 512 - 1], 1);
}

#[test]
fn partitions_get_an_mbr_written_at_sector_zero() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("sd.img");

  let mut builder = ImageBuilder::default();
  builder
    .add_payload(Payload::new("spl.bin", vec![0x5A; 700]))
    .add_payload(Payload::new("fip.bin", vec![0x6B; 512]))
    .add_partition(Payload::new("boot.vfat", vec![0x7C; 4096]))
    .add_partition(Payload::new("rootfs.ext4", vec![0x8D; 1000]));

  let report = builder.build_to_path(&path).unwrap();

  let placements: Vec<_> = report
    .placements
    .iter()
    .map(|p| (p.name.as_str(), p.kind, p.lba))
    .collect();
  assert_eq!(
    placements,
    [
      ("spl.bin", PayloadKind::Ordinary, 128),
      ("fip.bin", PayloadKind::Ordinary, 640),
      ("boot.vfat", PayloadKind::Partition, 641),
      ("rootfs.ext4", PayloadKind::Partition, 649),
    ]
  );
  assert_eq!(report.mbr_entries, 2);

  let file = std::fs::File::open(&path).unwrap();
  let mbr = MasterBootRecord::read_from(file).unwrap();
  let entries: Vec<_> = mbr
    .entries()
    .map(|e| (e.is_bootable(), e.partition_type, e.start_lba, e.sector_count))
    .collect();
  assert_eq!(entries, [(false, 0x83, 641, 8), (false, 0x83, 649, 2)]);

  let bytes = std::fs::read(&path).unwrap();
  assert_eq!(bytes.len(), 651 * 512);
  assert!(bytes[..446].iter().all(|&b| b == 0));
  assert_eq!(&bytes[510..512], &[0x55, 0xAA]);
  assert!(sector(&bytes, 641).iter().all(|&b| b == 0x7C));
}

#[test]
fn fifth_partition_is_placed_but_not_listed() {
  let mut builder = ImageBuilder::default();
  builder.add_payload(Payload::new("spl.bin", vec![0; 1]));

  for ix in 0..5 {
    builder.add_partition(Payload::new(format!("p{ix}"), vec![ix as u8 + 1; 512]));
  }

  let mut image = std::io::Cursor::new(vec![]);
  let report = builder.build(&mut image).unwrap();

  assert_eq!(report.placements.len(), 6);
  assert_eq!(report.partitions.len(), 5);
  assert_eq!(report.mbr_entries, 4);
  assert_eq!(
    report.diagnostics,
    [Diagnostic::PartitionDropped {
      name: "p4".into(),
      index: 4,
    }]
  );

  let bytes = image.into_inner();
  let mbr = MasterBootRecord::deserialize(sector(&bytes, 0)).unwrap();
  let starts: Vec<_> = mbr.entries().map(|e| e.start_lba).collect();
  assert_eq!(starts, [129, 130, 131, 132]);

  // The dropped partition's data is still in the image.
  assert!(sector(&bytes, 133).iter().all(|&b| b == 5));
}

#[test]
fn payloads_are_read_from_files() {
  let dir = tempfile::tempdir().unwrap();
  let spl = dir.path().join("spl.bin");
  std::fs::write(&spl, [0x42; 513]).unwrap();

  let payload = Payload::from_path(&spl).unwrap();
  assert_eq!(payload.name(), "spl.bin");
  assert_eq!(payload.len(), 513);

  let missing = Payload::from_path(dir.path().join("missing.bin"));
  assert!(matches!(missing, Err(Error::ReadPayload { .. })));
}

#[test]
fn failed_build_leaves_destination_untouched() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("sd.img");
  std::fs::write(&path, b"previous image").unwrap();

  let mut builder = ImageBuilder::new(ImageBuilderOptions {
    deny_warnings: true,
    ..Default::default()
  });
  builder
    .add_payload(Payload::new("a.bin", vec![0; 2_000_000]))
    .add_payload(Payload::new("b.bin", vec![0; 1]));

  assert!(matches!(
    builder.build_to_path(&path),
    Err(Error::WarningsDenied(_))
  ));
  assert_eq!(std::fs::read(&path).unwrap(), b"previous image");

  let empty = ImageBuilder::default();
  assert!(matches!(empty.build_to_path(&path), Err(Error::NoPayloads)));
  assert_eq!(std::fs::read(&path).unwrap(), b"previous image");

  // Only the destination ever appears in the directory.
  let entries = std::fs::read_dir(dir.path()).unwrap().count();
  assert_eq!(entries, 1);
}

#[test]
fn unwritable_destination_is_an_error() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("missing-dir").join("sd.img");

  let mut builder = ImageBuilder::default();
  builder.add_payload(Payload::new("a.bin", vec![0; 1]));

  assert!(matches!(builder.build_to_path(&path), Err(Error::Io(_))));
  assert!(!path.exists());
}

#[test]
fn identical_inputs_produce_identical_images() {
  let build = || {
    let mut builder = ImageBuilder::default();
    builder
      .add_payload(Payload::new("a", vec![3; 70_000]))
      .add_payload(Payload::new("b", vec![4; 5]))
      .add_payload(Payload::new("c", vec![5; 1025]))
      .add_payload(Payload::new("d", vec![6; 9]))
      .add_partition(Payload::new("r", vec![7; 3000]));

    let mut image = std::io::Cursor::new(vec![]);
    builder.build(&mut image).unwrap();
    image.into_inner()
  };

  assert_eq!(build(), build());
}

#[cfg(unix)]
#[test]
fn rebuilt_image_keeps_its_permissions() {
  use std::os::unix::fs::PermissionsExt;

  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("sd.img");
  std::fs::write(&path, b"previous image").unwrap();
  std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

  let mut builder = ImageBuilder::default();
  builder.add_payload(Payload::new("a.bin", vec![1; 10]));
  builder.build_to_path(&path).unwrap();

  let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
  assert_eq!(mode, 0o644);

  std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o640)).unwrap();
  builder.build_to_path(&path).unwrap();

  let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
  assert_eq!(mode, 0o640);
}

#[cfg(unix)]
#[test]
fn new_image_gets_default_create_permissions() {
  use std::os::unix::fs::PermissionsExt;

  let dir = tempfile::tempdir().unwrap();
  let reference = dir.path().join("reference");
  std::fs::File::create(&reference).unwrap();
  let path = dir.path().join("sd.img");

  let mut builder = ImageBuilder::default();
  builder.add_payload(Payload::new("a.bin", vec![1; 10]));
  builder.build_to_path(&path).unwrap();

  let mode = |p: &std::path::Path| std::fs::metadata(p).unwrap().permissions().mode() & 0o777;
  assert_eq!(mode(&path), mode(&reference));
}
