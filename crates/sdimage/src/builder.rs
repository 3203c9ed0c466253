//! High-level interface for building boot images with an optional MBR.

use std::path::Path;

use crate::{
  layout::{self, Diagnostic, Layout, PartitionRecord, Placement, PreferredSlots},
  mbr::{MasterBootRecord, MBR_SIZE},
  serialize::SectorSerialize,
  payload::{PartitionAttributes, PartitionPayload, Payload},
  writer::{self, WriteOp},
};

use super::prelude::*;

#[derive(Debug, Clone, Default)]
pub struct ImageBuilderOptions {
  pub preferred_slots: PreferredSlots,
  /// Fail the build instead of only logging when a [Diagnostic] is produced.
  pub deny_warnings: bool,
}

/// Resolved layout plus the partition table to write at sector 0, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePlan {
  layout: Layout,
  mbr: Option<MasterBootRecord>,
  diagnostics: Vec<Diagnostic>,
}

impl ImagePlan {
  pub fn layout(&self) -> &Layout {
    &self.layout
  }

  pub fn mbr(&self) -> Option<&MasterBootRecord> {
    self.mbr.as_ref()
  }

  /// Every diagnostic from collecting payloads, planning and building the partition table.
  pub fn diagnostics(&self) -> &[Diagnostic] {
    &self.diagnostics
  }

  fn mbr_bytes(&self) -> Result<Option<[u8; MBR_SIZE]>> {
    self
      .mbr
      .as_ref()
      .map(|mbr| -> Result<_> {
        let mut bytes = [0u8; MBR_SIZE];
        mbr.serialize(&mut bytes)?;
        Ok(bytes)
      })
      .transpose()
  }
}

/// What ended up in a written image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
  pub placements: Vec<Placement>,
  pub partitions: Vec<PartitionRecord>,
  pub diagnostics: Vec<Diagnostic>,
  /// Number of partitions listed in the MBR; zero when no MBR was written.
  pub mbr_entries: usize,
  pub image_size: u64,
}

#[derive(Debug, Default)]
pub struct ImageBuilder {
  options: ImageBuilderOptions,
  payloads: Vec<Payload>,
  partitions: Vec<PartitionPayload>,
  diagnostics: Vec<Diagnostic>,
}

impl ImageBuilder {
  pub fn new(options: ImageBuilderOptions) -> Self {
    Self {
      options,
      payloads: vec![],
      partitions: vec![],
      diagnostics: vec![],
    }
  }

  pub fn options(&self) -> &ImageBuilderOptions {
    &self.options
  }

  /// Adds a payload placed according to the preferred slots.
  ///
  /// Payloads are placed in the order they are added, before any partition payload.
  pub fn add_payload(&mut self, payload: Payload) -> &mut Self {
    if !self.partitions.is_empty() {
      self.diagnostics.push(Diagnostic::PayloadAfterPartition {
        name: payload.name().to_owned(),
      });
    }

    self.payloads.push(payload);
    self
  }

  /// Adds a partition payload with the default attributes (type `0x83`, not bootable).
  pub fn add_partition(&mut self, payload: Payload) -> &mut Self {
    self.add_partition_with(payload, PartitionAttributes::default())
  }

  pub fn add_partition_with(
    &mut self,
    payload: Payload,
    attributes: PartitionAttributes,
  ) -> &mut Self {
    self.partitions.push(PartitionPayload {
      payload,
      attributes,
    });
    self
  }

  /// Plans the image without writing anything.
  pub fn plan(&self) -> Result<ImagePlan> {
    let layout = layout::plan(
      &self.options.preferred_slots,
      &self.payloads,
      &self.partitions,
    )?;

    let (mbr, mbr_diagnostics) = MasterBootRecord::from_partitions(layout.partitions())?;

    let diagnostics: Vec<_> = self
      .diagnostics
      .iter()
      .chain(layout.diagnostics())
      .chain(&mbr_diagnostics)
      .cloned()
      .collect();

    for diagnostic in &diagnostics {
      log::warn!("{}", diagnostic);
    }

    if self.options.deny_warnings && !diagnostics.is_empty() {
      return Err(Error::WarningsDenied(diagnostics));
    }

    Ok(ImagePlan {
      mbr: (!mbr.is_empty()).then_some(mbr),
      layout,
      diagnostics,
    })
  }

  /// Builds the image into `writer`, which is expected to be empty.
  pub fn build<W>(&self, writer: W) -> Result<BuildReport>
  where
    W: std::io::Write + std::io::Seek,
  {
    let plan = self.plan()?;
    let mbr_bytes = plan.mbr_bytes()?;
    let image_size = writer::write_image(writer, self.write_ops(&plan, mbr_bytes.as_ref()))?;

    Ok(self.report(plan, image_size))
  }

  /// Builds the image at `path`. The file is only replaced once the whole image was written.
  pub fn build_to_path(&self, path: impl AsRef<Path>) -> Result<BuildReport> {
    let plan = self.plan()?;
    let mbr_bytes = plan.mbr_bytes()?;
    let image_size =
      writer::write_image_atomic(path, self.write_ops(&plan, mbr_bytes.as_ref()))?;

    Ok(self.report(plan, image_size))
  }

  /// Payload writes in placement order, then the MBR at sector 0.
  fn write_ops<'a>(
    &'a self,
    plan: &'a ImagePlan,
    mbr_bytes: Option<&'a [u8; MBR_SIZE]>,
  ) -> impl Iterator<Item = WriteOp<'a>> {
    let payloads = self
      .payloads
      .iter()
      .chain(self.partitions.iter().map(|partition| &partition.payload));

    plan
      .layout
      .placements()
      .iter()
      .zip(payloads)
      .map(|(placement, payload)| WriteOp {
        name: payload.name(),
        lba: placement.lba,
        data: payload.bytes(),
      })
      .chain(mbr_bytes.map(|bytes| WriteOp {
        name: "MBR",
        lba: 0,
        data: bytes,
      }))
  }

  fn report(&self, plan: ImagePlan, image_size: u64) -> BuildReport {
    BuildReport {
      mbr_entries: plan.mbr.as_ref().map_or(0, |mbr| mbr.entries().count()),
      placements: plan.layout.placements().to_vec(),
      partitions: plan.layout.partitions().to_vec(),
      diagnostics: plan.diagnostics,
      image_size,
    }
  }
}
