mod cli;
mod summary;

use sdimage::{
  mbr::MasterBootRecord, prelude::*, ImageBuilder, ImageBuilderOptions, PartitionAttributes,
  Payload, PreferredSlots,
};

fn main() -> Result<()> {
  use cli::*;

  pretty_env_logger::init();

  match cli::parse().command {
    Command::Create {
      output,
      slots,
      no_slots,
      partition_type,
      bootable,
      deny_warnings,
      inputs,
      ..
    } => {
      let mut builder = ImageBuilder::new(ImageBuilderOptions {
        preferred_slots: match no_slots {
          true => PreferredSlots::none(),
          false => PreferredSlots::from_lbas(slots),
        },
        deny_warnings,
      });

      let mut partition_ix = 0;

      for input in inputs {
        match input {
          Input::Payload(path) => {
            builder.add_payload(Payload::from_path(path)?);
          }
          Input::Partition(path) => {
            partition_ix += 1;
            builder.add_partition_with(
              Payload::from_path(path)?,
              PartitionAttributes {
                partition_type,
                bootable: bootable == Some(partition_ix),
              },
            );
          }
        }
      }

      let report = builder.build_to_path(&output)?;

      print!("{}", summary::render(&report));
    }
    Command::Inspect { image } => {
      let mbr = MasterBootRecord::read_from(std::fs::File::open(&image)?)?;

      log::debug!("Read partition table from {}", image.display());

      print!("{}", summary::render_mbr(&mbr));
    }
  }

  Ok(())
}
