use clap::*;
use sdimage::{mbr::MAX_PARTITIONS, PreferredSlots};
use std::path::PathBuf;

/// A file given on the command line, in the order it appeared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
  Payload(PathBuf),
  Partition(PathBuf),
}

#[derive(Debug, Subcommand)]
pub enum Command {
  /// Create (or replace) an image from boot payloads and partition payloads.
  Create {
    output: PathBuf,
    /// Payloads placed at the preferred slots, in order.
    #[clap(required = true)]
    payloads: Vec<PathBuf>,
    /// Payload that also gets an MBR partition entry. May be repeated.
    #[clap(short, long = "partition", value_name = "FILE")]
    partitions: Vec<PathBuf>,
    /// Preferred starting LBAs, assigned to payloads in order.
    #[clap(
      long,
      value_delimiter = ',',
      default_values_t = PreferredSlots::REFERENCE,
      conflicts_with = "no_slots"
    )]
    slots: Vec<u64>,
    /// Pack every payload right after the previous one.
    #[clap(long)]
    no_slots: bool,
    /// MBR partition type, in hex.
    #[clap(long, value_parser = parse_hex_u8, default_value = "83")]
    partition_type: u8,
    /// 1-based index of the partition to mark bootable.
    #[clap(long, value_name = "INDEX")]
    bootable: Option<usize>,
    /// Fail instead of warning when a payload cannot be placed as requested.
    #[clap(long)]
    deny_warnings: bool,
    #[clap(skip)]
    inputs: Vec<Input>,
  },
  /// Print the partition table of an image.
  Inspect { image: PathBuf },
}

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
  #[clap(subcommand)]
  pub command: Command,
}

fn parse_hex_u8(s: &str) -> std::result::Result<u8, String> {
  let digits = s
    .strip_prefix("0x")
    .or_else(|| s.strip_prefix("0X"))
    .unwrap_or(s);

  u8::from_str_radix(digits, 16).map_err(|e| format!("invalid partition type {s:?}: {e}"))
}

/// Payloads and partitions merged back into command-line order.
fn ordered_inputs(matches: &ArgMatches) -> Vec<Input> {
  fn indexed<'a>(
    matches: &'a ArgMatches,
    id: &str,
    input: fn(PathBuf) -> Input,
  ) -> impl Iterator<Item = (usize, Input)> + 'a {
    let values = matches.get_many::<PathBuf>(id).into_iter().flatten();
    let indices = matches.indices_of(id).into_iter().flatten();

    indices.zip(values).map(move |(ix, path)| (ix, input(path.clone())))
  }

  let mut inputs: Vec<_> = indexed(matches, "payloads", Input::Payload)
    .chain(indexed(matches, "partitions", Input::Partition))
    .collect();

  inputs.sort_by_key(|(ix, _)| *ix);
  inputs.into_iter().map(|(_, input)| input).collect()
}

/// Checks that `--bootable` names a partition that gets an MBR entry.
fn validate_bootable(
  bootable: Option<usize>,
  partitions: usize,
) -> std::result::Result<(), String> {
  let Some(ix) = bootable else {
    return Ok(());
  };

  match ix {
    0 => Err("--bootable is 1-based; 0 is not a partition".into()),
    ix if ix > partitions => Err(format!(
      "--bootable {ix}: only {partitions} partition(s) given"
    )),
    ix if ix > MAX_PARTITIONS => Err(format!(
      "--bootable {ix}: only the first {MAX_PARTITIONS} partitions are listed in the MBR"
    )),
    _ => Ok(()),
  }
}

fn from_matches(matches: &ArgMatches) -> std::result::Result<Cli, Error> {
  let mut cli = Cli::from_arg_matches(matches)?;

  if let (Command::Create { inputs, bootable, .. }, Some(create)) =
    (&mut cli.command, matches.subcommand_matches("create"))
  {
    *inputs = ordered_inputs(create);

    let partitions = inputs
      .iter()
      .filter(|input| matches!(input, Input::Partition(_)))
      .count();

    validate_bootable(*bootable, partitions)
      .map_err(|msg| Cli::command().error(error::ErrorKind::ValueValidation, msg))?;
  }

  Ok(cli)
}

pub fn parse() -> Cli {
  from_matches(&Cli::command().get_matches()).unwrap_or_else(|e| e.exit())
}
