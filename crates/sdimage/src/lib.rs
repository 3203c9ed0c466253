//! Builds raw block-device images for embedded boot flows.
//!
//! Payloads are placed at logical block addresses according to a list of
//! preferred slots, and an optional MBR describes the partition payloads.

pub mod builder;
pub mod error;
pub mod layout;
pub mod lba;
pub mod mbr;
pub mod payload;
pub mod serialize;
pub mod writer;

pub mod prelude {
  pub use crate::error::Error;

  pub type Result<T> = std::result::Result<T, Error>;
}

pub use builder::{BuildReport, ImageBuilder, ImageBuilderOptions, ImagePlan};
pub use layout::{Diagnostic, Layout, Placement, PreferredSlots};
pub use payload::{PartitionAttributes, Payload};
