mod convert;
mod elf;
mod error;
mod pe_image;

#[cfg(test)]
pub(crate) mod testutil;

pub use convert::convert;
pub use elf::*;
pub use error::{Error, Result};
pub use pe_image::*;
