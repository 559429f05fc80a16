mod characteristics;
mod image;
mod parser;
mod pe_header;
mod pe_optional_header;
mod section_header;

use std::io::Cursor;

pub use characteristics::{FileCharacteristics, SectionCharacteristics};
pub use image::PeImage;
pub use parser::PeParser;
pub use pe_header::PeHeader;
pub use pe_optional_header::PeOptionalHeader;
pub use section_header::SectionHeader;

pub(crate) type Buffer = Cursor<Vec<u8>>;
