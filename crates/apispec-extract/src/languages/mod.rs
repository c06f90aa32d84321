pub mod extractor_utils;
pub mod go;

pub use go::{extract_package, go_parser, ParsedFile};
