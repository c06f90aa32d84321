pub mod file_collect;
pub mod languages;
pub mod pipeline;
pub mod resolve;

pub use file_collect::{collect_packages, read_module_path, PackageFiles};
pub use languages::{extract_package, go_parser, ParsedFile};
pub use pipeline::{extract_module, ExtractionOutcome};
