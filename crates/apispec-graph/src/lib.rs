//! C4 (call-graph index), C5 (tracker tree), and C6 (pattern matcher) over
//! an `apispec_core::MetadataStore`. Read-only: nothing in this crate
//! mutates the store it's handed.

pub mod index;
pub mod pattern;
pub mod render;
pub mod tracker;

pub use index::CallGraphIndex;
pub use pattern::{match_any, match_one, resolve_capture_argref, Bindings, CaptureValue, PatternMatch};
pub use render::{GraphEdge, GraphExport, GraphNode, NodeScope};
pub use tracker::{TrackerBuilder, TrackerNode};
