//! C7 (route extractor), C8 (schema synthesizer), and C9 (document
//! assembler) over an `apispec_graph` tracker tree. This is the final stage
//! of the pipeline: it turns the static call graph into an OpenAPI document.

pub mod document;
pub mod routes;
pub mod schema;
pub mod tags;

pub use document::{assemble, Components, Document, Info, MediaType, Operation, Parameter, PathItem, RequestBody, Response, Server};
pub use routes::{entry_points, Route, ResponseSpec, RouteExtractor};
pub use schema::{InlineSchema, RefSchema, Schema, SchemaSynthesizer};
