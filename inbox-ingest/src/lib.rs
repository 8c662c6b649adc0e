pub mod adapters;
pub mod consumer;
pub mod pipeline;

pub use adapters::{AdapterError, AdapterRegistry, NormalizedEvent, PlatformAdapter};
pub use consumer::run;
pub use pipeline::{IngestOutcome, IngestionPipeline};
