pub mod consumer;
pub mod recorder;

pub use consumer::run;
pub use recorder::{engagement_rate, record_snapshot, MetricsInput};
