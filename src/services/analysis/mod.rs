//! Type inference, profiling and automatic chart selection over a decoded
//! table. Everything here is synchronous and free of I/O.

pub mod charts;
pub mod dashboard;
pub mod inference;
pub mod metric;
pub mod profiler;
pub mod types;
pub mod utils;

pub use dashboard::dashboard;
pub use inference::{infer_column_type, Inference};
pub use metric::pick_primary_metric;
pub use profiler::profile;
pub use types::*;
