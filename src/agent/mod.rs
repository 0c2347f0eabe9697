//! Agent reply pipeline.

pub mod pipeline;

pub use pipeline::{PipelineConfig, ReplyPipeline};
