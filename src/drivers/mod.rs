// src/drivers/mod.rs
pub mod buffer;
pub mod cache;
pub mod error;
pub mod peaks;
pub mod pipeline;
pub mod plot;
pub mod source;
pub use buffer::{linspace, RenderSnapshot, ScrollBuffer};
pub use error::AnalyzerError;
pub use peaks::{detect_peaks, summarize};
pub use pipeline::{process_chunk, ChannelResult, ChunkResult, DetectionParams};
pub use plot::{render_snapshot_png, PlotStyle};
pub use source::{ChunkSource, ManualSource, SampleChunk, SampleTable, TableSource};
