// src/lib.rs
pub mod config;
pub mod drivers;
pub mod engine;
pub mod session;
pub use config::AnalyzerConfig;
pub use drivers::{AnalyzerError, RenderSnapshot};
pub use session::{AnalyzerSession, SessionState, Tick};
