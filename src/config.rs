// src/config.rs
use std::path::Path;
use serde::{Deserialize, Serialize};
use crate::drivers::peaks::{DEFAULT_MIN_DURATION, DEFAULT_THRESHOLD};
use crate::drivers::pipeline::DetectionParams;
use crate::drivers::AnalyzerError;

/// All knobs of one analysis session. Every field is optional in JSON.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub threshold: f64,
    pub min_duration: usize,
    pub chunk_size: usize,
    /// Hz
    pub sample_rate: f64,
    /// Seconds of signal visible in the scrolling window.
    pub display_time: f64,
    pub downsample_factor: usize,
    /// Chunks the producer may run ahead of the display before it blocks.
    pub queue_capacity: usize,
    pub tick_interval_ms: u64,
    pub y_range: [f64; 2],
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            min_duration: DEFAULT_MIN_DURATION,
            chunk_size: 1000,
            sample_rate: 1000.0,
            display_time: 5.0,
            downsample_factor: 1,
            queue_capacity: 64,
            tick_interval_ms: 1000,
            y_range: [390.0, 1520.0],
        }
    }
}

/// Upper bound on each scroll buffer, checked before anything is allocated.
pub const MAX_DISPLAY_POINTS: usize = 5_000_000;

impl AnalyzerConfig {
    pub fn from_json_str(text: &str) -> Result<Self, AnalyzerError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, AnalyzerError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), AnalyzerError> {
        let fail = |msg: &str| -> Result<(), AnalyzerError> {
            Err(AnalyzerError::InvalidConfig(msg.to_owned()))
        };
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return fail("sample_rate must be greater than zero");
        }
        if !(self.display_time.is_finite() && self.display_time > 0.0) {
            return fail("display_time must be greater than zero");
        }
        if self.chunk_size == 0 {
            return fail("chunk_size must be at least 1");
        }
        if self.downsample_factor == 0 {
            return fail("downsample_factor must be at least 1");
        }
        if self.queue_capacity == 0 {
            return fail("queue_capacity must be at least 1");
        }
        if !self.threshold.is_finite() {
            return fail("threshold must be a finite number");
        }
        let points = self.display_time * self.effective_sample_rate();
        if points < 1.0 {
            return fail("display_time * sample_rate / downsample_factor must be at least 1");
        }
        if points > MAX_DISPLAY_POINTS as f64 {
            return fail("display window holds too many samples; lower display_time or raise downsample_factor");
        }
        Ok(())
    }

    /// Sample rate of the data after decimation.
    pub fn effective_sample_rate(&self) -> f64 {
        self.sample_rate / self.downsample_factor.max(1) as f64
    }

    /// Capacity of each scroll buffer.
    pub fn display_points(&self) -> usize {
        (self.display_time * self.effective_sample_rate()) as usize
    }

    pub fn detection_params(&self) -> DetectionParams {
        DetectionParams {
            threshold: self.threshold,
            min_duration: self.min_duration,
            downsample_factor: self.downsample_factor,
        }
    }
}
