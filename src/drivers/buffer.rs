use std::collections::VecDeque;
/// Rendering-ready view of both channels after one tick.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderSnapshot {
    pub adc1_samples: Vec<f64>,
    pub adc2_samples: Vec<f64>,
    pub time_axis: Vec<f64>, // seconds, shared by both channels
    pub adc1_peak_positions: Vec<usize>,
    pub adc2_peak_positions: Vec<usize>,
    pub window: (f64, f64),
    pub adc1_summary: Option<String>,
    pub adc2_summary: Option<String>,
}
impl RenderSnapshot {
    pub fn is_empty(&self) -> bool {
        self.time_axis.is_empty()
    }
    /// (time, value) pairs of a channel's peak markers.
    pub fn peak_points(samples: &[f64], time_axis: &[f64], peaks: &[usize]) -> Vec<[f64; 2]> {
        peaks
            .iter()
            .filter_map(|&p| Some([*time_axis.get(p)?, *samples.get(p)?]))
            .collect()
    }
    pub fn line_points(samples: &[f64], time_axis: &[f64]) -> Vec<[f64; 2]> {
        time_axis
            .iter()
            .zip(samples)
            .map(|(&t, &v)| [t, v])
            .collect()
    }
}
/// Fixed-capacity FIFO of the most recent samples of one channel.
#[derive(Clone, Debug)]
pub struct ScrollBuffer {
    data: VecDeque<f64>,
    capacity: usize,
}
/// Where an appended slice ended up inside the buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AppendOutcome {
    /// Number of leading input samples that were not kept at all.
    pub skipped: usize,
    /// Buffer index of the first kept input sample, after eviction.
    pub first_index: usize,
    /// Number of input samples kept.
    pub kept: usize,
}
impl AppendOutcome {
    /// Map an index into the appended slice onto the buffer, if it survived.
    pub fn translate(&self, input_index: usize) -> Option<usize> {
        let offset = input_index.checked_sub(self.skipped)?;
        (offset < self.kept).then_some(self.first_index + offset)
    }
}
impl ScrollBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: VecDeque::with_capacity(capacity),
            capacity,
        }
    }
    pub fn capacity(&self) -> usize {
        self.capacity
    }
    pub fn len(&self) -> usize {
        self.data.len()
    }
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
    pub fn clear(&mut self) {
        self.data.clear();
    }
    /// Append the tail of `samples` that fits, evicting the oldest entries.
    pub fn extend_tail(&mut self, samples: &[f64]) -> AppendOutcome {
        let kept = samples.len().min(self.capacity);
        let skipped = samples.len() - kept;
        let len_before = self.data.len();
        for &sample in &samples[skipped..] {
            if self.data.len() == self.capacity {
                self.data.pop_front();
            }
            self.data.push_back(sample);
        }
        let evicted = (len_before + kept).saturating_sub(self.capacity);
        AppendOutcome {
            skipped,
            first_index: len_before - evicted,
            kept,
        }
    }
    pub fn to_vec(&self) -> Vec<f64> {
        self.data.iter().copied().collect()
    }
}
/// `count` evenly spaced values from `start` to `end` inclusive.
pub fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (count - 1) as f64;
            (0..count).map(|i| start + step * i as f64).collect()
        }
    }
}
