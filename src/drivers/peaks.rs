//! Duration-gated threshold peak detection.
//!
//! A peak is a maximal run of samples strictly above the threshold that lasts
//! at least `min_duration` samples. Each qualifying run is reported once, at
//! the integer midpoint of the run.

/// Default detection threshold in raw ADC counts.
pub const DEFAULT_THRESHOLD: f64 = 850.0;
/// Default minimum run length in samples.
pub const DEFAULT_MIN_DURATION: usize = 50;

/// Scan `samples` and return the midpoint index of every qualifying run.
///
/// The returned indices are strictly increasing and always valid indices into
/// `samples`. A value equal to the threshold is not "above" it.
pub fn detect_peaks(samples: &[f64], threshold: f64, min_duration: usize) -> Vec<usize> {
    let mut peaks = Vec::new();
    let mut run_start: Option<usize> = None;
    for (i, &value) in samples.iter().enumerate() {
        if value > threshold {
            if run_start.is_none() {
                run_start = Some(i);
            }
        } else if let Some(start) = run_start.take() {
            close_run(&mut peaks, start, i, min_duration);
        }
    }
    // A run still open at the end is closed at len(samples).
    if let Some(start) = run_start {
        close_run(&mut peaks, start, samples.len(), min_duration);
    }
    peaks
}

fn close_run(peaks: &mut Vec<usize>, start: usize, end: usize, min_duration: usize) {
    if end - start >= min_duration {
        peaks.push((start + end) / 2);
    }
}

/// Human readable count and mean value of the samples at `peak_indices`.
///
/// Returns `None` when there are no peaks. Indices outside `signal` are
/// ignored when computing the mean.
pub fn summarize(signal: &[f64], peak_indices: &[usize]) -> Option<String> {
    if peak_indices.is_empty() {
        return None;
    }
    let values: Vec<f64> = peak_indices
        .iter()
        .filter_map(|&idx| signal.get(idx).copied())
        .collect();
    let mean = if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    };
    Some(format!(
        "significant peaks found: {}, mean peak value: {:.2}",
        peak_indices.len(),
        mean
    ))
}

/// Keep the samples whose global row is a multiple of `factor`.
///
/// `start_row` is the row of `samples[0]` in the whole table, so decimating
/// consecutive chunks keeps an evenly spaced series across chunk boundaries.
pub fn decimate(samples: &[f64], factor: usize, start_row: usize) -> Vec<f64> {
    if factor <= 1 {
        return samples.to_vec();
    }
    let phase = (factor - start_row % factor) % factor;
    samples.iter().skip(phase).step_by(factor).copied().collect()
}

/// Minimum run length to use on data decimated by `factor`.
pub fn scaled_min_duration(min_duration: usize, factor: usize) -> usize {
    if factor <= 1 || min_duration == 0 {
        return min_duration;
    }
    ((min_duration + factor - 1) / factor).max(1)
}
