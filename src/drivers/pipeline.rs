use crate::drivers::peaks::{decimate, detect_peaks, scaled_min_duration, summarize};
use crate::drivers::source::{SampleChunk, ADC1, ADC2};
use crate::drivers::AnalyzerError;
/// Detection parameters applied to every chunk of one run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectionParams {
    pub threshold: f64,
    pub min_duration: usize,
    pub downsample_factor: usize,
}
/// One channel of a processed chunk. `peaks` index into `samples`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChannelResult {
    pub samples: Vec<f64>,
    pub peaks: Vec<usize>,
    pub summary: Option<String>,
}
/// Result of processing one chunk; peak indices are chunk-relative.
///
/// `rows` is the number of input rows the chunk covered, which differs from
/// the kept sample count when the data is decimated.
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkResult {
    pub index: usize,
    pub start_row: usize,
    pub rows: usize,
    pub adc1: ChannelResult,
    pub adc2: ChannelResult,
}
/// Run peak detection on both channels of `chunk`.
///
/// With a downsample factor above one the samples are decimated first and
/// peaks are detected on the decimated data, so markers always sit on a
/// sample that is actually kept.
pub fn process_chunk(
    chunk: &SampleChunk,
    params: &DetectionParams,
) -> Result<ChunkResult, AnalyzerError> {
    let adc1 = chunk
        .column(ADC1)
        .ok_or_else(|| AnalyzerError::MissingColumn(ADC1.to_owned()))?;
    let adc2 = chunk
        .column(ADC2)
        .ok_or_else(|| AnalyzerError::MissingColumn(ADC2.to_owned()))?;
    if adc1.len() != adc2.len() {
        return Err(AnalyzerError::ColumnLengthMismatch {
            left: ADC1.to_owned(),
            left_len: adc1.len(),
            right: ADC2.to_owned(),
            right_len: adc2.len(),
        });
    }
    Ok(ChunkResult {
        index: chunk.index,
        start_row: chunk.start_row,
        rows: adc1.len(),
        adc1: analyze_channel("ADC1", adc1, chunk.start_row, params),
        adc2: analyze_channel("ADC2", adc2, chunk.start_row, params),
    })
}
fn analyze_channel(
    label: &str,
    raw: &[f64],
    start_row: usize,
    params: &DetectionParams,
) -> ChannelResult {
    let factor = params.downsample_factor.max(1);
    let samples = decimate(raw, factor, start_row);
    let min_duration = scaled_min_duration(params.min_duration, factor);
    let peaks = detect_peaks(&samples, params.threshold, min_duration);
    let summary = summarize(&samples, &peaks).map(|s| format!("{label} {s}"));
    if let Some(summary) = &summary {
        log::debug!("{summary}");
    }
    ChannelResult {
        samples,
        peaks,
        summary,
    }
}
