use std::collections::VecDeque;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use crate::drivers::AnalyzerError;
pub const ADC1: &str = "adc1";
pub const ADC2: &str = "adc2";
/// Full decoded input: named numeric columns of equal length.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleTable {
    pub channel_labels: Vec<String>,
    pub samples: Vec<Vec<f64>>, // channels x rows
}
impl SampleTable {
    /// Build the standard two-channel table.
    pub fn dual(adc1: Vec<f64>, adc2: Vec<f64>) -> Result<Self, AnalyzerError> {
        let table = Self {
            channel_labels: vec![ADC1.to_owned(), ADC2.to_owned()],
            samples: vec![adc1, adc2],
        };
        table.validate()?;
        Ok(table)
    }
    /// Checks that `adc1` and `adc2` exist and every column has the same length.
    pub fn validate(&self) -> Result<(), AnalyzerError> {
        if self.channel_labels.len() != self.samples.len() {
            return Err(AnalyzerError::InvalidConfig(format!(
                "table has {} labels but {} columns",
                self.channel_labels.len(),
                self.samples.len()
            )));
        }
        let adc1 = self
            .column(ADC1)
            .ok_or_else(|| AnalyzerError::MissingColumn(ADC1.to_owned()))?;
        for (label, column) in self.channel_labels.iter().zip(&self.samples) {
            if column.len() != adc1.len() {
                return Err(AnalyzerError::ColumnLengthMismatch {
                    left: ADC1.to_owned(),
                    left_len: adc1.len(),
                    right: label.clone(),
                    right_len: column.len(),
                });
            }
        }
        if self.column(ADC2).is_none() {
            return Err(AnalyzerError::MissingColumn(ADC2.to_owned()));
        }
        Ok(())
    }
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.channel_labels
            .iter()
            .position(|label| label == name)
            .map(|idx| self.samples[idx].as_slice())
    }
    pub fn num_rows(&self) -> usize {
        self.samples.first().map(|c| c.len()).unwrap_or(0)
    }
    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }
    /// Rows `[start, start + len)` clamped to the table, as an owned chunk.
    pub fn slice(&self, index: usize, start: usize, len: usize) -> SampleChunk {
        let rows = self.num_rows();
        let start = start.min(rows);
        let end = start.saturating_add(len).min(rows);
        SampleChunk {
            index,
            start_row: start,
            channel_labels: self.channel_labels.clone(),
            samples: self
                .samples
                .iter()
                .map(|column| column[start.min(column.len())..end.min(column.len())].to_vec())
                .collect(),
        }
    }
    /// Consecutive, non-overlapping chunks of `chunk_size` rows; the last one may be shorter.
    pub fn chunks(&self, chunk_size: usize) -> impl Iterator<Item = SampleChunk> + '_ {
        let chunk_size = chunk_size.max(1);
        let rows = self.num_rows();
        (0..rows)
            .step_by(chunk_size)
            .enumerate()
            .map(move |(index, start)| self.slice(index, start, chunk_size))
    }
    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self, AnalyzerError> {
        let file = std::fs::File::open(path)?;
        Self::from_csv_reader(file)
    }
    /// Decode CSV text with a header row. Only `adc1` and `adc2` are kept.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, AnalyzerError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = csv_reader.headers()?.clone();
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| AnalyzerError::MissingColumn(name.to_owned()))
        };
        let adc1_idx = find(ADC1)?;
        let adc2_idx = find(ADC2)?;
        let mut adc1 = Vec::new();
        let mut adc2 = Vec::new();
        for (row, record) in csv_reader.records().enumerate() {
            let record = record?;
            adc1.push(parse_field(&record, adc1_idx, row, ADC1)?);
            adc2.push(parse_field(&record, adc2_idx, row, ADC2)?);
        }
        Self::dual(adc1, adc2)
    }
    /// Simulated capture: noise around a baseline with occasional long excursions.
    pub fn synthetic(rows: usize, rng: &mut impl Rng) -> Self {
        let mut channel = |burst_chance: f64| {
            let mut out = Vec::with_capacity(rows);
            let mut burst_left = 0usize;
            while out.len() < rows {
                if burst_left == 0 && rng.gen_bool(burst_chance) {
                    burst_left = rng.gen_range(30..150);
                }
                let base = if burst_left > 0 {
                    burst_left -= 1;
                    1100.0
                } else {
                    600.0
                };
                out.push(base + rng.gen_range(-80.0..80.0));
            }
            out
        };
        let adc1 = channel(0.004);
        let adc2 = channel(0.002);
        Self {
            channel_labels: vec![ADC1.to_owned(), ADC2.to_owned()],
            samples: vec![adc1, adc2],
        }
    }
}
fn parse_field(
    record: &csv::StringRecord,
    idx: usize,
    row: usize,
    column: &str,
) -> Result<f64, AnalyzerError> {
    let raw = record.get(idx).unwrap_or("");
    // `f64::from_str` also accepts "NaN" and "inf", which are not ADC readings
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(AnalyzerError::InvalidValue {
            row,
            column: column.to_owned(),
            value: raw.to_owned(),
        }),
    }
}
/// Contiguous slice of the input table, processed as one unit.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleChunk {
    pub index: usize,
    pub start_row: usize,
    pub channel_labels: Vec<String>,
    pub samples: Vec<Vec<f64>>, // channels x rows
}
impl SampleChunk {
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.channel_labels
            .iter()
            .position(|label| label == name)
            .and_then(|idx| self.samples.get(idx))
            .map(|c| c.as_slice())
    }
    pub fn num_rows(&self) -> usize {
        self.samples.first().map(|c| c.len()).unwrap_or(0)
    }
}
/// Something that hands out chunks in row order until exhausted.
pub trait ChunkSource {
    fn next_chunk(&mut self) -> Result<Option<SampleChunk>, AnalyzerError>;
    fn total_rows(&self) -> usize;
}
/// Slices a shared table into consecutive chunks of `chunk_size` rows.
pub struct TableSource {
    table: Arc<SampleTable>,
    chunk_size: usize,
    next_row: usize,
    next_index: usize,
}
impl TableSource {
    pub fn new(table: Arc<SampleTable>, chunk_size: usize) -> Self {
        Self {
            table,
            chunk_size: chunk_size.max(1),
            next_row: 0,
            next_index: 0,
        }
    }
}
impl ChunkSource for TableSource {
    fn next_chunk(&mut self) -> Result<Option<SampleChunk>, AnalyzerError> {
        if self.next_row >= self.table.num_rows() {
            return Ok(None);
        }
        let chunk = self
            .table
            .slice(self.next_index, self.next_row, self.chunk_size);
        self.next_row += chunk.num_rows();
        self.next_index += 1;
        Ok(Some(chunk))
    }
    fn total_rows(&self) -> usize {
        self.table.num_rows()
    }
}
/// In-memory source useful for tests and deterministic playback.
pub struct ManualSource {
    queue: VecDeque<SampleChunk>,
    total_rows: usize,
}
impl ManualSource {
    pub fn new(chunks: impl IntoIterator<Item = SampleChunk>) -> Self {
        let queue: VecDeque<SampleChunk> = chunks.into_iter().collect();
        let total_rows = queue.iter().map(|c| c.num_rows()).sum();
        Self { queue, total_rows }
    }
}
impl ChunkSource for ManualSource {
    fn next_chunk(&mut self) -> Result<Option<SampleChunk>, AnalyzerError> {
        Ok(self.queue.pop_front())
    }
    fn total_rows(&self) -> usize {
        self.total_rows
    }
}
