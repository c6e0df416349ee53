//! Intermediate columnar cache for a decoded table, so repeated runs skip CSV parsing.
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use crate::drivers::{AnalyzerError, SampleTable};
/// Where the cache for a CSV file lives: next to it, `data.csv` -> `data.cache.json`.
pub fn cache_path_for(csv_path: impl AsRef<Path>) -> PathBuf {
    csv_path.as_ref().with_extension("cache.json")
}
#[derive(Serialize, Deserialize)]
struct ColumnarCache {
    columns: BTreeMap<String, Vec<f64>>,
}
pub fn write_cache(table: &SampleTable, path: impl AsRef<Path>) -> Result<(), AnalyzerError> {
    table.validate()?;
    let cache = ColumnarCache {
        columns: table
            .channel_labels
            .iter()
            .cloned()
            .zip(table.samples.iter().cloned())
            .collect(),
    };
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    serde_json::to_writer(&mut writer, &cache)?;
    writer.flush()?;
    log::debug!(
        "cached {} rows to {}",
        table.num_rows(),
        path.as_ref().display()
    );
    Ok(())
}
pub fn read_cache(path: impl AsRef<Path>) -> Result<SampleTable, AnalyzerError> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    let cache: ColumnarCache = serde_json::from_reader(reader)?;
    let (channel_labels, samples) = cache.columns.into_iter().unzip();
    let table = SampleTable {
        channel_labels,
        samples,
    };
    table.validate()?;
    Ok(table)
}
