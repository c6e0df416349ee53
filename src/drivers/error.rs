use thiserror::Error;
#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("input is missing required column '{0}'")]
    MissingColumn(String),
    #[error("column length mismatch: '{left}' has {left_len} rows, '{right}' has {right_len}")]
    ColumnLengthMismatch {
        left: String,
        left_len: usize,
        right: String,
        right_len: usize,
    },
    #[error("invalid value {value:?} in column '{column}' at row {row}")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },
    #[error("failed to read csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("columnar cache error: {0}")]
    Cache(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("no sample table loaded; load a file first")]
    NoTableLoaded,
    #[error("analysis is already running")]
    AlreadyRunning,
    #[error("failed to spawn ingestion worker: {0}")]
    WorkerSpawn(String),
    #[error("failed to render plot: {0}")]
    Plot(String),
}
impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for AnalyzerError
{
    fn from(value: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        AnalyzerError::Plot(format!("{value:?}"))
    }
}
impl From<image::ImageError> for AnalyzerError {
    fn from(value: image::ImageError) -> Self {
        AnalyzerError::Plot(value.to_string())
    }
}
