// src/engine.rs
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::SyncSender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::drivers::pipeline::{process_chunk, ChunkResult, DetectionParams};
use crate::drivers::source::ChunkSource;
use crate::drivers::AnalyzerError;

/// State the producer publishes to the consumer. Only the producer writes
/// `rows_processed`; only the consumer writes `stop_requested`.
#[derive(Debug)]
pub struct IngestShared {
    stop_requested: AtomicBool,
    rows_processed: AtomicUsize,
    total_rows: usize,
}

impl IngestShared {
    pub fn new(total_rows: usize) -> Self {
        Self {
            stop_requested: AtomicBool::new(false),
            rows_processed: AtomicUsize::new(0),
            total_rows,
        }
    }

    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    pub fn rows_processed(&self) -> usize {
        self.rows_processed.load(Ordering::Acquire)
    }

    /// Fraction of rows handed to the queue so far, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        if self.total_rows == 0 {
            return 1.0;
        }
        (self.rows_processed() as f64 / self.total_rows as f64).min(1.0)
    }
}

/// What one ingestion run did before it returned.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub chunks_produced: usize,
    pub chunks_failed: usize,
    pub rows_processed: usize,
    pub cancelled: bool,
}

/// Producer loop: process every chunk of `source` and queue the results in order.
///
/// The stop flag is checked once per chunk boundary, so a chunk that has
/// started is always finished and queued. A closed queue ends the run.
pub fn ingest<S: ChunkSource>(
    mut source: S,
    params: DetectionParams,
    shared: &IngestShared,
    tx: &SyncSender<ChunkResult>,
) -> IngestReport {
    let mut report = IngestReport::default();
    loop {
        if shared.stop_requested() {
            log::info!(
                "ingestion stopped after {} chunks ({} rows)",
                report.chunks_produced,
                report.rows_processed
            );
            report.cancelled = true;
            break;
        }
        let chunk = match source.next_chunk() {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(e) => {
                log::error!("chunk source failed: {e}");
                break;
            }
        };
        match process_chunk(&chunk, &params) {
            Ok(result) => {
                if tx.send(result).is_err() {
                    log::debug!("result queue closed; ending ingestion");
                    report.cancelled = true;
                    break;
                }
                report.chunks_produced += 1;
            }
            Err(e) => {
                log::warn!("skipping chunk {} (row {}): {e}", chunk.index, chunk.start_row);
                report.chunks_failed += 1;
            }
        }
        report.rows_processed += chunk.num_rows();
        shared
            .rows_processed
            .store(report.rows_processed, Ordering::Release);
        log::debug!("ingestion progress: {:.1}%", shared.progress() * 100.0);
    }
    report
}

/// Run [`ingest`] on a dedicated worker thread. The sender is dropped when the
/// worker returns, which is how the consumer learns the run is over.
pub fn spawn_ingest<S: ChunkSource + Send + 'static>(
    source: S,
    params: DetectionParams,
    shared: Arc<IngestShared>,
    tx: SyncSender<ChunkResult>,
) -> Result<JoinHandle<IngestReport>, AnalyzerError> {
    thread::Builder::new()
        .name("adc-ingest".to_owned())
        .spawn(move || {
            let report = ingest(source, params, &shared, &tx);
            log::info!(
                "ingestion finished: {} chunks queued, {} skipped",
                report.chunks_produced,
                report.chunks_failed
            );
            report
        })
        .map_err(|e| AnalyzerError::WorkerSpawn(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::source::{ManualSource, SampleChunk};
    use crate::drivers::SampleTable;
    use std::sync::mpsc::sync_channel;

    fn params() -> DetectionParams {
        DetectionParams {
            threshold: 850.0,
            min_duration: 5,
            downsample_factor: 1,
        }
    }

    fn table_chunks(count: usize, rows: usize) -> Vec<SampleChunk> {
        let table = SampleTable::dual(vec![900.0; count * rows], vec![0.0; count * rows]).unwrap();
        table.chunks(rows).collect()
    }

    #[test]
    fn bad_chunk_is_skipped_and_ingestion_continues() {
        let mut chunks = table_chunks(3, 10);
        chunks[1].channel_labels = vec!["adc1".into(), "other".into()];
        let shared = IngestShared::new(30);
        let (tx, rx) = sync_channel(8);
        let report = ingest(ManualSource::new(chunks), params(), &shared, &tx);
        drop(tx);
        assert_eq!(report.chunks_produced, 2);
        assert_eq!(report.chunks_failed, 1);
        assert_eq!(report.rows_processed, 30);
        assert!(!report.cancelled);
        assert_eq!(shared.progress(), 1.0);
        let indices: Vec<usize> = rx.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 2]);
    }

    #[test]
    fn stop_flag_prevents_new_chunks() {
        let shared = IngestShared::new(50);
        shared.request_stop();
        let (tx, rx) = sync_channel(8);
        let report = ingest(ManualSource::new(table_chunks(5, 10)), params(), &shared, &tx);
        drop(tx);
        assert!(report.cancelled);
        assert_eq!(report.chunks_produced, 0);
        assert_eq!(rx.iter().count(), 0);
        assert_eq!(shared.progress(), 0.0);
    }

    #[test]
    fn closed_queue_ends_the_run() {
        let shared = IngestShared::new(50);
        let (tx, rx) = sync_channel(8);
        drop(rx);
        let report = ingest(ManualSource::new(table_chunks(5, 10)), params(), &shared, &tx);
        assert!(report.cancelled);
        assert_eq!(report.chunks_produced, 0);
    }

    #[test]
    fn worker_thread_delivers_results_in_order() {
        let shared = Arc::new(IngestShared::new(100));
        let (tx, rx) = sync_channel(2);
        let handle = spawn_ingest(
            ManualSource::new(table_chunks(10, 10)),
            params(),
            shared.clone(),
            tx,
        )
        .unwrap();
        let indices: Vec<usize> = rx.iter().map(|r| r.index).collect();
        assert_eq!(indices, (0..10).collect::<Vec<_>>());
        let report = handle.join().unwrap();
        assert_eq!(report.chunks_produced, 10);
        assert_eq!(shared.rows_processed(), 100);
    }
}
