// src/session.rs
//! One analysis session: owns the loaded table, the producer worker and the
//! consumer-side display state.
//!
//! Ownership is split between the two sides. The producer thread only writes
//! its progress counter (see [`IngestShared`]); everything in
//! [`AnalyzerSession`] itself belongs to the consumer, which mutates it from
//! `drain_and_render`. The result queue is the only other point of contact.

use std::io::Read;
use std::path::Path;
use std::sync::mpsc::{sync_channel, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::config::AnalyzerConfig;
use crate::drivers::buffer::linspace;
use crate::drivers::pipeline::ChunkResult;
use crate::drivers::source::{ChunkSource, TableSource};
use crate::drivers::{cache, AnalyzerError, RenderSnapshot, SampleTable, ScrollBuffer};
use crate::engine::{self, IngestReport, IngestShared};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Stopped,
    Completed,
}

/// Outcome of one consumer tick.
#[derive(Clone, Debug, PartialEq)]
pub enum Tick {
    /// Nothing new was queued; the previous snapshot is still valid.
    NoUpdate,
    Snapshot(RenderSnapshot),
}

pub struct AnalyzerSession {
    config: AnalyzerConfig,
    table: Option<Arc<SampleTable>>,
    state: SessionState,
    // producer handles for the current run
    shared: Option<Arc<IngestShared>>,
    rx: Option<Receiver<ChunkResult>>,
    worker: Option<JoinHandle<IngestReport>>,
    last_report: Option<IngestReport>,
    // consumer-owned display state
    adc1: ScrollBuffer,
    adc2: ScrollBuffer,
    rendered_rows: u64,
    adc1_peak_count: usize,
    adc2_peak_count: usize,
    last_snapshot: Option<RenderSnapshot>,
}

impl AnalyzerSession {
    pub fn new(config: AnalyzerConfig) -> Result<Self, AnalyzerError> {
        config.validate()?;
        let points = config.display_points();
        Ok(Self {
            config,
            table: None,
            state: SessionState::Idle,
            shared: None,
            rx: None,
            worker: None,
            last_report: None,
            adc1: ScrollBuffer::with_capacity(points),
            adc2: ScrollBuffer::with_capacity(points),
            rendered_rows: 0,
            adc1_peak_count: 0,
            adc2_peak_count: 0,
            last_snapshot: None,
        })
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Threshold used by the next `start()`.
    pub fn set_threshold(&mut self, threshold: f64) {
        self.config.threshold = threshold;
    }

    pub fn table(&self) -> Option<&SampleTable> {
        self.table.as_deref()
    }

    pub fn load_table(&mut self, table: SampleTable) -> Result<(), AnalyzerError> {
        if self.state == SessionState::Running {
            return Err(AnalyzerError::AlreadyRunning);
        }
        table.validate()?;
        log::info!("loaded table with {} rows", table.num_rows());
        self.table = Some(Arc::new(table));
        self.state = SessionState::Idle;
        Ok(())
    }

    pub fn load_csv_reader<R: Read>(&mut self, reader: R) -> Result<(), AnalyzerError> {
        let table = SampleTable::from_csv_reader(reader).map_err(|e| {
            log::error!("error loading csv: {e}");
            e
        })?;
        self.load_table(table)
    }

    pub fn load_csv_path(&mut self, path: impl AsRef<Path>) -> Result<(), AnalyzerError> {
        let path = path.as_ref();
        let table = SampleTable::from_csv_path(path).map_err(|e| {
            log::error!("error loading {}: {e}", path.display());
            e
        })?;
        self.load_table(table)
    }

    pub fn load_cached(&mut self, path: impl AsRef<Path>) -> Result<(), AnalyzerError> {
        let table = cache::read_cache(path)?;
        self.load_table(table)
    }

    /// Write the loaded table to the columnar cache.
    pub fn save_cache(&self, path: impl AsRef<Path>) -> Result<(), AnalyzerError> {
        let table = self.table.as_ref().ok_or(AnalyzerError::NoTableLoaded)?;
        cache::write_cache(table, path)
    }

    /// Reset all run state and spawn the producer for the loaded table.
    pub fn start(&mut self) -> Result<(), AnalyzerError> {
        if self.state == SessionState::Running {
            return Err(AnalyzerError::AlreadyRunning);
        }
        let table = self.table.clone().ok_or(AnalyzerError::NoTableLoaded)?;
        self.reset_run();
        let source = TableSource::new(table, self.config.chunk_size);
        let shared = Arc::new(IngestShared::new(source.total_rows()));
        let (tx, rx) = sync_channel(self.config.queue_capacity);
        let worker = engine::spawn_ingest(
            source,
            self.config.detection_params(),
            shared.clone(),
            tx,
        )?;
        log::info!(
            "analysis started: threshold {}, min duration {}, chunk size {}",
            self.config.threshold,
            self.config.min_duration,
            self.config.chunk_size
        );
        self.shared = Some(shared);
        self.rx = Some(rx);
        self.worker = Some(worker);
        self.state = SessionState::Running;
        Ok(())
    }

    /// Ask the producer to stop at the next chunk boundary. Results already
    /// queued can still be drained.
    pub fn stop(&mut self) {
        if self.state != SessionState::Running {
            return;
        }
        if let Some(shared) = &self.shared {
            shared.request_stop();
        }
        self.state = SessionState::Stopped;
        log::info!("analysis stop requested");
    }

    /// Consumer tick: never blocks. Pops at most one queued result.
    pub fn drain_and_render(&mut self) -> Tick {
        let received = match &self.rx {
            Some(rx) => rx.try_recv(),
            None => return Tick::NoUpdate,
        };
        match received {
            Ok(result) => {
                let snapshot = self.apply(result);
                self.last_snapshot = Some(snapshot.clone());
                Tick::Snapshot(snapshot)
            }
            Err(TryRecvError::Empty) => Tick::NoUpdate,
            Err(TryRecvError::Disconnected) => {
                self.finish_run();
                Tick::NoUpdate
            }
        }
    }

    fn apply(&mut self, result: ChunkResult) -> RenderSnapshot {
        let adc1_append = self.adc1.extend_tail(&result.adc1.samples);
        let adc2_append = self.adc2.extend_tail(&result.adc2.samples);
        self.adc1_peak_count += result.adc1.peaks.len();
        self.adc2_peak_count += result.adc2.peaks.len();
        self.rendered_rows += result.rows as u64;

        let end = self.processed_duration();
        let start = (end - self.config.display_time).max(0.0);
        let time_axis = linspace(start, end, self.adc1.len());
        RenderSnapshot {
            adc1_samples: self.adc1.to_vec(),
            adc2_samples: self.adc2.to_vec(),
            time_axis,
            adc1_peak_positions: result
                .adc1
                .peaks
                .iter()
                .filter_map(|&p| adc1_append.translate(p))
                .collect(),
            adc2_peak_positions: result
                .adc2
                .peaks
                .iter()
                .filter_map(|&p| adc2_append.translate(p))
                .collect(),
            window: (start, end),
            adc1_summary: result.adc1.summary,
            adc2_summary: result.adc2.summary,
        }
    }

    fn finish_run(&mut self) {
        self.rx = None;
        if let Some(worker) = self.worker.take() {
            match worker.join() {
                Ok(report) => self.last_report = Some(report),
                Err(_) => log::error!("ingestion worker panicked"),
            }
        }
        if self.state == SessionState::Running {
            self.state = SessionState::Completed;
            log::info!("analysis completed: {}", self.stats_line());
        }
    }

    fn reset_run(&mut self) {
        if let Some(shared) = self.shared.take() {
            shared.request_stop();
        }
        // Dropping the old receiver unblocks a stale producer; it exits on its next send.
        self.rx = None;
        if let Some(worker) = self.worker.take() {
            match worker.join() {
                Ok(report) => log::info!(
                    "previous run ended: {} chunks queued, {} skipped, {} rows",
                    report.chunks_produced,
                    report.chunks_failed,
                    report.rows_processed
                ),
                Err(_) => log::error!("previous ingestion worker panicked"),
            }
        }
        self.last_report = None;
        self.adc1.clear();
        self.adc2.clear();
        self.rendered_rows = 0;
        self.adc1_peak_count = 0;
        self.adc2_peak_count = 0;
        self.last_snapshot = None;
    }

    /// True while the producer may still queue results that have not been drained.
    pub fn is_ingesting(&self) -> bool {
        self.rx.is_some()
    }

    /// Seconds of input covered by the results drained so far. Counted in
    /// input rows, so decimation does not change it.
    pub fn processed_duration(&self) -> f64 {
        self.rendered_rows as f64 / self.config.sample_rate
    }

    /// Seconds of input the producer has consumed so far.
    pub fn ingested_duration(&self) -> f64 {
        self.shared
            .as_ref()
            .map(|s| s.rows_processed() as f64 / self.config.sample_rate)
            .unwrap_or(0.0)
    }

    pub fn progress(&self) -> f64 {
        self.shared.as_ref().map(|s| s.progress()).unwrap_or(0.0)
    }

    pub fn peak_counts(&self) -> (usize, usize) {
        (self.adc1_peak_count, self.adc2_peak_count)
    }

    pub fn last_snapshot(&self) -> Option<&RenderSnapshot> {
        self.last_snapshot.as_ref()
    }

    /// Report of the last run whose producer has been joined.
    pub fn last_report(&self) -> Option<&IngestReport> {
        self.last_report.as_ref()
    }

    pub fn stats_line(&self) -> String {
        format!(
            "Processed: {:.1}s | ADC1 Peaks: {} | ADC2 Peaks: {}",
            self.processed_duration(),
            self.adc1_peak_count,
            self.adc2_peak_count
        )
    }
}

impl Drop for AnalyzerSession {
    fn drop(&mut self) {
        if let Some(shared) = &self.shared {
            shared.request_stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::pipeline::process_chunk;
    use std::time::{Duration, Instant};

    fn config(chunk_size: usize, queue_capacity: usize) -> AnalyzerConfig {
        AnalyzerConfig {
            threshold: 850.0,
            min_duration: 5,
            chunk_size,
            sample_rate: 100.0,
            display_time: 1.0,
            queue_capacity,
            ..Default::default()
        }
    }

    /// `count` chunks of `rows` samples, each with one qualifying pulse in the middle.
    fn pulsed_table(count: usize, rows: usize) -> SampleTable {
        let mut adc1 = Vec::with_capacity(count * rows);
        for _ in 0..count {
            for i in 0..rows {
                let centre = rows / 2;
                adc1.push(if i.abs_diff(centre) < 5 { 900.0 } else { 500.0 });
            }
        }
        let adc2 = vec![500.0; adc1.len()];
        SampleTable::dual(adc1, adc2).unwrap()
    }

    fn wait_for_snapshot(session: &mut AnalyzerSession) -> Option<RenderSnapshot> {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if let Tick::Snapshot(s) = session.drain_and_render() {
                return Some(s);
            }
            if !session.is_ingesting() {
                return None;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        None
    }

    fn drain_all(session: &mut AnalyzerSession) -> Vec<RenderSnapshot> {
        let mut out = Vec::new();
        while let Some(s) = wait_for_snapshot(session) {
            out.push(s);
        }
        out
    }

    #[test]
    fn start_requires_a_table() {
        let mut session = AnalyzerSession::new(config(10, 4)).unwrap();
        assert!(matches!(session.start(), Err(AnalyzerError::NoTableLoaded)));
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn empty_queue_is_no_update_without_mutation() {
        let mut session = AnalyzerSession::new(config(10, 4)).unwrap();
        assert_eq!(session.drain_and_render(), Tick::NoUpdate);
        assert_eq!(session.processed_duration(), 0.0);
        assert!(session.last_snapshot().is_none());
    }

    #[test]
    fn full_run_completes_and_keeps_buffers_bounded() {
        let mut session = AnalyzerSession::new(config(40, 4)).unwrap();
        session.load_table(pulsed_table(10, 40)).unwrap();
        session.start().unwrap();
        assert_eq!(session.state(), SessionState::Running);
        let snapshots = drain_all(&mut session);
        assert_eq!(snapshots.len(), 10);
        assert_eq!(session.state(), SessionState::Completed);
        assert_eq!(session.peak_counts(), (10, 0));
        assert!((session.processed_duration() - 4.0).abs() < 1e-9);
        assert_eq!(session.progress(), 1.0);
        assert_eq!(session.last_report().map(|r| r.chunks_produced), Some(10));
        for s in &snapshots {
            assert!(s.adc1_samples.len() <= 100);
            assert_eq!(s.adc1_samples.len(), s.time_axis.len());
            assert_eq!(s.adc2_samples.len(), s.time_axis.len());
            for &p in &s.adc1_peak_positions {
                assert!(p < s.adc1_samples.len());
                assert!(s.adc1_samples[p] > 850.0);
            }
            assert!(s.window.0 >= 0.0);
            assert!(s.window.1 - s.window.0 <= 1.0 + 1e-9);
        }
        let last = snapshots.last().unwrap();
        assert_eq!(last.adc1_samples.len(), 100);
        assert!((last.window.0 - 3.0).abs() < 1e-9);
        assert!((last.window.1 - 4.0).abs() < 1e-9);
        // the newest chunk occupies the last 40 buffer slots
        assert_eq!(last.adc1_peak_positions, vec![60 + 20]);
        assert_eq!(
            session.stats_line(),
            "Processed: 4.0s | ADC1 Peaks: 10 | ADC2 Peaks: 0"
        );
    }

    #[test]
    fn oversized_chunk_keeps_tail_and_drops_early_peaks() {
        let mut session = AnalyzerSession::new(config(300, 4)).unwrap();
        // pulses centred at 150 (dropped) and at 270 (kept)
        let mut adc1 = vec![500.0; 300];
        for v in &mut adc1[145..155] {
            *v = 900.0;
        }
        for v in &mut adc1[265..275] {
            *v = 900.0;
        }
        session
            .load_table(SampleTable::dual(adc1, vec![500.0; 300]).unwrap())
            .unwrap();
        session.start().unwrap();
        let snapshot = wait_for_snapshot(&mut session).unwrap();
        assert_eq!(snapshot.adc1_samples.len(), 100);
        assert_eq!(snapshot.adc1_peak_positions, vec![270 - 200]);
        assert_eq!(session.peak_counts(), (2, 0));
    }

    #[test]
    fn stop_halts_production_but_queued_results_drain() {
        let mut session = AnalyzerSession::new(config(10, 1)).unwrap();
        session.load_table(pulsed_table(200, 10)).unwrap();
        session.start().unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while session.progress() == 0.0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        session.stop();
        assert_eq!(session.state(), SessionState::Stopped);
        let drained = drain_all(&mut session);
        // one result in the queue plus at most one in flight
        assert!(!drained.is_empty());
        assert!(drained.len() <= 2);
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(session.last_report().unwrap().cancelled);
        assert!(session.progress() < 1.0);
    }

    #[test]
    fn restart_resets_counters() {
        let mut session = AnalyzerSession::new(config(20, 4)).unwrap();
        session.load_table(pulsed_table(3, 20)).unwrap();
        session.start().unwrap();
        assert!(matches!(session.start(), Err(AnalyzerError::AlreadyRunning)));
        drain_all(&mut session);
        assert_eq!(session.state(), SessionState::Completed);
        assert_eq!(session.peak_counts(), (3, 0));

        session.start().unwrap();
        assert_eq!(session.peak_counts(), (0, 0));
        assert_eq!(session.processed_duration(), 0.0);
        assert_eq!(drain_all(&mut session).len(), 3);
        assert_eq!(session.peak_counts(), (3, 0));
    }

    #[test]
    fn loading_is_refused_while_running() {
        let mut session = AnalyzerSession::new(config(10, 1)).unwrap();
        session.load_table(pulsed_table(50, 10)).unwrap();
        session.start().unwrap();
        let err = session.load_csv_reader("adc1,adc2\n1,2\n".as_bytes());
        assert!(matches!(err, Err(AnalyzerError::AlreadyRunning)));
        session.stop();
        drain_all(&mut session);
        session
            .load_csv_reader("adc1,adc2\n1,2\n".as_bytes())
            .unwrap();
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn downsampled_run_uses_decimated_time_base() {
        let mut cfg = config(100, 4);
        cfg.downsample_factor = 5;
        cfg.min_duration = 10;
        let mut session = AnalyzerSession::new(cfg).unwrap();
        let mut adc1 = vec![500.0; 400];
        for v in &mut adc1[320..360] {
            *v = 900.0;
        }
        session
            .load_table(SampleTable::dual(adc1, vec![500.0; 400]).unwrap())
            .unwrap();
        session.start().unwrap();
        let snapshots = drain_all(&mut session);
        assert_eq!(snapshots.len(), 4);
        let last = snapshots.last().unwrap();
        // display capacity is 1s at 20 Hz after decimation
        assert_eq!(last.adc1_samples.len(), 20);
        assert_eq!(last.adc1_peak_positions, vec![8]);
        assert!(last.adc1_samples[8] > 850.0);
        assert!((session.processed_duration() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn decimation_stays_even_when_chunks_do_not_divide_by_the_factor() {
        let mut cfg = config(10, 4);
        cfg.downsample_factor = 3;
        let mut session = AnalyzerSession::new(cfg).unwrap();
        let rows: Vec<f64> = (0..100).map(f64::from).collect();
        session
            .load_table(SampleTable::dual(rows.clone(), rows).unwrap())
            .unwrap();
        session.start().unwrap();
        let snapshots = drain_all(&mut session);
        assert_eq!(snapshots.len(), 10);
        assert_eq!(session.state(), SessionState::Completed);
        // 100 rows at 100 Hz is one second whatever the factor
        assert!((session.processed_duration() - 1.0).abs() < 1e-9);
        assert!((session.ingested_duration() - 1.0).abs() < 1e-9);
        let last = snapshots.last().unwrap();
        // 33 slots at 100/3 Hz hold rows 3, 6, ..., 99
        assert_eq!(last.adc1_samples.len(), 33);
        assert_eq!(last.adc1_samples.last(), Some(&99.0));
        for pair in last.adc1_samples.windows(2) {
            assert_eq!(pair[1] - pair[0], 3.0);
        }
        assert!((last.window.1 - 1.0).abs() < 1e-9);
    }

    #[test]
    fn empty_queue_while_running_leaves_display_untouched() {
        let mut session = AnalyzerSession::new(config(10, 4)).unwrap();
        let table = pulsed_table(1, 10);
        let result = process_chunk(&table.slice(0, 0, 10), &session.config().detection_params())
            .unwrap();
        // hold the sender so the queue reads as empty rather than closed
        let (tx, rx) = sync_channel(4);
        session.rx = Some(rx);
        session.state = SessionState::Running;
        tx.send(result).unwrap();

        let first = match session.drain_and_render() {
            Tick::Snapshot(s) => s,
            Tick::NoUpdate => panic!("queued result was not rendered"),
        };
        let duration = session.processed_duration();
        assert!((duration - 0.1).abs() < 1e-9);

        assert_eq!(session.drain_and_render(), Tick::NoUpdate);
        assert_eq!(session.state(), SessionState::Running);
        assert!(session.is_ingesting());
        assert_eq!(session.processed_duration(), duration);
        assert_eq!(session.last_snapshot(), Some(&first));
        assert_eq!(session.adc1.to_vec(), first.adc1_samples);
        assert_eq!(session.peak_counts(), (1, 0));
        drop(tx);
    }

    #[test]
    fn saved_cache_loads_back_into_a_new_session() {
        let mut session = AnalyzerSession::new(config(10, 4)).unwrap();
        assert!(matches!(
            session.save_cache("unused.cache.json"),
            Err(AnalyzerError::NoTableLoaded)
        ));
        session
            .load_csv_reader("adc1,adc2\n1,2\n900,3.5\n".as_bytes())
            .unwrap();
        let path =
            std::env::temp_dir().join(format!("adc-session-cache-{}.json", std::process::id()));
        session.save_cache(&path).unwrap();

        let mut restored = AnalyzerSession::new(config(10, 4)).unwrap();
        let loaded = restored.load_cached(&path);
        std::fs::remove_file(&path).ok();
        loaded.unwrap();
        assert_eq!(restored.table().unwrap().column("adc1"), Some(&[1.0, 900.0][..]));
        assert_eq!(restored.table().unwrap().column("adc2"), Some(&[2.0, 3.5][..]));
    }

    #[test]
    fn restart_without_draining_joins_the_previous_run() {
        let mut session = AnalyzerSession::new(config(10, 1)).unwrap();
        session.load_table(pulsed_table(50, 10)).unwrap();
        session.start().unwrap();
        session.stop();
        // the stale producer may be parked on a full queue; start must not hang
        session.start().unwrap();
        assert_eq!(session.state(), SessionState::Running);
        assert_eq!(drain_all(&mut session).len(), 50);
        assert_eq!(session.state(), SessionState::Completed);
        assert_eq!(session.peak_counts(), (50, 0));
        let report = session.last_report().unwrap();
        assert_eq!(report.chunks_produced, 50);
        assert!(!report.cancelled);
        assert!((session.ingested_duration() - 5.0).abs() < 1e-9);
    }
}
