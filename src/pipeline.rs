//! Streaming Ingestion Pipeline.
//!
//! Parses a CSV source record by record, keeps the rows that pass the filter set,
//! reports progress every batch and yields back to the runtime between batches so a
//! stop request is observed promptly.
//!
//! `Idle -> Parsing -> {Completed | Cancelled | Failed}`; only one parse runs at a
//! time because `parse` takes `&mut self`.

use crate::{ExplorerError, ExplorerResult, FilterSet, Header, Row, Schema, row_passes};
use std::{
    io::Read,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

/// Maximum number of rows kept by one parse.
pub const MAX_ROWS: usize = 30_000;

/// Source rows between two progress reports (and two yields).
pub const PROGRESS_BATCH: usize = 100;

/// Default CSV field delimiter.
pub const DEFAULT_DELIMITER: u8 = b',';

/// A shared stop request. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Resets the cancellation flag when dropped, whatever the exit path.
#[derive(Debug)]
pub struct LoadingGuard {
    cancel: CancelFlag,
}

impl LoadingGuard {
    pub fn new(cancel: &CancelFlag) -> Self {
        LoadingGuard {
            cancel: cancel.clone(),
        }
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.cancel.reset();
    }
}

/// Snapshot of a running parse.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Progress {
    /// Source rows read so far, rejected ones included.
    pub rows_processed: usize,
    pub rows_kept: usize,
    pub bytes_processed: u64,
    pub total_bytes: u64,
}

impl Progress {
    /// Fraction of the source size consumed, in `[0, 1]`.
    pub fn fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            return if self.bytes_processed > 0 { 1.0 } else { 0.0 };
        }
        (self.bytes_processed as f64 / self.total_bytes as f64).clamp(0.0, 1.0)
    }
}

/// A slice of the overall loading bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Phase {
    pub label: &'static str,
    pub start: f64,
    pub end: f64,
}

impl Phase {
    /// Maps a phase-local fraction to an overall percentage.
    pub fn percent(&self, fraction: f64) -> f64 {
        self.start + fraction.clamp(0.0, 1.0) * (self.end - self.start)
    }
}

pub const PARSE_PHASE: Phase = Phase {
    label: "Loading Data From File...",
    start: 0.0,
    end: 30.0,
};

pub const ROWS_PHASE: Phase = Phase {
    label: "Adding Rows To The Table...",
    start: 30.0,
    end: 70.0,
};

pub const COLUMN_FILTERS_PHASE: Phase = Phase {
    label: "Adding Column Filters...",
    start: 70.0,
    end: 100.0,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IngestState {
    #[default]
    Idle,
    Parsing,
    Completed,
    Cancelled,
    Failed,
}

/// Counters of the last parse, kept after it settles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub rows_processed: usize,
    pub rows_kept: usize,
}

/// Pipeline limits and CSV dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    pub max_rows: usize,
    pub progress_batch: usize,
    pub delimiter: u8,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            max_rows: MAX_ROWS,
            progress_batch: PROGRESS_BATCH,
            delimiter: DEFAULT_DELIMITER,
        }
    }
}

#[derive(Debug, Default)]
pub struct IngestPipeline {
    config: PipelineConfig,
    cancel: CancelFlag,
    state: IngestState,
    last_run: RunStats,
}

impl IngestPipeline {
    pub fn new(config: PipelineConfig, cancel: CancelFlag) -> Self {
        IngestPipeline {
            config,
            cancel,
            state: IngestState::Idle,
            last_run: RunStats::default(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The flag a stop control should set.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn state(&self) -> IngestState {
        self.state
    }

    pub fn last_run(&self) -> RunStats {
        self.last_run
    }

    /// Parses `source` and returns the rows passing `filter_set`, in source order.
    ///
    /// `total_bytes` is the source size used for progress. `on_progress` is called
    /// every `progress_batch` source rows and once more at 100% on completion.
    ///
    /// The cancellation flag is checked before every row and reset on every exit.
    /// A flag already set when the call starts cancels it at the first row.
    pub async fn parse<R: Read>(
        &mut self,
        source: R,
        total_bytes: u64,
        schema: &Schema,
        filter_set: &FilterSet,
        mut on_progress: impl FnMut(Progress),
    ) -> ExplorerResult<Vec<Row>> {
        let _guard = LoadingGuard::new(&self.cancel);
        self.state = IngestState::Parsing;

        let mut stats = RunStats::default();
        let result = self
            .run(source, total_bytes, schema, filter_set, &mut stats, &mut on_progress)
            .await;

        self.last_run = stats;
        self.state = match &result {
            Ok(_) => IngestState::Completed,
            Err(ExplorerError::Cancelled) => IngestState::Cancelled,
            Err(_) => IngestState::Failed,
        };

        match &result {
            Ok(rows) => tracing::info!(
                "Parse completed: {} of {} rows kept",
                rows.len(),
                stats.rows_processed
            ),
            Err(ExplorerError::Cancelled) => tracing::info!(
                "Parse cancelled after {} rows ({} kept)",
                stats.rows_processed,
                stats.rows_kept
            ),
            Err(error) => tracing::warn!("Parse failed: {error}"),
        }

        result
    }

    async fn run<R: Read>(
        &self,
        source: R,
        total_bytes: u64,
        schema: &Schema,
        filter_set: &FilterSet,
        stats: &mut RunStats,
        on_progress: &mut impl FnMut(Progress),
    ) -> ExplorerResult<Vec<Row>> {
        let PipelineConfig {
            max_rows,
            progress_batch,
            delimiter,
        } = self.config;
        let progress_batch = progress_batch.max(1);

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            // Short or long records are accepted; missing values read as empty.
            .flexible(true)
            .from_reader(source);

        let header = Arc::new(Header::new(
            reader.headers().map_err(parse_failure)?.iter(),
        ));
        tracing::debug!("CSV header: {:?}", header.names());

        let snapshot = |stats: &RunStats, bytes: u64| Progress {
            rows_processed: stats.rows_processed,
            rows_kept: stats.rows_kept,
            bytes_processed: bytes.min(total_bytes),
            total_bytes,
        };

        let mut kept: Vec<Row> = Vec::new();
        let mut record = csv::StringRecord::new();

        loop {
            if self.cancel.is_cancelled() {
                return Err(ExplorerError::Cancelled);
            }

            if !reader.read_record(&mut record).map_err(parse_failure)? {
                break;
            }
            stats.rows_processed += 1;

            let row = Row::new(Arc::clone(&header), record.iter().map(str::to_string).collect());
            if row_passes(&row, schema, filter_set) {
                kept.push(row);
                stats.rows_kept = kept.len();
                // Reaching the ceiling aborts the search.
                if kept.len() >= max_rows {
                    tracing::warn!(
                        "Row ceiling of {max_rows} reached at source row {}",
                        stats.rows_processed
                    );
                    return Err(ExplorerError::RowCeilingExceeded { ceiling: max_rows });
                }
            }

            if stats.rows_processed % progress_batch == 0 {
                on_progress(snapshot(stats, reader.position().byte()));
                tokio::task::yield_now().await;
            }
        }

        let end = total_bytes.max(reader.position().byte());
        on_progress(Progress {
            bytes_processed: end,
            total_bytes: end,
            ..snapshot(stats, end)
        });

        if kept.is_empty() {
            return Err(ExplorerError::EmptyResult);
        }
        Ok(kept)
    }
}

fn parse_failure(error: csv::Error) -> ExplorerError {
    ExplorerError::ParseFailure(error.to_string())
}

//----------------------------------------------------------------------------//
//                                   Tests                                    //
//----------------------------------------------------------------------------//

/// Run tests with:
/// `cargo test -- --show-output tests_pipeline`
#[cfg(test)]
mod tests_pipeline {
    use super::*;
    use crate::{ColumnKind, ColumnSchema, Criterion};
    use std::io::Cursor;

    fn rating_schema() -> Schema {
        Schema::new(vec![
            ColumnSchema::new("rating", ColumnKind::Float).with_bounds(Some(0.0), Some(5.0)),
            ColumnSchema::binary_tag("tag_x"),
        ])
    }

    fn numbered_csv(rows: usize) -> String {
        let mut csv = String::from("id,rating\n");
        for i in 0..rows {
            csv.push_str(&format!("{i},4.0\n"));
        }
        csv
    }

    #[tokio::test]
    async fn test_keeps_only_passing_rows() -> ExplorerResult<()> {
        let csv = "rating,tag_x\n4.5,1\n\n2.0,0\n";
        let filters = FilterSet::new().with("rating", Criterion::range(Some(3.0), None));
        let mut pipeline = IngestPipeline::default();

        let rows = pipeline
            .parse(Cursor::new(csv), csv.len() as u64, &rating_schema(), &filters, |_| {})
            .await?;

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("rating"), Some("4.5"));
        assert_eq!(rows[0].get("tag_x"), Some("1"));
        assert_eq!(pipeline.state(), IngestState::Completed);
        assert_eq!(pipeline.last_run(), RunStats { rows_processed: 2, rows_kept: 1 });
        Ok(())
    }

    #[tokio::test]
    async fn test_progress_is_batched_monotone_and_finishes() -> ExplorerResult<()> {
        let csv = numbered_csv(250);
        let mut reports = Vec::new();
        let mut pipeline = IngestPipeline::default();

        pipeline
            .parse(Cursor::new(&csv), csv.len() as u64, &Schema::default(), &FilterSet::new(), |p| {
                reports.push(p)
            })
            .await?;

        let rows: Vec<usize> = reports.iter().map(|p| p.rows_processed).collect();
        assert_eq!(rows, vec![100, 200, 250]);
        assert!(reports.windows(2).all(|w| w[0].fraction() <= w[1].fraction()));
        assert_eq!(reports.last().map(Progress::fraction), Some(1.0));
        Ok(())
    }

    #[tokio::test]
    async fn test_row_ceiling() {
        let csv = numbered_csv(MAX_ROWS + 1);
        let mut pipeline = IngestPipeline::default();

        let result = pipeline
            .parse(Cursor::new(&csv), csv.len() as u64, &Schema::default(), &FilterSet::new(), |_| {})
            .await;

        assert!(matches!(
            result,
            Err(ExplorerError::RowCeilingExceeded { ceiling: MAX_ROWS })
        ));
        assert_eq!(pipeline.last_run().rows_kept, MAX_ROWS);
        assert_eq!(pipeline.state(), IngestState::Failed);
    }

    #[tokio::test]
    async fn test_reaching_the_ceiling_fails() -> ExplorerResult<()> {
        let config = PipelineConfig {
            max_rows: 10,
            ..PipelineConfig::default()
        };
        let mut pipeline = IngestPipeline::new(config, CancelFlag::new());

        let csv = numbered_csv(10);
        let result = pipeline
            .parse(Cursor::new(&csv), csv.len() as u64, &Schema::default(), &FilterSet::new(), |_| {})
            .await;
        assert!(matches!(
            result,
            Err(ExplorerError::RowCeilingExceeded { ceiling: 10 })
        ));
        assert_eq!(pipeline.last_run(), RunStats { rows_processed: 10, rows_kept: 10 });

        let csv = numbered_csv(9);
        let rows = pipeline
            .parse(Cursor::new(&csv), csv.len() as u64, &Schema::default(), &FilterSet::new(), |_| {})
            .await?;
        assert_eq!(rows.len(), 9);
        Ok(())
    }

    #[tokio::test]
    async fn test_cancellation_mid_parse_then_fresh_run() -> ExplorerResult<()> {
        let csv = numbered_csv(1000);
        let mut pipeline = IngestPipeline::default();
        let cancel = pipeline.cancel_flag();

        let result = pipeline
            .parse(Cursor::new(&csv), csv.len() as u64, &Schema::default(), &FilterSet::new(), |p| {
                if p.rows_processed == 200 {
                    cancel.cancel();
                }
            })
            .await;

        assert!(matches!(result, Err(ExplorerError::Cancelled)));
        assert_eq!(pipeline.state(), IngestState::Cancelled);
        assert_eq!(
            pipeline.last_run(),
            RunStats { rows_processed: 200, rows_kept: 200 }
        );
        assert!(!cancel.is_cancelled(), "flag must be reset on exit");

        let rows = pipeline
            .parse(Cursor::new(&csv), csv.len() as u64, &Schema::default(), &FilterSet::new(), |_| {})
            .await?;
        assert_eq!(rows.len(), 1000);
        assert_eq!(pipeline.state(), IngestState::Completed);
        Ok(())
    }

    #[tokio::test]
    async fn test_stale_flag_cancels_once_then_clears() -> ExplorerResult<()> {
        let csv = numbered_csv(5);
        let mut pipeline = IngestPipeline::default();
        pipeline.cancel_flag().cancel();

        let first = pipeline
            .parse(Cursor::new(&csv), 0, &Schema::default(), &FilterSet::new(), |_| {})
            .await;
        assert!(matches!(first, Err(ExplorerError::Cancelled)));
        assert_eq!(pipeline.last_run().rows_processed, 0);

        let rows = pipeline
            .parse(Cursor::new(&csv), 0, &Schema::default(), &FilterSet::new(), |_| {})
            .await?;
        assert_eq!(rows.len(), 5);
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_result_is_distinct() {
        let csv = "rating,tag_x\n1.0,0\n2.0,1\n";
        let filters = FilterSet::new().with("rating", Criterion::range(Some(4.0), None));
        let mut pipeline = IngestPipeline::default();
        let result = pipeline
            .parse(Cursor::new(csv), csv.len() as u64, &rating_schema(), &filters, |_| {})
            .await;
        assert!(matches!(result, Err(ExplorerError::EmptyResult)));
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_a_parse_failure() {
        let bytes: Vec<u8> = b"title\n\xff\xfe\n".to_vec();
        let mut pipeline = IngestPipeline::default();
        let result = pipeline
            .parse(Cursor::new(bytes), 0, &Schema::default(), &FilterSet::new(), |_| {})
            .await;
        assert!(matches!(result, Err(ExplorerError::ParseFailure(_))));
        assert_eq!(pipeline.state(), IngestState::Failed);
    }

    #[test]
    fn test_phase_scaling() {
        assert_eq!(PARSE_PHASE.percent(0.5), 15.0);
        assert_eq!(ROWS_PHASE.percent(0.5), 50.0);
        assert_eq!(COLUMN_FILTERS_PHASE.percent(3.0), 100.0);
    }
}
