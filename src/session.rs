//! Dataset Session: the explicitly owned state of one catalog and the search
//! orchestration (parse, infer, hand off to the column filter model).
//!
//! State moves between stages by replacement: a search builds new `Arc`s for the
//! rows and the last searched Filter Set and swaps them in only on success.

use crate::{
    COLUMN_FILTERS_PHASE, CancelFlag, ColumnFilterModel, ExplorerError, ExplorerResult,
    FileExtension, FilterSet, IngestPipeline, IngestState, LoadingGuard, PARSE_PHASE,
    PipelineConfig, ROWS_PHASE, Row, Schema, TagPatterns, ThumbnailIndex, WidgetState,
    infer_schema, populate, read_json_document,
};
use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    sync::Arc,
};

/// The loading indicator collaborator.
pub trait ProgressSink {
    fn show(&mut self, label: &str);
    /// `percent` is the overall loading bar position, in `[0, 100]`.
    fn update(&mut self, label: &str, percent: f64);
    fn hide(&mut self);
}

/// Reports loading progress through `tracing`, in 10% steps.
#[derive(Debug, Default)]
pub struct TracingProgress {
    next_step: f64,
}

impl ProgressSink for TracingProgress {
    fn show(&mut self, label: &str) {
        self.next_step = 0.0;
        tracing::info!("{label}");
    }

    fn update(&mut self, label: &str, percent: f64) {
        if percent >= self.next_step {
            tracing::info!("{label} {percent:.0}%");
            self.next_step = (percent / 10.0).floor() * 10.0 + 10.0;
        }
    }

    fn hide(&mut self) {
        tracing::debug!("Loading indicator hidden");
    }
}

/// Hides the loading indicator when dropped, whatever the exit path.
struct ProgressGuard<'a, S: ProgressSink + ?Sized> {
    sink: &'a mut S,
    percent: f64,
}

impl<'a, S: ProgressSink + ?Sized> ProgressGuard<'a, S> {
    fn show(sink: &'a mut S, label: &str) -> Self {
        sink.show(label);
        ProgressGuard { sink, percent: 0.0 }
    }

    /// Forwards `percent` unless it would move the bar backwards.
    fn update(&mut self, label: &str, percent: f64) {
        self.percent = self.percent.max(percent);
        self.sink.update(label, self.percent);
    }
}

impl<S: ProgressSink + ?Sized> Drop for ProgressGuard<'_, S> {
    fn drop(&mut self) {
        self.sink.hide();
    }
}

#[derive(Debug, Default)]
pub struct DatasetSession {
    csv_path: Option<PathBuf>,
    schema: Option<Arc<Schema>>,
    tag_patterns: Arc<TagPatterns>,
    thumbnails: Option<Arc<ThumbnailIndex>>,
    last_searched: Arc<FilterSet>,
    rows: Arc<Vec<Row>>,
    pipeline: IngestPipeline,
}

impl DatasetSession {
    pub fn new(config: PipelineConfig) -> Self {
        DatasetSession {
            pipeline: IngestPipeline::new(config, CancelFlag::new()),
            ..Default::default()
        }
    }

    /// Selects the CSV file the next search reads.
    pub fn set_csv_source(&mut self, path: &Path) -> ExplorerResult<()> {
        let extension = FileExtension::from_path(path);
        if extension != FileExtension::Csv {
            return Err(ExplorerError::FileType(format!(
                "please choose a CSV file, got {extension} for `{}`",
                path.display()
            )));
        }
        if !path.is_file() {
            return Err(ExplorerError::FileNotFound(path.to_path_buf()));
        }
        tracing::info!("CSV source: {}", path.display());
        self.csv_path = Some(path.to_path_buf());
        Ok(())
    }

    pub fn csv_source(&self) -> Option<&Path> {
        self.csv_path.as_deref()
    }

    /// Loads a schema document. An empty document clears the schema.
    ///
    /// On failure the schema is cleared too, so inference takes over on the next search.
    pub fn load_schema_document(&mut self, path: &Path) -> ExplorerResult<()> {
        let loaded = read_json_document(path).and_then(|text| Schema::from_json_str(&text));
        match loaded {
            Ok(schema) if schema.is_empty() => {
                tracing::info!("Schema document `{}` is empty: schema will be inferred", path.display());
                self.schema = None;
                Ok(())
            }
            Ok(schema) => {
                tracing::info!("Loaded schema for {} columns from `{}`", schema.len(), path.display());
                self.schema = Some(Arc::new(schema));
                Ok(())
            }
            Err(error) => {
                tracing::error!("Schema document `{}` rejected: {error}", path.display());
                self.schema = None;
                Err(error)
            }
        }
    }

    pub fn schema(&self) -> Option<&Arc<Schema>> {
        self.schema.as_ref()
    }

    /// On failure the previous patterns are kept.
    pub fn load_tag_patterns(&mut self, path: &Path) -> ExplorerResult<()> {
        let patterns = TagPatterns::from_path(path).inspect_err(|error| {
            tracing::warn!("Tag patterns `{}` not loaded: {error}", path.display())
        })?;
        tracing::debug!("Loaded {} tag patterns", patterns.len());
        self.tag_patterns = Arc::new(patterns);
        Ok(())
    }

    pub fn tag_patterns(&self) -> &TagPatterns {
        &self.tag_patterns
    }

    /// On failure thumbnails are disabled.
    pub fn load_thumbnails(&mut self, path: &Path) -> ExplorerResult<()> {
        match ThumbnailIndex::from_path(path) {
            Ok(index) => {
                tracing::debug!("Loaded {} thumbnail entries", index.len());
                self.thumbnails = Some(Arc::new(index));
                Ok(())
            }
            Err(error) => {
                tracing::warn!("Thumbnails `{}` not loaded: {error}", path.display());
                self.thumbnails = None;
                Err(error)
            }
        }
    }

    pub fn last_searched(&self) -> &Arc<FilterSet> {
        &self.last_searched
    }

    pub fn rows(&self) -> &Arc<Vec<Row>> {
        &self.rows
    }

    /// The flag a stop control should set while a search runs.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.pipeline.cancel_flag()
    }

    pub fn ingest_state(&self) -> IngestState {
        self.pipeline.state()
    }

    /// Pre-filter controls re-opened with the last searched Filter Set.
    pub fn widget_state(&self) -> WidgetState {
        match &self.schema {
            Some(schema) => populate(&self.last_searched, schema),
            None => WidgetState::default(),
        }
    }

    /// Runs one search over the CSV source.
    ///
    /// The loading indicator is shown for the whole run and hidden on every exit;
    /// the cancellation flag is reset before and after. On error the session keeps
    /// its previous rows and last searched set.
    pub async fn search<S>(&mut self, filter_set: FilterSet, sink: &mut S) -> ExplorerResult<ColumnFilterModel>
    where
        S: ProgressSink + ?Sized,
    {
        let path = self.csv_path.clone().ok_or(ExplorerError::NoFileProvided)?;

        let cancel = self.pipeline.cancel_flag();
        cancel.reset();
        let _loading = LoadingGuard::new(&cancel);
        let mut progress = ProgressGuard::show(sink, PARSE_PHASE.label);

        tracing::info!("Search started with {} prefilters", filter_set.len());

        let file = File::open(&path)?;
        let total_bytes = file.metadata()?.len();
        let parse_schema = self.schema.clone().unwrap_or_default();

        let rows = self
            .pipeline
            .parse(BufReader::new(file), total_bytes, &parse_schema, &filter_set, |p| {
                progress.update(PARSE_PHASE.label, PARSE_PHASE.percent(p.fraction()))
            })
            .await?;

        let schema = match self.infer_schema_if_missing(&rows) {
            Ok(schema) => schema,
            Err(ExplorerError::SchemaInferenceSkipped) => {
                tracing::debug!("Schema already present, inference skipped");
                parse_schema
            }
            Err(error) => return Err(error),
        };

        progress.update(ROWS_PHASE.label, ROWS_PHASE.percent(1.0));
        tokio::task::yield_now().await;
        if cancel.is_cancelled() {
            tracing::info!("Search cancelled before the table was built");
            return Err(ExplorerError::Cancelled);
        }

        let rows = Arc::new(rows);
        let filter_set = Arc::new(filter_set);
        let model = ColumnFilterModel::new(
            Arc::clone(&rows),
            &schema,
            &filter_set,
            self.thumbnails.clone(),
        );
        progress.update(COLUMN_FILTERS_PHASE.label, COLUMN_FILTERS_PHASE.end);

        self.rows = rows;
        self.last_searched = filter_set;
        tracing::info!(
            "Search completed: {} rows, {} columns displayed",
            model.total_count(),
            model.columns().len()
        );
        Ok(model)
    }

    /// Infers and stores a schema when none is present.
    ///
    /// Fails with `SchemaInferenceSkipped` when a schema already exists.
    fn infer_schema_if_missing(&mut self, rows: &[Row]) -> ExplorerResult<Arc<Schema>> {
        if self.schema.is_some() {
            return Err(ExplorerError::SchemaInferenceSkipped);
        }
        let schema = Arc::new(infer_schema(rows).ok_or(ExplorerError::EmptyResult)?);
        tracing::info!("Inferred schema for {} columns", schema.len());
        self.schema = Some(Arc::clone(&schema));
        Ok(schema)
    }
}

//----------------------------------------------------------------------------//
//                                   Tests                                    //
//----------------------------------------------------------------------------//
