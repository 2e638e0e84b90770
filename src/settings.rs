use crate::{
    Arguments, ExplorerError, ExplorerResult, FilterInput, MAX_ROWS, PROGRESS_BATCH,
    PipelineConfig, SortBy,
};
use std::path::PathBuf;

// --- Constants ---

/// Default delimiter used for CSV parsing if not specified.
pub static DEFAULT_CSV_DELIMITER: &str = ",";

/// Page lengths offered by the table.
pub const PAGE_LENGTHS: [usize; 5] = [50, 100, 200, 500, 1000];

pub const DEFAULT_PAGE_LENGTH: usize = 100;

// --- LoadSettings Struct ---

/// Holds configuration parameters related to **loading and searching** a catalog.
///
/// Built once from the command line; the session and the pipeline read it.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadSettings {
    /// The canonical, absolute path to the CSV file.
    pub csv_path: PathBuf,
    pub schema_path: Option<PathBuf>,
    pub tag_patterns_path: Option<PathBuf>,
    pub thumbnails_path: Option<PathBuf>,
    /// A saved Filter Set document, applied before `filter_inputs`.
    pub filters_path: Option<PathBuf>,
    pub filter_inputs: Vec<FilterInput>,
    /// The byte used to separate columns in the CSV file.
    pub csv_delimiter: u8,
    pub max_rows: usize,
    pub progress_batch: usize,
    pub page_length: usize,
    /// 1-based page to print.
    pub page: usize,
    pub sort: Option<SortBy>,
    /// Skip the confirmation asked before an unfiltered search.
    pub assume_yes: bool,
    pub print_schema: bool,
}

impl Default for LoadSettings {
    fn default() -> Self {
        LoadSettings {
            csv_path: PathBuf::new(),
            schema_path: None,
            tag_patterns_path: None,
            thumbnails_path: None,
            filters_path: None,
            filter_inputs: Vec::new(),
            csv_delimiter: b',',
            max_rows: MAX_ROWS,
            progress_batch: PROGRESS_BATCH,
            page_length: DEFAULT_PAGE_LENGTH,
            page: 1,
            sort: None,
            assume_yes: false,
            print_schema: false,
        }
    }
}

impl LoadSettings {
    /// Creates a new `LoadSettings` instance configured from command-line arguments.
    ///
    /// Fails with `NoFileProvided` when no CSV path was given and with `FileNotFound`
    /// when it does not exist.
    pub fn new(args: &Arguments) -> ExplorerResult<Self> {
        let path = args.path.as_ref().ok_or(ExplorerError::NoFileProvided)?;

        // Ensure the path exists and get its absolute, canonical form.
        let csv_path = path
            .canonicalize()
            .map_err(|_| ExplorerError::FileNotFound(path.clone()))?;

        Ok(LoadSettings {
            csv_path,
            schema_path: args.schema.clone(),
            tag_patterns_path: args.patterns.clone(),
            thumbnails_path: args.thumbnails.clone(),
            filters_path: args.filters.clone(),
            filter_inputs: args.filter.clone(),
            csv_delimiter: get_csv_separator(&args.delimiter)?,
            max_rows: args.max_rows,
            page_length: args.page_size,
            page: args.page.max(1),
            sort: args.sort.clone(),
            assume_yes: args.assume_yes,
            print_schema: args.print_schema,
            ..Default::default()
        })
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            max_rows: self.max_rows,
            progress_batch: self.progress_batch,
            delimiter: self.csv_delimiter,
        }
    }
}

/// Retrieves the CSV separator byte from the delimiter string.
///
/// Returns `Err(ExplorerError::InvalidDelimiter)` unless it is a single ASCII character.
pub fn get_csv_separator(delimiter: &str) -> ExplorerResult<u8> {
    match delimiter.as_bytes() {
        [byte] if byte.is_ascii() => Ok(*byte),
        _ => Err(ExplorerError::InvalidDelimiter(delimiter.to_string())),
    }
}

//----------------------------------------------------------------------------//
//                                   Tests                                    //
//----------------------------------------------------------------------------//
