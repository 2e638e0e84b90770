use crate::{
    DEFAULT_CSV_DELIMITER, DEFAULT_PAGE_LENGTH, ExplorerError, ExplorerResult, MAX_ROWS,
    PAGE_LENGTHS, SortBy,
};

use clap::Parser;
use regex::Regex;
use std::{path::PathBuf, sync::LazyLock};

// https://stackoverflow.com/questions/74068168/clap-rs-not-printing-colors-during-help
fn get_styles() -> clap::builder::Styles {
    let cyan = anstyle::Color::Ansi(anstyle::AnsiColor::Cyan);
    let green = anstyle::Color::Ansi(anstyle::AnsiColor::Green);
    let yellow = anstyle::Color::Ansi(anstyle::AnsiColor::Yellow);

    clap::builder::Styles::styled()
        .placeholder(anstyle::Style::new().fg_color(Some(yellow)))
        .usage(anstyle::Style::new().fg_color(Some(cyan)).bold())
        .header(
            anstyle::Style::new()
                .fg_color(Some(cyan))
                .bold()
                .underline(),
        )
        .literal(anstyle::Style::new().fg_color(Some(green)))
}

// https://docs.rs/clap/latest/clap/struct.Command.html#method.help_template
const APPLET_TEMPLATE: &str = "\
{before-help}
{about-with-newline}
{usage-heading} {usage}

{all-args}
{after-help}";

const EX1: &str = r#" catalog-explorer games.csv -s column_details.json --print-schema"#;
const EX2: &str = r#" catalog-explorer games.csv -f bayesian_rating=4..5 -f tag_rpg=1"#;
const EX3: &str = r#" catalog-explorer games.csv -f platform="PC, Switch" -f title=dragon --sort year:asc"#;
const EX4: &str = r#" catalog-explorer games.csv --filters saved_filters.json -t thumbnails.json -y"#;

/// `COLUMN=VALUE`: the column name is everything before the first `=`.
static FILTER_INPUT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([^=]*[^=\s])\s*=(.*)$").expect("valid filter regex"));

/// One `--filter COLUMN=VALUE` argument, as typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterInput {
    pub column: String,
    /// `min..max`, a comma separated list of checked values, or free text.
    pub value: String,
}

/// Command-line arguments for the catalog explorer.
#[derive(Parser, Debug, Clone)]
#[command(
    // Read from `Cargo.toml`.
    author, version, about,
    long_about = None,
    next_line_help = true,
    help_template = APPLET_TEMPLATE,
    styles=get_styles(),
    after_help = format!("EXAMPLES:\n{EX1}\n{EX2}\n{EX3}\n{EX4}")
)]
pub struct Arguments {
    /// CSV delimiter character. [Default: ',']
    #[arg(
        short = 'd',
        long,
        default_value = DEFAULT_CSV_DELIMITER,
        help = "CSV delimiter character",
        long_help = "Sets the CSV delimiter. Must be a single ASCII character.",
        value_parser = validate_delimiter,
        requires = "path"
    )]
    pub delimiter: String,

    /// Pre-filter controls, repeatable [requires data file].
    #[arg(
        short = 'f',
        long = "filter",
        value_name = "COLUMN=VALUE",
        help = "Set a pre-filter control before the search (repeatable)",
        long_help = "\
Sets the pre-filter control of COLUMN before searching. The VALUE syntax depends
on the control the column gets from the schema:

- Range (int/float):   `min..max`, either side optional: `4..`, `..2000`, `2..6`
- Choice and tag:      comma separated checked values: `PC, Switch`, `1`
- Text (free strings): terms, one per line of the control: `dragon`

Example: -f bayesian_rating=4..5 -f tag_rpg=1 -f platform=\"PC, Switch\"
",
        requires = "path",
        value_parser = validate_filter_input
    )]
    pub filter: Vec<FilterInput>,

    /// Saved Filter Set document (JSON) applied before the `--filter` controls.
    #[arg(
        long = "filters",
        value_name = "JSON_FILE",
        help = "Load a saved Filter Set document (JSON) [requires FILE_PATH]",
        requires = "path"
    )]
    pub filters: Option<PathBuf>,

    /// Maximum number of rows kept by a search. [Default: 30000]
    #[arg(
        long,
        value_name = "ROWS",
        default_value_t = MAX_ROWS,
        help = "Maximum number of rows kept by a search",
        value_parser = validate_max_rows
    )]
    pub max_rows: usize,

    /// Rows per printed page. [Default: 100]
    #[arg(
        long,
        value_name = "ROWS",
        default_value_t = DEFAULT_PAGE_LENGTH,
        help = "Rows per page: 50, 100, 200, 500 or 1000",
        value_parser = validate_page_size
    )]
    pub page_size: usize,

    /// Page to print (1-based).
    #[arg(long, value_name = "PAGE", default_value_t = 1)]
    pub page: usize,

    /// Optional path to the CSV data file.
    #[arg(
        value_name = "FILE_PATH",
        required = false,
        help = "Path to the CSV catalog",
        long_help = "Path to the input CSV file. The first record holds the column names."
    )]
    pub path: Option<PathBuf>,

    /// Path to the thumbnail/gallery document [requires data file].
    #[arg(
        short = 't',
        long,
        value_name = "JSON_FILE",
        help = "Thumbnail/gallery document (JSON), keyed by the `key` column",
        requires = "path"
    )]
    pub thumbnails: Option<PathBuf>,

    /// Path to the tag-pattern document.
    #[arg(
        short = 'p',
        long,
        value_name = "JSON_FILE",
        help = "Tag-pattern document (JSON): column name to pattern text"
    )]
    pub patterns: Option<PathBuf>,

    /// Print the active schema document as JSON after the search.
    #[arg(
        long,
        help = "Print the active (loaded or inferred) schema as JSON",
        action = clap::ArgAction::SetTrue
    )]
    pub print_schema: bool,

    /// Path to the schema document.
    #[arg(
        short = 's',
        long,
        value_name = "JSON_FILE",
        help = "Schema document (JSON). If omitted the schema is inferred from the data",
        long_help = "\
Schema document mapping each column to its kind and filter shape:
  {\"rating\": {\"type\": \"float\", \"min\": 0, \"max\": 5}, \"tag_x\": {\"type\": \"tag\"}}
Types: int, float, bool, tag, str. An empty document means no schema."
    )]
    pub schema: Option<PathBuf>,

    /// Sort the kept rows by `COLUMN:asc` or `COLUMN:desc`.
    #[arg(
        long,
        value_name = "COLUMN:DIRECTION",
        help = "Sort the loaded table [Default: bayesian_rating:desc when present]",
        value_parser = validate_sort
    )]
    pub sort: Option<SortBy>,

    /// Run an unfiltered search without asking for confirmation.
    #[arg(
        short = 'y',
        long = "yes",
        help = "Do not ask before searching with no active pre-filter",
        action = clap::ArgAction::SetTrue
    )]
    pub assume_yes: bool,
}

impl Arguments {
    /// Build `Arguments` struct.
    pub fn build() -> Arguments {
        Arguments::parse()
    }
}

// --- Validation Functions ---

fn invalid(arg_name: &str, reason: impl Into<String>) -> ExplorerError {
    ExplorerError::InvalidArgument {
        arg_name: arg_name.to_string(),
        reason: reason.into(),
    }
}

/// clap validator for '--delimiter': exactly one ASCII character.
fn validate_delimiter(s: &str) -> ExplorerResult<String> {
    match s.as_bytes() {
        [byte] if byte.is_ascii() && *byte != b'"' && *byte != b'\n' => Ok(s.to_string()),
        _ => Err(ExplorerError::InvalidDelimiter(s.to_string())),
    }
}

/// clap validator for '--filter'.
fn validate_filter_input(s: &str) -> ExplorerResult<FilterInput> {
    let caps = FILTER_INPUT
        .captures(s)
        .ok_or_else(|| invalid("--filter", format!("expected COLUMN=VALUE, got `{s}`")))?;
    Ok(FilterInput {
        column: caps[1].to_string(),
        value: caps[2].trim().to_string(),
    })
}

/// clap validator for '--max-rows'.
fn validate_max_rows(s: &str) -> ExplorerResult<usize> {
    match s.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(invalid("--max-rows", format!("expected a positive integer, got `{s}`"))),
    }
}

/// clap validator for '--page-size'.
fn validate_page_size(s: &str) -> ExplorerResult<usize> {
    match s.trim().parse::<usize>() {
        Ok(n) if PAGE_LENGTHS.contains(&n) => Ok(n),
        _ => Err(invalid("--page-size", format!("expected one of {PAGE_LENGTHS:?}, got `{s}`"))),
    }
}

/// clap validator for '--sort'. The direction defaults to ascending.
fn validate_sort(s: &str) -> ExplorerResult<SortBy> {
    let (column, direction) = s.rsplit_once(':').unwrap_or((s, "asc"));
    let column = column.trim();
    if column.is_empty() {
        return Err(invalid("--sort", "missing column name"));
    }
    match direction.trim().to_ascii_lowercase().as_str() {
        "asc" => Ok(SortBy::new(column, true)),
        "desc" => Ok(SortBy::new(column, false)),
        other => Err(invalid("--sort", format!("unknown direction `{other}`, use asc or desc"))),
    }
}

//----------------------------------------------------------------------------//
//                                   Tests                                    //
//----------------------------------------------------------------------------//
