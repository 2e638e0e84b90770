#![warn(clippy::all)]

use catalog_explorer::{
    Arguments, ColumnFilterModel, Confirmation, DatasetSession, ExplorerError, ExplorerResult,
    FilterSet, HeaderSortState, LOCATION_COLUMN, LoadSettings, Severity, TracingProgress,
    WidgetState, collect, populate, read_json_document, strip_markup, submit, summary,
};
use std::{
    io::{self, BufRead, Write},
    process::ExitCode,
};

/*
cargo fmt
cargo test -- --nocapture
cargo test -- --show-output tests_pipeline
cargo run -- --help
RUST_LOG=debug cargo run -- games.csv -s column_details.json -f bayesian_rating=4..
cargo doc --open
cargo b -r && cargo install --path=.
*/

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize the tracing subscriber for logging.
    // Use RUST_LOG environment variable to set logging level.  eg `export RUST_LOG=info`
    tracing_subscriber::fmt::init();

    // Parse command-line arguments.
    let args = Arguments::build();

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            report(&error);
            match error.severity() {
                Severity::Silent => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            }
        }
    }
}

async fn run(args: &Arguments) -> ExplorerResult<()> {
    let settings = LoadSettings::new(args)?;

    // RUST_LOG=debug cargo run -- games.csv
    tracing::debug!("main()\nLoadSettings: {settings:#?}");

    let mut session = DatasetSession::new(settings.pipeline_config());
    session.set_csv_source(&settings.csv_path)?;

    // A rejected schema document is reported once; inference takes over.
    if let Some(path) = &settings.schema_path
        && let Err(error) = session.load_schema_document(path)
    {
        report(&error);
    }
    // Tag patterns and thumbnails only log their failures.
    if let Some(path) = &settings.tag_patterns_path {
        session.load_tag_patterns(path).ok();
    }
    if let Some(path) = &settings.thumbnails_path {
        session.load_thumbnails(path).ok();
    }

    let schema = session.schema().cloned().unwrap_or_default();

    let mut widgets = match &settings.filters_path {
        Some(path) => {
            let saved = FilterSet::from_json_str(&read_json_document(path)?)?;
            populate(&saved, &schema)
        }
        None => WidgetState::new(&schema),
    };
    for input in &settings.filter_inputs {
        widgets.apply_input(&schema, &input.column, &input.value)?;
    }

    println!("{}", summary(&collect(&widgets, &schema)?));

    let submission = submit(&widgets, &schema, || {
        if settings.assume_yes {
            Confirmation::Proceed
        } else {
            confirm_unfiltered_search()
        }
    })?;
    // A cancelled panel ends the run silently.
    let Some(filter_set) = submission.into_search()? else {
        println!("Search not started: add a prefilter or confirm with --yes.");
        return Ok(());
    };

    // Ctrl-C sets the cancellation flag; the pipeline stops at the next row.
    let cancel = session.cancel_flag();
    let stop = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Stop requested");
            cancel.cancel();
        }
    });
    let result = session
        .search(filter_set, &mut TracingProgress::default())
        .await;
    stop.abort();
    let mut model = result?;

    if let Some(sort) = &settings.sort {
        model.sort_by(&sort.column_name, sort.ascending)?;
    }
    model.set_page_length(settings.page_length)?;

    if settings.print_schema
        && let Some(schema) = session.schema()
    {
        println!("{}", serde_json::to_string_pretty(&schema.to_json_value())?);
    }

    print_page(&model, settings.page - 1)?;
    Ok(())
}

/// Prints the single consolidated message of a failure. Silent failures print nothing.
fn report(error: &ExplorerError) {
    if let Some(message) = error.user_message() {
        eprintln!("{message}");
    }
}

/// `y` searches everything, `q` (or end of input) abandons the search.
fn confirm_unfiltered_search() -> Confirmation {
    eprint!(
        "No prefilters applied. Searching the full dataset may be slow or hit the row limit.\n\
         Continue anyway? [y/N/q] "
    );
    io::stderr().flush().ok();

    let mut answer = String::new();
    match io::stdin().lock().read_line(&mut answer) {
        Ok(0) => Confirmation::Cancel,
        Ok(_) => parse_confirmation(&answer),
        Err(error) => {
            tracing::warn!("Cannot read confirmation: {error}");
            Confirmation::Cancel
        }
    }
}

fn parse_confirmation(answer: &str) -> Confirmation {
    match answer.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Confirmation::Proceed,
        "q" | "quit" | "c" | "cancel" => Confirmation::Cancel,
        _ => Confirmation::KeepEditing,
    }
}

/// Tab separated page of the table. Highlighted columns are marked with `*`.
fn print_page(model: &ColumnFilterModel, index: usize) -> ExplorerResult<()> {
    let mut out = io::stdout().lock();

    let mut header: Vec<String> = Vec::new();
    if model.has_view_images() {
        header.push("View Images".to_string());
    }
    if model.has_thumbnails() {
        header.push("Image".to_string());
    }
    header.extend(model.columns().iter().map(|column| {
        let mark = if model.is_highlighted(column) { "*" } else { "" };
        let icon = match HeaderSortState::of(column, model.sort()) {
            HeaderSortState::NotSorted => "",
            state => state.get_icon(),
        };
        format!("{mark}{column}{icon}")
    }));
    writeln!(out, "{}", header.join("\t"))?;

    for row in model.page(index) {
        let mut cells: Vec<String> = Vec::new();
        if model.has_view_images() {
            cells.push(row.get(LOCATION_COLUMN).unwrap_or("").to_string());
        }
        if model.has_thumbnails() {
            let thumbnail = model
                .thumbnail_for(row)
                .and_then(|entry| entry.thumbnail_image.clone());
            cells.push(thumbnail.unwrap_or_default());
        }
        cells.extend(
            model
                .columns()
                .iter()
                .map(|column| strip_markup(row.get(column).unwrap_or(""))),
        );
        writeln!(out, "{}", cells.join("\t"))?;
    }

    writeln!(
        out,
        "Page {} of {} ({} of {} rows)",
        index + 1,
        model.page_count(),
        model.visible_count(),
        model.total_count()
    )?;
    Ok(())
}

//----------------------------------------------------------------------------//
//                                   Tests                                    //
//----------------------------------------------------------------------------//

/// Run tests with:
/// `cargo test -- --show-output tests_main`
#[cfg(test)]
mod tests_main {
    use super::*;

    #[test]
    fn test_confirmation_answers() {
        assert_eq!(parse_confirmation("y\n"), Confirmation::Proceed);
        assert_eq!(parse_confirmation(" YES "), Confirmation::Proceed);
        assert_eq!(parse_confirmation("q\n"), Confirmation::Cancel);
        assert_eq!(parse_confirmation("Cancel"), Confirmation::Cancel);
        assert_eq!(parse_confirmation("\n"), Confirmation::KeepEditing);
        assert_eq!(parse_confirmation("n"), Confirmation::KeepEditing);
    }
}
