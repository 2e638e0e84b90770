//! Pre-filter Collector.
//!
//! Turns the state of the filter controls into a `FilterSet` (and back), independent
//! of how the controls are drawn. The kind -> control mapping lives in
//! `FilterControl::for_column` and is shared with the post-load column filters.

use crate::{
    ColumnKind, ColumnSchema, Criterion, ExplorerError, ExplorerResult, FilterSet, Literal,
    Schema, TagPatterns, format_number, parse_number,
};
use regex::RegexBuilder;
use std::collections::{BTreeMap, BTreeSet};

/// Text shown when no pre-filter is active.
pub const NO_ACTIVE_PREFILTERS: &str = "Active Prefilters: None";

/// Which control a column gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterControl {
    /// 0/1 checkboxes. Nothing checked by default.
    Tag,
    /// Checkbox group over the declared allowed values. Everything checked by default.
    Choice,
    /// Min/max numeric inputs.
    Range,
    /// Free text input.
    Text,
}

impl FilterControl {
    pub fn for_column(column: &ColumnSchema) -> Self {
        if column.kind == ColumnKind::BinaryTag {
            FilterControl::Tag
        } else if column.has_choices() {
            FilterControl::Choice
        } else if column.kind.is_numeric() {
            FilterControl::Range
        } else {
            FilterControl::Text
        }
    }
}

/// Raw state of one control, as the user left it.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlState {
    /// Displayed values of the checked boxes.
    Checks(BTreeSet<String>),
    Range { min: String, max: String },
    Text(String),
}

/// Answer to "search the full dataset without prefilters?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Proceed,
    KeepEditing,
    /// Close the panel and abandon the search.
    Cancel,
}

impl From<bool> for Confirmation {
    fn from(proceed: bool) -> Self {
        if proceed {
            Confirmation::Proceed
        } else {
            Confirmation::KeepEditing
        }
    }
}

/// What the user did with the filter panel.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// Run the search with this set. It becomes the session's "last searched" set.
    Search(FilterSet),
    /// An empty set was submitted and the user declined to load everything.
    KeepEditing,
    /// The panel was closed. The whole search is abandoned.
    Cancelled,
}

impl Submission {
    /// The filter set to search with. `Cancelled` maps to `ExplorerError::Cancelled`.
    pub fn into_search(self) -> ExplorerResult<Option<FilterSet>> {
        match self {
            Submission::Search(filter_set) => Ok(Some(filter_set)),
            Submission::KeepEditing => Ok(None),
            Submission::Cancelled => Err(ExplorerError::Cancelled),
        }
    }
}

/// Column name -> control state, for every column of a schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WidgetState {
    controls: BTreeMap<String, ControlState>,
}

impl WidgetState {
    /// Controls in their unconstrained defaults.
    pub fn new(schema: &Schema) -> Self {
        let mut state = WidgetState::default();
        state.reset(schema);
        state
    }

    /// Tags unchecked, choices all checked, ranges and text cleared.
    pub fn reset(&mut self, schema: &Schema) {
        self.controls = schema
            .columns()
            .iter()
            .map(|column| (column.name.clone(), default_control(column)))
            .collect();
    }

    pub fn control(&self, column: &str) -> Option<&ControlState> {
        self.controls.get(column)
    }

    pub fn set_range(&mut self, column: &str, min: impl Into<String>, max: impl Into<String>) {
        if let Some(ControlState::Range { min: lo, max: hi }) = self.controls.get_mut(column) {
            *lo = min.into();
            *hi = max.into();
        }
    }

    pub fn set_checked(&mut self, column: &str, value: &str, checked: bool) {
        if let Some(ControlState::Checks(set)) = self.controls.get_mut(column) {
            if checked {
                set.insert(value.to_string());
            } else {
                set.remove(value);
            }
        }
    }

    /// The "Toggle All" box of a choice group.
    pub fn set_all_checked(&mut self, schema: &Schema, column: &str, checked: bool) {
        let Some(definition) = schema.get(column) else {
            return;
        };
        if let Some(ControlState::Checks(set)) = self.controls.get_mut(column) {
            *set = if checked {
                displayed_choices(definition).collect()
            } else {
                BTreeSet::new()
            };
        }
    }

    pub fn set_text(&mut self, column: &str, value: impl Into<String>) {
        if let Some(ControlState::Text(text)) = self.controls.get_mut(column) {
            *text = value.into();
        }
    }

    /// Applies one `COLUMN=VALUE` style input.
    ///
    /// Range controls take `MIN..MAX` (either side may be empty), checkbox controls a
    /// comma-separated list of the values to check, text controls the raw text.
    pub fn apply_input(&mut self, schema: &Schema, column: &str, input: &str) -> ExplorerResult<()> {
        let definition = schema.get(column).ok_or_else(|| ExplorerError::InvalidFilter {
            column: column.to_string(),
            reason: "no such column in the schema".to_string(),
        })?;

        match FilterControl::for_column(definition) {
            FilterControl::Range => {
                let (min, max) = input.split_once("..").ok_or_else(|| {
                    ExplorerError::InvalidFilter {
                        column: column.to_string(),
                        reason: format!("expected MIN..MAX, got '{input}'"),
                    }
                })?;
                self.set_range(column, min.trim(), max.trim());
            }
            FilterControl::Tag | FilterControl::Choice => {
                let allowed: BTreeSet<String> = displayed_choices(definition).collect();
                let mut checked = BTreeSet::new();
                for value in input.split(',').map(str::trim).filter(|v| !v.is_empty()) {
                    if !allowed.contains(value) {
                        return Err(ExplorerError::InvalidFilter {
                            column: column.to_string(),
                            reason: format!(
                                "'{value}' is not one of: {}",
                                allowed.iter().cloned().collect::<Vec<_>>().join(", ")
                            ),
                        });
                    }
                    checked.insert(value.to_string());
                }
                self.controls
                    .insert(column.to_string(), ControlState::Checks(checked));
            }
            FilterControl::Text => self.set_text(column, input),
        }
        Ok(())
    }
}

fn default_control(column: &ColumnSchema) -> ControlState {
    match FilterControl::for_column(column) {
        FilterControl::Tag => ControlState::Checks(BTreeSet::new()),
        FilterControl::Choice => ControlState::Checks(displayed_choices(column).collect()),
        FilterControl::Range => ControlState::Range {
            min: String::new(),
            max: String::new(),
        },
        FilterControl::Text => ControlState::Text(String::new()),
    }
}

fn displayed_choices(column: &ColumnSchema) -> impl Iterator<Item = String> + '_ {
    column.allowed_values.iter().map(ToString::to_string)
}

/// Builds the filter set from the controls.
///
/// Checkbox groups with nothing or everything checked are left out: both mean
/// "no constraint". Ranges are kept when at least one bound is set.
pub fn collect(widgets: &WidgetState, schema: &Schema) -> ExplorerResult<FilterSet> {
    let mut filter_set = FilterSet::new();

    for column in schema.columns() {
        let Some(control) = widgets.control(&column.name) else {
            continue;
        };

        match (FilterControl::for_column(column), control) {
            (FilterControl::Range, ControlState::Range { min, max }) => {
                let min = read_bound(column, min)?;
                let max = read_bound(column, max)?;
                if min.is_some() || max.is_some() {
                    filter_set.insert(&column.name, Criterion::range(min, max));
                }
            }
            (FilterControl::Tag | FilterControl::Choice, ControlState::Checks(checked)) => {
                let choices: Vec<Literal> = column
                    .allowed_values
                    .iter()
                    .filter(|literal| checked.contains(&literal.to_string()))
                    .map(|literal| typed_choice(column.kind, literal))
                    .collect();
                if !choices.is_empty() && choices.len() != column.allowed_values.len() {
                    filter_set.insert(&column.name, Criterion::choices(choices));
                }
            }
            (FilterControl::Text, ControlState::Text(text)) => {
                let text = text.trim();
                if !text.is_empty() {
                    filter_set.insert(&column.name, Criterion::text([text]));
                }
            }
            (control_kind, state) => {
                tracing::warn!(
                    "Control state {state:?} does not fit the {control_kind:?} control of column '{}'",
                    column.name
                );
            }
        }
    }

    Ok(filter_set)
}

fn read_bound(column: &ColumnSchema, text: &str) -> ExplorerResult<Option<f64>> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    let n = parse_number(text).ok_or_else(|| ExplorerError::InvalidFilter {
        column: column.name.clone(),
        reason: format!("'{text}' is not a number"),
    })?;
    Ok(Some(if column.kind == ColumnKind::Integer {
        n.round()
    } else {
        n
    }))
}

fn typed_choice(kind: ColumnKind, literal: &Literal) -> Literal {
    match kind {
        ColumnKind::Boolean => literal.as_bool().map(Literal::Bool),
        ColumnKind::Integer | ColumnKind::Float | ColumnKind::BinaryTag => {
            literal.as_number().map(Literal::Number)
        }
        ColumnKind::String => None,
    }
    .unwrap_or_else(|| literal.clone())
}

/// Pre-checks and pre-fills the controls from a saved filter set.
pub fn populate(filter_set: &FilterSet, schema: &Schema) -> WidgetState {
    let mut widgets = WidgetState::new(schema);

    for column in schema.columns() {
        let Some(criterion) = filter_set.get(&column.name) else {
            continue;
        };

        let state = match (FilterControl::for_column(column), criterion) {
            (FilterControl::Range, Criterion::Range(range)) => ControlState::Range {
                min: range.min.map(format_number).unwrap_or_default(),
                max: range.max.map(format_number).unwrap_or_default(),
            },
            (FilterControl::Tag | FilterControl::Choice, Criterion::Choice(choice)) => {
                ControlState::Checks(choice.choices.iter().map(ToString::to_string).collect())
            }
            (FilterControl::Text, Criterion::Text(text)) => {
                ControlState::Text(text.terms.first().cloned().unwrap_or_default())
            }
            _ => {
                tracing::debug!(
                    "Saved criterion for '{}' does not fit its control, keeping the default",
                    column.name
                );
                continue;
            }
        };
        widgets.controls.insert(column.name.clone(), state);
    }

    widgets
}

/// Collects the controls and decides what happens next.
///
/// An empty set asks `confirm_unfiltered` first (loading everything can be heavy).
/// A plain `bool` answer means proceed or keep editing.
pub fn submit<A: Into<Confirmation>>(
    widgets: &WidgetState,
    schema: &Schema,
    confirm_unfiltered: impl FnOnce() -> A,
) -> ExplorerResult<Submission> {
    let filter_set = collect(widgets, schema)?;
    if !filter_set.is_empty() {
        return Ok(Submission::Search(filter_set));
    }
    match confirm_unfiltered().into() {
        Confirmation::Proceed => Ok(Submission::Search(filter_set)),
        Confirmation::KeepEditing => {
            tracing::info!("Unfiltered search declined, keeping the filter panel open");
            Ok(Submission::KeepEditing)
        }
        Confirmation::Cancel => Ok(cancel()),
    }
}

/// Closes the filter panel without searching.
pub fn cancel() -> Submission {
    tracing::info!("Filter panel closed, search abandoned");
    Submission::Cancelled
}

/// `true` when nothing would be filtered: the panel shows its "heavy search" warning.
pub fn has_warning(widgets: &WidgetState, schema: &Schema) -> bool {
    collect(widgets, schema).is_ok_and(|set| set.is_empty())
}

/// One line listing the active pre-filters.
pub fn summary(filter_set: &FilterSet) -> String {
    if filter_set.is_empty() {
        return NO_ACTIVE_PREFILTERS.to_string();
    }
    filter_set
        .iter()
        .map(|(column, criterion)| format!("{column}: {}", criterion.describe()))
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Filter-panel search box: does this column's section stay visible?
///
/// Matches the column name, then the pattern text, then the pattern used as a
/// case-insensitive regex against the search text.
pub fn section_matches_search(column: &str, search: &str, patterns: &TagPatterns) -> bool {
    let search = search.trim();
    if search.is_empty() {
        return true;
    }

    let lower_search = search.to_lowercase();
    if column.to_lowercase().contains(&lower_search) {
        return true;
    }

    let Some(pattern) = patterns.pattern(column) else {
        return false;
    };

    if pattern.to_lowercase().contains(&lower_search) {
        return true;
    }

    match RegexBuilder::new(pattern).case_insensitive(true).build() {
        Ok(regex) => regex.is_match(search),
        Err(error) => {
            tracing::warn!("Invalid pattern for column '{column}': {error}");
            false
        }
    }
}

//----------------------------------------------------------------------------//
//                                   Tests                                    //
//----------------------------------------------------------------------------//
