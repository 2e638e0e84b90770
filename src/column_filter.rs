//! Post-load Column Filter Model.
//!
//! Live per-column narrowing of an already loaded row set. Every control change
//! re-applies all active filters (AND across columns) without touching the parser.

use crate::{
    ColumnSchema, DEFAULT_PAGE_LENGTH, ExplorerError, ExplorerResult, FilterControl, FilterSet,
    HeaderSortState, PAGE_LENGTHS, Row, Schema, SortBy, ThumbnailEntry, ThumbnailIndex,
    parse_float_prefix,
};
use regex::Regex;
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Arc, LazyLock},
};

/// Column holding the unique key of a catalog entry.
pub const KEY_COLUMN: &str = "key";

/// Its presence adds a "View Images" affordance to each row.
pub const LOCATION_COLUMN: &str = "location";

static HYPERLINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^=HYPERLINK\("([^"]+)",\s*"([^"]+)"\)$"#).expect("valid HYPERLINK regex")
});

static MARKUP_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid markup regex"));

/// Plain text of a rendered cell.
///
/// `=HYPERLINK("path","label")` becomes `label`; HTML-like tags are removed.
pub fn strip_markup(cell: &str) -> String {
    let cell = cell.trim();
    if let Some(caps) = HYPERLINK.captures(cell) {
        return caps[2].trim().to_string();
    }
    MARKUP_TAG.replace_all(cell, "").trim().to_string()
}

/// Number shown in a cell, ignoring markup and thousands separators.
pub fn cell_number(cell: &str) -> Option<f64> {
    parse_float_prefix(&strip_markup(cell).replace(',', ""))
}

/// Live filter state of one column.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnFilter {
    /// Exact (case-insensitive) match against the checked options.
    Checkbox {
        options: Vec<String>,
        checked: BTreeSet<String>,
        /// Tag column: a blank cell reads as `0`.
        tag: bool,
    },
    Range { min: Option<f64>, max: Option<f64> },
    /// A single case-insensitive substring.
    Text(String),
}

impl ColumnFilter {
    /// Unconstrained control for the column's kind.
    fn for_column(column: &ColumnSchema) -> Self {
        match FilterControl::for_column(column) {
            control @ (FilterControl::Tag | FilterControl::Choice) => {
                let options: Vec<String> =
                    column.allowed_values.iter().map(ToString::to_string).collect();
                ColumnFilter::Checkbox {
                    checked: options.iter().cloned().collect(),
                    options,
                    tag: control == FilterControl::Tag,
                }
            }
            FilterControl::Range => ColumnFilter::Range {
                min: None,
                max: None,
            },
            FilterControl::Text => ColumnFilter::Text(String::new()),
        }
    }

    /// `false` when the control currently constrains nothing.
    pub fn is_active(&self) -> bool {
        match self {
            ColumnFilter::Checkbox { options, checked, .. } => checked.len() != options.len(),
            ColumnFilter::Range { min, max } => min.is_some() || max.is_some(),
            ColumnFilter::Text(text) => !text.trim().is_empty(),
        }
    }

    pub fn matches(&self, cell: &str) -> bool {
        match self {
            ColumnFilter::Checkbox {
                options,
                checked,
                tag,
            } => {
                if checked.is_empty() {
                    // Nothing checked matches nothing.
                    return false;
                }
                if checked.len() == options.len() {
                    return true;
                }
                let mut text = strip_markup(cell);
                if *tag && text.is_empty() {
                    text = "0".to_string();
                }
                checked.iter().any(|v| v.eq_ignore_ascii_case(&text))
            }
            ColumnFilter::Range { min, max } => {
                let Some(n) = cell_number(cell) else {
                    return true;
                };
                min.is_none_or(|lo| n >= lo) && max.is_none_or(|hi| n <= hi)
            }
            ColumnFilter::Text(text) => {
                let needle = text.trim().to_lowercase();
                needle.is_empty() || strip_markup(cell).to_lowercase().contains(&needle)
            }
        }
    }
}

/// The loaded table: visible columns, per-column filters, sort and pagination.
#[derive(Debug, Clone)]
pub struct ColumnFilterModel {
    rows: Arc<Vec<Row>>,
    columns: Vec<String>,
    highlighted: BTreeSet<String>,
    filters: BTreeMap<String, ColumnFilter>,
    sort: Option<SortBy>,
    /// Indices into `rows`, filtered and sorted.
    visible: Vec<usize>,
    page_length: usize,
    thumbnails: Option<Arc<ThumbnailIndex>>,
    view_images: bool,
}

impl ColumnFilterModel {
    /// Builds the model for `rows`, loaded with `last_searched`.
    ///
    /// Tag columns are hidden unless they were part of the search. Thumbnails are
    /// dropped, with a warning, when there is no `key` column to look them up.
    pub fn new(
        rows: Arc<Vec<Row>>,
        schema: &Schema,
        last_searched: &FilterSet,
        thumbnails: Option<Arc<ThumbnailIndex>>,
    ) -> Self {
        let keys: Vec<String> = rows
            .first()
            .map(|row| row.keys().to_vec())
            .unwrap_or_default();

        let columns: Vec<String> = keys
            .into_iter()
            .filter(|name| is_column_shown(name, schema, last_searched))
            .collect();

        let highlighted = columns
            .iter()
            .filter(|name| last_searched.contains(name))
            .cloned()
            .collect();

        let filters = columns
            .iter()
            .filter_map(|name| {
                schema
                    .get(name)
                    .map(|column| (name.clone(), ColumnFilter::for_column(column)))
            })
            .collect();

        let has_column = |name: &str| rows.first().is_some_and(|row| row.header().contains(name));

        let thumbnails = match thumbnails {
            Some(index) if !has_column(KEY_COLUMN) => {
                tracing::warn!(
                    "Column `{KEY_COLUMN}` not found: thumbnails disabled for this load ({} entries ignored)",
                    index.len()
                );
                None
            }
            other => other,
        };

        let mut model = ColumnFilterModel {
            view_images: has_column(LOCATION_COLUMN),
            sort: SortBy::default_for(&columns),
            rows,
            columns,
            highlighted,
            filters,
            visible: Vec::new(),
            page_length: DEFAULT_PAGE_LENGTH,
            thumbnails,
        };
        model.apply();
        model
    }

    /// Visible data columns, in source order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// `true` for columns that took part in the last search.
    pub fn is_highlighted(&self, column: &str) -> bool {
        self.highlighted.contains(column)
    }

    pub fn filter(&self, column: &str) -> Option<&ColumnFilter> {
        self.filters.get(column)
    }

    pub fn active_filter_count(&self) -> usize {
        self.filters.values().filter(|f| f.is_active()).count()
    }

    pub fn sort(&self) -> Option<&SortBy> {
        self.sort.as_ref()
    }

    pub fn total_count(&self) -> usize {
        self.rows.len()
    }

    pub fn visible_count(&self) -> usize {
        self.visible.len()
    }

    /// Rows passing every column filter, in display order.
    pub fn visible_rows(&self) -> impl Iterator<Item = &Row> {
        self.visible.iter().map(|&i| &self.rows[i])
    }

    /// Checks or unchecks one option of a checkbox filter.
    pub fn toggle_choice(&mut self, column: &str, value: &str, checked: bool) -> ExplorerResult<()> {
        let (options, selected) = self.checkbox_mut(column)?;
        let Some(option) = options.iter().find(|o| o.eq_ignore_ascii_case(value)) else {
            return Err(ExplorerError::InvalidFilter {
                column: column.to_string(),
                reason: format!("`{value}` is not one of: {}", options.join(", ")),
            });
        };
        if checked {
            selected.insert(option.clone());
        } else {
            selected.remove(option);
        }
        self.apply();
        Ok(())
    }

    /// The "Toggle All" checkbox.
    pub fn toggle_all(&mut self, column: &str, checked: bool) -> ExplorerResult<()> {
        let (options, selected) = self.checkbox_mut(column)?;
        *selected = if checked {
            options.iter().cloned().collect()
        } else {
            BTreeSet::new()
        };
        self.apply();
        Ok(())
    }

    pub fn set_range(&mut self, column: &str, min: Option<f64>, max: Option<f64>) -> ExplorerResult<()> {
        match self.filters.get_mut(column) {
            Some(ColumnFilter::Range { min: lo, max: hi }) => {
                *lo = min;
                *hi = max;
            }
            _ => return Err(no_control(column, "range")),
        }
        self.apply();
        Ok(())
    }

    pub fn set_text(&mut self, column: &str, text: &str) -> ExplorerResult<()> {
        match self.filters.get_mut(column) {
            Some(ColumnFilter::Text(current)) => *current = text.to_string(),
            _ => return Err(no_control(column, "text")),
        }
        self.apply();
        Ok(())
    }

    /// Clears every control and restores the default sort. Idempotent.
    pub fn reset_all(&mut self) {
        for filter in self.filters.values_mut() {
            match filter {
                ColumnFilter::Checkbox { options, checked, .. } => {
                    *checked = options.iter().cloned().collect();
                }
                ColumnFilter::Range { min, max } => {
                    *min = None;
                    *max = None;
                }
                ColumnFilter::Text(text) => text.clear(),
            }
        }
        self.sort = SortBy::default_for(&self.columns);
        self.apply();
        tracing::debug!("Column filters reset");
    }

    pub fn sort_by(&mut self, column: &str, ascending: bool) -> ExplorerResult<()> {
        if !self.columns.iter().any(|c| c == column) {
            return Err(ExplorerError::InvalidArgument {
                arg_name: "sort".to_string(),
                reason: format!("column `{column}` is not displayed"),
            });
        }
        self.sort = Some(SortBy::new(column, ascending));
        self.apply();
        Ok(())
    }

    /// Header click: cycles the column through descending, ascending, unsorted.
    pub fn cycle_sort(&mut self, column: &str) -> ExplorerResult<HeaderSortState> {
        let next = HeaderSortState::of(column, self.sort.as_ref()).cycle_next();
        match next.to_sort_by(column) {
            Some(sort) => self.sort_by(column, sort.ascending)?,
            None => {
                self.sort = None;
                self.apply();
            }
        }
        Ok(next)
    }

    pub fn page_length(&self) -> usize {
        self.page_length
    }

    pub fn set_page_length(&mut self, length: usize) -> ExplorerResult<()> {
        if !PAGE_LENGTHS.contains(&length) {
            return Err(ExplorerError::InvalidArgument {
                arg_name: "page-size".to_string(),
                reason: format!("{length} is not one of {PAGE_LENGTHS:?}"),
            });
        }
        self.page_length = length;
        Ok(())
    }

    /// Number of pages; an empty view still has one (empty) page.
    pub fn page_count(&self) -> usize {
        self.visible.len().div_ceil(self.page_length).max(1)
    }

    /// Rows of page `index` (0-based). Out of range pages are empty.
    pub fn page(&self, index: usize) -> Vec<&Row> {
        self.visible_rows()
            .skip(index.saturating_mul(self.page_length))
            .take(self.page_length)
            .collect()
    }

    pub fn has_thumbnails(&self) -> bool {
        self.thumbnails.is_some()
    }

    pub fn has_view_images(&self) -> bool {
        self.view_images
    }

    /// Gallery entry of a row, looked up through its `key` cell.
    pub fn thumbnail_for(&self, row: &Row) -> Option<&ThumbnailEntry> {
        let key = row.get(KEY_COLUMN)?.trim();
        if key.is_empty() {
            return None;
        }
        self.thumbnails.as_ref()?.get(key)
    }

    fn checkbox_mut(&mut self, column: &str) -> ExplorerResult<(&Vec<String>, &mut BTreeSet<String>)> {
        match self.filters.get_mut(column) {
            Some(ColumnFilter::Checkbox { options, checked, .. }) => Ok((&*options, checked)),
            _ => Err(no_control(column, "checkbox")),
        }
    }

    fn apply(&mut self) {
        let active: Vec<(&String, &ColumnFilter)> =
            self.filters.iter().filter(|(_, f)| f.is_active()).collect();

        let mut visible: Vec<usize> = self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| {
                active
                    .iter()
                    .all(|(column, filter)| filter.matches(row.get(column).unwrap_or("")))
            })
            .map(|(i, _)| i)
            .collect();

        if let Some(sort) = &self.sort {
            // Stable: ties keep source order.
            visible.sort_by(|&a, &b| sort.compare(&self.rows[a], &self.rows[b]));
        }

        tracing::trace!(
            "{} of {} rows visible ({} active column filters)",
            visible.len(),
            self.rows.len(),
            active.len()
        );
        self.visible = visible;
    }
}

/// A column is shown unless it is a tag column absent from the last search.
/// Columns unknown to the schema are always shown.
pub fn is_column_shown(column: &str, schema: &Schema, last_searched: &FilterSet) -> bool {
    schema
        .get(column)
        .is_none_or(|c| FilterControl::for_column(c) != FilterControl::Tag)
        || last_searched.contains(column)
}

fn no_control(column: &str, control: &str) -> ExplorerError {
    ExplorerError::InvalidFilter {
        column: column.to_string(),
        reason: format!("no {control} filter on this column"),
    }
}

//----------------------------------------------------------------------------//
//                                   Tests                                    //
//----------------------------------------------------------------------------//

/// Run tests with:
/// `cargo test -- --show-output tests_column_filter`
#[cfg(test)]
mod tests_column_filter {
    use super::*;
    use crate::{ColumnKind, Criterion, Literal, row_passes, rows_from};

    fn schema() -> Schema {
        Schema::new(vec![
            ColumnSchema::new("title", ColumnKind::String),
            ColumnSchema::new("platform", ColumnKind::String)
                .with_choices(vec!["PC".into(), "Switch".into()]),
            ColumnSchema::new("bayesian_rating", ColumnKind::Float)
                .with_bounds(Some(0.0), Some(5.0)),
            ColumnSchema::binary_tag("tag_rpg"),
            ColumnSchema::binary_tag("tag_puzzle"),
            ColumnSchema::new("owned", ColumnKind::Boolean)
                .with_choices(vec![Literal::Bool(false), Literal::Bool(true)]),
        ])
    }

    fn model(last_searched: &FilterSet) -> ColumnFilterModel {
        let rows = rows_from(
            ["key", "title", "platform", "bayesian_rating", "tag_rpg", "tag_puzzle", "owned"],
            &[
                ["g1", "Dragon Quest", "Switch", "4.1", "1", "0", "true"],
                ["g2", "Portal", "PC", "4.8", "0", "1", "True"],
                ["g3", "=HYPERLINK(\"C:/g/w.lnk\",\"Wizardry\")", "pc", "", "1", "0", "false"],
                ["g4", "Tetris", "Switch", "<b>3.5</b>", "0", "1", "false"],
            ],
        );
        ColumnFilterModel::new(Arc::new(rows), &schema(), last_searched, None)
    }

    fn keys(model: &ColumnFilterModel) -> Vec<&str> {
        model
            .visible_rows()
            .filter_map(|row| row.get("key"))
            .collect()
    }

    #[test]
    fn test_strip_markup() {
        assert_eq!(strip_markup("=HYPERLINK(\"C:/a b.lnk\", \"Label\")"), "Label");
        assert_eq!(strip_markup("<span class=\"x\">4.5</span>"), "4.5");
        assert_eq!(cell_number("<b>1,234.5</b>"), Some(1234.5));
        assert_eq!(cell_number("n/a"), None);
    }

    #[test]
    fn test_visibility_rule() {
        let m = model(&FilterSet::new());
        assert!(!m.columns().contains(&"tag_rpg".to_string()));
        assert!(m.columns().contains(&"key".to_string()), "unknown columns are shown");

        let searched = FilterSet::new().with("tag_rpg", Criterion::choices([1.0]));
        let m = model(&searched);
        assert!(m.columns().contains(&"tag_rpg".to_string()));
        assert!(!m.columns().contains(&"tag_puzzle".to_string()));
        assert!(m.is_highlighted("tag_rpg"));
        assert!(!m.is_highlighted("title"));
    }

    #[test]
    fn test_default_sort_keeps_blanks_last() {
        let m = model(&FilterSet::new());
        assert_eq!(m.sort(), Some(&SortBy::new("bayesian_rating", false)));
        assert_eq!(keys(&m), vec!["g2", "g1", "g4", "g3"]);
    }

    #[test]
    fn test_checkbox_semantics() -> ExplorerResult<()> {
        let mut m = model(&FilterSet::new());
        m.toggle_choice("platform", "Switch", false)?;
        // "pc" matches the "PC" option case-insensitively.
        assert_eq!(keys(&m), vec!["g2", "g3"]);

        m.toggle_all("platform", false)?;
        assert_eq!(m.visible_count(), 0, "none checked matches nothing");

        m.toggle_all("platform", true)?;
        assert_eq!(m.visible_count(), 4);

        m.toggle_choice("owned", "false", false)?;
        assert_eq!(keys(&m), vec!["g2", "g1"]);

        assert!(m.toggle_choice("platform", "Amiga", true).is_err());
        assert!(m.toggle_choice("title", "x", true).is_err());
        Ok(())
    }

    #[test]
    fn test_blank_tag_cell_is_zero() -> ExplorerResult<()> {
        let rows = rows_from(["key", "tag_rpg"], &[["g1", "1"], ["g2", ""], ["g3", "0"]]);
        let searched = FilterSet::new().with("tag_rpg", Criterion::choices([0.0]));
        let mut m = ColumnFilterModel::new(Arc::new(rows.clone()), &schema(), &searched, None);

        m.toggle_choice("tag_rpg", "1", false)?;
        assert_eq!(keys(&m), vec!["g2", "g3"]);

        // Same answer as the pre-load evaluator.
        let preloaded: Vec<&str> = rows
            .iter()
            .filter(|row| row_passes(row, &schema(), &searched))
            .filter_map(|row| row.get("key"))
            .collect();
        assert_eq!(keys(&m), preloaded);
        Ok(())
    }

    #[test]
    fn test_range_and_text_combine() -> ExplorerResult<()> {
        let mut m = model(&FilterSet::new());
        m.set_range("bayesian_rating", Some(4.0), None)?;
        // g3 has no rating and passes.
        assert_eq!(keys(&m), vec!["g2", "g1", "g3"]);

        m.set_text("title", "WIZ")?;
        assert_eq!(keys(&m), vec!["g3"], "hyperlink cells match on their label");
        assert_eq!(m.active_filter_count(), 2);

        assert!(m.set_range("title", Some(1.0), None).is_err());
        Ok(())
    }

    #[test]
    fn test_reset_all_is_idempotent() -> ExplorerResult<()> {
        let mut m = model(&FilterSet::new());
        m.reset_all();
        assert_eq!(m.visible_count(), 4);

        m.toggle_all("platform", false)?;
        m.sort_by("title", true)?;
        m.reset_all();
        let first = keys(&m).into_iter().map(String::from).collect::<Vec<_>>();
        m.reset_all();
        assert_eq!(keys(&m), first);
        assert_eq!(first, vec!["g2", "g1", "g4", "g3"]);
        assert_eq!(m.active_filter_count(), 0);
        assert_eq!(m.sort(), Some(&SortBy::new("bayesian_rating", false)));
        Ok(())
    }

    #[test]
    fn test_sorting() -> ExplorerResult<()> {
        let mut m = model(&FilterSet::new());
        m.sort_by("title", true)?;
        assert_eq!(keys(&m), vec!["g1", "g2", "g4", "g3"]);

        assert_eq!(m.cycle_sort("title")?, HeaderSortState::NotSorted);
        assert_eq!(keys(&m), vec!["g1", "g2", "g3", "g4"]);
        assert_eq!(m.cycle_sort("title")?, HeaderSortState::Descending);
        assert_eq!(keys(&m), vec!["g3", "g4", "g2", "g1"]);

        assert!(m.sort_by("tag_rpg", true).is_err());
        Ok(())
    }

    #[test]
    fn test_pagination_bounds() -> ExplorerResult<()> {
        let mut m = model(&FilterSet::new());
        assert_eq!(m.page_length(), DEFAULT_PAGE_LENGTH);
        assert!(m.set_page_length(7).is_err());
        m.set_page_length(50)?;
        assert_eq!(m.page_count(), 1);
        assert_eq!(m.page(0).len(), 4);
        assert!(m.page(1).is_empty());

        m.toggle_all("platform", false)?;
        assert_eq!(m.page_count(), 1);
        assert!(m.page(0).is_empty());
        Ok(())
    }

    #[test]
    fn test_pages_split_rows() -> ExplorerResult<()> {
        let ratings: Vec<String> = (0..120).map(|i| format!("{i}")).collect();
        let records: Vec<[&str; 1]> = ratings.iter().map(|r| [r.as_str()]).collect();
        let rows = rows_from(["id"], &records);
        let mut m = ColumnFilterModel::new(Arc::new(rows), &Schema::default(), &FilterSet::new(), None);
        m.set_page_length(50)?;
        assert_eq!(m.page_count(), 3);
        assert_eq!(m.page(2).len(), 20);
        assert_eq!(m.page(2)[0].get("id"), Some("100"));
        Ok(())
    }

    #[test]
    fn test_thumbnails_need_key_column() -> ExplorerResult<()> {
        let index = Arc::new(ThumbnailIndex::from_json_str(
            r#"{"g1": {"thumbnail_image": "t/g1.png"}}"#,
        )?);

        let rows = rows_from(["key", "location"], &[["g1", "C:/games/g1"], ["g9", ""]]);
        let m = ColumnFilterModel::new(
            Arc::new(rows),
            &Schema::default(),
            &FilterSet::new(),
            Some(Arc::clone(&index)),
        );
        assert!(m.has_thumbnails());
        assert!(m.has_view_images());
        let rows: Vec<&Row> = m.visible_rows().collect();
        assert_eq!(
            m.thumbnail_for(rows[0]).and_then(|e| e.thumbnail_image.as_deref()),
            Some("t/g1.png")
        );
        assert_eq!(m.thumbnail_for(rows[1]), None);

        let rows = rows_from(["title"], &[["Portal"]]);
        let m = ColumnFilterModel::new(Arc::new(rows), &Schema::default(), &FilterSet::new(), Some(index));
        assert!(!m.has_thumbnails());
        assert!(!m.has_view_images());
        Ok(())
    }
}
