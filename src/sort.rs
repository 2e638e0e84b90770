//! Defines the representation of sorting criteria for the loaded table.
//! This module contains the sort criterion, the header click cycle and the
//! numeric-aware cell comparison used by `column_filter.rs`.

use crate::{Row, parse_number, strip_markup};
use std::cmp::Ordering;

/// Column sorted by default, descending, when it is displayed.
pub const DEFAULT_SORT_COLUMN: &str = "bayesian_rating";

/// Represents a single criterion for sorting.
/// Used within `ColumnFilterModel` to order the visible rows.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SortBy {
    /// The name of the column to sort by.
    pub column_name: String,
    /// The sort direction. `true` for ascending, `false` for descending.
    pub ascending: bool,
}

impl SortBy {
    pub fn new(column_name: impl Into<String>, ascending: bool) -> Self {
        SortBy {
            column_name: column_name.into(),
            ascending,
        }
    }

    /// The default order: `bayesian_rating` descending if that column is among `columns`.
    pub fn default_for<S: AsRef<str>>(columns: &[S]) -> Option<Self> {
        columns
            .iter()
            .any(|c| c.as_ref() == DEFAULT_SORT_COLUMN)
            .then(|| SortBy::new(DEFAULT_SORT_COLUMN, false))
    }

    /// Compares two rows on this criterion, honoring the direction.
    /// Blank cells stay last in both directions.
    pub fn compare(&self, a: &Row, b: &Row) -> Ordering {
        let a = a.get(&self.column_name).unwrap_or("");
        let b = b.get(&self.column_name).unwrap_or("");
        match (a.trim().is_empty(), b.trim().is_empty()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            (false, false) => {}
        }

        let ordering = compare_cells(a, b);
        if self.ascending {
            ordering
        } else {
            ordering.reverse()
        }
    }
}

/// Numeric-aware ordering of two cells.
///
/// Numbers compare by value and sort before text; text compares case-insensitively.
/// Blank cells sort after everything else in ascending order.
pub fn compare_cells(a: &str, b: &str) -> Ordering {
    let a = strip_markup(a);
    let b = strip_markup(b);

    match (a.is_empty(), b.is_empty()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (false, false) => {}
    }

    let number = |s: &str| parse_number(&s.replace(',', ""));
    match (number(&a), number(&b)) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.to_lowercase().cmp(&b.to_lowercase()),
    }
}

/// Represents the *interaction* state for sorting a specific column header.
///
/// This enum manages the click cycle: NotSorted -> Descending -> Ascending -> NotSorted.
/// The applied criterion (`Option<SortBy>`) is stored separately in `ColumnFilterModel`.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum HeaderSortState {
    /// Column is not the current sort criterion.
    NotSorted,
    Descending,
    Ascending,
}

impl HeaderSortState {
    /// The state of `column` given the applied criterion.
    pub fn of(column: &str, sort: Option<&SortBy>) -> Self {
        match sort {
            Some(s) if s.column_name == column && s.ascending => HeaderSortState::Ascending,
            Some(s) if s.column_name == column => HeaderSortState::Descending,
            _ => HeaderSortState::NotSorted,
        }
    }

    /// Calculates the next interaction state in the cycle for a header click.
    pub fn cycle_next(&self) -> Self {
        match self {
            HeaderSortState::NotSorted => HeaderSortState::Descending,
            HeaderSortState::Descending => HeaderSortState::Ascending,
            HeaderSortState::Ascending => HeaderSortState::NotSorted,
        }
    }

    /// The criterion this state applies to `column`, if any.
    pub fn to_sort_by(self, column: &str) -> Option<SortBy> {
        match self {
            HeaderSortState::NotSorted => None,
            HeaderSortState::Descending => Some(SortBy::new(column, false)),
            HeaderSortState::Ascending => Some(SortBy::new(column, true)),
        }
    }

    /// Returns a Unicode icon visually representing the interaction state.
    pub fn get_icon(&self) -> &'static str {
        match self {
            HeaderSortState::Descending => "⏷", // U+23F7
            HeaderSortState::Ascending => "⏶",  // U+23F6
            HeaderSortState::NotSorted => "↕",  // U+2195 UP DOWN ARROW
        }
    }
}

/// Run tests with:
/// `cargo test -- --show-output tests_sort`
#[cfg(test)]
mod tests_sort {
    use super::*;
    use crate::rows_from;

    #[test]
    fn test_compare_cells_is_numeric_aware() {
        assert_eq!(compare_cells("9", "10"), Ordering::Less);
        assert_eq!(compare_cells("1,200", "950"), Ordering::Greater);
        assert_eq!(compare_cells("4.5", "abc"), Ordering::Less);
        assert_eq!(compare_cells("Zelda", "ape"), Ordering::Greater);
        assert_eq!(compare_cells("", "1"), Ordering::Greater);
        assert_eq!(compare_cells("<b>3</b>", "2"), Ordering::Greater);
    }

    #[test]
    fn test_sort_by_direction() {
        let rows = rows_from(["bayesian_rating"], &[["3.9"], ["4.6"]]);
        let desc = SortBy::new("bayesian_rating", false);
        assert_eq!(desc.compare(&rows[0], &rows[1]), Ordering::Greater);
        let asc = SortBy::new("bayesian_rating", true);
        assert_eq!(asc.compare(&rows[0], &rows[1]), Ordering::Less);
    }

    #[test]
    fn test_default_sort() {
        assert_eq!(
            SortBy::default_for(&["title", "bayesian_rating"]),
            Some(SortBy::new("bayesian_rating", false))
        );
        assert_eq!(SortBy::default_for(&["title"]), None);
    }

    #[test]
    fn test_header_cycle() {
        let sort = SortBy::new("year", false);
        let state = HeaderSortState::of("year", Some(&sort));
        assert_eq!(state, HeaderSortState::Descending);
        assert_eq!(state.cycle_next(), HeaderSortState::Ascending);
        assert_eq!(state.cycle_next().cycle_next(), HeaderSortState::NotSorted);
        assert_eq!(HeaderSortState::of("title", Some(&sort)), HeaderSortState::NotSorted);
        assert_eq!(
            HeaderSortState::Ascending.to_sort_by("year"),
            Some(SortBy::new("year", true))
        );
        assert_eq!(HeaderSortState::NotSorted.get_icon(), "↕");
    }
}
