//! Filter criteria and the row-level predicate evaluator.
//!
//! A `FilterSet` maps column names to one `Criterion` each. A row passes when it
//! passes every criterion whose column is known to the schema.

use crate::{
    ColumnKind, ColumnSchema, ExplorerError, Literal, Row, Schema, format_number, normalize,
    normalize_bool, parse_number,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Numeric bounds, both inclusive and both optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RangeCriterion {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl RangeCriterion {
    pub fn contains(&self, n: f64) -> bool {
        self.min.is_none_or(|min| n >= min) && self.max.is_none_or(|max| n <= max)
    }
}

/// A set of accepted literals. Empty means "user deselected everything".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChoiceCriterion {
    pub choices: Vec<Literal>,
}

/// Search terms, OR-ed together, matched as case-insensitive substrings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextCriterion {
    pub terms: Vec<String>,
}

/// One column's constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CriterionDocument", into = "CriterionDocument")]
pub enum Criterion {
    Range(RangeCriterion),
    Choice(ChoiceCriterion),
    Text(TextCriterion),
}

impl Criterion {
    pub fn range(min: Option<f64>, max: Option<f64>) -> Self {
        Criterion::Range(RangeCriterion { min, max })
    }

    pub fn choices<I, L>(choices: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<Literal>,
    {
        Criterion::Choice(ChoiceCriterion {
            choices: choices.into_iter().map(Into::into).collect(),
        })
    }

    pub fn text<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Criterion::Text(TextCriterion {
            terms: terms.into_iter().map(Into::into).collect(),
        })
    }

    /// Decides whether one (already normalized) value passes this criterion.
    ///
    /// Blank numeric values read as 0. Unparsable values are never excluded by
    /// numeric bounds or boolean choices. An empty choice list excludes everything.
    pub fn admits(&self, column: &ColumnSchema, value: &str) -> bool {
        match self {
            Criterion::Range(range) => {
                if !column.kind.is_numeric() {
                    return true;
                }
                match blank_as_zero(value) {
                    Some(n) => range.contains(n),
                    None => true,
                }
            }
            Criterion::Choice(ChoiceCriterion { choices }) => {
                if choices.is_empty() {
                    return false;
                }
                match column.kind {
                    ColumnKind::Integer | ColumnKind::Float => match blank_as_zero(value) {
                        Some(n) => choices.iter().any(|c| c.as_number() == Some(n)),
                        None => true,
                    },
                    ColumnKind::BinaryTag => blank_as_zero(value)
                        .is_some_and(|n| choices.iter().any(|c| c.as_number() == Some(n))),
                    ColumnKind::Boolean => match normalize_bool(value) {
                        Some(b) => choices.iter().any(|c| c.as_bool() == Some(b)),
                        None => true,
                    },
                    ColumnKind::String => choices.iter().any(|c| literal_matches(c, value)),
                }
            }
            Criterion::Text(TextCriterion { terms }) => {
                if terms.is_empty() {
                    return true;
                }
                let haystack = value.to_lowercase();
                terms
                    .iter()
                    .any(|term| haystack.contains(&term.to_lowercase()))
            }
        }
    }

    /// Short description used by summaries and logs: `min=3, max=7`, `0, 1`, `dragon`.
    pub fn describe(&self) -> String {
        match self {
            Criterion::Range(RangeCriterion { min, max }) => {
                let mut parts = Vec::new();
                if let Some(min) = min {
                    parts.push(format!("min={}", format_number(*min)));
                }
                if let Some(max) = max {
                    parts.push(format!("max={}", format_number(*max)));
                }
                parts.join(", ")
            }
            Criterion::Choice(ChoiceCriterion { choices }) => choices
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
            Criterion::Text(TextCriterion { terms }) => terms.join(", "),
        }
    }
}

/// Numeric reading of a cell where a blank counts as 0.
pub fn blank_as_zero(value: &str) -> Option<f64> {
    if value.trim().is_empty() {
        Some(0.0)
    } else {
        parse_number(value)
    }
}

fn literal_matches(literal: &Literal, value: &str) -> bool {
    match literal {
        Literal::Text(s) => s == value,
        Literal::Number(n) => parse_number(value) == Some(*n),
        Literal::Bool(b) => normalize_bool(value) == Some(*b),
    }
}

/// Wire shape of a criterion: `{min, max}`, `{choices}` or `{text}`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CriterionDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    choices: Option<Vec<Literal>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<Vec<String>>,
}

impl TryFrom<CriterionDocument> for Criterion {
    type Error = String;

    fn try_from(doc: CriterionDocument) -> Result<Self, Self::Error> {
        let has_bounds = doc.min.is_some() || doc.max.is_some();
        match (has_bounds, doc.choices, doc.text) {
            (false, None, Some(terms)) => Ok(Criterion::text(terms)),
            (false, Some(choices), None) => Ok(Criterion::Choice(ChoiceCriterion { choices })),
            (true, None, None) => Ok(Criterion::range(doc.min, doc.max)),
            (false, None, None) => Err("criterion has no min, max, choices or text".to_string()),
            _ => Err("criterion mixes bounds, choices and text".to_string()),
        }
    }
}

impl From<Criterion> for CriterionDocument {
    fn from(criterion: Criterion) -> Self {
        match criterion {
            Criterion::Range(RangeCriterion { min, max }) => CriterionDocument {
                min,
                max,
                ..Default::default()
            },
            Criterion::Choice(ChoiceCriterion { choices }) => CriterionDocument {
                choices: Some(choices),
                ..Default::default()
            },
            Criterion::Text(TextCriterion { terms }) => CriterionDocument {
                text: Some(terms),
                ..Default::default()
            },
        }
    }
}

/// Column name -> criterion. Unset columns are unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterSet(BTreeMap<String, Criterion>);

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the criterion of a column.
    pub fn insert(&mut self, column: impl Into<String>, criterion: Criterion) {
        self.0.insert(column.into(), criterion);
    }

    pub fn with(mut self, column: impl Into<String>, criterion: Criterion) -> Self {
        self.insert(column, criterion);
        self
    }

    pub fn get(&self, column: &str) -> Option<&Criterion> {
        self.0.get(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.0.contains_key(column)
    }

    pub fn remove(&mut self, column: &str) -> Option<Criterion> {
        self.0.remove(column)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Criterion)> {
        self.0.iter()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn from_json_str(text: &str) -> Result<Self, ExplorerError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json_string(&self) -> Result<String, ExplorerError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// `true` when the row passes every criterion of the set (logical AND across columns).
///
/// An empty set, and criteria on columns the schema does not know, always pass.
pub fn row_passes(row: &Row, schema: &Schema, filter_set: &FilterSet) -> bool {
    filter_set.iter().all(|(column, criterion)| {
        let Some(definition) = schema.get(column) else {
            return true;
        };
        criterion.admits(definition, normalize(row.get(column)))
    })
}

//----------------------------------------------------------------------------//
//                                   Tests                                    //
//----------------------------------------------------------------------------//

/// Run tests with:
/// `cargo test -- --show-output tests_predicate`
#[cfg(test)]
mod tests_predicate {
    use super::*;
    use crate::{ExplorerResult, rows_from};

    fn catalog_schema() -> Schema {
        Schema::new(vec![
            ColumnSchema::new("players", ColumnKind::Integer).with_bounds(Some(1.0), Some(8.0)),
            ColumnSchema::new("rating", ColumnKind::Float).with_bounds(Some(0.0), Some(5.0)),
            ColumnSchema::binary_tag("tag_x"),
            ColumnSchema::new("owned", ColumnKind::Boolean)
                .with_choices(vec![Literal::Bool(false), Literal::Bool(true)]),
            ColumnSchema::new("platform", ColumnKind::String)
                .with_choices(vec!["PC".into(), "Switch".into()]),
            ColumnSchema::new("desc", ColumnKind::String),
        ])
    }

    fn row(players: &str, tag: &str, owned: &str, platform: &str, desc: &str) -> Row {
        rows_from(
            ["players", "rating", "tag_x", "owned", "platform", "desc"],
            &[[players, "4.0", tag, owned, platform, desc]],
        )
        .remove(0)
    }

    #[test]
    fn test_empty_filter_set_is_vacuously_true() {
        let schema = catalog_schema();
        for r in [
            row("1", "0", "true", "PC", "x"),
            row("", "", "", "", ""),
            row("abc", "7", "maybe", "Amiga", "zzz"),
        ] {
            assert!(row_passes(&r, &schema, &FilterSet::new()));
        }
    }

    #[test]
    fn test_numeric_bounds_fail_open() {
        let schema = catalog_schema();
        let filters = FilterSet::new().with("players", Criterion::range(Some(3.0), Some(7.0)));
        assert!(!row_passes(&row("10", "0", "", "", ""), &schema, &filters));
        assert!(row_passes(&row("5", "0", "", "", ""), &schema, &filters));
        assert!(row_passes(&row("abc", "0", "", "", ""), &schema, &filters));
        assert!(row_passes(&row("3", "0", "", "", ""), &schema, &filters));
        assert!(row_passes(&row("7", "0", "", "", ""), &schema, &filters));
    }

    #[test]
    fn test_blank_numeric_cell_reads_as_zero() {
        let schema = catalog_schema();
        let at_least_three = FilterSet::new().with("players", Criterion::range(Some(3.0), None));
        assert!(!row_passes(&row("", "0", "", "", ""), &schema, &at_least_three));
        assert!(row_passes(&row("5", "0", "", "", ""), &schema, &at_least_three));

        let at_most_two = FilterSet::new().with("players", Criterion::range(None, Some(2.0)));
        assert!(row_passes(&row("", "0", "", "", ""), &schema, &at_most_two));

        let zero_or_four = FilterSet::new().with("players", Criterion::choices([0.0, 4.0]));
        assert!(row_passes(&row(" ", "0", "", "", ""), &schema, &zero_or_four));
        assert!(!row_passes(&row("2", "0", "", "", ""), &schema, &zero_or_four));
    }

    #[test]
    fn test_empty_choice_list_rejects_every_kind() {
        let schema = catalog_schema();
        let r = row("5", "1", "true", "PC", "A Wizard's Tale");
        for column in ["players", "rating", "tag_x", "owned", "platform", "desc"] {
            let filters = FilterSet::new().with(column, Criterion::choices(Vec::<Literal>::new()));
            assert!(!row_passes(&r, &schema, &filters), "{column} should reject");
        }
    }

    #[test]
    fn test_tag_and_boolean_choices() {
        let schema = catalog_schema();
        let only_tagged = FilterSet::new().with("tag_x", Criterion::choices([1.0]));
        assert!(row_passes(&row("1", "1", "", "", ""), &schema, &only_tagged));
        assert!(!row_passes(&row("1", "0", "", "", ""), &schema, &only_tagged));
        assert!(!row_passes(&row("1", "", "", "", ""), &schema, &only_tagged));

        let owned = FilterSet::new().with("owned", Criterion::choices([true]));
        assert!(row_passes(&row("1", "0", "True", "", ""), &schema, &owned));
        assert!(row_passes(&row("1", "0", "1", "", ""), &schema, &owned));
        assert!(!row_passes(&row("1", "0", "false", "", ""), &schema, &owned));
        // Indeterminate booleans are not excluded.
        assert!(row_passes(&row("1", "0", "unknown", "", ""), &schema, &owned));
    }

    #[test]
    fn test_generic_choice_membership() {
        let schema = catalog_schema();
        let filters = FilterSet::new().with("platform", Criterion::choices(["Switch"]));
        assert!(row_passes(&row("1", "0", "", " Switch ", ""), &schema, &filters));
        assert!(!row_passes(&row("1", "0", "", "PC", ""), &schema, &filters));
    }

    #[test]
    fn test_text_terms_are_or_and_case_insensitive() {
        let schema = catalog_schema();
        let filters = FilterSet::new().with("desc", Criterion::text(["dragon", "wizard"]));
        assert!(row_passes(&row("1", "0", "", "", "A Wizard's Tale"), &schema, &filters));
        assert!(row_passes(&row("1", "0", "", "", "DRAGON quest"), &schema, &filters));
        assert!(!row_passes(&row("1", "0", "", "", "Space Trader"), &schema, &filters));
    }

    #[test]
    fn test_columns_combine_with_and() {
        let schema = catalog_schema();
        let filters = FilterSet::new()
            .with("players", Criterion::range(Some(2.0), None))
            .with("platform", Criterion::choices(["PC"]));
        assert!(row_passes(&row("4", "0", "", "PC", ""), &schema, &filters));
        assert!(!row_passes(&row("1", "0", "", "PC", ""), &schema, &filters));
        assert!(!row_passes(&row("4", "0", "", "Switch", ""), &schema, &filters));
    }

    #[test]
    fn test_unknown_column_passes() {
        let schema = catalog_schema();
        let filters = FilterSet::new().with("nope", Criterion::choices(Vec::<Literal>::new()));
        assert!(row_passes(&row("1", "0", "", "", ""), &schema, &filters));
    }

    #[test]
    fn test_filter_set_json_shape() -> ExplorerResult<()> {
        let filters = FilterSet::from_json_str(
            r#"{"rating": {"min": 3}, "tag_x": {"choices": [0, 1]}, "desc": {"text": ["dragon"]}}"#,
        )?;
        assert_eq!(filters.get("rating"), Some(&Criterion::range(Some(3.0), None)));
        assert_eq!(filters.get("tag_x"), Some(&Criterion::choices([0.0, 1.0])));
        assert_eq!(filters.get("desc"), Some(&Criterion::text(["dragon"])));

        let again = FilterSet::from_json_str(&filters.to_json_string()?)?;
        assert_eq!(again, filters);

        assert!(FilterSet::from_json_str(r#"{"a": {}}"#).is_err());
        assert!(FilterSet::from_json_str(r#"{"a": {"min": 1, "text": ["x"]}}"#).is_err());
        Ok(())
    }
}
