//! Schema Model: per-column kind, bounds and allowed values.
//!
//! A `Schema` is either parsed from a schema document or inferred once from the
//! first fully parsed dataset. It is never edited in place: a new load replaces it.

use crate::{
    ExplorerError, ExplorerResult, Literal, Row, UniqueElements, looks_numeric,
};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::fmt;

/// Distinct string values above this count make a column free-text.
pub const STRING_CHOICE_LIMIT: usize = 20;

/// Columns whose bounds are pinned to `[0, 5]` whatever the data says.
pub const RATING_COLUMNS: [&str; 2] = ["bayesian_rating", "site_rating"];

/// The data kind of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    Integer,
    Float,
    /// A 0/1 indicator.
    BinaryTag,
    Boolean,
    String,
}

impl ColumnKind {
    /// Parses the `type` field of a schema document.
    pub fn from_type_name(name: &str) -> Option<Self> {
        match name {
            "int" => Some(ColumnKind::Integer),
            "float" => Some(ColumnKind::Float),
            "tag" => Some(ColumnKind::BinaryTag),
            "bool" => Some(ColumnKind::Boolean),
            "str" => Some(ColumnKind::String),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ColumnKind::Integer => "int",
            ColumnKind::Float => "float",
            ColumnKind::BinaryTag => "tag",
            ColumnKind::Boolean => "bool",
            ColumnKind::String => "str",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnKind::Integer | ColumnKind::Float)
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Type and shape metadata for one column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSchema {
    pub name: String,
    pub kind: ColumnKind,
    /// Permitted values, in display order. Empty means free-form.
    pub allowed_values: Vec<Literal>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        ColumnSchema {
            name: name.into(),
            kind,
            allowed_values: Vec::new(),
            min: None,
            max: None,
        }
    }

    /// A 0/1 column with its fixed choices and bounds.
    pub fn binary_tag(name: impl Into<String>) -> Self {
        ColumnSchema {
            allowed_values: vec![Literal::Number(0.0), Literal::Number(1.0)],
            min: Some(0.0),
            max: Some(1.0),
            ..ColumnSchema::new(name, ColumnKind::BinaryTag)
        }
    }

    pub fn with_choices(mut self, choices: Vec<Literal>) -> Self {
        self.allowed_values = choices;
        self
    }

    pub fn with_bounds(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn has_choices(&self) -> bool {
        !self.allowed_values.is_empty()
    }
}

/// One entry of a schema document: `{type, choices?, min?, max?}`.
#[derive(Debug, Deserialize)]
struct ColumnDocument {
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default)]
    choices: Option<Vec<Literal>>,
    #[serde(default)]
    min: Option<f64>,
    #[serde(default)]
    max: Option<f64>,
}

/// Column name -> `ColumnSchema`, in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    columns: Vec<ColumnSchema>,
}

impl Schema {
    pub fn new(columns: Vec<ColumnSchema>) -> Self {
        Schema { columns }
    }

    pub fn get(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn columns(&self) -> &[ColumnSchema] {
        &self.columns
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Parses a schema document. An empty object yields an empty schema ("no schema").
    pub fn from_json_str(text: &str) -> ExplorerResult<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_json_value(value)
    }

    pub fn from_json_value(value: Value) -> ExplorerResult<Self> {
        let Value::Object(map) = value else {
            return Err(ExplorerError::InvalidSchema(
                "expected an object mapping column names to definitions".to_string(),
            ));
        };

        let mut columns = Vec::with_capacity(map.len());
        for (name, definition) in map {
            let doc: ColumnDocument = serde_json::from_value(definition).map_err(|e| {
                ExplorerError::InvalidSchema(format!("column '{name}': {e}"))
            })?;

            let kind = ColumnKind::from_type_name(&doc.type_name).ok_or_else(|| {
                ExplorerError::InvalidSchema(format!(
                    "column '{name}': unknown type '{}' (expected int, float, bool, tag or str)",
                    doc.type_name
                ))
            })?;

            let column = match kind {
                ColumnKind::BinaryTag => {
                    let mut column = ColumnSchema::binary_tag(name);
                    if let Some(choices) = doc.choices.filter(|c| !c.is_empty()) {
                        column.allowed_values = choices;
                    }
                    column
                }
                _ => ColumnSchema::new(name, kind)
                    .with_choices(doc.choices.unwrap_or_default())
                    .with_bounds(doc.min, doc.max),
            };
            columns.push(column);
        }

        tracing::debug!("Parsed schema document with {} columns", columns.len());
        Ok(Schema { columns })
    }

    /// Renders the schema in the same document shape it is read from.
    pub fn to_json_value(&self) -> Value {
        let mut map = Map::new();
        for column in &self.columns {
            let mut entry = Map::new();
            entry.insert("type".into(), json!(column.kind.type_name()));
            let choices: Vec<Value> = column
                .allowed_values
                .iter()
                .map(|literal| match literal {
                    Literal::Bool(b) => json!(b),
                    Literal::Number(n) => json_number(*n),
                    Literal::Text(s) => json!(s),
                })
                .collect();
            entry.insert("choices".into(), Value::Array(choices));
            if let Some(min) = column.min {
                entry.insert("min".into(), json_number(min));
            }
            if let Some(max) = column.max {
                entry.insert("max".into(), json_number(max));
            }
            map.insert(column.name.clone(), Value::Object(entry));
        }
        Value::Object(map)
    }
}

/// Integral values within the exact `i64` range render without a fraction.
fn json_number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        json!(n as i64)
    } else {
        json!(n)
    }
}

/// Infers a schema from parsed rows.
///
/// The column set comes from the first row's keys; every row is scanned for values.
/// Returns `None` for an empty row sequence.
pub fn infer_schema(rows: &[Row]) -> Option<Schema> {
    let first = rows.first()?;

    let mut columns: Vec<ColumnSchema> = first
        .keys()
        .iter()
        .map(|name| infer_column(name, rows))
        .collect();

    for column in columns
        .iter_mut()
        .filter(|c| RATING_COLUMNS.contains(&c.name.as_str()))
    {
        column.min = Some(0.0);
        column.max = Some(5.0);
    }

    tracing::debug!(
        "Inferred schema for {} columns from {} rows",
        columns.len(),
        rows.len()
    );
    Some(Schema::new(columns))
}

fn infer_column(name: &str, rows: &[Row]) -> ColumnSchema {
    let values: Vec<&str> = rows
        .iter()
        .filter_map(|row| row.get(name))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect();

    if values.is_empty() {
        return ColumnSchema::new(name, ColumnKind::String);
    }

    // Overflowing literals such as `1e400` do not make a numeric column.
    let numbers: Option<Vec<f64>> = values
        .iter()
        .map(|v| {
            looks_numeric(v)
                .then(|| v.parse::<f64>().ok())
                .flatten()
                .filter(|n| n.is_finite())
        })
        .collect();

    if let Some(numbers) = numbers {
        // Numeric-tag check precedes generic numeric.
        if numbers.iter().all(|&n| n == 0.0 || n == 1.0) {
            return ColumnSchema::binary_tag(name);
        }

        let all_integral = numbers.iter().all(|n| n.fract() == 0.0);
        let min = numbers.iter().copied().fold(f64::INFINITY, f64::min);
        let max = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let kind = if all_integral {
            ColumnKind::Integer
        } else {
            ColumnKind::Float
        };
        return ColumnSchema::new(name, kind).with_bounds(Some(min), Some(max));
    }

    // Boolean-string check precedes generic string.
    if values
        .iter()
        .all(|v| v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("false"))
    {
        return ColumnSchema::new(name, ColumnKind::Boolean)
            .with_choices(vec![Literal::Bool(false), Literal::Bool(true)]);
    }

    let mut distinct: Vec<&str> = values;
    distinct.unique();
    let choices = if distinct.len() <= STRING_CHOICE_LIMIT {
        distinct.into_iter().map(Literal::from).collect()
    } else {
        Vec::new()
    };
    ColumnSchema::new(name, ColumnKind::String).with_choices(choices)
}

//----------------------------------------------------------------------------//
//                                   Tests                                    //
//----------------------------------------------------------------------------//
