//! Raw cell values and the coercions shared by inference, pre-filters and post-load filters.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{fmt, sync::LazyLock};

/// Optional sign, digits with an optional fractional part, optional exponent.
static NUMERIC_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:\d+|\d*\.\d+)(?:[eE][+-]?\d+)?$").expect("valid numeric regex")
});

/// Leading numeric prefix of a rendered cell ("4.5 stars" -> 4.5).
static NUMERIC_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?").expect("valid prefix regex")
});

/// A typed literal: an allowed value in a schema or a checked value in a criterion.
///
/// Serialized untagged, so JSON `0`, `true` and `"Action"` map directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Literal {
    /// Numeric view of the literal. Text is parsed, booleans are not numbers.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Literal::Number(n) => Some(*n),
            Literal::Text(s) => parse_number(s),
            Literal::Bool(_) => None,
        }
    }

    /// Boolean view, using the same coercion as row values.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Literal::Bool(b) => Some(*b),
            Literal::Number(n) if *n == 1.0 => Some(true),
            Literal::Number(n) if *n == 0.0 => Some(false),
            Literal::Number(_) => None,
            Literal::Text(s) => normalize_bool(s),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Number(n) => write!(f, "{}", format_number(*n)),
            Literal::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::Text(value.to_string())
    }
}

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Literal::Number(value)
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Literal::Bool(value)
    }
}

/// Renders integral values without a fractional part: `1`, `4.5`.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Missing values become `""`, everything else is trimmed.
pub fn normalize(raw: Option<&str>) -> &str {
    raw.map(str::trim).unwrap_or("")
}

/// `true` if the whole (trimmed) text is a numeric literal.
pub fn looks_numeric(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && NUMERIC_LITERAL.is_match(value)
}

/// Strict numeric parse. Blank or non-numeric text yields `None`.
pub fn parse_number(value: &str) -> Option<f64> {
    let value = value.trim();
    if looks_numeric(value) {
        value.parse::<f64>().ok()
    } else {
        None
    }
}

/// Lenient parse of the leading number in a piece of text.
pub fn parse_float_prefix(value: &str) -> Option<f64> {
    NUMERIC_PREFIX
        .find(value.trim())
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// `true`/`True`/`1` -> true, `false`/`False`/`0` -> false, anything else -> indeterminate.
pub fn normalize_bool(value: &str) -> Option<bool> {
    match value.trim() {
        "true" | "True" | "TRUE" | "1" => Some(true),
        "false" | "False" | "FALSE" | "0" => Some(false),
        _ => None,
    }
}

//----------------------------------------------------------------------------//
//                                   Tests                                    //
//----------------------------------------------------------------------------//

/// Run tests with:
/// `cargo test -- --show-output tests_value`
#[cfg(test)]
mod tests_value {
    use super::*;

    #[test]
    fn test_numeric_literal_pattern() {
        for ok in ["1", "-2", "+3.5", ".5", "1e3", "2.5E-2", " 42 "] {
            assert!(looks_numeric(ok), "{ok} should be numeric");
        }
        for bad in ["", "abc", "1.2.3", "1,000", "0x10", "5."] {
            assert!(!looks_numeric(bad), "{bad} should not be numeric");
        }
    }

    #[test]
    fn test_parse_number_blank_is_none() {
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("   "), None);
        assert_eq!(parse_number("7"), Some(7.0));
    }

    #[test]
    fn test_parse_float_prefix() {
        assert_eq!(parse_float_prefix("4.5 stars"), Some(4.5));
        assert_eq!(parse_float_prefix("  -3"), Some(-3.0));
        assert_eq!(parse_float_prefix("n/a"), None);
    }

    #[test]
    fn test_normalize_bool() {
        assert_eq!(normalize_bool("True"), Some(true));
        assert_eq!(normalize_bool("1"), Some(true));
        assert_eq!(normalize_bool("false"), Some(false));
        assert_eq!(normalize_bool("0"), Some(false));
        assert_eq!(normalize_bool("yes"), None);
        assert_eq!(Literal::Number(1.0).as_bool(), Some(true));
        assert_eq!(Literal::Text("False".into()).as_bool(), Some(false));
    }

    #[test]
    fn test_literal_json_shape() -> Result<(), serde_json::Error> {
        let values: Vec<Literal> = serde_json::from_str(r#"[0, 1.5, true, "Action"]"#)?;
        assert_eq!(
            values,
            vec![
                Literal::Number(0.0),
                Literal::Number(1.5),
                Literal::Bool(true),
                Literal::Text("Action".into())
            ]
        );
        assert_eq!(Literal::Number(1.0).to_string(), "1");
        assert_eq!(Literal::Number(4.5).to_string(), "4.5");
        Ok(())
    }
}
