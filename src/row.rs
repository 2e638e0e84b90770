//! Parsed records: a shared header plus one value per column.

use std::{collections::HashMap, sync::Arc};

/// Column names of a source, with a name -> position index.
#[derive(Debug, Default, PartialEq)]
pub struct Header {
    names: Vec<String>,
    positions: HashMap<String, usize>,
}

impl Header {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let mut positions = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            // Duplicate headers: the first occurrence wins.
            positions.entry(name.clone()).or_insert(i);
        }
        Header { names, positions }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.positions.get(column).copied()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.positions.contains_key(column)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// One immutable record. Rows of the same source share their `Header`.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    header: Arc<Header>,
    values: Vec<String>,
}

impl Row {
    pub fn new(header: Arc<Header>, values: Vec<String>) -> Self {
        Row { header, values }
    }

    /// Raw value of a column. `None` when the column is unknown or the record was short.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.header
            .position(column)
            .and_then(|i| self.values.get(i))
            .map(String::as_str)
    }

    /// Column names, in source order.
    pub fn keys(&self) -> &[String] {
        self.header.names()
    }

    pub fn header(&self) -> &Arc<Header> {
        &self.header
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }
}

/// Builds rows from string tables. Handy for tests and small in-memory datasets.
pub fn rows_from<const N: usize>(names: [&str; N], records: &[[&str; N]]) -> Vec<Row> {
    let header = Arc::new(Header::new(names));
    records
        .iter()
        .map(|record| {
            Row::new(
                Arc::clone(&header),
                record.iter().map(|s| s.to_string()).collect(),
            )
        })
        .collect()
}
