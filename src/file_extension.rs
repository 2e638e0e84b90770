use crate::PathExtension;
use std::{fmt, path::Path};

/// Represents the extension of an input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileExtension {
    /// CSV data source.
    Csv,
    /// JSON side document (schema, tag patterns, thumbnails, saved filters).
    Json,
    /// Unknown file extension, storing the extension as a string.
    Unknown(String),
    /// Missing file extension, when no extension is present in the path.
    Missing,
}

impl FileExtension {
    /// Determines the file extension from a given path.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension_as_lowercase()
            .as_deref() // Converts `Option<String>` to `Option<&str>` for matching.
        {
            Some("csv") => FileExtension::Csv,
            Some("json") => FileExtension::Json,
            Some(ext) => FileExtension::Unknown(ext.to_owned()),
            None => FileExtension::Missing,
        }
    }
}

impl fmt::Display for FileExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileExtension::Csv => f.write_str("`.csv`"),
            FileExtension::Json => f.write_str("`.json`"),
            FileExtension::Unknown(ext) => write!(f, "`.{ext}`"),
            FileExtension::Missing => f.write_str("no extension"),
        }
    }
}
