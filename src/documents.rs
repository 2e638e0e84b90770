//! Optional side documents: tag patterns and the thumbnail gallery.

use crate::{ExplorerError, ExplorerResult, FileExtension};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::Path,
};

/// Column name -> pattern text describing how the tag was assigned.
///
/// Display only: patterns feed tooltips and the filter-panel search box, never the data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagPatterns(BTreeMap<String, String>);

impl TagPatterns {
    pub fn from_json_str(text: &str) -> ExplorerResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_path(path: &Path) -> ExplorerResult<Self> {
        Self::from_json_str(&read_json_document(path)?)
    }

    pub fn pattern(&self, column: &str) -> Option<&str> {
        self.0.get(column).map(String::as_str)
    }

    pub fn insert(&mut self, column: impl Into<String>, pattern: impl Into<String>) {
        self.0.insert(column.into(), pattern.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Images attached to one catalog entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThumbnailEntry {
    #[serde(default)]
    pub thumbnail_image: Option<String>,
    #[serde(default)]
    pub preview_images: Vec<String>,
}

/// Row key -> images. Rows are matched through the `key` column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThumbnailIndex(HashMap<String, ThumbnailEntry>);

impl ThumbnailIndex {
    pub fn from_json_str(text: &str) -> ExplorerResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_path(path: &Path) -> ExplorerResult<Self> {
        Self::from_json_str(&read_json_document(path)?)
    }

    pub fn get(&self, key: &str) -> Option<&ThumbnailEntry> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Reads a `.json` document, rejecting other file types and missing files.
pub fn read_json_document(path: &Path) -> ExplorerResult<String> {
    match FileExtension::from_path(path) {
        FileExtension::Json => {}
        other => {
            return Err(ExplorerError::FileType(format!(
                "expected a JSON file, got {other} for `{}`",
                path.display()
            )));
        }
    }

    if !path.is_file() {
        return Err(ExplorerError::FileNotFound(path.to_path_buf()));
    }

    tracing::debug!("Reading JSON document: {}", path.display());
    Ok(fs::read_to_string(path)?)
}
