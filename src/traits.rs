//! General utility traits shared across the crate.
//!
//! `PathExtension` is used by `file_extension.rs` for input-type detection and
//! `UniqueElements` by `schema.rs` to collect distinct values in first-seen order.

use std::{collections::HashSet, ffi::OsStr, hash::Hash, path::Path};

/// Trait to extend `Path` with a convenient method for getting the lowercase file extension.
pub trait PathExtension {
    /// Returns the file extension as a lowercase `String`, or `None`.
    fn extension_as_lowercase(&self) -> Option<String>;
}

impl PathExtension for Path {
    fn extension_as_lowercase(&self) -> Option<String> {
        self.extension() // Get OsStr extension.
            .and_then(OsStr::to_str) // Try converting to &str.
            .map(str::to_lowercase) // Convert to lowercase String if successful.
    }
}

/// A trait for deduplicating vectors while preserving the original order of elements.
pub trait UniqueElements<T> {
    /// Removes duplicate elements in place, keeping the first occurrence.
    fn unique(&mut self)
    where
        T: Eq + Hash + Clone;
}

impl<T> UniqueElements<T> for Vec<T> {
    fn unique(&mut self)
    where
        T: Eq + Hash + Clone, // Constraints required for HashSet.
    {
        let mut seen = HashSet::new();
        // Keep an element only the first time `insert` sees it.
        self.retain(|x| seen.insert(x.clone()));
    }
}

// --- Unit Tests ---

#[cfg(test)]
mod tests_path_extension {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_extension_as_lowercase_some() {
        let path = PathBuf::from("game_data.CSV");
        assert_eq!(path.extension_as_lowercase(), Some("csv".to_string()));
    }

    #[test]
    fn test_extension_as_lowercase_none() {
        let path = PathBuf::from("game_data");
        assert_eq!(path.extension_as_lowercase(), None);
    }

    #[test]
    fn test_extension_as_lowercase_multiple_dots() {
        let path = PathBuf::from("tag.full.patterns.Json");
        assert_eq!(path.extension_as_lowercase(), Some("json".to_string()));
    }
}
