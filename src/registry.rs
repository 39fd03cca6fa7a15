//! Style Registry
//!
//! Per-render store of `class → snippet`, kept in insertion order so the
//! page stylesheet comes out in the order components asked for styles.

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::Result;
use crate::hash::hash_str;
use crate::words::WordAssigner;

/// One registered style, borrowed from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleEntry<'a> {
    pub class_name: &'a str,
    pub snippet: &'a str,
}

#[derive(Debug, Default, Clone)]
pub struct StyleRegistry {
    entries: IndexMap<String, String>,
}

impl StyleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a snippet and return its class name.
    ///
    /// An empty snippet is a no-op and yields an empty class. A snippet whose
    /// class is already registered is not appended again.
    pub fn register(&mut self, snippet: &str, words: Option<&WordAssigner>) -> Result<String> {
        if snippet.is_empty() {
            return Ok(String::new());
        }

        let mut class_name = hash_str(snippet);
        if let Some(words) = words {
            class_name = words.assign(&class_name)?;
        }

        if !self.entries.contains_key(&class_name) {
            self.entries.insert(class_name.clone(), snippet.to_string());
        }

        Ok(class_name)
    }

    /// Render every entry as `.class{snippet}` in insertion order.
    pub fn flush(&self) -> String {
        let mut source = String::new();
        for (class_name, snippet) in &self.entries {
            source.push('.');
            source.push_str(class_name);
            source.push('{');
            source.push_str(snippet);
            source.push('}');
        }
        source.trim().to_string()
    }

    pub fn entries(&self) -> impl Iterator<Item = StyleEntry<'_>> {
        self.entries.iter().map(|(class_name, snippet)| StyleEntry {
            class_name,
            snippet,
        })
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.entries.contains_key(class_name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
