use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::compile::SassImport;

/// In-memory memo of compiled stylesheets, keyed by a digest of the source
/// and its import table. Nothing is written to disk.
#[derive(Debug, Default)]
pub struct CompileCache {
    entries: Mutex<HashMap<String, String>>,
}

impl CompileCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compute_hash(source: &str, imports: &[SassImport]) -> String {
        let mut hasher = Sha256::new();
        // Length prefixes keep ("ab", "c") and ("a", "bc") apart.
        for part in std::iter::once(source).chain(
            imports
                .iter()
                .flat_map(|import| [import.filename.as_str(), import.content.as_str()]),
        ) {
            hasher.update((part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    pub fn set(&self, key: String, css: String) {
        self.entries.lock().insert(key, css);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_depends_on_imports() {
        let source = "@import 'theme'; .x{color:$c}";
        let red = [SassImport::new("theme.scss", "$c: red;")];
        let blue = [SassImport::new("theme.scss", "$c: blue;")];

        assert_eq!(
            CompileCache::compute_hash(source, &red),
            CompileCache::compute_hash(source, &red)
        );
        assert_ne!(
            CompileCache::compute_hash(source, &red),
            CompileCache::compute_hash(source, &blue)
        );
        assert_ne!(
            CompileCache::compute_hash(source, &red),
            CompileCache::compute_hash(source, &[])
        );
    }

    #[test]
    fn test_hash_separates_boundaries() {
        let a = [SassImport::new("ab", "c")];
        let b = [SassImport::new("a", "bc")];
        assert_ne!(
            CompileCache::compute_hash("", &a),
            CompileCache::compute_hash("", &b)
        );
    }

    #[test]
    fn test_get_set_clear() {
        let cache = CompileCache::new();
        let key = CompileCache::compute_hash(".a{b:c}", &[]);
        assert_eq!(cache.get(&key), None);

        cache.set(key.clone(), ".a{b:c}".to_string());
        assert_eq!(cache.get(&key).as_deref(), Some(".a{b:c}"));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }
}
