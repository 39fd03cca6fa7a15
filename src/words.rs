//! Word Assigner
//!
//! Swaps opaque hashed identifiers for readable words from a site vocabulary.
//!
//! ## Assignment Invariants
//!
//! 1. **Stable**: an identifier seen before always gets its cached word back.
//! 2. **Unique**: a word leaves the pool when assigned, so two identifiers never
//!    share one.
//! 3. **Keyed draw**: the first time an identifier is seen, a ChaCha8 stream
//!    keyed by `SHA-256(seed ‖ 0x00 ‖ identifier)` picks an index into the
//!    *remaining* pool. Given the same vocabulary, seed and first-seen order the
//!    result is identical across runs and platforms.
//! 4. **Atomic**: lookup, draw and removal happen under one lock.
//! 5. **Exhaustion**: once the pool is empty, new identifiers fail with
//!    `VocabularyExhausted` instead of recycling a word.

use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::error::{Result, StyleError};

// ═══════════════════════════════════════════════════════════════════════════════
// VOCABULARY
// ═══════════════════════════════════════════════════════════════════════════════

/// Normalized, deduplicated word list plus the seed that keys every draw.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordVocabulary {
    words: Vec<String>,
    seed: String,
}

impl WordVocabulary {
    /// Normalize raw caller words. Order of first occurrence is kept; it
    /// matters because draws index into the pool.
    pub fn new<I, S>(raw_words: I, seed: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut words: Vec<String> = Vec::new();
        for raw in raw_words {
            let Some(word) = normalize_word(raw.as_ref()) else {
                continue;
            };
            if !words.contains(&word) {
                words.push(word);
            }
        }

        Self {
            words,
            seed: seed.into(),
        }
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn seed(&self) -> &str {
        &self.seed
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Trim, lowercase and hyphenate spaces. `None` for blank input.
pub fn normalize_word(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_lowercase().replace(' ', "-"))
}

// ═══════════════════════════════════════════════════════════════════════════════
// ASSIGNER
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
struct Assignments {
    available: Vec<String>,
    cache: HashMap<String, String>,
}

/// Process-wide word assignment service. Share it with `Arc` across every
/// scope that should see the same class words.
#[derive(Debug)]
pub struct WordAssigner {
    seed: String,
    vocabulary: usize,
    state: Mutex<Assignments>,
}

impl WordAssigner {
    pub fn new(vocabulary: WordVocabulary) -> Self {
        let WordVocabulary { words, seed } = vocabulary;
        Self {
            seed,
            vocabulary: words.len(),
            state: Mutex::new(Assignments {
                available: words,
                cache: HashMap::new(),
            }),
        }
    }

    /// Returns the word for `identifier`, drawing a new one on first sight.
    pub fn assign(&self, identifier: &str) -> Result<String> {
        let mut state = self.state.lock();

        if let Some(word) = state.cache.get(identifier) {
            return Ok(word.clone());
        }

        if state.available.is_empty() {
            tracing::warn!(
                identifier,
                vocabulary = self.vocabulary,
                "word vocabulary exhausted"
            );
            return Err(StyleError::VocabularyExhausted {
                vocabulary: self.vocabulary,
            });
        }

        let mut rng = ChaCha8Rng::seed_from_u64(draw_key(&self.seed, identifier));
        // Sample as u64 so the index does not depend on the platform's usize.
        let index = rng.gen_range(0..state.available.len() as u64) as usize;
        let word = state.available.remove(index);
        state.cache.insert(identifier.to_string(), word.clone());

        tracing::trace!(identifier, word = %word, remaining = state.available.len(), "assigned class word");
        Ok(word)
    }

    /// Cached word for `identifier`, without drawing.
    pub fn lookup(&self, identifier: &str) -> Option<String> {
        self.state.lock().cache.get(identifier).cloned()
    }

    pub fn assigned(&self) -> usize {
        self.state.lock().cache.len()
    }

    pub fn remaining(&self) -> usize {
        self.state.lock().available.len()
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary
    }
}

fn draw_key(seed: &str, identifier: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    hasher.update([0u8]);
    hasher.update(identifier.as_bytes());
    let digest = hasher.finalize();

    let mut key = [0u8; 8];
    key.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(key)
}
