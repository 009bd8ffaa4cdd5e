//! Word/id vocabulary shared by both sides of the bitext.
//!
//! Ids are dense, assigned in first-insertion order, and never reused. The
//! vocabulary is append-only: once a word has an id, that id is stable for
//! the life of the process. Queries may introduce unseen words concurrently,
//! so `add` must be atomic with respect to readers. Ids assigned after index
//! construction cannot occur in the corpus, which is exactly what makes an
//! out-of-vocabulary query word resolve to an empty suffix-array range.
//!
//! A process-wide "system" slot lets external components share ids with the
//! index without copying strings. It can be set once; later sets are ignored.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

/// Bidirectional mapping between word strings and dense `u32` ids.
#[derive(Debug, Default)]
pub struct Vocabulary {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    words: Vec<String>,
    ids: HashMap<String, u32>,
}

impl Vocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct words.
    pub fn len(&self) -> usize {
        self.inner.read().words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up the id of `word`, if present.
    pub fn lookup(&self, word: &str) -> Option<u32> {
        self.inner.read().ids.get(word).copied()
    }

    /// Word string for `id`, if in range.
    pub fn word(&self, id: u32) -> Option<String> {
        self.inner.read().words.get(id as usize).cloned()
    }

    /// Insert `word` if absent and return its id.
    ///
    /// Readers racing with an insert observe either the table before or the
    /// table after the insert, never a partial state. Two threads inserting
    /// the same word both get the same id.
    pub fn add(&self, word: &str) -> u32 {
        if let Some(id) = self.lookup(word) {
            return id;
        }
        let mut inner = self.inner.write();
        if let Some(id) = inner.ids.get(word) {
            // Lost the race to another writer.
            return *id;
        }
        let id = inner.words.len() as u32;
        inner.words.push(word.to_string());
        inner.ids.insert(word.to_string(), id);
        id
    }

    /// Translate a token sequence, inserting unseen words.
    pub fn add_all<S: AsRef<str>>(&self, words: &[S]) -> Vec<u32> {
        words.iter().map(|w| self.add(w.as_ref())).collect()
    }

    /// Snapshot of all words in id order. Intended for serialization.
    pub(crate) fn words_snapshot(&self) -> Vec<String> {
        self.inner.read().words.clone()
    }

    /// Rebuild a vocabulary from an id-ordered word list.
    pub(crate) fn from_words(words: Vec<String>) -> Self {
        let ids = words
            .iter()
            .enumerate()
            .map(|(i, w)| (w.clone(), i as u32))
            .collect();
        Self {
            inner: RwLock::new(Inner { words, ids }),
        }
    }
}

static SYSTEM: OnceLock<Arc<Vocabulary>> = OnceLock::new();

/// Install `vocab` as the process-wide system vocabulary.
///
/// Returns false if a system vocabulary was already installed; the existing
/// one is kept in that case.
pub fn set_system(vocab: Arc<Vocabulary>) -> bool {
    SYSTEM.set(vocab).is_ok()
}

/// The process-wide system vocabulary, if one has been installed.
pub fn system() -> Option<&'static Arc<Vocabulary>> {
    SYSTEM.get()
}

/// Word string for `id` in the system vocabulary.
pub fn system_word(id: u32) -> Option<String> {
    system().and_then(|v| v.word(id))
}

/// Size of the system vocabulary, or 0 when none is installed.
pub fn system_len() -> usize {
    system().map_or(0, |v| v.len())
}
