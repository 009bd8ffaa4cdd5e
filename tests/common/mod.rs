//! Shared test fixtures: tiny hand-aligned bitexts.

#![allow(dead_code)]

use sabre::{ParallelSuffixArray, SentenceTriple};

/// One sentence triple from whitespace-tokenized strings.
pub fn triple(src: &str, tgt: &str, align: &[(u32, u32)]) -> SentenceTriple {
    SentenceTriple {
        source: src.split_whitespace().map(str::to_string).collect(),
        target: tgt.split_whitespace().map(str::to_string).collect(),
        alignment: align.to_vec(),
    }
}

/// A diagonal alignment 0-0 1-1 ... over equal-length sides.
pub fn diagonal(src: &str, tgt: &str) -> SentenceTriple {
    let n = src.split_whitespace().count();
    assert_eq!(n, tgt.split_whitespace().count());
    let align: Vec<(u32, u32)> = (0..n as u32).map(|i| (i, i)).collect();
    triple(src, tgt, &align)
}

pub fn index(triples: &[SentenceTriple]) -> ParallelSuffixArray {
    ParallelSuffixArray::from_triples(triples).unwrap()
}

/// Translate a phrase through the index vocabulary; panics on unseen words.
pub fn ids(sa: &ParallelSuffixArray, phrase: &str) -> Vec<u32> {
    phrase
        .split_whitespace()
        .map(|w| {
            sa.vocab()
                .lookup(w)
                .unwrap_or_else(|| panic!("word '{}' not in vocabulary", w))
        })
        .collect()
}

/// Render a rule key back to strings for readable assertions.
pub fn key_words(sa: &ParallelSuffixArray, key: &sabre::RuleKey) -> (String, String) {
    let join = |ids: &[u32]| {
        ids.iter()
            .map(|&id| sa.vocab().word(id).unwrap())
            .collect::<Vec<_>>()
            .join(" ")
    };
    (join(&key.src), join(&key.tgt))
}
