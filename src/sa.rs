//! The parallel suffix array: exact phrase location and bounded uniform
//! sampling over both sides of the bitext.
//!
//! One suffix array is kept per side, each a sorted vector of flat token
//! positions. Sorting is done over a shifted copy of the corpus in which
//! sentence separators (1) and a final terminal (0) compare below every real
//! token, so no suffix extends past its sentence for ordering purposes. The
//! shifted copy is dropped after construction; queries compare against the
//! raw token vectors and treat the end of a sentence as smaller than any
//! pattern token, which induces the same order.
//!
//! Sampling is reproducible: the RNG seed is derived from the pattern
//! content and a per-index global seed, so the same query on the same index
//! always draws the same occurrences.

use std::cmp::Ordering;
use std::ops::Range;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::corpus::{CorpusSide, ParallelCorpus, SentenceTriple};
use crate::error::SabreError;
use crate::sais;
use crate::vocab::Vocabulary;

/// One occurrence of a queried phrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryResult {
    /// Sentence index in the corpus.
    pub sentence: u32,
    /// Word position inside the sentence where the phrase begins.
    pub position: u32,
}

/// Result of a bounded uniform sample of phrase occurrences.
#[derive(Debug, Clone)]
pub struct SampleSet {
    pub samples: Vec<QueryResult>,
    /// Total occurrences in the corpus, of which `samples` is a subset.
    pub num_hits: usize,
}

impl SampleSet {
    /// Fraction of corpus hits actually sampled, in (0, 1].
    pub fn sample_rate(&self) -> f64 {
        if self.num_hits == 0 {
            0.0
        } else {
            self.samples.len() as f64 / self.num_hits as f64
        }
    }
}

/// Static index over the aligned bitext: corpus, vocabulary, and one suffix
/// array per side.
#[derive(Debug)]
pub struct ParallelSuffixArray {
    vocab: Arc<Vocabulary>,
    corpus: ParallelCorpus,
    src_sa: Vec<u32>,
    tgt_sa: Vec<u32>,
    seed: u64,
}

impl ParallelSuffixArray {
    /// Index a bitext. Ids are assigned in first-occurrence order, source
    /// tokens before target tokens within each sentence; both sides share
    /// one vocabulary.
    pub fn from_triples(triples: &[SentenceTriple]) -> Result<Self, SabreError> {
        let vocab = Arc::new(Vocabulary::new());
        let ids: Vec<(Vec<u32>, Vec<u32>, Vec<(u32, u32)>)> = triples
            .iter()
            .map(|t| {
                (
                    vocab.add_all(&t.source),
                    vocab.add_all(&t.target),
                    t.alignment.clone(),
                )
            })
            .collect();
        let corpus = ParallelCorpus::from_id_triples(&ids)?;
        Ok(Self::from_corpus(vocab, corpus))
    }

    /// Build both suffix arrays over an already-translated corpus.
    pub(crate) fn from_corpus(vocab: Arc<Vocabulary>, corpus: ParallelCorpus) -> Self {
        let started = std::time::Instant::now();
        let alphabet = vocab.len() as u32 + 2;
        let (src_sa, tgt_sa) = rayon::join(
            || build_side_sa(&corpus.src, alphabet),
            || build_side_sa(&corpus.tgt, alphabet),
        );
        info!(
            sentences = corpus.sentence_count(),
            src_tokens = corpus.source_token_count(),
            tgt_tokens = corpus.target_token_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "built parallel suffix array"
        );
        Self {
            vocab,
            corpus,
            src_sa,
            tgt_sa,
            seed: 0,
        }
    }

    /// Reassemble a deserialized index, revalidating the suffix arrays.
    pub(crate) fn from_parts(
        vocab: Arc<Vocabulary>,
        corpus: ParallelCorpus,
        src_sa: Vec<u32>,
        tgt_sa: Vec<u32>,
        seed: u64,
    ) -> Result<Self, SabreError> {
        validate_sa(&src_sa, corpus.source_token_count(), "source")?;
        validate_sa(&tgt_sa, corpus.target_token_count(), "target")?;
        Ok(Self {
            vocab,
            corpus,
            src_sa,
            tgt_sa,
            seed,
        })
    }

    /// Set the global sampling seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn vocab(&self) -> &Arc<Vocabulary> {
        &self.vocab
    }

    pub fn corpus(&self) -> &ParallelCorpus {
        &self.corpus
    }

    pub(crate) fn suffix_positions(&self, on_source: bool) -> &[u32] {
        if on_source {
            &self.src_sa
        } else {
            &self.tgt_sa
        }
    }

    fn side(&self, on_source: bool) -> (&CorpusSide, &[u32]) {
        if on_source {
            (&self.corpus.src, &self.src_sa)
        } else {
            (&self.corpus.tgt, &self.tgt_sa)
        }
    }

    /// Half-open suffix-array range of positions whose sentence-bounded
    /// prefix equals `pattern`.
    ///
    /// Out-of-vocabulary ids simply produce an empty range. Empty patterns
    /// are a caller bug.
    pub fn locate(&self, pattern: &[u32], on_source: bool) -> Range<usize> {
        assert!(!pattern.is_empty(), "cannot locate an empty pattern");
        let (side, sa) = self.side(on_source);
        let lo = sa.partition_point(|&p| suffix_cmp(side, p, pattern) == Ordering::Less);
        let eq = sa[lo..].partition_point(|&p| suffix_cmp(side, p, pattern) == Ordering::Equal);
        lo..lo + eq
    }

    /// Number of occurrences of `pattern` on the given side.
    pub fn count(&self, pattern: &[u32], on_source: bool) -> usize {
        self.locate(pattern, on_source).len()
    }

    /// Materialize every occurrence of `pattern`.
    pub fn query(&self, pattern: &[u32], on_source: bool) -> Vec<QueryResult> {
        let (side, sa) = self.side(on_source);
        self.locate(pattern, on_source)
            .map(|i| to_result(side, sa[i]))
            .collect()
    }

    /// Uniform sample without replacement of at most `k` occurrences.
    ///
    /// Deterministic for a fixed pattern and global seed. The returned order
    /// is unspecified.
    pub fn sample(&self, pattern: &[u32], on_source: bool, k: usize) -> SampleSet {
        let (side, sa) = self.side(on_source);
        let range = self.locate(pattern, on_source);
        let num_hits = range.len();
        debug!(num_hits, k, on_source, "sampled pattern occurrences");
        if num_hits <= k {
            return SampleSet {
                samples: range.map(|i| to_result(side, sa[i])).collect(),
                num_hits,
            };
        }

        // Partial Fisher-Yates over k slots against [0, num_hits), with the
        // virtual permutation kept sparse.
        let mut rng = StdRng::seed_from_u64(self.pattern_seed(pattern, on_source));
        let mut swapped: std::collections::HashMap<usize, usize> = std::collections::HashMap::new();
        let mut samples = Vec::with_capacity(k);
        for i in 0..k {
            let j = rng.gen_range(i..num_hits);
            let pick = swapped.get(&j).copied().unwrap_or(j);
            let here = swapped.get(&i).copied().unwrap_or(i);
            swapped.insert(j, here);
            samples.push(to_result(side, sa[range.start + pick]));
        }
        SampleSet { samples, num_hits }
    }

    /// FNV-1a over the pattern ids, folded with the global seed.
    fn pattern_seed(&self, pattern: &[u32], on_source: bool) -> u64 {
        let mut h = 0xcbf2_9ce4_8422_2325u64;
        for &id in pattern {
            for b in id.to_le_bytes() {
                h ^= u64::from(b);
                h = h.wrapping_mul(0x0000_0100_0000_01b3);
            }
        }
        h ^= u64::from(on_source);
        h = h.wrapping_mul(0x0000_0100_0000_01b3);
        h ^ self.seed
    }
}

/// Compare the sentence-bounded suffix at `flat` against `pattern`.
///
/// Running out of sentence counts as smaller than any pattern token;
/// `Ordering::Equal` means the pattern is a prefix of the suffix.
fn suffix_cmp(side: &CorpusSide, flat: u32, pattern: &[u32]) -> Ordering {
    let (sent, word) = side.locate_token(flat);
    let suffix = &side.sentence_tokens(sent)[word as usize..];
    for (k, &p) in pattern.iter().enumerate() {
        match suffix.get(k) {
            None => return Ordering::Less,
            Some(&t) => match t.cmp(&p) {
                Ordering::Equal => {}
                ord => return ord,
            },
        }
    }
    Ordering::Equal
}

fn to_result(side: &CorpusSide, flat: u32) -> QueryResult {
    let (sentence, position) = side.locate_token(flat);
    QueryResult { sentence, position }
}

/// Sort suffixes of one side. Tokens are shifted by 2 so the terminal (0)
/// and sentence separators (1) order below every id; separator positions are
/// then dropped and the rest mapped back to flat token positions.
fn build_side_sa(side: &CorpusSide, alphabet: u32) -> Vec<u32> {
    let sentences = side.sentence_count();
    let mut text = Vec::with_capacity(side.token_count() + sentences + 1);
    let mut shifted_starts = Vec::with_capacity(sentences);
    for s in 0..sentences {
        shifted_starts.push(text.len() as u32);
        for &t in side.sentence_tokens(s as u32) {
            text.push(t + 2);
        }
        text.push(1);
    }
    text.push(0);

    sais::suffix_array(&text, alphabet)
        .into_iter()
        .filter(|&p| text[p as usize] >= 2)
        .map(|p| {
            let s = shifted_starts.partition_point(|&st| st <= p) - 1;
            p - s as u32
        })
        .collect()
}

/// A loaded suffix array must be a permutation of all flat token positions.
fn validate_sa(sa: &[u32], token_count: usize, name: &str) -> Result<(), SabreError> {
    if sa.len() != token_count {
        return Err(SabreError::corrupt(format!(
            "{} suffix array has {} entries for {} tokens",
            name,
            sa.len(),
            token_count
        )));
    }
    let mut seen: bitvec::vec::BitVec = bitvec::vec::BitVec::repeat(false, token_count);
    for &p in sa {
        if p as usize >= token_count || seen[p as usize] {
            return Err(SabreError::corrupt(format!(
                "{} suffix array is not a permutation of token positions",
                name
            )));
        }
        seen.set(p as usize, true);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triple(src: &str, tgt: &str, align: &[(u32, u32)]) -> SentenceTriple {
        SentenceTriple {
            source: src.split_whitespace().map(str::to_string).collect(),
            target: tgt.split_whitespace().map(str::to_string).collect(),
            alignment: align.to_vec(),
        }
    }

    fn toy_index() -> ParallelSuffixArray {
        ParallelSuffixArray::from_triples(&[
            triple("a b c", "A B C", &[(0, 0), (1, 1), (2, 2)]),
            triple("b c d", "B C D", &[(0, 0), (1, 1), (2, 2)]),
            triple("a b", "A B", &[(0, 0), (1, 1)]),
        ])
        .unwrap()
    }

    fn ids(sa: &ParallelSuffixArray, phrase: &str) -> Vec<u32> {
        phrase
            .split_whitespace()
            .map(|w| sa.vocab().lookup(w).unwrap())
            .collect()
    }

    #[test]
    fn locate_finds_all_occurrences() {
        let sa = toy_index();
        let b = ids(&sa, "b");
        assert_eq!(sa.count(&b, true), 3);

        let bc = ids(&sa, "b c");
        let mut hits = sa.query(&bc, true);
        hits.sort();
        assert_eq!(
            hits,
            vec![
                QueryResult { sentence: 0, position: 1 },
                QueryResult { sentence: 1, position: 0 },
            ]
        );
    }

    #[test]
    fn phrases_do_not_span_sentences() {
        let sa = toy_index();
        // "c" ends sentence 0 and "a" begins sentence 2 on the source side,
        // but "c a" never occurs within one sentence.
        let ca = ids(&sa, "c a");
        assert_eq!(sa.count(&ca, true), 0);
    }

    #[test]
    fn target_side_is_indexed_too() {
        let sa = toy_index();
        let bc = ids(&sa, "B C");
        assert_eq!(sa.count(&bc, false), 2);
    }

    #[test]
    fn oov_pattern_is_empty_not_fatal() {
        let sa = toy_index();
        let unseen = sa.vocab().add("zebra");
        assert_eq!(sa.count(&[unseen], true), 0);
        assert!(sa.query(&[unseen], true).is_empty());
        let s = sa.sample(&[unseen], true, 10);
        assert_eq!(s.num_hits, 0);
        assert!(s.samples.is_empty());
    }

    #[test]
    fn sample_is_deterministic_and_uniform_subset() {
        let sa = toy_index();
        let b = ids(&sa, "b");
        let s1 = sa.sample(&b, true, 2);
        let s2 = sa.sample(&b, true, 2);
        assert_eq!(s1.num_hits, 3);
        assert_eq!(s1.samples.len(), 2);
        assert_eq!(s1.samples, s2.samples);

        // All sampled hits are true hits.
        let all: Vec<QueryResult> = sa.query(&b, true);
        for q in &s1.samples {
            assert!(all.contains(q));
        }
        // Distinct.
        assert_ne!(s1.samples[0], s1.samples[1]);
    }

    #[test]
    fn different_seeds_can_differ_but_stay_valid() {
        let triples = vec![
            triple("x y", "X Y", &[(0, 0), (1, 1)]);
            1
        ];
        let base = ParallelSuffixArray::from_triples(&triples).unwrap();
        let reseeded = ParallelSuffixArray::from_triples(&triples)
            .unwrap()
            .with_seed(7);
        let x = ids(&base, "x");
        assert_eq!(base.count(&x, true), reseeded.count(&x, true));
    }
}
