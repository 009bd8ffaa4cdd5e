//! The dynamic phrase table: public query surface over the index, caches,
//! and the parallel span driver.
//!
//! A query walks every source span up to the maximum phrase length. Work is
//! pruned by monotone miss propagation: a phrase with zero corpus hits
//! cannot have a superphrase with hits, so once a span misses, every longer
//! span containing it is skipped without touching the index. Misses are
//! tracked per start position in a set-bit-only atomic bitset, rotated
//! between length passes so the parallel workers of one pass only read the
//! previous pass.
//!
//! Two caches are built once by [`DynamicPhraseTable::init`] and never
//! mutated afterwards: the lexical co-occurrence table, and pre-scored rules
//! for source unigrams frequent enough that re-sampling them per query would
//! dominate latency.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use rayon::prelude::*;
use tracing::{debug, info};

use crate::binary;
use crate::cooc::{LexCoocTable, NULL_ID};
use crate::error::SabreError;
use crate::extract::RuleExtractor;
use crate::rule::{ConcreteRule, FeatureSink, FeatureTemplate, ScoredRule};
use crate::sa::ParallelSuffixArray;
use crate::score::{self, RuleHistogram};

pub const DEFAULT_MAX_SOURCE_PHRASE: usize = 5;
pub const DEFAULT_MAX_TARGET_PHRASE: usize = 7;
pub const DEFAULT_SAMPLE_SIZE: usize = 100;
/// Source unigrams with more corpus hits than this get pre-scored at init.
pub const DEFAULT_RULE_CACHE_THRESHOLD: usize = 10_000;

/// Per-query instrumentation counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryStats {
    /// Spans considered across all lengths.
    pub spans_total: usize,
    /// Spans skipped because a subspan already missed.
    pub spans_skipped: usize,
    /// Unigram spans answered from the rule cache.
    pub cache_hits: usize,
    /// Spans sampled and found absent from the corpus.
    pub empty_spans: usize,
}

#[derive(Default)]
struct StatCounters {
    spans_total: AtomicUsize,
    spans_skipped: AtomicUsize,
    cache_hits: AtomicUsize,
    empty_spans: AtomicUsize,
}

impl StatCounters {
    fn snapshot(&self) -> QueryStats {
        QueryStats {
            spans_total: self.spans_total.load(Ordering::Relaxed),
            spans_skipped: self.spans_skipped.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            empty_spans: self.empty_spans.load(Ordering::Relaxed),
        }
    }
}

/// Set-bit-only atomic bitset over span start positions.
struct MissSet {
    words: Vec<AtomicU64>,
}

impl MissSet {
    fn new(len: usize) -> Self {
        Self {
            words: (0..len.div_ceil(64)).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    fn set(&self, i: usize) {
        self.words[i / 64].fetch_or(1 << (i % 64), Ordering::Relaxed);
    }

    fn get(&self, i: usize) -> bool {
        self.words[i / 64].load(Ordering::Relaxed) & (1 << (i % 64)) != 0
    }
}

/// Sampling-based phrase table over a parallel suffix array.
pub struct DynamicPhraseTable {
    sa: ParallelSuffixArray,
    cooc: LexCoocTable,
    unigram_cache: HashMap<u32, Vec<ScoredRule>>,
    template: FeatureTemplate,
    max_src_len: usize,
    max_tgt_len: usize,
    sample_size: usize,
    cache_threshold: usize,
    parallel: bool,
    initialized: bool,
}

impl DynamicPhraseTable {
    /// Wrap a built index with default configuration. Call
    /// [`init`](Self::init) before querying to populate the caches.
    pub fn from_index(sa: ParallelSuffixArray) -> Self {
        Self {
            sa,
            cooc: LexCoocTable::new(),
            unigram_cache: HashMap::new(),
            template: FeatureTemplate::Dense,
            max_src_len: DEFAULT_MAX_SOURCE_PHRASE,
            max_tgt_len: DEFAULT_MAX_TARGET_PHRASE,
            sample_size: DEFAULT_SAMPLE_SIZE,
            cache_threshold: DEFAULT_RULE_CACHE_THRESHOLD,
            parallel: true,
            initialized: false,
        }
    }

    /// Deserialize an index file (`.bin`, or `.gz` for gzip) and wrap it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SabreError> {
        Ok(Self::from_index(binary::load(path)?))
    }

    /// Persist the underlying index.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), SabreError> {
        binary::save(&self.sa, path)
    }

    pub fn index(&self) -> &ParallelSuffixArray {
        &self.sa
    }

    fn reject_after_init(&self, what: &str) -> Result<(), SabreError> {
        if self.initialized {
            return Err(SabreError::config(format!(
                "{} cannot change after init: caches already built",
                what
            )));
        }
        Ok(())
    }

    pub fn set_feature_template(&mut self, template: FeatureTemplate) -> Result<(), SabreError> {
        self.reject_after_init("feature template")?;
        self.template = template;
        Ok(())
    }

    pub fn set_max_source_phrase(&mut self, n: usize) -> Result<(), SabreError> {
        if n == 0 {
            return Err(SabreError::config("max source phrase length must be > 0"));
        }
        self.max_src_len = n;
        Ok(())
    }

    pub fn set_max_target_phrase(&mut self, n: usize) -> Result<(), SabreError> {
        if n == 0 {
            return Err(SabreError::config("max target phrase length must be > 0"));
        }
        self.reject_after_init("max target phrase length")?;
        self.max_tgt_len = n;
        Ok(())
    }

    pub fn set_rule_cache_threshold(&mut self, hits: usize) -> Result<(), SabreError> {
        self.reject_after_init("rule cache threshold")?;
        self.cache_threshold = hits;
        Ok(())
    }

    /// Switch between the parallel span driver and a deterministic
    /// sequential one.
    pub fn set_parallel(&mut self, parallel: bool) {
        self.parallel = parallel;
    }

    /// Populate the co-occurrence table and the unigram rule cache.
    ///
    /// With `use_system_vocab`, the index vocabulary is also installed in
    /// the process-wide slot so external components can share ids.
    pub fn init(&mut self, use_system_vocab: bool, sample_size: usize) -> Result<(), SabreError> {
        if sample_size == 0 {
            return Err(SabreError::config("sample size must be > 0"));
        }
        self.reject_after_init("init")?;
        self.sample_size = sample_size;
        if use_system_vocab {
            crate::vocab::set_system(self.sa.vocab().clone());
        }

        let started = std::time::Instant::now();
        self.build_cooc_table();
        self.build_unigram_cache();
        self.initialized = true;
        info!(
            joint_entries = self.cooc.joint_entries(),
            cached_unigrams = self.unigram_cache.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "initialized dynamic phrase table"
        );
        Ok(())
    }

    /// Walk every occurrence of every vocabulary id, on both sides, and
    /// accumulate joint and marginal counts. Joint counts are learned from
    /// the source pass only; the target pass adds marginals and the
    /// unaligned NULL pairings.
    fn build_cooc_table(&self) {
        let corpus = self.sa.corpus();
        (0..self.sa.vocab().len() as u32)
            .into_par_iter()
            .for_each(|id| {
                for hit in self.sa.query(&[id], true) {
                    let pair = corpus.sentence(hit.sentence);
                    let links = pair.f2e(hit.position as usize);
                    if links.is_empty() {
                        self.cooc.add_cooc(id, NULL_ID);
                        self.cooc.incr_src_marginal(id, 1);
                    } else {
                        for &j in links {
                            self.cooc.add_cooc(id, pair.target[j as usize]);
                        }
                        self.cooc.incr_src_marginal(id, links.len() as u64);
                    }
                }
                for hit in self.sa.query(&[id], false) {
                    let pair = corpus.sentence(hit.sentence);
                    let links = pair.e2f(hit.position as usize);
                    if links.is_empty() {
                        self.cooc.add_cooc(NULL_ID, id);
                        self.cooc.incr_tgt_marginal(id, 1);
                    } else {
                        self.cooc.incr_tgt_marginal(id, links.len() as u64);
                    }
                }
            });
    }

    fn build_unigram_cache(&mut self) {
        let cached: Vec<(u32, Vec<ScoredRule>)> = (0..self.sa.vocab().len() as u32)
            .into_par_iter()
            .filter_map(|id| {
                if self.sa.count(&[id], true) <= self.cache_threshold {
                    return None;
                }
                self.sample_and_score(&[id]).map(|rules| (id, rules))
            })
            .collect();
        self.unigram_cache = cached.into_iter().collect();
    }

    /// Sample, extract, and score one source phrase. `None` means the
    /// phrase has no corpus hits at all.
    fn sample_and_score(&self, pattern: &[u32]) -> Option<Vec<ScoredRule>> {
        let corpus = self.sa.corpus();
        let set = self.sa.sample(pattern, true, self.sample_size);
        if set.num_hits == 0 {
            return None;
        }

        let mut extractor = RuleExtractor::new(self.max_tgt_len);
        let mut hist = RuleHistogram::new();
        let mut scratch = Vec::new();
        for hit in &set.samples {
            let pair = corpus.sentence(hit.sentence);
            scratch.clear();
            extractor.extract(&pair, hit.position as usize, pattern.len(), &mut scratch);
            for rule in &scratch {
                let (lex_e_f, lex_f_e) = score::lex_scores(&pair, rule, &self.cooc);
                hist.add(rule.key(corpus), lex_e_f, lex_f_e);
            }
        }
        if hist.is_empty() {
            // Hits exist but none produced an admissible pair.
            return Some(Vec::new());
        }
        Some(score::score_histogram(
            &hist,
            set.sample_rate(),
            &self.sa,
            self.template,
        ))
    }

    /// Extract and score rules for every source span of the query sentence.
    pub fn get_rules<S: AsRef<str>>(&self, source: &[S]) -> Vec<ConcreteRule> {
        self.run_query(source, None).0
    }

    /// Like [`get_rules`](Self::get_rules), feeding every feature vector to
    /// `sink` as it is produced.
    pub fn get_rules_scored<S: AsRef<str>>(
        &self,
        source: &[S],
        sink: &dyn FeatureSink,
    ) -> Vec<ConcreteRule> {
        self.run_query(source, Some(sink)).0
    }

    /// Like [`get_rules`](Self::get_rules), also returning instrumentation
    /// counters.
    pub fn get_rules_with_stats<S: AsRef<str>>(
        &self,
        source: &[S],
    ) -> (Vec<ConcreteRule>, QueryStats) {
        self.run_query(source, None)
    }

    fn run_query<S: AsRef<str>>(
        &self,
        source: &[S],
        sink: Option<&dyn FeatureSink>,
    ) -> (Vec<ConcreteRule>, QueryStats) {
        let vocab = self.sa.vocab();
        let ids: Vec<u32> = source.iter().map(|w| vocab.add(w.as_ref())).collect();
        let n = ids.len();
        let stats = StatCounters::default();
        if n == 0 {
            return (Vec::new(), stats.snapshot());
        }

        let names = self.template.feature_names();
        let mut out: Vec<ConcreteRule> = Vec::new();
        let mut miss_prev = MissSet::new(n + 1);
        for len in 1..=self.max_src_len.min(n) {
            let miss_cur = MissSet::new(n + 1);
            let process = |i: usize| -> Option<Vec<ConcreteRule>> {
                stats.spans_total.fetch_add(1, Ordering::Relaxed);
                // Either subspan of length len-1 missing kills this span.
                if len > 1 && (miss_prev.get(i) || miss_prev.get(i + 1)) {
                    miss_cur.set(i);
                    stats.spans_skipped.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
                let pattern = &ids[i..i + len];
                let scored = if len == 1 && self.unigram_cache.contains_key(&pattern[0]) {
                    stats.cache_hits.fetch_add(1, Ordering::Relaxed);
                    self.unigram_cache[&pattern[0]].clone()
                } else {
                    match self.sample_and_score(pattern) {
                        None => {
                            miss_cur.set(i);
                            stats.empty_spans.fetch_add(1, Ordering::Relaxed);
                            return None;
                        }
                        Some(scored) => scored,
                    }
                };
                if let Some(sink) = sink {
                    for rule in &scored {
                        sink.score(names, &rule.scores);
                    }
                }
                Some(
                    scored
                        .into_iter()
                        .map(|rule| ConcreteRule {
                            rule,
                            src_start: i,
                            src_end: i + len,
                        })
                        .collect(),
                )
            };

            let produced: Vec<Option<Vec<ConcreteRule>>> = if self.parallel {
                (0..=n - len).into_par_iter().map(process).collect()
            } else {
                (0..=n - len).map(process).collect()
            };
            out.extend(produced.into_iter().flatten().flatten());
            miss_prev = miss_cur;
        }

        let stats = stats.snapshot();
        debug!(
            rules = out.len(),
            spans = stats.spans_total,
            skipped = stats.spans_skipped,
            "extracted rules for query"
        );
        (out, stats)
    }
}
