//! Property tests: locate correctness against a naive oracle, miss
//! monotonicity, extractor admissibility, and scorer sanity on random
//! corpora.

mod common;

use proptest::prelude::*;
use sabre::{
    DynamicPhraseTable, FeatureTemplate, ParallelSuffixArray, QueryResult, RuleExtractor,
    SentenceTriple,
};

// ============================================================================
// STRATEGIES
// ============================================================================

/// One random sentence pair over small shared vocabularies, with a random
/// (possibly empty, possibly duplicated) set of alignment links.
fn sentence_strategy() -> impl Strategy<Value = SentenceTriple> {
    (1usize..6, 1usize..6).prop_flat_map(|(ns, nt)| {
        (
            prop::collection::vec(0u32..8, ns),
            prop::collection::vec(0u32..8, nt),
            prop::collection::vec((0..ns as u32, 0..nt as u32), 0..=ns + nt),
        )
            .prop_map(|(src, tgt, alignment)| SentenceTriple {
                source: src.iter().map(|i| format!("s{}", i)).collect(),
                target: tgt.iter().map(|i| format!("t{}", i)).collect(),
                alignment,
            })
    })
}

fn corpus_strategy() -> impl Strategy<Value = Vec<SentenceTriple>> {
    prop::collection::vec(sentence_strategy(), 1..6)
}

/// Every corpus occurrence of `pattern`, by brute-force scan.
fn naive_occurrences(sa: &ParallelSuffixArray, pattern: &[u32]) -> Vec<QueryResult> {
    let corpus = sa.corpus();
    let mut out = Vec::new();
    for s in 0..corpus.sentence_count() as u32 {
        let sent = corpus.sentence(s);
        let n = sent.source.len();
        for start in 0..n {
            if start + pattern.len() <= n && &sent.source[start..start + pattern.len()] == pattern {
                out.push(QueryResult {
                    sentence: s,
                    position: start as u32,
                });
            }
        }
    }
    out.sort();
    out
}

// ============================================================================
// PROPERTIES
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// locate/query agree with a brute-force scan for every short pattern
    /// actually present in the corpus, and for unseen patterns.
    #[test]
    fn prop_locate_matches_naive_scan(triples in corpus_strategy()) {
        let sa = ParallelSuffixArray::from_triples(&triples).unwrap();
        let corpus = sa.corpus();

        for s in 0..corpus.sentence_count() as u32 {
            let sent = corpus.sentence(s);
            let n = sent.source.len();
            for start in 0..n {
                for len in 1..=3.min(n - start) {
                    let pattern = &sent.source[start..start + len];
                    let mut got = sa.query(pattern, true);
                    got.sort();
                    prop_assert_eq!(&got, &naive_occurrences(&sa, pattern));
                    prop_assert_eq!(got.len(), sa.count(pattern, true));
                }
            }
        }

        // A word no sentence uses.
        let unseen = sa.vocab().add("unseen-probe");
        prop_assert_eq!(sa.count(&[unseen], true), 0);
    }

    /// A zero-hit pattern stays zero-hit under any extension.
    #[test]
    fn prop_missing_patterns_stay_missing(
        triples in corpus_strategy(),
        words in prop::collection::vec(0u32..12, 1..4),
        extension in 0u32..12,
    ) {
        let sa = ParallelSuffixArray::from_triples(&triples).unwrap();
        // Ids beyond the corpus vocabulary are resolved by inserting, which
        // is exactly what the query path does for unseen words.
        let pattern: Vec<u32> = words.iter().map(|i| sa.vocab().add(&format!("s{}", i))).collect();
        if sa.count(&pattern, true) == 0 {
            let mut longer = pattern.clone();
            longer.push(sa.vocab().add(&format!("s{}", extension)));
            prop_assert_eq!(sa.count(&longer, true), 0);
            let mut prefixed = vec![sa.vocab().add(&format!("s{}", extension))];
            prefixed.extend_from_slice(&pattern);
            prop_assert_eq!(sa.count(&prefixed, true), 0);
        }
    }

    /// Every extracted rule is admissible: length-bounded, covering the
    /// tight span, unaligned outside it, and with no link leaving the
    /// source span.
    #[test]
    fn prop_extracted_rules_are_admissible(triples in corpus_strategy()) {
        let max_tgt = 3usize;
        let sa = ParallelSuffixArray::from_triples(&triples).unwrap();
        let corpus = sa.corpus();
        let mut extractor = RuleExtractor::new(max_tgt);

        for s in 0..corpus.sentence_count() as u32 {
            let sent = corpus.sentence(s);
            let n = sent.source.len();
            for start in 0..n {
                for len in 1..=3.min(n - start) {
                    let mut rules = Vec::new();
                    extractor.extract(&sent, start, len, &mut rules);

                    // Tight span of this source span, recomputed directly.
                    let linked: Vec<usize> = (start..start + len)
                        .flat_map(|i| sent.f2e(i).iter().map(|&j| j as usize))
                        .collect();
                    if linked.is_empty() {
                        prop_assert!(rules.is_empty());
                        continue;
                    }
                    let min_t = *linked.iter().min().unwrap();
                    let max_t = *linked.iter().max().unwrap();

                    for r in &rules {
                        let (ts, te) = (r.tgt_start as usize, r.tgt_end as usize);
                        prop_assert!(te - ts <= max_tgt);
                        prop_assert!(ts <= min_t && max_t < te);
                        for j in ts..te {
                            if j < min_t || j > max_t {
                                prop_assert!(!sent.target_aligned(j));
                            }
                            for &i in sent.e2f(j) {
                                let i = i as usize;
                                prop_assert!(start <= i && i < start + len);
                            }
                        }
                    }
                }
            }
        }
    }

    /// Every feature vector a query produces is sane: non-positive phrase
    /// logprobs, lexical probabilities in (0, 1], finite everywhere.
    #[test]
    fn prop_feature_vectors_are_sane(triples in corpus_strategy()) {
        let mut tm = DynamicPhraseTable::from_index(
            ParallelSuffixArray::from_triples(&triples).unwrap(),
        );
        tm.set_parallel(false);
        tm.set_feature_template(FeatureTemplate::DenseExt).unwrap();
        tm.init(false, 8).unwrap();

        let query: Vec<String> = triples[0].source.clone();
        for rule in tm.get_rules(&query) {
            let s = &rule.rule.scores;
            prop_assert_eq!(s.len(), 6);
            for v in s {
                prop_assert!(v.is_finite(), "non-finite feature {:?}", s);
            }
            prop_assert!(s[0] <= 0.0); // phi_f_e
            prop_assert!(s[1] <= 0.0); // phi_e_f
            for lex in [s[2], s[3]] {
                prop_assert!(lex > 0.0 && lex <= 1.0, "lex out of range: {}", lex);
            }
            prop_assert!(s[4] >= 0.0); // log count
            prop_assert!(s[5] == 0.0 || s[5] == 1.0); // singleton flag
        }
    }
}
