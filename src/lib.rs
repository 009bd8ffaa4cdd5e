//! Sampling-based translation rule extraction over a parallel suffix array.
//!
//! This crate indexes a word-aligned parallel corpus and, at query time,
//! samples occurrences of each source span, extracts the aligned target
//! phrases from the sampled sentences, and scores every distinct phrase pair
//! with dense translation features. It is the rule-table half of a
//! phrase-based decoder: the decoder sends a source sentence in, gets scored
//! rules with source coverage back, and does its own search.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────────┐   ┌───────────────────┐
//! │ vocab.rs │──▶│ corpus.rs  │──▶│ sa.rs (+ sais.rs) │
//! │ word↔id  │   │ flat ids,  │   │ locate / count /  │
//! │          │   │ CSR aligns │   │ query / sample    │
//! └──────────┘   └────────────┘   └─────────┬─────────┘
//!                                           │
//!                      ┌────────────────────┼──────────────┐
//!                      ▼                    ▼              ▼
//!               ┌────────────┐      ┌─────────────┐  ┌──────────┐
//!               │ extract.rs │      │  score.rs   │  │ cooc.rs  │
//!               │ admissible │─────▶│ histogram → │◀─│ lexical  │
//!               │ tgt spans  │      │ features    │  │ counts   │
//!               └────────────┘      └──────┬──────┘  └──────────┘
//!                                          ▼
//!                                   ┌────────────┐
//!                                   │  model.rs  │  facade: caches,
//!                                   │            │  parallel driver
//!                                   └────────────┘
//! ```
//!
//! `binary/` persists all of it behind a checksummed, versioned schema;
//! `bitext.rs` compiles the raw aligned text files into an index.
//!
//! # Usage
//!
//! ```ignore
//! use sabre::{bitext, DynamicPhraseTable};
//!
//! let index = bitext::compile("corpus/manifest.json")?;
//! let mut tm = DynamicPhraseTable::from_index(index);
//! tm.init(false, 100)?;
//! for rule in tm.get_rules(&["das", "haus"]) {
//!     println!("{:?} covers [{}, {})", rule.rule.key, rule.src_start, rule.src_end);
//! }
//! ```

pub mod binary;
pub mod bitext;
mod cooc;
mod corpus;
mod error;
mod extract;
mod model;
mod rule;
mod sa;
mod sais;
mod score;
pub mod vocab;

pub use cooc::{LexCoocTable, NULL_ID};
pub use corpus::{AlignedSentence, CsrAlignment, ParallelCorpus, SentenceTriple};
pub use error::SabreError;
pub use extract::RuleExtractor;
pub use model::{
    DynamicPhraseTable, QueryStats, DEFAULT_MAX_SOURCE_PHRASE, DEFAULT_MAX_TARGET_PHRASE,
    DEFAULT_RULE_CACHE_THRESHOLD, DEFAULT_SAMPLE_SIZE,
};
pub use rule::{ConcreteRule, FeatureSink, FeatureTemplate, RuleKey, SampledRule, ScoredRule};
pub use sa::{ParallelSuffixArray, QueryResult, SampleSet};
pub use score::MIN_LEX_PROB;
pub use vocab::Vocabulary;
