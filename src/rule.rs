//! Rule data types: extracted occurrences, histogram keys, and scored output.

use std::fmt;
use std::str::FromStr;

use crate::corpus::ParallelCorpus;
use crate::error::SabreError;

/// One phrase-pair occurrence extracted from a sampled sentence.
///
/// Spans are word positions inside the sentence. The identity of the rule is
/// the id content of both spans, not the occurrence location; see
/// [`SampledRule::key`].
#[derive(Debug, Clone, Copy)]
pub struct SampledRule {
    pub sentence: u32,
    pub src_start: u32,
    pub src_end: u32,
    pub tgt_start: u32,
    pub tgt_end: u32,
    /// Word-level probability of the target span given the source span.
    pub lex_e_f: f32,
    /// Word-level probability of the source span given the target span.
    pub lex_f_e: f32,
}

impl SampledRule {
    /// Resolve the occurrence to its id-content identity.
    pub fn key(&self, corpus: &ParallelCorpus) -> RuleKey {
        let pair = corpus.sentence(self.sentence);
        RuleKey {
            src: pair.source[self.src_start as usize..self.src_end as usize].into(),
            tgt: pair.target[self.tgt_start as usize..self.tgt_end as usize].into(),
        }
    }
}

/// Identity of a phrase pair: the two id sequences. Equality and hashing
/// cover both, so two occurrences of the same pair collapse in a histogram.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleKey {
    pub src: Box<[u32]>,
    pub tgt: Box<[u32]>,
}

/// Which dense feature family a scored rule carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureTemplate {
    /// Phrase and lexical translation probabilities, both directions.
    Dense,
    /// `Dense` plus the log rule count and a singleton indicator.
    DenseExt,
}

impl FeatureTemplate {
    /// Feature names, in the order values appear in [`ScoredRule::scores`].
    pub fn feature_names(self) -> &'static [&'static str] {
        match self {
            FeatureTemplate::Dense => &["phi_f_e", "phi_e_f", "lex_f_e", "lex_e_f"],
            FeatureTemplate::DenseExt => &[
                "phi_f_e",
                "phi_e_f",
                "lex_f_e",
                "lex_e_f",
                "log_count",
                "singleton",
            ],
        }
    }

    pub fn feature_count(self) -> usize {
        self.feature_names().len()
    }
}

impl FromStr for FeatureTemplate {
    type Err = SabreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dense" | "DENSE" => Ok(FeatureTemplate::Dense),
            "dense-ext" | "DENSE_EXT" => Ok(FeatureTemplate::DenseExt),
            other => Err(SabreError::config(format!(
                "unknown feature template '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for FeatureTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureTemplate::Dense => write!(f, "dense"),
            FeatureTemplate::DenseExt => write!(f, "dense-ext"),
        }
    }
}

/// A distinct rule with its dense feature values, natural-log domain.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRule {
    pub key: RuleKey,
    /// Values ordered per [`FeatureTemplate::feature_names`].
    pub scores: Vec<f32>,
}

/// A scored rule tagged with the source span it covers in the query
/// sentence, which is what the decoder consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct ConcreteRule {
    pub rule: ScoredRule,
    pub src_start: usize,
    pub src_end: usize,
}

/// Downstream featurizer contract: a pure sink for feature vectors.
///
/// Called from worker threads during parallel extraction, hence `Sync`.
pub trait FeatureSink: Sync {
    fn score(&self, names: &[&str], values: &[f32]);
}
