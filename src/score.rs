//! Feature scoring for extracted rule histograms.
//!
//! Phrase probabilities come from the sampled histogram: the forward
//! direction is the maximum-likelihood estimate over everything extracted
//! for this source phrase; the reverse direction uses Germann's
//! approximation, comparing the sampled pair count against the exact corpus
//! count of the target phrase less the rate-adjusted pair count (the share
//! estimated to occur with other source phrases). Word-level lexical
//! probabilities come from the co-occurrence table, computed per occurrence
//! and folded into the histogram keeping the jointly maximal pair.
//!
//! All scores are natural logs in `f32`. Counts are nonzero by construction,
//! so no log ever sees zero.

use std::collections::HashMap;

use crate::cooc::{LexCoocTable, NULL_ID};
use crate::corpus::AlignedSentence;
use crate::rule::{FeatureTemplate, RuleKey, SampledRule, ScoredRule};
use crate::sa::ParallelSuffixArray;

/// Floor for any single lexical factor whose counts are missing.
pub const MIN_LEX_PROB: f64 = 1e-5;

/// Word-level translation probabilities for one rule occurrence, both
/// directions.
///
/// Forward multiplies, for each source word, the average probability of its
/// aligned target words given the source word (its unaligned probability
/// against NULL when it has no links); backward is symmetric over the target
/// span. Zero factors are floored at [`MIN_LEX_PROB`].
pub(crate) fn lex_scores(
    pair: &AlignedSentence<'_>,
    rule: &SampledRule,
    cooc: &LexCoocTable,
) -> (f32, f32) {
    let mut e_given_f = 1.0f64;
    for i in rule.src_start..rule.src_end {
        let f = pair.source[i as usize];
        let marginal = cooc.src_marginal(f);
        let links = pair.f2e(i as usize);
        let factor = if marginal == 0 {
            0.0
        } else if links.is_empty() {
            cooc.joint(f, NULL_ID) as f64 / marginal as f64
        } else {
            let sum: f64 = links
                .iter()
                .map(|&j| cooc.joint(f, pair.target[j as usize]) as f64)
                .sum();
            sum / (links.len() as f64 * marginal as f64)
        };
        e_given_f *= if factor > 0.0 { factor } else { MIN_LEX_PROB };
    }

    let mut f_given_e = 1.0f64;
    for j in rule.tgt_start..rule.tgt_end {
        let e = pair.target[j as usize];
        let marginal = cooc.tgt_marginal(e);
        let links = pair.e2f(j as usize);
        let factor = if marginal == 0 {
            0.0
        } else if links.is_empty() {
            cooc.joint(NULL_ID, e) as f64 / marginal as f64
        } else {
            let sum: f64 = links
                .iter()
                .map(|&i| cooc.joint(pair.source[i as usize], e) as f64)
                .sum();
            sum / (links.len() as f64 * marginal as f64)
        };
        f_given_e *= if factor > 0.0 { factor } else { MIN_LEX_PROB };
    }

    (clamp_prob(e_given_f), clamp_prob(f_given_e))
}

/// Keep products of tiny factors inside (0, 1] after narrowing.
fn clamp_prob(p: f64) -> f32 {
    let p = p as f32;
    if p > 0.0 {
        p.min(1.0)
    } else {
        f32::MIN_POSITIVE
    }
}

/// Multiset of extracted rules for one source phrase.
#[derive(Debug, Default)]
pub(crate) struct RuleHistogram {
    entries: HashMap<RuleKey, HistEntry>,
}

#[derive(Debug)]
struct HistEntry {
    count: u32,
    lex_e_f: f32,
    lex_f_e: f32,
}

impl RuleHistogram {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Count one occurrence. The stored lexical pair is replaced only when
    /// both candidate values strictly exceed it.
    pub(crate) fn add(&mut self, key: RuleKey, lex_e_f: f32, lex_f_e: f32) {
        let entry = self.entries.entry(key).or_insert(HistEntry {
            count: 0,
            lex_e_f: 0.0,
            lex_f_e: 0.0,
        });
        entry.count += 1;
        if lex_e_f > entry.lex_e_f && lex_f_e > entry.lex_f_e {
            entry.lex_e_f = lex_e_f;
            entry.lex_f_e = lex_f_e;
        }
    }
}

/// Score every distinct rule in `hist`.
///
/// `sample_rate` is the sampled fraction of the source phrase's corpus hits,
/// in (0, 1].
pub(crate) fn score_histogram(
    hist: &RuleHistogram,
    sample_rate: f64,
    sa: &ParallelSuffixArray,
    template: FeatureTemplate,
) -> Vec<ScoredRule> {
    let total: u64 = hist.entries.values().map(|e| u64::from(e.count)).sum();
    if total == 0 {
        return Vec::new();
    }
    let log_total = (total as f64).ln();

    hist.entries
        .iter()
        .map(|(key, entry)| {
            let c = f64::from(entry.count);
            let phi_f_e = (c.ln() - log_total) as f32;

            // Corpus hits of the target phrase beyond the pair's sampled
            // count, rate-adjusted, belong to other source phrases. The
            // clamp is a float guard only; the difference cannot go
            // negative, the sampled pair count never exceeds the target
            // phrase's corpus count.
            let tgt_hits = sa.count(&key.tgt, false) as f64;
            let num = (tgt_hits - c * sample_rate).max(0.0);
            let phi_e_f = (c.ln() - (c + num).ln()) as f32;

            let mut scores = vec![phi_f_e, phi_e_f, entry.lex_f_e, entry.lex_e_f];
            if template == FeatureTemplate::DenseExt {
                scores.push(c.ln() as f32);
                scores.push(if entry.count == 1 { 1.0 } else { 0.0 });
            }
            ScoredRule {
                key: key.clone(),
                scores,
            }
        })
        .collect()
}
