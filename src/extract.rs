//! Phrase-pair extraction from one sampled sentence.
//!
//! Given a source span with a known corpus occurrence, the extractor
//! enumerates every admissible target span: the tight span covering all
//! alignment links of the source words, grown outward over unaligned target
//! positions only, bounded by the maximum target phrase length. A span is
//! rejected outright when the source words have no links at all, when the
//! tight span exceeds the length bound, when it contains a target position
//! not covered by the span's own links, or when a covered position also
//! links back outside the source span.

use bitvec::vec::BitVec;

use crate::corpus::AlignedSentence;
use crate::rule::SampledRule;

/// Reusable extractor; holds the target-coverage scratch set so repeated
/// extraction over many samples does not reallocate.
#[derive(Debug)]
pub struct RuleExtractor {
    max_tgt_len: usize,
    coverage: BitVec,
}

impl RuleExtractor {
    pub fn new(max_tgt_len: usize) -> Self {
        Self {
            max_tgt_len,
            coverage: BitVec::new(),
        }
    }

    /// Extract every admissible rule for the source span
    /// `[src_start, src_start + src_len)` of `pair`, appending to `out`.
    pub fn extract(
        &mut self,
        pair: &AlignedSentence<'_>,
        src_start: usize,
        src_len: usize,
        out: &mut Vec<SampledRule>,
    ) {
        let src_end = src_start + src_len;
        let nt = pair.target.len();
        if self.coverage.len() < nt {
            self.coverage.resize(nt, false);
        }
        self.coverage.fill(false);

        // Tight target span: min/max over all links of the source words.
        let mut span: Option<(usize, usize)> = None;
        for i in src_start..src_end {
            for &j in pair.f2e(i) {
                let j = j as usize;
                self.coverage.set(j, true);
                span = Some(match span {
                    None => (j, j),
                    Some((lo, hi)) => (lo.min(j), hi.max(j)),
                });
            }
        }
        let Some((min_t, max_t)) = span else {
            // Fully unaligned source span.
            return;
        };
        if max_t - min_t >= self.max_tgt_len {
            return;
        }

        for j in min_t..=max_t {
            // A hole in the tight span makes the pair non-contiguous.
            if !self.coverage[j] {
                return;
            }
            // A covered position linking back outside the source span makes
            // the pair inconsistent.
            for &i in pair.e2f(j) {
                if (i as usize) < src_start || i as usize >= src_end {
                    return;
                }
            }
        }

        // Grow outward over unaligned positions, both directions, length
        // bounded.
        let mut start_t = min_t as isize;
        while start_t >= 0
            && (start_t == min_t as isize || !pair.target_aligned(start_t as usize))
            && start_t > max_t as isize - self.max_tgt_len as isize
        {
            let mut end_t = max_t;
            while end_t < nt
                && (end_t == max_t || !pair.target_aligned(end_t))
                && (end_t as isize) < start_t + self.max_tgt_len as isize
            {
                out.push(SampledRule {
                    sentence: pair.index,
                    src_start: src_start as u32,
                    src_end: src_end as u32,
                    tgt_start: start_t as u32,
                    tgt_end: end_t as u32 + 1,
                    lex_e_f: 0.0,
                    lex_f_e: 0.0,
                });
                end_t += 1;
            }
            start_t -= 1;
        }
    }
}
