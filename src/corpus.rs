//! Parallel corpus storage: concatenated id vectors, sentence prefix sums,
//! and word alignments in packed CSR form.
//!
//! Both sides are stored flat. A sentence is a half-open range of the flat
//! token vector, found by binary search over the prefix-sum table. Alignments
//! are stored twice, once per direction, as (offsets, links) CSR pairs indexed
//! by flat token position; link values are sentence-local word positions on
//! the opposite side. The two directions are transposes of each other.
//!
//! Nothing here owns strings. Tokens are vocabulary ids; the vocabulary lives
//! with the index that owns this corpus.

use bitvec::vec::BitVec;

use crate::error::SabreError;

/// One tokenized, word-aligned sentence pair prior to indexing.
#[derive(Debug, Clone, Default)]
pub struct SentenceTriple {
    pub source: Vec<String>,
    pub target: Vec<String>,
    /// (source position, target position) links, any order, duplicates allowed.
    pub alignment: Vec<(u32, u32)>,
}

/// One side of the corpus: flat tokens plus sentence prefix sums.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusSide {
    pub(crate) tokens: Vec<u32>,
    /// Prefix sums of sentence lengths; `starts.len() == sentences + 1`.
    pub(crate) starts: Vec<u32>,
}

impl CorpusSide {
    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    pub fn sentence_count(&self) -> usize {
        self.starts.len() - 1
    }

    pub(crate) fn sentence_range(&self, sent: u32) -> std::ops::Range<usize> {
        self.starts[sent as usize] as usize..self.starts[sent as usize + 1] as usize
    }

    pub(crate) fn sentence_tokens(&self, sent: u32) -> &[u32] {
        &self.tokens[self.sentence_range(sent)]
    }

    /// Map a flat token position to (sentence, word position).
    pub(crate) fn locate_token(&self, flat: u32) -> (u32, u32) {
        // partition_point returns the first start > flat; the sentence is the
        // one before it.
        let sent = self.starts.partition_point(|&s| s <= flat) - 1;
        (sent as u32, flat - self.starts[sent])
    }
}

/// Packed CSR word alignment for one direction.
///
/// `offsets` is indexed by flat token position; `links[offsets[p]..offsets[p+1]]`
/// are the aligned word positions (sentence-local, ascending) on the other side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrAlignment {
    pub(crate) offsets: Vec<u32>,
    pub(crate) links: Vec<u32>,
}

impl CsrAlignment {
    pub(crate) fn links_at(&self, flat: usize) -> &[u32] {
        &self.links[self.offsets[flat] as usize..self.offsets[flat + 1] as usize]
    }
}

/// The whole aligned bitext in integer form.
#[derive(Debug, Clone)]
pub struct ParallelCorpus {
    pub(crate) src: CorpusSide,
    pub(crate) tgt: CorpusSide,
    pub(crate) f2e: CsrAlignment,
    pub(crate) e2f: CsrAlignment,
    /// One bit per flat target position: true iff some source word aligns to it.
    pub(crate) aligned_tgt: BitVec,
}

impl ParallelCorpus {
    /// Convert id-translated sentence triples into flat corpus form.
    ///
    /// `ids` must hold one (source ids, target ids, alignment) entry per
    /// sentence. Alignment links outside the sentence bounds are rejected.
    pub(crate) fn from_id_triples(
        ids: &[(Vec<u32>, Vec<u32>, Vec<(u32, u32)>)],
    ) -> Result<Self, SabreError> {
        let mut src = CorpusSide {
            tokens: Vec::new(),
            starts: vec![0],
        };
        let mut tgt = CorpusSide {
            tokens: Vec::new(),
            starts: vec![0],
        };

        // Per-sentence link lists, sentence-local and sorted, before packing.
        let mut f2e_lists: Vec<Vec<u32>> = Vec::new();
        let mut e2f_lists: Vec<Vec<u32>> = Vec::new();

        for (n, (s_ids, t_ids, alignment)) in ids.iter().enumerate() {
            let (ns, nt) = (s_ids.len(), t_ids.len());
            src.tokens.extend_from_slice(s_ids);
            src.starts.push(src.tokens.len() as u32);
            tgt.tokens.extend_from_slice(t_ids);
            tgt.starts.push(tgt.tokens.len() as u32);

            let mut f2e: Vec<Vec<u32>> = vec![Vec::new(); ns];
            let mut e2f: Vec<Vec<u32>> = vec![Vec::new(); nt];
            for &(i, j) in alignment {
                if i as usize >= ns || j as usize >= nt {
                    return Err(SabreError::corrupt(format!(
                        "alignment link {}-{} out of range in sentence {} ({} x {})",
                        i, j, n, ns, nt
                    )));
                }
                f2e[i as usize].push(j);
                e2f[j as usize].push(i);
            }
            for list in &mut f2e {
                list.sort_unstable();
                list.dedup();
            }
            for list in &mut e2f {
                list.sort_unstable();
                list.dedup();
            }
            f2e_lists.extend(f2e);
            e2f_lists.extend(e2f);
        }

        let f2e = pack_csr(&f2e_lists);
        let e2f = pack_csr(&e2f_lists);
        let aligned_tgt = aligned_bits(&e2f, tgt.token_count());

        Ok(Self {
            src,
            tgt,
            f2e,
            e2f,
            aligned_tgt,
        })
    }

    /// Reassemble a corpus from deserialized parts, revalidating invariants.
    pub(crate) fn from_parts(
        src: CorpusSide,
        tgt: CorpusSide,
        f2e: CsrAlignment,
        e2f: CsrAlignment,
    ) -> Result<Self, SabreError> {
        validate_side(&src, "source")?;
        validate_side(&tgt, "target")?;
        if src.sentence_count() != tgt.sentence_count() {
            return Err(SabreError::corrupt(format!(
                "sentence count mismatch: {} source vs {} target",
                src.sentence_count(),
                tgt.sentence_count()
            )));
        }
        validate_csr(&f2e, &src, &tgt, "f2e")?;
        validate_csr(&e2f, &tgt, &src, "e2f")?;
        let aligned_tgt = aligned_bits(&e2f, tgt.token_count());
        Ok(Self {
            src,
            tgt,
            f2e,
            e2f,
            aligned_tgt,
        })
    }

    pub fn sentence_count(&self) -> usize {
        self.src.sentence_count()
    }

    pub fn source_token_count(&self) -> usize {
        self.src.token_count()
    }

    pub fn target_token_count(&self) -> usize {
        self.tgt.token_count()
    }

    /// Borrowed view of one sentence pair.
    pub fn sentence(&self, sent: u32) -> AlignedSentence<'_> {
        let src_range = self.src.sentence_range(sent);
        let tgt_range = self.tgt.sentence_range(sent);
        AlignedSentence {
            corpus: self,
            index: sent,
            src_base: src_range.start,
            tgt_base: tgt_range.start,
            source: &self.src.tokens[src_range],
            target: &self.tgt.tokens[tgt_range],
        }
    }
}

/// Immutable view of one aligned sentence pair.
///
/// Word positions in the API are sentence-local; the view translates them to
/// flat corpus positions internally.
#[derive(Clone, Copy)]
pub struct AlignedSentence<'a> {
    corpus: &'a ParallelCorpus,
    /// Sentence index in the corpus.
    pub index: u32,
    src_base: usize,
    tgt_base: usize,
    pub source: &'a [u32],
    pub target: &'a [u32],
}

impl<'a> AlignedSentence<'a> {
    /// Target positions aligned to source word `i`, ascending.
    pub fn f2e(&self, i: usize) -> &'a [u32] {
        self.corpus.f2e.links_at(self.src_base + i)
    }

    /// Source positions aligned to target word `j`, ascending.
    pub fn e2f(&self, j: usize) -> &'a [u32] {
        self.corpus.e2f.links_at(self.tgt_base + j)
    }

    /// True iff target word `j` has at least one alignment link.
    pub fn target_aligned(&self, j: usize) -> bool {
        self.corpus.aligned_tgt[self.tgt_base + j]
    }
}

fn pack_csr(lists: &[Vec<u32>]) -> CsrAlignment {
    let mut offsets = Vec::with_capacity(lists.len() + 1);
    let mut links = Vec::new();
    offsets.push(0);
    for list in lists {
        links.extend_from_slice(list);
        offsets.push(links.len() as u32);
    }
    CsrAlignment { offsets, links }
}

fn aligned_bits(e2f: &CsrAlignment, tgt_tokens: usize) -> BitVec {
    let mut bits = BitVec::repeat(false, tgt_tokens);
    for flat in 0..tgt_tokens {
        if !e2f.links_at(flat).is_empty() {
            bits.set(flat, true);
        }
    }
    bits
}

fn validate_side(side: &CorpusSide, name: &str) -> Result<(), SabreError> {
    if side.starts.is_empty() || side.starts[0] != 0 {
        return Err(SabreError::corrupt(format!(
            "{} prefix sums must start at 0",
            name
        )));
    }
    if !side.starts.windows(2).all(|w| w[0] <= w[1]) {
        return Err(SabreError::corrupt(format!(
            "{} prefix sums not monotone",
            name
        )));
    }
    if *side.starts.last().unwrap_or(&0) as usize != side.tokens.len() {
        return Err(SabreError::corrupt(format!(
            "{} prefix sums do not cover the token vector",
            name
        )));
    }
    Ok(())
}

fn validate_csr(
    csr: &CsrAlignment,
    own: &CorpusSide,
    other: &CorpusSide,
    name: &str,
) -> Result<(), SabreError> {
    if csr.offsets.len() != own.token_count() + 1 {
        return Err(SabreError::corrupt(format!(
            "{} offsets length {} does not match token count {}",
            name,
            csr.offsets.len(),
            own.token_count()
        )));
    }
    if !csr.offsets.windows(2).all(|w| w[0] <= w[1]) {
        return Err(SabreError::corrupt(format!("{} offsets not monotone", name)));
    }
    if *csr.offsets.last().unwrap_or(&0) as usize != csr.links.len() {
        return Err(SabreError::corrupt(format!(
            "{} offsets do not cover the link vector",
            name
        )));
    }
    for flat in 0..own.token_count() {
        let (sent, _) = own.locate_token(flat as u32);
        let other_len = other.sentence_range(sent).len() as u32;
        for &link in csr.links_at(flat) {
            if link >= other_len {
                return Err(SabreError::corrupt(format!(
                    "{} link {} out of range in sentence {} (length {})",
                    name, link, sent, other_len
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy() -> ParallelCorpus {
        // s0: [0 1] / [10 11], links 0-0 1-1
        // s1: [2] / [12 13], link 0-1
        let ids = vec![
            (vec![0, 1], vec![10, 11], vec![(0, 0), (1, 1)]),
            (vec![2], vec![12, 13], vec![(0, 1)]),
        ];
        ParallelCorpus::from_id_triples(&ids).unwrap()
    }

    #[test]
    fn sentence_views() {
        let c = toy();
        assert_eq!(c.sentence_count(), 2);
        let s0 = c.sentence(0);
        assert_eq!(s0.source, &[0, 1]);
        assert_eq!(s0.target, &[10, 11]);
        assert_eq!(s0.f2e(1), &[1]);
        assert_eq!(s0.e2f(0), &[0]);
        let s1 = c.sentence(1);
        assert_eq!(s1.f2e(0), &[1]);
        assert!(!s1.target_aligned(0));
        assert!(s1.target_aligned(1));
    }

    #[test]
    fn locate_token_is_inverse_of_prefix_sums() {
        let c = toy();
        assert_eq!(c.src.locate_token(0), (0, 0));
        assert_eq!(c.src.locate_token(1), (0, 1));
        assert_eq!(c.src.locate_token(2), (1, 0));
        assert_eq!(c.tgt.locate_token(3), (1, 1));
    }

    #[test]
    fn out_of_range_link_rejected() {
        let ids = vec![(vec![0], vec![1], vec![(0, 5)])];
        assert!(matches!(
            ParallelCorpus::from_id_triples(&ids),
            Err(SabreError::CorruptIndex(_))
        ));
    }

    #[test]
    fn transposed_directions_agree() {
        let c = toy();
        for sent in 0..c.sentence_count() as u32 {
            let pair = c.sentence(sent);
            for i in 0..pair.source.len() {
                for &j in pair.f2e(i) {
                    assert!(pair.e2f(j as usize).contains(&(i as u32)));
                }
            }
        }
    }
}
