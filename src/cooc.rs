//! Concurrent lexical co-occurrence counts.
//!
//! Three count maps: joint (source id, target id) counts plus one marginal
//! per side. All counts are increment-only and updated under the shard lock
//! of the owning map entry, so concurrent writers are linearizable per entry
//! and readers never observe a count decrease. `NULL_ID` stands in for the
//! missing partner of an unaligned word.

use dashmap::DashMap;

/// Reserved id pairing with unaligned words.
pub const NULL_ID: u32 = u32::MAX;

/// Joint and marginal lexical counts learned from the aligned corpus.
#[derive(Debug, Default)]
pub struct LexCoocTable {
    src_marginal: DashMap<u32, u64>,
    tgt_marginal: DashMap<u32, u64>,
    joint: DashMap<(u32, u32), u64>,
}

impl LexCoocTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one co-occurrence of source id `a` with target id `b`.
    /// Either may be `NULL_ID`, never both.
    pub fn add_cooc(&self, a: u32, b: u32) {
        debug_assert!(a != NULL_ID || b != NULL_ID);
        *self.joint.entry((a, b)).or_insert(0) += 1;
    }

    pub fn incr_src_marginal(&self, id: u32, delta: u64) {
        *self.src_marginal.entry(id).or_insert(0) += delta;
    }

    pub fn incr_tgt_marginal(&self, id: u32, delta: u64) {
        *self.tgt_marginal.entry(id).or_insert(0) += delta;
    }

    /// Joint count of (source `a`, target `b`); 0 when never seen.
    pub fn joint(&self, a: u32, b: u32) -> u64 {
        self.joint.get(&(a, b)).map_or(0, |c| *c)
    }

    pub fn src_marginal(&self, id: u32) -> u64 {
        self.src_marginal.get(&id).map_or(0, |c| *c)
    }

    pub fn tgt_marginal(&self, id: u32) -> u64 {
        self.tgt_marginal.get(&id).map_or(0, |c| *c)
    }

    /// Number of distinct joint pairs, for construction-time reporting.
    pub fn joint_entries(&self) -> usize {
        self.joint.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn counts_accumulate() {
        let t = LexCoocTable::new();
        t.add_cooc(1, 2);
        t.add_cooc(1, 2);
        t.add_cooc(1, 3);
        t.incr_src_marginal(1, 3);
        t.incr_tgt_marginal(2, 2);
        assert_eq!(t.joint(1, 2), 2);
        assert_eq!(t.joint(1, 3), 1);
        assert_eq!(t.joint(9, 9), 0);
        assert_eq!(t.src_marginal(1), 3);
        assert_eq!(t.tgt_marginal(2), 2);
        assert_eq!(t.tgt_marginal(3), 0);
    }

    #[test]
    fn null_pairings_are_counted() {
        let t = LexCoocTable::new();
        t.add_cooc(4, NULL_ID);
        t.add_cooc(NULL_ID, 5);
        assert_eq!(t.joint(4, NULL_ID), 1);
        assert_eq!(t.joint(NULL_ID, 5), 1);
    }

    #[test]
    fn concurrent_increments_sum_exactly() {
        let t = Arc::new(LexCoocTable::new());
        let threads = 8;
        let per_thread = 1000;
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let t = Arc::clone(&t);
                thread::spawn(move || {
                    for _ in 0..per_thread {
                        t.add_cooc(1, 2);
                        t.incr_src_marginal(1, 1);
                        t.incr_tgt_marginal(2, 1);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let expect = (threads * per_thread) as u64;
        assert_eq!(t.joint(1, 2), expect);
        assert_eq!(t.src_marginal(1), expect);
        assert_eq!(t.tgt_marginal(2), expect);
    }
}
