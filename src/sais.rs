//! SA-IS: linear-time suffix array construction by induced sorting, over an
//! integer alphabet.
//!
//! The corpus text handed in here is a vector of vocabulary ids shifted up to
//! make room for two reserved values: a unique terminal (0) at the very end
//! and a sentence separator (1) between sentences. Both compare below every
//! real token, so no suffix ordering ever lets a phrase leak across a
//! sentence boundary.
//!
//! # References
//!
//! - Nong, Zhang, Chan (2009): "Linear Suffix Array Construction by Almost
//!   Pure Induced-Sorting" <https://doi.org/10.1109/DCC.2009.42>

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum SuffixType {
    /// Suffix is lexicographically smaller than the one starting next.
    S,
    /// Suffix is lexicographically larger than the one starting next.
    L,
}

/// Build the suffix array of `text` in O(n) time.
///
/// `alphabet_size` must exceed every value in `text`. The recursion also
/// feeds itself reduced strings through this entry point; tiny inputs are
/// sorted directly.
pub(crate) fn suffix_array(text: &[u32], alphabet_size: u32) -> Vec<u32> {
    let n = text.len();
    if n <= 2 {
        let mut sa: Vec<u32> = (0..n as u32).collect();
        sa.sort_unstable_by(|&a, &b| text[a as usize..].cmp(&text[b as usize..]));
        return sa;
    }

    let types = classify(text);
    let lms: Vec<u32> = (1..n)
        .filter(|&i| is_lms(&types, i))
        .map(|i| i as u32)
        .collect();
    if lms.is_empty() {
        // Monotone text: every suffix ordering follows from position alone.
        let mut sa: Vec<u32> = (0..n as u32).collect();
        sa.sort_unstable_by(|&a, &b| text[a as usize..].cmp(&text[b as usize..]));
        return sa;
    }
    let buckets = bucket_sizes(text, alphabet_size as usize);

    // First induced sort: approximate LMS order.
    let mut sa = vec![u32::MAX; n];
    place_lms(&mut sa, text, &buckets, &lms);
    induce(&mut sa, text, &types, &buckets);

    // Name LMS substrings in their induced order.
    let mut names = vec![0u32; n];
    let mut name = 0u32;
    let mut prev: Option<usize> = None;
    for &p in sa.iter() {
        let p = p as usize;
        if p >= n || !is_lms(&types, p) {
            continue;
        }
        if let Some(q) = prev {
            if !lms_equal(text, &types, q, p) {
                name += 1;
            }
        }
        names[p] = name;
        prev = Some(p);
    }
    let unique = name as usize + 1;

    // Reduced problem: LMS names in text order. Recurse only if names repeat.
    let reduced: Vec<u32> = lms.iter().map(|&p| names[p as usize]).collect();
    let lms_order: Vec<u32> = if unique < lms.len() {
        suffix_array(&reduced, unique as u32)
    } else {
        let mut order: Vec<u32> = (0..reduced.len() as u32).collect();
        order.sort_unstable_by_key(|&i| reduced[i as usize]);
        order
    };

    // Final induced sort with LMS suffixes in true order.
    let sorted_lms: Vec<u32> = lms_order.iter().map(|&i| lms[i as usize]).collect();
    sa.fill(u32::MAX);
    place_lms(&mut sa, text, &buckets, &sorted_lms);
    induce(&mut sa, text, &types, &buckets);
    sa
}

fn classify(text: &[u32]) -> Vec<SuffixType> {
    let n = text.len();
    let mut types = vec![SuffixType::S; n];
    for i in (0..n - 1).rev() {
        types[i] = match text[i].cmp(&text[i + 1]) {
            std::cmp::Ordering::Greater => SuffixType::L,
            std::cmp::Ordering::Less => SuffixType::S,
            std::cmp::Ordering::Equal => types[i + 1],
        };
    }
    types
}

#[inline]
fn is_lms(types: &[SuffixType], i: usize) -> bool {
    i > 0 && types[i] == SuffixType::S && types[i - 1] == SuffixType::L
}

fn bucket_sizes(text: &[u32], alphabet_size: usize) -> Vec<u32> {
    let mut sizes = vec![0u32; alphabet_size];
    for &c in text {
        sizes[c as usize] += 1;
    }
    sizes
}

fn bucket_heads(sizes: &[u32]) -> Vec<u32> {
    let mut heads = Vec::with_capacity(sizes.len());
    let mut sum = 0u32;
    for &s in sizes {
        heads.push(sum);
        sum += s;
    }
    heads
}

fn bucket_tails(sizes: &[u32]) -> Vec<u32> {
    let mut tails = Vec::with_capacity(sizes.len());
    let mut sum = 0u32;
    for &s in sizes {
        sum += s;
        tails.push(sum);
    }
    tails
}

/// Drop LMS positions at their bucket tails, in the given order.
fn place_lms(sa: &mut [u32], text: &[u32], buckets: &[u32], lms: &[u32]) {
    let mut tails = bucket_tails(buckets);
    for &pos in lms.iter().rev() {
        let c = text[pos as usize] as usize;
        tails[c] -= 1;
        sa[tails[c] as usize] = pos;
    }
}

/// Induce L-type then S-type suffixes from the placed LMS positions.
fn induce(sa: &mut [u32], text: &[u32], types: &[SuffixType], buckets: &[u32]) {
    let n = sa.len();
    let mut heads = bucket_heads(buckets);
    for i in 0..n {
        let p = sa[i];
        if p == u32::MAX || p == 0 {
            continue;
        }
        let j = (p - 1) as usize;
        if types[j] == SuffixType::L {
            let c = text[j] as usize;
            sa[heads[c] as usize] = j as u32;
            heads[c] += 1;
        }
    }
    let mut tails = bucket_tails(buckets);
    for i in (0..n).rev() {
        let p = sa[i];
        if p == u32::MAX || p == 0 {
            continue;
        }
        let j = (p - 1) as usize;
        if types[j] == SuffixType::S {
            let c = text[j] as usize;
            tails[c] -= 1;
            sa[tails[c] as usize] = j as u32;
        }
    }
}

/// Compare two LMS substrings for equality, values and types both.
fn lms_equal(text: &[u32], types: &[SuffixType], i: usize, j: usize) -> bool {
    if i == j {
        return true;
    }
    let n = text.len();
    let mut k = 0;
    loop {
        let (pi, pj) = (i + k, j + k);
        if pi >= n || pj >= n {
            return pi >= n && pj >= n;
        }
        if text[pi] != text[pj] || types[pi] != types[pj] {
            return false;
        }
        if k > 0 {
            let (li, lj) = (is_lms(types, pi), is_lms(types, pj));
            if li && lj {
                return true;
            }
            if li != lj {
                return false;
            }
        }
        k += 1;
    }
}
