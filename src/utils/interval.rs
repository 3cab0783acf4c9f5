//! First-fit search over sorted, non-overlapping blocks.
//!
//! Shared by the IPv4 prefix (`u64`), IPv6 prefix (`BigInt`) and VLAN range
//! (`i128`, alignment 1) strategies. A block is the half-open interval
//! `[start, start + size)`.

use num_traits::Num;
use std::collections::BTreeSet;
use std::fmt::Display;

/// Integer types the interval primitives work over
pub trait Scalar: Clone + Ord + Display + Num {}

impl<T: Clone + Ord + Display + Num> Scalar for T {}

/// A contiguous run of addresses or ids
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block<N> {
    pub start: N,
    pub size: N,
}

impl<N: Scalar> Block<N> {
    pub fn new(start: N, size: N) -> Self {
        Self { start, size }
    }

    /// One past the last member
    pub fn end(&self) -> N {
        self.start.clone() + self.size.clone()
    }

    pub fn overlaps(&self, other: &Block<N>) -> bool {
        self.start < other.end() && other.start < self.end()
    }

    /// True when `other` lies entirely inside this block
    pub fn contains(&self, other: &Block<N>) -> bool {
        other.start >= self.start && other.end() <= self.end()
    }
}

/// Stable sort by end address, so equal ends keep their input order
pub fn sort_by_end<N: Scalar>(blocks: &mut [Block<N>]) {
    blocks.sort_by_key(|block| block.end());
}

/// Round `value` up to the next multiple of `alignment`
pub fn align_up<N: Scalar>(value: N, alignment: &N) -> N {
    let remainder = value.clone() % alignment.clone();
    if remainder.is_zero() {
        value
    } else {
        value + alignment.clone() - remainder
    }
}

/// Find the first aligned start inside `parent` where a block of `size` fits.
///
/// `sorted` must be sorted by end (see [`sort_by_end`]). The cursor starts at
/// the parent base and, after each allocated block, jumps to the first
/// aligned address at or past that block's end.
pub fn first_fit<N: Scalar>(parent: &Block<N>, sorted: &[Block<N>], size: &N, alignment: &N) -> Option<N> {
    let mut possible = align_up(parent.start.clone(), alignment);

    for allocated in sorted {
        if allocated.start >= possible && allocated.start.clone() - possible.clone() >= *size {
            return Some(possible);
        }
        let next = align_up(allocated.end(), alignment);
        if next > possible {
            possible = next;
        }
    }

    if possible.clone() + size.clone() <= parent.end() {
        Some(possible)
    } else {
        None
    }
}

/// Suggest the nearest aligned start at or after `network` that has room
/// for a block of `size` before the next allocation. Used to tell a caller
/// which network address to ask for instead of a misaligned one.
pub fn next_free_after<N: Scalar>(network: &N, sorted: &[Block<N>], size: &N, alignment: &N) -> N {
    let mut possible = network.clone();

    for allocated in sorted {
        if allocated.start > *network
            && allocated.start >= possible
            && allocated.start.clone() - possible.clone() >= *size
        {
            return possible;
        }
        let next = align_up(allocated.end(), alignment);
        if next > possible {
            possible = next;
        }
    }

    possible
}

/// Lowest value in `[first, last]` missing from `taken`.
///
/// Checks at most `taken.len() + 1` candidates and never steps past `last`,
/// so a range ending at the type's maximum is safe.
pub fn first_free<N: Scalar>(first: N, last: &N, taken: &BTreeSet<N>) -> Option<N> {
    let mut candidate = first;
    while candidate <= *last {
        if !taken.contains(&candidate) {
            return Some(candidate);
        }
        if candidate == *last {
            break;
        }
        candidate = candidate + N::one();
    }
    None
}

/// Index of the first allocated block overlapping `candidate`, if any
pub fn find_overlap<N: Scalar>(candidate: &Block<N>, allocated: &[Block<N>]) -> Option<usize> {
    allocated.iter().position(|block| block.overlaps(candidate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;

    fn blocks(pairs: &[(u64, u64)]) -> Vec<Block<u64>> {
        pairs.iter().map(|(s, n)| Block::new(*s, *n)).collect()
    }

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(16u64, &32), 32);
        assert_eq!(align_up(32u64, &32), 32);
        assert_eq!(align_up(0u64, &64), 0);
        assert_eq!(align_up(17u64, &1), 17);
        assert_eq!(align_up(BigInt::from(5), &BigInt::from(4)), BigInt::from(8));
    }

    #[test]
    fn test_sort_by_end_is_stable() {
        let mut list = blocks(&[(64, 64), (0, 16), (8, 8), (32, 32)]);
        sort_by_end(&mut list);
        assert_eq!(list, blocks(&[(0, 16), (8, 8), (32, 32), (64, 64)]));
    }

    #[test]
    fn test_first_fit_gap_before_existing() {
        let parent = Block::new(0u64, 256);
        let allocated = blocks(&[(16, 16)]);
        assert_eq!(first_fit(&parent, &allocated, &16, &16), Some(0));
    }

    #[test]
    fn test_first_fit_skips_misaligned_gap() {
        let parent = Block::new(0u64, 256);
        // free space 16..32 is too small for an aligned /27
        let allocated = blocks(&[(0, 16)]);
        assert_eq!(first_fit(&parent, &allocated, &32, &32), Some(32));
    }

    #[test]
    fn test_first_fit_tail_and_exhaustion() {
        let parent = Block::new(100u64, 10);
        let allocated = blocks(&[(100, 5)]);
        assert_eq!(first_fit(&parent, &allocated, &5, &1), Some(105));
        assert_eq!(first_fit(&parent, &allocated, &6, &1), None);
        assert_eq!(first_fit(&parent, &[], &10, &1), Some(100));
    }

    #[test]
    fn test_next_free_after() {
        // dead::be02/127 taken, caller asked for be02 in a /127
        let allocated = blocks(&[(2, 2)]);
        assert_eq!(next_free_after(&2u64, &allocated, &2, &2), 4);
        // nothing in the way
        assert_eq!(next_free_after(&8u64, &allocated, &2, &2), 8);
        // room before the next block
        let allocated = blocks(&[(0, 2), (8, 2)]);
        assert_eq!(next_free_after(&4u64, &allocated, &2, &2), 4);
    }

    #[test]
    fn test_first_free() {
        let taken: BTreeSet<u64> = [1, 2, 4].into_iter().collect();
        assert_eq!(first_free(1, &10, &taken), Some(3));
        assert_eq!(first_free(0, &10, &taken), Some(0));
        assert_eq!(first_free(1, &2, &taken), None);
        assert_eq!(first_free(4, &4, &taken), None);

        let taken: BTreeSet<i64> = [-1, 0].into_iter().collect();
        assert_eq!(first_free(-1, &5, &taken), Some(1));

        let taken: BTreeSet<i64> = [i64::MAX - 1, i64::MAX].into_iter().collect();
        assert_eq!(first_free(i64::MAX - 1, &i64::MAX, &taken), None);
        assert_eq!(first_free(i64::MAX - 2, &i64::MAX, &taken), Some(i64::MAX - 2));
    }

    #[test]
    fn test_overlap() {
        let allocated = blocks(&[(0, 16), (32, 32)]);
        assert!(find_overlap(&Block::new(16, 16), &allocated).is_none());
        assert_eq!(find_overlap(&Block::new(48, 4), &allocated), Some(1));
        assert!(Block::new(0u64, 256).contains(&Block::new(192, 64)));
        assert!(!Block::new(0u64, 256).contains(&Block::new(224, 64)));
    }
}
