//! Order-independent combination hashing of identity tokens
//!
//! Layers cache a single hash over their static lights and over their camera
//! set so the renderer can test "same configuration" in O(1) instead of
//! comparing the sets element by element every frame. The tokens are sorted
//! before folding, so any permutation of the same set hashes identically.
//!
//! `0` is reserved: it is the hash of the empty set and is never produced
//! for a non-empty one.

/// Hash value of the empty token set.
pub const EMPTY_HASH: u64 = 0;

/// Mixes a 64-bit value through a finalizer with full avalanche behavior.
fn mix(mut x: u64) -> u64 {
    x ^= x >> 30;
    x = x.wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^= x >> 31;
    x
}

/// Combines a sorted slice of identity tokens into a single hash.
///
/// The caller is responsible for sorting; layer code keeps its token
/// snapshots sorted as part of hash invalidation. Returns [`EMPTY_HASH`]
/// for an empty slice and a non-zero value otherwise.
pub fn combine_sorted(tokens: &[u64]) -> u64 {
    if tokens.is_empty() {
        return EMPTY_HASH;
    }
    let mut h = 0xcbf2_9ce4_8422_2325u64;
    for &token in tokens {
        h = mix(h ^ token).wrapping_add(0x9e37_79b9_7f4a_7c15);
    }
    let h = mix(h);
    // keep 0 as the "empty set" sentinel
    if h == EMPTY_HASH {
        1
    } else {
        h
    }
}

/// Sorts the tokens in place, then combines them.
pub fn combine_unordered(tokens: &mut [u64]) -> u64 {
    tokens.sort_unstable();
    combine_sorted(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_set_hashes_to_zero() {
        assert_eq!(combine_sorted(&[]), EMPTY_HASH);
    }

    #[test]
    fn test_deterministic() {
        let tokens = [3u64, 7, 42];
        assert_eq!(combine_sorted(&tokens), combine_sorted(&tokens));
    }

    #[test]
    fn test_order_independent() {
        let mut a = [9u64, 1, 500, 77];
        let mut b = [77u64, 500, 9, 1];
        assert_eq!(combine_unordered(&mut a), combine_unordered(&mut b));
    }

    #[test]
    fn test_membership_sensitivity() {
        let base = combine_sorted(&[1, 2, 3]);
        assert_ne!(base, combine_sorted(&[1, 2]));
        assert_ne!(base, combine_sorted(&[1, 2, 4]));
        assert_ne!(base, combine_sorted(&[1, 2, 3, 4]));
    }

    #[test]
    fn test_non_empty_never_zero() {
        for token in 0..256u64 {
            assert_ne!(combine_sorted(&[token]), EMPTY_HASH);
        }
    }
}
