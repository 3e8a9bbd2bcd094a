//! Longest increasing subsequence.
//!
//! The keyed reconciler maps every new child to the old position it came from
//! (plus one, with `0` for children that are new). The positions in a longest
//! strictly increasing run of that map are children that are already in
//! order, so everything else is the minimal set of nodes to move.
//!
//! # Algorithm
//!
//! Patience sorting in O(n log n):
//!
//! 1. `tails[k]` holds the index of the smallest value that ends an increasing
//!    run of length `k + 1`. Each value either extends the longest run or
//!    replaces the first tail that is not smaller than it (binary search).
//! 2. `prev[i]` remembers the tail in front of `i` when `i` was placed.
//! 3. Walking `prev` back from the last tail recovers one longest run.

/// Indices of a longest strictly increasing subsequence of `seq`, in
/// increasing order. Zero entries are skipped.
pub fn longest_increasing_subsequence(seq: &[usize]) -> Vec<usize> {
    let mut prev = vec![0usize; seq.len()];
    let mut tails: Vec<usize> = Vec::with_capacity(seq.len());

    for (i, &value) in seq.iter().enumerate() {
        if value == 0 {
            continue;
        }

        match tails.last() {
            None => {
                tails.push(i);
                continue;
            }
            Some(&last) if seq[last] < value => {
                prev[i] = last;
                tails.push(i);
                continue;
            }
            Some(_) => {}
        }

        let slot = tails.partition_point(|&tail| seq[tail] < value);
        if value < seq[tails[slot]] {
            if slot > 0 {
                prev[i] = tails[slot - 1];
            }
            tails[slot] = i;
        }
    }

    let mut len = tails.len();
    let Some(&last) = tails.last() else {
        return tails;
    };
    let mut cursor = last;
    while len > 0 {
        len -= 1;
        tails[len] = cursor;
        cursor = prev[cursor];
    }
    tails
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn values(seq: &[usize], positions: &[usize]) -> Vec<usize> {
        positions.iter().map(|&i| seq[i]).collect()
    }

    /// Quadratic reference used to check the length.
    fn reference_len(seq: &[usize]) -> usize {
        let mut best = vec![0usize; seq.len()];
        for i in 0..seq.len() {
            if seq[i] == 0 {
                continue;
            }
            best[i] = 1;
            for j in 0..i {
                if seq[j] != 0 && seq[j] < seq[i] {
                    best[i] = best[i].max(best[j] + 1);
                }
            }
        }
        best.into_iter().max().unwrap_or(0)
    }

    #[test]
    fn empty_and_all_zero() {
        assert!(longest_increasing_subsequence(&[]).is_empty());
        assert!(longest_increasing_subsequence(&[0, 0, 0]).is_empty());
    }

    #[test]
    fn rotation_keeps_the_tail() {
        // [1,2,3] -> [3,1,2]: old positions + 1 for the new order.
        assert_eq!(longest_increasing_subsequence(&[3, 1, 2]), vec![1, 2]);
    }

    #[test]
    fn zeros_are_skipped() {
        let seq = [0, 5, 0, 6, 1, 7];
        let lis = longest_increasing_subsequence(&seq);
        assert_eq!(values(&seq, &lis), vec![5, 6, 7]);
        assert_eq!(lis, vec![1, 3, 5]);
    }

    #[test]
    fn classic_sequence() {
        let seq = [2, 1, 5, 3, 6, 4, 8, 9, 7];
        let lis = longest_increasing_subsequence(&seq);
        assert_eq!(lis, vec![1, 3, 5, 6, 7]);
        assert_eq!(values(&seq, &lis), vec![1, 3, 4, 8, 9]);
    }

    #[test]
    fn reversed_input_yields_one() {
        assert_eq!(longest_increasing_subsequence(&[4, 3, 2, 1]).len(), 1);
    }

    proptest! {
        #[test]
        fn result_is_an_increasing_subsequence(seq in prop::collection::vec(0usize..50, 0..64)) {
            let lis = longest_increasing_subsequence(&seq);

            prop_assert!(lis.windows(2).all(|pair| pair[0] < pair[1]));
            prop_assert!(lis.windows(2).all(|pair| seq[pair[0]] < seq[pair[1]]));
            prop_assert!(lis.iter().all(|&i| seq[i] != 0));
        }

        #[test]
        fn result_is_longest(seq in prop::collection::vec(0usize..50, 0..64)) {
            prop_assert_eq!(longest_increasing_subsequence(&seq).len(), reference_len(&seq));
        }

        #[test]
        fn permutation_of_old_positions(perm in Just((1usize..=24).collect::<Vec<_>>()).prop_shuffle()) {
            let lis = longest_increasing_subsequence(&perm);
            prop_assert_eq!(lis.len(), reference_len(&perm));
        }
    }
}
