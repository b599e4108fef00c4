//! Bounded pairwise swap sort.
//!
//! For each position, the manager there is swapped with the first later
//! manager it depends on, and the scan restarts at the same position. The
//! number of swaps per position is capped at `len - position + 1` so a
//! circular relation still terminates; the caller's verification then
//! rejects the result.
//!
//! Unrelated managers can change relative order here, so the stable
//! strategy is the default.

use super::DependencyMatrix;

pub(crate) fn bounded_swap_sort(deps: &DependencyMatrix) -> Vec<usize> {
    let mut sorted: Vec<usize> = (0..deps.len()).collect();

    for position in 0..sorted.len().saturating_sub(1) {
        let mut limit = sorted.len() - position + 1;
        let mut switched = true;

        while switched && limit > 0 {
            switched = false;
            limit -= 1;

            let testing = sorted[position];
            if let Some(j) = (position + 1..sorted.len()).find(|&j| deps.depends(testing, sorted[j])) {
                sorted.swap(position, j);
                switched = true;
            }
        }
    }
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moves_dependency_forward() {
        let deps = DependencyMatrix::from_fn(3, |a, b| a == 0 && b == 2);
        assert_eq!(bounded_swap_sort(&deps), vec![2, 1, 0]);
    }

    #[test]
    fn chain_is_sorted() {
        // 0 after 1, 1 after 2
        let deps = DependencyMatrix::from_fn(3, |a, b| b == a + 1);
        assert_eq!(bounded_swap_sort(&deps), vec![2, 1, 0]);
    }

    #[test]
    fn cycle_terminates() {
        let deps = DependencyMatrix::from_fn(2, |_, _| true);
        let sorted = bounded_swap_sort(&deps);
        assert_eq!(sorted.len(), 2);
        assert!(super::super::first_violation(&deps, &sorted).is_some());
    }

    #[test]
    fn no_relation_is_identity() {
        let deps = DependencyMatrix::from_fn(4, |_, _| false);
        assert_eq!(bounded_swap_sort(&deps), vec![0, 1, 2, 3]);
    }
}
