//! Predictor subsets drawn from a location's candidate list

use serde::{Deserialize, Serialize};
use std::fmt;

/// A non-empty selection of candidate locations, in candidate-list order.
///
/// The member list doubles as the canonical key of the subset.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PredictorSubset(Vec<String>);

impl PredictorSubset {
    pub fn members(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, location: &str) -> bool {
        self.0.iter().any(|m| m == location)
    }

    fn from_indices(candidates: &[String], indices: &[usize]) -> Self {
        Self(indices.iter().map(|&i| candidates[i].clone()).collect())
    }
}

impl fmt::Display for PredictorSubset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.0.join(", "))
    }
}

/// Longest candidate list a location may carry; the search evaluates
/// `2^n - 1` subsets of it
pub const MAX_CANDIDATES: usize = 16;

/// Every subset of `candidates` that the search evaluates, in evaluation order.
///
/// A single candidate yields just itself. Otherwise the full set comes first,
/// then each singleton in list order, then the combinations of size
/// `2..len` with `k` ascending and lexicographic order within each size.
/// Every non-empty subset appears exactly once.
pub fn enumerate_subsets(candidates: &[String]) -> Vec<PredictorSubset> {
    let n = candidates.len();
    match n {
        0 => return Vec::new(),
        1 => return vec![PredictorSubset(candidates.to_vec())],
        _ => {}
    }

    let mut subsets = Vec::with_capacity((1usize << n.min(MAX_CANDIDATES)) - 1);
    subsets.push(PredictorSubset(candidates.to_vec()));
    subsets.extend((0..n).map(|i| PredictorSubset::from_indices(candidates, &[i])));
    for k in 2..n {
        for indices in Combinations::new(n, k) {
            subsets.push(PredictorSubset::from_indices(candidates, &indices));
        }
    }
    subsets
}

/// Lexicographic k-combinations of `0..n`
struct Combinations {
    n: usize,
    indices: Vec<usize>,
    done: bool,
}

impl Combinations {
    fn new(n: usize, k: usize) -> Self {
        Self {
            n,
            indices: (0..k).collect(),
            done: k == 0 || k > n,
        }
    }
}

impl Iterator for Combinations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let current = self.indices.clone();

        let k = self.indices.len();
        // rightmost index that can still move right
        match (0..k).rev().find(|&i| self.indices[i] < self.n - k + i) {
            Some(i) => {
                self.indices[i] += 1;
                for j in i + 1..k {
                    self.indices[j] = self.indices[j - 1] + 1;
                }
            }
            None => self.done = true,
        }

        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn combinations_are_lexicographic() {
        let combos: Vec<_> = Combinations::new(4, 2).collect();
        assert_eq!(
            combos,
            vec![
                vec![0, 1],
                vec![0, 2],
                vec![0, 3],
                vec![1, 2],
                vec![1, 3],
                vec![2, 3]
            ]
        );
        assert_eq!(Combinations::new(3, 3).count(), 1);
        assert_eq!(Combinations::new(2, 3).count(), 0);
    }

    #[test]
    fn three_candidates_order() {
        let subsets: Vec<String> = enumerate_subsets(&names(&["A", "B", "C"]))
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            subsets,
            vec!["(A, B, C)", "(A)", "(B)", "(C)", "(A, B)", "(A, C)", "(B, C)"]
        );
    }

    #[test]
    fn empty_list_yields_nothing() {
        assert!(enumerate_subsets(&[]).is_empty());
    }
}
