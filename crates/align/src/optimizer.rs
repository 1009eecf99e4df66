//! Exhaustive assignment of the residual pools.
//!
//! Every permutation of the residual B pool is paired positionally against
//! the residual A pool and the one with the smallest summed distance wins.
//! The search visits `|R_B|!` permutations; it is only meant for the handful
//! of items left on a receipt after greedy matching. Pools above the
//! configured cap are not searched at all.

use crate::matcher::Pools;
use crate::model::{AlignedPair, PairSource};
use crate::scorer::Scorer;

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    /// One pair per position, in residual A order.
    pub pairs: Vec<AlignedPair>,
    /// Summed distance of the chosen permutation; `None` when nothing was searched.
    pub total: Option<f64>,
    /// Permutations evaluated.
    pub permutations: usize,
    /// The pool exceeded `max_residual` and was paired in original order.
    pub capped: bool,
}

pub fn optimize(
    a: &[&str],
    b: &[&str],
    residual: &Pools,
    scorer: &Scorer<'_>,
    max_residual: usize,
) -> Assignment {
    let n = residual.b.len();
    let identity: Vec<usize> = (0..n).collect();

    if n > max_residual {
        return Assignment {
            pairs: positional(residual, &identity, PairSource::Unsearched),
            total: None,
            permutations: 0,
            capped: true,
        };
    }

    if n <= 1 {
        return Assignment {
            pairs: positional(residual, &identity, PairSource::Optimized),
            total: None,
            permutations: 0,
            capped: false,
        };
    }

    let costs = CostMatrix::build(a, b, residual, scorer);

    let mut perm = identity;
    let mut best = perm.clone();
    let mut best_total = costs.total(&perm);
    let mut permutations = 1;

    while next_permutation(&mut perm) {
        permutations += 1;
        let total = costs.total(&perm);
        if total < best_total {
            best_total = total;
            best.copy_from_slice(&perm);
        }
    }

    Assignment {
        pairs: positional(residual, &best, PairSource::Optimized),
        total: Some(best_total),
        permutations,
        capped: false,
    }
}

/// Pair slot `k` of residual A with `residual.b[perm[k]]`. Slots past the
/// end of either side pair with an empty slot.
fn positional(residual: &Pools, perm: &[usize], source: PairSource) -> Vec<AlignedPair> {
    let width = residual.a.len().max(perm.len());
    (0..width)
        .map(|k| AlignedPair {
            a: residual.a.get(k).copied(),
            b: perm.get(k).map(|&m| residual.b[m]),
            source,
        })
        .collect()
}

/// Distances between every residual A slot and every residual B item,
/// computed once per group.
struct CostMatrix {
    /// `cells[k][m]`: slot `k` against `residual.b[m]`.
    cells: Vec<Vec<f64>>,
    /// A slots beyond the B pool pair with nothing; same cost for every permutation.
    tail: f64,
}

impl CostMatrix {
    fn build(a: &[&str], b: &[&str], residual: &Pools, scorer: &Scorer<'_>) -> Self {
        let n = residual.b.len();
        let width = residual.a.len().max(n);
        let slot_text = |k: usize| residual.a.get(k).map_or("", |&i| a[i]);

        let cells = (0..n)
            .map(|k| {
                residual
                    .b
                    .iter()
                    .map(|&j| scorer.compare(slot_text(k), b[j]).distance)
                    .collect()
            })
            .collect();
        let tail = (n..width)
            .map(|k| scorer.compare(slot_text(k), "").distance)
            .sum();

        Self { cells, tail }
    }

    fn total(&self, perm: &[usize]) -> f64 {
        perm.iter()
            .enumerate()
            .map(|(k, &m)| self.cells[k][m])
            .sum::<f64>()
            + self.tail
    }
}

/// Advance to the next permutation in lexicographic order. Returns `false`
/// after the last one.
fn next_permutation(p: &mut [usize]) -> bool {
    if p.len() < 2 {
        return false;
    }
    let mut i = p.len() - 1;
    while i > 0 && p[i - 1] >= p[i] {
        i -= 1;
    }
    if i == 0 {
        return false;
    }
    let mut j = p.len() - 1;
    while p[j] <= p[i - 1] {
        j -= 1;
    }
    p.swap(i - 1, j);
    p[i..].reverse();
    true
}
