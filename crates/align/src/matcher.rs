use crate::model::{AlignedPair, PairSource};

/// Unmatched indices on each side, in original order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pools {
    pub a: Vec<usize>,
    pub b: Vec<usize>,
}

impl Pools {
    pub fn full(len_a: usize, len_b: usize) -> Self {
        Self {
            a: (0..len_a).collect(),
            b: (0..len_b).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GreedyOutput {
    /// Pairs in discovery order: exact, then A-token-in-B, then B-token-in-A.
    pub pairs: Vec<AlignedPair>,
    /// Leftovers for the optimizer. Empty B items are already dropped.
    pub residual: Pools,
}

/// Remove the easy correspondences before any combinatorial work.
pub fn match_greedy(a: &[&str], b: &[&str]) -> GreedyOutput {
    let pools = Pools::full(a.len(), b.len());

    let (mut pairs, pools) = exact_pass(a, b, &pools);
    let (token_in_b, pools) = token_in_b_pass(a, b, &pools);
    pairs.extend(token_in_b);
    let (token_in_a, pools) = token_in_a_pass(a, b, &pools);
    pairs.extend(token_in_a);

    // Leftover empty B items are padding, not real unmatched items.
    let residual = Pools {
        a: pools.a,
        b: pools.b.into_iter().filter(|&j| !b[j].is_empty()).collect(),
    };

    GreedyOutput { pairs, residual }
}

/// Pair each A item with the first remaining B item of identical text.
pub fn exact_pass(a: &[&str], b: &[&str], pools: &Pools) -> (Vec<AlignedPair>, Pools) {
    let scan = consume(&pools.a, &pools.b, |i, available| {
        available.iter().copied().find(|&j| b[j] == a[i])
    });
    let pairs = scan
        .hits
        .iter()
        .map(|&(i, j)| AlignedPair::matched(i, j, PairSource::Exact))
        .collect();
    (pairs, Pools { a: scan.outer_left, b: scan.inner_left })
}

/// Pair each A item with the first remaining B item containing one of its
/// tokens. Tokens are tried in order; the first token with a hit wins.
pub fn token_in_b_pass(a: &[&str], b: &[&str], pools: &Pools) -> (Vec<AlignedPair>, Pools) {
    let scan = consume(&pools.a, &pools.b, |i, available| {
        first_containing(a[i], b, available)
    });
    let pairs = scan
        .hits
        .iter()
        .map(|&(i, j)| AlignedPair::matched(i, j, PairSource::TokenInB))
        .collect();
    (pairs, Pools { a: scan.outer_left, b: scan.inner_left })
}

/// Mirror of [`token_in_b_pass`]: B items drive, A items are searched.
pub fn token_in_a_pass(a: &[&str], b: &[&str], pools: &Pools) -> (Vec<AlignedPair>, Pools) {
    let scan = consume(&pools.b, &pools.a, |j, available| {
        first_containing(b[j], a, available)
    });
    let pairs = scan
        .hits
        .iter()
        .map(|&(j, i)| AlignedPair::matched(i, j, PairSource::TokenInA))
        .collect();
    (pairs, Pools { a: scan.inner_left, b: scan.outer_left })
}

fn first_containing(text: &str, haystacks: &[&str], available: &[usize]) -> Option<usize> {
    text.split_whitespace().find_map(|token| {
        available
            .iter()
            .copied()
            .find(|&k| haystacks[k].contains(token))
    })
}

struct Scan {
    hits: Vec<(usize, usize)>,
    outer_left: Vec<usize>,
    inner_left: Vec<usize>,
}

/// Walk `outer` in order; each outer index may claim one still-available
/// inner index. Claimed indices are never offered again within the pass.
fn consume<F>(outer: &[usize], inner: &[usize], pick: F) -> Scan
where
    F: Fn(usize, &[usize]) -> Option<usize>,
{
    let mut available = inner.to_vec();
    let mut hits = Vec::new();
    let mut outer_left = Vec::new();

    for &o in outer {
        match pick(o, &available) {
            Some(hit) => {
                available.retain(|&k| k != hit);
                hits.push((o, hit));
            }
            None => outer_left.push(o),
        }
    }

    Scan {
        hits,
        outer_left,
        inner_left: available,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(a: usize, b: usize, source: PairSource) -> AlignedPair {
        AlignedPair::matched(a, b, source)
    }

    #[test]
    fn exact_first_match_wins() {
        let a = ["milk", "milk", "bread"];
        let b = ["bread", "milk", "milk"];
        let (pairs, left) = exact_pass(&a, &b, &Pools::full(3, 3));
        assert_eq!(
            pairs,
            vec![
                pair(0, 1, PairSource::Exact),
                pair(1, 2, PairSource::Exact),
                pair(2, 0, PairSource::Exact),
            ]
        );
        assert!(left.a.is_empty());
        assert!(left.b.is_empty());
    }

    #[test]
    fn exact_is_case_sensitive_whole_string() {
        let a = ["Milk", "milk 2%"];
        let b = ["milk", "milk 2"];
        let (pairs, left) = exact_pass(&a, &b, &Pools::full(2, 2));
        assert!(pairs.is_empty());
        assert_eq!(left, Pools::full(2, 2));
    }

    #[test]
    fn input_pools_are_not_mutated() {
        let a = ["milk"];
        let b = ["milk"];
        let pools = Pools::full(1, 1);
        let (_, left) = exact_pass(&a, &b, &pools);
        assert_eq!(pools, Pools::full(1, 1));
        assert!(left.a.is_empty());
    }

    #[test]
    fn token_in_b_uses_token_order() {
        // "wheat" is tried before "bread", so B[1] wins even though B[0] has "bread".
        let a = ["wheat bread"];
        let b = ["bread rye", "whole wheat"];
        let (pairs, left) = token_in_b_pass(&a, &b, &Pools::full(1, 2));
        assert_eq!(pairs, vec![pair(0, 1, PairSource::TokenInB)]);
        assert_eq!(left.b, vec![0]);
    }

    #[test]
    fn token_in_b_matches_substrings() {
        let a = ["choc"];
        let b = ["chocolate bar"];
        let (pairs, _) = token_in_b_pass(&a, &b, &Pools::full(1, 1));
        assert_eq!(pairs, vec![pair(0, 0, PairSource::TokenInB)]);
    }

    #[test]
    fn token_in_a_reverse_direction() {
        let a = ["strawberries", "bananas"];
        let b = ["banana", "berries"];
        let (pairs, left) = token_in_a_pass(&a, &b, &Pools::full(2, 2));
        assert_eq!(
            pairs,
            vec![pair(1, 0, PairSource::TokenInA), pair(0, 1, PairSource::TokenInA)]
        );
        assert!(left.a.is_empty() && left.b.is_empty());
    }

    #[test]
    fn greedy_runs_passes_in_order() {
        let a = ["milk 2% gallon", "bread wheat", "eggs dozen"];
        let b = ["bread wheat", "eggs dozen large", "milk gallon"];
        let out = match_greedy(&a, &b);
        assert_eq!(
            out.pairs,
            vec![
                pair(1, 0, PairSource::Exact),
                pair(0, 2, PairSource::TokenInB),
                pair(2, 1, PairSource::TokenInB),
            ]
        );
        assert!(out.residual.a.is_empty());
        assert!(out.residual.b.is_empty());
    }

    #[test]
    fn exact_duplicates_never_reach_residual() {
        let a = ["tomato soup", "crackers", "apple"];
        let b = ["pear", "crackers", "tomato soup"];
        let out = match_greedy(&a, &b);
        assert!(out.pairs.contains(&pair(0, 2, PairSource::Exact)));
        assert!(out.pairs.contains(&pair(1, 1, PairSource::Exact)));
        assert_eq!(out.residual, Pools { a: vec![2], b: vec![0] });
    }

    #[test]
    fn empty_b_items_dropped_from_residual() {
        let a = ["cheese", "yogurt", "lettuce"];
        let b = ["bread", "", ""];
        let out = match_greedy(&a, &b);
        assert!(out.pairs.is_empty());
        assert_eq!(out.residual.a, vec![0, 1, 2]);
        assert_eq!(out.residual.b, vec![0]);
    }

    #[test]
    fn padding_on_a_is_never_matched() {
        let a = ["cheese", ""];
        let b = ["bread", "rice"];
        let out = match_greedy(&a, &b);
        assert!(out.pairs.is_empty());
        assert_eq!(out.residual, Pools::full(2, 2));
    }
}
