//! Tiered similarity between two item texts.
//!
//! Tiers are checked in a fixed order and the first that applies wins:
//!
//! 1. no unshared tokens                         -> `Identical`
//! 2. one side's tokens are all shared           -> `Containment`
//! 3. every unshared token absorbed as a subword -> `SubwordContainment`
//! 4. two or more result tokens                  -> `MultiShared`
//! 5. a single unmatched, in-vocabulary token    -> `SingleUnmatched`
//! 6. unmatched in-vocabulary tokens             -> `RedundantNeighbor` / `EmbeddingDistance`
//! 7. otherwise                                  -> `OutOfVocabulary`
//!
//! Only `EmbeddingDistance` carries a computed distance; it may exceed 1.

use crate::embedding::EmbeddingModel;
use crate::model::{Score, Tier};

/// Scores item pairs against an injected embedding model.
#[derive(Clone, Copy)]
pub struct Scorer<'m> {
    model: &'m dyn EmbeddingModel,
}

impl<'m> Scorer<'m> {
    pub fn new(model: &'m dyn EmbeddingModel) -> Self {
        Self { model }
    }

    pub fn compare(&self, a: &str, b: &str) -> Score {
        let tokens_a: Vec<&str> = a.split_whitespace().collect();
        let tokens_b: Vec<&str> = b.split_whitespace().collect();
        let overlap = Overlap::new(&tokens_a, &tokens_b);

        let mut result: Vec<&str> = overlap.shared.clone();

        if overlap.unshared.is_empty() {
            return finish(Tier::Identical, &result);
        }

        if overlap.distinct_a == overlap.shared.len() || overlap.distinct_b == overlap.shared.len() {
            return finish(Tier::Containment, &result);
        }

        result.extend(&overlap.subwords);
        if overlap.unmatched.is_empty() {
            return finish(Tier::SubwordContainment, &result);
        }

        if result.len() >= 2 {
            return finish(Tier::MultiShared, &result);
        }

        if let [only] = overlap.unmatched.as_slice() {
            if self.model.contains(only) {
                result.push(*only);
                return finish(Tier::SingleUnmatched, &result);
            }
        }

        if overlap.unmatched.iter().any(|t| self.model.contains(t)) {
            let positive: Vec<&str> = overlap
                .shared
                .iter()
                .chain(&overlap.unshared)
                .copied()
                .filter(|t| self.model.contains(t))
                .collect();
            let neighbor = self.model.most_similar(&positive);

            if let Some(ref n) = neighbor {
                let redundant = result
                    .iter()
                    .any(|r| n.contains(*r) || r.contains(n.as_str()));
                if redundant {
                    return finish(Tier::RedundantNeighbor, &result);
                }
            }

            let mut merged = result.join(" ");
            if let Some(n) = neighbor {
                if !merged.is_empty() {
                    merged.push(' ');
                }
                merged.push_str(&n);
            }
            return Score {
                tier: Tier::EmbeddingDistance,
                merged,
                distance: self.model.wmdistance(&tokens_a, &tokens_b),
            };
        }

        finish(Tier::OutOfVocabulary, &result)
    }
}

fn finish(tier: Tier, result: &[&str]) -> Score {
    Score {
        tier,
        merged: result.join(" "),
        distance: tier.sentinel().unwrap_or_default(),
    }
}

/// Token overlap between two texts, in first-appearance order.
struct Overlap<'t> {
    distinct_a: usize,
    distinct_b: usize,
    shared: Vec<&'t str>,
    /// Symmetric difference: A-only tokens, then B-only tokens.
    unshared: Vec<&'t str>,
    /// Unshared tokens found inside another unshared token.
    subwords: Vec<&'t str>,
    /// Unshared tokens not involved in any subword relation.
    unmatched: Vec<&'t str>,
}

impl<'t> Overlap<'t> {
    fn new(tokens_a: &[&'t str], tokens_b: &[&'t str]) -> Self {
        let set_a = distinct(tokens_a);
        let set_b = distinct(tokens_b);

        let shared: Vec<&str> = set_a.iter().copied().filter(|t| set_b.contains(t)).collect();
        let unshared: Vec<&str> = set_a
            .iter()
            .filter(|t| !set_b.contains(t))
            .chain(set_b.iter().filter(|t| !set_a.contains(t)))
            .copied()
            .collect();

        let mut subwords: Vec<&str> = Vec::new();
        let mut absorbed: Vec<&str> = Vec::new();
        for &inner in &unshared {
            for &outer in &unshared {
                if inner != outer && outer.contains(inner) {
                    push_distinct(&mut subwords, inner);
                    push_distinct(&mut absorbed, inner);
                    push_distinct(&mut absorbed, outer);
                }
            }
        }
        let unmatched = unshared
            .iter()
            .copied()
            .filter(|t| !absorbed.contains(t))
            .collect();

        Self {
            distinct_a: set_a.len(),
            distinct_b: set_b.len(),
            shared,
            unshared,
            subwords,
            unmatched,
        }
    }
}

fn distinct<'t>(tokens: &[&'t str]) -> Vec<&'t str> {
    let mut out = Vec::with_capacity(tokens.len());
    for &t in tokens {
        push_distinct(&mut out, t);
    }
    out
}

fn push_distinct<'t>(v: &mut Vec<&'t str>, token: &'t str) {
    if !v.contains(&token) {
        v.push(token);
    }
}
