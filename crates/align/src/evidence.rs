use std::collections::BTreeMap;

use crate::model::{MergeSummary, MergedRow};

/// Compute summary statistics from merged rows.
pub fn compute_summary(
    total_groups: usize,
    merged: &[MergedRow],
    review_threshold: f64,
    capped_groups: usize,
) -> MergeSummary {
    let mut tier_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut review_rows = 0;
    let mut greedy_rows = 0;

    for row in merged {
        *tier_counts.entry(row.tier.to_string()).or_insert(0) += 1;
        if row.source.is_greedy() {
            greedy_rows += 1;
        }
        if row.distance > review_threshold {
            review_rows += 1;
        }
    }

    MergeSummary {
        total_groups,
        total_rows: merged.len(),
        greedy_rows,
        review_rows,
        capped_groups,
        tier_counts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GroupKey, PairSource, Tier};

    fn row(tier: Tier, distance: f64) -> MergedRow {
        row_from(tier, distance, PairSource::Optimized)
    }

    fn row_from(tier: Tier, distance: f64, source: PairSource) -> MergedRow {
        MergedRow {
            key: GroupKey::new("1", "1", "1"),
            item: String::new(),
            item_a: String::new(),
            item_b: String::new(),
            tier,
            distance,
            source,
        }
    }

    #[test]
    fn summary_counts() {
        let rows = vec![
            row(Tier::Identical, 0.0),
            row(Tier::Identical, 0.0),
            row(Tier::Containment, 0.123456),
            row(Tier::EmbeddingDistance, 1.4),
            row(Tier::EmbeddingDistance, 0.8),
        ];
        let summary = compute_summary(2, &rows, 1.0, 0);
        assert_eq!(summary.total_groups, 2);
        assert_eq!(summary.total_rows, 5);
        assert_eq!(summary.review_rows, 1);
        assert_eq!(summary.tier_counts["identical"], 2);
        assert_eq!(summary.tier_counts["embedding_distance"], 2);
        assert!(!summary.tier_counts.contains_key("out_of_vocabulary"));
    }

    #[test]
    fn greedy_rows_counted_by_source() {
        let rows = vec![
            row_from(Tier::Identical, 0.0, PairSource::Exact),
            row_from(Tier::Containment, 0.123456, PairSource::TokenInA),
            row_from(Tier::OutOfVocabulary, 0.999, PairSource::Unsearched),
            row(Tier::MultiShared, 0.271828),
        ];
        assert_eq!(compute_summary(1, &rows, 1.0, 1).greedy_rows, 2);
    }

    #[test]
    fn threshold_is_strict() {
        let rows = vec![row(Tier::EmbeddingDistance, 1.0)];
        assert_eq!(compute_summary(1, &rows, 1.0, 0).review_rows, 0);
        assert_eq!(compute_summary(1, &rows, 0.5, 0).review_rows, 1);
    }
}
