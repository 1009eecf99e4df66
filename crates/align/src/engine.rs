use crate::config::AlignConfig;
use crate::embedding::EmbeddingModel;
use crate::equalize::{equalize_length, Equalized};
use crate::error::AlignError;
use crate::evidence::compute_summary;
use crate::matcher::{match_greedy, GreedyOutput};
use crate::model::{
    AlignedPair, AlignedRow, GroupAlignment, GroupKey, MergeMeta, MergeOutput, MergedRow,
    ReceiptRow, ReceiptTable, ResidualReport,
};
use crate::optimizer::optimize;
use crate::scorer::Scorer;
use crate::table::{validate_tables, Partition};

// ---------------------------------------------------------------------------
// Per-group orchestration
// ---------------------------------------------------------------------------

/// Equalized sequences plus the greedy result; shared by full alignment and
/// the residual diagnostic.
struct Prepared {
    equalized: Equalized,
    greedy: GreedyOutput,
}

fn prepare(a: &[ReceiptRow], b: &[ReceiptRow]) -> Prepared {
    let equalized = equalize_length(a.to_vec(), b.to_vec());
    let items_a: Vec<&str> = equalized.a.iter().map(|r| r.item.as_str()).collect();
    let items_b: Vec<&str> = equalized.b.iter().map(|r| r.item.as_str()).collect();
    let greedy = match_greedy(&items_a, &items_b);
    Prepared { equalized, greedy }
}

/// Align one group: equalize, greedy-match, then search the residual.
///
/// Rows come back greedy pairs first (in discovery order), then optimizer
/// pairs. Each row carries the full row from both sides; an empty slot is
/// a padding row with the group key.
pub fn align_group(
    key: &GroupKey,
    a: &[ReceiptRow],
    b: &[ReceiptRow],
    model: &dyn EmbeddingModel,
    config: &AlignConfig,
) -> GroupAlignment {
    let Prepared { equalized, greedy } = prepare(a, b);
    let items_a: Vec<&str> = equalized.a.iter().map(|r| r.item.as_str()).collect();
    let items_b: Vec<&str> = equalized.b.iter().map(|r| r.item.as_str()).collect();

    let scorer = Scorer::new(model);
    let assignment = optimize(
        &items_a,
        &items_b,
        &greedy.residual,
        &scorer,
        config.search.max_residual,
    );

    log::debug!(
        "{key}: {} greedy pair(s), residual {}x{}, {} permutation(s)",
        greedy.pairs.len(),
        greedy.residual.a.len(),
        greedy.residual.b.len(),
        assignment.permutations
    );

    let row_at = |rows: &[ReceiptRow], idx: Option<usize>| -> ReceiptRow {
        idx.and_then(|i| rows.get(i).cloned())
            .unwrap_or_else(|| ReceiptRow::padding(key.clone()))
    };
    let assemble = |pair: &AlignedPair| AlignedRow {
        left: row_at(&equalized.a, pair.a),
        right: row_at(&equalized.b, pair.b),
        source: pair.source,
    };

    let rows = greedy
        .pairs
        .iter()
        .chain(&assignment.pairs)
        .map(assemble)
        .collect();

    GroupAlignment {
        key: key.clone(),
        rows,
        capped: assignment.capped,
    }
}

/// Size of the residual B pool the optimizer would permute, without
/// computing the alignment.
pub fn residual_report(key: &GroupKey, a: &[ReceiptRow], b: &[ReceiptRow]) -> ResidualReport {
    let Prepared { greedy, .. } = prepare(a, b);
    ResidualReport {
        key: key.clone(),
        residual: greedy.residual.b,
    }
}

// ---------------------------------------------------------------------------
// Drivers
// ---------------------------------------------------------------------------

/// Pre-flight diagnostic: one residual report per group of the first table,
/// in encounter order. Each report is also logged as a line.
pub fn divergence(
    tables: &[ReceiptTable],
    config: &AlignConfig,
) -> Result<Vec<ResidualReport>, AlignError> {
    validate_tables(tables, &config.columns)?;
    let left = Partition::of(&tables[0]);
    let right = Partition::of(&tables[1]);

    let reports: Vec<ResidualReport> = left
        .keys
        .iter()
        .filter(|key| config.groups.admits(&key.subject))
        .map(|key| residual_report(key, left.rows(key), right.rows(key)))
        .collect();

    for report in &reports {
        log::info!("{report}");
    }
    Ok(reports)
}

/// Align every group, score every assembled pair, and split off the rows
/// whose distance exceeds the review threshold.
pub fn merge(
    tables: &[ReceiptTable],
    model: &dyn EmbeddingModel,
    config: &AlignConfig,
) -> Result<MergeOutput, AlignError> {
    validate_tables(tables, &config.columns)?;
    let left = Partition::of(&tables[0]);
    let right = Partition::of(&tables[1]);
    let scorer = Scorer::new(model);

    let mut merged = Vec::new();
    let mut capped_groups = Vec::new();
    let mut total_groups = 0;

    for key in left.keys.iter().filter(|k| config.groups.admits(&k.subject)) {
        total_groups += 1;
        let alignment = align_group(key, left.rows(key), right.rows(key), model, config);
        if alignment.capped {
            log::warn!(
                "{key}: residual pool exceeds {} item(s); paired in original order",
                config.search.max_residual
            );
            capped_groups.push(key.clone());
        }

        for row in alignment.rows {
            let score = scorer.compare(&row.left.item, &row.right.item);
            merged.push(MergedRow {
                key: row.left.key,
                item: score.merged,
                item_a: row.left.item,
                item_b: row.right.item,
                tier: score.tier,
                distance: score.distance,
                source: row.source,
            });
        }
    }

    let threshold = config.review.threshold;
    let review: Vec<MergedRow> = merged
        .iter()
        .filter(|r| r.distance > threshold)
        .cloned()
        .collect();
    let summary = compute_summary(total_groups, &merged, threshold, capped_groups.len());

    log::info!(
        "merged {} row(s) across {} group(s): {} for review, {} capped",
        summary.total_rows,
        summary.total_groups,
        summary.review_rows,
        summary.capped_groups
    );

    Ok(MergeOutput {
        meta: MergeMeta {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
            review_threshold: threshold,
        },
        summary,
        merged,
        review,
        capped_groups,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::NoEmbeddings;
    use crate::model::{PairSource, Tier};
    use crate::table::load_csv_table;

    fn key() -> GroupKey {
        GroupKey::new("130", "1", "1")
    }

    fn rows(items: &[&str]) -> Vec<ReceiptRow> {
        items.iter().map(|i| ReceiptRow::new(key(), *i)).collect()
    }

    fn pairs_of(alignment: &GroupAlignment) -> Vec<(&str, &str)> {
        alignment
            .rows
            .iter()
            .map(|r| (r.left.item.as_str(), r.right.item.as_str()))
            .collect()
    }

    #[test]
    fn greedy_rows_come_first() {
        let a = rows(&["cheese", "bread wheat", "yogurt"]);
        let b = rows(&["rice", "bread wheat", "pasta"]);
        let out = align_group(&key(), &a, &b, &NoEmbeddings, &AlignConfig::default());
        assert_eq!(
            pairs_of(&out),
            vec![("bread wheat", "bread wheat"), ("cheese", "rice"), ("yogurt", "pasta")]
        );
        assert_eq!(out.rows[0].source, PairSource::Exact);
        assert_eq!(out.rows[1].source, PairSource::Optimized);
        assert!(!out.capped);
    }

    #[test]
    fn grocery_receipt_end_to_end() {
        let a = rows(&["milk 2% gallon", "bread wheat", "eggs dozen"]);
        let b = rows(&["bread wheat", "eggs dozen large", "milk gallon"]);
        let out = align_group(&key(), &a, &b, &NoEmbeddings, &AlignConfig::default());
        assert_eq!(
            pairs_of(&out),
            vec![
                ("bread wheat", "bread wheat"),
                ("milk 2% gallon", "milk gallon"),
                ("eggs dozen", "eggs dozen large"),
            ]
        );

        let scorer = Scorer::new(&NoEmbeddings);
        let scores: Vec<_> = out
            .rows
            .iter()
            .map(|r| scorer.compare(&r.left.item, &r.right.item))
            .collect();
        assert_eq!(scores[0].tier, Tier::Identical);
        assert_eq!(scores[0].distance, 0.0);
        assert!(scores[1..].iter().all(|s| s.tier == Tier::Containment));
        assert!(scores.iter().all(|s| s.distance <= 1.0));
    }

    #[test]
    fn longer_b_pads_a() {
        let a = rows(&["whole milk gallon"]);
        let b = rows(&["rye bread slice", "whole milk quart"]);
        let out = align_group(&key(), &a, &b, &NoEmbeddings, &AlignConfig::default());
        // "whole" is found in B[1] by the token pass; the padding slot takes B[0].
        assert_eq!(
            pairs_of(&out),
            vec![("whole milk gallon", "whole milk quart"), ("", "rye bread slice")]
        );
        assert_eq!(out.rows[1].left.key, key());
    }

    #[test]
    fn longer_a_leaves_unpaired_rows() {
        let a = rows(&["cheese", "yogurt", "lettuce"]);
        let b = rows(&["rice"]);
        let out = align_group(&key(), &a, &b, &NoEmbeddings, &AlignConfig::default());
        assert_eq!(
            pairs_of(&out),
            vec![("cheese", "rice"), ("yogurt", ""), ("lettuce", "")]
        );
    }

    #[test]
    fn residual_report_counts_b_pool() {
        let a = rows(&["cheese", "bread wheat", "yogurt"]);
        let b = rows(&["rice", "bread wheat", "pasta"]);
        let report = residual_report(&key(), &a, &b);
        assert_eq!(report.residual, vec![0, 2]);
        assert_eq!(report.to_string(), "ID: 130, Session: 1, Receipt: 1, 2! [0, 2]");
    }

    #[test]
    fn capped_group_flagged() {
        let a = rows(&["cheese", "yogurt", "lettuce"]);
        let b = rows(&["rice", "pasta", "beans"]);
        let mut config = AlignConfig::default();
        config.search.max_residual = 2;
        let out = align_group(&key(), &a, &b, &NoEmbeddings, &config);
        assert!(out.capped);
        assert!(out.rows.iter().all(|r| r.source == PairSource::Unsearched));
    }

    fn table(name: &str, csv: &str) -> ReceiptTable {
        load_csv_table(name, csv, &AlignConfig::default().columns).unwrap()
    }

    #[test]
    fn merge_rejects_mismatched_keys_before_work() {
        let a = table("a", "ID,Session,Receipt,Item\n1,1,1,milk\n");
        let b = table("b", "ID,Session,Receipt,Item\n2,1,1,milk\n");
        let err = merge(&[a.clone(), b.clone()], &NoEmbeddings, &AlignConfig::default()).unwrap_err();
        assert!(err.is_schema_mismatch());
        let err = divergence(&[a, b], &AlignConfig::default()).unwrap_err();
        assert!(err.is_schema_mismatch());
    }

    #[test]
    fn merge_rejects_wrong_table_count() {
        let a = table("a", "ID,Session,Receipt,Item\n1,1,1,milk\n");
        let err = merge(&[a], &NoEmbeddings, &AlignConfig::default()).unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn merge_scores_every_row() {
        let a = table(
            "a",
            "ID,Session,Receipt,Item\n1,1,1,milk 2% gallon\n1,1,1,bread wheat\n1,1,2,cheese\n",
        );
        let b = table(
            "b",
            "ID,Session,Receipt,Item\n1,1,1,bread wheat\n1,1,1,milk gallon\n1,1,2,brie\n",
        );
        let out = merge(&[a, b], &NoEmbeddings, &AlignConfig::default()).unwrap();
        assert_eq!(out.summary.total_groups, 2);
        assert_eq!(out.merged.len(), 3);
        assert_eq!(out.merged[0].tier, Tier::Identical);
        assert_eq!(out.merged[1].item, "milk gallon");
        assert_eq!(out.merged[1].tier, Tier::Containment);
        assert_eq!(out.merged[2].key, GroupKey::new("1", "1", "2"));
        assert_eq!(out.merged[2].tier, Tier::OutOfVocabulary);
        assert!(out.review.is_empty());
        assert!(out.capped_groups.is_empty());
    }

    #[test]
    fn subject_filter_skips_groups() {
        let a = table("a", "ID,Session,Receipt,Item\n1,1,1,milk\n2,1,1,eggs\n");
        let b = table("b", "ID,Session,Receipt,Item\n1,1,1,milk\n2,1,1,eggs\n");
        let config = AlignConfig::from_toml("[groups]\nsubjects = [\"2\"]\n").unwrap();
        let out = merge(&[a.clone(), b.clone()], &NoEmbeddings, &config).unwrap();
        assert_eq!(out.merged.len(), 1);
        assert_eq!(out.merged[0].key.subject, "2");
        assert_eq!(divergence(&[a, b], &config).unwrap().len(), 1);
    }
}
