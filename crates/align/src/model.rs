use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Composite key partitioning both tables into independent alignment problems.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct GroupKey {
    pub subject: String,
    pub session: String,
    pub receipt: String,
}

impl GroupKey {
    pub fn new(
        subject: impl Into<String>,
        session: impl Into<String>,
        receipt: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            session: session.into(),
            receipt: receipt.into(),
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ID: {}, Session: {}, Receipt: {}",
            self.subject, self.session, self.receipt
        )
    }
}

/// A single line item. An empty `item` is a padding slot, never a real item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceiptRow {
    pub key: GroupKey,
    pub item: String,
}

impl ReceiptRow {
    pub fn new(key: GroupKey, item: impl Into<String>) -> Self {
        Self {
            key,
            item: item.into(),
        }
    }

    pub fn padding(key: GroupKey) -> Self {
        Self {
            key,
            item: String::new(),
        }
    }

    pub fn is_padding(&self) -> bool {
        self.item.is_empty()
    }
}

/// One transcription: header columns plus rows in file order.
#[derive(Debug, Clone)]
pub struct ReceiptTable {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<ReceiptRow>,
}

impl ReceiptTable {
    pub fn new(name: impl Into<String>, columns: Vec<String>, rows: Vec<ReceiptRow>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows,
        }
    }
}

/// Which transcription a value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    A,
    B,
}

// ---------------------------------------------------------------------------
// Alignment
// ---------------------------------------------------------------------------

/// The stage that produced a correspondence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PairSource {
    /// Whole-string equality.
    Exact,
    /// A token of the A item occurs inside the B item.
    TokenInB,
    /// A token of the B item occurs inside the A item.
    TokenInA,
    /// Chosen by exhaustive permutation search.
    Optimized,
    /// Residual pool exceeded the search cap; paired in original order.
    Unsearched,
}

impl PairSource {
    pub fn is_greedy(&self) -> bool {
        matches!(self, Self::Exact | Self::TokenInB | Self::TokenInA)
    }
}

/// Index-level correspondence inside one group. `None` is an empty slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignedPair {
    pub a: Option<usize>,
    pub b: Option<usize>,
    pub source: PairSource,
}

impl AlignedPair {
    pub fn matched(a: usize, b: usize, source: PairSource) -> Self {
        Self {
            a: Some(a),
            b: Some(b),
            source,
        }
    }
}

/// Row of the combined per-group table: full row data from both sides.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignedRow {
    pub left: ReceiptRow,
    pub right: ReceiptRow,
    pub source: PairSource,
}

/// Combined table for one group, greedy pairs first, then optimizer pairs.
#[derive(Debug, Clone)]
pub struct GroupAlignment {
    pub key: GroupKey,
    pub rows: Vec<AlignedRow>,
    /// True when the residual pool was too large to search.
    pub capped: bool,
}

/// Residual B pool left for the optimizer; the divergence diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResidualReport {
    pub key: GroupKey,
    pub residual: Vec<usize>,
}

impl fmt::Display for ResidualReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let indices: Vec<String> = self.residual.iter().map(|i| i.to_string()).collect();
        write!(f, "{}, {}! [{}]", self.key, self.residual.len(), indices.join(", "))
    }
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// How two item texts overlap. First matching tier wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Identical,
    Containment,
    SubwordContainment,
    MultiShared,
    SingleUnmatched,
    RedundantNeighbor,
    EmbeddingDistance,
    OutOfVocabulary,
}

impl Tier {
    /// Fixed distance for tiers without a computed one. These constants are
    /// tier identifiers kept below the review threshold, not a metric.
    pub fn sentinel(&self) -> Option<f64> {
        match self {
            Self::Identical => Some(0.0),
            Self::Containment => Some(0.123456),
            Self::SubwordContainment => Some(0.161803),
            Self::MultiShared => Some(0.271828),
            Self::SingleUnmatched => Some(0.314159),
            Self::RedundantNeighbor => Some(0.666),
            Self::EmbeddingDistance => None,
            Self::OutOfVocabulary => Some(0.999),
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identical => write!(f, "identical"),
            Self::Containment => write!(f, "containment"),
            Self::SubwordContainment => write!(f, "subword_containment"),
            Self::MultiShared => write!(f, "multi_shared"),
            Self::SingleUnmatched => write!(f, "single_unmatched"),
            Self::RedundantNeighbor => write!(f, "redundant_neighbor"),
            Self::EmbeddingDistance => write!(f, "embedding_distance"),
            Self::OutOfVocabulary => write!(f, "out_of_vocabulary"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Score {
    pub tier: Tier,
    /// Space-joined result tokens.
    pub merged: String,
    pub distance: f64,
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

/// Final row: group key, merged item text, and its distance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedRow {
    pub key: GroupKey,
    pub item: String,
    pub item_a: String,
    pub item_b: String,
    pub tier: Tier,
    pub distance: f64,
    pub source: PairSource,
}

#[derive(Debug, Clone, Serialize)]
pub struct MergeSummary {
    pub total_groups: usize,
    pub total_rows: usize,
    /// Rows paired by one of the greedy passes rather than the search.
    pub greedy_rows: usize,
    pub review_rows: usize,
    pub capped_groups: usize,
    pub tier_counts: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MergeMeta {
    pub config_name: String,
    pub engine_version: String,
    pub run_at: String,
    pub review_threshold: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MergeOutput {
    pub meta: MergeMeta,
    pub summary: MergeSummary,
    pub merged: Vec<MergedRow>,
    /// Rows whose distance exceeds the review threshold.
    pub review: Vec<MergedRow>,
    pub capped_groups: Vec<GroupKey>,
}
