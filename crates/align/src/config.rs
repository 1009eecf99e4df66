use std::collections::BTreeSet;

use serde::Deserialize;

use crate::error::AlignError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct AlignConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub columns: ColumnMapping,
    #[serde(default)]
    pub review: ReviewConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub groups: GroupFilter,
}

fn default_name() -> String {
    "receipt merge".into()
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            columns: ColumnMapping::default(),
            review: ReviewConfig::default(),
            search: SearchConfig::default(),
            groups: GroupFilter::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Column mapping
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ColumnMapping {
    #[serde(default = "default_subject")]
    pub subject: String,
    #[serde(default = "default_session")]
    pub session: String,
    #[serde(default = "default_receipt")]
    pub receipt: String,
    #[serde(default = "default_item")]
    pub item: String,
}

fn default_subject() -> String {
    "ID".into()
}

fn default_session() -> String {
    "Session".into()
}

fn default_receipt() -> String {
    "Receipt".into()
}

fn default_item() -> String {
    "Item".into()
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            subject: default_subject(),
            session: default_session(),
            receipt: default_receipt(),
            item: default_item(),
        }
    }
}

impl ColumnMapping {
    /// Group-key columns in key order.
    pub fn key_columns(&self) -> [&str; 3] {
        [&self.subject, &self.session, &self.receipt].map(String::as_str)
    }

    /// Every column a table must carry, key columns first.
    pub fn required(&self) -> Vec<String> {
        vec![
            self.subject.clone(),
            self.session.clone(),
            self.receipt.clone(),
            self.item.clone(),
        ]
    }

    pub(crate) fn required_set(&self) -> BTreeSet<&str> {
        [
            self.subject.as_str(),
            self.session.as_str(),
            self.receipt.as_str(),
            self.item.as_str(),
        ]
        .into_iter()
        .collect()
    }
}

// ---------------------------------------------------------------------------
// Review + Search + Groups
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewConfig {
    /// Rows with a distance strictly above this go to the review queue.
    /// Only the embedding tier can exceed 1.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

fn default_threshold() -> f64 {
    1.0
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Largest residual B pool that is permuted exhaustively (n! candidates).
    #[serde(default = "default_max_residual")]
    pub max_residual: usize,
}

fn default_max_residual() -> usize {
    9
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_residual: default_max_residual(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroupFilter {
    /// Subject allow-list. `None` aligns every subject.
    #[serde(default)]
    pub subjects: Option<Vec<String>>,
}

impl GroupFilter {
    pub fn admits(&self, subject: &str) -> bool {
        match &self.subjects {
            Some(subjects) => subjects.iter().any(|s| s == subject),
            None => true,
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl AlignConfig {
    pub fn from_toml(input: &str) -> Result<Self, AlignError> {
        let config: AlignConfig =
            toml::from_str(input).map_err(|e| AlignError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AlignError> {
        let required = self.columns.required();
        if let Some(empty) = required.iter().find(|c| c.trim().is_empty()) {
            return Err(AlignError::ConfigValidation(format!(
                "column names must not be empty, got '{empty}'"
            )));
        }
        for (i, col) in required.iter().enumerate() {
            if required[i + 1..].contains(col) {
                return Err(AlignError::ConfigValidation(format!(
                    "column '{col}' is mapped more than once"
                )));
            }
        }

        if !self.review.threshold.is_finite() || self.review.threshold < 0.0 {
            return Err(AlignError::ConfigValidation(format!(
                "review threshold must be a finite value >= 0, got {}",
                self.review.threshold
            )));
        }

        if self.search.max_residual == 0 {
            return Err(AlignError::ConfigValidation(
                "search.max_residual must be at least 1".into(),
            ));
        }

        if matches!(&self.groups.subjects, Some(s) if s.is_empty()) {
            return Err(AlignError::ConfigValidation(
                "groups.subjects must list at least one subject when present".into(),
            ));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
name = "Pilot receipts"

[columns]
subject = "pid"
session = "visit"
receipt = "receipt_no"
item    = "text"

[review]
threshold = 1.5

[search]
max_residual = 6

[groups]
subjects = ["130", "153"]
"#;

    #[test]
    fn parse_full() {
        let config = AlignConfig::from_toml(FULL).unwrap();
        assert_eq!(config.name, "Pilot receipts");
        assert_eq!(config.columns.key_columns(), ["pid", "visit", "receipt_no"]);
        assert_eq!(config.columns.item, "text");
        assert_eq!(config.review.threshold, 1.5);
        assert_eq!(config.search.max_residual, 6);
        assert!(config.groups.admits("153"));
        assert!(!config.groups.admits("114"));
    }

    #[test]
    fn empty_document_uses_defaults() {
        let config = AlignConfig::from_toml("").unwrap();
        assert_eq!(config.columns.required(), vec!["ID", "Session", "Receipt", "Item"]);
        assert_eq!(config.review.threshold, 1.0);
        assert_eq!(config.search.max_residual, 9);
        assert!(config.groups.admits("anything"));
    }

    #[test]
    fn reject_duplicate_column() {
        let input = r#"
[columns]
subject = "Item"
"#;
        let err = AlignConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("'Item' is mapped more than once"));
    }

    #[test]
    fn reject_negative_threshold() {
        let err = AlignConfig::from_toml("[review]\nthreshold = -0.5\n").unwrap_err();
        assert!(err.to_string().contains("review threshold"));
    }

    #[test]
    fn reject_zero_search_cap() {
        let err = AlignConfig::from_toml("[search]\nmax_residual = 0\n").unwrap_err();
        assert!(err.to_string().contains("max_residual"));
    }

    #[test]
    fn reject_empty_subject_list() {
        let err = AlignConfig::from_toml("[groups]\nsubjects = []\n").unwrap_err();
        assert!(matches!(err, AlignError::ConfigValidation(_)));
    }

    #[test]
    fn reject_malformed_toml() {
        let err = AlignConfig::from_toml("[review\nthreshold = 1").unwrap_err();
        assert!(matches!(err, AlignError::ConfigParse(_)));
    }
}
