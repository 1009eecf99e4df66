//! Embedding service seam used by the similarity scorer.
//!
//! The scorer only needs vocabulary membership, a top-1 nearest neighbor and
//! a document distance. `WordVectors` answers all three from vectors held in
//! memory; `NoEmbeddings` answers "unknown" to everything.

use std::collections::HashMap;
use std::io::BufRead;

use crate::error::AlignError;

pub trait EmbeddingModel {
    /// Vocabulary membership.
    fn contains(&self, token: &str) -> bool;

    /// Nearest vocabulary word to the mean of `positive`, excluding the
    /// positives themselves. `None` when no positive is known.
    fn most_similar(&self, positive: &[&str]) -> Option<String>;

    /// Word Mover's style distance between two token sequences. Unknown
    /// tokens are ignored; a side with no known token yields infinity.
    fn wmdistance(&self, a: &[&str], b: &[&str]) -> f64;
}

/// Empty vocabulary. Every unmatched token is out-of-vocabulary.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEmbeddings;

impl EmbeddingModel for NoEmbeddings {
    fn contains(&self, _token: &str) -> bool {
        false
    }

    fn most_similar(&self, _positive: &[&str]) -> Option<String> {
        None
    }

    fn wmdistance(&self, _a: &[&str], _b: &[&str]) -> f64 {
        f64::INFINITY
    }
}

// ---------------------------------------------------------------------------
// In-memory word vectors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct WordVectors {
    dim: usize,
    words: Vec<String>,
    index: HashMap<String, usize>,
    raw: Vec<Vec<f32>>,
    unit: Vec<Vec<f32>>,
}

impl WordVectors {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            words: Vec::new(),
            index: HashMap::new(),
            raw: Vec::new(),
            unit: Vec::new(),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Add or replace a word's vector.
    pub fn insert(&mut self, word: &str, vector: Vec<f32>) -> Result<(), AlignError> {
        if vector.len() != self.dim {
            return Err(AlignError::Embedding(format!(
                "word '{word}': expected {} dimensions, got {}",
                self.dim,
                vector.len()
            )));
        }
        let unit = normalized(&vector);
        match self.index.get(word) {
            Some(&i) => {
                self.raw[i] = vector;
                self.unit[i] = unit;
            }
            None => {
                self.index.insert(word.to_string(), self.words.len());
                self.words.push(word.to_string());
                self.raw.push(vector);
                self.unit.push(unit);
            }
        }
        Ok(())
    }

    /// Parse the word2vec text format: a `<count> <dim>` header line, then
    /// one `<word> <v1> ... <vdim>` line per word.
    pub fn from_word2vec_text<R: BufRead>(reader: R) -> Result<Self, AlignError> {
        let mut lines = reader.lines();
        let header = lines
            .next()
            .ok_or_else(|| AlignError::Embedding("missing header line".into()))??;
        let mut parts = header.split_whitespace();
        let count = parse_header_field(parts.next(), "word count")?;
        let dim = parse_header_field(parts.next(), "dimension")?;

        let mut vectors = Self::new(dim);
        for (lineno, line) in lines.enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let mut fields = line.split_whitespace();
            let Some(word) = fields.next() else {
                continue;
            };
            let vector = fields
                .map(|v| v.parse::<f32>())
                .collect::<Result<Vec<f32>, _>>()
                .map_err(|e| {
                    AlignError::Embedding(format!("line {}: bad component: {e}", lineno + 2))
                })?;
            vectors.insert(word, vector)?;
        }

        if vectors.len() != count {
            log::warn!(
                "word2vec header declares {count} words, loaded {}",
                vectors.len()
            );
        }
        Ok(vectors)
    }

    fn distinct_weights(&self, tokens: &[&str]) -> Vec<(usize, f64)> {
        let mut counts: Vec<(usize, f64)> = Vec::new();
        for token in tokens {
            let Some(&i) = self.index.get(*token) else {
                continue;
            };
            match counts.iter_mut().find(|(w, _)| *w == i) {
                Some(entry) => entry.1 += 1.0,
                None => counts.push((i, 1.0)),
            }
        }
        let total: f64 = counts.iter().map(|(_, c)| c).sum();
        for entry in &mut counts {
            entry.1 /= total;
        }
        counts
    }

    fn euclidean(&self, i: usize, j: usize) -> f64 {
        self.raw[i]
            .iter()
            .zip(&self.raw[j])
            .map(|(x, y)| {
                let d = f64::from(*x) - f64::from(*y);
                d * d
            })
            .sum::<f64>()
            .sqrt()
    }

    /// One-sided relaxation: every word of `from` moves all its mass to its
    /// nearest word of `to`.
    fn relaxed_cost(&self, from: &[(usize, f64)], to: &[(usize, f64)]) -> f64 {
        from.iter()
            .map(|&(i, weight)| {
                let nearest = to
                    .iter()
                    .map(|&(j, _)| self.euclidean(i, j))
                    .fold(f64::INFINITY, f64::min);
                weight * nearest
            })
            .sum()
    }
}

impl EmbeddingModel for WordVectors {
    fn contains(&self, token: &str) -> bool {
        self.index.contains_key(token)
    }

    fn most_similar(&self, positive: &[&str]) -> Option<String> {
        let known: Vec<usize> = positive
            .iter()
            .filter_map(|w| self.index.get(*w).copied())
            .collect();
        if known.is_empty() {
            return None;
        }

        let mut mean = vec![0f32; self.dim];
        for &i in &known {
            for (m, v) in mean.iter_mut().zip(&self.unit[i]) {
                *m += v;
            }
        }
        let mean = normalized(&mean);

        let mut best: Option<(usize, f32)> = None;
        for (i, unit) in self.unit.iter().enumerate() {
            if known.contains(&i) {
                continue;
            }
            let sim: f32 = unit.iter().zip(&mean).map(|(a, b)| a * b).sum();
            if best.map_or(true, |(_, s)| sim > s) {
                best = Some((i, sim));
            }
        }
        best.map(|(i, _)| self.words[i].clone())
    }

    /// Relaxed Word Mover's Distance: the larger of the two one-sided
    /// relaxations. A lower bound of exact WMD.
    fn wmdistance(&self, a: &[&str], b: &[&str]) -> f64 {
        let wa = self.distinct_weights(a);
        let wb = self.distinct_weights(b);
        if wa.is_empty() || wb.is_empty() {
            return f64::INFINITY;
        }
        self.relaxed_cost(&wa, &wb).max(self.relaxed_cost(&wb, &wa))
    }
}

fn parse_header_field(field: Option<&str>, what: &str) -> Result<usize, AlignError> {
    field
        .and_then(|f| f.parse().ok())
        .ok_or_else(|| AlignError::Embedding(format!("header: bad {what}")))
}

fn normalized(v: &[f32]) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        return v.to_vec();
    }
    v.iter().map(|x| x / norm).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const VECTORS: &str = "\
4 2
milk 1.0 0.0
cream 0.9 0.1
bread 0.0 1.0
toast 0.2 0.9
";

    fn load() -> WordVectors {
        WordVectors::from_word2vec_text(VECTORS.as_bytes()).unwrap()
    }

    #[test]
    fn load_text_format() {
        let wv = load();
        assert_eq!(wv.len(), 4);
        assert_eq!(wv.dim(), 2);
        assert!(wv.contains("toast"));
        assert!(!wv.contains("eggs"));
    }

    #[test]
    fn reject_wrong_dimension() {
        let err = WordVectors::from_word2vec_text("1 3\nmilk 1.0 0.0\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("expected 3 dimensions"));
    }

    #[test]
    fn reject_bad_header() {
        assert!(WordVectors::from_word2vec_text("two 2\n".as_bytes()).is_err());
        assert!(WordVectors::from_word2vec_text("".as_bytes()).is_err());
    }

    #[test]
    fn nearest_neighbor_excludes_positives() {
        let wv = load();
        assert_eq!(wv.most_similar(&["milk"]).as_deref(), Some("cream"));
        assert_eq!(wv.most_similar(&["bread"]).as_deref(), Some("toast"));
        assert_eq!(wv.most_similar(&["eggs"]), None);
    }

    #[test]
    fn wmdistance_basics() {
        let wv = load();
        assert_eq!(wv.wmdistance(&["milk"], &["milk"]), 0.0);
        let near = wv.wmdistance(&["milk"], &["cream"]);
        let far = wv.wmdistance(&["milk"], &["bread"]);
        assert!(near < far);
        assert!((far - 2f64.sqrt()).abs() < 1e-6);
        // unknown tokens are ignored, an all-unknown side is infinitely far
        assert_eq!(wv.wmdistance(&["milk", "eggs"], &["milk"]), 0.0);
        assert!(wv.wmdistance(&["eggs"], &["milk"]).is_infinite());
    }

    #[test]
    fn no_embeddings_knows_nothing() {
        let model = NoEmbeddings;
        assert!(!model.contains("milk"));
        assert_eq!(model.most_similar(&["milk"]), None);
        assert!(model.wmdistance(&["milk"], &["milk"]).is_infinite());
    }
}
