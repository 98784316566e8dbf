//! Frozen classifier artifact: fitted vectorizer and model state
//!
//! Both halves are produced by an offline training pipeline and exported as
//! JSON. They are loaded once at process start and never mutated; a missing
//! or corrupt artifact is fatal to the process, since there is no degraded
//! mode without a classifier.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Artifact loading failures. Fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ModelLoadError {
    #[error("could not read artifact file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("artifact file {path} is malformed: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(
        "vectorizer and model disagree on feature count (vocabulary {vocabulary}, weights {weights})"
    )]
    DimensionMismatch { vocabulary: usize, weights: usize },

    #[error("vocabulary index {index} is out of range for {features} features")]
    IndexOutOfRange { index: usize, features: usize },
}

/// Fitted TF-IDF vectorizer state.
///
/// `vocabulary` maps a token to its feature index; `idf` holds the inverse
/// document frequency weight per feature. Tokens outside the vocabulary
/// contribute nothing to the feature vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    pub vocabulary: HashMap<String, usize>,
    pub idf: Vec<f64>,
}

impl TfidfVectorizer {
    /// Number of features the vectorizer produces
    pub fn features(&self) -> usize {
        self.idf.len()
    }

    /// Map normalized text to a sparse TF-IDF feature vector.
    ///
    /// Tokens shorter than two characters are skipped; the fitted
    /// vocabulary never contains them. The result is L2-normalized and
    /// sorted by feature index.
    pub fn transform(&self, normalized: &str) -> Vec<(usize, f64)> {
        let mut counts: HashMap<usize, f64> = HashMap::new();
        for token in normalized.split_whitespace() {
            if token.chars().count() < 2 {
                continue;
            }
            if let Some(&index) = self.vocabulary.get(token) {
                *counts.entry(index).or_insert(0.0) += 1.0;
            }
        }

        let mut vector: Vec<(usize, f64)> = counts
            .into_iter()
            .map(|(index, tf)| (index, tf * self.idf[index]))
            .collect();

        let norm = vector.iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, v) in &mut vector {
                *v /= norm;
            }
        }

        vector.sort_by_key(|&(index, _)| index);
        vector
    }

    fn validate(&self) -> Result<(), ModelLoadError> {
        let features = self.features();
        for &index in self.vocabulary.values() {
            if index >= features {
                return Err(ModelLoadError::IndexOutOfRange { index, features });
            }
        }
        Ok(())
    }
}

/// Fitted linear model state (weights and intercept)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModel {
    pub weights: Vec<f64>,
    pub intercept: f64,
}

impl LinearModel {
    /// Decision function over a sparse feature vector
    pub fn decision(&self, vector: &[(usize, f64)]) -> f64 {
        vector
            .iter()
            .map(|&(index, value)| self.weights[index] * value)
            .sum::<f64>()
            + self.intercept
    }

    /// Positive decision means the positive (spam) class
    pub fn predict(&self, vector: &[(usize, f64)]) -> bool {
        self.decision(vector) > 0.0
    }
}

/// The complete frozen artifact: vectorizer + model.
///
/// Read-only for the process lifetime and shared by all classification
/// calls without synchronization.
#[derive(Debug, Clone)]
pub struct ClassifierArtifact {
    pub vectorizer: TfidfVectorizer,
    pub model: LinearModel,
}

impl ClassifierArtifact {
    /// Load the artifact from its two JSON files
    pub fn load(vectorizer_path: &Path, model_path: &Path) -> Result<Self, ModelLoadError> {
        let vectorizer: TfidfVectorizer = load_json(vectorizer_path)?;
        let model: LinearModel = load_json(model_path)?;
        Self::from_parts(vectorizer, model)
    }

    /// Assemble and validate an artifact from its halves
    pub fn from_parts(
        vectorizer: TfidfVectorizer,
        model: LinearModel,
    ) -> Result<Self, ModelLoadError> {
        vectorizer.validate()?;
        if vectorizer.features() != model.weights.len() {
            return Err(ModelLoadError::DimensionMismatch {
                vocabulary: vectorizer.features(),
                weights: model.weights.len(),
            });
        }
        Ok(Self { vectorizer, model })
    }
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ModelLoadError> {
    let content = std::fs::read_to_string(path).map_err(|e| ModelLoadError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&content).map_err(|e| ModelLoadError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}
