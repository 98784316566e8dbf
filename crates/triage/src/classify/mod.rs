//! Spam/ham classification over a frozen artifact
//!
//! The classifier is pure given its artifact: the same text always yields
//! the same verdict for a given loaded artifact. Normalization mirrors the
//! training pipeline - non-word characters become spaces, everything is
//! lowercased - so the fitted vocabulary lines up with what we feed it.

mod artifact;

pub use artifact::{ClassifierArtifact, LinearModel, ModelLoadError, TfidfVectorizer};

use crate::models::Verdict;

/// Text classifier wrapping the frozen vectorizer + model
pub struct Classifier {
    artifact: ClassifierArtifact,
}

impl Classifier {
    /// Create a classifier from a loaded artifact
    pub fn new(artifact: ClassifierArtifact) -> Self {
        Self { artifact }
    }

    /// Classify a message body.
    ///
    /// Empty text is a defined input: the feature vector is all zeros and
    /// the verdict is the sign of the model's intercept.
    pub fn classify(&self, text: &str) -> Verdict {
        let normalized = normalize(text);
        let vector = self.artifact.vectorizer.transform(&normalized);
        if self.artifact.model.predict(&vector) {
            Verdict::Spam
        } else {
            Verdict::Ham
        }
    }
}

/// Replace every non-word character with a space and lowercase the rest
fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_alphanumeric() || c == '_' {
            out.extend(c.to_lowercase());
        } else {
            out.push(' ');
        }
    }
    out
}
