//! Descriptor corpus persistence.
//!
//! The corpus is a pair of parallel containers — descriptors and labels —
//! persisted as one JSON document. Accumulation is append-only: existing
//! rows first, new rows after, written atomically so a crash never leaves
//! mismatched counts on disk.

use crate::atomic::write_atomic;
use punchcard_core::Descriptor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CorpusError {
    #[error("descriptor count {descriptors} does not match label count {labels}")]
    CountMismatch { descriptors: usize, labels: usize },
    #[error(
        "corpus width {found} does not match the configured descriptor length {expected}; \
         the corpus was built under a different descriptor geometry and must be re-collected"
    )]
    CorpusSchemaDrift { expected: usize, found: usize },
    #[error("corpus file is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Parallel descriptor/label containers. Always moved as a unit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Corpus {
    pub descriptors: Vec<Descriptor>,
    pub labels: Vec<String>,
}

impl Corpus {
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Width of the descriptors, or `None` for an empty corpus.
    pub fn width(&self) -> Option<usize> {
        self.descriptors.first().map(Descriptor::len)
    }

    pub fn label_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for label in &self.labels {
            *counts.entry(label.clone()).or_insert(0) += 1;
        }
        counts
    }

    pub fn contains_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

/// Read-only corpus summary for status reporting and the diversity gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusSummary {
    pub total_samples: usize,
    pub distinct_labels: usize,
    pub label_counts: BTreeMap<String, usize>,
    /// Whether the diversity requirement for training (≥2 labels) is met.
    /// A single-label corpus is an expected state mid-collection.
    pub trainable: bool,
}

impl CorpusSummary {
    fn of(corpus: &Corpus) -> Self {
        let label_counts = corpus.label_counts();
        let distinct_labels = label_counts.len();
        Self {
            total_samples: corpus.len(),
            distinct_labels,
            label_counts,
            trainable: distinct_labels >= 2,
        }
    }
}

/// Corpus store bound to one file path and one descriptor geometry.
pub struct CorpusStore {
    path: PathBuf,
    expected_width: usize,
}

impl CorpusStore {
    pub fn new(path: impl Into<PathBuf>, expected_width: usize) -> Self {
        Self {
            path: path.into(),
            expected_width,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted corpus. A missing file is an empty corpus.
    ///
    /// Validates the pair invariant and the descriptor width before
    /// returning anything; a stale-geometry corpus surfaces as
    /// [`CorpusError::CorpusSchemaDrift`] and is never silently coerced.
    pub fn load(&self) -> Result<Corpus, CorpusError> {
        if !self.path.exists() {
            return Ok(Corpus::default());
        }
        let bytes = std::fs::read(&self.path)?;
        let corpus: Corpus = serde_json::from_slice(&bytes)?;
        self.validate(&corpus)?;
        Ok(corpus)
    }

    /// Merge new rows into the persisted corpus (existing first, new after)
    /// and write the result back atomically.
    pub fn accumulate(
        &self,
        new_descriptors: Vec<Descriptor>,
        new_labels: Vec<String>,
    ) -> Result<CorpusSummary, CorpusError> {
        if new_descriptors.len() != new_labels.len() {
            return Err(CorpusError::CountMismatch {
                descriptors: new_descriptors.len(),
                labels: new_labels.len(),
            });
        }
        for d in &new_descriptors {
            if d.len() != self.expected_width {
                return Err(CorpusError::CorpusSchemaDrift {
                    expected: self.expected_width,
                    found: d.len(),
                });
            }
        }

        let mut corpus = self.load()?;
        corpus.descriptors.extend(new_descriptors);
        corpus.labels.extend(new_labels);

        let bytes = serde_json::to_vec(&corpus)?;
        write_atomic(&self.path, &bytes)?;

        let summary = CorpusSummary::of(&corpus);
        tracing::info!(
            path = %self.path.display(),
            total = summary.total_samples,
            labels = summary.distinct_labels,
            "corpus accumulated"
        );
        Ok(summary)
    }

    pub fn summary(&self) -> Result<CorpusSummary, CorpusError> {
        Ok(CorpusSummary::of(&self.load()?))
    }

    fn validate(&self, corpus: &Corpus) -> Result<(), CorpusError> {
        if corpus.descriptors.len() != corpus.labels.len() {
            return Err(CorpusError::CountMismatch {
                descriptors: corpus.descriptors.len(),
                labels: corpus.labels.len(),
            });
        }
        if let Some(d) = corpus.descriptors.iter().find(|d| d.len() != self.expected_width) {
            return Err(CorpusError::CorpusSchemaDrift {
                expected: self.expected_width,
                found: d.len(),
            });
        }
        Ok(())
    }
}
