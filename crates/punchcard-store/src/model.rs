//! Model-artifact persistence.
//!
//! The decision function and the label set it was trained on are one
//! artifact, persisted and loaded together — a model without its classes
//! (or vice versa) cannot exist on disk, which rules out class-list drift.

use crate::atomic::write_atomic;
use crate::corpus::Corpus;
use chrono::{DateTime, Utc};
use punchcard_core::{TrainReport, TrainedLearner};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelStoreError {
    #[error("no trained model at {0}; run training first")]
    NotTrained(PathBuf),
    #[error("model artifact is malformed or incomplete: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The persisted model artifact. Every field is required: a document with
/// any of them missing fails to load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub learner: TrainedLearner,
    /// Ordered label set; learner class indices point into this.
    pub classes: Vec<String>,
    /// Descriptor width the learner was trained with.
    pub descriptor_len: usize,
    /// Trainer-recommended recognition threshold. The gate reads this
    /// unless explicitly overridden in configuration.
    pub recommended_threshold: f32,
    pub metrics: TrainReport,
    /// Fingerprint of the corpus snapshot this model was trained on.
    pub corpus_sha256: String,
    pub trained_at: DateTime<Utc>,
}

/// Model store bound to one artifact path.
pub struct ModelStore {
    path: PathBuf,
}

impl ModelStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn save(&self, artifact: &ModelArtifact) -> Result<(), ModelStoreError> {
        let bytes = serde_json::to_vec(artifact)?;
        write_atomic(&self.path, &bytes)?;
        tracing::info!(
            path = %self.path.display(),
            family = %artifact.learner.kind(),
            classes = artifact.classes.len(),
            threshold = artifact.recommended_threshold,
            "model artifact persisted"
        );
        Ok(())
    }

    pub fn load(&self) -> Result<ModelArtifact, ModelStoreError> {
        if !self.path.exists() {
            return Err(ModelStoreError::NotTrained(self.path.clone()));
        }
        let bytes = std::fs::read(&self.path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// SHA-256 over the corpus serialization, hex-encoded.
pub fn corpus_fingerprint(corpus: &Corpus) -> String {
    let mut hasher = Sha256::new();
    // Serialization is deterministic for a given corpus (ordered fields,
    // ordered rows), so the digest identifies the snapshot.
    if let Ok(bytes) = serde_json::to_vec(corpus) {
        hasher.update(&bytes);
    }
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use punchcard_core::{Descriptor, LearnerKind};

    fn artifact() -> ModelArtifact {
        let samples =
            Array2::from_shape_vec((4, 2), vec![0.0, 0.0, 0.1, 0.0, 1.0, 1.0, 0.9, 1.0]).unwrap();
        let learner = LearnerKind::Knn
            .fit(samples.view(), &[0, 0, 1, 1], 2, 0)
            .unwrap();
        ModelArtifact {
            learner,
            classes: vec!["alice".into(), "bob".into()],
            descriptor_len: 2,
            recommended_threshold: 0.62,
            metrics: TrainReport {
                train_accuracy: 1.0,
                test_accuracy: 1.0,
                mean_test_confidence: 0.72,
                recommended_threshold: 0.62,
                train_samples: 3,
                test_samples: 1,
            },
            corpus_sha256: "abc".into(),
            trained_at: Utc::now(),
        }
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path().join("model.json"));
        store.save(&artifact()).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.classes, vec!["alice", "bob"]);
        assert_eq!(loaded.descriptor_len, 2);
        assert!((loaded.recommended_threshold - 0.62).abs() < 1e-6);
        assert_eq!(loaded.learner.kind(), LearnerKind::Knn);
    }

    #[test]
    fn test_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path().join("model.json"));
        assert!(matches!(
            store.load().unwrap_err(),
            ModelStoreError::NotTrained(_)
        ));
    }

    #[test]
    fn test_artifact_missing_classes_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let store = ModelStore::new(&path);
        store.save(&artifact()).unwrap();

        // Strip the classes field; the loader must refuse the document.
        let mut doc: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        doc.as_object_mut().unwrap().remove("classes");
        std::fs::write(&path, serde_json::to_vec(&doc).unwrap()).unwrap();

        assert!(matches!(
            store.load().unwrap_err(),
            ModelStoreError::Malformed(_)
        ));
    }

    #[test]
    fn test_artifact_missing_learner_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let store = ModelStore::new(&path);
        store.save(&artifact()).unwrap();

        let mut doc: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        doc.as_object_mut().unwrap().remove("learner");
        std::fs::write(&path, serde_json::to_vec(&doc).unwrap()).unwrap();

        assert!(matches!(
            store.load().unwrap_err(),
            ModelStoreError::Malformed(_)
        ));
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let empty = Corpus::default();
        let mut one = Corpus::default();
        one.descriptors.push(Descriptor { values: vec![1.0] });
        one.labels.push("alice".into());

        assert_eq!(corpus_fingerprint(&empty), corpus_fingerprint(&empty));
        assert_ne!(corpus_fingerprint(&empty), corpus_fingerprint(&one));
    }
}
