use punchcard_core::{
    CollectConfig, GapSeverity, GateConfig, LearnerKind, TrainerConfig,
};
use std::path::PathBuf;

/// Daemon configuration, loaded from environment variables.
#[derive(Clone)]
pub struct Config {
    /// Root directory for corpus, model and ledger files.
    pub data_dir: PathBuf,
    /// Directory the frame source reads stored frames from.
    pub frames_dir: PathBuf,
    /// Position tag written to every attendance row.
    pub position: String,
    /// Learner family used when a train request names none.
    pub learner: LearnerKind,
    /// Explicit recognition threshold; unset means the trained artifact's
    /// recommendation applies.
    pub threshold_override: Option<f32>,
    /// Frame attempts per recognition run.
    pub max_attempts: usize,
    /// Apply the quality gate during recognition (it always applies during
    /// collection).
    pub enforce_quality: bool,
    /// Descriptor target per collection run.
    pub target_samples: usize,
    /// Minimum test accuracy for a model to be persisted.
    pub min_test_accuracy: f32,
    /// Maximum tolerated train/test accuracy gap.
    pub overfit_gap: f32,
    /// Whether an exceeded gap rejects the model instead of warning.
    pub gap_reject: bool,
    /// Save an evidence snapshot per accepted attendance event.
    pub snapshots_enabled: bool,
}

impl Config {
    /// Load configuration from `PUNCHCARD_*` environment variables with
    /// defaults.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("PUNCHCARD_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_data_dir());

        let frames_dir = std::env::var("PUNCHCARD_FRAMES_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("frames"));

        Self {
            data_dir,
            frames_dir,
            position: std::env::var("PUNCHCARD_POSITION")
                .unwrap_or_else(|_| "attendance".to_string()),
            learner: std::env::var("PUNCHCARD_LEARNER")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(LearnerKind::AdaBoost),
            threshold_override: std::env::var("PUNCHCARD_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok()),
            max_attempts: env_usize("PUNCHCARD_MAX_ATTEMPTS", 10),
            enforce_quality: env_flag("PUNCHCARD_ENFORCE_QUALITY", false),
            target_samples: env_usize("PUNCHCARD_TARGET_SAMPLES", 40),
            min_test_accuracy: env_f32("PUNCHCARD_MIN_TEST_ACCURACY", 0.8),
            overfit_gap: env_f32("PUNCHCARD_OVERFIT_GAP", 0.15),
            gap_reject: env_flag("PUNCHCARD_OVERFIT_REJECT", false),
            snapshots_enabled: env_flag("PUNCHCARD_SNAPSHOTS", true),
        }
    }

    pub fn corpus_path(&self) -> PathBuf {
        self.data_dir.join("dataset").join("corpus.json")
    }

    pub fn model_path(&self) -> PathBuf {
        self.data_dir.join("models").join("model.json")
    }

    pub fn ledger_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    pub fn snapshot_dir(&self) -> PathBuf {
        self.data_dir.join("logs").join("images")
    }

    pub fn gate_config(&self) -> GateConfig {
        GateConfig {
            max_attempts: self.max_attempts,
            threshold_override: self.threshold_override,
            enforce_quality: self.enforce_quality,
            ..GateConfig::default()
        }
    }

    pub fn collect_config(&self) -> CollectConfig {
        CollectConfig {
            target_samples: self.target_samples,
            ..CollectConfig::default()
        }
    }

    pub fn trainer_config(&self, learner: Option<LearnerKind>) -> TrainerConfig {
        TrainerConfig {
            learner: learner.unwrap_or(self.learner),
            min_test_accuracy: self.min_test_accuracy,
            overfit_gap: self.overfit_gap,
            gap_severity: if self.gap_reject {
                GapSeverity::Reject
            } else {
                GapSeverity::Warn
            },
            ..TrainerConfig::default()
        }
    }
}

fn default_data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("punchcard")
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key).map(|v| v != "0").unwrap_or(default)
}
