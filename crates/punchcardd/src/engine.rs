use crate::config::Config;
use chrono::{Local, Utc};
use punchcard_core::collect::{self, CollectConfig};
use punchcard_core::gate::{self, GateConfig, RecognitionContext, RecognitionOutcome, Role};
use punchcard_core::source::SourceError;
use punchcard_core::trainer::{self, TrainError};
use punchcard_core::{
    DirectoryFrameSource, FullFrameLocator, HogConfig, HogExtractor, LearnerKind, Recognizer,
    TrainReport,
};
use punchcard_store::{
    corpus_fingerprint, AttendanceLedger, AttendanceRecord, CorpusError, CorpusStore,
    CorpusSummary, LedgerError, ModelArtifact, ModelStore, ModelStoreError, SnapshotStore,
};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("frame source error: {0}")]
    Source(#[from] SourceError),
    #[error("corpus error: {0}")]
    Corpus(#[from] CorpusError),
    #[error("model store error: {0}")]
    Model(#[from] ModelStoreError),
    #[error("training failed: {0}")]
    Train(#[from] TrainError),
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Attendance transition kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockAction {
    CheckIn,
    CheckOut,
}

impl ClockAction {
    fn verb(self) -> &'static str {
        match self {
            ClockAction::CheckIn => "check-in",
            ClockAction::CheckOut => "check-out",
        }
    }
}

/// Outcome of a check-in/check-out request. Rejections are outcomes, not
/// errors: the reply always carries a human-readable reason.
#[derive(Debug, Serialize)]
pub struct ClockReply {
    pub accepted: bool,
    pub identity: String,
    pub action: String,
    pub confidence: Option<f32>,
    pub message: String,
    pub record: Option<AttendanceRecord>,
}

/// Outcome of a collection run.
#[derive(Debug, Serialize)]
pub struct CollectReply {
    pub identity: String,
    pub descriptors_added: usize,
    pub frames_seen: usize,
    pub corpus: CorpusSummary,
}

/// Outcome of an accepted training run.
#[derive(Debug, Serialize)]
pub struct TrainReply {
    pub family: String,
    pub classes: Vec<String>,
    pub metrics: TrainReport,
}

/// Messages sent from D-Bus handlers to the engine thread.
enum EngineRequest {
    Clock {
        identity: String,
        role: Role,
        action: ClockAction,
        reply: oneshot::Sender<Result<ClockReply, EngineError>>,
    },
    Collect {
        identity: String,
        target: Option<usize>,
        reply: oneshot::Sender<Result<CollectReply, EngineError>>,
    },
    Train {
        learner: Option<LearnerKind>,
        reply: oneshot::Sender<Result<TrainReply, EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Request a recognition-gated attendance transition.
    pub async fn clock(
        &self,
        identity: String,
        role: Role,
        action: ClockAction,
    ) -> Result<ClockReply, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Clock {
                identity,
                role,
                action,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// Request a collection run for one identity.
    pub async fn collect(
        &self,
        identity: String,
        target: Option<usize>,
    ) -> Result<CollectReply, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Collect {
                identity,
                target,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// Request a training run over the current corpus snapshot.
    pub async fn train(&self, learner: Option<LearnerKind>) -> Result<TrainReply, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Train {
                learner,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }
}

/// Everything the engine thread owns. One request executes at a time, so
/// corpus/model writes and per-identity ledger writes are serialized here.
struct Engine {
    config: Config,
    extractor: HogExtractor,
    locator: FullFrameLocator,
    corpus: CorpusStore,
    models: ModelStore,
    ledger: AttendanceLedger,
    snapshots: Option<SnapshotStore>,
    gate: GateConfig,
    collect: CollectConfig,
}

/// Spawn the engine on a dedicated OS thread.
pub fn spawn_engine(config: &Config) -> Result<EngineHandle, EngineError> {
    let extractor = HogExtractor::new(HogConfig::default());
    let descriptor_len = extractor.descriptor_len();

    if !config.frames_dir.is_dir() {
        tracing::warn!(
            dir = %config.frames_dir.display(),
            "frames directory does not exist yet; requests will fail until it does"
        );
    }

    let engine = Engine {
        corpus: CorpusStore::new(config.corpus_path(), descriptor_len),
        models: ModelStore::new(config.model_path()),
        ledger: AttendanceLedger::new(config.ledger_dir()),
        snapshots: config
            .snapshots_enabled
            .then(|| SnapshotStore::new(config.snapshot_dir())),
        gate: config.gate_config(),
        collect: config.collect_config(),
        extractor,
        locator: FullFrameLocator,
        config: config.clone(),
    };

    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::Builder::new()
        .name("punchcard-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Clock {
                        identity,
                        role,
                        action,
                        reply,
                    } => {
                        let _ = reply.send(engine.run_clock(&identity, role, action));
                    }
                    EngineRequest::Collect {
                        identity,
                        target,
                        reply,
                    } => {
                        let _ = reply.send(engine.run_collect(&identity, target));
                    }
                    EngineRequest::Train { learner, reply } => {
                        let _ = reply.send(engine.run_train(learner));
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })
        .expect("failed to spawn engine thread");

    Ok(EngineHandle { tx })
}

impl Engine {
    /// Recognition-gated attendance transition: verify the claimed identity,
    /// then drive the ledger state machine. Only an accepted recognition
    /// reaches the ledger, and only for operator sessions.
    fn run_clock(
        &self,
        identity: &str,
        role: Role,
        action: ClockAction,
    ) -> Result<ClockReply, EngineError> {
        let session = Uuid::new_v4();
        tracing::info!(%session, identity, action = action.verb(), ?role, "clock request");

        let denied = |message: String, confidence: Option<f32>| ClockReply {
            accepted: false,
            identity: identity.to_string(),
            action: action.verb().to_string(),
            confidence,
            message,
            record: None,
        };

        // The corpus must know this identity before recognition is even
        // attempted; a missing model is an operator-facing message.
        if !self.corpus.load()?.contains_label(identity) {
            return Ok(denied(
                format!("no face data collected for {identity}; contact an administrator"),
                None,
            ));
        }
        let artifact = match self.models.load() {
            Ok(a) => a,
            Err(ModelStoreError::NotTrained(_)) => {
                return Ok(denied(
                    "recognition model is not trained yet; contact an administrator".to_string(),
                    None,
                ));
            }
            Err(e) => return Err(e.into()),
        };

        let threshold = self
            .gate
            .threshold_override
            .unwrap_or(artifact.recommended_threshold);
        let recognizer = Recognizer::new(&artifact.learner, &artifact.classes, threshold);
        let context = RecognitionContext {
            claimed_identity: identity.to_string(),
            role,
        };

        let mut source = DirectoryFrameSource::open(&self.config.frames_dir)?;
        let outcome = gate::run_recognition(
            &recognizer,
            &context,
            &mut source,
            &self.locator,
            &self.extractor,
            &self.gate,
        )?;

        let (confidence, region) = match outcome {
            RecognitionOutcome::Rejected(reason) => {
                return Ok(denied(reason.to_string(), None));
            }
            RecognitionOutcome::Accepted {
                confidence, region, ..
            } => (confidence, region),
        };

        if role == Role::Administrator {
            // Dry run: recognition result only, nothing written.
            return Ok(ClockReply {
                accepted: true,
                identity: identity.to_string(),
                action: action.verb().to_string(),
                confidence: Some(confidence),
                message: format!("recognized {identity}; demo session, no attendance recorded"),
                record: None,
            });
        }

        let timestamp = Local::now().naive_local();
        self.ledger.init_log(identity)?;
        let result = match action {
            ClockAction::CheckIn => {
                self.ledger.check_in(identity, timestamp, &self.config.position)
            }
            ClockAction::CheckOut => self.ledger.check_out(identity, timestamp),
        };

        let record = match result {
            Ok(record) => record,
            // State-machine violations come back as denied outcomes with
            // the specific reason; the ledger is unchanged.
            Err(
                e @ (LedgerError::AlreadyCheckedIn { .. }
                | LedgerError::AlreadyCheckedOut { .. }
                | LedgerError::NoOpenCheckIn { .. }),
            ) => {
                return Ok(denied(e.to_string(), Some(confidence)));
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(snapshots) = &self.snapshots {
            if let Err(e) = snapshots.save(identity, &region, timestamp) {
                tracing::warn!(%session, error = %e, "evidence snapshot failed; continuing");
            }
        }

        Ok(ClockReply {
            accepted: true,
            identity: identity.to_string(),
            action: action.verb().to_string(),
            confidence: Some(confidence),
            message: format!("{} recorded for {identity}", action.verb()),
            record: Some(record),
        })
    }

    /// Collection run: frames through quality gate, augmentation and
    /// extraction, merged into the corpus under the given identity.
    fn run_collect(
        &self,
        identity: &str,
        target: Option<usize>,
    ) -> Result<CollectReply, EngineError> {
        let session = Uuid::new_v4();
        tracing::info!(%session, identity, "collect request");

        let mut config = self.collect.clone();
        if let Some(target) = target {
            config.target_samples = target;
        }

        let mut source = DirectoryFrameSource::open(&self.config.frames_dir)?;
        let report = collect::collect_samples(
            &mut source,
            &self.locator,
            &self.extractor,
            &config,
        )?;

        let added = report.descriptors.len();
        let labels = vec![identity.to_string(); added];
        let corpus = self.corpus.accumulate(report.descriptors, labels)?;

        Ok(CollectReply {
            identity: identity.to_string(),
            descriptors_added: added,
            frames_seen: report.frames_seen,
            corpus,
        })
    }

    /// Training run over the current corpus snapshot. The accepted model is
    /// persisted together with its label set, threshold recommendation and
    /// corpus fingerprint as one artifact.
    fn run_train(&self, learner: Option<LearnerKind>) -> Result<TrainReply, EngineError> {
        let session = Uuid::new_v4();
        tracing::info!(%session, "train request");

        let corpus = self.corpus.load()?;
        let config = self.config.trainer_config(learner);
        let model = trainer::train(&corpus.descriptors, &corpus.labels, &config)?;

        let artifact = ModelArtifact {
            descriptor_len: self.extractor.descriptor_len(),
            recommended_threshold: model.report.recommended_threshold,
            metrics: model.report.clone(),
            corpus_sha256: corpus_fingerprint(&corpus),
            trained_at: Utc::now(),
            classes: model.classes,
            learner: model.learner,
        };
        self.models.save(&artifact)?;

        Ok(TrainReply {
            family: artifact.learner.kind().to_string(),
            classes: artifact.classes,
            metrics: artifact.metrics,
        })
    }
}
