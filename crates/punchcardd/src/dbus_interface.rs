use crate::config::Config;
use crate::engine::{ClockAction, EngineHandle};
use punchcard_core::{HogConfig, LearnerKind, Role};
use punchcard_store::{AttendanceLedger, CorpusStore, ModelStore};
use zbus::interface;

/// D-Bus interface for the Punchcard attendance daemon.
///
/// Bus name: org.punchcard.Punchcard1
/// Object path: /org/punchcard/Punchcard1
///
/// Mutating calls go through the engine thread; read-only calls hit the
/// stores directly. Payloads are JSON strings.
pub struct PunchcardService {
    engine: EngineHandle,
    config: Config,
}

impl PunchcardService {
    pub fn new(engine: EngineHandle, config: Config) -> Self {
        Self { engine, config }
    }

    fn role(admin: bool) -> Role {
        if admin {
            Role::Administrator
        } else {
            Role::Operator
        }
    }

    fn to_json<T: serde::Serialize>(value: &T) -> zbus::fdo::Result<String> {
        serde_json::to_string(value).map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
    }
}

#[interface(name = "org.punchcard.Punchcard1")]
impl PunchcardService {
    /// Recognition-gated check-in for the claimed identity.
    async fn check_in(&self, identity: &str, admin: bool) -> zbus::fdo::Result<String> {
        tracing::info!(identity, admin, "check_in requested");
        let reply = self
            .engine
            .clock(identity.to_string(), Self::role(admin), ClockAction::CheckIn)
            .await
            .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))?;
        Self::to_json(&reply)
    }

    /// Recognition-gated check-out for the claimed identity.
    async fn check_out(&self, identity: &str, admin: bool) -> zbus::fdo::Result<String> {
        tracing::info!(identity, admin, "check_out requested");
        let reply = self
            .engine
            .clock(identity.to_string(), Self::role(admin), ClockAction::CheckOut)
            .await
            .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))?;
        Self::to_json(&reply)
    }

    /// Collect training descriptors for one identity from the frame
    /// directory. `target` 0 uses the configured default.
    async fn collect(&self, identity: &str, target: u32) -> zbus::fdo::Result<String> {
        tracing::info!(identity, target, "collect requested");
        let target = (target > 0).then_some(target as usize);
        let reply = self
            .engine
            .collect(identity.to_string(), target)
            .await
            .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))?;
        Self::to_json(&reply)
    }

    /// Train a model over the current corpus. An empty `family` uses the
    /// configured default.
    async fn train(&self, family: &str) -> zbus::fdo::Result<String> {
        tracing::info!(family, "train requested");
        let learner = if family.is_empty() {
            None
        } else {
            Some(
                family
                    .parse::<LearnerKind>()
                    .map_err(|e| zbus::fdo::Error::InvalidArgs(e.to_string()))?,
            )
        };
        let reply = self
            .engine
            .train(learner)
            .await
            .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))?;
        Self::to_json(&reply)
    }

    /// Corpus summary: sample and label counts, trainability.
    async fn summary(&self) -> zbus::fdo::Result<String> {
        let store = CorpusStore::new(
            self.config.corpus_path(),
            HogConfig::default().descriptor_len(),
        );
        let summary = store
            .summary()
            .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))?;
        Self::to_json(&summary)
    }

    /// Attendance history; an empty identity returns every identity's rows.
    async fn history(&self, identity: &str) -> zbus::fdo::Result<String> {
        let ledger = AttendanceLedger::new(self.config.ledger_dir());
        let records = if identity.is_empty() {
            ledger.all_history()
        } else {
            ledger.history(identity)
        }
        .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))?;
        Self::to_json(&records)
    }

    /// Daemon status information.
    async fn status(&self) -> zbus::fdo::Result<String> {
        let models = ModelStore::new(self.config.model_path());
        let model = models.load().ok();
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "frames_dir": self.config.frames_dir.display().to_string(),
            "model_trained": model.is_some(),
            "classes": model.as_ref().map(|m| m.classes.clone()).unwrap_or_default(),
            "recommended_threshold": model.as_ref().map(|m| m.recommended_threshold),
            "threshold_override": self.config.threshold_override,
        })
        .to_string())
    }
}
