use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use punchcard_core::{
    collect, gate, trainer, CollectConfig, DirectoryFrameSource, FullFrameLocator, GapSeverity,
    GateConfig, HogConfig, HogExtractor, LearnerKind, RecognitionContext, RecognitionOutcome,
    Recognizer, Role, TrainerConfig,
};
use punchcard_store::{
    corpus_fingerprint, AttendanceLedger, CorpusStore, LedgerError, ModelArtifact, ModelStore,
    SnapshotStore,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "punchcard", about = "Punchcard attendance CLI")]
struct Cli {
    /// Data directory holding corpus, model and attendance logs.
    #[arg(long, env = "PUNCHCARD_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect training descriptors for an identity from a frame directory
    Collect {
        /// Identity label for the collected descriptors
        #[arg(short, long)]
        identity: String,
        /// Directory of stored frames (png/jpg), visited in order
        #[arg(short, long)]
        frames: PathBuf,
        /// Descriptor target for this run
        #[arg(short, long, default_value_t = 40)]
        samples: usize,
    },
    /// Train and validate a model over the accumulated corpus
    Train {
        /// Learner family: knn, linear, adaboost or mlp
        #[arg(short, long, default_value = "adaboost")]
        learner: String,
        /// Minimum test accuracy for the model to be persisted
        #[arg(long, default_value_t = 0.8)]
        min_accuracy: f32,
        /// Reject (instead of warn) on an excessive train/test gap
        #[arg(long)]
        reject_overfit: bool,
    },
    /// Recognition-gated check-in
    CheckIn {
        #[arg(short, long)]
        identity: String,
        #[arg(short, long)]
        frames: PathBuf,
        /// Override the artifact's recommended threshold
        #[arg(long)]
        threshold: Option<f32>,
        /// Demo run: recognize but record nothing
        #[arg(long)]
        demo: bool,
    },
    /// Recognition-gated check-out
    CheckOut {
        #[arg(short, long)]
        identity: String,
        #[arg(short, long)]
        frames: PathBuf,
        #[arg(long)]
        threshold: Option<f32>,
        #[arg(long)]
        demo: bool,
    },
    /// Show attendance history (all identities when none is given)
    History {
        identity: Option<String>,
    },
    /// Show corpus summary
    Summary,
    /// Show trained-model status
    Status,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let data_dir = cli.data_dir.unwrap_or_else(default_data_dir);
    let extractor = HogExtractor::new(HogConfig::default());

    match cli.command {
        Commands::Collect {
            identity,
            frames,
            samples,
        } => {
            let mut source = DirectoryFrameSource::open(&frames)
                .with_context(|| format!("opening frame directory {}", frames.display()))?;
            let config = CollectConfig {
                target_samples: samples,
                ..CollectConfig::default()
            };
            let report =
                collect::collect_samples(&mut source, &FullFrameLocator, &extractor, &config)?;

            if report.descriptors.is_empty() {
                println!(
                    "No usable faces in {} frame(s); corpus unchanged",
                    report.frames_seen
                );
                return Ok(());
            }

            let store = corpus_store(&data_dir, &extractor);
            let added = report.descriptors.len();
            let labels = vec![identity.clone(); added];
            let summary = store.accumulate(report.descriptors, labels)?;

            println!("Collected {added} descriptor(s) for {identity}");
            println!(
                "Corpus: {} sample(s), {} identit(ies){}",
                summary.total_samples,
                summary.distinct_labels,
                if summary.trainable {
                    ""
                } else {
                    " — need a second identity before training"
                }
            );
        }
        Commands::Train {
            learner,
            min_accuracy,
            reject_overfit,
        } => {
            let learner: LearnerKind = learner.parse()?;
            let store = corpus_store(&data_dir, &extractor);
            let corpus = store.load()?;

            let config = TrainerConfig {
                learner,
                min_test_accuracy: min_accuracy,
                gap_severity: if reject_overfit {
                    GapSeverity::Reject
                } else {
                    GapSeverity::Warn
                },
                ..TrainerConfig::default()
            };
            let model = trainer::train(&corpus.descriptors, &corpus.labels, &config)?;

            let artifact = ModelArtifact {
                descriptor_len: extractor.descriptor_len(),
                recommended_threshold: model.report.recommended_threshold,
                metrics: model.report.clone(),
                corpus_sha256: corpus_fingerprint(&corpus),
                trained_at: chrono::Utc::now(),
                classes: model.classes,
                learner: model.learner,
            };
            ModelStore::new(model_path(&data_dir)).save(&artifact)?;

            println!("Trained {learner} model over {} sample(s)", corpus.len());
            println!(
                "  train accuracy {:.2}, test accuracy {:.2}",
                artifact.metrics.train_accuracy, artifact.metrics.test_accuracy
            );
            println!(
                "  recommended threshold {:.2}",
                artifact.recommended_threshold
            );
        }
        Commands::CheckIn {
            identity,
            frames,
            threshold,
            demo,
        } => clock(
            &data_dir, &extractor, &identity, &frames, threshold, demo, true,
        )?,
        Commands::CheckOut {
            identity,
            frames,
            threshold,
            demo,
        } => clock(
            &data_dir, &extractor, &identity, &frames, threshold, demo, false,
        )?,
        Commands::History { identity } => {
            let ledger = AttendanceLedger::new(data_dir.join("logs"));
            let records = match identity {
                Some(identity) => ledger.history(&identity)?,
                None => ledger.all_history()?,
            };
            if records.is_empty() {
                println!("No attendance records");
                return Ok(());
            }
            for r in records {
                println!(
                    "{}  {}  in={}  out={}  hours={}",
                    r.name,
                    r.date,
                    r.check_in.map(|t| t.to_string()).unwrap_or_else(|| "-".into()),
                    r.check_out.map(|t| t.to_string()).unwrap_or_else(|| "-".into()),
                    r.worked_hours.map(|h| format!("{h:.2}")).unwrap_or_else(|| "-".into()),
                );
            }
        }
        Commands::Summary => {
            let summary = corpus_store(&data_dir, &extractor).summary()?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Status => {
            let store = ModelStore::new(model_path(&data_dir));
            match store.load() {
                Ok(artifact) => {
                    println!("Model: {} ({} classes)", artifact.learner.kind(), artifact.classes.len());
                    println!("  classes: {}", artifact.classes.join(", "));
                    println!("  trained at: {}", artifact.trained_at);
                    println!("  test accuracy: {:.2}", artifact.metrics.test_accuracy);
                    println!(
                        "  recommended threshold: {:.2}",
                        artifact.recommended_threshold
                    );
                }
                Err(e) => println!("No usable model: {e}"),
            }
        }
    }

    Ok(())
}

/// Run the recognition gate and, on acceptance, the ledger transition.
#[allow(clippy::too_many_arguments)]
fn clock(
    data_dir: &std::path::Path,
    extractor: &HogExtractor,
    identity: &str,
    frames: &std::path::Path,
    threshold: Option<f32>,
    demo: bool,
    check_in: bool,
) -> Result<()> {
    let artifact = ModelStore::new(model_path(data_dir))
        .load()
        .context("recognition model is not trained yet")?;

    let resolved = threshold.unwrap_or(artifact.recommended_threshold);
    let recognizer = Recognizer::new(&artifact.learner, &artifact.classes, resolved);
    let context = RecognitionContext {
        claimed_identity: identity.to_string(),
        role: if demo { Role::Administrator } else { Role::Operator },
    };

    let mut source = DirectoryFrameSource::open(frames)
        .with_context(|| format!("opening frame directory {}", frames.display()))?;
    let outcome = gate::run_recognition(
        &recognizer,
        &context,
        &mut source,
        &FullFrameLocator,
        extractor,
        &GateConfig {
            threshold_override: threshold,
            ..GateConfig::default()
        },
    )?;

    let (confidence, region) = match outcome {
        RecognitionOutcome::Rejected(reason) => {
            println!("Rejected: {reason}");
            return Ok(());
        }
        RecognitionOutcome::Accepted {
            confidence, region, ..
        } => (confidence, region),
    };

    println!("Recognized {identity} ({:.0}% confidence)", confidence * 100.0);
    if demo {
        println!("Demo session: no attendance recorded");
        return Ok(());
    }

    let ledger = AttendanceLedger::new(data_dir.join("logs"));
    ledger.init_log(identity)?;
    let timestamp = Local::now().naive_local();
    let result = if check_in {
        ledger.check_in(identity, timestamp, "attendance")
    } else {
        ledger.check_out(identity, timestamp)
    };

    match result {
        Ok(record) => {
            println!(
                "{} recorded for {identity} on {}",
                if check_in { "Check-in" } else { "Check-out" },
                record.date
            );
            if let Some(hours) = record.worked_hours {
                println!("Worked {hours:.2} hour(s)");
            }
            if let Err(e) = SnapshotStore::new(data_dir.join("logs").join("images")).save(
                identity,
                &region,
                timestamp,
            ) {
                tracing::warn!(error = %e, "evidence snapshot failed; continuing");
            }
        }
        Err(
            e @ (LedgerError::AlreadyCheckedIn { .. }
            | LedgerError::AlreadyCheckedOut { .. }
            | LedgerError::NoOpenCheckIn { .. }),
        ) => println!("Rejected: {e}"),
        Err(e) => bail!(e),
    }

    Ok(())
}

fn corpus_store(data_dir: &std::path::Path, extractor: &HogExtractor) -> CorpusStore {
    CorpusStore::new(
        data_dir.join("dataset").join("corpus.json"),
        extractor.descriptor_len(),
    )
}

fn model_path(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join("models").join("model.json")
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
