//! punchcard-core — Face-descriptor pipeline, learner training and
//! confidence-gated recognition for the Punchcard time clock.
//!
//! The pipeline turns a located face region into a fixed-length
//! gradient-histogram descriptor, trains a tabular learner over an
//! accumulated descriptor corpus, and verifies a claimed identity before any
//! attendance transition is authorized.

pub mod augment;
pub mod collect;
pub mod gate;
pub mod hog;
pub mod learner;
pub mod quality;
pub mod source;
pub mod trainer;
pub mod types;

pub use collect::{CollectConfig, CollectReport};
pub use gate::{
    GateConfig, RecognitionContext, RecognitionOutcome, Recognizer, RejectReason, Role,
};
pub use hog::{HogConfig, HogExtractor};
pub use learner::{LearnerKind, TrainedLearner};
pub use quality::QualityConfig;
pub use source::{
    DirectoryFrameSource, FaceLocator, FrameSource, FullFrameLocator, MemoryFrameSource,
};
pub use trainer::{GapSeverity, TrainReport, TrainedModel, TrainerConfig};
pub use types::{Descriptor, FaceBox, FaceRegion, GrayFrame};
