//! punchcard-store — Persistence for the Punchcard time clock.
//!
//! Three stores, all crash-safe via two-phase writes: the descriptor corpus
//! (parallel descriptors/labels, merged append-only), the model artifact
//! (decision function + label set + recommended threshold, one document),
//! and the per-identity attendance ledger (CSV, one row per date).

mod atomic;
pub mod corpus;
pub mod ledger;
pub mod model;
pub mod snapshot;

pub use corpus::{Corpus, CorpusError, CorpusStore, CorpusSummary};
pub use ledger::{AttendanceLedger, AttendanceRecord, LedgerError};
pub use model::{corpus_fingerprint, ModelArtifact, ModelStore, ModelStoreError};
pub use snapshot::{SnapshotError, SnapshotStore};
