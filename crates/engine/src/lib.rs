//! retag rename engine -- moves tag values from old keys to a new key
//! across many entities without ever dropping a value.
//!
//! For every (entity, selected key) pair the engine produces exactly one
//! [`RenameOutcome`]. A present key is moved by a merge of the new key
//! followed, only on success, by a delete of the old pair, so the only
//! failure mode that touches data is a visible duplicate, never a loss.
//!
//! Per-key failures are folded into the [`RunSummary`]; [`RenameEngine::rename`]
//! only fails for invalid input or a store that is unusable before any
//! entity is processed.

mod aggregate;
mod config;
mod engine;
mod error;
mod outcome;
mod plan;
pub mod report;

pub use aggregate::{EntityReport, KeyChange, OutcomeAggregator, RunSummary};
pub use config::{CollisionPolicy, EngineConfig, TagSource};
pub use engine::{RenameEngine, StopHandle};
pub use error::EngineError;
pub use outcome::{OutcomeCounts, OutcomeRecord, RenameOutcome};
pub use plan::{KeyDecision, PlannedChange, RenamePlan, RenameRequest};

pub use retag_store::{EntityKind, StoreError, TagKey, TagSet, TagStore, TagValue, TargetEntity};
