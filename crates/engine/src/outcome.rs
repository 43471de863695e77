use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use retag_store::{EntityKind, StoreError, TagKey, TagValue};

/// The result of renaming one selected key on one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameOutcome {
    /// The old key was absent when checked. No store call was made.
    NotFound,
    /// The new key was merged and the old pair deleted.
    Applied,
    /// The merge failed; the delete was not attempted, the old pair is intact.
    MergeFailed(StoreError),
    /// The merge succeeded but the delete failed. The entity now carries
    /// both the old and the new key with the same value.
    DeleteFailed(StoreError),
    /// The new key already held a different value and the collision policy
    /// is `skip`. No store call was made.
    Conflict { existing: TagValue },
}

impl RenameOutcome {
    /// Stable snake_case label used in logs, JSON, and CSV exports.
    pub fn status(&self) -> &'static str {
        match self {
            RenameOutcome::NotFound => "not_found",
            RenameOutcome::Applied => "applied",
            RenameOutcome::MergeFailed(_) => "merge_failed",
            RenameOutcome::DeleteFailed(_) => "delete_failed",
            RenameOutcome::Conflict { .. } => "conflict",
        }
    }

    pub fn error(&self) -> Option<&StoreError> {
        match self {
            RenameOutcome::MergeFailed(e) | RenameOutcome::DeleteFailed(e) => Some(e),
            _ => None,
        }
    }

    /// Outcomes an operator has to act on.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            RenameOutcome::MergeFailed(_)
                | RenameOutcome::DeleteFailed(_)
                | RenameOutcome::Conflict { .. }
        )
    }

    /// A human-readable description of the failure, if any.
    pub fn detail(&self) -> Option<String> {
        match self {
            RenameOutcome::MergeFailed(e) => Some(e.to_string()),
            RenameOutcome::DeleteFailed(e) => {
                Some(format!("{e} (old and new keys both present)"))
            }
            RenameOutcome::Conflict { existing } => {
                Some(format!("new key already set to '{existing}'"))
            }
            _ => None,
        }
    }
}

impl Serialize for RenameOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("status", self.status())?;
        if let Some(e) = self.error() {
            map.serialize_entry("error", &e.to_string())?;
        }
        if let RenameOutcome::Conflict { existing } = self {
            map.serialize_entry("existing", existing)?;
        }
        map.end()
    }
}

/// One row of the audit trail: an (entity, old key) pair and its outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutcomeRecord {
    pub account: String,
    pub entity_id: String,
    pub entity_name: String,
    pub kind: EntityKind,
    pub old_key: TagKey,
    pub new_key: TagKey,
    /// The value that was (or would have been) moved. `None` for `NotFound`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_value: Option<TagValue>,
    /// The new key's previous value when a collision was overwritten.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overwritten: Option<TagValue>,
    #[serde(flatten)]
    pub outcome: RenameOutcome,
}

/// Number of outcomes per variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    pub not_found: usize,
    pub applied: usize,
    pub merge_failed: usize,
    pub delete_failed: usize,
    pub conflict: usize,
}

impl OutcomeCounts {
    pub(crate) fn add(&mut self, outcome: &RenameOutcome) {
        match outcome {
            RenameOutcome::NotFound => self.not_found += 1,
            RenameOutcome::Applied => self.applied += 1,
            RenameOutcome::MergeFailed(_) => self.merge_failed += 1,
            RenameOutcome::DeleteFailed(_) => self.delete_failed += 1,
            RenameOutcome::Conflict { .. } => self.conflict += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.not_found + self.applied + self.merge_failed + self.delete_failed + self.conflict
    }

    pub fn failures(&self) -> usize {
        self.merge_failed + self.delete_failed + self.conflict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_serializes_with_status_and_error() {
        let json = serde_json::to_value(RenameOutcome::DeleteFailed(StoreError::Backend(
            "throttled".into(),
        )))
        .unwrap();
        assert_eq!(json["status"], "delete_failed");
        assert_eq!(json["error"], "store backend error: throttled");

        let json = serde_json::to_value(RenameOutcome::Applied).unwrap();
        assert_eq!(json, serde_json::json!({"status": "applied"}));
    }

    #[test]
    fn record_flattens_outcome() {
        let record = OutcomeRecord {
            account: "sub-1".into(),
            entity_id: "/r1".into(),
            entity_name: "r1".into(),
            kind: EntityKind::Resource,
            old_key: "env".into(),
            new_key: "environment".into(),
            old_value: Some("prod".into()),
            overwritten: None,
            outcome: RenameOutcome::Conflict {
                existing: "dev".into(),
            },
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["status"], "conflict");
        assert_eq!(json["existing"], "dev");
        assert_eq!(json["kind"], "resource");
        assert!(json.get("overwritten").is_none());
    }

    #[test]
    fn counts_track_failures() {
        let mut counts = OutcomeCounts::default();
        counts.add(&RenameOutcome::Applied);
        counts.add(&RenameOutcome::NotFound);
        counts.add(&RenameOutcome::MergeFailed(StoreError::Unavailable("x".into())));
        assert_eq!(counts.total(), 3);
        assert_eq!(counts.failures(), 1);
    }
}
