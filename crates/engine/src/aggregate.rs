use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use serde::Serialize;

use retag_store::{EntityKind, TagKey, TagValue, TargetEntity};

use crate::outcome::{OutcomeCounts, OutcomeRecord, RenameOutcome};

/// Values observed while deciding a key, carried into the audit record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyChange {
    pub old_value: Option<TagValue>,
    pub overwritten: Option<TagValue>,
}

#[derive(Debug, Clone)]
struct EntitySlot {
    id: String,
    name: String,
    kind: EntityKind,
    account: String,
    skipped: bool,
}

#[derive(Default)]
struct AggregatorInner {
    index: HashMap<String, usize>,
    slots: Vec<EntitySlot>,
    seen: HashSet<(usize, TagKey)>,
    records: Vec<(usize, OutcomeRecord)>,
    duplicates: usize,
}

/// Folds per-key outcomes into a [`RunSummary`].
///
/// All methods take `&self`; recording from concurrently processed entities
/// is safe. Entities keep the order in which they were registered, and
/// records are sorted by that order and then by key when finalizing, so the
/// summary does not depend on completion order.
pub struct OutcomeAggregator {
    new_key: TagKey,
    inner: Mutex<AggregatorInner>,
}

impl OutcomeAggregator {
    pub fn new(new_key: impl Into<TagKey>) -> Self {
        Self {
            new_key: new_key.into(),
            inner: Mutex::new(AggregatorInner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AggregatorInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register an entity for processing. Returns `false` if an entity with
    /// the same id was already registered.
    pub fn register(&self, entity: &TargetEntity) -> bool {
        let mut inner = self.lock();
        if inner.index.contains_key(&entity.id) {
            return false;
        }
        Self::insert_slot(&mut inner, entity);
        true
    }

    fn insert_slot(inner: &mut AggregatorInner, entity: &TargetEntity) -> usize {
        let idx = inner.slots.len();
        inner.index.insert(entity.id.clone(), idx);
        inner.slots.push(EntitySlot {
            id: entity.id.clone(),
            name: entity.name.clone(),
            kind: entity.kind,
            account: entity.account.clone(),
            skipped: false,
        });
        idx
    }

    /// Count an input entry that repeated an already registered entity id.
    pub fn record_duplicate(&self, entity: &TargetEntity) {
        tracing::warn!(entity_id = %entity.id, "duplicate entity in input, processed once");
        self.lock().duplicates += 1;
    }

    /// Mark a registered entity as never started (the run was stopped).
    pub fn record_skipped(&self, entity: &TargetEntity) {
        let mut inner = self.lock();
        let existing = inner.index.get(&entity.id).copied();
        let idx = match existing {
            Some(idx) => idx,
            None => Self::insert_slot(&mut inner, entity),
        };
        inner.slots[idx].skipped = true;
    }

    /// Record the outcome of one (entity, old key) pair.
    pub fn record(&self, entity: &TargetEntity, old_key: &str, outcome: RenameOutcome) -> bool {
        self.record_change(entity, old_key, outcome, KeyChange::default())
    }

    /// Record an outcome together with the values seen while deciding it.
    ///
    /// Each pair is accepted once. A repeated pair is refused, logged, and
    /// `false` is returned; the first outcome stands.
    pub fn record_change(
        &self,
        entity: &TargetEntity,
        old_key: &str,
        outcome: RenameOutcome,
        change: KeyChange,
    ) -> bool {
        let mut inner = self.lock();
        let existing = inner.index.get(&entity.id).copied();
        let idx = match existing {
            Some(idx) => idx,
            None => Self::insert_slot(&mut inner, entity),
        };
        if !inner.seen.insert((idx, old_key.to_string())) {
            tracing::error!(
                entity_id = %entity.id,
                key = old_key,
                status = outcome.status(),
                "outcome already recorded for this key, ignoring"
            );
            return false;
        }
        let record = OutcomeRecord {
            account: entity.account.clone(),
            entity_id: entity.id.clone(),
            entity_name: entity.name.clone(),
            kind: entity.kind,
            old_key: old_key.to_string(),
            new_key: self.new_key.clone(),
            old_value: change.old_value,
            overwritten: change.overwritten,
            outcome,
        };
        inner.records.push((idx, record));
        true
    }

    /// Build the summary from everything recorded so far.
    ///
    /// Calling this more than once returns the same summary as long as
    /// nothing new was recorded in between.
    pub fn finalize(&self) -> RunSummary {
        let inner = self.lock();

        let mut ordered: Vec<&(usize, OutcomeRecord)> = inner.records.iter().collect();
        ordered.sort_by(|(ia, a), (ib, b)| ia.cmp(ib).then_with(|| a.old_key.cmp(&b.old_key)));

        let mut counts = OutcomeCounts::default();
        let mut reports: Vec<EntityReport> = inner
            .slots
            .iter()
            .map(|s| EntityReport {
                entity_id: s.id.clone(),
                name: s.name.clone(),
                kind: s.kind,
                account: s.account.clone(),
                applied: Vec::new(),
                not_found: Vec::new(),
                failed: Vec::new(),
            })
            .collect();

        for (idx, record) in &ordered {
            counts.add(&record.outcome);
            let report = &mut reports[*idx];
            let key = record.old_key.clone();
            match record.outcome {
                RenameOutcome::Applied => report.applied.push(key),
                RenameOutcome::NotFound => report.not_found.push(key),
                _ => report.failed.push(key),
            }
        }

        let entities: Vec<EntityReport> = reports
            .into_iter()
            .zip(inner.slots.iter())
            .filter(|(_, slot)| !slot.skipped)
            .map(|(report, _)| report)
            .collect();

        RunSummary {
            new_key: self.new_key.clone(),
            entities_processed: entities.len(),
            entities_skipped: inner.slots.iter().filter(|s| s.skipped).count(),
            duplicates_ignored: inner.duplicates,
            keys_considered: ordered.len(),
            counts,
            records: ordered.into_iter().map(|(_, r)| r.clone()).collect(),
            entities,
        }
    }
}

/// Per-entity rollup of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityReport {
    pub entity_id: String,
    pub name: String,
    pub kind: EntityKind,
    pub account: String,
    pub applied: Vec<TagKey>,
    pub not_found: Vec<TagKey>,
    pub failed: Vec<TagKey>,
}

impl EntityReport {
    /// Selected keys missing from this entity, joined for display.
    pub fn not_found_note(&self) -> String {
        self.not_found.join(", ")
    }
}

/// Everything a run did, ready for display and export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub new_key: TagKey,
    pub entities_processed: usize,
    /// Entities never started because the run was stopped.
    pub entities_skipped: usize,
    /// Input entries that repeated an entity id.
    pub duplicates_ignored: usize,
    pub keys_considered: usize,
    pub counts: OutcomeCounts,
    /// One record per (entity, selected key), in input order then key order.
    pub records: Vec<OutcomeRecord>,
    pub entities: Vec<EntityReport>,
}

impl RunSummary {
    pub fn has_failures(&self) -> bool {
        self.counts.failures() > 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &OutcomeRecord> {
        self.records.iter().filter(|r| r.outcome.is_failure())
    }

    pub fn entity(&self, entity_id: &str) -> Option<&EntityReport> {
        self.entities.iter().find(|e| e.entity_id == entity_id)
    }

    pub fn outcome(&self, entity_id: &str, old_key: &str) -> Option<&RenameOutcome> {
        self.records
            .iter()
            .find(|r| r.entity_id == entity_id && r.old_key == old_key)
            .map(|r| &r.outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retag_store::{StoreError, TagSet};

    fn entity(id: &str, kind: EntityKind) -> TargetEntity {
        TargetEntity {
            id: id.to_string(),
            name: format!("name-{id}"),
            kind,
            account: "sub-1".to_string(),
            tags: TagSet::new(),
        }
    }

    #[test]
    fn second_record_for_same_pair_is_refused() {
        let agg = OutcomeAggregator::new("environment");
        let e = entity("r1", EntityKind::Resource);
        assert!(agg.record(&e, "env", RenameOutcome::Applied));
        assert!(!agg.record(&e, "env", RenameOutcome::NotFound));
        let summary = agg.finalize();
        assert_eq!(summary.keys_considered, 1);
        assert_eq!(summary.outcome("r1", "env"), Some(&RenameOutcome::Applied));
    }

    #[test]
    fn finalize_orders_by_registration_then_key() {
        let agg = OutcomeAggregator::new("environment");
        let a = entity("a", EntityKind::Resource);
        let b = entity("b", EntityKind::ResourceGroup);
        agg.register(&a);
        agg.register(&b);
        agg.record(&b, "env", RenameOutcome::Applied);
        agg.record(&a, "team", RenameOutcome::NotFound);
        agg.record(&a, "env", RenameOutcome::Applied);

        let summary = agg.finalize();
        let order: Vec<(&str, &str)> = summary
            .records
            .iter()
            .map(|r| (r.entity_id.as_str(), r.old_key.as_str()))
            .collect();
        assert_eq!(order, vec![("a", "env"), ("a", "team"), ("b", "env")]);
    }

    #[test]
    fn finalize_is_idempotent() {
        let agg = OutcomeAggregator::new("environment");
        let e = entity("r1", EntityKind::Resource);
        agg.register(&e);
        agg.record(
            &e,
            "env",
            RenameOutcome::MergeFailed(StoreError::Backend("x".into())),
        );
        assert_eq!(agg.finalize(), agg.finalize());
    }

    #[test]
    fn entity_report_collects_not_found_note() {
        let agg = OutcomeAggregator::new("environment");
        let e = entity("r1", EntityKind::Resource);
        agg.register(&e);
        agg.record(&e, "Env", RenameOutcome::NotFound);
        agg.record(&e, "env", RenameOutcome::Applied);
        agg.record(&e, "ENV", RenameOutcome::NotFound);

        let summary = agg.finalize();
        let report = summary.entity("r1").unwrap();
        assert_eq!(report.applied, vec!["env".to_string()]);
        assert_eq!(report.not_found_note(), "ENV, Env");
    }

    #[test]
    fn skipped_and_duplicate_entities_are_counted_separately() {
        let agg = OutcomeAggregator::new("environment");
        let a = entity("a", EntityKind::Resource);
        let b = entity("b", EntityKind::Resource);
        assert!(agg.register(&a));
        assert!(agg.register(&b));
        assert!(!agg.register(&a));
        agg.record_duplicate(&a);
        agg.record_skipped(&b);

        let summary = agg.finalize();
        assert_eq!(summary.entities_processed, 1);
        assert_eq!(summary.entities_skipped, 1);
        assert_eq!(summary.duplicates_ignored, 1);
        assert!(summary.entity("b").is_none());
    }

    #[test]
    fn concurrent_records_all_land() {
        let agg = std::sync::Arc::new(OutcomeAggregator::new("environment"));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let agg = agg.clone();
                std::thread::spawn(move || {
                    let e = entity(&format!("r{i}"), EntityKind::Resource);
                    for key in ["a", "b", "c"] {
                        assert!(agg.record(&e, key, RenameOutcome::NotFound));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let summary = agg.finalize();
        assert_eq!(summary.keys_considered, 24);
        assert_eq!(summary.counts.not_found, 24);
        assert_eq!(summary.entities_processed, 8);
    }
}
