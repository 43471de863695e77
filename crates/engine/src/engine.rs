use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::Instrument;

use retag_store::{StoreError, TagSet, TagStore, TargetEntity};

use crate::aggregate::{KeyChange, OutcomeAggregator, RunSummary};
use crate::config::{CollisionPolicy, EngineConfig, TagSource};
use crate::error::EngineError;
use crate::outcome::RenameOutcome;
use crate::plan::{KeyDecision, RenamePlan, RenameRequest, WorkingView};

/// Cooperative stop signal for a running rename.
///
/// Once stopped, entities that have not started yet are skipped. Entities
/// already in progress finish every merge/delete pair they began.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// Renames tag keys on many entities through a [`TagStore`].
///
/// Entities are processed concurrently, up to `config.concurrency` at a
/// time. The selected keys of one entity are processed one after another,
/// in key order, against a private working copy of that entity's tags so
/// that a later key sees what an earlier key did to the new key.
///
/// Dropping the future returned by [`rename`](Self::rename) can cut a
/// merge/delete pair in half; use a [`StopHandle`] to end a run early.
pub struct RenameEngine<S> {
    store: Arc<S>,
    config: EngineConfig,
}

impl<S: TagStore> RenameEngine<S> {
    pub fn new(store: Arc<S>, config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self { store, config })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Rename `plan`'s selected keys on every entity.
    pub async fn rename(
        &self,
        entities: Vec<TargetEntity>,
        plan: &RenamePlan,
    ) -> Result<RunSummary, EngineError> {
        self.rename_with_stop(entities, plan, &StopHandle::new())
            .await
    }

    /// Like [`rename`](Self::rename), but stops starting new entities once
    /// `stop` is triggered.
    pub async fn rename_with_stop(
        &self,
        entities: Vec<TargetEntity>,
        plan: &RenamePlan,
        stop: &StopHandle,
    ) -> Result<RunSummary, EngineError> {
        let span = tracing::info_span!(
            "rename",
            new_key = plan.new_key(),
            selected = plan.selected_len(),
            entities = entities.len(),
        );
        async move {
            self.store.check_available().await.map_err(|e| {
                tracing::error!(error = %e, "tag store failed availability check");
                EngineError::Unavailable(e)
            })?;

            let aggregator = OutcomeAggregator::new(plan.new_key());
            let mut unique = Vec::with_capacity(entities.len());
            for entity in &entities {
                if aggregator.register(entity) {
                    unique.push(entity);
                } else {
                    aggregator.record_duplicate(entity);
                }
            }

            stream::iter(unique)
                .for_each_concurrent(self.config.concurrency, |entity| {
                    let aggregator = &aggregator;
                    async move {
                        if stop.is_stopped() {
                            tracing::debug!(entity_id = %entity.id, "run stopped, skipping entity");
                            aggregator.record_skipped(entity);
                            return;
                        }
                        self.rename_entity(RenameRequest { entity, plan }, aggregator)
                            .await;
                    }
                })
                .await;

            let summary = aggregator.finalize();
            tracing::info!(
                processed = summary.entities_processed,
                skipped = summary.entities_skipped,
                applied = summary.counts.applied,
                not_found = summary.counts.not_found,
                merge_failed = summary.counts.merge_failed,
                delete_failed = summary.counts.delete_failed,
                conflict = summary.counts.conflict,
                "rename run finished"
            );
            Ok(summary)
        }
        .instrument(span)
        .await
    }

    /// Process every selected key of one entity and record one outcome per key.
    pub async fn rename_entity(&self, request: RenameRequest<'_>, aggregator: &OutcomeAggregator) {
        let RenameRequest { entity, plan } = request;
        let span = tracing::debug_span!(
            "entity",
            entity_id = %entity.id,
            account = %entity.account,
            kind = %entity.kind,
        );
        async move {
            let mut view = WorkingView::new(match self.config.tag_source {
                TagSource::Snapshot => entity.tags.clone(),
                TagSource::Live => match self.store.read_tags(&entity.id).await {
                    Ok(tags) => tags,
                    Err(e) => {
                        tracing::warn!(error = %e, "could not refresh tags, entity left untouched");
                        for old_key in plan.selected_keys() {
                            aggregator.record(entity, old_key, RenameOutcome::MergeFailed(e.clone()));
                        }
                        return;
                    }
                },
            });

            for old_key in plan.selected_keys() {
                let (outcome, change) = self
                    .rename_key(entity, &mut view, old_key, plan.new_key())
                    .await;
                aggregator.record_change(entity, old_key, outcome, change);
            }
        }
        .instrument(span)
        .await
    }

    async fn rename_key(
        &self,
        entity: &TargetEntity,
        view: &mut WorkingView,
        old_key: &str,
        new_key: &str,
    ) -> (RenameOutcome, KeyChange) {
        let (value, overwrites) = match view.decide(old_key, new_key) {
            KeyDecision::Absent => {
                tracing::debug!(key = old_key, "tag not found");
                return (RenameOutcome::NotFound, KeyChange::default());
            }
            KeyDecision::Held { value, existing } => {
                tracing::warn!(
                    key = old_key,
                    new_key,
                    existing = %existing,
                    value = %value,
                    "new key holds a value moved by an earlier key, old key kept"
                );
                let change = KeyChange {
                    old_value: Some(value),
                    overwritten: None,
                };
                return (RenameOutcome::Conflict { existing }, change);
            }
            KeyDecision::Move { value, overwrites } => (value, overwrites),
        };

        let mut change = KeyChange {
            old_value: Some(value.clone()),
            overwritten: None,
        };

        if let Some(existing) = overwrites {
            match self.config.collision {
                CollisionPolicy::Skip => {
                    tracing::warn!(
                        key = old_key,
                        new_key,
                        existing = %existing,
                        value = %value,
                        "new key already holds a different value, skipping"
                    );
                    return (RenameOutcome::Conflict { existing }, change);
                }
                CollisionPolicy::Overwrite => {
                    tracing::warn!(
                        key = old_key,
                        new_key,
                        existing = %existing,
                        value = %value,
                        "new key already holds a different value, overwriting"
                    );
                    change.overwritten = Some(existing);
                }
            }
        }

        tracing::debug!(key = old_key, new_key, "merging new key");
        if let Err(e) = self
            .store
            .merge_tags(&entity.id, &TagSet::single(new_key, value.as_str()))
            .await
        {
            tracing::warn!(key = old_key, error = %e, "merge failed, old key kept");
            return (RenameOutcome::MergeFailed(e), change);
        }
        view.record_merge(new_key, &value);

        tracing::debug!(key = old_key, "deleting old key");
        let deleted = self
            .store
            .delete_tags(&entity.id, &TagSet::single(old_key, value.as_str()))
            .await
            .and_then(|removed| match removed {
                0 => Err(StoreError::Rejected {
                    entity_id: entity.id.clone(),
                    message: format!("'{old_key}' no longer holds '{value}', nothing was removed"),
                }),
                _ => Ok(()),
            });
        if let Err(e) = deleted {
            tracing::warn!(
                key = old_key,
                new_key,
                error = %e,
                "delete failed, entity now carries both keys"
            );
            return (RenameOutcome::DeleteFailed(e), change);
        }
        view.record_delete(old_key);

        (RenameOutcome::Applied, change)
    }
}
