use std::collections::BTreeSet;

use serde::Serialize;

use retag_store::{EntityKind, TagKey, TagSet, TagValue, TargetEntity};

use crate::error::EngineError;

/// The validated rename request for a whole run: which old keys to move
/// and the key they all move to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenamePlan {
    selected_keys: BTreeSet<TagKey>,
    new_key: TagKey,
}

impl RenamePlan {
    /// Validate and build a plan. Duplicate selected keys collapse; an empty
    /// selection is allowed and yields no outcomes.
    pub fn new<I, K>(selected_keys: I, new_key: impl Into<TagKey>) -> Result<Self, EngineError>
    where
        I: IntoIterator<Item = K>,
        K: Into<TagKey>,
    {
        let new_key = new_key.into();
        if new_key.is_empty() {
            return Err(EngineError::EmptyNewKey);
        }
        let selected_keys: BTreeSet<TagKey> = selected_keys.into_iter().map(Into::into).collect();
        if selected_keys.iter().any(String::is_empty) {
            return Err(EngineError::EmptySelectedKey);
        }
        if selected_keys.contains(&new_key) {
            return Err(EngineError::NewKeySelected { key: new_key });
        }
        Ok(Self {
            selected_keys,
            new_key,
        })
    }

    pub fn selected_keys(&self) -> impl Iterator<Item = &str> {
        self.selected_keys.iter().map(String::as_str)
    }

    pub fn selected_len(&self) -> usize {
        self.selected_keys.len()
    }

    pub fn new_key(&self) -> &str {
        &self.new_key
    }

    /// The mutations a run would issue, without touching any store.
    ///
    /// Keys are walked in the same order and against the same evolving view
    /// of each entity's tags as [`RenameEngine`](crate::RenameEngine) uses,
    /// assuming every call succeeds.
    pub fn preview(&self, entities: &[TargetEntity]) -> Vec<PlannedChange> {
        let mut changes = Vec::new();
        for entity in entities {
            let mut view = WorkingView::new(entity.tags.clone());
            for old_key in self.selected_keys() {
                let change = |value: TagValue, overwrites: Option<TagValue>, conflict: bool| {
                    PlannedChange {
                        account: entity.account.clone(),
                        entity_id: entity.id.clone(),
                        entity_name: entity.name.clone(),
                        kind: entity.kind,
                        old_key: old_key.to_string(),
                        new_key: self.new_key.clone(),
                        value,
                        overwrites,
                        conflict,
                    }
                };
                match view.decide(old_key, self.new_key()) {
                    KeyDecision::Absent => {}
                    KeyDecision::Move { value, overwrites } => {
                        view.record_merge(self.new_key(), &value);
                        view.record_delete(old_key);
                        changes.push(change(value, overwrites, false));
                    }
                    KeyDecision::Held { value, existing } => {
                        changes.push(change(value, Some(existing), true));
                    }
                }
            }
        }
        changes
    }
}

/// One entity paired with the run's plan: the unit the engine processes.
#[derive(Debug, Clone, Copy)]
pub struct RenameRequest<'a> {
    pub entity: &'a TargetEntity,
    pub plan: &'a RenamePlan,
}

/// What to do with one old key given an entity's current tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyDecision {
    /// The old key is not on the entity.
    Absent,
    /// Move `value` to the new key. `overwrites` holds the new key's current
    /// value when it differs from `value`.
    Move {
        value: TagValue,
        overwrites: Option<TagValue>,
    },
    /// The new key holds a different value that this run already moved
    /// there from another selected key. Moving `value` would lose it.
    Held { value: TagValue, existing: TagValue },
}

impl KeyDecision {
    pub fn decide(tags: &TagSet, old_key: &str, new_key: &str) -> Self {
        match tags.get(old_key) {
            None => KeyDecision::Absent,
            Some(value) => KeyDecision::Move {
                value: value.to_string(),
                overwrites: tags
                    .get(new_key)
                    .filter(|existing| *existing != value)
                    .map(str::to_string),
            },
        }
    }
}

/// A merge/delete pair a run would issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedChange {
    pub account: String,
    pub entity_id: String,
    pub entity_name: String,
    pub kind: EntityKind,
    pub old_key: TagKey,
    pub new_key: TagKey,
    pub value: TagValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overwrites: Option<TagValue>,
    /// The move would overwrite a value moved earlier in the same run, so
    /// it is reported as a conflict and not issued.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub conflict: bool,
}

/// A private copy of one entity's tags, kept in step with the calls that
/// succeeded, plus whether this run already placed a value on the new key.
#[derive(Debug, Clone)]
pub(crate) struct WorkingView {
    tags: TagSet,
    carried: bool,
}

impl WorkingView {
    pub(crate) fn new(tags: TagSet) -> Self {
        Self {
            tags,
            carried: false,
        }
    }

    /// [`KeyDecision::decide`] on the current view. A different value that
    /// this run moved onto the new key is never overwritten.
    pub(crate) fn decide(&self, old_key: &str, new_key: &str) -> KeyDecision {
        match KeyDecision::decide(&self.tags, old_key, new_key) {
            KeyDecision::Move {
                value,
                overwrites: Some(existing),
            } if self.carried => KeyDecision::Held { value, existing },
            other => other,
        }
    }

    pub(crate) fn record_merge(&mut self, new_key: &str, value: &str) {
        self.tags.insert(new_key, value);
        self.carried = true;
    }

    pub(crate) fn record_delete(&mut self, old_key: &str) {
        self.tags.remove(old_key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(id: &str, pairs: &[(&str, &str)]) -> TargetEntity {
        TargetEntity {
            id: id.to_string(),
            name: id.to_string(),
            kind: EntityKind::Resource,
            account: "sub-1".to_string(),
            tags: pairs.iter().map(|(k, v)| (*k, *v)).collect(),
        }
    }

    #[test]
    fn empty_new_key_is_rejected() {
        assert!(matches!(
            RenamePlan::new(["env"], ""),
            Err(EngineError::EmptyNewKey)
        ));
    }

    #[test]
    fn empty_selected_key_is_rejected() {
        assert!(matches!(
            RenamePlan::new(["env", ""], "environment"),
            Err(EngineError::EmptySelectedKey)
        ));
    }

    #[test]
    fn new_key_among_selected_is_rejected() {
        let err = RenamePlan::new(["env", "environment"], "environment").unwrap_err();
        assert!(matches!(err, EngineError::NewKeySelected { ref key } if key == "environment"));
    }

    #[test]
    fn selected_keys_have_set_semantics() {
        let a = RenamePlan::new(["env", "Env", "env"], "environment").unwrap();
        let b = RenamePlan::new(["Env", "env"], "environment").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.selected_len(), 2);
    }

    #[test]
    fn empty_selection_is_allowed() {
        let plan = RenamePlan::new(Vec::<String>::new(), "environment").unwrap();
        assert_eq!(plan.selected_len(), 0);
    }

    #[test]
    fn decide_treats_empty_value_as_present() {
        let tags = TagSet::single("env", "");
        assert_eq!(
            KeyDecision::decide(&tags, "env", "environment"),
            KeyDecision::Move {
                value: String::new(),
                overwrites: None
            }
        );
        assert_eq!(
            KeyDecision::decide(&tags, "owner", "environment"),
            KeyDecision::Absent
        );
    }

    #[test]
    fn decide_ignores_same_value_collision() {
        let tags: TagSet = [("env", "prod"), ("environment", "prod")]
            .into_iter()
            .collect();
        assert_eq!(
            KeyDecision::decide(&tags, "env", "environment"),
            KeyDecision::Move {
                value: "prod".into(),
                overwrites: None
            }
        );
    }

    #[test]
    fn preview_sees_earlier_moves_on_same_entity() {
        let plan = RenamePlan::new(["Env", "env"], "environment").unwrap();
        let changes = plan.preview(&[entity("r1", &[("Env", "PROD"), ("env", "prod")])]);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].old_key, "Env");
        assert_eq!(changes[0].overwrites, None);
        assert!(!changes[0].conflict);
        assert_eq!(changes[1].old_key, "env");
        assert_eq!(changes[1].overwrites.as_deref(), Some("PROD"));
        assert!(changes[1].conflict);
    }

    #[test]
    fn preview_overwrites_value_present_before_the_run() {
        let plan = RenamePlan::new(["env"], "environment").unwrap();
        let changes = plan.preview(&[entity("r1", &[("env", "prod"), ("environment", "dev")])]);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].overwrites.as_deref(), Some("dev"));
        assert!(!changes[0].conflict);
    }

    #[test]
    fn view_holds_value_moved_earlier_in_run() {
        let mut view = WorkingView::new([("Env", "PROD"), ("env", "prod")].into_iter().collect());
        view.record_merge("environment", "PROD");
        view.record_delete("Env");
        assert_eq!(
            view.decide("env", "environment"),
            KeyDecision::Held {
                value: "prod".into(),
                existing: "PROD".into()
            }
        );
    }

    #[test]
    fn preview_skips_absent_keys() {
        let plan = RenamePlan::new(["env"], "environment").unwrap();
        let changes = plan.preview(&[entity("r2", &[("owner", "bob")])]);
        assert!(changes.is_empty());
    }
}
