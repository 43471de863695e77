use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::record::{EntityKind, TagSet, TargetEntity};

/// A discovered set of accounts and their taggable entities.
///
/// This is the document produced by the discovery stage and consumed by
/// the CLI. [`JsonFileTagStore`](crate::JsonFileTagStore) also uses it as
/// its on-disk format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(default)]
    pub accounts: Vec<Account>,
}

/// One account (subscription) and the entities it contains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub entities: Vec<InventoryEntity>,
}

/// An entity as stored in the inventory document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryEntity {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub kind: EntityKind,
    #[serde(default)]
    pub tags: TagSet,
}

impl Inventory {
    pub fn from_json_str(s: &str) -> Result<Self, StoreError> {
        serde_json::from_str(s).map_err(|e| StoreError::Backend(format!("invalid inventory: {e}")))
    }

    /// Snapshot every entity as a [`TargetEntity`], in document order.
    ///
    /// An empty `accounts` filter selects all accounts.
    pub fn target_entities(&self, accounts: &[String]) -> Vec<TargetEntity> {
        self.accounts
            .iter()
            .filter(|a| accounts.is_empty() || accounts.contains(&a.id))
            .flat_map(|a| {
                a.entities.iter().map(move |e| TargetEntity {
                    id: e.id.clone(),
                    name: e.name.clone(),
                    kind: e.kind,
                    account: a.id.clone(),
                    tags: e.tags.clone(),
                })
            })
            .collect()
    }

    pub fn find(&self, entity_id: &str) -> Option<&InventoryEntity> {
        self.accounts
            .iter()
            .flat_map(|a| a.entities.iter())
            .find(|e| e.id == entity_id)
    }

    pub fn find_mut(&mut self, entity_id: &str) -> Option<&mut InventoryEntity> {
        self.accounts
            .iter_mut()
            .flat_map(|a| a.entities.iter_mut())
            .find(|e| e.id == entity_id)
    }

    /// Account ids that are not present in the document.
    pub fn unknown_accounts<'a>(&self, accounts: &'a [String]) -> Vec<&'a str> {
        accounts
            .iter()
            .filter(|id| !self.accounts.iter().any(|a| &a.id == *id))
            .map(String::as_str)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Inventory {
        Inventory::from_json_str(
            r#"{
                "accounts": [
                    {"id": "sub-1", "name": "Production", "entities": [
                        {"id": "/sub-1/rg1", "name": "rg1", "kind": "resource_group", "tags": {"env": "prod"}},
                        {"id": "/sub-1/rg1/vm1", "name": "vm1", "kind": "resource"}
                    ]},
                    {"id": "sub-2", "entities": [
                        {"id": "/sub-2/rg2", "name": "rg2", "kind": "resource_group", "tags": {"env": ""}}
                    ]}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn target_entities_carry_account_and_tags() {
        let inv = sample();
        let all = inv.target_entities(&[]);
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].account, "sub-1");
        assert_eq!(all[0].tags.get("env"), Some("prod"));
        assert!(all[1].tags.is_empty());
        assert_eq!(all[2].account, "sub-2");
        assert_eq!(all[2].tags.get("env"), Some(""));
    }

    #[test]
    fn account_filter_limits_selection() {
        let inv = sample();
        let only = inv.target_entities(&["sub-2".to_string()]);
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].id, "/sub-2/rg2");
    }

    #[test]
    fn unknown_accounts_are_reported() {
        let inv = sample();
        let wanted = vec!["sub-1".to_string(), "sub-9".to_string()];
        assert_eq!(inv.unknown_accounts(&wanted), vec!["sub-9"]);
    }

    #[test]
    fn invalid_json_is_backend_error() {
        let err = Inventory::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
    }
}
