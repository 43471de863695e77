use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::OutputFormat;

#[derive(Debug, Default, Serialize)]
struct KeyUsage {
    key: String,
    entities: usize,
    empty_values: usize,
}

/// List every tag key in the selected accounts with the number of entities
/// carrying it.
pub(crate) fn cmd_keys(inventory_path: &Path, accounts: &[String], output: OutputFormat, quiet: bool) {
    let store = super::open_inventory(inventory_path, output, quiet);
    super::check_accounts(&store, accounts, output, quiet);

    let entities = store.inventory().target_entities(accounts);
    let mut usage: BTreeMap<&str, KeyUsage> = BTreeMap::new();
    for entity in &entities {
        for (key, value) in entity.tags.iter() {
            let entry = usage.entry(key).or_insert_with(|| KeyUsage {
                key: key.to_string(),
                ..KeyUsage::default()
            });
            entry.entities += 1;
            if value.is_empty() {
                entry.empty_values += 1;
            }
        }
    }

    match output {
        OutputFormat::Json => {
            let keys: Vec<&KeyUsage> = usage.values().collect();
            let doc = serde_json::json!({
                "entities": entities.len(),
                "keys": keys,
            });
            println!("{}", super::to_json(&doc));
        }
        OutputFormat::Text => {
            if quiet {
                return;
            }
            if usage.is_empty() {
                println!("No tags found on {} entities.", entities.len());
                return;
            }
            let width = usage.keys().map(|k| k.len()).max().unwrap_or(0).max(3);
            println!("{:<width$}  ENTITIES", "KEY", width = width);
            for u in usage.values() {
                if u.empty_values > 0 {
                    println!(
                        "{:<width$}  {} ({} empty)",
                        u.key,
                        u.entities,
                        u.empty_values,
                        width = width
                    );
                } else {
                    println!("{:<width$}  {}", u.key, u.entities, width = width);
                }
            }
        }
    }
}
