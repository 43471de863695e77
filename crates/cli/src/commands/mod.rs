pub mod keys;
pub mod rename;

use std::path::Path;
use std::process;

use retag_store::JsonFileTagStore;
use serde::Serialize;

use crate::{report_error, OutputFormat};

/// Open an inventory file as a tag store, exiting with status 1 on failure.
pub(crate) fn open_inventory(path: &Path, output: OutputFormat, quiet: bool) -> JsonFileTagStore {
    match JsonFileTagStore::open(path) {
        Ok(store) => store,
        Err(e) => {
            report_error(&format!("error: {}", e), output, quiet);
            process::exit(1);
        }
    }
}

/// Exit with status 1 if any requested account is missing from the inventory.
pub(crate) fn check_accounts(
    store: &JsonFileTagStore,
    accounts: &[String],
    output: OutputFormat,
    quiet: bool,
) {
    let inventory = store.inventory();
    let unknown = inventory.unknown_accounts(accounts);
    if !unknown.is_empty() {
        let msg = format!(
            "error: account(s) not found in '{}': {}",
            store.path().display(),
            unknown.join(", ")
        );
        report_error(&msg, output, quiet);
        process::exit(1);
    }
}

/// Pretty JSON for stdout. A value that fails to serialize becomes a JSON
/// `{"error": ...}` object so `--output json` always prints valid JSON.
pub(crate) fn to_json(value: &impl Serialize) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| {
        serde_json::json!({ "error": format!("serialization: {}", e) }).to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("value has a \"quoted\" field"))
        }
    }

    #[test]
    fn serialization_failure_is_still_valid_json() {
        let out = to_json(&Unserializable);
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert!(parsed["error"]
            .as_str()
            .unwrap()
            .contains("\"quoted\""));
    }

    #[test]
    fn values_are_pretty_printed() {
        let out = to_json(&serde_json::json!({ "a": 1 }));
        assert_eq!(out, "{\n  \"a\": 1\n}");
    }
}
