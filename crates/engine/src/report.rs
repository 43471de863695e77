//! Audit tables for a finished run.
//!
//! A run is exported as four tables: entities that had at least one key
//! renamed, split into resources and resource groups, and one row per
//! failed or conflicting key, split the same way.

use retag_store::EntityKind;

use crate::aggregate::RunSummary;

/// A named table of string cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    /// File stem used when the table is written to disk.
    pub name: &'static str,
    pub headers: Vec<&'static str>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    fn new(name: &'static str, headers: &[&'static str]) -> Self {
        Self {
            name,
            headers: headers.to_vec(),
            rows: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn file_name(&self) -> String {
        format!("{}.csv", self.name)
    }

    /// Render as CSV with a header row. Cells containing a comma, quote, or
    /// line break are quoted, with embedded quotes doubled.
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        push_csv_row(&mut out, self.headers.iter().copied());
        for row in &self.rows {
            push_csv_row(&mut out, row.iter().map(String::as_str));
        }
        out
    }
}

fn push_csv_row<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>) {
    for (i, cell) in cells.enumerate() {
        if i > 0 {
            out.push(',');
        }
        if cell.contains([',', '"', '\n', '\r']) {
            out.push('"');
            out.push_str(&cell.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(cell);
        }
    }
    out.push('\n');
}

const TOUCHED_HEADERS: &[&str] = &[
    "account",
    "name",
    "id",
    "renamed_keys",
    "new_key",
    "tags_not_found",
];

const ERROR_HEADERS: &[&str] = &[
    "account", "name", "id", "old_key", "new_key", "status", "error",
];

/// The four export tables of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditTables {
    pub resources: Table,
    pub resource_groups: Table,
    pub resource_errors: Table,
    pub resource_group_errors: Table,
}

impl AuditTables {
    pub fn from_summary(summary: &RunSummary) -> Self {
        let mut tables = Self {
            resources: Table::new("resources", TOUCHED_HEADERS),
            resource_groups: Table::new("resource-groups", TOUCHED_HEADERS),
            resource_errors: Table::new("resource-errors", ERROR_HEADERS),
            resource_group_errors: Table::new("resource-group-errors", ERROR_HEADERS),
        };

        for entity in summary.entities.iter().filter(|e| !e.applied.is_empty()) {
            let table = match entity.kind {
                EntityKind::Resource => &mut tables.resources,
                EntityKind::ResourceGroup => &mut tables.resource_groups,
            };
            table.rows.push(vec![
                entity.account.clone(),
                entity.name.clone(),
                entity.entity_id.clone(),
                entity.applied.join(";"),
                summary.new_key.clone(),
                entity.not_found_note(),
            ]);
        }

        for record in summary.failures() {
            let table = match record.kind {
                EntityKind::Resource => &mut tables.resource_errors,
                EntityKind::ResourceGroup => &mut tables.resource_group_errors,
            };
            table.rows.push(vec![
                record.account.clone(),
                record.entity_name.clone(),
                record.entity_id.clone(),
                record.old_key.clone(),
                record.new_key.clone(),
                record.outcome.status().to_string(),
                record.outcome.detail().unwrap_or_default(),
            ]);
        }

        tables
    }

    pub fn tables(&self) -> [&Table; 4] {
        [
            &self.resources,
            &self.resource_groups,
            &self.resource_errors,
            &self.resource_group_errors,
        ]
    }
}
