//! CLI rename subcommand.
//!
//! Orchestrates one run: load inventory -> select entities -> validate
//! plan -> preview -> confirm -> rename -> print -> export.
//!
//! Exit status:
//! - 0: every key was applied or not found
//! - 1: the run could not start
//! - 2: some key failed or conflicted
//! - 3: interrupted; entities that had not started were left untouched
//!   and have no outcome

use std::path::Path;
use std::process;
use std::sync::Arc;

use retag_engine::{
    EngineConfig, EntityKind, PlannedChange, RenameEngine, RenamePlan, RunSummary, StopHandle,
    TargetEntity,
};

use crate::{export, report_error, KindFilter, OutputFormat};

pub(crate) struct RenameOptions<'a> {
    pub inventory: &'a Path,
    pub keys: Vec<String>,
    pub new_key: String,
    pub accounts: &'a [String],
    pub kind: Option<KindFilter>,
    pub yes: bool,
    pub dry_run: bool,
    pub report_dir: Option<&'a Path>,
    pub engine: EngineConfig,
    pub output: OutputFormat,
    pub quiet: bool,
}

pub(crate) fn cmd_rename(opts: RenameOptions<'_>) {
    let output = opts.output;
    let quiet = opts.quiet;

    // 1. Load inventory and select entities
    let store = super::open_inventory(opts.inventory, output, quiet);
    super::check_accounts(&store, opts.accounts, output, quiet);
    let entities: Vec<TargetEntity> = store
        .inventory()
        .target_entities(opts.accounts)
        .into_iter()
        .filter(|e| match opts.kind {
            None => true,
            Some(KindFilter::Resource) => e.kind == EntityKind::Resource,
            Some(KindFilter::ResourceGroup) => e.kind == EntityKind::ResourceGroup,
        })
        .collect();

    // 2. Validate the plan
    let plan = match RenamePlan::new(opts.keys, opts.new_key) {
        Ok(p) => p,
        Err(e) => {
            report_error(&format!("error: {}", e), output, quiet);
            process::exit(1);
        }
    };

    // 3. Preview
    let preview = plan.preview(&entities);
    if opts.dry_run {
        print_preview(&plan, &entities, &preview, output, quiet);
        return;
    }
    if !quiet && output == OutputFormat::Text {
        print_selection(&plan, &entities, &preview);
    }

    // 4. Confirmation
    if !opts.yes {
        eprintln!();
        eprintln!("Type 'yes' to proceed:");
        let mut input = String::new();
        let confirmed = std::io::stdin().read_line(&mut input).is_ok()
            && matches!(input.trim().to_ascii_lowercase().as_str(), "y" | "yes");
        if !confirmed {
            eprintln!("Rename aborted.");
            process::exit(1);
        }
    }

    // 5. Run the engine
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            report_error(&format!("error: failed to start runtime: {}", e), output, quiet);
            process::exit(1);
        }
    };
    let engine = match RenameEngine::new(Arc::new(store), opts.engine) {
        Ok(engine) => engine,
        Err(e) => {
            report_error(&format!("error: {}", e), output, quiet);
            process::exit(1);
        }
    };
    let stop = StopHandle::new();
    let signal_stop = stop.clone();
    rt.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, finishing in-flight entities");
            signal_stop.stop();
        }
    });

    let summary = match rt.block_on(engine.rename_with_stop(entities, &plan, &stop)) {
        Ok(s) => s,
        Err(e) => {
            report_error(&format!("error: {}", e), output, quiet);
            process::exit(1);
        }
    };

    // 6. Display or serialize
    match output {
        OutputFormat::Json => {
            println!("{}", super::to_json(&summary));
        }
        OutputFormat::Text => {
            if !quiet {
                print_summary(&summary);
            }
        }
    }

    // 7. Export
    if let Some(dir) = opts.report_dir {
        match export::write_reports(dir, &summary) {
            Ok(paths) => {
                if !quiet && output == OutputFormat::Text {
                    println!();
                    println!("Reports written to {}:", dir.display());
                    for p in paths {
                        println!("  {}", p.display());
                    }
                }
            }
            Err(e) => {
                report_error(&format!("error: {}", e), output, quiet);
                process::exit(1);
            }
        }
    }

    let code = exit_code(&summary);
    if code != 0 {
        process::exit(code);
    }
}

const EXIT_FAILURES: i32 = 2;
const EXIT_INTERRUPTED: i32 = 3;

/// Process exit status for a finished run. An interrupted run wins over
/// per-key failures since its summary is incomplete.
fn exit_code(summary: &RunSummary) -> i32 {
    if summary.entities_skipped > 0 {
        EXIT_INTERRUPTED
    } else if summary.has_failures() {
        EXIT_FAILURES
    } else {
        0
    }
}

fn account_count(entities: &[TargetEntity]) -> usize {
    let mut accounts: Vec<&str> = entities.iter().map(|e| e.account.as_str()).collect();
    accounts.sort_unstable();
    accounts.dedup();
    accounts.len()
}

fn print_selection(plan: &RenamePlan, entities: &[TargetEntity], preview: &[PlannedChange]) {
    let keys: Vec<&str> = plan.selected_keys().collect();
    println!(
        "Renaming [{}] -> '{}' on {} entities in {} account(s)",
        keys.join(", "),
        plan.new_key(),
        entities.len(),
        account_count(entities)
    );
    let moves = preview.iter().filter(|c| !c.conflict).count();
    println!("{} tag(s) will be moved.", moves);
    let conflicts = preview.len() - moves;
    if conflicts > 0 {
        println!(
            "WARNING: {} tag(s) conflict with a value moved by another selected key and will be kept.",
            conflicts
        );
    }
    let overwrites = preview
        .iter()
        .filter(|c| !c.conflict && c.overwrites.is_some())
        .count();
    if overwrites > 0 {
        println!(
            "WARNING: {} entity tag(s) already carry '{}' with a different value.",
            overwrites,
            plan.new_key()
        );
    }
}

fn print_preview(
    plan: &RenamePlan,
    entities: &[TargetEntity],
    preview: &[PlannedChange],
    output: OutputFormat,
    quiet: bool,
) {
    match output {
        OutputFormat::Json => {
            let doc = serde_json::json!({
                "new_key": plan.new_key(),
                "selected_keys": plan.selected_keys().collect::<Vec<_>>(),
                "entities": entities.len(),
                "changes": preview,
            });
            println!("{}", super::to_json(&doc));
        }
        OutputFormat::Text => {
            if quiet {
                return;
            }
            print_selection(plan, entities, preview);
            for c in preview {
                print!(
                    "  {} {} ({}): {}={:?} -> {}",
                    c.account, c.entity_name, c.kind, c.old_key, c.value, c.new_key
                );
                match (&c.overwrites, c.conflict) {
                    (Some(existing), true) => println!(" (conflict: keeps {:?})", existing),
                    (Some(existing), false) => println!(" (overwrites {:?})", existing),
                    (None, _) => println!(),
                }
            }
            println!("Dry run: no tags were changed.");
        }
    }
}

fn print_summary(summary: &RunSummary) {
    let c = &summary.counts;
    println!();
    println!(
        "Renamed to '{}': {} applied, {} not found, {} merge failed, {} delete failed, {} conflict(s)",
        summary.new_key, c.applied, c.not_found, c.merge_failed, c.delete_failed, c.conflict
    );
    println!(
        "Entities processed: {} ({} skipped, {} duplicate(s) ignored)",
        summary.entities_processed, summary.entities_skipped, summary.duplicates_ignored
    );

    if summary.entities_skipped > 0 {
        println!(
            "INTERRUPTED: {} entities were not started and keep their old keys.",
            summary.entities_skipped
        );
    }

    if summary.has_failures() {
        println!();
        println!("FAILURES:");
        for r in summary.failures() {
            println!(
                "  [{}] {} {} {} ({}): {}",
                r.outcome.status(),
                r.account,
                r.kind,
                r.entity_name,
                r.old_key,
                r.outcome.detail().unwrap_or_default()
            );
        }
    }

    let missing: Vec<_> = summary
        .entities
        .iter()
        .filter(|e| !e.not_found.is_empty())
        .collect();
    if !missing.is_empty() {
        println!();
        println!("Tags not found:");
        for e in missing {
            println!("  {} {} {}: {}", e.account, e.kind, e.name, e.not_found_note());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retag_engine::OutcomeCounts;

    fn summary(skipped: usize, conflicts: usize) -> RunSummary {
        RunSummary {
            new_key: "environment".into(),
            entities_processed: 1,
            entities_skipped: skipped,
            duplicates_ignored: 0,
            keys_considered: 1,
            counts: OutcomeCounts {
                applied: usize::from(conflicts == 0),
                conflict: conflicts,
                ..OutcomeCounts::default()
            },
            records: Vec::new(),
            entities: Vec::new(),
        }
    }

    #[test]
    fn clean_run_exits_zero() {
        assert_eq!(exit_code(&summary(0, 0)), 0);
    }

    #[test]
    fn failures_exit_two() {
        assert_eq!(exit_code(&summary(0, 1)), EXIT_FAILURES);
    }

    #[test]
    fn interrupted_run_exits_three_even_with_failures() {
        assert_eq!(exit_code(&summary(4, 0)), EXIT_INTERRUPTED);
        assert_eq!(exit_code(&summary(4, 1)), EXIT_INTERRUPTED);
    }
}
