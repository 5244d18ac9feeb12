use anyhow::{Context as _, Result, bail};
use colored::Colorize;
use indicatif::ProgressBar;
use rayon::prelude::*;
use reconcile::{
    BackendWorker, DiffSummary, RequestContext, SetDiff, SetInst, SyncSummary, TopoClient,
};
use std::fs;
use std::path::Path;

use crate::Context;
use crate::cli::SyncArgs;
use crate::commands::{diff, distinct, request_context, topo_client};
use crate::paths;
use crate::progress::{self, BarProgress};
use crate::ui;

/// Outcome of syncing one set
#[derive(Debug)]
pub struct SetResult {
    pub set: SetInst,
    pub result: reconcile::Result<SyncSummary>,
}

pub fn run(ctx: &Context, args: &SyncArgs) -> Result<()> {
    let target = &args.target;
    let sets = distinct(&target.sets);
    let client = topo_client(ctx);
    let request = request_context(ctx);

    if args.server_side {
        return server_side(ctx, args, &client, &request, &sets);
    }

    // 1. Load diffs
    let loaded = match args.file.as_deref() {
        Some(file) => load_diffs(&paths::expand(file))?,
        None => client
            .diff_with_instances(&request, target.biz, target.template, &sets)
            .with_context(|| {
                format!(
                    "Could not fetch diffs for set template {} from {}",
                    target.template,
                    client.endpoint()
                )
            })?,
    };
    let (diffs, missing) = select_sets(loaded, &sets);
    check_targets(&diffs, target.biz, target.template)?;
    for set_id in &missing {
        ui::warn(&format!("No diffs reported for set {set_id}"));
    }

    // 2. Show plan
    diff::print_diffs(&diffs, ctx.verbose > 0);
    let pending: usize = diffs
        .iter()
        .map(|d| DiffSummary::from_diffs(&d.module_diffs).pending())
        .sum();
    println!();
    if !diffs
        .iter()
        .any(|d| DiffSummary::from_diffs(&d.module_diffs).has_changes())
    {
        ui::success("All sets match their template");
        return Ok(());
    }

    if args.dry_run {
        ui::info(&format!(
            "Dry run: {} changes across {} sets not applied",
            pending,
            diffs.len()
        ));
        return Ok(());
    }

    // 3. Confirm (unless --yes)
    if !args.yes && !confirm_proceed(pending, diffs.len())? {
        ui::info("Cancelled");
        return Ok(());
    }

    // 4. Apply
    let total: usize = diffs.iter().map(|d| d.module_diffs.len()).sum();
    let bar = progress::bar(total, ctx.quiet);
    let worker = BackendWorker::new(client);
    let results = sync_sets(&worker, &request, &diffs, args.jobs, &bar)?;
    bar.finish_and_clear();

    // 5. Report
    print_summary(&results);
    let failed = results.iter().filter(|r| r.result.is_err()).count();
    if failed > 0 {
        bail!("{} of {} sets failed to sync", failed, results.len());
    }
    Ok(())
}

fn server_side(
    ctx: &Context,
    args: &SyncArgs,
    client: &topoclient::HttpTopoClient,
    request: &RequestContext,
    sets: &[i64],
) -> Result<()> {
    let target = &args.target;
    ui::info(&format!(
        "Asking {} to sync {} sets to set template {}",
        client.endpoint(),
        sets.len(),
        target.template
    ));
    if !args.yes && !confirm_proceed(sets.len(), sets.len())? {
        ui::info("Cancelled");
        return Ok(());
    }

    client
        .sync_to_instances(request, target.biz, target.template, sets)
        .with_context(|| format!("Server-side sync failed, rid: {}", request.rid()))?;
    if !ctx.quiet {
        ui::success("Sync task accepted by the server");
    }
    Ok(())
}

/// Read a `[SetDiff]` JSON document
pub fn load_diffs(path: &Path) -> Result<Vec<SetDiff>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Could not read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid diff file: {}", path.display()))
}

/// Keep the diffs of `wanted` sets, one per set, in the order asked
///
/// Also returns the wanted set ids no diff was found for.
pub fn select_sets(loaded: Vec<SetDiff>, wanted: &[i64]) -> (Vec<SetDiff>, Vec<i64>) {
    let mut selected = Vec::with_capacity(wanted.len());
    let mut missing = Vec::new();
    for set_id in wanted {
        match loaded.iter().find(|d| d.set_id == *set_id) {
            Some(found) => selected.push(found.clone()),
            None => missing.push(*set_id),
        }
    }
    (selected, missing)
}

/// Refuse diffs whose set details point somewhere other than the selection
///
/// The worker acts on `set_detail`, so a document whose detail names another
/// set, business or template would touch sets the operator never chose.
pub fn check_targets(diffs: &[SetDiff], biz_id: i64, set_template_id: i64) -> Result<()> {
    for set_diff in diffs {
        let detail = &set_diff.set_detail;
        if detail.set_id != set_diff.set_id {
            bail!(
                "Diff for set {} carries details of set {}",
                set_diff.set_id,
                detail.set_id
            );
        }
        if detail.biz_id != biz_id {
            bail!(
                "Set {} belongs to biz {}, not {}",
                set_diff.set_id,
                detail.biz_id,
                biz_id
            );
        }
        if detail.set_template_id != set_template_id {
            bail!(
                "Set {} follows set template {}, not {}",
                set_diff.set_id,
                detail.set_template_id,
                set_template_id
            );
        }
    }
    Ok(())
}

/// Sync each set on its own, up to `jobs` at a time
///
/// A failing set stops only its own diffs. Every set gets a context
/// sharing the parent's cancellation and deadline, with its own request id.
pub fn sync_sets<C: TopoClient>(
    worker: &BackendWorker<C>,
    parent: &RequestContext,
    diffs: &[SetDiff],
    jobs: usize,
    bar: &ProgressBar,
) -> Result<Vec<SetResult>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.max(1))
        .build()
        .context("Failed to create sync thread pool")?;

    let results: Vec<SetResult> = pool.install(|| {
        diffs
            .par_iter()
            .map(|set_diff| {
                let request = child_context(parent, set_diff.set_id);
                let mut progress = BarProgress::new(bar.clone());
                let result = worker.apply_all_with_progress(
                    &request,
                    &set_diff.set_detail,
                    &set_diff.module_diffs,
                    &mut progress,
                );
                SetResult {
                    set: set_diff.set_detail.clone(),
                    result,
                }
            })
            .collect()
    });
    Ok(results)
}

fn child_context(parent: &RequestContext, set_id: i64) -> RequestContext {
    let child = RequestContext::new(format!("{}-{}", parent.rid(), set_id))
        .with_token(parent.token().clone());
    match parent.deadline() {
        Some(deadline) => child.with_deadline(deadline),
        None => child,
    }
}

fn confirm_proceed(changes: usize, sets: usize) -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt(format!("Apply {changes} changes to {sets} sets?"))
        .default(false)
        .interact()?;

    Ok(confirmed)
}

fn print_summary(results: &[SetResult]) {
    let mut total = SyncSummary::default();
    for set_result in results {
        match &set_result.result {
            Ok(summary) => {
                total.merge(summary);
                println!(
                    "  {} {} ({})",
                    "✓".green(),
                    set_result.set,
                    ui::format_summary(summary)
                );
            }
            Err(e) => {
                ui::error(&format!("{}: {}", set_result.set, e.root()));
                ui::dim(&e.to_string());
                ui::dim(e.category().advice());
            }
        }
    }

    println!();
    let failed = results.iter().filter(|r| r.result.is_err()).count();
    if failed == 0 {
        println!("  {} All sets synced", "✓".green().bold());
    } else {
        println!("  {} Synced with errors", "⚠".yellow().bold());
    }
    println!("    • {}", ui::format_summary(&total));
    if failed > 0 {
        println!("    • {} {} failed", failed, "sets".red());
    }
}
