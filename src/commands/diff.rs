use anyhow::{Context as _, Result};
use colored::Colorize;
use reconcile::{DiffSummary, SetDiff};

use crate::Context;
use crate::cli::TargetArgs;
use crate::commands::{distinct, request_context, topo_client};
use crate::ui;

pub fn run(ctx: &Context, args: &TargetArgs) -> Result<()> {
    let client = topo_client(ctx);
    let request = request_context(ctx);
    let sets = distinct(&args.sets);

    log::info!(
        "fetching diffs for template {} in biz {}, rid: {}",
        args.template,
        args.biz,
        request.rid()
    );
    let diffs = client
        .diff_with_instances(&request, args.biz, args.template, &sets)
        .with_context(|| {
            format!(
                "Could not fetch diffs for set template {} from {}",
                args.template,
                client.endpoint()
            )
        })?;

    print_diffs(&diffs, ctx.verbose > 0);

    let total = diffs.iter().fold(DiffSummary::default(), |acc, set_diff| {
        add(acc, &DiffSummary::from_diffs(&set_diff.module_diffs))
    });
    println!();
    if total.has_changes() {
        ui::info(&format!(
            "{} of {} sets need syncing: {} to add, {} to remove, {} to rename",
            diffs
                .iter()
                .filter(|d| DiffSummary::from_diffs(&d.module_diffs).has_changes())
                .count(),
            diffs.len(),
            total.additions,
            total.removals,
            total.changes
        ));
    } else {
        ui::success("All sets match their template");
    }
    if total.invalid > 0 {
        ui::warn(&format!(
            "{} diffs are malformed and will fail to sync",
            total.invalid
        ));
    }
    Ok(())
}

/// Print each set's diffs; unchanged modules only with `show_unchanged`
pub fn print_diffs(diffs: &[SetDiff], show_unchanged: bool) {
    for set_diff in diffs {
        let summary = DiffSummary::from_diffs(&set_diff.module_diffs);
        ui::section(&set_diff.set_detail.to_string());

        if !summary.has_changes() {
            ui::dim("in sync");
            continue;
        }

        for diff in &set_diff.module_diffs {
            if show_unchanged || !matches!(diff.kind(), Ok(reconcile::DiffType::Unchanged)) {
                ui::diff_line(diff);
            }
        }
        println!(
            "  {}",
            format!(
                "{} pending, {} unchanged",
                summary.pending(),
                summary.unchanged
            )
            .dimmed()
        );
    }
}

fn add(mut acc: DiffSummary, other: &DiffSummary) -> DiffSummary {
    acc.additions += other.additions;
    acc.removals += other.removals;
    acc.changes += other.changes;
    acc.unchanged += other.unchanged;
    acc.invalid += other.invalid;
    acc
}
