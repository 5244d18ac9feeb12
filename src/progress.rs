//! Progress indicators for setsync CLI.
//!
//! One bar covers every set of a `sync` run. Each set reports into it through
//! its own [`BarProgress`], so sets synced in parallel share the same line.

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use reconcile::{ModuleDiff, ProgressCallback, Result, SetInst, SyncOutcome};

/// Create a bar over `total` diffs
pub fn bar(total: usize, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-");
    pb.set_style(style);
    pb
}

/// Reports one set's diffs into a shared bar
pub struct BarProgress {
    bar: ProgressBar,
    set: String,
}

impl BarProgress {
    pub fn new(bar: ProgressBar) -> Self {
        Self {
            bar,
            set: String::new(),
        }
    }
}

impl ProgressCallback for BarProgress {
    fn on_set_start(&mut self, set: &SetInst, _count: usize) {
        self.set = set.to_string();
    }

    fn on_diff_start(&mut self, _index: usize, diff: &ModuleDiff) {
        self.bar.set_message(format!("{}: {}", self.set, diff));
    }

    fn on_diff_complete(&mut self, _index: usize, diff: &ModuleDiff, result: &Result<SyncOutcome>) {
        if let Err(e) = result {
            let line = format!("  {} {}: {} ({})", "✗".red(), self.set, diff, e.root());
            self.bar.suspend(|| println!("{line}"));
        }
        self.bar.inc(1);
    }

    fn on_set_complete(&mut self, _set: &SetInst) {}
}
