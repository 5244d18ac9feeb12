use colored::Colorize;
use reconcile::{DiffType, ModuleDiff, SyncSummary};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

// ============================================================================
// Diff Rendering
// ============================================================================

/// Marker shown in front of a diff line
pub fn diff_marker(diff: &ModuleDiff) -> &'static str {
    match diff.kind() {
        Ok(DiffType::Add) => "+",
        Ok(DiffType::Remove) => "-",
        Ok(DiffType::Changed) => "~",
        Ok(DiffType::Unchanged) => "=",
        Err(_) => "?",
    }
}

/// Print one module diff line
pub fn diff_line(diff: &ModuleDiff) {
    let marker = diff_marker(diff);
    let text = diff.to_string();
    let line = match diff.kind() {
        Ok(DiffType::Add) => format!("{marker} {text}").green(),
        Ok(DiffType::Remove) => format!("{marker} {text}").red(),
        Ok(DiffType::Changed) => format!("{marker} {text}").yellow(),
        Ok(DiffType::Unchanged) => format!("{marker} {text}").dimmed(),
        Err(_) => format!("{marker} {text}").magenta(),
    };
    println!("  {line}");
}

/// One-line summary of applied changes
pub fn format_summary(summary: &SyncSummary) -> String {
    format!(
        "{} created, {} updated, {} removed, {} unchanged",
        summary.created, summary.updated, summary.removed, summary.unchanged
    )
}

// ============================================================================
// Tests
// ============================================================================
