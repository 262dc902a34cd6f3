//! Result display - text blocks, compact lines and JSON

use anyhow::{Context, Result};
use colored::Colorize;
use declarative::{ExecuteReport, ExecuteSummary, Outcome, StateResult};

/// Symbol for an outcome
fn symbol(result: &StateResult) -> colored::ColoredString {
    match result.outcome {
        Outcome::Success if result.has_changes() => "✓".green(),
        Outcome::Success => "○".dimmed(),
        Outcome::DryRunPending => "~".yellow(),
        Outcome::Failure => "✗".red(),
    }
}

/// `true`, `false` or `null`
fn result_value(result: &StateResult) -> colored::ColoredString {
    match result.result() {
        Some(true) => "true".green(),
        Some(false) => "false".red(),
        None => "null".yellow(),
    }
}

/// One-line form used while a plan is running
pub fn result_line(result: &StateResult) -> String {
    format!("{} {:<30} {}", symbol(result), result.name, result.comment.dimmed())
}

/// Multi-line block with the full result
pub fn render_result(result: &StateResult) -> String {
    let mut out = format!("{}\n", result.name.bold());
    out.push_str(&format!("  {}: {}\n", "result".dimmed(), result_value(result)));
    out.push_str(&format!("  {}: {}\n", "comment".dimmed(), result.comment));

    if result.has_changes() {
        out.push_str(&format!("  {}:\n", "changes".dimmed()));
        for (label, value) in [("old", &result.changes.old), ("new", &result.changes.new)] {
            let pretty =
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
            let indented = pretty.replace('\n', "\n      ");
            out.push_str(&format!("    {label}: {indented}\n"));
        }
    } else {
        out.push_str(&format!("  {}: {{}}\n", "changes".dimmed()));
    }
    out
}

/// Serialize results as a JSON array
pub fn render_json(results: &[StateResult]) -> Result<String> {
    serde_json::to_string_pretty(results).context("Failed to serialize results")
}

/// Print a report in the requested format
pub fn print_report(report: &ExecuteReport, json: bool, dry_run: bool) -> Result<()> {
    if json {
        println!("{}", render_json(&report.results)?);
        return Ok(());
    }

    for result in &report.results {
        println!();
        print!("{}", render_result(result));
    }

    print_summary(&report.summary, dry_run, report.declined);
    Ok(())
}

/// Print final summary
fn print_summary(summary: &ExecuteSummary, dry_run: bool, declined: bool) {
    println!();
    if declined {
        println!("  {} Aborted - no changes made", "✗".red());
    } else if !summary.is_success() {
        println!("  {} Applied with errors", "⚠".yellow().bold());
    } else if dry_run {
        println!("  {} Dry run - no changes made", "ℹ".blue());
    } else if summary.total_changes() == 0 {
        println!("  {} Everything is up to date", "✓".green());
    } else {
        println!("  {} State applied successfully!", "✓".green().bold());
    }

    if summary.changed > 0 {
        println!("    • {} changed", summary.changed);
    }
    if summary.unchanged > 0 {
        println!("    • {} unchanged", summary.unchanged);
    }
    if summary.pending > 0 {
        println!("    • {} {}", summary.pending, "pending".yellow());
    }
    if summary.failed > 0 {
        println!("    • {} {}", summary.failed, "failed".red());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::Changes;
    use serde_json::json;

    #[test]
    fn test_render_result_with_changes() {
        let result = StateResult::pending(
            "my_rg",
            "Resource group my_rg tags would be updated.",
            Changes::new(json!({"a": "1"}), json!({"a": "1", "b": "2"})),
        );

        let text = render_result(&result);
        assert!(text.contains("my_rg"));
        assert!(text.contains("null"));
        assert!(text.contains("tags would be updated"));
        assert!(text.contains("\"b\": \"2\""));
    }

    #[test]
    fn test_render_result_without_changes() {
        let result = StateResult::success("foo", "Resource group foo is already absent.");
        let text = render_result(&result);
        assert!(text.contains("true"));
        assert!(text.contains("{}"));
    }

    #[test]
    fn test_render_json_shape() {
        let results = vec![
            StateResult::success("a", "Resource group a is already present."),
            StateResult::failure("b", "Failed to delete resource group b!"),
        ];

        let parsed: serde_json::Value =
            serde_json::from_str(&render_json(&results).unwrap()).unwrap();
        assert_eq!(
            parsed,
            json!([
                {"name": "a", "result": true, "comment": "Resource group a is already present.", "changes": {}},
                {"name": "b", "result": false, "comment": "Failed to delete resource group b!", "changes": {}},
            ])
        );
    }

    #[test]
    fn test_result_line() {
        let line = result_line(&StateResult::failure("rg", "Failed to query resource group rg! (x)"));
        assert!(line.contains("rg"));
        assert!(line.contains("Failed to query"));
    }
}
