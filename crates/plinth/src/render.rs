//! Plain text rendering of plans, run reports and outputs

use colored::Colorize;
use plinth_engine::{
    ChangeAction, ChangePlan, NodeOutcome, NodeStatus, OutputSet, PlannedChange, ReplaceOrder,
    RunReport,
};
use serde_json::Value;

fn symbol(change: &PlannedChange) -> colored::ColoredString {
    match (change.action, change.replace_order) {
        (ChangeAction::Create, _) => "+".green().bold(),
        (ChangeAction::Update, _) => "~".yellow().bold(),
        (ChangeAction::Replace, Some(ReplaceOrder::CreateBeforeDelete)) => "+/-".magenta().bold(),
        (ChangeAction::Replace, _) => "-/+".magenta().bold(),
        (ChangeAction::Delete, _) => "-".red().bold(),
        (ChangeAction::NoOp, _) => " ".normal(),
    }
}

pub fn print_plan(plan: &ChangePlan) {
    if !plan.has_changes() {
        println!(
            "{}",
            "No changes. Infrastructure matches the configuration.".green()
        );
        return;
    }

    for change in plan
        .changes
        .iter()
        .filter(|c| c.action != ChangeAction::NoOp)
    {
        let mut line = format!(
            "  {} {} ({})",
            symbol(change),
            change.name.bold(),
            change.resource_type.dimmed()
        );
        if let Some(reason) = &change.reason {
            line.push_str(&format!(": {reason}"));
        }
        if let Some(order) = change.replace_order {
            line.push_str(&format!(" [{order}]"));
        }
        println!("{line}");
    }
    for deposed in &plan.deposed {
        println!(
            "  {} {} ({}): old instance {}",
            "-".red().bold(),
            deposed.name.bold(),
            deposed.resource_type.dimmed(),
            deposed.provider_id
        );
    }

    println!();
    println!("Plan: {}", plan.summary());
}

fn print_outcome(outcome: &NodeOutcome) {
    let label = match &outcome.deposed {
        Some(id) => format!("{} (old instance {id})", outcome.name),
        None => outcome.name.clone(),
    };
    let detail = outcome.error.as_deref().unwrap_or_default();

    match outcome.status {
        NodeStatus::Succeeded => {
            println!("  {} {} {}", "✓".green(), label, outcome.action.to_string().dimmed());
        }
        NodeStatus::Failed => {
            println!(
                "  {} {} {}: {} (attempts: {})",
                "✗".red().bold(),
                label,
                outcome.action,
                detail.red(),
                outcome.attempts
            );
        }
        NodeStatus::Skipped => {
            println!("  {} {} skipped: {}", "⊘".yellow(), label, detail.yellow());
        }
        NodeStatus::Pending | NodeStatus::Running => {
            println!("  {} {} {}", "?".dimmed(), label, outcome.status);
        }
    }
}

pub fn print_report(report: &RunReport) {
    for outcome in report
        .outcomes
        .iter()
        .filter(|o| o.action != ChangeAction::NoOp || o.status != NodeStatus::Succeeded)
    {
        print_outcome(outcome);
    }

    println!();
    let summary = format!(
        "{} succeeded, {} failed, {} skipped, {} unchanged",
        report.succeeded, report.failed, report.skipped, report.no_op
    );
    if report.is_success() {
        println!("{} {}", "✓ Complete:".green().bold(), summary);
    } else {
        println!("{} {}", "⚠ Partially applied:".yellow().bold(), summary);
    }
}

/// Strings print bare, everything else as JSON
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn print_outputs(outputs: &OutputSet) {
    if outputs.values.is_empty() && outputs.missing.is_empty() {
        return;
    }

    println!();
    println!("{}", "Outputs:".bold());
    let width = outputs.values.keys().map(String::len).max().unwrap_or(0);
    for (name, value) in &outputs.values {
        println!("  {} = {}", format!("{name:width$}").cyan(), display_value(value));
    }
    for missing in &outputs.missing {
        println!("  {} {}", "⚠".yellow(), missing.to_string().yellow());
    }
}
