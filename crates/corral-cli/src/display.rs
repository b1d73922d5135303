//! Display formatting for CLI output

use console::style;
use corral_core::AppTemplate;
use corral_kube::{ControllerReport, Outcome, ReconcileReport};
use corral_store::SyncReport;

/// One row of the template table
pub fn template_row(category: &str, template: &AppTemplate) -> String {
    format!(
        "{:<12} {:<24} {:<14} {:>5} {:>6}",
        category,
        template.name(),
        template.version(),
        template.workloads.len(),
        template.file_count()
    )
}

pub fn print_template_header() {
    println!(
        "{:<12} {:<24} {:<14} {:>5} {:>6}",
        style("CATEGORY").bold(),
        style("NAME").bold(),
        style("VERSION").bold(),
        style("COMP").bold(),
        style("FILES").bold()
    );
}

/// Template details with its files per level
pub fn print_template(template: &AppTemplate) {
    let title = template.key();
    println!("{}", style(&title).cyan().bold());
    println!("{}", style("=".repeat(title.len())).dim());
    println!("{}: {}", style("Name").bold(), template.name());
    println!("{}: {}", style("Version").bold(), template.version());

    println!();
    println!("{}:", style("App files").bold());
    for file in &template.base.files {
        println!("  - {}", file.filename);
    }

    for (name, workload) in &template.workloads {
        println!();
        println!("{} {}:", style("Component").bold(), style(name).cyan());
        for file in &workload.files {
            println!("  - {}", file.filename);
        }
    }
}

fn outcome_style(outcome: Outcome) -> console::StyledObject<String> {
    let text = outcome.to_string();
    match outcome {
        Outcome::Created => style(text).green(),
        Outcome::Updated => style(text).dim(),
        Outcome::Recreated => style(text).yellow(),
    }
}

fn print_reconcile(name: &str, report: &ReconcileReport) {
    println!("{} {} ({})", style("✓").green().bold(), name, report.summary());
    for (key, outcome) in &report.resources {
        println!("    {:<10} {}", outcome_style(*outcome), key);
    }
}

/// Per-app results of a controller run
pub fn print_controller_report(report: &ControllerReport, verbose: bool) {
    for (name, applied) in &report.succeeded {
        if verbose {
            print_reconcile(name, applied);
        } else {
            println!("{} {} ({})", style("✓").green().bold(), name, applied.summary());
        }
    }
    for (name, error) in &report.failed {
        println!("{} {}: {}", style("✗").red().bold(), name, error);
    }
    println!();
    println!("{}", style(report.summary()).bold());
}

pub fn print_sync_report(report: &SyncReport) {
    for path in &report.downloaded {
        println!("  {} {}", style("+").green().bold(), path);
    }
    for path in &report.deleted {
        println!("  {} {}", style("-").red().bold(), path);
    }
    for path in &report.failed {
        println!("  {} {} (will retry)", style("!").yellow().bold(), path);
    }
    println!(
        "{} downloaded, {} deleted, {} failed",
        report.downloaded.len(),
        report.deleted.len(),
        report.failed.len()
    );
}
