use std::sync::Arc;

use cinesync::sync::{CandidateState, SyncRunReport};
use cinesync::{Engine, SyncDirection};
use console::{Term, style};

use crate::commands::compare::{OutputFormat, render_candidates};
use crate::progress::ProgressReporter;

/// Handle `cinesync sync`.
pub(crate) async fn handle_sync(
    engine: &Engine,
    direction: SyncDirection,
    dry_run: bool,
    limit: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let is_tty = Term::stdout().is_term();
    let reporter = Arc::new(ProgressReporter::new());
    let callback = reporter.as_callback();

    if is_tty {
        let mode = if dry_run { " (dry run)" } else { "" };
        println!(
            "Syncing {} → {}{}\n",
            direction.source().display_name(),
            direction.target().display_name(),
            mode
        );
    }

    let report = engine.sync(direction, dry_run, limit, Some(&callback)).await;
    reporter.finish();
    let report = report?;

    if is_tty {
        print_report(&report)?;
    } else {
        tracing::info!(
            direction = %report.direction,
            dry_run = report.dry_run,
            written = report.success_count,
            failed = report.failed_count(),
            incomplete = report.incomplete_count(),
            blacklisted = report.skipped.len(),
            refreshed = report.refreshed,
            cancelled = report.cancelled,
            "Sync finished"
        );
    }

    Ok(())
}

fn print_report(report: &SyncRunReport) -> Result<(), serde_json::Error> {
    let target = report.direction.target().display_name();

    if report.dry_run {
        if report.preview.is_empty() {
            println!("{} Nothing to sync.", style("✓").green());
        } else {
            println!("{}", render_candidates(&report.preview, OutputFormat::Table)?);
            println!(
                "\n{} ratings would be written to {}",
                report.preview.len(),
                target
            );
        }
        if !report.skipped.is_empty() {
            println!(
                "{} previously failed items are excluded",
                report.skipped.len()
            );
        }
        return Ok(());
    }

    println!();
    for outcome in &report.outcomes {
        if let CandidateState::Failed { message } = &outcome.state {
            println!("  {} {}: {}", style("✗").red(), outcome.title, message);
        }
    }

    println!(
        "{} {} ratings written to {}",
        style("✓").green(),
        report.success_count,
        target
    );
    let failed = report.failed_count();
    if failed > 0 {
        println!("  {} {} rejected", style("✗").red(), failed);
    }
    let incomplete = report.incomplete_count();
    if incomplete > 0 {
        println!(
            "  {} {} skipped for a missing {} id or rating",
            style("·").dim(),
            incomplete,
            target
        );
    }
    if !report.skipped.is_empty() {
        println!(
            "  {} {} skipped after failing in an earlier run",
            style("·").dim(),
            report.skipped.len()
        );
    }
    if report.refreshed {
        println!("  {} dataset refreshed", target);
    }
    if report.cancelled {
        println!("  {} Stopped early", style("⚠").yellow());
    }
    Ok(())
}
