use std::sync::Arc;

use cinesync::sync::NewItemsSummary;
use cinesync::{Engine, Platform};
use console::{Term, style};

use crate::progress::ProgressReporter;

/// Handle `cinesync scrape`.
///
/// Platforms are scraped one after another; a stop request ends the loop
/// after the platform in progress has saved its files.
pub(crate) async fn handle_scrape(
    engine: &Engine,
    platforms: &[Platform],
    full: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let is_tty = Term::stdout().is_term();
    let reporter = Arc::new(ProgressReporter::new());
    let callback = reporter.as_callback();

    for &platform in platforms {
        if engine.stop_signal().is_requested() {
            break;
        }

        let summary = if full {
            engine.fetch_full(platform, Some(&callback)).await
        } else {
            engine.fetch_incremental(platform, Some(&callback)).await
        };
        reporter.finish();
        let summary = summary?;

        if is_tty {
            print_summary(&summary);
        } else {
            tracing::info!(
                platform = %summary.platform,
                new_items = summary.new_items,
                pages = summary.pages_fetched,
                new_mappings = summary.new_mappings,
                unresolved = summary.unresolved,
                total = summary.total_stored,
                "Scrape complete"
            );
        }
    }

    Ok(())
}

fn print_summary(summary: &NewItemsSummary) {
    println!(
        "\n{} {}: {} new ratings ({} pages), {} stored",
        style("✓").green(),
        summary.platform.display_name(),
        summary.new_items,
        summary.pages_fetched,
        summary.total_stored
    );
    if summary.new_mappings > 0 {
        println!("  {} new id mappings", summary.new_mappings);
    }
    if summary.unresolved > 0 {
        println!(
            "  {} {} ratings without a cross-platform id",
            style("⚠").yellow(),
            summary.unresolved
        );
    }
    if summary.truncated {
        println!(
            "  {} A page kept failing; older ratings were not reached. Run again later.",
            style("⚠").yellow()
        );
    }
    if summary.cancelled {
        println!("  {} Stopped early", style("⚠").yellow());
    }
}
