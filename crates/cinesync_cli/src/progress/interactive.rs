use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use cinesync::Platform;
use cinesync::sync::SyncProgress;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Consolidated progress state to avoid multiple mutex locks.
#[derive(Default)]
struct ProgressState {
    /// Listing bars by platform.
    fetch_bars: HashMap<Platform, ProgressBar>,
    /// Cross-id resolution bars by platform.
    resolve_bars: HashMap<Platform, ProgressBar>,
    /// Single bar for rating writes.
    sync_bar: Option<ProgressBar>,
    written: usize,
    failed: usize,
}

/// Interactive progress reporter using indicatif.
pub struct InteractiveReporter {
    multi: MultiProgress,
    state: Mutex<ProgressState>,
}

impl InteractiveReporter {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            state: Mutex::new(ProgressState::default()),
        }
    }

    pub fn handle(&self, event: SyncProgress) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };

        match event {
            SyncProgress::ValidatingCredentials { platform } => {
                let pb = self.spinner(platform.display_name());
                pb.set_message("Checking credentials...");
                state.fetch_bars.insert(platform, pb);
            }

            SyncProgress::CredentialsChecked { platform, valid } => {
                if let Some(pb) = state.fetch_bars.remove(&platform) {
                    if valid {
                        pb.finish_with_message("✓ credentials valid");
                    } else {
                        pb.abandon_with_message("✗ credentials rejected");
                    }
                }
            }

            SyncProgress::FetchingPages { platform, known } => {
                let pb = self.spinner(platform.display_name());
                pb.set_message(format!("Fetching ratings ({} stored)...", known));
                state.fetch_bars.insert(platform, pb);
            }

            SyncProgress::FetchedPage {
                platform,
                page,
                new_so_far,
                total,
                ..
            } => {
                if let Some(pb) = state.fetch_bars.get(&platform) {
                    let msg = match total {
                        Some(total) => format!("Page {} ({} new of {} rated)", page, new_so_far, total),
                        None => format!("Page {} ({} new)", page, new_so_far),
                    };
                    pb.set_message(msg);
                }
            }

            SyncProgress::ReachedKnownItem { platform, page, .. } => {
                if let Some(pb) = state.fetch_bars.get(&platform) {
                    pb.set_message(format!("Reached stored ratings on page {}", page));
                }
            }

            SyncProgress::FetchComplete {
                platform,
                new_items,
            } => {
                if let Some(pb) = state.fetch_bars.remove(&platform) {
                    pb.finish_with_message(format!("✓ {} new ratings", new_items));
                }
            }

            SyncProgress::ResolvingIds {
                platform,
                misses,
                cached,
                ..
            } => {
                if misses > 0 {
                    let pb = self.multi.add(ProgressBar::new(misses as u64));
                    pb.set_style(Self::bar_style());
                    pb.set_prefix(format!("{:12}", "Resolving"));
                    pb.set_message(format!("{} from cache", cached));
                    state.resolve_bars.insert(platform, pb);
                }
            }

            SyncProgress::ResolvedId {
                platform,
                local_id,
                cross_id,
            } => {
                if let Some(pb) = state.resolve_bars.get(&platform) {
                    pb.inc(1);
                    let symbol = if cross_id.is_some() { "✓" } else { "·" };
                    pb.set_message(format!("{} {}", symbol, local_id));
                    if pb.length().is_some_and(|len| pb.position() >= len) {
                        pb.finish_with_message("✓ ids resolved");
                    }
                }
            }

            SyncProgress::ResolveFailed {
                platform, local_id, ..
            } => {
                if let Some(pb) = state.resolve_bars.get(&platform) {
                    pb.inc(1);
                    pb.set_message(format!("✗ {}", local_id));
                    if pb.length().is_some_and(|len| pb.position() >= len) {
                        pb.finish_with_message("✓ ids resolved");
                    }
                }
            }

            SyncProgress::RetryBackoff {
                label,
                retry_after_ms,
                attempt,
            } => {
                self.multi
                    .println(format!(
                        "⏳ {} failed (attempt {}), retrying in {}ms",
                        label, attempt, retry_after_ms
                    ))
                    .ok();
            }

            SyncProgress::SyncingRatings {
                count, dry_run, ..
            } => {
                if !dry_run && count > 0 {
                    let pb = self.multi.add(ProgressBar::new(count as u64));
                    pb.set_style(Self::bar_style());
                    pb.set_prefix(format!("{:12}", "Syncing"));
                    pb.set_message("Writing ratings...");
                    state.sync_bar = Some(pb);
                }
            }

            SyncProgress::RatingWritten { title, rating, .. } => {
                state.written += 1;
                if let Some(ref pb) = state.sync_bar {
                    pb.inc(1);
                    pb.set_message(format!("★ {} ({})", title, rating));
                }
            }

            SyncProgress::RatingIncomplete { title } => {
                if let Some(ref pb) = state.sync_bar {
                    pb.inc(1);
                    pb.set_message(format!("· {}", title));
                }
            }

            SyncProgress::RatingFailed { title, error } => {
                state.failed += 1;
                if let Some(ref pb) = state.sync_bar {
                    pb.inc(1);
                    pb.set_message(format!("✗ {}: {}", title, error));
                }
            }

            SyncProgress::SyncComplete { written, failed, .. } => {
                if let Some(pb) = state.sync_bar.take() {
                    pb.finish_with_message(format!("✓ {} written, {} failed", written, failed));
                }
            }

            SyncProgress::RefreshingTarget { platform } => {
                self.multi
                    .println(format!("Refreshing {} ratings...", platform.display_name()))
                    .ok();
            }

            SyncProgress::Cancelled => {
                for (_, pb) in state.fetch_bars.drain() {
                    pb.abandon_with_message("cancelled");
                }
                for (_, pb) in state.resolve_bars.drain() {
                    pb.abandon_with_message("cancelled");
                }
                if let Some(pb) = state.sync_bar.take() {
                    pb.abandon_with_message(format!(
                        "cancelled after {} written, {} failed",
                        state.written, state.failed
                    ));
                }
            }

            SyncProgress::Warning { message } => {
                self.multi.println(format!("⚠ {}", message)).ok();
            }

            _ => {}
        }
    }

    /// Clear all progress bars.
    pub fn clear(&self) {
        self.multi.clear().ok();
    }

    /// Finish any bars still running.
    pub fn finish(&self) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        for (_, pb) in state.fetch_bars.drain() {
            pb.finish();
        }
        for (_, pb) in state.resolve_bars.drain() {
            pb.finish();
        }
        if let Some(pb) = state.sync_bar.take() {
            pb.finish();
        }
    }

    fn spinner(&self, prefix: &str) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(Self::spinner_style());
        pb.set_prefix(format!("{:12}", prefix));
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{prefix:.bold.cyan} {spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{prefix:.bold.cyan} [{bar:40.cyan/blue}] {pos:>3}/{len:3} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░")
    }
}

impl Default for InteractiveReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use indicatif::ProgressDrawTarget;

    fn hidden() -> InteractiveReporter {
        let reporter = InteractiveReporter::new();
        reporter.multi.set_draw_target(ProgressDrawTarget::hidden());
        reporter
    }

    #[test]
    fn test_sync_bar_tracks_outcomes() {
        let reporter = hidden();
        reporter.handle(SyncProgress::SyncingRatings {
            direction: cinesync::SyncDirection::DoubanToImdb,
            count: 3,
            dry_run: false,
        });
        reporter.handle(SyncProgress::RatingWritten {
            title: "Heat".into(),
            item_id: "tt0113277".into(),
            rating: 8,
        });
        reporter.handle(SyncProgress::RatingFailed {
            title: "Ran".into(),
            error: "rejected".into(),
        });

        {
            let state = reporter.state.lock().unwrap();
            assert_eq!(state.written, 1);
            assert_eq!(state.failed, 1);
            assert_eq!(state.sync_bar.as_ref().unwrap().position(), 2);
        }

        reporter.handle(SyncProgress::SyncComplete {
            written: 1,
            failed: 1,
            skipped: 0,
        });
        assert!(reporter.state.lock().unwrap().sync_bar.is_none());
    }

    #[test]
    fn test_dry_run_has_no_sync_bar() {
        let reporter = hidden();
        reporter.handle(SyncProgress::SyncingRatings {
            direction: cinesync::SyncDirection::ImdbToDouban,
            count: 5,
            dry_run: true,
        });
        assert!(reporter.state.lock().unwrap().sync_bar.is_none());
    }

    #[test]
    fn test_fetch_bar_lifecycle() {
        let reporter = hidden();
        reporter.handle(SyncProgress::FetchingPages {
            platform: Platform::Douban,
            known: 10,
        });
        assert!(reporter.state.lock().unwrap().fetch_bars.contains_key(&Platform::Douban));

        reporter.handle(SyncProgress::FetchComplete {
            platform: Platform::Douban,
            new_items: 2,
        });
        assert!(reporter.state.lock().unwrap().fetch_bars.is_empty());
    }

    #[test]
    fn test_cancel_drains_bars() {
        let reporter = hidden();
        reporter.handle(SyncProgress::FetchingPages {
            platform: Platform::Imdb,
            known: 0,
        });
        reporter.handle(SyncProgress::ResolvingIds {
            platform: Platform::Imdb,
            misses: 4,
            cached: 1,
            concurrency: 4,
        });
        reporter.handle(SyncProgress::Cancelled);

        let state = reporter.state.lock().unwrap();
        assert!(state.fetch_bars.is_empty());
        assert!(state.resolve_bars.is_empty());
    }
}
