use std::sync::Arc;

use cinesync::{Engine, Platform};
use console::{Term, style};

use crate::progress::ProgressReporter;

/// Handle `cinesync validate`: check each platform's session cookie.
///
/// Fails when any platform rejects its credentials.
pub(crate) async fn handle_validate(
    engine: &Engine,
    platforms: &[Platform],
) -> Result<(), Box<dyn std::error::Error>> {
    let is_tty = Term::stdout().is_term();
    let reporter = Arc::new(ProgressReporter::new());
    let callback = reporter.as_callback();

    let mut rejected = Vec::new();
    for &platform in platforms {
        let valid = engine.validate(platform, Some(&callback)).await;
        reporter.finish();
        if !valid? {
            rejected.push(platform.display_name());
        }
    }

    if rejected.is_empty() {
        if is_tty {
            println!("{} Credentials valid", style("✓").green());
        }
        Ok(())
    } else {
        Err(format!(
            "Credentials rejected by {}; refresh the session cookie",
            rejected.join(", ")
        )
        .into())
    }
}
