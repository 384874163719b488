use cinesync::sync::StopSignal;
use console::Term;

/// Set up the Ctrl+C handler for graceful shutdown.
///
/// The first press requests a stop through `stop`; the running operation
/// finishes its current item, saves its files and returns. A second press
/// exits immediately.
pub(crate) fn setup_shutdown_handler(stop: StopSignal) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl+C handler: {}", e);
            return;
        }

        let is_tty = Term::stdout().is_term();
        if is_tty {
            eprintln!("\n\nShutdown requested, finishing current item...");
            eprintln!("Press Ctrl+C again to force quit.");
        } else {
            tracing::warn!("Shutdown requested, finishing current item");
        }

        stop.request();

        // Wait for second Ctrl+C for force quit
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to install second Ctrl+C handler: {}", e);
            return;
        }

        if is_tty {
            eprintln!("Force quit!");
        }
        std::process::exit(130);
    });
}
