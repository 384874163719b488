//! cinesync CLI - keeps Douban and IMDb movie ratings in step.

mod commands;
mod config;
mod progress;
mod shutdown;

use std::path::PathBuf;

use cinesync::Platform;
use cinesync::sync::StopSignal;
use clap::{Parser, Subcommand, ValueEnum};
use console::Term;
use tracing_subscriber::EnvFilter;

use crate::commands::compare::OutputFormat;

#[derive(Parser)]
#[command(name = "cinesync")]
#[command(version)]
#[command(about = "Sync movie ratings between Douban and IMDb")]
#[command(
    long_about = "cinesync scrapes your rating history from Douban and IMDb into local \
JSON datasets, matches the two by id, and writes the ratings present on one side but \
missing on the other. Scrapes are incremental: only ratings newer than the last stored \
one are fetched. Items that fail to sync are remembered and skipped on later runs."
)]
#[command(after_long_help = r#"EXAMPLES
    Scrape both platforms:
        $ cinesync scrape all

    Re-scrape everything on IMDb, ignoring what is stored:
        $ cinesync scrape imdb --full-scrape

    List Douban ratings missing on IMDb:
        $ cinesync compare douban imdb

    Dry run, then write at most 20 ratings:
        $ cinesync sync douban imdb --dry-run
        $ cinesync sync douban imdb --limit 20

    Generate shell completions:
        $ cinesync completions bash > ~/.local/share/bash-completion/completions/cinesync

CONFIGURATION
    cinesync reads configuration from:
      1. ~/.config/cinesync/config.toml (or $XDG_CONFIG_HOME/cinesync/config.toml)
      2. ./cinesync.toml
      3. Environment variables (CINESYNC_* prefix, e.g., CINESYNC_DOUBAN_COOKIE)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    CINESYNC_DATA_DIR                    Data directory (default: ~/.local/state/cinesync)
    CINESYNC_DOUBAN_USER_ID              Douban user name
    CINESYNC_DOUBAN_COOKIE               Cookie header of a logged-in Douban session
    CINESYNC_IMDB_USER_ID                IMDb user id (ur...)
    CINESYNC_IMDB_COOKIE                 Cookie header of a logged-in IMDb session
    CINESYNC_SYNC_REQUESTS_PER_SECOND    Request rate override (0 disables limiting)
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// A single platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PlatformArg {
    Douban,
    Imdb,
}

impl From<PlatformArg> for Platform {
    fn from(arg: PlatformArg) -> Self {
        match arg {
            PlatformArg::Douban => Platform::Douban,
            PlatformArg::Imdb => Platform::Imdb,
        }
    }
}

/// One platform or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PlatformSelection {
    Douban,
    Imdb,
    All,
}

impl PlatformSelection {
    fn platforms(self) -> Vec<Platform> {
        match self {
            Self::Douban => vec![Platform::Douban],
            Self::Imdb => vec![Platform::Imdb],
            Self::All => Platform::ALL.to_vec(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch new ratings into the local datasets
    Scrape {
        /// Platform to scrape
        #[arg(value_enum, default_value_t = PlatformSelection::All)]
        platform: PlatformSelection,

        /// Ignore stored ratings and fetch the whole history
        #[arg(long)]
        full_scrape: bool,
    },
    /// Show the ratings a sync would write
    Compare {
        /// Platform to read ratings from
        #[arg(value_enum)]
        source: PlatformArg,

        /// Platform missing the ratings
        #[arg(value_enum)]
        target: PlatformArg,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
    /// Write ratings missing on the target platform
    Sync {
        /// Platform to read ratings from
        #[arg(value_enum)]
        source: PlatformArg,

        /// Platform to write ratings to
        #[arg(value_enum)]
        target: PlatformArg,

        /// Show what would be written without writing
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Write at most this many ratings (skips the post-sync refresh)
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Check that the configured session cookies are accepted
    Validate {
        /// Platform to check
        #[arg(value_enum, default_value_t = PlatformSelection::All)]
        platform: PlatformSelection,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate man pages
    Man {
        /// Directory to write man pages to (prints the main page to stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let stop = StopSignal::new();
    shutdown::setup_shutdown_handler(stop.clone());

    // Structured logging only when not attached to a TTY; progress bars otherwise
    if !Term::stdout().is_term() {
        let env_filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::new("cinesync=info,cinesync_cli=info"),
        };

        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    let config = config::Config::load();

    let cli = Cli::parse();

    // Commands that need no accounts
    match &cli.command {
        Commands::Completions { shell } => {
            commands::meta::handle_completions(*shell)?;
            return Ok(());
        }
        Commands::Man { output } => {
            commands::meta::handle_man(output.clone())?;
            return Ok(());
        }
        _ => {}
    }

    let engine = commands::shared::build_engine(&config, stop)?;

    match cli.command {
        Commands::Scrape {
            platform,
            full_scrape,
        } => {
            commands::scrape::handle_scrape(&engine, &platform.platforms(), full_scrape).await?;
        }
        Commands::Compare {
            source,
            target,
            output,
        } => {
            let direction = commands::shared::direction(source.into(), target.into())?;
            commands::compare::handle_compare(&engine, direction, output)?;
        }
        Commands::Sync {
            source,
            target,
            dry_run,
            limit,
        } => {
            let direction = commands::shared::direction(source.into(), target.into())?;
            commands::sync::handle_sync(&engine, direction, dry_run, limit).await?;
        }
        Commands::Validate { platform } => {
            commands::validate::handle_validate(&engine, &platform.platforms()).await?;
        }
        Commands::Completions { .. } | Commands::Man { .. } => {}
    }

    Ok(())
}
