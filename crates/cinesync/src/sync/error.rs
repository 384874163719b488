use std::path::PathBuf;

use thiserror::Error;

use crate::entity::platform::Platform;
use crate::platform::PlatformError;
use crate::store::StoreError;

/// Errors that end a fetch, reconcile or sync run.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Source and target are the same platform.
    #[error("Cannot sync {0} to itself")]
    SameDirection(Platform),

    /// The pre-flight credential check failed.
    #[error("{} rejected the configured credentials", .0.display_name())]
    CredentialsRejected(Platform),

    /// A dataset needed for reconciliation has never been scraped.
    #[error("No {platform} dataset at {}; run `cinesync scrape {platform}` first", .path.display())]
    MissingDataset { platform: Platform, path: PathBuf },

    /// A client was wired to the wrong side of a sync.
    #[error("Expected a {expected} client, got {actual}")]
    ClientMismatch { expected: Platform, actual: Platform },
}

impl EngineError {
    /// Whether the run failed because credentials are missing or refused.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            EngineError::Platform(PlatformError::AuthRequired) | EngineError::CredentialsRejected(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
