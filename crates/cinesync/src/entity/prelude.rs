//! Common re-exports for convenient entity usage.

pub use super::failure::{FailureKey, FailureReason, FailureRecord};
pub use super::merged::{MergedDataset, MergedMovie};
pub use super::movie::{ItemKey, MovieRecord};
pub use super::platform::{Platform, SyncDirection};
