//! Typed records shared by the stores, the reconciler and the sync executor.

pub mod failure;
pub mod merged;
pub mod movie;
pub mod platform;
pub mod prelude;
