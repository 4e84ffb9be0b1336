//! Update collaborator seam.
//!
//! Firmware delivery and installation are external; the supervisor loop only
//! delegates to this trait during the maintenance window and logs the result.

use async_trait::async_trait;

use crate::error::UpdateError;

/// Checks for and installs a pending update, if any.
#[async_trait]
pub trait Updater: Send + Sync {
    async fn check_and_install(&self) -> Result<(), UpdateError>;
}

/// Updater that never finds anything to do.
pub struct NoopUpdater;

#[async_trait]
impl Updater for NoopUpdater {
    async fn check_and_install(&self) -> Result<(), UpdateError> {
        Ok(())
    }
}
