use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;

use crate::compute::ComputeApi;
use crate::{Error, Result};

/// Spacing between operation polls.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Polls a pending zone operation until the provider reports it finished.
///
/// There is no deadline: a provider that never completes the operation keeps
/// the caller waiting. Transport errors while polling are returned as-is.
#[derive(Debug, Clone, Copy)]
pub struct OperationWaiter {
    interval: Duration,
}

impl Default for OperationWaiter {
    fn default() -> Self {
        Self {
            interval: POLL_INTERVAL,
        }
    }
}

impl OperationWaiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interval(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait for `operation` to reach `DONE`.
    ///
    /// The first error attached to the operation fails the wait immediately,
    /// whatever its status; any further errors are dropped.
    pub async fn wait(&self, compute: &dyn ComputeApi, operation: &str) -> Result<()> {
        loop {
            let op = compute.get_operation(operation).await?;
            debug!(operation = %op.name, status = ?op.status, "polled operation");

            if let Some(err) = op.first_error() {
                return Err(Error::OperationFailed {
                    operation: op.name.clone(),
                    code: err.code.clone(),
                    message: err.message.clone(),
                });
            }

            if op.is_done() {
                return Ok(());
            }

            sleep(self.interval).await;
        }
    }
}
