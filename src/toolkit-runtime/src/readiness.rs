//! Host readiness poller.

use std::time::Duration;

use crate::config::ToolkitConfig;
use crate::{Result, ToolkitError};

/// Polls a readiness predicate on a fixed interval.
///
/// Without a maximum the wait is unbounded: the host's load time is outside
/// the runtime's control.
#[derive(Debug, Clone, Copy)]
pub struct ReadinessPoller {
    interval: Duration,
    max_attempts: Option<u32>,
}

impl ReadinessPoller {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn from_config(config: &ToolkitConfig) -> Self {
        Self {
            interval: config.poll_interval(),
            max_attempts: config.max_poll_attempts,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until `is_ready` returns true. Returns the number of checks made.
    pub async fn wait<F>(&self, is_ready: F) -> Result<u32>
    where
        F: Fn() -> bool,
    {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            if is_ready() {
                tracing::debug!("Host ready after {} checks", attempts);
                return Ok(attempts);
            }

            if let Some(max) = self.max_attempts {
                if attempts >= max {
                    return Err(ToolkitError::ReadinessTimeout { attempts });
                }
            }

            tokio::time::sleep(self.interval).await;
        }
    }
}

impl Default for ReadinessPoller {
    fn default() -> Self {
        Self::from_config(&ToolkitConfig::default())
    }
}
