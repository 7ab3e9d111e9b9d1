use crate::api::{Backend, Result};
use crate::model::{RunOutcome, RunnerStatus};
use crate::notice::Notice;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

type RejectedHook = Box<dyn Fn(Notice) + Send + Sync>;

/// Starts test runs and reads runner status.
///
/// The controller never records runner state itself: after an accepted run the
/// next poll is what reports `Running`.
pub struct RunTestController {
    backend: Arc<dyn Backend>,
    notice_ttl: Duration,
    on_rejected: Option<RejectedHook>,
}

impl RunTestController {
    pub fn new(backend: Arc<dyn Backend>, notice_ttl: Duration) -> Self {
        Self {
            backend,
            notice_ttl,
            on_rejected: None,
        }
    }

    /// Called once for every rejected run request with a notice that expires
    /// after the configured timeout.
    pub fn on_rejected(mut self, hook: impl Fn(Notice) + Send + Sync + 'static) -> Self {
        self.on_rejected = Some(Box::new(hook));
        self
    }

    pub async fn run_test(&self) -> Result<RunOutcome> {
        let outcome = self.backend.run_test().await?;
        match outcome {
            RunOutcome::Accepted => info!("test run accepted"),
            RunOutcome::Rejected => {
                info!("test run rejected: runner busy");
                if let Some(hook) = &self.on_rejected {
                    hook(Notice::new(outcome.to_message(), self.notice_ttl));
                }
            }
            RunOutcome::Indeterminate { status } => {
                warn!(status, "run request returned an unexpected status")
            }
        }
        Ok(outcome)
    }

    pub async fn poll_status(&self) -> Result<RunnerStatus> {
        self.backend.poll_status().await
    }
}
