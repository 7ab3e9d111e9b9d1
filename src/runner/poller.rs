use super::RunTestController;
use crate::model::RunnerStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Owned periodic status poll.
///
/// Sends an update only when the observed status changes; `None` means the
/// last poll failed. The task is aborted on [`StatusPoller::stop`] or drop.
pub struct StatusPoller {
    handle: Option<JoinHandle<()>>,
}

impl StatusPoller {
    pub fn start(
        controller: Arc<RunTestController>,
        period: Duration,
        updates: UnboundedSender<Option<RunnerStatus>>,
    ) -> Self {
        let handle = tokio::spawn(poll_loop(controller, period, updates));
        Self {
            handle: Some(handle),
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub async fn stop(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
        }
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn poll_loop(
    controller: Arc<RunTestController>,
    period: Duration,
    updates: UnboundedSender<Option<RunnerStatus>>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last: Option<Option<RunnerStatus>> = None;

    loop {
        ticker.tick().await;
        let observed = match controller.poll_status().await {
            Ok(status) => {
                debug!(%status, "runner status polled");
                Some(status)
            }
            Err(e) => {
                warn!(error = %e, "status poll failed");
                None
            }
        };

        if last == Some(observed) {
            continue;
        }
        last = Some(observed);
        if updates.send(observed).is_err() {
            debug!("status receiver dropped; poller exiting");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::ScriptedBackend;
    use crate::api::ApiError;
    use tokio::sync::mpsc;

    fn controller(backend: ScriptedBackend) -> Arc<RunTestController> {
        Arc::new(RunTestController::new(
            Arc::new(backend),
            Duration::from_millis(2000),
        ))
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Option<RunnerStatus>>) -> Vec<Option<RunnerStatus>> {
        let mut seen = Vec::new();
        while let Ok(update) = rx.try_recv() {
            seen.push(update);
        }
        seen
    }

    #[tokio::test(start_paused = true)]
    async fn reports_running_then_idle_without_fabricated_states() {
        let backend = ScriptedBackend::new(0).script_statuses(vec![
            Ok(RunnerStatus::Running),
            Ok(RunnerStatus::Running),
            Ok(RunnerStatus::Running),
            Ok(RunnerStatus::Idle),
        ]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let poller = StatusPoller::start(controller(backend), Duration::from_secs(1), tx);

        tokio::time::sleep(Duration::from_millis(5500)).await;
        poller.stop().await;

        assert_eq!(
            drain(&mut rx),
            vec![Some(RunnerStatus::Running), Some(RunnerStatus::Idle)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failed_poll_is_unknown_and_loop_continues() {
        let backend = ScriptedBackend::new(0).script_statuses(vec![
            Ok(RunnerStatus::Idle),
            Err(ApiError::Protocol("boom".into())),
            Ok(RunnerStatus::Running),
        ]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let poller = StatusPoller::start(controller(backend), Duration::from_secs(1), tx);

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(poller.is_active());
        poller.stop().await;

        assert_eq!(
            drain(&mut rx),
            vec![Some(RunnerStatus::Idle), None, Some(RunnerStatus::Running)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn polls_on_the_configured_period() {
        let backend = Arc::new(ScriptedBackend::new(0));
        let controller = Arc::new(RunTestController::new(
            backend.clone(),
            Duration::from_millis(2000),
        ));
        let (tx, _rx) = mpsc::unbounded_channel();
        let poller = StatusPoller::start(controller, Duration::from_secs(1), tx);

        tokio::time::sleep(Duration::from_millis(3500)).await;
        poller.stop().await;

        let polls = backend.calls().iter().filter(|c| *c == "status").count();
        assert_eq!(polls, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_tears_down_the_timer() {
        let backend = Arc::new(ScriptedBackend::new(0));
        let controller = Arc::new(RunTestController::new(
            backend.clone(),
            Duration::from_millis(2000),
        ));
        let (tx, _rx) = mpsc::unbounded_channel();
        let poller = StatusPoller::start(controller, Duration::from_secs(1), tx);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        poller.stop().await;
        let polls_at_stop = backend.calls().len();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(backend.calls().len(), polls_at_stop);
    }

    #[tokio::test(start_paused = true)]
    async fn exits_when_receiver_is_dropped() {
        let (tx, rx) = mpsc::unbounded_channel();
        let poller = StatusPoller::start(
            controller(ScriptedBackend::new(0)),
            Duration::from_secs(1),
            tx,
        );
        drop(rx);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!poller.is_active());
    }
}
