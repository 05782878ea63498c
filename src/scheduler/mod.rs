//! Periodic task driver shared by every agent process.
//!
//! Each agent is a [`PeriodicTask`]; [`run_periodic`] ticks it on a fixed
//! interval until its [`CancellationToken`] fires.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// One agent's fetch-act cycle.
#[async_trait]
pub trait PeriodicTask: Send {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Run one iteration. Failures are logged by the task itself.
    async fn tick(&mut self);
}

/// Tick `task` every `period` until `cancel` fires. Returns the tick count.
///
/// The first tick runs immediately. A tick in progress is allowed to finish
/// before cancellation is observed.
pub async fn run_periodic<T>(task: &mut T, period: Duration, cancel: CancellationToken) -> u64
where
    T: PeriodicTask + ?Sized,
{
    info!(task = task.name(), period_ms = period.as_millis() as u64, "Agent loop started");

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut ticks = 0u64;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }
        task.tick().await;
        ticks += 1;
    }

    info!(task = task.name(), ticks, "Agent loop stopped");
    ticks
}

/// A token that is cancelled on Ctrl-C.
pub fn shutdown_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
        }
        trigger.cancel();
    });
    token
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        ticks: u32,
        stop_after: u32,
        cancel: CancellationToken,
    }

    #[async_trait]
    impl PeriodicTask for Counter {
        fn name(&self) -> &'static str {
            "counter"
        }

        async fn tick(&mut self) {
            self.ticks += 1;
            if self.ticks == self.stop_after {
                self.cancel.cancel();
            }
        }
    }

    #[tokio::test]
    async fn test_runs_until_cancelled() {
        let cancel = CancellationToken::new();
        let mut task = Counter {
            ticks: 0,
            stop_after: 3,
            cancel: cancel.clone(),
        };
        let ticks = run_periodic(&mut task, Duration::from_millis(1), cancel).await;
        assert_eq!(ticks, 3);
        assert_eq!(task.ticks, 3);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_never_ticks() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut task = Counter {
            ticks: 0,
            stop_after: 1,
            cancel: cancel.clone(),
        };
        assert_eq!(run_periodic(&mut task, Duration::from_millis(1), cancel).await, 0);
    }
}
