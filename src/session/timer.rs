// src/session/timer.rs

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval_at},
};

use crate::{models::session::SubmitReason, session::SessionCore};

/// A fixed deadline. Remaining time is always derived from the clock, so a
/// late or skipped tick never stretches the exam.
#[derive(Debug, Clone, Copy)]
pub struct Countdown {
    deadline: Instant,
}

impl Countdown {
    pub fn new(start: Instant, remaining: Duration) -> Self {
        Self {
            deadline: start + remaining,
        }
    }

    /// Whole seconds left at `now`, rounded up.
    pub fn remaining_secs(&self, now: Instant) -> u64 {
        ceil_secs(self.deadline.saturating_duration_since(now))
    }
}

/// `left` in whole seconds, rounded up so a partial second still shows.
pub(crate) fn ceil_secs(left: Duration) -> u64 {
    left.as_secs() + u64::from(left.subsec_nanos() > 0)
}

/// Spawns the countdown of one session.
///
/// Publishes the remaining seconds on every tick and, on reaching zero, asks
/// the coordinator to submit with reason `Expired` and exits. The task also
/// exits as soon as the end-session signal fires, so it can never fire after
/// the session has ended.
pub(crate) fn spawn_timer(
    core: Arc<SessionCore>,
    remaining: Duration,
    tick: Duration,
    mut stop: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let start = Instant::now();
        let countdown = Countdown::new(start, remaining);
        let mut ticker = interval_at(start + tick, tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            if *stop.borrow_and_update() {
                break;
            }

            tokio::select! {
                biased;
                _ = stop.changed() => break,
                _ = ticker.tick() => {
                    let left = countdown.remaining_secs(Instant::now());
                    core.publish_remaining(left);
                    if left == 0 {
                        tracing::info!(attempt_id = %core.attempt_id, "Time is up");
                        super::coordinator::begin_submission(&core, SubmitReason::Expired).await;
                        break;
                    }
                }
            }
        }

        tracing::debug!(attempt_id = %core.attempt_id, "Timer stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_countdown_rounds_up() {
        let start = Instant::now();
        let countdown = Countdown::new(start, Duration::from_secs(1800));

        assert_eq!(countdown.remaining_secs(start), 1800);
        assert_eq!(
            countdown.remaining_secs(start + Duration::from_millis(500)),
            1800
        );
        assert_eq!(countdown.remaining_secs(start + Duration::from_secs(1)), 1799);
        assert_eq!(
            countdown.remaining_secs(start + Duration::from_secs(1800)),
            0
        );
        assert_eq!(
            countdown.remaining_secs(start + Duration::from_secs(4000)),
            0
        );
    }

    #[test]
    fn test_zero_budget_is_already_due() {
        let start = Instant::now();
        let countdown = Countdown::new(start, Duration::ZERO);
        assert_eq!(countdown.remaining_secs(start), 0);
    }
}
