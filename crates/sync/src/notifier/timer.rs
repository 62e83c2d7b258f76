//! Fixed-interval refresh ticks.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval_at};

use super::{Notifier, TriggerSource};

type Gate = Arc<dyn Fn() -> bool + Send + Sync>;

/// Emits a signal every `period`, optionally only while a gate is open.
///
/// The first tick fires one full period after spawning. Ticks missed while the
/// runtime was busy are delayed rather than bursted.
pub struct TimerSource {
    period: Duration,
    gate: Option<Gate>,
}

impl TimerSource {
    /// Create an ungated timer.
    #[must_use]
    pub fn new(period: Duration) -> Self {
        Self { period, gate: None }
    }

    /// Only signal when `gate` returns `true` at tick time.
    #[must_use]
    pub fn gated_by<F>(mut self, gate: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.gate = Some(Arc::new(gate));
        self
    }
}

impl TriggerSource for TimerSource {
    fn spawn(self, notifier: Notifier) -> JoinHandle<()> {
        let Self { period, gate } = self;
        tokio::spawn(async move {
            let mut ticks = interval_at(tokio::time::Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticks.tick().await;
                if gate.as_ref().is_none_or(|open| open()) {
                    notifier.signal();
                } else {
                    tracing::trace!("timer tick skipped, gate closed");
                }
            }
        })
    }
}
