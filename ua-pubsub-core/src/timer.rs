use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use ua_pubsub_error::{PubSubError, PubSubResult};
use ua_pubsub_sdk::{CycleMissPolicy, EventLoop, TimerCallback, TimerId};

/// Built-in tokio-backed event loop.
///
/// Each cyclic callback runs on its own spawned task, cancelled through a
/// token. Modifying the interval restarts the running period from now, which
/// is also the behavior behind the `CurrentTime` cycle-miss policy: after a
/// late cycle the next one is scheduled relative to the current time.
#[derive(Clone, Default)]
pub struct TimerEventLoop {
    inner: Arc<TimerTables>,
}

#[derive(Default)]
struct TimerTables {
    next_id: AtomicU64,
    timers: DashMap<TimerId, TimerEntry>,
}

struct TimerEntry {
    token: CancellationToken,
    interval_tx: watch::Sender<Duration>,
}

impl TimerEventLoop {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Delay until the first cycle: `interval` when no base time is given,
/// otherwise the next multiple of `interval` after `base_time`.
fn initial_delay(interval: Duration, base_time: Option<DateTime<Utc>>) -> Duration {
    let Some(base) = base_time else {
        return interval;
    };
    let now = Utc::now();
    if base > now {
        return (base - now).to_std().unwrap_or(interval);
    }
    let elapsed = (now - base).to_std().unwrap_or_default();
    let period = interval.as_nanos().max(1);
    let remainder = elapsed.as_nanos() % period;
    Duration::from_nanos((period - remainder) as u64)
}

impl EventLoop for TimerEventLoop {
    fn add_cyclic_callback(
        &self,
        callback: TimerCallback,
        interval: Duration,
        base_time: Option<DateTime<Utc>>,
        _policy: CycleMissPolicy,
    ) -> PubSubResult<TimerId> {
        // A zero interval would busy-spin the task.
        let interval = interval.max(Duration::from_millis(1));
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;

        let token = CancellationToken::new();
        let (interval_tx, mut interval_rx) = watch::channel(interval);
        self.inner.timers.insert(
            id,
            TimerEntry {
                token: token.clone(),
                interval_tx,
            },
        );

        let tables = Arc::clone(&self.inner);
        let mut delay = initial_delay(interval, base_time);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    changed = interval_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        // Restart the running period with the new interval.
                        delay = *interval_rx.borrow();
                    }
                    _ = tokio::time::sleep(delay) => {
                        callback().await;
                        delay = *interval_rx.borrow();
                    }
                }
            }
            tables.timers.remove(&id);
        });
        Ok(id)
    }

    fn modify_cyclic_callback(
        &self,
        id: TimerId,
        interval: Duration,
        _base_time: Option<DateTime<Utc>>,
        _policy: CycleMissPolicy,
    ) -> PubSubResult<()> {
        let interval = interval.max(Duration::from_millis(1));
        let Some(entry) = self.inner.timers.get(&id) else {
            return Err(PubSubError::NotFound(format!("cyclic callback {id}")));
        };
        entry
            .interval_tx
            .send(interval)
            .map_err(|_| PubSubError::InternalError("cyclic callback task exited".to_string()))
    }

    fn remove_cyclic_callback(&self, id: TimerId) {
        if let Some((_, entry)) = self.inner.timers.remove(&id) {
            entry.token.cancel();
        }
    }
}
