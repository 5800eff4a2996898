use crate::types::CycleMissPolicy;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use std::{sync::Arc, time::Duration};
use ua_pubsub_error::PubSubResult;

/// Handle of a registered cyclic callback. 0 is never handed out, so entities
/// can use it as the "unarmed" sentinel.
pub type TimerId = u64;

/// Work executed by the event loop on every cycle of a registered callback.
pub type TimerCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Timer facility driven by the host's event loop.
///
/// Callbacks run on whatever task the event loop uses; anything touching
/// manager state must reacquire the manager lock first.
pub trait EventLoop: Send + Sync {
    /// Register `callback` to run every `interval`, phase-aligned to
    /// `base_time` when one is given.
    fn add_cyclic_callback(
        &self,
        callback: TimerCallback,
        interval: Duration,
        base_time: Option<DateTime<Utc>>,
        policy: CycleMissPolicy,
    ) -> PubSubResult<TimerId>;

    /// Change the interval of an existing cyclic callback. The next cycle is
    /// rescheduled relative to now.
    fn modify_cyclic_callback(
        &self,
        id: TimerId,
        interval: Duration,
        base_time: Option<DateTime<Utc>>,
        policy: CycleMissPolicy,
    ) -> PubSubResult<()>;

    /// Unregister a cyclic callback. Unknown handles are ignored.
    fn remove_cyclic_callback(&self, id: TimerId);
}
