use crate::manager::{ManagerInner, PubSubManager};
use futures::future::BoxFuture;
use std::sync::{Arc, Weak};
use tracing::{debug, error};
use ua_pubsub_error::{PubSubError, PubSubResult};
use ua_pubsub_sdk::{
    CycleMissPolicy, MonitoringKind, NodeId, PubSubComponentKind, ReceiveTimeoutCallback,
    TimerCallback,
};

/// Receive-timeout monitoring for DataSetReaders.
///
/// The five operations delegate to the event loop. The timer is one-shot: the
/// trampoline fires the recorded callback at most once per arming, then
/// removes the cyclic callback and zeroes the reader's timer handle.
impl PubSubManager {
    /// Record the timeout callback on a reader. Only the
    /// `(DataSetReader, MessageReceiveTimeout)` combination is supported.
    pub async fn create_monitoring(
        &self,
        id: &NodeId,
        component: PubSubComponentKind,
        kind: MonitoringKind,
        callback: ReceiveTimeoutCallback,
    ) -> PubSubResult<()> {
        if component != PubSubComponentKind::DataSetReader {
            error!("create_monitoring: component {component:?} does not support monitoring");
            return Err(PubSubError::NotSupported(format!(
                "monitoring is not supported for {component:?}"
            )));
        }
        let MonitoringKind::MessageReceiveTimeout = kind;

        let mut state = self.inner.state.lock().await;
        let Some(reader) = state.data_set_reader_mut(id) else {
            return Err(PubSubError::NotFound(format!("dataset reader {id}")));
        };
        reader.timeout_callback = Some(callback);
        debug!(
            "DataSetReader [{}]: receive-timeout monitoring created",
            reader.config.name
        );
        Ok(())
    }

    /// Arm the one-shot receive-timeout timer at the reader's configured
    /// `message_receive_timeout`. Re-arming releases the previous timer.
    /// On failure the timer handle is left at zero.
    pub async fn start_monitoring(&self, id: &NodeId) -> PubSubResult<()> {
        let mut state = self.inner.state.lock().await;
        let (timeout, generation, previous_timer, name) = {
            let Some(reader) = state.data_set_reader_mut(id) else {
                return Err(PubSubError::NotFound(format!("dataset reader {id}")));
            };
            reader.arm_generation += 1;
            let previous_timer = reader.timer_id;
            reader.timer_id = 0;
            (
                reader.config.message_receive_timeout,
                reader.arm_generation,
                previous_timer,
                reader.config.name.clone(),
            )
        };
        if previous_timer != 0 {
            self.inner.event_loop.remove_cyclic_callback(previous_timer);
        }

        let callback = receive_timeout_trampoline(Arc::downgrade(&self.inner), id, generation);
        match self.inner.event_loop.add_cyclic_callback(
            callback,
            timeout,
            None,
            CycleMissPolicy::CurrentTime,
        ) {
            Ok(timer_id) => {
                if let Some(reader) = state.data_set_reader_mut(id) {
                    reader.timer_id = timer_id;
                }
                debug!(
                    "DataSetReader [{name}]: receive-timeout armed ({} ms, timer {timer_id})",
                    timeout.as_millis()
                );
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "DataSetReader [{name}]: starting receive-timeout timer failed");
                Err(e)
            }
        }
    }

    /// Disarm the receive-timeout timer.
    pub async fn stop_monitoring(&self, id: &NodeId) -> PubSubResult<()> {
        let mut state = self.inner.state.lock().await;
        let (timer_id, name) = {
            let Some(reader) = state.data_set_reader_mut(id) else {
                return Err(PubSubError::NotFound(format!("dataset reader {id}")));
            };
            let timer_id = reader.timer_id;
            reader.timer_id = 0;
            reader.arm_generation += 1;
            (timer_id, reader.config.name.clone())
        };
        if timer_id != 0 {
            self.inner.event_loop.remove_cyclic_callback(timer_id);
        }
        debug!("DataSetReader [{name}]: receive-timeout timer stopped");
        Ok(())
    }

    /// Re-apply the reader's current `message_receive_timeout` to the armed
    /// timer. Event-loop errors are surfaced verbatim.
    pub async fn update_monitoring_interval(&self, id: &NodeId) -> PubSubResult<()> {
        let state = self.inner.state.lock().await;
        let Some(reader) = state.data_set_reader(id) else {
            return Err(PubSubError::NotFound(format!("dataset reader {id}")));
        };
        let name = reader.config.name.clone();
        let result = self.inner.event_loop.modify_cyclic_callback(
            reader.timer_id,
            reader.config.message_receive_timeout,
            None,
            CycleMissPolicy::CurrentTime,
        );
        match &result {
            Ok(()) => debug!(
                "DataSetReader [{name}]: receive-timeout updated to {} ms",
                reader.config.message_receive_timeout.as_millis()
            ),
            Err(e) => {
                error!(error = %e, "DataSetReader [{name}]: updating receive-timeout interval failed")
            }
        }
        result
    }

    /// Informational only; the stop operation already released the timer.
    pub async fn delete_monitoring(&self, id: &NodeId) -> PubSubResult<()> {
        let state = self.inner.state.lock().await;
        let Some(reader) = state.data_set_reader(id) else {
            return Err(PubSubError::NotFound(format!("dataset reader {id}")));
        };
        debug!(
            "DataSetReader [{}]: receive-timeout monitoring deleted (timer {})",
            reader.config.name, reader.timer_id
        );
        Ok(())
    }
}

/// One-shot trampoline run by the event loop.
///
/// Reacquires the manager lock, verifies the arming is still current (the
/// reader may be shutting down or re-armed), zeroes the handle, and only then
/// invokes the recorded callback outside the lock.
fn receive_timeout_trampoline(
    inner: Weak<ManagerInner>,
    reader_id: &NodeId,
    generation: u64,
) -> TimerCallback {
    let reader_id = reader_id.clone();
    Arc::new(move || {
        let inner = inner.clone();
        let reader_id = reader_id.clone();
        let fired_once: BoxFuture<'static, ()> = Box::pin(async move {
            let Some(inner) = inner.upgrade() else {
                return;
            };
            let fired = {
                let mut state = inner.state.lock().await;
                match state.data_set_reader_mut(&reader_id) {
                    Some(reader) if reader.arm_generation == generation && reader.timer_id != 0 => {
                        let timer_id = reader.timer_id;
                        reader.timer_id = 0;
                        Some((timer_id, reader.timeout_callback.clone()))
                    }
                    _ => None,
                }
            };
            if let Some((timer_id, callback)) = fired {
                if let Some(callback) = callback {
                    callback(&reader_id);
                }
                inner.event_loop.remove_cyclic_callback(timer_id);
            }
        });
        fired_once
    })
}
