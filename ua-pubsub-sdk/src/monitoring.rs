use crate::node_id::NodeId;
use std::sync::Arc;

/// Callback recorded on a DataSetReader and fired (at most once per arming)
/// when its message-receive timeout elapses. Invoked with the reader's id,
/// outside the manager lock.
pub type ReceiveTimeoutCallback = Arc<dyn Fn(&NodeId) + Send + Sync>;
