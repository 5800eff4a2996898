use crate::node_id::NodeId;
use dashmap::DashMap;

/// Liveness view of the host server's sessions.
///
/// The reserve-id allocator sweeps reservations owned by sessions that are
/// neither the admin session nor currently active.
pub trait SessionRegistry: Send + Sync {
    /// Identity of the server-internal admin session. Reservations owned by
    /// it are never reclaimed.
    fn admin_session_id(&self) -> NodeId;

    /// Whether the session is present in the active-session list. The admin
    /// session does not need to be listed here.
    fn is_session_alive(&self, session_id: &NodeId) -> bool;
}

/// Plain in-memory session registry for hosts without a session subsystem
/// and for tests.
pub struct InMemorySessionRegistry {
    admin: NodeId,
    sessions: DashMap<NodeId, ()>,
}

impl InMemorySessionRegistry {
    pub fn new(admin: NodeId) -> Self {
        Self {
            admin,
            sessions: DashMap::new(),
        }
    }

    /// Mark a session as active.
    pub fn open_session(&self, session_id: NodeId) {
        self.sessions.insert(session_id, ());
    }

    /// Remove a session from the active list.
    pub fn close_session(&self, session_id: &NodeId) {
        self.sessions.remove(session_id);
    }
}

impl SessionRegistry for InMemorySessionRegistry {
    #[inline]
    fn admin_session_id(&self) -> NodeId {
        self.admin.clone()
    }

    #[inline]
    fn is_session_alive(&self, session_id: &NodeId) -> bool {
        self.sessions.contains_key(session_id)
    }
}
