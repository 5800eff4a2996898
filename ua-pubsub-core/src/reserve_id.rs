use crate::manager::{ManagerState, PubSubManager};
use tracing::{debug, error};
use ua_pubsub_error::{PubSubError, PubSubResult};
use ua_pubsub_sdk::{
    NodeId, ReserveIdKind, PROFILE_MQTT_JSON, PROFILE_MQTT_UADP, PROFILE_UDP_UADP,
};

/// First id of the reserved wire-id range `[0x8000, 0xFFFF]`.
pub(crate) const RESERVE_ID_FIRST: u16 = 0x8000;

/// Exclusive pre-allocation of a wire id, scoped by transport profile and
/// kind, owned by a session. Prevents a client that plans to bind a
/// writer-group or writer later from having its id stolen by a concurrent
/// add.
#[derive(Clone, Debug)]
pub struct ReserveId {
    pub id: u16,
    pub kind: ReserveIdKind,
    pub transport_profile_uri: String,
    pub session_id: NodeId,
}

/// Ids handed out by one `reserve_ids` call. An entry of 0 means the
/// allocator found no free id in a full sweep.
#[derive(Clone, Debug, Default)]
pub struct ReservedIds {
    pub writer_group_ids: Vec<u16>,
    pub data_set_writer_ids: Vec<u16>,
}

impl ManagerState {
    /// A candidate is free iff no reservation and no live entity occupies it
    /// in the same (transport profile, kind) scope.
    fn reserve_id_is_free(&self, id: u16, transport_profile_uri: &str, kind: ReserveIdKind) -> bool {
        if self.reserve_ids.iter().any(|r| {
            r.transport_profile_uri == transport_profile_uri && r.kind == kind && r.id == id
        }) {
            return false;
        }
        match kind {
            ReserveIdKind::WriterGroup => !self.writer_group_wire_id_in_use(transport_profile_uri, id),
            ReserveIdKind::DataSetWriter => {
                !self.data_set_writer_wire_id_in_use(transport_profile_uri, id)
            }
        }
    }

    /// Probe up to 0x8000 candidates starting at the per-kind cursor,
    /// wrapping back to the start of the reserved range. Returns 0 when the
    /// scope is exhausted.
    fn create_reserve_id(
        &mut self,
        session_id: &NodeId,
        transport_profile_uri: &str,
        kind: ReserveIdKind,
    ) -> u16 {
        let mut next_id = match kind {
            ReserveIdKind::WriterGroup => self.next_writer_group_id,
            ReserveIdKind::DataSetWriter => self.next_data_set_writer_id,
        };

        let mut found = None;
        for _ in 0..0x8000u32 {
            if next_id < RESERVE_ID_FIRST {
                next_id = RESERVE_ID_FIRST;
            }
            if self.reserve_id_is_free(next_id, transport_profile_uri, kind) {
                found = Some(next_id);
                break;
            }
            next_id = next_id.wrapping_add(1);
        }
        let Some(id) = found else {
            error!("ReserveId creation failed: no free id could be found");
            return 0;
        };

        match kind {
            ReserveIdKind::WriterGroup => self.next_writer_group_id = id.wrapping_add(1),
            ReserveIdKind::DataSetWriter => self.next_data_set_writer_id = id.wrapping_add(1),
        }
        self.reserve_ids.push(ReserveId {
            id,
            kind,
            transport_profile_uri: transport_profile_uri.to_string(),
            session_id: session_id.clone(),
        });
        id
    }
}

impl PubSubManager {
    /// Reclaim reservations whose owning session is neither the admin
    /// session nor currently active.
    pub async fn free_ids(&self) {
        let mut state = self.inner.state.lock().await;
        self.free_ids_locked(&mut state);
    }

    pub(crate) fn free_ids_locked(&self, state: &mut ManagerState) {
        let admin = self.inner.sessions.admin_session_id();
        let before = state.reserve_ids.len();
        let sessions = &self.inner.sessions;
        state
            .reserve_ids
            .retain(|r| r.session_id == admin || sessions.is_session_alive(&r.session_id));
        let reclaimed = before - state.reserve_ids.len();
        if reclaimed > 0 {
            debug!("Reclaimed {reclaimed} reservations from expired sessions");
        }
    }

    /// Reserve `num_writer_group_ids` writer-group ids and
    /// `num_data_set_writer_ids` dataset-writer ids for the session, scoped
    /// by transport profile. Expired reservations are reclaimed first; only
    /// the MQTT-UADP, MQTT-JSON and UDP-UADP profiles are accepted.
    pub async fn reserve_ids(
        &self,
        session_id: &NodeId,
        num_writer_group_ids: u16,
        num_data_set_writer_ids: u16,
        transport_profile_uri: &str,
    ) -> PubSubResult<ReservedIds> {
        let mut state = self.inner.state.lock().await;
        self.free_ids_locked(&mut state);

        if transport_profile_uri != PROFILE_MQTT_UADP
            && transport_profile_uri != PROFILE_MQTT_JSON
            && transport_profile_uri != PROFILE_UDP_UADP
        {
            error!("ReserveId creation failed: no valid transport profile uri");
            return Err(PubSubError::InvalidArgument(format!(
                "transport profile {transport_profile_uri} cannot carry reservations"
            )));
        }

        let mut reserved = ReservedIds {
            writer_group_ids: Vec::with_capacity(usize::from(num_writer_group_ids)),
            data_set_writer_ids: Vec::with_capacity(usize::from(num_data_set_writer_ids)),
        };
        for _ in 0..num_writer_group_ids {
            reserved.writer_group_ids.push(state.create_reserve_id(
                session_id,
                transport_profile_uri,
                ReserveIdKind::WriterGroup,
            ));
        }
        for _ in 0..num_data_set_writer_ids {
            reserved.data_set_writer_ids.push(state.create_reserve_id(
                session_id,
                transport_profile_uri,
                ReserveIdKind::DataSetWriter,
            ));
        }
        Ok(reserved)
    }

    /// Snapshot of the live reservations.
    pub async fn reservations(&self) -> Vec<ReserveId> {
        let state = self.inner.state.lock().await;
        state.reserve_ids.clone()
    }
}
