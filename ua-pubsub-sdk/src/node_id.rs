use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use uuid::Uuid;

/// The payload of a [`NodeId`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Identifier {
    Numeric(u32),
    Guid(Uuid),
    String(String),
}

/// Opaque identifier for PubSub entities and sessions.
///
/// Identifiers are either generated by the manager (numeric, from a
/// monotonically-increasing counter) or supplied by the address-space mirror
/// so they also designate a real node. Session identities are typically
/// GUID-flavored.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId {
    pub namespace: u16,
    pub identifier: Identifier,
}

impl NodeId {
    #[inline]
    pub const fn numeric(namespace: u16, value: u32) -> Self {
        Self {
            namespace,
            identifier: Identifier::Numeric(value),
        }
    }

    #[inline]
    pub const fn guid(namespace: u16, value: Uuid) -> Self {
        Self {
            namespace,
            identifier: Identifier::Guid(value),
        }
    }

    #[inline]
    pub fn string(namespace: u16, value: impl Into<String>) -> Self {
        Self {
            namespace,
            identifier: Identifier::String(value.into()),
        }
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.identifier {
            Identifier::Numeric(v) => write!(f, "ns={};i={}", self.namespace, v),
            Identifier::Guid(g) => write!(f, "ns={};g={}", self.namespace, g),
            Identifier::String(s) => write!(f, "ns={};s={}", self.namespace, s),
        }
    }
}
