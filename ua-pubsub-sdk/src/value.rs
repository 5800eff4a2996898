use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Publisher identity carried by a Connection and matched by readers.
///
/// The string variant owns its payload: moving a configuration into the
/// manager transfers ownership of the string to the Connection for its whole
/// lifetime.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PublisherId {
    Byte(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    String(String),
}

impl Default for PublisherId {
    #[inline]
    fn default() -> Self {
        PublisherId::UInt64(0)
    }
}

impl Display for PublisherId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            PublisherId::Byte(v) => write!(f, "{v}"),
            PublisherId::UInt16(v) => write!(f, "{v}"),
            PublisherId::UInt32(v) => write!(f, "{v}"),
            PublisherId::UInt64(v) => write!(f, "{v}"),
            PublisherId::String(s) => f.write_str(s),
        }
    }
}
