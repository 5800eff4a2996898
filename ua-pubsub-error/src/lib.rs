use thiserror::Error;

pub type PubSubResult<T, E = PubSubError> = Result<T, E>;

/// Status returned by the PubSub management operations.
///
/// The variants mirror the status surface of the management core: every
/// fallible operation reports exactly one of these, and cascade paths log
/// and continue instead of aborting the parent removal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PubSubError {
    /// Null/empty required input or an unrecognized transport profile.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Lookup by identifier failed, or no transport layer is registered.
    #[error("not found: {0}")]
    NotFound(String),
    /// A name collided inside a collection that requires unique names.
    #[error("browse name duplicated: {0}")]
    BrowseNameDuplicated(String),
    /// Allocation failure reported by a collaborator (channels, plugins).
    #[error("out of memory")]
    OutOfMemory,
    /// Configuration copy or transport channel creation failed.
    #[error("internal error: {0}")]
    InternalError(String),
    /// Mutation or removal attempted on a frozen entity.
    #[error("configuration error: {0}")]
    ConfigurationError(String),
    /// Unsupported dataset type or monitoring combination.
    #[error("not supported: {0}")]
    NotSupported(String),
}

impl PubSubError {
    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, PubSubError::NotFound(_))
    }

    #[inline]
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, PubSubError::ConfigurationError(_))
    }
}

impl From<String> for PubSubError {
    #[inline]
    fn from(e: String) -> Self {
        PubSubError::InternalError(e)
    }
}

impl From<&str> for PubSubError {
    #[inline]
    fn from(e: &str) -> Self {
        PubSubError::InternalError(e.to_string())
    }
}
