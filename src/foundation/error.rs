use crate::foundation::core::NodeId;

/// Result alias used across the crate.
pub type RectSwapResult<T> = Result<T, RectSwapError>;

/// Error kinds surfaced by the observer, the controller and the configuration layer.
///
/// A degenerate parent on commit is not an error: `commit` reports it as `Ok(false)` and leaves
/// the session open.
#[derive(thiserror::Error, Debug)]
pub enum RectSwapError {
    /// The node is missing, detached, or cannot be attached to the native watch primitive.
    #[error("invalid target {node}: {reason}")]
    InvalidTarget {
        /// Offending node.
        node: NodeId,
        /// Human-readable cause.
        reason: String,
    },

    /// The subscriber cannot be invoked (a weak listener whose owner is gone).
    #[error("invalid callback: {0}")]
    InvalidCallback(String),

    /// The native watch mechanism is unavailable (still retrying, failed, or cleaned up).
    #[error("observer not initialized: {0}")]
    NotInitialized(String),

    /// An edit session is already open for the node.
    #[error("already editing {0}")]
    AlreadyEditing(NodeId),

    /// The operation needs an open edit session for the node.
    #[error("not editing {0}")]
    NotEditing(NodeId),

    /// The observer already tracks its configured maximum number of nodes.
    #[error("observer capacity exceeded: {0} nodes")]
    CapacityExceeded(usize),

    /// Invalid configuration values.
    #[error("config error: {0}")]
    Config(String),

    /// The layout host rejected a style write or query.
    #[error("host error: {0}")]
    Host(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RectSwapError {
    pub fn invalid_target(node: NodeId, reason: impl Into<String>) -> Self {
        Self::InvalidTarget {
            node,
            reason: reason.into(),
        }
    }

    pub fn invalid_callback(msg: impl Into<String>) -> Self {
        Self::InvalidCallback(msg.into())
    }

    pub fn not_initialized(msg: impl Into<String>) -> Self {
        Self::NotInitialized(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn host(msg: impl Into<String>) -> Self {
        Self::Host(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
