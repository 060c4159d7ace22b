// Error types for chrooted coordination-store operations

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the facade.
///
/// The first group mirrors the coordination store's own error codes and is
/// passed through unchanged; paths inside them are whatever the store saw
/// (physical paths). The second group is raised by the facade itself.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("Node already exists: {0}")]
    NodeExists(String),

    #[error("Node does not exist: {0}")]
    NoNode(String),

    #[error("Node has children: {0}")]
    NotEmpty(String),

    #[error("Version conflict: {0}")]
    BadVersion(String),

    #[error("Not authorized: {0}")]
    NoAuth(String),

    #[error("Ephemeral nodes may not have children: {0}")]
    NoChildrenForEphemerals(String),

    #[error("Invalid ACL for {0}")]
    InvalidAcl(String),

    #[error("Bad arguments: {0}")]
    BadArguments(String),

    #[error("Session expired")]
    SessionExpired,

    #[error("Connection lost")]
    ConnectionLoss,

    #[error("Session closed")]
    Closed,

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Operation not permitted on the root path")]
    RootPath,

    #[error("Path {path} is outside chroot {prefix}")]
    OutsideChroot { path: String, prefix: String },

    #[error("Failed to chroot to {prefix}: {source}")]
    Chroot {
        prefix: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Failed to chroot: {0} doesn't exist")]
    ChrootNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn node_exists<S: Into<String>>(path: S) -> Self {
        Error::NodeExists(path.into())
    }

    pub fn no_node<S: Into<String>>(path: S) -> Self {
        Error::NoNode(path.into())
    }

    pub fn not_empty<S: Into<String>>(path: S) -> Self {
        Error::NotEmpty(path.into())
    }

    pub fn bad_version<S: Into<String>>(path: S) -> Self {
        Error::BadVersion(path.into())
    }

    pub fn no_auth<S: Into<String>>(path: S) -> Self {
        Error::NoAuth(path.into())
    }

    pub fn invalid_path<P: Into<String>, R: Into<String>>(path: P, reason: R) -> Self {
        Error::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn outside_chroot<P: Into<String>, C: Into<String>>(path: P, prefix: C) -> Self {
        Error::OutsideChroot {
            path: path.into(),
            prefix: prefix.into(),
        }
    }

    /// Wrap a store error raised while validating a chroot prefix
    pub fn chroot<S: Into<String>>(prefix: S, source: Error) -> Self {
        Error::Chroot {
            prefix: prefix.into(),
            source: Box::new(source),
        }
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    #[must_use]
    pub fn is_no_node(&self) -> bool {
        matches!(self, Error::NoNode(_))
    }

    #[must_use]
    pub fn is_node_exists(&self) -> bool {
        matches!(self, Error::NodeExists(_))
    }

    #[must_use]
    pub fn is_not_empty(&self) -> bool {
        matches!(self, Error::NotEmpty(_))
    }

    #[must_use]
    pub fn is_bad_version(&self) -> bool {
        matches!(self, Error::BadVersion(_))
    }

    /// Errors after which the request may or may not have been applied,
    /// and which a caller can reasonably retry on the same session.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::ConnectionLoss)
    }
}

impl From<serde_yaml_ng::Error> for Error {
    fn from(err: serde_yaml_ng::Error) -> Self {
        Error::Config(err.to_string())
    }
}
