//! zkchroot - chroot-scoped access to a hierarchical, versioned coordination store
//!
//! A [`Connection`] confines a store session to a subtree: callers use
//! logical paths relative to the chroot, the store sees physical paths.
//! On top of the translated CRUD surface sit recursive create/upsert,
//! recursive delete with an ACL lockdown, and atomic batches whose paths are
//! translated in both directions.
//!
//! Set ZKCHROOT_LOG to control logging (see the `diagnostics` crate):
//! - ZKCHROOT_LOG=off (default) - silent
//! - ZKCHROOT_LOG=info - chroot changes, sessions
//! - ZKCHROOT_LOG=debug - recursive walks step by step

// Error types
pub mod error;

// Node metadata, ACLs, create modes
pub mod types;

pub mod path;

/// Logical <-> physical path translation
pub mod chroot;

pub mod watch;

/// Backend capability interface
pub mod coordinator;

/// In-process backend
pub mod memory;

/// Chroot-aware CRUD surface
pub mod connection;

// Recursive create and delete
pub mod delete;
pub mod upsert;

/// Atomic batches
pub mod multi;

pub mod config;

pub use chroot::Chroot;
pub use config::ConnectOptions;
pub use connection::{Connection, PROTECTED_PREFIX};
pub use coordinator::Coordinator;
pub use delete::LOCKDOWN_PERMS;
pub use error::{Error, Result};
pub use memory::{FaultTiming, MemoryCoordinator, MemoryStore, OpKind};
pub use multi::{Op, OpResult, Transaction};
pub use types::{ANY_VERSION, Acl, CreateMode, Perms, Stat, world_acl};
pub use watch::{EventType, WatchedEvent, Watcher};
