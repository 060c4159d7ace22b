//! Node metadata, ACLs and creation modes.

use crate::error::{Error, Result};
use bitflags::bitflags;

/// Version argument that matches any stored version.
pub const ANY_VERSION: i32 = -1;

/// Node metadata as reported by the store. The facade never interprets it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stat {
    /// zxid of the transaction that created the node
    pub czxid: i64,
    /// zxid of the last data modification
    pub mzxid: i64,
    /// zxid of the last change to the node's children
    pub pzxid: i64,
    /// Creation time, milliseconds since the epoch
    pub ctime: i64,
    /// Last modification time, milliseconds since the epoch
    pub mtime: i64,
    /// Number of data changes
    pub version: i32,
    /// Number of child list changes
    pub cversion: i32,
    /// Number of ACL changes
    pub aversion: i32,
    /// Owning session id for ephemeral nodes, 0 otherwise
    pub ephemeral_owner: i64,
    pub data_length: i32,
    pub num_children: i32,
}

bitflags! {
    /// Permission bits of an ACL entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Perms: u32 {
        const READ = 1;
        const WRITE = 1 << 1;
        const CREATE = 1 << 2;
        const DELETE = 1 << 3;
        const ADMIN = 1 << 4;
        const ALL = Self::READ.bits()
            | Self::WRITE.bits()
            | Self::CREATE.bits()
            | Self::DELETE.bits()
            | Self::ADMIN.bits();
    }
}

/// One (identity, permissions) grant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Acl {
    pub perms: Perms,
    pub scheme: String,
    pub id: String,
}

impl Acl {
    /// Grant `perms` to everyone.
    pub fn world(perms: Perms) -> Self {
        Self {
            perms,
            scheme: "world".to_string(),
            id: "anyone".to_string(),
        }
    }
}

/// ACL set granting `perms` to everyone.
pub fn world_acl(perms: Perms) -> Vec<Acl> {
    vec![Acl::world(perms)]
}

/// How a node is created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CreateMode {
    #[default]
    Persistent,
    /// Removed when the creating session ends
    Ephemeral,
    /// Name gets a monotonically increasing suffix
    PersistentSequential,
    EphemeralSequential,
}

impl CreateMode {
    /// Map the classic integer create flags (ephemeral = 1, sequence = 2).
    pub fn from_flags(flags: i32) -> Result<Self> {
        match flags {
            0 => Ok(CreateMode::Persistent),
            1 => Ok(CreateMode::Ephemeral),
            2 => Ok(CreateMode::PersistentSequential),
            3 => Ok(CreateMode::EphemeralSequential),
            other => Err(Error::Protocol(format!("unknown create flags {other}"))),
        }
    }

    #[must_use]
    pub fn flags(self) -> i32 {
        match self {
            CreateMode::Persistent => 0,
            CreateMode::Ephemeral => 1,
            CreateMode::PersistentSequential => 2,
            CreateMode::EphemeralSequential => 3,
        }
    }

    #[must_use]
    pub fn is_ephemeral(self) -> bool {
        matches!(self, CreateMode::Ephemeral | CreateMode::EphemeralSequential)
    }

    #[must_use]
    pub fn is_sequential(self) -> bool {
        matches!(
            self,
            CreateMode::PersistentSequential | CreateMode::EphemeralSequential
        )
    }
}
