use crate::error::Result;
use crate::multi::{Op, OpResult};
use crate::types::{Acl, CreateMode, Stat};
use crate::watch::Watcher;
use async_trait::async_trait;

/// Raw coordination-store session, addressed with physical paths.
///
/// This is the whole surface the facade consumes. A call completes when the
/// store has replied or the session has failed; timeouts and reconnection are
/// the implementation's business. Errors come back in the store's own
/// taxonomy and are passed to callers unchanged.
#[async_trait]
pub trait Coordinator: Send + Sync {
    /// Create a node, returning the path actually assigned (which differs
    /// from `path` for sequential modes).
    async fn create(&self, path: &str, data: &[u8], mode: CreateMode, acl: &[Acl])
    -> Result<String>;

    async fn get(&self, path: &str) -> Result<(Vec<u8>, Stat)>;

    async fn get_w(&self, path: &str) -> Result<(Vec<u8>, Stat, Watcher)>;

    /// Replace a node's data if its version matches (`-1` matches any).
    async fn set(&self, path: &str, data: &[u8], version: i32) -> Result<Stat>;

    /// Delete a childless node if its version matches (`-1` matches any).
    async fn delete(&self, path: &str, version: i32) -> Result<()>;

    async fn exists(&self, path: &str) -> Result<Option<Stat>>;

    /// Like `exists`, but leaves a watch that fires on creation, deletion or
    /// data change.
    async fn exists_w(&self, path: &str) -> Result<(Option<Stat>, Watcher)>;

    /// Names (not paths) of a node's children.
    async fn children(&self, path: &str) -> Result<(Vec<String>, Stat)>;

    async fn children_w(&self, path: &str) -> Result<(Vec<String>, Stat, Watcher)>;

    async fn get_acl(&self, path: &str) -> Result<(Vec<Acl>, Stat)>;

    /// Replace a node's ACL if its ACL version matches (`-1` matches any).
    async fn set_acl(&self, path: &str, acl: &[Acl], version: i32) -> Result<Stat>;

    async fn sync(&self, path: &str) -> Result<String>;

    /// Apply every op or none of them, in order. On success there is exactly
    /// one result per op.
    async fn multi(&self, ops: Vec<Op>) -> Result<Vec<OpResult>>;
}
