#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use zkchroot::{
    Acl, Connection, Coordinator, CreateMode, MemoryCoordinator, MemoryStore, Op, OpResult, Perms,
    Result, Stat, Watcher, world_acl,
};

/// Build a tree of empty nodes (ancestors included) on a fresh connection
pub async fn seeded(store: &MemoryStore, paths: &[&str]) -> anyhow::Result<Connection> {
    let conn = Connection::new(store.connect().await);
    for path in paths {
        conn.ensure_ancestors(path).await?;
    }
    Ok(conn)
}

/// What an [`Interceptor`] does besides forwarding
pub enum Behavior {
    /// When `target`'s children are listed, a second session tries to add
    /// a child named `name` under it first
    IntrudeOnList { target: String, name: String },
    /// When `target`'s children are listed, a second session removes the
    /// first child right after the listing
    RemoveOnList { target: String },
    /// Drop the last result of every batch
    TruncateBatch,
}

/// Coordinator that forwards to a memory session and injects one kind of
/// interference from a second session.
pub struct Interceptor {
    inner: MemoryCoordinator,
    rival: MemoryCoordinator,
    behavior: Behavior,
    /// What the rival's interference returned, in order
    pub observed: Arc<Mutex<Vec<Result<()>>>>,
}

impl Interceptor {
    pub async fn new(store: &MemoryStore, behavior: Behavior) -> Self {
        Self {
            inner: store.connect().await,
            rival: store.connect().await,
            behavior,
            observed: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn record(&self, outcome: Result<()>) {
        if let Ok(mut observed) = self.observed.lock() {
            observed.push(outcome);
        }
    }
}

#[async_trait]
impl Coordinator for Interceptor {
    async fn create(&self, path: &str, data: &[u8], mode: CreateMode, acl: &[Acl]) -> Result<String> {
        self.inner.create(path, data, mode, acl).await
    }

    async fn get(&self, path: &str) -> Result<(Vec<u8>, Stat)> {
        self.inner.get(path).await
    }

    async fn get_w(&self, path: &str) -> Result<(Vec<u8>, Stat, Watcher)> {
        self.inner.get_w(path).await
    }

    async fn set(&self, path: &str, data: &[u8], version: i32) -> Result<Stat> {
        self.inner.set(path, data, version).await
    }

    async fn delete(&self, path: &str, version: i32) -> Result<()> {
        self.inner.delete(path, version).await
    }

    async fn exists(&self, path: &str) -> Result<Option<Stat>> {
        self.inner.exists(path).await
    }

    async fn exists_w(&self, path: &str) -> Result<(Option<Stat>, Watcher)> {
        self.inner.exists_w(path).await
    }

    async fn children(&self, path: &str) -> Result<(Vec<String>, Stat)> {
        match &self.behavior {
            Behavior::IntrudeOnList { target, name } if target == path => {
                let intruder = format!("{path}/{name}");
                let outcome = self
                    .rival
                    .create(&intruder, b"", CreateMode::Persistent, &world_acl(Perms::ALL))
                    .await
                    .map(|_| ());
                self.record(outcome);
                self.inner.children(path).await
            }
            Behavior::RemoveOnList { target } if target == path => {
                let listed = self.inner.children(path).await?;
                if let Some(first) = listed.0.first() {
                    let outcome = self.rival.delete(&format!("{path}/{first}"), -1).await;
                    self.record(outcome);
                }
                Ok(listed)
            }
            _ => self.inner.children(path).await,
        }
    }

    async fn children_w(&self, path: &str) -> Result<(Vec<String>, Stat, Watcher)> {
        self.inner.children_w(path).await
    }

    async fn get_acl(&self, path: &str) -> Result<(Vec<Acl>, Stat)> {
        self.inner.get_acl(path).await
    }

    async fn set_acl(&self, path: &str, acl: &[Acl], version: i32) -> Result<Stat> {
        self.inner.set_acl(path, acl, version).await
    }

    async fn sync(&self, path: &str) -> Result<String> {
        self.inner.sync(path).await
    }

    async fn multi(&self, ops: Vec<Op>) -> Result<Vec<OpResult>> {
        let mut results = self.inner.multi(ops).await?;
        if let Behavior::TruncateBatch = self.behavior {
            _ = results.pop();
        }
        Ok(results)
    }
}
