//! In-process coordination store.
//!
//! [`MemoryStore`] holds one shared tree; each [`MemoryStore::connect`] opens
//! a [`MemoryCoordinator`] session on it. Sessions see each other's writes
//! immediately, own their ephemeral nodes, and get one-shot watches, so the
//! facade can be exercised against the same rules a real ensemble enforces:
//! ACL checks, optimistic versions, sequential naming and atomic batches.
//!
//! Tests can make the next call of a given kind fail with
//! [`MemoryCoordinator::inject_fault`], either before anything is applied or
//! after the change has landed (the "reply lost" case).

use crate::coordinator::Coordinator;
use crate::error::{Error, Result};
use crate::multi::{Op, OpResult};
use crate::path;
use crate::types::{Acl, CreateMode, Perms, Stat, world_acl};
use crate::watch::{EventType, WatchedEvent, Watcher};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, oneshot};

/// Kinds of call a fault can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Create,
    Get,
    Set,
    Delete,
    Exists,
    Children,
    GetAcl,
    SetAcl,
    Sync,
    Multi,
}

/// When an injected fault takes effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultTiming {
    /// The call fails without touching the store
    Before,
    /// The call is applied, then the caller sees the error anyway
    After,
}

#[derive(Debug)]
struct Fault {
    kind: OpKind,
    timing: FaultTiming,
    error: Error,
}

#[derive(Debug, Clone)]
struct ZNode {
    data: Vec<u8>,
    acl: Vec<Acl>,
    stat: Stat,
    children: BTreeSet<String>,
}

impl ZNode {
    fn stat(&self) -> Stat {
        let mut stat = self.stat;
        stat.data_length = i32::try_from(self.data.len()).unwrap_or(i32::MAX);
        stat.num_children = i32::try_from(self.children.len()).unwrap_or(i32::MAX);
        stat
    }

    fn allows(&self, perm: Perms) -> bool {
        self.acl
            .iter()
            .any(|a| a.scheme == "world" && a.id == "anyone" && a.perms.contains(perm))
    }
}

/// Change that may fire watches once it is committed
#[derive(Debug)]
enum Trigger {
    Created(String),
    Deleted(String),
    DataChanged(String),
    ChildrenChanged(String),
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: BTreeMap<String, ZNode>,
    zxid: i64,
}

fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}

fn version_matches(expected: i32, actual: i32) -> bool {
    expected == -1 || expected == actual
}

impl Tree {
    fn new() -> Self {
        let root = ZNode {
            data: Vec::new(),
            acl: world_acl(Perms::ALL),
            stat: Stat::default(),
            children: BTreeSet::new(),
        };
        let mut nodes = BTreeMap::new();
        _ = nodes.insert("/".to_string(), root);
        Self { nodes, zxid: 0 }
    }

    fn node(&self, path: &str) -> Result<&ZNode> {
        self.nodes.get(path).ok_or_else(|| Error::no_node(path))
    }

    fn node_mut(&mut self, path: &str) -> Result<&mut ZNode> {
        self.nodes.get_mut(path).ok_or_else(|| Error::no_node(path))
    }

    fn next_zxid(&mut self) -> i64 {
        self.zxid += 1;
        self.zxid
    }

    fn create(
        &mut self,
        path: &str,
        data: &[u8],
        mode: CreateMode,
        acl: &[Acl],
        session: i64,
        triggers: &mut Vec<Trigger>,
    ) -> Result<String> {
        path::validate(path)?;
        if path == "/" {
            return Err(Error::node_exists(path));
        }
        let parent_path = path::dirname(path).to_string();
        let parent = self.node(&parent_path)?;
        if !parent.allows(Perms::CREATE) {
            return Err(Error::no_auth(path));
        }
        let assigned = if mode.is_sequential() {
            format!("{path}{:010}", parent.stat.cversion)
        } else {
            path.to_string()
        };
        if self.nodes.contains_key(&assigned) {
            return Err(Error::node_exists(assigned));
        }
        if parent.stat.ephemeral_owner != 0 {
            return Err(Error::NoChildrenForEphemerals(path.to_string()));
        }
        if acl.is_empty() {
            return Err(Error::InvalidAcl(path.to_string()));
        }

        let zxid = self.next_zxid();
        let now = now_millis();
        let node = ZNode {
            data: data.to_vec(),
            acl: acl.to_vec(),
            stat: Stat {
                czxid: zxid,
                mzxid: zxid,
                pzxid: zxid,
                ctime: now,
                mtime: now,
                ephemeral_owner: if mode.is_ephemeral() { session } else { 0 },
                ..Stat::default()
            },
            children: BTreeSet::new(),
        };
        _ = self.nodes.insert(assigned.clone(), node);

        let parent = self.node_mut(&parent_path)?;
        _ = parent.children.insert(path::basename(&assigned).to_string());
        parent.stat.cversion += 1;
        parent.stat.pzxid = zxid;

        triggers.push(Trigger::Created(assigned.clone()));
        triggers.push(Trigger::ChildrenChanged(parent_path));
        Ok(assigned)
    }

    fn set(&mut self, path: &str, data: &[u8], version: i32, triggers: &mut Vec<Trigger>) -> Result<Stat> {
        path::validate(path)?;
        let zxid = self.zxid + 1;
        let node = self.node_mut(path)?;
        if !node.allows(Perms::WRITE) {
            return Err(Error::no_auth(path));
        }
        if !version_matches(version, node.stat.version) {
            return Err(Error::bad_version(path));
        }
        node.data = data.to_vec();
        node.stat.version += 1;
        node.stat.mzxid = zxid;
        node.stat.mtime = now_millis();
        let stat = node.stat();
        self.zxid = zxid;

        triggers.push(Trigger::DataChanged(path.to_string()));
        Ok(stat)
    }

    fn delete(&mut self, path: &str, version: i32, triggers: &mut Vec<Trigger>) -> Result<()> {
        path::validate(path)?;
        if path == "/" {
            return Err(Error::BadArguments("cannot delete /".to_string()));
        }
        let parent_path = path::dirname(path).to_string();
        let node = self.node(path)?;
        if !self.node(&parent_path)?.allows(Perms::DELETE) {
            return Err(Error::no_auth(path));
        }
        if !version_matches(version, node.stat.version) {
            return Err(Error::bad_version(path));
        }
        if !node.children.is_empty() {
            return Err(Error::not_empty(path));
        }
        self.unlink(path, &parent_path, triggers)
    }

    // Removal without permission or version checks
    fn unlink(&mut self, path: &str, parent_path: &str, triggers: &mut Vec<Trigger>) -> Result<()> {
        let zxid = self.next_zxid();
        _ = self.nodes.remove(path);
        let parent = self.node_mut(parent_path)?;
        _ = parent.children.remove(path::basename(path));
        parent.stat.cversion += 1;
        parent.stat.pzxid = zxid;

        triggers.push(Trigger::Deleted(path.to_string()));
        triggers.push(Trigger::ChildrenChanged(parent_path.to_string()));
        Ok(())
    }

    fn set_acl(&mut self, path: &str, acl: &[Acl], version: i32) -> Result<Stat> {
        path::validate(path)?;
        let node = self.node_mut(path)?;
        if !node.allows(Perms::ADMIN) {
            return Err(Error::no_auth(path));
        }
        if !version_matches(version, node.stat.aversion) {
            return Err(Error::bad_version(path));
        }
        if acl.is_empty() {
            return Err(Error::InvalidAcl(path.to_string()));
        }
        node.acl = acl.to_vec();
        node.stat.aversion += 1;
        let stat = node.stat();
        _ = self.next_zxid();
        Ok(stat)
    }

    fn check(&self, path: &str, version: i32) -> Result<()> {
        path::validate(path)?;
        let node = self.node(path)?;
        if !version_matches(version, node.stat.version) {
            return Err(Error::bad_version(path));
        }
        Ok(())
    }

    fn readable(&self, path: &str) -> Result<&ZNode> {
        path::validate(path)?;
        let node = self.node(path)?;
        if !node.allows(Perms::READ) {
            return Err(Error::no_auth(path));
        }
        Ok(node)
    }

    fn apply(&mut self, op: Op, session: i64, triggers: &mut Vec<Trigger>) -> Result<OpResult> {
        match op {
            Op::Create(req) => {
                let path = self.create(&req.path, &req.data, req.mode, &req.acl, session, triggers)?;
                Ok(OpResult::Create { path })
            }
            Op::SetData(req) => {
                let stat = self.set(&req.path, &req.data, req.version, triggers)?;
                Ok(OpResult::SetData { stat })
            }
            Op::Delete(req) => {
                self.delete(&req.path, req.version, triggers)?;
                Ok(OpResult::Delete)
            }
            Op::Check(req) => {
                self.check(&req.path, req.version)?;
                Ok(OpResult::Check)
            }
        }
    }
}

type Waiters = HashMap<String, Vec<oneshot::Sender<WatchedEvent>>>;

#[derive(Debug, Default)]
struct Watches {
    data: Waiters,
    exist: Waiters,
    child: Waiters,
}

fn notify(waiters: &mut Waiters, path: &str, event_type: EventType) {
    for tx in waiters.remove(path).unwrap_or_default() {
        // The watcher may have been dropped; that is fine
        _ = tx.send(WatchedEvent {
            event_type,
            path: path.to_string(),
        });
    }
}

impl Watches {
    fn register(waiters: &mut Waiters, path: &str) -> Watcher {
        // Registrations whose Watcher was dropped
        waiters.retain(|_, txs| {
            txs.retain(|tx| !tx.is_closed());
            !txs.is_empty()
        });
        let (tx, watcher) = Watcher::channel();
        waiters.entry(path.to_string()).or_default().push(tx);
        watcher
    }

    fn pending(&self) -> usize {
        [&self.data, &self.exist, &self.child]
            .into_iter()
            .flat_map(HashMap::values)
            .flatten()
            .filter(|tx| !tx.is_closed())
            .count()
    }

    fn fire(&mut self, triggers: Vec<Trigger>) {
        for trigger in triggers {
            match trigger {
                Trigger::Created(p) => {
                    notify(&mut self.data, &p, EventType::NodeCreated);
                    notify(&mut self.exist, &p, EventType::NodeCreated);
                }
                Trigger::Deleted(p) => {
                    notify(&mut self.data, &p, EventType::NodeDeleted);
                    notify(&mut self.exist, &p, EventType::NodeDeleted);
                    notify(&mut self.child, &p, EventType::NodeDeleted);
                }
                Trigger::DataChanged(p) => {
                    notify(&mut self.data, &p, EventType::NodeDataChanged);
                    notify(&mut self.exist, &p, EventType::NodeDataChanged);
                }
                Trigger::ChildrenChanged(p) => {
                    notify(&mut self.child, &p, EventType::NodeChildrenChanged);
                }
            }
        }
    }
}

#[derive(Debug)]
struct State {
    tree: Tree,
    watches: Watches,
    next_session: i64,
    closed: HashSet<i64>,
    expired: HashSet<i64>,
}

impl State {
    fn check_session(&self, session: i64) -> Result<()> {
        if self.expired.contains(&session) {
            Err(Error::SessionExpired)
        } else if self.closed.contains(&session) {
            Err(Error::Closed)
        } else {
            Ok(())
        }
    }

    fn drop_ephemerals(&mut self, session: i64) {
        let owned: Vec<String> = self
            .tree
            .nodes
            .iter()
            .filter(|(_, n)| n.stat.ephemeral_owner == session)
            .map(|(p, _)| p.clone())
            .collect();
        let mut triggers = Vec::new();
        for p in owned {
            let parent = path::dirname(&p).to_string();
            // Ephemerals have no children, and their parent is still there
            if self.tree.unlink(&p, &parent, &mut triggers).is_err() {
                diagnostics::log_warn!("Could not remove ephemeral {path}", path: p.as_str());
            }
        }
        self.watches.fire(triggers);
    }
}

/// Shared in-memory tree that sessions connect to.
#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// An empty store containing only `/`.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                tree: Tree::new(),
                watches: Watches::default(),
                next_session: 1,
                closed: HashSet::new(),
                expired: HashSet::new(),
            })),
        }
    }

    /// Open a new session.
    pub async fn connect(&self) -> MemoryCoordinator {
        let mut state = self.state.lock().await;
        let session_id = state.next_session;
        state.next_session += 1;
        diagnostics::log_info!("Opened memory session {session}", session: session_id);
        MemoryCoordinator {
            store: self.clone(),
            session_id,
            faults: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Number of nodes, including `/`.
    pub async fn len(&self) -> usize {
        self.state.lock().await.tree.nodes.len()
    }

    /// True when only `/` exists.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 1
    }

    /// Every node path in lexical order.
    pub async fn paths(&self) -> Vec<String> {
        self.state.lock().await.tree.nodes.keys().cloned().collect()
    }

    /// Watch registrations whose [`Watcher`] is still held.
    pub async fn pending_watches(&self) -> usize {
        self.state.lock().await.watches.pending()
    }
}

/// One session on a [`MemoryStore`].
#[derive(Clone)]
pub struct MemoryCoordinator {
    store: MemoryStore,
    session_id: i64,
    faults: Arc<Mutex<VecDeque<Fault>>>,
}

impl MemoryCoordinator {
    #[must_use]
    pub fn session_id(&self) -> i64 {
        self.session_id
    }

    #[must_use]
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Make the next `kind` call fail with `error`. Faults queue up in order.
    pub async fn inject_fault(&self, kind: OpKind, timing: FaultTiming, error: Error) {
        self.faults.lock().await.push_back(Fault { kind, timing, error });
    }

    /// End the session: its ephemeral nodes go away and later calls fail
    /// with [`Error::Closed`].
    pub async fn close(&self) {
        self.end(false).await;
    }

    /// Like [`MemoryCoordinator::close`], but later calls fail with
    /// [`Error::SessionExpired`].
    pub async fn expire(&self) {
        self.end(true).await;
    }

    async fn end(&self, expired: bool) {
        let mut state = self.store.state.lock().await;
        if state.check_session(self.session_id).is_err() {
            return;
        }
        state.drop_ephemerals(self.session_id);
        if expired {
            _ = state.expired.insert(self.session_id);
        } else {
            _ = state.closed.insert(self.session_id);
        }
        diagnostics::log_info!(
            "Ended memory session {session}, expired: {expired}",
            session: self.session_id,
            expired: expired
        );
    }

    async fn take_fault(&self, kind: OpKind) -> Option<(FaultTiming, Error)> {
        let mut faults = self.faults.lock().await;
        let index = faults.iter().position(|f| f.kind == kind)?;
        faults.remove(index).map(|f| (f.timing, f.error))
    }

    /// Run `f` against the shared state with session and fault handling.
    async fn run<T, F>(&self, kind: OpKind, f: F) -> Result<T>
    where
        F: FnOnce(&mut State, i64) -> Result<T> + Send,
        T: Send,
    {
        let fault = self.take_fault(kind).await;
        if let Some((FaultTiming::Before, error)) = fault {
            return Err(error);
        }

        let out = {
            let mut state = self.store.state.lock().await;
            state.check_session(self.session_id)?;
            f(&mut *state, self.session_id)
        };

        match fault {
            Some((_, error)) => out.and(Err(error)),
            None => out,
        }
    }
}

#[async_trait]
impl Coordinator for MemoryCoordinator {
    async fn create(&self, path: &str, data: &[u8], mode: CreateMode, acl: &[Acl]) -> Result<String> {
        self.run(OpKind::Create, |state, session| {
            let mut triggers = Vec::new();
            let assigned = state.tree.create(path, data, mode, acl, session, &mut triggers)?;
            state.watches.fire(triggers);
            Ok(assigned)
        })
        .await
    }

    async fn get(&self, path: &str) -> Result<(Vec<u8>, Stat)> {
        self.run(OpKind::Get, |state, _| {
            let node = state.tree.readable(path)?;
            Ok((node.data.clone(), node.stat()))
        })
        .await
    }

    async fn get_w(&self, path: &str) -> Result<(Vec<u8>, Stat, Watcher)> {
        self.run(OpKind::Get, |state, _| {
            let node = state.tree.readable(path)?;
            let (data, stat) = (node.data.clone(), node.stat());
            let watcher = Watches::register(&mut state.watches.data, path);
            Ok((data, stat, watcher))
        })
        .await
    }

    async fn set(&self, path: &str, data: &[u8], version: i32) -> Result<Stat> {
        self.run(OpKind::Set, |state, _| {
            let mut triggers = Vec::new();
            let stat = state.tree.set(path, data, version, &mut triggers)?;
            state.watches.fire(triggers);
            Ok(stat)
        })
        .await
    }

    async fn delete(&self, path: &str, version: i32) -> Result<()> {
        self.run(OpKind::Delete, |state, _| {
            let mut triggers = Vec::new();
            state.tree.delete(path, version, &mut triggers)?;
            state.watches.fire(triggers);
            Ok(())
        })
        .await
    }

    async fn exists(&self, path: &str) -> Result<Option<Stat>> {
        self.run(OpKind::Exists, |state, _| {
            path::validate(path)?;
            Ok(state.tree.nodes.get(path).map(ZNode::stat))
        })
        .await
    }

    async fn exists_w(&self, path: &str) -> Result<(Option<Stat>, Watcher)> {
        self.run(OpKind::Exists, |state, _| {
            path::validate(path)?;
            let stat = state.tree.nodes.get(path).map(ZNode::stat);
            let watcher = if stat.is_some() {
                Watches::register(&mut state.watches.data, path)
            } else {
                Watches::register(&mut state.watches.exist, path)
            };
            Ok((stat, watcher))
        })
        .await
    }

    async fn children(&self, path: &str) -> Result<(Vec<String>, Stat)> {
        self.run(OpKind::Children, |state, _| {
            let node = state.tree.readable(path)?;
            Ok((node.children.iter().cloned().collect(), node.stat()))
        })
        .await
    }

    async fn children_w(&self, path: &str) -> Result<(Vec<String>, Stat, Watcher)> {
        self.run(OpKind::Children, |state, _| {
            let node = state.tree.readable(path)?;
            let (names, stat) = (node.children.iter().cloned().collect(), node.stat());
            let watcher = Watches::register(&mut state.watches.child, path);
            Ok((names, stat, watcher))
        })
        .await
    }

    async fn get_acl(&self, path: &str) -> Result<(Vec<Acl>, Stat)> {
        self.run(OpKind::GetAcl, |state, _| {
            path::validate(path)?;
            let node = state.tree.node(path)?;
            Ok((node.acl.clone(), node.stat()))
        })
        .await
    }

    async fn set_acl(&self, path: &str, acl: &[Acl], version: i32) -> Result<Stat> {
        self.run(OpKind::SetAcl, |state, _| state.tree.set_acl(path, acl, version))
            .await
    }

    async fn sync(&self, path: &str) -> Result<String> {
        self.run(OpKind::Sync, |_, _| {
            path::validate(path)?;
            Ok(path.to_string())
        })
        .await
    }

    async fn multi(&self, ops: Vec<Op>) -> Result<Vec<OpResult>> {
        self.run(OpKind::Multi, |state, session| {
            let mut scratch = state.tree.clone();
            let mut triggers = Vec::new();
            let mut results = Vec::with_capacity(ops.len());
            for (index, op) in ops.into_iter().enumerate() {
                match scratch.apply(op, session, &mut triggers) {
                    Ok(result) => results.push(result),
                    Err(err) => {
                        diagnostics::log_debug!(
                            "Batch rejected at op {index}: {err}",
                            index: index,
                            err: err.to_string().as_str()
                        );
                        return Err(err);
                    }
                }
            }
            state.tree = scratch;
            state.watches.fire(triggers);
            Ok(results)
        })
        .await
    }
}
