use crate::chroot::Chroot;
use crate::config::ConnectOptions;
use crate::coordinator::Coordinator;
use crate::error::{Error, Result};
use crate::path;
use crate::types::{Acl, CreateMode, Stat};
use crate::watch::Watcher;
use std::sync::Arc;

/// Name prefix of nodes made by [`Connection::create_protected_ephemeral_sequential`]
pub const PROTECTED_PREFIX: &str = "_c_";

const PROTECTED_CREATE_ATTEMPTS: usize = 3;

/// Chroot-scoped view over a coordination-store session.
///
/// Every path a caller passes in is logical and gets the chroot prefix put in
/// front before it reaches the store; paths the store hands back (assigned
/// names, sync results, watch events) are translated back. Clones share the
/// session, each with its own chroot.
#[derive(Clone)]
pub struct Connection {
    coordinator: Arc<dyn Coordinator>,
    chroot: Chroot,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("chroot", &self.chroot)
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Wrap a session with no chroot.
    pub fn new<C: Coordinator + 'static>(coordinator: C) -> Self {
        Self::from_arc(Arc::new(coordinator))
    }

    pub fn from_arc(coordinator: Arc<dyn Coordinator>) -> Self {
        Self {
            coordinator,
            chroot: Chroot::none(),
        }
    }

    /// Wrap a session and apply the chroot named in `options`, if any.
    pub async fn open<C: Coordinator + 'static>(options: &ConnectOptions, coordinator: C) -> Result<Self> {
        options.validate()?;
        let mut conn = Self::new(coordinator);
        if let Some(prefix) = &options.chroot {
            conn.set_chroot(prefix).await?;
        }
        Ok(conn)
    }

    /// The raw session, addressed with physical paths.
    #[must_use]
    pub fn coordinator(&self) -> &Arc<dyn Coordinator> {
        &self.coordinator
    }

    #[must_use]
    pub fn chroot(&self) -> &Chroot {
        &self.chroot
    }

    /// Confine this connection to the subtree at `prefix`.
    ///
    /// `prefix` is a physical path. A trailing slash is ignored and an empty
    /// prefix (or `/`) removes the chroot. The node must already exist; on
    /// any failure the current chroot is kept.
    pub async fn set_chroot(&mut self, prefix: &str) -> Result<()> {
        let chroot = self.checked_chroot(prefix).await?;
        diagnostics::log_info!(
            "Chroot changed from {old} to {new}",
            old: self.chroot.to_string().as_str(),
            new: chroot.to_string().as_str()
        );
        self.chroot = chroot;
        Ok(())
    }

    /// A new view on the same session confined to `prefix` (a physical path,
    /// as for [`Connection::set_chroot`]). `self` is left as it was.
    pub async fn with_chroot(&self, prefix: &str) -> Result<Connection> {
        let chroot = self.checked_chroot(prefix).await?;
        Ok(Connection {
            coordinator: self.coordinator.clone(),
            chroot,
        })
    }

    /// A new view confined to `sub`, given relative to the current chroot.
    pub async fn scope(&self, sub: &str) -> Result<Connection> {
        self.with_chroot(&self.chroot.nested(sub).to_string()).await
    }

    async fn checked_chroot(&self, prefix: &str) -> Result<Chroot> {
        let chroot = Chroot::new(prefix);
        if !chroot.is_set() {
            return Ok(chroot);
        }
        let found = self
            .coordinator
            .exists(chroot.prefix())
            .await
            .map_err(|err| Error::chroot(chroot.prefix(), err))?;
        match found {
            Some(_) => Ok(chroot),
            None => Err(Error::ChrootNotFound(chroot.prefix().to_string())),
        }
    }

    #[must_use]
    pub fn to_physical(&self, path: &str) -> String {
        self.chroot.to_physical(path)
    }

    #[must_use]
    pub fn to_logical(&self, path: &str) -> String {
        self.chroot.to_logical(path)
    }

    pub fn try_to_logical(&self, path: &str) -> Result<String> {
        self.chroot.try_to_logical(path)
    }

    /// Create a node and return its logical path (which carries the assigned
    /// suffix for sequential modes).
    pub async fn create(&self, path: &str, data: &[u8], mode: CreateMode, acl: &[Acl]) -> Result<String> {
        let assigned = self
            .coordinator
            .create(&self.to_physical(path), data, mode, acl)
            .await?;
        Ok(self.to_logical(&assigned))
    }

    pub async fn get(&self, path: &str) -> Result<(Vec<u8>, Stat)> {
        self.coordinator.get(&self.to_physical(path)).await
    }

    pub async fn get_w(&self, path: &str) -> Result<(Vec<u8>, Stat, Watcher)> {
        let (data, stat, watcher) = self.coordinator.get_w(&self.to_physical(path)).await?;
        Ok((data, stat, watcher.scoped(&self.chroot)))
    }

    pub async fn set(&self, path: &str, data: &[u8], version: i32) -> Result<Stat> {
        self.coordinator.set(&self.to_physical(path), data, version).await
    }

    pub async fn delete(&self, path: &str, version: i32) -> Result<()> {
        self.coordinator.delete(&self.to_physical(path), version).await
    }

    pub async fn exists(&self, path: &str) -> Result<Option<Stat>> {
        self.coordinator.exists(&self.to_physical(path)).await
    }

    pub async fn exists_w(&self, path: &str) -> Result<(Option<Stat>, Watcher)> {
        let (stat, watcher) = self.coordinator.exists_w(&self.to_physical(path)).await?;
        Ok((stat, watcher.scoped(&self.chroot)))
    }

    /// Child names are relative and come back untranslated.
    pub async fn children(&self, path: &str) -> Result<(Vec<String>, Stat)> {
        self.coordinator.children(&self.to_physical(path)).await
    }

    pub async fn children_w(&self, path: &str) -> Result<(Vec<String>, Stat, Watcher)> {
        let (names, stat, watcher) = self.coordinator.children_w(&self.to_physical(path)).await?;
        Ok((names, stat, watcher.scoped(&self.chroot)))
    }

    pub async fn get_acl(&self, path: &str) -> Result<(Vec<Acl>, Stat)> {
        self.coordinator.get_acl(&self.to_physical(path)).await
    }

    pub async fn set_acl(&self, path: &str, acl: &[Acl], version: i32) -> Result<Stat> {
        self.coordinator.set_acl(&self.to_physical(path), acl, version).await
    }

    pub async fn sync(&self, path: &str) -> Result<String> {
        let synced = self.coordinator.sync(&self.to_physical(path)).await?;
        Ok(self.to_logical(&synced))
    }

    /// Create an ephemeral sequential node that survives a lost reply.
    ///
    /// The node name is prefixed with `_c_<uuid>-` so that after a
    /// [`Error::ConnectionLoss`] the parent can be searched for a node this
    /// call already created. Gives up after a few lost replies in a row.
    pub async fn create_protected_ephemeral_sequential(
        &self,
        path: &str,
        data: &[u8],
        acl: &[Acl],
    ) -> Result<String> {
        path::validate(path)?;
        if path == "/" {
            return Err(Error::RootPath);
        }
        let parent = path::dirname(path);
        let guid = uuid7::uuid7().to_string();
        let protected = format!("{PROTECTED_PREFIX}{guid}-");
        let full = path::join(parent, &format!("{protected}{}", path::basename(path)));

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.create(&full, data, CreateMode::EphemeralSequential, acl).await {
                Ok(assigned) => return Ok(assigned),
                Err(Error::ConnectionLoss) if attempt < PROTECTED_CREATE_ATTEMPTS => {
                    diagnostics::log_debug!(
                        "Lost reply creating {path}, attempt {attempt}",
                        path: full.as_str(),
                        attempt: attempt
                    );
                    // The listing can hit the same fault; that counts as a failed attempt
                    let Ok((names, _)) = self.children(parent).await else {
                        continue;
                    };
                    if let Some(name) = names.iter().find(|n| n.starts_with(&protected)) {
                        return Ok(path::join(parent, name));
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }
}
