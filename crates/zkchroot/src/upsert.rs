//! Recursive creation: make a path exist, then land data on it.

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::path;
use crate::types::{ANY_VERSION, CreateMode, Perms, world_acl};

impl Connection {
    /// Creates `path` and every missing ancestor (mkdir -p semantics).
    ///
    /// Nodes are created root to leaf, empty and open to everyone. Nodes that
    /// already exist, including ones another client creates concurrently, are
    /// left alone. A failure partway through leaves a contiguous prefix of
    /// the chain in place, and calling again picks up where it stopped.
    pub async fn ensure_ancestors(&self, path: &str) -> Result<()> {
        path::validate(path)?;
        if path == "/" {
            return Ok(());
        }

        let acl = world_acl(Perms::ALL);
        for dir in path::ancestors(path).into_iter().chain(std::iter::once(path)) {
            match self.create(dir, &[], CreateMode::Persistent, &acl).await {
                Ok(_) => {
                    diagnostics::log_debug!("Created {path}", path: dir);
                }
                Err(Error::NodeExists(_)) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Writes `data` to `path`, creating it and any missing ancestors first.
    ///
    /// The existing-node case costs a single write. Only the leaf is created
    /// with `mode`; ancestors are always persistent.
    pub async fn upsert_with_ancestors(&self, path: &str, mode: CreateMode, data: &[u8]) -> Result<()> {
        path::validate(path)?;
        if path == "/" {
            return Err(Error::RootPath);
        }

        match self.set(path, data, ANY_VERSION).await {
            Ok(_) => return Ok(()),
            Err(Error::NoNode(_)) => {}
            Err(err) => return Err(err),
        }

        self.ensure_ancestors(path::dirname(path)).await?;

        match self.create(path, data, mode, &world_acl(Perms::ALL)).await {
            Ok(_) => Ok(()),
            Err(Error::NodeExists(_)) => {
                diagnostics::log_debug!("Lost create race for {path}, writing instead", path: path);
                _ = self.set(path, data, ANY_VERSION).await?;
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}
