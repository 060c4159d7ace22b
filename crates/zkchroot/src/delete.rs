//! Recursive subtree deletion.
//!
//! A node with children is first locked down so that clients honouring ACLs
//! can no longer add children (or write data) under it, then emptied
//! depth-first, then deleted. The lockdown is not undone if the walk fails
//! partway; running the delete again, with the same version, finishes the
//! job.

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::path;
use crate::types::{ANY_VERSION, Perms, world_acl};
use std::future::Future;
use std::pin::Pin;

/// Permissions left on a node while its children are being removed
pub const LOCKDOWN_PERMS: Perms = Perms::ADMIN.union(Perms::DELETE).union(Perms::READ);

impl Connection {
    /// Delete `path` and everything below it.
    ///
    /// `version` applies to `path` itself, both to the ACL lockdown and to the
    /// final delete; descendants are removed whatever their version. A
    /// version conflict is returned before anything is removed. Descendants
    /// that vanish concurrently are skipped.
    pub async fn delete_recursive(&self, path: &str, version: i32) -> Result<()> {
        path::validate(path)?;
        if path == "/" {
            return Err(Error::RootPath);
        }
        let outcome = self.delete_tree(path.to_string(), version).await;
        if let Err(err) = &outcome {
            if self.is_locked_down(path).await {
                diagnostics::log_warn!(
                    "Recursive delete of {path} failed, subtree left locked down: {err}",
                    path: path,
                    err: err.to_string().as_str()
                );
            }
        }
        outcome
    }

    async fn is_locked_down(&self, path: &str) -> bool {
        matches!(self.get_acl(path).await, Ok((acl, _)) if acl == world_acl(LOCKDOWN_PERMS))
    }

    fn delete_tree(&self, path: String, version: i32) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            match self.delete(&path, version).await {
                Err(Error::NotEmpty(_)) => {}
                other => return other,
            }

            // A lockdown left by an earlier attempt already bumped the ACL
            // version, so it is not applied twice
            let lockdown = world_acl(LOCKDOWN_PERMS);
            let (acl, _) = self.get_acl(&path).await?;
            if acl == lockdown {
                diagnostics::log_debug!("{path} is already locked down", path: path.as_str());
            } else {
                diagnostics::log_debug!("Locking down {path} before emptying it", path: path.as_str());
                _ = self.set_acl(&path, &lockdown, version).await?;
            }

            self.delete_children(&path).await?;
            self.delete(&path, version).await
        })
    }

    async fn delete_children(&self, path: &str) -> Result<()> {
        let (names, _) = self.children(path).await?;
        for name in names {
            let child = path::join(path, &name);
            match self.delete_tree(child.clone(), ANY_VERSION).await {
                Ok(()) => {}
                Err(Error::NoNode(_)) => {
                    diagnostics::log_debug!("{path} already gone", path: child.as_str());
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }
}
