//! Logical <-> physical path translation.
//!
//! A [`Chroot`] is an immutable prefix. Logical paths are what callers use;
//! physical paths are what the store sees. With no prefix both directions are
//! the identity.
//!
//! ```text
//!   prefix "/svc"      logical "/cfg/a"   <->   physical "/svc/cfg/a"
//!                      logical "/"        <->   physical "/svc"
//! ```
//!
//! No normalization happens here: a well-formed logical path yields a
//! well-formed physical path and nothing else is promised.

use crate::error::{Error, Result};
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Chroot {
    // Never ends with '/', empty means no chroot
    prefix: String,
}

impl Chroot {
    /// No chroot: translation is the identity.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Builds a prefix, trimming a trailing slash. `""` and `"/"` both mean
    /// no chroot. Existence in the store is not checked here.
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    /// The prefix, empty when unset.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        !self.prefix.is_empty()
    }

    /// Logical to physical.
    pub fn to_physical(&self, path: &str) -> String {
        if !self.is_set() {
            return path.to_string();
        }
        if path == "/" {
            // "/svc/" would be rejected by the store
            return self.prefix.clone();
        }
        format!("{}{}", self.prefix, path)
    }

    /// Physical to logical.
    ///
    /// Paths that do not lie under the prefix are returned unchanged; use
    /// [`Chroot::try_to_logical`] to reject them instead.
    pub fn to_logical(&self, path: &str) -> String {
        self.strip(path).unwrap_or(path).to_string()
    }

    /// Physical to logical, failing with [`Error::OutsideChroot`] when `path`
    /// does not lie under the prefix.
    pub fn try_to_logical(&self, path: &str) -> Result<String> {
        self.strip(path)
            .map(str::to_string)
            .ok_or_else(|| Error::outside_chroot(path, &self.prefix))
    }

    /// Prefix of a nested chroot `sub`, given relative to this one.
    #[must_use]
    pub fn nested(&self, sub: &str) -> Chroot {
        Chroot::new(&self.to_physical(sub))
    }

    fn strip<'a>(&self, path: &'a str) -> Option<&'a str> {
        if !self.is_set() {
            return Some(path);
        }
        let rest = path.strip_prefix(self.prefix.as_str())?;
        if rest.is_empty() {
            Some("/")
        } else if rest.starts_with('/') {
            Some(rest)
        } else {
            // "/svcx" shares characters with "/svc" but is not under it
            None
        }
    }
}

impl fmt::Display for Chroot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_set() {
            write!(f, "{}", self.prefix)
        } else {
            write!(f, "/")
        }
    }
}
