//! Atomic multi-operation batches.
//!
//! Ops carry logical paths when built by callers. [`Connection::submit_transaction`]
//! rewrites them to physical form, hands the batch to the backend's raw
//! `multi`, and rewrites the paths reported back by creates.

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::types::{Acl, CreateMode, Stat};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRequest {
    pub path: String,
    pub data: Vec<u8>,
    pub acl: Vec<Acl>,
    pub mode: CreateMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetDataRequest {
    pub path: String,
    pub data: Vec<u8>,
    pub version: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRequest {
    pub path: String,
    pub version: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckVersionRequest {
    pub path: String,
    pub version: i32,
}

/// One step of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Create(CreateRequest),
    SetData(SetDataRequest),
    Delete(DeleteRequest),
    Check(CheckVersionRequest),
}

impl Op {
    pub fn create<P: Into<String>>(path: P, data: &[u8], mode: CreateMode, acl: Vec<Acl>) -> Self {
        Op::Create(CreateRequest {
            path: path.into(),
            data: data.to_vec(),
            acl,
            mode,
        })
    }

    pub fn set_data<P: Into<String>>(path: P, data: &[u8], version: i32) -> Self {
        Op::SetData(SetDataRequest {
            path: path.into(),
            data: data.to_vec(),
            version,
        })
    }

    pub fn delete<P: Into<String>>(path: P, version: i32) -> Self {
        Op::Delete(DeleteRequest {
            path: path.into(),
            version,
        })
    }

    pub fn check<P: Into<String>>(path: P, version: i32) -> Self {
        Op::Check(CheckVersionRequest {
            path: path.into(),
            version,
        })
    }

    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Op::Create(req) => &req.path,
            Op::SetData(req) => &req.path,
            Op::Delete(req) => &req.path,
            Op::Check(req) => &req.path,
        }
    }

    pub fn path_mut(&mut self) -> &mut String {
        match self {
            Op::Create(req) => &mut req.path,
            Op::SetData(req) => &mut req.path,
            Op::Delete(req) => &mut req.path,
            Op::Check(req) => &mut req.path,
        }
    }
}

/// Outcome of one op in a committed batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpResult {
    /// Path assigned to the created node
    Create { path: String },
    SetData { stat: Stat },
    Delete,
    Check,
}

impl Connection {
    /// Commit `ops` as one all-or-nothing transaction.
    ///
    /// Results come back in submission order, one per op. Create results
    /// report logical paths, so sequential names are visible relative to the
    /// chroot.
    pub async fn submit_transaction(&self, mut ops: Vec<Op>) -> Result<Vec<OpResult>> {
        let chroot = self.chroot();
        for op in &mut ops {
            let physical = chroot.to_physical(op.path());
            *op.path_mut() = physical;
        }

        let submitted = ops.len();
        let scope = chroot.to_string();
        diagnostics::log_debug!(
            "Submitting {count} op batch under {scope}",
            count: submitted,
            scope: scope.as_str()
        );

        // The raw backend primitive, never this method again
        let mut results = self.coordinator().multi(ops).await?;
        if results.len() != submitted {
            return Err(Error::Protocol(format!(
                "transaction returned {} results for {} ops",
                results.len(),
                submitted
            )));
        }

        for result in &mut results {
            if let OpResult::Create { path } = result {
                *path = chroot.to_logical(path.as_str());
            }
        }
        Ok(results)
    }

    /// Start collecting ops for [`Connection::submit_transaction`].
    #[must_use]
    pub fn transaction(&self) -> Transaction<'_> {
        Transaction {
            conn: self,
            ops: Vec::new(),
        }
    }
}

/// Builder for a batch bound to one connection.
///
/// Nothing reaches the store until [`Transaction::commit`]; dropping the
/// builder discards the collected ops.
#[must_use = "a transaction does nothing until committed"]
pub struct Transaction<'a> {
    conn: &'a Connection,
    ops: Vec<Op>,
}

impl<'a> Transaction<'a> {
    pub fn create<P: Into<String>>(mut self, path: P, data: &[u8], mode: CreateMode, acl: Vec<Acl>) -> Self {
        self.ops.push(Op::create(path, data, mode, acl));
        self
    }

    pub fn set_data<P: Into<String>>(mut self, path: P, data: &[u8], version: i32) -> Self {
        self.ops.push(Op::set_data(path, data, version));
        self
    }

    pub fn delete<P: Into<String>>(mut self, path: P, version: i32) -> Self {
        self.ops.push(Op::delete(path, version));
        self
    }

    pub fn check<P: Into<String>>(mut self, path: P, version: i32) -> Self {
        self.ops.push(Op::check(path, version));
        self
    }

    /// Ops collected so far.
    #[must_use]
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub async fn commit(self) -> Result<Vec<OpResult>> {
        self.conn.submit_transaction(self.ops).await
    }
}
