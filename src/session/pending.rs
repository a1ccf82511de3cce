//! Table of in-flight remote operations.

use std::collections::HashMap;

use tokio::sync::oneshot;

use crate::error::{OsfError, Result};
use crate::events::OperationKind;
use crate::fs::node::NodeRecord;

/// What a finished operation hands to its waiters.
#[derive(Debug, Clone)]
pub(crate) enum Outcome {
    /// Children of the listed node after reconciliation.
    Children(Vec<NodeRecord>),
    /// Record created by the server.
    Record(NodeRecord),
    Done,
}

impl Outcome {
    pub(crate) fn children(&self) -> Result<Vec<NodeRecord>> {
        match self {
            Outcome::Children(children) => Ok(children.clone()),
            other => Err(OsfError::Custom(format!("expected children, got {other:?}"))),
        }
    }

    pub(crate) fn record(&self) -> Result<NodeRecord> {
        match self {
            Outcome::Record(record) => Ok(record.clone()),
            other => Err(OsfError::Custom(format!("expected a record, got {other:?}"))),
        }
    }
}

pub(crate) type Waiter = Box<dyn FnOnce(&Result<Outcome>) + Send>;

/// Build a waiter answering a command reply.
pub(crate) fn reply_waiter<T: Send + 'static>(
    reply: oneshot::Sender<Result<T>>,
    extract: impl FnOnce(&Outcome) -> Result<T> + Send + 'static,
) -> Waiter {
    Box::new(move |result| {
        let answer = match result {
            Ok(outcome) => extract(outcome),
            Err(e) => Err(e.replicate()),
        };
        let _ = reply.send(answer);
    })
}

/// Identity of an operation: two requests with equal keys are the same work.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct OpKey {
    pub kind: OperationKind,
    pub target: String,
    /// Operation argument (folder name, local path, listing generation)
    pub detail: String,
}

impl OpKey {
    pub(crate) fn new(kind: OperationKind, target: &str, detail: impl Into<String>) -> Self {
        Self {
            kind,
            target: target.to_string(),
            detail: detail.into(),
        }
    }
}

pub(crate) struct PendingOperation {
    waiters: Vec<Waiter>,
    /// Run the operation again once it completes (listings only)
    pub rerun: bool,
}

impl PendingOperation {
    pub(crate) fn resolve(self, result: &Result<Outcome>) {
        for waiter in self.waiters {
            waiter(result);
        }
    }

    pub(crate) fn into_waiters(self) -> Vec<Waiter> {
        self.waiters
    }
}

#[derive(Default)]
pub(crate) struct PendingTable {
    ops: HashMap<OpKey, PendingOperation>,
}

impl PendingTable {
    /// Register interest in `key`.
    ///
    /// Returns `true` when the operation is new and the caller must start it,
    /// `false` when the waiter joined an operation already in flight.
    pub(crate) fn register(&mut self, key: OpKey, waiters: Vec<Waiter>) -> bool {
        match self.ops.get_mut(&key) {
            Some(op) => {
                tracing::debug!(kind = %key.kind, node = %key.target, "joining in-flight operation");
                op.waiters.extend(waiters);
                false
            }
            None => {
                self.ops.insert(
                    key,
                    PendingOperation {
                        waiters,
                        rerun: false,
                    },
                );
                true
            }
        }
    }

    /// Ask for an in-flight operation to be repeated when it completes.
    pub(crate) fn request_rerun(&mut self, key: &OpKey, waiters: Vec<Waiter>) -> bool {
        match self.ops.get_mut(key) {
            Some(op) => {
                op.rerun = true;
                op.waiters.extend(waiters);
                true
            }
            None => false,
        }
    }

    pub(crate) fn finish(&mut self, key: &OpKey) -> Option<PendingOperation> {
        self.ops.remove(key)
    }

    pub(crate) fn contains(&self, key: &OpKey) -> bool {
        self.ops.contains_key(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.ops.len()
    }
}
