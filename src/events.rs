//! Change notifications published to UI subscribers.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::api::types::UserInfo;
use crate::fs::node::NodeRecord;
use crate::fs::reconcile::TreeEdit;
use crate::progress::TransferProgress;

/// Kind of a remote operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    List,
    Create,
    Upload,
    Download,
    Delete,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OperationKind::List => "list",
            OperationKind::Create => "create",
            OperationKind::Upload => "upload",
            OperationKind::Download => "download",
            OperationKind::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Something that changed in the tree or the login state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TreeEvent {
    /// A child appeared under `parent` at `index`.
    Inserted {
        parent: String,
        index: usize,
        record: NodeRecord,
    },
    /// A child of `parent` went away together with its subtree.
    Removed { parent: String, id: String },
    /// A child kept its identity but moved or changed attributes.
    Updated {
        parent: String,
        index: usize,
        previous_index: usize,
        record: NodeRecord,
    },
    OperationFailed {
        kind: OperationKind,
        target: String,
        message: String,
    },
    Progress(TransferProgress),
    LoggedIn { user: UserInfo },
    LoggedOut,
}

impl TreeEvent {
    pub(crate) fn from_edit(parent: &str, edit: TreeEdit) -> Self {
        let parent = parent.to_string();
        match edit {
            TreeEdit::Remove { id } => TreeEvent::Removed { parent, id },
            TreeEdit::Insert { index, record } => TreeEvent::Inserted {
                parent,
                index,
                record,
            },
            TreeEdit::Update {
                index,
                previous_index,
                record,
            } => TreeEvent::Updated {
                parent,
                index,
                previous_index,
                record,
            },
        }
    }
}

/// Fan-out of [`TreeEvent`]s to any number of subscribers.
///
/// Publishing never blocks; a subscriber that falls more than `capacity`
/// events behind sees `RecvError::Lagged` and should re-query the tree.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<TreeEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TreeEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: TreeEvent) {
        tracing::trace!(?event, "publish");
        // No subscribers is fine.
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::node::NodeKind;

    #[test]
    fn test_edit_conversion() {
        let record = NodeRecord::new("b", NodeKind::File, "b.txt");
        let event = TreeEvent::from_edit(
            "root",
            TreeEdit::Update {
                index: 0,
                previous_index: 1,
                record: record.clone(),
            },
        );
        assert_eq!(
            event,
            TreeEvent::Updated {
                parent: "root".to_string(),
                index: 0,
                previous_index: 1,
                record,
            }
        );
    }

    #[tokio::test]
    async fn test_bus_fan_out() {
        let bus = EventBus::new(8);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(TreeEvent::LoggedOut);
        assert_eq!(first.recv().await.unwrap(), TreeEvent::LoggedOut);
        assert_eq!(second.recv().await.unwrap(), TreeEvent::LoggedOut);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new(0);
        bus.publish(TreeEvent::LoggedOut);
    }

    #[test]
    fn test_serialized_shape() {
        let event = TreeEvent::Removed {
            parent: "root".to_string(),
            id: "a".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "removed");
        assert_eq!(json["id"], "a");
    }
}
