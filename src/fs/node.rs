//! Node types for the remote OSF hierarchy.

use serde::{Deserialize, Serialize};

/// Identifier of the synthetic root node whose children are the user's projects.
pub const ROOT_ID: &str = "root";

/// Kind of an entry in the remote hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Invisible root holding the projects
    Root,
    /// OSF project (or component)
    Project,
    /// Folder, including storage providers such as `osfstorage`
    Folder,
    /// Regular file
    File,
}

impl NodeKind {
    /// Check if this node kind can have children.
    pub fn is_container(&self) -> bool {
        !matches!(self, NodeKind::File)
    }
}

/// Action links offered by the server for a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeLinks {
    /// Listing of the node's children
    pub children: Option<String>,
    /// File content
    pub download: Option<String>,
    /// Upload target (folders: new file, files: new version)
    pub upload: Option<String>,
    /// Folder creation target
    pub new_folder: Option<String>,
    /// Deletion target
    pub delete: Option<String>,
}

/// Remote attributes of a node, as returned by a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Identifier assigned by the remote API
    pub id: String,
    pub kind: NodeKind,
    /// Display name (project title or file name)
    pub name: String,
    /// File size in bytes
    pub size: Option<u64>,
    /// Project category or storage provider name
    pub category: Option<String>,
    pub date_created: Option<String>,
    pub date_modified: Option<String>,
    pub last_touched: Option<String>,
    pub links: NodeLinks,
}

impl NodeRecord {
    /// Create a record with only the required attributes set.
    pub fn new(id: impl Into<String>, kind: NodeKind, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            name: name.into(),
            size: None,
            category: None,
            date_created: None,
            date_modified: None,
            last_touched: None,
            links: NodeLinks::default(),
        }
    }

    /// The synthetic root. `projects_url` lists the user's projects.
    pub fn root(projects_url: impl Into<String>) -> Self {
        let mut root = Self::new(ROOT_ID, NodeKind::Root, "");
        root.links.children = Some(projects_url.into());
        root
    }

    /// Check if this node is a file.
    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }

    /// Check if this node can hold children.
    pub fn is_container(&self) -> bool {
        self.kind.is_container()
    }

    /// Size rendered for humans, empty for containers.
    pub fn display_size(&self) -> String {
        match self.size {
            Some(bytes) if self.is_file() => format_size(bytes),
            _ => String::new(),
        }
    }
}

/// A node of the local tree.
///
/// Children are referenced by id and owned by the tree; `parent` is a
/// navigation link only.
#[derive(Debug, Clone)]
pub struct Node {
    pub record: NodeRecord,
    pub parent: Option<String>,
    /// `None` until the node has been expanded.
    pub(crate) children: Option<Vec<String>>,
    /// Tree-wide stamp taken at creation and again on every collapse, so
    /// late listings can be recognised.
    pub(crate) generation: u64,
    /// Stamp taken at creation; a ticket older than this belongs to a node
    /// that was discarded and re-created under the same id.
    pub(crate) created: u64,
}

impl Node {
    pub(crate) fn new(record: NodeRecord, parent: Option<String>, generation: u64) -> Self {
        Self {
            record,
            parent,
            children: None,
            generation,
            created: generation,
        }
    }

    pub fn id(&self) -> &str {
        &self.record.id
    }

    /// Whether the children have been fetched (possibly empty).
    pub fn is_populated(&self) -> bool {
        self.children.is_some()
    }

    /// Child ids in display order. Empty when not populated.
    pub fn children(&self) -> &[String] {
        self.children.as_deref().unwrap_or(&[])
    }
}

/// Format a byte count the way file browsers do.
pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1_048_576 {
        format!("{:.1} kB", bytes as f64 / 1024.0)
    } else if bytes < 1_073_741_824 {
        format!("{:.1} MB", bytes as f64 / 1_048_576.0)
    } else {
        format!("{:.2} GB", bytes as f64 / 1_073_741_824.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_kind_properties() {
        assert!(NodeKind::Root.is_container());
        assert!(NodeKind::Project.is_container());
        assert!(NodeKind::Folder.is_container());
        assert!(!NodeKind::File.is_container());
    }

    #[test]
    fn test_root_record() {
        let root = NodeRecord::root("https://api.osf.io/v2/users/me/nodes/");
        assert_eq!(root.id, ROOT_ID);
        assert_eq!(root.kind, NodeKind::Root);
        assert_eq!(
            root.links.children.as_deref(),
            Some("https://api.osf.io/v2/users/me/nodes/")
        );
    }

    #[test]
    fn test_display_size() {
        let mut file = NodeRecord::new("f1", NodeKind::File, "data.csv");
        file.size = Some(2048);
        assert_eq!(file.display_size(), "2.0 kB");

        let mut folder = NodeRecord::new("d1", NodeKind::Folder, "raw");
        folder.size = Some(2048);
        assert_eq!(folder.display_size(), "");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1_572_864), "1.5 MB");
        assert_eq!(format_size(2_147_483_648), "2.00 GB");
    }

    #[test]
    fn test_unpopulated_node_has_no_children() {
        let node = Node::new(NodeRecord::new("a", NodeKind::Folder, "a"), None, 1);
        assert!(!node.is_populated());
        assert!(node.children().is_empty());
    }
}
