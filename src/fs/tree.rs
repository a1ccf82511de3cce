//! Local tree model of the remote hierarchy.

use std::collections::{HashMap, HashSet};

use crate::error::{OsfError, Result};
use crate::fs::node::{Node, NodeRecord, ROOT_ID};
use crate::fs::reconcile::{TreeEdit, dedup_by_id, reconcile};

/// Proof that a listing was requested for a node in a given state.
///
/// A listing is only applied if the node still exists and has not been
/// collapsed since the ticket was issued.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchTicket {
    pub node_id: String,
    pub generation: u64,
}

/// A child taken out of its previous parent because a newer listing of
/// another container holds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detached {
    pub parent: String,
    pub id: String,
}

/// What reconciling a listing changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedListing {
    /// Children that moved in, removed from their old parents first
    pub detached: Vec<Detached>,
    /// Edit applied to the listed node's children
    pub edits: Vec<TreeEdit>,
}

/// Id-keyed arena of nodes rooted at [`ROOT_ID`].
#[derive(Debug)]
pub struct RemoteTree {
    nodes: HashMap<String, Node>,
    /// Last generation handed out; never reused within a tree.
    generations: u64,
}

impl RemoteTree {
    /// Create a tree holding only `root`. The record's id is forced to [`ROOT_ID`].
    pub fn new(mut root: NodeRecord) -> Self {
        root.id = ROOT_ID.to_string();
        let mut nodes = HashMap::new();
        nodes.insert(ROOT_ID.to_string(), Node::new(root, None, 0));
        Self {
            nodes,
            generations: 0,
        }
    }

    pub fn root(&self) -> Option<&Node> {
        self.nodes.get(ROOT_ID)
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Records of the children of `id`, in display order.
    pub fn child_records(&self, id: &str) -> Result<Vec<NodeRecord>> {
        let node = self.node(id)?;
        Ok(node
            .children()
            .iter()
            .filter_map(|c| self.nodes.get(c))
            .map(|n| n.record.clone())
            .collect())
    }

    /// Replace the root's remote attributes, keeping its children.
    pub fn set_root_record(&mut self, mut record: NodeRecord) {
        record.id = ROOT_ID.to_string();
        if let Some(root) = self.nodes.get_mut(ROOT_ID) {
            root.record = record;
        }
    }

    /// Issue a ticket for listing the children of `id`.
    pub fn ticket(&self, id: &str) -> Result<FetchTicket> {
        let node = self.node(id)?;
        if !node.record.is_container() {
            return Err(OsfError::Unsupported(format!(
                "{} is a file and has no children",
                node.record.name
            )));
        }
        Ok(FetchTicket {
            node_id: id.to_string(),
            generation: node.generation,
        })
    }

    /// Whether the node a ticket was issued for is still in the tree.
    ///
    /// A collapsed node is still the same node; one discarded and later
    /// re-created under the same id is not.
    pub fn is_live(&self, ticket: &FetchTicket) -> bool {
        self.nodes
            .get(&ticket.node_id)
            .is_some_and(|n| n.created <= ticket.generation)
    }

    /// Reconcile a fetched listing into the tree.
    ///
    /// Returns `None` when the ticket is stale: the node was discarded or
    /// collapsed after the fetch started. The listing is authoritative: an
    /// entry currently held by another container is moved here with its
    /// subtree.
    pub fn apply_listing(
        &mut self,
        ticket: &FetchTicket,
        listing: Vec<NodeRecord>,
    ) -> Option<AppliedListing> {
        let parent_id = ticket.node_id.as_str();
        let node = self.nodes.get(parent_id)?;
        if node.generation != ticket.generation {
            tracing::debug!(node = parent_id, "dropping stale listing");
            return None;
        }

        // A node cannot hold itself or one of its ancestors.
        let mut lineage: HashSet<String> = self.ancestors(parent_id).into_iter().collect();
        lineage.insert(parent_id.to_string());
        lineage.insert(ROOT_ID.to_string());
        let listing: Vec<NodeRecord> = dedup_by_id(listing)
            .into_iter()
            .filter(|r| {
                let cycle = lineage.contains(&r.id);
                if cycle {
                    tracing::warn!(id = %r.id, parent = parent_id, "listing names an ancestor, ignoring");
                }
                !cycle
            })
            .collect();

        let old: Vec<NodeRecord> = node
            .children()
            .iter()
            .filter_map(|c| self.nodes.get(c))
            .map(|n| n.record.clone())
            .collect();
        let edits = reconcile(&old, &listing);

        // Detach moved entries before removals so their subtrees survive.
        let mut detached = Vec::new();
        for edit in &edits {
            let TreeEdit::Insert { record, .. } = edit else {
                continue;
            };
            let Some(previous) = self.nodes.get(&record.id).and_then(|n| n.parent.clone()) else {
                continue;
            };
            if let Some(siblings) = self
                .nodes
                .get_mut(&previous)
                .and_then(|n| n.children.as_mut())
            {
                siblings.retain(|c| c != &record.id);
            }
            tracing::debug!(id = %record.id, from = %previous, to = parent_id, "moving node");
            detached.push(Detached {
                parent: previous,
                id: record.id.clone(),
            });
        }

        for edit in &edits {
            match edit {
                TreeEdit::Remove { id } => self.discard_subtree(id),
                TreeEdit::Insert { record, .. } => match self.nodes.get_mut(&record.id) {
                    Some(moved) => {
                        moved.record = record.clone();
                        moved.parent = Some(parent_id.to_string());
                    }
                    None => {
                        let generation = self.next_generation();
                        self.nodes.insert(
                            record.id.clone(),
                            Node::new(record.clone(), Some(parent_id.to_string()), generation),
                        );
                    }
                },
                TreeEdit::Update { record, .. } => {
                    if let Some(child) = self.nodes.get_mut(&record.id) {
                        child.record = record.clone();
                    }
                }
            }
        }

        let ids = listing.into_iter().map(|r| r.id).collect();
        if let Some(node) = self.nodes.get_mut(parent_id) {
            node.children = Some(ids);
        }

        tracing::debug!(node = parent_id, edits = edits.len(), moved = detached.len(), "listing applied");
        Some(AppliedListing { detached, edits })
    }

    /// Mark `id` unpopulated and discard its subtree.
    ///
    /// Returns the ids of the direct children that were removed. Pending
    /// listings for the node become stale.
    pub fn collapse(&mut self, id: &str) -> Result<Vec<String>> {
        let generation = self.next_generation();
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| OsfError::NodeNotFound(id.to_string()))?;
        node.generation = generation;
        let children = node.children.take().unwrap_or_default();

        for child in &children {
            self.discard_subtree(child);
        }
        Ok(children)
    }

    /// Walk up from `id` to the root, returning the ids on the way (excluding `id`).
    pub fn ancestors(&self, id: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut current = self.nodes.get(id).and_then(|n| n.parent.clone());
        while let Some(parent) = current {
            current = self.nodes.get(&parent).and_then(|n| n.parent.clone());
            out.push(parent);
        }
        out
    }

    fn next_generation(&mut self) -> u64 {
        self.generations += 1;
        self.generations
    }

    fn node(&self, id: &str) -> Result<&Node> {
        self.nodes
            .get(id)
            .ok_or_else(|| OsfError::NodeNotFound(id.to_string()))
    }

    fn discard_subtree(&mut self, id: &str) {
        let mut stack = vec![id.to_string()];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(&current) {
                stack.extend(node.children.unwrap_or_default());
            }
        }
    }
}
