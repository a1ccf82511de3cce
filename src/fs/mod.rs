//! Local model of the remote hierarchy.

pub mod node;
pub mod reconcile;
pub mod tree;

pub use node::{Node, NodeKind, NodeLinks, NodeRecord, ROOT_ID, format_size};
pub use reconcile::{TreeEdit, apply, reconcile};
pub use tree::{AppliedListing, Detached, FetchTicket, RemoteTree};
