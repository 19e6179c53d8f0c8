//! I/O boundary traits for testability
//!
//! These traits abstract persistence and filesystem access, allowing the tree
//! service to be tested against in-memory implementations.

use std::io;
use std::path::Path;

use thiserror::Error;

use crate::domain::{Node, NodeDraft, NodeId};

/// Failure reported by a node store backend.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("no stored node with id {0}")]
    Missing(NodeId),

    #[error("store I/O failed: {context}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("store data is corrupt: {context}")]
    Corrupt {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("store lock poisoned")]
    Poisoned,

    #[error("stored height of node {0} is out of range")]
    HeightOverflow(NodeId),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence collaborator for the node hierarchy.
pub trait NodeStore: Send + Sync {
    /// Look up a node by id.
    fn find_by_id(&self, id: NodeId) -> StoreResult<Option<Node>>;

    /// Persist a new node, assigning its id.
    fn create(&self, draft: NodeDraft) -> StoreResult<Node>;

    /// All direct children of `id`, in id order.
    fn children_of(&self, id: NodeId) -> StoreResult<Vec<Node>>;

    /// All nodes without a parent, in id order.
    fn roots(&self) -> StoreResult<Vec<Node>>;

    /// Point a node at a new parent and set its own height.
    fn update_placement(&self, id: NodeId, parent_id: Option<NodeId>, height: u32)
        -> StoreResult<()>;

    /// Write a batch of height updates. Either every update is applied or none is.
    fn bulk_update_heights(&self, updates: &[(NodeId, u32)]) -> StoreResult<()>;
}

/// Filesystem abstraction for testability.
pub trait FileSystem: Send + Sync {
    /// Read file contents to string.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Write string content to file.
    fn write(&self, path: &Path, content: &str) -> io::Result<()>;

    /// Check if path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Rename/move a file.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Create parent directories if needed.
    fn ensure_parent(&self, path: &Path) -> io::Result<()>;
}

// ============================================================
// REAL IMPLEMENTATIONS
// ============================================================

/// Real filesystem implementation.
#[derive(Debug, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn write(&self, path: &Path, content: &str) -> io::Result<()> {
        std::fs::write(path, content)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        std::fs::rename(from, to)
    }

    fn ensure_parent(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}
