//! Domain-level errors (no external dependencies)

use thiserror::Error;

use crate::domain::{NodeId, NodeKind};

/// Domain errors represent hierarchy rule violations.
/// These are independent of storage concerns.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("node not found: {0}")]
    NotFound(NodeId),

    #[error("Invalid Parent Type: {} for child type: {child}", parent.map(|p| p.as_str()).unwrap_or("none"))]
    InvalidParent {
        child: NodeKind,
        parent: Option<NodeKind>,
    },

    #[error("{message}")]
    ConstraintViolation { kind: NodeKind, message: String },

    #[error("circular reference: node {node} cannot be placed under {new_parent}")]
    CircularReference { node: NodeId, new_parent: NodeId },
}

impl DomainError {
    pub fn constraint(kind: NodeKind, message: impl Into<String>) -> Self {
        Self::ConstraintViolation {
            kind,
            message: message.into(),
        }
    }
}

/// Result type for domain rule checks.
pub type DomainResult<T> = Result<T, DomainError>;
