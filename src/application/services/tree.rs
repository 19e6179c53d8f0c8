//! Tree service
//!
//! Creates nodes and moves them around the hierarchy. Every mutation is checked
//! against the hierarchy policy before anything is written, and a move re-derives
//! the heights of the whole subtree that came along.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, instrument};

use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::{
    check_parent_allowed, check_type_constraints, payload_from_attributes, Admission,
    DomainError, NewNode, Node, NodeDraft, NodeId,
};
use crate::infrastructure::traits::{NodeStore, StoreError};

/// Height one level below a node stored at `height`.
fn height_below(id: NodeId, height: u32) -> ApplicationResult<u32> {
    height
        .checked_add(1)
        .ok_or_else(|| StoreError::HeightOverflow(id).into())
}

/// Service orchestrating node creation and re-parenting against a [`NodeStore`].
pub struct TreeService {
    store: Arc<dyn NodeStore>,
    /// Serializes mutations so concurrent moves cannot interleave their reads and writes.
    write_lock: Mutex<()>,
}

impl TreeService {
    /// Create a new tree service.
    pub fn new(store: Arc<dyn NodeStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    fn lock(&self) -> ApplicationResult<MutexGuard<'_, ()>> {
        self.write_lock.lock().map_err(|_| ApplicationError::Poisoned)
    }

    fn load(&self, id: NodeId) -> ApplicationResult<Node> {
        self.store
            .find_by_id(id)?
            .ok_or_else(|| DomainError::NotFound(id).into())
    }

    /// Fetch a single node.
    pub fn get_node(&self, id: NodeId) -> ApplicationResult<Node> {
        self.load(id)
    }

    /// Direct children of a node.
    pub fn get_children(&self, id: NodeId) -> ApplicationResult<Vec<Node>> {
        debug!("get_children: id={}", id);
        self.load(id)?;
        Ok(self.store.children_of(id)?)
    }

    /// All root nodes (corporations).
    pub fn roots(&self) -> ApplicationResult<Vec<Node>> {
        Ok(self.store.roots()?)
    }

    /// Parent chain of a node, nearest ancestor first.
    pub fn ancestors(&self, id: NodeId) -> ApplicationResult<Vec<Node>> {
        let node = self.load(id)?;
        let mut chain = Vec::new();
        let mut seen = HashSet::from([node.id]);
        let mut cursor = node.parent_id;
        while let Some(parent_id) = cursor {
            if !seen.insert(parent_id) {
                break;
            }
            let parent = self.load(parent_id)?;
            cursor = parent.parent_id;
            chain.push(parent);
        }
        Ok(chain)
    }

    /// The node and all of its descendants in breadth-first order.
    pub fn subtree(&self, id: NodeId) -> ApplicationResult<Vec<Node>> {
        let root = self.load(id)?;
        let mut result = Vec::new();
        let mut queue = VecDeque::from([root]);
        while let Some(node) = queue.pop_front() {
            queue.extend(self.store.children_of(node.id)?);
            result.push(node);
        }
        Ok(result)
    }

    /// Create a node under an optional parent.
    ///
    /// The parent must exist and be of the one type the child may hang under; the
    /// type-specific rules run before anything is written. Attributes that do not
    /// belong to the node's type are dropped.
    #[instrument(level = "debug", skip(self, input), fields(name = %input.name, kind = %input.kind))]
    pub fn create_node(&self, input: NewNode) -> ApplicationResult<Node> {
        let _guard = self.lock()?;

        let parent = input.parent_id.map(|id| self.load(id)).transpose()?;
        check_parent_allowed(input.kind, parent.as_ref().map(Node::kind))?;

        let siblings = match &parent {
            Some(p) => self.store.children_of(p.id)?,
            None => Vec::new(),
        };
        check_type_constraints(
            input.kind,
            parent.as_ref(),
            &siblings,
            &input.attributes,
            Admission::Create,
        )?;

        let height = match &parent {
            Some(p) => height_below(p.id, p.height)?,
            None => 0,
        };
        let payload = payload_from_attributes(input.kind, &input.attributes)?;

        let node = self.store.create(NodeDraft {
            name: input.name,
            parent_id: parent.map(|p| p.id),
            height,
            payload,
        })?;
        info!("created {}", node);
        Ok(node)
    }

    /// Move a node (and its subtree) under a new parent.
    ///
    /// Rejected moves leave the tree untouched. After the node itself is written,
    /// descendant heights are recomputed and stored in one batch.
    #[instrument(level = "debug", skip(self))]
    pub fn change_parent(&self, node_id: NodeId, new_parent_id: NodeId) -> ApplicationResult<Node> {
        let _guard = self.lock()?;

        let node = self.load(node_id)?;
        let new_parent = self.load(new_parent_id)?;

        self.ensure_acyclic(&node, &new_parent)?;
        check_parent_allowed(node.kind(), Some(new_parent.kind()))?;
        let siblings = self.store.children_of(new_parent.id)?;
        check_type_constraints(
            node.kind(),
            Some(&new_parent),
            &siblings,
            &node.payload.to_attributes(),
            Admission::Reparent {
                node: node.id,
                current_parent: node.parent_id,
            },
        )?;

        let height = height_below(new_parent.id, new_parent.height)?;
        self.store
            .update_placement(node.id, Some(new_parent.id), height)?;
        let moved = Node {
            parent_id: Some(new_parent.id),
            height,
            ..node
        };
        info!("moved {} under {}", moved, new_parent);

        let updates = self.descendant_heights(&moved)?;
        if !updates.is_empty() {
            debug!("cascading {} height updates", updates.len());
            self.store.bulk_update_heights(&updates)?;
        }
        Ok(moved)
    }

    /// Reject placing `node` under itself or under one of its own descendants.
    ///
    /// Walks from the new parent up to its root; meeting `node` on the way means the
    /// new parent sits inside `node`'s subtree.
    fn ensure_acyclic(&self, node: &Node, new_parent: &Node) -> ApplicationResult<()> {
        let cycle = || DomainError::CircularReference {
            node: node.id,
            new_parent: new_parent.id,
        };
        if node.id == new_parent.id {
            return Err(cycle().into());
        }

        let mut seen = HashSet::from([new_parent.id]);
        let mut cursor = new_parent.parent_id;
        while let Some(ancestor_id) = cursor {
            // A repeat means the stored chain already loops; treat it as a cycle too.
            if ancestor_id == node.id || !seen.insert(ancestor_id) {
                return Err(cycle().into());
            }
            cursor = self.load(ancestor_id)?.parent_id;
        }
        Ok(())
    }

    /// Breadth-first walk below `start`, collecting `(id, height)` for every descendant.
    fn descendant_heights(&self, start: &Node) -> ApplicationResult<Vec<(NodeId, u32)>> {
        let mut updates = Vec::new();
        let mut queue = VecDeque::from([(start.id, start.height)]);
        while let Some((id, height)) = queue.pop_front() {
            for child in self.store.children_of(id)? {
                let child_height = height_below(id, height)?;
                updates.push((child.id, child_height));
                queue.push_back((child.id, child_height));
            }
        }
        Ok(updates)
    }

    /// Recompute every height from the roots down and store the ones that were wrong.
    ///
    /// Recovers from a move whose cascade write failed. Returns the number of
    /// corrected nodes.
    #[instrument(level = "debug", skip(self))]
    pub fn repair_heights(&self) -> ApplicationResult<usize> {
        let _guard = self.lock()?;

        let mut updates = Vec::new();
        let mut queue: VecDeque<(Node, u32)> =
            self.store.roots()?.into_iter().map(|r| (r, 0)).collect();
        while let Some((node, expected)) = queue.pop_front() {
            if node.height != expected {
                updates.push((node.id, expected));
            }
            let child_height = height_below(node.id, expected)?;
            for child in self.store.children_of(node.id)? {
                queue.push_back((child, child_height));
            }
        }

        if !updates.is_empty() {
            info!("repairing {} stale heights", updates.len());
            self.store.bulk_update_heights(&updates)?;
        }
        Ok(updates.len())
    }
}
