//! In-memory node store

use std::collections::BTreeMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::domain::{Node, NodeDraft, NodeId};
use crate::infrastructure::traits::{NodeStore, StoreError, StoreResult};

/// Plain node table shared by the in-memory and file-backed stores.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreState {
    last_id: u64,
    nodes: BTreeMap<NodeId, Node>,
}

/// On-disk layout of a [`StoreState`].
#[derive(Debug, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub last_id: u64,
    pub nodes: Vec<Node>,
}

impl From<&StoreState> for StoreSnapshot {
    fn from(state: &StoreState) -> Self {
        Self {
            last_id: state.last_id,
            nodes: state.nodes.values().cloned().collect(),
        }
    }
}

impl From<StoreSnapshot> for StoreState {
    fn from(snapshot: StoreSnapshot) -> Self {
        let nodes: BTreeMap<NodeId, Node> =
            snapshot.nodes.into_iter().map(|n| (n.id, n)).collect();
        // Never hand out an id that is already taken, even if last_id was edited by hand.
        let max_id = nodes.keys().next_back().map(|id| id.0).unwrap_or(0);
        Self {
            last_id: snapshot.last_id.max(max_id),
            nodes,
        }
    }
}

impl StoreState {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn insert(&mut self, draft: NodeDraft) -> Node {
        self.last_id += 1;
        let node = draft.into_node(NodeId(self.last_id));
        self.nodes.insert(node.id, node.clone());
        node
    }

    pub fn children_of(&self, id: NodeId) -> Vec<Node> {
        self.nodes
            .values()
            .filter(|n| n.parent_id == Some(id))
            .cloned()
            .collect()
    }

    pub fn roots(&self) -> Vec<Node> {
        self.nodes.values().filter(|n| n.is_root()).cloned().collect()
    }

    pub fn set_placement(
        &mut self,
        id: NodeId,
        parent_id: Option<NodeId>,
        height: u32,
    ) -> StoreResult<()> {
        let node = self.nodes.get_mut(&id).ok_or(StoreError::Missing(id))?;
        node.parent_id = parent_id;
        node.height = height;
        Ok(())
    }

    pub fn set_heights(&mut self, updates: &[(NodeId, u32)]) -> StoreResult<()> {
        if let Some((missing, _)) = updates.iter().find(|(id, _)| !self.nodes.contains_key(id)) {
            return Err(StoreError::Missing(*missing));
        }
        for (id, height) in updates {
            if let Some(node) = self.nodes.get_mut(id) {
                node.height = *height;
            }
        }
        Ok(())
    }
}

/// Node store kept entirely in process memory.
#[derive(Debug, Default)]
pub struct InMemoryNodeStore {
    state: RwLock<StoreState>,
}

impl InMemoryNodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored nodes.
    pub fn len(&self) -> StoreResult<usize> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }
}

impl NodeStore for InMemoryNodeStore {
    fn find_by_id(&self, id: NodeId) -> StoreResult<Option<Node>> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.get(id).cloned())
    }

    #[instrument(level = "debug", skip(self))]
    fn create(&self, draft: NodeDraft) -> StoreResult<Node> {
        let mut state = self.state.write().map_err(|_| StoreError::Poisoned)?;
        let node = state.insert(draft);
        debug!("created node {}", node.id);
        Ok(node)
    }

    fn children_of(&self, id: NodeId) -> StoreResult<Vec<Node>> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.children_of(id))
    }

    fn roots(&self) -> StoreResult<Vec<Node>> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.roots())
    }

    #[instrument(level = "debug", skip(self))]
    fn update_placement(
        &self,
        id: NodeId,
        parent_id: Option<NodeId>,
        height: u32,
    ) -> StoreResult<()> {
        let mut state = self.state.write().map_err(|_| StoreError::Poisoned)?;
        state.set_placement(id, parent_id, height)
    }

    #[instrument(level = "debug", skip(self, updates), fields(count = updates.len()))]
    fn bulk_update_heights(&self, updates: &[(NodeId, u32)]) -> StoreResult<()> {
        let mut state = self.state.write().map_err(|_| StoreError::Poisoned)?;
        state.set_heights(updates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NodePayload;

    fn corp(name: &str) -> NodeDraft {
        NodeDraft {
            name: name.into(),
            parent_id: None,
            height: 0,
            payload: NodePayload::Corporation,
        }
    }

    #[test]
    fn given_empty_store_when_creating_then_ids_start_at_one_and_increase() {
        let store = InMemoryNodeStore::new();

        let a = store.create(corp("a")).unwrap();
        let b = store.create(corp("b")).unwrap();

        assert_eq!(a.id, NodeId(1));
        assert_eq!(b.id, NodeId(2));
        assert_eq!(store.len().unwrap(), 2);
    }

    #[test]
    fn given_unknown_id_in_batch_when_bulk_updating_then_nothing_is_written() {
        let store = InMemoryNodeStore::new();
        let a = store.create(corp("a")).unwrap();

        let result = store.bulk_update_heights(&[(a.id, 5), (NodeId(99), 1)]);

        assert!(matches!(result, Err(StoreError::Missing(NodeId(99)))));
        assert_eq!(store.find_by_id(a.id).unwrap().unwrap().height, 0);
    }

    #[test]
    fn given_snapshot_with_stale_counter_when_restoring_then_counter_skips_taken_ids() {
        let mut state = StoreState::default();
        state.insert(corp("a"));
        state.insert(corp("b"));
        let mut snapshot = StoreSnapshot::from(&state);
        snapshot.last_id = 0;

        let mut restored = StoreState::from(snapshot);
        let next = restored.insert(corp("c"));

        assert_eq!(next.id, NodeId(3));
    }

    #[test]
    fn given_poisoned_lock_when_counting_then_reports_poisoned() {
        let store = std::sync::Arc::new(InMemoryNodeStore::new());
        let poisoner = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.state.write().unwrap();
            panic!("poison the store lock");
        })
        .join();

        assert!(matches!(store.len(), Err(StoreError::Poisoned)));
        assert!(matches!(store.roots(), Err(StoreError::Poisoned)));
    }
}
