//! File-backed node store: one JSON document holding the whole table

use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use fs2::FileExt;
use tracing::{debug, instrument, trace};

use crate::domain::{Node, NodeDraft, NodeId};
use crate::infrastructure::store::memory::{StoreSnapshot, StoreState};
use crate::infrastructure::traits::{FileSystem, NodeStore, StoreError, StoreResult};

fn io_err(action: &str, path: &Path) -> impl FnOnce(io::Error) -> StoreError {
    let context = format!("{} {}", action, path.display());
    move |source| StoreError::Io { context, source }
}

/// Read the table from `path`. A missing or empty file is an empty table.
fn load_state(fs: &dyn FileSystem, path: &Path) -> StoreResult<StoreState> {
    if !fs.exists(path) {
        return Ok(StoreState::default());
    }
    let content = fs.read_to_string(path).map_err(io_err("read", path))?;
    if content.trim().is_empty() {
        return Ok(StoreState::default());
    }
    let snapshot: StoreSnapshot =
        serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
            context: format!("parse {}", path.display()),
            source: e,
        })?;
    Ok(StoreState::from(snapshot))
}

/// Advisory lock on `<file>.lock`, held until dropped.
#[derive(Debug)]
struct StoreLock {
    _file: File,
}

impl StoreLock {
    fn acquire(lock_path: &Path, exclusive: bool) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(lock_path)?;
        if exclusive {
            file.lock_exclusive()?;
        } else {
            FileExt::lock_shared(&file)?;
        }
        Ok(Self { _file: file })
    }
}

/// Node store persisted to a JSON file after every write.
///
/// Every write takes an exclusive lock on `<file>.lock`, re-reads the file, applies
/// the change and persists it, so separate processes sharing one file never hand
/// out the same id or drop each other's nodes. Reads refresh from the file under
/// a shared lock. Writes go to `<file>.tmp` first and are renamed into place, so a
/// failed write leaves both the file and the in-memory table untouched.
pub struct JsonFileStore {
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
    state: RwLock<StoreState>,
}

impl JsonFileStore {
    /// Open the store at `path`. A missing file is an empty store.
    #[instrument(level = "debug", skip(fs))]
    pub fn open(fs: Arc<dyn FileSystem>, path: &Path) -> StoreResult<Self> {
        let state = load_state(fs.as_ref(), path)?;
        debug!("opened store with {} nodes", state.len());

        Ok(Self {
            fs,
            path: path.to_path_buf(),
            state: RwLock::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sibling_path(&self, suffix: &str) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(suffix);
        PathBuf::from(name)
    }

    fn tmp_path(&self) -> PathBuf {
        self.sibling_path(".tmp")
    }

    fn lock_path(&self) -> PathBuf {
        self.sibling_path(".lock")
    }

    fn persist(&self, state: &StoreState) -> StoreResult<()> {
        let json = serde_json::to_string_pretty(&StoreSnapshot::from(state)).map_err(|e| {
            StoreError::Corrupt {
                context: "serialize store".to_string(),
                source: e,
            }
        })?;
        let tmp = self.tmp_path();
        self.fs.write(&tmp, &json).map_err(io_err("write", &tmp))?;
        self.fs
            .rename(&tmp, &self.path)
            .map_err(io_err("rename into", &self.path))?;
        Ok(())
    }

    /// Pick up writes made by other processes since the last read.
    fn refresh(&self) -> StoreResult<()> {
        if !self.fs.exists(&self.path) {
            return Ok(());
        }
        let lock_path = self.lock_path();
        let fresh = {
            let _lock = StoreLock::acquire(&lock_path, false).map_err(io_err("lock", &lock_path))?;
            load_state(self.fs.as_ref(), &self.path)?
        };
        let mut guard = self.state.write().map_err(|_| StoreError::Poisoned)?;
        *guard = fresh;
        Ok(())
    }

    /// Under the exclusive file lock: reload the table, apply `change`, persist it,
    /// then commit it in memory.
    fn mutate<T>(&self, change: impl FnOnce(&mut StoreState) -> StoreResult<T>) -> StoreResult<T> {
        let mut guard = self.state.write().map_err(|_| StoreError::Poisoned)?;
        self.fs
            .ensure_parent(&self.path)
            .map_err(io_err("create parent of", &self.path))?;
        let lock_path = self.lock_path();
        let _lock = StoreLock::acquire(&lock_path, true).map_err(io_err("lock", &lock_path))?;
        trace!("holding {}", lock_path.display());

        let mut next = load_state(self.fs.as_ref(), &self.path)?;
        let out = change(&mut next)?;
        self.persist(&next)?;
        *guard = next;
        Ok(out)
    }
}

impl NodeStore for JsonFileStore {
    fn find_by_id(&self, id: NodeId) -> StoreResult<Option<Node>> {
        self.refresh()?;
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.get(id).cloned())
    }

    #[instrument(level = "debug", skip(self))]
    fn create(&self, draft: NodeDraft) -> StoreResult<Node> {
        self.mutate(|state| Ok(state.insert(draft)))
    }

    fn children_of(&self, id: NodeId) -> StoreResult<Vec<Node>> {
        self.refresh()?;
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.children_of(id))
    }

    fn roots(&self) -> StoreResult<Vec<Node>> {
        self.refresh()?;
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
        self.mutate(|state| state.set_placement(id, parent_id, height))
    }

    #[instrument(level = "debug", skip(self, updates), fields(count = updates.len()))]
    fn bulk_update_heights(&self, updates: &[(NodeId, u32)]) -> StoreResult<()> {
        self.mutate(|state| state.set_heights(updates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NodePayload;
    use crate::infrastructure::traits::RealFileSystem;
    use tempfile::TempDir;

    fn building(parent: NodeId) -> NodeDraft {
        NodeDraft {
            name: "Tower".into(),
            parent_id: Some(parent),
            height: 1,
            payload: NodePayload::Building {
                zip_code: "12345".into(),
            },
        }
    }

    #[test]
    fn given_missing_file_when_opening_then_store_is_empty() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("nodes.json");

        let store = JsonFileStore::open(Arc::new(RealFileSystem), &path).unwrap();

        assert!(store.roots().unwrap().is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn given_written_nodes_when_reopening_then_nodes_and_ids_survive() {
        // Arrange
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nodes.json");
        let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
        let store = JsonFileStore::open(fs.clone(), &path).unwrap();
        let corp = store
            .create(NodeDraft {
                name: "Acme".into(),
                parent_id: None,
                height: 0,
                payload: NodePayload::Corporation,
            })
            .unwrap();
        let tower = store.create(building(corp.id)).unwrap();
        store.bulk_update_heights(&[(tower.id, 7)]).unwrap();
        drop(store);

        // Act
        let reopened = JsonFileStore::open(fs, &path).unwrap();
        let next = reopened.create(building(corp.id)).unwrap();

        // Assert
        assert_eq!(reopened.children_of(corp.id).unwrap().len(), 2);
        assert_eq!(reopened.find_by_id(tower.id).unwrap().unwrap().height, 7);
        assert_eq!(next.id, NodeId(3));
        assert!(!temp.path().join("nodes.json.tmp").exists());
    }

    #[test]
    fn given_garbage_file_when_opening_then_reports_corrupt_store() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nodes.json");
        std::fs::write(&path, "{ not json").unwrap();

        let result = JsonFileStore::open(Arc::new(RealFileSystem), &path);

        assert!(matches!(result, Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn given_two_handles_on_one_file_when_both_write_then_ids_are_unique_and_nothing_is_lost() {
        // Arrange: both opened while the file is still empty
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nodes.json");
        let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
        let first = JsonFileStore::open(fs.clone(), &path).unwrap();
        let second = JsonFileStore::open(fs.clone(), &path).unwrap();
        let corp = |name: &str| NodeDraft {
            name: name.into(),
            parent_id: None,
            height: 0,
            payload: NodePayload::Corporation,
        };

        // Act
        let a = first.create(corp("A")).unwrap();
        let b = second.create(corp("B")).unwrap();

        // Assert
        assert_ne!(a.id, b.id);
        assert_eq!(first.roots().unwrap().len(), 2, "reads pick up the other handle's write");
        let reopened = JsonFileStore::open(fs, &path).unwrap();
        let names: Vec<String> = reopened.roots().unwrap().into_iter().map(|n| n.name).collect();
        assert_eq!(names, vec!["A".to_string(), "B".to_string()]);
        assert!(temp.path().join("nodes.json.lock").exists());
    }
}
