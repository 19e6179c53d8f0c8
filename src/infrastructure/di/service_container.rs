//! Service container for dependency injection
//!
//! Wires up the node store and the tree service from settings.

use std::sync::Arc;

use tracing::debug;

use crate::application::services::TreeService;
use crate::config::{Settings, StoreBackend};
use crate::infrastructure::store::{InMemoryNodeStore, JsonFileStore};
use crate::infrastructure::traits::{FileSystem, NodeStore, RealFileSystem};
use crate::infrastructure::{InfraError, InfraResult};

/// Container holding all application services.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Persistence backend
    pub store: Arc<dyn NodeStore>,

    /// Node creation and re-parenting
    pub tree: TreeService,
}

impl ServiceContainer {
    /// Create a new service container with real implementations.
    pub fn new(settings: Settings) -> InfraResult<Self> {
        Self::with_fs(settings, Arc::new(RealFileSystem))
    }

    /// Create a service container on a custom filesystem (for testing).
    pub fn with_fs(settings: Settings, fs: Arc<dyn FileSystem>) -> InfraResult<Self> {
        let store: Arc<dyn NodeStore> = match settings.backend {
            StoreBackend::Json => {
                debug!("opening json store at {}", settings.store_path.display());
                Arc::new(
                    JsonFileStore::open(fs, &settings.store_path).map_err(InfraError::StoreOpen)?,
                )
            }
            StoreBackend::Memory => Arc::new(InMemoryNodeStore::new()),
        };
        Ok(Self::with_store(settings, store))
    }

    /// Create a service container around an existing store.
    pub fn with_store(settings: Settings, store: Arc<dyn NodeStore>) -> Self {
        let tree = TreeService::new(store.clone());
        Self {
            settings: Arc::new(settings),
            store,
            tree,
        }
    }
}
