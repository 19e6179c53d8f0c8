//! Node store backends

mod json;
mod memory;

pub use json::JsonFileStore;
pub use memory::{InMemoryNodeStore, StoreSnapshot, StoreState};
