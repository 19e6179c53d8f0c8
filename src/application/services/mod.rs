//! Application services
//!
//! Concrete service implementations that orchestrate domain logic.
//! Services depend on I/O boundary traits (NodeStore, FileSystem)
//! but are themselves concrete structs, not traits.

mod tree;

pub use tree::TreeService;
