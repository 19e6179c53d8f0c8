//! Domain layer: entities and hierarchy rules
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod entities;
pub mod error;
pub mod policy;

pub use entities::*;
pub use error::{DomainError, DomainResult};
pub use policy::{
    allowed_parent, check_parent_allowed, check_type_constraints, payload_from_attributes,
    project_attributes, Admission, MAX_TENANTS_PER_PERIOD,
};
