//! proptree: a strictly typed real-estate hierarchy
//!
//! Corporation → Building → Property → Tenancy Period → Tenant, with the rules for
//! which node may hang under which parent, and height bookkeeping on every move.

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
