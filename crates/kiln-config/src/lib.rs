//! Configuration model, discovery and validation for kiln builds.

pub mod config;
pub mod discovery;
pub mod error;
pub mod validation;

pub use config::*;
pub use error::*;

pub use discovery::{discover, ConfigDiscovery, ConfigOverrides};
pub use validation::{
    validate_fs, validate_schema, ConfigValidator, FsValidator, SchemaValidator, KNOWN_LINT_RULES,
};
