pub mod config;
pub mod error;
pub mod naming;
pub mod pipeline;
pub mod registry;
pub mod tables;
pub mod validation;
pub mod verify;
pub mod workflow;

use std::path::Path;

use crate::config::PipegraphConfig;
use crate::error::Result;
use crate::registry::SchemaRegistry;

/// Load schema declarations from disk, lint them and resolve the pipeline.
pub fn load_pipeline<P: AsRef<Path>>(dir: P, config: &PipegraphConfig) -> Result<Pipeline> {
    let registry = SchemaRegistry::load_from_dir(dir)?;
    Validator::from_config(&config.defaults.validation).validate_registry(&registry)?;
    Pipeline::build(&registry, config)
}

pub use crate::validation::Validator;
pub use error::PipegraphError;
pub use pipeline::{Pipeline, SchemaHandle, TableHandle};
pub use tables::{ForeignKeyDef, PartDef, SchemaDef, TableDef, Tier};
pub use verify::{assert_parentage, verify_parentage, ParentageMismatch};
