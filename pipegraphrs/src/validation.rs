use std::collections::HashSet;

use crate::config::ValidationConfig;
use crate::error::{PipegraphError, Result};
use crate::naming::is_camel_case;
use crate::registry::SchemaRegistry;
use crate::tables::{ForeignKeyDef, SchemaDef, TableDef, Tier};

/// Declaration lints that do not prevent a pipeline from resolving.
///
/// Structural problems (schema-name casing, unknown or repeated references,
/// cycles, name collisions) are rejected by [`SchemaRegistry::insert`] and
/// [`crate::pipeline::Pipeline::build`] regardless of mode.
pub struct Validator {
    warn_only: bool,
}

impl Validator {
    pub fn new(warn_only: bool) -> Self {
        Self { warn_only }
    }

    pub fn from_config(config: &ValidationConfig) -> Self {
        Self::new(config.warn_only)
    }

    pub fn validate_registry(&self, registry: &SchemaRegistry) -> Result<()> {
        for schema in registry.schemas.values() {
            self.validate_schema(schema)?;
        }
        Ok(())
    }

    fn validate_schema(&self, schema: &SchemaDef) -> Result<()> {
        for table in &schema.tables {
            self.validate_table(schema, table)?;
        }
        Ok(())
    }

    fn validate_table(&self, schema: &SchemaDef, table: &TableDef) -> Result<()> {
        let path = format!("{}.{}", schema.name, table.name);

        self.check(
            is_camel_case(&table.name),
            format!("table {path} must use a CamelCase class name"),
        )?;

        self.check(
            table.tier != Tier::Part,
            format!("table {path} declares tier part; declare it under its master's parts"),
        )?;

        self.check(
            !table.primary_key.is_empty() || table.parents.iter().any(|fk| fk.primary),
            format!("table {path} has no primary key"),
        )?;

        self.validate_foreign_keys(&path, &table.parents)?;

        let mut part_names = HashSet::new();
        for part in &table.parts {
            let part_path = format!("{path}.{}", part.name);
            self.check(
                is_camel_case(&part.name),
                format!("part table {part_path} must use a CamelCase class name"),
            )?;
            self.check(
                part_names.insert(part.name.as_str()),
                format!("part table {part_path} declared more than once"),
            )?;
            self.validate_foreign_keys(&part_path, &part.parents)?;
        }
        Ok(())
    }

    fn validate_foreign_keys(&self, path: &str, parents: &[ForeignKeyDef]) -> Result<()> {
        let mut seen = HashSet::new();
        for fk in parents {
            self.check(
                !(fk.primary && fk.nullable),
                format!(
                    "{path} declares nullable foreign key to {} inside its primary key",
                    fk.table
                ),
            )?;
            self.check(
                seen.insert(fk.table.as_str()),
                format!("{path} references {} more than once", fk.table),
            )?;
        }
        Ok(())
    }

    fn check(&self, condition: bool, message: String) -> Result<()> {
        if condition {
            return Ok(());
        }
        if self.warn_only {
            tracing::warn!("{message}");
            Ok(())
        } else {
            Err(PipegraphError::Validation(message))
        }
    }
}
