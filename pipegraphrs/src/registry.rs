use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use glob::glob;

use crate::error::{PipegraphError, Result};
use crate::naming::is_schema_name;
use crate::tables::SchemaDef;

/// Schema declarations keyed by schema name, prior to resolution.
#[derive(Debug, Default, Clone)]
pub struct SchemaRegistry {
    pub schemas: BTreeMap<String, SchemaDef>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from in-memory declarations. Duplicate schema names are rejected.
    pub fn from_parts(schemas: Vec<SchemaDef>) -> Result<Self> {
        let mut registry = SchemaRegistry::new();
        for schema in schemas {
            registry.insert(schema)?;
        }
        Ok(registry)
    }

    pub fn insert(&mut self, schema: SchemaDef) -> Result<()> {
        if !is_schema_name(&schema.name) {
            return Err(PipegraphError::Validation(format!(
                "schema name {} must be lowercase snake_case",
                schema.name
            )));
        }
        if self.schemas.contains_key(&schema.name) {
            return Err(PipegraphError::Validation(format!(
                "schema {} declared more than once",
                schema.name
            )));
        }
        self.schemas.insert(schema.name.clone(), schema);
        Ok(())
    }

    /// Load every `*.yml` / `*.yaml` file under `<root>/schemas`.
    pub fn load_from_dir<P: AsRef<Path>>(root: P) -> Result<Self> {
        let mut registry = SchemaRegistry::new();
        registry.load_schemas(root.as_ref().join("schemas"))?;
        Ok(registry)
    }

    fn load_schemas(&mut self, dir: PathBuf) -> Result<()> {
        if !dir.exists() {
            return Err(PipegraphError::Validation(format!(
                "schemas directory not found: {}",
                dir.display()
            )));
        }
        for pattern in ["yml", "yaml"] {
            for entry in glob(&format!("{}/*.{pattern}", dir.display()))
                .map_err(|e| PipegraphError::Other(e.into()))?
                .flatten()
            {
                self.load_schema_file(&entry)?;
            }
        }
        Ok(())
    }

    fn load_schema_file(&mut self, path: &Path) -> Result<()> {
        let contents = fs::read_to_string(path)?;
        let schema: SchemaDef = serde_yaml::from_str(&contents)?;
        tracing::debug!(
            path = %path.display(),
            schema = %schema.name,
            tables = schema.tables.len(),
            "loaded schema declaration"
        );
        self.insert(schema)
    }

    pub fn get_schema(&self, name: &str) -> Option<&SchemaDef> {
        self.schemas.get(name)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
