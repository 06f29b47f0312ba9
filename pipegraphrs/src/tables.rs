use std::fmt;

use serde::{de, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PipegraphError, Result};

/// A schema groups the tables of one pipeline domain (`subject`, `session`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaDef {
    pub name: String,
    /// Explicit database name. When absent the configured prefix is applied.
    #[serde(default)]
    pub database: Option<String>,
    /// Tables in declaration order.
    #[serde(default)]
    pub tables: Vec<TableDef>,
    pub description: Option<String>,
}

impl SchemaDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            database: None,
            tables: Vec::new(),
            description: None,
        }
    }

    pub fn with_table(mut self, table: TableDef) -> Self {
        self.tables.push(table);
        self
    }

    pub fn get_table(&self, name: &str) -> Option<&TableDef> {
        self.tables.iter().find(|t| t.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableDef {
    /// CamelCase class name, unique within its schema.
    pub name: String,
    pub tier: Tier,
    /// Primary attributes declared by the table itself (not inherited).
    pub primary_key: Vec<String>,
    /// Foreign keys in declaration order.
    pub parents: Vec<ForeignKeyDef>,
    pub parts: Vec<PartDef>,
    pub description: Option<String>,
}

impl TableDef {
    pub fn new(name: impl Into<String>, tier: Tier) -> Self {
        Self {
            name: name.into(),
            tier,
            primary_key: Vec::new(),
            parents: Vec::new(),
            parts: Vec::new(),
            description: None,
        }
    }

    pub fn key(mut self, attr: impl Into<String>) -> Self {
        self.primary_key.push(attr.into());
        self
    }

    pub fn parent(mut self, fk: impl Into<ForeignKeyDef>) -> Self {
        self.parents.push(fk.into());
        self
    }

    pub fn part(mut self, part: PartDef) -> Self {
        self.parts.push(part);
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl<'de> Deserialize<'de> for TableDef {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(deny_unknown_fields)]
        struct Raw {
            name: String,
            tier: Tier,
            #[serde(default)]
            primary_key: Option<KeyAttrs>,
            #[serde(default)]
            primary_keys: Option<KeyAttrs>,
            #[serde(default)]
            parents: Vec<ForeignKeyDef>,
            #[serde(default)]
            parts: Vec<PartDef>,
            description: Option<String>,
        }

        let raw = Raw::deserialize(deserializer)?;
        let primary_key = merge_key_attrs(&raw.name, raw.primary_key, raw.primary_keys)?;

        Ok(TableDef {
            name: raw.name,
            tier: raw.tier,
            primary_key,
            parents: raw.parents,
            parts: raw.parts,
            description: raw.description,
        })
    }
}

/// A part table nested under a master. The master is its implicit first parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartDef {
    pub name: String,
    pub primary_key: Vec<String>,
    pub parents: Vec<ForeignKeyDef>,
    pub description: Option<String>,
}

impl<'de> Deserialize<'de> for PartDef {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(deny_unknown_fields)]
        struct Raw {
            name: String,
            #[serde(default)]
            primary_key: Option<KeyAttrs>,
            #[serde(default)]
            primary_keys: Option<KeyAttrs>,
            #[serde(default)]
            parents: Vec<ForeignKeyDef>,
            description: Option<String>,
        }

        let raw = Raw::deserialize(deserializer)?;
        let primary_key = merge_key_attrs(&raw.name, raw.primary_key, raw.primary_keys)?;

        Ok(PartDef {
            name: raw.name,
            primary_key,
            parents: raw.parents,
            description: raw.description,
        })
    }
}

/// Primary attributes written as a single name or a list.
#[derive(Deserialize)]
#[serde(untagged)]
enum KeyAttrs {
    One(String),
    Many(Vec<String>),
}

impl From<KeyAttrs> for Vec<String> {
    fn from(attrs: KeyAttrs) -> Self {
        match attrs {
            KeyAttrs::One(attr) => vec![attr],
            KeyAttrs::Many(attrs) => attrs,
        }
    }
}

fn merge_key_attrs<E: de::Error>(
    owner: &str,
    primary_key: Option<KeyAttrs>,
    primary_keys: Option<KeyAttrs>,
) -> std::result::Result<Vec<String>, E> {
    match (primary_key, primary_keys) {
        (Some(_), Some(_)) => Err(E::custom(format!(
            "table {owner} sets both primary_key and primary_keys"
        ))),
        (Some(attrs), None) | (None, Some(attrs)) => Ok(attrs.into()),
        (None, None) => Ok(Vec::new()),
    }
}

impl PartDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: Vec::new(),
            parents: Vec::new(),
            description: None,
        }
    }

    pub fn key(mut self, attr: impl Into<String>) -> Self {
        self.primary_key.push(attr.into());
        self
    }

    pub fn parent(mut self, fk: impl Into<ForeignKeyDef>) -> Self {
        self.parents.push(fk.into());
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Manual,
    Lookup,
    Imported,
    Computed,
    Part,
}

impl Tier {
    /// Prefix prepended to the snake_case class name to form the table name.
    pub fn prefix(self) -> &'static str {
        match self {
            Tier::Manual | Tier::Part => "",
            Tier::Lookup => "#",
            Tier::Imported => "_",
            Tier::Computed => "__",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Tier::Manual => "manual",
            Tier::Lookup => "lookup",
            Tier::Imported => "imported",
            Tier::Computed => "computed",
            Tier::Part => "part",
        };
        f.write_str(s)
    }
}

/// A declared dependency on another table.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ForeignKeyDef {
    /// `Class`, `Master.Part`, `schema.Class` or `schema.Master.Part`.
    pub table: String,
    /// Whether the inherited attributes join the primary key.
    pub primary: bool,
    pub nullable: bool,
}

impl ForeignKeyDef {
    pub fn primary(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            primary: true,
            nullable: false,
        }
    }

    pub fn secondary(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            primary: false,
            nullable: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

impl From<&str> for ForeignKeyDef {
    fn from(table: &str) -> Self {
        ForeignKeyDef::primary(table)
    }
}

impl<'de> Deserialize<'de> for ForeignKeyDef {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        match value {
            Value::String(s) => Ok(ForeignKeyDef::primary(s)),
            other => {
                #[derive(Deserialize)]
                #[serde(deny_unknown_fields)]
                struct Full {
                    table: String,
                    #[serde(default = "default_primary")]
                    primary: bool,
                    #[serde(default)]
                    nullable: bool,
                }
                let full = Full::deserialize(other).map_err(de::Error::custom)?;
                Ok(ForeignKeyDef {
                    table: full.table,
                    primary: full.primary,
                    nullable: full.nullable,
                })
            }
        }
    }
}

fn default_primary() -> bool {
    true
}

/// Parsed form of a foreign-key target.
///
/// Segments starting with a lowercase letter name a schema; the rest is the
/// class path (`Master` or `Master.Part`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub schema: Option<String>,
    pub class_path: String,
}

impl TableRef {
    pub fn parse(reference: &str) -> Result<Self> {
        let segments: Vec<&str> = reference.split('.').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(PipegraphError::Validation(format!(
                "malformed table reference {reference:?}"
            )));
        }
        let (schema, classes) = match segments.first() {
            Some(first) if first.starts_with(|c: char| c.is_ascii_lowercase()) => {
                (Some(first.to_string()), &segments[1..])
            }
            _ => (None, &segments[..]),
        };
        if classes.is_empty() || classes.len() > 2 {
            return Err(PipegraphError::Validation(format!(
                "table reference {reference:?} must name a class or a Master.Part"
            )));
        }
        Ok(TableRef {
            schema,
            class_path: classes.join("."),
        })
    }
}
