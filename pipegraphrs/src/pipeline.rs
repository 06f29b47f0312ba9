//! Resolved, immutable table graph.
//!
//! A [`Pipeline`] is built once from a [`SchemaRegistry`] and a
//! [`PipegraphConfig`]. Every foreign key is resolved to a table id at build
//! time, so lookups through [`SchemaHandle`] and [`TableHandle`] never fail
//! on dangling references.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::config::PipegraphConfig;
use crate::error::{PipegraphError, Result};
use crate::naming;
use crate::registry::SchemaRegistry;
use crate::tables::{ForeignKeyDef, TableRef, Tier};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(usize);

#[derive(Debug, Clone)]
struct ParentEdge {
    table: TableId,
    primary: bool,
    nullable: bool,
}

#[derive(Debug)]
struct TableNode {
    schema: String,
    class_name: String,
    tier: Tier,
    table_name: String,
    full_table_name: String,
    primary_key: Vec<String>,
    parents: Vec<ParentEdge>,
    master: Option<TableId>,
    parts: Vec<TableId>,
    description: Option<String>,
}

#[derive(Debug)]
struct SchemaEntry {
    database: String,
    tables: Vec<TableId>,
    by_class: HashMap<String, TableId>,
    description: Option<String>,
}

#[derive(Debug)]
pub struct Pipeline {
    schemas: BTreeMap<String, SchemaEntry>,
    nodes: Vec<TableNode>,
    children: Vec<Vec<TableId>>,
    by_full_name: HashMap<String, TableId>,
    order: Vec<TableId>,
}

struct PendingParents<'r> {
    id: TableId,
    schema: &'r str,
    master: Option<TableId>,
    parents: &'r [ForeignKeyDef],
}

impl Pipeline {
    pub fn build(registry: &SchemaRegistry, config: &PipegraphConfig) -> Result<Self> {
        let mut pipeline = Pipeline {
            schemas: BTreeMap::new(),
            nodes: Vec::new(),
            children: Vec::new(),
            by_full_name: HashMap::new(),
            order: Vec::new(),
        };
        let mut pending = Vec::new();

        for (name, schema) in &registry.schemas {
            let name = name.as_str();
            if !naming::is_schema_name(name) {
                return Err(PipegraphError::Validation(format!(
                    "schema name {name} must be lowercase snake_case"
                )));
            }
            let database = schema
                .database
                .clone()
                .unwrap_or_else(|| config.database_for(name));
            tracing::debug!(schema = %name, database = %database, "declaring schema");
            let mut entry = SchemaEntry {
                database,
                tables: Vec::new(),
                by_class: HashMap::new(),
                description: schema.description.clone(),
            };

            for table in &schema.tables {
                let table_name = naming::table_name(&table.name, table.tier);
                let master = pipeline.declare(
                    &mut entry,
                    name,
                    table.name.clone(),
                    table.tier,
                    table_name.clone(),
                    table.primary_key.clone(),
                    None,
                    table.description.clone(),
                )?;
                pending.push(PendingParents {
                    id: master,
                    schema: name,
                    master: None,
                    parents: &table.parents,
                });

                for part in &table.parts {
                    let id = pipeline.declare(
                        &mut entry,
                        name,
                        format!("{}.{}", table.name, part.name),
                        Tier::Part,
                        naming::part_table_name(&table_name, &part.name),
                        part.primary_key.clone(),
                        Some(master),
                        part.description.clone(),
                    )?;
                    pipeline.nodes[master.0].parts.push(id);
                    pending.push(PendingParents {
                        id,
                        schema: name,
                        master: Some(master),
                        parents: &part.parents,
                    });
                }
            }
            pipeline.schemas.insert(name.to_string(), entry);
        }

        for item in pending {
            pipeline.resolve_parents(item)?;
        }

        pipeline.children = vec![Vec::new(); pipeline.nodes.len()];
        for (idx, node) in pipeline.nodes.iter().enumerate() {
            for edge in &node.parents {
                pipeline.children[edge.table.0].push(TableId(idx));
            }
        }

        pipeline.order = pipeline.topological_order()?;
        tracing::info!(
            schemas = pipeline.schemas.len(),
            tables = pipeline.nodes.len(),
            "pipeline resolved"
        );
        Ok(pipeline)
    }

    #[allow(clippy::too_many_arguments)]
    fn declare(
        &mut self,
        entry: &mut SchemaEntry,
        schema: &str,
        class_name: String,
        tier: Tier,
        table_name: String,
        primary_key: Vec<String>,
        master: Option<TableId>,
        description: Option<String>,
    ) -> Result<TableId> {
        if entry.by_class.contains_key(&class_name) {
            return Err(PipegraphError::Validation(format!(
                "table {schema}.{class_name} declared more than once"
            )));
        }
        let full_table_name = naming::full_table_name(&entry.database, &table_name);
        let id = TableId(self.nodes.len());
        if let Some(existing) = self.by_full_name.get(&full_table_name) {
            let other = &self.nodes[existing.0];
            return Err(PipegraphError::Validation(format!(
                "{schema}.{class_name} and {}.{} share full table name {full_table_name}",
                other.schema, other.class_name
            )));
        }
        self.by_full_name.insert(full_table_name.clone(), id);
        entry.by_class.insert(class_name.clone(), id);
        entry.tables.push(id);
        self.nodes.push(TableNode {
            schema: schema.to_string(),
            class_name,
            tier,
            table_name,
            full_table_name,
            primary_key,
            parents: Vec::new(),
            master,
            parts: Vec::new(),
            description,
        });
        Ok(id)
    }

    fn resolve_parents(&mut self, item: PendingParents<'_>) -> Result<()> {
        let mut edges = Vec::with_capacity(item.parents.len() + 1);
        if let Some(master) = item.master {
            edges.push(ParentEdge {
                table: master,
                primary: true,
                nullable: false,
            });
        }
        for fk in item.parents {
            let reference = TableRef::parse(&fk.table)?;
            let schema_name = reference.schema.as_deref().unwrap_or(item.schema);
            let target = self.lookup(schema_name, &reference.class_path).ok_or_else(|| {
                let node = &self.nodes[item.id.0];
                PipegraphError::UnknownTable(format!(
                    "{schema_name}.{} (referenced by {}.{})",
                    reference.class_path, node.schema, node.class_name
                ))
            })?;
            if target == item.id {
                let node = &self.nodes[item.id.0];
                return Err(PipegraphError::Validation(format!(
                    "table {}.{} references itself",
                    node.schema, node.class_name
                )));
            }
            if edges.iter().any(|e| e.table == target) {
                let node = &self.nodes[item.id.0];
                return Err(PipegraphError::Validation(format!(
                    "table {}.{} references {} more than once",
                    node.schema,
                    node.class_name,
                    self.handle(target)
                )));
            }
            edges.push(ParentEdge {
                table: target,
                primary: fk.primary,
                nullable: fk.nullable,
            });
        }
        self.nodes[item.id.0].parents = edges;
        Ok(())
    }

    fn lookup(&self, schema: &str, class_path: &str) -> Option<TableId> {
        self.schemas
            .get(schema)
            .and_then(|entry| entry.by_class.get(class_path))
            .copied()
    }

    // Kahn's algorithm; ties broken by declaration order. Parent edges are
    // unique per child, so each child edge lowers the indegree by one.
    fn topological_order(&self) -> Result<Vec<TableId>> {
        let mut indegree: Vec<usize> = self.nodes.iter().map(|n| n.parents.len()).collect();
        let mut ready: VecDeque<TableId> = (0..self.nodes.len())
            .filter(|&i| indegree[i] == 0)
            .map(TableId)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(id) = ready.pop_front() {
            order.push(id);
            for &child in &self.children[id.0] {
                indegree[child.0] -= 1;
                if indegree[child.0] == 0 {
                    ready.push_back(child);
                }
            }
        }

        if order.len() < self.nodes.len() {
            let placed: HashSet<TableId> = order.iter().copied().collect();
            let stuck: Vec<String> = (0..self.nodes.len())
                .map(TableId)
                .filter(|id| !placed.contains(id))
                .map(|id| self.handle(id).to_string())
                .collect();
            return Err(PipegraphError::Validation(format!(
                "dependency cycle among tables: {}",
                stuck.join(", ")
            )));
        }
        Ok(order)
    }

    fn handle(&self, id: TableId) -> TableHandle<'_> {
        TableHandle { pipeline: self, id }
    }

    pub fn schema(&self, name: &str) -> Option<SchemaHandle<'_>> {
        self.schemas
            .get_key_value(name)
            .map(|(name, entry)| SchemaHandle {
                pipeline: self,
                name: name.as_str(),
                entry,
            })
    }

    pub fn get_schema(&self, name: &str) -> Result<SchemaHandle<'_>> {
        self.schema(name)
            .ok_or_else(|| PipegraphError::UnknownSchema(name.to_string()))
    }

    pub fn schema_names(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    /// Resolve a schema-qualified path such as `ephys.ProbeInsertion` or
    /// `probe.ProbeType.Electrode`.
    pub fn table(&self, path: &str) -> Result<TableHandle<'_>> {
        let reference = TableRef::parse(path)?;
        let schema_name = reference.schema.ok_or_else(|| {
            PipegraphError::Validation(format!("table path {path:?} must be schema-qualified"))
        })?;
        self.get_schema(&schema_name)?.get(&reference.class_path)
    }

    pub fn by_full_name(&self, full_table_name: &str) -> Option<TableHandle<'_>> {
        self.by_full_name
            .get(full_table_name)
            .map(|&id| self.handle(id))
    }

    /// All tables, parents before children.
    pub fn tables(&self) -> impl Iterator<Item = TableHandle<'_>> + '_ {
        self.order.iter().map(move |&id| self.handle(id))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// One schema of a resolved pipeline.
#[derive(Clone, Copy)]
pub struct SchemaHandle<'p> {
    pipeline: &'p Pipeline,
    name: &'p str,
    entry: &'p SchemaEntry,
}

impl<'p> SchemaHandle<'p> {
    pub fn name(&self) -> &'p str {
        self.name
    }

    pub fn database(&self) -> &'p str {
        &self.entry.database
    }

    pub fn description(&self) -> Option<&'p str> {
        self.entry.description.as_deref()
    }

    /// Look up a class (`Probe`) or part (`ProbeType.Electrode`).
    pub fn table(&self, class_path: &str) -> Option<TableHandle<'p>> {
        self.entry
            .by_class
            .get(class_path)
            .map(|&id| self.pipeline.handle(id))
    }

    pub fn get(&self, class_path: &str) -> Result<TableHandle<'p>> {
        self.table(class_path)
            .ok_or_else(|| PipegraphError::UnknownTable(format!("{}.{class_path}", self.name)))
    }

    /// Tables in declaration order, each master followed by its parts.
    pub fn tables(&self) -> impl Iterator<Item = TableHandle<'p>> + 'p {
        let pipeline = self.pipeline;
        let entry = self.entry;
        entry
            .tables
            .iter()
            .map(move |&id| pipeline.handle(id))
    }
}

impl fmt::Debug for SchemaHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaHandle")
            .field("name", &self.name)
            .field("database", &self.entry.database)
            .finish()
    }
}

/// A table within a resolved pipeline.
///
/// Handles compare and hash by full table name.
#[derive(Clone, Copy)]
pub struct TableHandle<'p> {
    pipeline: &'p Pipeline,
    id: TableId,
}

impl<'p> TableHandle<'p> {
    fn node(&self) -> &'p TableNode {
        &self.pipeline.nodes[self.id.0]
    }

    pub fn id(&self) -> TableId {
        self.id
    }

    pub fn full_table_name(&self) -> &'p str {
        &self.node().full_table_name
    }

    pub fn table_name(&self) -> &'p str {
        &self.node().table_name
    }

    /// `Session`, or `Master.Part` for part tables.
    pub fn class_name(&self) -> &'p str {
        &self.node().class_name
    }

    pub fn schema_name(&self) -> &'p str {
        &self.node().schema
    }

    pub fn database(&self) -> &'p str {
        &self.pipeline.schemas[&self.node().schema].database
    }

    pub fn tier(&self) -> Tier {
        self.node().tier
    }

    /// Primary attributes declared on the table itself.
    pub fn primary_key(&self) -> &'p [String] {
        &self.node().primary_key
    }

    pub fn description(&self) -> Option<&'p str> {
        self.node().description.as_deref()
    }

    /// Parent tables in declaration order.
    pub fn parent_handles(&self) -> Vec<TableHandle<'p>> {
        self.node()
            .parents
            .iter()
            .map(|e| self.pipeline.handle(e.table))
            .collect()
    }

    /// Full table names of the parents, in declaration order.
    pub fn parent_names(&self) -> Vec<&'p str> {
        self.node()
            .parents
            .iter()
            .map(|e| self.pipeline.nodes[e.table.0].full_table_name.as_str())
            .collect()
    }

    /// Parents whose attributes join this table's primary key.
    pub fn primary_parent_handles(&self) -> Vec<TableHandle<'p>> {
        self.node()
            .parents
            .iter()
            .filter(|e| e.primary)
            .map(|e| self.pipeline.handle(e.table))
            .collect()
    }

    /// Parents referenced through nullable foreign keys.
    pub fn nullable_parent_handles(&self) -> Vec<TableHandle<'p>> {
        self.node()
            .parents
            .iter()
            .filter(|e| e.nullable)
            .map(|e| self.pipeline.handle(e.table))
            .collect()
    }

    /// Tables declaring a foreign key to this one, in declaration order.
    pub fn children(&self) -> Vec<TableHandle<'p>> {
        self.pipeline.children[self.id.0]
            .iter()
            .map(|&id| self.pipeline.handle(id))
            .collect()
    }

    /// Every transitive parent, in topological order.
    pub fn ancestors(&self) -> Vec<TableHandle<'p>> {
        self.reachable(|id| self.pipeline.nodes[id.0].parents.iter().map(|e| e.table).collect())
    }

    /// Every transitive child, in topological order.
    pub fn descendants(&self) -> Vec<TableHandle<'p>> {
        self.reachable(|id| self.pipeline.children[id.0].clone())
    }

    fn reachable(&self, next: impl Fn(TableId) -> Vec<TableId>) -> Vec<TableHandle<'p>> {
        let mut seen = HashSet::new();
        let mut stack = next(self.id);
        while let Some(id) = stack.pop() {
            if seen.insert(id) {
                stack.extend(next(id));
            }
        }
        self.pipeline
            .order
            .iter()
            .filter(|id| seen.contains(id))
            .map(|&id| self.pipeline.handle(id))
            .collect()
    }

    pub fn is_part(&self) -> bool {
        self.node().master.is_some()
    }

    pub fn master(&self) -> Option<TableHandle<'p>> {
        self.node().master.map(|id| self.pipeline.handle(id))
    }

    pub fn parts(&self) -> Vec<TableHandle<'p>> {
        self.node()
            .parts
            .iter()
            .map(|&id| self.pipeline.handle(id))
            .collect()
    }
}

impl PartialEq for TableHandle<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.full_table_name() == other.full_table_name()
    }
}

impl Eq for TableHandle<'_> {}

impl Hash for TableHandle<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.full_table_name().hash(state);
    }
}

impl fmt::Display for TableHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema_name(), self.class_name())
    }
}

impl fmt::Debug for TableHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableHandle")
            .field("class", &format_args!("{self}"))
            .field("full_table_name", &self.full_table_name())
            .finish()
    }
}
