//! Table and database naming.
//!
//! Table names are the snake_case class name behind a tier prefix; part
//! tables append their own name to the master's table name. The full table
//! name quotes database and table with backticks.

use crate::tables::Tier;

/// `ProbeInsertion` -> `probe_insertion`.
pub fn to_snake_case(class_name: &str) -> String {
    let mut out = String::with_capacity(class_name.len() + 4);
    for (i, c) in class_name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

pub fn is_camel_case(class_name: &str) -> bool {
    class_name.starts_with(|c: char| c.is_ascii_uppercase())
        && class_name.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Schema names are lowercase snake_case so that a leading lowercase segment
/// in a table reference always names a schema.
pub fn is_schema_name(name: &str) -> bool {
    name.starts_with(|c: char| c.is_ascii_lowercase())
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

pub fn table_name(class_name: &str, tier: Tier) -> String {
    format!("{}{}", tier.prefix(), to_snake_case(class_name))
}

pub fn part_table_name(master_table_name: &str, part_name: &str) -> String {
    format!("{master_table_name}__{}", to_snake_case(part_name))
}

pub fn full_table_name(database: &str, table_name: &str) -> String {
    format!("`{database}`.`{table_name}`")
}
