//! Parent-chain verification.
//!
//! A table's parents are compared position by position, by full table name,
//! against an expected ordered list. Count mismatches are reported before any
//! name is compared.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::Result;
use crate::pipeline::{Pipeline, TableHandle};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParentageMismatch {
    #[error("{child} has {} parent(s) {actual:?}, expected {} {expected:?}", .actual.len(), .expected.len())]
    Count {
        child: String,
        expected: Vec<String>,
        actual: Vec<String>,
    },
    #[error("{child} parent at position {position} is {actual}, expected {expected}")]
    Name {
        child: String,
        position: usize,
        expected: String,
        actual: String,
    },
}

/// Check that `child`'s parents are exactly `expected`, in order.
pub fn verify_parentage(
    child: TableHandle<'_>,
    expected: &[TableHandle<'_>],
) -> std::result::Result<(), ParentageMismatch> {
    let expected: Vec<&str> = expected.iter().map(|t| t.full_table_name()).collect();
    verify_parent_names(child, &expected)
}

/// Same as [`verify_parentage`] with expected full table names given directly.
pub fn verify_parent_names(
    child: TableHandle<'_>,
    expected: &[&str],
) -> std::result::Result<(), ParentageMismatch> {
    let actual: Vec<&str> = child
        .parent_handles()
        .iter()
        .map(|t| t.full_table_name())
        .collect();

    if actual.len() != expected.len() {
        return Err(ParentageMismatch::Count {
            child: child.full_table_name().to_string(),
            expected: expected.iter().map(|s| s.to_string()).collect(),
            actual: actual.iter().map(|s| s.to_string()).collect(),
        });
    }

    for (position, (found, wanted)) in actual.iter().zip(expected).enumerate() {
        if found != wanted {
            return Err(ParentageMismatch::Name {
                child: child.full_table_name().to_string(),
                position,
                expected: wanted.to_string(),
                actual: found.to_string(),
            });
        }
    }
    Ok(())
}

/// Panicking form of [`verify_parentage`] for test bodies.
#[track_caller]
pub fn assert_parentage(child: TableHandle<'_>, expected: &[TableHandle<'_>]) {
    if let Err(mismatch) = verify_parentage(child, expected) {
        panic!("parentage assertion failed: {mismatch}");
    }
}

/// Expected parents of one table, addressed by schema-qualified paths.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ParentageExpectation {
    pub table: String,
    pub parents: Vec<String>,
}

impl ParentageExpectation {
    pub fn new<I, S>(table: impl Into<String>, parents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            table: table.into(),
            parents: parents.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationReport {
    /// Paths of the tables whose parents matched.
    pub passed: Vec<String>,
    pub failures: Vec<ParentageMismatch>,
}

impl VerificationReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Verify every expectation and collect mismatches. Paths that do not resolve
/// are errors, not mismatches.
pub fn verify_expectations(
    pipeline: &Pipeline,
    expectations: &[ParentageExpectation],
) -> Result<VerificationReport> {
    let mut report = VerificationReport::default();
    for expectation in expectations {
        let child = pipeline.table(&expectation.table)?;
        let expected = expectation
            .parents
            .iter()
            .map(|path| pipeline.table(path))
            .collect::<Result<Vec<_>>>()?;

        match verify_parentage(child, &expected) {
            Ok(()) => {
                tracing::debug!(table = %expectation.table, "parentage verified");
                report.passed.push(expectation.table.clone());
            }
            Err(mismatch) => {
                tracing::warn!(table = %expectation.table, %mismatch, "parentage mismatch");
                report.failures.push(mismatch);
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipegraphConfig;
    use crate::registry::SchemaRegistry;
    use crate::tables::{SchemaDef, TableDef, Tier};

    fn pipeline() -> Pipeline {
        let registry = SchemaRegistry::from_parts(vec![SchemaDef::new("lab")
            .with_table(TableDef::new("Root", Tier::Manual).key("id"))
            .with_table(TableDef::new("Other", Tier::Lookup).key("id"))
            .with_table(
                TableDef::new("Leaf", Tier::Manual)
                    .key("n")
                    .parent("Root")
                    .parent("Other"),
            )])
        .unwrap();
        Pipeline::build(&registry, &PipegraphConfig::default()).unwrap()
    }

    #[test]
    fn count_mismatch_message_lists_both_sides() {
        let p = pipeline();
        let root = p.table("lab.Root").unwrap();
        let other = p.table("lab.Other").unwrap();
        let err = verify_parentage(root, &[other]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "`lab`.`root` has 0 parent(s) [], expected 1 [\"`lab`.`#other`\"]"
        );
    }

    #[test]
    fn name_mismatch_reports_first_position() {
        let p = pipeline();
        let leaf = p.table("lab.Leaf").unwrap();
        let root = p.table("lab.Root").unwrap();
        let err = verify_parentage(leaf, &[root, root]).unwrap_err();
        assert_eq!(
            err,
            ParentageMismatch::Name {
                child: "`lab`.`leaf`".to_string(),
                position: 1,
                expected: "`lab`.`root`".to_string(),
                actual: "`lab`.`#other`".to_string(),
            }
        );
    }

    #[test]
    fn empty_expectation_matches_root_table() {
        let p = pipeline();
        assert!(verify_parentage(p.table("lab.Root").unwrap(), &[]).is_ok());
    }

    #[test]
    #[should_panic(expected = "parentage assertion failed")]
    fn assert_parentage_panics_on_mismatch() {
        let p = pipeline();
        let leaf = p.table("lab.Leaf").unwrap();
        let root = p.table("lab.Root").unwrap();
        assert_parentage(leaf, &[root]);
    }

    #[test]
    fn report_collects_every_failure() {
        let p = pipeline();
        let report = verify_expectations(
            &p,
            &[
                ParentageExpectation::new("lab.Leaf", ["lab.Root", "lab.Other"]),
                ParentageExpectation::new("lab.Leaf", ["lab.Other", "lab.Root"]),
                ParentageExpectation::new("lab.Root", ["lab.Other"]),
            ],
        )
        .unwrap();
        assert!(!report.is_success());
        assert_eq!(report.passed, vec!["lab.Leaf"]);
        assert_eq!(report.failures.len(), 2);
        assert!(matches!(report.failures[0], ParentageMismatch::Name { position: 0, .. }));
        assert!(matches!(report.failures[1], ParentageMismatch::Count { .. }));
    }

    #[test]
    fn unresolvable_expectation_is_an_error() {
        let p = pipeline();
        let err = verify_expectations(&p, &[ParentageExpectation::new("lab.Missing", ["lab.Root"])])
            .unwrap_err();
        assert!(matches!(err, crate::PipegraphError::UnknownTable(_)));
    }
}
