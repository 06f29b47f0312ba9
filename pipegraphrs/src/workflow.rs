//! The electrophysiology workflow: subject, session, probe and ephys schemas.
//!
//! `generate_pipeline` declares the four schemas and activates them under the
//! configured database prefix.

use crate::config::PipegraphConfig;
use crate::error::Result;
use crate::pipeline::Pipeline;
use crate::registry::SchemaRegistry;
use crate::tables::{ForeignKeyDef, PartDef, SchemaDef, TableDef, Tier};
use crate::validation::Validator;

pub const SCHEMA_NAMES: [&str; 4] = ["subject", "session", "probe", "ephys"];

pub fn subject_schema() -> SchemaDef {
    SchemaDef::new("subject").with_table(
        TableDef::new("Subject", Tier::Manual)
            .key("subject")
            .describe("experimental animal"),
    )
}

pub fn session_schema() -> SchemaDef {
    SchemaDef::new("session")
        .with_table(
            TableDef::new("Session", Tier::Manual)
                .parent("subject.Subject")
                .key("session_datetime"),
        )
        .with_table(TableDef::new("SessionDirectory", Tier::Manual).parent("Session"))
}

pub fn probe_schema() -> SchemaDef {
    SchemaDef::new("probe")
        .with_table(
            TableDef::new("ProbeType", Tier::Lookup)
                .key("probe_type")
                .part(PartDef::new("Electrode").key("electrode")),
        )
        .with_table(
            TableDef::new("Probe", Tier::Lookup)
                .key("probe")
                .parent(ForeignKeyDef::secondary("ProbeType"))
                .describe("a physical probe, identified by serial number"),
        )
        .with_table(
            TableDef::new("ElectrodeConfig", Tier::Manual)
                .key("electrode_config_hash")
                .parent(ForeignKeyDef::secondary("ProbeType"))
                .part(PartDef::new("Electrode").parent("ProbeType.Electrode")),
        )
}

pub fn ephys_schema() -> SchemaDef {
    let unit = PartDef::new("Unit")
        .key("unit")
        .parent(ForeignKeyDef::secondary("probe.ElectrodeConfig.Electrode"));

    SchemaDef::new("ephys")
        .with_table(TableDef::new("AcquisitionSoftware", Tier::Lookup).key("acq_software"))
        .with_table(
            TableDef::new("ProbeInsertion", Tier::Manual)
                .parent("session.Session")
                .key("insertion_number")
                .parent(ForeignKeyDef::secondary("probe.Probe"))
                .describe("probe insertion implanted into an animal for a given session"),
        )
        .with_table(TableDef::new("SkullReference", Tier::Lookup).key("skull_reference"))
        .with_table(
            TableDef::new("InsertionLocation", Tier::Manual)
                .parent("ProbeInsertion")
                .parent(ForeignKeyDef::secondary("SkullReference")),
        )
        .with_table(
            TableDef::new("EphysRecording", Tier::Imported)
                .parent("ProbeInsertion")
                .parent(ForeignKeyDef::secondary("probe.ElectrodeConfig"))
                .parent(ForeignKeyDef::secondary("AcquisitionSoftware")),
        )
        .with_table(
            TableDef::new("LFP", Tier::Imported)
                .parent("EphysRecording")
                .part(PartDef::new("Electrode").parent("probe.ElectrodeConfig.Electrode")),
        )
        .with_table(TableDef::new("ClusteringMethod", Tier::Lookup).key("clustering_method"))
        .with_table(
            TableDef::new("ClusteringParamSet", Tier::Lookup)
                .key("paramset_idx")
                .parent(ForeignKeyDef::secondary("ClusteringMethod")),
        )
        .with_table(
            TableDef::new("ClusteringTask", Tier::Manual)
                .parent("EphysRecording")
                .parent("ClusteringParamSet"),
        )
        .with_table(TableDef::new("Clustering", Tier::Imported).parent("ClusteringTask"))
        .with_table(
            TableDef::new("CuratedClustering", Tier::Imported)
                .parent("Clustering")
                .part(unit),
        )
}

pub fn workflow_schemas() -> Vec<SchemaDef> {
    vec![
        subject_schema(),
        session_schema(),
        probe_schema(),
        ephys_schema(),
    ]
}

/// Declare, lint and resolve the workflow under `config`.
pub fn generate_pipeline(config: &PipegraphConfig) -> Result<Pipeline> {
    let registry = SchemaRegistry::from_parts(workflow_schemas())?;
    Validator::from_config(&config.defaults.validation).validate_registry(&registry)?;
    Pipeline::build(&registry, config)
}
