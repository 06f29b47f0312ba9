//! Integration tests for the generated electrophysiology workflow.

use pipegraph::config::PipegraphConfig;
use pipegraph::verify::{verify_parent_names, verify_parentage, ParentageMismatch};
use pipegraph::workflow::generate_pipeline;
use pipegraph::{assert_parentage, Pipeline, PipegraphError, Tier};

fn pipeline() -> Pipeline {
    generate_pipeline(&PipegraphConfig::with_prefix("test_")).expect("pipeline")
}

#[test]
fn session_descends_from_subject() -> Result<(), PipegraphError> {
    let pipeline = pipeline();
    let subject = pipeline.get_schema("subject")?;
    let session = pipeline.get_schema("session")?;

    let parents = session.get("Session")?.parent_handles();
    let subject_tbl = parents.first().expect("session has a parent");
    assert_eq!(
        subject_tbl.full_table_name(),
        subject.get("Subject")?.full_table_name()
    );

    verify_parentage(session.get("Session")?, &[subject.get("Subject")?])?;
    Ok(())
}

#[test]
fn probe_insertion_descends_from_session_then_probe() -> Result<(), PipegraphError> {
    let pipeline = pipeline();
    let ephys = pipeline.get_schema("ephys")?;
    let probe = pipeline.get_schema("probe")?;
    let session = pipeline.get_schema("session")?;

    let insertion = ephys.get("ProbeInsertion")?;
    let parents = insertion.parent_handles();
    assert_eq!(parents.len(), 2);
    assert_eq!(
        parents[0].full_table_name(),
        session.get("Session")?.full_table_name()
    );
    assert_eq!(
        parents[1].full_table_name(),
        probe.get("Probe")?.full_table_name()
    );

    assert_parentage(insertion, &[session.get("Session")?, probe.get("Probe")?]);
    Ok(())
}

#[test]
fn reversed_parent_order_is_a_name_mismatch() {
    let pipeline = pipeline();
    let insertion = pipeline.table("ephys.ProbeInsertion").unwrap();
    let session = pipeline.table("session.Session").unwrap();
    let probe = pipeline.table("probe.Probe").unwrap();

    let err = verify_parentage(insertion, &[probe, session]).unwrap_err();
    assert_eq!(
        err,
        ParentageMismatch::Name {
            child: "`test_ephys`.`probe_insertion`".to_string(),
            position: 0,
            expected: "`test_probe`.`#probe`".to_string(),
            actual: "`test_session`.`session`".to_string(),
        }
    );
}

#[test]
fn parentless_table_reports_count_mismatch() {
    let pipeline = pipeline();
    let subject = pipeline.table("subject.Subject").unwrap();
    let session = pipeline.table("session.Session").unwrap();

    match verify_parentage(subject, &[session]) {
        Err(ParentageMismatch::Count {
            expected, actual, ..
        }) => {
            assert_eq!(expected, vec!["`test_session`.`session`"]);
            assert!(actual.is_empty());
        }
        other => panic!("expected count mismatch, got {other:?}"),
    }
}

#[test]
fn extra_expected_parent_reports_count_mismatch() {
    let pipeline = pipeline();
    let session = pipeline.table("session.Session").unwrap();
    let subject = pipeline.table("subject.Subject").unwrap();
    let probe = pipeline.table("probe.Probe").unwrap();

    let err = verify_parentage(session, &[subject, probe]).unwrap_err();
    assert!(matches!(err, ParentageMismatch::Count { .. }));
}

#[test]
fn verification_is_idempotent() {
    let pipeline = pipeline();
    let insertion = pipeline.table("ephys.ProbeInsertion").unwrap();
    let expected = [
        pipeline.table("session.Session").unwrap(),
        pipeline.table("probe.Probe").unwrap(),
    ];

    let names_before = insertion.parent_names();
    for _ in 0..3 {
        assert!(verify_parentage(insertion, &expected).is_ok());
    }
    assert_eq!(insertion.parent_names(), names_before);
}

#[test]
fn parent_names_match_parent_handles() {
    let pipeline = pipeline();
    let recording = pipeline.table("ephys.EphysRecording").unwrap();
    let from_handles: Vec<_> = recording
        .parent_handles()
        .iter()
        .map(|t| t.full_table_name())
        .collect();
    assert_eq!(recording.parent_names(), from_handles);
    assert_eq!(
        recording.parent_names(),
        vec![
            "`test_ephys`.`probe_insertion`",
            "`test_probe`.`electrode_config`",
            "`test_ephys`.`#acquisition_software`",
        ]
    );
    verify_parent_names(recording, &recording.parent_names()).unwrap();
}

#[test]
fn full_table_names_follow_prefix_and_tier() {
    let pipeline = pipeline();
    let cases = [
        ("subject.Subject", "`test_subject`.`subject`", Tier::Manual),
        ("probe.ProbeType", "`test_probe`.`#probe_type`", Tier::Lookup),
        (
            "probe.ProbeType.Electrode",
            "`test_probe`.`#probe_type__electrode`",
            Tier::Part,
        ),
        (
            "ephys.EphysRecording",
            "`test_ephys`.`_ephys_recording`",
            Tier::Imported,
        ),
        (
            "ephys.CuratedClustering.Unit",
            "`test_ephys`.`_curated_clustering__unit`",
            Tier::Part,
        ),
    ];
    for (path, full_name, tier) in cases {
        let table = pipeline.table(path).unwrap();
        assert_eq!(table.full_table_name(), full_name, "{path}");
        assert_eq!(table.tier(), tier, "{path}");
        assert_eq!(pipeline.by_full_name(full_name), Some(table));
    }
}

#[test]
fn schema_override_replaces_prefixed_database() {
    let config = PipegraphConfig::from_toml(
        r#"
[defaults.database]
prefix = "lab_"

[schemas.subject]
database = "shared_animals"
"#,
    )
    .unwrap();
    let pipeline = generate_pipeline(&config).unwrap();
    let session = pipeline.table("session.Session").unwrap();
    assert_eq!(
        session.parent_names(),
        vec!["`shared_animals`.`subject`"]
    );
    assert_eq!(session.database(), "lab_session");
}

#[test]
fn independent_pipelines_agree_by_full_name() {
    let first = pipeline();
    let second = pipeline();
    let insertion = first.table("ephys.ProbeInsertion").unwrap();
    let expected = [
        second.table("session.Session").unwrap(),
        second.table("probe.Probe").unwrap(),
    ];
    assert!(verify_parentage(insertion, &expected).is_ok());
}

#[test]
fn unknown_lookups_are_errors() {
    let pipeline = pipeline();
    assert!(matches!(
        pipeline.get_schema("lab"),
        Err(PipegraphError::UnknownSchema(_))
    ));
    assert!(matches!(
        pipeline.table("ephys.Missing"),
        Err(PipegraphError::UnknownTable(_))
    ));
    assert!(matches!(
        pipeline.table("ProbeInsertion"),
        Err(PipegraphError::Validation(_))
    ));
    assert!(pipeline.schema("ephys").unwrap().table("Missing").is_none());
}

#[test]
fn graph_queries_cover_children_and_ancestors() {
    let pipeline = pipeline();
    let insertion = pipeline.table("ephys.ProbeInsertion").unwrap();

    let children: Vec<_> = insertion.children().iter().map(|t| t.to_string()).collect();
    assert_eq!(children, vec!["ephys.InsertionLocation", "ephys.EphysRecording"]);

    let ancestors: Vec<_> = insertion.ancestors().iter().map(|t| t.to_string()).collect();
    assert_eq!(ancestors.len(), 4);
    for path in ["subject.Subject", "session.Session", "probe.ProbeType", "probe.Probe"] {
        assert!(ancestors.contains(&path.to_string()), "{path}");
    }
    let pos = |p: &str| ancestors.iter().position(|a| a == p).unwrap();
    assert!(pos("subject.Subject") < pos("session.Session"));
    assert!(pos("probe.ProbeType") < pos("probe.Probe"));

    let unit = pipeline.table("ephys.CuratedClustering.Unit").unwrap();
    assert!(unit
        .ancestors()
        .iter()
        .any(|t| t.class_name() == "ElectrodeConfig.Electrode"));
    assert!(insertion
        .descendants()
        .iter()
        .any(|t| t.class_name() == "CuratedClustering.Unit"));
}

#[test]
fn tables_are_listed_parents_first() {
    let pipeline = pipeline();
    let order: Vec<_> = pipeline.tables().collect();
    assert_eq!(order.len(), pipeline.len());
    for (idx, table) in order.iter().enumerate() {
        for parent in table.parent_handles() {
            let parent_idx = order.iter().position(|t| *t == parent).unwrap();
            assert!(parent_idx < idx, "{parent} listed after {table}");
        }
    }
}
