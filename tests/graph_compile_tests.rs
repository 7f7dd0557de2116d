//! Compiling a session into a graph: emitted triples, ordering, serialization
//! and validation outcomes.

mod support;

use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, anyhow};
use assert_matches::assert_matches;
use brick_mason::ontology::{Severity, ValidationReport, ValidationResult};
use brick_mason::{FieldInput, GraphValidator, MasonError, Session, vocab};
use oxigraph::model::{Literal, NamedOrBlankNode, Term, Triple, TripleRef};
use oxigraph::store::Store;

use support::{BLDG, BRICK, bldg, bldg_node, brick, schema_with, session, unit};

const BINDINGS: &[(&str, &str)] = &[("brick", BRICK), ("bldg", BLDG)];

fn triple(subject: &str, predicate: oxigraph::model::NamedNode, object: Term) -> Triple {
    Triple::new(bldg_node(subject), predicate, object)
}

#[test]
fn empty_session_compiles_to_an_empty_graph() -> Result<()> {
    let session = session()?;
    let graph = session.compile(BINDINGS)?;

    assert!(graph.is_empty());
    assert_eq!(graph.prefixes().len(), 2);
    Ok(())
}

#[test]
fn feeds_compiles_to_exactly_three_triples_in_order() -> Result<()> {
    let mut session = session()?;
    let ahu = session.create_entity("AHU", &bldg("ahu1"), None)?;
    let vav = session.create_entity("VAV", &bldg("vav1"), None)?;
    session.add_relation(ahu, "feeds", vav)?;

    let graph = session.compile(BINDINGS)?;

    assert_eq!(
        graph.triples(),
        &[
            triple("ahu1", vocab::TYPE.into_owned(), brick("AHU").into()),
            triple("ahu1", brick("feeds"), bldg_node("vav1").into()),
            triple("vav1", vocab::TYPE.into_owned(), brick("VAV").into()),
        ]
    );
    assert!(graph.contains(TripleRef::new(
        bldg_node("ahu1").as_ref(),
        brick("feeds").as_ref(),
        bldg_node("vav1").as_ref(),
    )));
    assert_eq!(graph.store().len()?, 3);
    Ok(())
}

#[test]
fn repeated_relations_emit_one_triple() -> Result<()> {
    let mut session = session()?;
    let ahu = session.create_entity("AHU", &bldg("ahu1"), None)?;
    let vav = session.create_entity("VAV", &bldg("vav1"), None)?;
    session.add_relation(ahu, "feeds", vav)?;
    session.add_relation(ahu, "feeds", vav)?;
    assert_eq!(session.relation(ahu, "feeds")?.len(), 2);

    let graph = session.compile(BINDINGS)?;
    assert_eq!(graph.len(), 3);
    assert_eq!(graph.store().len()?, 3);
    let ntriples = graph.to_ntriples()?;
    assert_eq!(ntriples.lines().filter(|l| !l.trim().is_empty()).count(), 3);

    let debug = format!("{graph:?}");
    assert!(debug.starts_with("CompiledGraph"));
    assert!(debug.contains("triples: 3"));
    Ok(())
}

#[test]
fn ntriples_follow_emission_order() -> Result<()> {
    let mut session = session()?;
    let ahu = session.create_entity("AHU", &bldg("ahu1"), None)?;
    let vav2 = session.create_entity("VAV", &bldg("vav2"), None)?;
    let vav1 = session.create_entity("VAV", &bldg("vav1"), None)?;
    session.add_relation(ahu, "feeds", vav2)?;
    session.add_relation(ahu, "feeds", vav1)?;

    let ntriples = session.compile(BINDINGS)?.to_ntriples()?;
    let lines: Vec<&str> = ntriples.lines().filter(|l| !l.trim().is_empty()).collect();

    assert_eq!(lines.len(), 5);
    assert!(lines[1].contains("<urn:bldg#vav2>"));
    assert!(lines[2].contains("<urn:bldg#vav1>"));
    assert!(lines[3].starts_with("<urn:bldg#vav2>"));
    Ok(())
}

#[test]
fn turtle_uses_the_namespace_bindings() -> Result<()> {
    let mut session = session()?;
    let ahu = session.create_entity("AHU", &bldg("ahu1"), None)?;
    let vav = session.create_entity("VAV", &bldg("vav1"), None)?;
    session.add_relation(ahu, "feeds", vav)?;

    let turtle = session.compile(BINDINGS)?.to_turtle()?;
    assert!(turtle.contains("@prefix brick: <https://brickschema.org/schema/Brick#>"));
    assert!(turtle.contains("brick:feeds"));

    let reloaded = Store::new()?;
    reloaded.load_from_reader(oxigraph::io::RdfFormat::Turtle, turtle.as_bytes())?;
    assert_eq!(reloaded.len()?, 3);
    Ok(())
}

#[test]
fn records_compile_to_blank_nodes_typed_with_their_shape() -> Result<()> {
    let mut session = session()?;
    let site = session.create_entity("Building", &bldg("mysite"), None)?;
    let floor = session.create_entity("Floor", &bldg("floor1"), None)?;
    let area = session
        .record("AreaShape")?
        .set("value", 1200.0)
        .set("hasUnit", "Square_Foot")
        .build()?;
    session.add_relation(site, "hasPart", floor)?;
    session.add_relation(site, "area", area)?;

    let graph = session.compile(BINDINGS)?;
    assert_eq!(graph.len(), 7);

    let record_node: NamedOrBlankNode = session.get_record(area)?.id().clone().into();
    let record_term: Term = session.get_record(area)?.id().clone().into();
    assert!(graph.triples().contains(&triple("mysite", brick("area"), record_term)));
    assert!(graph.triples().contains(&Triple::new(
        record_node.clone(),
        vocab::TYPE.into_owned(),
        brick("AreaShape"),
    )));
    assert!(graph.triples().contains(&Triple::new(
        record_node.clone(),
        brick("value"),
        Literal::new_typed_literal("1200", vocab::XSD_DECIMAL),
    )));
    assert!(graph.triples().contains(&Triple::new(
        record_node,
        brick("hasUnit"),
        unit("FT2"),
    )));
    Ok(())
}

#[test]
fn unset_optional_fields_emit_nothing_and_references_emit_uris() -> Result<()> {
    let schema = schema_with(|config| {
        config.extra_shapes = vec!["ThermalTransmittanceShape".to_string()];
    })?;
    let mut session = Session::new(schema);
    let sensor = session.create_entity("Temperature_Sensor", &bldg("ts1"), None)?;
    let bare = session
        .record("ThermalTransmittanceShape")?
        .set("value", 0.35)
        .build()?;
    let measured = session
        .record("ThermalTransmittanceShape")?
        .set("value", 0.5)
        .set("measuredBy", sensor)
        .build()?;

    let graph = session.compile(BINDINGS)?;
    // sensor type, 2 triples for the bare record, 3 for the measured one
    assert_eq!(graph.len(), 6);

    let bare_node: NamedOrBlankNode = session.get_record(bare)?.id().clone().into();
    assert_eq!(
        graph
            .triples()
            .iter()
            .filter(|t| t.subject == bare_node)
            .count(),
        2
    );
    let measured_node: NamedOrBlankNode = session.get_record(measured)?.id().clone().into();
    assert!(graph.triples().contains(&Triple::new(
        measured_node,
        brick("measuredBy"),
        bldg_node("ts1"),
    )));
    Ok(())
}

#[test]
fn unit_references_satisfy_class_constraints_through_the_ontology() -> Result<()> {
    let schema = schema_with(|config| {
        config.extra_shapes = vec!["ThermalTransmittanceShape".to_string()];
    })?;
    let mut session = Session::new(schema);
    let site = session.create_entity("Building", &bldg("mysite"), None)?;
    let area = session
        .record("AreaShape")?
        .set("value", 80.0)
        .set("hasUnit", "Square_Metre")
        .build()?;
    session.add_relation(site, "area", area)?;
    let thermal = session
        .record("ThermalTransmittanceShape")?
        .set("value", 0.35)
        .set("hasUnit", "Kilowatt")
        .build()?;

    let graph = session.compile(BINDINGS)?;
    let thermal_node: NamedOrBlankNode = session.get_record(thermal)?.id().clone().into();
    assert!(graph.triples().contains(&Triple::new(
        thermal_node,
        brick("hasUnit"),
        unit("KiloW"),
    )));
    Ok(())
}

#[test]
fn non_unit_iri_fails_the_unit_class_constraint() -> Result<()> {
    let schema = schema_with(|config| {
        config.extra_shapes = vec!["ThermalTransmittanceShape".to_string()];
    })?;
    let mut session = Session::new(schema);
    session
        .record("ThermalTransmittanceShape")?
        .set("value", 0.35)
        .set("hasUnit", FieldInput::Iri(bldg_node("not_a_unit")))
        .build()?;

    let err = session.compile(BINDINGS).unwrap_err();
    let report = err.validation_report().expect("validation report");
    assert_eq!(report.violation_count(), 1);
    assert_eq!(report.results()[0].source_constraint(), Some("sh:class"));
    assert_eq!(report.results()[0].value(), Some(bldg("not_a_unit").as_str()));
    Ok(())
}

#[test]
fn non_conforming_graph_fails_with_the_full_report() -> Result<()> {
    let mut session = session()?;
    let meter = session.create_entity("Meter", &bldg("meter1"), None)?;

    let err = session.compile(BINDINGS).unwrap_err();
    let report = err.validation_report().expect("validation report");
    assert!(!report.conforms());
    assert_eq!(report.violation_count(), 1);
    let result = &report.results()[0];
    assert_eq!(result.focus_node(), bldg("meter1"));
    assert_eq!(result.source_constraint(), Some("sh:minCount"));
    assert_eq!(result.message(), "A meter must meter some equipment");
    assert!(err.to_string().contains("Conforms: false"));

    // The model can be corrected and compiled again
    let ahu = session.create_entity("AHU", &bldg("ahu1"), None)?;
    session.add_relation(meter, "meters", ahu)?;
    let graph = session.compile(BINDINGS)?;
    assert_eq!(graph.len(), 3);
    Ok(())
}

#[test]
fn labels_are_emitted_only_when_enabled() -> Result<()> {
    let schema = schema_with(|config| config.emit_labels = true)?;
    let mut session = Session::new(schema);
    session.create_entity("AHU", &bldg("ahu1"), Some("AHU-1"))?;
    session.create_entity("VAV", &bldg("vav1"), None)?;

    let graph = session.compile(BINDINGS)?;
    assert_eq!(graph.len(), 3);
    assert!(graph.triples().contains(&triple(
        "ahu1",
        vocab::LABEL.into_owned(),
        Literal::new_simple_literal("AHU-1").into(),
    )));

    let mut plain = support::session()?;
    plain.create_entity("AHU", &bldg("ahu1"), Some("AHU-1"))?;
    assert_eq!(plain.compile(BINDINGS)?.len(), 1);
    Ok(())
}

#[test]
fn invalid_namespace_binding_is_rejected_before_emission() -> Result<()> {
    let mut session = session()?;
    session.create_entity("AHU", &bldg("ahu1"), None)?;

    let err = session.compile(&[("bad", "not an iri")]).unwrap_err();
    assert_matches!(err, MasonError::InvalidIri { ref iri, .. } if iri == "not an iri");
    Ok(())
}

struct CountingValidator {
    calls: AtomicUsize,
    verdict: Severity,
}

impl GraphValidator for CountingValidator {
    fn validate(&self, data: &Store) -> Result<ValidationReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut report = ValidationReport::new();
        report.add_result(ValidationResult::new(
            "urn:test".to_string(),
            format!("saw {} triples", data.len()?),
            self.verdict,
            "urn:test#Shape".to_string(),
        ));
        Ok(report)
    }
}

struct BrokenValidator;

impl GraphValidator for BrokenValidator {
    fn validate(&self, _data: &Store) -> Result<ValidationReport> {
        Err(anyhow!("shapes graph unavailable"))
    }
}

#[test]
fn compile_goes_through_the_supplied_validator() -> Result<()> {
    let mut session = session()?;
    // Fails the built-in shapes, but the supplied validator decides
    session.create_entity("Meter", &bldg("meter1"), None)?;

    let lenient = CountingValidator {
        calls: AtomicUsize::new(0),
        verdict: Severity::Warning,
    };
    let graph = session.compile_with(BINDINGS, &lenient)?;
    assert_eq!(graph.len(), 1);
    assert_eq!(lenient.calls.load(Ordering::SeqCst), 1);

    let strict = CountingValidator {
        calls: AtomicUsize::new(0),
        verdict: Severity::Violation,
    };
    let err = session.compile_with(BINDINGS, &strict).unwrap_err();
    assert_matches!(
        err.validation_report().map(|r| r.results()[0].message().to_string()),
        Some(message) if message == "saw 1 triples"
    );

    let err = session.compile_with(BINDINGS, &BrokenValidator).unwrap_err();
    assert_matches!(err, MasonError::ValidationEngine(ref msg) if msg.contains("unavailable"));
    Ok(())
}

#[test]
fn schema_validator_can_be_replaced() -> Result<()> {
    let schema = support::introspector()?;
    let schema = brick_mason::Schema::build(&schema, &brick_mason::SchemaConfig::default())?
        .with_validator(CountingValidator {
            calls: AtomicUsize::new(0),
            verdict: Severity::Info,
        });
    let mut session = Session::new(std::sync::Arc::new(schema));
    session.create_entity("Meter", &bldg("meter1"), None)?;

    assert_eq!(session.compile(BINDINGS)?.len(), 1);
    Ok(())
}
