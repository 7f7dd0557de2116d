//! Shape validation over small inline graphs: targeting, each constraint
//! component, severities and the JSON report.

mod support;

use anyhow::Result;
use brick_mason::GraphValidator;
use brick_mason::ontology::{Severity, ShapeValidator, ValidationReport};
use oxigraph::model::NamedOrBlankNode;

use support::{TestWorkspace, bldg, bldg_node};

const PREFIXES: &str = r#"
@prefix brick: <https://brickschema.org/schema/Brick#> .
@prefix bldg: <urn:bldg#> .
@prefix sh: <http://www.w3.org/ns/shacl#> .
@prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
@prefix xsd: <http://www.w3.org/2001/XMLSchema#> .
"#;

fn validator(shapes: &str) -> Result<ShapeValidator> {
    ShapeValidator::from_turtle(&format!("{PREFIXES}{shapes}"))
}

fn validate(validator: &ShapeValidator, data: &str) -> Result<ValidationReport> {
    let store = validator.load_data_from_turtle(&format!("{PREFIXES}{data}"))?;
    validator.validate_graph(&store)
}

fn constraints(report: &ValidationReport) -> Vec<&str> {
    report
        .results()
        .iter()
        .filter_map(|r| r.source_constraint())
        .collect()
}

#[test]
fn target_class_follows_subclasses_and_class_constraints_too() -> Result<()> {
    let validator = validator(
        r#"
        brick:AHU rdfs:subClassOf brick:Equipment .
        brick:VAV rdfs:subClassOf brick:Equipment .
        brick:Point_Class rdfs:subClassOf brick:Point .

        brick:EquipmentShape a sh:NodeShape ;
            sh:targetClass brick:Equipment ;
            sh:property [ sh:path brick:hasPoint ; sh:class brick:Point ] .
        "#,
    )?;

    let ok = validate(
        &validator,
        "bldg:ahu1 a brick:AHU ; brick:hasPoint bldg:p1 . bldg:p1 a brick:Point_Class .",
    )?;
    assert!(ok.conforms());

    let bad = validate(
        &validator,
        "bldg:vav1 a brick:VAV ; brick:hasPoint bldg:ahu1 . bldg:ahu1 a brick:AHU .",
    )?;
    assert!(!bad.conforms());
    assert_eq!(constraints(&bad), vec!["sh:class"]);
    assert_eq!(bad.results()[0].focus_node(), bldg("vav1"));
    assert_eq!(bad.results()[0].value(), Some(bldg("ahu1").as_str()));
    Ok(())
}

#[test]
fn class_constraints_fall_back_to_types_in_the_shapes_graph() -> Result<()> {
    let validator = validator(
        r#"
        bldg:kw a brick:Unit .
        brick:Unit_Subclass rdfs:subClassOf brick:Unit .
        bldg:m2 a brick:Unit_Subclass .

        brick:MeasuredShape a sh:NodeShape ;
            sh:targetClass brick:Measured ;
            sh:property [ sh:path brick:hasUnit ; sh:class brick:Unit ] .
        "#,
    )?;

    let ok = validate(
        &validator,
        "bldg:a a brick:Measured ; brick:hasUnit bldg:kw . bldg:b a brick:Measured ; brick:hasUnit bldg:m2 .",
    )?;
    assert!(ok.conforms(), "{ok}");

    // A type asserted in the data wins over the shapes graph
    let bad = validate(
        &validator,
        "bldg:a a brick:Measured ; brick:hasUnit bldg:kw , bldg:x . bldg:kw a brick:Sensor .",
    )?;
    assert_eq!(constraints(&bad), vec!["sh:class", "sh:class"]);
    Ok(())
}

#[test]
fn target_node_applies_even_without_triples() -> Result<()> {
    let validator = validator(
        r#"
        brick:SiteShape a sh:NodeShape ;
            sh:targetNode bldg:site ;
            sh:property [ sh:path brick:hasPart ; sh:minCount 1 ] .
        "#,
    )?;

    let report = validate(&validator, "bldg:other brick:hasPart bldg:x .")?;
    assert_eq!(report.violation_count(), 1);
    assert_eq!(report.results()[0].focus_node(), bldg("site"));
    assert_eq!(report.results()[0].source_constraint(), Some("sh:minCount"));

    let report = validate(&validator, "bldg:site brick:hasPart bldg:floor1 .")?;
    assert!(report.conforms());
    Ok(())
}

#[test]
fn nodes_typed_with_the_shape_are_focus_nodes() -> Result<()> {
    let validator = validator(
        r#"
        brick:AreaShape a sh:NodeShape ;
            sh:property [ sh:path brick:value ; sh:datatype xsd:decimal ; sh:minCount 1 ; sh:maxCount 1 ] .
        "#,
    )?;

    let report = validate(
        &validator,
        r#"bldg:site brick:area [ a brick:AreaShape ; brick:value "12"^^xsd:decimal ] ."#,
    )?;
    assert!(report.conforms());

    let report = validate(
        &validator,
        r#"bldg:site brick:area [ a brick:AreaShape ; brick:value "12" , "13"^^xsd:decimal ] ."#,
    )?;
    let mut found = constraints(&report);
    found.sort();
    assert_eq!(found, vec!["sh:datatype", "sh:maxCount"]);
    Ok(())
}

#[test]
fn enumerations_lengths_patterns_and_ranges() -> Result<()> {
    let validator = validator(
        r#"
        brick:Tagged a sh:NodeShape ;
            sh:targetClass brick:Tagged ;
            sh:property [ sh:path brick:phase ; sh:in ( "real" "reactive" ) ] ;
            sh:property [ sh:path brick:tag ; sh:minLength 2 ; sh:maxLength 4 ] ;
            sh:property [ sh:path brick:serial ; sh:pattern "^SN-[0-9]+$" ] ;
            sh:property [ sh:path brick:ratio ; sh:minInclusive 0 ; sh:maxInclusive 1 ] .
        "#,
    )?;

    let ok = validate(
        &validator,
        r#"bldg:t a brick:Tagged ;
            brick:phase "real" ; brick:tag "AHU" ; brick:serial "SN-42" ;
            brick:ratio "0.5"^^xsd:decimal ."#,
    )?;
    assert!(ok.conforms(), "{ok}");

    let bad = validate(
        &validator,
        r#"bldg:t a brick:Tagged ;
            brick:phase "apparent" ; brick:tag "A" , "TOOLONG" ; brick:serial "42" ;
            brick:ratio "1.5"^^xsd:decimal , "-1"^^xsd:integer , "n/a" ."#,
    )?;
    let mut found = constraints(&bad);
    found.sort();
    assert_eq!(
        found,
        vec![
            "sh:in",
            "sh:maxInclusive",
            "sh:maxInclusive",
            "sh:maxLength",
            "sh:minInclusive",
            "sh:minInclusive",
            "sh:minLength",
            "sh:pattern",
        ]
    );
    Ok(())
}

#[test]
fn or_accepts_any_matching_alternative() -> Result<()> {
    let validator = validator(
        r#"
        brick:Floor rdfs:subClassOf brick:Location .
        brick:Room rdfs:subClassOf brick:Space .

        brick:BuildingShape a sh:NodeShape ;
            sh:targetClass brick:Building ;
            sh:property [
                sh:path brick:hasPart ;
                sh:or ( [ sh:class brick:Floor ] [ sh:class brick:Space ] )
            ] ;
            sh:property [
                sh:path brick:yearBuilt ;
                sh:or ( [ sh:datatype xsd:integer ] [ sh:datatype xsd:gYear ] )
            ] .
        "#,
    )?;

    let ok = validate(
        &validator,
        r#"bldg:site a brick:Building ;
            brick:hasPart bldg:floor1 , bldg:room1 ;
            brick:yearBuilt 1999 .
           bldg:floor1 a brick:Floor .
           bldg:room1 a brick:Room ."#,
    )?;
    assert!(ok.conforms(), "{ok}");

    let bad = validate(
        &validator,
        r#"bldg:site a brick:Building ; brick:hasPart bldg:s1 ; brick:yearBuilt "old" .
           bldg:s1 a brick:Sensor ."#,
    )?;
    assert_eq!(constraints(&bad), vec!["sh:or", "sh:or"]);
    assert!(bad.results().iter().any(|r| r.message().contains("Floor")));
    Ok(())
}

#[test]
fn warnings_and_infos_do_not_break_conformance() -> Result<()> {
    let validator = validator(
        r#"
        brick:SoftShape a sh:NodeShape ;
            sh:targetClass brick:Equipment ;
            sh:severity sh:Warning ;
            sh:property [ sh:path brick:serial ; sh:minCount 1 ] ;
            sh:property [ sh:path brick:model ; sh:minCount 1 ; sh:severity sh:Info ] .
        "#,
    )?;

    let report = validate(&validator, "bldg:ahu1 a brick:Equipment .")?;
    assert!(report.conforms());
    assert_eq!(report.violation_count(), 0);
    assert_eq!(report.warning_count(), 1);
    let severities: Vec<Severity> = report.results().iter().map(|r| r.severity()).collect();
    assert!(severities.contains(&Severity::Info));
    assert!(severities.contains(&Severity::Warning));
    Ok(())
}

#[test]
fn custom_messages_replace_the_default_text() -> Result<()> {
    let validator = validator(
        r#"
        brick:MeterShape a sh:NodeShape ;
            sh:targetClass brick:Meter ;
            sh:property [ sh:path brick:meters ; sh:minCount 1 ; sh:message "Meter what?" ] ;
            sh:property [ sh:path brick:serial ; sh:minCount 1 ] .
        "#,
    )?;

    let report = validate(&validator, "bldg:m1 a brick:Meter .")?;
    let mut messages: Vec<&str> = report.results().iter().map(|r| r.message()).collect();
    messages.sort();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0], "Meter what?");
    assert!(messages[1].contains("at least 1"));
    Ok(())
}

#[test]
fn report_serializes_to_json() -> Result<()> {
    let validator = validator(
        r#"
        brick:MeterShape a sh:NodeShape ;
            sh:targetClass brick:Meter ;
            sh:property [ sh:path brick:meters ; sh:minCount 1 ] .
        "#,
    )?;
    let report = validate(&validator, "bldg:m1 a brick:Meter .")?;

    let json: serde_json::Value = serde_json::from_str(&report.to_json()?)?;
    assert_eq!(json["conforms"], false);
    assert_eq!(json["results"][0]["focus_node"], bldg("m1"));
    assert_eq!(json["results"][0]["source_constraint"], "sh:minCount");
    assert_eq!(json["results"][0]["severity"], "Violation");
    Ok(())
}

#[test]
fn single_node_validation_and_file_loading() -> Result<()> {
    let workspace = TestWorkspace::new();
    let shapes = workspace.write(
        "shapes.ttl",
        &format!(
            "{PREFIXES}
            brick:MeterShape a sh:NodeShape ;
                sh:targetClass brick:Meter ;
                sh:property [ sh:path brick:meters ; sh:minCount 1 ] ."
        ),
    );
    let data = workspace.write(
        "data.ttl",
        &format!("{PREFIXES} bldg:m1 a brick:Meter . bldg:m2 a brick:Meter ; brick:meters bldg:x ."),
    );

    let validator = ShapeValidator::from_file(&shapes)?;
    assert_eq!(validator.shape_count(), Some(1));
    let store = validator.load_data_from_file(&data)?;

    let m1: NamedOrBlankNode = bldg_node("m1").into();
    let m2: NamedOrBlankNode = bldg_node("m2").into();
    assert_eq!(validator.validate_node(&m1, &store)?.len(), 1);
    assert!(validator.validate_node(&m2, &store)?.is_empty());
    assert_eq!(validator.validate(&store)?.violation_count(), 1);
    Ok(())
}

#[test]
fn invalid_pattern_is_rejected_when_shapes_load() {
    let err = validator(
        r#"
        brick:Broken a sh:NodeShape ;
            sh:targetClass brick:Thing ;
            sh:property [ sh:path brick:serial ; sh:pattern "([" ] .
        "#,
    )
    .err()
    .expect("invalid regex");
    assert!(format!("{err:#}").contains("sh:pattern"));
}

#[test]
fn schema_validator_uses_the_ontology_shapes() -> Result<()> {
    let schema = support::schema()?;
    assert_eq!(schema.validator().shape_count(), Some(7));
    Ok(())
}
