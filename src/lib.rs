pub mod compile;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod ontology;
pub mod schema;
pub mod sparql;
pub mod vocab;

pub use compile::{CompiledGraph, GraphCompiler};
pub use config::{CliArgs, Command, SchemaConfig};
pub use error::{ErrorCode, MasonError, MasonResult, SchemaError};
pub use logging::{LoggingConfig, init_logging};
pub use model::{EntityId, FieldInput, RecordId, Session, Target};
pub use ontology::{GraphValidator, ShapeValidator, ValidationReport};
pub use schema::{Schema, SchemaIntrospector};

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;

use config::{InspectArgs, ValidateArgs};
use schema::{ClassId, FieldDescriptor, TargetType};

/// Load every ontology and unit file named on the command line into one
/// introspector.
pub fn load_ontology(ontologies: &[PathBuf], units: &[PathBuf]) -> Result<SchemaIntrospector> {
    anyhow::ensure!(
        !ontologies.is_empty(),
        "no ontology given; pass --ontology FILE or set BRICK_MASON_ONTOLOGY"
    );
    let introspector = SchemaIntrospector::empty()?;
    for path in ontologies.iter().chain(units) {
        introspector
            .load_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?;
    }
    tracing::info!(
        files = ontologies.len() + units.len(),
        triples = introspector.triple_count()?,
        "ontology loaded"
    );
    Ok(introspector)
}

/// Run one CLI command. Returns whether the command succeeded; a
/// non-conforming data graph is a failure, not an error.
pub fn run(args: CliArgs) -> Result<bool> {
    let config = SchemaConfig::from_args(&args)?;
    let introspector = load_ontology(&args.ontologies, &args.units)?;
    let schema = Schema::build(&introspector, &config)?;

    match &args.command {
        Command::Inspect(inspect) => run_inspect(&schema, inspect),
        Command::Validate(validate) => run_validate(&schema, validate),
    }
}

fn run_inspect(schema: &Schema, args: &InspectArgs) -> Result<bool> {
    let output = match &args.class {
        Some(name) => {
            let id = schema
                .types()
                .by_name(name)
                .ok_or_else(|| MasonError::UnknownClass(name.clone()))?;
            let detail = ClassDetail::new(schema, id);
            if args.json {
                serde_json::to_string_pretty(&detail)?
            } else {
                detail.to_string()
            }
        }
        None => {
            let summary = SchemaSummary::new(schema);
            if args.json {
                serde_json::to_string_pretty(&summary)?
            } else {
                summary.to_string()
            }
        }
    };
    println!("{output}");
    Ok(true)
}

fn run_validate(schema: &Schema, args: &ValidateArgs) -> Result<bool> {
    let data = SchemaIntrospector::empty()?;
    data.load_file(&args.data)
        .with_context(|| format!("failed to load data graph {}", args.data.display()))?;
    let report = schema.validator().validate(data.store())?;
    println!("{}", report.to_json()?);
    if !report.conforms() {
        tracing::warn!(
            data = %args.data.display(),
            violations = report.violation_count(),
            "data graph does not conform"
        );
    }
    Ok(report.conforms())
}

#[derive(Debug, Serialize)]
struct SchemaSummary<'a> {
    namespace: &'a str,
    classes: usize,
    relations: Vec<RelationSummary>,
    shapes: Vec<ShapeSummary<'a>>,
    units: usize,
    validation_shapes: Option<usize>,
}

#[derive(Debug, Serialize)]
struct RelationSummary {
    name: String,
    uri: String,
    domains: Vec<String>,
    range: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ShapeSummary<'a> {
    name: &'a str,
    fields: &'a [FieldDescriptor],
}

impl<'a> SchemaSummary<'a> {
    fn new(schema: &'a Schema) -> Self {
        let types = schema.types();
        Self {
            namespace: &schema.config().namespace,
            classes: types.len(),
            relations: schema
                .properties()
                .iter()
                .map(|p| RelationSummary {
                    name: p.name().to_string(),
                    uri: p.uri().as_str().to_string(),
                    domains: p.domains().map(|d| types.get(d).name().to_string()).collect(),
                    range: p
                        .range()
                        .unwrap_or_default()
                        .into_iter()
                        .map(|t| schema.target_name(t).to_string())
                        .collect(),
                })
                .collect(),
            shapes: schema
                .shapes()
                .iter()
                .map(|(_, shape)| ShapeSummary {
                    name: shape.name(),
                    fields: shape.fields(),
                })
                .collect(),
            units: schema.units().len(),
            validation_shapes: schema.validator().shape_count(),
        }
    }
}

impl std::fmt::Display for SchemaSummary<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Schema {}", self.namespace)?;
        writeln!(f, "  classes: {}", self.classes)?;
        writeln!(f, "  units: {}", self.units)?;
        if let Some(count) = self.validation_shapes {
            writeln!(f, "  validation shapes: {count}")?;
        }
        writeln!(f, "Relations ({}):", self.relations.len())?;
        for relation in &self.relations {
            let range = if relation.range.is_empty() {
                "any".to_string()
            } else {
                relation.range.join(" | ")
            };
            writeln!(
                f,
                "  {} [{}] -> {}",
                relation.name,
                relation.domains.join(", "),
                range
            )?;
        }
        write!(f, "Shapes ({}):", self.shapes.len())?;
        for shape in &self.shapes {
            write!(f, "\n  {}", shape.name)?;
            for field in shape.fields {
                let marker = if field.required { "" } else { "?" };
                write!(f, "\n    {}{}: {}", field.name, marker, field.kind.describe())?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct ClassDetail<'a> {
    name: &'a str,
    uri: &'a str,
    label: &'a str,
    definition: Option<&'a str>,
    ancestors: Vec<&'a str>,
    other_parents: Vec<&'a str>,
    capabilities: Vec<Capability>,
}

#[derive(Debug, Serialize)]
struct Capability {
    name: String,
    accepts: Vec<String>,
}

impl<'a> ClassDetail<'a> {
    fn new(schema: &'a Schema, id: ClassId) -> Self {
        let types = schema.types();
        let class = types.get(id);
        let capabilities = schema
            .properties()
            .for_class(types, id)
            .map(|property| Capability {
                name: property.capability(),
                accepts: property
                    .binding_for(types, id)
                    .map(|binding| binding.range)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|t: TargetType| schema.target_name(t).to_string())
                    .collect(),
            })
            .collect();
        Self {
            name: class.name(),
            uri: class.uri().as_str(),
            label: class.display_label(),
            definition: class.definition(),
            ancestors: types
                .ancestors(id)
                .into_iter()
                .map(|a| types.get(a).name())
                .collect(),
            other_parents: class
                .other_parents()
                .iter()
                .map(|p| types.get(*p).name())
                .collect(),
            capabilities,
        }
    }
}

impl std::fmt::Display for ClassDetail<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} ({})", self.name, self.uri)?;
        writeln!(f, "  label: {}", self.label)?;
        if let Some(definition) = self.definition {
            writeln!(f, "  definition: {definition}")?;
        }
        writeln!(f, "  ancestors: {}", self.ancestors.join(" > "))?;
        if !self.other_parents.is_empty() {
            writeln!(f, "  also declared under: {}", self.other_parents.join(", "))?;
        }
        write!(f, "  capabilities:")?;
        for capability in &self.capabilities {
            let accepts = if capability.accepts.is_empty() {
                "any".to_string()
            } else {
                capability.accepts.join(" | ")
            };
            write!(f, "\n    {}({})", capability.name, accepts)?;
        }
        Ok(())
    }
}
