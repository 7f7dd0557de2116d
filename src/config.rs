use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub use crate::schema::types::HierarchyPolicy;

const DEFAULT_NAMESPACE: &str = "https://brickschema.org/schema/Brick#";
const DEFAULT_BASE_CLASS: &str = "Entity";
const DEFAULT_ROOTS: &[&str] = &["Equipment", "Point", "Location"];
const DEFAULT_ENTITY_PROPERTY_CLASS: &str = "EntityProperty";

/// How a schema is derived from the ontology graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchemaConfig {
    /// Namespace the base class, roots, entity property class and extra
    /// shapes are resolved against
    pub namespace: String,
    pub base_class: String,
    pub roots: Vec<String>,
    pub entity_property_class: String,
    /// Shapes compiled as record types even when no entity property ranges
    /// over them
    pub extra_shapes: Vec<String>,
    pub hierarchy: HierarchyPolicy,
    pub load_units: bool,
    /// Emit `rdfs:label` triples for labelled entities when compiling
    pub emit_labels: bool,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            base_class: DEFAULT_BASE_CLASS.to_string(),
            roots: DEFAULT_ROOTS.iter().map(|r| (*r).to_string()).collect(),
            entity_property_class: DEFAULT_ENTITY_PROPERTY_CLASS.to_string(),
            extra_shapes: Vec::new(),
            hierarchy: HierarchyPolicy::default(),
            load_units: true,
            emit_labels: false,
        }
    }
}

impl SchemaConfig {
    /// Load a YAML or JSON config file, chosen by extension.
    pub fn from_file(path: &Path) -> Result<Self> {
        let config = load_config_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// File config (when given) with command-line overrides applied.
    pub fn from_args(args: &CliArgs) -> Result<Self> {
        let mut config = match args.config.as_deref() {
            Some(path) => load_config_file(path)?,
            None => Self::default(),
        };
        if let Some(namespace) = &args.namespace {
            config.namespace = namespace.clone();
        }
        if !args.extra_shapes.is_empty() {
            config.extra_shapes.extend(args.extra_shapes.iter().cloned());
        }
        if args.strict_hierarchy {
            config.hierarchy = HierarchyPolicy::Strict;
        }
        if args.no_units {
            config.load_units = false;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.namespace.ends_with('#') || self.namespace.ends_with('/'),
            "namespace {:?} must end with '#' or '/'",
            self.namespace
        );
        anyhow::ensure!(!self.base_class.is_empty(), "base_class must not be empty");
        anyhow::ensure!(!self.roots.is_empty(), "at least one root class is required");
        anyhow::ensure!(
            self.roots.iter().all(|r| !r.is_empty()),
            "root class names must not be empty"
        );
        anyhow::ensure!(
            !self.entity_property_class.is_empty(),
            "entity_property_class must not be empty"
        );
        Ok(())
    }

    pub fn iri(&self, local: &str) -> String {
        format!("{}{}", self.namespace, local)
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "brick-mason",
    about = "Build typed models from a Brick ontology and validate graphs against it",
    version
)]
pub struct CliArgs {
    #[arg(
        long,
        value_name = "FILE",
        help = "Path to a configuration file (YAML or JSON)",
        global = true
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long = "ontology",
        env = "BRICK_MASON_ONTOLOGY",
        value_name = "FILE",
        value_delimiter = ',',
        global = true,
        help = "Ontology file(s) to load; repeat or comma-separate"
    )]
    pub ontologies: Vec<PathBuf>,

    #[arg(
        long = "units",
        env = "BRICK_MASON_UNITS",
        value_name = "FILE",
        value_delimiter = ',',
        global = true,
        help = "Units vocabulary file(s) to load"
    )]
    pub units: Vec<PathBuf>,

    #[arg(
        long,
        env = "BRICK_MASON_NAMESPACE",
        value_name = "IRI",
        global = true,
        help = "Ontology namespace the root classes live in"
    )]
    pub namespace: Option<String>,

    #[arg(
        long = "extra-shape",
        value_name = "NAME",
        global = true,
        help = "Compile this shape even if no entity property ranges over it"
    )]
    pub extra_shapes: Vec<String>,

    #[arg(long, global = true, help = "Fail on classes with several parents")]
    pub strict_hierarchy: bool,

    #[arg(long, global = true, help = "Skip building the unit catalog")]
    pub no_units: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Summarise the schema derived from the ontology
    Inspect(InspectArgs),
    /// Validate a data graph against the ontology's shapes
    Validate(ValidateArgs),
}

#[derive(Args, Debug, Clone)]
pub struct InspectArgs {
    #[arg(long, value_name = "NAME", help = "Show one class in detail")]
    pub class: Option<String>,

    #[arg(long, help = "Print JSON instead of text")]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    #[arg(long, value_name = "FILE", help = "Data graph to validate")]
    pub data: PathBuf,
}

fn load_config_file(path: &Path) -> Result<SchemaConfig> {
    if !path.exists() {
        anyhow::bail!("config file {:?} does not exist", path);
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {:?}", path))?;
    let ext = path
        .extension()
        .and_then(|os| os.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let parsed = match ext.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse YAML config {:?}", path))?,
        "json" => serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse JSON config {:?}", path))?,
        other => anyhow::bail!("unsupported config extension: {other}"),
    };
    Ok(parsed)
}
