//! Schema build: ontology graph in, immutable descriptors out.
//!
//! - `introspect`: SPARQL row queries over the ontology store
//! - `types`: class hierarchy
//! - `shapes`: structured-property record types
//! - `relations`: relationship properties and their domain/range bindings
//! - `units`: unit catalog

pub mod introspect;
pub mod relations;
pub mod shapes;
pub mod types;
pub mod units;

pub use introspect::SchemaIntrospector;
pub use relations::{PropertyDescriptor, PropertyRegistry, RelationBinding, TargetType};
pub use shapes::{
    EnumMember, FieldDescriptor, FieldKind, ScalarKind, ShapeDescriptor, ShapeId, ShapeRegistry,
};
pub use types::{ClassDescriptor, ClassId, HierarchyPolicy, TypeRegistry};
pub use units::{UnitCatalog, UnitDescriptor};

use std::fmt;
use std::time::Instant;

use oxigraph::model::NamedNode;
use tracing::info;

use crate::config::SchemaConfig;
use crate::error::SchemaError;
use crate::logging;
use crate::ontology::{GraphValidator, ShapeValidator};

/// Everything derived from one ontology: classes, relations, record shapes,
/// units, and a validator over the same graph.
///
/// Immutable after [`Schema::build`]; share it between sessions with `Arc`.
pub struct Schema {
    config: SchemaConfig,
    types: TypeRegistry,
    properties: PropertyRegistry,
    shapes: ShapeRegistry,
    units: UnitCatalog,
    validator: Box<dyn GraphValidator>,
}

impl Schema {
    pub fn build(
        introspector: &SchemaIntrospector,
        config: &SchemaConfig,
    ) -> Result<Self, SchemaError> {
        let _span = logging::schema_span(&config.namespace).entered();
        let started = Instant::now();
        let entity_property_class = parse_iri(config.iri(&config.entity_property_class))?;

        let types = TypeRegistry::build(
            introspector,
            &config.namespace,
            &config.base_class,
            &config.roots,
            config.hierarchy,
        )?;

        let units = if config.load_units {
            UnitCatalog::from_rows(introspector.units()?)
        } else {
            UnitCatalog::default()
        };

        let shapes = ShapeRegistry::build(
            introspector,
            &entity_property_class,
            &config.namespace,
            &config.extra_shapes,
        )?;

        let properties =
            PropertyRegistry::build(introspector, &types, &shapes, &entity_property_class)?;

        let validator = ShapeValidator::from_store(introspector.store().clone())
            .map_err(|e| SchemaError::Load(format!("{e:#}")))?;

        info!(
            classes = types.len(),
            properties = properties.len(),
            shapes = shapes.len(),
            units = units.len(),
            validation_shapes = validator.shapes().len(),
            "schema built"
        );
        crate::log_slow_operation!(started.elapsed(), 5_000, "schema build finished");

        Ok(Self {
            config: config.clone(),
            types,
            properties,
            shapes,
            units,
            validator: Box::new(validator),
        })
    }

    /// Swap the graph validator used by compile.
    pub fn with_validator(mut self, validator: impl GraphValidator + 'static) -> Self {
        self.validator = Box::new(validator);
        self
    }

    pub fn config(&self) -> &SchemaConfig {
        &self.config
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    pub fn properties(&self) -> &PropertyRegistry {
        &self.properties
    }

    pub fn shapes(&self) -> &ShapeRegistry {
        &self.shapes
    }

    pub fn units(&self) -> &UnitCatalog {
        &self.units
    }

    pub fn validator(&self) -> &dyn GraphValidator {
        self.validator.as_ref()
    }

    pub fn class(&self, name: &str) -> Option<&ClassDescriptor> {
        self.types.by_name(name).map(|id| self.types.get(id))
    }

    pub fn shape(&self, name: &str) -> Option<&ShapeDescriptor> {
        self.shapes.by_name(name).map(|id| self.shapes.get(id))
    }

    pub fn unit(&self, key: &str) -> Option<&UnitDescriptor> {
        self.units.get(key)
    }

    /// `add_*` capabilities available on instances of `class`.
    pub fn capabilities(&self, class: ClassId) -> Vec<String> {
        self.properties
            .for_class(&self.types, class)
            .map(PropertyDescriptor::capability)
            .collect()
    }

    /// Name of a class or shape target, for messages.
    pub fn target_name(&self, target: TargetType) -> &str {
        match target {
            TargetType::Class(id) => self.types.get(id).name(),
            TargetType::Shape(id) => self.shapes.get(id).name(),
        }
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("namespace", &self.config.namespace)
            .field("classes", &self.types.len())
            .field("properties", &self.properties.len())
            .field("shapes", &self.shapes.len())
            .field("units", &self.units.len())
            .finish()
    }
}

fn parse_iri(iri: String) -> Result<NamedNode, SchemaError> {
    NamedNode::new(iri.clone()).map_err(|e| SchemaError::InvalidIri {
        iri,
        reason: e.to_string(),
    })
}
