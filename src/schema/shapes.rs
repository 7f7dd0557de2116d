//! Structured-property record types compiled from SHACL node shapes.
//!
//! Each shape becomes a [`ShapeDescriptor`]: an ordered field list where
//! every field knows its property path, whether it is required, and what
//! kind of value it takes.

use std::collections::{BTreeMap, HashMap};

use oxigraph::model::{NamedNode, Term};
use serde::Serialize;
use tracing::{debug, warn};

use super::introspect::{SchemaIntrospector, ShapeConstraintRow};
use super::units::serialize_iri;
use crate::error::SchemaError;
use crate::vocab::{self, local_name};

/// Index of a shape inside its [`ShapeRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeId(usize);

/// Scalar families a datatype field accepts values from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarKind {
    Float,
    Integer,
    Boolean,
    String,
    Other,
}

impl ScalarKind {
    pub fn of_datatype(datatype: &NamedNode) -> Self {
        let iri = datatype.as_str();
        if iri == vocab::XSD_FLOAT.as_str()
            || iri == vocab::XSD_DOUBLE.as_str()
            || iri == vocab::XSD_DECIMAL.as_str()
        {
            ScalarKind::Float
        } else if vocab::XSD_INTEGER_TYPES.contains(&iri) {
            ScalarKind::Integer
        } else if iri == vocab::XSD_BOOLEAN.as_str() {
            ScalarKind::Boolean
        } else if iri == vocab::XSD_STRING.as_str() {
            ScalarKind::String
        } else {
            ScalarKind::Other
        }
    }
}

/// One member of a closed enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnumMember {
    /// Literal lexical form, or the local name of an IRI member
    pub key: String,
    #[serde(serialize_with = "serialize_term")]
    pub term: Term,
}

impl EnumMember {
    pub fn new(term: Term) -> Self {
        let key = match &term {
            Term::NamedNode(node) => local_name(node.as_str()).to_string(),
            Term::Literal(literal) => literal.value().to_string(),
            other => other.to_string(),
        };
        Self { key, term }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    /// Closed set of literals or IRIs
    Enumeration { members: Vec<EnumMember> },
    /// A unit from the catalog; restricted to `allowed` when non-empty
    Unit {
        #[serde(serialize_with = "serialize_iris")]
        allowed: Vec<NamedNode>,
    },
    /// A literal of the declared datatype
    Scalar {
        #[serde(serialize_with = "serialize_iri")]
        datatype: NamedNode,
        scalar: ScalarKind,
    },
    /// Any node; entities must descend from one of `classes` when non-empty
    Reference {
        #[serde(serialize_with = "serialize_iris")]
        classes: Vec<NamedNode>,
    },
}

impl FieldKind {
    pub fn describe(&self) -> String {
        match self {
            FieldKind::Enumeration { members } => format!(
                "one of [{}]",
                members
                    .iter()
                    .map(|m| m.key.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            FieldKind::Unit { .. } => "Unit".to_string(),
            FieldKind::Scalar { datatype, .. } => local_name(datatype.as_str()).to_string(),
            FieldKind::Reference { classes } if classes.is_empty() => "reference".to_string(),
            FieldKind::Reference { classes } => classes
                .iter()
                .map(|c| local_name(c.as_str()))
                .collect::<Vec<_>>()
                .join(" | "),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(serialize_with = "serialize_iri")]
    pub path: NamedNode,
    pub kind: FieldKind,
    pub required: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShapeDescriptor {
    #[serde(serialize_with = "serialize_iri")]
    uri: NamedNode,
    name: String,
    fields: Vec<FieldDescriptor>,
}

impl ShapeDescriptor {
    pub fn uri(&self) -> &NamedNode {
        &self.uri
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in constructor order: `value`, then `hasUnit`, then the rest by name.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Default)]
struct PathDefinition {
    enum_values: Vec<Term>,
    datatype: Option<NamedNode>,
    classes: Vec<NamedNode>,
    required: bool,
}

/// Turn the constraint rows of one shape into a descriptor.
pub fn compile_shape(uri: NamedNode, rows: Vec<ShapeConstraintRow>) -> ShapeDescriptor {
    let mut paths: BTreeMap<String, (NamedNode, PathDefinition)> = BTreeMap::new();

    for row in rows {
        let name = local_name(row.path.as_str()).to_string();
        let (path, defn) = paths
            .entry(name)
            .or_insert_with(|| (row.path.clone(), PathDefinition::default()));
        if *path != row.path {
            warn!(shape = %uri, first = %path, other = %row.path, "two paths share a field name");
            continue;
        }
        if let Some(value) = row.enum_value {
            if !defn.enum_values.contains(&value) {
                defn.enum_values.push(value);
            }
        }
        if let Some(datatype) = row.datatype {
            defn.datatype = Some(datatype);
        }
        if let Some(class) = row.class {
            if !defn.classes.contains(&class) {
                defn.classes.push(class);
            }
        }
        if row.min_count.is_some_and(|min| min > 0) {
            defn.required = true;
        }
    }

    let mut fields: Vec<FieldDescriptor> = paths
        .into_iter()
        .map(|(name, (path, defn))| {
            let kind = if name == "hasUnit" {
                FieldKind::Unit {
                    allowed: defn
                        .enum_values
                        .into_iter()
                        .filter_map(|term| match term {
                            Term::NamedNode(node) => Some(node),
                            _ => None,
                        })
                        .collect(),
                }
            } else if !defn.enum_values.is_empty() {
                FieldKind::Enumeration {
                    members: defn.enum_values.into_iter().map(EnumMember::new).collect(),
                }
            } else if let Some(datatype) = defn.datatype {
                FieldKind::Scalar {
                    scalar: ScalarKind::of_datatype(&datatype),
                    datatype,
                }
            } else {
                FieldKind::Reference {
                    classes: defn.classes,
                }
            };
            FieldDescriptor {
                name,
                path,
                kind,
                required: defn.required,
            }
        })
        .collect();

    fields.sort_by_key(|f| match f.name.as_str() {
        "value" => 0,
        "hasUnit" => 1,
        _ => 2,
    });

    ShapeDescriptor {
        name: local_name(uri.as_str()).to_string(),
        uri,
        fields,
    }
}

#[derive(Debug, Clone, Default)]
pub struct ShapeRegistry {
    shapes: Vec<ShapeDescriptor>,
    by_uri: HashMap<String, ShapeId>,
    by_name: HashMap<String, ShapeId>,
}

impl ShapeRegistry {
    /// Compile every shape that is the range of an entity property, plus
    /// `extra` shapes named relative to `namespace`.
    pub fn build(
        introspector: &SchemaIntrospector,
        entity_property_class: &NamedNode,
        namespace: &str,
        extra: &[String],
    ) -> Result<Self, SchemaError> {
        let mut registry = Self::default();

        for shape in introspector.entity_property_shapes(entity_property_class)? {
            registry.compile(introspector, shape)?;
        }

        for name in extra {
            let iri = if name.contains(':') {
                name.clone()
            } else {
                format!("{namespace}{name}")
            };
            let shape = NamedNode::new(iri.clone()).map_err(|e| SchemaError::InvalidIri {
                iri,
                reason: e.to_string(),
            })?;
            if !introspector.is_node_shape(&shape)? {
                warn!(shape = %shape, "configured shape is not a sh:NodeShape, skipping");
                continue;
            }
            registry.compile(introspector, shape)?;
        }

        debug!(shapes = registry.len(), "compiled record shapes");
        Ok(registry)
    }

    fn compile(
        &mut self,
        introspector: &SchemaIntrospector,
        shape: NamedNode,
    ) -> Result<(), SchemaError> {
        if self.by_uri.contains_key(shape.as_str()) {
            return Ok(());
        }
        let rows = introspector.shape_constraints(&shape)?;
        let descriptor = compile_shape(shape, rows);
        debug!(
            shape = descriptor.name(),
            fields = descriptor.fields().len(),
            "compiled shape"
        );
        self.insert(descriptor);
        Ok(())
    }

    pub fn insert(&mut self, descriptor: ShapeDescriptor) -> ShapeId {
        let id = ShapeId(self.shapes.len());
        self.by_uri.insert(descriptor.uri.as_str().to_string(), id);
        self.by_name.entry(descriptor.name.clone()).or_insert(id);
        self.shapes.push(descriptor);
        id
    }

    pub fn get(&self, id: ShapeId) -> &ShapeDescriptor {
        &self.shapes[id.0]
    }

    pub fn by_name(&self, name: &str) -> Option<ShapeId> {
        self.by_name.get(name).copied()
    }

    pub fn by_uri(&self, uri: &str) -> Option<ShapeId> {
        self.by_uri.get(uri).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ShapeId, &ShapeDescriptor)> {
        self.shapes
            .iter()
            .enumerate()
            .map(|(idx, shape)| (ShapeId(idx), shape))
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}

fn serialize_term<S: serde::Serializer>(term: &Term, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&term.to_string())
}

fn serialize_iris<S: serde::Serializer>(
    nodes: &[NamedNode],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(nodes.iter().map(NamedNode::as_str))
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxigraph::model::Literal;

    fn brick(local: &str) -> NamedNode {
        NamedNode::new_unchecked(format!("https://brickschema.org/schema/Brick#{local}"))
    }

    fn row(path: &str) -> ShapeConstraintRow {
        ShapeConstraintRow {
            path: brick(path),
            enum_value: None,
            datatype: None,
            class: None,
            min_count: None,
        }
    }

    #[test]
    fn value_then_unit_then_alphabetical() {
        let shape = compile_shape(
            brick("CoolingCapacityShape"),
            vec![
                row("zeta"),
                ShapeConstraintRow {
                    min_count: Some(1),
                    ..row("hasUnit")
                },
                row("alpha"),
                ShapeConstraintRow {
                    datatype: Some(vocab::XSD_DECIMAL.into_owned()),
                    min_count: Some(1),
                    ..row("value")
                },
            ],
        );
        let names: Vec<&str> = shape.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["value", "hasUnit", "alpha", "zeta"]);
        assert!(shape.field("value").unwrap().required);
        assert!(!shape.field("alpha").unwrap().required);
    }

    #[test]
    fn enumeration_collects_every_row() {
        let shape = compile_shape(
            brick("PowerComplexityShape"),
            ["real", "reactive", "apparent"]
                .into_iter()
                .map(|v| ShapeConstraintRow {
                    enum_value: Some(Literal::new_simple_literal(v).into()),
                    datatype: Some(vocab::XSD_STRING.into_owned()),
                    min_count: Some(1),
                    ..row("value")
                })
                .collect(),
        );
        match &shape.field("value").unwrap().kind {
            FieldKind::Enumeration { members } => {
                let keys: Vec<&str> = members.iter().map(|m| m.key.as_str()).collect();
                assert_eq!(keys, vec!["real", "reactive", "apparent"]);
            }
            other => panic!("expected enumeration, got {other:?}"),
        }
    }

    #[test]
    fn required_if_any_row_has_positive_min_count() {
        let shape = compile_shape(
            brick("S"),
            vec![
                ShapeConstraintRow {
                    min_count: Some(0),
                    ..row("p")
                },
                ShapeConstraintRow {
                    min_count: Some(2),
                    ..row("p")
                },
            ],
        );
        assert!(shape.field("p").unwrap().required);
    }

    #[test]
    fn path_without_datatype_or_values_is_a_reference() {
        let shape = compile_shape(
            brick("S"),
            vec![ShapeConstraintRow {
                class: Some(brick("Point")),
                ..row("hasPoint")
            }],
        );
        assert_eq!(
            shape.field("hasPoint").unwrap().kind,
            FieldKind::Reference {
                classes: vec![brick("Point")]
            }
        );
    }
}
