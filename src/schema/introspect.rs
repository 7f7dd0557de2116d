//! Read-only SPARQL access to the ontology graph.
//!
//! Every query returns plain row structs; optional bindings stay `None` and
//! never fail a row. Rows come back ordered by IRI so that everything built
//! from them is deterministic across runs.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use oxigraph::io::RdfFormat;
use oxigraph::model::{GraphNameRef, NamedNode, NamedNodeRef, NamedOrBlankNodeRef, QuadRef, Term};
use oxigraph::store::Store;
use tracing::debug;

use crate::error::SchemaError;
use crate::sparql::{self, BindingError, FromSparql, MappingError, TypedBinding};
use crate::vocab;

/// Immediate subclass of some class, with optional label and definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubclassRow {
    pub class: NamedNode,
    pub label: Option<String>,
    pub definition: Option<String>,
}

impl FromSparql for SubclassRow {
    fn from_binding(binding: &TypedBinding<'_>) -> Result<Self, MappingError> {
        Ok(Self {
            class: binding.iri("class")?,
            label: binding.literal_opt("label"),
            definition: binding.literal_opt("defn"),
        })
    }
}

/// A relationship property with its optional domain and range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipRow {
    pub property: NamedNode,
    pub domain: Option<NamedNode>,
    pub range: Option<NamedNode>,
}

impl FromSparql for RelationshipRow {
    fn from_binding(binding: &TypedBinding<'_>) -> Result<Self, MappingError> {
        Ok(Self {
            property: binding.iri("prop")?,
            domain: binding.iri_opt("dom"),
            range: binding.iri_opt("rng"),
        })
    }
}

/// A relation typing derived from a node shape: instances of `target_class`
/// may point along `path` at instances of `allowed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeRelationRow {
    pub path: NamedNode,
    pub target_class: NamedNode,
    pub allowed: NamedNode,
}

impl FromSparql for ShapeRelationRow {
    fn from_binding(binding: &TypedBinding<'_>) -> Result<Self, MappingError> {
        Ok(Self {
            path: binding.iri("path")?,
            target_class: binding.iri("cls")?,
            allowed: binding.iri("allowed")?,
        })
    }
}

/// One property-shape row of a node shape. A path with an `sh:in` list
/// produces one row per list member.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeConstraintRow {
    pub path: NamedNode,
    pub enum_value: Option<Term>,
    pub datatype: Option<NamedNode>,
    pub class: Option<NamedNode>,
    pub min_count: Option<i64>,
}

/// A property shape before its `sh:in` list is expanded.
struct PropertyShapeRow {
    path: NamedNode,
    members: Option<Term>,
    datatype: Option<NamedNode>,
    class: Option<NamedNode>,
    min_count: Option<i64>,
}

impl FromSparql for PropertyShapeRow {
    fn from_binding(binding: &TypedBinding<'_>) -> Result<Self, MappingError> {
        Ok(Self {
            path: binding.iri("path")?,
            members: binding.term_opt("list").cloned(),
            datatype: binding.iri_opt("datatype"),
            class: binding.iri_opt("class"),
            min_count: binding.integer_opt("min")?,
        })
    }
}

/// A `qudt:Unit` entry of the units feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitRow {
    pub unit: NamedNode,
    pub label: String,
    pub symbol: Option<String>,
    pub expression: Option<String>,
    pub description: Option<String>,
}

impl FromSparql for UnitRow {
    fn from_binding(binding: &TypedBinding<'_>) -> Result<Self, MappingError> {
        let label = binding
            .literal_opt("label")
            .ok_or_else(|| BindingError::Unbound("label".to_string()))?;
        Ok(Self {
            unit: binding.iri("unit")?,
            label,
            symbol: binding.literal_opt("symbol"),
            expression: binding.literal_opt("expr"),
            description: binding.literal_opt("defn"),
        })
    }
}

struct ShapeRow {
    shape: NamedNode,
}

impl FromSparql for ShapeRow {
    fn from_binding(binding: &TypedBinding<'_>) -> Result<Self, MappingError> {
        Ok(Self {
            shape: binding.iri("shape")?,
        })
    }
}

/// Query front-end over an in-memory oxigraph store holding the ontology
/// (and, when loaded, the units vocabulary).
#[derive(Clone)]
pub struct SchemaIntrospector {
    store: Store,
}

impl SchemaIntrospector {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Empty introspector; load graphs into it with [`Self::load_turtle`] or
    /// [`Self::load_file`].
    pub fn empty() -> Result<Self, SchemaError> {
        let store = Store::new().map_err(|e| SchemaError::Load(e.to_string()))?;
        Ok(Self { store })
    }

    pub fn from_turtle(turtle: &str) -> Result<Self, SchemaError> {
        let introspector = Self::empty()?;
        introspector.load_turtle(turtle)?;
        Ok(introspector)
    }

    pub fn load_turtle(&self, turtle: &str) -> Result<(), SchemaError> {
        self.store
            .load_from_reader(RdfFormat::Turtle, turtle.as_bytes())
            .map_err(|e| SchemaError::Load(e.to_string()))
    }

    /// Load an RDF file, picking the syntax from its extension (Turtle when unknown).
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<(), SchemaError> {
        let path = path.as_ref();
        let format = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(RdfFormat::from_extension)
            .unwrap_or(RdfFormat::Turtle);
        let content = fs::read(path)
            .map_err(|e| SchemaError::Load(format!("{}: {}", path.display(), e)))?;
        self.store
            .load_from_reader(format, content.as_slice())
            .map_err(|e| SchemaError::Load(format!("{}: {}", path.display(), e)))?;
        debug!(path = %path.display(), ?format, "loaded ontology file");
        Ok(())
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Number of triples currently loaded.
    pub fn triple_count(&self) -> Result<usize, SchemaError> {
        self.store
            .len()
            .map_err(|e| SchemaError::Query(e.to_string()))
    }

    /// Immediate named subclasses of `root`, one row per class.
    pub fn subclasses_of(&self, root: &NamedNode) -> Result<Vec<SubclassRow>, SchemaError> {
        let query = format!(
            "SELECT ?class ?label ?defn WHERE {{
                ?class rdfs:subClassOf {root} .
                OPTIONAL {{ ?class rdfs:label ?label }} .
                OPTIONAL {{ ?class skos:definition ?defn }} .
                FILTER(isIRI(?class))
            }} ORDER BY ?class ?label ?defn"
        );
        let rows: Vec<SubclassRow> = sparql::select_rows(&self.store, &query)?;
        Ok(first_per_key(rows, |row| row.class.clone()))
    }

    /// Every `owl:ObjectProperty` with its declared domain and range.
    pub fn relationships(&self) -> Result<Vec<RelationshipRow>, SchemaError> {
        sparql::select_rows(
            &self.store,
            "SELECT ?prop ?dom ?rng WHERE {
                ?prop a owl:ObjectProperty .
                OPTIONAL { ?prop rdfs:domain ?dom } .
                OPTIONAL { ?prop rdfs:range ?rng } .
            } ORDER BY ?prop ?dom ?rng",
        )
    }

    /// Relation typings implied by node shapes through `sh:class` or an
    /// `sh:or` list of `sh:class` alternatives.
    pub fn shape_relations(&self) -> Result<Vec<ShapeRelationRow>, SchemaError> {
        sparql::select_rows(
            &self.store,
            "SELECT DISTINCT ?path ?cls ?allowed WHERE {
                ?sh a sh:NodeShape .
                ?sh sh:targetClass ?cls .
                ?sh sh:property ?prop .
                ?prop sh:path ?path .
                {
                    ?prop sh:class ?allowed
                }
                UNION
                {
                    ?prop sh:or/rdf:rest*/rdf:first/sh:class ?allowed
                }
                FILTER(isIRI(?path) && isIRI(?cls) && isIRI(?allowed))
            } ORDER BY ?path ?cls ?allowed",
        )
    }

    /// Every instance of `entity_property_class` with its domain and range.
    pub fn entity_properties(
        &self,
        entity_property_class: &NamedNode,
    ) -> Result<Vec<RelationshipRow>, SchemaError> {
        let query = format!(
            "SELECT ?prop ?dom ?rng WHERE {{
                ?prop a {entity_property_class} .
                OPTIONAL {{ ?prop rdfs:domain ?dom }} .
                OPTIONAL {{ ?prop rdfs:range ?rng }} .
            }} ORDER BY ?prop ?dom ?rng"
        );
        sparql::select_rows(&self.store, &query)
    }

    /// Node shapes that are the range of some entity property.
    pub fn entity_property_shapes(
        &self,
        entity_property_class: &NamedNode,
    ) -> Result<Vec<NamedNode>, SchemaError> {
        let query = format!(
            "SELECT DISTINCT ?shape WHERE {{
                ?shape a sh:NodeShape .
                ?prop rdfs:range ?shape .
                ?prop a {entity_property_class} .
                FILTER(isIRI(?shape))
            }} ORDER BY ?shape"
        );
        let rows: Vec<ShapeRow> = sparql::select_rows(&self.store, &query)?;
        Ok(rows.into_iter().map(|row| row.shape).collect())
    }

    /// Property-shape rows of one node shape, ordered by path. `sh:in`
    /// members keep their list order.
    pub fn shape_constraints(
        &self,
        shape: &NamedNode,
    ) -> Result<Vec<ShapeConstraintRow>, SchemaError> {
        let query = format!(
            "SELECT ?path ?min ?list ?datatype ?class WHERE {{
                {shape} sh:property ?prop .
                ?prop sh:path ?path .
                OPTIONAL {{ ?prop sh:in ?list }} .
                OPTIONAL {{ ?prop sh:datatype ?datatype }} .
                OPTIONAL {{ ?prop sh:class ?class }} .
                OPTIONAL {{ ?prop sh:minCount ?min }} .
                FILTER(isIRI(?path))
            }} ORDER BY ?path ?class ?datatype ?min"
        );
        let rows: Vec<PropertyShapeRow> = sparql::select_rows(&self.store, &query)?;

        let mut expanded = Vec::with_capacity(rows.len());
        for row in rows {
            let members = match &row.members {
                Some(head) => self.list_members(head)?,
                None => Vec::new(),
            };
            let enum_values: Vec<Option<Term>> = if members.is_empty() {
                vec![None]
            } else {
                members.into_iter().map(Some).collect()
            };
            for enum_value in enum_values {
                expanded.push(ShapeConstraintRow {
                    path: row.path.clone(),
                    enum_value,
                    datatype: row.datatype.clone(),
                    class: row.class.clone(),
                    min_count: row.min_count,
                });
            }
        }
        Ok(expanded)
    }

    /// Members of the RDF list starting at `head`, in list order.
    fn list_members(&self, head: &Term) -> Result<Vec<Term>, SchemaError> {
        let mut members = Vec::new();
        let mut seen = HashSet::new();
        let mut current = head.clone();
        loop {
            let cell: NamedOrBlankNodeRef<'_> = match &current {
                Term::NamedNode(node) if node.as_ref() == vocab::NIL => break,
                Term::NamedNode(node) => node.as_ref().into(),
                Term::BlankNode(node) => node.as_ref().into(),
                _ => break,
            };
            if !seen.insert(current.clone()) {
                break;
            }
            if let Some(first) = self.object_of(cell, vocab::FIRST)? {
                members.push(first);
            }
            match self.object_of(cell, vocab::REST)? {
                Some(rest) => current = rest,
                None => break,
            }
        }
        Ok(members)
    }

    fn object_of(
        &self,
        subject: NamedOrBlankNodeRef<'_>,
        predicate: NamedNodeRef<'_>,
    ) -> Result<Option<Term>, SchemaError> {
        self.store
            .quads_for_pattern(Some(subject), Some(predicate), None, None)
            .next()
            .transpose()
            .map(|quad| quad.map(|quad| quad.object))
            .map_err(|e| SchemaError::Query(e.to_string()))
    }

    /// Whether `shape` is declared as a `sh:NodeShape`.
    pub fn is_node_shape(&self, shape: &NamedNode) -> Result<bool, SchemaError> {
        self.store
            .contains(QuadRef::new(
                shape,
                vocab::TYPE,
                vocab::NODE_SHAPE,
                GraphNameRef::DefaultGraph,
            ))
            .map_err(|e| SchemaError::Query(e.to_string()))
    }

    /// Every labelled `qudt:Unit`, one row per unit IRI.
    pub fn units(&self) -> Result<Vec<UnitRow>, SchemaError> {
        let rows: Vec<UnitRow> = sparql::select_rows(
            &self.store,
            "SELECT ?unit ?symbol ?label ?expr ?defn WHERE {
                ?unit a qudt:Unit .
                ?unit rdfs:label ?label .
                OPTIONAL { ?unit qudt:symbol ?symbol } .
                OPTIONAL { ?unit qudt:expression ?expr } .
                OPTIONAL { ?unit dcterms:description ?defn } .
                FILTER(isIRI(?unit))
            } ORDER BY ?unit ?label",
        )?;
        Ok(first_per_key(rows, |row| row.unit.clone()))
    }
}

/// Keep the first row per key, preserving order. OPTIONAL joins over
/// multi-valued labels otherwise repeat a subject.
fn first_per_key<T>(rows: Vec<T>, key: impl Fn(&T) -> NamedNode) -> Vec<T> {
    let mut seen = HashSet::new();
    rows.into_iter().filter(|row| seen.insert(key(row))).collect()
}
