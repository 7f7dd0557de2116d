//! Graph compilation: session instances in, validated RDF graph out.
//!
//! Triples are emitted in a fixed order so serialized output is stable:
//!
//! 1. for each entity (creation order): its `rdf:type`, its `rdfs:label`
//!    when labels are enabled, then every relation target in attachment order
//! 2. for each record (creation order): its `rdf:type` (the shape IRI), then
//!    every set field in shape order

use oxigraph::io::{RdfFormat, RdfSerializer};
use oxigraph::model::{
    GraphNameRef, Literal, NamedNode, NamedOrBlankNode, Term, Triple, TripleRef,
};
use oxigraph::store::Store;
use std::fmt;
use tracing::{debug, info, warn};

use crate::error::{MasonError, MasonResult};
use crate::logging;
use crate::model::{FieldValue, Session, Target};
use crate::ontology::GraphValidator;
use crate::schema::Schema;
use crate::vocab;

/// A validated graph plus the namespace bindings it serializes with.
pub struct CompiledGraph {
    store: Store,
    prefixes: Vec<(String, String)>,
    triples: Vec<Triple>,
}

impl fmt::Debug for CompiledGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledGraph")
            .field("prefixes", &self.prefixes)
            .field("triples", &self.triples.len())
            .finish_non_exhaustive()
    }
}

impl CompiledGraph {
    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    pub fn contains<'a>(&self, triple: impl Into<TripleRef<'a>>) -> bool {
        let triple = triple.into();
        self.triples.iter().any(|t| t.as_ref() == triple)
    }

    /// Triples in emission order.
    pub fn triples(&self) -> &[Triple] {
        &self.triples
    }

    pub fn prefixes(&self) -> &[(String, String)] {
        &self.prefixes
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn into_store(self) -> Store {
        self.store
    }

    pub fn to_turtle(&self) -> MasonResult<String> {
        self.serialize(RdfFormat::Turtle)
    }

    pub fn to_ntriples(&self) -> MasonResult<String> {
        self.serialize(RdfFormat::NTriples)
    }

    fn serialize(&self, format: RdfFormat) -> MasonResult<String> {
        let mut serializer = prefixed_serializer(format, &self.prefixes)?.for_writer(Vec::new());
        for triple in &self.triples {
            serializer
                .serialize_triple(triple.as_ref())
                .map_err(|e| MasonError::Store(e.to_string()))?;
        }
        let bytes = serializer
            .finish()
            .map_err(|e| MasonError::Store(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| MasonError::Store(e.to_string()))
    }
}

/// Reject bindings the serializers would refuse, before anything is emitted.
fn check_bindings(prefixes: &[(String, String)]) -> MasonResult<()> {
    prefixed_serializer(RdfFormat::Turtle, prefixes).map(|_| ())
}

fn prefixed_serializer(
    format: RdfFormat,
    prefixes: &[(String, String)],
) -> MasonResult<RdfSerializer> {
    let mut serializer = RdfSerializer::from_format(format);
    for (prefix, namespace) in prefixes {
        serializer = serializer
            .with_prefix(prefix.as_str(), namespace.as_str())
            .map_err(|e| MasonError::InvalidIri {
                iri: namespace.clone(),
                reason: e.to_string(),
            })?;
    }
    Ok(serializer)
}

/// Walks a session and emits its triples.
pub struct GraphCompiler<'s> {
    schema: &'s Schema,
    store: Store,
    triples: Vec<Triple>,
}

impl<'s> GraphCompiler<'s> {
    pub fn new(schema: &'s Schema) -> MasonResult<Self> {
        Ok(Self {
            schema,
            store: Store::new().map_err(|e| MasonError::Store(e.to_string()))?,
            triples: Vec::new(),
        })
    }

    /// Emit every entity and record of `session`, then validate.
    ///
    /// Nothing is returned unless the graph conforms; a non-conforming graph
    /// yields [`MasonError::Validation`] with the full report.
    pub fn compile(
        mut self,
        session: &Session,
        bindings: &[(&str, &str)],
        validator: &dyn GraphValidator,
    ) -> MasonResult<CompiledGraph> {
        let _span =
            logging::compile_span(session.entity_count(), session.records().len()).entered();
        let prefixes: Vec<(String, String)> = bindings
            .iter()
            .map(|(prefix, namespace)| (prefix.to_string(), namespace.to_string()))
            .collect();
        check_bindings(&prefixes)?;

        self.emit_entities(session)?;
        self.emit_records(session)?;

        let report = validator
            .validate(&self.store)
            .map_err(|e| MasonError::ValidationEngine(format!("{e:#}")))?;
        if !report.conforms() {
            warn!(
                triples = self.triples.len(),
                violations = report.violation_count(),
                "compiled graph does not conform"
            );
            return Err(MasonError::Validation { report });
        }

        info!(
            entities = session.entity_count(),
            records = session.records().len(),
            triples = self.triples.len(),
            warnings = report.warning_count(),
            "graph compiled"
        );
        Ok(CompiledGraph {
            store: self.store,
            prefixes,
            triples: self.triples,
        })
    }

    fn emit_entities(&mut self, session: &Session) -> MasonResult<()> {
        let schema = self.schema;
        let types = schema.types();
        let emit_labels = schema.config().emit_labels;

        for instance in session.entity_instances() {
            let subject: NamedOrBlankNode = instance.uri().clone().into();
            let class = types.get(instance.class());
            self.emit(
                subject.clone(),
                vocab::TYPE.into_owned(),
                class.uri().clone().into(),
            )?;
            if emit_labels {
                if let Some(label) = instance.label() {
                    self.emit(
                        subject.clone(),
                        vocab::LABEL.into_owned(),
                        Literal::new_simple_literal(label).into(),
                    )?;
                }
            }

            for (name, targets) in instance.relations() {
                let Some(property) = schema.properties().get(name) else {
                    debug!(property = name, "relation without descriptor skipped");
                    continue;
                };
                for target in targets {
                    let object = self.target_term(session, *target)?;
                    self.emit(subject.clone(), property.uri().clone(), object)?;
                }
            }
        }
        Ok(())
    }

    fn emit_records(&mut self, session: &Session) -> MasonResult<()> {
        let schema = self.schema;
        for record in session.records() {
            let shape = schema.shapes().get(record.shape());
            let subject: NamedOrBlankNode = record.id().clone().into();
            self.emit(
                subject.clone(),
                vocab::TYPE.into_owned(),
                shape.uri().clone().into(),
            )?;

            for field in shape.fields() {
                let Some(value) = record.get(&field.name) else {
                    continue;
                };
                let object = match value {
                    FieldValue::Term(term) => term.clone(),
                    FieldValue::Entity(id) => self.target_term(session, Target::Entity(*id))?,
                    FieldValue::Record(id) => self.target_term(session, Target::Record(*id))?,
                };
                self.emit(subject.clone(), field.path.clone(), object)?;
            }
        }
        Ok(())
    }

    fn target_term(&self, session: &Session, target: Target) -> MasonResult<Term> {
        Ok(match target {
            Target::Entity(id) => session.entity_instance(id)?.uri().clone().into(),
            Target::Record(id) => session.get_record(id)?.id().clone().into(),
        })
    }

    fn emit(
        &mut self,
        subject: NamedOrBlankNode,
        predicate: NamedNode,
        object: Term,
    ) -> MasonResult<()> {
        let triple = Triple::new(subject, predicate, object);
        let quad = triple.as_ref().in_graph(GraphNameRef::DefaultGraph);
        let store_error = |e: oxigraph::store::StorageError| MasonError::Store(e.to_string());
        if self.store.contains(quad).map_err(store_error)? {
            return Ok(());
        }
        self.store.insert(quad).map_err(store_error)?;
        self.triples.push(triple);
        Ok(())
    }
}
