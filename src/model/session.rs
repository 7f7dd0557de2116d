use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use oxigraph::model::NamedNode;
use tracing::debug;

use super::entity::{EntityId, EntityInstance, EntityRef, RecordId, Target};
use super::record::{RecordBuilder, StructuredPropertyInstance};
use crate::compile::{CompiledGraph, GraphCompiler};
use crate::error::{MasonError, MasonResult, TypeConstraintError};
use crate::ontology::GraphValidator;
use crate::schema::{Schema, TargetType};

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

/// One modeling workspace over a shared [`Schema`].
///
/// Owns every entity and record created through it. Handles from one
/// session are rejected by every other session.
pub struct Session {
    id: u64,
    schema: Arc<Schema>,
    entities: Vec<EntityInstance>,
    by_uri: HashMap<String, EntityId>,
    records: Vec<StructuredPropertyInstance>,
}

impl Session {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            id: NEXT_SESSION.fetch_add(1, Ordering::Relaxed),
            schema,
            entities: Vec::new(),
            by_uri: HashMap::new(),
            records: Vec::new(),
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Create an instance of the class named `class`.
    pub fn create_entity(
        &mut self,
        class: &str,
        uri: &str,
        label: Option<&str>,
    ) -> MasonResult<EntityId> {
        let class_id = self
            .schema
            .types()
            .by_name(class)
            .ok_or_else(|| MasonError::UnknownClass(class.to_string()))?;
        let uri = NamedNode::new(uri).map_err(|e| MasonError::InvalidIri {
            iri: uri.to_string(),
            reason: e.to_string(),
        })?;
        if self.by_uri.contains_key(uri.as_str()) {
            return Err(MasonError::DuplicateEntity(uri.as_str().to_string()));
        }

        let id = EntityId {
            session: self.id,
            index: self.entities.len(),
        };
        debug!(uri = %uri, class, "created entity");
        self.by_uri.insert(uri.as_str().to_string(), id);
        self.entities
            .push(EntityInstance::new(uri, label.map(str::to_string), class_id));
        Ok(id)
    }

    pub fn entity(&self, id: EntityId) -> MasonResult<EntityRef<'_>> {
        let instance = self.entity_instance(id)?;
        Ok(EntityRef {
            schema: &self.schema,
            id,
            instance,
        })
    }

    pub fn entity_by_uri(&self, uri: &str) -> Option<EntityId> {
        self.by_uri.get(uri).copied()
    }

    pub fn entities(&self) -> impl Iterator<Item = EntityRef<'_>> {
        self.entities
            .iter()
            .enumerate()
            .map(|(index, instance)| EntityRef {
                schema: &self.schema,
                id: EntityId {
                    session: self.id,
                    index,
                },
                instance,
            })
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Start a record of the shape named `shape`.
    pub fn record(&mut self, shape: &str) -> MasonResult<RecordBuilder<'_>> {
        let shape_id = self
            .schema
            .shapes()
            .by_name(shape)
            .ok_or_else(|| MasonError::UnknownShape(shape.to_string()))?;
        Ok(RecordBuilder::new(self, shape_id))
    }

    pub fn get_record(&self, id: RecordId) -> MasonResult<&StructuredPropertyInstance> {
        if id.session != self.id {
            return Err(MasonError::UnknownInstance(format!("record #{}", id.index)));
        }
        self.records
            .get(id.index)
            .ok_or_else(|| MasonError::UnknownInstance(format!("record #{}", id.index)))
    }

    pub fn records(&self) -> &[StructuredPropertyInstance] {
        &self.records
    }

    pub(crate) fn register_record(&mut self, record: StructuredPropertyInstance) -> RecordId {
        let id = RecordId {
            session: self.id,
            index: self.records.len(),
        };
        debug!(record = %record.id(), "registered record");
        self.records.push(record);
        id
    }

    /// Append `target` to `subject`'s `property` relation.
    ///
    /// Fails without touching the relation list when the subject's class is
    /// not in the property's domain or the target's type is outside the
    /// allowed set.
    pub fn add_relation(
        &mut self,
        subject: EntityId,
        property: &str,
        target: impl Into<Target>,
    ) -> MasonResult<()> {
        let target = target.into();
        let subject_instance = self.entity_instance(subject)?;
        let types = self.schema.types();
        let class = types.get(subject_instance.class());

        let unknown_relation = || MasonError::UnknownRelation {
            class: class.name().to_string(),
            property: property.to_string(),
        };
        let descriptor = self
            .schema
            .properties()
            .get(property)
            .ok_or_else(unknown_relation)?;
        let binding = descriptor
            .binding_for(types, subject_instance.class())
            .ok_or_else(unknown_relation)?;

        let (target_name, target_type, satisfied) = match target {
            Target::Entity(id) => {
                let target_instance = self.entity_instance(id)?;
                let satisfied = binding.range.iter().any(|allowed| match allowed {
                    TargetType::Class(c) => types.is_subclass_of(target_instance.class(), *c),
                    TargetType::Shape(_) => false,
                });
                (
                    target_instance.uri().as_str().to_string(),
                    types.get(target_instance.class()).name().to_string(),
                    satisfied,
                )
            }
            Target::Record(id) => {
                let record = self.get_record(id)?;
                let satisfied = binding
                    .range
                    .iter()
                    .any(|allowed| *allowed == TargetType::Shape(record.shape()));
                (
                    record.id().to_string(),
                    self.schema.shapes().get(record.shape()).name().to_string(),
                    satisfied,
                )
            }
        };

        if !binding.range.is_empty() && !satisfied {
            let err = TypeConstraintError {
                instance: subject_instance.uri().as_str().to_string(),
                property: descriptor.name().to_string(),
                target: target_name,
                target_type,
                allowed: binding
                    .range
                    .iter()
                    .map(|t| self.schema.target_name(*t).to_string())
                    .collect(),
            };
            debug!(error = %err, "rejected relation");
            return Err(err.into());
        }

        let property_name = descriptor.name().to_string();
        self.entities[subject.index].attach(&property_name, target);
        Ok(())
    }

    /// [`Self::add_relation`] addressed by capability name, e.g. `add_feeds`.
    pub fn invoke(
        &mut self,
        subject: EntityId,
        capability: &str,
        target: impl Into<Target>,
    ) -> MasonResult<()> {
        let Some(property) = capability.strip_prefix("add_") else {
            let class = self.entity_instance(subject)?.class();
            return Err(MasonError::UnknownRelation {
                class: self.schema.types().get(class).name().to_string(),
                property: capability.to_string(),
            });
        };
        self.add_relation(subject, property, target)
    }

    pub fn relation(&self, subject: EntityId, property: &str) -> MasonResult<&[Target]> {
        Ok(self.entity_instance(subject)?.relation(property))
    }

    /// Compile every entity and record into a graph and validate it with the
    /// schema's validator.
    pub fn compile(&self, bindings: &[(&str, &str)]) -> MasonResult<CompiledGraph> {
        self.compile_with(bindings, self.schema.validator())
    }

    pub fn compile_with(
        &self,
        bindings: &[(&str, &str)],
        validator: &dyn GraphValidator,
    ) -> MasonResult<CompiledGraph> {
        GraphCompiler::new(&self.schema)?.compile(self, bindings, validator)
    }

    pub(crate) fn entity_instance(&self, id: EntityId) -> MasonResult<&EntityInstance> {
        if id.session != self.id {
            return Err(MasonError::UnknownInstance(format!("entity #{}", id.index)));
        }
        self.entities
            .get(id.index)
            .ok_or_else(|| MasonError::UnknownInstance(format!("entity #{}", id.index)))
    }

    pub(crate) fn entity_instances(&self) -> &[EntityInstance] {
        &self.entities
    }
}
