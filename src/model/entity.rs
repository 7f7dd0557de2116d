use std::fmt;

use indexmap::IndexMap;
use oxigraph::model::NamedNode;

use crate::schema::{ClassId, Schema};

/// Handle to an entity created by a [`Session`](super::Session).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityId {
    pub(crate) session: u64,
    pub(crate) index: usize,
}

/// Handle to a structured-property record created by a [`Session`](super::Session).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub(crate) session: u64,
    pub(crate) index: usize,
}

/// Object of a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Entity(EntityId),
    Record(RecordId),
}

impl From<EntityId> for Target {
    fn from(id: EntityId) -> Self {
        Target::Entity(id)
    }
}

impl From<RecordId> for Target {
    fn from(id: RecordId) -> Self {
        Target::Record(id)
    }
}

/// A modeled equipment, point or location.
#[derive(Debug, Clone)]
pub struct EntityInstance {
    uri: NamedNode,
    label: Option<String>,
    class: ClassId,
    /// Relation name -> targets, both in first-attached order
    properties: IndexMap<String, Vec<Target>>,
}

impl EntityInstance {
    pub(crate) fn new(uri: NamedNode, label: Option<String>, class: ClassId) -> Self {
        Self {
            uri,
            label,
            class,
            properties: IndexMap::new(),
        }
    }

    pub fn uri(&self) -> &NamedNode {
        &self.uri
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn class(&self) -> ClassId {
        self.class
    }

    /// Names of the relations attached so far, in first-use order.
    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    /// Targets of one relation; empty if it was never attached.
    pub fn relation(&self, property: &str) -> &[Target] {
        self.properties
            .get(property)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn relations(&self) -> impl Iterator<Item = (&str, &[Target])> {
        self.properties
            .iter()
            .map(|(name, targets)| (name.as_str(), targets.as_slice()))
    }

    pub(crate) fn attach(&mut self, property: &str, target: Target) {
        self.properties
            .entry(property.to_string())
            .or_default()
            .push(target);
    }
}

/// An entity together with the schema that types it.
#[derive(Clone, Copy)]
pub struct EntityRef<'a> {
    pub(crate) schema: &'a Schema,
    pub(crate) id: EntityId,
    pub(crate) instance: &'a EntityInstance,
}

impl<'a> EntityRef<'a> {
    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn uri(&self) -> &'a NamedNode {
        self.instance.uri()
    }

    pub fn label(&self) -> Option<&'a str> {
        self.instance.label()
    }

    pub fn class_name(&self) -> &'a str {
        self.schema.types().get(self.instance.class()).name()
    }

    pub fn instance(&self) -> &'a EntityInstance {
        self.instance
    }

    pub fn relation(&self, property: &str) -> &'a [Target] {
        self.instance.relation(property)
    }

    /// Whether the entity's class is `class_name` or one of its subclasses.
    pub fn is_a(&self, class_name: &str) -> bool {
        let types = self.schema.types();
        types
            .by_name(class_name)
            .is_some_and(|class| types.is_subclass_of(self.instance.class(), class))
    }
}

impl fmt::Display for EntityRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let class = self.schema.types().get(self.instance.class());
        write!(
            f,
            "<BRICK {}: {}>",
            class.display_label(),
            self.instance.uri().as_str()
        )
    }
}

impl fmt::Debug for EntityRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
