//! Class hierarchy: one [`ClassDescriptor`] per ontology class reachable from
//! the configured roots, all hanging off a universal base class.

use std::collections::{HashMap, HashSet, VecDeque};

use oxigraph::model::NamedNode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::introspect::SchemaIntrospector;
use crate::error::SchemaError;
use crate::vocab::local_name;

/// What to do when a class is reachable through more than one parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HierarchyPolicy {
    /// Keep the first parent found during traversal and record the others.
    #[default]
    FirstWins,
    /// Fail the schema build.
    Strict,
}

/// Index of a class inside its [`TypeRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(usize);

impl ClassId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct ClassDescriptor {
    uri: NamedNode,
    name: String,
    label: Option<String>,
    definition: Option<String>,
    parent: Option<ClassId>,
    other_parents: Vec<ClassId>,
}

impl ClassDescriptor {
    pub fn uri(&self) -> &NamedNode {
        &self.uri
    }

    /// Short name taken from the IRI's local part.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Label when present, otherwise the short name.
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    pub fn definition(&self) -> Option<&str> {
        self.definition.as_deref()
    }

    /// Parent chosen during traversal. `None` only for the base class.
    pub fn parent(&self) -> Option<ClassId> {
        self.parent
    }

    /// Further declared parents that lost to [`Self::parent`].
    pub fn other_parents(&self) -> &[ClassId] {
        &self.other_parents
    }
}

#[derive(Debug, Clone)]
pub struct TypeRegistry {
    classes: Vec<ClassDescriptor>,
    by_uri: HashMap<String, ClassId>,
    by_name: HashMap<String, ClassId>,
}

impl TypeRegistry {
    const BASE: ClassId = ClassId(0);

    /// Registry holding only the base class and the given roots.
    pub fn with_roots(namespace: &str, base: &str, roots: &[String]) -> Result<Self, SchemaError> {
        let mut registry = Self {
            classes: Vec::new(),
            by_uri: HashMap::new(),
            by_name: HashMap::new(),
        };
        registry.insert(
            namespaced(namespace, base)?,
            Some(base.to_string()),
            None,
            None,
        );
        for root in roots {
            let uri = namespaced(namespace, root)?;
            if registry.by_uri.contains_key(uri.as_str()) {
                continue;
            }
            registry.insert(uri, Some(root.clone()), None, Some(Self::BASE));
        }
        Ok(registry)
    }

    /// Walk `rdfs:subClassOf` edges down from every root with one shared
    /// visited set.
    pub fn build(
        introspector: &SchemaIntrospector,
        namespace: &str,
        base: &str,
        roots: &[String],
        policy: HierarchyPolicy,
    ) -> Result<Self, SchemaError> {
        let mut registry = Self::with_roots(namespace, base, roots)?;
        let mut visited: HashSet<ClassId> = HashSet::new();

        let root_ids: Vec<ClassId> = (1..registry.classes.len()).map(ClassId).collect();
        for root in root_ids {
            registry.descend(introspector, root, &mut visited, policy)?;
        }

        debug!(classes = registry.len(), "built class hierarchy");
        Ok(registry)
    }

    fn descend(
        &mut self,
        introspector: &SchemaIntrospector,
        current: ClassId,
        visited: &mut HashSet<ClassId>,
        policy: HierarchyPolicy,
    ) -> Result<(), SchemaError> {
        if !visited.insert(current) {
            return Ok(());
        }

        let rows = introspector.subclasses_of(&self.classes[current.0].uri)?;
        for row in rows {
            if let Some(&existing) = self.by_uri.get(row.class.as_str()) {
                self.add_secondary_parent(existing, current, policy)?;
                continue;
            }
            let child = self.insert(row.class, row.label, row.definition, Some(current));
            self.descend(introspector, child, visited, policy)?;
        }
        Ok(())
    }

    fn add_secondary_parent(
        &mut self,
        class: ClassId,
        parent: ClassId,
        policy: HierarchyPolicy,
    ) -> Result<(), SchemaError> {
        let descriptor = &self.classes[class.0];
        if class == parent
            || descriptor.parent == Some(parent)
            || descriptor.other_parents.contains(&parent)
        {
            return Ok(());
        }

        if policy == HierarchyPolicy::Strict {
            let mut parents: Vec<String> = descriptor
                .parent
                .iter()
                .chain(descriptor.other_parents.iter())
                .map(|id| self.classes[id.0].name.clone())
                .collect();
            parents.push(self.classes[parent.0].name.clone());
            return Err(SchemaError::MultipleParents {
                class: descriptor.uri.as_str().to_string(),
                parents,
            });
        }

        debug!(
            class = %descriptor.uri,
            kept = ?descriptor.parent.map(|p| self.classes[p.0].name.as_str()),
            also = %self.classes[parent.0].name,
            "class has several parents, keeping the first"
        );
        self.classes[class.0].other_parents.push(parent);
        Ok(())
    }

    fn insert(
        &mut self,
        uri: NamedNode,
        label: Option<String>,
        definition: Option<String>,
        parent: Option<ClassId>,
    ) -> ClassId {
        let id = ClassId(self.classes.len());
        let name = local_name(uri.as_str()).to_string();

        match self.by_name.get(&name) {
            Some(&existing) => warn!(
                name = %name,
                kept = %self.classes[existing.0].uri,
                ignored = %uri,
                "class name collision, name lookup keeps the first class"
            ),
            None => {
                self.by_name.insert(name.clone(), id);
            }
        }
        self.by_uri.insert(uri.as_str().to_string(), id);
        self.classes.push(ClassDescriptor {
            uri,
            name,
            label,
            definition,
            parent,
            other_parents: Vec::new(),
        });
        id
    }

    /// The universal base class.
    pub fn base(&self) -> ClassId {
        Self::BASE
    }

    pub fn get(&self, id: ClassId) -> &ClassDescriptor {
        &self.classes[id.0]
    }

    pub fn by_name(&self, name: &str) -> Option<ClassId> {
        self.by_name.get(name).copied()
    }

    pub fn by_uri(&self, uri: &str) -> Option<ClassId> {
        self.by_uri.get(uri).copied()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ClassId, &ClassDescriptor)> {
        self.classes
            .iter()
            .enumerate()
            .map(|(idx, class)| (ClassId(idx), class))
    }

    /// Primary-parent chain from `id` up to the base class, `id` first.
    pub fn ancestors(&self, id: ClassId) -> Vec<ClassId> {
        let mut chain = vec![id];
        let mut current = id;
        while let Some(parent) = self.classes[current.0].parent {
            if chain.contains(&parent) {
                break;
            }
            chain.push(parent);
            current = parent;
        }
        chain
    }

    /// Number of subclass steps from `class` up to `ancestor` over primary
    /// and secondary parents, or `None` when `ancestor` is not above `class`.
    pub fn distance(&self, class: ClassId, ancestor: ClassId) -> Option<usize> {
        let mut queue = VecDeque::from([(class, 0usize)]);
        let mut seen = HashSet::from([class]);
        while let Some((current, depth)) = queue.pop_front() {
            if current == ancestor {
                return Some(depth);
            }
            let descriptor = &self.classes[current.0];
            for parent in descriptor.parent.iter().chain(descriptor.other_parents.iter()) {
                if seen.insert(*parent) {
                    queue.push_back((*parent, depth + 1));
                }
            }
        }
        None
    }

    pub fn is_subclass_of(&self, class: ClassId, ancestor: ClassId) -> bool {
        self.distance(class, ancestor).is_some()
    }
}

fn namespaced(namespace: &str, local: &str) -> Result<NamedNode, SchemaError> {
    let iri = format!("{namespace}{local}");
    NamedNode::new(iri.clone()).map_err(|e| SchemaError::InvalidIri {
        iri,
        reason: e.to_string(),
    })
}
