//! Relationship bindings.
//!
//! Three sources feed the registry:
//! - `owl:ObjectProperty` declarations (domain, range)
//! - node shapes whose property shapes name an `sh:class` (target class
//!   becomes a domain, the class becomes an allowed target)
//! - entity properties (domain, range naming a compiled shape)
//!
//! A property is bound to each resolved domain class together with the set
//! of target types allowed from that domain. An instance sees the binding of
//! its nearest bound ancestor.

use std::collections::HashMap;

use oxigraph::model::NamedNode;
use tracing::{debug, warn};

use super::introspect::SchemaIntrospector;
use super::shapes::{ShapeId, ShapeRegistry};
use super::types::{ClassId, TypeRegistry};
use crate::error::SchemaError;
use crate::vocab::local_name;

/// Something a relation may point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetType {
    Class(ClassId),
    Shape(ShapeId),
}

/// One domain class of a property and what it may point at from there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationBinding {
    pub domain: ClassId,
    /// Allowed targets; empty means unconstrained.
    pub range: Vec<TargetType>,
}

#[derive(Debug, Clone)]
pub struct PropertyDescriptor {
    uri: NamedNode,
    name: String,
    bindings: Vec<RelationBinding>,
}

impl PropertyDescriptor {
    pub fn uri(&self) -> &NamedNode {
        &self.uri
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the mutation capability attached to the domain classes.
    pub fn capability(&self) -> String {
        format!("add_{}", self.name)
    }

    pub fn bindings(&self) -> &[RelationBinding] {
        &self.bindings
    }

    pub fn domains(&self) -> impl Iterator<Item = ClassId> + '_ {
        self.bindings.iter().map(|b| b.domain)
    }

    /// Union of every binding's allowed targets, or `None` when unconstrained.
    pub fn range(&self) -> Option<Vec<TargetType>> {
        let mut all: Vec<TargetType> = Vec::new();
        for target in self.bindings.iter().flat_map(|b| b.range.iter()) {
            if !all.contains(target) {
                all.push(*target);
            }
        }
        (!all.is_empty()).then_some(all)
    }

    /// The binding that applies to an instance of `class`: the one whose
    /// domain is the closest ancestor. Ties merge their ranges, and an
    /// unconstrained binding among them leaves the relation unconstrained.
    pub fn binding_for(&self, types: &TypeRegistry, class: ClassId) -> Option<RelationBinding> {
        let mut nearest: Option<(usize, Vec<&RelationBinding>)> = None;
        for binding in &self.bindings {
            let Some(distance) = types.distance(class, binding.domain) else {
                continue;
            };
            let closer = nearest.as_ref().is_none_or(|(best, _)| distance < *best);
            if closer {
                nearest = Some((distance, vec![binding]));
            } else if let Some((best, group)) = nearest.as_mut() {
                if distance == *best {
                    group.push(binding);
                }
            }
        }

        let (_, group) = nearest?;
        let domain = group[0].domain;
        let range = if group.iter().any(|b| b.range.is_empty()) {
            Vec::new()
        } else {
            let mut merged = Vec::new();
            for target in group.iter().flat_map(|b| b.range.iter()) {
                if !merged.contains(target) {
                    merged.push(*target);
                }
            }
            merged
        };
        Some(RelationBinding { domain, range })
    }
}

#[derive(Default)]
struct PendingProperty {
    uri: Option<NamedNode>,
    /// domain (None = universal base) -> declared range IRIs
    domains: Vec<(Option<NamedNode>, Vec<NamedNode>)>,
    declared_domain_unresolved: bool,
}

impl PendingProperty {
    fn declare(&mut self, domain: Option<NamedNode>, range: Option<NamedNode>) {
        let slot = match self.domains.iter().position(|(d, _)| *d == domain) {
            Some(idx) => &mut self.domains[idx].1,
            None => {
                self.domains.push((domain, Vec::new()));
                let last = self.domains.len() - 1;
                &mut self.domains[last].1
            }
        };
        if let Some(range) = range {
            if !slot.contains(&range) {
                slot.push(range);
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PropertyRegistry {
    properties: Vec<PropertyDescriptor>,
    by_name: HashMap<String, usize>,
}

impl PropertyRegistry {
    pub fn build(
        introspector: &SchemaIntrospector,
        types: &TypeRegistry,
        shapes: &ShapeRegistry,
        entity_property_class: &NamedNode,
    ) -> Result<Self, SchemaError> {
        let mut pending: Vec<(String, PendingProperty)> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        let mut slot = |uri: &NamedNode| -> usize {
            let name = local_name(uri.as_str()).to_string();
            if let Some(&idx) = index.get(&name) {
                return idx;
            }
            let idx = pending.len();
            index.insert(name.clone(), idx);
            pending.push((name, PendingProperty::default()));
            idx
        };

        let mut sourced: Vec<(usize, NamedNode, Option<NamedNode>, Option<NamedNode>)> = Vec::new();
        for row in introspector.relationships()? {
            sourced.push((slot(&row.property), row.property, row.domain, row.range));
        }
        for row in introspector.shape_relations()? {
            sourced.push((slot(&row.path), row.path, Some(row.target_class), Some(row.allowed)));
        }
        for row in introspector.entity_properties(entity_property_class)? {
            sourced.push((slot(&row.property), row.property, row.domain, row.range));
        }

        for (idx, uri, domain, range) in sourced {
            let (name, property) = &mut pending[idx];
            if let Some(existing) = property.uri.as_ref().filter(|existing| **existing != uri) {
                warn!(
                    name = %name,
                    kept = %existing,
                    ignored = %uri,
                    "two properties share a short name, keeping the first"
                );
                continue;
            }
            property.uri.get_or_insert(uri);
            if let Some(domain_iri) = &domain {
                if types.by_uri(domain_iri.as_str()).is_none() {
                    debug!(property = %name, domain = %domain_iri, "domain is not a known class");
                    property.declared_domain_unresolved = true;
                    continue;
                }
            }
            property.declare(domain, range);
        }

        let mut registry = Self::default();
        for (name, property) in pending {
            let Some(uri) = property.uri else { continue };
            let bindings: Vec<RelationBinding> = property
                .domains
                .into_iter()
                .map(|(domain, ranges)| RelationBinding {
                    domain: domain
                        .and_then(|d| types.by_uri(d.as_str()))
                        .unwrap_or_else(|| types.base()),
                    range: resolve_range(&name, &ranges, types, shapes),
                })
                .collect();
            if bindings.is_empty() && property.declared_domain_unresolved {
                debug!(property = %name, "no resolvable domain, relation is not attached");
            }
            registry.by_name.insert(name.clone(), registry.properties.len());
            registry.properties.push(PropertyDescriptor {
                uri,
                name,
                bindings,
            });
        }

        debug!(properties = registry.len(), "bound relationship properties");
        Ok(registry)
    }

    pub fn get(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.by_name.get(name).map(|&idx| &self.properties[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.properties.iter()
    }

    /// Properties an instance of `class` may use, in registry order.
    pub fn for_class<'a>(
        &'a self,
        types: &'a TypeRegistry,
        class: ClassId,
    ) -> impl Iterator<Item = &'a PropertyDescriptor> + 'a {
        self.properties
            .iter()
            .filter(move |p| p.domains().any(|d| types.is_subclass_of(class, d)))
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

fn resolve_range(
    property: &str,
    ranges: &[NamedNode],
    types: &TypeRegistry,
    shapes: &ShapeRegistry,
) -> Vec<TargetType> {
    let mut resolved = Vec::new();
    for range in ranges {
        let target = types
            .by_uri(range.as_str())
            .map(TargetType::Class)
            .or_else(|| shapes.by_uri(range.as_str()).map(TargetType::Shape));
        match target {
            Some(target) if !resolved.contains(&target) => resolved.push(target),
            Some(_) => {}
            None => debug!(property, range = %range, "range is not a known class or shape"),
        }
    }
    resolved
}
