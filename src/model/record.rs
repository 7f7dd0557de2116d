//! Structured-property records and the builder that checks them against
//! their shape.

use indexmap::IndexMap;
use oxigraph::model::{BlankNode, Literal, NamedNode, Term};

use super::entity::{EntityId, RecordId};
use super::session::Session;
use crate::error::{MasonError, MasonResult, ShapeConstraintViolation};
use crate::schema::{FieldDescriptor, FieldKind, ScalarKind, ShapeId, UnitDescriptor};
use crate::vocab::{self, local_name};

/// A value stored in a record field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// A literal, an enumeration member, a unit or a plain IRI
    Term(Term),
    Entity(EntityId),
    Record(RecordId),
}

/// A constructed structured property. Immutable once built.
#[derive(Debug, Clone)]
pub struct StructuredPropertyInstance {
    id: BlankNode,
    shape: ShapeId,
    /// Every declared field, in shape order; `None` when left unset
    values: IndexMap<String, Option<FieldValue>>,
}

impl StructuredPropertyInstance {
    /// Anonymous identity the record compiles to.
    pub fn id(&self) -> &BlankNode {
        &self.id
    }

    pub fn shape(&self) -> ShapeId {
        self.shape
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.values.get(field).and_then(Option::as_ref)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, Option<&FieldValue>)> {
        self.values
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_ref()))
    }
}

/// Anything a record field can be set from.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldInput {
    Float(f64),
    Integer(i64),
    Boolean(bool),
    Text(String),
    Iri(NamedNode),
    Literal(Literal),
    Unit(NamedNode),
    Entity(EntityId),
    Record(RecordId),
}

impl FieldInput {
    fn describe(&self) -> String {
        match self {
            FieldInput::Float(v) => format!("float {v}"),
            FieldInput::Integer(v) => format!("integer {v}"),
            FieldInput::Boolean(v) => format!("boolean {v}"),
            FieldInput::Text(v) => format!("text {v:?}"),
            FieldInput::Iri(v) => format!("IRI {v}"),
            FieldInput::Literal(v) => format!("literal {v}"),
            FieldInput::Unit(v) => format!("unit {v}"),
            FieldInput::Entity(_) => "entity".to_string(),
            FieldInput::Record(_) => "record".to_string(),
        }
    }
}

impl From<f64> for FieldInput {
    fn from(v: f64) -> Self {
        FieldInput::Float(v)
    }
}

impl From<i64> for FieldInput {
    fn from(v: i64) -> Self {
        FieldInput::Integer(v)
    }
}

impl From<i32> for FieldInput {
    fn from(v: i32) -> Self {
        FieldInput::Integer(v.into())
    }
}

impl From<bool> for FieldInput {
    fn from(v: bool) -> Self {
        FieldInput::Boolean(v)
    }
}

impl From<&str> for FieldInput {
    fn from(v: &str) -> Self {
        FieldInput::Text(v.to_string())
    }
}

impl From<String> for FieldInput {
    fn from(v: String) -> Self {
        FieldInput::Text(v)
    }
}

impl From<NamedNode> for FieldInput {
    fn from(v: NamedNode) -> Self {
        FieldInput::Iri(v)
    }
}

impl From<Literal> for FieldInput {
    fn from(v: Literal) -> Self {
        FieldInput::Literal(v)
    }
}

impl From<&UnitDescriptor> for FieldInput {
    fn from(v: &UnitDescriptor) -> Self {
        FieldInput::Unit(v.uri().clone())
    }
}

impl From<EntityId> for FieldInput {
    fn from(v: EntityId) -> Self {
        FieldInput::Entity(v)
    }
}

impl From<RecordId> for FieldInput {
    fn from(v: RecordId) -> Self {
        FieldInput::Record(v)
    }
}

/// Collects field values for one record; nothing is checked or registered
/// until [`RecordBuilder::build`].
pub struct RecordBuilder<'s> {
    session: &'s mut Session,
    shape: ShapeId,
    inputs: Vec<(String, FieldInput)>,
}

impl<'s> RecordBuilder<'s> {
    pub(crate) fn new(session: &'s mut Session, shape: ShapeId) -> Self {
        Self {
            session,
            shape,
            inputs: Vec::new(),
        }
    }

    /// Set a field. Setting the same field twice keeps the last value.
    pub fn set(mut self, field: &str, value: impl Into<FieldInput>) -> Self {
        let value = value.into();
        match self.inputs.iter_mut().find(|(name, _)| name.as_str() == field) {
            Some(slot) => slot.1 = value,
            None => self.inputs.push((field.to_string(), value)),
        }
        self
    }

    /// Check every field against the shape and register the record.
    pub fn build(self) -> MasonResult<RecordId> {
        let schema = self.session.schema().clone();
        let shape = schema.shapes().get(self.shape);

        if let Some((name, _)) = self
            .inputs
            .iter()
            .find(|(name, _)| shape.field(name).is_none())
        {
            return Err(ShapeConstraintViolation::UnknownField {
                shape: shape.name().to_string(),
                field: name.clone(),
            }
            .into());
        }

        let mut values = IndexMap::new();
        for field in shape.fields() {
            let input = self
                .inputs
                .iter()
                .find(|(name, _)| *name == field.name)
                .map(|(_, input)| input);
            let value = match input {
                Some(input) => Some(resolve_field(self.session, shape.name(), field, input)?),
                None if field.required => {
                    return Err(ShapeConstraintViolation::MissingField {
                        shape: shape.name().to_string(),
                        field: field.name.clone(),
                    }
                    .into());
                }
                None => None,
            };
            values.insert(field.name.clone(), value);
        }

        Ok(self.session.register_record(StructuredPropertyInstance {
            id: BlankNode::default(),
            shape: self.shape,
            values,
        }))
    }
}

fn resolve_field(
    session: &Session,
    shape: &str,
    field: &FieldDescriptor,
    input: &FieldInput,
) -> MasonResult<FieldValue> {
    let mismatch = |expected: String| -> MasonError {
        ShapeConstraintViolation::TypeMismatch {
            shape: shape.to_string(),
            field: field.name.clone(),
            expected,
            actual: input.describe(),
        }
        .into()
    };

    match &field.kind {
        FieldKind::Enumeration { members } => members
            .iter()
            .find(|member| enum_matches(&member.term, &member.key, input))
            .map(|member| FieldValue::Term(member.term.clone()))
            .ok_or_else(|| {
                ShapeConstraintViolation::NotInEnumeration {
                    shape: shape.to_string(),
                    field: field.name.clone(),
                    value: input.describe(),
                    allowed: members.iter().map(|m| m.key.clone()).collect(),
                }
                .into()
            }),

        FieldKind::Unit { allowed } => {
            let unit = match input {
                FieldInput::Unit(uri) | FieldInput::Iri(uri) => uri.clone(),
                FieldInput::Text(key) => session
                    .schema()
                    .units()
                    .find(key)
                    .map(|unit| unit.uri().clone())
                    .ok_or_else(|| MasonError::UnknownUnit(key.clone()))?,
                _ => return Err(mismatch("Unit".to_string())),
            };
            if !allowed.is_empty() && !allowed.contains(&unit) {
                return Err(ShapeConstraintViolation::NotInEnumeration {
                    shape: shape.to_string(),
                    field: field.name.clone(),
                    value: unit.as_str().to_string(),
                    allowed: allowed
                        .iter()
                        .map(|u| local_name(u.as_str()).to_string())
                        .collect(),
                }
                .into());
            }
            Ok(FieldValue::Term(unit.into()))
        }

        FieldKind::Scalar { datatype, scalar } => {
            let expected = || local_name(datatype.as_str()).to_string();
            let lexical = match (scalar, input) {
                (_, FieldInput::Literal(lit)) if lit.datatype() == datatype.as_ref() => {
                    return Ok(FieldValue::Term(lit.clone().into()));
                }
                (ScalarKind::Float, FieldInput::Float(v)) => {
                    if !v.is_finite() && datatype.as_ref() == vocab::XSD_DECIMAL {
                        return Err(mismatch(expected()));
                    }
                    format_float(*v)
                }
                (ScalarKind::Float, FieldInput::Integer(v)) => v.to_string(),
                (ScalarKind::Integer, FieldInput::Integer(v)) => v.to_string(),
                (ScalarKind::Boolean, FieldInput::Boolean(v)) => v.to_string(),
                (ScalarKind::String | ScalarKind::Other, FieldInput::Text(v)) => v.clone(),
                _ => return Err(mismatch(expected())),
            };
            Ok(FieldValue::Term(
                Literal::new_typed_literal(lexical, datatype.clone()).into(),
            ))
        }

        FieldKind::Reference { classes } => match input {
            FieldInput::Entity(id) => {
                let entity = session.entity(*id)?;
                let types = session.schema().types();
                let resolvable: Vec<_> = classes
                    .iter()
                    .filter_map(|c| types.by_uri(c.as_str()))
                    .collect();
                if !resolvable.is_empty()
                    && !resolvable
                        .iter()
                        .any(|c| types.is_subclass_of(entity.instance().class(), *c))
                {
                    return Err(mismatch(field.kind.describe()));
                }
                Ok(FieldValue::Entity(*id))
            }
            FieldInput::Record(id) => {
                session.get_record(*id)?;
                Ok(FieldValue::Record(*id))
            }
            FieldInput::Iri(uri) | FieldInput::Unit(uri) => Ok(FieldValue::Term(uri.clone().into())),
            _ => Err(mismatch(field.kind.describe())),
        },
    }
}

fn enum_matches(term: &Term, key: &str, input: &FieldInput) -> bool {
    match (term, input) {
        (_, FieldInput::Text(text)) => key == text.as_str() || matches!(term, Term::NamedNode(n) if n.as_str() == text),
        (Term::NamedNode(n), FieldInput::Iri(iri) | FieldInput::Unit(iri)) => n == iri,
        (_, FieldInput::Literal(lit)) => matches!(term, Term::Literal(l) if l == lit),
        (Term::Literal(l), FieldInput::Integer(v)) => l.value().trim().parse::<i64>().ok() == Some(*v),
        (Term::Literal(l), FieldInput::Float(v)) => l.value().trim().parse::<f64>().ok() == Some(*v),
        (Term::Literal(l), FieldInput::Boolean(v)) => l.value().trim() == v.to_string(),
        _ => false,
    }
}

/// Lexical form of a float that is valid for `xsd:decimal`, `xsd:double`
/// and `xsd:float` alike when finite.
fn format_float(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v.is_infinite() {
        (if v > 0.0 { "INF" } else { "-INF" }).to_string()
    } else {
        format!("{v}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floats_format_without_exponent() {
        assert_eq!(format_float(10.0), "10");
        assert_eq!(format_float(0.25), "0.25");
        assert_eq!(format_float(f64::INFINITY), "INF");
    }

    #[test]
    fn enumeration_matches_by_key_or_iri() {
        let iri = NamedNode::new_unchecked("http://qudt.org/vocab/unit/M2");
        let term: Term = iri.clone().into();
        assert!(enum_matches(&term, "M2", &FieldInput::Text("M2".into())));
        assert!(enum_matches(&term, "M2", &FieldInput::Iri(iri)));
        assert!(!enum_matches(&term, "M2", &FieldInput::Text("FT2".into())));

        let literal: Term = Literal::new_simple_literal("real").into();
        assert!(enum_matches(&literal, "real", &FieldInput::from("real")));
        assert!(!enum_matches(&literal, "real", &FieldInput::from(1.0)));
    }
}
