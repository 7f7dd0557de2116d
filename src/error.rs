//! Error types for schema building, modeling and graph compilation
//!
//! This module provides:
//! - Error codes with a category and a recoverability flag
//! - `TypeConstraintError` for rejected relation targets
//! - `ShapeConstraintViolation` for rejected structured-property records
//! - `SchemaError` for failures while introspecting the ontology
//! - `MasonError`, the error every public session operation returns

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::ontology::shacl::ValidationReport;

// =============================================================================
// ERROR CODES
// =============================================================================

/// Stable classification of every [`MasonError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// A relation target had a type outside the relation's allowed set
    TypeConstraint,
    /// A structured-property record was missing a field or held a bad value
    ShapeConstraint,
    /// The compiled graph did not conform to the ontology's shapes
    Validation,
    /// A class, shape, relation, unit or instance name did not resolve
    UnknownName,
    /// An entity URI was registered twice in one session
    Duplicate,
    /// An IRI could not be parsed
    InvalidIri,
    /// The ontology could not be loaded or queried
    Schema,
    /// The graph store or the validation engine failed
    Engine,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::TypeConstraint => "type_constraint",
            ErrorCode::ShapeConstraint => "shape_constraint",
            ErrorCode::Validation => "validation",
            ErrorCode::UnknownName => "unknown_name",
            ErrorCode::Duplicate => "duplicate",
            ErrorCode::InvalidIri => "invalid_iri",
            ErrorCode::Schema => "schema",
            ErrorCode::Engine => "engine",
        }
    }

    /// Get the error category for logs
    pub fn category(&self) -> &'static str {
        match self {
            ErrorCode::TypeConstraint | ErrorCode::ShapeConstraint | ErrorCode::Validation => {
                "model_error"
            }
            ErrorCode::UnknownName | ErrorCode::Duplicate | ErrorCode::InvalidIri => {
                "client_error"
            }
            ErrorCode::Schema => "schema_error",
            ErrorCode::Engine => "engine_error",
        }
    }

    /// Whether the caller can correct the model and carry on with the same session
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ErrorCode::Schema | ErrorCode::Engine)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// MODEL ERRORS
// =============================================================================

/// Raised when a relation target's class is not among the relation's allowed types.
///
/// The attachment did not happen; the subject's relation list is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "Entity {target} (type {target_type}) must have type ({}) to be used as object of {property} on {instance}",
    allowed.join(", ")
)]
pub struct TypeConstraintError {
    /// URI of the subject instance
    pub instance: String,
    /// Short name of the relation
    pub property: String,
    /// URI or blank node label of the rejected target
    pub target: String,
    /// Class or shape name of the rejected target
    pub target_type: String,
    /// Names of the allowed classes and shapes
    pub allowed: Vec<String>,
}

/// Raised by a record constructor when the record does not satisfy its shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeConstraintViolation {
    #[error("{shape}: required field '{field}' was not provided")]
    MissingField { shape: String, field: String },

    #[error("{shape}: value {value} for '{field}' is not one of [{}]", allowed.join(", "))]
    NotInEnumeration {
        shape: String,
        field: String,
        value: String,
        allowed: Vec<String>,
    },

    #[error("{shape}: field '{field}' expects {expected}, got {actual}")]
    TypeMismatch {
        shape: String,
        field: String,
        expected: String,
        actual: String,
    },

    #[error("{shape} has no field '{field}'")]
    UnknownField { shape: String, field: String },
}

// =============================================================================
// SCHEMA ERRORS
// =============================================================================

/// Failures while loading or introspecting the ontology graph.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Failed to load ontology data: {0}")]
    Load(String),

    #[error("SPARQL query failed: {0}")]
    Query(String),

    #[error("Unexpected query row: {0}")]
    Binding(String),

    #[error("Class {class} is declared under several parents: {}", parents.join(", "))]
    MultipleParents { class: String, parents: Vec<String> },

    #[error("Invalid IRI '{iri}': {reason}")]
    InvalidIri { iri: String, reason: String },
}

// =============================================================================
// MASON ERROR
// =============================================================================

/// Error returned by session, record and compile operations.
#[derive(Debug, Error)]
pub enum MasonError {
    #[error(transparent)]
    TypeConstraint(#[from] TypeConstraintError),

    #[error(transparent)]
    ShapeConstraint(#[from] ShapeConstraintViolation),

    #[error("Compiled graph does not conform to the ontology shapes:\n{report}")]
    Validation { report: ValidationReport },

    #[error("Unknown class '{0}'")]
    UnknownClass(String),

    #[error("Unknown shape '{0}'")]
    UnknownShape(String),

    #[error("Class {class} has no relation '{property}'")]
    UnknownRelation { class: String, property: String },

    #[error("Unknown unit '{0}'")]
    UnknownUnit(String),

    #[error("Instance {0} does not belong to this session")]
    UnknownInstance(String),

    #[error("An entity with URI {0} already exists")]
    DuplicateEntity(String),

    #[error("Invalid IRI '{iri}': {reason}")]
    InvalidIri { iri: String, reason: String },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("Graph store error: {0}")]
    Store(String),

    #[error("Validation engine failed: {0}")]
    ValidationEngine(String),
}

impl MasonError {
    pub fn code(&self) -> ErrorCode {
        match self {
            MasonError::TypeConstraint(_) => ErrorCode::TypeConstraint,
            MasonError::ShapeConstraint(_) => ErrorCode::ShapeConstraint,
            MasonError::Validation { .. } => ErrorCode::Validation,
            MasonError::UnknownClass(_)
            | MasonError::UnknownShape(_)
            | MasonError::UnknownRelation { .. }
            | MasonError::UnknownUnit(_)
            | MasonError::UnknownInstance(_) => ErrorCode::UnknownName,
            MasonError::DuplicateEntity(_) => ErrorCode::Duplicate,
            MasonError::InvalidIri { .. } => ErrorCode::InvalidIri,
            MasonError::Schema(_) => ErrorCode::Schema,
            MasonError::Store(_) | MasonError::ValidationEngine(_) => ErrorCode::Engine,
        }
    }

    /// The diagnostic report of a failed compile, if this is one
    pub fn validation_report(&self) -> Option<&ValidationReport> {
        match self {
            MasonError::Validation { report } => Some(report),
            _ => None,
        }
    }
}

/// Result alias for session, record and compile operations.
pub type MasonResult<T> = Result<T, MasonError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_errors_are_recoverable() {
        let err = MasonError::from(ShapeConstraintViolation::MissingField {
            shape: "AreaShape".to_string(),
            field: "value".to_string(),
        });
        assert_eq!(err.code(), ErrorCode::ShapeConstraint);
        assert!(err.code().is_recoverable());
        assert_eq!(err.code().category(), "model_error");

        let err = MasonError::Store("disk gone".to_string());
        assert!(!err.code().is_recoverable());
    }

    #[test]
    fn type_constraint_message_names_the_rejected_target() {
        let err = TypeConstraintError {
            instance: "urn:bldg#mysite".to_string(),
            property: "hasPart".to_string(),
            target: "urn:bldg#bad_sensor".to_string(),
            target_type: "Temperature_Sensor".to_string(),
            allowed: vec!["Floor".to_string(), "Space".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Entity urn:bldg#bad_sensor (type Temperature_Sensor) must have type (Floor, Space) \
             to be used as object of hasPart on urn:bldg#mysite"
        );
    }
}
