// =============================================================================
// Type-Safe SPARQL Bindings
// =============================================================================
// Extract schema query bindings as oxigraph terms, tolerating unbound OPTIONALs

use oxigraph::model::{NamedNode, Term};
use oxigraph::sparql::QuerySolution;
use thiserror::Error;

/// Errors that can occur when extracting typed bindings
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BindingError {
    #[error("Variable '{0}' is unbound")]
    Unbound(String),

    #[error("Expected {expected} for '{var}', got {actual}")]
    TypeMismatch {
        var: String,
        expected: String,
        actual: String,
    },

    #[error("Failed to convert '{var}' to {target_type}: {reason}")]
    ConversionFailed {
        var: String,
        target_type: String,
        reason: String,
    },
}

/// Binding extractor for one SPARQL query solution
pub struct TypedBinding<'a> {
    solution: &'a QuerySolution,
}

impl<'a> TypedBinding<'a> {
    pub fn new(solution: &'a QuerySolution) -> Self {
        Self { solution }
    }

    /// Get optional term for a variable
    pub fn term_opt(&self, var: &str) -> Option<&'a Term> {
        self.solution.get(var)
    }

    /// Get a required term
    pub fn term(&self, var: &str) -> Result<&'a Term, BindingError> {
        self.term_opt(var)
            .ok_or_else(|| BindingError::Unbound(var.to_string()))
    }

    /// Extract a required IRI
    pub fn iri(&self, var: &str) -> Result<NamedNode, BindingError> {
        match self.term(var)? {
            Term::NamedNode(node) => Ok(node.clone()),
            term => Err(BindingError::TypeMismatch {
                var: var.to_string(),
                expected: "IRI".to_string(),
                actual: term_type_name(term),
            }),
        }
    }

    /// Extract an optional IRI; a bound non-IRI value is treated as absent.
    ///
    /// Schema rows routinely carry blank nodes where an IRI is expected
    /// (anonymous `owl:unionOf` domains, for instance) and those degrade to
    /// "not declared".
    pub fn iri_opt(&self, var: &str) -> Option<NamedNode> {
        match self.term_opt(var) {
            Some(Term::NamedNode(node)) => Some(node.clone()),
            _ => None,
        }
    }

    /// Extract an optional literal's lexical value
    pub fn literal_opt(&self, var: &str) -> Option<String> {
        match self.term_opt(var) {
            Some(Term::Literal(lit)) => Some(lit.value().to_string()),
            _ => None,
        }
    }

    /// Extract an optional integer literal
    pub fn integer_opt(&self, var: &str) -> Result<Option<i64>, BindingError> {
        match self.term_opt(var) {
            None => Ok(None),
            Some(Term::Literal(lit)) => lit.value().trim().parse::<i64>().map(Some).map_err(|e| {
                BindingError::ConversionFailed {
                    var: var.to_string(),
                    target_type: "integer".to_string(),
                    reason: e.to_string(),
                }
            }),
            Some(term) => Err(BindingError::TypeMismatch {
                var: var.to_string(),
                expected: "Literal".to_string(),
                actual: term_type_name(term),
            }),
        }
    }
}

/// Get the kind of a term for error messages
pub fn term_type_name(term: &Term) -> String {
    match term {
        Term::NamedNode(_) => "IRI".to_string(),
        Term::BlankNode(_) => "BlankNode".to_string(),
        Term::Literal(_) => "Literal".to_string(),
        #[allow(unreachable_patterns)]
        _ => "Triple".to_string(),
    }
}
