// =============================================================================
// SPARQL Result Mapper
// =============================================================================
// Map SPARQL query results to schema row types with error accumulation

use super::typed_binding::{BindingError, TypedBinding};
use oxigraph::sparql::QuerySolution;
use thiserror::Error;

/// Errors that can occur during result mapping
#[derive(Debug, Error, Clone)]
pub enum MappingError {
    #[error("Binding error: {0}")]
    Binding(#[from] BindingError),

    #[error("Multiple errors occurred:\n{}", .0.join("\n"))]
    Multiple(Vec<String>),
}

/// Trait for types that can be constructed from a SPARQL query solution
pub trait FromSparql: Sized {
    fn from_binding(binding: &TypedBinding<'_>) -> Result<Self, MappingError>;

    fn from_solution(solution: &QuerySolution) -> Result<Self, MappingError> {
        Self::from_binding(&TypedBinding::new(solution))
    }
}

pub struct ResultMapper;

impl ResultMapper {
    /// Map multiple solutions to a vector, reporting every bad row at once
    pub fn map_many<T: FromSparql>(solutions: &[QuerySolution]) -> Result<Vec<T>, MappingError> {
        let mut results = Vec::with_capacity(solutions.len());
        let mut errors = Vec::new();

        for (idx, solution) in solutions.iter().enumerate() {
            match T::from_solution(solution) {
                Ok(item) => results.push(item),
                Err(e) => errors.push(format!("Row {}: {}", idx, e)),
            }
        }

        if !errors.is_empty() {
            return Err(MappingError::Multiple(errors));
        }

        Ok(results)
    }
}
