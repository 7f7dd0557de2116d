//! SPARQL query execution and row decoding for schema introspection
//!
//! - `typed_binding`: pull IRIs, literals and integers out of a solution
//! - `result_mapper`: turn whole result sets into row structs

pub mod result_mapper;
pub mod typed_binding;

pub use result_mapper::{FromSparql, MappingError, ResultMapper};
pub use typed_binding::{BindingError, TypedBinding};

use oxigraph::sparql::{QueryResults, QuerySolution};
use oxigraph::store::Store;

use crate::error::SchemaError;

/// Prefix block prepended to every schema query.
pub const PREFIXES: &str = "\
PREFIX rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#>
PREFIX rdfs: <http://www.w3.org/2000/01/rdf-schema#>
PREFIX owl: <http://www.w3.org/2002/07/owl#>
PREFIX skos: <http://www.w3.org/2004/02/skos/core#>
PREFIX sh: <http://www.w3.org/ns/shacl#>
PREFIX qudt: <http://qudt.org/schema/qudt/>
PREFIX dcterms: <http://purl.org/dc/terms/>
";

/// Run a SELECT query and collect its solutions.
pub fn select(store: &Store, query: &str) -> Result<Vec<QuerySolution>, SchemaError> {
    let full = format!("{PREFIXES}{query}");
    #[allow(deprecated)]
    let results = store
        .query(full.as_str())
        .map_err(|e| SchemaError::Query(e.to_string()))?;

    match results {
        QueryResults::Solutions(solutions) => solutions
            .map(|s| s.map_err(|e| SchemaError::Query(e.to_string())))
            .collect(),
        _ => Err(SchemaError::Query(
            "expected a SELECT result set".to_string(),
        )),
    }
}

/// Run a SELECT query and decode every row as `T`.
pub fn select_rows<T: FromSparql>(store: &Store, query: &str) -> Result<Vec<T>, SchemaError> {
    let solutions = select(store, query)?;
    ResultMapper::map_many(&solutions).map_err(|e| SchemaError::Binding(e.to_string()))
}
