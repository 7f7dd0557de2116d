//! Ontology-side graph checks
//!
//! - **SHACL validation** - node and property shapes evaluated over a data
//!   graph, with class constraints resolved through the ontology's
//!   `rdfs:subClassOf` hierarchy
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use brick_mason::ontology::{GraphValidator, ShapeValidator};
//!
//! let validator = ShapeValidator::from_file("Brick.ttl")?;
//! let data = validator.load_data_from_file("building.ttl")?;
//! let report = validator.validate(&data)?;
//!
//! if !report.conforms() {
//!     eprintln!("{report}");
//! }
//! ```

pub mod shacl;

pub use shacl::{
    ConstraintChecker, GraphValidator, NodeShape, PropertyShape, Severity, ShapeDiscovery,
    ShapeValidator, ValidationReport, ValidationResult,
};
