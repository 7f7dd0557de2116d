//! SHACL (Shapes Constraint Language) Validation
//!
//! Validates compiled building graphs against the node shapes declared in
//! the ontology store.
//!
//! # Components
//!
//! - **ShapeValidator**: loads node shapes once and validates data stores
//! - **ShapeDiscovery**: reads node and property shapes, decides which apply to a node
//! - **ConstraintChecker**: checks one property shape against one focus node
//! - **ValidationReport**: conforms flag plus per-violation results
//! - **GraphValidator**: the seam the graph compiler validates through
//!
//! Class constraints and `sh:targetClass` follow `rdfs:subClassOf*` in the
//! ontology, so an `AHU` satisfies `sh:class brick:Equipment`. A node typed
//! with a shape's own IRI is a focus node of that shape; structured-property
//! records are typed this way.
//!
//! # Example
//!
//! ```rust,ignore
//! use brick_mason::ontology::shacl::ShapeValidator;
//!
//! let validator = ShapeValidator::from_file("Brick.ttl")?;
//! let data = validator.load_data_from_file("building.ttl")?;
//! let report = validator.validate_graph(&data)?;
//!
//! if !report.conforms() {
//!     for result in report.violations() {
//!         println!("Violation: {}", result.message());
//!     }
//! }
//! ```

use anyhow::{Context, Result};
use oxigraph::io::RdfFormat;
use oxigraph::model::*;
use oxigraph::store::Store;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::path::Path;

use crate::vocab::{self, SH_NS};

// =============================================================================
// Validator seam
// =============================================================================

/// Anything that can check a data graph and explain the result.
pub trait GraphValidator: Send + Sync {
    fn validate(&self, data: &Store) -> Result<ValidationReport>;

    /// Number of node shapes checked, when the validator knows it.
    fn shape_count(&self) -> Option<usize> {
        None
    }
}

// =============================================================================
// Severity Levels
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Violation,
}

impl Severity {
    pub fn from_iri(iri: &NamedNode) -> Self {
        match iri.as_str() {
            "http://www.w3.org/ns/shacl#Info" => Severity::Info,
            "http://www.w3.org/ns/shacl#Warning" => Severity::Warning,
            _ => Severity::Violation,
        }
    }

    pub fn to_iri(&self) -> NamedNode {
        let local = match self {
            Severity::Info => "Info",
            Severity::Warning => "Warning",
            Severity::Violation => "Violation",
        };
        NamedNode::new_unchecked(format!("{SH_NS}{local}"))
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => f.write_str("Info"),
            Severity::Warning => f.write_str("Warning"),
            Severity::Violation => f.write_str("Violation"),
        }
    }
}

// =============================================================================
// Validation Result
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// The node that caused the violation
    focus_node: String,
    /// The property path (if applicable)
    result_path: Option<String>,
    /// The value that violated the constraint
    value: Option<String>,
    /// Human-readable message
    message: String,
    severity: Severity,
    /// The source shape that was violated
    source_shape: String,
    /// The specific constraint component, e.g. `sh:minCount`
    source_constraint: Option<String>,
}

impl ValidationResult {
    pub fn new(
        focus_node: String,
        message: String,
        severity: Severity,
        source_shape: String,
    ) -> Self {
        Self {
            focus_node,
            result_path: None,
            value: None,
            message,
            severity,
            source_shape,
            source_constraint: None,
        }
    }

    pub fn with_path(mut self, path: String) -> Self {
        self.result_path = Some(path);
        self
    }

    pub fn with_value(mut self, value: String) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_constraint(mut self, constraint: String) -> Self {
        self.source_constraint = Some(constraint);
        self
    }

    pub fn focus_node(&self) -> &str {
        &self.focus_node
    }

    pub fn result_path(&self) -> Option<&str> {
        self.result_path.as_deref()
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn source_shape(&self) -> &str {
        &self.source_shape
    }

    pub fn source_constraint(&self) -> Option<&str> {
        self.source_constraint.as_deref()
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.focus_node)?;
        if let Some(path) = &self.result_path {
            write!(f, " {path}")?;
        }
        if let Some(value) = &self.value {
            write!(f, " = {value}")?;
        }
        write!(f, ": {}", self.message)?;
        match &self.source_constraint {
            Some(constraint) => write!(f, " ({constraint}, shape {})", self.source_shape),
            None => write!(f, " (shape {})", self.source_shape),
        }
    }
}

// =============================================================================
// Validation Report
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    results: Vec<ValidationResult>,
    conforms: bool,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            results: Vec::new(),
            conforms: true,
        }
    }

    pub fn add_result(&mut self, result: ValidationResult) {
        if result.severity == Severity::Violation {
            self.conforms = false;
        }
        self.results.push(result);
    }

    pub fn conforms(&self) -> bool {
        self.conforms
    }

    pub fn results(&self) -> &[ValidationResult] {
        &self.results
    }

    pub fn violations(&self) -> impl Iterator<Item = &ValidationResult> {
        self.results
            .iter()
            .filter(|r| r.severity == Severity::Violation)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationResult> {
        self.results
            .iter()
            .filter(|r| r.severity == Severity::Warning)
    }

    pub fn violation_count(&self) -> usize {
        self.violations().count()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize validation report")
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Validation Report")?;
        writeln!(f, "Conforms: {}", self.conforms)?;
        write!(f, "Results ({}):", self.results.len())?;
        for result in &self.results {
            write!(f, "\n  {result}")?;
        }
        Ok(())
    }
}

// =============================================================================
// Property Shape
// =============================================================================

/// One member of an `sh:or` list on a property shape.
#[derive(Debug, Clone, Default)]
struct Alternative {
    class: Option<NamedNode>,
    datatype: Option<NamedNode>,
}

#[derive(Debug, Clone)]
pub struct PropertyShape {
    path: NamedNode,
    datatype: Option<NamedNode>,
    class: Option<NamedNode>,
    min_count: Option<usize>,
    max_count: Option<usize>,
    pattern: Option<Regex>,
    min_length: Option<usize>,
    max_length: Option<usize>,
    min_inclusive: Option<f64>,
    max_inclusive: Option<f64>,
    in_values: Vec<Term>,
    or_alternatives: Vec<Alternative>,
    message: Option<String>,
    severity: Option<Severity>,
}

impl PropertyShape {
    fn new(path: NamedNode) -> Self {
        Self {
            path,
            datatype: None,
            class: None,
            min_count: None,
            max_count: None,
            pattern: None,
            min_length: None,
            max_length: None,
            min_inclusive: None,
            max_inclusive: None,
            in_values: Vec::new(),
            or_alternatives: Vec::new(),
            message: None,
            severity: None,
        }
    }

    pub fn path(&self) -> &NamedNode {
        &self.path
    }
}

// =============================================================================
// Node Shape
// =============================================================================

#[derive(Debug, Clone)]
pub struct NodeShape {
    id: NamedNode,
    target_classes: Vec<NamedNode>,
    target_nodes: Vec<Term>,
    properties: Vec<PropertyShape>,
    severity: Severity,
}

impl NodeShape {
    fn new(id: NamedNode) -> Self {
        Self {
            id,
            target_classes: Vec::new(),
            target_nodes: Vec::new(),
            properties: Vec::new(),
            severity: Severity::Violation,
        }
    }

    pub fn id(&self) -> &NamedNode {
        &self.id
    }

    pub fn properties(&self) -> &[PropertyShape] {
        &self.properties
    }
}

// =============================================================================
// Class closure
// =============================================================================

/// `rdfs:subClassOf*` lookups against the ontology, memoised for one
/// validation run.
struct ClassClosure<'a> {
    ontology: &'a Store,
    superclasses: RefCell<HashMap<NamedNode, HashSet<NamedNode>>>,
}

impl<'a> ClassClosure<'a> {
    fn new(ontology: &'a Store) -> Self {
        Self {
            ontology,
            superclasses: RefCell::new(HashMap::new()),
        }
    }

    /// `class` and all of its transitive superclasses.
    fn superclasses(&self, class: &NamedNode) -> Result<HashSet<NamedNode>> {
        if let Some(cached) = self.superclasses.borrow().get(class) {
            return Ok(cached.clone());
        }

        let mut seen = HashSet::from([class.clone()]);
        let mut queue = VecDeque::from([class.clone()]);
        while let Some(current) = queue.pop_front() {
            for quad in self.ontology.quads_for_pattern(
                Some(current.as_ref().into()),
                Some(vocab::SUB_CLASS_OF),
                None,
                None,
            ) {
                if let Term::NamedNode(parent) = quad?.object {
                    if seen.insert(parent.clone()) {
                        queue.push_back(parent);
                    }
                }
            }
        }

        self.superclasses
            .borrow_mut()
            .insert(class.clone(), seen.clone());
        Ok(seen)
    }

    /// Whether `node` has an `rdf:type` that is `class` or one of its
    /// subclasses. Types come from `data`; nodes untyped there (unit IRIs,
    /// ontology individuals) fall back to their types in the ontology.
    fn is_instance_of(
        &self,
        data: &Store,
        node: NamedOrBlankNodeRef<'_>,
        class: &NamedNode,
    ) -> Result<bool> {
        let mut typed = false;
        for store in [data, self.ontology] {
            for quad in store.quads_for_pattern(Some(node), Some(vocab::TYPE), None, None) {
                typed = true;
                if let Term::NamedNode(ty) = quad?.object {
                    if ty == *class || self.superclasses(&ty)?.contains(class) {
                        return Ok(true);
                    }
                }
            }
            if typed {
                break;
            }
        }
        Ok(false)
    }
}

// =============================================================================
// Shape Discovery
// =============================================================================

pub struct ShapeDiscovery<'a> {
    shapes_store: &'a Store,
}

impl<'a> ShapeDiscovery<'a> {
    pub fn new(shapes_store: &'a Store) -> Self {
        Self { shapes_store }
    }

    /// Every named `sh:NodeShape` in the shapes store.
    pub fn load_all_node_shapes(&self) -> Result<Vec<NodeShape>> {
        let mut shapes = Vec::new();

        for quad in self.shapes_store.quads_for_pattern(
            None,
            Some(vocab::TYPE),
            Some(vocab::NODE_SHAPE.into()),
            None,
        ) {
            let quad = quad?;
            if let NamedOrBlankNode::NamedNode(shape_id) = &quad.subject {
                shapes.push(self.load_node_shape(shape_id)?);
            }
        }

        shapes.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        Ok(shapes)
    }

    fn load_node_shape(&self, shape_id: &NamedNode) -> Result<NodeShape> {
        let mut shape = NodeShape::new(shape_id.clone());
        let subject: NamedOrBlankNodeRef<'_> = shape_id.as_ref().into();

        if let Some(severity) = self.named_node(subject, vocab::SEVERITY)? {
            shape.severity = Severity::from_iri(&severity);
        }
        shape.target_classes = self
            .objects(subject, vocab::TARGET_CLASS)?
            .into_iter()
            .filter_map(|term| match term {
                Term::NamedNode(node) => Some(node),
                _ => None,
            })
            .collect();
        shape.target_nodes = self.objects(subject, vocab::TARGET_NODE)?;

        for term in self.objects(subject, vocab::PROPERTY)? {
            let property = match &term {
                Term::BlankNode(node) => self.load_property_shape(node.as_ref().into())?,
                Term::NamedNode(node) => self.load_property_shape(node.as_ref().into())?,
                _ => None,
            };
            shape.properties.extend(property);
        }

        Ok(shape)
    }

    fn load_property_shape(&self, prop: NamedOrBlankNodeRef<'_>) -> Result<Option<PropertyShape>> {
        // Complex paths (sequences, inverses) are not supported
        let Some(path) = self.named_node(prop, vocab::PATH)? else {
            return Ok(None);
        };

        let mut shape = PropertyShape::new(path);
        shape.datatype = self.named_node(prop, vocab::DATATYPE)?;
        shape.class = self.named_node(prop, vocab::CLASS)?;
        shape.min_count = self.count(prop, vocab::MIN_COUNT)?;
        shape.max_count = self.count(prop, vocab::MAX_COUNT)?;
        shape.min_length = self.count(prop, vocab::MIN_LENGTH)?;
        shape.max_length = self.count(prop, vocab::MAX_LENGTH)?;
        shape.min_inclusive = self.number(prop, vocab::MIN_INCLUSIVE)?;
        shape.max_inclusive = self.number(prop, vocab::MAX_INCLUSIVE)?;
        shape.message = self.string(prop, vocab::MESSAGE)?;
        shape.severity = self
            .named_node(prop, vocab::SEVERITY)?
            .map(|iri| Severity::from_iri(&iri));

        if let Some(pattern) = self.string(prop, vocab::PATTERN)? {
            let regex = Regex::new(&pattern)
                .with_context(|| format!("invalid sh:pattern {pattern:?} on {}", shape.path))?;
            shape.pattern = Some(regex);
        }

        if let Some(head) = self.object(prop, vocab::IN)? {
            shape.in_values = self.parse_rdf_list(&head)?;
        }

        if let Some(head) = self.object(prop, vocab::OR)? {
            for member in self.parse_rdf_list(&head)? {
                let member_ref: NamedOrBlankNodeRef<'_> = match &member {
                    Term::BlankNode(node) => node.as_ref().into(),
                    Term::NamedNode(node) => node.as_ref().into(),
                    _ => continue,
                };
                shape.or_alternatives.push(Alternative {
                    class: self.named_node(member_ref, vocab::CLASS)?,
                    datatype: self.named_node(member_ref, vocab::DATATYPE)?,
                });
            }
        }

        Ok(Some(shape))
    }

    fn objects(&self, subject: NamedOrBlankNodeRef<'_>, predicate: NamedNodeRef<'_>) -> Result<Vec<Term>> {
        self.shapes_store
            .quads_for_pattern(Some(subject), Some(predicate), None, None)
            .map(|quad| Ok(quad?.object))
            .collect()
    }

    fn object(&self, subject: NamedOrBlankNodeRef<'_>, predicate: NamedNodeRef<'_>) -> Result<Option<Term>> {
        match self
            .shapes_store
            .quads_for_pattern(Some(subject), Some(predicate), None, None)
            .next()
        {
            Some(quad) => Ok(Some(quad?.object)),
            None => Ok(None),
        }
    }

    fn named_node(
        &self,
        subject: NamedOrBlankNodeRef<'_>,
        predicate: NamedNodeRef<'_>,
    ) -> Result<Option<NamedNode>> {
        match self.object(subject, predicate)? {
            Some(Term::NamedNode(node)) => Ok(Some(node)),
            _ => Ok(None),
        }
    }

    fn string(&self, subject: NamedOrBlankNodeRef<'_>, predicate: NamedNodeRef<'_>) -> Result<Option<String>> {
        match self.object(subject, predicate)? {
            Some(Term::Literal(lit)) => Ok(Some(lit.value().to_string())),
            _ => Ok(None),
        }
    }

    fn count(&self, subject: NamedOrBlankNodeRef<'_>, predicate: NamedNodeRef<'_>) -> Result<Option<usize>> {
        match self.string(subject, predicate)? {
            Some(s) => Ok(Some(
                s.trim()
                    .parse::<usize>()
                    .with_context(|| format!("{predicate} must be a non-negative integer, got {s:?}"))?,
            )),
            None => Ok(None),
        }
    }

    fn number(&self, subject: NamedOrBlankNodeRef<'_>, predicate: NamedNodeRef<'_>) -> Result<Option<f64>> {
        match self.string(subject, predicate)? {
            Some(s) => Ok(Some(
                s.trim()
                    .parse::<f64>()
                    .with_context(|| format!("{predicate} must be numeric, got {s:?}"))?,
            )),
            None => Ok(None),
        }
    }

    fn parse_rdf_list(&self, head: &Term) -> Result<Vec<Term>> {
        let mut values = Vec::new();
        let mut seen = HashSet::new();
        let mut current = head.clone();

        loop {
            let node: NamedOrBlankNodeRef<'_> = match &current {
                Term::NamedNode(node) if node.as_ref() == vocab::NIL => break,
                Term::NamedNode(node) => node.as_ref().into(),
                Term::BlankNode(node) => node.as_ref().into(),
                _ => break,
            };
            if !seen.insert(current.clone()) {
                break;
            }
            if let Some(first) = self.object(node, vocab::FIRST)? {
                values.push(first);
            }
            match self.object(node, vocab::REST)? {
                Some(rest) => current = rest,
                None => break,
            }
        }

        Ok(values)
    }

    fn is_shape_applicable(
        &self,
        node: &NamedOrBlankNode,
        shape: &NodeShape,
        data_store: &Store,
        classes: &ClassClosure<'_>,
    ) -> Result<bool> {
        let as_term: Term = node.clone().into();
        if shape.target_nodes.contains(&as_term) {
            return Ok(true);
        }

        if classes.is_instance_of(data_store, node.as_ref(), &shape.id)? {
            return Ok(true);
        }

        for target_class in &shape.target_classes {
            if classes.is_instance_of(data_store, node.as_ref(), target_class)? {
                return Ok(true);
            }
        }

        Ok(false)
    }
}

// =============================================================================
// Constraint Checker
// =============================================================================

pub struct ConstraintChecker<'a> {
    data_store: &'a Store,
    classes: &'a ClassClosure<'a>,
}

impl<'a> ConstraintChecker<'a> {
    fn new(data_store: &'a Store, classes: &'a ClassClosure<'a>) -> Self {
        Self {
            data_store,
            classes,
        }
    }

    /// Check all constraints of a property shape on one focus node
    pub fn check_property(
        &self,
        focus_node: &NamedOrBlankNode,
        property: &PropertyShape,
        shape_id: &str,
    ) -> Result<Vec<ValidationResult>> {
        let mut results = Vec::new();
        let values = self.property_values(focus_node, &property.path)?;
        let report = Report {
            focus_node,
            property,
            shape_id,
        };

        if let Some(min_count) = property.min_count {
            if values.len() < min_count {
                results.push(report.violation(
                    "sh:minCount",
                    None,
                    format!(
                        "Property {} must have at least {} value(s)",
                        property.path, min_count
                    ),
                ));
            }
        }

        if let Some(max_count) = property.max_count {
            if values.len() > max_count {
                results.push(report.violation(
                    "sh:maxCount",
                    None,
                    format!(
                        "Property {} must have at most {} value(s)",
                        property.path, max_count
                    ),
                ));
            }
        }

        for value in &values {
            self.check_value(&report, value, &mut results)?;
        }

        Ok(results)
    }

    fn check_value(
        &self,
        report: &Report<'_>,
        value: &Term,
        results: &mut Vec<ValidationResult>,
    ) -> Result<()> {
        let property = report.property;

        if let Some(expected) = &property.datatype {
            if !has_datatype(value, expected) {
                results.push(report.violation(
                    "sh:datatype",
                    Some(value),
                    format!("Value must be a literal with datatype {expected}"),
                ));
            }
        }

        if let Some(expected) = &property.class {
            if !self.is_instance(value, expected)? {
                results.push(report.violation(
                    "sh:class",
                    Some(value),
                    format!("Value must be an instance of {expected}"),
                ));
            }
        }

        if !property.or_alternatives.is_empty() {
            let mut matched = false;
            for alternative in &property.or_alternatives {
                if self.satisfies(value, alternative)? {
                    matched = true;
                    break;
                }
            }
            if !matched {
                let options: Vec<String> = property
                    .or_alternatives
                    .iter()
                    .filter_map(|a| a.class.as_ref().or(a.datatype.as_ref()))
                    .map(|n| n.to_string())
                    .collect();
                results.push(report.violation(
                    "sh:or",
                    Some(value),
                    format!("Value must satisfy one of: {}", options.join(", ")),
                ));
            }
        }

        if let Term::Literal(lit) = value {
            let lexical = lit.value();

            if let Some(pattern) = &property.pattern {
                if !pattern.is_match(lexical) {
                    results.push(report.violation(
                        "sh:pattern",
                        Some(value),
                        format!("Value must match pattern: {}", pattern.as_str()),
                    ));
                }
            }

            let length = lexical.chars().count();
            if let Some(min_length) = property.min_length {
                if length < min_length {
                    results.push(report.violation(
                        "sh:minLength",
                        Some(value),
                        format!("Value must have at least {min_length} characters"),
                    ));
                }
            }
            if let Some(max_length) = property.max_length {
                if length > max_length {
                    results.push(report.violation(
                        "sh:maxLength",
                        Some(value),
                        format!("Value must have at most {max_length} characters"),
                    ));
                }
            }

            let number = lexical.trim().parse::<f64>().ok();
            if let Some(min) = property.min_inclusive {
                if number.is_none_or(|n| n < min) {
                    results.push(report.violation(
                        "sh:minInclusive",
                        Some(value),
                        format!("Value must be >= {min}"),
                    ));
                }
            }
            if let Some(max) = property.max_inclusive {
                if number.is_none_or(|n| n > max) {
                    results.push(report.violation(
                        "sh:maxInclusive",
                        Some(value),
                        format!("Value must be <= {max}"),
                    ));
                }
            }
        }

        if !property.in_values.is_empty() && !property.in_values.contains(value) {
            let allowed: Vec<String> = property.in_values.iter().map(|v| v.to_string()).collect();
            results.push(report.violation(
                "sh:in",
                Some(value),
                format!("Value must be one of: {}", allowed.join(", ")),
            ));
        }

        Ok(())
    }

    fn satisfies(&self, value: &Term, alternative: &Alternative) -> Result<bool> {
        if let Some(class) = &alternative.class {
            if !self.is_instance(value, class)? {
                return Ok(false);
            }
        }
        if let Some(datatype) = &alternative.datatype {
            if !has_datatype(value, datatype) {
                return Ok(false);
            }
        }
        Ok(alternative.class.is_some() || alternative.datatype.is_some())
    }

    fn is_instance(&self, value: &Term, class: &NamedNode) -> Result<bool> {
        let node: NamedOrBlankNodeRef<'_> = match value {
            Term::NamedNode(node) => node.as_ref().into(),
            Term::BlankNode(node) => node.as_ref().into(),
            _ => return Ok(false),
        };
        self.classes.is_instance_of(self.data_store, node, class)
    }

    fn property_values(&self, subject: &NamedOrBlankNode, property: &NamedNode) -> Result<Vec<Term>> {
        self.data_store
            .quads_for_pattern(Some(subject.as_ref()), Some(property.as_ref()), None, None)
            .map(|quad| Ok(quad?.object))
            .collect()
    }
}

fn has_datatype(value: &Term, expected: &NamedNode) -> bool {
    matches!(value, Term::Literal(lit) if lit.datatype() == expected.as_ref())
}

/// Builds results for one (focus node, property shape) pair.
struct Report<'a> {
    focus_node: &'a NamedOrBlankNode,
    property: &'a PropertyShape,
    shape_id: &'a str,
}

impl Report<'_> {
    fn violation(&self, constraint: &str, value: Option<&Term>, default_message: String) -> ValidationResult {
        let message = self.property.message.clone().unwrap_or(default_message);
        let mut result = ValidationResult::new(
            node_label(self.focus_node),
            message,
            self.property.severity.unwrap_or(Severity::Violation),
            self.shape_id.to_string(),
        )
        .with_path(self.property.path.as_str().to_string())
        .with_constraint(constraint.to_string());
        if let Some(value) = value {
            result = result.with_value(term_label(value));
        }
        result
    }
}

fn node_label(node: &NamedOrBlankNode) -> String {
    match node {
        NamedOrBlankNode::NamedNode(n) => n.as_str().to_string(),
        other => other.to_string(),
    }
}

fn term_label(term: &Term) -> String {
    match term {
        Term::NamedNode(n) => n.as_str().to_string(),
        Term::Literal(lit) => lit.value().to_string(),
        other => other.to_string(),
    }
}

// =============================================================================
// Shape Validator
// =============================================================================

pub struct ShapeValidator {
    shapes_store: Store,
    shapes: Vec<NodeShape>,
}

impl ShapeValidator {
    /// Use the node shapes (and class hierarchy) already loaded in `store`.
    pub fn from_store(shapes_store: Store) -> Result<Self> {
        let shapes = ShapeDiscovery::new(&shapes_store).load_all_node_shapes()?;
        Ok(Self {
            shapes_store,
            shapes,
        })
    }

    /// Create a new validator from a shapes file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let shapes_store = Store::new()?;
        let content =
            std::fs::read_to_string(path.as_ref()).context("Failed to read shapes file")?;

        shapes_store
            .load_from_reader(RdfFormat::Turtle, content.as_bytes())
            .context("Failed to parse shapes file")?;

        Self::from_store(shapes_store)
    }

    /// Create a validator from Turtle-formatted string
    pub fn from_turtle(turtle: &str) -> Result<Self> {
        let shapes_store = Store::new()?;
        shapes_store
            .load_from_reader(RdfFormat::Turtle, turtle.as_bytes())
            .context("Failed to parse shapes")?;

        Self::from_store(shapes_store)
    }

    pub fn shapes(&self) -> &[NodeShape] {
        &self.shapes
    }

    /// Validate a data graph against all applicable shapes
    pub fn validate_graph(&self, data_store: &Store) -> Result<ValidationReport> {
        let mut report = ValidationReport::new();
        let classes = ClassClosure::new(&self.shapes_store);

        for node in self.focus_candidates(data_store)? {
            for result in self.check_node(&node, data_store, &classes)? {
                report.add_result(result);
            }
        }

        Ok(report)
    }

    /// Validate a specific node
    pub fn validate_node(
        &self,
        node: &NamedOrBlankNode,
        data_store: &Store,
    ) -> Result<Vec<ValidationResult>> {
        let classes = ClassClosure::new(&self.shapes_store);
        self.check_node(node, data_store, &classes)
    }

    fn check_node(
        &self,
        node: &NamedOrBlankNode,
        data_store: &Store,
        classes: &ClassClosure<'_>,
    ) -> Result<Vec<ValidationResult>> {
        let discovery = ShapeDiscovery::new(&self.shapes_store);
        let checker = ConstraintChecker::new(data_store, classes);
        let mut results = Vec::new();

        for shape in &self.shapes {
            if !discovery.is_shape_applicable(node, shape, data_store, classes)? {
                continue;
            }
            for property in &shape.properties {
                let mut property_results =
                    checker.check_property(node, property, shape.id.as_str())?;

                // Shape-level severity applies unless the property sets its own
                if shape.severity != Severity::Violation && property.severity.is_none() {
                    for result in &mut property_results {
                        result.severity = shape.severity;
                    }
                }
                results.extend(property_results);
            }
        }

        Ok(results)
    }

    /// Every subject of the data graph plus every explicit `sh:targetNode`,
    /// in a stable order.
    fn focus_candidates(&self, store: &Store) -> Result<Vec<NamedOrBlankNode>> {
        let mut nodes = HashSet::new();
        for quad in store.iter() {
            nodes.insert(quad?.subject);
        }
        for shape in &self.shapes {
            for target in &shape.target_nodes {
                match target {
                    Term::NamedNode(n) => nodes.insert(n.clone().into()),
                    Term::BlankNode(b) => nodes.insert(b.clone().into()),
                    _ => false,
                };
            }
        }
        let mut nodes: Vec<NamedOrBlankNode> = nodes.into_iter().collect();
        nodes.sort_by_key(|n| n.to_string());
        Ok(nodes)
    }

    /// Load data from a Turtle file
    pub fn load_data_from_file<P: AsRef<Path>>(&self, path: P) -> Result<Store> {
        let path = path.as_ref();
        let format = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(RdfFormat::from_extension)
            .unwrap_or(RdfFormat::Turtle);
        let store = Store::new()?;
        let content = std::fs::read(path)
            .with_context(|| format!("Failed to read data file {}", path.display()))?;

        store
            .load_from_reader(format, content.as_slice())
            .with_context(|| format!("Failed to parse data file {}", path.display()))?;

        Ok(store)
    }

    /// Load data from Turtle string
    pub fn load_data_from_turtle(&self, turtle: &str) -> Result<Store> {
        let store = Store::new()?;
        store
            .load_from_reader(RdfFormat::Turtle, turtle.as_bytes())
            .context("Failed to parse data")?;

        Ok(store)
    }
}

impl GraphValidator for ShapeValidator {
    fn validate(&self, data: &Store) -> Result<ValidationReport> {
        self.validate_graph(data)
    }

    fn shape_count(&self) -> Option<usize> {
        Some(self.shapes.len())
    }
}
