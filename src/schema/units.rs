//! Measurement unit catalog built from `qudt:Unit` rows.

use indexmap::IndexMap;
use oxigraph::model::NamedNode;
use serde::Serialize;
use tracing::{debug, warn};

use super::introspect::UnitRow;

/// One catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitDescriptor {
    #[serde(serialize_with = "serialize_iri")]
    uri: NamedNode,
    name: String,
    key: String,
    symbol: Option<String>,
    description: Option<String>,
}

impl UnitDescriptor {
    pub fn from_row(row: UnitRow) -> Self {
        let symbol = match (row.symbol, row.expression) {
            (Some(symbol), _) => Some(symbol),
            (None, Some(expression)) => Some(format!("${expression}$")),
            (None, None) => None,
        };
        Self {
            key: sanitize_unit_name(&row.label),
            uri: row.unit,
            name: row.label,
            symbol,
            description: row.description,
        }
    }

    pub fn uri(&self) -> &NamedNode {
        &self.uri
    }

    /// Display name (the unit's label).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Catalog lookup key derived from the label.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn symbol(&self) -> Option<&str> {
        self.symbol.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

/// Lookup key for a unit label: spaces become `_`, `^` becomes `exp`,
/// parentheses are dropped.
///
/// ```
/// use brick_mason::schema::units::sanitize_unit_name;
/// assert_eq!(sanitize_unit_name("Degree C (exp^2)"), "Degree_C_expexp2");
/// ```
pub fn sanitize_unit_name(label: &str) -> String {
    label
        .replace(' ', "_")
        .replace('^', "exp")
        .replace(['(', ')'], "")
}

#[derive(Debug, Clone, Default)]
pub struct UnitCatalog {
    units: IndexMap<String, UnitDescriptor>,
}

impl UnitCatalog {
    pub fn from_rows(rows: impl IntoIterator<Item = UnitRow>) -> Self {
        let mut units = IndexMap::new();
        for row in rows {
            let unit = UnitDescriptor::from_row(row);
            if let Some(previous) = units.get(unit.key()).map(|u: &UnitDescriptor| u.uri().clone()) {
                warn!(
                    key = unit.key(),
                    previous = %previous,
                    replacement = %unit.uri(),
                    "unit key collision, later unit replaces earlier one"
                );
            }
            units.insert(unit.key().to_string(), unit);
        }
        debug!(count = units.len(), "built unit catalog");
        Self { units }
    }

    pub fn get(&self, key: &str) -> Option<&UnitDescriptor> {
        self.units.get(key)
    }

    /// Catalog key first, then the local name of the unit IRI (`M2`).
    pub fn find(&self, name: &str) -> Option<&UnitDescriptor> {
        self.get(name).or_else(|| {
            self.units
                .values()
                .find(|unit| crate::vocab::local_name(unit.uri().as_str()) == name)
        })
    }

    pub fn by_uri(&self, uri: &str) -> Option<&UnitDescriptor> {
        self.units.values().find(|unit| unit.uri().as_str() == uri)
    }

    pub fn iter(&self) -> impl Iterator<Item = &UnitDescriptor> {
        self.units.values()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

pub(crate) fn serialize_iri<S: serde::Serializer>(
    node: &NamedNode,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(node.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(local: &str, label: &str, symbol: Option<&str>, expr: Option<&str>) -> UnitRow {
        UnitRow {
            unit: NamedNode::new_unchecked(format!("http://qudt.org/vocab/unit/{local}")),
            label: label.to_string(),
            symbol: symbol.map(str::to_string),
            expression: expr.map(str::to_string),
            description: None,
        }
    }

    #[test]
    fn explicit_symbol_beats_expression() {
        let unit = UnitDescriptor::from_row(row("M2", "Square Metre", Some("m²"), Some("m^2")));
        assert_eq!(unit.symbol(), Some("m²"));
    }

    #[test]
    fn expression_becomes_bracketed_symbol() {
        let unit = UnitDescriptor::from_row(row("TON_FG", "Ton of Refrigeration", None, Some("TR")));
        assert_eq!(unit.symbol(), Some("$TR$"));
    }

    #[test]
    fn no_symbol_and_no_expression_leaves_symbol_absent() {
        let unit = UnitDescriptor::from_row(row("X", "Mystery", None, None));
        assert_eq!(unit.symbol(), None);
    }

    #[test]
    fn later_row_wins_on_key_collision() {
        let catalog = UnitCatalog::from_rows(vec![
            row("A", "Same Name", None, None),
            row("B", "Same Name", None, None),
        ]);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.find("B").map(UnitDescriptor::key), Some("Same_Name"));
        assert!(catalog.find("A").is_none());
        assert_eq!(
            catalog.get("Same_Name").unwrap().uri().as_str(),
            "http://qudt.org/vocab/unit/B"
        );
    }
}
