//! Attribute schema mapping.
//!
//! The filename attribute is located once, when an index is opened, and kept
//! as a typed accessor instead of being looked up by name for every record.

use crate::{Result, TileCoverError};
use serde_json::Value;

/// Case-insensitive prefix that marks the filename attribute.
pub const FILENAME_FIELD_PREFIX: &str = "file";

/// A single attribute value read from an index record.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// Text value.
    Text(String),
    /// Numeric value.
    Number(f64),
    /// Boolean value.
    Bool(bool),
    /// Missing or null value.
    Null,
}

impl AttributeValue {
    /// Render the value as a tile identifier, if it has one.
    pub fn as_identifier(&self) -> Option<String> {
        match self {
            AttributeValue::Text(s) => {
                let s = s.trim();
                (!s.is_empty()).then(|| s.to_string())
            }
            AttributeValue::Number(n) => Some(n.to_string()),
            AttributeValue::Bool(_) | AttributeValue::Null => None,
        }
    }
}

impl From<&Value> for AttributeValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::String(s) => AttributeValue::Text(s.clone()),
            Value::Number(n) => n.as_f64().map(AttributeValue::Number).unwrap_or(AttributeValue::Null),
            Value::Bool(b) => AttributeValue::Bool(*b),
            Value::Null => AttributeValue::Null,
            // Nested values have no sensible identifier form; keep their JSON text
            other => AttributeValue::Text(other.to_string()),
        }
    }
}

/// Typed accessor for the attribute holding a tile's file identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameField {
    /// Field name as declared in the schema.
    name: String,
    /// Position of the field in schema order.
    position: usize,
}

impl FilenameField {
    /// Pick the first field, in schema order, whose name starts with "file"
    /// (case-insensitive).
    pub fn resolve<S: AsRef<str>>(schema: &[S]) -> Result<Self> {
        schema
            .iter()
            .enumerate()
            .find(|(_, name)| {
                name.as_ref()
                    .get(..FILENAME_FIELD_PREFIX.len())
                    .is_some_and(|prefix| prefix.eq_ignore_ascii_case(FILENAME_FIELD_PREFIX))
            })
            .map(|(position, name)| FilenameField {
                name: name.as_ref().to_string(),
                position,
            })
            .ok_or_else(|| TileCoverError::SchemaFieldNotFound {
                fields: schema.iter().map(|s| s.as_ref().to_string()).collect(),
            })
    }

    /// Field name as declared in the schema.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Position of the field in schema order.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Extract the identifier from a record's attributes.
    ///
    /// Attributes laid out in schema order are read at the resolved position;
    /// anything else (a GeoJSON feature with its own key order) falls back to
    /// a lookup by name.
    pub fn extract(&self, attributes: &[(String, AttributeValue)]) -> Option<String> {
        let value = match attributes.get(self.position) {
            Some((name, value)) if *name == self.name => value,
            _ => &attributes.iter().find(|(name, _)| *name == self.name)?.1,
        };
        value.as_identifier()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_first_matching_field() {
        let field = FilenameField::resolve(&["id", "File_Name", "filepath"]).unwrap();
        assert_eq!(field.name(), "File_Name");
        assert_eq!(field.position(), 1);
    }

    #[test]
    fn test_resolve_case_insensitive() {
        let field = FilenameField::resolve(&["FILENAME"]).unwrap();
        assert_eq!(field.name(), "FILENAME");
    }

    #[test]
    fn test_resolve_missing_field() {
        let err = FilenameField::resolve(&["location", "tile_id", "profile"]).unwrap_err();
        match err {
            TileCoverError::SchemaFieldNotFound { fields } => {
                assert_eq!(fields, vec!["location", "tile_id", "profile"]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_resolve_empty_schema() {
        let schema: [&str; 0] = [];
        assert!(matches!(
            FilenameField::resolve(&schema),
            Err(TileCoverError::SchemaFieldNotFound { .. })
        ));
    }

    #[test]
    fn test_short_names_do_not_match() {
        assert!(FilenameField::resolve(&["fil", "fi"]).is_err());
    }

    fn attrs(pairs: &[(&str, AttributeValue)]) -> Vec<(String, AttributeValue)> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_extract_in_schema_order() {
        let field = FilenameField::resolve(&["id", "filename"]).unwrap();
        let record = attrs(&[
            ("id", AttributeValue::Number(7.0)),
            ("filename", AttributeValue::Text(" 25w247n.las ".to_string())),
        ]);
        assert_eq!(field.extract(&record), Some("25w247n.las".to_string()));

        let record = attrs(&[("id", AttributeValue::Number(7.0)), ("filename", AttributeValue::Null)]);
        assert_eq!(field.extract(&record), None);
    }

    #[test]
    fn test_extract_out_of_schema_order() {
        let field = FilenameField::resolve(&["id", "filename"]).unwrap();
        assert_eq!(field.position(), 1);

        // Key order differs from the schema; the name lookup still finds it
        let record = attrs(&[("filename", AttributeValue::Text("a.las".to_string())), ("id", AttributeValue::Number(1.0))]);
        assert_eq!(field.extract(&record), Some("a.las".to_string()));

        // Position 1 holds another field and the filename is absent
        let record = attrs(&[("id", AttributeValue::Number(1.0)), ("other", AttributeValue::Text("x".to_string()))]);
        assert_eq!(field.extract(&record), None);
    }

    #[test]
    fn test_attribute_from_json() {
        assert_eq!(AttributeValue::from(&json!("a.las")), AttributeValue::Text("a.las".into()));
        assert_eq!(AttributeValue::from(&json!(3)), AttributeValue::Number(3.0));
        assert_eq!(AttributeValue::from(&json!(null)), AttributeValue::Null);
        assert_eq!(AttributeValue::from(&json!(true)), AttributeValue::Bool(true));
    }
}
