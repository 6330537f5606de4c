//! Structured schema documents as handed to the compiler.
//!
//! A document is a mapping from `[schema.]table` keys to table bodies;
//! each body maps attribute names to a string (field or rule line) or a
//! list of field names (composite-uniqueness rules). Key order is
//! preserved because table and field order carry through to the DDL.

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::SchemaError;

/// An attribute value: one notation line, or a native list of field
/// names for composite-uniqueness rules.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Line(String),
    Fields(Vec<String>),
}

impl AttrValue {
    /// Raw text for error messages.
    pub fn display(&self) -> String {
        match self {
            AttrValue::Line(s) => s.clone(),
            AttrValue::Fields(fields) => format!("[{}]", fields.join(", ")),
        }
    }
}

pub type TableBody = IndexMap<String, AttrValue>;

/// A whole-document entry. Directive keys (starting with `$`) may carry
/// any value shape; table keys must carry a body mapping.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DocEntry {
    Table(TableBody),
    Other(serde_yaml::Value),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Document {
    pub entries: IndexMap<String, DocEntry>,
}

impl Document {
    pub fn from_yaml(source: &str) -> Result<Self, SchemaError> {
        Ok(serde_yaml::from_str(source)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_preserved() {
        let doc = Document::from_yaml("b: {x: \"int\"}\na: {y: \"int\"}\n").unwrap();
        let keys: Vec<&String> = doc.entries.keys().collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn test_line_and_list_values() {
        let doc = Document::from_yaml(
            r#"
            user:
              id: pk uuid
              $uq: [name, email]
            "#,
        )
        .unwrap();

        let DocEntry::Table(body) = &doc.entries["user"] else {
            panic!("expected a table body");
        };
        assert_eq!(body["id"], AttrValue::Line("pk uuid".to_string()));
        assert_eq!(
            body["$uq"],
            AttrValue::Fields(vec!["name".to_string(), "email".to_string()])
        );
    }

    #[test]
    fn test_scalar_directive_tolerated() {
        let doc = Document::from_yaml("$version: 2\nuser: {id: \"pk uuid\"}\n").unwrap();
        assert!(matches!(doc.entries["$version"], DocEntry::Other(_)));
        assert!(matches!(doc.entries["user"], DocEntry::Table(_)));
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(Document::from_yaml("user: [a: b").is_err());
    }
}
