//! Schema-definition errors.

use thiserror::Error;

/// The single error kind for everything that can go wrong between a
/// schema document and the finished DDL: grammar violations, unknown
/// rules, unresolvable references, primary-key problems and type
/// restriction failures. Every message names the offending table,
/// field or rule.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("\"{key}\" is not a valid table key")]
    InvalidTableKey { key: String },

    #[error("table \"{table}\" is defined more than once")]
    DuplicateTable { table: String },

    #[error("the body of table \"{table}\" must be a mapping of attributes")]
    InvalidTableBody { table: String },

    #[error("malformed \"{kind}\" rule in table \"{table}\"")]
    MalformedRule { table: String, kind: &'static str },

    #[error("unknown rule \"{name}\" in table \"{table}\"")]
    UnknownRule { table: String, name: String },

    #[error("cannot create a field named \"{name}\" in table \"{table}\"")]
    InvalidFieldName { table: String, name: String },

    #[error("unknown attribute definition \"{name}: {value}\" in table \"{table}\"")]
    UnknownAttribute {
        table: String,
        name: String,
        value: String,
    },

    #[error(
        "cannot resolve foreign key of table \"{table}\": \
         table \"{target}\" does not exist"
    )]
    UnresolvedForeignKey { table: String, target: String },

    #[error("references to table \"{table}\" without a primary key are not supported")]
    MissingPrimaryKey { table: String },

    #[error("references to table \"{table}\" with more than one primary key are not supported")]
    AmbiguousPrimaryKey { table: String },

    #[error("invalid type format on field \"{field}\"")]
    InvalidTypeFormat { field: String },

    #[error("unknown type \"{type_name}\" of field \"{field}\"")]
    UnknownType { field: String, type_name: String },

    #[error("\"{name}\" is not a valid schema name")]
    InvalidSchemaName { name: String },

    #[error("failed to parse schema document: {0}")]
    Document(#[from] serde_yaml::Error),
}
