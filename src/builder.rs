//! Two-phase schema compiler: accumulate documents, then finalize.

use tracing::debug;

use crate::attr::{self, AttrKind, AttrName};
use crate::document::{AttrValue, DocEntry, Document, TableBody};
use crate::error::SchemaError;
use crate::model::{
    ComplexUniqueness, DbSchema, Field, ForeignKey, Index, OnDeleteAction, Table, TableId,
    UniqueKind,
};

/// Schema used when a table key or foreign-key target carries none.
pub const DEFAULT_SCHEMA: &str = "public";

#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions {
    /// Enqueue an auxiliary index for every foreign-key field that
    /// carries no uniqueness constraint of its own.
    pub add_fk_indexes: bool,
}

/// A foreign key as known during the load phase: the target is only a
/// (schema, name) key until `finalize` resolves it.
#[derive(Debug, Clone)]
struct PendingForeignKey {
    referenced_schema: String,
    referenced_name: String,
    containing: TableId,
    field: usize,
    on_delete: OnDeleteAction,
}

/// Incremental schema compiler.
///
/// `accumulate` may be called once per source document, in any order;
/// a foreign key may reference a table that arrives in a later
/// document. `finalize` consumes the builder, resolves every foreign
/// key and returns the immutable model. Finalizing with no documents
/// accumulated is valid and yields an empty model.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    tables: Vec<Table>,
    pending: Vec<PendingForeignKey>,
    indexes: Vec<Index>,
    options: BuildOptions,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: BuildOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn accumulate(&mut self, document: &Document) -> Result<(), SchemaError> {
        for (key, entry) in &document.entries {
            if key.starts_with(attr::MARKER) {
                continue;
            }

            let (schema, name) = parse_table_key(key)?;

            let DocEntry::Table(body) = entry else {
                return Err(SchemaError::InvalidTableBody { table: key.clone() });
            };

            if self
                .tables
                .iter()
                .any(|t| t.schema == schema && t.name == name)
            {
                return Err(SchemaError::DuplicateTable {
                    table: format!("{schema}.{name}"),
                });
            }

            self.parse_table(schema, name, body)?;
        }

        debug!(tables = self.tables.len(), "document accumulated");
        Ok(())
    }

    /// Resolve every accumulated foreign key and freeze the model.
    pub fn finalize(mut self) -> Result<DbSchema, SchemaError> {
        let mut foreign_keys = Vec::with_capacity(self.pending.len());

        for pending in self.pending {
            let referenced = self
                .tables
                .iter()
                .position(|t| {
                    t.schema == pending.referenced_schema && t.name == pending.referenced_name
                })
                .ok_or_else(|| SchemaError::UnresolvedForeignKey {
                    table: self.tables[pending.containing].full_name(),
                    target: format!(
                        "{}.{}",
                        pending.referenced_schema, pending.referenced_name
                    ),
                })?;

            let pk_type = self.tables[referenced].reference_pk()?.type_name.clone();
            self.tables[pending.containing].fields[pending.field].type_name = pk_type;

            foreign_keys.push(ForeignKey {
                referenced_schema: pending.referenced_schema,
                referenced_name: pending.referenced_name,
                referenced,
                containing: pending.containing,
                field: pending.field,
                on_delete: pending.on_delete,
            });
        }

        debug!(
            tables = self.tables.len(),
            foreign_keys = foreign_keys.len(),
            indexes = self.indexes.len(),
            "schema finalized"
        );

        Ok(DbSchema {
            tables: self.tables,
            foreign_keys,
            indexes: self.indexes,
        })
    }

    fn parse_table(
        &mut self,
        schema: String,
        name: String,
        body: &TableBody,
    ) -> Result<(), SchemaError> {
        let id = self.tables.len();
        let mut table = Table {
            schema,
            name,
            fields: Vec::new(),
            complex_uniqueness: Vec::new(),
            checks: Vec::new(),
        };

        for (attr_name, attr_value) in body {
            self.parse_attribute(id, &mut table, attr_name, attr_value)?;
        }

        self.tables.push(table);
        Ok(())
    }

    fn parse_attribute(
        &mut self,
        id: TableId,
        table: &mut Table,
        name: &str,
        value: &AttrValue,
    ) -> Result<(), SchemaError> {
        match attr::classify_name(name) {
            AttrName::Rule(uniqueness) => {
                let fields = match value {
                    AttrValue::Fields(fields) => {
                        (!fields.is_empty()).then(|| fields.clone())
                    }
                    AttrValue::Line(line) => attr::composite_fields(line),
                };
                let fields = fields.ok_or_else(|| SchemaError::MalformedRule {
                    table: table.full_name(),
                    kind: attr::rule_keyword(uniqueness),
                })?;

                table
                    .complex_uniqueness
                    .push(ComplexUniqueness { fields, uniqueness });
                Ok(())
            }

            AttrName::Check => {
                let AttrValue::Line(expr) = value else {
                    return Err(SchemaError::MalformedRule {
                        table: table.full_name(),
                        kind: "check",
                    });
                };
                table.checks.push(expr.clone());
                Ok(())
            }

            AttrName::UnknownRule => Err(SchemaError::UnknownRule {
                table: table.full_name(),
                name: name.to_string(),
            }),

            AttrName::Invalid => Err(SchemaError::InvalidFieldName {
                table: table.full_name(),
                name: name.to_string(),
            }),

            AttrName::Field => {
                let AttrValue::Line(raw) = value else {
                    return Err(SchemaError::UnknownAttribute {
                        table: table.full_name(),
                        name: name.to_string(),
                        value: value.display(),
                    });
                };

                let (line, comment) = attr::split_comment(raw);

                match attr::parse_value(line) {
                    Some(AttrKind::Field {
                        uniqueness,
                        type_name,
                        optional,
                        computed,
                        default,
                    }) => {
                        table.fields.push(Field {
                            name: name.to_string(),
                            uniqueness,
                            type_name,
                            optional,
                            computed,
                            default,
                            comment,
                        });
                        Ok(())
                    }

                    Some(AttrKind::ForeignKey {
                        uniqueness,
                        schema,
                        table: target,
                        optional,
                        on_delete,
                    }) => {
                        // The field type stays empty until resolution
                        // copies the referenced primary key's type in.
                        table.fields.push(Field {
                            name: name.to_string(),
                            uniqueness,
                            type_name: String::new(),
                            optional,
                            computed: false,
                            default: None,
                            comment,
                        });

                        self.pending.push(PendingForeignKey {
                            referenced_schema: schema
                                .unwrap_or_else(|| DEFAULT_SCHEMA.to_string()),
                            referenced_name: target,
                            containing: id,
                            field: table.fields.len() - 1,
                            on_delete,
                        });

                        if self.options.add_fk_indexes && uniqueness == UniqueKind::NotUnique {
                            self.indexes.push(Index {
                                table: id,
                                field: name.to_string(),
                            });
                        }
                        Ok(())
                    }

                    None => Err(SchemaError::UnknownAttribute {
                        table: table.full_name(),
                        name: name.to_string(),
                        value: line.to_string(),
                    }),
                }
            }
        }
    }
}

/// `[schema.]table`, both parts word-character identifiers.
fn parse_table_key(key: &str) -> Result<(String, String), SchemaError> {
    let (schema, name) = match key.split_once('.') {
        Some((schema, name)) => (schema, name),
        None => (DEFAULT_SCHEMA, key),
    };

    if attr::is_word(schema) && attr::is_word(name) {
        Ok((schema.to_string(), name.to_string()))
    } else {
        Err(SchemaError::InvalidTableKey {
            key: key.to_string(),
        })
    }
}
