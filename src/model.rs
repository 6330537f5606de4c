//! Schema model: tables, fields, constraints and the finalized schema.

use crate::error::SchemaError;

/// Index into the table arena of a [`DbSchema`] (or of the builder
/// while the model is still being loaded).
pub type TableId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueKind {
    NotUnique,
    Unique,
    StrictUnique,
    PrimaryKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDeleteAction {
    NoAction,
    SetNull,
    Cascade,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub uniqueness: UniqueKind,
    /// Type name as written, including any parenthesized precision
    /// suffix. Empty for a foreign-key field until resolution copies
    /// the referenced primary key's type in.
    pub type_name: String,
    pub optional: bool,
    pub computed: bool,
    pub default: Option<String>,
    pub comment: Option<String>,
}

/// A multi-column uniqueness rule scoped to one table.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexUniqueness {
    pub fields: Vec<String>,
    pub uniqueness: UniqueKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub schema: String,
    pub name: String,
    pub fields: Vec<Field>,
    pub complex_uniqueness: Vec<ComplexUniqueness>,
    pub checks: Vec<String>,
}

impl Table {
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }

    /// The single field other tables' foreign keys may target.
    ///
    /// Fails when the table has no primary-key field, more than one,
    /// or any composite primary-key rule. Callers invoke this lazily,
    /// at the point a reference to the table is resolved or emitted.
    pub fn reference_pk(&self) -> Result<&Field, SchemaError> {
        if self
            .complex_uniqueness
            .iter()
            .any(|cu| cu.uniqueness == UniqueKind::PrimaryKey)
        {
            return Err(SchemaError::AmbiguousPrimaryKey {
                table: self.full_name(),
            });
        }

        let mut pk = None;

        for field in &self.fields {
            if field.uniqueness != UniqueKind::PrimaryKey {
                continue;
            }

            if pk.is_some() {
                return Err(SchemaError::AmbiguousPrimaryKey {
                    table: self.full_name(),
                });
            }

            pk = Some(field);
        }

        pk.ok_or_else(|| SchemaError::MissingPrimaryKey {
            table: self.full_name(),
        })
    }
}

/// A resolved foreign key. The textual target is kept because it is
/// all that is known at creation time; `referenced` is attached once,
/// when the builder finalizes.
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKey {
    pub referenced_schema: String,
    pub referenced_name: String,
    pub referenced: TableId,
    pub containing: TableId,
    /// Index of the backing field within the containing table.
    pub field: usize,
    pub on_delete: OnDeleteAction,
}

/// An auxiliary index request on one field of one table.
#[derive(Debug, Clone, PartialEq)]
pub struct Index {
    pub table: TableId,
    pub field: String,
}

/// The finalized schema model. Immutable once built; safe to share
/// between the classifier and the emitter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DbSchema {
    pub tables: Vec<Table>,
    pub foreign_keys: Vec<ForeignKey>,
    pub indexes: Vec<Index>,
}

impl DbSchema {
    pub fn table(&self, id: TableId) -> &Table {
        &self.tables[id]
    }

    pub fn find_table(&self, schema: &str, name: &str) -> Option<TableId> {
        self.tables
            .iter()
            .position(|t| t.schema == schema && t.name == name)
    }

    /// The field backing a foreign key.
    pub fn fk_field(&self, fk: &ForeignKey) -> &Field {
        &self.tables[fk.containing].fields[fk.field]
    }
}
