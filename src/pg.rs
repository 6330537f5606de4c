//! PostgreSQL DDL rendering.

use std::collections::HashMap;

use tracing::debug;

use crate::attr;
use crate::error::SchemaError;
use crate::model::{
    ComplexUniqueness, DbSchema, Field, ForeignKey, Index, OnDeleteAction, Table, UniqueKind,
};

/// Deterministic DDL renderer for a finalized schema.
///
/// With `restrict_types` set, every field's base type name must appear
/// as a key of the table; the canonical name replaces it and any
/// precision suffix is kept verbatim.
#[derive(Debug, Clone, Default)]
pub struct PgRenderer {
    /// Emit `NULLS DISTINCT` / `NULLS NOT DISTINCT` qualifiers on
    /// unique constraints (PostgreSQL 15+).
    pub explicit_uniques: bool,
    /// Emit `NULL` on optional columns instead of omitting it.
    pub explicit_nulls: bool,
    pub restrict_types: Option<HashMap<String, String>>,
}

impl PgRenderer {
    /// Render the whole schema as one SQL script. Groups appear in a
    /// fixed order (schema drops, schema creates, tables with their
    /// column comments, foreign keys, indexes); empty groups
    /// contribute nothing. Rendering the same model twice produces
    /// byte-identical text.
    pub fn render(&self, db: &DbSchema) -> Result<String, SchemaError> {
        let mut groups: Vec<String> = Vec::new();

        let mut schemas: Vec<&str> = Vec::new();
        for table in &db.tables {
            if !schemas.contains(&table.schema.as_str()) {
                schemas.push(&table.schema);
            }
        }

        let drops = schemas
            .iter()
            .map(|&s| self.drop_schema_sql(s))
            .collect::<Result<Vec<_>, _>>()?
            .join("\n");
        push_group(&mut groups, drops);

        let creates = schemas
            .iter()
            .map(|&s| self.create_schema_sql(s))
            .collect::<Result<Vec<_>, _>>()?
            .join("\n");
        push_group(&mut groups, creates);

        for table in &db.tables {
            groups.push(self.table_sql(table)?);

            let comments = table
                .fields
                .iter()
                .filter(|f| f.comment.as_deref().is_some_and(|c| !c.is_empty()))
                .map(|f| self.comment_sql(table, f))
                .collect::<Vec<_>>()
                .join("\n");
            push_group(&mut groups, comments);
        }

        let foreign_keys = db
            .foreign_keys
            .iter()
            .map(|fk| self.foreign_key_sql(db, fk))
            .collect::<Result<Vec<_>, _>>()?
            .join("\n");
        push_group(&mut groups, foreign_keys);

        let indexes = db
            .indexes
            .iter()
            .map(|ix| self.index_sql(db, ix))
            .collect::<Vec<_>>()
            .join("\n");
        push_group(&mut groups, indexes);

        debug!(
            tables = db.tables.len(),
            groups = groups.len(),
            "DDL rendered"
        );

        Ok(groups.join("\n\n"))
    }

    fn drop_schema_sql(&self, schema: &str) -> Result<String, SchemaError> {
        Ok(format!(
            "DROP SCHEMA IF EXISTS {} CASCADE;",
            valid_schema_name(schema)?
        ))
    }

    fn create_schema_sql(&self, schema: &str) -> Result<String, SchemaError> {
        Ok(format!("CREATE SCHEMA {};", valid_schema_name(schema)?))
    }

    fn table_sql(&self, table: &Table) -> Result<String, SchemaError> {
        let mut attributes = Vec::new();

        for field in &table.fields {
            attributes.push(self.field_sql(field)?);
        }
        for rule in &table.complex_uniqueness {
            attributes.push(self.unique_constraint_sql(rule));
        }
        for check in &table.checks {
            attributes.push(format!("CHECK ({check})"));
        }

        let body = attributes
            .iter()
            .map(|a| format!("    {a}"))
            .collect::<Vec<_>>()
            .join(",\n");

        Ok(format!(
            "CREATE TABLE {} (\n{}\n);",
            table.full_name(),
            body
        ))
    }

    fn field_sql(&self, field: &Field) -> Result<String, SchemaError> {
        let mut items = vec![field.name.clone(), self.field_type(field)?];

        if !field.optional {
            items.push("NOT NULL".to_string());
        } else if self.explicit_nulls {
            items.push("NULL".to_string());
        }

        if field.uniqueness != UniqueKind::NotUnique {
            items.push(self.uniqueness_sql(field.uniqueness).to_string());
        }

        if let Some(expr) = &field.default {
            if field.computed {
                items.push(format!("GENERATED ALWAYS AS ({expr}) STORED"));
            } else {
                items.push(format!("DEFAULT {expr}"));
            }
        }

        Ok(items.join(" "))
    }

    fn field_type(&self, field: &Field) -> Result<String, SchemaError> {
        let Some(types) = &self.restrict_types else {
            return Ok(field.type_name.clone());
        };

        let (base, precision) =
            attr::split_type(&field.type_name).ok_or_else(|| SchemaError::InvalidTypeFormat {
                field: field.name.clone(),
            })?;

        let canonical = types.get(base).ok_or_else(|| SchemaError::UnknownType {
            field: field.name.clone(),
            type_name: base.to_string(),
        })?;

        Ok(format!("{canonical}{precision}"))
    }

    /// Callers skip `NotUnique`; it has no clause.
    fn uniqueness_sql(&self, uniqueness: UniqueKind) -> &'static str {
        match uniqueness {
            UniqueKind::NotUnique => "",
            UniqueKind::PrimaryKey => "PRIMARY KEY",
            UniqueKind::StrictUnique => {
                if self.explicit_uniques {
                    "UNIQUE NULLS DISTINCT"
                } else {
                    "UNIQUE"
                }
            }
            UniqueKind::Unique => {
                if self.explicit_uniques {
                    "UNIQUE NULLS NOT DISTINCT"
                } else {
                    "UNIQUE"
                }
            }
        }
    }

    fn unique_constraint_sql(&self, rule: &ComplexUniqueness) -> String {
        format!(
            "{} ({})",
            self.uniqueness_sql(rule.uniqueness),
            rule.fields.join(", ")
        )
    }

    fn comment_sql(&self, table: &Table, field: &Field) -> String {
        format!(
            "COMMENT ON COLUMN {}.{} IS '{}';",
            table.full_name(),
            field.name,
            field.comment.as_deref().unwrap_or_default()
        )
    }

    fn foreign_key_sql(&self, db: &DbSchema, fk: &ForeignKey) -> Result<String, SchemaError> {
        let containing = db.table(fk.containing);
        let referenced = db.table(fk.referenced);
        let ref_pk = referenced.reference_pk()?;
        let field = &containing.fields[fk.field];

        let mut sql = format!(
            "ALTER TABLE {} ADD CONSTRAINT fk_{}_{}_{} FOREIGN KEY ({}) REFERENCES {} ({})",
            containing.full_name(),
            containing.schema,
            containing.name,
            field.name,
            field.name,
            referenced.full_name(),
            ref_pk.name
        );

        match fk.on_delete {
            OnDeleteAction::SetNull => sql.push_str(" ON DELETE SET NULL"),
            OnDeleteAction::Cascade => sql.push_str(" ON DELETE CASCADE"),
            OnDeleteAction::NoAction => {}
        }

        sql.push(';');
        Ok(sql)
    }

    fn index_sql(&self, db: &DbSchema, index: &Index) -> String {
        format!(
            "CREATE INDEX ON {} ({})",
            db.table(index.table).full_name(),
            index.field
        )
    }
}

fn push_group(groups: &mut Vec<String>, group: String) {
    if !group.is_empty() {
        groups.push(group);
    }
}

fn valid_schema_name(schema: &str) -> Result<&str, SchemaError> {
    if attr::is_word(schema) {
        Ok(schema)
    } else {
        Err(SchemaError::InvalidSchemaName {
            name: schema.to_string(),
        })
    }
}

/// The stock alias table: notation type names (and their shorthands)
/// to canonical PostgreSQL type names.
pub fn default_type_table() -> HashMap<String, String> {
    let entries = [
        ("bigint", "int8"),
        ("int8", "int8"),
        ("i8", "int8"),
        ("integer", "int4"),
        ("int", "int4"),
        ("int4", "int4"),
        ("i4", "int4"),
        ("smallint", "int2"),
        ("int2", "int2"),
        ("i2", "int2"),
        ("bigserial", "serial8"),
        ("serial8", "serial8"),
        ("ser8", "serial8"),
        ("serial", "serial4"),
        ("serial4", "serial4"),
        ("ser4", "serial4"),
        ("smallserial", "serial2"),
        ("serial2", "serial2"),
        ("ser2", "serial2"),
        ("numeric", "decimal"),
        ("decimal", "decimal"),
        ("dec", "decimal"),
        ("money", "decimal"),
        ("double", "float8"),
        ("float8", "float8"),
        ("f8", "float8"),
        ("float", "float4"),
        ("real", "float4"),
        ("float4", "float4"),
        ("f4", "float4"),
        ("boolean", "bool"),
        ("bool", "bool"),
        ("b", "bool"),
        ("char", "char"),
        ("varchar", "varchar"),
        ("text", "text"),
        ("string", "text"),
        ("str", "text"),
        ("url", "text"),
        ("bit", "bit"),
        ("varbit", "varbit"),
        ("bytea", "bytea"),
        ("uuid", "uuid"),
        ("date", "date"),
        ("time", "time"),
        ("interval", "interval"),
        ("timestamp", "timestamp"),
        ("datetime", "timestamp"),
        ("json", "json"),
        ("jsonb", "jsonb"),
        ("xml", "xml"),
    ];

    entries
        .into_iter()
        .map(|(alias, canonical)| (alias.to_string(), canonical.to_string()))
        .collect()
}
