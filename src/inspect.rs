//! Live database introspection.
//!
//! Rebuilds the same schema model the compiler produces, from the
//! catalogs of a running PostgreSQL database. Foreign keys spanning
//! several columns, and foreign keys targeting anything but the
//! referenced table's reference primary key, are skipped.

use postgres::{Client, NoTls};
use thiserror::Error;
use tracing::debug;

use crate::error::SchemaError;
use crate::model::{
    ComplexUniqueness, DbSchema, Field, ForeignKey, OnDeleteAction, Table, UniqueKind,
};

#[derive(Debug, Error)]
pub enum InspectError {
    #[error("database error: {0}")]
    Db(#[from] postgres::Error),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("table not found: {table}")]
    TableNotFound { table: String },
    #[error("field not found: {field}")]
    FieldNotFound { field: String },
}

const TABLES_QUERY: &str = "
    SELECT table_schema::text, table_name::text
    FROM information_schema.tables
    WHERE table_schema NOT IN ('pg_catalog', 'information_schema')
        AND table_type = 'BASE TABLE'
    ORDER BY table_schema, table_name
";

// Columns joined with their single-column PRIMARY KEY/UNIQUE
// constraint (if any) and their comment.
const COLUMNS_QUERY: &str = "
    WITH single_constraints AS (
        SELECT
            ccu.table_schema,
            ccu.table_name,
            (array_agg(ccu.column_name))[1] AS column_name,
            tc.constraint_type
        FROM information_schema.constraint_column_usage ccu
        NATURAL JOIN information_schema.table_constraints tc
        WHERE ccu.table_schema NOT IN ('pg_catalog', 'information_schema')
            AND tc.constraint_type IN ('PRIMARY KEY', 'UNIQUE')
        GROUP BY ccu.table_schema, ccu.table_name,
            ccu.constraint_schema, ccu.constraint_name, tc.constraint_type
        HAVING count(1) = 1
    )
    SELECT
        col.table_schema::text,
        col.table_name::text,
        col.column_name::text,
        con.constraint_type::text,
        col.data_type::text,
        (col.is_nullable = 'YES') AS is_optional,
        (col.is_generated = 'ALWAYS') AS is_computed,
        (CASE
            WHEN col.is_generated = 'ALWAYS' THEN col.generation_expression
            ELSE col.column_default
        END)::text AS default_expr,
        pd.description::text AS comment
    FROM information_schema.columns col
    LEFT JOIN single_constraints con
        ON con.table_schema = col.table_schema
        AND con.table_name = col.table_name
        AND con.column_name = col.column_name
    LEFT JOIN pg_catalog.pg_namespace pn ON pn.nspname = col.table_schema::name
    LEFT JOIN pg_catalog.pg_class pc
        ON pc.relname = col.table_name::name AND pc.relnamespace = pn.oid
    LEFT JOIN pg_catalog.pg_description pd
        ON pd.objoid = pc.oid AND pd.objsubid = col.ordinal_position::int
    WHERE col.table_schema NOT IN ('pg_catalog', 'information_schema')
    ORDER BY col.table_schema, col.table_name, col.ordinal_position
";

const COMPLEX_CONSTRAINTS_QUERY: &str = "
    SELECT
        ccu.table_schema::text,
        ccu.table_name::text,
        array_agg(ccu.column_name::text) AS columns,
        tc.constraint_type::text
    FROM information_schema.constraint_column_usage ccu
    NATURAL JOIN information_schema.table_constraints tc
    WHERE ccu.table_schema NOT IN ('pg_catalog', 'information_schema')
        AND tc.constraint_type IN ('PRIMARY KEY', 'UNIQUE')
    GROUP BY ccu.table_schema, ccu.table_name,
        ccu.constraint_schema, ccu.constraint_name, tc.constraint_type
    HAVING count(1) > 1
";

const CHECKS_QUERY: &str = "
    SELECT
        tc.table_schema::text,
        tc.table_name::text,
        cc.check_clause::text
    FROM information_schema.check_constraints cc
    JOIN information_schema.table_constraints tc
        USING (constraint_schema, constraint_name)
    WHERE tc.table_schema NOT IN ('pg_catalog', 'information_schema')
    GROUP BY tc.table_schema, tc.table_name,
        constraint_schema, constraint_name, cc.check_clause
";

// Multi-column foreign keys are dropped by the HAVING clause.
const FOREIGN_KEYS_QUERY: &str = "
    SELECT
        kcu.table_schema::text AS containing_schema,
        kcu.table_name::text AS containing_name,
        (array_agg(kcu.column_name::text))[1] AS containing_column,
        ccu.table_schema::text AS referenced_schema,
        ccu.table_name::text AS referenced_name,
        (array_agg(ccu.column_name::text))[1] AS referenced_column,
        rc.delete_rule::text AS on_delete
    FROM information_schema.referential_constraints rc
    JOIN information_schema.constraint_column_usage ccu
        USING (constraint_schema, constraint_name)
    JOIN information_schema.key_column_usage kcu
        USING (constraint_schema, constraint_name)
    GROUP BY kcu.table_schema, kcu.table_name,
        ccu.table_schema, ccu.table_name, rc.delete_rule
    HAVING count(1) = 1
";

pub struct DbInspector {
    client: Client,
}

impl DbInspector {
    pub fn connect(dsn: &str) -> Result<Self, InspectError> {
        Ok(Self {
            client: Client::connect(dsn, NoTls)?,
        })
    }

    pub fn inspect(&mut self) -> Result<DbSchema, InspectError> {
        let tables = self.inspect_tables()?;
        let foreign_keys = self.inspect_foreign_keys(&tables)?;

        debug!(
            tables = tables.len(),
            foreign_keys = foreign_keys.len(),
            "database introspected"
        );

        Ok(DbSchema {
            tables,
            foreign_keys,
            indexes: Vec::new(),
        })
    }

    fn inspect_tables(&mut self) -> Result<Vec<Table>, InspectError> {
        let mut tables: Vec<Table> = Vec::new();

        for row in self.client.query(TABLES_QUERY, &[])? {
            tables.push(Table {
                schema: row.get(0),
                name: row.get(1),
                fields: Vec::new(),
                complex_uniqueness: Vec::new(),
                checks: Vec::new(),
            });
        }

        for row in self.client.query(COLUMNS_QUERY, &[])? {
            let schema: String = row.get(0);
            let name: String = row.get(1);
            let constraint: Option<String> = row.get(3);
            let default: Option<String> = row.get(7);
            let comment: Option<String> = row.get(8);

            let field = Field {
                name: row.get(2),
                uniqueness: parse_uniqueness(constraint.as_deref()),
                type_name: row.get(4),
                optional: row.get(5),
                computed: row.get(6),
                default,
                comment,
            };

            find_table_mut(&mut tables, &schema, &name)?.fields.push(field);
        }

        for row in self.client.query(COMPLEX_CONSTRAINTS_QUERY, &[])? {
            let schema: String = row.get(0);
            let name: String = row.get(1);
            let constraint: Option<String> = row.get(3);

            let rule = ComplexUniqueness {
                fields: row.get(2),
                uniqueness: parse_uniqueness(constraint.as_deref()),
            };

            find_table_mut(&mut tables, &schema, &name)?
                .complex_uniqueness
                .push(rule);
        }

        for row in self.client.query(CHECKS_QUERY, &[])? {
            let schema: String = row.get(0);
            let name: String = row.get(1);
            let clause: String = row.get(2);

            find_table_mut(&mut tables, &schema, &name)?.checks.push(clause);
        }

        Ok(tables)
    }

    fn inspect_foreign_keys(
        &mut self,
        tables: &[Table],
    ) -> Result<Vec<ForeignKey>, InspectError> {
        let mut foreign_keys = Vec::new();

        for row in self.client.query(FOREIGN_KEYS_QUERY, &[])? {
            let containing_schema: String = row.get(0);
            let containing_name: String = row.get(1);
            let containing_column: String = row.get(2);
            let referenced_schema: String = row.get(3);
            let referenced_name: String = row.get(4);
            let referenced_column: String = row.get(5);
            let on_delete: String = row.get(6);

            let containing = find_table(tables, &containing_schema, &containing_name)?;
            let referenced = find_table(tables, &referenced_schema, &referenced_name)?;

            // Only references onto the reference primary key survive.
            if tables[referenced].reference_pk()?.name != referenced_column {
                continue;
            }

            let field = tables[containing]
                .fields
                .iter()
                .position(|f| f.name == containing_column)
                .ok_or_else(|| InspectError::FieldNotFound {
                    field: containing_column.clone(),
                })?;

            foreign_keys.push(ForeignKey {
                referenced_schema,
                referenced_name,
                referenced,
                containing,
                field,
                on_delete: parse_on_delete(&on_delete),
            });
        }

        Ok(foreign_keys)
    }
}

fn find_table(tables: &[Table], schema: &str, name: &str) -> Result<usize, InspectError> {
    tables
        .iter()
        .position(|t| t.schema == schema && t.name == name)
        .ok_or_else(|| InspectError::TableNotFound {
            table: format!("{schema}.{name}"),
        })
}

fn find_table_mut<'a>(
    tables: &'a mut [Table],
    schema: &str,
    name: &str,
) -> Result<&'a mut Table, InspectError> {
    let position = find_table(tables, schema, name)?;
    Ok(&mut tables[position])
}

fn parse_uniqueness(constraint: Option<&str>) -> UniqueKind {
    match constraint {
        Some("PRIMARY KEY") => UniqueKind::PrimaryKey,
        Some("UNIQUE") => UniqueKind::Unique,
        _ => UniqueKind::NotUnique,
    }
}

fn parse_on_delete(rule: &str) -> OnDeleteAction {
    match rule {
        "SET NULL" => OnDeleteAction::SetNull,
        "CASCADE" => OnDeleteAction::Cascade,
        _ => OnDeleteAction::NoAction,
    }
}
