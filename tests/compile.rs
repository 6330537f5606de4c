//! End-to-end compilation through the public API.

use pretty_assertions::assert_eq;

use rustddl::builder::{BuildOptions, SchemaBuilder};
use rustddl::connections::{ConnectKind, table_connections};
use rustddl::document::Document;
use rustddl::{compile_to_ddl, default_type_table};

#[test]
fn test_compile_two_schemas() {
    let source = r#"
auth.role:
  id: pk uuid
auth.user:
  id: pk uuid
  role_id: fk auth.role?
"#;

    let ddl = compile_to_ddl(&[source], BuildOptions::default()).unwrap();

    let expected = "\
DROP SCHEMA IF EXISTS auth CASCADE;

CREATE SCHEMA auth;

CREATE TABLE auth.role (
    id uuid NOT NULL PRIMARY KEY
);

CREATE TABLE auth.user (
    id uuid NOT NULL PRIMARY KEY,
    role_id uuid
);

ALTER TABLE auth.user ADD CONSTRAINT fk_auth_user_role_id \
FOREIGN KEY (role_id) REFERENCES auth.role (id) ON DELETE SET NULL;";

    assert_eq!(ddl, expected);
}

#[test]
fn test_forward_reference_across_sources() {
    let ddl = compile_to_ddl(
        &[
            "post: {id: \"pk uuid\", author_id: \"fk user!\"}",
            "user: {id: \"pk uuid\"}",
        ],
        BuildOptions::default(),
    )
    .unwrap();

    assert!(ddl.contains(
        "ALTER TABLE public.post ADD CONSTRAINT fk_public_post_author_id \
         FOREIGN KEY (author_id) REFERENCES public.user (id) ON DELETE CASCADE;"
    ));
}

#[test]
fn test_missing_target_fails_at_finalize() {
    let err = compile_to_ddl(
        &["post: {id: \"pk uuid\", author_id: \"fk user\"}"],
        BuildOptions::default(),
    )
    .unwrap_err();

    assert!(err.to_string().contains("public.user"));
}

#[test]
fn test_many_to_many_through_junction() {
    let source = r#"
student: {id: "pk uuid"}
course: {id: "pk uuid"}
enrollment:
  student_id: fk student
  course_id: fk course
  $uq: [student_id, course_id]
"#;

    let mut builder = SchemaBuilder::new();
    builder
        .accumulate(&Document::from_yaml(source).unwrap())
        .unwrap();
    let db = builder.finalize().unwrap();

    let student = db.find_table("public", "student").unwrap();
    let course = db.find_table("public", "course").unwrap();
    let enrollment = db.find_table("public", "enrollment").unwrap();

    let edges = table_connections(&db, student);
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].kind, ConnectKind::ManyToMany);
    assert_eq!(edges[0].table, course);
    assert_eq!(edges[0].mid, Some(enrollment));
}

#[test]
fn test_default_type_table_round_trip() {
    let ddl = compile_to_ddl(
        &["m: {id: \"pk ser8\", label: \"str?\", paid: \"b = false\"}"],
        BuildOptions::default(),
    )
    .unwrap();

    assert!(ddl.contains("id serial8 NOT NULL PRIMARY KEY"));
    assert!(ddl.contains("label text"));
    assert!(ddl.contains("paid bool NOT NULL DEFAULT false"));

    // The alias table resolves every alias to a canonical name that is
    // itself present.
    let table = default_type_table();
    for canonical in table.values() {
        assert!(table.contains_key(canonical), "missing {canonical}");
    }
}
