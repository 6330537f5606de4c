//! Relationship classification over a finalized schema.
//!
//! Every foreign key yields one edge per anchor table it touches. The
//! edge kind is a three-bit code over the backing field: not-unique,
//! anchor-is-referenced-side, optional. Junction tables collapse pairs
//! of `-<` edges into a single `><` (many-to-many) edge.

use crate::model::{DbSchema, Field, TableId, UniqueKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectKind {
    SomeToEvery,     // o-
    SomeToSomeLeft,  // oo
    EveryToSome,     // -o
    SomeToSomeRight, // oo
    ManyToEvery,     // >-
    ManyToSome,      // >o
    EveryToMany,     // -<
    SomeToMany,      // o<
    ManyToMany,      // ><
}

impl ConnectKind {
    /// Numeric classification code. The direct kinds carry their
    /// three-bit encoding; `ManyToMany` is synthetic and sorts above
    /// all of them.
    pub const fn code(self) -> u8 {
        match self {
            ConnectKind::SomeToEvery => 0b000,
            ConnectKind::SomeToSomeLeft => 0b001,
            ConnectKind::EveryToSome => 0b010,
            ConnectKind::SomeToSomeRight => 0b011,
            ConnectKind::ManyToEvery => 0b100,
            ConnectKind::ManyToSome => 0b101,
            ConnectKind::EveryToMany => 0b110,
            ConnectKind::SomeToMany => 0b111,
            ConnectKind::ManyToMany => 0b1000,
        }
    }

    /// Display symbol; the anchor table reads on the left.
    pub const fn symbol(self) -> &'static str {
        match self {
            ConnectKind::SomeToEvery => "o-",
            ConnectKind::SomeToSomeLeft => "oo",
            ConnectKind::EveryToSome => "-o",
            ConnectKind::SomeToSomeRight => "oo",
            ConnectKind::ManyToEvery => ">-",
            ConnectKind::ManyToSome => ">o",
            ConnectKind::EveryToMany => "-<",
            ConnectKind::SomeToMany => "o<",
            ConnectKind::ManyToMany => "><",
        }
    }
}

/// One relationship edge of a table's connection listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    pub kind: ConnectKind,
    /// The table on the far side of the edge.
    pub table: TableId,
    /// The junction realizing a many-to-many edge, when there is one.
    pub mid: Option<TableId>,
}

impl Connection {
    pub fn symbol(&self) -> &'static str {
        self.kind.symbol()
    }
}

fn classify(field: &Field, anchor_is_referenced: bool) -> ConnectKind {
    let not_unique = field.uniqueness == UniqueKind::NotUnique;

    match (not_unique, anchor_is_referenced, field.optional) {
        (false, false, false) => ConnectKind::SomeToEvery,
        (false, false, true) => ConnectKind::SomeToSomeLeft,
        (false, true, false) => ConnectKind::EveryToSome,
        (false, true, true) => ConnectKind::SomeToSomeRight,
        (true, false, false) => ConnectKind::ManyToEvery,
        (true, false, true) => ConnectKind::ManyToSome,
        (true, true, false) => ConnectKind::EveryToMany,
        (true, true, true) => ConnectKind::SomeToMany,
    }
}

/// The two endpoint tables linked through `table`, when `table` is a
/// many-to-many junction: exactly two foreign keys touch it and both
/// classify as `>-` with the junction as anchor. Per-field uniqueness
/// and optionality decide alone; composite-uniqueness rules on the
/// junction are not consulted.
pub fn junction_endpoints(db: &DbSchema, table: TableId) -> Option<(TableId, TableId)> {
    let mut endpoints = Vec::with_capacity(2);

    for fk in &db.foreign_keys {
        if fk.containing != table && fk.referenced != table {
            continue;
        }
        endpoints.push(fk);
    }

    if endpoints.len() != 2 {
        return None;
    }

    for &fk in &endpoints {
        if classify(db.fk_field(fk), table == fk.referenced) != ConnectKind::ManyToEvery {
            return None;
        }
    }

    Some((endpoints[0].referenced, endpoints[1].referenced))
}

/// Every relationship `table` participates in, directly or as a
/// foreign-key target, sorted by ascending classification code.
/// `-<` edges into a junction are collapsed to `><` against the
/// junction's other endpoint, with the junction recorded as `mid`.
pub fn table_connections(db: &DbSchema, table: TableId) -> Vec<Connection> {
    let mut connections = Vec::new();

    for fk in &db.foreign_keys {
        let other = if table == fk.containing {
            fk.referenced
        } else if table == fk.referenced {
            fk.containing
        } else {
            continue;
        };

        let mut kind = classify(db.fk_field(fk), table == fk.referenced);
        let mut target = other;
        let mut mid = None;

        if kind == ConnectKind::EveryToMany {
            if let Some((a, b)) = junction_endpoints(db, other) {
                // One endpoint is the anchor itself; the edge leads to
                // the other one, through the junction.
                mid = Some(other);
                target = if a == table { b } else { a };
                kind = ConnectKind::ManyToMany;
            }
        }

        connections.push(Connection {
            kind,
            table: target,
            mid,
        });
    }

    connections.sort_by_key(|c| c.kind.code());
    connections
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::SchemaBuilder;
    use crate::document::Document;

    fn build(source: &str) -> DbSchema {
        let mut builder = SchemaBuilder::new();
        builder
            .accumulate(&Document::from_yaml(source).unwrap())
            .unwrap();
        builder.finalize().unwrap()
    }

    fn id(db: &DbSchema, name: &str) -> TableId {
        db.find_table("public", name).unwrap()
    }

    #[test]
    fn test_codes_and_symbols() {
        assert_eq!(ConnectKind::SomeToEvery.code(), 0);
        assert_eq!(ConnectKind::SomeToMany.code(), 7);
        assert_eq!(ConnectKind::ManyToMany.code(), 8);
        assert_eq!(ConnectKind::ManyToEvery.symbol(), ">-");
        assert_eq!(ConnectKind::SomeToSomeLeft.symbol(), "oo");
        assert_eq!(ConnectKind::SomeToSomeRight.symbol(), "oo");
        assert_eq!(ConnectKind::ManyToMany.symbol(), "><");
    }

    #[test]
    fn test_one_to_many_pair() {
        let db = build(
            r#"
            author: {id: "pk uuid"}
            book: {id: "pk uuid", author_id: "fk author"}
            "#,
        );

        // The book holds a mandatory, not-unique fk: many books per
        // author.
        let from_book = table_connections(&db, id(&db, "book"));
        assert_eq!(from_book.len(), 1);
        assert_eq!(from_book[0].kind, ConnectKind::ManyToEvery);
        assert_eq!(from_book[0].table, id(&db, "author"));
        assert_eq!(from_book[0].symbol(), ">-");

        let from_author = table_connections(&db, id(&db, "author"));
        assert_eq!(from_author[0].kind, ConnectKind::EveryToMany);
        assert_eq!(from_author[0].symbol(), "-<");
    }

    #[test]
    fn test_optional_unique_fk() {
        let db = build(
            r#"
            user: {id: "pk uuid"}
            profile: {id: "pk uuid", user_id: "uq fk user?"}
            "#,
        );

        let from_profile = table_connections(&db, id(&db, "profile"));
        assert_eq!(from_profile[0].kind, ConnectKind::SomeToSomeLeft);

        let from_user = table_connections(&db, id(&db, "user"));
        assert_eq!(from_user[0].kind, ConnectKind::SomeToSomeRight);
        assert_eq!(from_user[0].symbol(), "oo");
    }

    #[test]
    fn test_junction_detection() {
        let db = build(
            r#"
            student: {id: "pk uuid"}
            course: {id: "pk uuid"}
            enrollment:
              student_id: fk student
              course_id: fk course
            "#,
        );

        let (a, b) = junction_endpoints(&db, id(&db, "enrollment")).unwrap();
        assert_eq!(a, id(&db, "student"));
        assert_eq!(b, id(&db, "course"));

        // Endpoints themselves are not junctions.
        assert!(junction_endpoints(&db, id(&db, "student")).is_none());
    }

    #[test]
    fn test_junction_rejects_optional_fk() {
        let db = build(
            r#"
            student: {id: "pk uuid"}
            course: {id: "pk uuid"}
            enrollment:
              student_id: fk student?
              course_id: fk course
            "#,
        );

        assert!(junction_endpoints(&db, id(&db, "enrollment")).is_none());
    }

    #[test]
    fn test_junction_with_third_fk_rejected() {
        let db = build(
            r#"
            student: {id: "pk uuid"}
            course: {id: "pk uuid"}
            term: {id: "pk uuid"}
            enrollment:
              student_id: fk student
              course_id: fk course
              term_id: fk term
            "#,
        );

        assert!(junction_endpoints(&db, id(&db, "enrollment")).is_none());

        let from_student = table_connections(&db, id(&db, "student"));
        assert_eq!(from_student[0].kind, ConnectKind::EveryToMany);
        assert_eq!(from_student[0].mid, None);
    }

    #[test]
    fn test_many_to_many_collapse() {
        let db = build(
            r#"
            student: {id: "pk uuid"}
            course: {id: "pk uuid"}
            enrollment:
              student_id: fk student
              course_id: fk course
            "#,
        );

        let from_student = table_connections(&db, id(&db, "student"));
        assert_eq!(from_student.len(), 1);
        assert_eq!(from_student[0].kind, ConnectKind::ManyToMany);
        assert_eq!(from_student[0].table, id(&db, "course"));
        assert_eq!(from_student[0].mid, Some(id(&db, "enrollment")));
        assert_eq!(from_student[0].symbol(), "><");

        // The junction's own listing keeps the direct `>-` edges.
        let from_junction = table_connections(&db, id(&db, "enrollment"));
        assert_eq!(from_junction.len(), 2);
        assert!(from_junction
            .iter()
            .all(|c| c.kind == ConnectKind::ManyToEvery));
    }

    #[test]
    fn test_composite_rule_does_not_block_junction() {
        // Uniqueness of the pair is declared at table level; the
        // detector looks at the fields alone, so this still counts.
        let db = build(
            r#"
            student: {id: "pk uuid"}
            course: {id: "pk uuid"}
            enrollment:
              student_id: fk student
              course_id: fk course
              $uq: [student_id, course_id]
            "#,
        );

        let from_student = table_connections(&db, id(&db, "student"));
        assert_eq!(from_student[0].kind, ConnectKind::ManyToMany);
        assert_eq!(from_student[0].mid, Some(id(&db, "enrollment")));
    }

    #[test]
    fn test_sorted_by_code() {
        let db = build(
            r#"
            hub: {id: "pk uuid"}
            a: {id: "pk uuid", hub_id: "uq fk hub"}
            b: {id: "pk uuid", hub_id: "fk hub"}
            "#,
        );

        let from_hub = table_connections(&db, id(&db, "hub"));
        assert_eq!(from_hub.len(), 2);
        // -o (code 2) sorts before -< (code 6).
        assert_eq!(from_hub[0].kind, ConnectKind::EveryToSome);
        assert_eq!(from_hub[1].kind, ConnectKind::EveryToMany);
    }
}
