//! Attribute-line grammar.
//!
//! Every table-body entry is a (name, value) pair. The name decides the
//! entry kind (composite rule, check rule, or field); a field value is
//! then scanned by an ordered matcher that tries the simple-field
//! grammar first and the foreign-key grammar second. The whole value
//! must be consumed for a grammar to match.

use crate::model::{OnDeleteAction, UniqueKind};

/// Marker character introducing rule names and document directives.
pub const MARKER: char = '$';

/// Marker introducing an inline comment inside an attribute value.
const COMMENT_MARKER: &str = "--";

/// Classification of an attribute name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrName {
    /// `$pk` / `$uq` / `$uq!`, optionally disambiguated `_<suffix>`.
    Rule(UniqueKind),
    /// `$check`, optionally disambiguated `_<suffix>`.
    Check,
    /// Any other `$`-prefixed name.
    UnknownRule,
    /// A plain word-character identifier.
    Field,
    /// Anything else.
    Invalid,
}

/// Parsed attribute value: the tagged union over the value grammars.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrKind {
    Field {
        uniqueness: UniqueKind,
        /// Type token as written, precision suffix included.
        type_name: String,
        optional: bool,
        computed: bool,
        default: Option<String>,
    },
    ForeignKey {
        uniqueness: UniqueKind,
        schema: Option<String>,
        table: String,
        optional: bool,
        on_delete: OnDeleteAction,
    },
}

pub(crate) fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

pub(crate) fn is_word(s: &str) -> bool {
    !s.is_empty() && s.chars().all(is_word_char)
}

pub fn classify_name(name: &str) -> AttrName {
    if let Some(rest) = name.strip_prefix(MARKER) {
        let rules = [
            ("pk", AttrName::Rule(UniqueKind::PrimaryKey)),
            ("uq!", AttrName::Rule(UniqueKind::StrictUnique)),
            ("uq", AttrName::Rule(UniqueKind::Unique)),
            ("check", AttrName::Check),
        ];

        for (keyword, kind) in rules {
            if let Some(suffix) = rest.strip_prefix(keyword) {
                if suffix.is_empty()
                    || (suffix.starts_with('_') && suffix[1..].chars().all(is_word_char))
                {
                    return kind;
                }
            }
        }

        return AttrName::UnknownRule;
    }

    if is_word(name) {
        AttrName::Field
    } else {
        AttrName::Invalid
    }
}

/// Rule keyword as written in the notation, for error messages.
pub fn rule_keyword(kind: UniqueKind) -> &'static str {
    match kind {
        UniqueKind::PrimaryKey => "pk",
        UniqueKind::StrictUnique => "uq!",
        UniqueKind::Unique => "uq",
        UniqueKind::NotUnique => "",
    }
}

/// Split an inline `--` comment off a raw attribute line. Both halves
/// are trimmed; an empty comment counts as no comment.
pub fn split_comment(value: &str) -> (&str, Option<String>) {
    match value.split_once(COMMENT_MARKER) {
        Some((line, comment)) => {
            let comment = comment.trim();
            (line.trim(), (!comment.is_empty()).then(|| comment.to_string()))
        }
        None => (value.trim(), None),
    }
}

/// Field list of a composite-uniqueness rule written as a string:
/// `(f1, f2, ...)`.
pub fn composite_fields(line: &str) -> Option<Vec<String>> {
    let inner = line.trim().strip_prefix('(')?.strip_suffix(')')?;
    let fields: Vec<String> = inner.split(',').map(|f| f.trim().to_string()).collect();
    fields.iter().all(|f| is_word(f)).then_some(fields)
}

/// Scan an attribute value (comment already stripped). `None` means the
/// value matches neither grammar.
pub fn parse_value(value: &str) -> Option<AttrKind> {
    parse_field(value).or_else(|| parse_foreign_key(value))
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn at_end(&self) -> bool {
        self.pos == self.src.len()
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
        self.pos > start
    }

    fn eat_word(&mut self) -> Option<&'a str> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if is_word_char(c) {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
        if self.pos > start {
            Some(&self.src[start..self.pos])
        } else {
            None
        }
    }

    fn eat_digits(&mut self) -> bool {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.pos += 1;
            } else {
                break;
            }
        }
        self.pos > start
    }
}

/// Leading uniqueness keyword. Consumed only when followed by
/// whitespace and another word, so that a bare `pk` stays available as
/// a type token.
fn eat_uniqueness(cur: &mut Cursor) -> UniqueKind {
    let start = cur.pos;

    let kind = match cur.eat_word() {
        Some("pk") => UniqueKind::PrimaryKey,
        Some("uq") => {
            if cur.eat('!') {
                UniqueKind::StrictUnique
            } else {
                UniqueKind::Unique
            }
        }
        _ => {
            cur.pos = start;
            return UniqueKind::NotUnique;
        }
    };

    if cur.skip_ws() && cur.peek().is_some_and(is_word_char) {
        kind
    } else {
        cur.pos = start;
        UniqueKind::NotUnique
    }
}

/// Parenthesized precision suffix: `(10)`, `(10, 2)`, ...
fn eat_precision(cur: &mut Cursor) -> Option<()> {
    if !cur.eat('(') {
        return None;
    }
    cur.skip_ws();
    if !cur.eat_digits() {
        return None;
    }
    loop {
        cur.skip_ws();
        if cur.eat(',') {
            cur.skip_ws();
            if !cur.eat_digits() {
                return None;
            }
        } else {
            break;
        }
    }
    cur.eat(')').then_some(())
}

fn parse_field(value: &str) -> Option<AttrKind> {
    let mut cur = Cursor::new(value);
    let uniqueness = eat_uniqueness(&mut cur);

    let type_start = cur.pos;
    cur.eat_word()?;
    if cur.peek() == Some('(') {
        eat_precision(&mut cur)?;
    }
    let type_name = value[type_start..cur.pos].to_string();

    let optional = cur.eat('?');

    if cur.at_end() {
        return Some(AttrKind::Field {
            uniqueness,
            type_name,
            optional,
            computed: false,
            default: None,
        });
    }

    cur.skip_ws();
    let computed = cur.eat(':');
    if !cur.eat('=') {
        return None;
    }
    let default = cur.rest().trim();
    let default = (!default.is_empty()).then(|| default.to_string());

    Some(AttrKind::Field {
        uniqueness,
        type_name,
        optional,
        computed,
        default,
    })
}

fn parse_foreign_key(value: &str) -> Option<AttrKind> {
    let mut cur = Cursor::new(value);
    let uniqueness = eat_uniqueness(&mut cur);

    if cur.eat_word()? != "fk" {
        return None;
    }
    if !cur.skip_ws() {
        return None;
    }

    let first = cur.eat_word()?;
    let (schema, table) = if cur.eat('.') {
        (Some(first.to_string()), cur.eat_word()?.to_string())
    } else {
        (None, first.to_string())
    };

    let (optional, on_delete) = if cur.eat('?') {
        (true, OnDeleteAction::SetNull)
    } else if cur.eat('!') {
        (false, OnDeleteAction::Cascade)
    } else {
        (false, OnDeleteAction::NoAction)
    };

    cur.at_end().then(|| AttrKind::ForeignKey {
        uniqueness,
        schema,
        table,
        optional,
        on_delete,
    })
}

/// Split a type token into its base name and verbatim precision
/// suffix. `None` when the token does not match the type grammar.
pub fn split_type(type_name: &str) -> Option<(&str, &str)> {
    let mut cur = Cursor::new(type_name);
    let base = cur.eat_word()?;
    if cur.at_end() {
        return Some((base, ""));
    }
    let precision_start = cur.pos;
    eat_precision(&mut cur)?;
    cur.at_end()
        .then(|| (base, &type_name[precision_start..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(value: &str) -> AttrKind {
        parse_value(value).unwrap()
    }

    #[test]
    fn test_classify_rule_names() {
        assert_eq!(
            classify_name("$pk"),
            AttrName::Rule(UniqueKind::PrimaryKey)
        );
        assert_eq!(
            classify_name("$pk_main"),
            AttrName::Rule(UniqueKind::PrimaryKey)
        );
        assert_eq!(classify_name("$uq"), AttrName::Rule(UniqueKind::Unique));
        assert_eq!(
            classify_name("$uq!"),
            AttrName::Rule(UniqueKind::StrictUnique)
        );
        assert_eq!(
            classify_name("$uq!_pair"),
            AttrName::Rule(UniqueKind::StrictUnique)
        );
        assert_eq!(classify_name("$check"), AttrName::Check);
        assert_eq!(classify_name("$check_price"), AttrName::Check);
    }

    #[test]
    fn test_classify_unknown_and_invalid_names() {
        assert_eq!(classify_name("$pkx"), AttrName::UnknownRule);
        assert_eq!(classify_name("$index"), AttrName::UnknownRule);
        assert_eq!(classify_name("role_id"), AttrName::Field);
        assert_eq!(classify_name("role id"), AttrName::Invalid);
        assert_eq!(classify_name(""), AttrName::Invalid);
    }

    #[test]
    fn test_simple_field() {
        assert_eq!(
            field("pk uuid"),
            AttrKind::Field {
                uniqueness: UniqueKind::PrimaryKey,
                type_name: "uuid".to_string(),
                optional: false,
                computed: false,
                default: None,
            }
        );
    }

    #[test]
    fn test_optional_field_with_precision() {
        assert_eq!(
            field("uq! varchar(120)?"),
            AttrKind::Field {
                uniqueness: UniqueKind::StrictUnique,
                type_name: "varchar(120)".to_string(),
                optional: true,
                computed: false,
                default: None,
            }
        );
    }

    #[test]
    fn test_precision_with_scale() {
        let AttrKind::Field { type_name, .. } = field("dec(10, 2)") else {
            panic!("expected a field");
        };
        assert_eq!(type_name, "dec(10, 2)");
    }

    #[test]
    fn test_default_expression() {
        assert_eq!(
            field("timestamp = now()"),
            AttrKind::Field {
                uniqueness: UniqueKind::NotUnique,
                type_name: "timestamp".to_string(),
                optional: false,
                computed: false,
                default: Some("now()".to_string()),
            }
        );
    }

    #[test]
    fn test_computed_expression() {
        assert_eq!(
            field("dec(10, 2) := price * quantity"),
            AttrKind::Field {
                uniqueness: UniqueKind::NotUnique,
                type_name: "dec(10, 2)".to_string(),
                optional: false,
                computed: true,
                default: Some("price * quantity".to_string()),
            }
        );
    }

    #[test]
    fn test_bare_keyword_is_a_type() {
        // A lone `pk` has nothing to qualify, so it scans as a type.
        assert_eq!(
            field("pk"),
            AttrKind::Field {
                uniqueness: UniqueKind::NotUnique,
                type_name: "pk".to_string(),
                optional: false,
                computed: false,
                default: None,
            }
        );
    }

    #[test]
    fn test_rejected_values() {
        assert_eq!(parse_value("uq!"), None);
        assert_eq!(parse_value("varchar(x)"), None);
        assert_eq!(parse_value("int : = 5"), None);
        assert_eq!(parse_value("fk a.b.c"), None);
        assert_eq!(parse_value(""), None);
    }

    #[test]
    fn test_foreign_key() {
        assert_eq!(
            field("fk role"),
            AttrKind::ForeignKey {
                uniqueness: UniqueKind::NotUnique,
                schema: None,
                table: "role".to_string(),
                optional: false,
                on_delete: OnDeleteAction::NoAction,
            }
        );
    }

    #[test]
    fn test_foreign_key_optional_and_cascade() {
        assert_eq!(
            field("fk auth.role?"),
            AttrKind::ForeignKey {
                uniqueness: UniqueKind::NotUnique,
                schema: Some("auth".to_string()),
                table: "role".to_string(),
                optional: true,
                on_delete: OnDeleteAction::SetNull,
            }
        );
        assert_eq!(
            field("uq fk auth.role!"),
            AttrKind::ForeignKey {
                uniqueness: UniqueKind::Unique,
                schema: Some("auth".to_string()),
                table: "role".to_string(),
                optional: false,
                on_delete: OnDeleteAction::Cascade,
            }
        );
    }

    #[test]
    fn test_uq_fk_is_a_field_of_type_fk() {
        // Without a target the keyword sequence still matches the
        // simple-field grammar.
        assert_eq!(
            field("uq fk"),
            AttrKind::Field {
                uniqueness: UniqueKind::Unique,
                type_name: "fk".to_string(),
                optional: false,
                computed: false,
                default: None,
            }
        );
    }

    #[test]
    fn test_split_comment() {
        let (line, comment) = split_comment("pk uuid -- surrogate key");
        assert_eq!(line, "pk uuid");
        assert_eq!(comment.as_deref(), Some("surrogate key"));

        let (line, comment) = split_comment("int = 0");
        assert_eq!(line, "int = 0");
        assert_eq!(comment, None);

        let (line, comment) = split_comment("int --");
        assert_eq!(line, "int");
        assert_eq!(comment, None);
    }

    #[test]
    fn test_composite_fields() {
        assert_eq!(
            composite_fields("(a, b)"),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(composite_fields("( one )"), Some(vec!["one".to_string()]));
        assert_eq!(composite_fields("a, b"), None);
        assert_eq!(composite_fields("()"), None);
        assert_eq!(composite_fields("(a b)"), None);
    }

    #[test]
    fn test_split_type() {
        assert_eq!(split_type("uuid"), Some(("uuid", "")));
        assert_eq!(split_type("dec(10, 2)"), Some(("dec", "(10, 2)")));
        assert_eq!(split_type("dec(10, 2)x"), None);
        assert_eq!(split_type(""), None);
        assert_eq!(split_type("a-b"), None);
    }
}
