//! Field allow-lists for sortable and filterable record types
//!
//! Every record type exposed through a paged listing declares a fixed table of
//! [`Field`]s. A field ties the public name used in query strings (for example
//! `countryId`) to the SQL column it is stored in (`country_id`) and to a typed
//! accessor over the in-memory record. Sort and filter column names coming
//! from a request are resolved against this table and nothing else, so an
//! unknown name can never reach query construction.
//!
//! # Example
//!
//! ```rust
//! use worldcities_server::paging::{Field, FieldKind, Record};
//!
//! struct Airport {
//!     id: i32,
//!     code: String,
//! }
//!
//! impl Record for Airport {
//!     const FIELDS: &'static [Field<Self>] = &[
//!         Field::integer("id", "id", |a| i64::from(a.id)),
//!         Field::text("code", "code", |a| &a.code),
//!     ];
//!
//!     fn id(&self) -> i32 {
//!         self.id
//!     }
//! }
//!
//! let field = Airport::field("CODE").unwrap();
//! assert_eq!(field.kind(), FieldKind::Text);
//! assert!(Airport::field("code; DROP TABLE airports").is_none());
//! ```

use std::cmp::Ordering;
use std::fmt;

/// Value type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Signed integer (ids, foreign keys, aggregates)
    Integer,
    /// Floating point number (coordinates)
    Float,
    /// Free text
    Text,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer => write!(f, "integer"),
            Self::Float => write!(f, "float"),
            Self::Text => write!(f, "text"),
        }
    }
}

/// A borrowed view of one field of a record
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldRef<'a> {
    /// Integer value
    Integer(i64),
    /// Floating point value
    Float(f64),
    /// Text value
    Text(&'a str),
}

/// An owned, already-typed operand parsed from a request
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Integer operand
    Integer(i64),
    /// Floating point operand
    Float(f64),
    /// Text operand
    Text(String),
}

impl From<FieldRef<'_>> for FieldValue {
    fn from(value: FieldRef<'_>) -> Self {
        match value {
            FieldRef::Integer(n) => Self::Integer(n),
            FieldRef::Float(n) => Self::Float(n),
            FieldRef::Text(s) => Self::Text(s.to_string()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{}", n),
            Self::Float(n) => write!(f, "{}", n),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

enum Accessor<R> {
    Integer(fn(&R) -> i64),
    Float(fn(&R) -> f64),
    Text(fn(&R) -> &str),
}

impl<R> Clone for Accessor<R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> Copy for Accessor<R> {}

/// One permitted sort/filter target of a record type
pub struct Field<R> {
    name: &'static str,
    column: &'static str,
    accessor: Accessor<R>,
}

impl<R> Clone for Field<R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> Copy for Field<R> {}

impl<R> fmt::Debug for Field<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("column", &self.column)
            .field("kind", &self.kind())
            .finish()
    }
}

impl<R> Field<R> {
    /// Declare an integer field
    pub const fn integer(name: &'static str, column: &'static str, get: fn(&R) -> i64) -> Self {
        Self {
            name,
            column,
            accessor: Accessor::Integer(get),
        }
    }

    /// Declare a floating point field
    pub const fn float(name: &'static str, column: &'static str, get: fn(&R) -> f64) -> Self {
        Self {
            name,
            column,
            accessor: Accessor::Float(get),
        }
    }

    /// Declare a text field
    pub const fn text(name: &'static str, column: &'static str, get: fn(&R) -> &str) -> Self {
        Self {
            name,
            column,
            accessor: Accessor::Text(get),
        }
    }

    /// Public (JSON) name of the field
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// SQL column holding the field
    pub const fn column(&self) -> &'static str {
        self.column
    }

    /// Value type of the field
    pub const fn kind(&self) -> FieldKind {
        match self.accessor {
            Accessor::Integer(_) => FieldKind::Integer,
            Accessor::Float(_) => FieldKind::Float,
            Accessor::Text(_) => FieldKind::Text,
        }
    }

    /// Whether `candidate` names this field (public or column spelling, any case)
    pub fn is_named(&self, candidate: &str) -> bool {
        self.name.eq_ignore_ascii_case(candidate) || self.column.eq_ignore_ascii_case(candidate)
    }

    /// Read the field from a record
    pub fn get<'a>(&self, record: &'a R) -> FieldRef<'a> {
        match self.accessor {
            Accessor::Integer(get) => FieldRef::Integer(get(record)),
            Accessor::Float(get) => FieldRef::Float(get(record)),
            Accessor::Text(get) => FieldRef::Text(get(record)),
        }
    }

    /// Parse a raw request string into an operand of this field's type
    ///
    /// Returns `None` when a numeric field receives something that is not a number.
    pub fn parse(&self, raw: &str) -> Option<FieldValue> {
        match self.kind() {
            FieldKind::Integer => raw.trim().parse().ok().map(FieldValue::Integer),
            FieldKind::Float => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(FieldValue::Float),
            FieldKind::Text => Some(FieldValue::Text(raw.to_string())),
        }
    }

    /// Listing filter semantics: case-insensitive containment for text,
    /// equality for numbers
    pub fn contains(&self, record: &R, operand: &FieldValue) -> bool {
        match (self.get(record), operand) {
            (FieldRef::Text(value), FieldValue::Text(needle)) => {
                value.to_lowercase().contains(&needle.to_lowercase())
            }
            (value, operand) => numeric_eq(value, operand),
        }
    }

    /// Duplicate-check semantics: case-insensitive equality for text,
    /// equality for numbers
    pub fn equals(&self, record: &R, operand: &FieldValue) -> bool {
        match (self.get(record), operand) {
            (FieldRef::Text(value), FieldValue::Text(other)) => {
                value.to_lowercase() == other.to_lowercase()
            }
            (value, operand) => numeric_eq(value, operand),
        }
    }

    /// Total order over two records by this field
    ///
    /// Text compares case-insensitively first and falls back to the raw bytes
    /// so that the order stays total.
    pub fn compare(&self, a: &R, b: &R) -> Ordering {
        match (self.get(a), self.get(b)) {
            (FieldRef::Integer(x), FieldRef::Integer(y)) => x.cmp(&y),
            (FieldRef::Float(x), FieldRef::Float(y)) => x.total_cmp(&y),
            (FieldRef::Text(x), FieldRef::Text(y)) => x
                .to_lowercase()
                .cmp(&y.to_lowercase())
                .then_with(|| x.cmp(y)),
            // a field always yields the same variant
            _ => Ordering::Equal,
        }
    }
}

fn numeric_eq(value: FieldRef<'_>, operand: &FieldValue) -> bool {
    match (value, operand) {
        (FieldRef::Integer(x), FieldValue::Integer(y)) => x == *y,
        (FieldRef::Float(x), FieldValue::Float(y)) => x == *y,
        _ => false,
    }
}

/// A record type with a compiled allow-list of sortable/filterable fields
pub trait Record: Sized + Send + Sync + 'static {
    /// Every field that may be named by `sortColumn`, `filterColumn` or a dupe check
    const FIELDS: &'static [Field<Self>];

    /// Identity of the record, used as the ordering tie-breaker
    fn id(&self) -> i32;

    /// Resolve a field name against the allow-list
    fn field(name: &str) -> Option<&'static Field<Self>> {
        Self::FIELDS.iter().find(|field| field.is_named(name))
    }
}
