//! The datatype capability consumed by `TypedString` expressions.
//!
//! Lexical rules and value spaces live with whoever implements [`Datatype`]; the grammar
//! model only ever asks whether a literal is acceptable. A few trivial datatypes are
//! provided for collaborators that need nothing more.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// In-scope namespace declarations, needed by datatypes such as `QName`.
pub trait Namespaces {
    fn resolve(&self, prefix: &str) -> Option<&str>;
}

/// A context with no namespace declarations at all.
pub struct NoNamespaces;

impl Namespaces for NoNamespaces {
    fn resolve(&self, _prefix: &str) -> Option<&str> {
        None
    }
}

pub trait Datatype: fmt::Debug + Send + Sync {
    fn is_valid(&self, value: &str, context: &dyn Namespaces) -> bool;

    fn name(&self) -> &str;
}

/// Shared handle to a datatype.
///
/// Two handles are equal only when they point at the same datatype instance, which is what
/// lets the expression pool intern `TypedString` nodes without knowing anything about the
/// datatype's facets.
#[derive(Clone)]
pub struct DatatypeRef(Arc<dyn Datatype>);

impl DatatypeRef {
    pub fn new<D: Datatype + 'static>(datatype: D) -> DatatypeRef {
        DatatypeRef(Arc::new(datatype))
    }

    pub fn is_valid(&self, value: &str, context: &dyn Namespaces) -> bool {
        self.0.is_valid(value, context)
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }

    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.0) as *const ()
    }
}

impl PartialEq for DatatypeRef {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}
impl Eq for DatatypeRef {}

impl Hash for DatatypeRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state)
    }
}

impl fmt::Debug for DatatypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

pub fn is_whitespace_char(c: char) -> bool {
    ['\x20', '\x09', '\x0d', '\x0a'].contains(&c)
}

pub fn is_whitespace_str(s: &str) -> bool {
    s.chars().all(is_whitespace_char)
}

/// Collapses runs of whitespace to a single space and trims both ends.
pub fn normalize_whitespace(val: &str) -> String {
    let mut result = String::with_capacity(val.len());
    for word in val.split(is_whitespace_char).filter(|w| !w.is_empty()) {
        if !result.is_empty() {
            result.push(' ');
        }
        result.push_str(word);
    }
    result
}

/// Accepts any literal.
#[derive(Debug)]
pub struct StringType;

impl Datatype for StringType {
    fn is_valid(&self, _value: &str, _context: &dyn Namespaces) -> bool {
        true
    }

    fn name(&self) -> &str {
        "string"
    }
}

/// Accepts exactly one value, compared after whitespace normalization.
#[derive(Debug)]
pub struct TokenValue(pub String);

impl Datatype for TokenValue {
    fn is_valid(&self, value: &str, _context: &dyn Namespaces) -> bool {
        self.0 == normalize_whitespace(value)
    }

    fn name(&self) -> &str {
        "token"
    }
}

/// Accepts literals matching a regular expression in full.
#[derive(Debug)]
pub struct PatternType {
    name: String,
    re: regex::Regex,
}

impl PatternType {
    pub fn new(name: &str, pattern: &str) -> Result<PatternType, regex::Error> {
        Ok(PatternType {
            name: name.to_string(),
            re: regex::Regex::new(&format!("^(?:{pattern})$"))?,
        })
    }
}

impl Datatype for PatternType {
    fn is_valid(&self, value: &str, _context: &dyn Namespaces) -> bool {
        self.re.is_match(value)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
