use agm_model::datatype::is_whitespace_str;
use agm_model::{ExpId, Namespaces, QualifiedName};

/// Character data, together with the namespace context datatypes may need.
#[derive(Copy, Clone)]
pub struct StringToken<'a> {
    pub literal: &'a str,
    pub context: &'a dyn Namespaces,
}

impl<'a> StringToken<'a> {
    pub fn new(literal: &'a str, context: &'a dyn Namespaces) -> StringToken<'a> {
        StringToken { literal, context }
    }

    /// Whitespace-only text may be dropped when the grammar has no place for it.
    pub fn is_ignorable(&self) -> bool {
        is_whitespace_str(self.literal)
    }
}

#[derive(Copy, Clone)]
pub struct AttributeToken<'a> {
    pub name: QualifiedName<'a>,
    pub value: StringToken<'a>,
}

/// A completed child element, identified by the element declarations it satisfied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElementToken {
    accepted: Vec<ExpId>,
}

impl ElementToken {
    pub fn new(accepted: Vec<ExpId>) -> ElementToken {
        ElementToken { accepted }
    }

    pub fn accepted(&self) -> &[ExpId] {
        &self.accepted
    }

    pub fn accepts(&self, element: ExpId) -> bool {
        self.accepted.contains(&element)
    }
}

pub enum Token<'a> {
    String(StringToken<'a>),
    Attribute(AttributeToken<'a>),
    Element(ElementToken),
    /// Stands in for an element whose declaration is unknown, while recovering from an error.
    AnyElement,
}

impl Token<'_> {
    pub fn match_any_string(&self) -> bool {
        matches!(self, Token::String(_))
    }

    pub fn is_ignorable(&self) -> bool {
        match self {
            Token::String(s) => s.is_ignorable(),
            _ => false,
        }
    }
}
