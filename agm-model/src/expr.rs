use crate::datatype::DatatypeRef;
use crate::model::NameClass;
use std::sync::Arc;

/// Handle to an expression interned in an [`ExpressionPool`](crate::ExpressionPool).
///
/// Handles are only meaningful for the pool that issued them. Because the pool hash-conses
/// every node, two handles from the same pool are equal exactly when they denote the same
/// node.
#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug, PartialOrd, Ord)]
pub struct ExpId(pub(crate) u32);

impl ExpId {
    pub const EPSILON: ExpId = ExpId(0);
    pub const NULL_SET: ExpId = ExpId(1);
    pub const ANY_STRING: ExpId = ExpId(2);

    pub fn index(self) -> u32 {
        self.0
    }
}

#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug)]
pub struct RefId(pub(crate) u32);

// NameClass is behind an Arc so that cloning a node out of the pool stays cheap.
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub enum Exp {
    Epsilon,
    NullSet,
    AnyString,
    TypedString(DatatypeRef),
    Attribute(Arc<NameClass>, ExpId),
    Element(Arc<NameClass>, ExpId),
    Choice(ExpId, ExpId),
    Sequence(ExpId, ExpId),
    Interleave(ExpId, ExpId),
    OneOrMore(ExpId),
    Mixed(ExpId),
    Reference(RefId),
}

impl Exp {
    pub fn kind(&self) -> &'static str {
        match self {
            Exp::Epsilon => "epsilon",
            Exp::NullSet => "nullSet",
            Exp::AnyString => "anyString",
            Exp::TypedString(_) => "typedString",
            Exp::Attribute(_, _) => "attribute",
            Exp::Element(_, _) => "element",
            Exp::Choice(_, _) => "choice",
            Exp::Sequence(_, _) => "sequence",
            Exp::Interleave(_, _) => "interleave",
            Exp::OneOrMore(_) => "oneOrMore",
            Exp::Mixed(_) => "mixed",
            Exp::Reference(_) => "ref",
        }
    }
}
