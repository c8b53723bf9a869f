//! Human readable summaries of an acceptor state, for error messages.

use agm_model::{Exp, ExpId, ExpressionPool, NameClass};
use fnv::FnvHashSet;
use std::sync::Arc;

const MAX_ELEMENTS: usize = 4;

/// Element name classes that could appear next, e.g. `Element title author .. or one of 2
/// more`.  Empty when no element is acceptable.
pub fn describe_expected(pool: &ExpressionPool, exp: ExpId) -> String {
    let mut heads = Vec::new();
    let mut seen = FnvHashSet::default();
    element_heads(pool, exp, &mut heads, &mut seen);

    let mut result = String::new();
    let mut rest = 0;
    for (i, nameclass) in heads.iter().enumerate() {
        if i == 0 {
            result.push_str("Element ");
        }
        if i >= MAX_ELEMENTS {
            rest += 1;
        } else {
            if i > 0 {
                result.push(' ');
            }
            nameclass.describe(&mut result);
        }
    }
    if rest > 0 {
        result.push_str(&format!(" .. or one of {rest} more"))
    }
    result
}

fn element_heads(
    pool: &ExpressionPool,
    id: ExpId,
    result: &mut Vec<Arc<NameClass>>,
    seen: &mut FnvHashSet<ExpId>,
) {
    if !seen.insert(id) {
        return;
    }
    match pool.get(id) {
        Exp::Element(nc, _) => {
            if !result.contains(&nc) {
                result.push(nc);
            }
        }
        Exp::Choice(a, b) | Exp::Interleave(a, b) => {
            element_heads(pool, a, result, seen);
            element_heads(pool, b, result, seen);
        }
        Exp::Sequence(a, b) => {
            element_heads(pool, a, result, seen);
            if pool.is_epsilon_reducible(a) {
                element_heads(pool, b, result, seen);
            }
        }
        Exp::OneOrMore(a) | Exp::Mixed(a) => element_heads(pool, a, result, seen),
        Exp::Reference(r) => element_heads(pool, pool.target(r), result, seen),
        Exp::Epsilon
        | Exp::NullSet
        | Exp::AnyString
        | Exp::TypedString(_)
        | Exp::Attribute(_, _) => {}
    }
}

/// Renders the output of [`AttributePicker`](crate::AttributePicker) as `a | b`.
pub fn describe_attributes(pool: &ExpressionPool, picked: ExpId) -> String {
    let mut result = String::new();
    attribute_names(pool, picked, &mut result);
    result
}

fn attribute_names(pool: &ExpressionPool, id: ExpId, desc: &mut String) {
    match pool.get(id) {
        Exp::Attribute(nc, _) => {
            if !desc.is_empty() {
                desc.push_str(" | ");
            }
            nc.describe(desc);
        }
        Exp::Choice(a, b) => {
            attribute_names(pool, a, desc);
            attribute_names(pool, b, desc);
        }
        _ => {}
    }
}
