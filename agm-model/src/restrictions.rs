//! Structural restrictions on a finished grammar.
//!
//! The pool happily builds any expression graph, but the derivative engine relies on a few
//! properties that only hold once every reference is defined.  This module checks them as a
//! post-construction pass, before the grammar is used for validation.

use crate::expr::{Exp, ExpId, RefId};
use crate::pool::ExpressionPool;
use fnv::FnvHashSet;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GrammarError {
    #[error("reference {0:?} is never defined")]
    UndefinedReference(String),
    #[error("{pattern} is not allowed inside {context}")]
    Restricted {
        pattern: &'static str,
        context: &'static str,
    },
    #[error("reference {0:?} refers to itself without an intervening element")]
    UnguardedRecursion(String),
}

fn restricted(pattern: &'static str, context: &'static str) -> GrammarError {
    GrammarError::Restricted { pattern, context }
}

/// Check all restrictions on the grammar reachable from `root`.
pub fn check_restrictions(pool: &ExpressionPool, root: ExpId) -> Result<(), GrammarError> {
    let mut seen = FnvHashSet::default();
    let mut pending = vec![root];
    let mut walked = FnvHashSet::default();
    // Element content is checked with a fresh context, so walk content models one at a
    // time instead of recursing through element boundaries.
    while let Some(content) = pending.pop() {
        let mut path = Vec::new();
        check_pattern(
            pool,
            content,
            &WalkContext::default(),
            &mut path,
            &mut seen,
            &mut |content| {
                if walked.insert(content) {
                    pending.push(content);
                }
            },
        )?;
    }
    Ok(())
}

/// Tracking which restriction-relevant contexts we are inside.
#[derive(Default, Clone)]
struct WalkContext {
    /// Inside an `attribute` pattern
    in_attribute: bool,
}

fn check_pattern(
    pool: &ExpressionPool,
    id: ExpId,
    ctx: &WalkContext,
    path: &mut Vec<RefId>,
    seen: &mut FnvHashSet<(RefId, bool)>,
    element_content: &mut dyn FnMut(ExpId),
) -> Result<(), GrammarError> {
    match pool.get(id) {
        Exp::Element(_, content) => {
            if ctx.in_attribute {
                return Err(restricted("element", "attribute"));
            }
            // Element creates a new context boundary, checked separately
            element_content(content);
            Ok(())
        }
        Exp::Attribute(_, content) => {
            if ctx.in_attribute {
                return Err(restricted("attribute", "attribute"));
            }
            let inner = WalkContext { in_attribute: true };
            check_pattern(pool, content, &inner, path, seen, element_content)
        }
        Exp::Choice(a, b) | Exp::Sequence(a, b) | Exp::Interleave(a, b) => {
            check_pattern(pool, a, ctx, path, seen, element_content)?;
            check_pattern(pool, b, ctx, path, seen, element_content)
        }
        Exp::OneOrMore(p) | Exp::Mixed(p) => {
            check_pattern(pool, p, ctx, path, seen, element_content)
        }
        Exp::Reference(r) => {
            if path.contains(&r) {
                return Err(GrammarError::UnguardedRecursion(pool.reference_name(r)));
            }
            let Some(target) = pool.reference_target(r) else {
                return Err(GrammarError::UndefinedReference(pool.reference_name(r)));
            };
            if !seen.insert((r, ctx.in_attribute)) {
                return Ok(());
            }
            path.push(r);
            let result = check_pattern(pool, target, ctx, path, seen, element_content);
            path.pop();
            result
        }
        Exp::Epsilon | Exp::NullSet | Exp::AnyString | Exp::TypedString(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NameClass;
    use assert_matches::assert_matches;

    #[test]
    fn recursion_through_element() {
        let pool = ExpressionPool::new();
        let r = pool.create_reference("r");
        let e = pool.create_element(NameClass::local("a"), pool.create_optional(r));
        pool.define_reference(r, e);
        assert_matches!(check_restrictions(&pool, r), Ok(()));
    }

    #[test]
    fn unguarded_recursion() {
        let pool = ExpressionPool::new();
        let r = pool.create_reference("r");
        let a = pool.create_element(NameClass::local("a"), ExpId::EPSILON);
        pool.define_reference(r, pool.create_choice(a, pool.create_sequence(r, a)));
        let root = pool.create_element(NameClass::local("root"), r);
        assert_matches!(
            check_restrictions(&pool, root),
            Err(GrammarError::UnguardedRecursion(name)) if name == "r"
        );
    }

    #[test]
    fn shared_reference_is_not_recursion() {
        let pool = ExpressionPool::new();
        let r = pool.create_reference("r");
        pool.define_reference(r, pool.create_element(NameClass::local("a"), ExpId::EPSILON));
        let both = pool.create_sequence(r, pool.create_one_or_more(r));
        assert_matches!(check_restrictions(&pool, both), Ok(()));
    }

    #[test]
    fn undefined_reference() {
        let pool = ExpressionPool::new();
        let r = pool.create_reference("nowhere");
        let root = pool.create_element(NameClass::local("root"), r);
        assert_matches!(
            check_restrictions(&pool, root),
            Err(GrammarError::UndefinedReference(name)) if name == "nowhere"
        );
    }

    #[test]
    fn attribute_in_attribute() {
        let pool = ExpressionPool::new();
        let inner = pool.create_attribute(NameClass::local("b"), ExpId::ANY_STRING);
        let outer = pool.create_attribute(NameClass::local("a"), inner);
        assert_eq!(
            check_restrictions(&pool, outer),
            Err(restricted("attribute", "attribute"))
        );
    }

    #[test]
    fn element_in_attribute() {
        let pool = ExpressionPool::new();
        let e = pool.create_element(NameClass::local("e"), ExpId::EPSILON);
        let att = pool.create_attribute(NameClass::local("a"), e);
        assert_eq!(
            check_restrictions(&pool, att),
            Err(restricted("element", "attribute"))
        );
    }
}
