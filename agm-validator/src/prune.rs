use agm_model::{Exp, ExpId, ExpressionPool, QualifiedName, RefId};
use fnv::{FnvHashMap, FnvHashSet};

/// Replaces every `Attribute` still pending in an expression.
///
/// Once a start tag's attributes have all been fed, any attribute left in the expression can
/// no longer be satisfied, so the strict form replaces them with `NullSet`.  Recovery uses
/// `Epsilon` instead, pretending the missing attributes were present.
pub(crate) struct AttributePruner<'p> {
    pool: &'p ExpressionPool,
    replacement: ExpId,
    memo: FnvHashMap<ExpId, ExpId>,
    visiting: Vec<RefId>,
}

impl<'p> AttributePruner<'p> {
    pub(crate) fn strict(pool: &'p ExpressionPool) -> AttributePruner<'p> {
        AttributePruner::new(pool, ExpId::NULL_SET)
    }

    pub(crate) fn lenient(pool: &'p ExpressionPool) -> AttributePruner<'p> {
        AttributePruner::new(pool, ExpId::EPSILON)
    }

    fn new(pool: &'p ExpressionPool, replacement: ExpId) -> AttributePruner<'p> {
        AttributePruner {
            pool,
            replacement,
            memo: FnvHashMap::default(),
            visiting: Vec::new(),
        }
    }

    pub(crate) fn prune(&mut self, id: ExpId) -> ExpId {
        if let Some(&result) = self.memo.get(&id) {
            return result;
        }
        let pool = self.pool;
        let result = match pool.get(id) {
            Exp::Attribute(_, _) => self.replacement,
            // attributes of child elements belong to the child's own start tag
            Exp::Element(_, _)
            | Exp::Epsilon
            | Exp::NullSet
            | Exp::AnyString
            | Exp::TypedString(_) => id,
            Exp::Choice(a, b) => {
                let (pa, pb) = (self.prune(a), self.prune(b));
                if (pa, pb) == (a, b) {
                    id
                } else {
                    pool.create_choice(pa, pb)
                }
            }
            Exp::Sequence(a, b) => {
                let (pa, pb) = (self.prune(a), self.prune(b));
                if (pa, pb) == (a, b) {
                    id
                } else {
                    pool.create_sequence(pa, pb)
                }
            }
            Exp::Interleave(a, b) => {
                let (pa, pb) = (self.prune(a), self.prune(b));
                if (pa, pb) == (a, b) {
                    id
                } else {
                    pool.create_interleave(pa, pb)
                }
            }
            Exp::OneOrMore(a) => {
                let pa = self.prune(a);
                if pa == a { id } else { pool.create_one_or_more(pa) }
            }
            Exp::Mixed(a) => {
                let pa = self.prune(a);
                if pa == a { id } else { pool.create_mixed(pa) }
            }
            Exp::Reference(r) => {
                if self.visiting.contains(&r) {
                    id
                } else {
                    self.visiting.push(r);
                    let target = pool.target(r);
                    let pruned = self.prune(target);
                    self.visiting.pop();
                    // keep the reference itself when nothing beneath it changed
                    if pruned == target { id } else { pruned }
                }
            }
        };
        self.memo.insert(id, result);
        result
    }
}

/// Finds the element declarations at the head of an expression whose name class accepts a
/// given name; these are the candidates a child start tag may be validated against.
pub(crate) fn elements_of_concern(
    pool: &ExpressionPool,
    exp: ExpId,
    name: &QualifiedName,
) -> Vec<ExpId> {
    let mut result = Vec::new();
    let mut seen = FnvHashSet::default();
    collect_elements(pool, exp, name, &mut result, &mut seen);
    result
}

fn collect_elements(
    pool: &ExpressionPool,
    id: ExpId,
    name: &QualifiedName,
    result: &mut Vec<ExpId>,
    seen: &mut FnvHashSet<ExpId>,
) {
    if !seen.insert(id) {
        return;
    }
    match pool.get(id) {
        Exp::Element(nc, _) => {
            if nc.contains(name) {
                result.push(id);
            }
        }
        Exp::Choice(a, b) | Exp::Interleave(a, b) => {
            collect_elements(pool, a, name, result, seen);
            collect_elements(pool, b, name, result, seen);
        }
        Exp::Sequence(a, b) => {
            collect_elements(pool, a, name, result, seen);
            if pool.is_epsilon_reducible(a) {
                collect_elements(pool, b, name, result, seen);
            }
        }
        Exp::OneOrMore(a) | Exp::Mixed(a) => collect_elements(pool, a, name, result, seen),
        Exp::Reference(r) => collect_elements(pool, pool.target(r), name, result, seen),
        Exp::Attribute(_, _)
        | Exp::Epsilon
        | Exp::NullSet
        | Exp::AnyString
        | Exp::TypedString(_) => {}
    }
}
