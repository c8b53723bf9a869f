use agm_model::{Exp, ExpId, ExpressionPool, RefId};
use fnv::FnvHashMap;

/// Reduces an expression to the attributes that are still required by it.
///
/// The result consists of `Choice` and `Attribute` nodes only, or is `Epsilon` when nothing
/// is required.  For example `(a | b), c?` picks `a | b`, and `a?` picks nothing.  Only used
/// to describe what is missing after a start tag has been rejected.
pub struct AttributePicker<'p> {
    pool: &'p ExpressionPool,
    memo: FnvHashMap<ExpId, ExpId>,
    visiting: Vec<RefId>,
}

impl<'p> AttributePicker<'p> {
    pub fn new(pool: &'p ExpressionPool) -> AttributePicker<'p> {
        AttributePicker {
            pool,
            memo: FnvHashMap::default(),
            visiting: Vec::new(),
        }
    }

    /// Panics if given `NullSet`; a state that can never be satisfied has no required
    /// attributes to speak of.
    pub fn pick(&mut self, id: ExpId) -> ExpId {
        if let Some(&result) = self.memo.get(&id) {
            return result;
        }
        let pool = self.pool;
        let result = match pool.get(id) {
            Exp::NullSet => panic!("attributes picked from NullSet"),
            Exp::Epsilon | Exp::AnyString | Exp::TypedString(_) | Exp::Element(_, _) => {
                ExpId::EPSILON
            }
            Exp::Attribute(_, _) => id,
            // a single occurrence is enough to describe the requirement
            Exp::OneOrMore(a) | Exp::Mixed(a) => self.pick(a),
            Exp::Sequence(a, b) | Exp::Interleave(a, b) => {
                let p1 = self.pick(a);
                let p2 = self.pick(b);
                if !pool.is_epsilon_reducible(p1) {
                    p1
                } else if !pool.is_epsilon_reducible(p2) {
                    p2
                } else {
                    ExpId::EPSILON
                }
            }
            Exp::Choice(a, b) => {
                let p1 = self.pick(a);
                let p2 = self.pick(b);
                if pool.is_epsilon_reducible(p1) || pool.is_epsilon_reducible(p2) {
                    ExpId::EPSILON
                } else {
                    pool.create_choice(p1, p2)
                }
            }
            Exp::Reference(r) => {
                if self.visiting.contains(&r) {
                    return ExpId::EPSILON;
                }
                self.visiting.push(r);
                let picked = self.pick(pool.target(r));
                self.visiting.pop();
                picked
            }
        };
        self.memo.insert(id, result);
        result
    }
}
