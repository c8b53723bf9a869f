//! Derivatives of grammar expressions with respect to a single token.
//!
//! See <https://relaxng.org/jclark/derivative.html> for the general approach.  Unlike the
//! RELAX NG algorithm there are no `after` patterns here: element content is validated by a
//! separate acceptor, and the parent only ever sees a finished element as one token.
//!
//! Interleave is derived here as well, as the choice of advancing either side, rather than
//! being tracked by the acceptor.  The accepted language is the same.

use crate::token::{StringToken, Token};
use agm_model::datatype::is_whitespace_str;
use agm_model::{DatatypeRef, Exp, ExpId, ExpressionPool, RefId};
use fnv::FnvHashMap;
use log::trace;

#[derive(Copy, Clone, Debug)]
pub struct ResidualCalculator<'p> {
    pool: &'p ExpressionPool,
}

impl<'p> ResidualCalculator<'p> {
    pub fn new(pool: &'p ExpressionPool) -> ResidualCalculator<'p> {
        ResidualCalculator { pool }
    }

    pub fn pool(&self) -> &'p ExpressionPool {
        self.pool
    }

    pub fn calc_residual(&self, exp: ExpId, token: &Token) -> ExpId {
        self.calc_residual_typed(exp, token, &mut None)
    }

    /// Like [`calc_residual`](Self::calc_residual), also reporting the datatype that
    /// accepted a string token.
    pub fn calc_residual_typed(
        &self,
        exp: ExpId,
        token: &Token,
        matched: &mut Option<DatatypeRef>,
    ) -> ExpId {
        // Only a token naming exactly one element declaration is worth memoizing; anything
        // wider would make the key space unbounded.
        if let Token::Element(element) = token {
            if let [candidate] = element.accepted() {
                if let Some(residual) = self.pool.cached_residual(exp, *candidate) {
                    trace!("residual cache hit for {} by {}", exp.index(), candidate.index());
                    return residual;
                }
                let residual = self.derive(exp, token, matched);
                self.pool.cache_residual(exp, *candidate, residual);
                return residual;
            }
        }
        self.derive(exp, token, matched)
    }

    fn derive(&self, exp: ExpId, token: &Token, matched: &mut Option<DatatypeRef>) -> ExpId {
        let mut visit = Residual {
            calc: self,
            token,
            memo: FnvHashMap::default(),
            visiting: Vec::new(),
            matched,
        };
        visit.residual(exp)
    }

    /// Whether `content`, the value pattern of an attribute, accepts `value`.
    fn value_matches(&self, content: ExpId, value: &StringToken) -> bool {
        if content == ExpId::ANY_STRING {
            return true;
        }
        if is_whitespace_str(value.literal) && self.pool.is_epsilon_reducible(content) {
            return true;
        }
        let token = Token::String(*value);
        let residual = self.derive(content, &token, &mut None);
        self.pool.is_epsilon_reducible(residual)
    }
}

struct Residual<'c, 'p, 't, 'a> {
    calc: &'c ResidualCalculator<'p>,
    token: &'t Token<'a>,
    memo: FnvHashMap<ExpId, ExpId>,
    visiting: Vec<RefId>,
    matched: &'t mut Option<DatatypeRef>,
}

impl Residual<'_, '_, '_, '_> {
    fn residual(&mut self, id: ExpId) -> ExpId {
        if let Some(&result) = self.memo.get(&id) {
            return result;
        }
        let pool = self.calc.pool;
        let result = match pool.get(id) {
            Exp::Epsilon | Exp::NullSet => ExpId::NULL_SET,
            // anyString is not reduced to epsilon, it stays around after consuming text
            Exp::AnyString => {
                if self.token.match_any_string() {
                    ExpId::ANY_STRING
                } else {
                    ExpId::NULL_SET
                }
            }
            Exp::TypedString(dt) => match self.token {
                Token::String(s) if dt.is_valid(s.literal, s.context) => {
                    *self.matched = Some(dt);
                    ExpId::EPSILON
                }
                _ => ExpId::NULL_SET,
            },
            Exp::Attribute(nc, content) => match self.token {
                Token::Attribute(att)
                    if nc.contains(&att.name) && self.calc.value_matches(content, &att.value) =>
                {
                    ExpId::EPSILON
                }
                _ => ExpId::NULL_SET,
            },
            Exp::Element(_, _) => match self.token {
                Token::Element(element) if element.accepts(id) => ExpId::EPSILON,
                Token::AnyElement => ExpId::EPSILON,
                _ => ExpId::NULL_SET,
            },
            Exp::Choice(a, b) => {
                let d1 = self.residual(a);
                let d2 = self.residual(b);
                pool.create_choice(d1, d2)
            }
            Exp::Sequence(a, b) => {
                let d1 = self.residual(a);
                let p = pool.create_sequence(d1, b);
                if pool.is_epsilon_reducible(a) {
                    let d2 = self.residual(b);
                    pool.create_choice(p, d2)
                } else {
                    p
                }
            }
            Exp::Interleave(a, b) => {
                let d1 = self.residual(a);
                let i1 = pool.create_interleave(d1, b);
                let d2 = self.residual(b);
                let i2 = pool.create_interleave(a, d2);
                pool.create_choice(i1, i2)
            }
            Exp::OneOrMore(a) => {
                let d = self.residual(a);
                pool.create_sequence(d, pool.create_zero_or_more(a))
            }
            Exp::Mixed(a) => {
                if self.token.match_any_string() {
                    id
                } else {
                    let d = self.residual(a);
                    pool.create_mixed(d)
                }
            }
            Exp::Reference(r) => {
                if self.visiting.contains(&r) {
                    panic!(
                        "reference {:?} recurses without consuming a token",
                        pool.reference_name(r)
                    );
                }
                self.visiting.push(r);
                let d = self.residual(pool.target(r));
                self.visiting.pop();
                d
            }
        };
        self.memo.insert(id, result);
        result
    }
}
