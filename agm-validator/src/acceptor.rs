//! Acceptors track "what remains acceptable" while the content of one element is read.
//!
//! A [`SimpleAcceptor`] follows a single expression.  When a start tag matches several
//! element declarations at once, their content models are validated concurrently by a
//! [`ComplexAcceptor`], one slot per candidate, so that the parent can later be told exactly
//! which of the candidates were satisfied.

use crate::prune::{AttributePruner, elements_of_concern};
use crate::residual::ResidualCalculator;
use crate::token::{AttributeToken, ElementToken, StringToken, Token};
use agm_model::{DatatypeRef, Exp, ExpId, ExpressionPool, Namespaces, QualifiedName};
use log::{debug, trace};

#[derive(Debug)]
pub struct SimpleAcceptor<'p> {
    calc: ResidualCalculator<'p>,
    expression: ExpId,
    /// The element declaration whose content this is; `None` at the document level and while
    /// recovering from an unexpected element.
    owner: Option<ExpId>,
}

impl SimpleAcceptor<'_> {
    pub fn owner(&self) -> Option<ExpId> {
        self.owner
    }
}

#[derive(Debug)]
pub struct ComplexAcceptor<'p> {
    calc: ResidualCalculator<'p>,
    /// Choice of all `contents`, used to decide whether a token is acceptable at all.
    expression: ExpId,
    owners: Vec<ExpId>,
    contents: Vec<ExpId>,
}

impl ComplexAcceptor<'_> {
    /// Every candidate element declaration, satisfied or not.
    pub fn owners(&self) -> &[ExpId] {
        &self.owners
    }

    pub fn contents(&self) -> &[ExpId] {
        &self.contents
    }

    /// The candidates whose content model accepts the input read so far.
    pub fn satisfied_owners(&self) -> Vec<ExpId> {
        let pool = self.calc.pool();
        self.owners
            .iter()
            .zip(&self.contents)
            .filter(|(_, content)| pool.is_epsilon_reducible(**content))
            .map(|(owner, _)| *owner)
            .collect()
    }
}

#[derive(Debug)]
pub enum Acceptor<'p> {
    Simple(SimpleAcceptor<'p>),
    Complex(ComplexAcceptor<'p>),
}

impl<'p> Acceptor<'p> {
    /// An acceptor for `expression` with no owning element, e.g. for a whole document.
    pub fn new(pool: &'p ExpressionPool, expression: ExpId) -> Acceptor<'p> {
        Acceptor::Simple(SimpleAcceptor {
            calc: ResidualCalculator::new(pool),
            expression,
            owner: None,
        })
    }

    /// An owner-less acceptor standing in for an element the grammar did not expect.  The
    /// parent is later advanced with an any-element token on its behalf.
    pub fn recovery(pool: &'p ExpressionPool, expression: ExpId) -> Acceptor<'p> {
        Acceptor::new(pool, expression)
    }

    fn calc(&self) -> ResidualCalculator<'p> {
        match self {
            Acceptor::Simple(s) => s.calc,
            Acceptor::Complex(c) => c.calc,
        }
    }

    pub fn pool(&self) -> &'p ExpressionPool {
        self.calc().pool()
    }

    /// The current state; after a rejected step, the state from before that step.
    pub fn expression(&self) -> ExpId {
        match self {
            Acceptor::Simple(s) => s.expression,
            Acceptor::Complex(c) => c.expression,
        }
    }

    pub fn is_accepting(&self) -> bool {
        self.pool().is_epsilon_reducible(self.expression())
    }

    /// Advances by a token already known to be acceptable.  An ignorable token may also be
    /// skipped, so the state from before it stays a live alternative.
    fn advance(&mut self, residual: ExpId, token: &Token) {
        let keep = token.is_ignorable();
        match self {
            Acceptor::Simple(s) => {
                s.expression = if keep {
                    s.calc.pool().create_choice(s.expression, residual)
                } else {
                    residual
                };
            }
            Acceptor::Complex(c) => {
                let pool = c.calc.pool();
                c.expression = if keep {
                    pool.create_choice(c.expression, residual)
                } else {
                    residual
                };
                // some slots may die here, but at least one stays alive
                for content in c.contents.iter_mut() {
                    let next = c.calc.calc_residual(*content, token);
                    *content = if keep {
                        pool.create_choice(*content, next)
                    } else {
                        next
                    };
                }
            }
        }
    }

    fn step(&mut self, token: &Token, matched: &mut Option<DatatypeRef>) -> bool {
        let residual = self
            .calc()
            .calc_residual_typed(self.expression(), token, matched);
        if residual == ExpId::NULL_SET {
            if token.is_ignorable() {
                trace!("ignoring whitespace not allowed by {}", self.expression().index());
                return true;
            }
            debug!("token rejected by {}", self.expression().index());
            return false;
        }
        self.advance(residual, token);
        true
    }

    pub fn step_forward_text(&mut self, literal: &str, context: &dyn Namespaces) -> bool {
        self.step_forward_text_typed(literal, context, &mut None)
    }

    /// Consumes character data; `matched` receives the datatype that accepted it, if any.
    pub fn step_forward_text_typed(
        &mut self,
        literal: &str,
        context: &dyn Namespaces,
        matched: &mut Option<DatatypeRef>,
    ) -> bool {
        let token = Token::String(StringToken::new(literal, context));
        let mut found = None;
        if !self.step(&token, &mut found) {
            return false;
        }
        *matched = found;
        true
    }

    pub fn on_attribute(
        &mut self,
        name: QualifiedName,
        value: &str,
        context: &dyn Namespaces,
    ) -> bool {
        let token = Token::Attribute(AttributeToken {
            name,
            value: StringToken::new(value, context),
        });
        self.step(&token, &mut None)
    }

    /// Marks the end of the start tag: attributes still pending can no longer appear.
    ///
    /// Fails, keeping the current state, when some attribute was required; the state can then
    /// be handed to [`AttributePicker`](crate::AttributePicker) to describe what is missing.
    pub fn on_end_attributes(&mut self) -> bool {
        let pool = self.pool();
        let mut pruner = AttributePruner::strict(pool);
        let pruned = pruner.prune(self.expression());
        if pruned == ExpId::NULL_SET {
            debug!("required attributes missing in {}", self.expression().index());
            return false;
        }
        self.set_pruned(pruned, &mut pruner);
        true
    }

    /// Drops any pending attributes as if they had been supplied.
    pub fn skip_missing_attributes(&mut self) {
        let mut pruner = AttributePruner::lenient(self.pool());
        let pruned = pruner.prune(self.expression());
        self.set_pruned(pruned, &mut pruner);
    }

    fn set_pruned(&mut self, pruned: ExpId, pruner: &mut AttributePruner) {
        match self {
            Acceptor::Simple(s) => s.expression = pruned,
            Acceptor::Complex(c) => {
                c.expression = pruned;
                for content in c.contents.iter_mut() {
                    *content = pruner.prune(*content);
                }
            }
        }
    }

    /// Creates the acceptor for a child element's content, or `None` if no element with this
    /// name is acceptable here.
    pub fn create_child_acceptor(&self, name: &QualifiedName) -> Option<Acceptor<'p>> {
        let calc = self.calc();
        let pool = calc.pool();
        let mut owners = elements_of_concern(pool, self.expression(), name);
        let content_of = |element: ExpId| match pool.get(element) {
            Exp::Element(_, content) => content,
            other => unreachable!("element of concern is {}", other.kind()),
        };
        match owners.len() {
            0 => None,
            1 => {
                let owner = owners.remove(0);
                Some(Acceptor::Simple(SimpleAcceptor {
                    calc,
                    expression: content_of(owner),
                    owner: Some(owner),
                }))
            }
            _ => {
                let contents: Vec<ExpId> = owners.iter().map(|o| content_of(*o)).collect();
                let expression = contents
                    .iter()
                    .fold(ExpId::NULL_SET, |acc, c| pool.create_choice(acc, *c));
                trace!("{} candidates for element {}", owners.len(), name);
                Some(Acceptor::Complex(ComplexAcceptor {
                    calc,
                    expression,
                    owners,
                    contents,
                }))
            }
        }
    }

    /// Advances past a child element whose content `child` has finished validating.
    ///
    /// Normally the child is represented by the element declarations it actually satisfied.
    /// With `recovering` set (an error was already reported inside the child) every
    /// candidate counts as satisfied instead, so one mistake does not cascade into spurious
    /// rejections further up.  This is best-effort: it can hide a genuine mismatch in the
    /// parent that would otherwise have been reported.
    pub fn step_forward_child(&mut self, child: &Acceptor, recovering: bool) -> bool {
        let token = match child {
            Acceptor::Simple(s) => match s.owner {
                None => Token::AnyElement,
                Some(owner) => Token::Element(ElementToken::new(vec![owner])),
            },
            Acceptor::Complex(c) => {
                if recovering {
                    Token::Element(ElementToken::new(c.owners.clone()))
                } else {
                    Token::Element(ElementToken::new(c.satisfied_owners()))
                }
            }
        };
        self.step(&token, &mut None)
    }
}
