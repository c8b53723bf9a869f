use crate::datatype::DatatypeRef;
use crate::expr::{Exp, ExpId, RefId};
use crate::model::NameClass;
use fnv::{FnvHashMap, FnvHashSet};
use log::trace;
use parking_lot::RwLock;
use std::io;
use std::sync::Arc;

/// Guard against exponential blowup in interleave/choice derivatives.  Grammars that blow up
/// would otherwise hang forever; this gives a clean failure instead.
pub const DEFAULT_COMPLEXITY_LIMIT: usize = 0x0fff_ffff;

#[derive(Clone, Debug)]
pub struct PoolOptions {
    /// Number of interned expressions after which the pool gives up.
    pub complexity_limit: usize,
    /// Memoize residuals of single-candidate element tokens per expression.
    pub cache_element_residuals: bool,
}

impl Default for PoolOptions {
    fn default() -> Self {
        PoolOptions {
            complexity_limit: DEFAULT_COMPLEXITY_LIMIT,
            cache_element_residuals: true,
        }
    }
}

/// Per-expression memo of residuals by a concrete element declaration.
#[derive(Default, Debug)]
pub struct OptimizationTag {
    simple_element_token_residual: FnvHashMap<ExpId, ExpId>,
}

#[derive(Debug)]
struct ReferenceDef {
    name: String,
    target: Option<ExpId>,
}

#[derive(Default, Debug)]
struct Inner {
    memo: FnvHashMap<Exp, ExpId>,
    exps: Vec<Exp>,
}

/// Hash-consing factory for grammar expressions.
///
/// Every `create_*` method takes already pooled children and returns a pooled result, so
/// structurally identical expressions always share one handle.  The pool is append-only:
/// nodes are never changed once interned, and each side table sits behind its own lock that
/// is held only for a single lookup or insert.  One pool may therefore serve any number of
/// concurrent validation sessions.
#[derive(Debug)]
pub struct ExpressionPool {
    inner: RwLock<Inner>,
    refs: RwLock<Vec<ReferenceDef>>,
    nullable: RwLock<FnvHashMap<ExpId, bool>>,
    tags: RwLock<FnvHashMap<ExpId, OptimizationTag>>,
    options: PoolOptions,
}

impl Default for ExpressionPool {
    fn default() -> Self {
        ExpressionPool::with_options(PoolOptions::default())
    }
}

impl ExpressionPool {
    pub fn new() -> ExpressionPool {
        ExpressionPool::default()
    }

    pub fn with_options(options: PoolOptions) -> ExpressionPool {
        let pool = ExpressionPool {
            inner: RwLock::new(Inner::default()),
            refs: RwLock::new(Vec::new()),
            nullable: RwLock::new(FnvHashMap::default()),
            tags: RwLock::new(FnvHashMap::default()),
            options,
        };
        let eps = pool.push(Exp::Epsilon);
        let null = pool.push(Exp::NullSet);
        let any = pool.push(Exp::AnyString);
        debug_assert_eq!(
            (eps, null, any),
            (ExpId::EPSILON, ExpId::NULL_SET, ExpId::ANY_STRING)
        );
        pool
    }

    pub fn options(&self) -> &PoolOptions {
        &self.options
    }

    /// Number of distinct expressions interned so far.
    pub fn len(&self) -> usize {
        self.inner.read().exps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: ExpId) -> Exp {
        self.inner.read().exps[id.0 as usize].clone()
    }

    fn push(&self, exp: Exp) -> ExpId {
        let existing = self.inner.read().memo.get(&exp).copied();
        if let Some(id) = existing {
            return id;
        }
        let mut inner = self.inner.write();
        // another session may have interned the same node since we looked
        if let Some(id) = inner.memo.get(&exp) {
            return *id;
        }
        if inner.exps.len() > self.options.complexity_limit {
            panic!(
                "Grammar derivative complexity limit exceeded (expression count > {})",
                self.options.complexity_limit
            )
        }
        let id = ExpId(inner.exps.len() as u32);
        inner.memo.insert(exp.clone(), id);
        inner.exps.push(exp);
        id
    }

    pub fn create_choice(&self, left: ExpId, right: ExpId) -> ExpId {
        if left == ExpId::NULL_SET {
            return right;
        }
        if right == ExpId::NULL_SET {
            return left;
        }
        if left == right {
            return left;
        }
        // Drop right-hand leaves that already occur on the left, so that choices built up
        // during derivation stay linear in the number of distinct alternatives.
        let mut left_leaves = FnvHashSet::default();
        self.collect_choice_leaves(left, &mut left_leaves);
        match self.filter_choice(right, &left_leaves) {
            None => left,
            Some(filtered_right) => self.push(Exp::Choice(left, filtered_right)),
        }
    }

    fn collect_choice_leaves(&self, id: ExpId, leaves: &mut FnvHashSet<ExpId>) {
        let inner = self.inner.read();
        Self::collect_leaves_inner(&inner.exps, id, leaves);
    }

    fn collect_leaves_inner(exps: &[Exp], id: ExpId, leaves: &mut FnvHashSet<ExpId>) {
        match &exps[id.0 as usize] {
            Exp::Choice(l, r) => {
                Self::collect_leaves_inner(exps, *l, leaves);
                Self::collect_leaves_inner(exps, *r, leaves);
            }
            _ => {
                leaves.insert(id);
            }
        }
    }

    /// Rebuilds a choice tree without the leaves in `exclude`; `None` if nothing is left.
    fn filter_choice(&self, id: ExpId, exclude: &FnvHashSet<ExpId>) -> Option<ExpId> {
        if exclude.contains(&id) {
            return None;
        }
        match self.get(id) {
            Exp::Choice(l, r) => {
                let fl = self.filter_choice(l, exclude);
                let fr = self.filter_choice(r, exclude);
                match (fl, fr) {
                    (None, None) => None,
                    (Some(kept), None) | (None, Some(kept)) => Some(kept),
                    (Some(fl), Some(fr)) => Some(self.push(Exp::Choice(fl, fr))),
                }
            }
            _ => Some(id),
        }
    }

    pub fn create_sequence(&self, left: ExpId, right: ExpId) -> ExpId {
        if left == ExpId::NULL_SET || right == ExpId::NULL_SET {
            return ExpId::NULL_SET;
        }
        if left == ExpId::EPSILON {
            return right;
        }
        if right == ExpId::EPSILON {
            return left;
        }
        self.push(Exp::Sequence(left, right))
    }

    pub fn create_interleave(&self, left: ExpId, right: ExpId) -> ExpId {
        if left == ExpId::NULL_SET || right == ExpId::NULL_SET {
            return ExpId::NULL_SET;
        }
        if left == ExpId::EPSILON {
            return right;
        }
        if right == ExpId::EPSILON {
            return left;
        }
        self.push(Exp::Interleave(left, right))
    }

    pub fn create_one_or_more(&self, exp: ExpId) -> ExpId {
        if exp == ExpId::NULL_SET || exp == ExpId::EPSILON {
            return exp;
        }
        if let Exp::OneOrMore(_) = self.get(exp) {
            return exp;
        }
        self.push(Exp::OneOrMore(exp))
    }

    pub fn create_zero_or_more(&self, exp: ExpId) -> ExpId {
        self.create_choice(self.create_one_or_more(exp), ExpId::EPSILON)
    }

    pub fn create_optional(&self, exp: ExpId) -> ExpId {
        self.create_choice(exp, ExpId::EPSILON)
    }

    pub fn create_mixed(&self, exp: ExpId) -> ExpId {
        if exp == ExpId::NULL_SET {
            return exp;
        }
        if exp == ExpId::EPSILON {
            return ExpId::ANY_STRING;
        }
        if let Exp::Mixed(_) = self.get(exp) {
            return exp;
        }
        self.push(Exp::Mixed(exp))
    }

    pub fn create_attribute(&self, name: NameClass, content: ExpId) -> ExpId {
        self.push(Exp::Attribute(Arc::new(name), content))
    }

    pub fn create_element(&self, name: NameClass, content: ExpId) -> ExpId {
        self.push(Exp::Element(Arc::new(name), content))
    }

    pub fn create_typed_string(&self, datatype: DatatypeRef) -> ExpId {
        self.push(Exp::TypedString(datatype))
    }

    /// Creates a fresh, unresolved reference.  References are never shared between calls,
    /// even when the names coincide.
    pub fn create_reference(&self, name: &str) -> ExpId {
        let id = {
            let mut refs = self.refs.write();
            refs.push(ReferenceDef {
                name: name.to_string(),
                target: None,
            });
            RefId((refs.len() - 1) as u32)
        };
        self.push(Exp::Reference(id))
    }

    /// Points a reference created by [`create_reference`](Self::create_reference) at its
    /// definition.
    pub fn define_reference(&self, reference: ExpId, target: ExpId) {
        let Exp::Reference(r) = self.get(reference) else {
            panic!(
                "expected a reference but got {:?} with id {}",
                self.get(reference),
                reference.0
            );
        };
        let mut refs = self.refs.write();
        let def = &mut refs[r.0 as usize];
        match def.target {
            None => {
                trace!("resolved reference {:?} to {}", def.name, target.0);
                def.target = Some(target);
            }
            Some(existing) if existing == target => {}
            Some(existing) => panic!(
                "reference {:?} is already defined as {}, can't redefine it as {}",
                def.name, existing.0, target.0
            ),
        }
    }

    pub fn reference_name(&self, reference: RefId) -> String {
        self.refs.read()[reference.0 as usize].name.clone()
    }

    pub fn reference_target(&self, reference: RefId) -> Option<ExpId> {
        self.refs.read()[reference.0 as usize].target
    }

    /// The definition of a reference; an undefined reference is a fault in whoever built the
    /// grammar.
    pub fn target(&self, reference: RefId) -> ExpId {
        let refs = self.refs.read();
        let def = &refs[reference.0 as usize];
        match def.target {
            Some(target) => target,
            None => panic!("Somehow definition for {:?} is missing", def.name),
        }
    }

    /// Whether the expression matches the empty sequence of tokens.
    pub fn is_epsilon_reducible(&self, id: ExpId) -> bool {
        let cached = self.nullable.read().get(&id).copied();
        if let Some(v) = cached {
            return v;
        }
        let mut visiting = Vec::new();
        self.nullable_memo(id, &mut visiting).0
    }

    // Recursion through references is resolved as a least fixed point: a reference that is
    // re-entered counts as not nullable for now.  A `false` that depended on such a guess is
    // only final once the outermost reference involved has been fully evaluated, so the
    // second element of the result is the shallowest `visiting` index it depended on.
    fn nullable_memo(&self, id: ExpId, visiting: &mut Vec<RefId>) -> (bool, Option<usize>) {
        let cached = self.nullable.read().get(&id).copied();
        if let Some(v) = cached {
            return (v, None);
        }
        let (value, provisional) = match self.get(id) {
            Exp::Epsilon | Exp::AnyString => (true, None),
            Exp::NullSet | Exp::TypedString(_) | Exp::Attribute(_, _) | Exp::Element(_, _) => {
                (false, None)
            }
            Exp::Choice(a, b) => match self.nullable_memo(a, visiting) {
                (true, _) => (true, None),
                (false, pa) => match self.nullable_memo(b, visiting) {
                    (true, _) => (true, None),
                    (false, pb) => (false, min_depth(pa, pb)),
                },
            },
            Exp::Sequence(a, b) | Exp::Interleave(a, b) => match self.nullable_memo(a, visiting) {
                (false, pa) => (false, pa),
                (true, _) => self.nullable_memo(b, visiting),
            },
            Exp::OneOrMore(a) | Exp::Mixed(a) => self.nullable_memo(a, visiting),
            Exp::Reference(r) => {
                if let Some(depth) = visiting.iter().position(|v| *v == r) {
                    return (false, Some(depth));
                }
                let depth = visiting.len();
                visiting.push(r);
                let (value, provisional) = self.nullable_memo(self.target(r), visiting);
                visiting.pop();
                match provisional {
                    Some(p) if p < depth => (value, Some(p)),
                    _ => (value, None),
                }
            }
        };
        if provisional.is_none() {
            self.nullable.write().insert(id, value);
        }
        (value, provisional)
    }

    pub fn cached_residual(&self, exp: ExpId, element: ExpId) -> Option<ExpId> {
        if !self.options.cache_element_residuals {
            return None;
        }
        self.tags
            .read()
            .get(&exp)
            .and_then(|tag| tag.simple_element_token_residual.get(&element))
            .copied()
    }

    pub fn cache_residual(&self, exp: ExpId, element: ExpId, residual: ExpId) {
        if !self.options.cache_element_residuals {
            return;
        }
        self.tags
            .write()
            .entry(exp)
            .or_default()
            .simple_element_token_residual
            .insert(element, residual);
    }

    #[allow(unused)]
    pub fn d(&self, exp: ExpId) -> Result<(), io::Error> {
        let mut o = io::stdout();
        self.dump(exp, &mut o)
    }

    /// Writes the expression graph rooted at `exp`, one node per line.  Nodes already
    /// printed are marked with `!` instead of being expanded again.
    pub fn dump<W: io::Write>(&self, exp: ExpId, w: &mut W) -> Result<(), io::Error> {
        let mut seen = FnvHashSet::default();
        self.dump_inner(0, exp, w, &mut seen)
    }

    fn dump_inner<W: io::Write>(
        &self,
        depth: usize,
        id: ExpId,
        w: &mut W,
        seen: &mut FnvHashSet<ExpId>,
    ) -> Result<(), io::Error> {
        indent(w, depth)?;
        let exp = self.get(id);
        if !seen.insert(id) {
            return writeln!(w, "{}{}!", exp.kind(), id.0);
        }
        match &exp {
            Exp::Epsilon | Exp::NullSet | Exp::AnyString => writeln!(w, "{}{}", exp.kind(), id.0),
            Exp::TypedString(dt) => writeln!(w, "{}{}({})", exp.kind(), id.0, dt.name()),
            Exp::Reference(r) => {
                let name = self.reference_name(*r);
                match self.reference_target(*r) {
                    Some(target) => {
                        writeln!(w, "ref{}({})->", id.0, name)?;
                        self.dump_inner(depth + 1, target, w, seen)
                    }
                    None => writeln!(w, "ref{}({})?", id.0, name),
                }
            }
            Exp::Attribute(nc, p) | Exp::Element(nc, p) => {
                let mut desc = String::new();
                nc.describe(&mut desc);
                writeln!(w, "{}{}({}=", exp.kind(), id.0, desc)?;
                self.dump_inner(depth + 1, *p, w, seen)?;
                indent(w, depth)?;
                writeln!(w, ")")
            }
            Exp::Choice(p1, p2) | Exp::Sequence(p1, p2) | Exp::Interleave(p1, p2) => {
                writeln!(w, "{}{}(", exp.kind(), id.0)?;
                self.dump_inner(depth + 1, *p1, w, seen)?;
                self.dump_inner(depth + 1, *p2, w, seen)?;
                indent(w, depth)?;
                writeln!(w, ")")
            }
            Exp::OneOrMore(p) | Exp::Mixed(p) => {
                writeln!(w, "{}{}(", exp.kind(), id.0)?;
                self.dump_inner(depth + 1, *p, w, seen)?;
                indent(w, depth)?;
                writeln!(w, ")")
            }
        }
    }
}

fn indent<W: io::Write>(w: &mut W, depth: usize) -> Result<(), io::Error> {
    for _ in 0..depth {
        w.write_all(b"  ")?;
    }
    Ok(())
}

fn min_depth(a: Option<usize>, b: Option<usize>) -> Option<usize> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, None) => a,
        (None, b) => b,
    }
}
