//! The abstract grammar model shared by RELAX, TREX and XML Schema content models.
//!
//! Grammars are graphs of [`Exp`] nodes interned in an [`ExpressionPool`].  Schema readers
//! build them through the pool's `create_*` methods; the validator only ever reads them and
//! derives new expressions from them.

pub mod datatype;
pub mod expr;
pub mod model;
pub mod pool;
pub mod restrictions;

pub use crate::datatype::{Datatype, DatatypeRef, Namespaces, NoNamespaces};
pub use crate::expr::{Exp, ExpId, RefId};
pub use crate::model::{NameClass, QualifiedName};
pub use crate::pool::{ExpressionPool, OptimizationTag, PoolOptions};
pub use crate::restrictions::{GrammarError, check_restrictions};
