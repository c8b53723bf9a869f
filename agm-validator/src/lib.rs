//! Derivative-based validation of documents against grammars built with `agm-model`.
//!
//! Each token read from a document replaces the current expression with its residual, the
//! expression describing what may still follow.  An [`Acceptor`] holds that state for the
//! content of one element and a [`Verifier`] stacks acceptors to walk a whole document.

mod acceptor;
mod describe;
mod picker;
mod prune;
mod residual;
mod token;
mod verifier;

pub use crate::acceptor::{Acceptor, ComplexAcceptor, SimpleAcceptor};
pub use crate::describe::{describe_attributes, describe_expected};
pub use crate::picker::AttributePicker;
pub use crate::residual::ResidualCalculator;
pub use crate::token::{AttributeToken, ElementToken, StringToken, Token};
pub use crate::verifier::{Attr, Grammar, StartTag, ValidatorError, Verifier};
