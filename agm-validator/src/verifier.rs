//! Drives acceptors over a document's element tree.
//!
//! The scanner hands over already resolved events; the verifier keeps one acceptor per open
//! element, reports what went wrong and keeps going so that a single mistake yields a
//! single error.

use crate::acceptor::Acceptor;
use crate::describe::{describe_attributes, describe_expected};
use crate::picker::AttributePicker;
use agm_model::{
    ExpId, ExpressionPool, GrammarError, NameClass, Namespaces, QualifiedName, check_restrictions,
};
use log::{debug, warn};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidatorError {
    #[error("element {name} not expected here")]
    ElementNotAllowed { name: String, expected: String },
    #[error("attribute {name} not allowed on element {element}")]
    AttributeNotAllowed { element: String, name: String },
    #[error("element {element} is missing required attributes")]
    MissingAttributes { element: String, expected: String },
    #[error("text not allowed in element {element}")]
    TextNotAllowed { element: String, expected: String },
    #[error("content of {element} is incomplete")]
    IncompleteContent { element: String, expected: String },
    #[error("element {element} does not fit the content of {parent}")]
    ChildRejected { element: String, parent: String },
    #[error("end tag without a matching start tag")]
    UnexpectedEndTag,
    #[error("document ended with {0} element(s) still open")]
    UnclosedElements(usize),
}

impl ValidatorError {
    fn label(&self) -> &'static str {
        match self {
            ValidatorError::ElementNotAllowed { .. }
            | ValidatorError::AttributeNotAllowed { .. }
            | ValidatorError::TextNotAllowed { .. }
            | ValidatorError::UnexpectedEndTag => "Not allowed",
            ValidatorError::MissingAttributes { .. } => "Missing attributes",
            ValidatorError::IncompleteContent { .. } | ValidatorError::UnclosedElements(_) => {
                "Incomplete"
            }
            ValidatorError::ChildRejected { .. } => "Does not fit here",
        }
    }

    fn help(&self) -> Option<String> {
        match self {
            ValidatorError::ElementNotAllowed { expected, .. }
            | ValidatorError::TextNotAllowed { expected, .. } => Some(if expected.is_empty() {
                "Remove this".to_string()
            } else {
                format!("Expected {expected}")
            }),
            ValidatorError::AttributeNotAllowed { .. } | ValidatorError::UnexpectedEndTag => {
                Some("Remove this".to_string())
            }
            ValidatorError::MissingAttributes { expected, .. } => {
                if expected.is_empty() {
                    None
                } else {
                    Some(format!("Add attribute {expected}"))
                }
            }
            ValidatorError::IncompleteContent { expected, .. } => {
                if expected.is_empty() {
                    None
                } else {
                    Some(format!("Expected {expected}"))
                }
            }
            ValidatorError::ChildRejected { .. } | ValidatorError::UnclosedElements(_) => None,
        }
    }

    /// Renders this error, pointing at `span` when the caller knows where in the source the
    /// offending event came from.
    pub fn diagnostic(&self, span: Option<codemap::Span>) -> Vec<codemap_diagnostic::Diagnostic> {
        let spans = span
            .map(|span| codemap_diagnostic::SpanLabel {
                span,
                label: Some(self.label().to_string()),
                style: codemap_diagnostic::SpanStyle::Primary,
            })
            .into_iter()
            .collect();
        let mut diagnostics = vec![codemap_diagnostic::Diagnostic {
            level: codemap_diagnostic::Level::Error,
            message: format!("{self}"),
            code: None,
            spans,
        }];
        if let Some(message) = self.help() {
            diagnostics.push(codemap_diagnostic::Diagnostic {
                level: codemap_diagnostic::Level::Help,
                message,
                code: None,
                spans: vec![],
            });
        }
        diagnostics
    }
}

/// A checked grammar, ready to validate any number of documents, possibly concurrently.
pub struct Grammar {
    pool: ExpressionPool,
    start: ExpId,
    /// Accepts any attributes, text and elements; content of unexpected elements.
    any_content: ExpId,
}

impl Grammar {
    pub fn new(pool: ExpressionPool, start: ExpId) -> Result<Grammar, GrammarError> {
        check_restrictions(&pool, start)?;
        let any_content = pool.create_reference("any-content");
        let any_element = pool.create_element(NameClass::any_name(), any_content);
        let any_attribute = pool.create_attribute(NameClass::any_name(), ExpId::ANY_STRING);
        let content = pool.create_mixed(
            pool.create_zero_or_more(pool.create_choice(any_attribute, any_element)),
        );
        pool.define_reference(any_content, content);
        Ok(Grammar {
            pool,
            start,
            any_content,
        })
    }

    pub fn pool(&self) -> &ExpressionPool {
        &self.pool
    }

    pub fn start(&self) -> ExpId {
        self.start
    }

    pub fn verifier(&self) -> Verifier<'_> {
        Verifier::new(self)
    }
}

#[derive(Debug, Clone)]
pub struct Attr<'a> {
    pub name: QualifiedName<'a>,
    pub value: &'a str,
}

/// A start tag with its names already resolved against the in-scope namespaces.
#[derive(Debug, Clone)]
pub struct StartTag<'a> {
    pub name: QualifiedName<'a>,
    pub attributes: Vec<Attr<'a>>,
    /// `(prefix, uri)` declarations made on this tag; the default namespace has prefix `""`.
    pub namespaces: Vec<(&'a str, &'a str)>,
}

impl<'a> StartTag<'a> {
    pub fn new(name: QualifiedName<'a>) -> StartTag<'a> {
        StartTag {
            name,
            attributes: Vec::new(),
            namespaces: Vec::new(),
        }
    }

    pub fn attribute(mut self, name: QualifiedName<'a>, value: &'a str) -> StartTag<'a> {
        self.attributes.push(Attr { name, value });
        self
    }

    pub fn namespace(mut self, prefix: &'a str, uri: &'a str) -> StartTag<'a> {
        self.namespaces.push((prefix, uri));
        self
    }
}

#[derive(Default)]
struct NamespaceStack {
    decls: Vec<(String, String)>,
}

impl Namespaces for NamespaceStack {
    fn resolve(&self, prefix: &str) -> Option<&str> {
        self.decls
            .iter()
            .rev()
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.as_str())
    }
}

struct Frame<'g> {
    acceptor: Acceptor<'g>,
    name: String,
    /// An error was already reported for this element.  Incomplete content is then not
    /// reported again and the parent is stepped leniently.
    errored: bool,
    has_content: bool,
    namespaces: usize,
}

pub struct Verifier<'g> {
    grammar: &'g Grammar,
    document: Frame<'g>,
    frames: Vec<Frame<'g>>,
    namespaces: NamespaceStack,
    text: String,
    errors: Vec<ValidatorError>,
}

fn top<'a, 'g>(frames: &'a mut [Frame<'g>], document: &'a mut Frame<'g>) -> &'a mut Frame<'g> {
    match frames.last_mut() {
        Some(frame) => frame,
        None => document,
    }
}

impl<'g> Verifier<'g> {
    pub fn new(grammar: &'g Grammar) -> Verifier<'g> {
        Verifier {
            grammar,
            document: Frame {
                acceptor: Acceptor::new(&grammar.pool, grammar.start),
                name: "document".to_string(),
                errored: false,
                has_content: false,
                namespaces: 0,
            },
            frames: Vec::new(),
            namespaces: NamespaceStack::default(),
            text: String::new(),
            errors: Vec::new(),
        }
    }

    /// Every error reported so far.
    pub fn errors(&self) -> &[ValidatorError] {
        &self.errors
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// The first error raised by the event that started at `before`, if any; later ones
    /// are only recorded.
    fn outcome(&self, before: usize) -> Result<(), ValidatorError> {
        match self.errors.get(before) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    pub fn start_element(&mut self, tag: &StartTag) -> Result<(), ValidatorError> {
        let before = self.errors.len();
        self.flush_text(false);
        let grammar = self.grammar;
        let pool = &grammar.pool;
        let name = tag.name.to_string();
        for (prefix, uri) in &tag.namespaces {
            self.namespaces
                .decls
                .push((prefix.to_string(), uri.to_string()));
        }

        let parent = top(&mut self.frames, &mut self.document);
        parent.has_content = true;
        let mut errored = false;
        let mut child = match parent.acceptor.create_child_acceptor(&tag.name) {
            Some(child) => child,
            None => {
                warn!("unexpected element {name}, recovering with any content");
                self.errors.push(ValidatorError::ElementNotAllowed {
                    name: name.clone(),
                    expected: describe_expected(pool, parent.acceptor.expression()),
                });
                errored = true;
                Acceptor::recovery(pool, grammar.any_content)
            }
        };

        for attr in &tag.attributes {
            if !child.on_attribute(attr.name, attr.value, &self.namespaces) {
                debug!("attribute {} rejected on {name}", attr.name);
                self.errors.push(ValidatorError::AttributeNotAllowed {
                    element: name.clone(),
                    name: attr.name.to_string(),
                });
                errored = true;
            }
        }
        if !child.on_end_attributes() {
            // a rejected attribute usually is the missing one, misspelt
            if !errored {
                let picked = AttributePicker::new(pool).pick(child.expression());
                self.errors.push(ValidatorError::MissingAttributes {
                    element: name.clone(),
                    expected: describe_attributes(pool, picked),
                });
            }
            warn!("missing attributes on {name}, recovering");
            child.skip_missing_attributes();
            errored = true;
        }

        self.frames.push(Frame {
            acceptor: child,
            name,
            errored,
            has_content: false,
            namespaces: tag.namespaces.len(),
        });
        self.outcome(before)
    }

    /// Character data; consecutive calls are joined into one string token.
    pub fn characters(&mut self, text: &str) {
        self.text.push_str(text);
    }

    pub fn end_element(&mut self) -> Result<(), ValidatorError> {
        let before = self.errors.len();
        if self.frames.is_empty() {
            self.errors.push(ValidatorError::UnexpectedEndTag);
            return self.outcome(before);
        }
        self.flush_text(true);
        let Some(mut frame) = self.frames.pop() else {
            return self.outcome(before);
        };
        let remaining = self.namespaces.decls.len() - frame.namespaces;
        self.namespaces.decls.truncate(remaining);

        let grammar = self.grammar;
        let pool = &grammar.pool;
        if !frame.acceptor.is_accepting() && !frame.errored {
            self.errors.push(ValidatorError::IncompleteContent {
                element: frame.name.clone(),
                expected: describe_expected(pool, frame.acceptor.expression()),
            });
            frame.errored = true;
        }

        let parent = top(&mut self.frames, &mut self.document);
        if !parent.acceptor.step_forward_child(&frame.acceptor, frame.errored) {
            if !frame.errored {
                self.errors.push(ValidatorError::ChildRejected {
                    element: frame.name.clone(),
                    parent: parent.name.clone(),
                });
            }
            debug!("{} rejected by {}, retrying leniently", frame.name, parent.name);
            if !parent.acceptor.step_forward_child(&frame.acceptor, true) {
                let stray = Acceptor::recovery(pool, grammar.any_content);
                parent.acceptor.step_forward_child(&stray, true);
            }
            parent.errored = true;
        }
        self.outcome(before)
    }

    pub fn end_document(&mut self) -> Result<(), ValidatorError> {
        let before = self.errors.len();
        if !self.frames.is_empty() {
            self.errors
                .push(ValidatorError::UnclosedElements(self.frames.len()));
            return self.outcome(before);
        }
        self.flush_text(false);
        if !self.document.acceptor.is_accepting() {
            self.errors.push(ValidatorError::IncompleteContent {
                element: self.document.name.clone(),
                expected: describe_expected(
                    &self.grammar.pool,
                    self.document.acceptor.expression(),
                ),
            });
        }
        self.outcome(before)
    }

    /// Feeds buffered text to the innermost open element.  An element that is being closed
    /// without having seen any content gets the empty string, so that it is checked against
    /// datatypes too.
    fn flush_text(&mut self, closing: bool) {
        let frame = top(&mut self.frames, &mut self.document);
        if self.text.is_empty() && !(closing && !frame.has_content) {
            return;
        }
        frame.has_content = true;
        if !frame.acceptor.step_forward_text(&self.text, &self.namespaces) {
            debug!("text rejected in {}", frame.name);
            self.errors.push(ValidatorError::TextNotAllowed {
                element: frame.name.clone(),
                expected: describe_expected(&self.grammar.pool, frame.acceptor.expression()),
            });
            frame.errored = true;
        }
        self.text.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agm_model::datatype::PatternType;
    use agm_model::{DatatypeRef, Namespaces};
    use assert_matches::assert_matches;

    fn grammar() -> Grammar {
        // doc: element doc { attribute id?, element title { text }, element n { int }* }
        let pool = ExpressionPool::new();
        let int = DatatypeRef::new(PatternType::new("int", "[0-9]+").unwrap());
        let title = pool.create_element(NameClass::local("title"), ExpId::ANY_STRING);
        let n = pool.create_element(NameClass::local("n"), pool.create_typed_string(int));
        let id = pool.create_attribute(NameClass::local("id"), ExpId::ANY_STRING);
        let content = pool.create_sequence(
            pool.create_optional(id),
            pool.create_sequence(title, pool.create_zero_or_more(n)),
        );
        let doc = pool.create_element(NameClass::local("doc"), content);
        Grammar::new(pool, doc).unwrap()
    }

    fn tag(name: &str) -> StartTag<'_> {
        StartTag::new(QualifiedName::local(name))
    }

    #[test]
    fn valid_document() {
        let g = grammar();
        let mut v = g.verifier();
        assert_matches!(v.start_element(&tag("doc").attribute(QualifiedName::local("id"), "x")), Ok(()));
        assert_matches!(v.start_element(&tag("title")), Ok(()));
        v.characters("Hello ");
        v.characters("world");
        assert_matches!(v.end_element(), Ok(()));
        v.characters("\n  ");
        assert_matches!(v.start_element(&tag("n")), Ok(()));
        v.characters("42");
        assert_matches!(v.end_element(), Ok(()));
        assert_matches!(v.end_element(), Ok(()));
        assert_matches!(v.end_document(), Ok(()));
        assert_eq!(v.error_count(), 0);
    }

    #[test]
    fn empty_element_is_checked_against_datatype() {
        let g = grammar();
        let mut v = g.verifier();
        v.start_element(&tag("doc")).unwrap();
        v.start_element(&tag("title")).unwrap();
        v.end_element().unwrap();
        v.start_element(&tag("n")).unwrap();
        assert_matches!(
            v.end_element(),
            Err(ValidatorError::IncompleteContent { ref element, .. }) if element == "n"
        );
        // the parent is not blamed a second time
        assert_matches!(v.end_element(), Ok(()));
        assert_matches!(v.end_document(), Ok(()));
        assert_eq!(v.error_count(), 1);
    }

    #[test]
    fn unexpected_element_recovers() {
        let g = grammar();
        let mut v = g.verifier();
        v.start_element(&tag("doc")).unwrap();
        assert_matches!(
            v.start_element(&tag("bogus").attribute(QualifiedName::local("a"), "1")),
            Err(ValidatorError::ElementNotAllowed { ref name, ref expected })
                if name == "bogus" && expected == "Element title"
        );
        v.start_element(&tag("anything")).unwrap();
        v.characters("free text");
        v.end_element().unwrap();
        v.end_element().unwrap();
        // the stray element took the place of the title
        v.start_element(&tag("n")).unwrap();
        v.characters("1");
        v.end_element().unwrap();
        v.end_element().unwrap();
        v.end_document().unwrap();
        assert_eq!(v.error_count(), 1);
    }

    #[test]
    fn attribute_errors() {
        let g = grammar();
        let mut v = g.verifier();
        assert_matches!(
            v.start_element(&tag("doc").attribute(QualifiedName::local("nope"), "1")),
            Err(ValidatorError::AttributeNotAllowed { ref name, .. }) if name == "nope"
        );
        assert_eq!(v.error_count(), 1);
    }

    #[test]
    fn incomplete_content() {
        let g = grammar();
        let mut v = g.verifier();
        v.start_element(&tag("doc")).unwrap();
        assert_matches!(
            v.end_element(),
            Err(ValidatorError::IncompleteContent { ref element, ref expected })
                if element == "doc" && expected == "Element title"
        );
        assert_matches!(v.end_document(), Ok(()));
    }

    #[test]
    fn structural_errors() {
        let g = grammar();
        let mut v = g.verifier();
        assert_matches!(v.end_element(), Err(ValidatorError::UnexpectedEndTag));
        assert_matches!(
            v.end_document(),
            Err(ValidatorError::IncompleteContent { ref element, .. }) if element == "document"
        );
        let mut v = g.verifier();
        v.start_element(&tag("doc")).unwrap();
        assert_matches!(v.end_document(), Err(ValidatorError::UnclosedElements(1)));
    }

    #[test]
    fn namespace_scopes() {
        let mut stack = NamespaceStack::default();
        stack.decls.push(("a".to_string(), "urn:1".to_string()));
        stack.decls.push(("a".to_string(), "urn:2".to_string()));
        assert_eq!(stack.resolve("a"), Some("urn:2"));
        assert_eq!(stack.resolve("b"), None);
    }

    #[test]
    fn diagnostics() {
        let err = ValidatorError::ElementNotAllowed {
            name: "x".to_string(),
            expected: "Element a".to_string(),
        };
        let mut map = codemap::CodeMap::new();
        let file = map.add_file("doc.xml".to_string(), "<x/>".to_string());
        let diagnostics = err.diagnostic(Some(file.span));
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0].message, "element x not expected here");
        assert_eq!(diagnostics[0].spans.len(), 1);
        assert_eq!(diagnostics[1].message, "Expected Element a");

        let err = ValidatorError::ChildRejected {
            element: "x".to_string(),
            parent: "y".to_string(),
        };
        assert_eq!(err.diagnostic(None).len(), 1);
    }
}
