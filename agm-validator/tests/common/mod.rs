// Feeds real XML through the verifier.  Scanning and namespace resolution live outside the
// library, so tests bring their own minimal scanner on top of xmlparser.

#![allow(dead_code)]

use agm_model::QualifiedName;
use agm_validator::{Grammar, StartTag, ValidatorError, Verifier};
use xmlparser::{ElementEnd, Token, Tokenizer};

struct Pending<'a> {
    prefix: &'a str,
    local: &'a str,
    attrs: Vec<(&'a str, &'a str, &'a str)>,
}

type Scopes = Vec<Vec<(String, String)>>;

fn resolve(scopes: &Scopes, prefix: &str) -> String {
    scopes
        .iter()
        .rev()
        .flat_map(|scope| scope.iter())
        .find(|(p, _)| p == prefix)
        .map(|(_, uri)| uri.clone())
        .unwrap_or_default()
}

fn start(v: &mut Verifier, scopes: &mut Scopes, p: Pending) {
    let mut decls = Vec::new();
    let mut attrs = Vec::new();
    for (prefix, local, value) in &p.attrs {
        if *prefix == "xmlns" {
            decls.push((local.to_string(), value.to_string()));
        } else if prefix.is_empty() && *local == "xmlns" {
            decls.push((String::new(), value.to_string()));
        } else {
            attrs.push((*prefix, *local, *value));
        }
    }
    scopes.push(decls);

    let ns = resolve(scopes, p.prefix);
    // unprefixed attributes are in no namespace
    let attr_ns: Vec<String> = attrs
        .iter()
        .map(|(prefix, _, _)| {
            if prefix.is_empty() {
                String::new()
            } else {
                resolve(scopes, prefix)
            }
        })
        .collect();
    let mut tag = StartTag::new(QualifiedName::new(&ns, p.local));
    for ((_, local, value), ns) in attrs.iter().zip(&attr_ns) {
        tag = tag.attribute(QualifiedName::new(ns, local), value);
    }
    if let Some(scope) = scopes.last() {
        for (prefix, uri) in scope {
            tag = tag.namespace(prefix, uri);
        }
    }
    let _ = v.start_element(&tag);
}

/// Every error reported while validating `xml`.
pub fn validate(grammar: &Grammar, xml: &str) -> Vec<ValidatorError> {
    let mut v = grammar.verifier();
    let mut scopes = Scopes::new();
    let mut pending = None;
    for token in Tokenizer::from(xml) {
        match token.expect("test documents are well-formed") {
            Token::ElementStart { prefix, local, .. } => {
                pending = Some(Pending {
                    prefix: prefix.as_str(),
                    local: local.as_str(),
                    attrs: Vec::new(),
                })
            }
            Token::Attribute {
                prefix,
                local,
                value,
                ..
            } => {
                if let Some(p) = pending.as_mut() {
                    p.attrs.push((prefix.as_str(), local.as_str(), value.as_str()));
                }
            }
            Token::ElementEnd { end, .. } => match end {
                ElementEnd::Open => {
                    if let Some(p) = pending.take() {
                        start(&mut v, &mut scopes, p);
                    }
                }
                ElementEnd::Empty => {
                    if let Some(p) = pending.take() {
                        start(&mut v, &mut scopes, p);
                    }
                    let _ = v.end_element();
                    scopes.pop();
                }
                ElementEnd::Close(_, _) => {
                    let _ = v.end_element();
                    scopes.pop();
                }
            },
            Token::Text { text } => {
                if !scopes.is_empty() {
                    v.characters(text.as_str());
                }
            }
            Token::Cdata { text, .. } => v.characters(text.as_str()),
            _ => {}
        }
    }
    let _ = v.end_document();
    v.errors().to_vec()
}

pub fn valid(grammar: &Grammar, xml: &str) {
    let errors = validate(grammar, xml);
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
}

pub fn invalid(grammar: &Grammar, xml: &str) -> Vec<ValidatorError> {
    let errors = validate(grammar, xml);
    assert!(!errors.is_empty(), "document should have been rejected");
    errors
}
