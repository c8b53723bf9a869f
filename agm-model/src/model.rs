use std::fmt;

/// A namespace-qualified name, already resolved by whoever scanned the document.
///
/// The empty string stands for "no namespace".
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct QualifiedName<'a> {
    pub namespace_uri: &'a str,
    pub local_name: &'a str,
}

impl<'a> QualifiedName<'a> {
    pub fn new(namespace_uri: &'a str, local_name: &'a str) -> QualifiedName<'a> {
        QualifiedName {
            namespace_uri,
            local_name,
        }
    }

    /// A name in no namespace.
    pub fn local(local_name: &'a str) -> QualifiedName<'a> {
        QualifiedName {
            namespace_uri: "",
            local_name,
        }
    }
}

impl fmt::Display for QualifiedName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace_uri.is_empty() {
            f.write_str(self.local_name)
        } else {
            write!(f, "{{{}}}{}", self.namespace_uri, self.local_name)
        }
    }
}

/// Predicate over element and attribute names.
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub enum NameClass {
    Named {
        namespace_uri: String,
        name: String,
    },
    NsName {
        namespace_uri: String,
        except: Option<Box<NameClass>>,
    },
    AnyName {
        except: Option<Box<NameClass>>,
    },
    Alt {
        a: Box<NameClass>,
        b: Box<NameClass>,
    },
}

impl NameClass {
    pub fn named(namespace_uri: &str, name: &str) -> NameClass {
        NameClass::Named {
            namespace_uri: namespace_uri.to_string(),
            name: name.to_string(),
        }
    }

    pub fn local(name: &str) -> NameClass {
        NameClass::named("", name)
    }

    pub fn any_name() -> NameClass {
        NameClass::AnyName { except: None }
    }

    pub fn ns_name(namespace_uri: &str) -> NameClass {
        NameClass::NsName {
            namespace_uri: namespace_uri.to_string(),
            except: None,
        }
    }

    pub fn alt(a: NameClass, b: NameClass) -> NameClass {
        NameClass::Alt {
            a: Box::new(a),
            b: Box::new(b),
        }
    }

    pub fn contains(&self, target: &QualifiedName) -> bool {
        match self {
            NameClass::Named {
                namespace_uri,
                name,
            } => target.namespace_uri == namespace_uri && target.local_name == name,
            NameClass::NsName {
                namespace_uri,
                except,
            } => {
                target.namespace_uri == namespace_uri
                    && except.as_ref().is_none_or(|nc| !nc.contains(target))
            }
            NameClass::AnyName { except } => except.as_ref().is_none_or(|nc| !nc.contains(target)),
            NameClass::Alt { a, b } => a.contains(target) || b.contains(target),
        }
    }

    /// Appends a short human readable form, used when describing what was expected.
    pub fn describe(&self, desc: &mut String) {
        match self {
            NameClass::Named {
                namespace_uri: _,
                name,
            } => {
                desc.push_str(name);
            }
            NameClass::NsName {
                namespace_uri,
                except,
            } => {
                desc.push_str(namespace_uri);
                desc.push_str(":*");
                if let Some(except) = except {
                    desc.push('-');
                    except.describe(desc);
                }
            }
            NameClass::AnyName { except } => {
                desc.push('*');
                if let Some(except) = except {
                    desc.push('-');
                    except.describe(desc);
                }
            }
            NameClass::Alt { a, b } => {
                a.describe(desc);
                desc.push('|');
                b.describe(desc);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named() {
        let nc = NameClass::named("urn:foo", "a");
        assert!(nc.contains(&QualifiedName::new("urn:foo", "a")));
        assert!(!nc.contains(&QualifiedName::local("a")));
        assert!(!nc.contains(&QualifiedName::new("urn:foo", "b")));
    }

    #[test]
    fn wildcard_except() {
        let nc = NameClass::AnyName {
            except: Some(Box::new(NameClass::alt(
                NameClass::ns_name("urn:foo"),
                NameClass::local("x"),
            ))),
        };
        assert!(nc.contains(&QualifiedName::local("y")));
        assert!(!nc.contains(&QualifiedName::local("x")));
        assert!(!nc.contains(&QualifiedName::new("urn:foo", "y")));
        assert!(nc.contains(&QualifiedName::new("urn:bar", "y")));
    }

    #[test]
    fn describe() {
        let mut desc = String::new();
        NameClass::alt(NameClass::local("a"), NameClass::any_name()).describe(&mut desc);
        assert_eq!(desc, "a|*");
    }
}
