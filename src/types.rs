use crate::source::Span;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind, // The parsed form
    pub span: Span,     // The source span it covers
}

impl Node {
    pub fn new(kind: NodeKind, span: Span) -> Self {
        Node { kind, span }
    }

    pub fn new_integer(n: i64, span: Span) -> Self {
        Node::new(NodeKind::Integer(n), span)
    }

    pub fn new_identifier(name: impl Into<String>, span: Span) -> Self {
        Node::new(NodeKind::Identifier(name.into()), span)
    }

    pub fn new_symbol(name: impl Into<String>, span: Span) -> Self {
        Node::new(NodeKind::Symbol(name.into()), span)
    }

    pub fn new_list(children: Vec<Node>, span: Span) -> Self {
        Node::new(NodeKind::List(children), span)
    }

    pub fn new_lambda(children: Vec<Node>, span: Span) -> Self {
        Node::new(NodeKind::Lambda(children.into()), span)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

/// A parsed form. `List` and `Lambda` have the same shape; the tag decides
/// whether the evaluator calls the form or wraps it in a closure.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    List(Vec<Node>),     // (add 1 2)
    Lambda(Rc<[Node]>),  // #(add %0 1), shared with the closures built from it
    Identifier(String),  // add, %0
    Integer(i64),        // 42
    Symbol(String),      // :name, stored without the colon
}

fn write_children(f: &mut fmt::Formatter<'_>, children: &[Node]) -> fmt::Result {
    let mut first = true;
    for child in children {
        if !first {
            write!(f, " ")?;
        }
        write!(f, "{}", child)?;
        first = false;
    }
    write!(f, ")")
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::List(children) => {
                write!(f, "(")?;
                write_children(f, children)
            }
            NodeKind::Lambda(children) => {
                write!(f, "#(")?;
                write_children(f, children)
            }
            NodeKind::Identifier(name) => write!(f, "{}", name),
            NodeKind::Integer(n) => write!(f, "{}", n),
            NodeKind::Symbol(name) => write!(f, ":{}", name),
        }
    }
}
