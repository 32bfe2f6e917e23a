/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

mod error;
mod eval;
mod parser;

use crate::Cursor;
use crate::Document;

pub use error::BadXPath;
use eval::Evaluator;
use parser::Expr;
use parser::Parser;

/// One item of an XPath result.
#[derive(Debug)]
pub enum XPathValue<'a> {
    Node(Cursor<'a>),
    Attribute {
        owner: Cursor<'a>,
        name: &'a str,
        value: &'a str,
    },
    Boolean(bool),
    Number(f64),
    String(String),
}

#[derive(Debug)]
pub struct XPathSequence<'a> {
    pub items: Vec<XPathValue<'a>>,
}

impl XPathSequence<'_> {
    pub fn new() -> Self {
        XPathSequence { items: Vec::new() }
    }

    /// Effective boolean value of the result.
    ///
    /// Node sets are true when they are not empty. A single atomic value is
    /// converted with the XPath `boolean()` rules.
    pub fn is_true(&self) -> bool {
        match self.items.as_slice() {
            [XPathValue::Boolean(b)] => *b,
            [XPathValue::Number(n)] => *n != 0.0 && !n.is_nan(),
            [XPathValue::String(s)] => !s.is_empty(),
            items => !items.is_empty(),
        }
    }
}

impl Default for XPathSequence<'_> {
    fn default() -> Self {
        XPathSequence::new()
    }
}

impl std::fmt::Display for XPathSequence<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for value in self.items.iter() {
            match value {
                XPathValue::Node(node) => writeln!(f, "{node}")?,
                XPathValue::Attribute { name, value, .. } => writeln!(f, "{name}=\"{value}\"")?,
                XPathValue::Boolean(b) => writeln!(f, "{b}")?,
                XPathValue::Number(n) => writeln!(f, "{}", eval::number_to_string(*n))?,
                XPathValue::String(s) => writeln!(f, "{s}")?,
            }
        }
        Ok(())
    }
}

/// A compiled XPath expression.
///
/// Supports the location path, predicate and function subset of XPath 1.0
/// that is useful for matching stanzas:
/// ```
/// use std::str::FromStr;
/// use stanzaflow::{Document, XPath};
///
/// let doc = Document::from_str("<iq type='get'><query xmlns='jabber:iq:version'/></iq>")?;
/// let xpath = XPath::with_namespaces("/iq[@type='get']/v:query", [("v", "jabber:iq:version")])?;
/// assert!(xpath.matches(&doc)?);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
///
/// The document given to [apply()](XPath::apply) is treated as a child of an
/// implicit document node, so absolute paths start with the name of the root
/// tag.
pub struct XPath {
    expression: String,
    expr: Expr,
}

impl XPath {
    pub fn new(expression: &str) -> Result<Self, BadXPath> {
        XPath::with_namespaces(expression, [])
    }

    /// Compiles an expression with namespace prefix bindings.
    ///
    /// Every prefix used in a name test must be bound, except `xml`.
    pub fn with_namespaces<'n>(
        expression: &str,
        namespaces: impl IntoIterator<Item = (&'n str, &'n str)>,
    ) -> Result<Self, BadXPath> {
        let namespaces: Vec<(String, String)> = namespaces
            .into_iter()
            .map(|(prefix, uri)| (prefix.to_string(), uri.to_string()))
            .collect();
        let expr = Parser::parse(expression, &namespaces)?;
        Ok(XPath {
            expression: expression.to_string(),
            expr,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Evaluates the expression with the root tag of the document as context.
    pub fn apply<'b>(&self, document: &'b Document) -> Result<XPathSequence<'b>, BadXPath> {
        self.apply_to(document.root())
    }

    /// Evaluates the expression with the given node as context.
    pub fn apply_to<'b>(&self, context: Cursor<'b>) -> Result<XPathSequence<'b>, BadXPath> {
        Evaluator::new(context.document()).run(&self.expr, context)
    }

    /// True if the expression selects at least one node, or evaluates to true.
    pub fn matches(&self, document: &Document) -> Result<bool, BadXPath> {
        Ok(self.apply(document)?.is_true())
    }
}

impl std::fmt::Debug for XPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "XPath({})", self.expression)
    }
}

impl std::str::FromStr for XPath {
    type Err = BadXPath;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        XPath::new(s)
    }
}
