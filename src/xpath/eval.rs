/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::cell::OnceCell;
use std::cmp::Ordering;

use crate::Cursor;
use crate::Document;

use super::XPathSequence;
use super::XPathValue;
use super::error::BadXPath;
use super::error::description;
use super::parser::Axis;
use super::parser::CompareOp;
use super::parser::Expr;
use super::parser::Function;
use super::parser::NodeTest;
use super::parser::Step;

/// A node in the XPath data model.
#[derive(Clone, Copy, Debug, PartialEq)]
enum NodeRef<'a> {
    /// The implicit document node above the root tag
    Document,
    Node(Cursor<'a>),
    Attribute(Cursor<'a>, usize),
}

enum Value<'a> {
    Nodes(Vec<NodeRef<'a>>),
    Boolean(bool),
    Number(f64),
    String(String),
}

#[derive(Clone, Copy)]
struct Context<'a> {
    node: NodeRef<'a>,
    position: usize,
    size: usize,
}

pub(super) fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n == f64::INFINITY {
        "Infinity".to_string()
    } else if n == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else if n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

fn string_to_number(s: &str) -> f64 {
    let s = s.trim();
    let digits = s.strip_prefix('-').unwrap_or(s);
    if digits.is_empty()
        || !digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        || digits.chars().filter(|c| *c == '.').count() > 1
        || digits == "."
    {
        return f64::NAN;
    }
    s.parse::<f64>().unwrap_or(f64::NAN)
}

fn normalize_space(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(super) struct Evaluator<'a> {
    doc: &'a Document,
    order: OnceCell<Vec<usize>>,
}

impl<'a> Evaluator<'a> {
    pub(super) fn new(doc: &'a Document) -> Self {
        Evaluator {
            doc,
            order: OnceCell::new(),
        }
    }

    pub(super) fn run(&self, expr: &Expr, context: Cursor<'a>) -> Result<XPathSequence<'a>, BadXPath> {
        let context = Context {
            node: NodeRef::Node(context),
            position: 1,
            size: 1,
        };
        let items = match self.eval(expr, &context)? {
            Value::Nodes(nodes) => nodes
                .into_iter()
                .filter_map(|node| match node {
                    NodeRef::Document => Some(XPathValue::Node(self.doc.root())),
                    NodeRef::Node(cursor) => Some(XPathValue::Node(cursor)),
                    NodeRef::Attribute(owner, index) => {
                        let (name, value) = owner.attribute_at(index)?;
                        Some(XPathValue::Attribute { owner, name, value })
                    }
                })
                .collect(),
            Value::Boolean(b) => vec![XPathValue::Boolean(b)],
            Value::Number(n) => vec![XPathValue::Number(n)],
            Value::String(s) => vec![XPathValue::String(s)],
        };
        Ok(XPathSequence { items })
    }

    //
    // Document order
    //

    fn order_of(&self, node: &NodeRef<'a>) -> (usize, usize) {
        let order = self.order.get_or_init(|| {
            let mut order = vec![0; self.doc.node_count()];
            for (pos, cursor) in self.doc.root().descendant_or_self().enumerate() {
                if let Some(id) = cursor.id() {
                    order[id.index()] = pos + 1;
                }
            }
            order
        });
        let position = |cursor: &Cursor| cursor.id().map_or(0, |id| order[id.index()]);
        match node {
            NodeRef::Document => (0, 0),
            NodeRef::Node(cursor) => (position(cursor), 0),
            NodeRef::Attribute(owner, index) => (position(owner), index + 1),
        }
    }

    fn sort_nodes(&self, nodes: &mut Vec<NodeRef<'a>>) {
        nodes.sort_by_key(|node| self.order_of(node));
        nodes.dedup();
    }

    //
    // Expressions
    //

    fn eval(&self, expr: &Expr, context: &Context<'a>) -> Result<Value<'a>, BadXPath> {
        Ok(match expr {
            Expr::Or(left, right) => Value::Boolean(
                self.eval_boolean(left, context)? || self.eval_boolean(right, context)?,
            ),
            Expr::And(left, right) => Value::Boolean(
                self.eval_boolean(left, context)? && self.eval_boolean(right, context)?,
            ),
            Expr::Compare(op, left, right) => {
                let left = self.eval(left, context)?;
                let right = self.eval(right, context)?;
                Value::Boolean(self.compare(*op, &left, &right))
            }
            Expr::Negate(expr) => {
                let value = self.eval(expr, context)?;
                Value::Number(-self.to_number(&value))
            }
            Expr::Union(left, right) => {
                let Value::Nodes(mut left) = self.eval(left, context)? else {
                    return Err(BadXPath(description::NOT_A_NODE_SET));
                };
                let Value::Nodes(right) = self.eval(right, context)? else {
                    return Err(BadXPath(description::NOT_A_NODE_SET));
                };
                left.extend(right);
                self.sort_nodes(&mut left);
                Value::Nodes(left)
            }
            Expr::Literal(s) => Value::String(s.clone()),
            Expr::Number(n) => Value::Number(*n),
            Expr::Call(function, args) => self.call(*function, args, context)?,
            Expr::Path { absolute, steps } => {
                let start = if *absolute {
                    NodeRef::Document
                } else {
                    context.node
                };
                Value::Nodes(self.eval_steps(vec![start], steps)?)
            }
            Expr::Filter {
                primary,
                predicates,
                steps,
            } => {
                let value = self.eval(primary, context)?;
                let Value::Nodes(mut nodes) = value else {
                    return Err(BadXPath(description::NOT_A_NODE_SET));
                };
                for predicate in predicates {
                    nodes = self.filter(nodes, predicate)?;
                }
                Value::Nodes(self.eval_steps(nodes, steps)?)
            }
        })
    }

    fn eval_boolean(&self, expr: &Expr, context: &Context<'a>) -> Result<bool, BadXPath> {
        let value = self.eval(expr, context)?;
        Ok(self.to_boolean(&value))
    }

    fn eval_steps(&self, mut nodes: Vec<NodeRef<'a>>, steps: &[Step]) -> Result<Vec<NodeRef<'a>>, BadXPath> {
        for step in steps {
            let mut result = Vec::new();
            for node in &nodes {
                let mut selected = Vec::new();
                self.walk_axis(*node, step.axis, &mut |candidate| {
                    if self.node_test(candidate, step.axis, &step.test) {
                        selected.push(candidate);
                    }
                });
                for predicate in &step.predicates {
                    selected = self.filter(selected, predicate)?;
                }
                result.extend(selected);
            }
            if nodes.len() > 1 || step.axis.is_reverse() {
                self.sort_nodes(&mut result);
            }
            nodes = result;
            if nodes.is_empty() {
                break;
            }
        }
        Ok(nodes)
    }

    // Positions inside the predicate follow the order of the given nodes
    fn filter(&self, nodes: Vec<NodeRef<'a>>, predicate: &Expr) -> Result<Vec<NodeRef<'a>>, BadXPath> {
        let size = nodes.len();
        let mut result = Vec::new();
        for (i, node) in nodes.into_iter().enumerate() {
            let context = Context {
                node,
                position: i + 1,
                size,
            };
            let keep = match self.eval(predicate, &context)? {
                Value::Number(n) => n == (i + 1) as f64,
                value => self.to_boolean(&value),
            };
            if keep {
                result.push(node);
            }
        }
        Ok(result)
    }

    //
    // Axes
    //

    fn parent_of(&self, node: NodeRef<'a>) -> Option<NodeRef<'a>> {
        match node {
            NodeRef::Document => None,
            NodeRef::Node(cursor) => {
                let parent = cursor.parent();
                if parent.is_null() {
                    Some(NodeRef::Document)
                } else {
                    Some(NodeRef::Node(parent))
                }
            }
            NodeRef::Attribute(owner, _) => Some(NodeRef::Node(owner)),
        }
    }

    fn walk_axis(&self, node: NodeRef<'a>, axis: Axis, visit: &mut dyn FnMut(NodeRef<'a>)) {
        match axis {
            Axis::Self_ => visit(node),
            Axis::Child => match node {
                NodeRef::Document => visit(NodeRef::Node(self.doc.root())),
                NodeRef::Node(cursor) => cursor.children().for_each(|c| visit(NodeRef::Node(c))),
                NodeRef::Attribute(..) => (),
            },
            Axis::Descendant | Axis::DescendantOrSelf => {
                if axis == Axis::DescendantOrSelf {
                    visit(node);
                }
                let start = match node {
                    NodeRef::Document => {
                        visit(NodeRef::Node(self.doc.root()));
                        self.doc.root()
                    }
                    NodeRef::Node(cursor) => cursor,
                    NodeRef::Attribute(..) => return,
                };
                start
                    .descendant_or_self()
                    .skip(1)
                    .for_each(|c| visit(NodeRef::Node(c)));
            }
            Axis::Attribute => {
                if let NodeRef::Node(cursor) = node {
                    for index in 0..cursor.attributes().count() {
                        visit(NodeRef::Attribute(cursor, index));
                    }
                }
            }
            Axis::Parent => {
                if let Some(parent) = self.parent_of(node) {
                    visit(parent);
                }
            }
            Axis::Ancestor | Axis::AncestorOrSelf => {
                if axis == Axis::AncestorOrSelf {
                    visit(node);
                }
                let mut current = self.parent_of(node);
                while let Some(parent) = current {
                    visit(parent);
                    current = self.parent_of(parent);
                }
            }
            Axis::FollowingSibling => {
                if let NodeRef::Node(cursor) = node {
                    let mut sibling = cursor.next();
                    while !sibling.is_null() {
                        visit(NodeRef::Node(sibling));
                        sibling = sibling.next();
                    }
                }
            }
            Axis::PrecedingSibling => {
                if let NodeRef::Node(cursor) = node {
                    let mut sibling = cursor.previous();
                    while !sibling.is_null() {
                        visit(NodeRef::Node(sibling));
                        sibling = sibling.previous();
                    }
                }
            }
        }
    }

    fn node_test(&self, node: NodeRef<'a>, axis: Axis, test: &NodeTest) -> bool {
        match (test, node) {
            (NodeTest::Node, _) => true,
            (NodeTest::Text, NodeRef::Node(cursor)) => cursor.is_cdata(),
            (NodeTest::Text, _) => false,
            (_, NodeRef::Document) => false,
            (_, NodeRef::Attribute(owner, index)) => {
                if axis != Axis::Attribute {
                    return false;
                }
                let Some((name, _)) = owner.attribute_at(index) else {
                    return false;
                };
                match test {
                    NodeTest::Any => true,
                    NodeTest::Name { uri: None, local } => name == local,
                    NodeTest::Name {
                        uri: Some(uri),
                        local,
                    } => match name.split_once(':') {
                        Some((prefix, name_local)) => {
                            name_local == local
                                && owner.lookup_namespace(Some(prefix)) == Some(uri.as_str())
                        }
                        None => false,
                    },
                    NodeTest::Namespace(uri) => match name.split_once(':') {
                        Some((prefix, _)) => owner.lookup_namespace(Some(prefix)) == Some(uri.as_str()),
                        None => false,
                    },
                    NodeTest::Text | NodeTest::Node => false,
                }
            }
            (_, NodeRef::Node(cursor)) => {
                if axis == Axis::Attribute || !cursor.is_tag() {
                    return false;
                }
                match test {
                    NodeTest::Any => true,
                    NodeTest::Name { uri: None, local } => cursor.local_name() == local,
                    NodeTest::Name {
                        uri: Some(uri),
                        local,
                    } => cursor.local_name() == local && cursor.namespace_uri() == Some(uri.as_str()),
                    NodeTest::Namespace(uri) => cursor.namespace_uri() == Some(uri.as_str()),
                    NodeTest::Text | NodeTest::Node => false,
                }
            }
        }
    }

    //
    // Conversions
    //

    fn string_value(&self, node: &NodeRef<'a>) -> String {
        match node {
            NodeRef::Document => self.doc.root().text(),
            NodeRef::Node(cursor) => cursor.text(),
            NodeRef::Attribute(owner, index) => owner
                .attribute_at(*index)
                .map_or(String::new(), |(_, value)| value.to_string()),
        }
    }

    fn to_string(&self, value: &Value<'a>) -> String {
        match value {
            Value::Nodes(nodes) => nodes
                .first()
                .map_or(String::new(), |node| self.string_value(node)),
            Value::Boolean(b) => b.to_string(),
            Value::Number(n) => number_to_string(*n),
            Value::String(s) => s.clone(),
        }
    }

    fn to_number(&self, value: &Value<'a>) -> f64 {
        match value {
            Value::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            _ => string_to_number(&self.to_string(value)),
        }
    }

    fn to_boolean(&self, value: &Value<'a>) -> bool {
        match value {
            Value::Nodes(nodes) => !nodes.is_empty(),
            Value::Boolean(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
        }
    }

    //
    // Comparisons
    //

    fn compare_atoms(&self, op: CompareOp, left: &Value<'a>, right: &Value<'a>) -> bool {
        match op {
            CompareOp::Eq | CompareOp::NotEq => {
                let equal = match (left, right) {
                    (Value::Boolean(_), _) | (_, Value::Boolean(_)) => {
                        self.to_boolean(left) == self.to_boolean(right)
                    }
                    (Value::Number(_), _) | (_, Value::Number(_)) => {
                        self.to_number(left) == self.to_number(right)
                    }
                    _ => self.to_string(left) == self.to_string(right),
                };
                equal == (op == CompareOp::Eq)
            }
            _ => {
                let ordering = self.to_number(left).partial_cmp(&self.to_number(right));
                match (op, ordering) {
                    (_, None) => false,
                    (CompareOp::Less, Some(o)) => o == Ordering::Less,
                    (CompareOp::LessEq, Some(o)) => o != Ordering::Greater,
                    (CompareOp::Greater, Some(o)) => o == Ordering::Greater,
                    (CompareOp::GreaterEq, Some(o)) => o != Ordering::Less,
                    _ => false,
                }
            }
        }
    }

    fn compare(&self, op: CompareOp, left: &Value<'a>, right: &Value<'a>) -> bool {
        match (left, right) {
            (Value::Nodes(_), Value::Boolean(_)) | (Value::Boolean(_), Value::Nodes(_)) => {
                let left = Value::Boolean(self.to_boolean(left));
                let right = Value::Boolean(self.to_boolean(right));
                self.compare_atoms(op, &left, &right)
            }
            (Value::Nodes(left_nodes), Value::Nodes(right_nodes)) => {
                left_nodes.iter().any(|l| {
                    let l = Value::String(self.string_value(l));
                    right_nodes.iter().any(|r| {
                        let r = Value::String(self.string_value(r));
                        self.compare_atoms(op, &l, &r)
                    })
                })
            }
            (Value::Nodes(nodes), other) => nodes.iter().any(|node| {
                let node = self.node_atom(node, other);
                self.compare_atoms(op, &node, other)
            }),
            (other, Value::Nodes(nodes)) => nodes.iter().any(|node| {
                let node = self.node_atom(node, other);
                self.compare_atoms(op, other, &node)
            }),
            _ => self.compare_atoms(op, left, right),
        }
    }

    fn node_atom(&self, node: &NodeRef<'a>, other: &Value<'a>) -> Value<'a> {
        let s = self.string_value(node);
        match other {
            Value::Number(_) => Value::Number(string_to_number(&s)),
            _ => Value::String(s),
        }
    }

    //
    // Functions
    //

    fn node_set_arg(
        &self,
        args: &[Expr],
        context: &Context<'a>,
    ) -> Result<Option<NodeRef<'a>>, BadXPath> {
        match args.first() {
            None => Ok(Some(context.node)),
            Some(arg) => match self.eval(arg, context)? {
                Value::Nodes(nodes) => Ok(nodes.first().copied()),
                _ => Err(BadXPath(description::NOT_A_NODE_SET)),
            },
        }
    }

    fn string_arg(&self, args: &[Expr], index: usize, context: &Context<'a>) -> Result<String, BadXPath> {
        match args.get(index) {
            None => Ok(self.string_value(&context.node)),
            Some(arg) => {
                let value = self.eval(arg, context)?;
                Ok(self.to_string(&value))
            }
        }
    }

    fn call(&self, function: Function, args: &[Expr], context: &Context<'a>) -> Result<Value<'a>, BadXPath> {
        Ok(match function {
            Function::True => Value::Boolean(true),
            Function::False => Value::Boolean(false),
            Function::Not => Value::Boolean(!self.eval_boolean(&args[0], context)?),
            Function::Boolean => Value::Boolean(self.eval_boolean(&args[0], context)?),
            Function::Position => Value::Number(context.position as f64),
            Function::Last => Value::Number(context.size as f64),
            Function::Count => match self.eval(&args[0], context)? {
                Value::Nodes(nodes) => Value::Number(nodes.len() as f64),
                _ => return Err(BadXPath(description::NOT_A_NODE_SET)),
            },
            Function::Name | Function::LocalName | Function::NamespaceUri => {
                let node = self.node_set_arg(args, context)?;
                let s = match node {
                    None | Some(NodeRef::Document) => String::new(),
                    Some(NodeRef::Node(cursor)) => match function {
                        Function::Name => cursor.name().to_string(),
                        Function::LocalName => cursor.local_name().to_string(),
                        _ => cursor.namespace_uri().unwrap_or("").to_string(),
                    },
                    Some(NodeRef::Attribute(owner, index)) => {
                        let name = owner.attribute_at(index).map_or("", |(name, _)| name);
                        let (prefix, local) = match name.split_once(':') {
                            Some((prefix, local)) => (Some(prefix), local),
                            None => (None, name),
                        };
                        match function {
                            Function::Name => name.to_string(),
                            Function::LocalName => local.to_string(),
                            _ => prefix
                                .and_then(|prefix| owner.lookup_namespace(Some(prefix)))
                                .unwrap_or("")
                                .to_string(),
                        }
                    }
                };
                Value::String(s)
            }
            Function::String => Value::String(self.string_arg(args, 0, context)?),
            Function::Concat => {
                let mut s = String::new();
                for arg in args {
                    let value = self.eval(arg, context)?;
                    s.push_str(&self.to_string(&value));
                }
                Value::String(s)
            }
            Function::Contains => {
                let haystack = self.string_arg(args, 0, context)?;
                let needle = self.string_arg(args, 1, context)?;
                Value::Boolean(haystack.contains(&needle))
            }
            Function::StartsWith => {
                let haystack = self.string_arg(args, 0, context)?;
                let needle = self.string_arg(args, 1, context)?;
                Value::Boolean(haystack.starts_with(&needle))
            }
            Function::StringLength => {
                Value::Number(self.string_arg(args, 0, context)?.chars().count() as f64)
            }
            Function::NormalizeSpace => Value::String(normalize_space(&self.string_arg(args, 0, context)?)),
            Function::Number => match args.first() {
                None => Value::Number(string_to_number(&self.string_value(&context.node))),
                Some(arg) => {
                    let value = self.eval(arg, context)?;
                    Value::Number(self.to_number(&value))
                }
            },
        })
    }
}
