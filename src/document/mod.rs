/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

mod builder;
mod error;
mod iterators;
mod parser;

use std::fmt::Debug;
use std::fmt::Display;
use std::fmt::Write;
use std::str::FromStr;

use crate::ParseError;
use crate::entities::escape;
use crate::entities::escaped_size;

pub(crate) use builder::TreeBuilder;
use error::description;
pub use iterators::Attributes;
pub use iterators::Children;
pub use iterators::DescendantOrSelf;
pub use parser::DocumentParser;

const XML_PREFIX: &str = "xml";
const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// A namespace binding declared on a tag with an `xmlns` or `xmlns:prefix` attribute.
///
/// Prefix is `None` for the default namespace.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Namespace {
    pub prefix: Option<String>,
    pub uri: String,
}

impl Namespace {
    pub fn new(prefix: Option<&str>, uri: &str) -> Self {
        Namespace {
            prefix: prefix.map(str::to_string),
            uri: uri.to_string(),
        }
    }

    fn attribute_name_size(&self) -> usize {
        match &self.prefix {
            Some(prefix) => 6 + prefix.len(),
            None => 5,
        }
    }
}

/// Stable handle of a node inside its [Document].
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct NodeId(usize);

impl NodeId {
    pub(crate) fn index(self) -> usize {
        self.0
    }
}

#[derive(Clone)]
struct Tag {
    name: String,
    namespaces: Vec<Namespace>,
    attributes: Vec<(String, String)>,
    first_child: Option<usize>,
    last_child: Option<usize>,
}

#[derive(Clone)]
enum NodePayload {
    Tag(Tag),
    CData(String),
}

#[derive(Clone)]
struct Node {
    next: Option<usize>,
    previous: Option<usize>,
    parent: Option<usize>,
    payload: NodePayload,
}

impl Node {
    fn tag(&self) -> Option<&Tag> {
        match &self.payload {
            NodePayload::Tag(tag) => Some(tag),
            NodePayload::CData(_) => None,
        }
    }
}

const ROOT: usize = 0;

/// An owned XML element tree.
///
/// Nodes live in a single vector and refer to each other by index, so a
/// document can be moved between threads and dropped as one unit. Read
/// access goes through the [Cursor] type, edits through [NodeMut].
///
/// A document parsed out of an XMPP stream also remembers the namespaces
/// declared on the stream element, so prefixes like `stream:` resolve
/// without keeping the stream element around.
#[derive(Clone)]
pub struct Document {
    nodes: Vec<Node>,
    inherited: Vec<Namespace>,
}

impl Document {
    pub fn new(root_tag_name: &str) -> Document {
        Document {
            nodes: vec![Node {
                next: None,
                previous: None,
                parent: None,
                payload: NodePayload::Tag(Tag {
                    name: root_tag_name.to_string(),
                    namespaces: Vec::new(),
                    attributes: Vec::new(),
                    first_child: None,
                    last_child: None,
                }),
            }],
            inherited: Vec::new(),
        }
    }

    pub fn root(&self) -> Cursor<'_> {
        Cursor::new(self, Some(ROOT))
    }

    pub fn root_mut(&mut self) -> NodeMut<'_> {
        NodeMut {
            doc: self,
            node: ROOT,
        }
    }

    /// Returns a cursor for a node id taken from an earlier cursor.
    pub fn cursor(&self, id: NodeId) -> Cursor<'_> {
        if id.0 < self.nodes.len() {
            Cursor::new(self, Some(id.0))
        } else {
            Cursor::new(self, None)
        }
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> NodeMut<'_> {
        NodeMut {
            doc: self,
            node: id.0,
        }
    }

    /// Namespaces in scope from the enclosing stream element.
    pub fn inherited_namespaces(&self) -> &[Namespace] {
        &self.inherited
    }

    pub(crate) fn set_inherited_namespaces(&mut self, namespaces: Vec<Namespace>) {
        self.inherited = namespaces;
    }

    /// Number of nodes in the document.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    //
    // Convenience functions to avoid typing .root() all the time
    //

    pub fn insert_tag(&mut self, tag_name: &str) -> Result<NodeMut<'_>, ParseError> {
        self.root_mut().insert_tag(tag_name)
    }

    pub fn first_child(&self) -> Cursor<'_> {
        self.root().first_child()
    }

    pub fn first_tag(&self) -> Cursor<'_> {
        self.root().first_tag()
    }

    pub fn find_tag(&self, name: &str) -> Cursor<'_> {
        self.root().find_tag(name)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.root().attribute(name)
    }

    pub fn str_size(&self) -> usize {
        self.root().str_size()
    }

    #[allow(
        clippy::inherent_to_string_shadow_display,
        reason = "prereserving exact capacity makes this function significantly faster"
    )]
    pub fn to_string(&self) -> String {
        self.root().to_string()
    }

    fn push_node(&mut self, parent: usize, payload: NodePayload) -> usize {
        let id = self.nodes.len();
        let mut previous = None;
        if let NodePayload::Tag(tag) = &mut self.nodes[parent].payload {
            previous = tag.last_child;
            if tag.first_child.is_none() {
                tag.first_child = Some(id);
            }
            tag.last_child = Some(id);
        }
        if let Some(last) = previous {
            self.nodes[last].next = Some(id);
        }
        self.nodes.push(Node {
            next: None,
            previous,
            parent: Some(parent),
            payload,
        });
        id
    }
}

impl Display for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.root(), f)
    }
}

impl Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Document({})", self.root())
    }
}

impl FromStr for Document {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parser = DocumentParser::new();
        parser.parse_bytes(s.as_bytes())?;
        parser.into_document()
    }
}

/// Mutable handle to a node, used for building documents.
///
/// Methods consume the handle and return a handle to the node of interest
/// so edits can be chained:
/// ```
/// use stanzaflow::Document;
///
/// let mut doc = Document::new("iq");
/// doc.root_mut()
///     .set_attribute("type", Some("result"))?
///     .insert_tag("query")?
///     .declare_namespace(None, "jabber:iq:version")?
///     .insert_tag("name")?
///     .insert_cdata("stanzaflow")?;
/// assert_eq!(
///     doc.to_string(),
///     "<iq type=\"result\"><query xmlns=\"jabber:iq:version\"><name>stanzaflow</name></query></iq>"
/// );
/// # Ok::<(), stanzaflow::ParseError>(())
/// ```
pub struct NodeMut<'a> {
    doc: &'a mut Document,
    node: usize,
}

impl<'a> NodeMut<'a> {
    fn tag_mut(&mut self) -> Option<&mut Tag> {
        match &mut self.doc.nodes[self.node].payload {
            NodePayload::Tag(tag) => Some(tag),
            NodePayload::CData(_) => None,
        }
    }

    pub fn id(&self) -> NodeId {
        NodeId(self.node)
    }

    pub fn as_cursor(&self) -> Cursor<'_> {
        Cursor::new(self.doc, Some(self.node))
    }

    /// Appends a new tag as the last child and returns it.
    pub fn insert_tag(self, tag_name: &str) -> Result<NodeMut<'a>, ParseError> {
        if self.doc.nodes[self.node].tag().is_none() {
            return Err(ParseError::BadXml(description::CDATA_CHILDREN));
        }
        let id = self.doc.push_node(
            self.node,
            NodePayload::Tag(Tag {
                name: tag_name.to_string(),
                namespaces: Vec::new(),
                attributes: Vec::new(),
                first_child: None,
                last_child: None,
            }),
        );
        Ok(NodeMut {
            doc: self.doc,
            node: id,
        })
    }

    /// Appends character data as the last child.
    ///
    /// Consecutive character data is merged into a single node. Returns the
    /// tag itself so that siblings can be chained.
    pub fn insert_cdata(self, cdata: &str) -> Result<NodeMut<'a>, ParseError> {
        let last = match self.doc.nodes[self.node].tag() {
            Some(tag) => tag.last_child,
            None => return Err(ParseError::BadXml(description::CDATA_CHILDREN)),
        };
        if let Some(last) = last
            && let NodePayload::CData(text) = &mut self.doc.nodes[last].payload
        {
            text.push_str(cdata);
            return Ok(self);
        }
        self.doc
            .push_node(self.node, NodePayload::CData(cdata.to_string()));
        Ok(self)
    }

    /// Adds a new attribute, failing if the tag already has one with the same name.
    ///
    /// `xmlns` and `xmlns:prefix` names are stored as namespace declarations.
    pub fn insert_attribute(mut self, name: &str, value: &str) -> Result<NodeMut<'a>, ParseError> {
        if let Some(prefix) = namespace_declaration(name) {
            return self.declare_namespace(prefix, value);
        }
        let Some(tag) = self.tag_mut() else {
            return Err(ParseError::BadXml(description::CDATA_ATTRIBUTE));
        };
        if tag.attributes.iter().any(|(n, _)| n == name) {
            return Err(ParseError::BadXml(description::DUPLICATE_ATTRIBUTE));
        }
        tag.attributes.push((name.to_string(), value.to_string()));
        Ok(self)
    }

    /// Sets, replaces, or with a `None` value removes an attribute.
    pub fn set_attribute(mut self, name: &str, value: Option<&str>) -> Result<NodeMut<'a>, ParseError> {
        let prefix = namespace_declaration(name);
        let Some(tag) = self.tag_mut() else {
            return Err(ParseError::BadXml(description::CDATA_ATTRIBUTE));
        };
        if let Some(prefix) = prefix {
            let pos = tag.namespaces.iter().position(|ns| ns.prefix.as_deref() == prefix);
            match (pos, value) {
                (Some(pos), Some(uri)) => tag.namespaces[pos].uri = uri.to_string(),
                (Some(pos), None) => {
                    tag.namespaces.remove(pos);
                }
                (None, Some(uri)) => tag.namespaces.push(Namespace::new(prefix, uri)),
                (None, None) => (),
            }
            return Ok(self);
        }
        let pos = tag.attributes.iter().position(|(n, _)| n == name);
        match (pos, value) {
            (Some(pos), Some(value)) => tag.attributes[pos].1 = value.to_string(),
            (Some(pos), None) => {
                tag.attributes.remove(pos);
            }
            (None, Some(value)) => tag.attributes.push((name.to_string(), value.to_string())),
            (None, None) => (),
        }
        Ok(self)
    }

    /// Declares a namespace on this tag.
    pub fn declare_namespace(mut self, prefix: Option<&str>, uri: &str) -> Result<NodeMut<'a>, ParseError> {
        let Some(tag) = self.tag_mut() else {
            return Err(ParseError::BadXml(description::CDATA_ATTRIBUTE));
        };
        if tag.namespaces.iter().any(|ns| ns.prefix.as_deref() == prefix) {
            return Err(ParseError::BadXml(description::DUPLICATE_ATTRIBUTE));
        }
        tag.namespaces.push(Namespace::new(prefix, uri));
        Ok(self)
    }

    /// Moves to the parent tag. The root stays at the root.
    pub fn parent(self) -> NodeMut<'a> {
        let node = self.doc.nodes[self.node].parent.unwrap_or(self.node);
        NodeMut {
            doc: self.doc,
            node,
        }
    }
}

fn namespace_declaration(name: &str) -> Option<Option<&str>> {
    if name == "xmlns" {
        Some(None)
    } else {
        name.strip_prefix("xmlns:").map(Some)
    }
}

struct Visitor<'a> {
    doc: &'a Document,
    current: Option<usize>,
    going_down: bool,
    level: usize,
}

enum VisitorStep<'a> {
    StartTag(&'a Tag),
    EndTag(&'a Tag),
    CData(&'a str),
}

impl<'a> Visitor<'a> {
    fn new(doc: &'a Document, start: Option<usize>) -> Visitor<'a> {
        Visitor {
            doc,
            current: start,
            going_down: true,
            level: 0,
        }
    }

    fn step(&mut self, current: usize) {
        let node = &self.doc.nodes[current];
        if self.going_down
            && let Some(child) = node.tag().and_then(|tag| tag.first_child)
        {
            self.current = Some(child);
            self.level += 1;
            return;
        }
        if self.level == 0 {
            self.current = None;
            return;
        }
        match node.next {
            Some(next) => {
                self.current = Some(next);
                self.going_down = true;
            }
            None => {
                self.level -= 1;
                self.current = node.parent;
                self.going_down = false;
            }
        }
    }

    fn next(&mut self) -> Option<VisitorStep<'a>> {
        let old = self.current?;
        let old_going_down = self.going_down;
        self.step(old);
        match &self.doc.nodes[old].payload {
            NodePayload::Tag(tag) => {
                if old_going_down {
                    Some(VisitorStep::StartTag(tag))
                } else {
                    Some(VisitorStep::EndTag(tag))
                }
            }
            NodePayload::CData(cdata) => Some(VisitorStep::CData(cdata)),
        }
    }
}

/// A read only position in a [Document].
///
/// A cursor may point to nothing, in which case navigation methods keep
/// returning null cursors and property methods return empty values. This
/// lets long navigation chains be written without checking every step.
#[derive(Clone, Copy)]
pub struct Cursor<'a> {
    doc: &'a Document,
    node: Option<usize>,
}

impl<'a> Cursor<'a> {
    fn new(doc: &'a Document, node: Option<usize>) -> Cursor<'a> {
        Cursor { doc, node }
    }

    fn with(self, node: Option<usize>) -> Cursor<'a> {
        Cursor::new(self.doc, node)
    }

    fn get(&self) -> Option<&'a Node> {
        let doc = self.doc;
        self.node.map(|id| &doc.nodes[id])
    }

    fn tag(&self) -> Option<&'a Tag> {
        self.get().and_then(Node::tag)
    }

    pub fn id(&self) -> Option<NodeId> {
        self.node.map(NodeId)
    }

    pub fn document(&self) -> &'a Document {
        self.doc
    }

    //
    // Navigation methods
    //

    pub fn next(self) -> Cursor<'a> {
        self.with(self.get().and_then(|node| node.next))
    }

    pub fn next_tag(self) -> Cursor<'a> {
        let mut next = self.next();
        while !next.is_null() && !next.is_tag() {
            next = next.next();
        }
        next
    }

    pub fn previous(self) -> Cursor<'a> {
        self.with(self.get().and_then(|node| node.previous))
    }

    pub fn previous_tag(self) -> Cursor<'a> {
        let mut previous = self.previous();
        while !previous.is_null() && !previous.is_tag() {
            previous = previous.previous();
        }
        previous
    }

    pub fn parent(self) -> Cursor<'a> {
        self.with(self.get().and_then(|node| node.parent))
    }

    pub fn root(self) -> Cursor<'a> {
        if self.is_null() {
            return self;
        }
        self.with(Some(ROOT))
    }

    pub fn first_child(self) -> Cursor<'a> {
        self.with(self.tag().and_then(|tag| tag.first_child))
    }

    pub fn last_child(self) -> Cursor<'a> {
        self.with(self.tag().and_then(|tag| tag.last_child))
    }

    pub fn first_tag(self) -> Cursor<'a> {
        let child = self.first_child();
        if child.is_null() || child.is_tag() {
            child
        } else {
            child.next_tag()
        }
    }

    /// Finds the first child tag with the given name.
    pub fn find_tag(self, name: &str) -> Cursor<'a> {
        let mut child = self.first_tag();
        while !child.is_null() {
            if child.name() == name {
                break;
            }
            child = child.next_tag();
        }
        child
    }

    //
    // Iterator methods
    //

    pub fn children(self) -> Children<'a> {
        Children::new(self.first_child())
    }

    pub fn attributes(self) -> Attributes<'a> {
        Attributes::new(self.tag().map_or(&[], |tag| tag.attributes.as_slice()))
    }

    pub(crate) fn attribute_at(&self, index: usize) -> Option<(&'a str, &'a str)> {
        self.tag()?
            .attributes
            .get(index)
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn namespaces(self) -> &'a [Namespace] {
        self.tag().map_or(&[], |tag| tag.namespaces.as_slice())
    }

    pub fn descendant_or_self(self) -> DescendantOrSelf<'a> {
        DescendantOrSelf::new(self)
    }

    //
    // Node property methods
    //

    pub fn is_null(&self) -> bool {
        self.node.is_none()
    }

    pub fn is_tag(&self) -> bool {
        self.tag().is_some()
    }

    pub fn is_cdata(&self) -> bool {
        matches!(self.get(), Some(Node { payload: NodePayload::CData(_), .. }))
    }

    /// Full name of the tag including the prefix, empty for other nodes.
    pub fn name(&self) -> &'a str {
        self.tag().map_or("", |tag| tag.name.as_str())
    }

    /// Tag name without the namespace prefix.
    pub fn local_name(&self) -> &'a str {
        let name = self.name();
        match name.split_once(':') {
            Some((_, local)) => local,
            None => name,
        }
    }

    pub fn prefix(&self) -> Option<&'a str> {
        self.name().split_once(':').map(|(prefix, _)| prefix)
    }

    /// Resolves the namespace of the tag from its prefix.
    pub fn namespace_uri(&self) -> Option<&'a str> {
        if !self.is_tag() {
            return None;
        }
        self.lookup_namespace(self.prefix())
    }

    /// Finds the namespace bound to a prefix at this position.
    ///
    /// Declarations on the tag and its ancestors are searched first, then
    /// the namespaces inherited from the stream element.
    pub fn lookup_namespace(&self, prefix: Option<&str>) -> Option<&'a str> {
        if prefix == Some(XML_PREFIX) {
            return Some(XML_NAMESPACE);
        }
        let mut current = *self;
        if !current.is_tag() {
            current = current.parent();
        }
        while let Some(tag) = current.tag() {
            if let Some(ns) = tag.namespaces.iter().find(|ns| ns.prefix.as_deref() == prefix) {
                return Some(ns.uri.as_str());
            }
            current = current.parent();
        }
        self.doc
            .inherited
            .iter()
            .find(|ns| ns.prefix.as_deref() == prefix)
            .map(|ns| ns.uri.as_str())
    }

    pub fn attribute(&self, name: &str) -> Option<&'a str> {
        self.tag()?
            .attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value.as_str())
    }

    /// Character data of a text node, empty for tags.
    pub fn cdata(&self) -> &'a str {
        match self.get() {
            Some(Node {
                payload: NodePayload::CData(text),
                ..
            }) => text.as_str(),
            _ => "",
        }
    }

    /// All character data under this node concatenated in document order.
    pub fn text(&self) -> String {
        let mut text = String::new();
        for node in self.descendant_or_self() {
            text.push_str(node.cdata());
        }
        text
    }

    /// Exact size of the serialized XML text of this node.
    pub fn str_size(&self) -> usize {
        let mut size = 0;
        let mut visitor = Visitor::new(self.doc, self.node);
        while let Some(step) = visitor.next() {
            match step {
                VisitorStep::StartTag(tag) => {
                    size += 1; // Tag opening '<'
                    size += tag.name.len();
                    for ns in &tag.namespaces {
                        size += 1; // space
                        size += ns.attribute_name_size();
                        size += 2; // =" characters
                        size += escaped_size(&ns.uri);
                        size += 1; // " character
                    }
                    for (name, value) in &tag.attributes {
                        size += 1 + name.len() + 2 + escaped_size(value) + 1;
                    }
                    if tag.first_child.is_none() {
                        size += 2; // Standalone tag closing '/>'
                    } else {
                        size += 1;
                    }
                }
                VisitorStep::EndTag(tag) => {
                    // Childless tags are already closed with '/>'
                    if tag.first_child.is_some() {
                        size += 2 + tag.name.len() + 1;
                    }
                }
                VisitorStep::CData(cdata) => {
                    size += escaped_size(cdata);
                }
            }
        }
        size
    }

    fn write_xml<W: Write>(&self, out: &mut W) -> std::fmt::Result {
        let mut visitor = Visitor::new(self.doc, self.node);
        while let Some(step) = visitor.next() {
            match step {
                VisitorStep::StartTag(tag) => {
                    out.write_char('<')?;
                    out.write_str(&tag.name)?;
                    for ns in &tag.namespaces {
                        match &ns.prefix {
                            Some(prefix) => {
                                out.write_str(" xmlns:")?;
                                out.write_str(prefix)?;
                            }
                            None => out.write_str(" xmlns")?,
                        }
                        out.write_str("=\"")?;
                        escape(&ns.uri, out)?;
                        out.write_char('"')?;
                    }
                    for (name, value) in &tag.attributes {
                        out.write_char(' ')?;
                        out.write_str(name)?;
                        out.write_str("=\"")?;
                        escape(value, out)?;
                        out.write_char('"')?;
                    }
                    if tag.first_child.is_none() {
                        out.write_str("/>")?;
                    } else {
                        out.write_char('>')?;
                    }
                }
                VisitorStep::EndTag(tag) => {
                    if tag.first_child.is_some() {
                        out.write_str("</")?;
                        out.write_str(&tag.name)?;
                        out.write_char('>')?;
                    }
                }
                VisitorStep::CData(cdata) => {
                    escape(cdata, out)?;
                }
            }
        }
        Ok(())
    }

    #[allow(
        clippy::inherent_to_string_shadow_display,
        reason = "prereserving exact capacity makes this function significantly faster"
    )]
    pub fn to_string(&self) -> String {
        let mut buf = String::with_capacity(self.str_size());
        // Writing into a String cannot fail
        let _ = self.write_xml(&mut buf);
        buf
    }

    /// Copies this subtree into a new standalone document.
    pub fn to_document(&self) -> Option<Document> {
        let tag = self.tag()?;
        let mut doc = Document::new(&tag.name);
        copy_tag(tag, &mut doc, ROOT);
        let mut stack = vec![(self.first_child(), ROOT)];
        while let Some((cursor, parent)) = stack.pop() {
            let Some(node) = cursor.get() else {
                continue;
            };
            stack.push((cursor.next(), parent));
            match &node.payload {
                NodePayload::Tag(tag) => {
                    let id = doc.push_node(
                        parent,
                        NodePayload::Tag(Tag {
                            name: tag.name.clone(),
                            namespaces: Vec::new(),
                            attributes: Vec::new(),
                            first_child: None,
                            last_child: None,
                        }),
                    );
                    copy_tag(tag, &mut doc, id);
                    stack.push((cursor.first_child(), id));
                }
                NodePayload::CData(text) => {
                    doc.push_node(parent, NodePayload::CData(text.clone()));
                }
            }
        }
        doc.inherited = self.doc.inherited.clone();
        Some(doc)
    }
}

fn copy_tag(from: &Tag, doc: &mut Document, id: usize) {
    if let NodePayload::Tag(tag) = &mut doc.nodes[id].payload {
        tag.namespaces = from.namespaces.clone();
        tag.attributes = from.attributes.clone();
    }
}

impl PartialEq for Cursor<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.doc, other.doc) && self.node == other.node
    }
}

impl Eq for Cursor<'_> {}

impl Debug for Cursor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Cursor ({:?})", self.node)
    }
}

impl Display for Cursor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.write_xml(f)
    }
}

mod nocompile;

#[cfg(test)]
mod tests;
