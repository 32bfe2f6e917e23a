/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use crate::ParseError;
use crate::SaxElement;

use super::Document;
use super::Namespace;
use super::NodeId;
use super::error::description;

/// Builds a [Document] out of SAX parser elements.
///
/// Character data is collected until the next tag boundary. Runs that
/// consist only of whitespace are dropped, anything else is kept verbatim.
pub(crate) struct TreeBuilder {
    doc: Option<Document>,
    stack: Vec<NodeId>,
    text: String,
    inherited: Vec<Namespace>,
}

impl TreeBuilder {
    pub(crate) fn new() -> Self {
        TreeBuilder {
            doc: None,
            stack: Vec::new(),
            text: String::new(),
            inherited: Vec::new(),
        }
    }

    /// Namespaces which every following document should resolve through.
    pub(crate) fn inherit_namespaces(&mut self, namespaces: Vec<Namespace>) {
        self.inherited = namespaces;
    }

    fn flush_text(&mut self) -> Result<(), ParseError> {
        if self.text.is_empty() {
            return Ok(());
        }
        if !self.text.chars().all(char::is_whitespace)
            && let (Some(doc), Some(top)) = (self.doc.as_mut(), self.stack.last())
        {
            doc.node_mut(*top).insert_cdata(&self.text)?;
        }
        self.text.clear();
        Ok(())
    }

    fn end_tag(&mut self, name: Option<&str>) -> Result<bool, ParseError> {
        self.flush_text()?;
        let (Some(doc), Some(top)) = (self.doc.as_ref(), self.stack.last()) else {
            return Err(ParseError::BadXml(description::NO_START_TAG));
        };
        if let Some(name) = name
            && doc.cursor(*top).name() != name
        {
            return Err(ParseError::BadXml(description::TAG_MISMATCH));
        }
        self.stack.pop();
        Ok(self.stack.is_empty())
    }

    /// Adds an element to the tree.
    ///
    /// Returns true when the element closes the root tag.
    pub(crate) fn append_element(&mut self, element: &SaxElement) -> Result<bool, ParseError> {
        match element {
            SaxElement::StartTag(name) => {
                self.flush_text()?;
                match (self.doc.as_mut(), self.stack.last()) {
                    (Some(doc), Some(top)) => {
                        let id = doc.node_mut(*top).insert_tag(name)?.id();
                        self.stack.push(id);
                    }
                    (None, _) => {
                        let mut doc = Document::new(name);
                        doc.set_inherited_namespaces(self.inherited.clone());
                        self.stack.push(NodeId(super::ROOT));
                        self.doc = Some(doc);
                    }
                    (Some(_), None) => return Err(ParseError::BadXml(description::TAG_OUTSIDE_ROOT)),
                }
            }
            SaxElement::Attribute(name, value) => {
                let (Some(doc), Some(top)) = (self.doc.as_mut(), self.stack.last()) else {
                    return Err(ParseError::BadXml(description::NO_START_TAG));
                };
                doc.node_mut(*top).insert_attribute(name, value)?;
            }
            SaxElement::StartTagContent => {}
            SaxElement::StartTagEmpty => return self.end_tag(None),
            SaxElement::EndTag(name) => return self.end_tag(Some(name)),
            SaxElement::CData(cdata) => {
                if self.stack.is_empty() {
                    return Err(ParseError::BadXml(description::NO_START_TAG));
                }
                self.text.push_str(cdata);
            }
        }
        Ok(false)
    }

    /// True when no document is being built.
    pub(crate) fn is_idle(&self) -> bool {
        self.doc.is_none()
    }

    /// Takes the document out, leaving the builder ready for the next one.
    pub(crate) fn take(&mut self) -> Option<Document> {
        self.stack.clear();
        self.text.clear();
        self.doc.take()
    }
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
