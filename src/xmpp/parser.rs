/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::collections::VecDeque;

use crate::Document;
use crate::Location;
use crate::ParseError;
use crate::SaxElement;
use crate::SaxHandler;
use crate::SaxParser;
use crate::document::TreeBuilder;

use super::StreamError;
use super::constants::STREAM_LOCAL_NAME;
use super::error::description;

/// A top level item of an XMPP stream.
#[derive(Debug)]
pub enum StreamElement {
    /// The stream opening tag, with its attributes and namespaces
    Start(Document),
    /// A complete top level element
    Stanza(Document),
    /// The stream closing tag
    End,
}

fn local_name(name: &str) -> &str {
    match name.split_once(':') {
        Some((_, local)) => local,
        None => name,
    }
}

struct StreamBuilder {
    stanza: TreeBuilder,
    stream_tag: Option<Document>,
    stream_open: bool,
    opening: bool,
    ready: VecDeque<StreamElement>,
}

impl StreamBuilder {
    fn new() -> Self {
        StreamBuilder {
            stanza: TreeBuilder::new(),
            stream_tag: None,
            stream_open: false,
            opening: false,
            ready: VecDeque::new(),
        }
    }

    fn reset(&mut self) {
        self.stanza = TreeBuilder::new();
        self.stream_tag = None;
        self.stream_open = false;
        self.opening = false;
        self.ready.clear();
    }

    fn finish_opening(&mut self) -> Result<(), ParseError> {
        self.opening = false;
        self.stream_open = true;
        let Some(doc) = self.stream_tag.as_ref() else {
            return Err(ParseError::BadXml(description::STREAM_NOT_OPEN));
        };
        self.stanza
            .inherit_namespaces(doc.root().namespaces().to_vec());
        self.ready.push_back(StreamElement::Start(doc.clone()));
        Ok(())
    }
}

impl SaxHandler for StreamBuilder {
    fn handle_element(&mut self, element: &SaxElement) -> Result<(), ParseError> {
        if self.opening {
            return match element {
                SaxElement::Attribute(name, value) => match self.stream_tag.as_mut() {
                    Some(doc) => {
                        doc.root_mut().insert_attribute(name, value)?;
                        Ok(())
                    }
                    None => Err(ParseError::BadXml(description::STREAM_NOT_OPEN)),
                },
                SaxElement::StartTagContent => self.finish_opening(),
                SaxElement::StartTagEmpty => {
                    self.finish_opening()?;
                    self.stream_open = false;
                    self.ready.push_back(StreamElement::End);
                    Ok(())
                }
                _ => Err(ParseError::BadXml(description::STREAM_NOT_OPEN)),
            };
        }
        if self.stanza.is_idle() {
            match element {
                SaxElement::StartTag(name)
                    if !self.stream_open && local_name(name) == STREAM_LOCAL_NAME =>
                {
                    self.stream_tag = Some(Document::new(name));
                    self.opening = true;
                    return Ok(());
                }
                SaxElement::EndTag(name) if self.stream_open => {
                    let expected = self.stream_tag.as_ref().map(|doc| doc.root().name());
                    if expected != Some(*name) {
                        return Err(ParseError::BadXml(description::STREAM_TAG_MISMATCH));
                    }
                    self.stream_open = false;
                    self.ready.push_back(StreamElement::End);
                    return Ok(());
                }
                // Whitespace keepalives and stray text between stanzas
                SaxElement::CData(_) => return Ok(()),
                _ => (),
            }
        }
        if self.stanza.append_element(element)?
            && let Some(doc) = self.stanza.take()
        {
            self.ready.push_back(StreamElement::Stanza(doc));
        }
        Ok(())
    }

    fn wants_pause(&self) -> bool {
        !self.ready.is_empty()
    }
}

/// Incremental parser for the endless XML document of an XMPP stream.
///
/// Bytes can be fed in arbitrary pieces. The opening stream tag is reported
/// as soon as its `>` arrives, and each top level element is reported as a
/// separate owned [Document] when its end tag arrives.
pub struct StreamParser {
    parser: SaxParser,
    builder: StreamBuilder,
}

impl StreamParser {
    pub fn new() -> Self {
        Self {
            parser: SaxParser::new(),
            builder: StreamBuilder::new(),
        }
    }

    /// Discards all state, ready for a restarted stream.
    pub fn reset(&mut self) {
        self.parser.reset();
        self.builder.reset();
    }

    /// True when no stanza is partially parsed.
    pub fn is_idle(&self) -> bool {
        self.builder.stanza.is_idle() && !self.builder.opening
    }

    /// True between the opening and closing stream tags.
    pub fn is_stream_open(&self) -> bool {
        self.builder.stream_open
    }

    pub fn location(&self) -> Location {
        self.parser.location()
    }

    /// Parses bytes until a stream element is complete.
    ///
    /// Returns the element and the number of bytes consumed, or `None` if
    /// all bytes are consumed without completing an element.
    pub fn parse_bytes(&mut self, bytes: &[u8]) -> Result<Option<(StreamElement, usize)>, StreamError> {
        if let Some(element) = self.builder.ready.pop_front() {
            return Ok(Some((element, 0)));
        }
        let consumed = self.parser.parse_bytes(&mut self.builder, bytes)?;
        match self.builder.ready.pop_front() {
            Some(element) => Ok(Some((element, consumed))),
            None => Ok(None),
        }
    }

    /// Parses a chunk and calls `callback` for every completed element.
    pub fn push<F>(&mut self, bytes: &[u8], mut callback: F) -> Result<(), StreamError>
    where
        F: FnMut(StreamElement),
    {
        let mut parsed = 0;
        while let Some((element, consumed)) = self.parse_bytes(&bytes[parsed..])? {
            parsed += consumed;
            callback(element);
        }
        Ok(())
    }

    /// Returns an iterator over the elements found in the bytes.
    pub fn elements<'a>(&'a mut self, bytes: &'a [u8]) -> StreamElements<'a> {
        StreamElements {
            parser: self,
            bytes,
            parsed: 0,
            failed: false,
        }
    }
}

impl Default for StreamParser {
    fn default() -> Self {
        Self::new()
    }
}

pub struct StreamElements<'a> {
    parser: &'a mut StreamParser,
    bytes: &'a [u8],
    parsed: usize,
    failed: bool,
}

impl Iterator for StreamElements<'_> {
    type Item = Result<StreamElement, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.parser.parse_bytes(&self.bytes[self.parsed..]) {
            Ok(Some((element, consumed))) => {
                self.parsed += consumed;
                Some(Ok(element))
            }
            Ok(None) => {
                self.parsed = self.bytes.len();
                None
            }
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}
