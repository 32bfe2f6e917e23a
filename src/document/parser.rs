/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use crate::Location;
use crate::ParseError;
use crate::SaxElement;
use crate::SaxHandler;
use crate::SaxParser;

use super::Document;
use super::TreeBuilder;
use super::error::description;

impl SaxHandler for TreeBuilder {
    fn handle_element(&mut self, element: &SaxElement) -> Result<(), ParseError> {
        self.append_element(element)?;
        Ok(())
    }
}

/// Parses a complete XML document, possibly fed in several chunks.
pub struct DocumentParser {
    builder: TreeBuilder,
    parser: SaxParser,
}

impl DocumentParser {
    pub fn new() -> DocumentParser {
        DocumentParser {
            builder: TreeBuilder::new(),
            parser: SaxParser::new(),
        }
    }

    pub fn parse_bytes(&mut self, bytes: &[u8]) -> Result<(), ParseError> {
        self.parser.parse_bytes(&mut self.builder, bytes)?;
        Ok(())
    }

    pub fn into_document(mut self) -> Result<Document, ParseError> {
        self.take_document()
    }

    /// Returns the parsed document and resets the parser for the next one.
    pub fn take_document(&mut self) -> Result<Document, ParseError> {
        self.parser.parse_finish()?;
        let doc = self.builder.take();
        self.parser.reset();
        doc.ok_or(ParseError::BadXml(description::NO_DOCUMENT))
    }

    pub fn location(&self) -> Location {
        self.parser.location()
    }
}

impl Default for DocumentParser {
    fn default() -> Self {
        Self::new()
    }
}
