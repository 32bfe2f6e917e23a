/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::fmt::Display;

use crate::Cursor;
use crate::Document;

/// The three stanza kinds of RFC 6120, and everything else on the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StanzaKind {
    Iq,
    Message,
    Presence,
    Other,
}

/// A top level element received from the stream.
///
/// Wraps the owned [Document] and provides accessors for the common
/// stanza attributes.
#[derive(Debug, Clone)]
pub struct Stanza {
    document: Document,
}

impl Stanza {
    pub fn new(document: Document) -> Self {
        Stanza { document }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    pub fn root(&self) -> Cursor<'_> {
        self.document.root()
    }

    /// Local name of the stanza element.
    pub fn name(&self) -> &str {
        self.document.root().local_name()
    }

    pub fn kind(&self) -> StanzaKind {
        match self.name() {
            "iq" => StanzaKind::Iq,
            "message" => StanzaKind::Message,
            "presence" => StanzaKind::Presence,
            _ => StanzaKind::Other,
        }
    }

    pub fn from(&self) -> Option<&str> {
        self.document.attribute("from")
    }

    pub fn to(&self) -> Option<&str> {
        self.document.attribute("to")
    }

    pub fn id(&self) -> Option<&str> {
        self.document.attribute("id")
    }

    /// Value of the `type` attribute.
    pub fn stanza_type(&self) -> Option<&str> {
        self.document.attribute("type")
    }
}

impl From<Document> for Stanza {
    fn from(document: Document) -> Self {
        Stanza::new(document)
    }
}

impl Display for Stanza {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.document, f)
    }
}
