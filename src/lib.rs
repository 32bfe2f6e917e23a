/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

//! Building blocks of an XMPP connection.
//!
//! - [SaxParser]: a resumable push parser for the XML subset used by XMPP.
//! - [Document]: an owned tree for a single stanza, with [Cursor] navigation.
//! - [XPath]: the XPath 1.0 subset used to match stanzas.
//! - [StreamParser]: splits an endless XMPP stream into stanza documents.
//! - [ClientProtocol] and [ComponentProtocol]: sans-IO state machines for
//!   client and XEP-0114 component streams, driven by a [Connection].
//! - [Router]: priority ordered XPath routes dispatching to actions.

mod document;
mod entities;
mod parser;
#[cfg(feature = "xmpp")]
mod router;
#[cfg(feature = "xmpp")]
mod xmpp;
mod xpath;

pub use parser::Location;
pub use parser::ParseError;
pub use parser::SaxElement;
pub use parser::SaxHandler;
pub use parser::SaxParser;

pub use document::Attributes;
pub use document::Children;
pub use document::Cursor;
pub use document::DescendantOrSelf;
pub use document::Document;
pub use document::DocumentParser;
pub use document::Namespace;
pub use document::NodeId;
pub use document::NodeMut;

pub use xpath::BadXPath;
pub use xpath::XPath;
pub use xpath::XPathSequence;
pub use xpath::XPathValue;

#[cfg(feature = "xmpp")]
pub use xmpp::*;

#[cfg(feature = "xmpp")]
pub use router::*;
