/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use tracing::debug;
use tracing::warn;

use crate::Cursor;
use crate::Document;
use crate::entities::escape;

use super::StreamElement;
use super::StreamParser;
use super::XmppError;
use super::constants::STREAM_LOCAL_NAME;
use super::constants::STREAM_NS;

/// Actions requested by a protocol, executed in order by the connection.
#[derive(Debug)]
pub enum ProtocolEvent {
    /// Serialized XML to write to the transport
    Send(String),
    /// Upgrade the transport to TLS before executing further events
    StartTls,
    /// The stream is authenticated and stanzas may flow
    Connected,
    /// A stanza for the application
    Stanza(Document),
    /// The remote closed the stream
    End,
}

/// What happens to the stream after an element was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Reset the parser, send a fresh stream header, keep parsing
    RestartStream,
    /// Upgrade to TLS, then restart the stream. Remaining bytes are dropped.
    StartTls,
}

/// A sans-IO XMPP stream state machine.
///
/// Implementors only decide what to do with each stream element. Parsing,
/// stream restarts and event collection are shared.
pub trait Protocol {
    /// The opening stream tag for this connection type.
    fn stream_header(&self) -> String;

    /// Domain used for the TLS server name.
    fn domain(&self) -> &str;

    fn state_name(&self) -> &'static str;

    fn is_connected(&self) -> bool;

    fn stream_parser(&mut self) -> &mut StreamParser;

    fn receive_element(
        &mut self,
        element: StreamElement,
        events: &mut Vec<ProtocolEvent>,
    ) -> Result<Flow, XmppError>;

    /// Starts a new stream, returns the events to send the header.
    fn open(&mut self) -> Vec<ProtocolEvent> {
        self.stream_parser().reset();
        vec![ProtocolEvent::Send(self.stream_header())]
    }

    /// Feeds received bytes and returns the resulting events.
    ///
    /// On error the events of the elements completed before the failure are
    /// lost, use [feed()](Protocol::feed) to keep them.
    fn receive_bytes(&mut self, bytes: &[u8]) -> Result<Vec<ProtocolEvent>, XmppError> {
        let mut events = Vec::new();
        self.feed(bytes, &mut events)?;
        Ok(events)
    }

    /// Feeds received bytes, appending the resulting events in order.
    ///
    /// Events of elements completed before an error stay in `events`.
    fn feed(&mut self, bytes: &[u8], events: &mut Vec<ProtocolEvent>) -> Result<(), XmppError> {
        let mut parsed = 0;
        while let Some((element, consumed)) = self.stream_parser().parse_bytes(&bytes[parsed..])? {
            parsed += consumed;
            if let StreamElement::End = element {
                debug!(state = self.state_name(), "stream closed by remote");
                events.push(ProtocolEvent::End);
                continue;
            }
            match self.receive_element(element, events)? {
                Flow::Continue => (),
                Flow::RestartStream => {
                    debug!(state = self.state_name(), "restarting stream");
                    self.stream_parser().reset();
                    events.push(ProtocolEvent::Send(self.stream_header()));
                }
                Flow::StartTls => {
                    if parsed < bytes.len() {
                        warn!(
                            discarded = bytes.len() - parsed,
                            "dropping plaintext bytes after TLS proceed"
                        );
                    }
                    self.stream_parser().reset();
                    events.push(ProtocolEvent::StartTls);
                    events.push(ProtocolEvent::Send(self.stream_header()));
                    break;
                }
            }
        }
        Ok(())
    }
}

/// Builds an opening stream tag.
pub(crate) fn stream_header(
    xml_declaration: bool,
    namespace: &str,
    to: &str,
    version: Option<&str>,
) -> String {
    let mut header = String::with_capacity(160);
    if xml_declaration {
        header.push_str("<?xml version='1.0'?>");
    }
    header.push_str("<stream:stream xmlns='");
    header.push_str(namespace);
    header.push_str("' xmlns:stream='");
    header.push_str(STREAM_NS);
    header.push_str("' to='");
    // Writing into a String cannot fail
    let _ = escape(to, &mut header);
    header.push('\'');
    if let Some(version) = version {
        header.push_str(" version='");
        header.push_str(version);
        header.push('\'');
    }
    header.push('>');
    header
}

/// Non-empty `id` attribute of a received stream tag.
pub(crate) fn stream_id(doc: &Document) -> Option<&str> {
    doc.attribute("id").filter(|id| !id.is_empty())
}

/// First child tag with the given local name.
pub(crate) fn child_tag<'a>(parent: Cursor<'a>, local_name: &str) -> Option<Cursor<'a>> {
    parent
        .children()
        .find(|child| child.is_tag() && child.local_name() == local_name)
}

/// Name of the first condition element, as used by stream errors and failures.
pub(crate) fn error_condition(element: Cursor) -> String {
    element
        .children()
        .find(|child| child.is_tag() && child.local_name() != "text")
        .map_or_else(|| "undefined-condition".to_string(), |c| c.local_name().to_string())
}

/// Condition of a `<stream:error>` element, `None` for any other element.
pub(crate) fn stream_error(doc: &Document) -> Option<String> {
    let root = doc.root();
    if root.local_name() != "error" {
        return None;
    }
    let in_stream_ns = match root.namespace_uri() {
        Some(uri) => uri == STREAM_NS,
        None => root.prefix() == Some(STREAM_LOCAL_NAME),
    };
    if !in_stream_ns {
        return None;
    }
    Some(error_condition(root))
}
