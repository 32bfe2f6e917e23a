/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use sha1::Digest;
use sha1::Sha1;
use tracing::debug;
use tracing::info;

use crate::Jid;

use super::StreamElement;
use super::StreamParser;
use super::XmppError;
use super::constants::COMPONENT_NS;
use super::protocol::Flow;
use super::protocol::Protocol;
use super::protocol::ProtocolEvent;
use super::protocol::error_condition;
use super::protocol::stream_error;
use super::protocol::stream_header;
use super::protocol::stream_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentState {
    AwaitingStream,
    AwaitingHandshakeResult,
    Connected,
}

impl ComponentState {
    pub fn name(self) -> &'static str {
        match self {
            ComponentState::AwaitingStream => "awaiting-stream",
            ComponentState::AwaitingHandshakeResult => "awaiting-handshake-result",
            ComponentState::Connected => "connected",
        }
    }
}

/// Lowercase hex SHA-1 of the stream id followed by the shared secret.
pub fn handshake_digest(stream_id: &str, secret: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(stream_id.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// External component stream as described in XEP-0114.
pub struct ComponentProtocol {
    jid: Jid,
    secret: String,
    parser: StreamParser,
    state: ComponentState,
}

impl ComponentProtocol {
    pub fn new(jid: Jid, secret: &str) -> Self {
        ComponentProtocol {
            jid,
            secret: secret.to_string(),
            parser: StreamParser::new(),
            state: ComponentState::AwaitingStream,
        }
    }

    pub fn jid(&self) -> &Jid {
        &self.jid
    }

    pub fn state(&self) -> ComponentState {
        self.state
    }

    fn set_state(&mut self, state: ComponentState) {
        debug!(from = self.state.name(), to = state.name(), "component state change");
        self.state = state;
    }
}

impl Protocol for ComponentProtocol {
    fn stream_header(&self) -> String {
        stream_header(false, COMPONENT_NS, self.jid.full(), None)
    }

    fn domain(&self) -> &str {
        self.jid.domainpart()
    }

    fn state_name(&self) -> &'static str {
        self.state.name()
    }

    fn is_connected(&self) -> bool {
        self.state == ComponentState::Connected
    }

    fn stream_parser(&mut self) -> &mut StreamParser {
        &mut self.parser
    }

    fn receive_element(
        &mut self,
        element: StreamElement,
        events: &mut Vec<ProtocolEvent>,
    ) -> Result<Flow, XmppError> {
        match (self.state, element) {
            (ComponentState::AwaitingStream, StreamElement::Start(doc)) => {
                let Some(id) = stream_id(&doc) else {
                    return Err(XmppError::violation(self.state.name(), doc.root().name()));
                };
                let digest = handshake_digest(id, &self.secret);
                events.push(ProtocolEvent::Send(format!("<handshake>{digest}</handshake>")));
                self.set_state(ComponentState::AwaitingHandshakeResult);
                Ok(Flow::Continue)
            }
            (ComponentState::AwaitingHandshakeResult, StreamElement::Stanza(doc)) => {
                if let Some(condition) = stream_error(&doc) {
                    return Err(XmppError::AuthenticationFailed(condition));
                }
                let root = doc.root();
                match root.local_name() {
                    "handshake" if root.attributes().next().is_none() => {
                        info!(jid = %self.jid, "component handshake accepted");
                        self.set_state(ComponentState::Connected);
                        events.push(ProtocolEvent::Connected);
                        Ok(Flow::Continue)
                    }
                    "error" => Err(XmppError::AuthenticationFailed(error_condition(root))),
                    name => Err(XmppError::violation(self.state.name(), name)),
                }
            }
            (ComponentState::Connected, StreamElement::Stanza(doc)) => {
                if let Some(condition) = stream_error(&doc) {
                    return Err(XmppError::StreamError(condition));
                }
                events.push(ProtocolEvent::Stanza(doc));
                Ok(Flow::Continue)
            }
            (state, StreamElement::Start(doc) | StreamElement::Stanza(doc)) => {
                Err(XmppError::violation(state.name(), doc.root().name()))
            }
            (_, StreamElement::End) => {
                events.push(ProtocolEvent::End);
                Ok(Flow::Continue)
            }
        }
    }
}
