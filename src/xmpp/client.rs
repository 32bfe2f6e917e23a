/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use tracing::debug;
use tracing::info;

use crate::Document;
use crate::Jid;

use super::StreamElement;
use super::StreamParser;
use super::XmppError;
use super::constants::BIND_NS;
use super::constants::CLIENT_NS;
use super::constants::SASL_NS;
use super::constants::SESSION_NS;
use super::constants::TLS_NS;
use super::protocol::Flow;
use super::protocol::Protocol;
use super::protocol::ProtocolEvent;
use super::protocol::child_tag;
use super::protocol::error_condition;
use super::protocol::stream_error;
use super::protocol::stream_header;
use super::protocol::stream_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    AwaitingStream,
    AwaitingAuthMechanisms,
    AwaitingProceed,
    AwaitingSaslSuccess,
    AwaitingStreamAuthenticated,
    AwaitingBind,
    AwaitingBindConfirmation,
    AwaitingSessionConfirmation,
    Connected,
}

impl ClientState {
    pub fn name(self) -> &'static str {
        match self {
            ClientState::AwaitingStream => "awaiting-stream",
            ClientState::AwaitingAuthMechanisms => "awaiting-auth-mechanisms",
            ClientState::AwaitingProceed => "awaiting-proceed",
            ClientState::AwaitingSaslSuccess => "awaiting-sasl-success",
            ClientState::AwaitingStreamAuthenticated => "awaiting-stream-authenticated",
            ClientState::AwaitingBind => "awaiting-bind",
            ClientState::AwaitingBindConfirmation => "awaiting-bind-confirmation",
            ClientState::AwaitingSessionConfirmation => "awaiting-session-confirmation",
            ClientState::Connected => "connected",
        }
    }
}

/// SASL PLAIN initial response for the JID and password.
pub fn plain_credentials(jid: &Jid, password: &str) -> String {
    let local = jid.localpart().unwrap_or("");
    let mut message = String::with_capacity(jid.full().len() + local.len() + password.len() + 2);
    message.push_str(jid.full());
    message.push('\0');
    message.push_str(local);
    message.push('\0');
    message.push_str(password);
    BASE64.encode(message)
}

/// True if a received iq id refers to the pending request id.
///
/// Ids are compared as strings, and as integers when the received id is
/// numeric, so `"007"` matches 7.
fn id_matches(received: Option<&str>, pending: Option<u64>) -> bool {
    match (received, pending) {
        (Some(received), Some(pending)) => {
            received == pending.to_string() || received.parse::<u64>() == Ok(pending)
        }
        _ => false,
    }
}

/// Client to server stream with STARTTLS, SASL PLAIN, resource binding
/// and session establishment.
pub struct ClientProtocol {
    jid: Jid,
    password: String,
    starttls: bool,
    encrypted: bool,
    parser: StreamParser,
    state: ClientState,
    last_id: u64,
    pending_id: Option<u64>,
}

impl ClientProtocol {
    pub fn new(jid: Jid, password: &str) -> Self {
        ClientProtocol {
            jid,
            password: password.to_string(),
            starttls: true,
            encrypted: false,
            parser: StreamParser::new(),
            state: ClientState::AwaitingStream,
            last_id: 0,
            pending_id: None,
        }
    }

    /// Enables or disables STARTTLS negotiation, enabled by default.
    pub fn starttls(mut self, enabled: bool) -> Self {
        self.starttls = enabled;
        self
    }

    /// The JID of the session, updated with the resource bound by the server.
    pub fn jid(&self) -> &Jid {
        &self.jid
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    /// True after the TLS upgrade was requested.
    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    fn set_state(&mut self, state: ClientState) {
        debug!(from = self.state.name(), to = state.name(), "client state change");
        self.state = state;
    }

    fn next_id(&mut self) -> u64 {
        self.last_id += 1;
        self.pending_id = Some(self.last_id);
        self.last_id
    }

    fn violation(&self, doc: &Document) -> XmppError {
        XmppError::violation(self.state.name(), doc.root().name())
    }

    fn on_features(&mut self, doc: &Document, events: &mut Vec<ProtocolEvent>) -> Result<Flow, XmppError> {
        let root = doc.root();
        if root.local_name() != "features" {
            return Err(self.violation(doc));
        }
        if self.starttls && !self.encrypted && child_tag(root, "starttls").is_some() {
            events.push(ProtocolEvent::Send(format!("<starttls xmlns='{TLS_NS}'/>")));
            self.set_state(ClientState::AwaitingProceed);
            return Ok(Flow::Continue);
        }
        let plain = child_tag(root, "mechanisms").is_some_and(|mechanisms| {
            mechanisms
                .children()
                .any(|mechanism| mechanism.is_tag() && mechanism.text().trim() == "PLAIN")
        });
        if !plain {
            return Err(XmppError::AuthenticationFailed(
                "server does not offer the PLAIN mechanism".to_string(),
            ));
        }
        events.push(ProtocolEvent::Send(format!(
            "<auth xmlns='{SASL_NS}' mechanism='PLAIN'>{}</auth>",
            plain_credentials(&self.jid, &self.password)
        )));
        self.set_state(ClientState::AwaitingSaslSuccess);
        Ok(Flow::Continue)
    }

    fn on_bind_features(&mut self, doc: &Document, events: &mut Vec<ProtocolEvent>) -> Result<Flow, XmppError> {
        let root = doc.root();
        if root.local_name() != "features" || child_tag(root, "bind").is_none() {
            return Err(self.violation(doc));
        }
        let resource = match self.jid.resourcepart() {
            Some(resource) => resource.to_string(),
            None => format!("stanzaflow_{}", rand::random::<u32>()),
        };
        let id = self.next_id().to_string();
        let mut iq = Document::new("iq");
        iq.root_mut()
            .insert_attribute("type", "set")?
            .insert_attribute("id", &id)?
            .insert_tag("bind")?
            .declare_namespace(None, BIND_NS)?
            .insert_tag("resource")?
            .insert_cdata(&resource)?;
        events.push(ProtocolEvent::Send(iq.to_string()));
        self.set_state(ClientState::AwaitingBindConfirmation);
        Ok(Flow::Continue)
    }

    fn on_bind_result(&mut self, doc: &Document, events: &mut Vec<ProtocolEvent>) -> Result<Flow, XmppError> {
        let root = doc.root();
        if root.local_name() != "iq" || !id_matches(root.attribute("id"), self.pending_id) {
            return Err(self.violation(doc));
        }
        match root.attribute("type") {
            Some("result") => (),
            Some("error") => {
                let condition = child_tag(root, "error").map_or_else(
                    || "undefined-condition".to_string(),
                    error_condition,
                );
                return Err(XmppError::AuthenticationFailed(format!(
                    "resource binding failed: {condition}"
                )));
            }
            _ => return Err(self.violation(doc)),
        }
        if let Some(jid) = child_tag(root, "bind").and_then(|bind| child_tag(bind, "jid")) {
            self.jid = Jid::new(jid.text().trim())?;
            info!(jid = %self.jid, "resource bound");
        }
        let id = self.next_id();
        events.push(ProtocolEvent::Send(format!(
            "<iq type='set' id='{id}'><session xmlns='{SESSION_NS}'/></iq>"
        )));
        self.set_state(ClientState::AwaitingSessionConfirmation);
        Ok(Flow::Continue)
    }

    fn on_session_result(&mut self, doc: &Document, events: &mut Vec<ProtocolEvent>) -> Result<Flow, XmppError> {
        let root = doc.root();
        if root.local_name() != "iq"
            || root.attribute("type") != Some("result")
            || !id_matches(root.attribute("id"), self.pending_id)
        {
            return Err(self.violation(doc));
        }
        self.pending_id = None;
        events.push(ProtocolEvent::Send("<presence/>".to_string()));
        events.push(ProtocolEvent::Connected);
        info!(jid = %self.jid, "client session established");
        self.set_state(ClientState::Connected);
        Ok(Flow::Continue)
    }
}

impl Protocol for ClientProtocol {
    fn stream_header(&self) -> String {
        stream_header(true, CLIENT_NS, self.jid.domainpart(), Some("1.0"))
    }

    fn domain(&self) -> &str {
        self.jid.domainpart()
    }

    fn state_name(&self) -> &'static str {
        self.state.name()
    }

    fn is_connected(&self) -> bool {
        self.state == ClientState::Connected
    }

    fn stream_parser(&mut self) -> &mut StreamParser {
        &mut self.parser
    }

    fn receive_element(
        &mut self,
        element: StreamElement,
        events: &mut Vec<ProtocolEvent>,
    ) -> Result<Flow, XmppError> {
        let doc = match element {
            StreamElement::Start(doc) => {
                let next = match self.state {
                    ClientState::AwaitingStream => ClientState::AwaitingAuthMechanisms,
                    ClientState::AwaitingStreamAuthenticated => ClientState::AwaitingBind,
                    _ => return Err(self.violation(&doc)),
                };
                if stream_id(&doc).is_none() {
                    return Err(self.violation(&doc));
                }
                self.set_state(next);
                return Ok(Flow::Continue);
            }
            StreamElement::Stanza(doc) => doc,
            StreamElement::End => {
                events.push(ProtocolEvent::End);
                return Ok(Flow::Continue);
            }
        };
        if let Some(condition) = stream_error(&doc) {
            return Err(XmppError::StreamError(condition));
        }
        match self.state {
            ClientState::AwaitingAuthMechanisms => self.on_features(&doc, events),
            ClientState::AwaitingProceed => {
                if doc.root().local_name() == "failure" {
                    return Err(XmppError::AuthenticationFailed(
                        "server refused STARTTLS".to_string(),
                    ));
                }
                info!(domain = self.jid.domainpart(), "starting TLS");
                self.encrypted = true;
                self.set_state(ClientState::AwaitingStream);
                Ok(Flow::StartTls)
            }
            ClientState::AwaitingSaslSuccess => match doc.root().local_name() {
                "success" => {
                    info!(jid = %self.jid, "SASL authentication succeeded");
                    self.set_state(ClientState::AwaitingStreamAuthenticated);
                    Ok(Flow::RestartStream)
                }
                "failure" => Err(XmppError::AuthenticationFailed(error_condition(doc.root()))),
                _ => Err(self.violation(&doc)),
            },
            ClientState::AwaitingBind => self.on_bind_features(&doc, events),
            ClientState::AwaitingBindConfirmation => self.on_bind_result(&doc, events),
            ClientState::AwaitingSessionConfirmation => self.on_session_result(&doc, events),
            ClientState::Connected => {
                events.push(ProtocolEvent::Stanza(doc));
                Ok(Flow::Continue)
            }
            ClientState::AwaitingStream | ClientState::AwaitingStreamAuthenticated => {
                Err(self.violation(&doc))
            }
        }
    }
}
