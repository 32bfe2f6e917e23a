/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::io::Read;
use std::io::Write;
use std::net::TcpStream;
use std::net::ToSocketAddrs;
use std::time::Duration;

use tracing::error;
use tracing::info;
use tracing::warn;

use crate::Document;
use crate::RouteOutcome;
use crate::RouterHandle;

use super::ApplicationType;
use super::ClientProtocol;
use super::ComponentProtocol;
use super::Config;
use super::Resolver;
use super::Stanza;
use super::SystemDns;
use super::Transport;
use super::XmppError;
use super::constants::CLIENT_PORT;
use super::constants::COMPONENT_PORT;
use super::protocol::Protocol;
use super::protocol::ProtocolEvent;

/// Outgoing side of a connection as seen by the application.
pub trait StanzaSink {
    fn send_xml(&mut self, xml: &str) -> Result<(), XmppError>;

    fn send_stanza(&mut self, stanza: &Document) -> Result<(), XmppError> {
        self.send_xml(&stanza.to_string())
    }
}

impl<S: Read + Write> StanzaSink for Transport<S> {
    fn send_xml(&mut self, xml: &str) -> Result<(), XmppError> {
        self.send(xml)
    }
}

/// Application callbacks for connection events.
pub trait ConnectionHandler {
    /// The stream is authenticated and ready for stanzas.
    fn on_connected(&mut self, _sink: &mut dyn StanzaSink) {}

    fn on_disconnected(&mut self) {}

    /// Sees every received stanza before routing. Returns true to consume it.
    fn on_stanza(&mut self, _stanza: &Stanza, _sink: &mut dyn StanzaSink) -> bool {
        false
    }
}

impl ConnectionHandler for () {}

/// Drives a protocol over a transport and routes the received stanzas.
pub struct Connection<S: Read + Write, P: Protocol> {
    transport: Transport<S>,
    protocol: P,
    router: Option<RouterHandle>,
}

impl<S: Read + Write, P: Protocol> Connection<S, P> {
    pub fn new(transport: Transport<S>, protocol: P, router: Option<RouterHandle>) -> Self {
        Connection {
            transport,
            protocol,
            router,
        }
    }

    pub fn transport(&self) -> &Transport<S> {
        &self.transport
    }

    pub fn protocol(&self) -> &P {
        &self.protocol
    }

    /// Runs the connection until the stream ends or fails.
    ///
    /// The transport is closed and `on_disconnected` is called in both cases.
    pub fn run<H: ConnectionHandler + ?Sized>(&mut self, handler: &mut H) -> Result<(), XmppError> {
        let result = self.run_loop(handler);
        match &result {
            Err(err @ XmppError::Parse(_)) => {
                let location = self.protocol.stream_parser().location();
                error!(
                    state = self.protocol.state_name(),
                    error = %err,
                    %location,
                    "connection failed"
                );
            }
            Err(err) => {
                error!(state = self.protocol.state_name(), error = %err, "connection failed");
            }
            Ok(()) => (),
        }
        self.transport.close();
        handler.on_disconnected();
        result
    }

    fn run_loop<H: ConnectionHandler + ?Sized>(&mut self, handler: &mut H) -> Result<(), XmppError> {
        let events = self.protocol.open();
        if !self.execute(events, handler)? {
            return Ok(());
        }
        loop {
            let Some(text) = self.transport.receive()? else {
                info!(state = self.protocol.state_name(), "connection closed by remote");
                return Ok(());
            };
            let mut events = Vec::new();
            let received = self.protocol.feed(text.as_bytes(), &mut events);
            // Elements completed before a failure are still delivered
            let open = self.execute(events, handler)?;
            received?;
            if !open {
                info!("stream ended by remote");
                return Ok(());
            }
        }
    }

    /// Returns false when the stream has ended.
    fn execute<H: ConnectionHandler + ?Sized>(
        &mut self,
        events: Vec<ProtocolEvent>,
        handler: &mut H,
    ) -> Result<bool, XmppError> {
        for event in events {
            match event {
                ProtocolEvent::Send(xml) => self.transport.send(&xml)?,
                ProtocolEvent::StartTls => self.transport.start_tls(self.protocol.domain())?,
                ProtocolEvent::Connected => {
                    info!(domain = self.protocol.domain(), "connected");
                    handler.on_connected(&mut self.transport);
                }
                ProtocolEvent::Stanza(doc) => self.dispatch(Stanza::new(doc), handler),
                ProtocolEvent::End => return Ok(false),
            }
        }
        Ok(true)
    }

    fn dispatch<H: ConnectionHandler + ?Sized>(&mut self, stanza: Stanza, handler: &mut H) {
        if handler.on_stanza(&stanza, &mut self.transport) {
            return;
        }
        let Some(router) = &self.router else {
            warn!(stanza = %stanza, "no router, stanza dropped");
            return;
        };
        if let RouteOutcome::Dispatched(responses) = router.route(&stanza) {
            for response in responses {
                if let Err(err) = self.transport.send_stanza(&response) {
                    warn!(error = %err, "response not sent");
                }
            }
        }
    }
}

/// Opens a TCP connection to the first reachable address of a host.
pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<TcpStream, XmppError> {
    let mut last_error = None;
    for address in (host, port).to_socket_addrs()? {
        info!(%address, "connecting");
        match TcpStream::connect_timeout(&address, timeout) {
            Ok(stream) => return Ok(stream),
            Err(err) => {
                warn!(%address, error = %err, "connection attempt failed");
                last_error = Some(err);
            }
        }
    }
    Err(match last_error {
        Some(err) => err.into(),
        None => XmppError::ResolutionFailed(host.to_string()),
    })
}

/// Connects as configured and runs the connection until it ends.
///
/// Clients without a configured host look up the server with SRV records.
/// Components connect to their own domain on port 5347 unless configured
/// otherwise.
pub fn run<H: ConnectionHandler + ?Sized>(
    config: &Config,
    router: Option<RouterHandle>,
    handler: &mut H,
) -> Result<(), XmppError> {
    let jid = config.validate()?;
    let timeout = config.connect_timeout();
    match config.application_type {
        ApplicationType::Component => {
            let host = config.host.as_deref().unwrap_or(jid.domainpart());
            let stream = connect(host, config.port.unwrap_or(COMPONENT_PORT), timeout)?;
            let transport = Transport::new(stream).max_stanza_size(config.max_stanza_size);
            let protocol = ComponentProtocol::new(jid, config.password());
            Connection::new(transport, protocol, router).run(handler)
        }
        ApplicationType::Client => {
            let port = config.port.unwrap_or(CLIENT_PORT);
            let stream = match config.host.as_deref() {
                Some(host) => connect(host, port, timeout)?,
                None => {
                    let resolver = Resolver::new(SystemDns::new()?).default_port(port);
                    resolver.resolve(jid.domainpart(), |host, port| {
                        connect(host, port, timeout).ok()
                    })?
                }
            };
            let transport = Transport::new(stream).max_stanza_size(config.max_stanza_size);
            let protocol = ClientProtocol::new(jid, config.password()).starttls(config.starttls);
            Connection::new(transport, protocol, router).run(handler)
        }
    }
}
