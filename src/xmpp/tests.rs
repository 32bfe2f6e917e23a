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
use std::io::Read;
use std::io::Write;
use std::net::IpAddr;
use std::str::FromStr;

use crate::ActionRegistry;
use crate::Document;
use crate::RouteTable;
use crate::Router;
use crate::RouterHandle;

use super::*;

//
// Stream parser
//

fn describe(element: StreamElement) -> String {
    match element {
        StreamElement::Start(doc) => format!("start {doc}"),
        StreamElement::Stanza(doc) => doc.to_string(),
        StreamElement::End => "end".to_string(),
    }
}

fn collect(chunks: &[&[u8]]) -> Vec<String> {
    let mut parser = StreamParser::new();
    let mut elements = Vec::new();
    for chunk in chunks {
        parser
            .push(chunk, |element| elements.push(describe(element)))
            .unwrap();
    }
    elements
}

const STREAM: &str = "<?xml version='1.0'?>\
    <stream:stream xmlns='jabber:client' xmlns:stream='http://etherx.jabber.org/streams' \
    id='c2s_345' from='example.com' version='1.0'>\
    <message from='romeo@example.net' to='juliet@example.com'>\
      <body>ğüş &amp; &#x263A; &lt;3</body>\
    </message> \
    <presence/>\
    <iq type='result' id='7'><query xmlns='jabber:iq:version'><name>stanza&apos;flow</name></query></iq>\
    </stream:stream>";

#[test]
fn stream_elements() {
    assert_eq!(
        collect(&[STREAM.as_bytes()]),
        [
            "start <stream:stream xmlns=\"jabber:client\" xmlns:stream=\"http://etherx.jabber.org/streams\" id=\"c2s_345\" from=\"example.com\" version=\"1.0\"/>",
            "<message from=\"romeo@example.net\" to=\"juliet@example.com\"><body>ğüş &amp; ☺ &lt;3</body></message>",
            "<presence/>",
            "<iq type=\"result\" id=\"7\"><query xmlns=\"jabber:iq:version\"><name>stanza&apos;flow</name></query></iq>",
            "end",
        ]
    );
}

#[test]
fn chunking_invariance() {
    let bytes = STREAM.as_bytes();
    let expected = collect(&[bytes]);
    for split in 1..bytes.len() {
        assert_eq!(
            collect(&[&bytes[..split], &bytes[split..]]),
            expected,
            "split at {split}"
        );
    }
    let single_bytes: Vec<&[u8]> = bytes.chunks(1).collect();
    assert_eq!(collect(&single_bytes), expected);
    let triples: Vec<&[u8]> = bytes.chunks(3).collect();
    assert_eq!(collect(&triples), expected);
}

#[test]
fn stream_open_is_immediate() {
    let mut parser = StreamParser::new();
    let header = b"<stream:stream xmlns:stream='http://etherx.jabber.org/streams' id='abc'>";
    match parser.parse_bytes(header).unwrap() {
        Some((StreamElement::Start(doc), consumed)) => {
            assert_eq!(consumed, header.len());
            assert_eq!(doc.attribute("id"), Some("abc"));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(parser.is_stream_open());
    assert!(parser.is_idle());
    assert!(parser.parse_bytes(b"").unwrap().is_none());
}

#[test]
fn idle_between_stanzas() {
    let mut parser = StreamParser::new();
    parser
        .push(b"<stream:stream xmlns:stream='http://etherx.jabber.org/streams'>", |_| ())
        .unwrap();
    let mut count = 0;
    parser.push(b"<message><body>hel", |_| count += 1).unwrap();
    assert!(!parser.is_idle());
    parser.push(b"lo</body></message>", |_| count += 1).unwrap();
    assert!(parser.is_idle());
    assert_eq!(count, 1);
    // Whitespace keepalive
    parser.push(b" \n ", |_| count += 1).unwrap();
    assert!(parser.is_idle());
    assert_eq!(count, 1);
}

#[test]
fn stanzas_inherit_stream_namespaces() {
    let mut parser = StreamParser::new();
    let text = b"<stream:stream xmlns='jabber:component:accept' xmlns:stream='http://etherx.jabber.org/streams'>\
        <stream:features><bind/></stream:features><message/>";
    let elements: Vec<StreamElement> = parser.elements(text).map(|e| e.unwrap()).collect();
    assert_eq!(elements.len(), 3);
    let StreamElement::Stanza(features) = &elements[1] else {
        panic!("not a stanza");
    };
    assert_eq!(features.root().namespace_uri(), Some(constants::STREAM_NS));
    assert_eq!(features.to_string(), "<stream:features><bind/></stream:features>");
    let StreamElement::Stanza(message) = &elements[2] else {
        panic!("not a stanza");
    };
    assert_eq!(message.root().namespace_uri(), Some("jabber:component:accept"));
}

#[test]
fn reset_starts_a_new_stream() {
    let mut parser = StreamParser::new();
    parser
        .push(b"<stream:stream xmlns:stream='http://etherx.jabber.org/streams' id='1'><mess", |_| ())
        .unwrap();
    parser.reset();
    assert!(parser.is_idle());
    assert!(!parser.is_stream_open());
    let elements = collect(&[b"<stream:stream id='2'/>"]);
    assert_eq!(elements, ["start <stream:stream id=\"2\"/>", "end"]);
    let mut found = Vec::new();
    parser
        .push(b"<?xml version='1.0'?><stream:stream id='2'><a/>", |e| found.push(describe(e)))
        .unwrap();
    assert_eq!(found, ["start <stream:stream id=\"2\"/>", "<a/>"]);
}

#[test]
fn bad_streams() {
    let mut parser = StreamParser::new();
    let result = parser.push(b"<stream:stream><a></b>", |_| ());
    assert!(matches!(result, Err(StreamError::BadXml(_))));

    let mut parser = StreamParser::new();
    let mut seen = 0;
    let result = parser.push(b"<stream:stream>\n<a/>\n<b></c>", |_| seen += 1);
    assert!(matches!(result, Err(StreamError::BadXml(_))));
    assert_eq!(seen, 2);
    assert_eq!(parser.location().lines, 2);

    let mut parser = StreamParser::new();
    let result = parser.push(b"<stream:stream><a/></stream:streams>", |_| ());
    assert_eq!(result, Err(StreamError::BadXml(error::description::STREAM_TAG_MISMATCH)));

    let mut parser = StreamParser::new();
    let mut elements = parser.elements(b"<stream:stream><a/><b x='1' x='2'/><c/>");
    assert!(matches!(elements.next(), Some(Ok(StreamElement::Start(_)))));
    assert!(matches!(elements.next(), Some(Ok(StreamElement::Stanza(_)))));
    assert!(matches!(elements.next(), Some(Err(_))));
    assert!(elements.next().is_none());
}

//
// Transport
//

struct MockStream {
    input: VecDeque<Vec<u8>>,
    output: Vec<u8>,
}

impl MockStream {
    fn new(chunks: &[&str]) -> Self {
        MockStream {
            input: chunks.iter().map(|chunk| chunk.as_bytes().to_vec()).collect(),
            output: Vec::new(),
        }
    }

    fn from_bytes(chunks: &[&[u8]]) -> Self {
        MockStream {
            input: chunks.iter().map(|chunk| chunk.to_vec()).collect(),
            output: Vec::new(),
        }
    }
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let Some(chunk) = self.input.front_mut() else {
            return Ok(0);
        };
        let size = chunk.len().min(buf.len());
        buf[..size].copy_from_slice(&chunk[..size]);
        chunk.drain(..size);
        if chunk.is_empty() {
            self.input.pop_front();
        }
        Ok(size)
    }
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.output.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn written<P: Protocol>(connection: &Connection<MockStream, P>) -> String {
    let stream = connection.transport().get_ref().unwrap();
    String::from_utf8(stream.output.clone()).unwrap()
}

#[test]
fn oversized_stanza_is_not_sent() {
    let mut transport = Transport::new(MockStream::new(&[])).max_stanza_size(10);
    let result = transport.send("<message>too long</message>");
    assert!(matches!(result, Err(XmppError::StanzaTooBig { size: 27, max: 10 })));
    assert!(transport.get_ref().unwrap().output.is_empty());
    assert!(transport.is_connected());

    transport.send("").unwrap();
    transport.send("<a/>").unwrap();
    assert_eq!(transport.get_ref().unwrap().output, b"<a/>");

    transport.close();
    assert!(matches!(transport.send("<b/>"), Err(XmppError::NotConnected)));
    assert!(matches!(transport.receive(), Err(XmppError::NotConnected)));
    assert_eq!(transport.get_ref().unwrap().output, b"<a/>");
}

#[test]
fn receive_sanitizes_utf8() {
    let mut transport = Transport::new(MockStream::from_bytes(&[
        b"<a>\xc4",
        b"\x9f\xff</a>",
    ]));
    assert_eq!(transport.receive().unwrap().as_deref(), Some("<a>"));
    assert_eq!(transport.receive().unwrap().as_deref(), Some("ğ\u{fffd}</a>"));
    assert_eq!(transport.receive().unwrap(), None);
    assert!(!transport.is_connected());
}

#[test]
fn start_tls_drops_partial_input() {
    let mut transport = Transport::new(MockStream::from_bytes(&[b"<proceed/>\xc4"]));
    assert_eq!(transport.receive().unwrap().as_deref(), Some("<proceed/>"));
    assert!(transport.has_pending_input());
    transport.start_tls("example.com").unwrap();
    assert!(transport.is_encrypted());
    assert!(!transport.has_pending_input());
}

#[test]
fn utf8_cleaner() {
    let mut cleaner = Utf8Cleaner::new();
    assert_eq!(cleaner.clean(b"abc"), "abc");
    assert_eq!(cleaner.clean(b"\xe2\x98"), "");
    assert!(cleaner.has_pending());
    assert_eq!(cleaner.clean(b"\xba!"), "☺!");
    assert!(!cleaner.has_pending());
    assert_eq!(cleaner.clean(b"a\x80b\xc0\xafc"), "a\u{fffd}b\u{fffd}\u{fffd}c");
    assert_eq!(cleaner.clean(b"\xf0\x9f\x98\x80"), "😀");
}

//
// Component
//

const COMPONENT_HEADER: &str = "<stream:stream xmlns='jabber:component:accept' xmlns:stream='http://etherx.jabber.org/streams' to='echo.localhost'>";
const SERVER_COMPONENT_HEADER: &str = "<?xml version='1.0'?><stream:stream xmlns:stream='http://etherx.jabber.org/streams' xmlns='jabber:component:accept' id='3BF96D32' from='echo.localhost'>";

#[derive(Default)]
struct Recorder {
    connected: usize,
    disconnected: usize,
    seen: Vec<String>,
    consume: bool,
}

impl ConnectionHandler for Recorder {
    fn on_connected(&mut self, sink: &mut dyn StanzaSink) {
        self.connected += 1;
        let presence = Document::from_str("<presence from='echo.localhost'/>").unwrap();
        sink.send_stanza(&presence).unwrap();
    }

    fn on_disconnected(&mut self) {
        self.disconnected += 1;
    }

    fn on_stanza(&mut self, stanza: &Stanza, _sink: &mut dyn StanzaSink) -> bool {
        self.seen.push(stanza.name().to_string());
        self.consume
    }
}

fn echo_router() -> RouterHandle {
    let table = RouteTable::builder()
        .xpath("/message[body]")
        .to("echo", "message")
        .build()
        .unwrap();
    let mut actions = ActionRegistry::new();
    actions.register("echo", "message", |stanza| {
        let mut reply = Document::new("message");
        reply
            .root_mut()
            .insert_attribute("to", stanza.from().unwrap_or(""))?
            .insert_attribute("from", stanza.to().unwrap_or(""))?
            .insert_tag("body")?
            .insert_cdata(&stanza.root().find_tag("body").text())?;
        Ok(vec![reply])
    });
    Router::new(table, actions).unwrap().into_handle()
}

#[test]
fn handshake_digest_value() {
    assert_eq!(
        handshake_digest("3BF96D32", "secret"),
        "b09ea9b3b7f586be8a08d0a3dd7466f110aeb136"
    );
    assert_eq!(handshake_digest("abc", "def"), "1f8ac10f23c5b5bc1167bda84b833e5c057a77d2");
}

#[test]
fn component_session() {
    let stream = MockStream::new(&[
        SERVER_COMPONENT_HEADER,
        "<handshake/>",
        "<message from='romeo@example.net' to='echo.localhost'><body>hi &amp; bye</body></message>",
        "<message from='romeo@example.net' to='echo.localhost'/></stream:stream>",
    ]);
    let protocol = ComponentProtocol::new(Jid::new("echo.localhost").unwrap(), "secret");
    let mut connection = Connection::new(Transport::new(stream), protocol, Some(echo_router()));
    let mut recorder = Recorder::default();
    connection.run(&mut recorder).unwrap();

    assert_eq!(
        written(&connection),
        format!(
            "{COMPONENT_HEADER}\
            <handshake>b09ea9b3b7f586be8a08d0a3dd7466f110aeb136</handshake>\
            <presence from=\"echo.localhost\"/>\
            <message to=\"romeo@example.net\" from=\"echo.localhost\"><body>hi &amp; bye</body></message>"
        )
    );
    assert_eq!(connection.protocol().state(), ComponentState::Connected);
    assert_eq!(recorder.connected, 1);
    assert_eq!(recorder.disconnected, 1);
    assert_eq!(recorder.seen, ["message", "message"]);
    assert!(!connection.transport().is_connected());
}

#[test]
fn component_handler_consumes_stanzas() {
    let stream = MockStream::new(&[
        SERVER_COMPONENT_HEADER,
        "<handshake></handshake><message from='a@b' to='echo.localhost'><body>x</body></message>",
    ]);
    let protocol = ComponentProtocol::new(Jid::new("echo.localhost").unwrap(), "secret");
    let mut connection = Connection::new(Transport::new(stream), protocol, Some(echo_router()));
    let mut recorder = Recorder {
        consume: true,
        ..Default::default()
    };
    connection.run(&mut recorder).unwrap();
    assert!(!written(&connection).contains("<body>x</body>"));
    assert_eq!(recorder.seen, ["message"]);
    assert_eq!(recorder.disconnected, 1);
}

fn component_events(chunks: &[&str]) -> Result<Vec<ProtocolEvent>, XmppError> {
    let mut protocol = ComponentProtocol::new(Jid::new("echo.localhost").unwrap(), "secret");
    protocol.open();
    let mut events = Vec::new();
    for chunk in chunks {
        events.extend(protocol.receive_bytes(chunk.as_bytes())?);
    }
    Ok(events)
}

#[test]
fn component_failures() {
    let result = component_events(&[
        SERVER_COMPONENT_HEADER,
        "<stream:error><not-authorized xmlns='urn:ietf:params:xml:ns:xmpp-streams'/></stream:error>",
    ]);
    match result {
        Err(XmppError::AuthenticationFailed(condition)) => assert_eq!(condition, "not-authorized"),
        other => panic!("unexpected {other:?}"),
    }

    let result = component_events(&[
        "<stream:stream xmlns:stream='http://etherx.jabber.org/streams'>",
    ]);
    assert!(matches!(result, Err(XmppError::ProtocolViolation { state: "awaiting-stream", .. })));

    let result = component_events(&[SERVER_COMPONENT_HEADER, "<message/>"]);
    match result {
        Err(XmppError::ProtocolViolation { state, element }) => {
            assert_eq!(state, "awaiting-handshake-result");
            assert_eq!(element, "message");
        }
        other => panic!("unexpected {other:?}"),
    }

    let result = component_events(&[
        SERVER_COMPONENT_HEADER,
        "<handshake/><stream:error><conflict xmlns='urn:ietf:params:xml:ns:xmpp-streams'/>\
        <text xmlns='urn:ietf:params:xml:ns:xmpp-streams'>bye</text></stream:error>",
    ]);
    match result {
        Err(XmppError::StreamError(condition)) => assert_eq!(condition, "conflict"),
        other => panic!("unexpected {other:?}"),
    }

    let result = component_events(&[SERVER_COMPONENT_HEADER, "<message></iq>"]);
    assert!(matches!(result, Err(XmppError::Parse(StreamError::BadXml(_)))));
}

#[test]
fn component_failure_disconnects() {
    let stream = MockStream::new(&[SERVER_COMPONENT_HEADER, "<iq type='get'/>"]);
    let protocol = ComponentProtocol::new(Jid::new("echo.localhost").unwrap(), "secret");
    let mut connection = Connection::new(Transport::new(stream), protocol, None);
    let mut recorder = Recorder::default();
    let result = connection.run(&mut recorder);
    assert!(matches!(result, Err(XmppError::ProtocolViolation { .. })));
    assert!(result.unwrap_err().is_fatal());
    assert_eq!(recorder.connected, 0);
    assert_eq!(recorder.disconnected, 1);
    assert!(!connection.transport().is_connected());
}

#[test]
fn elements_before_a_failure_are_delivered() {
    let mut protocol = ComponentProtocol::new(Jid::new("echo.localhost").unwrap(), "secret");
    protocol.open();
    let mut events = Vec::new();
    let result = protocol.feed(
        format!("{SERVER_COMPONENT_HEADER}<handshake/><message><body>hi</body></message><a></b>").as_bytes(),
        &mut events,
    );
    assert!(matches!(result, Err(XmppError::Parse(StreamError::BadXml(_)))));
    assert_eq!(events.len(), 3);
    assert!(matches!(&events[0], ProtocolEvent::Send(xml) if xml.starts_with("<handshake>")));
    assert!(matches!(events[1], ProtocolEvent::Connected));
    assert!(matches!(&events[2], ProtocolEvent::Stanza(doc) if doc.root().name() == "message"));

    let stream = MockStream::new(&[
        SERVER_COMPONENT_HEADER,
        "<handshake/><message from='romeo@example.net' to='echo.localhost'><body>hi</body></message><a></b>",
    ]);
    let protocol = ComponentProtocol::new(Jid::new("echo.localhost").unwrap(), "secret");
    let mut connection = Connection::new(Transport::new(stream), protocol, Some(echo_router()));
    let mut recorder = Recorder::default();
    let result = connection.run(&mut recorder);
    assert!(matches!(result, Err(XmppError::Parse(_))));
    assert_eq!(recorder.connected, 1);
    assert_eq!(recorder.seen, ["message"]);
    assert_eq!(recorder.disconnected, 1);
    assert!(written(&connection).ends_with(
        "<presence from=\"echo.localhost\"/>\
        <message to=\"romeo@example.net\" from=\"echo.localhost\"><body>hi</body></message>"
    ));
}

//
// Client
//

const CLIENT_HEADER: &str = "<?xml version='1.0'?><stream:stream xmlns='jabber:client' xmlns:stream='http://etherx.jabber.org/streams' to='example.com' version='1.0'>";
const SERVER_CLIENT_HEADER: &str = "<?xml version='1.0'?><stream:stream xmlns='jabber:client' xmlns:stream='http://etherx.jabber.org/streams' id='s1' from='example.com' version='1.0'>";
const PLAIN_FEATURES: &str = "<stream:features><mechanisms xmlns='urn:ietf:params:xml:ns:xmpp-sasl'>\
    <mechanism>SCRAM-SHA-1</mechanism><mechanism>PLAIN</mechanism></mechanisms></stream:features>";
const TLS_FEATURES: &str = "<stream:features><starttls xmlns='urn:ietf:params:xml:ns:xmpp-tls'><required/></starttls>\
    <mechanisms xmlns='urn:ietf:params:xml:ns:xmpp-sasl'><mechanism>PLAIN</mechanism></mechanisms></stream:features>";
const BIND_FEATURES: &str = "<stream:features><bind xmlns='urn:ietf:params:xml:ns:xmpp-bind'/>\
    <session xmlns='urn:ietf:params:xml:ns:xmpp-session'/></stream:features>";
const AUTH: &str = "<auth xmlns='urn:ietf:params:xml:ns:xmpp-sasl' mechanism='PLAIN'>anVsaWV0QGV4YW1wbGUuY29tL2JhbGNvbnkAanVsaWV0AHNlY3JldA==</auth>";

fn client() -> ClientProtocol {
    ClientProtocol::new(Jid::new("juliet@example.com/balcony").unwrap(), "secret")
}

fn sent(events: &[ProtocolEvent]) -> Vec<&str> {
    events
        .iter()
        .filter_map(|event| match event {
            ProtocolEvent::Send(xml) => Some(xml.as_str()),
            _ => None,
        })
        .collect()
}

#[test]
fn plain_credentials_value() {
    let jid = Jid::new("juliet@example.com/balcony").unwrap();
    assert_eq!(
        plain_credentials(&jid, "secret"),
        "anVsaWV0QGV4YW1wbGUuY29tL2JhbGNvbnkAanVsaWV0AHNlY3JldA=="
    );
}

#[test]
fn client_session() {
    let stream = MockStream::new(&[
        SERVER_CLIENT_HEADER,
        PLAIN_FEATURES,
        "<success xmlns='urn:ietf:params:xml:ns:xmpp-sasl'/>",
        SERVER_CLIENT_HEADER,
        BIND_FEATURES,
        "<iq type='result' id='001'><bind xmlns='urn:ietf:params:xml:ns:xmpp-bind'>\
        <jid>juliet@example.com/balcony-4a7f</jid></bind></iq>",
        "<iq type='result' id='2'/>",
        "<message from='romeo@example.net/orchard' to='juliet@example.com/balcony-4a7f'>\
        <body>art thou</body></message>",
    ]);
    let mut connection = Connection::new(Transport::new(stream), client(), Some(echo_router()));
    let mut recorder = Recorder::default();
    connection.run(&mut recorder).unwrap();

    assert_eq!(
        written(&connection),
        format!(
            "{CLIENT_HEADER}{AUTH}{CLIENT_HEADER}\
            <iq type=\"set\" id=\"1\"><bind xmlns=\"urn:ietf:params:xml:ns:xmpp-bind\"><resource>balcony</resource></bind></iq>\
            <iq type='set' id='2'><session xmlns='urn:ietf:params:xml:ns:xmpp-session'/></iq>\
            <presence/>\
            <presence from=\"echo.localhost\"/>\
            <message to=\"romeo@example.net/orchard\" from=\"juliet@example.com/balcony-4a7f\"><body>art thou</body></message>"
        )
    );
    assert_eq!(connection.protocol().state(), ClientState::Connected);
    assert_eq!(connection.protocol().jid().full(), "juliet@example.com/balcony-4a7f");
    assert_eq!(recorder.connected, 1);
    assert_eq!(recorder.disconnected, 1);
}

#[test]
fn client_starttls() {
    let mut protocol = client();
    assert_eq!(sent(&protocol.open()), [CLIENT_HEADER]);
    protocol.receive_bytes(SERVER_CLIENT_HEADER.as_bytes()).unwrap();
    assert_eq!(protocol.state(), ClientState::AwaitingAuthMechanisms);

    let events = protocol.receive_bytes(TLS_FEATURES.as_bytes()).unwrap();
    assert_eq!(sent(&events), ["<starttls xmlns='urn:ietf:params:xml:ns:xmpp-tls'/>"]);
    assert_eq!(protocol.state(), ClientState::AwaitingProceed);

    // Plaintext after proceed is dropped
    let events = protocol
        .receive_bytes(b"<proceed xmlns='urn:ietf:params:xml:ns:xmpp-tls'/><message><body>injected")
        .unwrap();
    assert!(matches!(
        events.as_slice(),
        [ProtocolEvent::StartTls, ProtocolEvent::Send(header)] if header == CLIENT_HEADER
    ));
    assert_eq!(protocol.state(), ClientState::AwaitingStream);
    assert!(protocol.is_encrypted());

    protocol.receive_bytes(SERVER_CLIENT_HEADER.as_bytes()).unwrap();
    let events = protocol.receive_bytes(TLS_FEATURES.as_bytes()).unwrap();
    assert_eq!(sent(&events), [AUTH]);
    assert_eq!(protocol.state(), ClientState::AwaitingSaslSuccess);

    // Restarted stream in the same read as the success
    let success = format!("<success xmlns='urn:ietf:params:xml:ns:xmpp-sasl'/>{SERVER_CLIENT_HEADER}{BIND_FEATURES}");
    let events = protocol.receive_bytes(success.as_bytes()).unwrap();
    assert_eq!(sent(&events).len(), 2);
    assert_eq!(sent(&events)[0], CLIENT_HEADER);
    assert!(sent(&events)[1].starts_with("<iq type=\"set\" id=\"1\"><bind"));
    assert_eq!(protocol.state(), ClientState::AwaitingBindConfirmation);
    assert!(!protocol.is_connected());
}

#[test]
fn client_without_starttls() {
    let mut protocol = client().starttls(false);
    protocol.open();
    let text = format!("{SERVER_CLIENT_HEADER}{TLS_FEATURES}");
    let events = protocol.receive_bytes(text.as_bytes()).unwrap();
    assert_eq!(sent(&events), [AUTH]);
}

fn client_result(chunks: &[&str]) -> Result<ClientProtocol, XmppError> {
    let mut protocol = client();
    protocol.open();
    for chunk in chunks {
        protocol.receive_bytes(chunk.as_bytes())?;
    }
    Ok(protocol)
}

#[test]
fn client_failures() {
    let result = client_result(&[
        SERVER_CLIENT_HEADER,
        PLAIN_FEATURES,
        "<failure xmlns='urn:ietf:params:xml:ns:xmpp-sasl'><not-authorized/><text>wrong</text></failure>",
    ]);
    match result.err() {
        Some(XmppError::AuthenticationFailed(condition)) => assert_eq!(condition, "not-authorized"),
        other => panic!("unexpected {other:?}"),
    }

    let result = client_result(&[
        SERVER_CLIENT_HEADER,
        PLAIN_FEATURES,
        "<failure xmlns='urn:ietf:params:xml:ns:xmpp-sasl'><account-disabled/></failure>",
    ]);
    match result.err() {
        Some(XmppError::AuthenticationFailed(condition)) => assert_eq!(condition, "account-disabled"),
        other => panic!("unexpected {other:?}"),
    }

    let result = client_result(&[
        SERVER_CLIENT_HEADER,
        "<stream:features><mechanisms xmlns='urn:ietf:params:xml:ns:xmpp-sasl'>\
        <mechanism>EXTERNAL</mechanism></mechanisms></stream:features>",
    ]);
    assert!(matches!(result.err(), Some(XmppError::AuthenticationFailed(_))));

    let result = client_result(&[SERVER_CLIENT_HEADER, "<message/>"]);
    match result.err() {
        Some(XmppError::ProtocolViolation { state, element }) => {
            assert_eq!(state, "awaiting-auth-mechanisms");
            assert_eq!(element, "message");
        }
        other => panic!("unexpected {other:?}"),
    }

    // Stream tag without an id
    let result = client_result(&["<stream:stream xmlns:stream='http://etherx.jabber.org/streams'>"]);
    assert!(matches!(result.err(), Some(XmppError::ProtocolViolation { .. })));

    let result = client_result(&[
        SERVER_CLIENT_HEADER,
        "<stream:error><host-unknown xmlns='urn:ietf:params:xml:ns:xmpp-streams'/></stream:error>",
    ]);
    match result.err() {
        Some(XmppError::StreamError(condition)) => assert_eq!(condition, "host-unknown"),
        other => panic!("unexpected {other:?}"),
    }

    let bound = [
        SERVER_CLIENT_HEADER,
        PLAIN_FEATURES,
        "<success xmlns='urn:ietf:params:xml:ns:xmpp-sasl'/>",
        SERVER_CLIENT_HEADER,
        BIND_FEATURES,
    ];
    let mut chunks = bound.to_vec();
    chunks.push("<iq type='result' id='99'/>");
    assert!(matches!(
        client_result(&chunks).err(),
        Some(XmppError::ProtocolViolation { state: "awaiting-bind-confirmation", .. })
    ));

    let mut chunks = bound.to_vec();
    chunks.push("<iq type='error' id='1'><error type='cancel'><conflict xmlns='urn:ietf:params:xml:ns:xmpp-stanzas'/></error></iq>");
    match client_result(&chunks).err() {
        Some(XmppError::AuthenticationFailed(condition)) => assert!(condition.contains("conflict")),
        other => panic!("unexpected {other:?}"),
    }

    let mut chunks = bound.to_vec();
    chunks.push("<iq type='result' id='1'/>");
    chunks.push("<iq type='result' id='1'/>");
    assert!(matches!(
        client_result(&chunks).err(),
        Some(XmppError::ProtocolViolation { state: "awaiting-session-confirmation", .. })
    ));
}

#[test]
fn client_generates_resource() {
    let mut protocol = ClientProtocol::new(Jid::new("juliet@example.com").unwrap(), "secret");
    protocol.open();
    let text = format!(
        "{SERVER_CLIENT_HEADER}{PLAIN_FEATURES}<success xmlns='urn:ietf:params:xml:ns:xmpp-sasl'/>{SERVER_CLIENT_HEADER}{BIND_FEATURES}"
    );
    let events = protocol.receive_bytes(text.as_bytes()).unwrap();
    let bind = sent(&events).last().copied().unwrap();
    let iq = Document::from_str(bind).unwrap();
    let resource = iq.root().find_tag("bind").find_tag("resource").text();
    assert!(resource.starts_with("stanzaflow_"));
    // Without a <jid> in the result the requested resource is kept
    protocol.receive_bytes(b"<iq type='result' id='1'/>").unwrap();
    assert_eq!(protocol.jid().resourcepart(), None);
    assert_eq!(protocol.state(), ClientState::AwaitingSessionConfirmation);
}

//
// Resolver
//

struct StaticDns {
    srv: Vec<SrvRecord>,
    ips: Vec<IpAddr>,
}

impl DnsLookup for StaticDns {
    fn srv(&self, name: &str) -> Result<Vec<SrvRecord>, XmppError> {
        assert_eq!(name, "_xmpp-client._tcp.example.com");
        Ok(self.srv.clone())
    }

    fn ip(&self, host: &str) -> Result<Vec<IpAddr>, XmppError> {
        assert_eq!(host, "example.com");
        Ok(self.ips.clone())
    }
}

fn srv(priority: u16, port: u16, target: &str) -> SrvRecord {
    SrvRecord {
        priority,
        weight: 0,
        port,
        target: target.to_string(),
    }
}

#[test]
fn srv_order() {
    let resolver = Resolver::new(StaticDns {
        srv: vec![
            srv(20, 5224, "backup.example.com."),
            srv(0, 5222, "."),
            srv(10, 5223, "xmpp.example.com."),
        ],
        ips: Vec::new(),
    });
    assert_eq!(
        resolver.srv_candidates("example.com").unwrap(),
        [
            ("xmpp.example.com".to_string(), 5223),
            ("backup.example.com".to_string(), 5224)
        ]
    );
    let mut attempts = Vec::new();
    let result = resolver.resolve("example.com", |host, port| {
        attempts.push(format!("{host}:{port}"));
        (port == 5224).then_some(port)
    });
    assert_eq!(result.unwrap(), 5224);
    assert_eq!(attempts, ["xmpp.example.com:5223", "backup.example.com:5224"]);
}

#[test]
fn srv_falls_back_to_addresses() {
    let resolver = Resolver::new(StaticDns {
        srv: vec![srv(10, 5222, "down.example.com")],
        ips: vec!["192.0.2.1".parse().unwrap()],
    });
    let mut attempts = Vec::new();
    let result = resolver.resolve("example.com", |host, port| {
        attempts.push(format!("{host}:{port}"));
        (host == "192.0.2.1").then(|| host.to_string())
    });
    assert_eq!(result.unwrap(), "192.0.2.1");
    assert_eq!(attempts, ["down.example.com:5222", "192.0.2.1:5222"]);

    let resolver = Resolver::new(StaticDns {
        srv: Vec::new(),
        ips: vec!["192.0.2.7".parse().unwrap()],
    })
    .default_port(5999);
    let result = resolver.resolve("example.com", |host, port| Some(format!("{host}:{port}")));
    assert_eq!(result.unwrap(), "192.0.2.7:5999");
}

#[test]
fn resolution_failure() {
    let resolver = Resolver::new(StaticDns {
        srv: vec![srv(10, 5222, "a.example.com"), srv(10, 5222, "b.example.com")],
        ips: vec!["192.0.2.1".parse().unwrap(), "2001:db8::1".parse().unwrap()],
    });
    let mut attempts = 0;
    let result: Result<(), XmppError> = resolver.resolve("example.com", |_, _| {
        attempts += 1;
        None
    });
    assert!(matches!(result, Err(XmppError::ResolutionFailed(domain)) if domain == "example.com"));
    assert_eq!(attempts, 4);
}

//
// Stanza
//

#[test]
fn stanza_accessors() {
    let stanza = Stanza::new(
        Document::from_str("<iq from='a@b/c' to='d' id='x1' type='get'><ping xmlns='urn:xmpp:ping'/></iq>").unwrap(),
    );
    assert_eq!(stanza.kind(), StanzaKind::Iq);
    assert_eq!(stanza.name(), "iq");
    assert_eq!(stanza.from(), Some("a@b/c"));
    assert_eq!(stanza.to(), Some("d"));
    assert_eq!(stanza.id(), Some("x1"));
    assert_eq!(stanza.stanza_type(), Some("get"));

    let stanza: Stanza = Document::from_str("<stream:features/>").unwrap().into();
    assert_eq!(stanza.kind(), StanzaKind::Other);
    assert_eq!(stanza.name(), "features");
    assert_eq!(stanza.from(), None);
    assert_eq!(stanza.to_string(), "<stream:features/>");
}
