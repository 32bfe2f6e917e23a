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
use std::sync::Arc;

use rustls::ClientConfig;
use rustls::ClientConnection;
use rustls::RootCertStore;
use rustls::StreamOwned;
use rustls::pki_types::ServerName;
use tracing::debug;
use tracing::info;

use super::XmppError;
use super::constants::DEFAULT_MAX_STANZA_SIZE;

const READ_BUFFER_SIZE: usize = 4096;

/// Turns a byte stream into valid UTF-8 text.
///
/// Invalid sequences are replaced with U+FFFD. A code point split between
/// two chunks is kept until the rest of it arrives.
#[derive(Debug, Default)]
pub struct Utf8Cleaner {
    pending: Vec<u8>,
}

impl Utf8Cleaner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clean(&mut self, bytes: &[u8]) -> String {
        let mut input = std::mem::take(&mut self.pending);
        input.extend_from_slice(bytes);
        let mut text = String::with_capacity(input.len());
        let mut rest = input.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    text.push_str(valid);
                    break;
                }
                Err(err) => {
                    let (valid, invalid) = rest.split_at(err.valid_up_to());
                    text.push_str(std::str::from_utf8(valid).unwrap_or_default());
                    match err.error_len() {
                        Some(len) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            rest = &invalid[len..];
                        }
                        None => {
                            // Truncated sequence at the end
                            self.pending = invalid.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        text
    }

    /// True if an incomplete code point is waiting for more bytes.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

enum Stream<S: Read + Write> {
    Plain(S),
    Tls(Box<StreamOwned<ClientConnection, S>>),
    Closed,
}

/// Socket side of a connection.
///
/// Works on any `Read + Write` stream, a `TcpStream` in production. The
/// stream can be upgraded to TLS in place.
pub struct Transport<S: Read + Write> {
    stream: Stream<S>,
    connected: bool,
    max_stanza_size: usize,
    cleaner: Utf8Cleaner,
    buffer: Vec<u8>,
}

impl<S: Read + Write> Transport<S> {
    pub fn new(stream: S) -> Self {
        Transport {
            stream: Stream::Plain(stream),
            connected: true,
            max_stanza_size: DEFAULT_MAX_STANZA_SIZE,
            cleaner: Utf8Cleaner::new(),
            buffer: vec![0; READ_BUFFER_SIZE],
        }
    }

    /// Sets the largest payload `send` accepts, in bytes.
    pub fn max_stanza_size(mut self, size: usize) -> Self {
        self.max_stanza_size = size;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self.stream, Stream::Tls(_))
    }

    /// True if received bytes end in an incomplete code point.
    pub fn has_pending_input(&self) -> bool {
        self.cleaner.has_pending()
    }

    /// The underlying stream, `None` after a failed TLS upgrade.
    pub fn get_ref(&self) -> Option<&S> {
        match &self.stream {
            Stream::Plain(stream) => Some(stream),
            Stream::Tls(tls) => Some(&tls.sock),
            Stream::Closed => None,
        }
    }

    fn writer(&mut self) -> Option<&mut dyn Write> {
        match &mut self.stream {
            Stream::Plain(stream) => Some(stream),
            Stream::Tls(tls) => Some(tls.as_mut()),
            Stream::Closed => None,
        }
    }

    /// Writes serialized XML to the stream.
    ///
    /// Empty payloads are ignored. Payloads over the size limit are rejected
    /// without writing anything.
    pub fn send(&mut self, xml: &str) -> Result<(), XmppError> {
        if !self.connected {
            return Err(XmppError::NotConnected);
        }
        if xml.is_empty() {
            return Ok(());
        }
        if xml.len() > self.max_stanza_size {
            return Err(XmppError::StanzaTooBig {
                size: xml.len(),
                max: self.max_stanza_size,
            });
        }
        debug!(bytes = xml.len(), xml, "send");
        let Some(writer) = self.writer() else {
            self.connected = false;
            return Err(XmppError::NotConnected);
        };
        let result = writer.write_all(xml.as_bytes()).and_then(|_| writer.flush());
        if let Err(err) = result {
            self.connected = false;
            return Err(err.into());
        }
        Ok(())
    }

    /// Reads the next chunk of text from the stream.
    ///
    /// Returns `None` when the remote closed the stream.
    pub fn receive(&mut self) -> Result<Option<String>, XmppError> {
        if !self.connected {
            return Err(XmppError::NotConnected);
        }
        let result = match &mut self.stream {
            Stream::Plain(stream) => stream.read(&mut self.buffer),
            Stream::Tls(tls) => tls.read(&mut self.buffer),
            Stream::Closed => Ok(0),
        };
        match result {
            Ok(0) => {
                debug!("stream reached end of file");
                self.connected = false;
                Ok(None)
            }
            Ok(size) => {
                let text = self.cleaner.clean(&self.buffer[..size]);
                debug!(bytes = size, xml = text.as_str(), "receive");
                Ok(Some(text))
            }
            Err(err) => {
                self.connected = false;
                Err(err.into())
            }
        }
    }

    /// Upgrades the stream to TLS, verifying the server as `domain`.
    pub fn start_tls(&mut self, domain: &str) -> Result<(), XmppError> {
        if !matches!(self.stream, Stream::Plain(_)) {
            return Err(XmppError::Config("stream is not a plain connection".to_string()));
        }
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let config = ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();
        let server_name = ServerName::try_from(domain.to_string())
            .map_err(|err| XmppError::Config(format!("invalid TLS server name {domain}: {err}")))?;
        let connection = ClientConnection::new(Arc::new(config), server_name)?;
        if let Stream::Plain(stream) = std::mem::replace(&mut self.stream, Stream::Closed) {
            self.stream = Stream::Tls(Box::new(StreamOwned::new(connection, stream)));
        }
        // Partial plaintext code points do not continue in the TLS stream
        self.cleaner = Utf8Cleaner::new();
        info!(domain, "TLS enabled on stream");
        Ok(())
    }

    /// Marks the transport as disconnected, later sends fail.
    pub fn close(&mut self) {
        if self.connected {
            debug!("closing transport");
        }
        self.connected = false;
    }
}
