/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::error::Error;
use std::fmt::Display;

use crate::ParseError;

use super::BadJid;

#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum StreamError {
    NoMemory,
    BadXml(&'static str),
}

impl Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamError::NoMemory => write!(f, "not enough memory"),
            StreamError::BadXml(msg) => write!(f, "invalid XML syntax: {msg}"),
        }
    }
}

impl Error for StreamError {}

impl From<ParseError> for StreamError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::NoMemory => StreamError::NoMemory,
            ParseError::BadXml(msg) => StreamError::BadXml(msg),
        }
    }
}

pub(crate) mod description {
    pub(crate) const STREAM_NOT_OPEN: &str = "stream tag is not complete";
    pub(crate) const STREAM_TAG_MISMATCH: &str = "stream end tag does not match the start tag";
}

/// Errors of an XMPP connection.
#[derive(Debug, thiserror::Error)]
pub enum XmppError {
    /// Malformed XML on the stream
    #[error("stream parse failure: {0}")]
    Parse(#[from] StreamError),

    /// An element arrived which is not allowed in the current state
    #[error("protocol violation in state {state}: unexpected <{element}>")]
    ProtocolViolation { state: &'static str, element: String },

    /// Handshake or SASL authentication was rejected
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The server sent a stream error
    #[error("stream error from server: {0}")]
    StreamError(String),

    #[error("not connected")]
    NotConnected,

    /// Outgoing stanza is over the configured limit, nothing was sent
    #[error("stanza size {size} exceeds the maximum of {max} bytes")]
    StanzaTooBig { size: usize, max: usize },

    /// No resolved address accepted a connection
    #[error("could not connect to any address of {0}")]
    ResolutionFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    #[error(transparent)]
    BadJid(#[from] BadJid),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<ParseError> for XmppError {
    fn from(err: ParseError) -> Self {
        XmppError::Parse(err.into())
    }
}

impl XmppError {
    pub(crate) fn violation(state: &'static str, element: &str) -> Self {
        XmppError::ProtocolViolation {
            state,
            element: element.to_string(),
        }
    }

    /// True for errors which end the connection.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, XmppError::NotConnected | XmppError::StanzaTooBig { .. })
    }
}
