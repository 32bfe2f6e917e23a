/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

mod client;
mod component;
mod config;
mod connection;
pub(crate) mod constants;
mod error;
mod jid;
mod parser;
mod protocol;
mod resolver;
mod stanza;
mod transport;

pub use client::ClientProtocol;
pub use client::ClientState;
pub use client::plain_credentials;
pub use component::ComponentProtocol;
pub use component::ComponentState;
pub use component::handshake_digest;
pub use config::ApplicationType;
pub use config::Config;
pub use connection::Connection;
pub use connection::ConnectionHandler;
pub use connection::StanzaSink;
pub use connection::connect;
pub use connection::run;
pub use constants::CLIENT_PORT;
pub use constants::COMPONENT_PORT;
pub use constants::DEFAULT_MAX_STANZA_SIZE;
pub use error::StreamError;
pub use error::XmppError;
pub use jid::BadJid;
pub use jid::Jid;
pub use parser::StreamElement;
pub use parser::StreamElements;
pub use parser::StreamParser;
pub use protocol::Flow;
pub use protocol::Protocol;
pub use protocol::ProtocolEvent;
pub use resolver::DnsLookup;
pub use resolver::Resolver;
pub use resolver::SrvRecord;
pub use resolver::SystemDns;
pub use stanza::Stanza;
pub use stanza::StanzaKind;
pub use transport::Transport;
pub use transport::Utf8Cleaner;

#[cfg(test)]
mod tests;
