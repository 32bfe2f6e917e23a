/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

pub const CLIENT_PORT: u16 = 5222;

pub const COMPONENT_PORT: u16 = 5347;

pub const DEFAULT_MAX_STANZA_SIZE: usize = 65535;

pub const CLIENT_SRV_PREFIX: &str = "_xmpp-client._tcp.";

pub const STREAM_LOCAL_NAME: &str = "stream";

pub const STREAM_NS: &str = "http://etherx.jabber.org/streams";

pub const CLIENT_NS: &str = "jabber:client";

pub const COMPONENT_NS: &str = "jabber:component:accept";

pub const TLS_NS: &str = "urn:ietf:params:xml:ns:xmpp-tls";

pub const SASL_NS: &str = "urn:ietf:params:xml:ns:xmpp-sasl";

pub const BIND_NS: &str = "urn:ietf:params:xml:ns:xmpp-bind";

pub const SESSION_NS: &str = "urn:ietf:params:xml:ns:xmpp-session";

pub const DISCO_INFO_NS: &str = "http://jabber.org/protocol/disco#info";

pub const DISCO_ITEMS_NS: &str = "http://jabber.org/protocol/disco#items";
