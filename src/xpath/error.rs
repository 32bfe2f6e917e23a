/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::error::Error;
use std::fmt::Display;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BadXPath(pub &'static str);

impl Display for BadXPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "XPath syntax error: {}", self.0)
    }
}

impl Error for BadXPath {}

pub(crate) mod description {
    pub(crate) const EMPTY: &str = "expression is empty";
    pub(crate) const UNEXPECTED_END: &str = "expression ends unexpectedly";
    pub(crate) const UNEXPECTED_TOKEN: &str = "unexpected token";
    pub(crate) const TRAILING_TOKENS: &str = "unexpected tokens after the expression";
    pub(crate) const BAD_CHARACTER: &str = "invalid character";
    pub(crate) const UNTERMINATED_LITERAL: &str = "string literal is not terminated";
    pub(crate) const UNKNOWN_AXIS: &str = "unknown axis name";
    pub(crate) const UNKNOWN_FUNCTION: &str = "unknown function";
    pub(crate) const UNKNOWN_NODE_TYPE: &str = "unsupported node type test";
    pub(crate) const ARGUMENT_COUNT: &str = "wrong number of function arguments";
    pub(crate) const UNBOUND_PREFIX: &str = "namespace prefix is not bound";
    pub(crate) const NOT_A_NODE_SET: &str = "expression does not evaluate to a node set";
}
