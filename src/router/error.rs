/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use crate::BadXPath;

/// Errors detected while building a route table or a router.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("route has an empty {0}")]
    Empty(&'static str),

    #[error("route {expression}: {source}")]
    BadXPath {
        expression: String,
        #[source]
        source: BadXPath,
    },

    /// A priority was given before the destination of its route
    #[error("priority must follow the destination of a route")]
    OutOfOrder,

    #[error("route {0} has no destination")]
    MissingDestination(String),

    #[error("no action registered for {controller}#{action}")]
    UnknownAction { controller: String, action: String },
}

/// Failure reported by an action.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ActionError(pub String);

impl ActionError {
    pub fn new(message: impl Into<String>) -> Self {
        ActionError(message.into())
    }
}

impl From<crate::ParseError> for ActionError {
    fn from(err: crate::ParseError) -> Self {
        ActionError(err.to_string())
    }
}

/// Failure of a dispatched action, isolated to a single stanza.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("action {controller}#{action} failed: {source}")]
    ActionFailed {
        controller: String,
        action: String,
        #[source]
        source: ActionError,
    },

    #[error("action {controller}#{action} panicked: {message}")]
    ActionPanicked {
        controller: String,
        action: String,
        message: String,
    },
}
