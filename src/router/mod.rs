/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

//! Dispatching of received stanzas to application actions.
//!
//! A [RouteTable] lists XPath predicates in priority order. The [Router]
//! finds the first route matching a stanza and calls the action registered
//! for its destination in the [ActionRegistry].

mod error;
mod route;

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use tracing::debug;
use tracing::error;
use tracing::warn;

use crate::Document;
use crate::Stanza;

pub use error::ActionError;
pub use error::DispatchError;
pub use error::RouteError;
pub use route::Destination;
pub use route::Route;
pub use route::RouteTable;
pub use route::RouteTableBuilder;

/// An application action. Returns the stanzas to send back.
pub type Action = Box<dyn Fn(&Stanza) -> Result<Vec<Document>, ActionError> + Send + Sync>;

/// Decides if a stanza is routed at all.
pub type StanzaFilter = Box<dyn Fn(&Stanza) -> bool + Send + Sync>;

/// Router shared between connections.
pub type RouterHandle = Arc<Router>;

/// Actions by controller and action name.
#[derive(Default)]
pub struct ActionRegistry {
    actions: HashMap<Destination, Action>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an action, replacing any previous one for the same name.
    pub fn register<F>(&mut self, controller: &str, action: &str, function: F) -> &mut Self
    where
        F: Fn(&Stanza) -> Result<Vec<Document>, ActionError> + Send + Sync + 'static,
    {
        self.actions
            .insert(Destination::new(controller, action), Box::new(function));
        self
    }

    pub fn contains(&self, destination: &Destination) -> bool {
        self.actions.contains_key(destination)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    fn get(&self, destination: &Destination) -> Option<&Action> {
        self.actions.get(destination)
    }
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.actions.keys()).finish()
    }
}

/// Result of routing a single stanza.
#[derive(Debug)]
pub enum RouteOutcome {
    /// The filter rejected the stanza
    Filtered,
    /// No route matched
    Unmatched,
    /// The action ran and returned these stanzas
    Dispatched(Vec<Document>),
    Failed(DispatchError),
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

pub struct Router {
    table: RouteTable,
    actions: ActionRegistry,
    filter: Option<StanzaFilter>,
}

impl Router {
    /// Creates a router, checking that every route has a registered action.
    pub fn new(table: RouteTable, actions: ActionRegistry) -> Result<Router, RouteError> {
        if let Some(route) = table
            .routes()
            .iter()
            .find(|route| !actions.contains(route.destination()))
        {
            let destination = route.destination();
            return Err(RouteError::UnknownAction {
                controller: destination.controller.clone(),
                action: destination.action.clone(),
            });
        }
        Ok(Router {
            table,
            actions,
            filter: None,
        })
    }

    /// Installs a filter which must return true for a stanza to be routed.
    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Stanza) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(filter));
        self
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    pub fn into_handle(self) -> RouterHandle {
        Arc::new(self)
    }

    /// Runs the action of the first route matching the stanza.
    ///
    /// Action errors and panics are reported in the outcome and never
    /// escape.
    pub fn route(&self, stanza: &Stanza) -> RouteOutcome {
        if let Some(filter) = &self.filter
            && !filter(stanza)
        {
            debug!(stanza = stanza.name(), "stanza filtered");
            return RouteOutcome::Filtered;
        }
        let Some(route) = self.table.find(stanza.document()) else {
            warn!(stanza = %stanza, "no route for stanza");
            return RouteOutcome::Unmatched;
        };
        let destination = route.destination();
        let Some(action) = self.actions.get(destination) else {
            // Router::new checked the destinations
            return RouteOutcome::Unmatched;
        };
        debug!(
            route = route.expression(),
            controller = destination.controller.as_str(),
            action = destination.action.as_str(),
            "dispatching stanza"
        );
        match std::panic::catch_unwind(AssertUnwindSafe(|| action(stanza))) {
            Ok(Ok(responses)) => RouteOutcome::Dispatched(responses),
            Ok(Err(source)) => {
                let err = DispatchError::ActionFailed {
                    controller: destination.controller.clone(),
                    action: destination.action.clone(),
                    source,
                };
                error!(error = %err, "dispatch failed");
                RouteOutcome::Failed(err)
            }
            Err(payload) => {
                let err = DispatchError::ActionPanicked {
                    controller: destination.controller.clone(),
                    action: destination.action.clone(),
                    message: panic_message(payload.as_ref()),
                };
                error!(error = %err, "dispatch failed");
                RouteOutcome::Failed(err)
            }
        }
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("table", &self.table)
            .field("actions", &self.actions)
            .field("filter", &self.filter.is_some())
            .finish()
    }
}
