/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use tracing::warn;

use crate::Document;
use crate::XPath;
use crate::xmpp::constants::DISCO_INFO_NS;
use crate::xmpp::constants::DISCO_ITEMS_NS;

use super::RouteError;

/// The controller action a route dispatches to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Destination {
    pub controller: String,
    pub action: String,
}

impl Destination {
    pub fn new(controller: &str, action: &str) -> Self {
        Destination {
            controller: controller.to_string(),
            action: action.to_string(),
        }
    }
}

/// A compiled XPath predicate with its priority and destination.
#[derive(Debug)]
pub struct Route {
    xpath: XPath,
    priority: i32,
    destination: Destination,
}

impl Route {
    /// Compiles a route, resolving prefixes in `expression` with `namespaces`.
    pub fn new(
        expression: &str,
        namespaces: &[(String, String)],
        priority: i32,
        controller: &str,
        action: &str,
    ) -> Result<Route, RouteError> {
        if expression.trim().is_empty() {
            return Err(RouteError::Empty("xpath"));
        }
        if controller.is_empty() {
            return Err(RouteError::Empty("controller"));
        }
        if action.is_empty() {
            return Err(RouteError::Empty("action"));
        }
        let bindings = namespaces
            .iter()
            .map(|(prefix, uri)| (prefix.as_str(), uri.as_str()));
        let xpath = XPath::with_namespaces(expression, bindings).map_err(|source| {
            RouteError::BadXPath {
                expression: expression.to_string(),
                source,
            }
        })?;
        Ok(Route {
            xpath,
            priority,
            destination: Destination::new(controller, action),
        })
    }

    pub fn expression(&self) -> &str {
        self.xpath.expression()
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    /// True if the predicate selects a node of the stanza or is true.
    pub fn matches(&self, stanza: &Document) -> bool {
        match self.xpath.matches(stanza) {
            Ok(matched) => matched,
            Err(err) => {
                warn!(route = self.expression(), error = %err, "route evaluation failed");
                false
            }
        }
    }
}

/// Routes ordered by descending priority.
///
/// Routes with equal priorities keep their insertion order.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new(mut routes: Vec<Route>) -> Self {
        routes.sort_by(|a, b| b.priority.cmp(&a.priority));
        RouteTable { routes }
    }

    pub fn builder() -> RouteTableBuilder {
        RouteTableBuilder::new()
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// First route in table order matching the stanza.
    pub fn find(&self, stanza: &Document) -> Option<&Route> {
        self.routes.iter().find(|route| route.matches(stanza))
    }
}

struct PendingRoute {
    expression: String,
    destination: Option<Destination>,
    priority: i32,
}

/// Chained construction of a [RouteTable].
///
/// ```
/// use stanzaflow::RouteTable;
///
/// let table = RouteTable::builder()
///     .namespace("ping", "urn:xmpp:ping")
///     .xpath("/iq[@type='get']/ping:ping").to("ping", "pong")
///     .disco_info(None).to("disco", "info").priority(10)
///     .build()
///     .unwrap();
/// assert_eq!(table.routes()[0].destination().action, "info");
/// ```
#[derive(Default)]
pub struct RouteTableBuilder {
    namespaces: Vec<(String, String)>,
    pending: Option<PendingRoute>,
    routes: Vec<Route>,
    error: Option<RouteError>,
}

impl RouteTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn fail(&mut self, err: RouteError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    fn finish_pending(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        let Some(destination) = pending.destination else {
            self.fail(RouteError::MissingDestination(pending.expression));
            return;
        };
        match Route::new(
            &pending.expression,
            &self.namespaces,
            pending.priority,
            &destination.controller,
            &destination.action,
        ) {
            Ok(route) => self.routes.push(route),
            Err(err) => self.fail(err),
        }
    }

    /// Binds a prefix for the expressions of the routes that follow.
    pub fn namespace(mut self, prefix: &str, uri: &str) -> Self {
        self.finish_pending();
        self.namespaces.push((prefix.to_string(), uri.to_string()));
        self
    }

    /// Starts a new route matching an XPath expression.
    pub fn xpath(mut self, expression: &str) -> Self {
        self.finish_pending();
        self.pending = Some(PendingRoute {
            expression: expression.to_string(),
            destination: None,
            priority: 0,
        });
        self
    }

    /// Starts a route matching disco#info queries, optionally for a node.
    pub fn disco_info(self, node: Option<&str>) -> Self {
        let expression = disco_expression(DISCO_INFO_NS, node);
        self.xpath(&expression)
    }

    /// Starts a route matching disco#items queries, optionally for a node.
    pub fn disco_items(self, node: Option<&str>) -> Self {
        let expression = disco_expression(DISCO_ITEMS_NS, node);
        self.xpath(&expression)
    }

    /// Sets the destination of the current route.
    pub fn to(mut self, controller: &str, action: &str) -> Self {
        match self.pending.as_mut() {
            Some(pending) if pending.destination.is_none() => {
                pending.destination = Some(Destination::new(controller, action));
            }
            _ => self.fail(RouteError::OutOfOrder),
        }
        self
    }

    /// Sets the priority of the current route, after its destination.
    pub fn priority(mut self, priority: i32) -> Self {
        match self.pending.as_mut() {
            Some(pending) if pending.destination.is_some() => pending.priority = priority,
            _ => self.fail(RouteError::OutOfOrder),
        }
        self
    }

    pub fn build(mut self) -> Result<RouteTable, RouteError> {
        self.finish_pending();
        match self.error {
            Some(err) => Err(err),
            None => Ok(RouteTable::new(self.routes)),
        }
    }
}

fn quote_literal(value: &str) -> String {
    if value.contains('\'') {
        format!("\"{value}\"")
    } else {
        format!("'{value}'")
    }
}

fn disco_expression(namespace: &str, node: Option<&str>) -> String {
    let mut expression = format!(
        "//iq[@type='get']/*[local-name() = 'query' and namespace-uri() = '{namespace}'"
    );
    if let Some(node) = node {
        expression.push_str(" and @node = ");
        expression.push_str(&quote_literal(node));
    }
    expression.push(']');
    expression
}
