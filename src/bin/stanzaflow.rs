/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use stanzaflow::ActionError;
use stanzaflow::ActionRegistry;
use stanzaflow::ApplicationType;
use stanzaflow::Config;
use stanzaflow::ConnectionHandler;
use stanzaflow::Document;
use stanzaflow::RouteTable;
use stanzaflow::Router;
use stanzaflow::RouterHandle;
use stanzaflow::Stanza;
use stanzaflow::StanzaSink;
use stanzaflow::XmppError;

/// Runs an XMPP echo service as a component or a client.
#[derive(Parser, Debug)]
#[command(name = "stanzaflow", version, about)]
struct Args {
    /// TOML configuration file with one table per environment
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Table of the configuration file to use
    #[arg(short, long, default_value = "development")]
    environment: String,

    /// Jabber ID, overrides the configuration
    #[arg(short, long)]
    jid: Option<String>,

    /// Server host, overrides the configuration
    #[arg(long)]
    host: Option<String>,

    /// Server port, overrides the configuration
    #[arg(short, long)]
    port: Option<u16>,

    /// Connect as a client instead of a component
    #[arg(long)]
    client: bool,
}

fn load_config(args: &Args) -> Result<Config, XmppError> {
    let mut config = match (&args.config, &args.jid) {
        (Some(path), _) => Config::load(path, &args.environment)?,
        (None, Some(jid)) if args.client => Config::for_client(jid, ""),
        (None, Some(jid)) => Config::for_component(jid, ""),
        (None, None) => {
            return Err(XmppError::Config(
                "either --config or --jid is required".to_string(),
            ));
        }
    };
    if let Some(jid) = &args.jid {
        config.jid = jid.clone();
    }
    if args.host.is_some() {
        config.host = args.host.clone();
    }
    if args.port.is_some() {
        config.port = args.port;
    }
    if args.client {
        config.application_type = ApplicationType::Client;
    }
    if config.password().is_empty() {
        let prompt = match config.application_type {
            ApplicationType::Client => "Password: ",
            ApplicationType::Component => "Component secret: ",
        };
        config.password = Some(rpassword::prompt_password(prompt)?);
    }
    config.validate()?;
    Ok(config)
}

fn echo(stanza: &Stanza) -> Result<Vec<Document>, ActionError> {
    let body = stanza.root().find_tag("body").text();
    let mut reply = Document::new("message");
    let mut node = reply.root_mut();
    if let Some(from) = stanza.from() {
        node = node.insert_attribute("to", from)?;
    }
    if let Some(to) = stanza.to() {
        node = node.insert_attribute("from", to)?;
    }
    node.insert_attribute("type", stanza.stanza_type().unwrap_or("chat"))?
        .insert_tag("body")?
        .insert_cdata(&body)?;
    Ok(vec![reply])
}

fn iq_result(stanza: &Stanza) -> Result<Document, ActionError> {
    let mut reply = Document::new("iq");
    let mut node = reply.root_mut().insert_attribute("type", "result")?;
    if let Some(from) = stanza.from() {
        node = node.insert_attribute("to", from)?;
    }
    if let Some(to) = stanza.to() {
        node = node.insert_attribute("from", to)?;
    }
    if let Some(id) = stanza.id() {
        node.insert_attribute("id", id)?;
    }
    Ok(reply)
}

fn pong(stanza: &Stanza) -> Result<Vec<Document>, ActionError> {
    Ok(vec![iq_result(stanza)?])
}

fn disco_info(stanza: &Stanza) -> Result<Vec<Document>, ActionError> {
    let mut reply = iq_result(stanza)?;
    reply
        .root_mut()
        .insert_tag("query")?
        .declare_namespace(None, "http://jabber.org/protocol/disco#info")?
        .insert_tag("identity")?
        .insert_attribute("category", "component")?
        .insert_attribute("type", "generic")?
        .insert_attribute("name", "stanzaflow echo")?
        .parent()
        .insert_tag("feature")?
        .insert_attribute("var", "urn:xmpp:ping")?;
    Ok(vec![reply])
}

fn build_router() -> Result<RouterHandle, stanzaflow::RouteError> {
    let table = RouteTable::builder()
        .namespace("ping", "urn:xmpp:ping")
        .xpath("/iq[@type='get']/ping:ping")
        .to("ping", "pong")
        .disco_info(None)
        .to("disco", "info")
        .xpath("/message[body and not(@type='error')]")
        .to("echo", "message")
        .priority(-1)
        .build()?;
    let mut actions = ActionRegistry::new();
    actions
        .register("ping", "pong", pong)
        .register("disco", "info", disco_info)
        .register("echo", "message", echo);
    Ok(Router::new(table, actions)?.into_handle())
}

struct Lifecycle;

impl ConnectionHandler for Lifecycle {
    fn on_connected(&mut self, _sink: &mut dyn StanzaSink) {
        info!("ready to echo");
    }

    fn on_disconnected(&mut self) {
        info!("disconnected");
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err}");
            return ExitCode::FAILURE;
        }
    };
    let router = match build_router() {
        Ok(router) => router,
        Err(err) => {
            eprintln!("Error: {err}");
            return ExitCode::FAILURE;
        }
    };
    match stanzaflow::run(&config, Some(router), &mut Lifecycle) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "connection ended");
            ExitCode::FAILURE
        }
    }
}
