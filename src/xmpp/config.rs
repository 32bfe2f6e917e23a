/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::Jid;

use super::XmppError;
use super::constants::DEFAULT_MAX_STANZA_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationType {
    Client,
    #[default]
    Component,
}

fn default_max_stanza_size() -> usize {
    DEFAULT_MAX_STANZA_SIZE
}

fn default_starttls() -> bool {
    true
}

fn default_connect_timeout_secs() -> u64 {
    30
}

/// Connection settings of one environment.
///
/// Configuration files are TOML with one table per environment:
///
/// ```toml
/// [development]
/// jid = "echo.localhost"
/// password = "secret"
/// host = "localhost"
/// port = 5347
///
/// [production]
/// application_type = "client"
/// jid = "bot@example.com/worker"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub jid: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub application_type: ApplicationType,
    #[serde(default = "default_max_stanza_size")]
    pub max_stanza_size: usize,
    #[serde(default = "default_starttls")]
    pub starttls: bool,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Config {
    fn new(application_type: ApplicationType, jid: &str, password: &str) -> Self {
        Config {
            jid: jid.to_string(),
            password: Some(password.to_string()),
            host: None,
            port: None,
            application_type,
            max_stanza_size: DEFAULT_MAX_STANZA_SIZE,
            starttls: true,
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }

    pub fn for_client(jid: &str, password: &str) -> Self {
        Config::new(ApplicationType::Client, jid, password)
    }

    pub fn for_component(jid: &str, secret: &str) -> Self {
        Config::new(ApplicationType::Component, jid, secret)
    }

    /// Reads the table named `environment` from TOML text.
    pub fn from_toml_str(text: &str, environment: &str) -> Result<Self, XmppError> {
        let mut environments: toml::Table =
            toml::from_str(text).map_err(|err| XmppError::Config(err.to_string()))?;
        let Some(section) = environments.remove(environment) else {
            return Err(XmppError::Config(format!(
                "no [{environment}] section in configuration"
            )));
        };
        let config: Config = section
            .try_into()
            .map_err(|err: toml::de::Error| XmppError::Config(format!("[{environment}]: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P, environment: &str) -> Result<Self, XmppError> {
        let text = std::fs::read_to_string(path)?;
        Config::from_toml_str(&text, environment)
    }

    /// Checks the settings and returns the parsed JID.
    pub fn validate(&self) -> Result<Jid, XmppError> {
        let jid = Jid::new(&self.jid)?;
        if self.application_type == ApplicationType::Client && jid.localpart().is_none() {
            return Err(XmppError::Config(format!(
                "client JID {jid} has no local part"
            )));
        }
        if self.max_stanza_size == 0 {
            return Err(XmppError::Config("max_stanza_size must be positive".to_string()));
        }
        if self.port == Some(0) {
            return Err(XmppError::Config("port must be positive".to_string()));
        }
        Ok(jid)
    }

    pub fn password(&self) -> &str {
        self.password.as_deref().unwrap_or("")
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
