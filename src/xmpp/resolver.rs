/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::net::IpAddr;

use rand::seq::SliceRandom;
use tracing::debug;
use tracing::info;
use tracing::warn;
use trust_dns_resolver::config::ResolverConfig;
use trust_dns_resolver::config::ResolverOpts;

use super::XmppError;
use super::constants::CLIENT_PORT;
use super::constants::CLIENT_SRV_PREFIX;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrvRecord {
    pub priority: u16,
    pub weight: u16,
    pub port: u16,
    pub target: String,
}

/// DNS queries needed to find an XMPP server.
///
/// Lookups return an empty list when the name has no records.
pub trait DnsLookup {
    fn srv(&self, name: &str) -> Result<Vec<SrvRecord>, XmppError>;

    fn ip(&self, host: &str) -> Result<Vec<IpAddr>, XmppError>;
}

/// Blocking lookups with the system resolver configuration.
pub struct SystemDns {
    resolver: trust_dns_resolver::Resolver,
}

impl SystemDns {
    pub fn new() -> Result<Self, XmppError> {
        let resolver = match trust_dns_resolver::Resolver::from_system_conf() {
            Ok(resolver) => resolver,
            Err(err) => {
                warn!(error = %err, "failed to load system DNS config, using defaults");
                trust_dns_resolver::Resolver::new(ResolverConfig::default(), ResolverOpts::default())?
            }
        };
        Ok(SystemDns { resolver })
    }
}

impl DnsLookup for SystemDns {
    fn srv(&self, name: &str) -> Result<Vec<SrvRecord>, XmppError> {
        match self.resolver.srv_lookup(name) {
            Ok(lookup) => Ok(lookup
                .iter()
                .map(|srv| SrvRecord {
                    priority: srv.priority(),
                    weight: srv.weight(),
                    port: srv.port(),
                    target: srv.target().to_string(),
                })
                .collect()),
            Err(err) => {
                debug!(srv = name, error = %err, "SRV lookup failed");
                Ok(Vec::new())
            }
        }
    }

    fn ip(&self, host: &str) -> Result<Vec<IpAddr>, XmppError> {
        match self.resolver.lookup_ip(host) {
            Ok(lookup) => Ok(lookup.iter().collect()),
            Err(err) => {
                debug!(host, error = %err, "address lookup failed");
                Ok(Vec::new())
            }
        }
    }
}

/// Finds and tries the servers of an XMPP domain.
pub struct Resolver<D: DnsLookup> {
    dns: D,
    default_port: u16,
}

impl<D: DnsLookup> Resolver<D> {
    pub fn new(dns: D) -> Self {
        Resolver {
            dns,
            default_port: CLIENT_PORT,
        }
    }

    /// Port used with address records when no SRV record works.
    pub fn default_port(mut self, port: u16) -> Self {
        self.default_port = port;
        self
    }

    /// SRV targets of the domain in connection order.
    ///
    /// Lower priorities come first and records of the same priority are
    /// shuffled. Targets of `.` mean the service is not offered and are
    /// skipped.
    pub fn srv_candidates(&self, domain: &str) -> Result<Vec<(String, u16)>, XmppError> {
        let name = format!("{CLIENT_SRV_PREFIX}{domain}");
        let mut records = self.dns.srv(&name)?;
        records.retain(|record| {
            let usable = !record.target.trim_end_matches('.').is_empty();
            if !usable {
                info!(domain, "SRV record with '.' target, skipping");
            }
            usable
        });
        records.shuffle(&mut rand::rng());
        // Stable sort keeps the shuffled order inside each priority
        records.sort_by_key(|record| record.priority);
        Ok(records
            .into_iter()
            .map(|record| {
                let host = record.target.trim_end_matches('.').to_string();
                (host, record.port)
            })
            .collect())
    }

    /// Address records of the domain, shuffled, with the default port.
    pub fn address_candidates(&self, domain: &str) -> Result<Vec<(String, u16)>, XmppError> {
        let mut addresses = self.dns.ip(domain)?;
        addresses.shuffle(&mut rand::rng());
        Ok(addresses
            .into_iter()
            .map(|address| (address.to_string(), self.default_port))
            .collect())
    }

    /// Calls `attempt` for each candidate server until one succeeds.
    ///
    /// SRV records are tried first, then the address records of the domain.
    pub fn resolve<T, F>(&self, domain: &str, mut attempt: F) -> Result<T, XmppError>
    where
        F: FnMut(&str, u16) -> Option<T>,
    {
        for (host, port) in self.srv_candidates(domain)? {
            info!(domain, host = host.as_str(), port, "trying SRV target");
            if let Some(result) = attempt(&host, port) {
                return Ok(result);
            }
        }
        for (host, port) in self.address_candidates(domain)? {
            info!(domain, host = host.as_str(), port, "trying address record");
            if let Some(result) = attempt(&host, port) {
                return Ok(result);
            }
        }
        Err(XmppError::ResolutionFailed(domain.to_string()))
    }
}
