//! Suffix to WHOIS server mappings.
//!
//! This module maps a domain suffix to the hostname of the registry's
//! port-43 text service. The built-in table is a flat map in which compound
//! country-code suffixes (`co.uk`, `com.tr`) sit next to single labels;
//! routing tries the compound suffix before the last label.

use crate::error::ResolveError;
use crate::types::DomainQuery;
use std::collections::HashMap;

lazy_static::lazy_static! {
    /// Built-in suffix table. Read-only after first use.
    static ref BUILTIN_SERVERS: HashMap<&'static str, &'static str> = HashMap::from([
        // Legacy gTLDs
        ("com", "whois.verisign-grs.com"),
        ("net", "whois.verisign-grs.com"),
        ("org", "whois.pir.org"),
        ("info", "whois.afilias.net"),
        ("biz", "whois.nic.biz"),
        ("name", "whois.nic.name"),
        ("mobi", "whois.afilias.net"),
        ("pro", "whois.registrypro.pro"),
        ("edu", "whois.educause.edu"),
        ("gov", "whois.dotgov.gov"),
        ("int", "whois.iana.org"),
        // Google registry
        ("app", "whois.nic.google"),
        ("dev", "whois.nic.google"),
        ("page", "whois.nic.google"),
        // New gTLDs
        ("xyz", "whois.nic.xyz"),
        ("online", "whois.nic.online"),
        ("site", "whois.nic.site"),
        ("tech", "whois.nic.tech"),
        ("store", "whois.nic.store"),
        ("shop", "whois.nic.shop"),
        ("blog", "whois.nic.blog"),
        ("cloud", "whois.nic.cloud"),
        ("club", "whois.nic.club"),
        ("top", "whois.nic.top"),
        ("digital", "whois.nic.digital"),
        ("agency", "whois.nic.agency"),
        ("studio", "whois.nic.studio"),
        ("live", "whois.nic.live"),
        // Popular ccTLDs sold as generics
        ("io", "whois.nic.io"),
        ("ai", "whois.nic.ai"),
        ("co", "whois.nic.co"),
        ("me", "whois.nic.me"),
        ("tv", "whois.nic.tv"),
        ("cc", "ccwhois.verisign-grs.com"),
        ("gg", "whois.gg"),
        // Country code TLDs
        ("us", "whois.nic.us"),
        ("uk", "whois.nic.uk"),
        ("de", "whois.denic.de"),
        ("fr", "whois.nic.fr"),
        ("nl", "whois.domain-registry.nl"),
        ("eu", "whois.eu"),
        ("be", "whois.dns.be"),
        ("ch", "whois.nic.ch"),
        ("it", "whois.nic.it"),
        ("es", "whois.nic.es"),
        ("se", "whois.iis.se"),
        ("ca", "whois.cira.ca"),
        ("au", "whois.auda.org.au"),
        ("jp", "whois.jprs.jp"),
        ("ru", "whois.tcinet.ru"),
        ("br", "whois.registro.br"),
        ("in", "whois.registry.in"),
        ("tr", "whois.trabis.gov.tr"),
        // Compound suffixes
        ("co.uk", "whois.nic.uk"),
        ("org.uk", "whois.nic.uk"),
        ("me.uk", "whois.nic.uk"),
        ("com.tr", "whois.trabis.gov.tr"),
        ("net.tr", "whois.trabis.gov.tr"),
        ("org.tr", "whois.trabis.gov.tr"),
        ("com.au", "whois.auda.org.au"),
        ("com.br", "whois.registro.br"),
    ]);
}

/// Lookup table from suffix to WHOIS server hostname.
///
/// Cheap to share behind an `Arc`; never mutated after construction.
#[derive(Debug, Clone)]
pub struct RegistryMap {
    servers: HashMap<String, String>,
}

impl RegistryMap {
    /// Create a map holding only the built-in table.
    pub fn new() -> Self {
        Self {
            servers: BUILTIN_SERVERS
                .iter()
                .map(|(suffix, host)| (suffix.to_string(), host.to_string()))
                .collect(),
        }
    }

    /// Create a map from the built-in table with user entries layered on top.
    ///
    /// Override keys are lowercased; an override replaces a built-in entry
    /// for the same suffix.
    pub fn with_overrides(overrides: &HashMap<String, String>) -> Self {
        let mut map = Self::new();
        for (suffix, host) in overrides {
            map.servers
                .insert(suffix.trim().to_lowercase(), host.trim().to_string());
        }
        map
    }

    /// Look up the server for an exact suffix string.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::UnsupportedSuffix` if the suffix is not in the
    /// table. The domain field carries the suffix itself.
    pub fn lookup(&self, suffix: &str) -> Result<&str, ResolveError> {
        let key = suffix.to_lowercase();
        self.servers
            .get(&key)
            .map(String::as_str)
            .ok_or_else(|| ResolveError::unsupported_suffix(suffix, key))
    }

    /// Route a prepared query: compound suffix first, then the last label.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::UnsupportedSuffix` naming the domain and its
    /// last label when neither key is known.
    pub fn route(&self, query: &DomainQuery) -> Result<&str, ResolveError> {
        if let Some(compound) = &query.compound_suffix {
            if let Some(host) = self.servers.get(compound) {
                return Ok(host);
            }
        }

        self.servers
            .get(&query.suffix)
            .map(String::as_str)
            .ok_or_else(|| ResolveError::unsupported_suffix(&query.domain, &query.suffix))
    }

    /// All known suffixes, sorted alphabetically.
    pub fn known_suffixes(&self) -> Vec<String> {
        let mut suffixes: Vec<String> = self.servers.keys().cloned().collect();
        suffixes.sort();
        suffixes
    }

    /// Number of entries in the table.
    pub fn len(&self) -> usize {
        self.servers.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

impl Default for RegistryMap {
    fn default() -> Self {
        Self::new()
    }
}
