//! Namespace lookup for a registry.

use std::collections::BTreeMap;

use eppd_core::NamespaceConfig;

use crate::error::{CodecError, CodecResult};

pub const EPP_NS: &str = "urn:ietf:params:xml:ns:epp-1.0";
pub const DOMAIN_NS: &str = "urn:ietf:params:xml:ns:domain-1.0";
pub const HOST_NS: &str = "urn:ietf:params:xml:ns:host-1.0";
pub const CONTACT_NS: &str = "urn:ietf:params:xml:ns:contact-1.0";
pub const SECDNS_NS: &str = "urn:ietf:params:xml:ns:secDNS-1.1";

/// Namespaces configured for one registry, keyed by short name.
///
/// The RFC object namespaces and secDNS fall back to their standard URIs
/// when not configured. Any other key must be configured.
#[derive(Debug, Clone, Default)]
pub struct Namespaces {
    entries: BTreeMap<String, NamespaceConfig>,
}

impl Namespaces {
    pub fn new(entries: BTreeMap<String, NamespaceConfig>) -> Self {
        Self { entries }
    }

    /// Returns the namespace URI for `key`.
    pub fn xmlns(&self, key: &str) -> CodecResult<&str> {
        if let Some(entry) = self.entries.get(key) {
            return Ok(&entry.xmlns);
        }
        default_xmlns(key)
            .ok_or_else(|| CodecError::config(format!("namespace `{}` is not configured", key)))
    }

    /// Returns `xmlns:<prefix>` pointing at the namespace for `key`.
    pub fn declaration(&self, prefix: &str, key: &str) -> CodecResult<(String, String)> {
        Ok((format!("xmlns:{}", prefix), self.xmlns(key)?.to_string()))
    }

    /// Attributes for the `<epp>` root: the default namespace followed by any
    /// extra attributes configured on the `epp` key.
    pub fn root_attributes(&self) -> Vec<(String, String)> {
        match self.entries.get("epp") {
            Some(epp) => std::iter::once(("xmlns".to_string(), epp.xmlns.clone()))
                .chain(epp.attributes.iter().map(|(k, v)| (k.clone(), v.clone())))
                .collect(),
            None => vec![("xmlns".to_string(), EPP_NS.to_string())],
        }
    }
}

fn default_xmlns(key: &str) -> Option<&'static str> {
    match key {
        "epp" => Some(EPP_NS),
        "domain" => Some(DOMAIN_NS),
        "host" => Some(HOST_NS),
        "contact" => Some(CONTACT_NS),
        "DNSSEC" => Some(SECDNS_NS),
        _ => None,
    }
}
