//! Host, port and URL selection shared by the port, metric and web checks.

use std::collections::HashMap;

use super::definition::UriSpec;
use crate::template::resolve_placeholders;
use crate::{Error, Result};

pub const URI_NOT_DEFINED: &str = "Could not determine result. URL(s) were not defined.";

/// A resolved endpoint plus whether it should be reached over TLS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertUri {
    pub uri: String,
    pub is_ssl_enabled: bool,
}

/// Resolve a plain or structured URI against a cluster's configuration map.
///
/// For a structured URI the https form is chosen when http does not resolve, or
/// when the resolved `https_property` equals the literal `https_property_value`.
pub fn resolve_uri_spec(spec: &UriSpec, configurations: &HashMap<String, String>) -> Result<AlertUri> {
    let structure = match spec {
        UriSpec::Plain(uri) => {
            let resolved = resolve_placeholders(uri, configurations)
                .ok_or_else(|| Error::UnresolvedUri(URI_NOT_DEFINED.to_string()))?;
            let is_ssl_enabled = resolved.to_ascii_lowercase().starts_with("https://");
            return Ok(AlertUri {
                uri: resolved,
                is_ssl_enabled,
            });
        }
        UriSpec::Structured(structure) => structure,
    };

    let resolve = |field: &Option<String>| {
        field
            .as_deref()
            .and_then(|value| resolve_placeholders(value, configurations))
    };

    let http = resolve(&structure.http);
    let https = resolve(&structure.https);
    let https_property = resolve(&structure.https_property);

    let https_requested = match (&https_property, &structure.https_property_value) {
        (Some(actual), Some(expected)) => actual == expected,
        _ => false,
    };

    match (http, https) {
        (_, Some(https)) if https_requested => Ok(AlertUri {
            uri: https,
            is_ssl_enabled: true,
        }),
        (None, Some(https)) => Ok(AlertUri {
            uri: https,
            is_ssl_enabled: true,
        }),
        (Some(http), _) => Ok(AlertUri {
            uri: http,
            is_ssl_enabled: false,
        }),
        (None, None) => Err(Error::UnresolvedUri(URI_NOT_DEFINED.to_string())),
    }
}

/// Pick one entry of a comma separated list, preferring the one naming `host_name`.
pub fn select_candidate<'a>(uri: &'a str, host_name: &str) -> &'a str {
    if !uri.contains(',') {
        return uri.trim();
    }

    let mut candidates = uri.split(',').map(str::trim).filter(|c| !c.is_empty());
    let first = candidates.clone().next().unwrap_or("");
    candidates.find(|c| c.contains(host_name)).unwrap_or(first)
}

/// `localhost` and the wildcard address stand for the agent's own host.
pub fn is_local_host(host: &str) -> bool {
    host.eq_ignore_ascii_case("localhost") || host == "0.0.0.0"
}

/// Split `scheme://user@host:port/path` into `(host:port, /path)`.
pub fn split_authority(uri: &str) -> (&str, &str) {
    let rest = uri.split_once("://").map(|(_, rest)| rest).unwrap_or(uri);
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let (authority, path) = rest.split_at(end);
    let authority = authority.rsplit_once('@').map(|(_, a)| a).unwrap_or(authority);
    (authority, path)
}

fn split_host_port(authority: &str) -> (&str, Option<&str>) {
    if authority.starts_with('[') {
        if let Some(close) = authority.find(']') {
            let host = &authority[..=close];
            let port = authority[close + 1..].strip_prefix(':');
            return (host, port);
        }
    }
    match authority.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') => (host, Some(port)),
        _ => (authority, None),
    }
}

/// Host part of `uri`, without scheme, credentials, port or path. IPv6
/// literals lose their brackets.
pub fn host_from_uri(uri: &str) -> Option<String> {
    let (authority, _) = split_authority(uri.trim());
    let (host, _) = split_host_port(authority);
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

/// Explicit port of `uri`, if it carries a valid one.
pub fn port_from_uri(uri: &str) -> Option<u16> {
    let (authority, _) = split_authority(uri.trim());
    split_host_port(authority).1.and_then(|p| p.parse().ok())
}

/// `host` as it appears in a URL authority.
pub fn url_host(host: &str) -> String {
    if host.contains(':') {
        format!("[{}]", host)
    } else {
        host.to_string()
    }
}

/// Host to contact for `uri`, substituting the agent's host for local aliases.
pub fn effective_host(uri: &str, host_name: &str) -> String {
    host_from_uri(uri)
        .filter(|host| !is_local_host(host))
        .unwrap_or_else(|| host_name.to_string())
}
