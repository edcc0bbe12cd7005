//! Peer address normalization.
//!
//! Every component that talks to a peer goes through [`normalize`] so that a
//! configured address always maps to the same aggregate key and redirect
//! target.

use std::fmt;

use url::Url;

use crate::error::AddressError;

const HTTP_PREFIX: &str = "http://";
const HTTPS_PREFIX: &str = "https://";

/// Validated, canonical form of a peer's base address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedPeerAddress {
    url: Url,
    canonical: String,
}

impl NormalizedPeerAddress {
    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn is_https(&self) -> bool {
        self.url.scheme() == "https"
    }

    /// Appends an absolute path (`/System/Info`) below the peer's base path.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.canonical, path.trim_start_matches('/'))
    }

    pub fn into_string(self) -> String {
        self.canonical
    }
}

impl fmt::Display for NormalizedPeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

impl AsRef<str> for NormalizedPeerAddress {
    fn as_ref(&self) -> &str {
        &self.canonical
    }
}

/// Strips every trailing `/`.
pub fn trim_trailing_slash(address: &str) -> &str {
    address.trim_end_matches('/')
}

fn starts_with_ignore_case(value: &str, prefix: &str) -> bool {
    value
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

fn has_http_scheme(value: &str) -> bool {
    starts_with_ignore_case(value, HTTP_PREFIX)
        || starts_with_ignore_case(value, HTTPS_PREFIX)
}

/// Detects an explicit `scheme://` prefix for anything other than HTTP(S).
fn foreign_scheme(value: &str) -> Option<&str> {
    let (scheme, _) = value.split_once("://")?;
    let mut chars = scheme.chars();
    let well_formed = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    well_formed.then_some(scheme)
}

/// Validates and canonicalizes a raw peer address.
///
/// Bare `host:port` input is treated as `http://host:port`. When
/// `require_https` is set, anything but an `https` URL is rejected.
pub fn normalize(
    raw: &str,
    require_https: bool,
) -> Result<NormalizedPeerAddress, AddressError> {
    let raw = raw.trim();
    let trimmed = trim_trailing_slash(raw);
    if trimmed.is_empty() {
        return Err(AddressError::InvalidAddress("address is empty".into()));
    }

    // Scheme detection runs before slashes are stripped, so `https://`
    // is never mistaken for a bare host named `https`.
    let candidate = if has_http_scheme(raw) {
        let after_scheme = raw.split_once("://").map_or("", |(_, rest)| rest);
        if after_scheme.trim_matches('/').is_empty() {
            return Err(AddressError::InvalidAddress("missing host".into()));
        }
        trimmed.to_string()
    } else if let Some(scheme) = foreign_scheme(raw) {
        return Err(AddressError::InvalidAddress(format!(
            "unsupported scheme '{scheme}'"
        )));
    } else {
        format!("{HTTP_PREFIX}{trimmed}")
    };

    let url = Url::parse(&candidate)
        .map_err(|err| AddressError::InvalidAddress(err.to_string()))?;

    if url.host_str().is_none_or(str::is_empty) {
        return Err(AddressError::InvalidAddress("missing host".into()));
    }

    if require_https && url.scheme() != "https" {
        return Err(AddressError::HttpsRequired);
    }

    let canonical = trim_trailing_slash(url.as_str()).to_string();
    Ok(NormalizedPeerAddress { url, canonical })
}

/// Literal check used on already-stored addresses before redirecting.
pub fn violates_https_policy(address: &str, require_https: bool) -> bool {
    require_https && !starts_with_ignore_case(address.trim(), HTTPS_PREFIX)
}
