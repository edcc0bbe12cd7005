use std::{fmt, time::Duration};

use async_trait::async_trait;
use peerlink_model::{PeerDescriptor, ProbeResult, RemoteCatalogItem};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, info, instrument, warn};

use super::{PeerCatalogSource, listing::parse_catalog};
use crate::error::PeerError;
use crate::url_policy::{self, NormalizedPeerAddress};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
pub const SYSTEM_INFO_PATH: &str = "/System/Info";
pub const ITEMS_PATH: &str = "/Items";
pub const COMPAT_TOKEN_HEADER: &str = "x-mediabrowser-token";
/// Characters of a probe response kept for diagnostics.
pub const PREVIEW_CHARS: usize = 200;

const USER_AGENT: &str = concat!("peerlink/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct PeerClientConfig {
    pub request_timeout: Duration,
}

impl Default for PeerClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// `reqwest`-backed peer client. One request per call, no retries.
#[derive(Clone)]
pub struct HttpPeerClient {
    http: reqwest::Client,
    config: PeerClientConfig,
}

impl fmt::Debug for HttpPeerClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpPeerClient")
            .field("request_timeout", &self.config.request_timeout)
            .finish_non_exhaustive()
    }
}

impl HttpPeerClient {
    pub fn new(config: PeerClientConfig) -> Result<Self, PeerError> {
        // Idle pooling is disabled so every call opens a short-lived
        // connection.
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.request_timeout)
            .pool_max_idle_per_host(0)
            .user_agent(USER_AGENT)
            .build()
            .map_err(PeerError::Client)?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &PeerClientConfig {
        &self.config
    }

    fn auth_headers(peer: &PeerDescriptor) -> Result<HeaderMap, PeerError> {
        let mut headers = HeaderMap::new();
        if peer.credential.is_blank() {
            return Ok(headers);
        }

        let token = peer.credential.expose();
        let mut authorization =
            HeaderValue::from_str(&format!("MediaBrowser Token=\"{token}\""))
                .map_err(|_| PeerError::InvalidCredential)?;
        authorization.set_sensitive(true);

        let mut compat = HeaderValue::from_str(token)
            .map_err(|_| PeerError::InvalidCredential)?;
        compat.set_sensitive(true);

        headers.insert(AUTHORIZATION, authorization);
        headers.insert(HeaderName::from_static(COMPAT_TOKEN_HEADER), compat);
        Ok(headers)
    }

    async fn get(
        &self,
        address: &NormalizedPeerAddress,
        path: &str,
        peer: &PeerDescriptor,
    ) -> Result<reqwest::Response, PeerError> {
        let headers = Self::auth_headers(peer)?;
        let response = self
            .http
            .get(address.endpoint(path))
            .headers(headers)
            .send()
            .await
            .map_err(PeerError::Unreachable)?;

        let status = response.status();
        if !status.is_success() {
            return Err(PeerError::status(status));
        }
        Ok(response)
    }

    async fn try_probe(
        &self,
        peer: &PeerDescriptor,
        require_https: bool,
    ) -> Result<ProbeResult, PeerError> {
        let address = url_policy::normalize(&peer.base_address, require_https)?;
        let response = self.get(&address, SYSTEM_INFO_PATH, peer).await?;
        let code = response.status().as_u16();
        let body = response.text().await.map_err(PeerError::Unreachable)?;

        Ok(ProbeResult {
            reachable: true,
            status_summary: format!("Connected ({code})"),
            body_preview: preview(&body),
        })
    }
}

/// First [`PREVIEW_CHARS`] characters of `body`, with `...` when truncated.
pub(crate) fn preview(body: &str) -> String {
    let mut chars = body.char_indices();
    match chars.nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}

fn describe_failure(err: &PeerError, timeout: Duration) -> String {
    match err {
        PeerError::Unreachable(source) if source.is_timeout() => {
            format!("Timed out after {timeout:?}")
        }
        PeerError::Unreachable(source) if source.is_connect() => {
            "Connection failed".to_string()
        }
        other => other.to_string(),
    }
}

#[async_trait]
impl PeerCatalogSource for HttpPeerClient {
    #[instrument(skip(self, peer), fields(peer = %peer.base_address))]
    async fn probe(
        &self,
        peer: &PeerDescriptor,
        require_https: bool,
    ) -> ProbeResult {
        match self.try_probe(peer, require_https).await {
            Ok(result) => {
                info!(summary = %result.status_summary, "peer probe succeeded");
                result
            }
            Err(err) => {
                warn!(error = %err, "peer probe failed");
                ProbeResult::unreachable(describe_failure(
                    &err,
                    self.config.request_timeout,
                ))
            }
        }
    }

    #[instrument(skip(self, peer), fields(peer = %peer.base_address))]
    async fn fetch_catalog(
        &self,
        peer: &PeerDescriptor,
        require_https: bool,
    ) -> Result<Vec<RemoteCatalogItem>, PeerError> {
        let result = async {
            let address =
                url_policy::normalize(&peer.base_address, require_https)?;
            debug!(url = %address.endpoint(ITEMS_PATH), "requesting peer catalog");

            let response = self.get(&address, ITEMS_PATH, peer).await?;
            let body = response.bytes().await.map_err(PeerError::Unreachable)?;
            parse_catalog(&body)
        }
        .await;

        match result {
            Ok(listing) => {
                if let Some(total) = listing.total_record_count
                    && total as usize != listing.items.len() + listing.skipped
                {
                    debug!(
                        total_record_count = total,
                        delivered = listing.items.len() + listing.skipped,
                        "peer listing is paged or inconsistent"
                    );
                }
                if listing.skipped > 0 {
                    debug!(
                        skipped = listing.skipped,
                        "skipped items without identifier"
                    );
                }
                info!(items = listing.items.len(), "fetched peer catalog");
                Ok(listing.items)
            }
            Err(err) => {
                warn!(
                    error = %err,
                    detail = %describe_failure(&err, self.config.request_timeout),
                    "peer catalog fetch failed"
                );
                Err(err)
            }
        }
    }
}
