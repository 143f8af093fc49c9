//! # Identity Provider Metadata
//!
//! Fetches and caches the signing metadata of the identity provider: the
//! issuer from the OpenID Connect discovery document and the key set at its
//! `jwks_uri`.
//!
//! ## Cache policy
//!
//! | Situation                              | Behaviour                                  |
//! |----------------------------------------|--------------------------------------------|
//! | cached and younger than `refresh_interval` | served without I/O                     |
//! | expired                                | one caller refreshes, the others wait      |
//! | refresh fails, expired < `stale_grace` | stale metadata served, warning logged      |
//! | refresh failed < `min_refresh_interval` ago | no new fetch, fail or serve stale     |
//! | unknown `kid`                          | forced refresh, at most once per `min_refresh_interval` |
//!
//! ## Fetch hardening
//!
//! Only `https` URLs are fetched (plain `http` is accepted for loopback
//! hosts), private and cloud-metadata addresses are refused, redirects are
//! not followed, and bodies over 1 MiB are rejected.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::{Jwk, JwkSet};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;
use wf_core::MetadataOptions;

use crate::error::MetadataError;
use crate::metrics::record_metadata_refresh;

/// Largest discovery or key-set response accepted.
const MAX_RESPONSE_SIZE: u64 = 1024 * 1024;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

// ── Policy ──────────────────────────────────────────────────────────────────

/// Timing knobs for the metadata cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetadataCachePolicy {
    /// Age after which cached metadata is refreshed.
    pub refresh_interval: Duration,
    /// Minimum gap between forced refreshes, and how long a failed fetch
    /// suppresses further fetches.
    pub min_refresh_interval: Duration,
    /// How long past `refresh_interval` cached metadata may still be served
    /// while the provider is unreachable.
    pub stale_grace: Duration,
}

impl Default for MetadataCachePolicy {
    fn default() -> Self {
        Self::from(&MetadataOptions::default())
    }
}

impl From<&MetadataOptions> for MetadataCachePolicy {
    fn from(options: &MetadataOptions) -> Self {
        Self {
            refresh_interval: options.refresh_interval,
            min_refresh_interval: options.min_refresh_interval,
            stale_grace: options.stale_grace,
        }
    }
}

// ── Metadata ────────────────────────────────────────────────────────────────

/// Issuer and signing keys published by the identity provider.
#[derive(Debug, Clone)]
pub struct SigningMetadata {
    /// Issuer as advertised. Multi-tenant documents carry a `{tenantid}`
    /// placeholder here.
    pub issuer: String,
    pub keys: JwkSet,
}

impl SigningMetadata {
    pub fn find_key(&self, kid: &str) -> Option<&Jwk> {
        self.keys.find(kid)
    }
}

#[derive(Debug, Deserialize)]
struct OpenIdConfiguration {
    issuer: String,
    jwks_uri: String,
}

/// Key set parsed leniently: keys of unknown types are skipped instead of
/// failing the whole set.
#[derive(Debug, Deserialize)]
struct RawKeySet {
    keys: Vec<serde_json::Value>,
}

struct CachedMetadata {
    metadata: Arc<SigningMetadata>,
    fetched_at: Instant,
}

#[derive(Default)]
struct CacheState {
    entry: Option<CachedMetadata>,
    last_attempt: Option<Instant>,
    last_failure: Option<(Instant, String)>,
}

// ── Provider ────────────────────────────────────────────────────────────────

/// Caching source of [`SigningMetadata`].
pub struct MetadataProvider {
    client: reqwest::Client,
    metadata_url: Url,
    policy: MetadataCachePolicy,
    state: RwLock<CacheState>,
    /// Held for the duration of a fetch so refreshes are single-flight.
    refresh_lock: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for MetadataProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataProvider")
            .field("metadata_url", &self.metadata_url.as_str())
            .field("policy", &self.policy)
            .finish()
    }
}

impl MetadataProvider {
    /// Create a provider for the discovery document at `metadata_url`.
    /// Nothing is fetched until the first call to [`current`](Self::current).
    pub fn new(metadata_url: &str, policy: MetadataCachePolicy) -> Result<Self, MetadataError> {
        let metadata_url = validate_url(metadata_url)?;

        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| MetadataError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            metadata_url,
            policy,
            state: RwLock::new(CacheState::default()),
            refresh_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Current signing metadata, refreshing it when expired.
    pub async fn current(&self) -> Result<Arc<SigningMetadata>, MetadataError> {
        if let Some(fresh) = self.fresh() {
            return Ok(fresh);
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited.
        if let Some(fresh) = self.fresh() {
            return Ok(fresh);
        }
        if let Some(err) = self.recent_failure() {
            return self.stale_or(err);
        }

        match self.fetch_and_store().await {
            Ok(metadata) => Ok(metadata),
            Err(err) => self.stale_or(err),
        }
    }

    /// Refresh after a token named a key the cached set does not contain.
    ///
    /// Returns the cached metadata unchanged when the key appeared in the
    /// meantime or a fetch happened less than `min_refresh_interval` ago.
    pub async fn refresh_for_unknown_key(
        &self,
        kid: &str,
    ) -> Result<Arc<SigningMetadata>, MetadataError> {
        let _guard = self.refresh_lock.lock().await;

        {
            let state = self.state.read();
            if let Some(entry) = &state.entry {
                if entry.metadata.find_key(kid).is_some() {
                    return Ok(Arc::clone(&entry.metadata));
                }
                let recently_fetched = state
                    .last_attempt
                    .is_some_and(|at| at.elapsed() < self.policy.min_refresh_interval);
                if recently_fetched {
                    debug!(kid, "forced metadata refresh suppressed, fetched recently");
                    return Ok(Arc::clone(&entry.metadata));
                }
            }
        }
        if let Some(err) = self.recent_failure() {
            return Err(err);
        }

        info!(kid, "signing key not cached, refreshing metadata");
        self.fetch_and_store().await
    }

    fn fresh(&self) -> Option<Arc<SigningMetadata>> {
        let state = self.state.read();
        state
            .entry
            .as_ref()
            .filter(|entry| entry.fetched_at.elapsed() < self.policy.refresh_interval)
            .map(|entry| Arc::clone(&entry.metadata))
    }

    fn recent_failure(&self) -> Option<MetadataError> {
        let state = self.state.read();
        state
            .last_failure
            .as_ref()
            .filter(|(at, _)| at.elapsed() < self.policy.min_refresh_interval)
            .map(|(_, message)| MetadataError::Unavailable {
                last_error: message.clone(),
            })
    }

    /// Serve expired metadata inside the grace window, otherwise fail.
    fn stale_or(&self, err: MetadataError) -> Result<Arc<SigningMetadata>, MetadataError> {
        let state = self.state.read();
        let limit = self.policy.refresh_interval + self.policy.stale_grace;
        match state.entry.as_ref() {
            Some(entry) if entry.fetched_at.elapsed() < limit => {
                warn!(error = %err, "serving stale identity provider metadata");
                record_metadata_refresh("stale");
                Ok(Arc::clone(&entry.metadata))
            }
            _ => Err(err),
        }
    }

    async fn fetch_and_store(&self) -> Result<Arc<SigningMetadata>, MetadataError> {
        self.state.write().last_attempt = Some(Instant::now());

        match self.fetch().await {
            Ok(metadata) => {
                let metadata = Arc::new(metadata);
                info!(
                    issuer = %metadata.issuer,
                    keys = metadata.keys.keys.len(),
                    "identity provider metadata refreshed"
                );
                record_metadata_refresh("success");
                let mut state = self.state.write();
                state.entry = Some(CachedMetadata {
                    metadata: Arc::clone(&metadata),
                    fetched_at: Instant::now(),
                });
                state.last_failure = None;
                Ok(metadata)
            }
            Err(err) => {
                warn!(url = %self.metadata_url, error = %err, "identity provider metadata refresh failed");
                record_metadata_refresh("failure");
                self.state.write().last_failure = Some((Instant::now(), err.to_string()));
                Err(err)
            }
        }
    }

    async fn fetch(&self) -> Result<SigningMetadata, MetadataError> {
        let discovery: OpenIdConfiguration = self
            .get_json(
                self.metadata_url.as_str(),
                MetadataError::DiscoveryFetch,
                MetadataError::DiscoveryParse,
            )
            .await?;

        let jwks_url = validate_url(&discovery.jwks_uri)?;
        let raw: RawKeySet = self
            .get_json(
                jwks_url.as_str(),
                MetadataError::JwksFetch,
                MetadataError::JwksParse,
            )
            .await?;

        let keys = raw
            .keys
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<Jwk>(value) {
                Ok(jwk) => Some(jwk),
                Err(e) => {
                    debug!(error = %e, "skipping unrecognised signing key");
                    None
                }
            })
            .collect();

        Ok(SigningMetadata {
            issuer: discovery.issuer,
            keys: JwkSet { keys },
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        fetch_err: fn(String) -> MetadataError,
        parse_err: fn(String) -> MetadataError,
    ) -> Result<T, MetadataError> {
        debug!(url, "fetching identity provider document");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;

        if !response.status().is_success() {
            return Err(fetch_err(format!("HTTP {}", response.status())));
        }

        if let Some(size) = response.content_length() {
            if size > MAX_RESPONSE_SIZE {
                return Err(MetadataError::ResponseTooLarge {
                    size,
                    max: MAX_RESPONSE_SIZE,
                });
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;
        if bytes.len() as u64 > MAX_RESPONSE_SIZE {
            return Err(MetadataError::ResponseTooLarge {
                size: bytes.len() as u64,
                max: MAX_RESPONSE_SIZE,
            });
        }

        serde_json::from_slice(&bytes).map_err(|e| parse_err(e.to_string()))
    }
}

// ── URL validation ──────────────────────────────────────────────────────────

/// Validate an identity-provider URL before fetching it.
pub(crate) fn validate_url(raw: &str) -> Result<Url, MetadataError> {
    let url = Url::parse(raw).map_err(|e| MetadataError::InvalidUrl(format!("{raw}: {e}")))?;

    let loopback = match url.host() {
        Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
        Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    };

    match url.scheme() {
        "https" => {}
        "http" if loopback => return Ok(url),
        "http" => {
            return Err(MetadataError::SsrfBlocked(format!(
                "plain http is only allowed for loopback hosts: {raw}"
            )))
        }
        scheme => {
            return Err(MetadataError::SsrfBlocked(format!(
                "unsupported scheme '{scheme}'"
            )))
        }
    }

    match url.host() {
        Some(host) => check_public_host(&host)?,
        None => return Err(MetadataError::InvalidUrl(format!("{raw}: missing host"))),
    }
    Ok(url)
}

fn check_public_host(host: &url::Host<&str>) -> Result<(), MetadataError> {
    match host {
        url::Host::Ipv4(ip) if is_private_ip(&IpAddr::V4(*ip)) => Err(
            MetadataError::SsrfBlocked(format!("private address not allowed: {ip}")),
        ),
        url::Host::Ipv6(ip) if is_private_ip(&IpAddr::V6(*ip)) => Err(
            MetadataError::SsrfBlocked(format!("private address not allowed: {ip}")),
        ),
        url::Host::Domain(domain) => {
            let lower = domain.to_ascii_lowercase();
            if lower == "metadata" || lower.ends_with(".internal") || lower.ends_with(".local") {
                Err(MetadataError::SsrfBlocked(format!(
                    "internal hostname not allowed: {domain}"
                )))
            } else {
                Ok(())
            }
        }
        _ => Ok(()),
    }
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                || is_shared_address(v4)
        }
        IpAddr::V6(v6) => {
            v6.is_loopback() || v6.is_unspecified() || is_unique_local(v6) || is_link_local_v6(v6)
        }
    }
}

/// 100.64.0.0/10
fn is_shared_address(ip: &Ipv4Addr) -> bool {
    let octets = ip.octets();
    octets[0] == 100 && (octets[1] & 0xC0) == 64
}

/// fc00::/7
fn is_unique_local(ip: &Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xfe00) == 0xfc00
}

/// fe80::/10
fn is_link_local_v6(ip: &Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xffc0) == 0xfe80
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn https_and_loopback_http_are_accepted() {
        assert!(validate_url("https://login.microsoftonline.com/t/v2.0/.well-known/openid-configuration").is_ok());
        assert!(validate_url("http://localhost:8080/idp").is_ok());
        assert!(validate_url("http://127.0.0.1:8080/idp").is_ok());
        assert!(validate_url("http://[::1]:8080/idp").is_ok());
    }

    #[test]
    fn plain_http_to_remote_hosts_is_refused() {
        let err = validate_url("http://login.microsoftonline.com/t").unwrap_err();
        assert!(matches!(err, MetadataError::SsrfBlocked(_)));
        assert!(validate_url("ftp://example.com/keys").is_err());
        assert!(validate_url("not a url").is_err());
    }

    #[test]
    fn private_and_metadata_addresses_are_refused() {
        for url in [
            "https://10.0.0.1/keys",
            "https://172.16.4.2/keys",
            "https://192.168.1.1/keys",
            "https://169.254.169.254/latest",
            "https://100.64.0.1/keys",
            "https://[fd00::1]/keys",
            "https://metadata/computeMetadata",
            "https://metadata.google.internal/keys",
            "https://printer.local/keys",
        ] {
            assert!(validate_url(url).is_err(), "{url} should be refused");
        }
    }

    #[test]
    fn policy_follows_options() {
        let options = MetadataOptions {
            refresh_interval: Duration::from_secs(10),
            min_refresh_interval: Duration::from_secs(2),
            stale_grace: Duration::from_secs(5),
        };
        let policy = MetadataCachePolicy::from(&options);
        assert_eq!(policy.refresh_interval, Duration::from_secs(10));
        assert_eq!(policy.min_refresh_interval, Duration::from_secs(2));
        assert_eq!(policy.stale_grace, Duration::from_secs(5));
        assert_eq!(
            MetadataCachePolicy::default().refresh_interval,
            Duration::from_secs(12 * 60 * 60)
        );
    }

    #[test]
    fn provider_construction_validates_url() {
        let err = MetadataProvider::new("http://example.com/x", MetadataCachePolicy::default())
            .unwrap_err();
        assert!(matches!(err, MetadataError::SsrfBlocked(_)));
    }

    #[test]
    fn lenient_key_set_skips_unknown_key_types() {
        let raw: RawKeySet = serde_json::from_value(serde_json::json!({
            "keys": [
                { "kty": "RSA", "kid": "a", "n": "AQAB", "e": "AQAB" },
                { "kty": "weird", "kid": "b" }
            ]
        }))
        .unwrap();
        let parsed: Vec<Jwk> = raw
            .keys
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].common.key_id.as_deref(), Some("a"));
    }
}
