//! Shared fixtures: a wiremock identity provider, RS256 token minting and
//! application builders.

#![allow(dead_code)]

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::Router;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use wf_api::state::AppState;
use wf_core::{HostEnvironment, Settings};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TENANT: &str = "tenant-1";
pub const CLIENT_ID: &str = "client-1";
pub const SWAGGER_CLIENT_ID: &str = "swagger-ui-1";
pub const SIGNING_KID: &str = "key-1";

pub const SIGNING_KEY_PEM: &str = include_str!("../../../../testdata/signing-key.pem");

const SIGNING_KEY_N: &str = "sVsuMB91NYkNYUb31b-SFkw-KTLLvfA0tDju_Xfi_JvDcQ-hZO7j2-NvR7PSA50A61X758OzEopsnub2b8ocm339gCfJId9tIFAArWO5Zk4TRE-Yfx26UHX0N8huqyPXDz9ZfGzPha5dTLhqzeQyCUe_r5dnQ08hSDv515bk64iq0uZ7N4xpauZKVKYD2qxwJUw6bykf4Z-evtcb4TSN5TL_s0QmV6OQC0qlyzpc2Q04bY85mgcaIlsUyHeUdkomludnDXpzyDgVP6ddcEFlBh_e6AD3l7MIqzidYoDE6IwBLStmsGLmzUpRjsFJLhr0CqQaUIiIpWAHPI_EKisKRw";

pub fn signing_jwk() -> Value {
    json!({ "kty": "RSA", "use": "sig", "kid": SIGNING_KID, "n": SIGNING_KEY_N, "e": "AQAB" })
}

/// Identity provider serving tenant-scoped discovery and key documents.
pub struct MockIdentityProvider {
    pub server: MockServer,
}

impl MockIdentityProvider {
    /// Provider publishing only the signing key.
    pub async fn start() -> Self {
        let idp = Self::bare().await;
        idp.mount_discovery(None).await;
        idp.mount_keys(vec![signing_jwk()]).await;
        idp
    }

    /// Provider with nothing mounted.
    pub async fn bare() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// `AzureAd:Instance` pointing at this provider.
    pub fn instance(&self) -> String {
        format!("{}/", self.uri())
    }

    pub fn metadata_path() -> String {
        format!("/{TENANT}/v2.0/.well-known/openid-configuration")
    }

    pub fn keys_path() -> String {
        format!("/{TENANT}/discovery/v2.0/keys")
    }

    pub fn metadata_url(&self) -> String {
        format!("{}{}", self.uri(), Self::metadata_path())
    }

    pub fn issuer(&self) -> String {
        format!("{}/{TENANT}/v2.0", self.uri())
    }

    /// Mount the discovery document; `issuer` defaults to the tenant issuer.
    pub async fn mount_discovery(&self, issuer: Option<String>) {
        let body = json!({
            "issuer": issuer.unwrap_or_else(|| self.issuer()),
            "jwks_uri": format!("{}{}", self.uri(), Self::keys_path()),
            "authorization_endpoint": format!("{}/{TENANT}/oauth2/v2.0/authorize", self.uri()),
            "token_endpoint": format!("{}/{TENANT}/oauth2/v2.0/token", self.uri()),
        });
        Mock::given(method("GET"))
            .and(path(Self::metadata_path()))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    pub async fn mount_keys(&self, keys: Vec<Value>) {
        Mock::given(method("GET"))
            .and(path(Self::keys_path()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "keys": keys })))
            .mount(&self.server)
            .await;
    }
}

pub fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}

/// Claims of a token the API accepts, issued by `issuer`.
pub fn claims(issuer: &str) -> Value {
    let now = now();
    json!({
        "sub": "subject-1",
        "oid": "6f1b7d3c-52a6-4a54-a3a1-3c5e1f0d2b9a",
        "tid": TENANT,
        "iss": issuer,
        "aud": CLIENT_ID,
        "iat": now,
        "nbf": now - 10,
        "exp": now + 3600,
        "name": "Test Caller",
        "preferred_username": "caller@example.com",
        "scp": "access_to_api",
    })
}

/// Sign `claims` with RS256.
pub fn mint(kid: Option<&str>, pem: &str, claims: &Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(str::to_string);
    let key = EncodingKey::from_rsa_pem(pem.as_bytes()).unwrap();
    encode(&header, claims, &key).unwrap()
}

/// Settings pointing `AzureAd` at `instance`.
pub fn settings(instance: &str, https_port: Option<u16>) -> Settings {
    let mut server = json!({ "Port": 5000 });
    if let Some(port) = https_port {
        server["HttpsPort"] = json!(port);
    }
    Settings::from_value(&json!({
        "AzureAd": {
            "Instance": instance,
            "TenantId": TENANT,
            "ClientId": CLIENT_ID,
        },
        "Swagger": { "ClientId": SWAGGER_CLIENT_ID },
        "Server": server,
    }))
    .unwrap()
}

pub fn state(settings: Settings, environment: HostEnvironment) -> AppState {
    AppState::bootstrap_with_docs(settings, environment, None).unwrap()
}

/// Production application authenticating against `idp`.
pub fn app_for(idp: &MockIdentityProvider) -> Router {
    wf_api::app(state(settings(&idp.instance(), None), HostEnvironment::Production))
}
