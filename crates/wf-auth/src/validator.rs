//! # Token Validation
//!
//! Validates bearer tokens against the identity provider's signing
//! metadata:
//!
//! 1. decode the header and require a `kid`;
//! 2. resolve the key, forcing one metadata refresh if the `kid` is unknown;
//! 3. check the header `alg` against the key family;
//! 4. verify signature, lifetime (with clock-skew leeway), issuer and
//!    audience.
//!
//! A failure is final for the request. Nothing is retried.

use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::jwk::{AlgorithmParameters, EllipticCurve, Jwk, KeyAlgorithm};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};
use tracing::debug;
use wf_core::AzureAdOptions;

use crate::error::TokenError;
use crate::metadata::MetadataProvider;
use crate::principal::Principal;

/// Clock skew tolerated on `exp` and `nbf`.
pub const DEFAULT_LEEWAY: Duration = Duration::from_secs(300);

/// Placeholder in multi-tenant issuer templates.
const TENANT_PLACEHOLDER: &str = "{tenantid}";

const RSA_ALGORITHMS: &[Algorithm] = &[
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
];

/// What a token must satisfy besides a valid signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationSettings {
    pub tenant_id: String,
    /// Any one of these must appear in `aud`.
    pub audiences: Vec<String>,
    pub leeway: Duration,
}

impl ValidationSettings {
    /// Accept `{clientId}`, `api://{clientId}` and the optional extra
    /// audience.
    pub fn from_azure_ad(options: &AzureAdOptions) -> Self {
        let mut audiences = vec![
            options.client_id.clone(),
            format!("api://{}", options.client_id),
        ];
        if let Some(extra) = &options.audience {
            if !audiences.contains(extra) {
                audiences.push(extra.clone());
            }
        }
        Self {
            tenant_id: options.tenant_id.clone(),
            audiences,
            leeway: DEFAULT_LEEWAY,
        }
    }
}

/// Bearer token validator.
#[derive(Debug, Clone)]
pub struct TokenValidator {
    settings: ValidationSettings,
    metadata: Arc<MetadataProvider>,
}

impl TokenValidator {
    pub fn new(settings: ValidationSettings, metadata: Arc<MetadataProvider>) -> Self {
        Self { settings, metadata }
    }

    /// Validate `token` and return the caller it identifies.
    pub async fn validate(&self, token: &str) -> Result<Principal, TokenError> {
        let header = decode_header(token).map_err(|e| TokenError::Malformed(e.to_string()))?;
        let kid = header.kid.ok_or(TokenError::MissingKid)?;

        let mut metadata = self.metadata.current().await?;
        if metadata.find_key(&kid).is_none() {
            metadata = self.metadata.refresh_for_unknown_key(&kid).await?;
        }
        let jwk = metadata
            .find_key(&kid)
            .ok_or_else(|| TokenError::UnknownKey(kid.clone()))?;

        let allowed = allowed_algorithms(&kid, jwk)?;
        if !allowed.contains(&header.alg) {
            return Err(TokenError::AlgorithmMismatch {
                kid,
                token_alg: header.alg,
            });
        }

        let key = DecodingKey::from_jwk(jwk).map_err(|e| TokenError::UnsupportedKey {
            kid: kid.clone(),
            reason: e.to_string(),
        })?;

        let mut validation = Validation::new(header.alg);
        validation.leeway = self.settings.leeway.as_secs();
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        validation.set_audience(&self.settings.audiences);
        validation.set_issuer(&[self.expected_issuer(&metadata.issuer)]);

        let data = decode::<Map<String, Value>>(token, &key, &validation)?;
        let principal = Principal::from_claims(data.claims)?;
        debug!(
            kid,
            subject = %principal.subject,
            alg = ?header.alg,
            "bearer token validated"
        );
        Ok(principal)
    }

    /// The discovered issuer with the tenant placeholder filled in.
    pub fn expected_issuer(&self, discovered: &str) -> String {
        discovered.replace(TENANT_PLACEHOLDER, &self.settings.tenant_id)
    }
}

/// Algorithms a token may use with `jwk`. Symmetric and EdDSA keys are
/// never trusted.
fn allowed_algorithms(kid: &str, jwk: &Jwk) -> Result<Vec<Algorithm>, TokenError> {
    let unsupported = |reason: String| TokenError::UnsupportedKey {
        kid: kid.to_string(),
        reason,
    };

    let family: Vec<Algorithm> = match &jwk.algorithm {
        AlgorithmParameters::RSA(_) => RSA_ALGORITHMS.to_vec(),
        AlgorithmParameters::EllipticCurve(ec) => match ec.curve {
            EllipticCurve::P256 => vec![Algorithm::ES256],
            EllipticCurve::P384 => vec![Algorithm::ES384],
            ref other => return Err(unsupported(format!("curve {other:?} is not accepted"))),
        },
        AlgorithmParameters::OctetKey(_) => {
            return Err(unsupported("symmetric keys are not accepted".into()))
        }
        AlgorithmParameters::OctetKeyPair(_) => {
            return Err(unsupported("EdDSA keys are not accepted".into()))
        }
    };

    // A key that pins its algorithm narrows the family to that one.
    match &jwk.common.key_algorithm {
        None => Ok(family),
        Some(pinned) => match signing_algorithm(pinned) {
            Some(alg) if family.contains(&alg) => Ok(vec![alg]),
            _ => Err(unsupported(format!(
                "key algorithm {pinned:?} is not accepted for this key type"
            ))),
        },
    }
}

fn signing_algorithm(alg: &KeyAlgorithm) -> Option<Algorithm> {
    Some(match alg {
        KeyAlgorithm::RS256 => Algorithm::RS256,
        KeyAlgorithm::RS384 => Algorithm::RS384,
        KeyAlgorithm::RS512 => Algorithm::RS512,
        KeyAlgorithm::PS256 => Algorithm::PS256,
        KeyAlgorithm::PS384 => Algorithm::PS384,
        KeyAlgorithm::PS512 => Algorithm::PS512,
        KeyAlgorithm::ES256 => Algorithm::ES256,
        KeyAlgorithm::ES384 => Algorithm::ES384,
        _ => return None,
    })
}
