//! # Authentication Errors
//!
//! Two layers of failure: fetching identity-provider metadata
//! ([`MetadataError`]) and validating one bearer token ([`TokenError`]).
//! Both end in a 401 at the HTTP boundary; neither is a server fault.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::Algorithm;
use thiserror::Error;

/// Failure to obtain signing metadata from the identity provider.
#[derive(Error, Debug, Clone)]
pub enum MetadataError {
    #[error("invalid metadata URL: {0}")]
    InvalidUrl(String),

    #[error("metadata URL refused: {0}")]
    SsrfBlocked(String),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),

    #[error("failed to fetch OpenID configuration: {0}")]
    DiscoveryFetch(String),

    #[error("failed to parse OpenID configuration: {0}")]
    DiscoveryParse(String),

    #[error("failed to fetch signing keys: {0}")]
    JwksFetch(String),

    #[error("failed to parse signing keys: {0}")]
    JwksParse(String),

    #[error("response too large: {size} bytes (max: {max})")]
    ResponseTooLarge { size: u64, max: u64 },

    /// A recent fetch failed and no usable metadata is cached.
    #[error("identity provider metadata unavailable after a recent failure: {last_error}")]
    Unavailable { last_error: String },
}

/// Why a presented bearer token was rejected.
#[derive(Error, Debug)]
pub enum TokenError {
    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("token header has no 'kid'")]
    MissingKid,

    #[error("no signing key matches kid '{0}'")]
    UnknownKey(String),

    #[error("signing key '{kid}' is not usable: {reason}")]
    UnsupportedKey { kid: String, reason: String },

    #[error("token algorithm {token_alg:?} is not allowed for key '{kid}'")]
    AlgorithmMismatch { kid: String, token_alg: Algorithm },

    #[error("token has expired")]
    Expired,

    #[error("token is not valid yet")]
    NotYetValid,

    #[error("token audience is not accepted")]
    InvalidAudience,

    #[error("token issuer is not accepted")]
    InvalidIssuer,

    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token is missing required claim '{0}'")]
    MissingClaim(String),

    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

impl TokenError {
    /// Short client-safe text for the `error_description` of a
    /// `WWW-Authenticate` challenge.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Malformed(_) | Self::MissingKid => "The token is malformed",
            Self::UnknownKey(_) | Self::UnsupportedKey { .. } | Self::AlgorithmMismatch { .. } => {
                "The signing key is not trusted"
            }
            Self::Expired => "The token expired",
            Self::NotYetValid => "The token is not valid yet",
            Self::InvalidAudience => "The audience is invalid",
            Self::InvalidIssuer => "The issuer is invalid",
            Self::InvalidSignature => "The signature is invalid",
            Self::MissingClaim(_) => "The token is missing a required claim",
            Self::Metadata(_) => "The signing keys could not be retrieved",
        }
    }

    /// Label for the `wf_authentication_total` counter.
    pub fn outcome_label(&self) -> &'static str {
        match self {
            Self::Metadata(_) => "metadata_unavailable",
            Self::Expired | Self::NotYetValid => "lifetime",
            Self::InvalidAudience => "audience",
            Self::InvalidIssuer => "issuer",
            Self::InvalidSignature => "signature",
            Self::UnknownKey(_) | Self::UnsupportedKey { .. } | Self::AlgorithmMismatch { .. } => {
                "key"
            }
            Self::Malformed(_) | Self::MissingKid | Self::MissingClaim(_) => "malformed",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::ImmatureSignature => Self::NotYetValid,
            ErrorKind::InvalidAudience => Self::InvalidAudience,
            ErrorKind::InvalidIssuer => Self::InvalidIssuer,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::MissingRequiredClaim(claim) => Self::MissingClaim(claim.clone()),
            _ => Self::Malformed(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jsonwebtoken_kinds_map_to_variants() {
        let expired: TokenError = jsonwebtoken::errors::Error::from(ErrorKind::ExpiredSignature).into();
        assert!(matches!(expired, TokenError::Expired));

        let audience: TokenError = jsonwebtoken::errors::Error::from(ErrorKind::InvalidAudience).into();
        assert!(matches!(audience, TokenError::InvalidAudience));

        let missing: TokenError =
            jsonwebtoken::errors::Error::from(ErrorKind::MissingRequiredClaim("aud".into())).into();
        assert!(matches!(missing, TokenError::MissingClaim(ref c) if c == "aud"));

        let other: TokenError = jsonwebtoken::errors::Error::from(ErrorKind::InvalidToken).into();
        assert!(matches!(other, TokenError::Malformed(_)));
    }

    #[test]
    fn descriptions_do_not_leak_internals() {
        let err = TokenError::Metadata(MetadataError::DiscoveryFetch(
            "connection refused to 10.0.0.7".into(),
        ));
        assert!(!err.description().contains("10.0.0.7"));
        assert_eq!(err.outcome_label(), "metadata_unavailable");
    }
}
