//! # wf-auth: Bearer Token Authentication
//!
//! Authenticates callers with JWT bearer tokens issued by a Microsoft
//! identity platform (v2.0) tenant.
//!
//! | Module          | Role                                                    |
//! |-----------------|---------------------------------------------------------|
//! | [`metadata`]    | OpenID Connect discovery + JWKS cache                   |
//! | [`validator`]   | signature, lifetime, issuer and audience checks         |
//! | [`principal`]   | authenticated caller and its Axum extractor             |
//! | [`middleware`]  | authentication stage, authorization policy stage        |
//! | [`metrics`]     | `wf_metadata_refresh_total`, `wf_authentication_total`  |

pub mod error;
pub mod metadata;
pub mod metrics;
pub mod middleware;
pub mod principal;
pub mod validator;

pub use error::{MetadataError, TokenError};
pub use metadata::{MetadataCachePolicy, MetadataProvider, SigningMetadata};
pub use middleware::{authenticate, authorize, AuthenticationOutcome, AuthorizationPolicy};
pub use principal::Principal;
pub use validator::{TokenValidator, ValidationSettings};
