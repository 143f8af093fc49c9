//! # Identity Provider Endpoints
//!
//! URLs derived from the `AzureAd` section. Derivation is plain string
//! concatenation of `{instance}{tenantId}`: the instance is normalised to
//! end in `/` at load time, so nothing here re-parses it.

use crate::config::AzureAdOptions;

/// Scope name appended to `api://{clientId}/` for the documentation UI.
pub const API_SCOPE_NAME: &str = "access_to_api";

/// Endpoints of the Microsoft identity platform v2.0 for one tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityProviderEndpoints {
    /// `{instance}{tenantId}/v2.0`
    pub authority: String,
    /// OpenID Connect discovery document.
    pub metadata_url: String,
    pub authorize_url: String,
    pub token_url: String,
    /// `api://{clientId}/access_to_api`
    pub api_scope: String,
}

impl IdentityProviderEndpoints {
    pub fn new(options: &AzureAdOptions) -> Self {
        let base = format!("{}{}", options.instance, options.tenant_id);
        let authority = format!("{base}/v2.0");
        Self {
            metadata_url: format!("{authority}/.well-known/openid-configuration"),
            authority,
            authorize_url: format!("{base}/oauth2/v2.0/authorize"),
            token_url: format!("{base}/oauth2/v2.0/token"),
            api_scope: format!("api://{}/{API_SCOPE_NAME}", options.client_id),
        }
    }
}
