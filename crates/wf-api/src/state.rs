//! # Application State
//!
//! Shared, immutable state handed to every handler and middleware stage.
//! Built once by [`AppState::bootstrap`], which performs service
//! registration in a fixed order:
//!
//! 1. bearer authentication: metadata provider and token validator;
//! 2. controllers: guarded by the global policy when the pipeline is
//!    assembled (see [`crate::pipeline`]);
//! 3. documentation: the OpenAPI document with its `oauth2` scheme.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use wf_auth::{
    AuthorizationPolicy, MetadataCachePolicy, MetadataError, MetadataProvider, TokenValidator,
    ValidationSettings,
};
use wf_core::{HostEnvironment, IdentityProviderEndpoints, Settings};

use crate::openapi::ApiDocument;

/// Errors raised while wiring the application together.
#[derive(Error, Debug)]
pub enum BootstrapError {
    /// The derived metadata URL was rejected by the metadata provider.
    #[error("identity provider metadata endpoint rejected: {0}")]
    Metadata(#[from] MetadataError),

    /// The OpenAPI document could not be rendered.
    #[error("OpenAPI document rendering failed: {0}")]
    Document(#[from] serde_json::Error),
}

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Validated settings, read once at start-up.
    pub settings: Arc<Settings>,
    /// Named hosting environment; selects developer diagnostics.
    pub environment: HostEnvironment,
    /// Bearer token validator backed by the metadata cache.
    pub validator: Arc<TokenValidator>,
    /// Policy applied to every controller route.
    pub policy: AuthorizationPolicy,
    /// Rendered OpenAPI document.
    pub api_document: Arc<ApiDocument>,
}

impl AppState {
    /// Register services, reading the documentation side-file from its
    /// default location next to the executable.
    pub fn bootstrap(settings: Settings, environment: HostEnvironment) -> Result<Self, BootstrapError> {
        let side_file = ApiDocument::default_side_file();
        Self::bootstrap_with_docs(settings, environment, side_file.as_deref())
    }

    /// Register services with an explicit documentation side-file.
    pub fn bootstrap_with_docs(
        settings: Settings,
        environment: HostEnvironment,
        side_file: Option<&Path>,
    ) -> Result<Self, BootstrapError> {
        let endpoints = IdentityProviderEndpoints::new(&settings.azure_ad);

        let metadata = MetadataProvider::new(
            &endpoints.metadata_url,
            MetadataCachePolicy::from(&settings.metadata),
        )?;
        let validator = TokenValidator::new(
            ValidationSettings::from_azure_ad(&settings.azure_ad),
            Arc::new(metadata),
        );
        tracing::info!(
            authority = %endpoints.authority,
            metadata_url = %endpoints.metadata_url,
            "bearer authentication registered"
        );

        let policy = AuthorizationPolicy::require_authenticated_user();

        let api_document = ApiDocument::generate(&settings, &endpoints, side_file)?;
        tracing::info!(
            scope = %endpoints.api_scope,
            "documentation generator registered"
        );

        Ok(Self {
            settings: Arc::new(settings),
            environment,
            validator: Arc::new(validator),
            policy,
            api_document: Arc::new(api_document),
        })
    }
}
