//! # wf-core: Host Configuration
//!
//! Configuration model shared by the authentication layer and the API
//! host:
//!
//! - [`config`]: layered settings loading and fail-fast validation.
//! - [`environment`]: the named hosting environment.
//! - [`endpoints`]: identity-provider URLs derived from the `AzureAd`
//!   section.
//!
//! Nothing here performs network I/O.

pub mod config;
pub mod endpoints;
pub mod environment;
pub mod error;

pub use config::{
    AzureAdOptions, MetadataOptions, ServerOptions, Settings, SettingsTree, SwaggerOptions,
};
pub use endpoints::IdentityProviderEndpoints;
pub use environment::HostEnvironment;
pub use error::ConfigError;
