//! # OpenAPI Document & Interactive UI
//!
//! Handlers declare their metadata with `#[utoipa::path]` and [`ApiDoc`]
//! collects them at compile time. At start-up [`ApiDocument::generate`]
//! adds the `oauth2` implicit-flow security scheme derived from the
//! `AzureAd` settings, applies the optional documentation side-file and
//! caches the rendered JSON.
//!
//! | Route                             | Content                         |
//! |-----------------------------------|---------------------------------|
//! | `GET /swagger/v0.1/swagger.json`  | the document                    |
//! | `GET /swagger`, `/swagger/index.html` | interactive UI with OAuth login |
//! | `GET /swagger/oauth2-redirect.html`   | OAuth callback page for the UI  |
//!
//! None of these routes sit behind the controller policy.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use axum::extract::State;
use axum::http::header;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use serde_json::Value;
use utoipa::openapi::extensions::Extensions;
use utoipa::openapi::security::{
    Flow, Implicit, OAuth2, Scopes, SecurityRequirement, SecurityScheme,
};
use utoipa::openapi::Components;
use utoipa::OpenApi;
use wf_core::{IdentityProviderEndpoints, Settings};

use crate::state::AppState;

pub const DOCUMENT_TITLE: &str = "Weather Forecast API";
pub const DOCUMENT_VERSION: &str = "v0.1";
pub const DOCUMENT_PATH: &str = "/swagger/v0.1/swagger.json";
pub const SECURITY_SCHEME: &str = "oauth2";
const SCOPE_DESCRIPTION: &str = "Access to Weather Forecast API";
const SWAGGER_UI_DIST: &str = "https://unpkg.com/swagger-ui-dist@5";

/// Compile-time registry of documented routes and schemas.
#[derive(OpenApi)]
#[openapi(
    info(title = "Weather Forecast API", version = "v0.1"),
    paths(crate::routes::weather_forecast::get_weather_forecast),
    components(schemas(
        crate::routes::weather_forecast::WeatherForecast,
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "WeatherForecast", description = "Five-day weather forecast"),
    )
)]
pub struct ApiDoc;

// ── Side-file ───────────────────────────────────────────────────────────────

/// Optional documentation text loaded from `{binary}.docs.json`.
#[derive(Debug, Default, Deserialize)]
struct DocsSideFile {
    #[serde(default)]
    operations: BTreeMap<String, OperationDocs>,
    #[serde(default)]
    schemas: BTreeMap<String, SchemaDocs>,
}

#[derive(Debug, Default, Deserialize)]
struct OperationDocs {
    summary: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SchemaDocs {
    description: Option<String>,
}

impl DocsSideFile {
    /// Read the side-file. Absence and malformation are both non-fatal.
    fn read(path: &Path) -> Option<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no documentation side-file");
                return None;
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "documentation side-file unreadable");
                return None;
            }
        };
        match serde_json::from_str(&text) {
            Ok(docs) => Some(docs),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "documentation side-file malformed");
                None
            }
        }
    }

    fn apply(&self, document: &mut Value) {
        for (operation_id, docs) in &self.operations {
            match find_operation(document, operation_id) {
                Some(operation) => {
                    if let Some(summary) = &docs.summary {
                        operation.insert("summary".into(), Value::from(summary.as_str()));
                    }
                    if let Some(description) = &docs.description {
                        operation.insert("description".into(), Value::from(description.as_str()));
                    }
                }
                None => tracing::debug!(%operation_id, "side-file names an unknown operation"),
            }
        }

        for (name, docs) in &self.schemas {
            let Some(description) = &docs.description else { continue };
            match document
                .pointer_mut(&format!("/components/schemas/{name}"))
                .and_then(Value::as_object_mut)
            {
                Some(schema) => {
                    schema.insert("description".into(), Value::from(description.as_str()));
                }
                None => tracing::debug!(schema = %name, "side-file names an unknown schema"),
            }
        }
    }
}

fn find_operation<'a>(
    document: &'a mut Value,
    operation_id: &str,
) -> Option<&'a mut serde_json::Map<String, Value>> {
    document
        .get_mut("paths")?
        .as_object_mut()?
        .values_mut()
        .filter_map(Value::as_object_mut)
        .flat_map(|item| item.values_mut())
        .filter_map(Value::as_object_mut)
        .find(|operation| operation.get("operationId").and_then(Value::as_str) == Some(operation_id))
}

// ── Document ────────────────────────────────────────────────────────────────

/// The rendered OpenAPI document and the UI page that presents it.
#[derive(Debug, Clone)]
pub struct ApiDocument {
    document: Value,
    json: String,
    ui_page: String,
}

impl ApiDocument {
    /// Build the document for the configured tenant and client.
    pub fn generate(
        settings: &Settings,
        endpoints: &IdentityProviderEndpoints,
        side_file: Option<&Path>,
    ) -> Result<Self, serde_json::Error> {
        let mut openapi = ApiDoc::openapi();

        let mut implicit = Implicit::new(
            endpoints.authorize_url.as_str(),
            Scopes::from_iter([(endpoints.api_scope.as_str(), SCOPE_DESCRIPTION)]),
        );
        // Keys go in verbatim; `ExtensionsBuilder::add` would prefix `x-`.
        implicit.extensions = Some(Extensions::from_iter([(
            "tokenUrl",
            endpoints.token_url.as_str(),
        )]));
        openapi
            .components
            .get_or_insert_with(Components::new)
            .add_security_scheme(
                SECURITY_SCHEME,
                SecurityScheme::OAuth2(OAuth2::new([Flow::Implicit(implicit)])),
            );
        openapi.security = Some(vec![SecurityRequirement::new(
            SECURITY_SCHEME,
            Vec::<String>::new(),
        )]);

        let mut document = serde_json::to_value(&openapi)?;
        if let Some(docs) = side_file.and_then(DocsSideFile::read) {
            docs.apply(&mut document);
        }
        let json = serde_json::to_string(&document)?;

        Ok(Self {
            ui_page: ui_page(&settings.swagger.client_id)?,
            document,
            json,
        })
    }

    /// `{exe_dir}/{exe_stem}.docs.json`, when the executable path is known.
    pub fn default_side_file() -> Option<PathBuf> {
        let exe = std::env::current_exe().ok()?;
        let stem = exe.file_stem()?.to_string_lossy().into_owned();
        Some(exe.parent()?.join(format!("{stem}.docs.json")))
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn json(&self) -> &str {
        &self.json
    }

    pub fn ui_page(&self) -> &str {
        &self.ui_page
    }
}

fn ui_page(client_id: &str) -> Result<String, serde_json::Error> {
    let client_id = serde_json::to_string(client_id)?;
    let label = serde_json::to_string(&format!("{DOCUMENT_TITLE} {DOCUMENT_VERSION}"))?;
    Ok(format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>{DOCUMENT_TITLE}</title>
  <link rel="stylesheet" href="{SWAGGER_UI_DIST}/swagger-ui.css">
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="{SWAGGER_UI_DIST}/swagger-ui-bundle.js"></script>
  <script>
    const ui = SwaggerUIBundle({{
      urls: [{{ url: "{DOCUMENT_PATH}", name: {label} }}],
      dom_id: "#swagger-ui",
      oauth2RedirectUrl: window.location.origin + "/swagger/oauth2-redirect.html",
    }});
    ui.initOAuth({{ clientId: {client_id} }});
  </script>
</body>
</html>
"##
    ))
}

fn oauth2_redirect_page() -> String {
    format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head><title>{DOCUMENT_TITLE}: OAuth2 redirect</title></head>
<body>
  <script src="{SWAGGER_UI_DIST}/oauth2-redirect.js"></script>
</body>
</html>
"##
    )
}

// ── Routes ──────────────────────────────────────────────────────────────────

/// Documentation routes. Reachable without credentials.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(DOCUMENT_PATH, get(document_json))
        .route("/swagger", get(swagger_ui))
        .route("/swagger/index.html", get(swagger_ui))
        .route("/swagger/oauth2-redirect.html", get(oauth2_redirect))
}

async fn document_json(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/json")],
        state.api_document.json().to_owned(),
    )
}

async fn swagger_ui(State(state): State<AppState>) -> Html<String> {
    Html(state.api_document.ui_page().to_owned())
}

async fn oauth2_redirect() -> Html<String> {
    Html(oauth2_redirect_page())
}
