//! # Settings
//!
//! Layered configuration for the API host. Sources are merged in order,
//! later sources overriding earlier ones key by key:
//!
//! ```text
//! appsettings.json → appsettings.{Environment}.json → process environment
//! ```
//!
//! Keys are hierarchical (`AzureAd:TenantId`) and matched
//! case-insensitively. Environment variables spell the section separator
//! as `__`, so `AZUREAD__TENANTID` sets `AzureAd:TenantId`.
//!
//! Loading is fail-fast: [`Settings::load`] returns a single
//! [`ConfigError::Invalid`] listing every missing or malformed key, and the
//! binary refuses to start.

use std::path::Path;
use std::time::Duration;

use serde_json::{Map, Value};
use url::Url;

use crate::environment::HostEnvironment;
use crate::error::ConfigError;

/// Base settings file, always considered first.
pub const SETTINGS_FILE: &str = "appsettings.json";

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 12 * 60 * 60;
pub const DEFAULT_MIN_REFRESH_INTERVAL_SECS: u64 = 5 * 60;
pub const DEFAULT_STALE_GRACE_SECS: u64 = 60 * 60;

// ── Options ─────────────────────────────────────────────────────────────────

/// The `AzureAd` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AzureAdOptions {
    /// Authority base URL, always ending in `/`.
    pub instance: String,
    pub tenant_id: String,
    /// This API's application id. Accepted as a token audience and used to
    /// build the resource scope.
    pub client_id: String,
    /// Additional accepted token audience.
    pub audience: Option<String>,
}

/// The `Swagger` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwaggerOptions {
    /// OAuth client id of the documentation UI's login control.
    pub client_id: String,
}

/// The `Server` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerOptions {
    pub port: u16,
    /// Public HTTPS port for redirects. `None` disables redirection.
    pub https_port: Option<u16>,
}

/// The `Metadata` section: identity-provider metadata cache policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataOptions {
    pub refresh_interval: Duration,
    pub min_refresh_interval: Duration,
    pub stale_grace: Duration,
}

impl Default for MetadataOptions {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS),
            min_refresh_interval: Duration::from_secs(DEFAULT_MIN_REFRESH_INTERVAL_SECS),
            stale_grace: Duration::from_secs(DEFAULT_STALE_GRACE_SECS),
        }
    }
}

/// Fully resolved host settings. Immutable after start-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub azure_ad: AzureAdOptions,
    pub swagger: SwaggerOptions,
    pub server: ServerOptions,
    pub metadata: MetadataOptions,
}

impl Settings {
    /// Load and validate settings from `content_root` and the process
    /// environment.
    pub fn load(content_root: &Path, environment: &HostEnvironment) -> Result<Self, ConfigError> {
        Self::load_with_vars(content_root, environment, std::env::vars())
    }

    /// Like [`Settings::load`], with an explicit set of environment
    /// variables.
    pub fn load_with_vars<I>(
        content_root: &Path,
        environment: &HostEnvironment,
        vars: I,
    ) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut tree = SettingsTree::new();
        tree.merge_file(&content_root.join(SETTINGS_FILE))?;
        tree.merge_file(&content_root.join(format!("appsettings.{}.json", environment.name())))?;
        tree.merge_env(vars);
        Self::from_value(&tree.into_value())
    }

    /// Build settings from an already merged JSON tree, then validate.
    pub fn from_value(root: &Value) -> Result<Self, ConfigError> {
        let mut reader = Reader {
            root,
            problems: Vec::new(),
        };

        let mut instance = reader.string("AzureAd:Instance").unwrap_or_default();
        if !instance.is_empty() && !instance.ends_with('/') {
            instance.push('/');
        }

        let azure_ad = AzureAdOptions {
            instance,
            tenant_id: reader.string("AzureAd:TenantId").unwrap_or_default(),
            client_id: reader.string("AzureAd:ClientId").unwrap_or_default(),
            audience: reader
                .string("AzureAd:Audience")
                .filter(|a| !a.trim().is_empty()),
        };
        let swagger = SwaggerOptions {
            client_id: reader.string("Swagger:ClientId").unwrap_or_default(),
        };
        let server = ServerOptions {
            port: reader.port("Server:Port").unwrap_or(DEFAULT_PORT),
            https_port: reader.port("Server:HttpsPort"),
        };
        let metadata = MetadataOptions {
            refresh_interval: reader
                .seconds("Metadata:RefreshIntervalSecs")
                .unwrap_or(Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS)),
            min_refresh_interval: reader
                .seconds("Metadata:MinRefreshIntervalSecs")
                .unwrap_or(Duration::from_secs(DEFAULT_MIN_REFRESH_INTERVAL_SECS)),
            stale_grace: reader
                .seconds("Metadata:StaleGraceSecs")
                .unwrap_or(Duration::from_secs(DEFAULT_STALE_GRACE_SECS)),
        };

        let settings = Self {
            azure_ad,
            swagger,
            server,
            metadata,
        };

        let mut problems = reader.problems;
        problems.extend(settings.problems());
        if problems.is_empty() {
            Ok(settings)
        } else {
            Err(ConfigError::Invalid { problems })
        }
    }

    /// Check required keys and value shapes, reporting all problems at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let problems = self.problems();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid { problems })
        }
    }

    fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let required = [
            ("AzureAd:Instance", &self.azure_ad.instance),
            ("AzureAd:TenantId", &self.azure_ad.tenant_id),
            ("AzureAd:ClientId", &self.azure_ad.client_id),
            ("Swagger:ClientId", &self.swagger.client_id),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                problems.push(format!("{key} is required"));
            }
        }

        if !self.azure_ad.instance.trim().is_empty() {
            match Url::parse(&self.azure_ad.instance) {
                Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {}
                Ok(url) => problems.push(format!(
                    "AzureAd:Instance must be an absolute http(s) URL, got scheme '{}'",
                    url.scheme()
                )),
                Err(e) => problems.push(format!("AzureAd:Instance is not a valid URL: {e}")),
            }
        }

        if self.metadata.refresh_interval.is_zero() {
            problems.push("Metadata:RefreshIntervalSecs must be greater than zero".to_string());
        }
        problems
    }
}

// ── Merged tree ─────────────────────────────────────────────────────────────

/// Case-insensitive, layered JSON configuration tree.
///
/// The first spelling of a key wins; later layers with a different casing
/// update the same entry.
#[derive(Debug, Clone, Default)]
pub struct SettingsTree {
    root: Map<String, Value>,
}

impl SettingsTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a JSON file. A missing file is skipped and reported as `false`.
    pub fn merge_file(&mut self, path: &Path) -> Result<bool, ConfigError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "settings file not present, skipping");
                return Ok(false);
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let value: Value = serde_json::from_str(&raw).map_err(|source| ConfigError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;
        match value {
            Value::Object(map) => {
                merge_objects(&mut self.root, map);
                tracing::debug!(path = %path.display(), "settings file loaded");
                Ok(true)
            }
            _ => Err(ConfigError::NotAnObject {
                path: path.to_path_buf(),
            }),
        }
    }

    /// Merge an in-memory JSON object. Non-object values are ignored.
    pub fn merge_value(&mut self, value: Value) {
        if let Value::Object(map) = value {
            merge_objects(&mut self.root, map);
        }
    }

    /// Merge environment variables, mapping `__` to the section separator.
    /// Only `Section__Key` names are considered; single-segment names and
    /// names with empty segments are ignored.
    pub fn merge_env<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in vars {
            let segments: Vec<&str> = name.split("__").collect();
            if segments.len() < 2 || segments.iter().any(|s| s.is_empty()) {
                continue;
            }
            let mut node = Value::String(value);
            for segment in segments.iter().rev() {
                let mut map = Map::new();
                map.insert((*segment).to_string(), node);
                node = Value::Object(map);
            }
            self.merge_value(node);
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.root)
    }
}

fn find_key<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    map.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v)
}

fn merge_objects(target: &mut Map<String, Value>, source: Map<String, Value>) {
    for (key, incoming) in source {
        let existing_key = target
            .keys()
            .find(|k| k.eq_ignore_ascii_case(&key))
            .cloned()
            .unwrap_or(key);
        match (target.get_mut(&existing_key), incoming) {
            (Some(Value::Object(current)), Value::Object(incoming)) => {
                merge_objects(current, incoming);
            }
            // A scalar never replaces a section.
            (Some(Value::Object(_)), _) => {}
            (_, incoming) => {
                target.insert(existing_key, incoming);
            }
        }
    }
}

// ── Typed reads ─────────────────────────────────────────────────────────────

struct Reader<'a> {
    root: &'a Value,
    problems: Vec<String>,
}

impl Reader<'_> {
    fn lookup(&self, key: &str) -> Option<&Value> {
        let mut current = self.root;
        for segment in key.split(':') {
            current = match current {
                Value::Object(map) => find_key(map, segment)?,
                _ => return None,
            };
        }
        match current {
            Value::Null => None,
            other => Some(other),
        }
    }

    fn string(&mut self, key: &str) -> Option<String> {
        match self.lookup(key)? {
            Value::String(s) => Some(s.clone()),
            other => {
                self.problems
                    .push(format!("{key} must be a string, got {}", kind(other)));
                None
            }
        }
    }

    fn unsigned(&mut self, key: &str) -> Option<u64> {
        let parsed = match self.lookup(key)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        };
        if parsed.is_none() {
            self.problems
                .push(format!("{key} must be a non-negative integer"));
        }
        parsed
    }

    fn port(&mut self, key: &str) -> Option<u16> {
        let value = self.unsigned(key)?;
        match u16::try_from(value) {
            Ok(port) if port > 0 => Some(port),
            _ => {
                self.problems
                    .push(format!("{key} must be a port number between 1 and 65535"));
                None
            }
        }
    }

    fn seconds(&mut self, key: &str) -> Option<Duration> {
        self.unsigned(key).map(Duration::from_secs)
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
