//! # Host Environment
//!
//! The named environment the host runs in. It selects the
//! `appsettings.{Environment}.json` overlay and decides whether developer
//! diagnostics are shown.

use std::fmt;

/// Named hosting environment, parsed case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HostEnvironment {
    Development,
    Staging,
    #[default]
    Production,
    /// Any other name, kept verbatim.
    Custom(String),
}

impl HostEnvironment {
    /// Parse an environment name. Blank input yields `Production`.
    pub fn from_name(name: &str) -> Self {
        let trimmed = name.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "" | "production" => Self::Production,
            "development" => Self::Development,
            "staging" => Self::Staging,
            _ => Self::Custom(trimmed.to_string()),
        }
    }

    /// Canonical name, as used in the settings overlay file name.
    pub fn name(&self) -> &str {
        match self {
            Self::Development => "Development",
            Self::Staging => "Staging",
            Self::Production => "Production",
            Self::Custom(name) => name,
        }
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

impl fmt::Display for HostEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for HostEnvironment {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_name(s))
    }
}
