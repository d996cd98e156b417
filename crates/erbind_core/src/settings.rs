//! Engine settings builder.

use erbind_native::EngineSettings;
use std::env;

/// Environment variable consulted when no database URL is given.
pub const DATABASE_URL_ENV: &str = "ERBIND_DATABASE_URL";

/// Database used when neither an explicit URL nor the environment names one.
pub const DEFAULT_DATABASE_URL: &str = "memory://default";

/// Builds the engine settings JSON passed as `ini_params`.
///
/// # Example
///
/// ```rust
/// use erbind_core::SystemConfiguration;
///
/// let json = SystemConfiguration::new("memory://docs")
///     .config_path("/etc/erbind")
///     .to_json();
/// assert!(json.contains(r#""CONNECTION":"memory://docs""#));
/// assert!(json.contains(r#""CONFIGPATH":"/etc/erbind""#));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemConfiguration {
    settings: EngineSettings,
}

impl SystemConfiguration {
    /// Starts from a database URL with empty pipeline paths.
    #[must_use]
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            settings: EngineSettings::new(database_url),
        }
    }

    /// Builds settings for a database URL, falling back to
    /// `ERBIND_DATABASE_URL` and then `memory://default` when it is empty.
    #[must_use]
    pub fn simple(database_url: &str) -> String {
        Self::new(resolve_database_url(database_url)).to_json()
    }

    /// Sets the engine configuration directory.
    #[must_use]
    pub fn config_path(mut self, path: impl Into<String>) -> Self {
        self.settings.pipeline.config_path = path.into();
        self
    }

    /// Sets the engine resource directory.
    #[must_use]
    pub fn resource_path(mut self, path: impl Into<String>) -> Self {
        self.settings.pipeline.resource_path = path.into();
        self
    }

    /// Sets the engine support directory.
    #[must_use]
    pub fn support_path(mut self, path: impl Into<String>) -> Self {
        self.settings.pipeline.support_path = path.into();
        self
    }

    /// Returns the database URL.
    pub fn database_url(&self) -> &str {
        &self.settings.sql.connection
    }

    /// Serializes the settings.
    pub fn to_json(&self) -> String {
        self.settings.to_json()
    }
}

/// Returns `url` if non-empty, else the environment's URL, else the default.
pub fn resolve_database_url(url: &str) -> String {
    let url = url.trim();
    if !url.is_empty() {
        return url.to_string();
    }
    env::var(DATABASE_URL_ENV)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_url_wins() {
        let json = SystemConfiguration::simple("memory://explicit");
        let settings = EngineSettings::parse(&json).unwrap();
        assert_eq!(settings.sql.connection, "memory://explicit");
        assert_eq!(settings.pipeline.config_path, "");
    }

    #[test]
    fn empty_url_falls_back() {
        // The environment may or may not set the variable.
        let url = resolve_database_url("  ");
        assert!(!url.is_empty());
        let json = SystemConfiguration::simple("");
        assert!(json.contains(&format!(r#""CONNECTION":"{url}""#)));
    }

    #[test]
    fn builder_sets_paths() {
        let config = SystemConfiguration::new("file:///tmp/repo.json")
            .resource_path("/res")
            .support_path("/sup");
        assert_eq!(config.database_url(), "file:///tmp/repo.json");
        let settings = EngineSettings::parse(&config.to_json()).unwrap();
        assert_eq!(settings.pipeline.resource_path, "/res");
        assert_eq!(settings.pipeline.support_path, "/sup");
    }
}
