//! Engine settings (the "ini params" JSON document).

use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Scheme for process-wide named in-memory repositories.
const MEMORY_SCHEME: &str = "memory://";
/// Scheme for JSON repository snapshots on disk.
const FILE_SCHEME: &str = "file://";

/// Engine settings passed to `init`.
///
/// ```json
/// {"PIPELINE":{"CONFIGPATH":"...","RESOURCEPATH":"...","SUPPORTPATH":"..."},
///  "SQL":{"CONNECTION":"memory://default"}}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Paths used by the engine pipeline.
    #[serde(rename = "PIPELINE")]
    pub pipeline: PipelineSettings,
    /// Repository database settings.
    #[serde(rename = "SQL")]
    pub sql: SqlSettings,
}

/// Pipeline paths. All optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Directory holding engine configuration files.
    #[serde(rename = "CONFIGPATH", default)]
    pub config_path: String,
    /// Directory holding engine resources.
    #[serde(rename = "RESOURCEPATH", default)]
    pub resource_path: String,
    /// Directory holding engine support data.
    #[serde(rename = "SUPPORTPATH", default)]
    pub support_path: String,
}

/// Repository database settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlSettings {
    /// Database connection URL.
    #[serde(rename = "CONNECTION")]
    pub connection: String,
}

impl EngineSettings {
    /// Creates settings for a database URL with empty pipeline paths.
    pub fn new(connection: impl Into<String>) -> Self {
        Self {
            pipeline: PipelineSettings::default(),
            sql: SqlSettings {
                connection: connection.into(),
            },
        }
    }

    /// Parses and validates a settings document.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSettings` if the document is not JSON, lacks the
    /// `PIPELINE` or `SQL` sections, or names an unsupported database.
    pub fn parse(json: &str) -> EngineResult<Self> {
        let settings: Self = serde_json::from_str(json)
            .map_err(|e| EngineError::invalid_settings(e.to_string()))?;
        settings.database()?;
        Ok(settings)
    }

    /// Returns the parsed database URL.
    pub fn database(&self) -> EngineResult<DatabaseUrl> {
        DatabaseUrl::parse(&self.sql.connection)
    }

    /// Serializes the settings.
    pub fn to_json(&self) -> String {
        // Plain string fields only: serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// A repository location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseUrl {
    /// A process-wide named in-memory repository.
    Memory(String),
    /// A JSON repository snapshot on disk.
    File(PathBuf),
}

impl DatabaseUrl {
    /// Parses a connection URL.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSettings` for an empty name/path or unknown scheme.
    pub fn parse(url: &str) -> EngineResult<Self> {
        let url = url.trim();
        if let Some(name) = url.strip_prefix(MEMORY_SCHEME) {
            if name.is_empty() {
                return Err(EngineError::invalid_settings(
                    "memory database URL requires a name",
                ));
            }
            Ok(Self::Memory(name.to_string()))
        } else if let Some(path) = url.strip_prefix(FILE_SCHEME) {
            if path.is_empty() {
                return Err(EngineError::invalid_settings(
                    "file database URL requires a path",
                ));
            }
            Ok(Self::File(PathBuf::from(path)))
        } else {
            Err(EngineError::invalid_settings(format!(
                "unsupported database connection '{url}'"
            )))
        }
    }

    /// Returns the database type label.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::File(_) => "file",
        }
    }
}

impl fmt::Display for DatabaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory(name) => write!(f, "{MEMORY_SCHEME}{name}"),
            Self::File(path) => write!(f, "{FILE_SCHEME}{}", path.display()),
        }
    }
}
