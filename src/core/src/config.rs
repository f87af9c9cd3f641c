use crate::error::{PropsError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// System property holding the device codename.
pub const DEFAULT_DEVICE_PROPERTY: &str = "org.pixelexperience.device";

/// Number of entries in a complete certified property list.
pub const CERTIFIED_PROPS_LEN: usize = 11;

/// Engine configuration, read once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropsConfig {
    /// Certified reference identity, in the fixed platform order:
    /// product, device, manufacturer, brand, model, fingerprint,
    /// security patch, initial SDK, build ID, type, tags.
    #[serde(default)]
    pub certified_props: Vec<String>,

    /// System property that reports the device codename
    #[serde(default = "default_device_property")]
    pub device_property: String,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

fn default_device_property() -> String {
    DEFAULT_DEVICE_PROPERTY.to_string()
}

impl Default for PropsConfig {
    fn default() -> Self {
        Self {
            certified_props: Vec::new(),
            device_property: default_device_property(),
            log_level: LogLevel::default(),
        }
    }
}

impl PropsConfig {
    /// Load configuration from a YAML or JSON file, chosen by extension.
    ///
    /// A missing file yields the default (empty) configuration.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&contents)?,
            Some("yaml") | Some("yml") => serde_yaml::from_str(&contents)?,
            other => {
                return Err(PropsError::ConfigError(format!(
                    "unsupported config format: {}",
                    other.unwrap_or("<none>")
                )))
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject certified lists that are neither empty nor complete.
    pub fn validate(&self) -> Result<()> {
        let len = self.certified_props.len();
        if len != 0 && len != CERTIFIED_PROPS_LEN {
            return Err(PropsError::ConfigError(format!(
                "certified_props must have 0 or {} entries, got {}",
                CERTIFIED_PROPS_LEN, len
            )));
        }
        Ok(())
    }

    /// Typed view over the certified property list.
    pub fn certified(&self) -> CertifiedProps {
        CertifiedProps::from_list(&self.certified_props)
    }
}

/// Certified reference identity as configured. Empty strings mean "not set".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertifiedProps {
    pub product: String,
    pub device: String,
    pub manufacturer: String,
    pub brand: String,
    pub model: String,
    pub fingerprint: String,
    pub security_patch: String,
    pub initial_sdk: String,
    pub build_id: String,
    pub build_type: String,
    pub tags: String,
}

impl CertifiedProps {
    /// Build from the ordered list. Missing trailing entries read as empty.
    pub fn from_list(list: &[String]) -> Self {
        let at = |i: usize| list.get(i).cloned().unwrap_or_default();
        Self {
            product: at(0),
            device: at(1),
            manufacturer: at(2),
            brand: at(3),
            model: at(4),
            fingerprint: at(5),
            security_patch: at(6),
            initial_sdk: at(7),
            build_id: at(8),
            build_type: at(9),
            tags: at(10),
        }
    }

    /// True when nothing was configured at all.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Log level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    #[default]
    Warn,
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}
