//! Connection settings loaded from YAML.
//!
//! ```yaml
//! servers:
//!   - zk1:2181
//!   - zk2:2181
//! session_timeout: 6s
//! chroot: /services/app
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer};
use std::path::Path;
use std::time::Duration;

const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(6);

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectOptions {
    /// Ensemble members as `host:port`
    pub servers: Vec<String>,

    /// Human-readable duration, e.g. `6s` or `2m`
    #[serde(default = "default_session_timeout", deserialize_with = "deserialize_duration")]
    pub session_timeout: Duration,

    /// Physical path the connection is confined to
    #[serde(default)]
    pub chroot: Option<String>,
}

fn default_session_timeout() -> Duration {
    DEFAULT_SESSION_TIMEOUT
}

fn deserialize_duration<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    parse_duration::parse(&text)
        .map_err(|e| serde::de::Error::custom(format!("invalid duration '{text}': {e}")))
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            servers: vec!["127.0.0.1:2181".to_string()],
            session_timeout: DEFAULT_SESSION_TIMEOUT,
            chroot: None,
        }
    }
}

impl ConnectOptions {
    pub fn new<S: Into<String>>(servers: impl IntoIterator<Item = S>) -> Self {
        Self {
            servers: servers.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_chroot<S: Into<String>>(mut self, chroot: S) -> Self {
        self.chroot = Some(chroot.into());
        self
    }

    #[must_use]
    pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let options: ConnectOptions = serde_yaml_ng::from_str(text)?;
        options.validate()?;
        Ok(options)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(&path).map_err(|e| {
            Error::config(format!(
                "Failed to read config file {}: {e}",
                path.as_ref().display()
            ))
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.servers.is_empty() {
            return Err(Error::config("At least one server must be configured"));
        }
        if self.servers.iter().any(|s| s.trim().is_empty()) {
            return Err(Error::config("Server address cannot be empty"));
        }
        if self.session_timeout.is_zero() {
            return Err(Error::config("session_timeout must be greater than 0"));
        }
        if let Some(chroot) = &self.chroot {
            if !chroot.is_empty() && !chroot.starts_with('/') {
                return Err(Error::config(format!("chroot must be an absolute path: {chroot}")));
            }
        }
        Ok(())
    }
}
