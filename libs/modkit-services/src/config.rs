//! Configuration for a service directory.
//!
//! The directory runs fine without any configuration. When the host keeps its
//! settings in a [`Figment`], the `service_directory` section is read leniently:
//! - section missing → `DirectoryConfig::default()`
//! - section present but malformed → `ConfigError::Invalid`

use figment::Figment;
use serde::Deserialize;

/// Section name looked up by [`DirectoryConfig::from_figment`].
pub const CONFIG_SECTION: &str = "service_directory";

/// Directory settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DirectoryConfig {
    /// Label attached to every log record of this directory.
    /// Default: `"default"`
    pub name: String,

    /// Per-subscriber event backlog. `None` keeps subscriber queues unbounded;
    /// with `Some(n)` a subscriber more than `n` events behind is disconnected.
    pub subscriber_buffer: Option<usize>,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            name: "default".to_owned(),
            subscriber_buffer: None,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid 'service_directory' config: {source}")]
    Invalid {
        #[source]
        source: Box<figment::Error>,
    },
    #[error("'subscriber_buffer' must be greater than zero")]
    ZeroSubscriberBuffer,
}

impl DirectoryConfig {
    /// Read the `service_directory` section of `figment`, falling back to
    /// defaults when the section is absent.
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` if the section cannot be deserialized and
    /// `ConfigError::ZeroSubscriberBuffer` if it fails validation.
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        if !figment.contains(CONFIG_SECTION) {
            return Ok(Self::default());
        }

        let config: Self =
            figment
                .extract_inner(CONFIG_SECTION)
                .map_err(|e| ConfigError::Invalid {
                    source: Box::new(e),
                })?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    /// Returns `ConfigError::ZeroSubscriberBuffer` for `subscriber_buffer = 0`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.subscriber_buffer == Some(0) {
            return Err(ConfigError::ZeroSubscriberBuffer);
        }
        Ok(())
    }
}
