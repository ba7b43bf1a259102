//! # World Configuration
//!
//! Tunables for a [`World`](crate::World), loaded once at startup from TOML.
//!
//! ```toml
//! entity_capacity = 131072
//! component_capacity = 4096
//! auto_activate = true
//! mutation_policy = "reject"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// What happens when a running system adds or removes a component type its
/// own filter requires.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationPolicy {
    /// Fail with [`EcsError::ConcurrentStructuralMutation`](crate::EcsError).
    #[default]
    Reject,
    /// Apply the change. The running system keeps iterating its snapshot;
    /// lookups of removed components report `ComponentMissing`.
    Permit,
}

/// Configuration for a [`World`](crate::World).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Entity slots reserved up front.
    pub entity_capacity: usize,
    /// Dense slots reserved in each component store when its type is registered.
    pub component_capacity: usize,
    /// Queue newly created entities for activation at the next refresh.
    pub auto_activate: bool,
    /// Strictness for structural changes made from inside a system.
    pub mutation_policy: MutationPolicy,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            entity_capacity: 1024,
            component_capacity: 0,
            auto_activate: true,
            mutation_policy: MutationPolicy::Reject,
        }
    }
}

impl WorldConfig {
    /// Parses a config from TOML text. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML and
    /// [`ConfigError::Invalid`] if the values fail validation.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise the
    /// same errors as [`WorldConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks that the config describes a usable world.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `entity_capacity` does not fit
    /// the 32-bit entity index space.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if u32::try_from(self.entity_capacity).is_err() {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "entity_capacity {} exceeds the 32-bit index space",
                    self.entity_capacity
                ),
            });
        }
        Ok(())
    }
}
