//! # Error Types
//!
//! All failures the ECS core can report. Every operation returns these as
//! values; nothing in the core panics on an expected condition.

use std::path::PathBuf;

use thiserror::Error;

use crate::ecs::{EntityId, SystemHandle};

/// Convenience alias used throughout the crate.
pub type EcsResult<T> = Result<T, EcsError>;

/// Errors that can occur while operating on a [`World`](crate::World).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// The handle refers to an entity that is dead or whose index has been
    /// recycled under a newer generation.
    #[error("stale entity handle {entity}")]
    StaleHandle {
        /// The rejected handle.
        entity: EntityId,
    },

    /// `get` requested a component type the entity does not currently have.
    #[error("entity {entity} has no `{component}` component")]
    ComponentMissing {
        /// The entity that was queried.
        entity: EntityId,
        /// Type name of the requested component.
        component: &'static str,
    },

    /// A filter references a component type never registered with the world.
    #[error("filter requires unregistered component `{component}`")]
    InvalidFilter {
        /// Type name of the unknown component.
        component: &'static str,
    },

    /// A structural change targeted a store that the running system's
    /// filter is iterating.
    #[error("structural change to `{component}` while a system iterates it")]
    ConcurrentStructuralMutation {
        /// Type name of the component whose store was being mutated.
        component: &'static str,
    },

    /// The per-entity presence mask has no bit left for a new type.
    #[error("component type limit reached ({limit} types)")]
    ComponentLimitReached {
        /// Maximum number of component types a world can hold.
        limit: usize,
    },

    /// The system handle was not issued by this world.
    #[error("unknown system handle {handle}")]
    UnknownSystem {
        /// The rejected handle.
        handle: SystemHandle,
    },
}

/// Errors raised while loading a [`WorldConfig`](crate::WorldConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// Path that was being read.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The config text is not valid TOML for [`WorldConfig`](crate::WorldConfig).
    #[error("invalid config syntax: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config parsed but describes an unusable world.
    #[error("invalid config: {reason}")]
    Invalid {
        /// Why the value was rejected.
        reason: String,
    },
}
