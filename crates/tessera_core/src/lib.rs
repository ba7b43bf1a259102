//! # Tessera Core
//!
//! Entity Component System (ECS) designed for:
//! - Safe, generation-checked entity handles
//! - Cache-friendly iteration over packed component stores
//! - Cheap structural changes, committed once per tick
//!
//! ## Architecture Rules
//!
//! 1. **Deferred commits** - filters see the world as of the last `refresh`
//! 2. **Data-oriented design** - components are stored in contiguous arrays
//! 3. **Errors, not panics** - stale handles and missing components are values
//!
//! ## Example
//!
//! ```rust
//! use tessera_core::{Component, EcsResult, Filter, World};
//!
//! #[derive(Clone, Copy, Debug, Default)]
//! struct Position(i32);
//! impl Component for Position {}
//!
//! #[derive(Clone, Copy, Debug, Default)]
//! struct Velocity(i32);
//! impl Component for Velocity {}
//!
//! fn main() -> EcsResult<()> {
//!     let mut world = World::new();
//!     world.register_component::<Position>()?;
//!     world.register_component::<Velocity>()?;
//!
//!     let movers = Filter::new().require::<Position>().require::<Velocity>();
//!     world.register_fn(&movers, |view| {
//!         for entity in view.entities() {
//!             let velocity = view.get::<Velocity>(entity)?.0;
//!             view.get_mut::<Position>(entity)?.0 += velocity;
//!         }
//!         Ok(())
//!     })?;
//!
//!     let entity = world.create_entity();
//!     world.add(entity, Position(0))?;
//!     world.add(entity, Velocity(3))?;
//!
//!     world.refresh();
//!     world.update()?;
//!     assert_eq!(world.get::<Position>(entity)?.0, 3);
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod ecs;
pub mod error;

pub use config::{MutationPolicy, WorldConfig};
pub use ecs::{
    Component, ComponentId, ComponentInfo, ComponentMask, ComponentStore, Entities, EntityId,
    EntityRegistry, FnSystem, Filter, RefreshStats, System, SystemHandle, SystemView, World,
    MAX_COMPONENTS,
};
pub use error::{ConfigError, EcsError, EcsResult};
