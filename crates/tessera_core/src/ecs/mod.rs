//! # Entity Component System
//!
//! Sparse-set ECS with generational entity handles and deferred structural
//! commits.
//!
//! ## Design Philosophy
//!
//! - Components live in one packed store per type; iteration is contiguous
//! - Entity IDs are indices with generation counters
//! - Structural changes become visible to filters only at `refresh`
//! - Filter indexes are updated lazily from a shared change log

mod component;
mod entity;
mod filter;
mod storage;
mod system;
mod world;

pub use component::{Component, ComponentId, ComponentInfo, ComponentMask, MAX_COMPONENTS};
pub use entity::{EntityId, EntityRegistry, RefreshStats};
pub use filter::{Entities, Filter};
pub use storage::ComponentStore;
pub use system::{FnSystem, System, SystemHandle, SystemView};
pub use world::World;
