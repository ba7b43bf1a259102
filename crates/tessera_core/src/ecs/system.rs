//! # Systems
//!
//! A system is per-tick logic bound to a [`Filter`](super::Filter) at
//! registration. During [`World::update`](crate::World::update) each system
//! receives a [`SystemView`]: the entities its filter matched at the last
//! refresh, plus access to every component store.

use std::any::type_name;
use std::fmt;

use super::component::{Component, ComponentMask};
use super::entity::{EntityId, EntityRegistry};
use super::filter::{Entities, FilterIndex};
use super::storage::{ComponentStore, StoreSet};
use super::world::{add_component, get_component, get_component_mut, has_component, remove_component};
use crate::config::MutationPolicy;
use crate::error::{EcsError, EcsResult};

/// Handle assigned to each registered system.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SystemHandle(u32);

impl SystemHandle {
    pub(crate) fn new(index: u32) -> Self {
        Self(index)
    }

    /// Return the raw index backing this handle.
    #[inline]
    #[must_use]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SystemHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-tick logic driven by [`World::update`](crate::World::update).
///
/// # Example
///
/// ```rust,ignore
/// struct Integrate;
///
/// impl System for Integrate {
///     fn run(&mut self, view: &mut SystemView<'_>) -> EcsResult<()> {
///         for entity in view.entities() {
///             let velocity = *view.get::<Velocity>(entity)?;
///             view.get_mut::<Position>(entity)?.x += velocity.x;
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait System: Send {
    /// Runs once per update over the entities in `view`.
    ///
    /// # Errors
    ///
    /// Any error returned aborts the current update and is handed back to
    /// the caller of `update`.
    fn run(&mut self, view: &mut SystemView<'_>) -> EcsResult<()>;

    /// Name used in logs.
    fn name(&self) -> &str {
        type_name::<Self>()
    }
}

/// Adapter turning a closure into a [`System`].
pub struct FnSystem<F> {
    name: &'static str,
    run: F,
}

impl<F> FnSystem<F>
where
    F: FnMut(&mut SystemView<'_>) -> EcsResult<()> + Send,
{
    /// Wraps `run`, naming the system after the closure type.
    pub fn new(run: F) -> Self {
        Self {
            name: type_name::<F>(),
            run,
        }
    }
}

impl<F> System for FnSystem<F>
where
    F: FnMut(&mut SystemView<'_>) -> EcsResult<()> + Send,
{
    fn run(&mut self, view: &mut SystemView<'_>) -> EcsResult<()> {
        (self.run)(view)
    }

    fn name(&self) -> &str {
        self.name
    }
}

/// A registered system together with its filter index.
pub(crate) struct SystemEntry {
    pub(crate) system: Box<dyn System>,
    pub(crate) index: FilterIndex,
}

/// What a system sees while it runs.
///
/// The entity list is a snapshot of the filter index; structural changes
/// made through the view never reorder it. Adding or removing a component
/// type that this system's filter requires is governed by the world's
/// [`MutationPolicy`].
pub struct SystemView<'a> {
    entities: &'a [EntityId],
    filter: ComponentMask,
    registry: &'a mut EntityRegistry,
    stores: &'a mut StoreSet,
    policy: MutationPolicy,
}

impl<'a> SystemView<'a> {
    pub(crate) fn new(
        entities: &'a [EntityId],
        filter: ComponentMask,
        registry: &'a mut EntityRegistry,
        stores: &'a mut StoreSet,
        policy: MutationPolicy,
    ) -> Self {
        Self {
            entities,
            filter,
            registry,
            stores,
            policy,
        }
    }

    /// Entities matching this system's filter as of the last refresh.
    ///
    /// The iterator does not borrow the view, so components can be read and
    /// written while iterating.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> Entities<'a> {
        Entities::new(self.entities)
    }

    /// Number of matching entities.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// True if no entity matched.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// See [`World::get`](crate::World::get).
    ///
    /// # Errors
    ///
    /// [`EcsError::StaleHandle`] or [`EcsError::ComponentMissing`].
    #[inline]
    pub fn get<C: Component>(&self, entity: EntityId) -> EcsResult<&C> {
        get_component(self.registry, self.stores, entity)
    }

    /// See [`World::get_mut`](crate::World::get_mut).
    ///
    /// # Errors
    ///
    /// [`EcsError::StaleHandle`] or [`EcsError::ComponentMissing`].
    #[inline]
    pub fn get_mut<C: Component>(&mut self, entity: EntityId) -> EcsResult<&mut C> {
        get_component_mut(self.registry, self.stores, entity)
    }

    /// See [`World::has`](crate::World::has).
    #[inline]
    #[must_use]
    pub fn has<C: Component>(&self, entity: EntityId) -> bool {
        has_component::<C>(self.registry, self.stores, entity)
    }

    /// True if `entity` is alive.
    #[inline]
    #[must_use]
    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.registry.is_alive(entity)
    }

    /// Dense store of `C`, if the type is registered.
    #[must_use]
    pub fn store<C: Component>(&self) -> Option<&ComponentStore<C>> {
        self.stores.store::<C>()
    }

    /// Dense store of `C` for in-place writes.
    pub fn store_mut<C: Component>(&mut self) -> Option<&mut ComponentStore<C>> {
        self.stores.store_mut::<C>()
    }

    /// Creates a pending entity; it joins filters after the next refresh.
    ///
    /// # Panics
    ///
    /// Same as [`World::create_entity`](crate::World::create_entity).
    pub fn create_entity(&mut self) -> EntityId {
        self.registry.create()
    }

    /// Marks `entity` for destruction at the next refresh.
    ///
    /// # Errors
    ///
    /// [`EcsError::StaleHandle`] if `entity` is not alive.
    pub fn destroy_entity(&mut self, entity: EntityId) -> EcsResult<()> {
        self.registry.destroy(entity)
    }

    /// See [`World::add`](crate::World::add).
    ///
    /// # Errors
    ///
    /// [`EcsError::ConcurrentStructuralMutation`] if `C` is required by the
    /// running system and the policy is [`MutationPolicy::Reject`], plus the
    /// errors of [`World::add`](crate::World::add).
    pub fn add<C: Component>(&mut self, entity: EntityId, value: C) -> EcsResult<Option<C>> {
        self.guard::<C>()?;
        add_component(self.registry, self.stores, entity, value)
    }

    /// See [`World::remove`](crate::World::remove).
    ///
    /// # Errors
    ///
    /// Same policy check as [`SystemView::add`], plus the errors of
    /// [`World::remove`](crate::World::remove).
    pub fn remove<C: Component>(&mut self, entity: EntityId) -> EcsResult<Option<C>> {
        self.guard::<C>()?;
        remove_component(self.registry, self.stores, entity)
    }

    fn guard<C: Component>(&self) -> EcsResult<()> {
        if self.policy == MutationPolicy::Permit {
            return Ok(());
        }
        match self.stores.id_of::<C>() {
            Some(id) if self.filter.contains(id) => Err(EcsError::ConcurrentStructuralMutation {
                component: type_name::<C>(),
            }),
            _ => Ok(()),
        }
    }
}
