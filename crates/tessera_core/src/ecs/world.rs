//! # ECS World
//!
//! The central container for entities, component stores and systems.
//!
//! ```text
//!  create/destroy ──> EntityRegistry ──┐
//!  add/remove ──────> StoreSet ────────┤ refresh() ──> ChangeLog
//!                                      │                  │ (lazy)
//!  register_system ─> FilterIndex <────┴──────────────────┘
//!  update() ────────> System::run(SystemView)
//! ```
//!
//! `refresh` is the only synchronization point: filters and `update` see
//! the world as it was at the last refresh.

use std::any::type_name;

use super::component::{Component, ComponentId, ComponentInfo, ComponentMask};
use super::entity::{EntityId, EntityRegistry, RefreshStats};
use super::filter::{ChangeLog, Entities, Filter, FilterIndex};
use super::storage::{ComponentStore, StoreSet};
use super::system::{FnSystem, System, SystemEntry, SystemHandle, SystemView};
use crate::config::WorldConfig;
use crate::error::{EcsError, EcsResult};

/// The ECS World - identity, storage and query in one owned value.
///
/// # Example
///
/// ```rust,ignore
/// let mut world = World::new();
/// let e = world.create_entity();
/// world.add(e, Position::default())?;
/// world.refresh();
/// world.update()?;
/// ```
pub struct World {
    config: WorldConfig,
    registry: EntityRegistry,
    stores: StoreSet,
    systems: Vec<SystemEntry>,
    log: ChangeLog,
    /// Reused between refreshes.
    destroyed: Vec<(EntityId, ComponentMask)>,
}

impl World {
    /// Creates a world with the default [`WorldConfig`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(WorldConfig::default())
    }

    /// Creates a world from `config`.
    ///
    /// The config is trusted; use [`WorldConfig::validate`] on values that
    /// did not come through [`WorldConfig::from_toml_str`].
    #[must_use]
    pub fn with_config(config: WorldConfig) -> Self {
        tracing::debug!(?config, "creating world");
        Self {
            registry: EntityRegistry::with_capacity(config.entity_capacity, config.auto_activate),
            stores: StoreSet::new(config.component_capacity),
            systems: Vec::new(),
            log: ChangeLog::default(),
            destroyed: Vec::new(),
            config,
        }
    }

    /// The configuration this world was built with.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Read access to the entity registry.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    // =========================================================================
    // Entities
    // =========================================================================

    /// Creates a pending entity. It becomes visible to filters at the next
    /// refresh (or after `activate` + refresh when auto-activation is off).
    ///
    /// # Panics
    ///
    /// Panics if all 2^32 entity indices are alive or retired. An index is
    /// retired once its generation counter is exhausted.
    pub fn create_entity(&mut self) -> EntityId {
        self.registry.create()
    }

    /// Marks `entity` for destruction. Its components are dropped, its
    /// generation bumped and its index recycled at the next refresh.
    ///
    /// # Errors
    ///
    /// [`EcsError::StaleHandle`] if `entity` is not alive.
    pub fn destroy_entity(&mut self, entity: EntityId) -> EcsResult<()> {
        self.registry.destroy(entity)
    }

    /// Queues `entity` to become visible to filters at the next refresh.
    ///
    /// # Errors
    ///
    /// [`EcsError::StaleHandle`] if `entity` is not alive.
    pub fn activate(&mut self, entity: EntityId) -> EcsResult<()> {
        self.registry.activate(entity)
    }

    /// Queues `entity` to leave every filter at the next refresh. It stays
    /// alive and keeps its components.
    ///
    /// # Errors
    ///
    /// [`EcsError::StaleHandle`] if `entity` is not alive.
    pub fn deactivate(&mut self, entity: EntityId) -> EcsResult<()> {
        self.registry.deactivate(entity)
    }

    /// O(1) liveness check. Never fails.
    #[inline]
    #[must_use]
    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.registry.is_alive(entity)
    }

    /// True if `entity` was visible to filters at the last refresh.
    #[inline]
    #[must_use]
    pub fn is_active(&self, entity: EntityId) -> bool {
        self.registry.is_active(entity)
    }

    /// Number of live entities.
    #[inline]
    #[must_use]
    pub fn alive_count(&self) -> usize {
        self.registry.alive_count()
    }

    /// Number of entities visible to filters.
    #[inline]
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.registry.active_count()
    }

    // =========================================================================
    // Components
    // =========================================================================

    /// Registers component type `C`. Adding a component registers its type
    /// implicitly; filters may only name registered types.
    ///
    /// # Errors
    ///
    /// [`EcsError::ComponentLimitReached`] when the world already holds
    /// [`MAX_COMPONENTS`](super::MAX_COMPONENTS) types.
    pub fn register_component<C: Component>(&mut self) -> EcsResult<ComponentId> {
        self.stores.register::<C>()
    }

    /// Metadata of a registered component type.
    #[must_use]
    pub fn component_info(&self, id: ComponentId) -> Option<&ComponentInfo> {
        self.stores.registry().info(id)
    }

    /// Number of registered component types.
    #[inline]
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.stores.registry().len()
    }

    /// Attaches `value` to `entity`. If the entity already has a `C`, the
    /// value is replaced in place and the old one returned.
    ///
    /// # Errors
    ///
    /// [`EcsError::StaleHandle`] if `entity` is not alive,
    /// [`EcsError::ComponentLimitReached`] if `C` is new and no type slot is left.
    pub fn add<C: Component>(&mut self, entity: EntityId, value: C) -> EcsResult<Option<C>> {
        add_component(&mut self.registry, &mut self.stores, entity, value)
    }

    /// Detaches `C` from `entity` by swap-remove. No-op if absent.
    ///
    /// # Errors
    ///
    /// [`EcsError::StaleHandle`] if `entity` is not alive.
    pub fn remove<C: Component>(&mut self, entity: EntityId) -> EcsResult<Option<C>> {
        remove_component(&mut self.registry, &mut self.stores, entity)
    }

    /// Gets the `C` of `entity`.
    ///
    /// The reference borrows the world, so it cannot outlive the next
    /// structural change.
    ///
    /// # Errors
    ///
    /// [`EcsError::StaleHandle`] if `entity` is not alive,
    /// [`EcsError::ComponentMissing`] if it has no `C`.
    pub fn get<C: Component>(&self, entity: EntityId) -> EcsResult<&C> {
        get_component(&self.registry, &self.stores, entity)
    }

    /// Gets the `C` of `entity` mutably.
    ///
    /// # Errors
    ///
    /// Same as [`World::get`].
    pub fn get_mut<C: Component>(&mut self, entity: EntityId) -> EcsResult<&mut C> {
        get_component_mut(&self.registry, &mut self.stores, entity)
    }

    /// O(1) presence check. False for dead entities and unregistered types.
    #[inline]
    #[must_use]
    pub fn has<C: Component>(&self, entity: EntityId) -> bool {
        has_component::<C>(&self.registry, &self.stores, entity)
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

    /// Number of occupied dense slots in the store of `C`.
    #[must_use]
    pub fn density<C: Component>(&self) -> usize {
        self.stores.id_of::<C>().map_or(0, |id| self.stores.len_of(id))
    }

    // =========================================================================
    // Systems and filters
    // =========================================================================

    /// Registers `system` with `filter`. Systems run in registration order.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidFilter`] if the filter names an unregistered type.
    pub fn register_system<S: System + 'static>(
        &mut self,
        filter: &Filter,
        system: S,
    ) -> EcsResult<SystemHandle> {
        let mask = filter.resolve(self.stores.registry())?;
        let Ok(raw) = u32::try_from(self.systems.len()) else {
            unreachable!("more than u32::MAX systems registered");
        };
        let handle = SystemHandle::new(raw);
        tracing::debug!(system = system.name(), %handle, ?mask, "registered system");
        self.systems.push(SystemEntry {
            system: Box::new(system),
            index: FilterIndex::new(mask, &self.log),
        });
        Ok(handle)
    }

    /// Registers a closure as a system.
    ///
    /// # Errors
    ///
    /// Same as [`World::register_system`].
    pub fn register_fn<F>(&mut self, filter: &Filter, run: F) -> EcsResult<SystemHandle>
    where
        F: FnMut(&mut SystemView<'_>) -> EcsResult<()> + Send + 'static,
    {
        self.register_system(filter, FnSystem::new(run))
    }

    /// Number of registered systems.
    #[inline]
    #[must_use]
    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    /// Entities matching the filter of `handle` as of the last refresh.
    ///
    /// Brings the filter index up to date first.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownSystem`] if `handle` was not issued by this world.
    pub fn entities(&mut self, handle: SystemHandle) -> EcsResult<Entities<'_>> {
        let entry = self
            .systems
            .get_mut(handle.index() as usize)
            .ok_or(EcsError::UnknownSystem { handle })?;
        let examined = entry.index.sync(&self.log, &self.registry);
        tracing::trace!(system = entry.system.name(), examined, "synced filter index");
        Ok(Entities::new(entry.index.entities()))
    }

    /// True if `entity` currently has every type `handle`'s filter requires.
    ///
    /// Uses the live mask, not the committed one.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownSystem`] or [`EcsError::StaleHandle`].
    pub fn matches(&self, handle: SystemHandle, entity: EntityId) -> EcsResult<bool> {
        let entry = self
            .systems
            .get(handle.index() as usize)
            .ok_or(EcsError::UnknownSystem { handle })?;
        let mask = self.registry.mask(entity)?;
        Ok(entry.index.matches(&mask))
    }

    /// Ad-hoc filtered iteration over the state as of the last refresh.
    ///
    /// Scans every entity slot; register a system for repeated queries.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidFilter`] if the filter names an unregistered type.
    pub fn query(&self, filter: &Filter) -> EcsResult<impl Iterator<Item = EntityId> + '_> {
        let mask = filter.resolve(self.stores.registry())?;
        Ok(self
            .registry
            .committed_iter()
            .filter(move |(_, committed)| committed.contains_all(&mask))
            .map(|(entity, _)| entity))
    }

    // =========================================================================
    // Tick
    // =========================================================================

    /// Commits all pending structural changes.
    ///
    /// Finalizes destructions (components dropped, generation bumped, index
    /// recycled), applies activations and deactivations, and records every
    /// touched entity for the filter indexes to replay when next iterated.
    pub fn refresh(&mut self) -> RefreshStats {
        let mut destroyed = std::mem::take(&mut self.destroyed);
        let stats = self.registry.refresh(self.log.buffer(), &mut destroyed);
        for (entity, mask) in destroyed.drain(..) {
            self.stores.remove_all(entity, &mask);
        }
        self.destroyed = destroyed;
        self.compact_log();

        tracing::debug!(
            activated = stats.activated,
            deactivated = stats.deactivated,
            destroyed = stats.destroyed,
            changed = stats.changed,
            backlog = self.log.len(),
            "world refreshed"
        );
        stats
    }

    /// Runs every system once, in registration order, over the entities its
    /// filter matched at the last refresh.
    ///
    /// # Errors
    ///
    /// Stops at the first system that fails and returns its error.
    pub fn update(&mut self) -> EcsResult<()> {
        let policy = self.config.mutation_policy;
        for entry in &mut self.systems {
            let examined = entry.index.sync(&self.log, &self.registry);
            let mut view = SystemView::new(
                entry.index.entities(),
                *entry.index.mask(),
                &mut self.registry,
                &mut self.stores,
                policy,
            );
            tracing::trace!(
                system = entry.system.name(),
                examined,
                entities = view.len(),
                "running system"
            );
            if let Err(err) = entry.system.run(&mut view) {
                tracing::debug!(system = entry.system.name(), %err, "system failed");
                return Err(err);
            }
        }
        Ok(())
    }

    /// Drops change-log entries every index has replayed. Indexes lagging
    /// by more than the number of entity slots are switched to a full
    /// rebuild so the log stays bounded.
    fn compact_log(&mut self) {
        let end = self.log.end();
        let limit = self.registry.slot_count() as u64;
        let mut oldest = end;
        for entry in &mut self.systems {
            if end - entry.index.cursor() > limit {
                tracing::debug!(
                    system = entry.system.name(),
                    backlog = end - entry.index.cursor(),
                    "filter index fell behind, scheduling full rebuild"
                );
                entry.index.invalidate(&self.log);
            }
            oldest = oldest.min(entry.index.cursor());
        }
        self.log.discard_before(oldest);
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Component operations shared by World and SystemView
// =============================================================================

pub(crate) fn add_component<C: Component>(
    registry: &mut EntityRegistry,
    stores: &mut StoreSet,
    entity: EntityId,
    value: C,
) -> EcsResult<Option<C>> {
    if !registry.is_alive(entity) {
        return Err(EcsError::StaleHandle { entity });
    }
    let (id, store) = stores.entry::<C>()?;
    let previous = store.insert(entity, value);
    registry.set_component(entity, id, true)?;
    Ok(previous)
}

pub(crate) fn remove_component<C: Component>(
    registry: &mut EntityRegistry,
    stores: &mut StoreSet,
    entity: EntityId,
) -> EcsResult<Option<C>> {
    if !registry.is_alive(entity) {
        return Err(EcsError::StaleHandle { entity });
    }
    let Some(id) = stores.id_of::<C>() else {
        return Ok(None);
    };
    let removed = stores
        .store_mut::<C>()
        .and_then(|store| store.remove(entity));
    if removed.is_some() {
        registry.set_component(entity, id, false)?;
    }
    Ok(removed)
}

pub(crate) fn get_component<'s, C: Component>(
    registry: &EntityRegistry,
    stores: &'s StoreSet,
    entity: EntityId,
) -> EcsResult<&'s C> {
    if !registry.is_alive(entity) {
        return Err(EcsError::StaleHandle { entity });
    }
    stores
        .store::<C>()
        .ok_or(EcsError::ComponentMissing {
            entity,
            component: type_name::<C>(),
        })?
        .get(entity)
}

pub(crate) fn get_component_mut<'s, C: Component>(
    registry: &EntityRegistry,
    stores: &'s mut StoreSet,
    entity: EntityId,
) -> EcsResult<&'s mut C> {
    if !registry.is_alive(entity) {
        return Err(EcsError::StaleHandle { entity });
    }
    stores
        .store_mut::<C>()
        .ok_or(EcsError::ComponentMissing {
            entity,
            component: type_name::<C>(),
        })?
        .get_mut(entity)
}

pub(crate) fn has_component<C: Component>(
    registry: &EntityRegistry,
    stores: &StoreSet,
    entity: EntityId,
) -> bool {
    registry.is_alive(entity) && stores.store::<C>().is_some_and(|store| store.has(entity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MutationPolicy;

    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Position {
        x: i32,
        y: i32,
    }
    impl Component for Position {}

    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Velocity {
        x: i32,
        y: i32,
    }
    impl Component for Velocity {}

    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Tag;
    impl Component for Tag {}

    fn movers() -> Filter {
        Filter::new().require::<Position>().require::<Velocity>()
    }

    #[test]
    fn test_world_creation() {
        let world = World::new();
        assert_eq!(world.alive_count(), 0);
        assert_eq!(world.component_count(), 0);
        assert_eq!(world.system_count(), 0);
    }

    #[test]
    fn test_component_info_describes_registered_types() {
        let mut world = World::new();
        let position = world.register_component::<Position>().unwrap();
        let tag = world.register_component::<Tag>().unwrap();

        let info = world.component_info(position).unwrap();
        assert_eq!(info.id, position);
        assert_eq!(info.name, type_name::<Position>());
        assert_eq!(info.size, std::mem::size_of::<Position>());
        assert_eq!(world.component_info(tag).unwrap().size, 0);

        let mut other = World::new();
        assert!(other.component_info(position).is_none());
        other.register_component::<Tag>().unwrap();
        assert_eq!(other.component_info(position).unwrap().name, type_name::<Tag>());
    }

    #[test]
    fn test_add_get_remove() {
        let mut world = World::new();
        let e = world.create_entity();
        assert_eq!(world.add(e, Position { x: 1, y: 2 }), Ok(None));
        assert_eq!(world.get::<Position>(e), Ok(&Position { x: 1, y: 2 }));
        assert!(world.has::<Position>(e));

        assert_eq!(
            world.add(e, Position { x: 3, y: 4 }),
            Ok(Some(Position { x: 1, y: 2 }))
        );
        assert_eq!(world.density::<Position>(), 1);

        world.get_mut::<Position>(e).unwrap().x = 10;
        assert_eq!(world.remove::<Position>(e), Ok(Some(Position { x: 10, y: 4 })));
        assert!(!world.has::<Position>(e));
        assert!(matches!(
            world.get::<Position>(e),
            Err(EcsError::ComponentMissing { .. })
        ));
        assert_eq!(world.remove::<Position>(e), Ok(None));
        assert_eq!(world.remove::<Velocity>(e), Ok(None));
    }

    #[test]
    fn test_unregistered_filter_is_invalid() {
        let mut world = World::new();
        world.register_component::<Position>().unwrap();
        let err = world.register_fn(&movers(), |_| Ok(())).unwrap_err();
        assert_eq!(
            err,
            EcsError::InvalidFilter {
                component: type_name::<Velocity>()
            }
        );
    }

    #[test]
    fn test_update_moves_matching_entities() {
        let mut world = World::new();
        world.register_component::<Position>().unwrap();
        world.register_component::<Velocity>().unwrap();
        world
            .register_fn(&movers(), |view| {
                for e in view.entities() {
                    let v = *view.get::<Velocity>(e)?;
                    let p = view.get_mut::<Position>(e)?;
                    p.x += v.x;
                    p.y += v.y;
                }
                Ok(())
            })
            .unwrap();

        let moving = world.create_entity();
        world.add(moving, Position { x: 0, y: 0 }).unwrap();
        world.add(moving, Velocity { x: 1, y: 2 }).unwrap();
        let still = world.create_entity();
        world.add(still, Position { x: 5, y: 5 }).unwrap();

        // Nothing is visible before the first refresh.
        world.update().unwrap();
        assert_eq!(world.get::<Position>(moving), Ok(&Position { x: 0, y: 0 }));

        world.refresh();
        world.update().unwrap();
        world.update().unwrap();
        assert_eq!(world.get::<Position>(moving), Ok(&Position { x: 2, y: 4 }));
        assert_eq!(world.get::<Position>(still), Ok(&Position { x: 5, y: 5 }));
    }

    #[test]
    fn test_view_rejects_mutating_filtered_store() {
        let mut world = World::new();
        world.register_component::<Position>().unwrap();
        world.register_component::<Velocity>().unwrap();
        world
            .register_fn(&movers(), |view| {
                for e in view.entities() {
                    view.add(e, Tag)?;
                    view.remove::<Velocity>(e)?;
                }
                Ok(())
            })
            .unwrap();

        let e = world.create_entity();
        world.add(e, Position { x: 0, y: 0 }).unwrap();
        world.add(e, Velocity { x: 0, y: 0 }).unwrap();
        world.refresh();

        assert_eq!(
            world.update(),
            Err(EcsError::ConcurrentStructuralMutation {
                component: type_name::<Velocity>()
            })
        );
        // The unrelated store was mutated, the filtered one was not.
        assert!(world.has::<Tag>(e));
        assert!(world.has::<Velocity>(e));
    }

    #[test]
    fn test_view_permits_when_configured() {
        let mut world = World::with_config(WorldConfig {
            mutation_policy: MutationPolicy::Permit,
            ..WorldConfig::default()
        });
        world.register_component::<Position>().unwrap();
        world.register_component::<Velocity>().unwrap();
        let handle = world
            .register_fn(&movers(), |view| {
                for e in view.entities() {
                    view.remove::<Velocity>(e)?;
                    assert!(matches!(
                        view.get::<Velocity>(e),
                        Err(EcsError::ComponentMissing { .. })
                    ));
                }
                Ok(())
            })
            .unwrap();

        for _ in 0..4 {
            let e = world.create_entity();
            world.add(e, Position { x: 0, y: 0 }).unwrap();
            world.add(e, Velocity { x: 0, y: 0 }).unwrap();
        }
        world.refresh();
        world.update().unwrap();
        assert_eq!(world.density::<Velocity>(), 0);
        // Filter membership only changes at the next refresh.
        assert_eq!(world.entities(handle).unwrap().len(), 4);
        world.refresh();
        assert_eq!(world.entities(handle).unwrap().len(), 0);
    }

    #[test]
    fn test_destroy_clears_components_on_refresh() {
        let mut world = World::new();
        let e = world.create_entity();
        world.add(e, Position { x: 1, y: 1 }).unwrap();
        world.add(e, Tag).unwrap();
        world.destroy_entity(e).unwrap();
        assert!(world.has::<Position>(e));

        let stats = world.refresh();
        assert_eq!(stats.destroyed, 1);
        assert!(!world.is_alive(e));
        assert_eq!(world.density::<Position>(), 0);
        assert_eq!(world.density::<Tag>(), 0);
        assert_eq!(world.get::<Position>(e), Err(EcsError::StaleHandle { entity: e }));
    }

    #[test]
    fn test_lagging_index_is_rebuilt() {
        let mut world = World::new();
        world.register_component::<Tag>().unwrap();
        let handle = world
            .register_fn(&Filter::new().require::<Tag>(), |_| Ok(()))
            .unwrap();

        let e = world.create_entity();
        world.add(e, Tag).unwrap();
        // Toggle the same single slot more times than there are slots.
        for _ in 0..8 {
            world.deactivate(e).unwrap();
            world.refresh();
            world.activate(e).unwrap();
            world.refresh();
        }
        assert_eq!(world.log.len(), 0);
        assert_eq!(world.entities(handle).unwrap().collect::<Vec<_>>(), vec![e]);
    }

    #[test]
    fn test_unknown_system_handle() {
        let mut world = World::new();
        let handle = SystemHandle::new(3);
        assert!(matches!(
            world.entities(handle),
            Err(EcsError::UnknownSystem { .. })
        ));
    }
}
