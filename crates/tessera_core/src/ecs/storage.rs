//! # Component Storage
//!
//! Packed, per-type component storage keyed by entity.
//!
//! Each store is a sparse set:
//! - `sparse` maps an entity index to a dense slot (or [`EMPTY`])
//! - `entities` and `data` are parallel dense arrays with no gaps
//! - Removal swaps the last dense element into the freed slot
//!
//! Iteration over `data` is contiguous. Dense order is not stable across
//! removals.

use std::any::{type_name, Any};

use super::component::{Component, ComponentId, ComponentMask, ComponentRegistry};
use super::entity::EntityId;
use crate::error::{EcsError, EcsResult};

/// Sparse entry marking an entity index without a dense slot.
const EMPTY: u32 = u32::MAX;

/// Packed storage for a single component type.
///
/// This storage guarantees:
/// - O(1) insert, lookup and removal by entity
/// - The number of dense slots equals the number of entities with the component
/// - Cache-friendly iteration over a gap-free slice
///
/// Stores are created and structurally changed (insert/remove) only by the
/// [`World`](crate::World), so entity masks stay in sync; a store handed out
/// by the world only allows value access.
///
/// # Example
///
/// ```rust,ignore
/// let positions = world.store_mut::<Position>().unwrap();
/// for position in positions.as_mut_slice() {
///     position.x += 1.0;
/// }
/// ```
pub struct ComponentStore<C: Component> {
    /// Entity index -> dense slot.
    sparse: Vec<u32>,
    /// Dense slot -> owning entity.
    entities: Vec<EntityId>,
    /// Dense component values, parallel to `entities`.
    data: Vec<C>,
}

impl<C: Component> ComponentStore<C> {
    /// Creates an empty store with `capacity` dense slots reserved.
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            sparse: Vec::new(),
            entities: Vec::with_capacity(capacity),
            data: Vec::with_capacity(capacity),
        }
    }

    /// Number of occupied dense slots.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True if no entity has this component.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// O(1) presence check. Never fails.
    #[inline]
    #[must_use]
    pub fn has(&self, entity: EntityId) -> bool {
        matches!(self.lookup(entity), Lookup::Present(_))
    }

    /// Gets the component of `entity`.
    ///
    /// The returned reference borrows the store, so no structural change can
    /// relocate the value while it is held.
    ///
    /// # Errors
    ///
    /// [`EcsError::ComponentMissing`] if the entity has no such component,
    /// [`EcsError::StaleHandle`] if its index now belongs to a newer entity
    /// that does.
    #[inline]
    pub fn get(&self, entity: EntityId) -> EcsResult<&C> {
        let slot = self.slot(entity)?;
        Ok(&self.data[slot])
    }

    /// Gets the component of `entity` mutably.
    ///
    /// # Errors
    ///
    /// Same as [`ComponentStore::get`].
    #[inline]
    pub fn get_mut(&mut self, entity: EntityId) -> EcsResult<&mut C> {
        let slot = self.slot(entity)?;
        Ok(&mut self.data[slot])
    }

    /// Dense values, in dense order.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[C] {
        &self.data
    }

    /// Dense values, mutable. Writing values is not a structural change.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [C] {
        &mut self.data
    }

    /// Owners of the dense values, parallel to [`ComponentStore::as_slice`].
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &[EntityId] {
        &self.entities
    }

    /// Iterates `(owner, value)` pairs in dense order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &C)> {
        self.entities.iter().copied().zip(self.data.iter())
    }

    /// Iterates `(owner, value)` pairs mutably in dense order.
    #[inline]
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (EntityId, &mut C)> {
        self.entities.iter().copied().zip(self.data.iter_mut())
    }

    /// Attaches `value` to `entity`, replacing any previous value in place.
    ///
    /// Returns the replaced value. The caller is responsible for liveness.
    pub(crate) fn insert(&mut self, entity: EntityId, value: C) -> Option<C> {
        let index = entity.index() as usize;
        if index >= self.sparse.len() {
            self.sparse.resize(index + 1, EMPTY);
        }

        let slot = self.sparse[index];
        if slot != EMPTY {
            let slot = slot as usize;
            self.entities[slot] = entity;
            return Some(std::mem::replace(&mut self.data[slot], value));
        }

        // dense length is bounded by the number of entity indices (u32)
        #[allow(clippy::cast_possible_truncation)]
        let dense = self.data.len() as u32;
        self.sparse[index] = dense;
        self.entities.push(entity);
        self.data.push(value);
        None
    }

    /// Detaches the component of `entity` by swap-remove.
    ///
    /// No-op if absent. The entity that previously occupied the last dense
    /// slot has its sparse entry repointed to the freed slot.
    pub(crate) fn remove(&mut self, entity: EntityId) -> Option<C> {
        let Lookup::Present(slot) = self.lookup(entity) else {
            return None;
        };

        self.sparse[entity.index() as usize] = EMPTY;
        let last = self.data.len() - 1;
        if slot != last {
            let moved = self.entities[last];
            // slot < dense length <= u32::MAX
            #[allow(clippy::cast_possible_truncation)]
            let new_slot = slot as u32;
            self.sparse[moved.index() as usize] = new_slot;
        }
        self.entities.swap_remove(slot);
        Some(self.data.swap_remove(slot))
    }

    #[inline]
    fn lookup(&self, entity: EntityId) -> Lookup {
        match self.sparse.get(entity.index() as usize) {
            Some(&slot) if slot != EMPTY => {
                let slot = slot as usize;
                if self.entities[slot] == entity {
                    Lookup::Present(slot)
                } else {
                    Lookup::Stale
                }
            }
            _ => Lookup::Absent,
        }
    }

    #[inline]
    fn slot(&self, entity: EntityId) -> EcsResult<usize> {
        match self.lookup(entity) {
            Lookup::Present(slot) => Ok(slot),
            Lookup::Stale => Err(EcsError::StaleHandle { entity }),
            Lookup::Absent => Err(EcsError::ComponentMissing {
                entity,
                component: type_name::<C>(),
            }),
        }
    }
}

enum Lookup {
    Present(usize),
    /// The index is occupied by a different generation.
    Stale,
    Absent,
}

/// Type-erased view of a [`ComponentStore`], used where the world has to
/// touch every store without knowing the concrete type.
pub(crate) trait ErasedStore: Send + Sync {
    /// Removes the component of `entity`; true if one was present.
    fn remove_entity(&mut self, entity: EntityId) -> bool;
    fn len(&self) -> usize;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<C: Component> ErasedStore for ComponentStore<C> {
    fn remove_entity(&mut self, entity: EntityId) -> bool {
        self.remove(entity).is_some()
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Every component store of a world, indexed by [`ComponentId`], together
/// with the type table that assigns those ids.
pub(crate) struct StoreSet {
    registry: ComponentRegistry,
    stores: Vec<Box<dyn ErasedStore>>,
    reserve: usize,
}

impl StoreSet {
    pub(crate) fn new(reserve: usize) -> Self {
        Self {
            registry: ComponentRegistry::default(),
            stores: Vec::new(),
            reserve,
        }
    }

    /// Registers `C`, creating its store on first use.
    pub(crate) fn register<C: Component>(&mut self) -> EcsResult<ComponentId> {
        let (id, fresh) = self.registry.register::<C>()?;
        if fresh {
            self.stores
                .push(Box::new(ComponentStore::<C>::with_capacity(self.reserve)));
            tracing::trace!(component = type_name::<C>(), %id, "registered component type");
        }
        Ok(id)
    }

    /// Registers `C` if needed and returns its id and typed store.
    pub(crate) fn entry<C: Component>(&mut self) -> EcsResult<(ComponentId, &mut ComponentStore<C>)> {
        let id = self.register::<C>()?;
        let Some(store) = self
            .stores
            .get_mut(id.index())
            .and_then(|store| store.as_any_mut().downcast_mut::<ComponentStore<C>>())
        else {
            unreachable!("store for {} has the wrong type", type_name::<C>());
        };
        Ok((id, store))
    }

    #[inline]
    pub(crate) fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    #[inline]
    pub(crate) fn id_of<C: Component>(&self) -> Option<ComponentId> {
        self.registry.id_of::<C>()
    }

    pub(crate) fn store<C: Component>(&self) -> Option<&ComponentStore<C>> {
        let id = self.id_of::<C>()?;
        self.stores.get(id.index())?.as_any().downcast_ref()
    }

    pub(crate) fn store_mut<C: Component>(&mut self) -> Option<&mut ComponentStore<C>> {
        let id = self.id_of::<C>()?;
        self.stores.get_mut(id.index())?.as_any_mut().downcast_mut()
    }

    /// Number of values in the store for `id`.
    pub(crate) fn len_of(&self, id: ComponentId) -> usize {
        self.stores.get(id.index()).map_or(0, |store| store.len())
    }

    /// Removes every component in `mask` from `entity`.
    pub(crate) fn remove_all(&mut self, entity: EntityId, mask: &ComponentMask) -> usize {
        let mut removed = 0;
        for id in mask.iter() {
            if let Some(store) = self.stores.get_mut(id.index()) {
                if store.remove_entity(entity) {
                    removed += 1;
                }
            }
        }
        removed
    }
}
