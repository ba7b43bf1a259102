//! # Entity Management
//!
//! Entities are lightweight identifiers consisting of:
//! - An index into per-entity tables
//! - A generation counter for safe reuse
//!
//! The registry is the sole authority on liveness. It also keeps, per slot,
//! the component mask and visibility as of the last refresh; filters read
//! only that committed state.

use std::fmt;

use super::component::{ComponentId, ComponentMask};
use crate::error::{EcsError, EcsResult};

/// Unique identifier for an entity.
///
/// The ID is split into two parts:
/// - Lower 32 bits: Index into entity tables
/// - Upper 32 bits: Generation counter for detecting stale references
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct EntityId(u64);

impl EntityId {
    /// Creates a new entity ID from index and generation.
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | (index as u64))
    }

    /// Returns the index portion of the entity ID.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn index(self) -> u32 {
        self.0 as u32
    }

    /// Returns the generation portion of the entity ID.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Null/invalid entity ID. Never issued by a registry.
    pub const NULL: Self = Self(u64::MAX);

    /// Checks if this entity ID is null/invalid.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == u64::MAX
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            f.write_str("null")
        } else {
            write!(f, "{}v{}", self.index(), self.generation())
        }
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({self})")
    }
}

/// Per-index bookkeeping.
#[derive(Clone, Copy, Debug)]
struct Slot {
    generation: u32,
    alive: bool,
    /// Marked by `destroy`, finalized at the next refresh.
    doomed: bool,
    /// Requested visibility (activate/deactivate).
    enabled: bool,
    /// Visibility as of the last refresh.
    visible: bool,
    /// Queued in the dirty list.
    dirty: bool,
    mask: ComponentMask,
    committed_mask: ComponentMask,
}

impl Slot {
    const fn fresh() -> Self {
        Self {
            generation: 0,
            alive: false,
            doomed: false,
            enabled: false,
            visible: false,
            dirty: false,
            mask: ComponentMask::EMPTY,
            committed_mask: ComponentMask::EMPTY,
        }
    }
}

/// Counts produced by one [`World::refresh`](crate::World::refresh).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RefreshStats {
    /// Entities that became visible to filters.
    pub activated: usize,
    /// Entities that stopped being visible to filters (destroyed ones included).
    pub deactivated: usize,
    /// Entities whose destruction was finalized.
    pub destroyed: usize,
    /// Entity slots whose committed state was recomputed.
    pub changed: usize,
}

/// Allocates and recycles entity identities.
///
/// Freed indices are reused LIFO. A slot's generation is bumped when its
/// destruction is finalized, so every handle issued before that point
/// becomes stale. An index whose generation would wrap is retired instead.
///
/// Owned by the [`World`](crate::World); read access is available through
/// [`World::registry`](crate::World::registry).
pub struct EntityRegistry {
    slots: Vec<Slot>,
    free: Vec<u32>,
    dirty: Vec<u32>,
    doomed: Vec<u32>,
    alive_count: usize,
    active_count: usize,
    auto_activate: bool,
}

impl EntityRegistry {
    /// Creates an empty registry with room for `capacity` entities.
    pub(crate) fn with_capacity(capacity: usize, auto_activate: bool) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            dirty: Vec::with_capacity(capacity),
            doomed: Vec::new(),
            alive_count: 0,
            active_count: 0,
            auto_activate,
        }
    }

    /// Issues a new entity in the pending state.
    ///
    /// # Panics
    ///
    /// Panics if every one of the 2^32 indices is alive or retired.
    pub(crate) fn create(&mut self) -> EntityId {
        let index = if let Some(index) = self.free.pop() {
            index
        } else {
            let next = u32::try_from(self.slots.len())
                .ok()
                .filter(|index| *index != u32::MAX);
            let Some(index) = next else {
                panic!("entity index space exhausted");
            };
            self.slots.push(Slot::fresh());
            index
        };

        let auto_activate = self.auto_activate;
        let slot = &mut self.slots[index as usize];
        slot.alive = true;
        slot.doomed = false;
        slot.enabled = auto_activate;
        slot.mask = ComponentMask::EMPTY;
        let generation = slot.generation;
        self.mark_dirty(index);
        self.alive_count += 1;

        EntityId::new(index, generation)
    }

    /// Marks `id` for destruction at the next refresh.
    ///
    /// Destroying an entity that is already marked is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::StaleHandle`] if `id` is not alive.
    pub(crate) fn destroy(&mut self, id: EntityId) -> EcsResult<()> {
        let slot = self.slot_mut(id)?;
        if slot.doomed {
            return Ok(());
        }
        slot.doomed = true;
        self.doomed.push(id.index());
        self.mark_dirty(id.index());
        Ok(())
    }

    /// O(1) generation comparison. Never fails.
    #[inline]
    #[must_use]
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.slot(id).is_ok()
    }

    /// True if `id` is alive and was visible to filters at the last refresh.
    #[inline]
    #[must_use]
    pub fn is_active(&self, id: EntityId) -> bool {
        self.slot(id).is_ok_and(|slot| slot.visible)
    }

    /// True if `id` is alive and waiting for the next refresh to be destroyed.
    #[inline]
    #[must_use]
    pub fn is_doomed(&self, id: EntityId) -> bool {
        self.slot(id).is_ok_and(|slot| slot.doomed)
    }

    /// Requests that `id` become visible to filters at the next refresh.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::StaleHandle`] if `id` is not alive.
    pub(crate) fn activate(&mut self, id: EntityId) -> EcsResult<()> {
        self.set_enabled(id, true)
    }

    /// Requests that `id` be hidden from filters at the next refresh. The
    /// entity stays alive and keeps its components.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::StaleHandle`] if `id` is not alive.
    pub(crate) fn deactivate(&mut self, id: EntityId) -> EcsResult<()> {
        self.set_enabled(id, false)
    }

    /// Live component mask of `id`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::StaleHandle`] if `id` is not alive.
    pub fn mask(&self, id: EntityId) -> EcsResult<ComponentMask> {
        self.slot(id).map(|slot| slot.mask)
    }

    /// Number of live entities, pending and doomed ones included.
    #[inline]
    #[must_use]
    pub const fn alive_count(&self) -> usize {
        self.alive_count
    }

    /// Number of entities visible to filters as of the last refresh.
    #[inline]
    #[must_use]
    pub const fn active_count(&self) -> usize {
        self.active_count
    }

    /// Number of index slots ever allocated.
    #[inline]
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Records that `id` gained or lost component `component`.
    pub(crate) fn set_component(
        &mut self,
        id: EntityId,
        component: ComponentId,
        present: bool,
    ) -> EcsResult<()> {
        let slot = self.slot_mut(id)?;
        if slot.mask.contains(component) == present {
            return Ok(());
        }
        if present {
            slot.mask.insert(component);
        } else {
            slot.mask.remove(component);
        }
        self.mark_dirty(id.index());
        Ok(())
    }

    /// Commits all pending changes.
    ///
    /// Finalizes doomed entities (their handle and live mask are pushed to
    /// `destroyed` so the caller can clear their components), bumps their
    /// generations, returns their indices to the free list, and copies the
    /// live state of every touched slot into its committed state. Indices of
    /// touched slots are appended to `changed`.
    pub(crate) fn refresh(
        &mut self,
        changed: &mut Vec<u32>,
        destroyed: &mut Vec<(EntityId, ComponentMask)>,
    ) -> RefreshStats {
        let mut stats = RefreshStats::default();

        for index in std::mem::take(&mut self.doomed) {
            let slot = &mut self.slots[index as usize];
            destroyed.push((EntityId::new(index, slot.generation), slot.mask));
            slot.generation = slot.generation.wrapping_add(1);
            slot.alive = false;
            slot.doomed = false;
            slot.enabled = false;
            slot.mask = ComponentMask::EMPTY;
            if slot.generation == 0 {
                // Reissuing the index would revive every handle ever issued for it.
                tracing::warn!(index, "entity generation exhausted, retiring index");
            } else {
                self.free.push(index);
            }
            self.alive_count -= 1;
            stats.destroyed += 1;
        }

        for index in self.dirty.drain(..) {
            let slot = &mut self.slots[index as usize];
            slot.dirty = false;
            let visible = slot.alive && slot.enabled;
            match (slot.visible, visible) {
                (false, true) => {
                    stats.activated += 1;
                    self.active_count += 1;
                }
                (true, false) => {
                    stats.deactivated += 1;
                    self.active_count -= 1;
                }
                _ => {}
            }
            slot.visible = visible;
            slot.committed_mask = slot.mask;
            changed.push(index);
            stats.changed += 1;
        }

        stats
    }

    /// Committed state of `index`: its handle and mask if it was visible at
    /// the last refresh.
    #[inline]
    pub(crate) fn committed(&self, index: u32) -> Option<(EntityId, &ComponentMask)> {
        let slot = self.slots.get(index as usize)?;
        slot.visible
            .then(|| (EntityId::new(index, slot.generation), &slot.committed_mask))
    }

    /// Iterates all entities visible at the last refresh with their
    /// committed masks.
    pub(crate) fn committed_iter(&self) -> impl Iterator<Item = (EntityId, &ComponentMask)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            // slot count never exceeds u32::MAX
            #[allow(clippy::cast_possible_truncation)]
            let index = index as u32;
            slot.visible
                .then(|| (EntityId::new(index, slot.generation), &slot.committed_mask))
        })
    }

    fn set_enabled(&mut self, id: EntityId, enabled: bool) -> EcsResult<()> {
        let slot = self.slot_mut(id)?;
        if slot.enabled != enabled {
            slot.enabled = enabled;
            self.mark_dirty(id.index());
        }
        Ok(())
    }

    #[inline]
    fn mark_dirty(&mut self, index: u32) {
        let slot = &mut self.slots[index as usize];
        if !slot.dirty {
            slot.dirty = true;
            self.dirty.push(index);
        }
    }

    #[inline]
    fn slot(&self, id: EntityId) -> EcsResult<&Slot> {
        match self.slots.get(id.index() as usize) {
            Some(slot) if slot.alive && slot.generation == id.generation() => Ok(slot),
            _ => Err(EcsError::StaleHandle { entity: id }),
        }
    }

    #[inline]
    fn slot_mut(&mut self, id: EntityId) -> EcsResult<&mut Slot> {
        match self.slots.get_mut(id.index() as usize) {
            Some(slot) if slot.alive && slot.generation == id.generation() => Ok(slot),
            _ => Err(EcsError::StaleHandle { entity: id }),
        }
    }
}
