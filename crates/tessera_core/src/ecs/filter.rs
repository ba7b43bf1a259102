//! # Filters
//!
//! A [`Filter`] is the set of component types a system requires. Once a
//! system is registered its filter is resolved to a [`ComponentMask`] and
//! backed by a [`FilterIndex`]: a packed set of the entities whose committed
//! mask contains the filter mask.
//!
//! ## Rebuild policy
//!
//! Indexes are never touched by individual add/remove/create/destroy calls.
//! `refresh` appends every touched entity index to a shared [`ChangeLog`];
//! each index replays the entries it has not seen the next time it is
//! iterated. An index whose backlog grows past the number of entity slots
//! is rebuilt from scratch instead.
//!
//! ```text
//! ChangeLog:   base=120 [ 4, 9, 4, 17, 3, ... ] end=131
//!                        ^ cursor of index A      ^ cursor of index B
//! ```

use std::any::{type_name, TypeId};

use super::component::{Component, ComponentMask, ComponentRegistry};
use super::entity::{EntityId, EntityRegistry};
use crate::error::{EcsError, EcsResult};

const EMPTY: u32 = u32::MAX;

/// Immutable set of required component types.
///
/// # Example
///
/// ```rust,ignore
/// let movers = Filter::new().require::<Position>().require::<Velocity>();
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Filter {
    required: Vec<(TypeId, &'static str)>,
}

impl Filter {
    /// A filter with no requirements; matches every active entity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `C` to the required set.
    #[must_use]
    pub fn require<C: Component>(mut self) -> Self {
        let type_id = TypeId::of::<C>();
        if !self.required.iter().any(|(id, _)| *id == type_id) {
            self.required.push((type_id, type_name::<C>()));
        }
        self
    }

    /// Number of required types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.required.len()
    }

    /// True if nothing is required.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.required.is_empty()
    }

    /// Resolves the required types to a mask.
    ///
    /// Fails with [`EcsError::InvalidFilter`] naming the first type the
    /// registry has never seen.
    pub(crate) fn resolve(&self, registry: &ComponentRegistry) -> EcsResult<ComponentMask> {
        let mut mask = ComponentMask::EMPTY;
        for &(type_id, name) in &self.required {
            let id = registry
                .id_of_type(type_id)
                .ok_or(EcsError::InvalidFilter { component: name })?;
            mask.insert(id);
        }
        Ok(mask)
    }
}

/// Append-only record of entity indices committed by `refresh`, addressed
/// by absolute position so that readers can hold cursors across compaction.
#[derive(Default)]
pub(crate) struct ChangeLog {
    entries: Vec<u32>,
    base: u64,
}

impl ChangeLog {
    /// Absolute position one past the newest entry.
    #[inline]
    pub(crate) fn end(&self) -> u64 {
        self.base + self.entries.len() as u64
    }

    /// Buffer that `refresh` appends to.
    #[inline]
    pub(crate) fn buffer(&mut self) -> &mut Vec<u32> {
        &mut self.entries
    }

    /// Entries at or after `cursor`.
    #[inline]
    fn since(&self, cursor: u64) -> &[u32] {
        let start = usize::try_from(cursor.saturating_sub(self.base)).unwrap_or(usize::MAX);
        self.entries.get(start..).unwrap_or(&[])
    }

    /// Drops every entry before `cursor`.
    pub(crate) fn discard_before(&mut self, cursor: u64) {
        let count = usize::try_from(cursor.saturating_sub(self.base))
            .unwrap_or(usize::MAX)
            .min(self.entries.len());
        self.entries.drain(..count);
        self.base += count as u64;
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Packed set of the entities matching one filter as of the last refresh.
pub(crate) struct FilterIndex {
    mask: ComponentMask,
    members: Vec<EntityId>,
    /// Entity index -> position in `members`.
    slots: Vec<u32>,
    cursor: u64,
    stale: bool,
}

impl FilterIndex {
    /// A new index that rebuilds on its first iteration.
    pub(crate) fn new(mask: ComponentMask, log: &ChangeLog) -> Self {
        Self {
            mask,
            members: Vec::new(),
            slots: Vec::new(),
            cursor: log.end(),
            stale: true,
        }
    }

    #[inline]
    pub(crate) fn mask(&self) -> &ComponentMask {
        &self.mask
    }

    #[inline]
    pub(crate) fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Matching entities as of the last [`FilterIndex::sync`].
    #[inline]
    pub(crate) fn entities(&self) -> &[EntityId] {
        &self.members
    }

    /// True if `mask` satisfies this filter.
    #[inline]
    pub(crate) fn matches(&self, mask: &ComponentMask) -> bool {
        mask.contains_all(&self.mask)
    }

    /// Forces a full rebuild on the next sync and skips the backlog.
    pub(crate) fn invalidate(&mut self, log: &ChangeLog) {
        self.stale = true;
        self.cursor = log.end();
    }

    /// Brings the index up to date with the committed state.
    ///
    /// Returns the number of entity slots examined.
    pub(crate) fn sync(&mut self, log: &ChangeLog, registry: &EntityRegistry) -> usize {
        let examined = if self.stale {
            self.rebuild(registry)
        } else {
            let pending = log.since(self.cursor);
            for &index in pending {
                self.apply(index, registry);
            }
            pending.len()
        };
        self.cursor = log.end();
        examined
    }

    fn rebuild(&mut self, registry: &EntityRegistry) -> usize {
        self.members.clear();
        self.slots.clear();
        for (id, mask) in registry.committed_iter() {
            if mask.contains_all(&self.mask) {
                self.insert(id);
            }
        }
        self.stale = false;
        tracing::trace!(members = self.members.len(), "rebuilt filter index");
        registry.slot_count()
    }

    fn apply(&mut self, index: u32, registry: &EntityRegistry) {
        self.evict(index);
        if let Some((id, mask)) = registry.committed(index) {
            if mask.contains_all(&self.mask) {
                self.insert(id);
            }
        }
    }

    fn insert(&mut self, id: EntityId) {
        let index = id.index() as usize;
        if index >= self.slots.len() {
            self.slots.resize(index + 1, EMPTY);
        }
        // member count is bounded by the number of entity indices (u32)
        #[allow(clippy::cast_possible_truncation)]
        let position = self.members.len() as u32;
        self.slots[index] = position;
        self.members.push(id);
    }

    fn evict(&mut self, index: u32) {
        let Some(&position) = self.slots.get(index as usize) else {
            return;
        };
        if position == EMPTY {
            return;
        }
        self.slots[index as usize] = EMPTY;
        let position = position as usize;
        let last = self.members.len() - 1;
        if position != last {
            let moved = self.members[last];
            // position < member count <= u32::MAX
            #[allow(clippy::cast_possible_truncation)]
            let new_position = position as u32;
            self.slots[moved.index() as usize] = new_position;
        }
        self.members.swap_remove(position);
    }
}

/// Lazy sequence of entity handles.
///
/// Holding one borrows its source, so no structural change can happen
/// while it is alive.
#[derive(Clone, Debug)]
pub struct Entities<'a> {
    inner: std::slice::Iter<'a, EntityId>,
}

impl<'a> Entities<'a> {
    #[inline]
    pub(crate) fn new(slice: &'a [EntityId]) -> Self {
        Self { inner: slice.iter() }
    }

    /// The remaining handles as a slice.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &'a [EntityId] {
        self.inner.as_slice()
    }
}

impl Iterator for Entities<'_> {
    type Item = EntityId;

    #[inline]
    fn next(&mut self) -> Option<EntityId> {
        self.inner.next().copied()
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Entities<'_> {}

impl DoubleEndedIterator for Entities<'_> {
    #[inline]
    fn next_back(&mut self) -> Option<EntityId> {
        self.inner.next_back().copied()
    }
}
