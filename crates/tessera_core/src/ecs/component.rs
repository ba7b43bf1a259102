//! # Component System
//!
//! Components are pure data containers with no behavior. Each Rust type is
//! registered once per world and assigned a dense [`ComponentId`], which
//! doubles as its bit position in every entity's [`ComponentMask`].

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::fmt;

use crate::error::{EcsError, EcsResult};

/// Maximum number of distinct component types a world can register.
pub const MAX_COMPONENTS: usize = 256;

const MASK_WORDS: usize = MAX_COMPONENTS / 64;

/// Marker trait for ECS components.
///
/// Components must be plain values with a stable type identity:
/// `'static` so they can be keyed by [`TypeId`], `Send + Sync` so a host
/// may move the world between threads.
///
/// # Example
///
/// ```rust
/// use tessera_core::Component;
///
/// #[derive(Clone, Copy, Debug, Default)]
/// struct Position {
///     x: f32,
///     y: f32,
/// }
///
/// impl Component for Position {}
/// ```
pub trait Component: Send + Sync + 'static {}

/// Dense per-world identifier of a registered component type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentId(u16);

impl ComponentId {
    #[cfg(test)]
    pub(crate) const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    /// Returns the id as an index into per-type tables.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Presence bitmask: one bit per registered component type.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ComponentMask([u64; MASK_WORDS]);

impl ComponentMask {
    /// The mask with no bits set.
    pub const EMPTY: Self = Self([0; MASK_WORDS]);

    /// Sets the bit for `id`.
    #[inline]
    pub fn insert(&mut self, id: ComponentId) {
        let (word, bit) = Self::locate(id);
        self.0[word] |= bit;
    }

    /// Clears the bit for `id`.
    #[inline]
    pub fn remove(&mut self, id: ComponentId) {
        let (word, bit) = Self::locate(id);
        self.0[word] &= !bit;
    }

    /// Checks the bit for `id`.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: ComponentId) -> bool {
        let (word, bit) = Self::locate(id);
        self.0[word] & bit != 0
    }

    /// True if every bit set in `required` is also set in `self`.
    #[inline]
    #[must_use]
    pub fn contains_all(&self, required: &Self) -> bool {
        self.0
            .iter()
            .zip(required.0.iter())
            .all(|(have, need)| have & need == *need)
    }

    /// True if no bit is set.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|word| *word == 0)
    }

    /// Iterates the ids whose bits are set, lowest first.
    pub fn iter(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.0.iter().enumerate().flat_map(|(word_idx, &word)| {
            let mut bits = word;
            std::iter::from_fn(move || {
                if bits == 0 {
                    return None;
                }
                let bit = bits.trailing_zeros() as usize;
                bits &= bits - 1;
                // word_idx * 64 + bit < MAX_COMPONENTS <= u16::MAX
                #[allow(clippy::cast_possible_truncation)]
                Some(ComponentId((word_idx * 64 + bit) as u16))
            })
        })
    }

    #[inline]
    fn locate(id: ComponentId) -> (usize, u64) {
        let index = id.index();
        (index / 64, 1u64 << (index % 64))
    }
}

impl fmt::Debug for ComponentMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(ComponentId::index)).finish()
    }
}

/// Metadata recorded for each registered component type.
#[derive(Clone, Debug)]
pub struct ComponentInfo {
    /// Assigned id.
    pub id: ComponentId,
    /// Rust type name, used in error messages and logs.
    pub name: &'static str,
    /// Size of one value in bytes.
    pub size: usize,
}

/// Runtime table mapping Rust types to dense component ids.
#[derive(Default)]
pub(crate) struct ComponentRegistry {
    ids: HashMap<TypeId, ComponentId>,
    infos: Vec<ComponentInfo>,
}

impl ComponentRegistry {
    /// Returns the id for `T`, allocating one if `T` is new.
    ///
    /// The boolean is true when the type was registered by this call.
    pub(crate) fn register<T: Component>(&mut self) -> EcsResult<(ComponentId, bool)> {
        if let Some(&id) = self.ids.get(&TypeId::of::<T>()) {
            return Ok((id, false));
        }
        let next = self.infos.len();
        if next >= MAX_COMPONENTS {
            return Err(EcsError::ComponentLimitReached {
                limit: MAX_COMPONENTS,
            });
        }
        // next < MAX_COMPONENTS <= u16::MAX
        #[allow(clippy::cast_possible_truncation)]
        let id = ComponentId(next as u16);
        self.ids.insert(TypeId::of::<T>(), id);
        self.infos.push(ComponentInfo {
            id,
            name: type_name::<T>(),
            size: std::mem::size_of::<T>(),
        });
        Ok((id, true))
    }

    #[inline]
    pub(crate) fn id_of<T: Component>(&self) -> Option<ComponentId> {
        self.id_of_type(TypeId::of::<T>())
    }

    #[inline]
    pub(crate) fn id_of_type(&self, type_id: TypeId) -> Option<ComponentId> {
        self.ids.get(&type_id).copied()
    }

    pub(crate) fn info(&self, id: ComponentId) -> Option<&ComponentInfo> {
        self.infos.get(id.index())
    }

    pub(crate) fn len(&self) -> usize {
        self.infos.len()
    }
}
