// Vector with stable indices and slot reuse.
//
// `StableIndexVec` hands out `u32` indices that keep referring to the same
// element until that element is removed. Removal does not shift anything:
// the slot is invalidated in place and its index goes into a sorted free
// set, and the next `add` fills the lowest free slot. Removal is O(log n),
// everything else is plain `Vec` cost.
//
// Whether a slot holds a live element is decided by a `Validator`, so the
// element type itself carries its "hole" representation (e.g. a node with
// negative vertex refs). Types that know how to do this implement
// `Validate` and use the default `SelfValidating` validator.
//
// Reused slots make raw indices alias: an index held across a remove/add
// pair silently points at the new element. Callers that hold indices
// across edits can take a `SlotHandle` instead, which also records the
// add-stamp of the element and refuses to dereference once the slot has
// been reused. `pack` closes all holes and returns an old-to-new remap.
//
// See also: `celled.rs`, which stores vertices and graph nodes here so that
// rebuilding one cell never renumbers another cell's nodes.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::marker::PhantomData;
use std::ops::Index;

/// Decides which slot values are live.
pub trait Validator<T> {
    fn is_valid(value: &T) -> bool;
    fn invalidate(value: &mut T);
}

/// Implemented by element types that know their own hole representation.
pub trait Validate {
    fn is_valid(&self) -> bool;
    fn invalidate(&mut self);
}

/// Validator that defers to the element's own `Validate` impl.
#[derive(Clone, Copy, Debug, Default)]
pub struct SelfValidating;

impl<T: Validate> Validator<T> for SelfValidating {
    fn is_valid(value: &T) -> bool {
        value.is_valid()
    }

    fn invalidate(value: &mut T) {
        value.invalidate();
    }
}

/// An index plus the add-stamp of the element it was taken from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotHandle {
    pub index: u32,
    pub stamp: u32,
}

#[derive(Clone, Debug)]
pub struct StableIndexVec<T, V = SelfValidating> {
    items: Vec<T>,
    /// Add-stamp of the element currently (or last) in each slot.
    stamps: Vec<u32>,
    /// Sorted free slots; the lowest one is reused first.
    free: BTreeSet<u32>,
    next_stamp: u32,
    _validator: PhantomData<V>,
}

impl<T, V> Default for StableIndexVec<T, V> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            stamps: Vec::new(),
            free: BTreeSet::new(),
            next_stamp: 0,
            _validator: PhantomData,
        }
    }
}

impl<T, V: Validator<T>> StableIndexVec<T, V> {
    pub fn new() -> Self {
        Self::default()
    }

    fn take_stamp(&mut self) -> u32 {
        let stamp = self.next_stamp;
        self.next_stamp = self.next_stamp.wrapping_add(1);
        stamp
    }

    /// Insert into the lowest free slot, or append. Returns the index.
    /// A value the validator rejects lands as a hole and its slot stays free.
    pub fn add(&mut self, value: T) -> u32 {
        let stamp = self.take_stamp();
        let live = V::is_valid(&value);
        let index = if let Some(index) = self.free.pop_first() {
            self.items[index as usize] = value;
            self.stamps[index as usize] = stamp;
            index
        } else {
            self.items.push(value);
            self.stamps.push(stamp);
            (self.items.len() - 1) as u32
        };
        if !live {
            self.free.insert(index);
        }
        index
    }

    /// Invalidate the element at `index` and free its slot. Returns false
    /// if the index is out of range or already a hole.
    pub fn remove_at(&mut self, index: u32) -> bool {
        if !self.is_element_at(index) {
            return false;
        }
        V::invalidate(&mut self.items[index as usize]);
        self.free.insert(index);
        true
    }

    /// True if the slot holds no live element. `index` must be in range.
    pub fn is_empty_at(&self, index: u32) -> bool {
        !V::is_valid(&self.items[index as usize])
    }

    /// True if `index` is within the backing storage (live or hole).
    pub fn is_valid_index(&self, index: u32) -> bool {
        (index as usize) < self.items.len()
    }

    pub fn is_element_at(&self, index: u32) -> bool {
        self.is_valid_index(index) && !self.is_empty_at(index)
    }

    pub fn is_hole_at(&self, index: u32) -> bool {
        self.is_valid_index(index) && self.is_empty_at(index)
    }

    /// Slots including holes.
    pub fn num_total(&self) -> usize {
        self.items.len()
    }

    pub fn num_holes(&self) -> usize {
        self.free.len()
    }

    pub fn num_occupied(&self) -> usize {
        self.num_total() - self.num_holes()
    }

    pub fn is_empty(&self) -> bool {
        self.num_occupied() == 0
    }

    /// Overwrite a slot. Writing an invalid value removes the element;
    /// writing a valid value into a hole fills it.
    pub fn set_value_at(&mut self, index: u32, value: T) {
        if !self.is_valid_index(index) {
            return;
        }
        if !V::is_valid(&value) {
            self.remove_at(index);
            return;
        }
        if self.free.remove(&index) {
            self.stamps[index as usize] = self.take_stamp();
        }
        self.items[index as usize] = value;
    }

    pub fn get(&self, index: u32) -> Option<&T> {
        if self.is_element_at(index) {
            Some(&self.items[index as usize])
        } else {
            None
        }
    }

    /// Mutable access to a live element. If the caller invalidates it
    /// through this reference, follow up with `validate_at`.
    pub fn get_mut(&mut self, index: u32) -> Option<&mut T> {
        if self.is_element_at(index) {
            Some(&mut self.items[index as usize])
        } else {
            None
        }
    }

    /// Re-sync the free set with the slot's actual state. Returns true if
    /// the slot holds a live element.
    pub fn validate_at(&mut self, index: u32) -> bool {
        if !self.is_valid_index(index) {
            return false;
        }
        if self.is_empty_at(index) {
            self.free.insert(index);
            false
        } else {
            true
        }
    }

    pub fn handle(&self, index: u32) -> Option<SlotHandle> {
        if self.is_element_at(index) {
            Some(SlotHandle {
                index,
                stamp: self.stamps[index as usize],
            })
        } else {
            None
        }
    }

    /// Dereference a handle, failing if its slot was freed or reused since.
    pub fn get_by_handle(&self, handle: SlotHandle) -> Option<&T> {
        if self.is_element_at(handle.index) && self.stamps[handle.index as usize] == handle.stamp {
            Some(&self.items[handle.index as usize])
        } else {
            None
        }
    }

    /// Live elements in index order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        self.items
            .iter()
            .enumerate()
            .filter(|(_, v)| V::is_valid(v))
            .map(|(i, v)| (i as u32, v))
    }

    /// Remove all holes. Returns the `old index -> new index` map for every
    /// surviving element. Stamps travel with their elements.
    pub fn pack(&mut self) -> BTreeMap<u32, u32> {
        let mut remap = BTreeMap::new();
        let items = std::mem::take(&mut self.items);
        let stamps = std::mem::take(&mut self.stamps);
        for (old, (item, stamp)) in items.into_iter().zip(stamps).enumerate() {
            if V::is_valid(&item) {
                remap.insert(old as u32, self.items.len() as u32);
                self.items.push(item);
                self.stamps.push(stamp);
            }
        }
        self.items.shrink_to_fit();
        self.stamps.shrink_to_fit();
        self.free.clear();
        remap
    }

    /// Grow capacity to at least `additional` more slots. Never shrinks.
    pub fn reserve(&mut self, additional: usize) {
        self.items.reserve(additional);
        self.stamps.reserve(additional);
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.stamps.clear();
        self.free.clear();
    }
}

impl<T, V: Validator<T>> Index<u32> for StableIndexVec<T, V> {
    type Output = T;

    /// Raw slot access; holes are returned as their invalidated value.
    fn index(&self, index: u32) -> &T {
        &self.items[index as usize]
    }
}
