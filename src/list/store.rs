//! Ordered id to value store with splice tracking.

use indexmap::IndexMap;
use tracing::trace;

use crate::native::Value;

/// One batched replacement of a range of ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Splice {
    /// First replaced position.
    pub position: usize,
    /// Number of ids removed at `position`.
    pub removals: usize,
    /// Ids inserted at `position`.
    pub additions: Vec<String>,
}

/// Items in presentation order, plus the order last handed to the native model.
///
/// Mutations apply to the pending order immediately; [`ListStore::take_splice`] produces the
/// single splice that brings the native model up to date. Removed ids leave a tombstone that
/// is invisible to every accessor and swept in one pass by the next splice.
#[derive(Debug, Default, Clone)]
pub struct ListStore {
    items: IndexMap<String, Option<Value>>,
    tombstones: usize,
    synced: Vec<String>,
}

impl ListStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an item. An existing id keeps its position and takes the new value.
    pub fn add_item(&mut self, id: impl Into<String>, value: Value) {
        let id = id.into();
        if let Some(Some(existing)) = self.items.get_mut(&id) {
            trace!(id = %id, "add of an existing id updates it in place");
            *existing = value;
            return;
        }
        self.forget(&id);
        self.items.insert(id, Some(value));
    }

    /// Inserts an item before `before`, or appends it when `before` is unknown. An existing id
    /// is moved.
    pub fn insert_item_before(&mut self, id: impl Into<String>, value: Value, before: Option<&str>) {
        let id = id.into();
        self.forget(&id);
        let anchor = before
            .and_then(|before| self.items.get_full(before))
            .and_then(|(index, _, value)| value.is_some().then_some(index));
        match anchor {
            Some(index) => {
                self.items.shift_insert(index, id, Some(value));
            }
            None => {
                if let Some(before) = before {
                    trace!(id = %id, before, "unknown anchor; appending");
                }
                self.items.insert(id, Some(value));
            }
        }
    }

    /// Removes an item. Unknown ids are ignored.
    pub fn remove_item(&mut self, id: &str) -> Option<Value> {
        let removed = self.items.get_mut(id).and_then(Option::take);
        match removed {
            Some(_) => self.tombstones += 1,
            None => trace!(id, "remove of an unknown id ignored"),
        }
        removed
    }

    /// Replaces the value of an item without moving it. Returns `false` for unknown ids.
    pub fn update_item(&mut self, id: &str, value: Value) -> bool {
        match self.items.get_mut(id).and_then(Option::as_mut) {
            Some(existing) => {
                *existing = value;
                true
            }
            None => {
                trace!(id, "update of an unknown id ignored");
                false
            }
        }
    }

    /// Returns the value of an item.
    #[must_use]
    pub fn get_item(&self, id: &str) -> Option<&Value> {
        self.items.get(id).and_then(Option::as_ref)
    }

    /// Returns the position of an item.
    #[must_use]
    pub fn position(&self, id: &str) -> Option<usize> {
        if self.tombstones == 0 {
            return self.items.get_index_of(id);
        }
        self.ids().position(|candidate| candidate == id)
    }

    /// Iterates over ids in presentation order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.items
            .iter()
            .filter(|(_, value)| value.is_some())
            .map(|(id, _)| id.as_str())
    }

    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len() - self.tombstones
    }

    /// Returns `true` if the store holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops the entry of `id`, live or tombstoned.
    fn forget(&mut self, id: &str) {
        if matches!(self.items.shift_remove(id), Some(None)) {
            self.tombstones -= 1;
        }
    }

    /// Sweeps tombstones in a single pass.
    fn compact(&mut self) {
        if self.tombstones > 0 {
            self.items.retain(|_, value| value.is_some());
            self.tombstones = 0;
        }
    }

    /// Returns the splice turning the last synced order into the current one, trimming the
    /// common prefix and suffix, and marks the current order as synced.
    pub fn take_splice(&mut self) -> Option<Splice> {
        self.compact();
        let current: Vec<String> = self.items.keys().cloned().collect();
        let previous = core::mem::replace(&mut self.synced, current);
        let current = &self.synced;

        let prefix = previous
            .iter()
            .zip(current)
            .take_while(|(old, new)| old == new)
            .count();
        let suffix = previous[prefix..]
            .iter()
            .rev()
            .zip(current[prefix..].iter().rev())
            .take_while(|(old, new)| old == new)
            .count();

        let removals = previous.len() - prefix - suffix;
        let additions = current[prefix..current.len() - suffix].to_vec();
        if removals == 0 && additions.is_empty() {
            return None;
        }
        Some(Splice {
            position: prefix,
            removals,
            additions,
        })
    }
}
