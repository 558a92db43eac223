//! A [`ListStore`] bound to a native string list model.

use core::cell::RefCell;
use core::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, error};

use crate::Result;
use crate::config::FlushPolicy;
use crate::native::{NativeHandle, Value};
use crate::runtime::Runtime;
use crate::scheduler::{self, DeferredAction, Priority};

use super::store::ListStore;

/// Ordered items mirrored into a native list model.
///
/// Mutations are visible through the accessors immediately. The native model catches up once per
/// commit, through a single low-priority splice covering every mutation made since the last sync.
pub struct ListModel {
    handle: NativeHandle,
    runtime: Rc<Runtime>,
    store: RefCell<ListStore>,
    sync: Rc<DeferredAction>,
}

impl fmt::Debug for ListModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListModel")
            .field("handle", &self.handle)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl ListModel {
    /// Constructs the native model.
    ///
    /// # Errors
    ///
    /// Fails when the toolkit cannot construct a `GtkStringList`.
    pub fn new(runtime: &Rc<Runtime>) -> Result<Rc<Self>> {
        let handle = runtime.toolkit().construct("GtkStringList")?;
        Ok(Rc::new_cyclic(|model: &Weak<Self>| {
            let model = model.clone();
            let sync = DeferredAction::new(Priority::Low, "sync list model", move || {
                let Some(model) = model.upgrade() else {
                    return;
                };
                if let Err(error) = model.sync() {
                    error!(model = %model.handle, %error, "list model sync failed");
                }
            });
            Self {
                handle,
                runtime: Rc::clone(runtime),
                store: RefCell::new(ListStore::new()),
                sync,
            }
        }))
    }

    /// The native model.
    #[must_use]
    pub const fn handle(&self) -> NativeHandle {
        self.handle
    }

    /// Appends an item, or updates it in place if the id exists.
    pub fn add_item(&self, id: impl Into<String>, value: Value) {
        self.store.borrow_mut().add_item(id, value);
        self.changed();
    }

    /// Inserts or moves an item before `before`; unknown anchors append.
    pub fn insert_item_before(&self, id: impl Into<String>, value: Value, before: Option<&str>) {
        self.store.borrow_mut().insert_item_before(id, value, before);
        self.changed();
    }

    /// Removes an item. Unknown ids are ignored.
    pub fn remove_item(&self, id: &str) -> Option<Value> {
        let removed = self.store.borrow_mut().remove_item(id);
        if removed.is_some() {
            self.changed();
        }
        removed
    }

    /// Replaces an item's value in place. Returns `false` for unknown ids.
    pub fn update_item(&self, id: &str, value: Value) -> bool {
        self.store.borrow_mut().update_item(id, value)
    }

    /// Returns an item's current value.
    #[must_use]
    pub fn get_item(&self, id: &str) -> Option<Value> {
        self.store.borrow().get_item(id).cloned()
    }

    /// The ids in presentation order.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.store.borrow().ids().map(str::to_owned).collect()
    }

    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.borrow().len()
    }

    /// Returns `true` if the model holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.borrow().is_empty()
    }

    /// Returns `true` while a native sync is pending.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.sync.is_scheduled()
    }

    /// Pushes pending order changes to the native model as one splice.
    ///
    /// # Errors
    ///
    /// Returns an error when the toolkit rejects the splice.
    pub fn sync(&self) -> Result<()> {
        let splice = self.store.borrow_mut().take_splice();
        let Some(splice) = splice else {
            return Ok(());
        };
        debug!(
            model = %self.handle,
            position = splice.position,
            removals = splice.removals,
            additions = splice.additions.len(),
            "splicing list model"
        );
        self.runtime.toolkit().splice(
            self.handle,
            splice.position,
            splice.removals,
            &splice.additions,
        )?;
        Ok(())
    }

    fn changed(&self) {
        scheduler::schedule(&self.sync);
        if self.runtime.config().flush == FlushPolicy::Idle && !scheduler::is_flushing() {
            scheduler::flush_soon(self.runtime.toolkit());
        }
    }
}
