//! Identity registry between native objects and the wrappers that stand for them.
//!
//! The registry keeps at most one live [`Wrapper`] per native handle. Entries hold only a weak
//! reference: when the last strong reference to a wrapper is dropped, its finalizer purges the
//! entry, and a later [`resolve`] for the same handle builds a fresh wrapper. Logical removal of
//! a node never touches the registry.

use core::cell::RefCell;
use core::fmt;
use std::collections::{HashMap, HashSet};
use std::rc::{Rc, Weak};

use tracing::trace;

use crate::native::{NativeError, NativeHandle, Toolkit};
use crate::{Error, Result};

thread_local! {
    static REGISTRY: RefCell<Registry> = RefCell::new(Registry::default());
}

#[derive(Default)]
struct Registry {
    classes: HashSet<String>,
    entries: HashMap<u64, Entry>,
    next_serial: u64,
}

struct Entry {
    wrapper: Weak<WrapperInner>,
    serial: u64,
}

struct WrapperInner {
    handle: NativeHandle,
    class: String,
    serial: u64,
}

impl Drop for WrapperInner {
    fn drop(&mut self) {
        finalize(self.handle, self.serial);
    }
}

/// The unique live wrapper of a native object.
///
/// Clones share identity; compare with [`Wrapper::ptr_eq`].
#[derive(Clone)]
pub struct Wrapper(Rc<WrapperInner>);

impl Wrapper {
    /// The wrapped native object.
    #[must_use]
    pub fn handle(&self) -> NativeHandle {
        self.0.handle
    }

    /// The registered class the handle resolved to.
    #[must_use]
    pub fn class_name(&self) -> &str {
        &self.0.class
    }

    /// Monotonic construction number; differs between successive wrappers of one handle.
    #[must_use]
    pub fn serial(&self) -> u64 {
        self.0.serial
    }

    /// Returns `true` if both are the same wrapper instance.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Wrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wrapper")
            .field("handle", &self.0.handle)
            .field("class", &self.0.class)
            .field("serial", &self.0.serial)
            .finish()
    }
}

/// Registers a wrapper class by its native type name.
pub fn register(class: impl Into<String>) {
    REGISTRY.with_borrow_mut(|registry| {
        registry.classes.insert(class.into());
    });
}

/// Returns `true` if a wrapper class is registered under `class`.
#[must_use]
pub fn is_registered(class: &str) -> bool {
    REGISTRY.with_borrow(|registry| registry.classes.contains(class))
}

/// Returns the live wrapper for `handle`, if one exists.
#[must_use]
pub fn lookup(handle: NativeHandle) -> Option<Wrapper> {
    REGISTRY.with_borrow(|registry| {
        registry
            .entries
            .get(&handle.raw())
            .and_then(|entry| entry.wrapper.upgrade())
            .map(Wrapper)
    })
}

/// Returns the wrapper for `handle`, creating one if none is alive.
///
/// A registered `hint` is used as the class directly. Otherwise the handle's runtime type and
/// its parents are walked until a registered class is found.
///
/// # Errors
///
/// Returns [`Error::UnregisteredType`] when no class in the type chain is registered.
pub fn resolve(toolkit: &dyn Toolkit, handle: NativeHandle, hint: Option<&str>) -> Result<Wrapper> {
    if let Some(existing) = lookup(handle) {
        return Ok(existing);
    }

    let class = match hint.filter(|hint| is_registered(hint)) {
        Some(hint) => hint.to_owned(),
        None => registered_ancestor(toolkit, handle)?,
    };

    let wrapper = REGISTRY.with_borrow_mut(|registry| {
        registry.next_serial += 1;
        let serial = registry.next_serial;
        let inner = Rc::new(WrapperInner {
            handle,
            class,
            serial,
        });
        registry.entries.insert(
            handle.raw(),
            Entry {
                wrapper: Rc::downgrade(&inner),
                serial,
            },
        );
        Wrapper(inner)
    });
    trace!(%handle, class = wrapper.class_name(), "created wrapper");
    Ok(wrapper)
}

fn registered_ancestor(toolkit: &dyn Toolkit, handle: NativeHandle) -> Result<String> {
    let type_name = toolkit
        .type_name(handle)
        .ok_or(NativeError::Dead(handle))?;
    let mut current = Some(type_name.clone());
    while let Some(candidate) = current {
        if is_registered(&candidate) {
            return Ok(candidate);
        }
        current = toolkit.type_parent(&candidate);
    }
    Err(Error::UnregisteredType { handle, type_name })
}

/// Number of live registry entries.
#[must_use]
pub fn live_count() -> usize {
    REGISTRY.with_borrow(|registry| registry.entries.len())
}

/// Forgets every class and entry.
pub fn reset() {
    REGISTRY.with_borrow_mut(|registry| {
        registry.classes.clear();
        registry.entries.clear();
    });
}

fn finalize(handle: NativeHandle, serial: u64) {
    // The thread-local may already be gone during thread teardown.
    let _ = REGISTRY.try_with(|registry| {
        if let Ok(mut registry) = registry.try_borrow_mut() {
            let stale = registry
                .entries
                .get(&handle.raw())
                .is_some_and(|entry| entry.serial == serial);
            if stale {
                registry.entries.remove(&handle.raw());
                trace!(%handle, "finalized wrapper");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::{live_count, lookup, register, reset, resolve};
    use crate::Error;
    use crate::native::Toolkit;
    use crate::native::headless::HeadlessToolkit;

    #[test]
    fn resolve_returns_the_same_wrapper_until_collected() {
        reset();
        register("GtkWidget");
        let toolkit = HeadlessToolkit::new();
        let handle = toolkit.construct("GtkLabel").unwrap();

        let first = resolve(&toolkit, handle, None).unwrap();
        let second = resolve(&toolkit, handle, None).unwrap();
        assert!(first.ptr_eq(&second));
        assert_eq!(first.class_name(), "GtkWidget");

        let serial = first.serial();
        drop(first);
        drop(second);
        assert!(lookup(handle).is_none());
        assert_eq!(live_count(), 0);

        let third = resolve(&toolkit, handle, None).unwrap();
        assert_ne!(third.serial(), serial);
    }

    #[test]
    fn registered_hint_short_circuits() {
        reset();
        register("GtkBox");
        let toolkit = HeadlessToolkit::new();
        toolkit.define_type("Unrelated", "NothingRegistered");
        let handle = toolkit.construct("Unrelated").unwrap();
        let wrapper = resolve(&toolkit, handle, Some("GtkBox")).unwrap();
        assert_eq!(wrapper.class_name(), "GtkBox");
    }

    #[test]
    fn unregistered_chain_fails() {
        reset();
        let toolkit = HeadlessToolkit::new();
        let handle = toolkit.construct("GtkLabel").unwrap();
        let error = resolve(&toolkit, handle, Some("NotRegistered")).unwrap_err();
        assert!(matches!(error, Error::UnregisteredType { ref type_name, .. } if type_name == "GtkLabel"));
    }
}
