//! Lifecycle of native signal connections owned by nodes.
//!
//! Bindings are keyed by `(target, event)` within their owning node. Each binding holds exactly
//! one native connection whose callback trampolines into a replaceable handler slot, so swapping
//! a handler on re-render never reconnects. Blockable bindings are suppressed while their owner
//! applies state programmatically.

use core::cell::RefCell;
use core::pin::Pin;
use core::task::{Context, Poll};
use std::collections::HashMap;
use std::rc::Rc;

use futures::channel::oneshot;

use tracing::trace;

use crate::Result;
use crate::native::{ConnectionId, NativeCallback, NativeHandle, Toolkit, Value};
use crate::node::NodeId;

/// A signal handler. The return value is handed back to the emitter.
pub type SignalHandler = Rc<dyn Fn(&[Value]) -> Option<Value>>;

/// Options of a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalOptions {
    /// Whether [`block`] suppresses the binding.
    pub blockable: bool,
}

impl Default for SignalOptions {
    fn default() -> Self {
        Self { blockable: true }
    }
}

impl SignalOptions {
    /// Options for a binding that always fires.
    #[must_use]
    pub const fn unblockable() -> Self {
        Self { blockable: false }
    }
}

thread_local! {
    static STORE: RefCell<Store> = RefCell::new(Store::default());
}

#[derive(Default)]
struct Store {
    owners: HashMap<NodeId, Owner>,
}

#[derive(Default)]
struct Owner {
    bindings: HashMap<(NativeHandle, String), Binding>,
    once: Vec<(NativeHandle, ConnectionId)>,
    blocked: u32,
}

struct Binding {
    connection: ConnectionId,
    handler: Rc<RefCell<SignalHandler>>,
    blockable: bool,
}

fn trampoline(slot: &Rc<RefCell<SignalHandler>>) -> NativeCallback {
    let slot = Rc::downgrade(slot);
    Rc::new(move |args: &[Value]| {
        let handler = slot.upgrade()?.borrow().clone();
        handler(args)
    })
}

/// Binds, rebinds or unbinds the handler of `event` on `target` for `owner`.
///
/// `None` disconnects. A handler for an existing key replaces the previous one through the same
/// native connection; only a change of [`SignalOptions::blockable`] reconnects.
///
/// # Errors
///
/// Returns an error if the toolkit refuses the connection.
pub fn set(
    toolkit: &dyn Toolkit,
    owner: NodeId,
    target: NativeHandle,
    event: &str,
    handler: Option<SignalHandler>,
    options: SignalOptions,
) -> Result<()> {
    let key = (target, event.to_owned());
    let Some(handler) = handler else {
        let removed = STORE.with_borrow_mut(|store| {
            store
                .owners
                .get_mut(&owner)
                .and_then(|entry| entry.bindings.remove(&key))
        });
        match removed {
            Some(binding) => toolkit.disconnect(target, binding.connection),
            None => trace!(%owner, event, "no binding to remove"),
        }
        return Ok(());
    };

    let existing = STORE.with_borrow(|store| {
        store
            .owners
            .get(&owner)
            .and_then(|entry| entry.bindings.get(&key))
            .map(|binding| (binding.handler.clone(), binding.blockable))
    });
    if let Some((slot, blockable)) = existing {
        if blockable == options.blockable {
            *slot.borrow_mut() = handler;
            return Ok(());
        }
        set(toolkit, owner, target, event, None, options)?;
    }

    let slot = Rc::new(RefCell::new(handler));
    let connection = toolkit.connect(target, event, trampoline(&slot))?;
    let blocked = STORE.with_borrow_mut(|store| {
        let entry = store.owners.entry(owner).or_default();
        entry.bindings.insert(
            key,
            Binding {
                connection,
                handler: slot,
                blockable: options.blockable,
            },
        );
        entry.blocked > 0
    });
    if blocked && options.blockable {
        toolkit.block(target, connection);
    }
    Ok(())
}

/// Disconnects every binding owned by `owner`. Calling it again is a no-op.
pub fn clear(toolkit: &dyn Toolkit, owner: NodeId) {
    let Some(entry) = STORE.with_borrow_mut(|store| store.owners.remove(&owner)) else {
        trace!(%owner, "bindings already cleared");
        return;
    };
    for ((target, _), binding) in entry.bindings {
        toolkit.disconnect(target, binding.connection);
    }
    for (target, connection) in entry.once {
        toolkit.disconnect(target, connection);
    }
}

fn blockable_connections(owner: NodeId) -> Vec<(NativeHandle, ConnectionId)> {
    STORE.with_borrow(|store| {
        store.owners.get(&owner).map_or_else(Vec::new, |entry| {
            entry
                .bindings
                .iter()
                .filter(|(_, binding)| binding.blockable)
                .map(|((target, _), binding)| (*target, binding.connection))
                .collect()
        })
    })
}

/// Suppresses every blockable binding of `owner`. Nests.
pub fn block(toolkit: &dyn Toolkit, owner: NodeId) {
    let depth = STORE.with_borrow_mut(|store| {
        let entry = store.owners.entry(owner).or_default();
        entry.blocked += 1;
        entry.blocked
    });
    if depth == 1 {
        for (target, connection) in blockable_connections(owner) {
            toolkit.block(target, connection);
        }
    }
}

/// Lifts one [`block`].
pub fn unblock(toolkit: &dyn Toolkit, owner: NodeId) {
    let depth = STORE.with_borrow_mut(|store| {
        store.owners.get_mut(&owner).map(|entry| {
            entry.blocked = entry.blocked.saturating_sub(1);
            entry.blocked
        })
    });
    if depth == Some(0) {
        for (target, connection) in blockable_connections(owner) {
            toolkit.unblock(target, connection);
        }
    }
}

/// Runs `f` with the blockable bindings of `owner` suppressed.
pub fn with_blocked<R>(toolkit: &dyn Toolkit, owner: NodeId, f: impl FnOnce() -> R) -> R {
    block(toolkit, owner);
    let result = f();
    unblock(toolkit, owner);
    result
}

/// Number of live native connections owned by `owner`.
#[must_use]
pub fn connection_count(owner: NodeId) -> usize {
    STORE.with_borrow(|store| {
        store
            .owners
            .get(&owner)
            .map_or(0, |entry| entry.bindings.len() + entry.once.len())
    })
}

/// Forgets every binding without touching the toolkit.
pub fn reset() {
    STORE.with_borrow_mut(|store| store.owners.clear());
}

/// Future resolving with the arguments of the next emission of a signal.
///
/// Resolves to `None` if the binding is cleared before the signal fires.
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct Emission {
    receiver: oneshot::Receiver<Vec<Value>>,
}

impl Future for Emission {
    type Output = Option<Vec<Value>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver).poll(cx).map(|result| result.ok())
    }
}

/// Waits for the next emission of `event` on `target`.
///
/// The binding is unblockable, owned by `owner`, and disconnects itself after firing once.
///
/// # Errors
///
/// Returns an error if the toolkit refuses the connection.
pub fn next_emission(
    toolkit: &Rc<dyn Toolkit>,
    owner: NodeId,
    target: NativeHandle,
    event: &str,
) -> Result<Emission> {
    let (sender, receiver) = oneshot::channel();
    let sender = RefCell::new(Some(sender));
    let connection_slot: Rc<RefCell<Option<ConnectionId>>> = Rc::default();
    let weak_toolkit = Rc::downgrade(toolkit);

    let callback: NativeCallback = {
        let connection_slot = connection_slot.clone();
        Rc::new(move |args: &[Value]| {
            if let Some(sender) = sender.borrow_mut().take() {
                let _ = sender.send(args.to_vec());
            }
            let connection = connection_slot.borrow_mut().take();
            if let (Some(connection), Some(toolkit)) = (connection, weak_toolkit.upgrade()) {
                STORE.with_borrow_mut(|store| {
                    if let Some(entry) = store.owners.get_mut(&owner) {
                        entry.once.retain(|(_, id)| *id != connection);
                    }
                });
                toolkit.disconnect(target, connection);
            }
            None
        })
    };

    let connection = toolkit.connect(target, event, callback)?;
    *connection_slot.borrow_mut() = Some(connection);
    STORE.with_borrow_mut(|store| {
        store
            .owners
            .entry(owner)
            .or_default()
            .once
            .push((target, connection));
    });
    Ok(Emission { receiver })
}
