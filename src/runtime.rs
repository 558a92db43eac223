//! The per-thread bridge instance.
//!
//! [`start`] binds a toolkit to the current thread: it resets the thread-local registry, signal
//! store and scheduler, registers a wrapper class for every catalog entry and installs logging.
//! [`stop`] releases it again. Nodes and roots keep the [`Runtime`] they were created with.

use core::cell::RefCell;
use core::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::config::Config;
use crate::native::Toolkit;
use crate::node::NodeFactory;
use crate::{logging, registry, scheduler, signal};

/// A toolkit bound to the current thread with its node classes and configuration.
pub struct Runtime {
    toolkit: Rc<dyn Toolkit>,
    factory: NodeFactory,
    config: Config,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("factory", &self.factory)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Runtime {
    /// The native toolkit.
    #[must_use]
    pub fn toolkit(&self) -> &Rc<dyn Toolkit> {
        &self.toolkit
    }

    /// The node classes elements are matched against.
    #[must_use]
    pub const fn factory(&self) -> &NodeFactory {
        &self.factory
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }
}

thread_local! {
    static CURRENT: RefCell<Option<Rc<Runtime>>> = const { RefCell::new(None) };
}

/// Starts the bridge on this thread with the built-in node classes.
pub fn start(toolkit: Rc<dyn Toolkit>, config: Config) -> Rc<Runtime> {
    start_with_factory(toolkit, config, NodeFactory::builtin())
}

/// Starts the bridge on this thread with a custom node factory. A running instance is stopped
/// first.
pub fn start_with_factory(
    toolkit: Rc<dyn Toolkit>,
    config: Config,
    factory: NodeFactory,
) -> Rc<Runtime> {
    logging::init(&config);
    stop();

    for name in toolkit.catalog().names() {
        registry::register(name);
    }
    let runtime = Rc::new(Runtime {
        toolkit,
        factory,
        config,
    });
    CURRENT.with_borrow_mut(|current| *current = Some(Rc::clone(&runtime)));
    debug!(factory = ?runtime.factory, "runtime started");
    runtime
}

/// Stops the bridge on this thread, dropping pending actions and every signal binding
/// bookkeeping entry.
pub fn stop() {
    let previous = CURRENT.with_borrow_mut(Option::take);
    scheduler::reset();
    signal::reset();
    registry::reset();
    if previous.is_some() {
        debug!("runtime stopped");
    }
}

/// The runtime started on this thread, if any.
#[must_use]
pub fn current() -> Option<Rc<Runtime>> {
    CURRENT.with_borrow(Clone::clone)
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::{current, start, stop};
    use crate::config::Config;
    use crate::native::headless::HeadlessToolkit;
    use crate::registry;

    #[test]
    fn start_registers_catalog_classes() {
        let runtime = start(Rc::new(HeadlessToolkit::new()), Config::default());
        assert!(registry::is_registered("GtkBox"));
        assert!(registry::is_registered("GtkListItem"));
        assert!(current().is_some_and(|current| Rc::ptr_eq(&current, &runtime)));
        stop();
        assert!(current().is_none());
        assert!(!registry::is_registered("GtkBox"));
    }
}
