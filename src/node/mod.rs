//! Nodes bound to native widgets and the protocols that attach them.
//!
//! A [`Node`] mirrors one committed virtual element. Its children always follow the committed
//! virtual order, while the native tree catches up through deferred actions flushed at the end of
//! the commit. What a node does when children arrive or leave is decided by its [`NodeKind`],
//! picked by the [`NodeFactory`] from the element type and the widget class it resolves to.
//!
//! Virtual nodes have no native object of their own. They group or position their single child
//! inside the native parent (named slots, grid cells, fixed coordinates, list items).

mod factory;
pub mod positional;
pub mod slot;
pub mod widget;

use core::any::Any;
use core::cell::RefCell;
use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};
use std::rc::{Rc, Weak};

use tracing::{error, trace};

pub use factory::{Candidate, NodeClass, NodeFactory};

use crate::catalog::ClassInfo;
use crate::element::Props;
use crate::native::{NativeHandle, Toolkit, Value};
use crate::registry::{self, Wrapper};
use crate::runtime::Runtime;
use crate::scheduler::{self, DeferredAction, Priority};
use crate::signal::{self, SignalOptions};
use crate::{Error, Result};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier of a node, also the owner key of its signal bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u64);

impl NodeId {
    /// Allocates a fresh identifier.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw identifier.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Behaviour of one node variant.
///
/// Every hook has a default, so a kind only overrides the protocol it participates in.
/// Hooks that schedule native work must do so through the [`scheduler`], never synchronously.
pub trait NodeKind: Any {
    /// Validates `child` before it joins `node`. Rejects everything by default.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Structural`] when the container does not admit the child.
    fn accept(&self, node: &Node, child: &Node) -> Result<()> {
        Err(Error::structural(
            node.type_name(),
            child.type_name(),
            Vec::<String>::new(),
        ))
    }

    /// Validates `node` before it joins `parent`.
    ///
    /// # Errors
    ///
    /// Returns an error when the node cannot live under `parent`.
    fn attaching(&self, _node: &Node, _parent: &Node) -> Result<()> {
        Ok(())
    }

    /// Called after `child` was inserted or moved before `before` in the children of `node`.
    ///
    /// # Errors
    ///
    /// Returns an error when the insertion cannot be honoured.
    fn child_inserted(&self, _node: &Node, _child: &Node, _before: Option<&Node>) -> Result<()> {
        Ok(())
    }

    /// Called after `child` left the children of `node`.
    fn child_removed(&self, _node: &Node, _child: &Node) {}

    /// Called after `node` joined `parent`.
    ///
    /// # Errors
    ///
    /// Returns an error when the node cannot be attached.
    fn attached(&self, _node: &Node, _parent: &Node) -> Result<()> {
        Ok(())
    }

    /// Called after `node` left `parent`.
    fn detached(&self, _node: &Node, _parent: &Node) {}

    /// Called once the node exists, before its initial properties are applied.
    ///
    /// # Errors
    ///
    /// Returns an error when companion native objects cannot be created.
    fn created(&self, _node: &Node) -> Result<()> {
        Ok(())
    }

    /// Applies a property change.
    ///
    /// # Errors
    ///
    /// Returns an error when a property is invalid or the toolkit rejects it.
    fn update(&self, node: &Node, old: &Props, new: &Props) -> Result<()> {
        apply_props(node, old, new)
    }

    /// Whether [`NodeKind::mount`] should run once the node is placed.
    fn needs_mount(&self) -> bool {
        false
    }

    /// Runs after the commit that placed the node.
    ///
    /// # Errors
    ///
    /// Returns an error when the toolkit rejects the mount work.
    fn mount(&self, _node: &Node) -> Result<()> {
        Ok(())
    }

    /// Releases kind-specific resources. Signal bindings are already cleared.
    fn destroy(&self, _node: &Node) {}
}

#[derive(Default)]
struct NodeState {
    parent: Weak<NodeInner>,
    children: Vec<Node>,
    props: Props,
    destroyed: bool,
    mounted: bool,
}

struct NodeInner {
    id: NodeId,
    type_name: String,
    wrapper: Option<Wrapper>,
    class: Option<ClassInfo>,
    hosted: bool,
    runtime: Rc<Runtime>,
    kind: Box<dyn NodeKind>,
    state: RefCell<NodeState>,
}

/// A node of the committed tree. Clones share identity.
#[derive(Clone)]
pub struct Node(Rc<NodeInner>);

/// A non-owning reference to a [`Node`].
#[derive(Clone, Default)]
pub struct WeakNode(Weak<NodeInner>);

impl WeakNode {
    /// Returns the node if it is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Node> {
        self.0.upgrade().map(Node)
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Node {}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.0.id)
            .field("type_name", &self.0.type_name)
            .field("handle", &self.handle())
            .finish_non_exhaustive()
    }
}

impl Node {
    fn build(
        runtime: &Rc<Runtime>,
        type_name: String,
        wrapper: Option<Wrapper>,
        class: Option<ClassInfo>,
        hosted: bool,
        kind: Box<dyn NodeKind>,
    ) -> Self {
        Self(Rc::new(NodeInner {
            id: NodeId::next(),
            type_name,
            wrapper,
            class,
            hosted,
            runtime: runtime.clone(),
            kind,
            state: RefCell::new(NodeState::default()),
        }))
    }

    /// Creates the node for an element of `type_name`, constructing its native widget unless
    /// the selected node class is virtual, and applies the initial properties.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::UnknownElement`] when no node class matches, or with whatever the
    /// toolkit or the node kind report while initialising.
    pub fn create(runtime: &Rc<Runtime>, type_name: &str, props: &Props) -> Result<Self> {
        let toolkit = runtime.toolkit();
        let catalog = toolkit.catalog();
        let class = catalog.resolve(toolkit.as_ref(), type_name);
        let owner = type_name.split_once('.').and_then(|(owner, suffix)| {
            catalog
                .resolve(toolkit.as_ref(), owner)
                .map(|info| (info, suffix))
        });
        let candidate = Candidate {
            type_name,
            class: class.as_ref(),
            marker: owner.as_ref().map(|(info, suffix)| (info, *suffix)),
        };

        let node_class = runtime
            .factory()
            .select(&candidate)
            .ok_or_else(|| Error::UnknownElement(type_name.to_owned()))?;
        let kind = node_class.kind(runtime, &candidate)?;
        let wrapper = if node_class.is_virtual() {
            None
        } else {
            let handle = toolkit.construct(type_name)?;
            let hint = class.as_ref().map(|info| info.name.as_str());
            match registry::resolve(toolkit.as_ref(), handle, hint) {
                Ok(wrapper) => Some(wrapper),
                Err(error) => {
                    toolkit.destroy(handle);
                    return Err(error);
                }
            }
        };

        let node = Self::build(runtime, type_name.to_owned(), wrapper, class, false, kind);
        if let Err(error) = node.initialize(props) {
            node.destroy();
            return Err(error);
        }
        trace!(node = %node.id(), type_name, "created node");
        Ok(node)
    }

    fn initialize(&self, props: &Props) -> Result<()> {
        self.kind().created(self)?;
        self.kind().update(self, &Props::default(), props)?;
        self.0.state.borrow_mut().props = props.clone();
        Ok(())
    }

    /// Wraps an existing native container whose `slot` receives this node's single child.
    ///
    /// The native object stays owned by whoever created it and is never destroyed here.
    ///
    /// # Errors
    ///
    /// Fails when the handle's type has no registered wrapper class.
    pub fn host(runtime: &Rc<Runtime>, handle: NativeHandle, slot: &str) -> Result<Self> {
        let toolkit = runtime.toolkit();
        let wrapper = registry::resolve(toolkit.as_ref(), handle, None)?;
        let type_name = toolkit
            .type_name(handle)
            .unwrap_or_else(|| wrapper.class_name().to_owned());
        let class = toolkit.catalog().resolve(toolkit.as_ref(), &type_name);
        Ok(Self::build(
            runtime,
            type_name,
            Some(wrapper),
            class,
            true,
            Box::new(widget::SingleKind::new(slot)),
        ))
    }

    /// Creates a virtual container for standalone roots. It holds toplevel windows and any
    /// widget rendered without a native parent.
    #[must_use]
    pub fn detached_root(runtime: &Rc<Runtime>, name: &str) -> Self {
        Self::build(
            runtime,
            name.to_owned(),
            None,
            None,
            false,
            Box::new(widget::RootKind),
        )
    }

    /// The node identifier.
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.0.id
    }

    /// The element type this node was created for.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.0.type_name
    }

    /// The native widget, or `None` for virtual nodes.
    #[must_use]
    pub fn handle(&self) -> Option<NativeHandle> {
        self.0.wrapper.as_ref().map(Wrapper::handle)
    }

    /// The identity wrapper of the native widget.
    #[must_use]
    pub fn wrapper(&self) -> Option<&Wrapper> {
        self.0.wrapper.as_ref()
    }

    /// The catalog class the element type resolved to.
    #[must_use]
    pub fn class(&self) -> Option<&ClassInfo> {
        self.0.class.as_ref()
    }

    /// The runtime that created the node.
    #[must_use]
    pub fn runtime(&self) -> &Rc<Runtime> {
        &self.0.runtime
    }

    /// The native toolkit.
    #[must_use]
    pub fn toolkit(&self) -> &Rc<dyn Toolkit> {
        self.0.runtime.toolkit()
    }

    /// The node's behaviour.
    #[must_use]
    pub fn kind(&self) -> &dyn NodeKind {
        self.0.kind.as_ref()
    }

    /// Downcasts the node's behaviour.
    #[must_use]
    pub fn kind_as<T: NodeKind>(&self) -> Option<&T> {
        let kind: &dyn Any = self.0.kind.as_ref();
        kind.downcast_ref()
    }

    /// Returns `true` if the node has no native widget of its own.
    #[must_use]
    pub fn is_virtual(&self) -> bool {
        self.0.wrapper.is_none()
    }

    /// Returns `true` if the native object is owned elsewhere.
    #[must_use]
    pub fn is_hosted(&self) -> bool {
        self.0.hosted
    }

    /// Returns `true` once [`Node::destroy`] ran.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.0.state.borrow().destroyed
    }

    /// Returns `true` once [`Node::commit_mount`] ran.
    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.0.state.borrow().mounted
    }

    /// The parent node.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        self.0.state.borrow().parent.upgrade().map(Self)
    }

    /// The children in committed order.
    #[must_use]
    pub fn children(&self) -> Vec<Self> {
        self.0.state.borrow().children.clone()
    }

    /// The committed properties.
    #[must_use]
    pub fn props(&self) -> Props {
        self.0.state.borrow().props.clone()
    }

    /// The native widget that represents this node inside its parent: its own handle, or the
    /// widget of its first child for virtual nodes.
    #[must_use]
    pub fn widget(&self) -> Option<NativeHandle> {
        self.handle().or_else(|| {
            self.children()
                .iter()
                .filter(|child| !child.is_destroyed())
                .find_map(Self::widget)
        })
    }

    /// Returns a non-owning reference.
    #[must_use]
    pub fn downgrade(&self) -> WeakNode {
        WeakNode(Rc::downgrade(&self.0))
    }

    /// Appends `child`.
    ///
    /// # Errors
    ///
    /// See [`Node::insert_before`].
    pub fn append_child(&self, child: &Self) -> Result<()> {
        self.insert_before(child, None)
    }

    /// Inserts `child` before `before`, or last when `before` is `None` or not a child.
    ///
    /// Moving a child that is already attached here keeps it attached and only changes its
    /// position. A child attached elsewhere is removed from its previous parent first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Structural`] or [`Error::MissingCapability`] when the child is not
    /// admitted. Nothing is changed in that case.
    pub fn insert_before(&self, child: &Self, before: Option<&Self>) -> Result<()> {
        let reordering = child.parent().as_ref() == Some(self);
        if !reordering {
            self.kind().accept(self, child)?;
            child.kind().attaching(child, self)?;
            if let Some(previous) = child.parent() {
                previous.remove_child(child);
            }
        }

        {
            let mut state = self.0.state.borrow_mut();
            if reordering {
                state.children.retain(|candidate| candidate != child);
            }
            let index = before
                .and_then(|before| state.children.iter().position(|c| c == before))
                .unwrap_or(state.children.len());
            state.children.insert(index, child.clone());
        }

        if reordering {
            return self.kind().child_inserted(self, child, before);
        }
        child.0.state.borrow_mut().parent = Rc::downgrade(&self.0);
        self.kind().child_inserted(self, child, before)?;
        child.kind().attached(child, self)
    }

    /// Removes `child`. Removing a node that is not a child is a no-op.
    pub fn remove_child(&self, child: &Self) {
        let removed = {
            let mut state = self.0.state.borrow_mut();
            let index = state.children.iter().position(|c| c == child);
            index.map(|index| state.children.remove(index))
        };
        let Some(child) = removed else {
            trace!(parent = %self.id(), child = %child.id(), "remove of a non-child ignored");
            return;
        };
        child.0.state.borrow_mut().parent = Weak::new();
        self.kind().child_removed(self, &child);
        child.kind().detached(&child, self);
    }

    /// Applies new properties.
    ///
    /// # Errors
    ///
    /// Returns whatever the node kind reports for an invalid property.
    pub fn commit_update(&self, old: &Props, new: &Props) -> Result<()> {
        self.0.state.borrow_mut().props = new.clone();
        self.kind().update(self, old, new)
    }

    /// Runs the post-placement mount work once.
    ///
    /// # Errors
    ///
    /// Returns whatever the node kind reports.
    pub fn commit_mount(&self) -> Result<()> {
        let first = !core::mem::replace(&mut self.0.state.borrow_mut().mounted, true);
        if first {
            self.kind().mount(self)?;
        }
        Ok(())
    }

    /// Destroys this node: clears its signal bindings, releases kind resources and schedules
    /// the native widget for destruction once it has no native parent. Idempotent.
    pub fn destroy(&self) {
        if core::mem::replace(&mut self.0.state.borrow_mut().destroyed, true) {
            return;
        }
        signal::clear(self.toolkit().as_ref(), self.id());
        self.kind().destroy(self);

        if self.0.hosted {
            return;
        }
        if let Some(handle) = self.handle() {
            let toolkit = self.toolkit().clone();
            let wrapper = self.0.wrapper.clone();
            scheduler::defer(Priority::Low, "destroy widget", move || {
                if toolkit.is_alive(handle) && toolkit.parent(handle).is_none() {
                    toolkit.destroy(handle);
                }
                drop(wrapper);
            });
        }
    }

    /// Destroys the subtree rooted here, children first.
    pub fn destroy_subtree(&self) {
        for child in self.children() {
            child.destroy_subtree();
        }
        self.destroy();
    }

    /// Schedules a one-off native mutation for this node. It is skipped if the node is gone
    /// or destroyed by the time it runs; failures are logged.
    pub fn deferred(
        &self,
        priority: Priority,
        label: &'static str,
        f: impl FnOnce(&Self) -> Result<()> + 'static,
    ) {
        let node = self.downgrade();
        scheduler::defer(priority, label, move || {
            if let Some(node) = live(&node, label) {
                report(&node, label, f(&node));
            }
        });
    }

    /// Creates a reusable, coalescing native mutation for this node with the same skip and
    /// logging rules as [`Node::deferred`].
    #[must_use]
    pub fn action(
        &self,
        priority: Priority,
        label: &'static str,
        f: impl Fn(&Self) -> Result<()> + 'static,
    ) -> Rc<DeferredAction> {
        let node = self.downgrade();
        DeferredAction::new(priority, label, move || {
            if let Some(node) = live(&node, label) {
                report(&node, label, f(&node));
            }
        })
    }
}

fn live(node: &WeakNode, label: &'static str) -> Option<Node> {
    let node = node.upgrade()?;
    if node.is_destroyed() {
        trace!(node = %node.id(), label, "skipped action of destroyed node");
        return None;
    }
    Some(node)
}

fn report(node: &Node, label: &'static str, result: Result<()>) {
    if let Err(error) = result {
        error!(node = %node.id(), type_name = node.type_name(), label, %error, "native mutation failed");
    }
}

/// Applies property and handler differences to a node's native widget.
///
/// Property writes run with the node's blockable bindings suppressed, so programmatic state
/// does not echo back as user events. Handlers are rebound only when they changed.
///
/// # Errors
///
/// Returns an error when the toolkit rejects a write or a connection.
pub fn apply_props(node: &Node, old: &Props, new: &Props) -> Result<()> {
    let Some(handle) = node.handle() else {
        return Ok(());
    };
    let toolkit = node.toolkit().as_ref();

    signal::with_blocked(toolkit, node.id(), || -> Result<()> {
        for (name, value) in new.values() {
            if old.value(name) != Some(value) {
                toolkit.set_property(handle, name, value.clone())?;
            }
        }
        for (name, _) in old.values() {
            if new.value(name).is_none() {
                toolkit.set_property(handle, name, Value::Null)?;
            }
        }
        Ok(())
    })?;

    for (event, handler) in new.handlers() {
        let unchanged = old
            .handler(event)
            .is_some_and(|previous| Rc::as_ptr(previous).cast::<()>() == Rc::as_ptr(handler).cast::<()>());
        if !unchanged {
            signal::set(
                toolkit,
                node.id(),
                handle,
                event,
                Some(handler.clone()),
                SignalOptions::default(),
            )?;
        }
    }
    for (event, _) in old.handlers() {
        if new.handler(event).is_none() {
            signal::set(toolkit, node.id(), handle, event, None, SignalOptions::default())?;
        }
    }
    Ok(())
}

/// Converts a `snake_case` slot setter name to the `PascalCase` marker suffix.
#[must_use]
pub fn pascal_case(name: &str) -> String {
    name.split('_')
        .map(|part| {
            let mut chars = part.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect()
            })
        })
        .collect()
}

/// Converts a `PascalCase` marker suffix to the `snake_case` slot setter name.
#[must_use]
pub fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (index, ch) in name.chars().enumerate() {
        if ch.is_uppercase() {
            if index > 0 {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}
