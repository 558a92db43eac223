//! Translation of virtual-tree diffs into node tree mutations.
//!
//! [`HostConfig`] is the contract a differ drives: create instances, wire up children, apply
//! property updates, run mount work and delete instances. [`Adapter`] implements it over the
//! [`node`](crate::node) tree and the [`scheduler`](crate::scheduler), and [`Root`] is the
//! built-in keyed differ that uses it.

mod root;

use std::rc::Rc;

use tracing::trace;

use crate::Result;
use crate::element::Props;
use crate::node::Node;
use crate::runtime::Runtime;
use crate::scheduler;

pub use root::Root;

/// Operations a differ issues while committing a render pass.
///
/// Tree mutations only touch the node tree. Native work they need is deferred and runs in
/// [`HostConfig::reset_after_commit`].
pub trait HostConfig {
    /// Creates the instance for an element.
    ///
    /// # Errors
    ///
    /// Fails for unknown element types or invalid initial properties.
    fn create_instance(&self, type_name: &str, props: &Props) -> Result<Node>;

    /// Adds a child to an instance that is still being built.
    ///
    /// # Errors
    ///
    /// Fails when the parent does not admit the child.
    fn append_initial_child(&self, parent: &Node, child: &Node) -> Result<()>;

    /// Called once an instance has all its initial children. Returns `true` if the instance
    /// wants [`HostConfig::commit_mount`] after the commit.
    fn finalize_initial_children(&self, instance: &Node, props: &Props) -> bool;

    /// Appends a child to a committed instance.
    ///
    /// # Errors
    ///
    /// Fails when the parent does not admit the child.
    fn append_child(&self, parent: &Node, child: &Node) -> Result<()>;

    /// Appends a child to a root container.
    ///
    /// # Errors
    ///
    /// Fails when the container does not admit the child.
    fn append_child_to_container(&self, container: &Node, child: &Node) -> Result<()> {
        self.append_child(container, child)
    }

    /// Inserts or moves a child before `before`.
    ///
    /// # Errors
    ///
    /// Fails when the parent does not admit the child.
    fn insert_before(&self, parent: &Node, child: &Node, before: &Node) -> Result<()>;

    /// Inserts or moves a child of a root container before `before`.
    ///
    /// # Errors
    ///
    /// Fails when the container does not admit the child.
    fn insert_in_container_before(&self, container: &Node, child: &Node, before: &Node) -> Result<()> {
        self.insert_before(container, child, before)
    }

    /// Removes a child.
    fn remove_child(&self, parent: &Node, child: &Node);

    /// Removes a child of a root container.
    fn remove_child_from_container(&self, container: &Node, child: &Node) {
        self.remove_child(container, child);
    }

    /// Applies new properties.
    ///
    /// # Errors
    ///
    /// Fails when a property is invalid.
    fn commit_update(&self, instance: &Node, old: &Props, new: &Props) -> Result<()>;

    /// Runs mount work for an instance that asked for it.
    ///
    /// # Errors
    ///
    /// Fails when the toolkit rejects the mount work.
    fn commit_mount(&self, instance: &Node) -> Result<()>;

    /// Releases a deleted instance. Called for every instance of a deleted subtree, children
    /// first.
    fn detach_deleted_instance(&self, instance: &Node);

    /// Called before the first mutation of a commit.
    fn prepare_for_commit(&self) {}

    /// Called after the last mutation of a commit.
    fn reset_after_commit(&self);
}

/// [`HostConfig`] over the node tree.
#[derive(Debug, Clone)]
pub struct Adapter {
    runtime: Rc<Runtime>,
}

impl Adapter {
    /// Creates an adapter building nodes for `runtime`.
    #[must_use]
    pub const fn new(runtime: Rc<Runtime>) -> Self {
        Self { runtime }
    }

    /// The runtime nodes are built for.
    #[must_use]
    pub const fn runtime(&self) -> &Rc<Runtime> {
        &self.runtime
    }
}

impl HostConfig for Adapter {
    fn create_instance(&self, type_name: &str, props: &Props) -> Result<Node> {
        Node::create(&self.runtime, type_name, props)
    }

    fn append_initial_child(&self, parent: &Node, child: &Node) -> Result<()> {
        parent.append_child(child)
    }

    fn finalize_initial_children(&self, instance: &Node, _props: &Props) -> bool {
        instance.kind().needs_mount()
    }

    fn append_child(&self, parent: &Node, child: &Node) -> Result<()> {
        parent.append_child(child)
    }

    fn insert_before(&self, parent: &Node, child: &Node, before: &Node) -> Result<()> {
        parent.insert_before(child, Some(before))
    }

    fn remove_child(&self, parent: &Node, child: &Node) {
        parent.remove_child(child);
    }

    fn commit_update(&self, instance: &Node, old: &Props, new: &Props) -> Result<()> {
        instance.commit_update(old, new)
    }

    fn commit_mount(&self, instance: &Node) -> Result<()> {
        instance.commit_mount()
    }

    fn detach_deleted_instance(&self, instance: &Node) {
        instance.destroy();
    }

    fn prepare_for_commit(&self) {
        trace!(pending = scheduler::pending(), "commit started");
    }

    fn reset_after_commit(&self) {
        scheduler::flush();
    }
}
