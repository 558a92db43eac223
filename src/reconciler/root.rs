use core::fmt;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, error};

use crate::Result;
use crate::element::{Element, Props};
use crate::native::NativeHandle;
use crate::node::Node;
use crate::runtime::Runtime;

use super::{Adapter, HostConfig};

/// A committed element and the node it produced.
struct Fiber {
    type_name: String,
    key: Option<String>,
    props: Props,
    node: Node,
    children: Vec<Self>,
}

#[derive(PartialEq, Eq, Hash)]
enum FiberKey {
    Explicit(String),
    Index(usize),
}

impl FiberKey {
    fn of(key: Option<&str>, index: usize) -> Self {
        key.map_or(Self::Index(index), |key| Self::Explicit(key.to_owned()))
    }
}

struct Placed {
    fiber: Fiber,
    old_index: Option<usize>,
}

struct Commit<'h, H: HostConfig + ?Sized> {
    host: &'h H,
    mounts: Vec<Node>,
}

impl<H: HostConfig + ?Sized> Commit<'_, H> {
    fn reconcile_children(
        &mut self,
        parent: &Node,
        container: bool,
        old: Vec<Fiber>,
        elements: Vec<Element>,
    ) -> Result<Vec<Fiber>> {
        let index: HashMap<FiberKey, usize> = old
            .iter()
            .enumerate()
            .map(|(position, fiber)| (FiberKey::of(fiber.key.as_deref(), position), position))
            .collect();
        let mut old: Vec<Option<Fiber>> = old.into_iter().map(Some).collect();

        let mut matched = Vec::with_capacity(elements.len());
        for (position, element) in elements.iter().enumerate() {
            let key = FiberKey::of(element.key.as_deref(), position);
            let found = index.get(&key).copied().filter(|&at| {
                old[at]
                    .as_ref()
                    .is_some_and(|fiber| fiber.type_name == element.type_name)
            });
            matched.push(found.and_then(|at| old[at].take().map(|fiber| (at, fiber))));
        }

        for fiber in old.into_iter().flatten() {
            if container {
                self.host.remove_child_from_container(parent, &fiber.node);
            } else {
                self.host.remove_child(parent, &fiber.node);
            }
            self.delete(fiber);
        }

        let mut next: Vec<Placed> = Vec::with_capacity(elements.len());
        for (element, matched) in elements.into_iter().zip(matched) {
            let result = match matched {
                Some((old_index, fiber)) => self.update(fiber, element).map(|fiber| Placed {
                    fiber,
                    old_index: Some(old_index),
                }),
                None => self.create(element).map(|fiber| Placed {
                    fiber,
                    old_index: None,
                }),
            };
            match result {
                Ok(placed) => next.push(placed),
                Err(error) => {
                    self.abandon(next);
                    return Err(error);
                }
            }
        }

        let mut last_placed = 0;
        let moves: Vec<bool> = next
            .iter()
            .map(|placed| match placed.old_index {
                Some(old_index) if old_index >= last_placed => {
                    last_placed = old_index;
                    false
                }
                _ => true,
            })
            .collect();

        let mut before: Option<Node> = None;
        let mut failure = None;
        for (position, placed) in next.iter().enumerate().rev() {
            let node = &placed.fiber.node;
            if moves[position] {
                let result = match (&before, container) {
                    (Some(before), true) => {
                        self.host.insert_in_container_before(parent, node, before)
                    }
                    (Some(before), false) => self.host.insert_before(parent, node, before),
                    (None, true) => self.host.append_child_to_container(parent, node),
                    (None, false) => self.host.append_child(parent, node),
                };
                if let Err(error) = result {
                    failure = Some(error);
                    break;
                }
            }
            before = Some(node.clone());
        }
        if let Some(error) = failure {
            self.abandon(next);
            return Err(error);
        }

        Ok(next.into_iter().map(|placed| placed.fiber).collect())
    }

    fn update(&mut self, fiber: Fiber, element: Element) -> Result<Fiber> {
        self.host
            .commit_update(&fiber.node, &fiber.props, &element.props)?;
        let children =
            self.reconcile_children(&fiber.node, false, fiber.children, element.children)?;
        Ok(Fiber {
            type_name: element.type_name,
            key: element.key,
            props: element.props,
            node: fiber.node,
            children,
        })
    }

    fn create(&mut self, element: Element) -> Result<Fiber> {
        let node = self
            .host
            .create_instance(&element.type_name, &element.props)?;
        let mut fiber = Fiber {
            type_name: element.type_name,
            key: element.key,
            props: element.props,
            node,
            children: Vec::with_capacity(element.children.len()),
        };
        for child in element.children {
            let child = match self.create(child) {
                Ok(child) => child,
                Err(error) => {
                    self.delete(fiber);
                    return Err(error);
                }
            };
            if let Err(error) = self.host.append_initial_child(&fiber.node, &child.node) {
                self.delete(child);
                self.delete(fiber);
                return Err(error);
            }
            fiber.children.push(child);
        }
        if self
            .host
            .finalize_initial_children(&fiber.node, &fiber.props)
        {
            self.mounts.push(fiber.node.clone());
        }
        Ok(fiber)
    }

    /// Deletes a removed subtree, children first.
    fn delete(&self, fiber: Fiber) {
        for child in fiber.children {
            self.delete(child);
        }
        self.host.detach_deleted_instance(&fiber.node);
    }

    /// Drops the fibers created by a commit that failed before placing them.
    fn abandon(&self, next: Vec<Placed>) {
        for placed in next {
            if placed.old_index.is_none() && placed.fiber.node.parent().is_none() {
                self.delete(placed.fiber);
            }
        }
    }
}

fn detach_subtree<H: HostConfig + ?Sized>(host: &H, node: &Node) {
    for child in node.children() {
        detach_subtree(host, &child);
    }
    host.detach_deleted_instance(node);
}

/// An independent reconciliation root.
///
/// A root keeps the element tree of its last commit and diffs every new render against it:
/// children are matched by explicit key, otherwise by position, and must keep their type to
/// be reused. Each render is one commit that ends with a flush of deferred native work.
///
/// A commit aborted by an error is not rolled back. The root logs the error, and its next
/// render tears down everything it committed and mounts from scratch.
pub struct Root {
    id: String,
    adapter: Adapter,
    container: Node,
    fibers: Vec<Fiber>,
    failed: bool,
}

impl fmt::Debug for Root {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Root")
            .field("id", &self.id)
            .field("container", &self.container)
            .field("failed", &self.failed)
            .finish_non_exhaustive()
    }
}

impl Root {
    /// Creates a standalone root, for toplevel windows and detached widgets.
    pub fn new(id: impl Into<String>, runtime: &Rc<Runtime>) -> Self {
        let id = id.into();
        let container = Node::detached_root(runtime, &format!("root {id}"));
        Self::with_container(id, runtime, container)
    }

    /// Creates a root rendering its single widget into `slot` of an existing native container.
    ///
    /// # Errors
    ///
    /// Fails when the container's type has no registered wrapper class.
    pub fn in_slot(
        id: impl Into<String>,
        runtime: &Rc<Runtime>,
        host: NativeHandle,
        slot: &str,
    ) -> Result<Self> {
        let container = Node::host(runtime, host, slot)?;
        Ok(Self::with_container(id.into(), runtime, container))
    }

    fn with_container(id: String, runtime: &Rc<Runtime>, container: Node) -> Self {
        Self {
            id,
            adapter: Adapter::new(Rc::clone(runtime)),
            container,
            fibers: Vec::new(),
            failed: false,
        }
    }

    /// The caller-supplied id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The container node committed children attach to.
    #[must_use]
    pub const fn container(&self) -> &Node {
        &self.container
    }

    /// The committed top-level nodes.
    #[must_use]
    pub fn nodes(&self) -> Vec<Node> {
        self.container.children()
    }

    /// Returns `true` if the last commit was aborted.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        self.failed
    }

    /// Commits `element` as the only top-level element.
    ///
    /// # Errors
    ///
    /// Returns the error that aborted the commit.
    pub fn render(&mut self, element: Element) -> Result<()> {
        self.render_many(vec![element])
    }

    /// Commits `elements` as the top-level elements.
    ///
    /// # Errors
    ///
    /// Returns the error that aborted the commit. Deferred native work queued before the error
    /// still runs.
    pub fn render_many(&mut self, elements: Vec<Element>) -> Result<()> {
        if self.failed {
            debug!(root = %self.id, "rebuilding failed root");
            self.teardown();
            self.failed = false;
        }

        self.adapter.prepare_for_commit();
        let old = core::mem::take(&mut self.fibers);
        let mut commit = Commit {
            host: &self.adapter,
            mounts: Vec::new(),
        };
        let result = commit.reconcile_children(&self.container, true, old, elements);
        let mounts = commit.mounts;
        let result = match result {
            Ok(fibers) => {
                self.fibers = fibers;
                Ok(())
            }
            Err(error) => {
                error!(root = %self.id, %error, "commit aborted");
                self.failed = true;
                Err(error)
            }
        };
        self.adapter.reset_after_commit();

        let mut mounted = false;
        for node in mounts.iter().filter(|node| !node.is_destroyed()) {
            if let Err(error) = self.adapter.commit_mount(node) {
                error!(root = %self.id, node = %node.id(), %error, "mount failed");
            }
            mounted = true;
        }
        if mounted {
            self.adapter.reset_after_commit();
        }
        debug!(root = %self.id, top_level = self.fibers.len(), "committed");
        result
    }

    /// Removes everything the root committed and flushes.
    pub fn unmount(&mut self) {
        self.teardown();
        self.failed = false;
        self.adapter.reset_after_commit();
    }

    fn teardown(&mut self) {
        self.fibers.clear();
        for child in self.container.children() {
            self.adapter
                .remove_child_from_container(&self.container, &child);
            detach_subtree(&self.adapter, &child);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::Root;
    use crate::config::Config;
    use crate::element::Element;
    use crate::native::Toolkit;
    use crate::native::headless::HeadlessToolkit;
    use crate::runtime;

    fn labels(ids: &[&str]) -> Element {
        Element::new("GtkBox").children(
            ids.iter()
                .map(|id| Element::new("GtkLabel").key(*id).prop("label", *id)),
        )
    }

    fn native_labels(toolkit: &HeadlessToolkit, root: &Root) -> Vec<String> {
        let Some(container) = root.nodes().first().and_then(|node| node.handle()) else {
            return Vec::new();
        };
        toolkit
            .children(container)
            .into_iter()
            .filter_map(|child| toolkit.property(child, "label"))
            .filter_map(|label| label.as_str().map(str::to_owned))
            .collect()
    }

    #[test]
    fn keyed_children_keep_their_nodes_across_reorders() {
        let toolkit = Rc::new(HeadlessToolkit::new());
        let runtime = runtime::start(toolkit.clone(), Config::default());
        let mut root = Root::new("main", &runtime);

        root.render(labels(&["a", "b", "c"])).unwrap();
        let before = root.nodes()[0].children();
        assert_eq!(native_labels(&toolkit, &root), ["a", "b", "c"]);

        root.render(labels(&["c", "a", "b"])).unwrap();
        let after = root.nodes()[0].children();
        assert_eq!(after[0], before[2]);
        assert_eq!(after[1], before[0]);
        assert_eq!(native_labels(&toolkit, &root), ["c", "a", "b"]);
        runtime::stop();
    }

    #[test]
    fn type_changes_replace_the_node() {
        let toolkit = Rc::new(HeadlessToolkit::new());
        let runtime = runtime::start(toolkit.clone(), Config::default());
        let mut root = Root::new("main", &runtime);

        root.render(Element::new("GtkLabel")).unwrap();
        let label = root.nodes()[0].clone();
        root.render(Element::new("GtkButton")).unwrap();
        assert!(label.is_destroyed());
        assert_eq!(root.nodes()[0].type_name(), "GtkButton");
        assert!(label.handle().is_some_and(|handle| !toolkit.is_alive(handle)));
        runtime::stop();
    }

    #[test]
    fn unmount_destroys_committed_widgets() {
        let toolkit = Rc::new(HeadlessToolkit::new());
        let runtime = runtime::start(toolkit.clone(), Config::default());
        let mut root = Root::new("main", &runtime);
        root.render(labels(&["a", "b"])).unwrap();
        assert_eq!(toolkit.object_count(), 3);
        root.unmount();
        assert!(root.nodes().is_empty());
        assert_eq!(toolkit.object_count(), 0);
        runtime::stop();
    }
}
