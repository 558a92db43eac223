//! Structural categories of plain widgets.

use core::cell::OnceCell;
use std::rc::Rc;

use crate::catalog::{Capabilities, ClassInfo};
use crate::native::{ChildOp, NativeHandle, Toolkit, Value};
use crate::scheduler::{self, DeferredAction, Priority};
use crate::{Error, Result};

use super::slot::SlotKind;
use super::{Node, NodeKind, pascal_case};

/// Picks the structural category of a widget class.
#[must_use]
pub fn kind_for(class: &ClassInfo) -> Box<dyn NodeKind> {
    if class.capabilities.contains(Capabilities::APPEND) {
        return Box::new(OrderedKind::default());
    }
    if let Some(slot) = content_slot(class) {
        return Box::new(SingleKind::new(slot));
    }
    if !class.slots.is_empty() {
        return Box::new(SlotContainerKind);
    }
    Box::new(LeafKind)
}

/// The slot that receives a single-child container's content.
#[must_use]
pub fn content_slot(class: &ClassInfo) -> Option<&'static str> {
    ["content", "child"]
        .into_iter()
        .find(|slot| class.has_slot(slot))
}

fn reject(node: &Node, child: &Node) -> Error {
    Error::structural(node.type_name(), child.type_name(), Vec::<String>::new())
}

fn schedule_once(cell: &OnceCell<Rc<DeferredAction>>, init: impl FnOnce() -> Rc<DeferredAction>) {
    scheduler::schedule(cell.get_or_init(init));
}

/// Widgets without children.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeafKind;

impl NodeKind for LeafKind {}

/// Containers with an ordered child list: `append`, `insert_child_after`, `remove` and, when
/// declared, `reorder_child_after`.
#[derive(Default)]
pub struct OrderedKind {
    sync: OnceCell<Rc<DeferredAction>>,
}

impl NodeKind for OrderedKind {
    fn accept(&self, node: &Node, child: &Node) -> Result<()> {
        if child.is_virtual() {
            return Err(reject(node, child));
        }
        Ok(())
    }

    fn child_inserted(&self, node: &Node, _child: &Node, _before: Option<&Node>) -> Result<()> {
        schedule_once(&self.sync, || {
            node.action(Priority::Normal, "sync ordered children", sync_ordered)
        });
        Ok(())
    }

    fn child_removed(&self, node: &Node, child: &Node) {
        let (Some(parent), Some(widget)) = (node.handle(), child.handle()) else {
            return;
        };
        node.deferred(Priority::High, "remove child", move |node| {
            let toolkit = node.toolkit();
            if toolkit.parent(widget) == Some(parent) {
                toolkit.child_op(parent, ChildOp::Remove { child: widget })?;
            }
            Ok(())
        });
    }
}

fn sync_ordered(node: &Node) -> Result<()> {
    let Some(parent) = node.handle() else {
        return Ok(());
    };
    let toolkit = node.toolkit().as_ref();
    let capabilities = node
        .class()
        .map_or(Capabilities::NONE, |class| class.capabilities);
    let desired: Vec<NativeHandle> = node
        .children()
        .iter()
        .filter(|child| !child.is_destroyed())
        .filter_map(Node::widget)
        .collect();

    if !capabilities.intersects(Capabilities::REORDER | Capabilities::INSERT_AFTER) {
        return append_from_first_mismatch(toolkit, parent, &desired);
    }
    for (index, &child) in desired.iter().enumerate() {
        if toolkit.children(parent).get(index) == Some(&child) {
            continue;
        }
        let sibling = index.checked_sub(1).and_then(|prev| desired.get(prev)).copied();
        if toolkit.parent(child) == Some(parent) {
            if capabilities.contains(Capabilities::REORDER) {
                toolkit.child_op(parent, ChildOp::ReorderAfter { child, sibling })?;
                continue;
            }
            toolkit.child_op(parent, ChildOp::Remove { child })?;
        }
        insert_after(toolkit, parent, capabilities, child, sibling)?;
    }
    Ok(())
}

/// Append-only containers: everything from the first misplaced child onwards is detached and
/// appended again in order.
fn append_from_first_mismatch(
    toolkit: &dyn Toolkit,
    parent: NativeHandle,
    desired: &[NativeHandle],
) -> Result<()> {
    let current = toolkit.children(parent);
    let Some(first) = desired
        .iter()
        .enumerate()
        .position(|(index, child)| current.get(index) != Some(child))
    else {
        return Ok(());
    };
    for &child in &desired[first..] {
        if toolkit.parent(child) == Some(parent) {
            toolkit.child_op(parent, ChildOp::Remove { child })?;
        }
        toolkit.child_op(parent, ChildOp::Append { child })?;
    }
    Ok(())
}

fn insert_after(
    toolkit: &dyn Toolkit,
    parent: NativeHandle,
    capabilities: Capabilities,
    child: NativeHandle,
    sibling: Option<NativeHandle>,
) -> Result<()> {
    let op = if capabilities.contains(Capabilities::INSERT_AFTER) {
        ChildOp::InsertAfter { child, sibling }
    } else if sibling.is_none() && capabilities.contains(Capabilities::PREPEND) {
        ChildOp::Prepend { child }
    } else {
        ChildOp::Append { child }
    };
    toolkit.child_op(parent, op)?;
    Ok(())
}

/// Containers holding one widget in a content slot, optionally next to slot markers.
pub struct SingleKind {
    slot: String,
    show_on_mount: bool,
    sync: OnceCell<Rc<DeferredAction>>,
}

impl SingleKind {
    /// A container whose content goes into `slot`.
    pub fn new(slot: impl Into<String>) -> Self {
        Self {
            slot: slot.into(),
            show_on_mount: false,
            sync: OnceCell::new(),
        }
    }

    /// A toplevel window whose content goes into `slot`, shown once mounted.
    pub fn window(slot: impl Into<String>) -> Self {
        Self {
            show_on_mount: true,
            ..Self::new(slot)
        }
    }

    /// The content slot.
    #[must_use]
    pub fn slot(&self) -> &str {
        &self.slot
    }

    fn content(node: &Node) -> Option<Node> {
        node.children()
            .into_iter()
            .find(|child| !child.is_virtual() && !child.is_destroyed())
    }
}

impl NodeKind for SingleKind {
    fn accept(&self, node: &Node, child: &Node) -> Result<()> {
        if child.is_virtual() {
            if child.kind_as::<SlotKind>().is_some() {
                return Ok(());
            }
            return Err(reject(node, child));
        }
        match Self::content(node) {
            Some(existing) if existing != *child => Err(reject(node, child)),
            _ => Ok(()),
        }
    }

    fn child_inserted(&self, node: &Node, child: &Node, _before: Option<&Node>) -> Result<()> {
        if child.is_virtual() {
            return Ok(());
        }
        let slot = self.slot.clone();
        schedule_once(&self.sync, || {
            node.action(Priority::Normal, "set content", move |node| {
                let Some(parent) = node.handle() else {
                    return Ok(());
                };
                let desired = Self::content(node).and_then(|content| content.handle());
                let toolkit = node.toolkit();
                if toolkit.slot(parent, &slot) != desired {
                    toolkit.child_op(
                        parent,
                        ChildOp::SetSlot {
                            slot: slot.clone(),
                            child: desired,
                        },
                    )?;
                }
                Ok(())
            })
        });
        Ok(())
    }

    fn child_removed(&self, node: &Node, child: &Node) {
        let (Some(parent), Some(widget)) = (node.handle(), child.handle()) else {
            return;
        };
        let slot = self.slot.clone();
        node.deferred(Priority::High, "clear content", move |node| {
            let toolkit = node.toolkit();
            if toolkit.slot(parent, &slot) == Some(widget) {
                toolkit.child_op(parent, ChildOp::SetSlot { slot, child: None })?;
            }
            Ok(())
        });
    }

    fn needs_mount(&self) -> bool {
        self.show_on_mount
    }

    fn mount(&self, node: &Node) -> Result<()> {
        if let Some(handle) = node.handle() {
            node.toolkit()
                .set_property(handle, "visible", Value::Bool(true))?;
        }
        Ok(())
    }
}

/// Containers that expose only named slots and accept only their slot markers.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlotContainerKind;

impl NodeKind for SlotContainerKind {
    fn accept(&self, node: &Node, child: &Node) -> Result<()> {
        if child.kind_as::<SlotKind>().is_some() {
            return Ok(());
        }
        let accepted = node
            .class()
            .map(|class| {
                class
                    .slots
                    .iter()
                    .map(|slot| format!("{}.{}", node.type_name(), pascal_case(slot)))
                    .collect()
            })
            .unwrap_or_default();
        Err(Error::Structural {
            container: node.type_name().to_owned(),
            child: child.type_name().to_owned(),
            accepted,
        })
    }
}

/// The virtual container of a standalone root. Its children are never attached natively.
#[derive(Debug, Clone, Copy, Default)]
pub struct RootKind;

impl NodeKind for RootKind {
    fn accept(&self, node: &Node, child: &Node) -> Result<()> {
        if child.is_virtual() {
            return Err(reject(node, child));
        }
        Ok(())
    }
}
