//! Named slot markers such as `GtkPaned.StartChild`.
//!
//! A marker is a virtual node holding one widget. It assigns that widget to the slot setter of
//! its parent and clears the slot when the widget or the marker goes away.

use core::cell::OnceCell;
use std::rc::Rc;

use tracing::error;

use crate::native::{ChildOp, NativeHandle};
use crate::scheduler::{self, DeferredAction, Priority};
use crate::{Error, Result};

use super::{Node, NodeKind};

/// Behaviour of a slot marker.
pub struct SlotKind {
    slot: String,
    sync: OnceCell<Rc<DeferredAction>>,
}

impl SlotKind {
    /// A marker for the `snake_case` slot setter `slot`.
    pub fn new(slot: impl Into<String>) -> Self {
        Self {
            slot: slot.into(),
            sync: OnceCell::new(),
        }
    }

    /// The slot setter this marker targets.
    #[must_use]
    pub fn slot(&self) -> &str {
        &self.slot
    }

    fn schedule_sync(&self, node: &Node) {
        let slot = self.slot.clone();
        let action = self.sync.get_or_init(|| {
            node.action(Priority::Normal, "assign slot", move |node| {
                let Some(parent) = node.parent().and_then(|parent| parent.handle()) else {
                    return Ok(());
                };
                let desired = node.widget();
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
        scheduler::schedule(action);
    }

    fn clear_later(&self, parent: &Node, widget: Option<NativeHandle>) {
        let (Some(handle), Some(widget)) = (parent.handle(), widget) else {
            return;
        };
        let toolkit = Rc::clone(parent.toolkit());
        let slot = self.slot.clone();
        scheduler::defer(Priority::High, "clear slot", move || {
            if toolkit.slot(handle, &slot) != Some(widget) {
                return;
            }
            if let Err(error) = toolkit.child_op(handle, ChildOp::SetSlot { slot, child: None }) {
                error!(%handle, %error, "failed to clear slot");
            }
        });
    }
}

impl NodeKind for SlotKind {
    fn accept(&self, node: &Node, child: &Node) -> Result<()> {
        let occupied = node
            .children()
            .iter()
            .any(|existing| existing != child && !existing.is_destroyed());
        if child.is_virtual() || occupied {
            return Err(Error::structural(
                node.type_name(),
                child.type_name(),
                Vec::<String>::new(),
            ));
        }
        Ok(())
    }

    fn attaching(&self, _node: &Node, parent: &Node) -> Result<()> {
        if parent.class().is_some_and(|class| class.has_slot(&self.slot)) {
            return Ok(());
        }
        Err(Error::MissingCapability {
            class: parent.type_name().to_owned(),
            capability: self.slot.clone(),
        })
    }

    fn attached(&self, node: &Node, _parent: &Node) -> Result<()> {
        self.schedule_sync(node);
        Ok(())
    }

    fn detached(&self, node: &Node, parent: &Node) {
        self.clear_later(parent, node.widget());
    }

    fn child_inserted(&self, node: &Node, _child: &Node, _before: Option<&Node>) -> Result<()> {
        self.schedule_sync(node);
        Ok(())
    }

    fn child_removed(&self, node: &Node, child: &Node) {
        if let Some(parent) = node.parent() {
            self.clear_later(&parent, child.widget());
        }
        self.schedule_sync(node);
    }
}
