//! Recycled row shells and the nested roots rendered into them.

use core::cell::RefCell;
use core::fmt;
use std::rc::Rc;

use tracing::trace;

use crate::Result;
use crate::element::Element;
use crate::native::NativeHandle;
use crate::reconciler::Root;
use crate::runtime::Runtime;

/// Where a cell is in its recycling cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellState {
    /// Created, showing the placeholder.
    Setup,
    /// Showing the item with this id.
    Bound(String),
    /// Content released, shell kept for reuse.
    Unbound,
    /// Destroyed.
    TornDown,
}

/// A native row shell with its own reconciliation root.
pub struct BoundCell {
    cell: NativeHandle,
    root: RefCell<Root>,
    state: RefCell<CellState>,
}

impl fmt::Debug for BoundCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundCell")
            .field("cell", &self.cell)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl BoundCell {
    /// Wraps a freshly set up shell whose `child` slot receives rendered content.
    ///
    /// # Errors
    ///
    /// Fails when the shell's type has no registered wrapper class.
    pub fn setup(runtime: &Rc<Runtime>, root_id: String, cell: NativeHandle) -> Result<Rc<Self>> {
        let root = Root::in_slot(root_id, runtime, cell, "child")?;
        Ok(Rc::new(Self {
            cell,
            root: RefCell::new(root),
            state: RefCell::new(CellState::Setup),
        }))
    }

    /// The native shell.
    #[must_use]
    pub const fn handle(&self) -> NativeHandle {
        self.cell
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> CellState {
        self.state.borrow().clone()
    }

    /// The id of the bound item.
    #[must_use]
    pub fn bound_id(&self) -> Option<String> {
        match &*self.state.borrow() {
            CellState::Bound(id) => Some(id.clone()),
            _ => None,
        }
    }

    /// Shows the item `id`.
    pub fn bind(&self, id: &str, content: Option<Element>) -> bool {
        *self.state.borrow_mut() = CellState::Bound(id.to_owned());
        self.render(content)
    }

    /// Releases the item, showing `placeholder` or nothing.
    pub fn unbind(&self, placeholder: Option<Element>) -> bool {
        *self.state.borrow_mut() = CellState::Unbound;
        self.render(placeholder)
    }

    /// Renders into the shell. Returns `false` if the cell is already rendering, in which case
    /// the caller retries later.
    pub fn render(&self, content: Option<Element>) -> bool {
        let Ok(mut root) = self.root.try_borrow_mut() else {
            trace!(cell = %self.cell, "cell is rendering; retry later");
            return false;
        };
        // A failed root logs and rebuilds on its next render.
        let _ = root.render_many(content.into_iter().collect());
        true
    }

    /// Unmounts the nested root.
    pub fn teardown(&self) {
        *self.state.borrow_mut() = CellState::TornDown;
        match self.root.try_borrow_mut() {
            Ok(mut root) => root.unmount(),
            Err(_) => trace!(cell = %self.cell, "teardown while rendering ignored"),
        }
    }
}
