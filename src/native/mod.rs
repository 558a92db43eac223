//! The surface the bridge consumes from a retained-mode native toolkit.
//!
//! Everything the reconciler does to the native side funnels through the [`Toolkit`] trait:
//! object construction, properties, signal connections, child attachment primitives, list
//! models and the main loop. A toolkit binding implements the trait once; [`headless`] ships an
//! in-memory implementation used for tests and offscreen runs.

pub mod headless;
mod value;

use core::fmt;
use core::num::NonZeroU64;
use std::rc::Rc;

use thiserror::Error;

use crate::catalog::Catalog;

pub use value::Value;

/// Identity of a native object, stable for the object's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NativeHandle(NonZeroU64);

impl NativeHandle {
    /// Wraps a raw non-zero handle.
    #[must_use]
    pub const fn new(raw: NonZeroU64) -> Self {
        Self(raw)
    }

    /// Wraps a raw handle, returning `None` for the null handle.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Option<Self> {
        match NonZeroU64::new(raw) {
            Some(raw) => Some(Self(raw)),
            None => None,
        }
    }

    /// Returns the integer the handle is keyed by.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// Identifier of one native signal connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wraps a raw connection id.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw connection id.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Callback invoked by the toolkit when a connected signal is emitted.
pub type NativeCallback = Rc<dyn Fn(&[Value]) -> Option<Value>>;

/// Placement of a child inside a grid container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridCell {
    /// Left column.
    pub column: i32,
    /// Top row.
    pub row: i32,
    /// Number of columns spanned.
    pub width: i32,
    /// Number of rows spanned.
    pub height: i32,
}

impl GridCell {
    /// Creates a cell spanning one column and one row.
    #[must_use]
    pub const fn new(column: i32, row: i32) -> Self {
        Self {
            column,
            row,
            width: 1,
            height: 1,
        }
    }

    /// Sets the column and row span.
    #[must_use]
    pub const fn span(mut self, width: i32, height: i32) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}

/// A child attachment primitive.
///
/// Each widget class declares which primitives it supports through its
/// [`Capabilities`](crate::catalog::Capabilities); issuing an undeclared one fails with
/// [`NativeError::Unsupported`].
#[derive(Debug, Clone, PartialEq)]
pub enum ChildOp {
    /// Adds `child` after the last child.
    Append {
        /// The child to add.
        child: NativeHandle,
    },
    /// Adds `child` before the first child.
    Prepend {
        /// The child to add.
        child: NativeHandle,
    },
    /// Adds `child` right after `sibling`, or first when `sibling` is `None`.
    InsertAfter {
        /// The child to add.
        child: NativeHandle,
        /// The sibling to insert after.
        sibling: Option<NativeHandle>,
    },
    /// Moves an attached `child` right after `sibling`, or first when `sibling` is `None`.
    ReorderAfter {
        /// The child to move.
        child: NativeHandle,
        /// The sibling to move after.
        sibling: Option<NativeHandle>,
    },
    /// Detaches `child`.
    Remove {
        /// The child to detach.
        child: NativeHandle,
    },
    /// Sets or clears the named slot.
    SetSlot {
        /// Slot setter name, e.g. `child` or `start_child`.
        slot: String,
        /// New slot content.
        child: Option<NativeHandle>,
    },
    /// Attaches `child` to a grid cell.
    Attach {
        /// The child to attach.
        child: NativeHandle,
        /// Target cell.
        cell: GridCell,
    },
    /// Places `child` at a fixed position.
    Put {
        /// The child to place.
        child: NativeHandle,
        /// Horizontal offset.
        x: f64,
        /// Vertical offset.
        y: f64,
    },
    /// Moves an already placed `child` to a new fixed position.
    Move {
        /// The child to move.
        child: NativeHandle,
        /// Horizontal offset.
        x: f64,
        /// Vertical offset.
        y: f64,
    },
}

impl ChildOp {
    /// Returns the primitive's method name, used in logs and errors.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Append { .. } => "append",
            Self::Prepend { .. } => "prepend",
            Self::InsertAfter { .. } => "insert_child_after",
            Self::ReorderAfter { .. } => "reorder_child_after",
            Self::Remove { .. } => "remove",
            Self::SetSlot { .. } => "set_slot",
            Self::Attach { .. } => "attach",
            Self::Put { .. } => "put",
            Self::Move { .. } => "move",
        }
    }

    /// Returns the child the primitive operates on, if any.
    #[must_use]
    pub const fn child(&self) -> Option<NativeHandle> {
        match self {
            Self::Append { child }
            | Self::Prepend { child }
            | Self::InsertAfter { child, .. }
            | Self::ReorderAfter { child, .. }
            | Self::Remove { child }
            | Self::Attach { child, .. }
            | Self::Put { child, .. }
            | Self::Move { child, .. } => Some(*child),
            Self::SetSlot { child, .. } => *child,
        }
    }
}

/// Failures reported by the native toolkit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NativeError {
    /// The object does not exist or was already destroyed.
    #[error("native object {0} does not exist")]
    Dead(NativeHandle),
    /// The toolkit does not know the class.
    #[error("unknown native class `{0}`")]
    UnknownClass(String),
    /// The object's class does not provide the primitive.
    #[error("`{class}` does not support `{operation}`")]
    Unsupported {
        /// Class of the object.
        class: String,
        /// The primitive that was attempted.
        operation: String,
    },
    /// The child is not attached to the parent.
    #[error("{child} is not a child of {parent}")]
    NotAChild {
        /// The parent object.
        parent: NativeHandle,
        /// The child object.
        child: NativeHandle,
    },
    /// The child already has a native parent.
    #[error("{child} is already attached to {parent}")]
    AlreadyParented {
        /// The child object.
        child: NativeHandle,
        /// Its current parent.
        parent: NativeHandle,
    },
    /// A list-model splice fell outside the model.
    #[error("splice at {position} removing {removals} exceeds model length {len}")]
    SpliceOutOfRange {
        /// Splice position.
        position: usize,
        /// Number of removed items.
        removals: usize,
        /// Current model length.
        len: usize,
    },
}

/// Operations the bridge needs from a retained-mode GUI toolkit.
///
/// All methods take `&self`; implementations use interior mutability and are driven from a
/// single thread. Implementations must not hold internal borrows while invoking callbacks, since
/// callbacks re-enter the toolkit.
pub trait Toolkit {
    /// The widget classes this toolkit exposes.
    fn catalog(&self) -> &Catalog;

    /// Constructs a new object of `class`.
    ///
    /// # Errors
    ///
    /// Returns [`NativeError::UnknownClass`] when the class is not known.
    fn construct(&self, class: &str) -> Result<NativeHandle, NativeError>;

    /// Destroys an object and everything it owns.
    fn destroy(&self, handle: NativeHandle);

    /// Returns `true` while the object exists.
    fn is_alive(&self, handle: NativeHandle) -> bool;

    /// Returns the runtime type name of an object.
    fn type_name(&self, handle: NativeHandle) -> Option<String>;

    /// Returns the parent type of a runtime type, walking the toolkit's own type system.
    fn type_parent(&self, type_name: &str) -> Option<String>;

    /// Sets a property.
    ///
    /// # Errors
    ///
    /// Returns an error when the object is dead.
    fn set_property(&self, handle: NativeHandle, name: &str, value: Value)
    -> Result<(), NativeError>;

    /// Reads a property.
    fn property(&self, handle: NativeHandle, name: &str) -> Option<Value>;

    /// Connects `callback` to `signal` on `handle`.
    ///
    /// # Errors
    ///
    /// Returns an error when the object is dead.
    fn connect(
        &self,
        handle: NativeHandle,
        signal: &str,
        callback: NativeCallback,
    ) -> Result<ConnectionId, NativeError>;

    /// Disconnects a connection. Unknown connections are ignored.
    fn disconnect(&self, handle: NativeHandle, connection: ConnectionId);

    /// Suppresses a connection until the matching [`Toolkit::unblock`].
    fn block(&self, handle: NativeHandle, connection: ConnectionId);

    /// Lifts one [`Toolkit::block`].
    fn unblock(&self, handle: NativeHandle, connection: ConnectionId);

    /// Returns the native parent of an object.
    fn parent(&self, handle: NativeHandle) -> Option<NativeHandle>;

    /// Returns the ordered children of a container.
    fn children(&self, handle: NativeHandle) -> Vec<NativeHandle>;

    /// Returns the current content of a named slot.
    fn slot(&self, handle: NativeHandle, slot: &str) -> Option<NativeHandle>;

    /// Performs a child attachment primitive on `parent`.
    ///
    /// # Errors
    ///
    /// Returns an error when the primitive is unsupported by the class or inconsistent with the
    /// current native tree.
    fn child_op(&self, parent: NativeHandle, op: ChildOp) -> Result<(), NativeError>;

    /// Replaces `removals` items at `position` of a list model with `additions`, in one batch.
    ///
    /// # Errors
    ///
    /// Returns an error when the range falls outside the model.
    fn splice(
        &self,
        model: NativeHandle,
        position: usize,
        removals: usize,
        additions: &[String],
    ) -> Result<(), NativeError>;

    /// Returns the items of a list model.
    fn model_items(&self, model: NativeHandle) -> Vec<String>;

    /// Runs `callback` once the main loop is idle.
    fn idle_add(&self, callback: Box<dyn FnOnce()>);

    /// Runs the main loop until [`Toolkit::quit`].
    fn run(&self);

    /// Stops the main loop.
    fn quit(&self);
}
