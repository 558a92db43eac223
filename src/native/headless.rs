//! An in-memory toolkit with no display.
//!
//! [`HeadlessToolkit`] keeps a table of objects with properties, signal connections, ordered
//! children, named slots, fixed/grid placements and list models. List views emulate a scrolling
//! viewport that recycles a pool of `GtkListItem` shells through the `setup`, `bind`, `unbind`
//! and `teardown` signals of their item factory, the same way a real toolkit does. Every
//! mutation is recorded as a [`NativeCall`] so callers can observe native traffic.

use core::cell::{Cell, RefCell};
use core::fmt;
use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::catalog::{Capabilities, Catalog};

use super::{
    ChildOp, ConnectionId, GridCell, NativeCallback, NativeError, NativeHandle, Toolkit, Value,
};

/// A recorded native mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeCall {
    /// An object was constructed.
    Construct {
        /// The new object.
        handle: NativeHandle,
        /// Its class.
        class: String,
    },
    /// An object was destroyed.
    Destroy {
        /// The destroyed object.
        handle: NativeHandle,
    },
    /// A property was written.
    SetProperty {
        /// The target object.
        handle: NativeHandle,
        /// Property name.
        name: String,
        /// New value.
        value: Value,
    },
    /// A signal was connected.
    Connect {
        /// The target object.
        handle: NativeHandle,
        /// Signal name.
        signal: String,
    },
    /// A signal was disconnected.
    Disconnect {
        /// The target object.
        handle: NativeHandle,
        /// Signal name.
        signal: String,
    },
    /// A child attachment primitive ran.
    Child {
        /// The container.
        parent: NativeHandle,
        /// The primitive.
        op: ChildOp,
    },
    /// A list model was spliced.
    Splice {
        /// The model.
        model: NativeHandle,
        /// Splice position.
        position: usize,
        /// Number of removed items.
        removals: usize,
        /// Inserted items.
        additions: Vec<String>,
    },
}

/// Where a grid or fixed container placed a child.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Placement {
    /// Grid cell.
    Cell(GridCell),
    /// Fixed position.
    Point {
        /// Horizontal offset.
        x: f64,
        /// Vertical offset.
        y: f64,
    },
}

struct Connection {
    id: ConnectionId,
    signal: String,
    callback: NativeCallback,
    blocked: u32,
}

#[derive(Default)]
struct Viewport {
    start: usize,
    count: usize,
    cells: Vec<NativeHandle>,
    bound: Vec<Option<String>>,
}

struct Object {
    class: String,
    properties: BTreeMap<String, Value>,
    parent: Option<NativeHandle>,
    children: Vec<NativeHandle>,
    slots: BTreeMap<String, NativeHandle>,
    placements: HashMap<NativeHandle, Placement>,
    connections: Vec<Connection>,
    items: Vec<String>,
    viewport: Option<Viewport>,
}

impl Object {
    fn new(class: &str) -> Self {
        Self {
            class: class.to_owned(),
            properties: BTreeMap::new(),
            parent: None,
            children: Vec::new(),
            slots: BTreeMap::new(),
            placements: HashMap::new(),
            connections: Vec::new(),
            items: Vec::new(),
            viewport: None,
        }
    }

    fn position(&self, child: NativeHandle) -> Option<usize> {
        self.children.iter().position(|candidate| *candidate == child)
    }
}

#[derive(Default)]
struct State {
    next_handle: u64,
    next_connection: u64,
    objects: HashMap<NativeHandle, Object>,
    types: HashMap<String, String>,
}

impl State {
    fn object(&self, handle: NativeHandle) -> Result<&Object, NativeError> {
        self.objects.get(&handle).ok_or(NativeError::Dead(handle))
    }

    fn object_mut(&mut self, handle: NativeHandle) -> Result<&mut Object, NativeError> {
        self.objects.get_mut(&handle).ok_or(NativeError::Dead(handle))
    }

    fn adopt(&mut self, parent: NativeHandle, child: NativeHandle) -> Result<(), NativeError> {
        let object = self.object_mut(child)?;
        if let Some(current) = object.parent {
            return Err(NativeError::AlreadyParented {
                child,
                parent: current,
            });
        }
        object.parent = Some(parent);
        Ok(())
    }

    fn orphan(&mut self, child: NativeHandle) {
        if let Some(object) = self.objects.get_mut(&child) {
            object.parent = None;
        }
    }

    fn index_after(
        &self,
        parent: NativeHandle,
        sibling: Option<NativeHandle>,
    ) -> Result<usize, NativeError> {
        match sibling {
            None => Ok(0),
            Some(sibling) => self
                .object(parent)?
                .position(sibling)
                .map(|index| index + 1)
                .ok_or(NativeError::NotAChild {
                    parent,
                    child: sibling,
                }),
        }
    }

    fn apply(&mut self, parent: NativeHandle, op: &ChildOp) -> Result<(), NativeError> {
        match *op {
            ChildOp::Append { child } => {
                self.adopt(parent, child)?;
                self.object_mut(parent)?.children.push(child);
            }
            ChildOp::Prepend { child } => {
                self.adopt(parent, child)?;
                self.object_mut(parent)?.children.insert(0, child);
            }
            ChildOp::InsertAfter { child, sibling } => {
                let index = self.index_after(parent, sibling)?;
                self.adopt(parent, child)?;
                self.object_mut(parent)?.children.insert(index, child);
            }
            ChildOp::ReorderAfter { child, sibling } => {
                if sibling == Some(child) {
                    return Ok(());
                }
                let object = self.object_mut(parent)?;
                let current = object
                    .position(child)
                    .ok_or(NativeError::NotAChild { parent, child })?;
                object.children.remove(current);
                let index = match self.index_after(parent, sibling) {
                    Ok(index) => index,
                    Err(error) => {
                        self.object_mut(parent)?.children.insert(current, child);
                        return Err(error);
                    }
                };
                self.object_mut(parent)?.children.insert(index, child);
            }
            ChildOp::Remove { child } => {
                let object = self.object_mut(parent)?;
                let index = object
                    .position(child)
                    .ok_or(NativeError::NotAChild { parent, child })?;
                object.children.remove(index);
                object.placements.remove(&child);
                self.orphan(child);
            }
            ChildOp::SetSlot { ref slot, child } => {
                let previous = self.object(parent)?.slots.get(slot).copied();
                if previous == child {
                    return Ok(());
                }
                if let Some(child) = child {
                    self.adopt(parent, child)?;
                    self.object_mut(parent)?.slots.insert(slot.clone(), child);
                } else {
                    self.object_mut(parent)?.slots.remove(slot);
                }
                if let Some(previous) = previous {
                    self.orphan(previous);
                }
            }
            ChildOp::Attach { child, cell } => {
                self.adopt(parent, child)?;
                let object = self.object_mut(parent)?;
                object.children.push(child);
                object.placements.insert(child, Placement::Cell(cell));
            }
            ChildOp::Put { child, x, y } => {
                self.adopt(parent, child)?;
                let object = self.object_mut(parent)?;
                object.children.push(child);
                object.placements.insert(child, Placement::Point { x, y });
            }
            ChildOp::Move { child, x, y } => {
                let object = self.object_mut(parent)?;
                if object.position(child).is_none() {
                    return Err(NativeError::NotAChild { parent, child });
                }
                object.placements.insert(child, Placement::Point { x, y });
            }
        }
        Ok(())
    }

    fn subtree(&self, root: NativeHandle) -> Vec<NativeHandle> {
        let mut collected = Vec::new();
        let mut stack = vec![root];
        while let Some(handle) = stack.pop() {
            let Some(object) = self.objects.get(&handle) else {
                continue;
            };
            collected.push(handle);
            stack.extend(object.children.iter().copied());
            stack.extend(object.slots.values().copied());
            if let Some(viewport) = &object.viewport {
                stack.extend(viewport.cells.iter().copied());
            }
        }
        collected
    }
}

/// An in-memory [`Toolkit`].
pub struct HeadlessToolkit {
    catalog: Catalog,
    state: RefCell<State>,
    calls: RefCell<Vec<NativeCall>>,
    idle: RefCell<VecDeque<Box<dyn FnOnce()>>>,
    running: Cell<bool>,
}

impl fmt::Debug for HeadlessToolkit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeadlessToolkit")
            .field("objects", &self.state.borrow().objects.len())
            .field("calls", &self.calls.borrow().len())
            .field("idle", &self.idle.borrow().len())
            .finish_non_exhaustive()
    }
}

impl Default for HeadlessToolkit {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessToolkit {
    /// Creates a toolkit exposing the [`Catalog::gtk`] classes.
    #[must_use]
    pub fn new() -> Self {
        Self::with_catalog(Catalog::gtk())
    }

    /// Creates a toolkit exposing a custom catalog.
    #[must_use]
    pub fn with_catalog(catalog: Catalog) -> Self {
        Self {
            catalog,
            state: RefCell::new(State::default()),
            calls: RefCell::new(Vec::new()),
            idle: RefCell::new(VecDeque::new()),
            running: Cell::new(false),
        }
    }

    /// Declares a runtime type unknown to the catalog, deriving from `parent`.
    pub fn define_type(&self, name: impl Into<String>, parent: impl Into<String>) {
        self.state
            .borrow_mut()
            .types
            .insert(name.into(), parent.into());
    }

    /// Returns every recorded mutation.
    #[must_use]
    pub fn calls(&self) -> Vec<NativeCall> {
        self.calls.borrow().clone()
    }

    /// Returns and forgets every recorded mutation.
    pub fn take_calls(&self) -> Vec<NativeCall> {
        core::mem::take(&mut *self.calls.borrow_mut())
    }

    /// Returns the number of live objects.
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.state.borrow().objects.len()
    }

    /// Returns the number of live signal connections on an object.
    #[must_use]
    pub fn connection_count(&self, handle: NativeHandle) -> usize {
        self.state
            .borrow()
            .objects
            .get(&handle)
            .map_or(0, |object| object.connections.len())
    }

    /// Returns where a grid or fixed container placed a child.
    #[must_use]
    pub fn placement(&self, parent: NativeHandle, child: NativeHandle) -> Option<Placement> {
        self.state
            .borrow()
            .objects
            .get(&parent)
            .and_then(|object| object.placements.get(&child).copied())
    }

    /// Emits a signal, invoking every unblocked connection in connection order.
    ///
    /// Returns the value produced by the last invoked callback.
    pub fn emit(&self, handle: NativeHandle, signal: &str, args: &[Value]) -> Option<Value> {
        let targets: Vec<(ConnectionId, NativeCallback)> = {
            let state = self.state.borrow();
            let Some(object) = state.objects.get(&handle) else {
                return None;
            };
            object
                .connections
                .iter()
                .filter(|connection| connection.signal == signal && connection.blocked == 0)
                .map(|connection| (connection.id, connection.callback.clone()))
                .collect()
        };

        let mut result = None;
        for (id, callback) in targets {
            // A callback may disconnect or block the ones after it.
            let live = self.state.borrow().objects.get(&handle).is_some_and(|object| {
                object
                    .connections
                    .iter()
                    .any(|connection| connection.id == id && connection.blocked == 0)
            });
            if live {
                result = callback(args);
            }
        }
        result
    }

    /// Scrolls a list view so that `count` rows starting at `start` are realized.
    ///
    /// Rows entering the viewport are bound, rows leaving it are unbound, and the shell pool is
    /// grown through `setup` or shrunk through `teardown` to match.
    pub fn set_viewport(&self, view: NativeHandle, start: usize, count: usize) {
        {
            let mut state = self.state.borrow_mut();
            let Some(object) = state.objects.get_mut(&view) else {
                return;
            };
            let viewport = object.viewport.get_or_insert_with(Viewport::default);
            viewport.start = start;
            viewport.count = count;
        }
        self.refresh_viewport(view);
    }

    /// Returns the item ids currently bound to the realized rows of a list view.
    #[must_use]
    pub fn visible_items(&self, view: NativeHandle) -> Vec<Option<String>> {
        self.state
            .borrow()
            .objects
            .get(&view)
            .and_then(|object| object.viewport.as_ref())
            .map_or_else(Vec::new, |viewport| viewport.bound.clone())
    }

    /// Returns the realized row shells of a list view.
    #[must_use]
    pub fn cells(&self, view: NativeHandle) -> Vec<NativeHandle> {
        self.state
            .borrow()
            .objects
            .get(&view)
            .and_then(|object| object.viewport.as_ref())
            .map_or_else(Vec::new, |viewport| viewport.cells.clone())
    }

    /// Runs queued idle callbacks, including ones queued while running, and returns how many ran.
    pub fn run_idle(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self.idle.borrow_mut().pop_front();
            let Some(callback) = next else {
                break;
            };
            callback();
            ran += 1;
        }
        ran
    }

    fn record(&self, call: NativeCall) {
        self.calls.borrow_mut().push(call);
    }

    fn handle_property(&self, handle: NativeHandle, name: &str) -> Option<NativeHandle> {
        self.property(handle, name).and_then(|value| value.as_handle())
    }

    fn refresh_viewport(&self, view: NativeHandle) {
        let Some(factory) = self.handle_property(view, "factory") else {
            return;
        };
        let items = self
            .handle_property(view, "model")
            .map(|model| self.model_items(model))
            .unwrap_or_default();
        let visible: Vec<String> = {
            let state = self.state.borrow();
            let Some(viewport) = state.objects.get(&view).and_then(|o| o.viewport.as_ref()) else {
                return;
            };
            items
                .into_iter()
                .skip(viewport.start)
                .take(viewport.count)
                .collect()
        };

        loop {
            let pool = self.cells(view).len();
            if pool >= visible.len() {
                break;
            }
            let Ok(cell) = self.construct("GtkListItem") else {
                return;
            };
            let pushed = self.viewport_mut(view, |viewport| {
                viewport.cells.push(cell);
                viewport.bound.push(None);
            });
            if pushed.is_none() {
                return;
            }
            self.emit(factory, "setup", &[Value::Handle(cell)]);
        }

        loop {
            let Some(Some((cell, bound))) = self.viewport_mut(view, |viewport| {
                if viewport.cells.len() <= visible.len() {
                    return None;
                }
                let cell = viewport.cells.pop()?;
                let bound = viewport.bound.pop().flatten();
                Some((cell, bound))
            }) else {
                break;
            };
            if bound.is_some() {
                self.emit(factory, "unbind", &[Value::Handle(cell)]);
            }
            self.emit(factory, "teardown", &[Value::Handle(cell)]);
            self.destroy(cell);
        }

        for (index, id) in visible.iter().enumerate() {
            let Some(Some((cell, current))) = self.viewport_mut(view, |viewport| {
                let cell = *viewport.cells.get(index)?;
                Some((cell, viewport.bound.get(index).cloned().flatten()))
            }) else {
                continue;
            };
            if current.as_deref() == Some(id.as_str()) {
                continue;
            }
            if current.is_some() {
                self.emit(factory, "unbind", &[Value::Handle(cell)]);
            }
            {
                let mut state = self.state.borrow_mut();
                if let Some(object) = state.objects.get_mut(&cell) {
                    object
                        .properties
                        .insert("item".into(), Value::Str(id.clone()));
                    object.properties.insert(
                        "position".into(),
                        Value::Int(i64::try_from(index).unwrap_or(i64::MAX)),
                    );
                }
            }
            self.viewport_mut(view, |viewport| {
                if let Some(slot) = viewport.bound.get_mut(index) {
                    *slot = Some(id.clone());
                }
            });
            self.emit(factory, "bind", &[Value::Handle(cell)]);
        }
    }

    fn viewport_mut<R>(&self, view: NativeHandle, f: impl FnOnce(&mut Viewport) -> R) -> Option<R> {
        let mut state = self.state.borrow_mut();
        let viewport = state.objects.get_mut(&view)?.viewport.as_mut()?;
        Some(f(viewport))
    }

    fn with_connection(
        &self,
        handle: NativeHandle,
        connection: ConnectionId,
        f: impl FnOnce(&mut Connection),
    ) {
        let mut state = self.state.borrow_mut();
        let entry = state
            .objects
            .get_mut(&handle)
            .and_then(|object| object.connections.iter_mut().find(|c| c.id == connection));
        if let Some(entry) = entry {
            f(entry);
        }
    }

    fn views_of(&self, model: NativeHandle) -> Vec<NativeHandle> {
        self.state
            .borrow()
            .objects
            .iter()
            .filter(|(_, object)| {
                object.viewport.is_some()
                    && object.properties.get("model") == Some(&Value::Handle(model))
            })
            .map(|(handle, _)| *handle)
            .collect()
    }

    fn supports(&self, class: &str, op: &ChildOp) -> bool {
        let Some(info) = self.catalog.resolve(self, class) else {
            return false;
        };
        let caps = info.capabilities;
        match op {
            ChildOp::Append { .. } => caps.contains(Capabilities::APPEND),
            ChildOp::Prepend { .. } => caps.contains(Capabilities::PREPEND),
            ChildOp::InsertAfter { .. } => caps.contains(Capabilities::INSERT_AFTER),
            ChildOp::ReorderAfter { .. } => caps.contains(Capabilities::REORDER),
            ChildOp::Remove { .. } => caps.contains(Capabilities::REMOVE),
            ChildOp::SetSlot { slot, .. } => info.has_slot(slot),
            ChildOp::Attach { .. } => caps.contains(Capabilities::ATTACH),
            ChildOp::Put { .. } | ChildOp::Move { .. } => caps.contains(Capabilities::PUT),
        }
    }
}

impl Toolkit for HeadlessToolkit {
    fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn construct(&self, class: &str) -> Result<NativeHandle, NativeError> {
        let handle = {
            let mut state = self.state.borrow_mut();
            if self.catalog.get(class).is_none() && !state.types.contains_key(class) {
                return Err(NativeError::UnknownClass(class.to_owned()));
            }
            state.next_handle += 1;
            let handle = NativeHandle::from_raw(state.next_handle)
                .ok_or_else(|| NativeError::UnknownClass(class.to_owned()))?;
            state.objects.insert(handle, Object::new(class));
            handle
        };
        self.record(NativeCall::Construct {
            handle,
            class: class.to_owned(),
        });
        Ok(handle)
    }

    fn destroy(&self, handle: NativeHandle) {
        {
            let mut state = self.state.borrow_mut();
            if !state.objects.contains_key(&handle) {
                return;
            }
            let parent = state.objects.get(&handle).and_then(|object| object.parent);
            if let Some(parent) = parent.and_then(|parent| state.objects.get_mut(&parent)) {
                parent.children.retain(|child| *child != handle);
                parent.slots.retain(|_, child| *child != handle);
                parent.placements.remove(&handle);
            }
            for doomed in state.subtree(handle) {
                state.objects.remove(&doomed);
            }
        }
        self.record(NativeCall::Destroy { handle });
    }

    fn is_alive(&self, handle: NativeHandle) -> bool {
        self.state.borrow().objects.contains_key(&handle)
    }

    fn type_name(&self, handle: NativeHandle) -> Option<String> {
        self.state
            .borrow()
            .objects
            .get(&handle)
            .map(|object| object.class.clone())
    }

    fn type_parent(&self, type_name: &str) -> Option<String> {
        if let Some(parent) = self.state.borrow().types.get(type_name) {
            return Some(parent.clone());
        }
        self.catalog
            .get(type_name)
            .and_then(|class| class.parent_name())
            .map(str::to_owned)
    }

    fn set_property(
        &self,
        handle: NativeHandle,
        name: &str,
        value: Value,
    ) -> Result<(), NativeError> {
        let (changed, has_viewport) = {
            let mut state = self.state.borrow_mut();
            let object = state.object_mut(handle)?;
            let previous = if value.is_null() {
                object.properties.remove(name)
            } else {
                object.properties.insert(name.to_owned(), value.clone())
            };
            (
                previous.as_ref() != Some(&value) && !(previous.is_none() && value.is_null()),
                object.viewport.is_some(),
            )
        };
        self.record(NativeCall::SetProperty {
            handle,
            name: name.to_owned(),
            value: value.clone(),
        });
        if changed {
            self.emit(handle, &format!("notify::{name}"), &[value]);
            if has_viewport && (name == "model" || name == "factory") {
                self.refresh_viewport(handle);
            }
        }
        Ok(())
    }

    fn property(&self, handle: NativeHandle, name: &str) -> Option<Value> {
        self.state
            .borrow()
            .objects
            .get(&handle)
            .and_then(|object| object.properties.get(name).cloned())
    }

    fn connect(
        &self,
        handle: NativeHandle,
        signal: &str,
        callback: NativeCallback,
    ) -> Result<ConnectionId, NativeError> {
        let id = {
            let mut state = self.state.borrow_mut();
            state.next_connection += 1;
            let id = ConnectionId::new(state.next_connection);
            state.object_mut(handle)?.connections.push(Connection {
                id,
                signal: signal.to_owned(),
                callback,
                blocked: 0,
            });
            id
        };
        self.record(NativeCall::Connect {
            handle,
            signal: signal.to_owned(),
        });
        Ok(id)
    }

    fn disconnect(&self, handle: NativeHandle, connection: ConnectionId) {
        let removed = {
            let mut state = self.state.borrow_mut();
            let Some(object) = state.objects.get_mut(&handle) else {
                return;
            };
            let Some(index) = object.connections.iter().position(|c| c.id == connection) else {
                return;
            };
            object.connections.remove(index)
        };
        self.record(NativeCall::Disconnect {
            handle,
            signal: removed.signal,
        });
    }

    fn block(&self, handle: NativeHandle, connection: ConnectionId) {
        self.with_connection(handle, connection, |entry| entry.blocked += 1);
    }

    fn unblock(&self, handle: NativeHandle, connection: ConnectionId) {
        self.with_connection(handle, connection, |entry| {
            entry.blocked = entry.blocked.saturating_sub(1);
        });
    }

    fn parent(&self, handle: NativeHandle) -> Option<NativeHandle> {
        self.state
            .borrow()
            .objects
            .get(&handle)
            .and_then(|object| object.parent)
    }

    fn children(&self, handle: NativeHandle) -> Vec<NativeHandle> {
        self.state
            .borrow()
            .objects
            .get(&handle)
            .map_or_else(Vec::new, |object| object.children.clone())
    }

    fn slot(&self, handle: NativeHandle, slot: &str) -> Option<NativeHandle> {
        self.state
            .borrow()
            .objects
            .get(&handle)
            .and_then(|object| object.slots.get(slot).copied())
    }

    fn child_op(&self, parent: NativeHandle, op: ChildOp) -> Result<(), NativeError> {
        let class = self.type_name(parent).ok_or(NativeError::Dead(parent))?;
        if !self.supports(&class, &op) {
            return Err(NativeError::Unsupported {
                class,
                operation: op.name().to_owned(),
            });
        }
        self.state.borrow_mut().apply(parent, &op)?;
        self.record(NativeCall::Child { parent, op });
        Ok(())
    }

    fn splice(
        &self,
        model: NativeHandle,
        position: usize,
        removals: usize,
        additions: &[String],
    ) -> Result<(), NativeError> {
        {
            let mut state = self.state.borrow_mut();
            let object = state.object_mut(model)?;
            let len = object.items.len();
            if position > len || removals > len - position {
                return Err(NativeError::SpliceOutOfRange {
                    position,
                    removals,
                    len,
                });
            }
            object
                .items
                .splice(position..position + removals, additions.iter().cloned());
        }
        self.record(NativeCall::Splice {
            model,
            position,
            removals,
            additions: additions.to_vec(),
        });
        for view in self.views_of(model) {
            self.refresh_viewport(view);
        }
        Ok(())
    }

    fn model_items(&self, model: NativeHandle) -> Vec<String> {
        self.state
            .borrow()
            .objects
            .get(&model)
            .map_or_else(Vec::new, |object| object.items.clone())
    }

    fn idle_add(&self, callback: Box<dyn FnOnce()>) {
        self.idle.borrow_mut().push_back(callback);
    }

    fn run(&self) {
        self.running.set(true);
        while self.running.get() {
            let next = self.idle.borrow_mut().pop_front();
            let Some(callback) = next else {
                break;
            };
            callback();
        }
        self.running.set(false);
    }

    fn quit(&self) {
        self.running.set(false);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::{HeadlessToolkit, NativeCall};
    use crate::native::{ChildOp, NativeError, Toolkit, Value};

    #[test]
    fn reorder_keeps_child_attached() {
        let toolkit = HeadlessToolkit::new();
        let container = toolkit.construct("GtkBox").unwrap();
        let a = toolkit.construct("GtkLabel").unwrap();
        let b = toolkit.construct("GtkLabel").unwrap();
        toolkit.child_op(container, ChildOp::Append { child: a }).unwrap();
        toolkit.child_op(container, ChildOp::Append { child: b }).unwrap();

        toolkit
            .child_op(container, ChildOp::ReorderAfter { child: a, sibling: Some(b) })
            .unwrap();
        assert_eq!(toolkit.children(container), [b, a]);
        assert_eq!(toolkit.parent(a), Some(container));
    }

    #[test]
    fn undeclared_primitives_are_rejected() {
        let toolkit = HeadlessToolkit::new();
        let list = toolkit.construct("GtkListBox").unwrap();
        let row = toolkit.construct("GtkLabel").unwrap();
        toolkit.child_op(list, ChildOp::Append { child: row }).unwrap();
        let error = toolkit
            .child_op(list, ChildOp::ReorderAfter { child: row, sibling: None })
            .unwrap_err();
        assert!(matches!(error, NativeError::Unsupported { .. }));
    }

    #[test]
    fn reparenting_requires_detaching_first() {
        let toolkit = HeadlessToolkit::new();
        let first = toolkit.construct("GtkBox").unwrap();
        let second = toolkit.construct("GtkBox").unwrap();
        let child = toolkit.construct("GtkLabel").unwrap();
        toolkit.child_op(first, ChildOp::Append { child }).unwrap();
        let error = toolkit.child_op(second, ChildOp::Append { child }).unwrap_err();
        assert_eq!(error, NativeError::AlreadyParented { child, parent: first });
    }

    #[test]
    fn blocked_connections_do_not_fire() {
        let toolkit = HeadlessToolkit::new();
        let button = toolkit.construct("GtkButton").unwrap();
        let hits = Rc::new(RefCell::new(0));
        let connection = toolkit
            .connect(button, "clicked", {
                let hits = hits.clone();
                Rc::new(move |_: &[Value]| {
                    *hits.borrow_mut() += 1;
                    None
                })
            })
            .unwrap();

        toolkit.block(button, connection);
        toolkit.emit(button, "clicked", &[]);
        toolkit.unblock(button, connection);
        toolkit.emit(button, "clicked", &[]);
        assert_eq!(*hits.borrow(), 1);
    }

    #[test]
    fn destroy_cascades_to_children_and_slots() {
        let toolkit = HeadlessToolkit::new();
        let window = toolkit.construct("GtkWindow").unwrap();
        let content = toolkit.construct("GtkBox").unwrap();
        let label = toolkit.construct("GtkLabel").unwrap();
        toolkit
            .child_op(window, ChildOp::SetSlot { slot: "child".into(), child: Some(content) })
            .unwrap();
        toolkit.child_op(content, ChildOp::Append { child: label }).unwrap();

        toolkit.destroy(window);
        assert!(!toolkit.is_alive(label));
        assert_eq!(toolkit.object_count(), 0);
    }

    #[test]
    fn splice_rebinds_visible_rows() {
        let toolkit = HeadlessToolkit::new();
        let view = toolkit.construct("GtkListView").unwrap();
        let model = toolkit.construct("GtkStringList").unwrap();
        let factory = toolkit.construct("GtkSignalListItemFactory").unwrap();
        let log = Rc::new(RefCell::new(Vec::new()));
        for signal in ["setup", "bind", "unbind", "teardown"] {
            let log = log.clone();
            toolkit
                .connect(
                    factory,
                    signal,
                    Rc::new(move |_: &[Value]| {
                        log.borrow_mut().push(signal);
                        None
                    }),
                )
                .unwrap();
        }
        toolkit.set_property(view, "model", Value::Handle(model)).unwrap();
        toolkit.set_property(view, "factory", Value::Handle(factory)).unwrap();
        toolkit.set_viewport(view, 0, 2);
        toolkit
            .splice(model, 0, 0, &["a".into(), "b".into(), "c".into()])
            .unwrap();
        assert_eq!(*log.borrow(), ["setup", "setup", "bind", "bind"]);
        assert_eq!(
            toolkit.visible_items(view),
            [Some("a".to_owned()), Some("b".to_owned())]
        );

        log.borrow_mut().clear();
        toolkit.splice(model, 0, 3, &["z".into()]).unwrap();
        assert_eq!(*log.borrow(), ["unbind", "teardown", "unbind", "bind"]);
        assert!(toolkit.calls().iter().any(|call| matches!(
            call,
            NativeCall::Splice { removals: 3, .. }
        )));
    }
}
