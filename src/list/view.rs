//! List and grid views backed by a recycling item factory.
//!
//! A view element owns a [`ListModel`] and a signal item factory. Its children are
//! `Owner.Item` markers carrying an `id` and a `value`; they never become widgets. The toolkit
//! realizes only the visible rows and drives each row shell through `setup`, `bind`, `unbind`
//! and `teardown`, and every shell gets its own nested [`Root`](crate::reconciler::Root)
//! rendered with the view's `render_item` callback.

use core::cell::{OnceCell, RefCell};
use core::fmt;
use std::collections::{BTreeMap, HashSet};
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use crate::catalog::Capabilities;
use crate::element::{Element, ItemRenderer, Props};
use crate::native::{NativeHandle, Value};
use crate::node::{Candidate, Node, NodeClass, NodeKind, apply_props};
use crate::runtime::Runtime;
use crate::scheduler::{self, DeferredAction, Priority};
use crate::signal::{self, SignalHandler, SignalOptions};
use crate::{Error, Result};

use super::cell::BoundCell;
use super::model::ListModel;

/// `GtkListView`, `GtkGridView` and any class rendering a list model.
#[derive(Debug, Clone, Copy)]
pub struct ListViewClass;

impl NodeClass for ListViewClass {
    fn name(&self) -> &'static str {
        "list view"
    }

    fn priority(&self) -> i32 {
        30
    }

    fn matches(&self, candidate: &Candidate<'_>) -> bool {
        candidate
            .class
            .is_some_and(|class| class.capabilities.contains(Capabilities::LIST_MODEL))
    }

    fn kind(&self, _runtime: &Rc<Runtime>, _candidate: &Candidate<'_>) -> Result<Box<dyn NodeKind>> {
        Ok(Box::new(ListViewKind::default()))
    }
}

/// `Owner.Item` markers of list views.
#[derive(Debug, Clone, Copy)]
pub struct ListItemClass;

impl NodeClass for ListItemClass {
    fn name(&self) -> &'static str {
        "list item"
    }

    fn priority(&self) -> i32 {
        30
    }

    fn matches(&self, candidate: &Candidate<'_>) -> bool {
        candidate.class.is_none()
            && candidate.marker.is_some_and(|(owner, suffix)| {
                suffix == "Item" && owner.capabilities.contains(Capabilities::LIST_MODEL)
            })
    }

    fn is_virtual(&self) -> bool {
        true
    }

    fn kind(&self, _runtime: &Rc<Runtime>, _candidate: &Candidate<'_>) -> Result<Box<dyn NodeKind>> {
        Ok(Box::new(ListItemKind::default()))
    }
}

#[derive(Default)]
struct Dirty {
    all: bool,
    ids: HashSet<String>,
}

/// Drives the cells of one view.
pub struct ListEngine {
    runtime: Rc<Runtime>,
    view: NativeHandle,
    model: Rc<ListModel>,
    factory: NativeHandle,
    renderer: RefCell<Option<ItemRenderer>>,
    cells: RefCell<BTreeMap<NativeHandle, Rc<BoundCell>>>,
    dirty: RefCell<Dirty>,
    refresh: Rc<DeferredAction>,
}

impl fmt::Debug for ListEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListEngine")
            .field("view", &self.view)
            .field("model", &self.model)
            .field("factory", &self.factory)
            .field("cells", &self.cells.borrow().len())
            .finish_non_exhaustive()
    }
}

const CELL_SIGNALS: [&str; 4] = ["setup", "bind", "unbind", "teardown"];

impl ListEngine {
    fn new(node: &Node) -> Result<Rc<Self>> {
        let runtime = node.runtime();
        let toolkit = node.toolkit();
        let Some(view) = node.handle() else {
            return Err(Error::structural(node.type_name(), "list model", Vec::<String>::new()));
        };

        let model = ListModel::new(runtime)?;
        let factory = match toolkit.construct("GtkSignalListItemFactory") {
            Ok(factory) => factory,
            Err(error) => {
                toolkit.destroy(model.handle());
                return Err(error.into());
            }
        };
        toolkit.set_property(view, "model", Value::Handle(model.handle()))?;
        toolkit.set_property(view, "factory", Value::Handle(factory))?;

        let engine = Rc::new_cyclic(|engine: &Weak<Self>| {
            let engine = engine.clone();
            Self {
                runtime: Rc::clone(runtime),
                view,
                model,
                factory,
                renderer: RefCell::new(None),
                cells: RefCell::new(BTreeMap::new()),
                dirty: RefCell::new(Dirty::default()),
                refresh: DeferredAction::new(Priority::Normal, "refresh list cells", move || {
                    if let Some(engine) = engine.upgrade() {
                        engine.refresh();
                    }
                }),
            }
        });

        for event in CELL_SIGNALS {
            let weak = Rc::downgrade(&engine);
            let handler: SignalHandler = Rc::new(move |args: &[Value]| {
                let engine = weak.upgrade()?;
                let cell = args.first().and_then(Value::as_handle)?;
                engine.on_cell_signal(event, cell);
                None
            });
            // Recycling signals must reach the engine even while the view applies props.
            signal::set(
                toolkit.as_ref(),
                node.id(),
                factory,
                event,
                Some(handler),
                SignalOptions::unblockable(),
            )?;
        }
        debug!(node = %node.id(), %view, model = %engine.model.handle(), "list view ready");
        Ok(engine)
    }

    /// The backing model.
    #[must_use]
    pub const fn model(&self) -> &Rc<ListModel> {
        &self.model
    }

    /// The item factory driving the cells.
    #[must_use]
    pub const fn factory(&self) -> NativeHandle {
        self.factory
    }

    /// The realized cells.
    #[must_use]
    pub fn cells(&self) -> Vec<Rc<BoundCell>> {
        self.cells.borrow().values().cloned().collect()
    }

    /// Inserts or moves an item before `before`.
    pub fn insert(&self, id: &str, value: Value, before: Option<&str>) {
        self.model.insert_item_before(id, value, before);
        self.mark_dirty(Some(id));
    }

    /// Removes an item.
    pub fn remove(&self, id: &str) {
        self.model.remove_item(id);
    }

    /// Changes an item's value, re-rendering only the cell showing it.
    pub fn update(&self, id: &str, value: Value) {
        if self.model.update_item(id, value) {
            self.mark_dirty(Some(id));
        }
    }

    /// Replaces the item renderer and re-renders every cell.
    pub fn set_renderer(&self, renderer: Option<ItemRenderer>) {
        *self.renderer.borrow_mut() = renderer;
        self.mark_dirty(None);
    }

    fn mark_dirty(&self, id: Option<&str>) {
        {
            let mut dirty = self.dirty.borrow_mut();
            match id {
                Some(id) => {
                    dirty.ids.insert(id.to_owned());
                }
                None => dirty.all = true,
            }
        }
        scheduler::schedule(&self.refresh);
    }

    fn render_for(&self, value: Option<&Value>) -> Option<Element> {
        let renderer = self.renderer.borrow().clone()?;
        renderer(value)
    }

    fn placeholder(&self) -> Option<Element> {
        if self.runtime.config().list.overscan_placeholder {
            self.render_for(None)
        } else {
            None
        }
    }

    fn cell(&self, handle: NativeHandle) -> Option<Rc<BoundCell>> {
        self.cells.borrow().get(&handle).cloned()
    }

    fn on_cell_signal(&self, event: &str, cell: NativeHandle) {
        trace!(view = %self.view, %cell, event, "cell signal");
        match event {
            "setup" => {
                self.setup(cell);
            }
            "bind" => self.bind(cell),
            "unbind" => {
                if let Some(bound) = self.cell(cell) {
                    bound.unbind(self.placeholder());
                }
            }
            "teardown" => {
                let removed = self.cells.borrow_mut().remove(&cell);
                if let Some(bound) = removed {
                    bound.teardown();
                }
            }
            _ => {}
        }
    }

    fn setup(&self, cell: NativeHandle) -> Option<Rc<BoundCell>> {
        if let Some(existing) = self.cell(cell) {
            return Some(existing);
        }
        let root_id = format!("{}/{}", self.view, cell);
        let bound = match BoundCell::setup(&self.runtime, root_id, cell) {
            Ok(bound) => bound,
            Err(error) => {
                tracing::error!(%cell, %error, "failed to set up list cell");
                return None;
            }
        };
        self.cells.borrow_mut().insert(cell, Rc::clone(&bound));
        bound.render(self.placeholder());
        Some(bound)
    }

    fn bind(&self, cell: NativeHandle) {
        let Some(bound) = self.setup(cell) else {
            return;
        };
        let toolkit = self.runtime.toolkit();
        let Some(id) = toolkit
            .property(cell, "item")
            .and_then(|item| item.as_str().map(str::to_owned))
        else {
            trace!(%cell, "bind without an item");
            return;
        };
        let value = self.model.get_item(&id);
        let content = match value {
            Some(value) => self.render_for(Some(&value)),
            None => self.placeholder(),
        };
        if !bound.bind(&id, content) {
            self.mark_dirty(Some(&id));
        }
    }

    fn refresh(&self) {
        let dirty = core::mem::take(&mut *self.dirty.borrow_mut());
        for bound in self.cells() {
            match bound.bound_id() {
                Some(id) if dirty.all || dirty.ids.contains(&id) => {
                    let content = self
                        .model
                        .get_item(&id)
                        .and_then(|value| self.render_for(Some(&value)));
                    if !bound.render(content) {
                        self.mark_dirty(Some(&id));
                    }
                }
                None if dirty.all => {
                    bound.render(self.placeholder());
                }
                _ => {}
            }
        }
    }

    fn destroy(&self) {
        let cells = core::mem::take(&mut *self.cells.borrow_mut());
        for bound in cells.into_values() {
            bound.teardown();
        }
        let toolkit = Rc::clone(self.runtime.toolkit());
        let (model, factory) = (self.model.handle(), self.factory);
        scheduler::defer(Priority::Low, "destroy list model", move || {
            for handle in [model, factory] {
                if toolkit.is_alive(handle) {
                    toolkit.destroy(handle);
                }
            }
        });
    }
}

/// Behaviour of a list or grid view.
#[derive(Default)]
pub struct ListViewKind {
    engine: OnceCell<Rc<ListEngine>>,
}

impl ListViewKind {
    /// The engine, once the view exists.
    #[must_use]
    pub fn engine(&self) -> Option<&Rc<ListEngine>> {
        self.engine.get()
    }
}

fn item_id(node: &Node) -> Option<String> {
    node.kind_as::<ListItemKind>().map(ListItemKind::id)
}

impl NodeKind for ListViewKind {
    fn accept(&self, node: &Node, child: &Node) -> Result<()> {
        if child.kind_as::<ListItemKind>().is_some() {
            return Ok(());
        }
        Err(Error::structural(
            node.type_name(),
            child.type_name(),
            [format!("{}.Item", node.type_name())],
        ))
    }

    fn created(&self, node: &Node) -> Result<()> {
        let engine = ListEngine::new(node)?;
        let _ = self.engine.set(engine);
        Ok(())
    }

    fn update(&self, node: &Node, old: &Props, new: &Props) -> Result<()> {
        apply_props(node, old, new)?;
        let same = match (old.render_item(), new.render_item()) {
            (Some(old), Some(new)) => Rc::ptr_eq(old, new),
            (None, None) => true,
            _ => false,
        };
        if same {
            return Ok(());
        }
        if let Some(engine) = self.engine() {
            engine.set_renderer(new.render_item().cloned());
        }
        Ok(())
    }

    fn child_inserted(&self, _node: &Node, child: &Node, before: Option<&Node>) -> Result<()> {
        let (Some(engine), Some(item)) = (self.engine(), child.kind_as::<ListItemKind>()) else {
            return Ok(());
        };
        let before = before.and_then(item_id);
        engine.insert(&item.id(), item.value(), before.as_deref());
        Ok(())
    }

    fn child_removed(&self, _node: &Node, child: &Node) {
        if let (Some(engine), Some(id)) = (self.engine(), item_id(child)) {
            engine.remove(&id);
        }
    }

    fn destroy(&self, _node: &Node) {
        if let Some(engine) = self.engine() {
            engine.destroy();
        }
    }
}

/// Behaviour of an `Owner.Item` marker: an id and a value, nothing native.
#[derive(Default)]
pub struct ListItemKind {
    id: RefCell<String>,
    value: RefCell<Value>,
}

impl ListItemKind {
    /// The item id.
    #[must_use]
    pub fn id(&self) -> String {
        self.id.borrow().clone()
    }

    /// The item value.
    #[must_use]
    pub fn value(&self) -> Value {
        self.value.borrow().clone()
    }
}

fn view_engine(node: &Node) -> Option<(Node, Rc<ListEngine>)> {
    let parent = node.parent()?;
    let engine = parent.kind_as::<ListViewKind>()?.engine()?.clone();
    Some((parent, engine))
}

impl NodeKind for ListItemKind {
    fn update(&self, node: &Node, _old: &Props, new: &Props) -> Result<()> {
        let id = new
            .value("id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::InvalidProp {
                element: node.type_name().to_owned(),
                prop: "id".to_owned(),
            })?
            .to_owned();
        let value = new.value("value").cloned().unwrap_or_default();

        let previous_id = self.id.replace(id.clone());
        let previous_value = self.value.replace(value.clone());
        let Some((parent, engine)) = view_engine(node) else {
            return Ok(());
        };

        if previous_id != id {
            engine.remove(&previous_id);
            let siblings = parent.children();
            let before = siblings
                .iter()
                .position(|sibling| sibling == node)
                .and_then(|index| siblings.get(index + 1))
                .and_then(item_id);
            engine.insert(&id, value, before.as_deref());
        } else if previous_value != value {
            engine.update(&id, value);
        }
        Ok(())
    }
}
