//! End-to-end scenarios driving the headless toolkit through [`Root`].
//!
//! Each test starts its own runtime on the test thread, so the thread-local registry, signal
//! store and scheduler begin empty.

use core::cell::{Cell, RefCell};
use std::rc::Rc;

use futures::FutureExt;

use crate::catalog::{Capabilities, Catalog, WidgetClass};
use crate::config::{Config, ListConfig};
use crate::element::{Element, ItemRenderer, Props};
use crate::list::{ListModel, ListViewKind};
use crate::native::headless::{HeadlessToolkit, NativeCall, Placement};
use crate::native::{ChildOp, GridCell, NativeHandle, Toolkit, Value};
use crate::node::Node;
use crate::reconciler::Root;
use crate::runtime::{self, Runtime};
use crate::scheduler::{self, DeferredAction, Priority};
use crate::{Error, registry, signal};

// ============================================================================
// Test Infrastructure
// ============================================================================

fn start() -> (Rc<HeadlessToolkit>, Rc<Runtime>) {
    start_with(Config::default())
}

fn start_with(config: Config) -> (Rc<HeadlessToolkit>, Rc<Runtime>) {
    let toolkit = Rc::new(HeadlessToolkit::new());
    let runtime = runtime::start(toolkit.clone(), config);
    (toolkit, runtime)
}

fn handle(node: &Node) -> NativeHandle {
    node.handle().expect("node has a native widget")
}

fn child_ops(calls: &[NativeCall]) -> Vec<(NativeHandle, ChildOp)> {
    calls
        .iter()
        .filter_map(|call| match call {
            NativeCall::Child { parent, op } => Some((*parent, op.clone())),
            _ => None,
        })
        .collect()
}

fn splices(calls: &[NativeCall]) -> usize {
    calls
        .iter()
        .filter(|call| matches!(call, NativeCall::Splice { .. }))
        .count()
}

fn item(id: &str, value: impl Into<Value>) -> Element {
    Element::new("GtkListView.Item")
        .key(id)
        .prop("id", id)
        .prop("value", value)
}

/// How often a renderer produced item content and placeholders.
#[derive(Default)]
struct Renders {
    items: Cell<usize>,
    placeholders: Cell<usize>,
}

fn counting_renderer(renders: &Rc<Renders>) -> ItemRenderer {
    let renders = renders.clone();
    Rc::new(move |value: Option<&Value>| {
        let Some(value) = value else {
            renders.placeholders.set(renders.placeholders.get() + 1);
            return Some(Element::new("GtkLabel").prop("label", "…"));
        };
        renders.items.set(renders.items.get() + 1);
        Some(Element::new("GtkLabel").prop("label", value.clone()))
    })
}

fn list_view(items: impl IntoIterator<Item = Element>, renderer: &ItemRenderer) -> Element {
    Element::new("GtkListView")
        .item_renderer(renderer.clone())
        .children(items)
}

fn cell_labels(toolkit: &HeadlessToolkit, view: NativeHandle) -> Vec<Option<String>> {
    toolkit
        .cells(view)
        .into_iter()
        .map(|cell| {
            toolkit
                .slot(cell, "child")
                .and_then(|label| toolkit.property(label, "label"))
                .and_then(|label| label.as_str().map(str::to_owned))
        })
        .collect()
}

// ============================================================================
// Signal Store
// ============================================================================

#[test]
fn clearing_twice_is_a_no_op() {
    let (toolkit, runtime) = start();
    let mut root = Root::new("main", &runtime);
    root.render(Element::new("GtkButton").on("clicked", |_: &[Value]| None))
        .unwrap();
    let button = root.nodes()[0].clone();
    assert_eq!(toolkit.connection_count(handle(&button)), 1);

    signal::clear(toolkit.as_ref(), button.id());
    signal::clear(toolkit.as_ref(), button.id());
    assert_eq!(toolkit.connection_count(handle(&button)), 0);
    assert_eq!(signal::connection_count(button.id()), 0);

    button.destroy();
    button.destroy();
    runtime::stop();
}

#[test]
fn rerendering_swaps_handlers_through_one_connection() {
    let (toolkit, runtime) = start();
    let log = Rc::new(RefCell::new(Vec::new()));
    let button = |label: &'static str| {
        let log = log.clone();
        Element::new("GtkButton").on("clicked", move |_: &[Value]| {
            log.borrow_mut().push(label);
            None
        })
    };

    let mut root = Root::new("main", &runtime);
    root.render(button("first")).unwrap();
    let widget = handle(&root.nodes()[0]);
    toolkit.emit(widget, "clicked", &[]);

    root.render(button("second")).unwrap();
    assert_eq!(toolkit.connection_count(widget), 1);
    toolkit.emit(widget, "clicked", &[]);
    assert_eq!(*log.borrow(), ["first", "second"]);

    root.render(Element::new("GtkButton")).unwrap();
    assert_eq!(toolkit.connection_count(widget), 0);
    runtime::stop();
}

#[test]
fn programmatic_writes_do_not_echo_as_events() {
    let (toolkit, runtime) = start();
    let changes = Rc::new(Cell::new(0));
    let entry = |text: &'static str| {
        let changes = changes.clone();
        Element::new("GtkEntry")
            .prop("text", text)
            .on("notify::text", move |_: &[Value]| {
                changes.set(changes.get() + 1);
                None
            })
    };

    let mut root = Root::new("main", &runtime);
    root.render(entry("a")).unwrap();
    root.render(entry("b")).unwrap();
    assert_eq!(changes.get(), 0);

    let widget = handle(&root.nodes()[0]);
    toolkit.set_property(widget, "text", Value::from("typed")).unwrap();
    assert_eq!(changes.get(), 1);
    runtime::stop();
}

#[test]
fn next_emission_resolves_once_and_disconnects() {
    let (toolkit, runtime) = start();
    let mut root = Root::new("main", &runtime);
    root.render(Element::new("GtkButton")).unwrap();
    let button = root.nodes()[0].clone();
    let widget = handle(&button);

    let mut emission =
        signal::next_emission(runtime.toolkit(), button.id(), widget, "clicked").unwrap();
    assert!((&mut emission).now_or_never().is_none());

    toolkit.emit(widget, "clicked", &[Value::from(7)]);
    assert_eq!(emission.now_or_never(), Some(Some(vec![Value::Int(7)])));
    assert_eq!(toolkit.connection_count(widget), 0);
    runtime::stop();
}

// ============================================================================
// Identity Registry
// ============================================================================

#[test]
fn resolve_yields_one_wrapper_until_collected() {
    let (toolkit, _runtime) = start();
    let label = toolkit.construct("GtkLabel").unwrap();

    let first = registry::resolve(toolkit.as_ref(), label, None).unwrap();
    let second = registry::resolve(toolkit.as_ref(), label, None).unwrap();
    assert!(first.ptr_eq(&second));
    let serial = first.serial();

    drop(first);
    drop(second);
    assert!(registry::lookup(label).is_none());
    let third = registry::resolve(toolkit.as_ref(), label, None).unwrap();
    assert_ne!(third.serial(), serial);
    runtime::stop();
}

#[test]
fn unregistered_type_chains_fail_to_resolve() {
    let (toolkit, _runtime) = start();
    toolkit.define_type("ThirdPartyWidget", "GObject");
    let handle = toolkit.construct("ThirdPartyWidget").unwrap();
    let error = registry::resolve(toolkit.as_ref(), handle, None).unwrap_err();
    assert!(matches!(error, Error::UnregisteredType { .. }));
    runtime::stop();
}

// ============================================================================
// Scheduler
// ============================================================================

#[test]
fn repeated_schedules_run_once_per_flush() {
    let (_toolkit, _runtime) = start();
    let runs = Rc::new(Cell::new(0));
    let action = {
        let runs = runs.clone();
        DeferredAction::new(Priority::Normal, "count", move || runs.set(runs.get() + 1))
    };
    for _ in 0..5 {
        scheduler::schedule(&action);
    }
    assert_eq!(runs.get(), 0);
    assert_eq!(scheduler::flush(), 1);
    assert_eq!(runs.get(), 1);
    runtime::stop();
}

#[test]
fn removal_runs_before_addition_when_moving_between_containers() {
    let (toolkit, runtime) = start();
    let left = Node::create(&runtime, "GtkBox", &Props::new()).unwrap();
    let right = Node::create(&runtime, "GtkBox", &Props::new()).unwrap();
    let label = Node::create(&runtime, "GtkLabel", &Props::new()).unwrap();
    left.append_child(&label).unwrap();
    scheduler::flush();
    assert_eq!(toolkit.parent(handle(&label)), Some(handle(&left)));

    toolkit.take_calls();
    right.append_child(&label).unwrap();
    assert!(toolkit.take_calls().is_empty());
    scheduler::flush();

    let ops = child_ops(&toolkit.take_calls());
    assert_eq!(ops.len(), 2);
    assert_eq!(
        ops[0],
        (handle(&left), ChildOp::Remove { child: handle(&label) })
    );
    assert_eq!(ops[1].0, handle(&right));
    assert_eq!(ops[1].1.child(), Some(handle(&label)));
    assert_eq!(toolkit.parent(handle(&label)), Some(handle(&right)));
    assert_eq!(label.parent(), Some(right));
    runtime::stop();
}

#[test]
fn pending_work_of_a_destroyed_container_is_skipped() {
    let (toolkit, runtime) = start();
    let container = Node::create(&runtime, "GtkBox", &Props::new()).unwrap();
    let label = Node::create(&runtime, "GtkLabel", &Props::new()).unwrap();
    toolkit.take_calls();
    container.append_child(&label).unwrap();
    container.destroy();
    scheduler::flush();

    assert!(child_ops(&toolkit.take_calls()).is_empty());
    assert_eq!(toolkit.parent(handle(&label)), None);
    assert!(!toolkit.is_alive(handle(&container)));
    assert!(toolkit.is_alive(handle(&label)));
    runtime::stop();
}

// ============================================================================
// Node Tree
// ============================================================================

#[test]
fn slot_containers_name_their_accepted_markers() {
    let (_toolkit, runtime) = start();
    let mut root = Root::new("main", &runtime);
    let error = root
        .render(Element::new("GtkPaned").child(Element::new("GtkButton")))
        .unwrap_err();
    let Error::Structural {
        container,
        child,
        accepted,
    } = &error
    else {
        panic!("expected a structural error, got {error}");
    };
    assert_eq!(container, "GtkPaned");
    assert_eq!(child, "GtkButton");
    assert_eq!(accepted, &["GtkPaned.StartChild", "GtkPaned.EndChild"]);
    assert!(root.is_failed());
    runtime::stop();
}

#[test]
fn slot_markers_fill_named_slots() {
    let (toolkit, runtime) = start();
    let mut root = Root::new("main", &runtime);
    root.render(
        Element::new("GtkPaned")
            .child(Element::new("GtkPaned.StartChild").child(Element::new("GtkLabel")))
            .child(Element::new("GtkPaned.EndChild").child(Element::new("GtkButton"))),
    )
    .unwrap();
    let paned = handle(&root.nodes()[0]);
    let start = toolkit.slot(paned, "start_child").unwrap();
    let end = toolkit.slot(paned, "end_child").unwrap();
    assert_eq!(toolkit.type_name(start).as_deref(), Some("GtkLabel"));
    assert_eq!(toolkit.type_name(end).as_deref(), Some("GtkButton"));

    root.render(
        Element::new("GtkPaned")
            .child(Element::new("GtkPaned.StartChild").child(Element::new("GtkLabel"))),
    )
    .unwrap();
    assert_eq!(toolkit.slot(paned, "end_child"), None);
    assert!(!toolkit.is_alive(end));
    runtime::stop();
}

#[test]
fn slot_setters_missing_from_the_class_are_rejected() {
    let (_toolkit, runtime) = start();
    let mut root = Root::new("main", &runtime);
    let error = root
        .render(
            Element::new("GtkCenterBox")
                .child(Element::new("GtkCenterBox.StartChild").child(Element::new("GtkLabel"))),
        )
        .unwrap_err();
    assert!(matches!(
        &error,
        Error::MissingCapability { class, capability }
            if class == "GtkCenterBox" && capability == "start_child"
    ));
    runtime::stop();
}

#[test]
fn reordering_relocates_without_detaching() {
    let (toolkit, runtime) = start();
    let labels = |ids: &[&str]| {
        Element::new("GtkBox").children(
            ids.iter()
                .map(|id| Element::new("GtkLabel").key(*id).prop("label", *id)),
        )
    };
    let mut root = Root::new("main", &runtime);
    root.render(labels(&["a", "b", "c"])).unwrap();
    let container = handle(&root.nodes()[0]);
    let before = toolkit.children(container);

    toolkit.take_calls();
    root.render(labels(&["c", "b", "a"])).unwrap();
    let ops = child_ops(&toolkit.take_calls());
    assert!(!ops.is_empty());
    assert!(
        ops.iter()
            .all(|(_, op)| matches!(op, ChildOp::ReorderAfter { .. }))
    );
    assert_eq!(
        toolkit.children(container),
        [before[2], before[1], before[0]]
    );
    runtime::stop();
}

#[test]
fn containers_without_reorder_reinsert_at_the_right_index() {
    let (toolkit, runtime) = start();
    let rows = |ids: &[&str]| {
        Element::new("GtkListBox").children(
            ids.iter()
                .map(|id| Element::new("GtkLabel").key(*id).prop("label", *id)),
        )
    };
    let mut root = Root::new("main", &runtime);
    root.render(rows(&["a", "b", "c"])).unwrap();
    let list = handle(&root.nodes()[0]);
    let before = toolkit.children(list);

    root.render(rows(&["b", "c", "a"])).unwrap();
    assert_eq!(toolkit.children(list), [before[1], before[2], before[0]]);
    runtime::stop();
}

#[test]
fn append_only_containers_reappend_the_misplaced_tail() {
    let catalog = Catalog::gtk().with(
        WidgetClass::new("AppendBox")
            .parent("GtkWidget")
            .capabilities(Capabilities::APPEND | Capabilities::REMOVE),
    );
    let toolkit = Rc::new(HeadlessToolkit::with_catalog(catalog));
    let runtime = runtime::start(toolkit.clone(), Config::default());
    let column = |ids: &[&str]| {
        Element::new("AppendBox").children(
            ids.iter()
                .map(|id| Element::new("GtkLabel").key(*id).prop("label", *id)),
        )
    };
    let labels = |container: NativeHandle| -> Vec<Option<String>> {
        toolkit
            .children(container)
            .into_iter()
            .map(|child| {
                toolkit
                    .property(child, "label")
                    .and_then(|label| label.as_str().map(str::to_owned))
            })
            .collect()
    };
    let mut root = Root::new("main", &runtime);
    root.render(column(&["a", "b", "c", "d"])).unwrap();
    let container = handle(&root.nodes()[0]);

    toolkit.take_calls();
    root.render(column(&["a", "c", "d", "b"])).unwrap();
    assert_eq!(
        labels(container),
        ["a", "c", "d", "b"].map(|id| Some(id.to_owned()))
    );
    let ops = child_ops(&toolkit.take_calls());
    assert!(
        ops.iter()
            .all(|(_, op)| matches!(op, ChildOp::Remove { .. } | ChildOp::Append { .. }))
    );

    root.render(column(&["d", "a", "b"])).unwrap();
    assert_eq!(labels(container), ["d", "a", "b"].map(|id| Some(id.to_owned())));
    runtime::stop();
}

#[test]
fn windows_are_shown_once_mounted() {
    let (toolkit, runtime) = start();
    let mut root = Root::new("main", &runtime);
    root.render(
        Element::new("GtkWindow")
            .prop("title", "Main")
            .child(Element::new("GtkLabel")),
    )
    .unwrap();
    let window = root.nodes()[0].clone();
    assert!(window.is_mounted());
    assert_eq!(
        toolkit.property(handle(&window), "visible"),
        Some(Value::Bool(true))
    );
    let content = toolkit.slot(handle(&window), "child").unwrap();
    assert_eq!(toolkit.type_name(content).as_deref(), Some("GtkLabel"));
    runtime::stop();
}

#[test]
fn grid_children_follow_their_cell() {
    let (toolkit, runtime) = start();
    let grid = |column: i32| {
        Element::new("GtkGrid").child(
            Element::new("GtkGrid.Child")
                .prop("column", column)
                .prop("row", 2)
                .prop("width", 2)
                .child(Element::new("GtkLabel")),
        )
    };
    let mut root = Root::new("main", &runtime);
    root.render(grid(1)).unwrap();
    let container = handle(&root.nodes()[0]);
    let label = toolkit.children(container)[0];
    assert_eq!(
        toolkit.placement(container, label),
        Some(Placement::Cell(GridCell::new(1, 2).span(2, 1)))
    );

    root.render(grid(3)).unwrap();
    assert_eq!(toolkit.children(container), [label]);
    assert_eq!(
        toolkit.placement(container, label),
        Some(Placement::Cell(GridCell::new(3, 2).span(2, 1)))
    );
    runtime::stop();
}

#[test]
fn fixed_children_move_in_place() {
    let (toolkit, runtime) = start();
    let fixed = |x: f64| {
        Element::new("GtkFixed").child(
            Element::new("GtkFixed.Child")
                .prop("x", x)
                .prop("y", 4.0)
                .child(Element::new("GtkButton")),
        )
    };
    let mut root = Root::new("main", &runtime);
    root.render(fixed(1.5)).unwrap();
    let container = handle(&root.nodes()[0]);
    let button = toolkit.children(container)[0];
    assert_eq!(
        toolkit.placement(container, button),
        Some(Placement::Point { x: 1.5, y: 4.0 })
    );

    toolkit.take_calls();
    root.render(fixed(8.0)).unwrap();
    let ops = child_ops(&toolkit.take_calls());
    assert_eq!(
        ops,
        [(container, ChildOp::Move { child: button, x: 8.0, y: 4.0 })]
    );
    runtime::stop();
}

#[test]
fn positional_containers_require_markers() {
    let (_toolkit, runtime) = start();
    let mut root = Root::new("main", &runtime);
    let error = root
        .render(Element::new("GtkGrid").child(Element::new("GtkLabel")))
        .unwrap_err();
    assert!(error.is_structural());
    assert!(error.to_string().contains("GtkGrid.Child"));
    runtime::stop();
}

// ============================================================================
// Reconciler Adapter
// ============================================================================

#[test]
fn a_failed_root_is_rebuilt_on_the_next_render() {
    let (toolkit, runtime) = start();
    let mut root = Root::new("main", &runtime);
    root.render(Element::new("GtkBox").child(Element::new("GtkLabel").key("a")))
        .unwrap();
    let first = root.nodes()[0].clone();

    let broken = Element::new("GtkBox")
        .child(Element::new("GtkLabel").key("a"))
        .child(Element::new("GtkPaned").key("p").child(Element::new("GtkButton")));
    assert!(root.render(broken).is_err());
    assert!(root.is_failed());

    root.render(Element::new("GtkBox").child(Element::new("GtkLabel").key("a")))
        .unwrap();
    assert!(!root.is_failed());
    assert!(first.is_destroyed());
    let second = root.nodes()[0].clone();
    assert_ne!(first, second);
    assert!(!toolkit.is_alive(handle(&first)));
    assert_eq!(toolkit.children(handle(&second)).len(), 1);
    runtime::stop();
}

#[test]
fn unknown_element_types_abort_the_commit() {
    let (_toolkit, runtime) = start();
    let mut root = Root::new("main", &runtime);
    let error = root.render(Element::new("NoSuchWidget")).unwrap_err();
    assert!(matches!(error, Error::UnknownElement(name) if name == "NoSuchWidget"));
    runtime::stop();
}

#[test]
fn failures_stay_inside_their_root() {
    let (toolkit, runtime) = start();
    let mut healthy = Root::new("healthy", &runtime);
    let mut broken = Root::new("broken", &runtime);
    healthy.render(Element::new("GtkLabel").prop("label", "ok")).unwrap();
    assert!(
        broken
            .render(Element::new("GtkLabel").child(Element::new("GtkButton")))
            .is_err()
    );
    let label = handle(&healthy.nodes()[0]);
    assert!(toolkit.is_alive(label));
    assert!(!healthy.is_failed());
    runtime::stop();
}

// ============================================================================
// List Virtualization
// ============================================================================

#[test]
fn update_item_keeps_the_native_order() {
    let (toolkit, runtime) = start();
    let model = ListModel::new(&runtime).unwrap();
    for id in ["a", "b", "c"] {
        model.add_item(id, Value::from(id));
    }
    scheduler::flush();

    model.update_item("b", Value::from("B"));
    scheduler::flush();
    assert_eq!(model.get_item("b"), Some(Value::from("B")));
    assert_eq!(toolkit.model_items(model.handle()), ["a", "b", "c"]);
    runtime::stop();
}

#[test]
fn visible_rows_render_their_items() {
    let (toolkit, runtime) = start();
    let renders = Rc::new(Renders::default());
    let renderer = counting_renderer(&renders);
    let mut root = Root::new("main", &runtime);
    root.render(list_view(
        ["a", "b", "c", "d"].map(|id| item(id, id.to_uppercase())),
        &renderer,
    ))
    .unwrap();
    let view = handle(&root.nodes()[0]);
    assert_eq!(renders.items.get(), 0);

    toolkit.set_viewport(view, 1, 2);
    scheduler::flush();
    assert_eq!(
        toolkit.visible_items(view),
        [Some("b".to_owned()), Some("c".to_owned())]
    );
    assert_eq!(
        cell_labels(&toolkit, view),
        [Some("B".to_owned()), Some("C".to_owned())]
    );
    assert_eq!(renders.items.get(), 2);
    assert_eq!(renders.placeholders.get(), 2);
    runtime::stop();
}

#[test]
fn scrolling_rebinds_recycled_cells() {
    let (toolkit, runtime) = start();
    let renders = Rc::new(Renders::default());
    let renderer = counting_renderer(&renders);
    let mut root = Root::new("main", &runtime);
    root.render(list_view(
        ["a", "b", "c", "d", "e", "f"].map(|id| item(id, id.to_uppercase())),
        &renderer,
    ))
    .unwrap();
    let view = handle(&root.nodes()[0]);
    let labels = |ids: &[&str]| -> Vec<Option<String>> {
        ids.iter().map(|id| Some((*id).to_owned())).collect()
    };

    for (start, count, expected, rendered) in [
        (0, 2, &["A", "B"][..], 2),
        (0, 3, &["A", "B", "C"][..], 3),
        (3, 2, &["D", "E"][..], 5),
        (1, 3, &["B", "C", "D"][..], 8),
        (0, 2, &["A", "B"][..], 10),
        (4, 1, &["E"][..], 11),
    ] {
        toolkit.set_viewport(view, start, count);
        scheduler::flush();
        assert_eq!(cell_labels(&toolkit, view), labels(expected));
        assert_eq!(toolkit.cells(view).len(), count);
        assert_eq!(renders.items.get(), rendered);
    }
    runtime::stop();
}

#[test]
fn item_updates_rerender_only_their_cell() {
    let (toolkit, runtime) = start();
    let renders = Rc::new(Renders::default());
    let renderer = counting_renderer(&renders);
    let items = |b: &str| [item("a", "A"), item("b", b), item("c", "C")];
    let mut root = Root::new("main", &runtime);
    root.render(list_view(items("B"), &renderer)).unwrap();
    let view = handle(&root.nodes()[0]);
    toolkit.set_viewport(view, 0, 3);
    scheduler::flush();
    assert_eq!(renders.items.get(), 3);

    root.render(list_view(items("b2"), &renderer)).unwrap();
    assert_eq!(renders.items.get(), 4);
    assert_eq!(
        cell_labels(&toolkit, view),
        [
            Some("A".to_owned()),
            Some("b2".to_owned()),
            Some("C".to_owned())
        ]
    );
    let node = root.nodes()[0].clone();
    let engine = node
        .kind_as::<ListViewKind>()
        .and_then(ListViewKind::engine)
        .unwrap();
    assert_eq!(engine.model().ids(), ["a", "b", "c"]);
    assert_eq!(engine.model().get_item("b"), Some(Value::from("b2")));
    assert_eq!(toolkit.model_items(engine.model().handle()), ["a", "b", "c"]);
    runtime::stop();
}

#[test]
fn a_new_renderer_rerenders_every_bound_cell() {
    let (toolkit, runtime) = start();
    let first = Rc::new(Renders::default());
    let second = Rc::new(Renders::default());
    let mut root = Root::new("main", &runtime);
    let items = || [item("a", "A"), item("b", "B")];
    root.render(list_view(items(), &counting_renderer(&first)))
        .unwrap();
    let view = handle(&root.nodes()[0]);
    toolkit.set_viewport(view, 0, 2);
    scheduler::flush();

    root.render(list_view(items(), &counting_renderer(&second)))
        .unwrap();
    assert_eq!(first.items.get(), 2);
    assert_eq!(second.items.get(), 2);
    runtime::stop();
}

#[test]
fn replacing_many_items_costs_one_splice() {
    let (toolkit, runtime) = start();
    let renders = Rc::new(Renders::default());
    let renderer = counting_renderer(&renders);
    let many: Vec<Element> = (0..200).map(|n| item(&format!("old-{n}"), n)).collect();
    let mut root = Root::new("main", &runtime);
    root.render(list_view(many, &renderer)).unwrap();
    let view = handle(&root.nodes()[0]);
    toolkit.set_viewport(view, 0, 10);
    scheduler::flush();
    assert_eq!(toolkit.cells(view).len(), 10);
    assert_eq!(renders.items.get(), 10);

    toolkit.take_calls();
    renders.items.set(0);
    root.render(list_view(["x", "y", "z"].map(|id| item(id, id)), &renderer))
        .unwrap();

    let calls = toolkit.take_calls();
    assert_eq!(splices(&calls), 1);
    let model = toolkit
        .property(view, "model")
        .and_then(|model| model.as_handle())
        .unwrap();
    assert_eq!(toolkit.model_items(model), ["x", "y", "z"]);
    assert_eq!(toolkit.cells(view).len(), 3);
    assert_eq!(renders.items.get(), 3);
    runtime::stop();
}

#[test]
fn removing_thousands_of_items_is_one_splice() {
    let (toolkit, runtime) = start();
    let renderer = counting_renderer(&Rc::new(Renders::default()));
    let many: Vec<Element> = (0..10_000).map(|n| item(&format!("row-{n}"), n)).collect();
    let mut root = Root::new("main", &runtime);
    root.render(list_view(many, &renderer)).unwrap();
    let view = handle(&root.nodes()[0]);

    toolkit.take_calls();
    root.render(list_view([item("kept", "K")], &renderer)).unwrap();

    let calls = toolkit.take_calls();
    assert_eq!(splices(&calls), 1);
    let model = toolkit
        .property(view, "model")
        .and_then(|model| model.as_handle())
        .unwrap();
    assert_eq!(toolkit.model_items(model), ["kept"]);
    let node = root.nodes()[0].clone();
    let engine = node
        .kind_as::<ListViewKind>()
        .and_then(ListViewKind::engine)
        .unwrap();
    assert_eq!(engine.model().len(), 1);
    assert_eq!(engine.model().get_item("row-0"), None);
    runtime::stop();
}

#[test]
fn list_views_only_accept_item_markers() {
    let (_toolkit, runtime) = start();
    let mut root = Root::new("main", &runtime);
    let error = root
        .render(Element::new("GtkListView").child(Element::new("GtkLabel")))
        .unwrap_err();
    assert!(matches!(
        &error,
        Error::Structural { accepted, .. } if accepted == &["GtkListView.Item"]
    ));
    runtime::stop();
}

#[test]
fn items_require_an_id() {
    let (_toolkit, runtime) = start();
    let mut root = Root::new("main", &runtime);
    let error = root
        .render(Element::new("GtkListView").child(Element::new("GtkListView.Item")))
        .unwrap_err();
    assert!(matches!(error, Error::InvalidProp { prop, .. } if prop == "id"));
    runtime::stop();
}

#[test]
fn placeholders_can_be_disabled() {
    let config = Config {
        list: ListConfig {
            overscan_placeholder: false,
        },
        ..Config::default()
    };
    let (toolkit, runtime) = start_with(config);
    let renders = Rc::new(Renders::default());
    let renderer = counting_renderer(&renders);
    let mut root = Root::new("main", &runtime);
    root.render(list_view([item("a", "A"), item("b", "B")], &renderer))
        .unwrap();
    let view = handle(&root.nodes()[0]);
    toolkit.set_viewport(view, 0, 2);
    toolkit.set_viewport(view, 0, 1);
    scheduler::flush();
    assert_eq!(cell_labels(&toolkit, view), [Some("A".to_owned())]);
    assert_eq!(renders.items.get(), 2);
    assert_eq!(renders.placeholders.get(), 0);
    runtime::stop();
}

#[test]
fn destroying_a_list_view_releases_its_model_and_cells() {
    let (toolkit, runtime) = start();
    let renderer = counting_renderer(&Rc::new(Renders::default()));
    let mut root = Root::new("main", &runtime);
    root.render(list_view([item("a", "A"), item("b", "B")], &renderer))
        .unwrap();
    let view = handle(&root.nodes()[0]);
    toolkit.set_viewport(view, 0, 2);
    scheduler::flush();
    assert!(toolkit.object_count() > 1);

    root.unmount();
    assert!(!toolkit.is_alive(view));
    assert_eq!(toolkit.object_count(), 0);
    runtime::stop();
}
