//! Grid and fixed containers, whose children carry explicit coordinates.
//!
//! The container only admits `Owner.Child` markers. Each marker holds one widget and the
//! coordinates it is placed at: `column`, `row`, `width` and `height` for grids, `x` and `y` for
//! fixed containers.

use core::cell::{Cell, OnceCell};
use std::rc::Rc;

use tracing::error;

use crate::element::Props;
use crate::native::{ChildOp, GridCell, NativeHandle, Toolkit, Value};
use crate::scheduler::{self, DeferredAction, Priority};
use crate::{Error, Result};

use super::{Node, NodeKind};

/// How a positional container places children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// `attach(child, column, row, width, height)`.
    Grid,
    /// `put(child, x, y)` and `move(child, x, y)`.
    Fixed,
}

/// Coordinates of a positional child.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Position {
    /// A grid cell.
    Cell(GridCell),
    /// A fixed offset.
    Point {
        /// Horizontal offset.
        x: f64,
        /// Vertical offset.
        y: f64,
    },
}

impl Position {
    fn parse(layout: Layout, element: &str, props: &Props) -> Result<Self> {
        match layout {
            Layout::Grid => {
                let int = |name: &str, default: i32| -> Result<i32> {
                    match props.value(name) {
                        None => Ok(default),
                        Some(value) => value
                            .as_int()
                            .and_then(|raw| i32::try_from(raw).ok())
                            .ok_or_else(|| invalid(element, name)),
                    }
                };
                Ok(Self::Cell(
                    GridCell::new(int("column", 0)?, int("row", 0)?)
                        .span(int("width", 1)?, int("height", 1)?),
                ))
            }
            Layout::Fixed => {
                let float = |name: &str| -> Result<f64> {
                    props
                        .value(name)
                        .map_or(Some(0.0), Value::as_float)
                        .ok_or_else(|| invalid(element, name))
                };
                Ok(Self::Point {
                    x: float("x")?,
                    y: float("y")?,
                })
            }
        }
    }
}

fn invalid(element: &str, prop: &str) -> Error {
    Error::InvalidProp {
        element: element.to_owned(),
        prop: prop.to_owned(),
    }
}

/// A grid or fixed container.
#[derive(Debug)]
pub struct PositionalContainerKind {
    layout: Layout,
}

impl PositionalContainerKind {
    /// Creates the container behaviour.
    #[must_use]
    pub const fn new(layout: Layout) -> Self {
        Self { layout }
    }
}

impl NodeKind for PositionalContainerKind {
    fn accept(&self, node: &Node, child: &Node) -> Result<()> {
        let admitted = child
            .kind_as::<PositionalChildKind>()
            .is_some_and(|kind| kind.layout == self.layout);
        if admitted {
            return Ok(());
        }
        Err(Error::structural(
            node.type_name(),
            child.type_name(),
            [format!("{}.Child", node.type_name())],
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Placed {
    parent: NativeHandle,
    widget: NativeHandle,
    position: Position,
}

/// A coordinate-bearing marker inside a grid or fixed container.
pub struct PositionalChildKind {
    layout: Layout,
    position: Cell<Position>,
    placed: Cell<Option<Placed>>,
    sync: OnceCell<Rc<DeferredAction>>,
}

impl PositionalChildKind {
    /// Creates the marker behaviour.
    #[must_use]
    pub fn new(layout: Layout) -> Self {
        let position = match layout {
            Layout::Grid => Position::Cell(GridCell::new(0, 0)),
            Layout::Fixed => Position::Point { x: 0.0, y: 0.0 },
        };
        Self {
            layout,
            position: Cell::new(position),
            placed: Cell::new(None),
            sync: OnceCell::new(),
        }
    }

    /// The current coordinates.
    #[must_use]
    pub fn position(&self) -> Position {
        self.position.get()
    }

    fn schedule_sync(&self, node: &Node) {
        let action = self.sync.get_or_init(|| {
            node.action(Priority::Normal, "place child", |node| {
                match node.kind_as::<Self>() {
                    Some(kind) => kind.place(node),
                    None => Ok(()),
                }
            })
        });
        scheduler::schedule(action);
    }

    fn place(&self, node: &Node) -> Result<()> {
        let toolkit = node.toolkit().as_ref();
        let parent = node.parent().and_then(|parent| parent.handle());
        let widget = node.widget();
        let position = self.position.get();
        let previous = self.placed.get();

        let (Some(parent), Some(widget)) = (parent, widget) else {
            if let Some(previous) = previous {
                unplace(toolkit, previous)?;
                self.placed.set(None);
            }
            return Ok(());
        };

        if let Some(previous) = previous {
            let same = previous.parent == parent
                && previous.widget == widget
                && toolkit.parent(widget) == Some(parent);
            if same && previous.position == position {
                return Ok(());
            }
            if same {
                if let Position::Point { x, y } = position {
                    toolkit.child_op(parent, ChildOp::Move { child: widget, x, y })?;
                    self.placed.set(Some(Placed { position, ..previous }));
                    return Ok(());
                }
            }
            unplace(toolkit, previous)?;
        }

        let op = match position {
            Position::Cell(cell) => ChildOp::Attach { child: widget, cell },
            Position::Point { x, y } => ChildOp::Put { child: widget, x, y },
        };
        toolkit.child_op(parent, op)?;
        self.placed.set(Some(Placed {
            parent,
            widget,
            position,
        }));
        Ok(())
    }

    fn unplace_later(&self, node: &Node) {
        let Some(placed) = self.placed.take() else {
            return;
        };
        let toolkit = Rc::clone(node.toolkit());
        scheduler::defer(Priority::High, "unplace child", move || {
            if let Err(error) = unplace(toolkit.as_ref(), placed) {
                error!(%error, "failed to remove positioned child");
            }
        });
    }
}

fn unplace(toolkit: &dyn Toolkit, placed: Placed) -> Result<()> {
    if toolkit.parent(placed.widget) == Some(placed.parent) {
        toolkit.child_op(
            placed.parent,
            ChildOp::Remove {
                child: placed.widget,
            },
        )?;
    }
    Ok(())
}

impl NodeKind for PositionalChildKind {
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

    fn attached(&self, node: &Node, _parent: &Node) -> Result<()> {
        self.schedule_sync(node);
        Ok(())
    }

    fn detached(&self, node: &Node, _parent: &Node) {
        self.unplace_later(node);
    }

    fn child_inserted(&self, node: &Node, _child: &Node, _before: Option<&Node>) -> Result<()> {
        self.schedule_sync(node);
        Ok(())
    }

    fn child_removed(&self, node: &Node, _child: &Node) {
        self.unplace_later(node);
        self.schedule_sync(node);
    }

    fn update(&self, node: &Node, _old: &Props, new: &Props) -> Result<()> {
        let position = Position::parse(self.layout, node.type_name(), new)?;
        if self.position.replace(position) != position && node.parent().is_some() {
            self.schedule_sync(node);
        }
        Ok(())
    }
}
