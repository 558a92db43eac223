//! List virtualization: an ordered id to value store synced into a native list model, and a
//! cell-recycling engine that renders only the rows the toolkit realizes.

pub mod cell;
pub mod model;
pub mod store;
pub mod view;

pub use cell::{BoundCell, CellState};
pub use model::ListModel;
pub use store::{ListStore, Splice};
pub use view::{ListEngine, ListItemKind, ListViewKind};
