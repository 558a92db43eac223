#![doc = include_str!("../README.md")]
#![allow(clippy::multiple_crate_versions)]

pub mod catalog;
pub mod config;
pub mod element;
mod error;
pub mod list;
pub mod logging;
pub mod native;
pub mod node;
pub mod reconciler;
pub mod registry;
pub mod runtime;
pub mod scheduler;
pub mod signal;

#[cfg(test)]
mod tests;

pub use config::{Config, FlushPolicy};
pub use element::{Element, Props};
pub use error::Error;
pub use reconciler::{Adapter, HostConfig, Root};
pub use runtime::Runtime;

/// Result type of every fallible bridge operation.
pub type Result<T, E = Error> = core::result::Result<T, E>;

pub mod prelude {
    //! The types needed to render element trees.
    //!
    //! ```
    //! use std::rc::Rc;
    //! use tidewater::native::headless::HeadlessToolkit;
    //! use tidewater::prelude::*;
    //!
    //! let runtime = tidewater::runtime::start(Rc::new(HeadlessToolkit::new()), Config::default());
    //! let mut root = Root::new("main", &runtime);
    //! root.render(Element::new("GtkLabel").prop("label", "hello")).unwrap();
    //! tidewater::runtime::stop();
    //! ```
    pub use crate::catalog::{Capabilities, Catalog, WidgetClass};
    pub use crate::config::{Config, FlushPolicy};
    pub use crate::element::{Element, Props};
    pub use crate::native::{NativeHandle, Toolkit, Value};
    pub use crate::reconciler::Root;
    pub use crate::runtime::Runtime;
    pub use crate::{Error, Result};
}
