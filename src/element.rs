//! The declarative virtual tree handed to a [`Root`](crate::reconciler::Root).

use core::fmt;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::native::Value;
use crate::signal::SignalHandler;

/// Renders one list item. `None` asks for the placeholder shown by unbound cells.
pub type ItemRenderer = Rc<dyn Fn(Option<&Value>) -> Option<Element>>;

/// Properties of an element: native property values, signal handlers and, for list views,
/// the item renderer.
#[derive(Clone, Default)]
pub struct Props {
    values: BTreeMap<String, Value>,
    handlers: BTreeMap<String, SignalHandler>,
    render_item: Option<ItemRenderer>,
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Props")
            .field("values", &self.values)
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .field("render_item", &self.render_item.is_some())
            .finish()
    }
}

impl Props {
    /// Creates empty properties.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a property value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    /// Sets a signal handler.
    pub fn set_handler(&mut self, event: impl Into<String>, handler: SignalHandler) {
        self.handlers.insert(event.into(), handler);
    }

    /// Sets the list item renderer.
    pub fn set_render_item(&mut self, renderer: ItemRenderer) {
        self.render_item = Some(renderer);
    }

    /// Returns a property value.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Iterates over property values in name order.
    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Returns a signal handler.
    #[must_use]
    pub fn handler(&self, event: &str) -> Option<&SignalHandler> {
        self.handlers.get(event)
    }

    /// Iterates over signal handlers in event order.
    pub fn handlers(&self) -> impl Iterator<Item = (&str, &SignalHandler)> {
        self.handlers
            .iter()
            .map(|(event, handler)| (event.as_str(), handler))
    }

    /// Returns the list item renderer.
    #[must_use]
    pub fn render_item(&self) -> Option<&ItemRenderer> {
        self.render_item.as_ref()
    }
}

/// A virtual element: type, optional key, properties and children.
#[derive(Debug, Clone)]
pub struct Element {
    pub(crate) type_name: String,
    pub(crate) key: Option<String>,
    pub(crate) props: Props,
    pub(crate) children: Vec<Self>,
}

impl Element {
    /// Creates an element of `type_name`, e.g. `GtkBox` or `GtkPaned.StartChild`.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            key: None,
            props: Props::default(),
            children: Vec::new(),
        }
    }

    /// Sets the key that identifies the element among its siblings.
    #[must_use]
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Sets a property value.
    #[must_use]
    pub fn prop(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.set(name, value);
        self
    }

    /// Sets a signal handler from a closure.
    #[must_use]
    pub fn on(
        self,
        event: impl Into<String>,
        handler: impl Fn(&[Value]) -> Option<Value> + 'static,
    ) -> Self {
        self.handler(event, Rc::new(handler))
    }

    /// Sets a shared signal handler.
    #[must_use]
    pub fn handler(mut self, event: impl Into<String>, handler: SignalHandler) -> Self {
        self.props.set_handler(event, handler);
        self
    }

    /// Sets the list item renderer.
    #[must_use]
    pub fn render_item(
        self,
        renderer: impl Fn(Option<&Value>) -> Option<Self> + 'static,
    ) -> Self {
        self.item_renderer(Rc::new(renderer))
    }

    /// Sets a shared list item renderer. Passing the same renderer on every render keeps
    /// bound cells from re-rendering.
    #[must_use]
    pub fn item_renderer(mut self, renderer: ItemRenderer) -> Self {
        self.props.set_render_item(renderer);
        self
    }

    /// Appends a child.
    #[must_use]
    pub fn child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }

    /// Appends children.
    #[must_use]
    pub fn children(mut self, children: impl IntoIterator<Item = Self>) -> Self {
        self.children.extend(children);
        self
    }

    /// The element type.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The sibling key, if any.
    #[must_use]
    pub fn key_str(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// The properties.
    #[must_use]
    pub const fn props(&self) -> &Props {
        &self.props
    }

    /// The children.
    #[must_use]
    pub fn child_elements(&self) -> &[Self] {
        &self.children
    }
}
