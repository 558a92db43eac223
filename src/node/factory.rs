use std::rc::Rc;

use crate::Result;
use crate::catalog::{Capabilities, ClassInfo};
use crate::list::view::{ListItemClass, ListViewClass};
use crate::runtime::Runtime;

use super::NodeKind;
use super::positional::{Layout, PositionalChildKind, PositionalContainerKind};
use super::slot::SlotKind;
use super::snake_case;
use super::widget;

/// What a node class gets to see of an element type when matching.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    /// The element type, e.g. `GtkBox` or `GtkPaned.StartChild`.
    pub type_name: &'a str,
    /// The catalog class the type resolves to, if it names a widget.
    pub class: Option<&'a ClassInfo>,
    /// For `Owner.Suffix` marker types whose owner resolves: the owner class and the suffix.
    pub marker: Option<(&'a ClassInfo, &'a str)>,
}

/// A node variant that can be selected for an element type.
pub trait NodeClass {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Higher priorities win when several classes match.
    fn priority(&self) -> i32;

    /// Returns `true` if this class can build nodes for the candidate.
    fn matches(&self, candidate: &Candidate<'_>) -> bool;

    /// Virtual classes build nodes without a native widget.
    fn is_virtual(&self) -> bool {
        false
    }

    /// Builds the behaviour of a new node.
    ///
    /// # Errors
    ///
    /// Returns an error when the candidate cannot be served after all.
    fn kind(&self, runtime: &Rc<Runtime>, candidate: &Candidate<'_>) -> Result<Box<dyn NodeKind>>;
}

/// Priority-ranked registry of node classes.
#[derive(Default)]
pub struct NodeFactory {
    classes: Vec<Box<dyn NodeClass>>,
}

impl core::fmt::Debug for NodeFactory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list()
            .entries(self.classes.iter().map(|class| (class.name(), class.priority())))
            .finish()
    }
}

impl NodeFactory {
    /// Creates an empty factory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a factory with every built-in node class.
    #[must_use]
    pub fn builtin() -> Self {
        let mut factory = Self::new();
        factory.register(WidgetNodeClass);
        factory.register(WindowNodeClass);
        factory.register(SlotNodeClass);
        factory.register(PositionalContainerClass);
        factory.register(PositionalChildClass);
        factory.register(ListViewClass);
        factory.register(ListItemClass);
        factory
    }

    /// Adds a node class. Among equal priorities the earlier registration wins.
    pub fn register(&mut self, class: impl NodeClass + 'static) {
        let priority = class.priority();
        let index = self
            .classes
            .iter()
            .position(|existing| existing.priority() < priority)
            .unwrap_or(self.classes.len());
        self.classes.insert(index, Box::new(class));
    }

    /// Returns the highest-priority class matching the candidate.
    #[must_use]
    pub fn select(&self, candidate: &Candidate<'_>) -> Option<&dyn NodeClass> {
        self.classes
            .iter()
            .find(|class| class.matches(candidate))
            .map(|class| &**class)
    }
}

/// Any catalog widget. Picks the structural category from the class capabilities.
struct WidgetNodeClass;

impl NodeClass for WidgetNodeClass {
    fn name(&self) -> &'static str {
        "widget"
    }

    fn priority(&self) -> i32 {
        0
    }

    fn matches(&self, candidate: &Candidate<'_>) -> bool {
        candidate.class.is_some()
    }

    fn kind(&self, _runtime: &Rc<Runtime>, candidate: &Candidate<'_>) -> Result<Box<dyn NodeKind>> {
        let Some(class) = candidate.class else {
            return Ok(Box::new(widget::LeafKind));
        };
        Ok(widget::kind_for(class))
    }
}

/// Toplevel windows: single content plus named slots, shown when mounted.
struct WindowNodeClass;

impl NodeClass for WindowNodeClass {
    fn name(&self) -> &'static str {
        "window"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn matches(&self, candidate: &Candidate<'_>) -> bool {
        candidate.class.is_some_and(|class| class.toplevel)
    }

    fn kind(&self, _runtime: &Rc<Runtime>, candidate: &Candidate<'_>) -> Result<Box<dyn NodeKind>> {
        let slot = candidate
            .class
            .and_then(widget::content_slot)
            .unwrap_or("child");
        Ok(Box::new(widget::SingleKind::window(slot)))
    }
}

/// `Owner.SlotName` markers.
struct SlotNodeClass;

impl NodeClass for SlotNodeClass {
    fn name(&self) -> &'static str {
        "slot"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn matches(&self, candidate: &Candidate<'_>) -> bool {
        candidate.class.is_none() && candidate.marker.is_some()
    }

    fn is_virtual(&self) -> bool {
        true
    }

    fn kind(&self, _runtime: &Rc<Runtime>, candidate: &Candidate<'_>) -> Result<Box<dyn NodeKind>> {
        let suffix = candidate.marker.map_or("", |(_, suffix)| suffix);
        Ok(Box::new(SlotKind::new(snake_case(suffix))))
    }
}

fn layout_of(class: &ClassInfo) -> Option<Layout> {
    if class.capabilities.contains(Capabilities::ATTACH) {
        Some(Layout::Grid)
    } else if class.capabilities.contains(Capabilities::PUT) {
        Some(Layout::Fixed)
    } else {
        None
    }
}

/// Grid and fixed containers.
struct PositionalContainerClass;

impl NodeClass for PositionalContainerClass {
    fn name(&self) -> &'static str {
        "positional container"
    }

    fn priority(&self) -> i32 {
        20
    }

    fn matches(&self, candidate: &Candidate<'_>) -> bool {
        candidate.class.and_then(layout_of).is_some()
    }

    fn kind(&self, _runtime: &Rc<Runtime>, candidate: &Candidate<'_>) -> Result<Box<dyn NodeKind>> {
        let layout = candidate.class.and_then(layout_of).unwrap_or(Layout::Fixed);
        Ok(Box::new(PositionalContainerKind::new(layout)))
    }
}

/// `Owner.Child` markers of grid and fixed containers, carrying coordinates.
struct PositionalChildClass;

impl NodeClass for PositionalChildClass {
    fn name(&self) -> &'static str {
        "positional child"
    }

    fn priority(&self) -> i32 {
        20
    }

    fn matches(&self, candidate: &Candidate<'_>) -> bool {
        candidate.class.is_none()
            && candidate
                .marker
                .is_some_and(|(owner, suffix)| suffix == "Child" && layout_of(owner).is_some())
    }

    fn is_virtual(&self) -> bool {
        true
    }

    fn kind(&self, _runtime: &Rc<Runtime>, candidate: &Candidate<'_>) -> Result<Box<dyn NodeKind>> {
        let layout = candidate
            .marker
            .and_then(|(owner, _)| layout_of(owner))
            .unwrap_or(Layout::Fixed);
        Ok(Box::new(PositionalChildKind::new(layout)))
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::{Candidate, NodeClass, NodeFactory};
    use crate::Result;
    use crate::catalog::Catalog;
    use crate::native::headless::HeadlessToolkit;
    use crate::node::{NodeKind, widget};
    use crate::runtime::Runtime;

    struct Override;

    impl NodeClass for Override {
        fn name(&self) -> &'static str {
            "override"
        }

        fn priority(&self) -> i32 {
            100
        }

        fn matches(&self, candidate: &Candidate<'_>) -> bool {
            candidate.type_name == "GtkButton"
        }

        fn kind(&self, _runtime: &Rc<Runtime>, _candidate: &Candidate<'_>) -> Result<Box<dyn NodeKind>> {
            Ok(Box::new(widget::LeafKind))
        }
    }

    fn select(factory: &NodeFactory, type_name: &str) -> Option<&'static str> {
        let toolkit = HeadlessToolkit::new();
        let catalog = Catalog::gtk();
        let class = catalog.resolve(&toolkit, type_name);
        let owner = type_name
            .split_once('.')
            .and_then(|(owner, suffix)| catalog.resolve(&toolkit, owner).map(|info| (info, suffix)));
        let candidate = Candidate {
            type_name,
            class: class.as_ref(),
            marker: owner.as_ref().map(|(info, suffix)| (info, *suffix)),
        };
        factory.select(&candidate).map(NodeClass::name)
    }

    #[test]
    fn specialised_classes_outrank_the_fallback() {
        let factory = NodeFactory::builtin();
        assert_eq!(select(&factory, "GtkLabel"), Some("widget"));
        assert_eq!(select(&factory, "AdwWindow"), Some("window"));
        assert_eq!(select(&factory, "GtkGrid"), Some("positional container"));
        assert_eq!(select(&factory, "GtkGrid.Child"), Some("positional child"));
        assert_eq!(select(&factory, "GtkPaned.StartChild"), Some("slot"));
        assert_eq!(select(&factory, "GtkListView"), Some("list view"));
        assert_eq!(select(&factory, "GtkListView.Item"), Some("list item"));
        assert_eq!(select(&factory, "NoSuchWidget"), None);
    }

    #[test]
    fn registered_classes_override_by_priority() {
        let mut factory = NodeFactory::builtin();
        factory.register(Override);
        assert_eq!(select(&factory, "GtkButton"), Some("override"));
        assert_eq!(select(&factory, "GtkLabel"), Some("widget"));
    }
}
