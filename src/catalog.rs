//! The fixed catalog of widget classes and their child-attachment capabilities.
//!
//! Binding generation is out of scope: the catalog is consumed as a declaration of which
//! attachment primitives and named slot setters each class exposes. Capabilities and slots are
//! inherited down the parent chain, so a subclass only declares what it adds.

use core::fmt;
use core::ops::{BitOr, BitOrAssign};
use std::collections::HashMap;

use crate::native::Toolkit;

/// Set of child-attachment primitives a widget class supports.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Capabilities(u32);

impl Capabilities {
    /// No attachment primitives.
    pub const NONE: Self = Self(0);
    /// `append(child)`.
    pub const APPEND: Self = Self(1);
    /// `prepend(child)`.
    pub const PREPEND: Self = Self(1 << 1);
    /// `insert_child_after(child, sibling)`.
    pub const INSERT_AFTER: Self = Self(1 << 2);
    /// `reorder_child_after(child, sibling)`: relocation without detaching.
    pub const REORDER: Self = Self(1 << 3);
    /// `remove(child)`.
    pub const REMOVE: Self = Self(1 << 4);
    /// `attach(child, column, row, width, height)`.
    pub const ATTACH: Self = Self(1 << 5);
    /// `put(child, x, y)` and `move(child, x, y)`.
    pub const PUT: Self = Self(1 << 6);
    /// Renders a list model through a recycling item factory.
    pub const LIST_MODEL: Self = Self(1 << 7);

    /// Every primitive of an ordered box-like container.
    pub const ORDERED: Self = Self(
        Self::APPEND.0 | Self::PREPEND.0 | Self::INSERT_AFTER.0 | Self::REORDER.0 | Self::REMOVE.0,
    );

    const NAMES: [(Self, &'static str); 8] = [
        (Self::APPEND, "append"),
        (Self::PREPEND, "prepend"),
        (Self::INSERT_AFTER, "insert_child_after"),
        (Self::REORDER, "reorder_child_after"),
        (Self::REMOVE, "remove"),
        (Self::ATTACH, "attach"),
        (Self::PUT, "put"),
        (Self::LIST_MODEL, "list_model"),
    ];

    /// Returns `true` if every primitive of `other` is in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if any primitive of `other` is in `self`.
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Returns `true` if no primitive is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns the union of both sets.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl BitOr for Capabilities {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOrAssign for Capabilities {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(rhs);
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut set = f.debug_set();
        for (flag, name) in Self::NAMES {
            if self.contains(flag) && !flag.is_empty() {
                set.entry(&name);
            }
        }
        set.finish()
    }
}

/// Declaration of one widget class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetClass {
    name: String,
    parent: Option<String>,
    capabilities: Capabilities,
    slots: Vec<String>,
    toplevel: bool,
}

impl WidgetClass {
    /// Declares a class with no parent, capabilities or slots.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            capabilities: Capabilities::NONE,
            slots: Vec::new(),
            toplevel: false,
        }
    }

    /// Sets the parent class.
    #[must_use]
    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Adds attachment primitives.
    #[must_use]
    pub fn capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities |= capabilities;
        self
    }

    /// Adds named slot setters.
    #[must_use]
    pub fn slots(mut self, slots: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.slots.extend(slots.into_iter().map(Into::into));
        self
    }

    /// Marks the class as a toplevel window.
    #[must_use]
    pub const fn toplevel(mut self) -> Self {
        self.toplevel = true;
        self
    }

    /// Returns the class name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared parent class.
    #[must_use]
    pub fn parent_name(&self) -> Option<&str> {
        self.parent.as_deref()
    }
}

/// A class with everything it inherits folded in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassInfo {
    /// The catalog class the runtime type resolved to.
    pub name: String,
    /// Inherited and declared attachment primitives.
    pub capabilities: Capabilities,
    /// Inherited and declared slot setters, most derived first.
    pub slots: Vec<String>,
    /// Whether instances are toplevel windows.
    pub toplevel: bool,
}

impl ClassInfo {
    /// Returns `true` if the class has a setter for `slot`.
    #[must_use]
    pub fn has_slot(&self, slot: &str) -> bool {
        self.slots.iter().any(|candidate| candidate == slot)
    }
}

/// Widget classes known at binding time.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    classes: HashMap<String, WidgetClass>,
}

impl Catalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a class, replacing any previous declaration with the same name.
    #[must_use]
    pub fn with(mut self, class: WidgetClass) -> Self {
        self.insert(class);
        self
    }

    /// Adds a class, replacing any previous declaration with the same name.
    pub fn insert(&mut self, class: WidgetClass) {
        self.classes.insert(class.name.clone(), class);
    }

    /// Looks up a declared class.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&WidgetClass> {
        self.classes.get(name)
    }

    /// Iterates over the declared class names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }

    /// Resolves a runtime type to its nearest catalog ancestor and folds in inherited
    /// capabilities and slots.
    ///
    /// Types unknown to the catalog are walked up through [`Toolkit::type_parent`], since the
    /// toolkit's type system admits subclasses the catalog never declared.
    #[must_use]
    pub fn resolve(&self, toolkit: &dyn Toolkit, type_name: &str) -> Option<ClassInfo> {
        let mut current = type_name.to_owned();
        let class = loop {
            if let Some(class) = self.classes.get(&current) {
                break class;
            }
            current = toolkit.type_parent(&current)?;
        };

        let mut info = ClassInfo {
            name: class.name.clone(),
            capabilities: Capabilities::NONE,
            slots: Vec::new(),
            toplevel: false,
        };
        let mut next = Some(class);
        while let Some(class) = next {
            info.capabilities |= class.capabilities;
            for slot in &class.slots {
                if !info.has_slot(slot) {
                    info.slots.push(slot.clone());
                }
            }
            info.toplevel |= class.toplevel;
            next = class.parent.as_deref().and_then(|parent| self.classes.get(parent));
        }
        Some(info)
    }

    /// The GTK 4 style classes the bridge ships with.
    #[must_use]
    pub fn gtk() -> Self {
        let ordered = Capabilities::ORDERED;
        let list = Capabilities::APPEND
            | Capabilities::PREPEND
            | Capabilities::INSERT_AFTER
            | Capabilities::REMOVE;

        Self::new()
            .with(WidgetClass::new("GtkWidget"))
            .with(WidgetClass::new("GtkBox").parent("GtkWidget").capabilities(ordered))
            .with(WidgetClass::new("GtkListBox").parent("GtkWidget").capabilities(list))
            .with(WidgetClass::new("GtkFlowBox").parent("GtkWidget").capabilities(list))
            .with(
                WidgetClass::new("GtkWindow")
                    .parent("GtkWidget")
                    .slots(["child", "titlebar"])
                    .toplevel(),
            )
            .with(WidgetClass::new("GtkApplicationWindow").parent("GtkWindow"))
            .with(WidgetClass::new("AdwWindow").parent("GtkWindow").slots(["content"]))
            .with(WidgetClass::new("GtkScrolledWindow").parent("GtkWidget").slots(["child"]))
            .with(
                WidgetClass::new("GtkFrame")
                    .parent("GtkWidget")
                    .slots(["child", "label_widget"]),
            )
            .with(
                WidgetClass::new("GtkExpander")
                    .parent("GtkWidget")
                    .slots(["child", "label_widget"]),
            )
            .with(WidgetClass::new("GtkButton").parent("GtkWidget").slots(["child"]))
            .with(WidgetClass::new("GtkToggleButton").parent("GtkButton"))
            .with(WidgetClass::new("GtkLabel").parent("GtkWidget"))
            .with(WidgetClass::new("GtkEntry").parent("GtkWidget"))
            .with(WidgetClass::new("GtkSwitch").parent("GtkWidget"))
            .with(WidgetClass::new("GtkCheckButton").parent("GtkWidget"))
            .with(
                WidgetClass::new("GtkGrid")
                    .parent("GtkWidget")
                    .capabilities(Capabilities::ATTACH | Capabilities::REMOVE),
            )
            .with(
                WidgetClass::new("GtkFixed")
                    .parent("GtkWidget")
                    .capabilities(Capabilities::PUT | Capabilities::REMOVE),
            )
            .with(
                WidgetClass::new("GtkPaned")
                    .parent("GtkWidget")
                    .slots(["start_child", "end_child"]),
            )
            .with(
                WidgetClass::new("GtkCenterBox")
                    .parent("GtkWidget")
                    .slots(["start_widget", "center_widget", "end_widget"]),
            )
            .with(
                WidgetClass::new("GtkListView")
                    .parent("GtkWidget")
                    .capabilities(Capabilities::LIST_MODEL),
            )
            .with(
                WidgetClass::new("GtkGridView")
                    .parent("GtkWidget")
                    .capabilities(Capabilities::LIST_MODEL),
            )
            .with(WidgetClass::new("GtkListItem").slots(["child"]))
            .with(WidgetClass::new("GtkStringList"))
            .with(WidgetClass::new("GtkSignalListItemFactory"))
    }
}

#[cfg(test)]
mod tests {
    use super::{Capabilities, Catalog};
    use crate::native::headless::HeadlessToolkit;

    #[test]
    fn subclasses_inherit_slots_and_toplevel() {
        let toolkit = HeadlessToolkit::new();
        let catalog = Catalog::gtk();
        let info = catalog.resolve(&toolkit, "AdwWindow").unwrap();
        assert_eq!(info.slots, ["content", "child", "titlebar"]);
        assert!(info.toplevel);
    }

    #[test]
    fn runtime_subclasses_resolve_through_the_toolkit() {
        let toolkit = HeadlessToolkit::new();
        toolkit.define_type("FancyBox", "GtkBox");
        let info = Catalog::gtk().resolve(&toolkit, "FancyBox").unwrap();
        assert_eq!(info.name, "GtkBox");
        assert!(info.capabilities.contains(Capabilities::REORDER));
    }

    #[test]
    fn unknown_types_do_not_resolve() {
        let toolkit = HeadlessToolkit::new();
        assert!(Catalog::gtk().resolve(&toolkit, "NotAWidget").is_none());
    }
}
