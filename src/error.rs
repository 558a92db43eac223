use core::fmt::Write as _;

use thiserror::Error;

use crate::native::{NativeError, NativeHandle};

/// Errors raised while reconciling a virtual tree against the native one.
///
/// Structural, type and capability errors are raised synchronously at the point of misuse and
/// abort the commit that triggered them. They are never retried.
#[derive(Debug, Error)]
pub enum Error {
    /// A child was attached to a container whose capability set does not admit it.
    #[error("{}", describe_structural(.container, .child, .accepted))]
    Structural {
        /// Type name of the container.
        container: String,
        /// Type name of the rejected child.
        child: String,
        /// Names of the child types the container does accept, if it accepts anything.
        accepted: Vec<String>,
    },
    /// No registered wrapper class exists anywhere in a native handle's type chain.
    #[error("native type `{type_name}` ({handle}) has no registered wrapper class in its type chain")]
    UnregisteredType {
        /// The handle that failed to resolve.
        handle: NativeHandle,
        /// The runtime type reported by the toolkit.
        type_name: String,
    },
    /// A slot setter was used on a widget class that does not provide it.
    #[error("`{class}` has no `{capability}` setter")]
    MissingCapability {
        /// Type name of the widget lacking the setter.
        class: String,
        /// Name of the missing setter.
        capability: String,
    },
    /// No node class matches an element type.
    #[error("no node class matches element type `{0}`")]
    UnknownElement(String),
    /// An element is missing a property it cannot work without, or carries one of the wrong type.
    #[error("`{element}` requires a valid `{prop}` property")]
    InvalidProp {
        /// Type name of the element.
        element: String,
        /// The offending property.
        prop: String,
    },
    /// The native toolkit rejected an operation.
    #[error(transparent)]
    Native(#[from] NativeError),
    /// The configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    /// The configuration file could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}

impl Error {
    /// Creates a structural error for `child` being attached to `container`.
    pub fn structural(
        container: impl Into<String>,
        child: impl Into<String>,
        accepted: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self::Structural {
            container: container.into(),
            child: child.into(),
            accepted: accepted.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns `true` for [`Error::Structural`].
    #[must_use]
    pub const fn is_structural(&self) -> bool {
        matches!(self, Self::Structural { .. })
    }
}

fn describe_structural(container: &str, child: &str, accepted: &[String]) -> String {
    if accepted.is_empty() {
        return format!("`{container}` cannot contain `{child}`");
    }
    let mut message = format!("`{container}` accepts only ");
    for (index, name) in accepted.iter().enumerate() {
        if index > 0 {
            message.push_str(", ");
        }
        let _ = write!(message, "`{name}`");
    }
    let _ = write!(message, "; got `{child}`");
    message
}

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn structural_message_lists_accepted_markers() {
        let error = Error::structural(
            "GtkPaned",
            "GtkButton",
            ["GtkPaned.StartChild", "GtkPaned.EndChild"],
        );
        assert_eq!(
            error.to_string(),
            "`GtkPaned` accepts only `GtkPaned.StartChild`, `GtkPaned.EndChild`; got `GtkButton`"
        );
        assert!(error.is_structural());
    }

    #[test]
    fn structural_message_without_accepted_types() {
        let error = Error::structural("GtkLabel", "GtkButton", Vec::<String>::new());
        assert_eq!(error.to_string(), "`GtkLabel` cannot contain `GtkButton`");
    }
}
