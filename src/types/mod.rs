// ABOUTME: Validated domain types for tracked cluster resources.
// ABOUTME: Names and namespaces are checked once, at the edge.

mod kind;
mod namespace;
mod resource_name;

pub use kind::ResourceKind;
pub use namespace::{DEFAULT_NAMESPACE, Namespace, NamespaceError};
pub use resource_name::{ResourceName, ResourceNameError};
