//! Plan results and the other values exchanged with the host.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A change to a single attribute during a plan.
///
/// The empty path stands for the whole object: a destroy plan carries one
/// removal change at `""`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    /// Dotted path of the attribute.
    pub path: String,
    /// Prior value, `None` when the attribute is new.
    pub before: Option<Value>,
    /// Planned value, `None` when the attribute goes away.
    pub after: Option<Value>,
}

impl AttributeChange {
    /// Create a new attribute change.
    pub fn new(path: impl Into<String>, before: Option<Value>, after: Option<Value>) -> Self {
        Self {
            path: path.into(),
            before,
            after,
        }
    }

    /// An attribute that gets a value.
    pub fn added(path: impl Into<String>, value: Value) -> Self {
        Self::new(path, None, Some(value))
    }

    /// An attribute that loses its value.
    pub fn removed(path: impl Into<String>, value: Value) -> Self {
        Self::new(path, Some(value), None)
    }

    /// An attribute whose value changes.
    pub fn modified(path: impl Into<String>, before: Value, after: Value) -> Self {
        Self::new(path, Some(before), Some(after))
    }
}

impl From<AttributeChange> for crate::generated::AttributeChange {
    fn from(change: AttributeChange) -> Self {
        let encode = |v: Option<Value>| {
            v.map(|v| serde_json::to_vec(&v).unwrap_or_default())
                .unwrap_or_default()
        };
        Self {
            path: change.path,
            before: encode(change.before),
            after: encode(change.after),
        }
    }
}

/// The result of a plan operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// The state the apply is expected to produce; `null` for a destroy.
    pub planned_state: Value,
    /// Differences against the prior state.
    pub changes: Vec<AttributeChange>,
    /// Whether the resource must be destroyed and re-created.
    pub requires_replace: bool,
}

impl PlanResult {
    /// A plan that changes nothing.
    pub fn no_change(state: Value) -> Self {
        Self {
            planned_state: state,
            changes: Vec::new(),
            requires_replace: false,
        }
    }

    /// A plan with changes.
    pub fn with_changes(
        planned_state: Value,
        changes: Vec<AttributeChange>,
        requires_replace: bool,
    ) -> Self {
        Self {
            planned_state,
            changes,
            requires_replace,
        }
    }

    /// Whether the plan destroys the resource.
    pub fn is_destroy(&self) -> bool {
        self.planned_state.is_null() && !self.changes.is_empty()
    }
}

/// State produced by an import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    /// Host type name.
    pub resource_type: String,
    /// Full state read from the remote platform.
    pub state: Value,
}

impl ImportedResource {
    /// Create a new imported resource.
    pub fn new(resource_type: impl Into<String>, state: Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }
}

/// Provider metadata returned by GetMetadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    /// Resource type names.
    pub resources: Vec<String>,
    /// Data source type names.
    pub data_sources: Vec<String>,
    /// Server capabilities.
    pub capabilities: ServerCapabilities,
}

/// Server capability flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ServerCapabilities {
    /// Whether Plan accepts a null configuration to plan a destroy.
    pub plan_destroy: bool,
}

/// The protocol version for the handshake.
pub const PROTOCOL_VERSION: u32 = 1;

/// The handshake prefix printed on stdout.
pub const HANDSHAKE_PREFIX: &str = "HEMMER_PROVIDER";

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attribute_change_to_proto() {
        let proto: crate::generated::AttributeChange =
            AttributeChange::modified("collect_apps", json!("NO"), json!("ALL")).into();
        assert_eq!(proto.path, "collect_apps");
        assert_eq!(proto.before, b"\"NO\"".to_vec());
        assert_eq!(proto.after, b"\"ALL\"".to_vec());

        let proto: crate::generated::AttributeChange =
            AttributeChange::added("id", json!(3)).into();
        assert!(proto.before.is_empty());
        assert_eq!(proto.after, b"3".to_vec());
    }

    #[test]
    fn test_plan_result_destroy() {
        let destroy = PlanResult::with_changes(
            Value::Null,
            vec![AttributeChange::removed("", json!({"id": 3}))],
            false,
        );
        assert!(destroy.is_destroy());

        assert!(!PlanResult::no_change(json!({"id": 3})).is_destroy());
        assert!(!PlanResult::no_change(Value::Null).is_destroy());
    }

    #[test]
    fn test_imported_resource() {
        let imported = ImportedResource::new("zentral_tag", json!({"id": 7, "name": "laptops"}));
        assert_eq!(imported.resource_type, "zentral_tag");
        assert_eq!(imported.state["id"], 7);
    }
}
