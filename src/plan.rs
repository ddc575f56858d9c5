//! Plan computation.
//!
//! [`plan`] turns a prior state and a configuration into the planned state
//! the host will show and later apply:
//!
//! - configured values are taken as-is
//! - null computed attributes get their default, their plan modifier result,
//!   or the prior value
//! - sets that are equal to the prior value keep the prior ordering
//! - the diff against the prior state uses set-aware equality, so reordering
//!   a set literal produces no change
//!
//! Computed attributes without default or modifier are planned unknown on
//! create. On update they keep the prior value unless something else changed,
//! in which case they become unknown since the server may recompute them.

use crate::schema::{
    AttributeType, Block, BlockNestingMode, NestedBlock, PlanModifier, Schema,
};
use crate::types::{AttributeChange, PlanResult};
use crate::value::{multiset_eq, unknown};
use serde_json::{Map, Value};

/// Compute the planned state and the changes it implies.
///
/// A null `config` plans destruction; `prior` is `None` (or null) on create.
pub fn plan(schema: &Schema, prior: Option<&Value>, config: &Value) -> PlanResult {
    let prior = prior.filter(|p| !p.is_null());

    if config.is_null() {
        return match prior {
            Some(p) => PlanResult::with_changes(
                Value::Null,
                vec![AttributeChange::removed("", p.clone())],
                false,
            ),
            None => PlanResult::no_change(Value::Null),
        };
    }

    let empty = Map::new();
    let config_obj = config.as_object().unwrap_or(&empty);
    let prior_obj = prior.and_then(Value::as_object);
    let creating = prior_obj.is_none();

    let mut volatile = Vec::new();
    let mut planned = plan_block(&schema.block, prior_obj, config_obj, creating, &mut volatile);
    let mut changes = diff_block(&schema.block, prior_obj, &planned);

    if !creating && !changes.is_empty() && !volatile.is_empty() {
        for name in &volatile {
            planned.insert(name.clone(), unknown());
        }
        changes = diff_block(&schema.block, prior_obj, &planned);
    }

    let requires_replace = !creating
        && changes.iter().any(|change| {
            schema
                .block
                .attributes
                .get(&change.path)
                .is_some_and(|attr| attr.force_new)
        });

    let planned = Value::Object(planned);
    if changes.is_empty() {
        PlanResult::no_change(planned)
    } else {
        PlanResult::with_changes(planned, changes, requires_replace)
    }
}

fn plan_block(
    block: &Block,
    prior: Option<&Map<String, Value>>,
    config: &Map<String, Value>,
    creating: bool,
    volatile: &mut Vec<String>,
) -> Map<String, Value> {
    let mut planned = Map::new();
    let prior_value = |name: &str| {
        prior
            .and_then(|p| p.get(name))
            .filter(|v| !v.is_null())
            .cloned()
    };

    for (name, attr) in &block.attributes {
        let configured = config.get(name).filter(|v| !v.is_null());
        let value = match configured {
            Some(v) => keep_prior_order(&attr.attr_type, v, prior_value(name)),
            None if attr.flags.computed => {
                if let Some(default) = &attr.default {
                    default.clone()
                } else if let Some(default) = bool_default_on_create(&attr.plan_modifiers) {
                    if creating {
                        Value::Bool(default)
                    } else {
                        prior_value(name).unwrap_or(Value::Null)
                    }
                } else if attr.plan_modifiers.contains(&PlanModifier::UseStateForUnknown) {
                    prior_value(name).unwrap_or_else(unknown)
                } else if creating {
                    unknown()
                } else {
                    volatile.push(name.clone());
                    prior_value(name).unwrap_or_else(unknown)
                }
            },
            None => Value::Null,
        };
        planned.insert(name.clone(), value);
    }

    for (name, nested) in &block.blocks {
        let prior_nested = prior_value(name);
        let value = match config.get(name).filter(|v| !v.is_null()) {
            Some(v) => plan_nested(nested, prior_nested, v),
            None if nested.computed => plan_nested_default(nested, prior_nested, creating),
            None => Value::Null,
        };
        planned.insert(name.clone(), value);
    }

    planned
}

fn bool_default_on_create(modifiers: &[PlanModifier]) -> Option<bool> {
    modifiers.iter().find_map(|m| match m {
        PlanModifier::BoolDefaultOnCreate(default) => Some(*default),
        PlanModifier::UseStateForUnknown => None,
    })
}

fn plan_nested(nested: &NestedBlock, prior: Option<Value>, config: &Value) -> Value {
    match (nested.nesting_mode, config) {
        (BlockNestingMode::Single, Value::Object(cfg)) => {
            let prior_obj = prior.as_ref().and_then(Value::as_object);
            let mut ignored = Vec::new();
            Value::Object(plan_block(
                &nested.block,
                prior_obj,
                cfg,
                prior_obj.is_none(),
                &mut ignored,
            ))
        },
        (BlockNestingMode::List | BlockNestingMode::Set, Value::Array(items)) => {
            let mut ignored = Vec::new();
            let planned = Value::Array(
                items
                    .iter()
                    .map(|item| match item {
                        Value::Object(cfg) => {
                            Value::Object(plan_block(&nested.block, None, cfg, true, &mut ignored))
                        },
                        other => other.clone(),
                    })
                    .collect(),
            );
            match prior {
                Some(prior) if nested_equal(nested, &prior, &planned) => prior,
                _ => planned,
            }
        },
        // unknown sentinel or a shape validation already rejected
        _ => config.clone(),
    }
}

fn plan_nested_default(nested: &NestedBlock, prior: Option<Value>, creating: bool) -> Value {
    match nested.nesting_mode {
        BlockNestingMode::Single => {
            let prior_obj = prior.as_ref().and_then(Value::as_object);
            let mut ignored = Vec::new();
            Value::Object(plan_block(
                &nested.block,
                prior_obj,
                &Map::new(),
                creating || prior_obj.is_none(),
                &mut ignored,
            ))
        },
        BlockNestingMode::List | BlockNestingMode::Set => Value::Array(Vec::new()),
    }
}

fn keep_prior_order(ty: &AttributeType, planned: &Value, prior: Option<Value>) -> Value {
    match (ty, prior) {
        (AttributeType::Set(_), Some(prior)) if attr_equal(ty, &prior, planned) => prior,
        _ => planned.clone(),
    }
}

fn diff_block(
    block: &Block,
    prior: Option<&Map<String, Value>>,
    planned: &Map<String, Value>,
) -> Vec<AttributeChange> {
    let get = |map: Option<&Map<String, Value>>, name: &str| {
        map.and_then(|m| m.get(name))
            .cloned()
            .unwrap_or(Value::Null)
    };

    let mut changes = Vec::new();
    let mut push = |name: &str, before: Value, after: Value| {
        let before = (!before.is_null()).then_some(before);
        let after = (!after.is_null()).then_some(after);
        changes.push(AttributeChange::new(name, before, after));
    };

    for (name, attr) in &block.attributes {
        let before = get(prior, name);
        let after = get(Some(planned), name);
        if !attr_equal(&attr.attr_type, &before, &after) {
            push(name, before, after);
        }
    }
    for (name, nested) in &block.blocks {
        let before = get(prior, name);
        let after = get(Some(planned), name);
        if !nested_equal(nested, &before, &after) {
            push(name, before, after);
        }
    }
    changes
}

/// Structural equality of two attribute values of the given type.
///
/// Sets compare as multisets. A missing object field equals `null`.
pub fn attr_equal(ty: &AttributeType, a: &Value, b: &Value) -> bool {
    match (ty, a, b) {
        (AttributeType::Set(el), Value::Array(x), Value::Array(y)) => {
            multiset_eq(x, y, |x, y| attr_equal(el, x, y))
        },
        (AttributeType::List(el), Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(x, y)| attr_equal(el, x, y))
        },
        (AttributeType::Object(fields), Value::Object(x), Value::Object(y)) => {
            fields.iter().all(|(name, ty)| {
                attr_equal(
                    ty,
                    x.get(name).unwrap_or(&Value::Null),
                    y.get(name).unwrap_or(&Value::Null),
                )
            })
        },
        _ => a == b,
    }
}

fn block_equal(block: &Block, a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Object(x), Value::Object(y)) => {
            let get = |m: &Map<String, Value>, n: &str| m.get(n).cloned().unwrap_or(Value::Null);
            block
                .attributes
                .iter()
                .all(|(name, attr)| attr_equal(&attr.attr_type, &get(x, name), &get(y, name)))
                && block
                    .blocks
                    .iter()
                    .all(|(name, nested)| nested_equal(nested, &get(x, name), &get(y, name)))
        },
        _ => a == b,
    }
}

fn nested_equal(nested: &NestedBlock, a: &Value, b: &Value) -> bool {
    match (nested.nesting_mode, a, b) {
        (BlockNestingMode::Single, _, _) => block_equal(&nested.block, a, b),
        (BlockNestingMode::List, Value::Array(x), Value::Array(y)) => {
            x.len() == y.len()
                && x.iter()
                    .zip(y)
                    .all(|(x, y)| block_equal(&nested.block, x, y))
        },
        (BlockNestingMode::Set, Value::Array(x), Value::Array(y)) => {
            multiset_eq(x, y, |x, y| block_equal(&nested.block, x, y))
        },
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, AttributeFlags, NestedBlock};
    use crate::value::UNKNOWN_SENTINEL;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::numeric_id())
            .with_attribute("name", Attribute::required_string())
            .with_attribute(
                "inventory_interval",
                Attribute::optional_int64().with_default(json!(86400)),
            )
            .with_attribute(
                "legacy_profiles_via_ddm",
                Attribute::optional_bool().bool_default_on_create(true),
            )
            .with_attribute(
                "platforms",
                Attribute::new(
                    AttributeType::set(AttributeType::String),
                    AttributeFlags::required(),
                ),
            )
            .with_attribute(
                "slug",
                Attribute::computed_string(),
            )
            .with_attribute("kind", Attribute::optional_string().with_force_new())
    }

    #[test]
    fn test_create_applies_defaults_and_unknowns() {
        let result = plan(
            &schema(),
            None,
            &json!({"name": "default", "platforms": ["macOS"]}),
        );
        let planned = &result.planned_state;

        assert_eq!(planned["id"], json!(UNKNOWN_SENTINEL));
        assert_eq!(planned["slug"], json!(UNKNOWN_SENTINEL));
        assert_eq!(planned["inventory_interval"], json!(86400));
        assert_eq!(planned["legacy_profiles_via_ddm"], json!(true));
        assert_eq!(planned["kind"], Value::Null);
        assert!(!result.requires_replace);
        assert!(result
            .changes
            .iter()
            .all(|c| c.before.is_none() && c.after.is_some()));
    }

    #[test]
    fn test_no_diff_after_apply() {
        let state = json!({
            "id": 3,
            "name": "default",
            "inventory_interval": 86400,
            "legacy_profiles_via_ddm": true,
            "platforms": ["macOS", "iOS"],
            "slug": "default",
            "kind": null
        });
        let result = plan(
            &schema(),
            Some(&state),
            &json!({"name": "default", "platforms": ["iOS", "macOS"]}),
        );
        assert!(result.changes.is_empty(), "{:?}", result.changes);
        assert_eq!(result.planned_state, state);
    }

    #[test]
    fn test_bool_default_only_on_create() {
        let state = json!({
            "id": 3,
            "name": "default",
            "inventory_interval": 86400,
            "legacy_profiles_via_ddm": false,
            "platforms": ["macOS"],
            "slug": "default",
            "kind": null
        });
        let result = plan(
            &schema(),
            Some(&state),
            &json!({"name": "default", "platforms": ["macOS"]}),
        );
        assert_eq!(result.planned_state["legacy_profiles_via_ddm"], json!(false));
        assert!(result.changes.is_empty());
    }

    #[test]
    fn test_update_marks_volatile_computed_unknown() {
        let state = json!({
            "id": 3,
            "name": "default",
            "inventory_interval": 86400,
            "legacy_profiles_via_ddm": true,
            "platforms": ["macOS"],
            "slug": "default",
            "kind": null
        });
        let result = plan(
            &schema(),
            Some(&state),
            &json!({"name": "renamed", "platforms": ["macOS"]}),
        );
        let planned = &result.planned_state;
        assert_eq!(planned["id"], json!(3));
        assert_eq!(planned["slug"], json!(UNKNOWN_SENTINEL));
        let paths: Vec<_> = result.changes.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["name", "slug"]);
        assert!(!result.requires_replace);
    }

    #[test]
    fn test_force_new_requires_replace() {
        let state = json!({
            "id": 3,
            "name": "default",
            "inventory_interval": 86400,
            "legacy_profiles_via_ddm": true,
            "platforms": ["macOS"],
            "slug": "default",
            "kind": "a"
        });
        let result = plan(
            &schema(),
            Some(&state),
            &json!({"name": "default", "platforms": ["macOS"], "kind": "b"}),
        );
        assert!(result.requires_replace);
    }

    #[test]
    fn test_destroy() {
        let state = json!({"id": 3, "name": "default"});
        let result = plan(&schema(), Some(&state), &Value::Null);
        assert_eq!(result.planned_state, Value::Null);
        assert_eq!(result.changes.len(), 1);
        assert!(result.changes[0].after.is_none());

        let result = plan(&schema(), None, &Value::Null);
        assert!(result.changes.is_empty());
    }

    #[test]
    fn test_computed_single_block_defaults() {
        let schema = Schema::v0()
            .with_attribute("name", Attribute::required_string())
            .with_block(
                "http",
                NestedBlock::single(
                    Block::new()
                        .with_attribute("endpoint_url", Attribute::required_string())
                        .with_attribute(
                            "concurrency",
                            Attribute::optional_int64().with_default(json!(1)),
                        ),
                ),
            )
            .with_block(
                "event_filters",
                NestedBlock::single(
                    Block::new().with_block(
                        "included_event_filters",
                        NestedBlock::set(
                            Block::new()
                                .with_attribute("event_type", Attribute::optional_string()),
                        )
                        .with_computed_default(),
                    ),
                )
                .with_computed_default(),
            );

        let result = plan(
            &schema,
            None,
            &json!({"name": "s", "http": {"endpoint_url": "https://ex/post"}}),
        );
        assert_eq!(
            result.planned_state,
            json!({
                "name": "s",
                "http": {"endpoint_url": "https://ex/post", "concurrency": 1},
                "event_filters": {"included_event_filters": []}
            })
        );
    }

    #[test]
    fn test_set_block_keeps_prior_order() {
        let schema = Schema::v0().with_block(
            "headers",
            NestedBlock::set(
                Block::new()
                    .with_attribute("name", Attribute::required_string())
                    .with_attribute("value", Attribute::required_string()),
            ),
        );
        let prior = json!({"headers": [
            {"name": "a", "value": "1"},
            {"name": "b", "value": "2"}
        ]});
        let config = json!({"headers": [
            {"name": "b", "value": "2"},
            {"name": "a", "value": "1"}
        ]});
        let result = plan(&schema, Some(&prior), &config);
        assert!(result.changes.is_empty());
        assert_eq!(result.planned_state, prior);
    }

    #[test]
    fn test_list_of_lists_is_ordered() {
        let filter = AttributeType::object([
            ("attribute", AttributeType::String),
            ("operator", AttributeType::String),
            ("values", AttributeType::set(AttributeType::String)),
        ]);
        let ty = AttributeType::list(AttributeType::list(filter));

        let a = json!([[{"attribute": "x", "operator": "IN", "values": ["1", "2"]}]]);
        let b = json!([[{"attribute": "x", "operator": "IN", "values": ["2", "1"]}]]);
        assert!(attr_equal(&ty, &a, &b));

        let c = json!([
            [{"attribute": "x", "operator": "IN", "values": ["1"]}],
            [{"attribute": "y", "operator": "IN", "values": ["1"]}]
        ]);
        let d = json!([
            [{"attribute": "y", "operator": "IN", "values": ["1"]}],
            [{"attribute": "x", "operator": "IN", "values": ["1"]}]
        ]);
        assert!(!attr_equal(&ty, &c, &d));
    }
}
