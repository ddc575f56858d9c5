//! Configuration checks run before any request reaches Zentral.
//!
//! [`validate`] walks a configuration alongside its [`Schema`] and reports
//! each problem as a [`Diagnostic`] carrying the dotted attribute path.
//! Tagged-union backends (issuers, stores) rely on the block [`Constraint`]s.
//!
//! Values that are still unknown (see [`crate::value::UNKNOWN_SENTINEL`]) are
//! accepted as-is: they will be known after apply.
//!
//! # Example
//!
//! ```
//! use zentral_provider::schema::{Attribute, Schema, Validator};
//! use zentral_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("name", Attribute::required_string())
//!     .with_attribute(
//!         "shard",
//!         Attribute::optional_int64().with_validator(Validator::between(1, 100)),
//!     );
//!
//! assert!(validate(&schema, &json!({"name": "pack", "shard": 10})).is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"name": "pack", "shard": 0}));
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].attribute, Some("shard".to_string()));
//! ```

use crate::schema::{
    Attribute, AttributeType, Block, BlockNestingMode, Constraint, Diagnostic, DiagnosticSeverity,
    NestedBlock, Schema, Validator,
};
use crate::value::is_unknown;
use serde_json::Value;
use std::collections::BTreeMap;

/// Every problem found in `value`, empty when it conforms to `schema`.
///
/// Presence follows the attribute flags (computed-only attributes are never
/// checked, undeclared ones are rejected). Then come kinds, attribute
/// [`Validator`]s, nested block cardinality and finally the block
/// [`Constraint`]s.
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    validate_block(&schema.block, value, "", &mut diagnostics);
    diagnostics
}

/// [`validate`] as a `Result`.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, value);
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

/// Whether [`validate`] finds nothing.
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate(schema, value).is_empty()
}

fn validate_block(block: &Block, value: &Value, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    let obj = match value {
        Value::Object(map) => map,
        Value::Null => return,
        v if is_unknown(v) => return,
        _ => {
            diagnostics.push(
                Diagnostic::error("Expected object")
                    .with_detail(format!("Got {}", value_type_name(value)))
                    .with_attribute_if_not_empty(path),
            );
            return;
        },
    };

    for name in obj.keys() {
        if !block.has(name) {
            diagnostics.push(
                Diagnostic::error(format!("Unsupported attribute '{}'", join_path(path, name)))
                    .with_detail("An attribute with this name is not expected here")
                    .with_attribute(join_path(path, name)),
            );
        }
    }

    for (name, attr) in &block.attributes {
        let attr_path = join_path(path, name);
        validate_attribute(attr, obj.get(name), &attr_path, diagnostics);
    }

    for (name, nested_block) in &block.blocks {
        let block_path = join_path(path, name);
        validate_nested_block(nested_block, obj.get(name), &block_path, diagnostics);
    }

    for constraint in &block.constraints {
        check_constraint(constraint, obj, path, diagnostics);
    }
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    // provider sets these
    if attr.flags.is_computed_only() {
        return;
    }

    match value {
        None | Some(Value::Null) => {
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", path))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(path),
                );
            }
        },
        Some(v) if is_unknown(v) => {},
        Some(v) => {
            let before = diagnostics.len();
            validate_attribute_type(&attr.attr_type, v, path, diagnostics);
            if diagnostics.len() == before {
                for validator in &attr.validators {
                    apply_validator(validator, v, path, diagnostics);
                }
            }
        },
    }
}

fn validate_attribute_type(
    attr_type: &AttributeType,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if is_unknown(value) {
        return;
    }
    match attr_type {
        AttributeType::String => {
            if !value.is_string() {
                diagnostics.push(type_error(path, "string", value));
            }
        },
        AttributeType::Int64 => {
            if !is_int64(value) {
                diagnostics.push(type_error(path, "int64", value));
            }
        },
        AttributeType::Bool => {
            if !value.is_boolean() {
                diagnostics.push(type_error(path, "bool", value));
            }
        },
        AttributeType::List(element_type) | AttributeType::Set(element_type) => {
            if let Some(arr) = value.as_array() {
                for (i, elem) in arr.iter().enumerate() {
                    let elem_path = format!("{}.{}", path, i);
                    validate_attribute_type(element_type, elem, &elem_path, diagnostics);
                }
            } else {
                let expected = if matches!(attr_type, AttributeType::Set(_)) {
                    "set"
                } else {
                    "list"
                };
                diagnostics.push(type_error(path, expected, value));
            }
        },
        AttributeType::Object(attrs) => {
            if let Some(obj) = value.as_object() {
                validate_object_type(attrs, obj, path, diagnostics);
            } else {
                diagnostics.push(type_error(path, "object", value));
            }
        },
    }
}

fn validate_object_type(
    attrs: &BTreeMap<String, AttributeType>,
    obj: &serde_json::Map<String, Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for (name, attr_type) in attrs {
        let attr_path = join_path(path, name);
        if let Some(value) = obj.get(name) {
            if !value.is_null() {
                validate_attribute_type(attr_type, value, &attr_path, diagnostics);
            }
        }
    }
    for name in obj.keys() {
        if !attrs.contains_key(name) {
            let attr_path = join_path(path, name);
            diagnostics.push(
                Diagnostic::error(format!("Unsupported attribute '{}'", attr_path))
                    .with_attribute(attr_path),
            );
        }
    }
}

fn apply_validator(
    validator: &Validator,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match validator {
        Validator::OneOf { values } => {
            if let Some(s) = value.as_str() {
                if !values.iter().any(|v| v == s) {
                    diagnostics.push(
                        Diagnostic::error(format!("Invalid value for attribute '{}'", path))
                            .with_detail(format!(
                                "Value must be one of: {}, got \"{}\"",
                                values.join(", "),
                                s
                            ))
                            .with_attribute(path),
                    );
                }
            }
        },
        Validator::Int64Between { min, max } => {
            if let Some(n) = value.as_i64() {
                if n < *min || n > *max {
                    diagnostics.push(
                        Diagnostic::error(format!("Invalid value for attribute '{}'", path))
                            .with_detail(format!(
                                "Value must be between {} and {}, got {}",
                                min, max, n
                            ))
                            .with_attribute(path),
                    );
                }
            }
        },
        Validator::LengthBetween { min, max } => {
            if let Some(s) = value.as_str() {
                let len = s.chars().count();
                if len < *min || len > *max {
                    diagnostics.push(
                        Diagnostic::error(format!("Invalid length for attribute '{}'", path))
                            .with_detail(format!(
                                "String length must be between {} and {}, got {}",
                                min, max, len
                            ))
                            .with_attribute(path),
                    );
                }
            }
        },
        Validator::SizeAtLeast { min } => {
            if let Some(arr) = value.as_array() {
                if arr.len() < *min {
                    diagnostics.push(
                        Diagnostic::error(format!("Too few elements in '{}'", path))
                            .with_detail(format!(
                                "At least {} element(s) required, got {}",
                                min,
                                arr.len()
                            ))
                            .with_attribute(path),
                    );
                }
            }
        },
        Validator::RegexMatches { pattern, message } => {
            if let Some(s) = value.as_str() {
                match regex::Regex::new(pattern) {
                    Ok(re) if re.is_match(s) => {},
                    Ok(_) => diagnostics.push(
                        Diagnostic::error(format!("Invalid value for attribute '{}'", path))
                            .with_detail(message.clone())
                            .with_attribute(path),
                    ),
                    Err(e) => diagnostics.push(
                        Diagnostic::error(format!("Invalid pattern for attribute '{}'", path))
                            .with_detail(e.to_string())
                            .with_attribute(path),
                    ),
                }
            }
        },
        Validator::Uuid => {
            if let Some(s) = value.as_str() {
                match uuid::Uuid::parse_str(s) {
                    Ok(uuid) if uuid.hyphenated().to_string() == s => {},
                    Ok(uuid) => diagnostics.push(
                        Diagnostic::error(format!("Invalid UUID for attribute '{}'", path))
                            .with_detail(format!("write \"{}\" as \"{}\"", s, uuid.hyphenated()))
                            .with_attribute(path),
                    ),
                    Err(_) => diagnostics.push(
                        Diagnostic::error(format!("Invalid UUID for attribute '{}'", path))
                            .with_detail(format!("\"{}\" is not a valid UUID", s))
                            .with_attribute(path),
                    ),
                }
            }
        },
        Validator::HttpUrl => {
            if let Some(s) = value.as_str() {
                if let Err(detail) = check_http_url(s) {
                    diagnostics.push(
                        Diagnostic::error(format!("Invalid URL for attribute '{}'", path))
                            .with_detail(detail)
                            .with_attribute(path),
                    );
                }
            }
        },
        Validator::Each { validator } => {
            if let Some(arr) = value.as_array() {
                for (i, elem) in arr.iter().enumerate() {
                    if elem.is_null() || is_unknown(elem) {
                        continue;
                    }
                    let elem_path = format!("{}.{}", path, i);
                    apply_validator(validator, elem, &elem_path, diagnostics);
                }
            }
        },
    }
}

/// Check that a string is an absolute http or https URL.
pub fn check_http_url(s: &str) -> Result<url::Url, String> {
    let parsed = url::Url::parse(s).map_err(|e| format!("\"{}\" is not a valid URL: {}", s, e))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(format!(
            "URL scheme must be http or https, got \"{}\"",
            other
        )),
    }
}

fn check_constraint(
    constraint: &Constraint,
    obj: &serde_json::Map<String, Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let is_set = |name: &str| obj.get(name).is_some_and(|v| !v.is_null());

    match constraint {
        Constraint::ExactlyOneOf { attributes } => {
            let set: Vec<&String> = attributes.iter().filter(|a| is_set(a)).collect();
            if set.len() != 1 {
                let group = attributes
                    .iter()
                    .map(|a| join_path(path, a))
                    .collect::<Vec<_>>()
                    .join(", ");
                let detail = if set.is_empty() {
                    format!("Exactly one of [{}] must be set, none were", group)
                } else {
                    format!(
                        "Exactly one of [{}] must be set, got {}",
                        group,
                        set.iter()
                            .map(|a| join_path(path, a))
                            .collect::<Vec<_>>()
                            .join(", ")
                    )
                };
                // point at the first surplus member, or at the enclosing block
                let attribute = set
                    .get(1)
                    .map(|a| join_path(path, a))
                    .unwrap_or_else(|| path.to_string());
                diagnostics.push(
                    Diagnostic::error("Invalid attribute combination")
                        .with_detail(detail)
                        .with_attribute_if_not_empty(&attribute),
                );
            }
        },
        Constraint::RequireWith {
            attribute,
            discriminator,
            equals,
        } => {
            let selected = match obj.get(discriminator.as_str()) {
                Some(v) if is_unknown(v) => return,
                Some(Value::String(s)) => s == equals,
                _ => false,
            };
            let attr_path = join_path(path, attribute);
            let discriminator_path = join_path(path, discriminator);
            if selected && !is_set(attribute) {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", attr_path))
                        .with_detail(format!(
                            "'{}' is required when {} is \"{}\"",
                            attr_path, discriminator_path, equals
                        ))
                        .with_attribute(attr_path),
                );
            } else if !selected && is_set(attribute) {
                diagnostics.push(
                    Diagnostic::error(format!("Unexpected attribute '{}'", attr_path))
                        .with_detail(format!(
                            "'{}' can only be set when {} is \"{}\"",
                            attr_path, discriminator_path, equals
                        ))
                        .with_attribute(attr_path),
                );
            }
        },
    }
}

fn validate_nested_block(
    nested: &NestedBlock,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match nested.nesting_mode {
        BlockNestingMode::Single => {
            validate_single_block(nested, value, path, diagnostics);
        },
        BlockNestingMode::List | BlockNestingMode::Set => {
            validate_list_block(nested, value, path, diagnostics);
        },
    }
}

fn validate_single_block(
    nested: &NestedBlock,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match value {
        None | Some(Value::Null) => {
            if nested.min_items > 0 {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required block '{}'", path))
                        .with_detail("At least one block is required")
                        .with_attribute(path),
                );
            }
        },
        Some(v) => {
            validate_block(&nested.block, v, path, diagnostics);
        },
    }
}

fn validate_list_block(
    nested: &NestedBlock,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match value {
        None | Some(Value::Null) => {
            if nested.min_items > 0 {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' requires at least {} item(s)",
                        path, nested.min_items
                    ))
                    .with_attribute(path),
                );
            }
        },
        Some(v) if is_unknown(v) => {},
        Some(Value::Array(arr)) => {
            let len = arr.len() as u32;

            if len < nested.min_items {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' requires at least {} item(s), got {}",
                        path, nested.min_items, len
                    ))
                    .with_attribute(path),
                );
            }

            // 0 means unlimited
            if nested.max_items > 0 && len > nested.max_items {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' allows at most {} item(s), got {}",
                        path, nested.max_items, len
                    ))
                    .with_attribute(path),
                );
            }

            for (i, item) in arr.iter().enumerate() {
                let item_path = format!("{}.{}", path, i);
                validate_block(&nested.block, item, &item_path, diagnostics);
            }
        },
        Some(v) => {
            diagnostics.push(
                Diagnostic::error(format!("Expected list for block '{}'", path))
                    .with_detail(format!("Got {}", value_type_name(v)))
                    .with_attribute(path),
            );
        },
    }
}

pub(crate) fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", base, name)
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn is_int64(value: &Value) -> bool {
    match value {
        Value::Number(n) => {
            if n.is_i64() {
                true
            } else if let Some(f) = n.as_f64() {
                f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64
            } else {
                false
            }
        },
        _ => false,
    }
}

fn type_error(path: &str, expected: &str, got: &Value) -> Diagnostic {
    Diagnostic {
        severity: DiagnosticSeverity::Error,
        summary: format!("Invalid type for attribute '{}'", path),
        detail: Some(format!(
            "Expected {}, got {}",
            expected,
            value_type_name(got)
        )),
        attribute: Some(path.to_string()),
    }
}

trait DiagnosticExt {
    fn with_attribute_if_not_empty(self, path: &str) -> Self;
}

impl DiagnosticExt for Diagnostic {
    fn with_attribute_if_not_empty(self, path: &str) -> Self {
        if path.is_empty() {
            self
        } else {
            self.with_attribute(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, AttributeFlags, Block, NestedBlock, Schema};
    use crate::value::UNKNOWN_SENTINEL;
    use serde_json::json;

    fn backend_schema() -> Schema {
        Schema::v0()
            .with_attribute(
                "backend",
                Attribute::required_string().with_validator(Validator::one_of([
                    "STATIC_CHALLENGE",
                    "OKTA_CA",
                ])),
            )
            .with_block(
                "static_challenge",
                NestedBlock::single(
                    Block::new().with_attribute("challenge", Attribute::required_string()),
                ),
            )
            .with_block(
                "okta_ca",
                NestedBlock::single(
                    Block::new()
                        .with_attribute("url", Attribute::required_string())
                        .with_attribute("username", Attribute::required_string()),
                ),
            )
            .with_constraints(Constraint::backend(
                "backend",
                &[("STATIC_CHALLENGE", "static_challenge"), ("OKTA_CA", "okta_ca")],
            ))
    }

    #[test]
    fn test_validate_required_string() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());

        let diagnostics = validate(&schema, &json!({"name": "test"}));
        assert!(diagnostics.is_empty());

        let diagnostics = validate(&schema, &json!({}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("name".to_string()));

        let diagnostics = validate(&schema, &json!({"name": null}));
        assert_eq!(diagnostics.len(), 1);

        let diagnostics = validate(&schema, &json!({"name": 123}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Invalid type"));
    }

    #[test]
    fn test_validate_optional_attribute() {
        let schema = Schema::v0().with_attribute("count", Attribute::optional_int64());

        assert!(validate(&schema, &json!({"count": 42})).is_empty());
        assert!(validate(&schema, &json!({})).is_empty());
        assert!(validate(&schema, &json!({"count": null})).is_empty());
        assert_eq!(validate(&schema, &json!({"count": "not a number"})).len(), 1);
    }

    #[test]
    fn test_unknown_values_are_accepted() {
        let schema = Schema::v0()
            .with_attribute("name", Attribute::required_string())
            .with_attribute(
                "count",
                Attribute::optional_int64().with_validator(Validator::between(1, 5)),
            );

        let diagnostics = validate(
            &schema,
            &json!({"name": UNKNOWN_SENTINEL, "count": UNKNOWN_SENTINEL}),
        );
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_computed_only_attribute_skipped() {
        let schema = Schema::v0().with_attribute("id", Attribute::computed_string());

        assert!(validate(&schema, &json!({})).is_empty());
        assert!(validate(&schema, &json!({"id": "abc"})).is_empty());
        assert!(validate(&schema, &json!({"id": 123})).is_empty());
    }

    #[test]
    fn test_unsupported_attribute() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());

        let diagnostics = validate(&schema, &json!({"name": "a", "nmae": "b"}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("nmae".to_string()));
    }

    #[test]
    fn test_validate_int64() {
        let schema = Schema::v0().with_attribute("count", Attribute::required_int64());

        assert!(validate(&schema, &json!({"count": 42})).is_empty());
        assert!(validate(&schema, &json!({"count": 42.0})).is_empty());
        assert_eq!(validate(&schema, &json!({"count": 42.5})).len(), 1);
        assert_eq!(validate(&schema, &json!({"count": "42"})).len(), 1);
    }

    #[test]
    fn test_validate_list_and_set() {
        let schema = Schema::v0()
            .with_attribute(
                "tags",
                Attribute::new(
                    AttributeType::list(AttributeType::String),
                    AttributeFlags::required(),
                ),
            )
            .with_attribute(
                "ids",
                Attribute::new(
                    AttributeType::set(AttributeType::Int64),
                    AttributeFlags::optional(),
                ),
            );

        assert!(validate(&schema, &json!({"tags": ["a", "b"], "ids": [1, 2]})).is_empty());
        assert!(validate(&schema, &json!({"tags": []})).is_empty());

        let diagnostics = validate(&schema, &json!({"tags": ["a", 123, "c"]}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("tags.1".to_string()));

        let diagnostics = validate(&schema, &json!({"tags": [], "ids": "1"}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].detail, Some("Expected set, got string".to_string()));
    }

    #[test]
    fn test_one_of_validator() {
        let schema = Schema::v0().with_attribute(
            "channel",
            Attribute::required_string().with_validator(Validator::one_of(["Device", "User"])),
        );

        assert!(validate(&schema, &json!({"channel": "Device"})).is_empty());

        let diagnostics = validate(&schema, &json!({"channel": "device"}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0]
            .detail
            .as_deref()
            .unwrap()
            .contains("Device, User"));
    }

    #[test]
    fn test_between_validator() {
        let schema = Schema::v0().with_attribute(
            "inventory_interval",
            Attribute::optional_int64().with_validator(Validator::between(14400, 86400)),
        );

        assert!(validate(&schema, &json!({"inventory_interval": 14400})).is_empty());
        assert!(validate(&schema, &json!({"inventory_interval": 86400})).is_empty());
        assert_eq!(validate(&schema, &json!({"inventory_interval": 14399})).len(), 1);
        assert_eq!(validate(&schema, &json!({"inventory_interval": 86401})).len(), 1);
    }

    #[test]
    fn test_length_and_size_validators() {
        let schema = Schema::v0()
            .with_attribute(
                "name",
                Attribute::required_string().with_validator(Validator::length_between(1, 3)),
            )
            .with_attribute(
                "platforms",
                Attribute::new(
                    AttributeType::set(AttributeType::String),
                    AttributeFlags::required(),
                )
                .with_validator(Validator::size_at_least(1)),
            );

        assert!(validate(&schema, &json!({"name": "abc", "platforms": ["iOS"]})).is_empty());

        let diagnostics = validate(&schema, &json!({"name": "", "platforms": []}));
        assert_eq!(diagnostics.len(), 2);
    }

    #[test]
    fn test_regex_validator() {
        let schema = Schema::v0().with_attribute(
            "color",
            Attribute::optional_string()
                .with_validator(Validator::regex("^[0-9a-fA-F]{6}$", "must be 6 hex digits")),
        );

        assert!(validate(&schema, &json!({"color": "0079bf"})).is_empty());

        let diagnostics = validate(&schema, &json!({"color": "#0079bf"}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].detail, Some("must be 6 hex digits".to_string()));
    }

    #[test]
    fn test_uuid_and_url_validators() {
        let schema = Schema::v0()
            .with_attribute(
                "requires",
                Attribute::new(
                    AttributeType::set(AttributeType::String),
                    AttributeFlags::optional(),
                )
                .with_validator(Validator::each(Validator::Uuid)),
            )
            .with_attribute(
                "url",
                Attribute::optional_string().with_validator(Validator::HttpUrl),
            );

        assert!(validate(
            &schema,
            &json!({
                "requires": ["8d1e0a52-0c1c-4e7b-9b9e-8d4c1f9c2a11"],
                "url": "https://example.com/okta"
            })
        )
        .is_empty());

        let diagnostics = validate(
            &schema,
            &json!({"requires": ["not-a-uuid"], "url": "ftp://example.com"}),
        );
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0].attribute, Some("requires.0".to_string()));
        assert_eq!(diagnostics[1].attribute, Some("url".to_string()));

        let diagnostics = validate(
            &schema,
            &json!({"requires": ["{8D1E0A52-0C1C-4E7B-9B9E-8D4C1F9C2A11}"]}),
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].detail,
            Some(
                "write \"{8D1E0A52-0C1C-4E7B-9B9E-8D4C1F9C2A11}\" as \"8d1e0a52-0c1c-4e7b-9b9e-8d4c1f9c2a11\""
                    .to_string()
            )
        );
    }

    #[test]
    fn test_backend_exactly_one() {
        let schema = backend_schema();

        let ok = json!({"backend": "STATIC_CHALLENGE", "static_challenge": {"challenge": "Yolo"}});
        assert!(validate(&schema, &ok).is_empty());

        let none = json!({"backend": "STATIC_CHALLENGE"});
        let diagnostics = validate(&schema, &none);
        assert!(diagnostics
            .iter()
            .any(|d| d.summary == "Invalid attribute combination"));
        assert!(diagnostics
            .iter()
            .any(|d| d.attribute.as_deref() == Some("static_challenge")));

        let both = json!({
            "backend": "OKTA_CA",
            "static_challenge": {"challenge": "Yolo"},
            "okta_ca": {"url": "https://example.com/okta", "username": "Yolo"}
        });
        let diagnostics = validate(&schema, &both);
        assert!(diagnostics
            .iter()
            .any(|d| d.summary == "Invalid attribute combination"));
        assert!(diagnostics
            .iter()
            .any(|d| d.summary.contains("Unexpected attribute 'static_challenge'")));
    }

    #[test]
    fn test_backend_mismatch() {
        let schema = backend_schema();

        let wrong = json!({"backend": "OKTA_CA", "static_challenge": {"challenge": "Yolo"}});
        let diagnostics = validate(&schema, &wrong);
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics
            .iter()
            .any(|d| d.attribute.as_deref() == Some("okta_ca")));
        assert!(diagnostics
            .iter()
            .any(|d| d.attribute.as_deref() == Some("static_challenge")));
    }

    #[test]
    fn test_nested_block_single() {
        let schema = Schema::v0().with_block(
            "config",
            NestedBlock::single(Block::new().with_attribute("enabled", Attribute::required_bool())),
        );

        assert!(validate(&schema, &json!({"config": {"enabled": true}})).is_empty());
        assert!(validate(&schema, &json!({})).is_empty());

        let diagnostics = validate(&schema, &json!({"config": {"enabled": "yes"}}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("config.enabled".to_string()));
    }

    #[test]
    fn test_nested_block_list() {
        let schema = Schema::v0().with_block(
            "headers",
            NestedBlock::set(
                Block::new()
                    .with_attribute("name", Attribute::required_string())
                    .with_attribute("value", Attribute::required_string().sensitive()),
            )
            .with_max_items(2),
        );

        assert!(validate(&schema, &json!({"headers": [{"name": "a", "value": "b"}]})).is_empty());

        let diagnostics = validate(
            &schema,
            &json!({"headers": [
                {"name": "a", "value": "b"},
                {"name": "c", "value": "d"},
                {"name": "e", "value": "f"}
            ]}),
        );
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("at most 2"));

        let diagnostics = validate(&schema, &json!({"headers": [{"name": "a"}]}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("headers.0.value".to_string()));
    }

    #[test]
    fn test_object_type() {
        let schema = Schema::v0().with_attribute(
            "filters",
            Attribute::new(
                AttributeType::list(AttributeType::list(AttributeType::object([
                    ("attribute", AttributeType::String),
                    ("operator", AttributeType::String),
                    ("values", AttributeType::set(AttributeType::String)),
                ]))),
                AttributeFlags::optional(),
            ),
        );

        let diagnostics = validate(
            &schema,
            &json!({"filters": [[{"attribute": "yolo", "operator": "IN", "values": ["un"]}]]}),
        );
        assert!(diagnostics.is_empty());

        let diagnostics = validate(
            &schema,
            &json!({"filters": [[{"attribute": "yolo", "operator": 1, "values": ["un"]}]]}),
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].attribute,
            Some("filters.0.0.operator".to_string())
        );
    }

    #[test]
    fn test_helpers() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());

        assert!(is_valid(&schema, &json!({"name": "test"})));
        assert!(!is_valid(&schema, &json!({})));
        assert!(validate_result(&schema, &json!({"name": "test"})).is_ok());
        assert_eq!(validate_result(&schema, &json!({})).unwrap_err().len(), 1);
    }

    #[test]
    fn test_validate_root_not_object() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());

        let diagnostics = validate(&schema, &json!("not an object"));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Expected object"));
    }
}
