//! Schema types for describing provider, resource and data source structure.
//!
//! A schema is an ordered mapping from attribute name to [`Attribute`]
//! descriptor. Descriptors fix the kind, the role flags, validators, plan
//! modifiers, defaults and sensitivity. Nested objects are expressed as
//! [`NestedBlock`]s, and cross-attribute rules as [`Constraint`]s.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Value kind of an attribute, as announced to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    /// Text.
    String,
    /// Signed 64-bit integer.
    Int64,
    /// True or false.
    Bool,
    /// Ordered, duplicates allowed.
    List(Box<AttributeType>),
    /// Unordered; compared as a multiset.
    Set(Box<AttributeType>),
    /// Fixed fields, e.g. one probe payload filter.
    Object(BTreeMap<String, AttributeType>),
}

impl AttributeType {
    /// Ordered collection of `element_type`.
    pub fn list(element_type: AttributeType) -> Self {
        Self::List(Box::new(element_type))
    }

    /// Unordered collection of `element_type`.
    pub fn set(element_type: AttributeType) -> Self {
        Self::Set(Box::new(element_type))
    }

    /// Create an object type from `(name, type)` pairs.
    pub fn object<'a>(attributes: impl IntoIterator<Item = (&'a str, AttributeType)>) -> Self {
        Self::Object(
            attributes
                .into_iter()
                .map(|(name, ty)| (name.to_string(), ty))
                .collect(),
        )
    }
}

/// Who may write an attribute: the user, the server, or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AttributeFlags {
    /// Must be configured.
    pub required: bool,
    /// May be configured.
    pub optional: bool,
    /// Filled by the server or by a default when not configured.
    pub computed: bool,
    /// Redacted by the host, e.g. the API token.
    pub sensitive: bool,
}

impl AttributeFlags {
    /// User must set it.
    pub fn required() -> Self {
        Self {
            required: true,
            ..Default::default()
        }
    }

    /// User may set it.
    pub fn optional() -> Self {
        Self {
            optional: true,
            ..Default::default()
        }
    }

    /// Server-assigned, never configured.
    pub fn computed() -> Self {
        Self {
            computed: true,
            ..Default::default()
        }
    }

    /// Configurable, with a value filled in when omitted.
    pub fn optional_computed() -> Self {
        Self {
            optional: true,
            computed: true,
            ..Default::default()
        }
    }

    /// Redact in host output.
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// Whether the attribute can never be written by the user.
    pub fn is_computed_only(&self) -> bool {
        self.computed && !self.optional && !self.required
    }
}

/// A check applied to a single configured value before any remote call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Validator {
    /// The string must be one of the listed values.
    OneOf {
        /// Accepted values.
        values: Vec<String>,
    },
    /// The integer must lie in the closed interval.
    Int64Between {
        /// Smallest accepted value.
        min: i64,
        /// Largest accepted value.
        max: i64,
    },
    /// The string length (in characters) must lie in the closed interval.
    LengthBetween {
        /// Shortest accepted length.
        min: usize,
        /// Longest accepted length.
        max: usize,
    },
    /// The list or set must have at least this many elements.
    SizeAtLeast {
        /// Minimum element count.
        min: usize,
    },
    /// The string must match the regular expression.
    RegexMatches {
        /// The pattern.
        pattern: String,
        /// Message shown when the value does not match.
        message: String,
    },
    /// The string must be a UUID in lowercase hyphenated form.
    Uuid,
    /// The string must be an absolute http(s) URL.
    HttpUrl,
    /// Apply the inner validator to every element of a list or set.
    Each {
        /// The element validator.
        validator: Box<Validator>,
    },
}

impl Validator {
    /// Enum membership.
    pub fn one_of<'a>(values: impl IntoIterator<Item = &'a str>) -> Self {
        Self::OneOf {
            values: values.into_iter().map(str::to_string).collect(),
        }
    }

    /// Numeric closed interval.
    pub fn between(min: i64, max: i64) -> Self {
        Self::Int64Between { min, max }
    }

    /// String length closed interval.
    pub fn length_between(min: usize, max: usize) -> Self {
        Self::LengthBetween { min, max }
    }

    /// Minimum collection size.
    pub fn size_at_least(min: usize) -> Self {
        Self::SizeAtLeast { min }
    }

    /// Regular expression match.
    pub fn regex(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RegexMatches {
            pattern: pattern.into(),
            message: message.into(),
        }
    }

    /// Element-wise validation.
    pub fn each(validator: Validator) -> Self {
        Self::Each {
            validator: Box::new(validator),
        }
    }
}

/// Rewrites the planned value of a computed attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanModifier {
    /// Reuse the prior state value instead of planning an unknown.
    UseStateForUnknown,
    /// On create only, substitute this boolean when the config is null.
    BoolDefaultOnCreate(bool),
}

/// A rule spanning several attributes of the same block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Constraint {
    /// Exactly one of these attributes must be non-null.
    ExactlyOneOf {
        /// The attribute group.
        attributes: Vec<String>,
    },
    /// `attribute` is non-null if and only if `discriminator` equals `equals`.
    RequireWith {
        /// The dependent attribute.
        attribute: String,
        /// The attribute whose value is tested.
        discriminator: String,
        /// The value the discriminator must hold.
        equals: String,
    },
}

impl Constraint {
    /// Exactly one of the attributes must be non-null.
    pub fn exactly_one_of<'a>(attributes: impl IntoIterator<Item = &'a str>) -> Self {
        Self::ExactlyOneOf {
            attributes: attributes.into_iter().map(str::to_string).collect(),
        }
    }

    /// `attribute` may only be set, and must be set, when `discriminator == equals`.
    pub fn require_with(attribute: &str, discriminator: &str, equals: &str) -> Self {
        Self::RequireWith {
            attribute: attribute.to_string(),
            discriminator: discriminator.to_string(),
            equals: equals.to_string(),
        }
    }

    /// Constraints for a tagged-union backend.
    ///
    /// `variants` pairs each discriminator value with the nested attribute it
    /// activates.
    pub fn backend(discriminator: &str, variants: &[(&str, &str)]) -> Vec<Self> {
        let mut constraints = vec![Self::exactly_one_of(
            variants.iter().map(|(_, attribute)| *attribute),
        )];
        constraints.extend(
            variants
                .iter()
                .map(|(value, attribute)| Self::require_with(attribute, discriminator, value)),
        );
        constraints
    }
}

/// One entry of a schema: kind, flags and the rules applied while
/// validating and planning it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// Value kind.
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    /// Roles.
    #[serde(flatten)]
    pub flags: AttributeFlags,
    /// Shown by the host next to the attribute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// A change plans a replacement instead of an update.
    #[serde(default)]
    pub force_new: bool,
    /// Planned when the configured value is null.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    /// Validators run against the configured value.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validators: Vec<Validator>,
    /// Plan modifiers applied when the configured value is null.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plan_modifiers: Vec<PlanModifier>,
}

impl Attribute {
    /// Bare attribute; the helpers below cover the common shapes.
    pub fn new(attr_type: AttributeType, flags: AttributeFlags) -> Self {
        Self {
            attr_type,
            flags,
            description: None,
            force_new: false,
            default: None,
            validators: Vec::new(),
            plan_modifiers: Vec::new(),
        }
    }

    /// Mandatory string, e.g. a `name`.
    pub fn required_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::required())
    }

    /// String that may be omitted or null.
    pub fn optional_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::optional())
    }

    /// Server-assigned string.
    pub fn computed_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::computed())
    }

    /// Mandatory integer.
    pub fn required_int64() -> Self {
        Self::new(AttributeType::Int64, AttributeFlags::required())
    }

    /// Integer that may be omitted or null.
    pub fn optional_int64() -> Self {
        Self::new(AttributeType::Int64, AttributeFlags::optional())
    }

    /// Server-assigned integer.
    pub fn computed_int64() -> Self {
        Self::new(AttributeType::Int64, AttributeFlags::computed())
    }

    /// Mandatory boolean.
    pub fn required_bool() -> Self {
        Self::new(AttributeType::Bool, AttributeFlags::required())
    }

    /// Boolean that may be omitted or null.
    pub fn optional_bool() -> Self {
        Self::new(AttributeType::Bool, AttributeFlags::optional())
    }

    /// Mandatory set, e.g. blueprint `platforms`.
    pub fn required_set(element_type: AttributeType) -> Self {
        Self::new(AttributeType::set(element_type), AttributeFlags::required())
    }

    /// Set that may be omitted or null.
    pub fn optional_set(element_type: AttributeType) -> Self {
        Self::new(AttributeType::set(element_type), AttributeFlags::optional())
    }

    /// List that may be omitted or null.
    pub fn optional_list(element_type: AttributeType) -> Self {
        Self::new(AttributeType::list(element_type), AttributeFlags::optional())
    }

    /// Create a computed numeric identifier that keeps its state value across plans.
    pub fn numeric_id() -> Self {
        Self::computed_int64()
            .with_description("Unique identifier assigned by the server.")
            .use_state_for_unknown()
    }

    /// Create a computed string identifier that keeps its state value across plans.
    pub fn string_id() -> Self {
        Self::computed_string()
            .with_description("Unique identifier assigned by the server.")
            .use_state_for_unknown()
    }

    /// Attach help text.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Plan a replacement when this attribute changes.
    pub fn with_force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    /// Set a default value for this attribute, applied when the config is null.
    ///
    /// The attribute becomes optional+computed.
    pub fn with_default(mut self, default: serde_json::Value) -> Self {
        self.default = Some(default);
        self.flags.optional = true;
        self.flags.computed = true;
        self.flags.required = false;
        self
    }

    /// Add a validator.
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    /// Reuse the prior state value when the plan would be unknown.
    pub fn use_state_for_unknown(mut self) -> Self {
        self.plan_modifiers.push(PlanModifier::UseStateForUnknown);
        self
    }

    /// Default a boolean on create only.
    ///
    /// The attribute becomes optional+computed.
    pub fn bool_default_on_create(mut self, default: bool) -> Self {
        self.plan_modifiers
            .push(PlanModifier::BoolDefaultOnCreate(default));
        self.flags.optional = true;
        self.flags.computed = true;
        self.flags.required = false;
        self
    }

    /// Redact in host output.
    pub fn sensitive(mut self) -> Self {
        self.flags.sensitive = true;
        self
    }
}

/// How many instances of a nested block a value holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BlockNestingMode {
    /// An object or null.
    #[default]
    Single,
    /// An ordered array of objects.
    List,
    /// An unordered array of objects.
    Set,
}

/// Attributes and nested blocks at one level of an entity, such as the
/// per-backend settings of a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Keyed by attribute name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Attribute>,
    /// Keyed by attribute name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub blocks: BTreeMap<String, NestedBlock>,
    /// Cross-attribute rules checked against this block's value.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<Constraint>,
    /// Help text for the whole block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Block {
    /// Empty block.
    pub fn new() -> Self {
        Self {
            attributes: BTreeMap::new(),
            blocks: BTreeMap::new(),
            constraints: Vec::new(),
            description: None,
        }
    }

    /// Add or replace an attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.attributes.insert(name.into(), attr);
        self
    }

    /// Add or replace a nested block.
    pub fn with_block(mut self, name: impl Into<String>, block: NestedBlock) -> Self {
        self.blocks.insert(name.into(), block);
        self
    }

    /// Add cross-attribute constraints.
    pub fn with_constraints(mut self, constraints: impl IntoIterator<Item = Constraint>) -> Self {
        self.constraints.extend(constraints);
        self
    }

    /// Attach help text.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Whether the block holds an attribute or nested block with this name.
    pub fn has(&self, name: &str) -> bool {
        self.attributes.contains_key(name) || self.blocks.contains_key(name)
    }
}

impl Default for Block {
    fn default() -> Self {
        Self::new()
    }
}

/// A [`Block`] placed under a parent attribute name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedBlock {
    /// Attributes of each instance.
    #[serde(flatten)]
    pub block: Block,
    /// Single, list or set.
    #[serde(default)]
    pub nesting_mode: BlockNestingMode,
    /// Fewest instances accepted.
    #[serde(default)]
    pub min_items: u32,
    /// Most instances accepted; 0 means no limit.
    #[serde(default)]
    pub max_items: u32,
    /// When the config omits a single block, plan it from the nested defaults.
    #[serde(default)]
    pub computed: bool,
}

impl NestedBlock {
    /// At most one instance.
    pub fn single(block: Block) -> Self {
        Self {
            block,
            nesting_mode: BlockNestingMode::Single,
            min_items: 0,
            max_items: 1,
            computed: false,
        }
    }

    /// Any number of instances, order kept.
    pub fn list(block: Block) -> Self {
        Self {
            block,
            nesting_mode: BlockNestingMode::List,
            min_items: 0,
            max_items: 0,
            computed: false,
        }
    }

    /// Any number of instances, order ignored.
    pub fn set(block: Block) -> Self {
        Self {
            block,
            nesting_mode: BlockNestingMode::Set,
            min_items: 0,
            max_items: 0,
            computed: false,
        }
    }

    /// Require at least `min` instances.
    pub fn with_min_items(mut self, min: u32) -> Self {
        self.min_items = min;
        self
    }

    /// Accept at most `max` instances.
    pub fn with_max_items(mut self, max: u32) -> Self {
        self.max_items = max;
        self
    }

    /// Fill an omitted single block from its attribute defaults.
    pub fn with_computed_default(mut self) -> Self {
        self.computed = true;
        self
    }
}

/// Versioned schema of one entity type or of the provider configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Bumped when the stored state shape changes.
    #[serde(default)]
    pub version: u64,
    /// Top-level attributes, blocks and constraints.
    #[serde(flatten)]
    pub block: Block,
}

impl Schema {
    /// Empty schema at `version`.
    pub fn new(version: u64) -> Self {
        Self {
            version,
            block: Block::new(),
        }
    }

    /// Every entity of this provider is still at version 0.
    pub fn v0() -> Self {
        Self::new(0)
    }

    /// Add or replace a top-level attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.block.attributes.insert(name.into(), attr);
        self
    }

    /// Add or replace a top-level nested block.
    pub fn with_block(mut self, name: impl Into<String>, block: NestedBlock) -> Self {
        self.block.blocks.insert(name.into(), block);
        self
    }

    /// Add cross-attribute constraints on the root block.
    pub fn with_constraints(mut self, constraints: impl IntoIterator<Item = Constraint>) -> Self {
        self.block.constraints.extend(constraints);
        self
    }

    /// Set the description of the root block.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.block.description = Some(description.into());
        self
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::v0()
    }
}

/// Everything [`crate::ProviderService::schema`] announces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProviderSchema {
    /// Provider configuration block.
    #[serde(default)]
    pub provider: Schema,
    /// Keyed by resource type name.
    #[serde(default)]
    pub resources: BTreeMap<String, Schema>,
    /// Keyed by data source type name.
    #[serde(default)]
    pub data_sources: BTreeMap<String, Schema>,
}

impl ProviderSchema {
    /// Nothing announced yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the provider configuration schema.
    pub fn with_provider_config(mut self, schema: Schema) -> Self {
        self.provider = schema;
        self
    }

    /// Announce a resource type.
    pub fn with_resource(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.resources.insert(name.into(), schema);
        self
    }

    /// Announce a data source type.
    pub fn with_data_source(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.data_sources.insert(name.into(), schema);
        self
    }
}

/// How serious a [`Diagnostic`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    /// The operation failed.
    Error,
    /// Reported, the operation still succeeds.
    Warning,
}

/// A problem reported to the host, optionally tied to an attribute path
/// such as `payload_filters.0.1.operator`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Error or warning.
    pub severity: DiagnosticSeverity,
    /// One line, shown first.
    pub summary: String,
    /// Longer explanation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Dotted path, list positions included.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Diagnostic {
    /// Failing diagnostic.
    pub fn error(summary: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    /// Non-failing diagnostic.
    pub fn warning(summary: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    /// Attach a longer explanation.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Point at an attribute path.
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    /// Whether this diagnostic is an error.
    pub fn is_error(&self) -> bool {
        matches!(self.severity, DiagnosticSeverity::Error)
    }
}

/// Whether any of the diagnostics is an error.
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attribute_type_constructors() {
        let list = AttributeType::list(AttributeType::String);
        assert!(matches!(list, AttributeType::List(_)));

        let object = AttributeType::object([("name", AttributeType::String)]);
        match object {
            AttributeType::Object(fields) => assert!(fields.contains_key("name")),
            other => panic!("unexpected type {:?}", other),
        }
    }

    #[test]
    fn test_attribute_flags() {
        assert!(AttributeFlags::computed().is_computed_only());
        assert!(!AttributeFlags::optional_computed().is_computed_only());
        assert!(AttributeFlags::required().sensitive().sensitive);

        let token = Attribute::optional_string().sensitive();
        assert!(token.flags.optional && token.flags.sensitive);
    }

    #[test]
    fn test_default_makes_attribute_optional_computed() {
        let attr = Attribute::required_int64().with_default(json!(86400));
        assert!(attr.flags.optional && attr.flags.computed);
        assert!(!attr.flags.required);
        assert_eq!(attr.default, Some(json!(86400)));
    }

    #[test]
    fn test_id_attributes_keep_state() {
        let id = Attribute::numeric_id();
        assert!(id.flags.is_computed_only());
        assert_eq!(id.plan_modifiers, vec![PlanModifier::UseStateForUnknown]);

        let id = Attribute::string_id();
        assert_eq!(id.attr_type, AttributeType::String);
    }

    #[test]
    fn test_backend_constraints() {
        let constraints = Constraint::backend(
            "backend",
            &[("HTTP", "http"), ("KINESIS", "kinesis")],
        );
        assert_eq!(constraints.len(), 3);
        assert_eq!(
            constraints[0],
            Constraint::exactly_one_of(["http", "kinesis"])
        );
        assert_eq!(
            constraints[2],
            Constraint::require_with("kinesis", "backend", "KINESIS")
        );
    }

    #[test]
    fn test_schema_builder_is_ordered() {
        let schema = Schema::v0()
            .with_attribute("name", Attribute::required_string())
            .with_attribute("id", Attribute::numeric_id())
            .with_block(
                "config",
                NestedBlock::single(
                    Block::new().with_attribute("enabled", Attribute::optional_bool()),
                ),
            );

        let names: Vec<_> = schema.block.attributes.keys().cloned().collect();
        assert_eq!(names, vec!["id".to_string(), "name".to_string()]);
        assert!(schema.block.has("config"));
    }

    #[test]
    fn test_schema_serializes_validators() {
        let attr = Attribute::optional_string().with_validator(Validator::one_of(["A", "B"]));
        let encoded = serde_json::to_value(&attr).unwrap();
        assert_eq!(encoded["validators"][0]["kind"], "one_of");
        assert_eq!(encoded["validators"][0]["values"], json!(["A", "B"]));
    }

    #[test]
    fn test_diagnostic_paths() {
        let err = Diagnostic::error("Invalid attribute value")
            .with_detail("Expected one of IN, NOT_IN, got LIKE")
            .with_attribute("payload_filters.0.1.operator");

        assert!(err.is_error());
        assert_eq!(err.attribute.as_deref(), Some("payload_filters.0.1.operator"));
        assert!(!has_errors(&[Diagnostic::warning("TLS verification disabled")]));
        assert!(has_errors(&[Diagnostic::warning("w"), err]));
    }

    #[test]
    fn test_nested_block_modes() {
        let tls = NestedBlock::single(Block::new()).with_computed_default();
        assert_eq!((tls.nesting_mode, tls.max_items), (BlockNestingMode::Single, 1));
        assert!(tls.computed);

        let headers = NestedBlock::set(Block::new()).with_max_items(20);
        assert_eq!(headers.nesting_mode, BlockNestingMode::Set);
        assert_eq!((headers.min_items, headers.max_items), (0, 20));
    }
}
