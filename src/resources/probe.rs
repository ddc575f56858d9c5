use crate::codec::{NullPolicy, RequestBody, ResponseBody};
use crate::error::ProviderError;
use crate::resource::{IdKind, Resource};
use crate::schema::{Attribute, AttributeType, Block, Diagnostic, NestedBlock, Schema, Validator};
use crate::value::{SetOf, Tri};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const PAYLOAD_OPERATORS: [&str; 2] = ["IN", "NOT_IN"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryFilter {
    pub meta_business_unit_ids: Tri<SetOf<i64>>,
    pub tag_ids: Tri<SetOf<i64>>,
    pub platforms: Tri<SetOf<String>>,
    pub types: Tri<SetOf<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataFilter {
    pub event_types: Tri<SetOf<String>>,
    pub event_tags: Tri<SetOf<String>>,
    pub event_routing_keys: Tri<SetOf<String>>,
}

/// One condition on an event payload attribute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PayloadFilter {
    pub attribute: Tri<String>,
    pub operator: Tri<String>,
    pub values: Tri<Vec<String>>,
}

/// A probe.
///
/// `payload_filters` is a list of groups: an event matches when every filter
/// of at least one group matches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeModel {
    pub id: Tri<i64>,
    pub name: Tri<String>,
    pub description: Tri<String>,
    pub active: Tri<bool>,
    pub action_ids: Tri<SetOf<String>>,
    pub inventory_filters: Tri<SetOf<InventoryFilter>>,
    pub metadata_filters: Tri<SetOf<MetadataFilter>>,
    pub payload_filters: Tri<Vec<Vec<PayloadFilter>>>,
}

/// `zentral_probe`
pub struct Probe;

fn set_of(element: AttributeType, description: &str) -> Attribute {
    Attribute::optional_set(element)
        .with_description(description)
        .with_default(json!([]))
}

fn payload_filter_type() -> AttributeType {
    AttributeType::object([
        ("attribute", AttributeType::String),
        ("operator", AttributeType::String),
        ("values", AttributeType::list(AttributeType::String)),
    ])
}

impl Resource for Probe {
    type Model = ProbeModel;
    const TYPE_NAME: &'static str = "zentral_probe";
    const ENDPOINT: &'static str = "probes/probes/";
    const ID_KIND: IdKind = IdKind::Numeric;

    fn schema() -> Schema {
        Schema::v0()
            .with_description("Manages probes.")
            .with_attribute("id", Attribute::numeric_id())
            .with_attribute(
                "name",
                Attribute::required_string().with_description("Name of the probe."),
            )
            .with_attribute(
                "description",
                Attribute::optional_string()
                    .with_description("Description of the probe.")
                    .with_default(json!("")),
            )
            .with_attribute(
                "active",
                Attribute::optional_bool()
                    .with_description("Whether the probe is active.")
                    .with_default(json!(true)),
            )
            .with_attribute(
                "action_ids",
                set_of(AttributeType::String, "IDs of the actions triggered by the probe.")
                    .with_validator(Validator::each(Validator::Uuid)),
            )
            .with_block(
                "inventory_filters",
                NestedBlock::set(
                    Block::new()
                        .with_description("Inventory filter. Matches the machine the event is about.")
                        .with_attribute(
                            "meta_business_unit_ids",
                            set_of(AttributeType::Int64, "IDs of the meta business units."),
                        )
                        .with_attribute("tag_ids", set_of(AttributeType::Int64, "IDs of the tags."))
                        .with_attribute(
                            "platforms",
                            set_of(AttributeType::String, "Machine platforms."),
                        )
                        .with_attribute("types", set_of(AttributeType::String, "Machine types.")),
                )
                .with_computed_default(),
            )
            .with_block(
                "metadata_filters",
                NestedBlock::set(
                    Block::new()
                        .with_description("Metadata filter. Matches the event metadata.")
                        .with_attribute(
                            "event_types",
                            set_of(AttributeType::String, "Event types."),
                        )
                        .with_attribute("event_tags", set_of(AttributeType::String, "Event tags."))
                        .with_attribute(
                            "event_routing_keys",
                            set_of(AttributeType::String, "Event routing keys."),
                        ),
                )
                .with_computed_default(),
            )
            .with_attribute(
                "payload_filters",
                Attribute::optional_list(AttributeType::list(payload_filter_type()))
                    .with_description(
                        "Groups of payload filters. A group matches when all its filters match.",
                    )
                    .with_default(json!([])),
            )
    }

    fn to_request(model: &ProbeModel) -> Result<Value, ProviderError> {
        RequestBody::new()
            .with("name", &model.name, NullPolicy::Omit)
            .with("description", &model.description, NullPolicy::Omit)
            .with("active", &model.active, NullPolicy::Omit)
            .with("actions", &model.action_ids, NullPolicy::Omit)
            .with("inventory_filters", &model.inventory_filters, NullPolicy::Omit)
            .with("metadata_filters", &model.metadata_filters, NullPolicy::Omit)
            .with("payload_filters", &model.payload_filters, NullPolicy::Omit)
            .build()
    }

    fn from_response(body: &Value, _input: Option<&ProbeModel>) -> Result<ProbeModel, ProviderError> {
        let r = ResponseBody::new(Self::TYPE_NAME, body)?;
        Ok(ProbeModel {
            id: r.required("id")?,
            name: r.required("name")?,
            description: r.required("description")?,
            active: r.required("active")?,
            action_ids: r.set("actions")?,
            inventory_filters: r.object_set("inventory_filters", |f| {
                Ok(InventoryFilter {
                    meta_business_unit_ids: f.set("meta_business_unit_ids")?,
                    tag_ids: f.set("tag_ids")?,
                    platforms: f.set("platforms")?,
                    types: f.set("types")?,
                })
            })?,
            metadata_filters: r.object_set("metadata_filters", |f| {
                Ok(MetadataFilter {
                    event_types: f.set("event_types")?,
                    event_tags: f.set("event_tags")?,
                    event_routing_keys: f.set("event_routing_keys")?,
                })
            })?,
            payload_filters: r.list("payload_filters")?,
        })
    }

    fn validate_config(model: &ProbeModel) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        let Some(groups) = model.payload_filters.as_ref() else {
            return diagnostics;
        };
        for (i, group) in groups.iter().enumerate() {
            for (j, filter) in group.iter().enumerate() {
                let path = format!("payload_filters.{}.{}", i, j);
                for (field, missing) in [
                    ("attribute", filter.attribute.is_null()),
                    ("operator", filter.operator.is_null()),
                    ("values", filter.values.is_null()),
                ] {
                    if missing {
                        diagnostics.push(
                            Diagnostic::error(format!(
                                "Missing required attribute '{}.{}'",
                                path, field
                            ))
                            .with_attribute(format!("{}.{}", path, field)),
                        );
                    }
                }
                if let Some(operator) = filter.operator.as_str() {
                    if !PAYLOAD_OPERATORS.contains(&operator) {
                        diagnostics.push(
                            Diagnostic::error(format!(
                                "Invalid value for attribute '{}.operator'",
                                path
                            ))
                            .with_detail(format!(
                                "Value must be one of: {}, got \"{}\"",
                                PAYLOAD_OPERATORS.join(", "),
                                operator
                            ))
                            .with_attribute(format!("{}.operator", path)),
                        );
                    }
                }
            }
        }
        diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{Lifecycle, ResourceHandler};

    #[test]
    fn test_payload_filter_operator() {
        let handler = Lifecycle::<Probe>::new();
        let config = |operator: &str| {
            json!({
                "name": "Probe",
                "payload_filters": [[{"attribute": "yolo", "operator": operator, "values": ["un"]}]],
            })
        };

        assert!(handler.validate(&config("NOT_IN")).is_empty());
        let diagnostics = handler.validate(&config("LIKE"));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].attribute,
            Some("payload_filters.0.0.operator".to_string())
        );
    }

    #[test]
    fn test_payload_filter_missing_values() {
        let diagnostics = Lifecycle::<Probe>::new().validate(&json!({
            "name": "Probe",
            "payload_filters": [[{"attribute": "yolo", "operator": "IN"}]],
        }));
        assert_eq!(
            diagnostics[0].attribute,
            Some("payload_filters.0.0.values".to_string())
        );
    }

    #[test]
    fn test_inventory_filters_wire_format() {
        let model = ProbeModel {
            name: "Probe".into(),
            action_ids: Tri::value(SetOf::new()),
            inventory_filters: Tri::value(SetOf::from(vec![InventoryFilter {
                meta_business_unit_ids: Tri::value(vec![2, 1].into()),
                tag_ids: Tri::value(SetOf::new()),
                platforms: Tri::value(vec!["MACOS".to_string()].into()),
                types: Tri::value(SetOf::new()),
            }])),
            ..Default::default()
        };
        let body = Probe::to_request(&model).unwrap();
        assert_eq!(
            body["inventory_filters"],
            json!([{"meta_business_unit_ids": [1, 2], "tag_ids": [], "platforms": ["MACOS"], "types": []}])
        );
        assert_eq!(body["actions"], json!([]));
    }
}
