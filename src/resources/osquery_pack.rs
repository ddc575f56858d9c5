use crate::codec::{NullPolicy, RequestBody, ResponseBody};
use crate::error::ProviderError;
use crate::resource::{IdKind, Resource};
use crate::schema::{Attribute, AttributeType, Schema, Validator};
use crate::value::Tri;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// An Osquery pack.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OsqueryPackModel {
    pub id: Tri<i64>,
    pub name: Tri<String>,
    pub slug: Tri<String>,
    pub description: Tri<String>,
    pub discovery_queries: Tri<Vec<String>>,
    pub shard: Tri<i64>,
    pub event_routing_key: Tri<String>,
}

/// `zentral_osquery_pack`
pub struct OsqueryPack;

impl Resource for OsqueryPack {
    type Model = OsqueryPackModel;
    const TYPE_NAME: &'static str = "zentral_osquery_pack";
    const ENDPOINT: &'static str = "osquery/packs/";
    const ID_KIND: IdKind = IdKind::Numeric;
    const LOOKUP_KEYS: &'static [&'static str] = &["name", "slug"];

    fn schema() -> Schema {
        Schema::v0()
            .with_description("Manages Osquery packs.")
            .with_attribute("id", Attribute::numeric_id())
            .with_attribute(
                "name",
                Attribute::required_string().with_description("Name of the pack."),
            )
            .with_attribute(
                "slug",
                Attribute::computed_string()
                    .with_description("Slug of the pack, derived from its name by the server."),
            )
            .with_attribute(
                "description",
                Attribute::optional_string()
                    .with_description("Description of the pack.")
                    .with_default(json!("")),
            )
            .with_attribute(
                "discovery_queries",
                Attribute::optional_list(AttributeType::String)
                    .with_description("Queries deciding whether the pack runs on a machine.")
                    .with_default(json!([])),
            )
            .with_attribute(
                "shard",
                Attribute::optional_int64()
                    .with_description("Restrict the pack to a percentage of the machines.")
                    .with_validator(Validator::between(1, 100)),
            )
            .with_attribute(
                "event_routing_key",
                Attribute::optional_string()
                    .with_description("Routing key added to the query result events."),
            )
    }

    fn to_request(model: &OsqueryPackModel) -> Result<Value, ProviderError> {
        RequestBody::new()
            .with("name", &model.name, NullPolicy::Omit)
            .with("description", &model.description, NullPolicy::Omit)
            .with("discovery_queries", &model.discovery_queries, NullPolicy::Omit)
            .with("shard", &model.shard, NullPolicy::SendNull)
            .with("event_routing_key", &model.event_routing_key, NullPolicy::SendNull)
            .build()
    }

    fn from_response(
        body: &Value,
        _input: Option<&OsqueryPackModel>,
    ) -> Result<OsqueryPackModel, ProviderError> {
        let r = ResponseBody::new(Self::TYPE_NAME, body)?;
        Ok(OsqueryPackModel {
            id: r.required("id")?,
            name: r.required("name")?,
            slug: r.required("slug")?,
            description: r.required("description")?,
            discovery_queries: r.list("discovery_queries")?,
            shard: r.optional("shard")?,
            event_routing_key: r.optional("event_routing_key")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{Lifecycle, ResourceHandler};
    use crate::testing::MockApi;
    use crate::value::UNKNOWN_SENTINEL;

    #[tokio::test]
    async fn test_slug_comes_from_the_server() {
        let api = MockApi::new();
        let handler = Lifecycle::<OsqueryPack>::new();

        let plan = handler
            .plan(None, &json!({"name": "Compliance checks", "shard": 50}))
            .unwrap();
        assert_eq!(plan.planned_state["slug"], UNKNOWN_SENTINEL);

        let state = handler.create(&api, &plan.planned_state).await.unwrap();
        assert_eq!(state["slug"], "compliance-checks");
        assert_eq!(state["event_routing_key"], Value::Null);
        assert_eq!(api.last_body("POST").unwrap()["event_routing_key"], Value::Null);

        let replan = handler
            .plan(Some(&state), &json!({"name": "Compliance checks", "shard": 50}))
            .unwrap();
        assert!(replan.changes.is_empty());
    }

    #[tokio::test]
    async fn test_rename_leaves_slug_unknown_until_applied() {
        let api = MockApi::new();
        let handler = Lifecycle::<OsqueryPack>::new();
        let config = json!({"name": "Compliance checks"});
        let plan = handler.plan(None, &config).unwrap();
        let state = handler.create(&api, &plan.planned_state).await.unwrap();

        let rename = handler
            .plan(Some(&state), &json!({"name": "Renamed pack"}))
            .unwrap();
        assert_eq!(rename.planned_state["slug"], UNKNOWN_SENTINEL);
        let paths: Vec<_> = rename.changes.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["name", "slug"]);
        assert!(!rename.requires_replace);

        let updated = handler
            .update(&api, &state, &rename.planned_state)
            .await
            .unwrap();
        assert_eq!(updated["slug"], "renamed-pack");
        assert!(handler
            .plan(Some(&updated), &json!({"name": "Renamed pack"}))
            .unwrap()
            .changes
            .is_empty());
    }
}
