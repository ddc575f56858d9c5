use crate::codec::{NullPolicy, RequestBody, ResponseBody, COLLECTION_OPTS};
use crate::error::ProviderError;
use crate::resource::{IdKind, Resource};
use crate::schema::{Attribute, AttributeType, Schema, Validator};
use crate::value::{SetOf, Tri};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// An MDM blueprint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlueprintModel {
    pub id: Tri<i64>,
    pub name: Tri<String>,
    pub inventory_interval: Tri<i64>,
    pub collect_apps: Tri<String>,
    pub collect_certificates: Tri<String>,
    pub collect_profiles: Tri<String>,
    pub legacy_profiles_via_ddm: Tri<bool>,
    pub filevault_config_id: Tri<i64>,
    pub recovery_password_config_id: Tri<i64>,
    pub software_update_enforcement_ids: Tri<SetOf<i64>>,
}

/// `zentral_mdm_blueprint`
pub struct Blueprint;

fn collection_option(what: &str) -> Attribute {
    Attribute::optional_string()
        .with_description(format!(
            "Inventory collection of the {}. Possible values: {}.",
            what,
            COLLECTION_OPTS.labels().collect::<Vec<_>>().join(", ")
        ))
        .with_default(json!("NO"))
        .with_validator(Validator::one_of(COLLECTION_OPTS.labels()))
}

impl Resource for Blueprint {
    type Model = BlueprintModel;
    const TYPE_NAME: &'static str = "zentral_mdm_blueprint";
    const ENDPOINT: &'static str = "mdm/blueprints/";
    const ID_KIND: IdKind = IdKind::Numeric;

    fn schema() -> Schema {
        Schema::v0()
            .with_description("Manages MDM blueprints.")
            .with_attribute("id", Attribute::numeric_id())
            .with_attribute(
                "name",
                Attribute::required_string().with_description("Name of the blueprint."),
            )
            .with_attribute(
                "inventory_interval",
                Attribute::optional_int64()
                    .with_description("Number of seconds between inventory collections.")
                    .with_default(json!(86400))
                    .with_validator(Validator::between(14400, 86400)),
            )
            .with_attribute("collect_apps", collection_option("applications"))
            .with_attribute("collect_certificates", collection_option("certificates"))
            .with_attribute("collect_profiles", collection_option("profiles"))
            .with_attribute(
                "legacy_profiles_via_ddm",
                Attribute::optional_bool()
                    .with_description("Send the legacy profiles via declarative management.")
                    .bool_default_on_create(true),
            )
            .with_attribute(
                "filevault_config_id",
                Attribute::optional_int64()
                    .with_description("ID of the FileVault configuration."),
            )
            .with_attribute(
                "recovery_password_config_id",
                Attribute::optional_int64()
                    .with_description("ID of the recovery password configuration."),
            )
            .with_attribute(
                "software_update_enforcement_ids",
                Attribute::optional_set(AttributeType::Int64)
                    .with_description("IDs of the software update enforcements.")
                    .with_default(json!([])),
            )
    }

    fn to_request(model: &BlueprintModel) -> Result<Value, ProviderError> {
        RequestBody::new()
            .with("name", &model.name, NullPolicy::Omit)
            .with("inventory_interval", &model.inventory_interval, NullPolicy::Omit)
            .with_enum("collect_apps", &model.collect_apps, &COLLECTION_OPTS)
            .with_enum(
                "collect_certificates",
                &model.collect_certificates,
                &COLLECTION_OPTS,
            )
            .with_enum("collect_profiles", &model.collect_profiles, &COLLECTION_OPTS)
            .with(
                "legacy_profiles_via_ddm",
                &model.legacy_profiles_via_ddm,
                NullPolicy::Omit,
            )
            .with(
                "filevault_config",
                &model.filevault_config_id,
                NullPolicy::SendNull,
            )
            .with(
                "recovery_password_config",
                &model.recovery_password_config_id,
                NullPolicy::SendNull,
            )
            .with(
                "software_update_enforcements",
                &model.software_update_enforcement_ids,
                NullPolicy::Omit,
            )
            .build()
    }

    fn from_response(
        body: &Value,
        _input: Option<&BlueprintModel>,
    ) -> Result<BlueprintModel, ProviderError> {
        let r = ResponseBody::new(Self::TYPE_NAME, body)?;
        Ok(BlueprintModel {
            id: r.required("id")?,
            name: r.required("name")?,
            inventory_interval: r.required("inventory_interval")?,
            collect_apps: r.required_enum("collect_apps", &COLLECTION_OPTS)?,
            collect_certificates: r.required_enum("collect_certificates", &COLLECTION_OPTS)?,
            collect_profiles: r.required_enum("collect_profiles", &COLLECTION_OPTS)?,
            legacy_profiles_via_ddm: r.required("legacy_profiles_via_ddm")?,
            filevault_config_id: r.optional("filevault_config")?,
            recovery_password_config_id: r.optional("recovery_password_config")?,
            software_update_enforcement_ids: r.set("software_update_enforcements")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{Lifecycle, ResourceHandler};

    #[test]
    fn test_plan_defaults() {
        let plan = Lifecycle::<Blueprint>::new()
            .plan(None, &json!({"name": "Default"}))
            .unwrap();
        let state = plan.planned_state;
        assert_eq!(state["inventory_interval"], 86400);
        assert_eq!(state["collect_apps"], "NO");
        assert_eq!(state["legacy_profiles_via_ddm"], true);
        assert_eq!(state["filevault_config_id"], Value::Null);
        assert_eq!(state["software_update_enforcement_ids"], json!([]));
    }

    #[test]
    fn test_legacy_profiles_keep_prior_on_update() {
        let prior = json!({
            "id": 1,
            "name": "Default",
            "inventory_interval": 86400,
            "collect_apps": "NO",
            "collect_certificates": "NO",
            "collect_profiles": "NO",
            "legacy_profiles_via_ddm": false,
            "filevault_config_id": null,
            "recovery_password_config_id": null,
            "software_update_enforcement_ids": [],
        });
        let plan = Lifecycle::<Blueprint>::new()
            .plan(Some(&prior), &json!({"name": "Default"}))
            .unwrap();
        assert!(plan.changes.is_empty());
        assert_eq!(plan.planned_state["legacy_profiles_via_ddm"], false);
    }

    #[test]
    fn test_inventory_interval_range() {
        let diagnostics = Lifecycle::<Blueprint>::new()
            .validate(&json!({"name": "Default", "inventory_interval": 3600}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].attribute,
            Some("inventory_interval".to_string())
        );
    }

    #[test]
    fn test_unknown_collection_code() {
        let body = json!({
            "id": 1,
            "name": "Default",
            "inventory_interval": 86400,
            "collect_apps": 3,
            "collect_certificates": 0,
            "collect_profiles": 0,
            "legacy_profiles_via_ddm": true,
        });
        assert!(matches!(
            Blueprint::from_response(&body, None),
            Err(ProviderError::CodecMismatch(_))
        ));
    }
}
