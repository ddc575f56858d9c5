use crate::codec::{NullPolicy, RequestBody, ResponseBody};
use crate::error::ProviderError;
use crate::resource::{IdKind, Resource};
use crate::schema::{Attribute, AttributeType, Schema, Validator};
use crate::value::{SetOf, Tri};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const ARTIFACT_TYPES: [&str; 7] = [
    "Configuration (manual)",
    "Enterprise App",
    "Manual Configuration",
    "Profile",
    "Store App",
    "Data Asset",
    "Declaration",
];

const CHANNELS: [&str; 2] = ["Device", "User"];

const PLATFORMS: [&str; 4] = ["iOS", "iPadOS", "macOS", "tvOS"];

const OS_UPDATE_REINSTALLS: [&str; 4] = ["No", "Major", "Minor", "Patch"];

/// An MDM artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactModel {
    pub id: Tri<String>,
    pub name: Tri<String>,
    #[serde(rename = "type")]
    pub artifact_type: Tri<String>,
    pub channel: Tri<String>,
    pub platforms: Tri<SetOf<String>>,
    pub install_during_setup_assistant: Tri<bool>,
    pub auto_update: Tri<bool>,
    pub reinstall_interval: Tri<i64>,
    pub reinstall_on_os_update: Tri<String>,
    pub requires: Tri<SetOf<String>>,
}

/// `zentral_mdm_artifact`
pub struct Artifact;

impl Resource for Artifact {
    type Model = ArtifactModel;
    const TYPE_NAME: &'static str = "zentral_mdm_artifact";
    const ENDPOINT: &'static str = "mdm/artifacts/";
    const ID_KIND: IdKind = IdKind::Uuid;

    fn schema() -> Schema {
        Schema::v0()
            .with_description("Manages MDM artifacts.")
            .with_attribute("id", Attribute::string_id())
            .with_attribute(
                "name",
                Attribute::required_string().with_description("Name of the artifact."),
            )
            .with_attribute(
                "type",
                Attribute::required_string()
                    .with_description(format!(
                        "Type of the artifact. Possible values: {}.",
                        ARTIFACT_TYPES.join(", ")
                    ))
                    .with_validator(Validator::one_of(ARTIFACT_TYPES)),
            )
            .with_attribute(
                "channel",
                Attribute::required_string()
                    .with_description("Channel of the artifact: Device or User.")
                    .with_validator(Validator::one_of(CHANNELS)),
            )
            .with_attribute(
                "platforms",
                Attribute::required_set(AttributeType::String)
                    .with_description("Platforms of the artifact.")
                    .with_validator(Validator::size_at_least(1))
                    .with_validator(Validator::each(Validator::one_of(PLATFORMS))),
            )
            .with_attribute(
                "install_during_setup_assistant",
                Attribute::optional_bool()
                    .with_description("Install the artifact during the setup assistant.")
                    .with_default(json!(false)),
            )
            .with_attribute(
                "auto_update",
                Attribute::optional_bool()
                    .with_description("Install new versions of the artifact automatically.")
                    .with_default(json!(true)),
            )
            .with_attribute(
                "reinstall_interval",
                Attribute::optional_int64()
                    .with_description(
                        "Number of days after which the artifact is reinstalled. 0 disables it.",
                    )
                    .with_default(json!(0))
                    .with_validator(Validator::between(0, 366)),
            )
            .with_attribute(
                "reinstall_on_os_update",
                Attribute::optional_string()
                    .with_description(format!(
                        "Reinstall the artifact on OS updates. Possible values: {}.",
                        OS_UPDATE_REINSTALLS.join(", ")
                    ))
                    .with_default(json!("No"))
                    .with_validator(Validator::one_of(OS_UPDATE_REINSTALLS)),
            )
            .with_attribute(
                "requires",
                Attribute::optional_set(AttributeType::String)
                    .with_description("IDs of the artifacts required by this artifact.")
                    .with_default(json!([]))
                    .with_validator(Validator::each(Validator::Uuid)),
            )
    }

    fn to_request(model: &ArtifactModel) -> Result<Value, ProviderError> {
        RequestBody::new()
            .with("name", &model.name, NullPolicy::Omit)
            .with("type", &model.artifact_type, NullPolicy::Omit)
            .with("channel", &model.channel, NullPolicy::Omit)
            .with("platforms", &model.platforms, NullPolicy::Omit)
            .with(
                "install_during_setup_assistant",
                &model.install_during_setup_assistant,
                NullPolicy::Omit,
            )
            .with("auto_update", &model.auto_update, NullPolicy::Omit)
            .with("reinstall_interval", &model.reinstall_interval, NullPolicy::Omit)
            .with(
                "reinstall_on_os_update",
                &model.reinstall_on_os_update,
                NullPolicy::Omit,
            )
            .with("requires", &model.requires, NullPolicy::Omit)
            .build()
    }

    fn from_response(
        body: &Value,
        _input: Option<&ArtifactModel>,
    ) -> Result<ArtifactModel, ProviderError> {
        let r = ResponseBody::new(Self::TYPE_NAME, body)?;
        Ok(ArtifactModel {
            id: r.required("id")?,
            name: r.required("name")?,
            artifact_type: r.required("type")?,
            channel: r.required("channel")?,
            platforms: r.set("platforms")?,
            install_during_setup_assistant: r.required("install_during_setup_assistant")?,
            auto_update: r.required("auto_update")?,
            reinstall_interval: r.required("reinstall_interval")?,
            reinstall_on_os_update: r.required("reinstall_on_os_update")?,
            requires: r.set("requires")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{Lifecycle, ResourceHandler};

    #[test]
    fn test_platform_validation() {
        let handler = Lifecycle::<Artifact>::new();
        let config = |platforms: Value| {
            json!({"name": "Zentral", "type": "Profile", "channel": "Device", "platforms": platforms})
        };

        assert!(handler.validate(&config(json!(["macOS", "iOS"]))).is_empty());
        assert_eq!(handler.validate(&config(json!([]))).len(), 1);
        assert_eq!(handler.validate(&config(json!(["Android"]))).len(), 1);
    }

    #[test]
    fn test_requires_must_be_uuids() {
        let diagnostics = Lifecycle::<Artifact>::new().validate(&json!({
            "name": "Zentral",
            "type": "Profile",
            "channel": "Device",
            "platforms": ["macOS"],
            "requires": ["yolo"],
        }));
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_type_key() {
        let model = ArtifactModel {
            name: "Zentral".into(),
            artifact_type: "Profile".into(),
            ..Default::default()
        };
        let body = Artifact::to_request(&model).unwrap();
        assert_eq!(body["type"], "Profile");
        assert_eq!(serde_json::to_value(&model).unwrap()["type"], "Profile");
    }
}
