use crate::codec::{NullPolicy, RequestBody, ResponseBody};
use crate::error::ProviderError;
use crate::resource::{IdKind, Resource};
use crate::schema::{Attribute, Schema, Validator};
use crate::value::Tri;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// An MDM FileVault configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileVaultConfigModel {
    pub id: Tri<i64>,
    pub name: Tri<String>,
    pub escrow_location_display_name: Tri<String>,
    pub at_login_only: Tri<bool>,
    pub bypass_attempts: Tri<i64>,
    pub show_recovery_key: Tri<bool>,
    pub destroy_key_on_standby: Tri<bool>,
    pub prk_rotation_interval_days: Tri<i64>,
}

/// `zentral_mdm_filevault_config`
pub struct FileVaultConfig;

fn flag(description: &str) -> Attribute {
    Attribute::optional_bool()
        .with_description(description)
        .with_default(json!(false))
}

impl Resource for FileVaultConfig {
    type Model = FileVaultConfigModel;
    const TYPE_NAME: &'static str = "zentral_mdm_filevault_config";
    const ENDPOINT: &'static str = "mdm/filevault_configs/";
    const ID_KIND: IdKind = IdKind::Numeric;

    fn schema() -> Schema {
        Schema::v0()
            .with_description("Manages MDM FileVault configurations.")
            .with_attribute("id", Attribute::numeric_id())
            .with_attribute(
                "name",
                Attribute::required_string().with_description("Name of the configuration."),
            )
            .with_attribute(
                "escrow_location_display_name",
                Attribute::required_string()
                    .with_description("Name of the escrow location displayed to the user."),
            )
            .with_attribute(
                "at_login_only",
                flag("Only prompt the user to enable FileVault at login."),
            )
            .with_attribute(
                "bypass_attempts",
                Attribute::optional_int64()
                    .with_description(
                        "Number of times the user can bypass enabling FileVault. -1 disables the prompt at logout.",
                    )
                    .with_default(json!(-1))
                    .with_validator(Validator::between(-1, 9999)),
            )
            .with_attribute(
                "show_recovery_key",
                flag("Display the personal recovery key to the user."),
            )
            .with_attribute(
                "destroy_key_on_standby",
                flag("Destroy the FileVault key when the device goes into standby."),
            )
            .with_attribute(
                "prk_rotation_interval_days",
                Attribute::optional_int64()
                    .with_description(
                        "Number of days between personal recovery key rotations. 0 disables the rotation.",
                    )
                    .with_default(json!(0))
                    .with_validator(Validator::between(0, 365)),
            )
    }

    fn to_request(model: &FileVaultConfigModel) -> Result<Value, ProviderError> {
        RequestBody::new()
            .with("name", &model.name, NullPolicy::Omit)
            .with(
                "escrow_location_display_name",
                &model.escrow_location_display_name,
                NullPolicy::Omit,
            )
            .with("at_login_only", &model.at_login_only, NullPolicy::Omit)
            .with("bypass_attempts", &model.bypass_attempts, NullPolicy::Omit)
            .with("show_recovery_key", &model.show_recovery_key, NullPolicy::Omit)
            .with(
                "destroy_key_on_standby",
                &model.destroy_key_on_standby,
                NullPolicy::Omit,
            )
            .with(
                "prk_rotation_interval_days",
                &model.prk_rotation_interval_days,
                NullPolicy::Omit,
            )
            .build()
    }

    fn from_response(
        body: &Value,
        _input: Option<&FileVaultConfigModel>,
    ) -> Result<FileVaultConfigModel, ProviderError> {
        let r = ResponseBody::new(Self::TYPE_NAME, body)?;
        Ok(FileVaultConfigModel {
            id: r.required("id")?,
            name: r.required("name")?,
            escrow_location_display_name: r.required("escrow_location_display_name")?,
            at_login_only: r.required("at_login_only")?,
            bypass_attempts: r.required("bypass_attempts")?,
            show_recovery_key: r.required("show_recovery_key")?,
            destroy_key_on_standby: r.required("destroy_key_on_standby")?,
            prk_rotation_interval_days: r.required("prk_rotation_interval_days")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{Lifecycle, ResourceHandler};

    #[test]
    fn test_bypass_attempts_range() {
        let handler = Lifecycle::<FileVaultConfig>::new();
        let config = |attempts: i64| {
            json!({
                "name": "Default",
                "escrow_location_display_name": "Zentral",
                "bypass_attempts": attempts,
            })
        };
        assert!(handler.validate(&config(-1)).is_empty());
        assert!(handler.validate(&config(9999)).is_empty());
        assert_eq!(handler.validate(&config(-2)).len(), 1);
    }
}
