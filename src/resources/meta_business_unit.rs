use crate::codec::{NullPolicy, RequestBody, ResponseBody};
use crate::error::ProviderError;
use crate::resource::{IdKind, Resource};
use crate::schema::{Attribute, Diagnostic, Schema};
use crate::value::Tri;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A meta business unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetaBusinessUnitModel {
    pub id: Tri<i64>,
    pub name: Tri<String>,
    pub api_enrollment_enabled: Tri<bool>,
}

/// `zentral_meta_business_unit`
pub struct MetaBusinessUnit;

impl Resource for MetaBusinessUnit {
    type Model = MetaBusinessUnitModel;
    const TYPE_NAME: &'static str = "zentral_meta_business_unit";
    const ENDPOINT: &'static str = "inventory/meta_business_units/";
    const ID_KIND: IdKind = IdKind::Numeric;

    fn schema() -> Schema {
        Schema::v0()
            .with_description("Manages meta business units.")
            .with_attribute("id", Attribute::numeric_id())
            .with_attribute(
                "name",
                Attribute::required_string().with_description("Name of the meta business unit."),
            )
            .with_attribute(
                "api_enrollment_enabled",
                Attribute::optional_bool()
                    .with_description(
                        "Enables API enrollments. Cannot be disabled once enabled.",
                    )
                    .with_default(json!(false)),
            )
    }

    fn to_request(model: &MetaBusinessUnitModel) -> Result<Value, ProviderError> {
        RequestBody::new()
            .with("name", &model.name, NullPolicy::Omit)
            .with(
                "api_enrollment_enabled",
                &model.api_enrollment_enabled,
                NullPolicy::Omit,
            )
            .build()
    }

    fn from_response(
        body: &Value,
        _input: Option<&MetaBusinessUnitModel>,
    ) -> Result<MetaBusinessUnitModel, ProviderError> {
        let r = ResponseBody::new(Self::TYPE_NAME, body)?;
        Ok(MetaBusinessUnitModel {
            id: r.required("id")?,
            name: r.required("name")?,
            api_enrollment_enabled: r.required("api_enrollment_enabled")?,
        })
    }

    fn validate_update(
        prior: &MetaBusinessUnitModel,
        planned: &MetaBusinessUnitModel,
    ) -> Vec<Diagnostic> {
        match (
            prior.api_enrollment_enabled.get(),
            planned.api_enrollment_enabled.get(),
        ) {
            (Some(true), Some(false)) => vec![Diagnostic::error(
                "API enrollment cannot be disabled",
            )
            .with_detail("Once enabled on a meta business unit, API enrollment stays enabled.")
            .with_attribute("api_enrollment_enabled")],
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{Lifecycle, ResourceHandler};

    #[test]
    fn test_api_enrollment_cannot_be_disabled() {
        let handler = Lifecycle::<MetaBusinessUnit>::new();
        let state = json!({"id": 1, "name": "Default", "api_enrollment_enabled": true});

        let err = handler
            .plan(Some(&state), &json!({"name": "Default", "api_enrollment_enabled": false}))
            .unwrap_err();
        assert!(matches!(err, ProviderError::Diagnostics(_)));

        // enabling is fine
        let state = json!({"id": 1, "name": "Default", "api_enrollment_enabled": false});
        let plan = handler
            .plan(Some(&state), &json!({"name": "Default", "api_enrollment_enabled": true}))
            .unwrap();
        assert_eq!(plan.changes.len(), 1);
    }
}
