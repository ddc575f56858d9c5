use crate::codec::{NullPolicy, RequestBody, ResponseBody};
use crate::error::ProviderError;
use crate::resource::{IdKind, Resource};
use crate::schema::{Attribute, Schema};
use crate::value::Tri;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A custom view shown during MDM enrollments.
///
/// The HTML is configured as a local file. Its contents are uploaded, and
/// the path itself is only kept in the state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrollmentCustomViewModel {
    pub id: Tri<String>,
    pub name: Tri<String>,
    pub description: Tri<String>,
    pub html_file: Tri<String>,
    pub requires_authentication: Tri<bool>,
}

/// `zentral_mdm_enrollment_custom_view`
pub struct EnrollmentCustomView;

impl Resource for EnrollmentCustomView {
    type Model = EnrollmentCustomViewModel;
    const TYPE_NAME: &'static str = "zentral_mdm_enrollment_custom_view";
    const ENDPOINT: &'static str = "mdm/enrollment_custom_views/";
    const ID_KIND: IdKind = IdKind::Uuid;
    const FILE_INPUTS: &'static [(&'static str, &'static str)] = &[("html_file", "html")];

    fn schema() -> Schema {
        Schema::v0()
            .with_description("Manages MDM enrollment custom views.")
            .with_attribute("id", Attribute::string_id())
            .with_attribute(
                "name",
                Attribute::required_string().with_description("Name of the custom view."),
            )
            .with_attribute(
                "description",
                Attribute::optional_string()
                    .with_description("Description of the custom view.")
                    .with_default(json!("")),
            )
            .with_attribute(
                "html_file",
                Attribute::required_string()
                    .with_description("Path to the HTML template of the custom view."),
            )
            .with_attribute(
                "requires_authentication",
                Attribute::optional_bool()
                    .with_description("Only display the view to authenticated users.")
                    .with_default(json!(false)),
            )
    }

    // `html` is filled in from `html_file` by the lifecycle.
    fn to_request(model: &EnrollmentCustomViewModel) -> Result<Value, ProviderError> {
        RequestBody::new()
            .with("name", &model.name, NullPolicy::Omit)
            .with("description", &model.description, NullPolicy::Omit)
            .with(
                "requires_authentication",
                &model.requires_authentication,
                NullPolicy::Omit,
            )
            .build()
    }

    fn from_response(
        body: &Value,
        input: Option<&EnrollmentCustomViewModel>,
    ) -> Result<EnrollmentCustomViewModel, ProviderError> {
        let r = ResponseBody::new(Self::TYPE_NAME, body)?;
        Ok(EnrollmentCustomViewModel {
            id: r.required("id")?,
            name: r.required("name")?,
            description: r.required("description")?,
            // never returned by the server
            html_file: input
                .map(|m| m.html_file.clone())
                .unwrap_or_default(),
            requires_authentication: r.required("requires_authentication")?,
        })
    }
}
