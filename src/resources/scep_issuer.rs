use super::issuer_backend::IssuerBackend;
use crate::codec::{NullPolicy, RequestBody, ResponseBody};
use crate::error::ProviderError;
use crate::resource::{IdKind, Resource};
use crate::schema::{Attribute, Schema, Validator};
use crate::value::Tri;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// An MDM SCEP certificate issuer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScepIssuerModel {
    pub id: Tri<String>,
    pub name: Tri<String>,
    pub description: Tri<String>,
    pub url: Tri<String>,
    pub key_size: Tri<i64>,
    pub key_usage: Tri<i64>,
    pub allow_all_apps_access: Tri<bool>,
    #[serde(flatten)]
    pub backend: IssuerBackend,
}

/// `zentral_mdm_scep_issuer`
pub struct ScepIssuer;

impl Resource for ScepIssuer {
    type Model = ScepIssuerModel;
    const TYPE_NAME: &'static str = "zentral_mdm_scep_issuer";
    const ENDPOINT: &'static str = "mdm/scep_issuers/";
    const ID_KIND: IdKind = IdKind::Uuid;

    fn schema() -> Schema {
        let schema = Schema::v0()
            .with_description("Manages MDM SCEP issuers.")
            .with_attribute("id", Attribute::string_id())
            .with_attribute(
                "name",
                Attribute::required_string().with_description("Name of the SCEP issuer."),
            )
            .with_attribute(
                "description",
                Attribute::optional_string()
                    .with_description("Description of the SCEP issuer.")
                    .with_default(json!("")),
            )
            .with_attribute(
                "url",
                Attribute::required_string()
                    .with_description("URL of the SCEP server.")
                    .with_validator(Validator::HttpUrl),
            )
            .with_attribute(
                "key_size",
                Attribute::optional_int64()
                    .with_description("Size of the RSA private key in bits.")
                    .with_default(json!(2048))
                    .with_validator(Validator::between(1024, 4096)),
            )
            .with_attribute(
                "key_usage",
                Attribute::optional_int64()
                    .with_description(
                        "Key usage bit mask: 0 for none, 1 for signing, 4 for encryption.",
                    )
                    .with_default(json!(0))
                    .with_validator(Validator::between(0, 5)),
            )
            .with_attribute(
                "allow_all_apps_access",
                Attribute::optional_bool()
                    .with_description("Allow all apps to access the private key.")
                    .with_default(json!(false)),
            );
        IssuerBackend::extend_schema(schema)
    }

    fn to_request(model: &ScepIssuerModel) -> Result<Value, ProviderError> {
        let body = RequestBody::new()
            .with("name", &model.name, NullPolicy::Omit)
            .with("description", &model.description, NullPolicy::Omit)
            .with("url", &model.url, NullPolicy::Omit)
            .with("key_size", &model.key_size, NullPolicy::Omit)
            .with("key_usage", &model.key_usage, NullPolicy::Omit)
            .with(
                "allow_all_apps_access",
                &model.allow_all_apps_access,
                NullPolicy::Omit,
            );
        model.backend.encode(body).build()
    }

    fn from_response(
        body: &Value,
        _input: Option<&ScepIssuerModel>,
    ) -> Result<ScepIssuerModel, ProviderError> {
        let r = ResponseBody::new(Self::TYPE_NAME, body)?;
        Ok(ScepIssuerModel {
            id: r.required("id")?,
            name: r.required("name")?,
            description: r.required("description")?,
            url: r.required("url")?,
            key_size: r.required("key_size")?,
            key_usage: r.required("key_usage")?,
            allow_all_apps_access: r.required("allow_all_apps_access")?,
            backend: IssuerBackend::decode(&r)?,
        })
    }
}
