use super::issuer_backend::IssuerBackend;
use crate::codec::{NullPolicy, RequestBody, ResponseBody};
use crate::error::ProviderError;
use crate::resource::{IdKind, Resource};
use crate::schema::{Attribute, AttributeType, Schema, Validator};
use crate::value::{SetOf, Tri};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const KEY_TYPES: [&str; 2] = ["RSA", "ECSECPrimeRandom"];

/// An MDM ACME certificate issuer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcmeIssuerModel {
    pub id: Tri<String>,
    pub name: Tri<String>,
    pub description: Tri<String>,
    pub directory_url: Tri<String>,
    pub key_size: Tri<i64>,
    pub key_type: Tri<String>,
    pub usage_flags: Tri<i64>,
    pub extended_key_usage: Tri<SetOf<String>>,
    pub hardware_bound: Tri<bool>,
    pub attest: Tri<bool>,
    #[serde(flatten)]
    pub backend: IssuerBackend,
}

/// `zentral_mdm_acme_issuer`
pub struct AcmeIssuer;

impl Resource for AcmeIssuer {
    type Model = AcmeIssuerModel;
    const TYPE_NAME: &'static str = "zentral_mdm_acme_issuer";
    const ENDPOINT: &'static str = "mdm/acme_issuers/";
    const ID_KIND: IdKind = IdKind::Uuid;

    fn schema() -> Schema {
        let schema = Schema::v0()
            .with_description("Manages MDM ACME issuers.")
            .with_attribute("id", Attribute::string_id())
            .with_attribute(
                "name",
                Attribute::required_string().with_description("Name of the ACME issuer."),
            )
            .with_attribute(
                "description",
                Attribute::optional_string()
                    .with_description("Description of the ACME issuer.")
                    .with_default(json!("")),
            )
            .with_attribute(
                "directory_url",
                Attribute::required_string()
                    .with_description("URL of the ACME directory.")
                    .with_validator(Validator::HttpUrl),
            )
            .with_attribute(
                "key_size",
                Attribute::required_int64()
                    .with_description("Size of the private key in bits.")
                    .with_validator(Validator::between(256, 4096)),
            )
            .with_attribute(
                "key_type",
                Attribute::required_string()
                    .with_description("Type of the private key: RSA or ECSECPrimeRandom.")
                    .with_validator(Validator::one_of(KEY_TYPES)),
            )
            .with_attribute(
                "usage_flags",
                Attribute::optional_int64()
                    .with_description(
                        "Key usage bit mask: 1 for signing, 4 for encryption.",
                    )
                    .with_default(json!(1))
                    .with_validator(Validator::between(0, 5)),
            )
            .with_attribute(
                "extended_key_usage",
                Attribute::optional_set(AttributeType::String)
                    .with_description("Extended key usage OIDs.")
                    .with_default(json!([])),
            )
            .with_attribute(
                "hardware_bound",
                Attribute::optional_bool()
                    .with_description("Require a hardware bound private key.")
                    .with_default(json!(false)),
            )
            .with_attribute(
                "attest",
                Attribute::optional_bool()
                    .with_description("Attest the private key.")
                    .with_default(json!(false)),
            );
        IssuerBackend::extend_schema(schema)
    }

    fn to_request(model: &AcmeIssuerModel) -> Result<Value, ProviderError> {
        let body = RequestBody::new()
            .with("name", &model.name, NullPolicy::Omit)
            .with("description", &model.description, NullPolicy::Omit)
            .with("directory_url", &model.directory_url, NullPolicy::Omit)
            .with("key_size", &model.key_size, NullPolicy::Omit)
            .with("key_type", &model.key_type, NullPolicy::Omit)
            .with("usage_flags", &model.usage_flags, NullPolicy::Omit)
            .with(
                "extended_key_usage",
                &model.extended_key_usage,
                NullPolicy::Omit,
            )
            .with("hardware_bound", &model.hardware_bound, NullPolicy::Omit)
            .with("attest", &model.attest, NullPolicy::Omit);
        model.backend.encode(body).build()
    }

    fn from_response(
        body: &Value,
        _input: Option<&AcmeIssuerModel>,
    ) -> Result<AcmeIssuerModel, ProviderError> {
        let r = ResponseBody::new(Self::TYPE_NAME, body)?;
        Ok(AcmeIssuerModel {
            id: r.required("id")?,
            name: r.required("name")?,
            description: r.required("description")?,
            directory_url: r.required("directory_url")?,
            key_size: r.required("key_size")?,
            key_type: r.required("key_type")?,
            usage_flags: r.required("usage_flags")?,
            extended_key_usage: r.set("extended_key_usage")?,
            hardware_bound: r.required("hardware_bound")?,
            attest: r.required("attest")?,
            backend: IssuerBackend::decode(&r)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{Lifecycle, ResourceHandler};

    fn config() -> Value {
        json!({
            "name": "YOLO",
            "directory_url": "https://www.example.com/acme/",
            "key_size": 384,
            "key_type": "ECSECPrimeRandom",
            "backend": "STATIC_CHALLENGE",
            "static_challenge": {"challenge": "Yolo"},
        })
    }

    #[test]
    fn test_model_state_shape() {
        let planned = Lifecycle::<AcmeIssuer>::new()
            .plan(None, &config())
            .unwrap()
            .planned_state;
        let model: AcmeIssuerModel = serde_json::from_value(planned).unwrap();
        assert_eq!(model.backend.backend.as_str(), Some("STATIC_CHALLENGE"));
        assert!(model.backend.okta_ca.is_null());
        assert_eq!(model.usage_flags, Tri::value(1));

        let body = AcmeIssuer::to_request(&model).unwrap();
        assert_eq!(body["static_challenge_kwargs"], json!({"challenge": "Yolo"}));
        assert_eq!(body["ident_kwargs"], Value::Null);
        assert!(body.get("id").is_none());
    }

    #[test]
    fn test_key_type() {
        let mut config = config();
        config["key_type"] = json!("DSA");
        assert_eq!(Lifecycle::<AcmeIssuer>::new().validate(&config).len(), 1);
    }
}
