//! The certificate issuer backend shared by the ACME and SCEP issuers.
//!
//! `backend` selects which of the four nested objects is set. On the wire
//! each nested object travels as `<backend>_kwargs`, and the inactive ones
//! are sent as `null` so switching backends clears the previous settings.

use crate::codec::{NullPolicy, RequestBody, ResponseBody};
use crate::error::ProviderError;
use crate::schema::{Attribute, Block, Constraint, NestedBlock, Schema, Validator};
use crate::value::Tri;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// `(backend, nested attribute)` pairs.
const BACKENDS: [(&str, &str); 4] = [
    ("STATIC_CHALLENGE", "static_challenge"),
    ("MICROSOFT_CA", "microsoft_ca"),
    ("OKTA_CA", "okta_ca"),
    ("IDENT", "ident"),
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticChallenge {
    pub challenge: Tri<String>,
}

/// Credentials of a Microsoft or Okta CA.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaCredentials {
    pub url: Tri<String>,
    pub username: Tri<String>,
    pub password: Tri<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ident {
    pub url: Tri<String>,
    pub bearer_token: Tri<String>,
    pub request_timeout: Tri<i64>,
    pub max_retries: Tri<i64>,
}

/// Backend selection and settings, flattened into the issuer models.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IssuerBackend {
    pub backend: Tri<String>,
    pub static_challenge: Tri<StaticChallenge>,
    pub microsoft_ca: Tri<CaCredentials>,
    pub okta_ca: Tri<CaCredentials>,
    pub ident: Tri<Ident>,
}

fn ca_block(vendor: &str) -> NestedBlock {
    NestedBlock::single(
        Block::new()
            .with_description(format!("{} CA settings.", vendor))
            .with_attribute(
                "url",
                Attribute::required_string()
                    .with_description("URL of the CA.")
                    .with_validator(Validator::HttpUrl),
            )
            .with_attribute(
                "username",
                Attribute::required_string().with_description("Username."),
            )
            .with_attribute(
                "password",
                Attribute::required_string()
                    .with_description("Password.")
                    .sensitive(),
            ),
    )
}

impl IssuerBackend {
    /// Add the backend attributes and their constraints to an issuer schema.
    pub fn extend_schema(schema: Schema) -> Schema {
        schema
            .with_attribute(
                "backend",
                Attribute::required_string()
                    .with_description(format!(
                        "Challenge backend. Possible values: {}.",
                        BACKENDS.map(|(backend, _)| backend).join(", ")
                    ))
                    .with_validator(Validator::one_of(BACKENDS.map(|(backend, _)| backend))),
            )
            .with_block(
                "static_challenge",
                NestedBlock::single(
                    Block::new()
                        .with_description("Static challenge settings.")
                        .with_attribute(
                            "challenge",
                            Attribute::required_string()
                                .with_description("The static challenge.")
                                .sensitive(),
                        ),
                ),
            )
            .with_block("microsoft_ca", ca_block("Microsoft"))
            .with_block("okta_ca", ca_block("Okta"))
            .with_block(
                "ident",
                NestedBlock::single(
                    Block::new()
                        .with_description("IDent settings.")
                        .with_attribute(
                            "url",
                            Attribute::required_string()
                                .with_description("URL of the IDent server.")
                                .with_validator(Validator::HttpUrl),
                        )
                        .with_attribute(
                            "bearer_token",
                            Attribute::required_string()
                                .with_description("Bearer token.")
                                .sensitive(),
                        )
                        .with_attribute(
                            "request_timeout",
                            Attribute::optional_int64()
                                .with_description("Request timeout in seconds.")
                                .with_default(json!(30))
                                .with_validator(Validator::between(1, 120)),
                        )
                        .with_attribute(
                            "max_retries",
                            Attribute::optional_int64()
                                .with_description("Maximum number of retries.")
                                .with_default(json!(3))
                                .with_validator(Validator::between(1, 5)),
                        ),
                ),
            )
            .with_constraints(Constraint::backend("backend", &BACKENDS))
    }

    /// Add the backend fields to a request body.
    pub fn encode(&self, body: RequestBody) -> RequestBody {
        let ca = |c: &CaCredentials| {
            RequestBody::new()
                .with("url", &c.url, NullPolicy::Omit)
                .with("username", &c.username, NullPolicy::Omit)
                .with("password", &c.password, NullPolicy::Omit)
        };
        body.with("backend", &self.backend, NullPolicy::Omit)
            .with_object(
                "static_challenge_kwargs",
                &self.static_challenge,
                NullPolicy::SendNull,
                |s| RequestBody::new().with("challenge", &s.challenge, NullPolicy::Omit),
            )
            .with_object(
                "microsoft_ca_kwargs",
                &self.microsoft_ca,
                NullPolicy::SendNull,
                ca,
            )
            .with_object("okta_ca_kwargs", &self.okta_ca, NullPolicy::SendNull, ca)
            .with_object("ident_kwargs", &self.ident, NullPolicy::SendNull, |i| {
                RequestBody::new()
                    .with("url", &i.url, NullPolicy::Omit)
                    .with("bearer_token", &i.bearer_token, NullPolicy::Omit)
                    .with("request_timeout", &i.request_timeout, NullPolicy::Omit)
                    .with("max_retries", &i.max_retries, NullPolicy::Omit)
            })
    }

    /// Read the backend fields from a response body.
    pub fn decode(r: &ResponseBody<'_>) -> Result<Self, ProviderError> {
        let ca = |r: ResponseBody<'_>| -> Result<CaCredentials, ProviderError> {
            Ok(CaCredentials {
                url: r.required("url")?,
                username: r.required("username")?,
                password: r.required("password")?,
            })
        };
        Ok(Self {
            backend: r.required("backend")?,
            static_challenge: r.object("static_challenge_kwargs", |r| {
                Ok(StaticChallenge {
                    challenge: r.required("challenge")?,
                })
            })?,
            microsoft_ca: r.object("microsoft_ca_kwargs", ca)?,
            okta_ca: r.object("okta_ca_kwargs", ca)?,
            ident: r.object("ident_kwargs", |r| {
                Ok(Ident {
                    url: r.required("url")?,
                    bearer_token: r.required("bearer_token")?,
                    request_timeout: r.required("request_timeout")?,
                    max_retries: r.required("max_retries")?,
                })
            })?,
        })
    }
}
