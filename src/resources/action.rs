use super::{headers_block, Header};
use crate::codec::{NullPolicy, RequestBody, ResponseBody};
use crate::error::ProviderError;
use crate::resource::{IdKind, Resource};
use crate::schema::{Attribute, Block, Constraint, NestedBlock, Schema, Validator};
use crate::value::{SetOf, Tri};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const BACKENDS: [(&str, &str); 2] = [
    ("HTTP_POST", "http_post"),
    ("SLACK_INCOMING_WEBHOOK", "slack_incoming_webhook"),
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpPost {
    pub url: Tri<String>,
    pub username: Tri<String>,
    pub password: Tri<String>,
    pub headers: Tri<SetOf<Header>>,
    pub cel_transformation: Tri<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackIncomingWebhook {
    pub url: Tri<String>,
}

/// A probe action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionModel {
    pub id: Tri<String>,
    pub name: Tri<String>,
    pub description: Tri<String>,
    pub backend: Tri<String>,
    pub http_post: Tri<HttpPost>,
    pub slack_incoming_webhook: Tri<SlackIncomingWebhook>,
}

/// `zentral_probe_action`
pub struct Action;

impl Resource for Action {
    type Model = ActionModel;
    const TYPE_NAME: &'static str = "zentral_probe_action";
    const ENDPOINT: &'static str = "probes/actions/";
    const ID_KIND: IdKind = IdKind::Uuid;

    fn schema() -> Schema {
        Schema::v0()
            .with_description("Manages probe actions.")
            .with_attribute("id", Attribute::string_id())
            .with_attribute(
                "name",
                Attribute::required_string().with_description("Name of the action."),
            )
            .with_attribute(
                "description",
                Attribute::optional_string()
                    .with_description("Description of the action.")
                    .with_default(json!("")),
            )
            .with_attribute(
                "backend",
                Attribute::required_string()
                    .with_description("Action backend: HTTP_POST or SLACK_INCOMING_WEBHOOK.")
                    .with_validator(Validator::one_of(BACKENDS.map(|(backend, _)| backend))),
            )
            .with_block(
                "http_post",
                NestedBlock::single(
                    Block::new()
                        .with_description("HTTP POST backend settings.")
                        .with_attribute(
                            "url",
                            Attribute::required_string()
                                .with_description("URL the events are POSTed to.")
                                .with_validator(Validator::HttpUrl),
                        )
                        .with_attribute(
                            "username",
                            Attribute::optional_string()
                                .with_description("Basic authentication username."),
                        )
                        .with_attribute(
                            "password",
                            Attribute::optional_string()
                                .with_description("Basic authentication password.")
                                .sensitive(),
                        )
                        .with_block("headers", headers_block())
                        .with_attribute(
                            "cel_transformation",
                            Attribute::optional_string()
                                .with_description("CEL expression applied to the event before the POST."),
                        ),
                ),
            )
            .with_block(
                "slack_incoming_webhook",
                NestedBlock::single(
                    Block::new()
                        .with_description("Slack incoming webhook backend settings.")
                        .with_attribute(
                            "url",
                            Attribute::required_string()
                                .with_description("Slack incoming webhook URL.")
                                .with_validator(Validator::HttpUrl)
                                .sensitive(),
                        ),
                ),
            )
            .with_constraints(Constraint::backend("backend", &BACKENDS))
    }

    fn to_request(model: &ActionModel) -> Result<Value, ProviderError> {
        RequestBody::new()
            .with("name", &model.name, NullPolicy::Omit)
            .with("description", &model.description, NullPolicy::Omit)
            .with("backend", &model.backend, NullPolicy::Omit)
            .with_object(
                "http_post_kwargs",
                &model.http_post,
                NullPolicy::SendNull,
                |h| {
                    RequestBody::new()
                        .with("url", &h.url, NullPolicy::Omit)
                        .with("username", &h.username, NullPolicy::SendNull)
                        .with("password", &h.password, NullPolicy::SendNull)
                        .with("headers", &h.headers, NullPolicy::Omit)
                        .with("cel_transformation", &h.cel_transformation, NullPolicy::SendNull)
                },
            )
            .with_object(
                "slack_incoming_webhook_kwargs",
                &model.slack_incoming_webhook,
                NullPolicy::SendNull,
                |s| RequestBody::new().with("url", &s.url, NullPolicy::Omit),
            )
            .build()
    }

    fn from_response(
        body: &Value,
        _input: Option<&ActionModel>,
    ) -> Result<ActionModel, ProviderError> {
        let r = ResponseBody::new(Self::TYPE_NAME, body)?;
        Ok(ActionModel {
            id: r.required("id")?,
            name: r.required("name")?,
            description: r.required("description")?,
            backend: r.required("backend")?,
            http_post: r.object("http_post_kwargs", |h| {
                Ok(HttpPost {
                    url: h.required("url")?,
                    username: h.optional("username")?,
                    password: h.optional("password")?,
                    headers: h.object_set("headers", |header| {
                        Ok(Header {
                            name: header.required("name")?,
                            value: header.required("value")?,
                        })
                    })?,
                    cel_transformation: h.optional("cel_transformation")?,
                })
            })?,
            slack_incoming_webhook: r.object("slack_incoming_webhook_kwargs", |s| {
                Ok(SlackIncomingWebhook {
                    url: s.required("url")?,
                })
            })?,
        })
    }
}
