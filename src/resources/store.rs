//! Event stores: the HTTP, Kinesis and Splunk destinations events are
//! forwarded to.

use super::{headers_block, Header};
use crate::codec::{NullPolicy, RequestBody, ResponseBody};
use crate::error::ProviderError;
use crate::resource::{IdKind, Resource};
use crate::schema::{Attribute, AttributeType, Block, Constraint, NestedBlock, Schema, Validator};
use crate::value::{SetOf, Tri};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const BACKENDS: [(&str, &str); 3] = [("HTTP", "http"), ("KINESIS", "kinesis"), ("SPLUNK", "splunk")];

const SERIALIZATION_FORMATS: [&str; 2] = ["zentral", "firehose_v1"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventFilter {
    pub tags: Tri<SetOf<String>>,
    pub event_type: Tri<SetOf<String>>,
    pub routing_key: Tri<SetOf<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventFilters {
    pub included_event_filters: Tri<SetOf<EventFilter>>,
    pub excluded_event_filters: Tri<SetOf<EventFilter>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpBackend {
    pub endpoint_url: Tri<String>,
    pub username: Tri<String>,
    pub password: Tri<String>,
    pub headers: Tri<SetOf<Header>>,
    pub concurrency: Tri<i64>,
    pub request_timeout: Tri<i64>,
    pub max_retries: Tri<i64>,
    pub verify_tls: Tri<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KinesisBackend {
    pub region_name: Tri<String>,
    pub stream: Tri<String>,
    pub aws_access_key_id: Tri<String>,
    pub aws_secret_access_key: Tri<String>,
    pub assume_role_arn: Tri<String>,
    pub batch_size: Tri<i64>,
    pub serialization_format: Tri<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplunkBackend {
    pub hec_url: Tri<String>,
    pub hec_token: Tri<String>,
    pub hec_index: Tri<String>,
    pub hec_source: Tri<String>,
    pub computer_name_as_host_sources: Tri<Vec<String>>,
    pub custom_host_field: Tri<String>,
    pub serial_number_field: Tri<String>,
    pub verify_tls: Tri<bool>,
    pub request_timeout: Tri<i64>,
    pub max_retries: Tri<i64>,
    pub batch_size: Tri<i64>,
}

/// An event store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreModel {
    pub id: Tri<String>,
    pub name: Tri<String>,
    pub description: Tri<String>,
    pub admin_console: Tri<bool>,
    pub event_filters: Tri<EventFilters>,
    pub backend: Tri<String>,
    pub http: Tri<HttpBackend>,
    pub kinesis: Tri<KinesisBackend>,
    pub splunk: Tri<SplunkBackend>,
}

/// `zentral_store`
pub struct Store;

fn bounded(description: &str, default: i64, min: i64, max: i64) -> Attribute {
    Attribute::optional_int64()
        .with_description(description)
        .with_default(json!(default))
        .with_validator(Validator::between(min, max))
}

fn string_set(description: &str) -> Attribute {
    Attribute::optional_set(AttributeType::String)
        .with_description(description)
        .with_default(json!([]))
}

fn event_filters_block() -> NestedBlock {
    let filters = || {
        NestedBlock::set(
            Block::new()
                .with_attribute("tags", string_set("Event tags."))
                .with_attribute("event_type", string_set("Event types."))
                .with_attribute("routing_key", string_set("Event routing keys.")),
        )
        .with_computed_default()
    };
    NestedBlock::single(
        Block::new()
            .with_description("Filters selecting the events sent to the store.")
            .with_block("included_event_filters", filters())
            .with_block("excluded_event_filters", filters()),
    )
    .with_computed_default()
}

fn http_block() -> NestedBlock {
    NestedBlock::single(
        Block::new()
            .with_description("HTTP backend settings.")
            .with_attribute(
                "endpoint_url",
                Attribute::required_string()
                    .with_description("URL the events are POSTed to.")
                    .with_validator(Validator::HttpUrl),
            )
            .with_attribute(
                "username",
                Attribute::optional_string().with_description("Basic authentication username."),
            )
            .with_attribute(
                "password",
                Attribute::optional_string()
                    .with_description("Basic authentication password.")
                    .sensitive(),
            )
            .with_block("headers", headers_block())
            .with_attribute(
                "concurrency",
                bounded("Number of concurrent requests.", 1, 1, 20),
            )
            .with_attribute(
                "request_timeout",
                bounded("Request timeout in seconds.", 120, 1, 600),
            )
            .with_attribute("max_retries", bounded("Maximum number of retries.", 3, 1, 5))
            .with_attribute(
                "verify_tls",
                Attribute::optional_bool()
                    .with_description("Verify the server certificate.")
                    .with_default(json!(true)),
            ),
    )
}

fn kinesis_block() -> NestedBlock {
    NestedBlock::single(
        Block::new()
            .with_description("AWS Kinesis backend settings.")
            .with_attribute(
                "region_name",
                Attribute::required_string().with_description("AWS region."),
            )
            .with_attribute(
                "stream",
                Attribute::required_string().with_description("Kinesis stream name."),
            )
            .with_attribute(
                "aws_access_key_id",
                Attribute::optional_string().with_description("AWS access key ID."),
            )
            .with_attribute(
                "aws_secret_access_key",
                Attribute::optional_string()
                    .with_description("AWS secret access key.")
                    .sensitive(),
            )
            .with_attribute(
                "assume_role_arn",
                Attribute::optional_string().with_description("ARN of the role to assume."),
            )
            .with_attribute(
                "batch_size",
                bounded("Number of events per request.", 1, 1, 500),
            )
            .with_attribute(
                "serialization_format",
                Attribute::optional_string()
                    .with_description("Event serialization format: zentral or firehose_v1.")
                    .with_default(json!("zentral"))
                    .with_validator(Validator::one_of(SERIALIZATION_FORMATS)),
            ),
    )
}

fn splunk_block() -> NestedBlock {
    NestedBlock::single(
        Block::new()
            .with_description("Splunk backend settings.")
            .with_attribute(
                "hec_url",
                Attribute::required_string()
                    .with_description("URL of the HTTP Event Collector.")
                    .with_validator(Validator::HttpUrl),
            )
            .with_attribute(
                "hec_token",
                Attribute::required_string()
                    .with_description("HTTP Event Collector token.")
                    .sensitive(),
            )
            .with_attribute(
                "hec_index",
                Attribute::optional_string().with_description("Splunk index."),
            )
            .with_attribute(
                "hec_source",
                Attribute::optional_string().with_description("Splunk source."),
            )
            .with_attribute(
                "computer_name_as_host_sources",
                Attribute::optional_list(AttributeType::String)
                    .with_description(
                        "Inventory sources whose computer names are used as event host, in order.",
                    )
                    .with_default(json!([])),
            )
            .with_attribute(
                "custom_host_field",
                Attribute::optional_string().with_description("Custom host field name."),
            )
            .with_attribute(
                "serial_number_field",
                Attribute::optional_string()
                    .with_description("Name of the serial number field.")
                    .with_default(json!("machine_serial_number")),
            )
            .with_attribute(
                "verify_tls",
                Attribute::optional_bool()
                    .with_description("Verify the server certificate.")
                    .with_default(json!(true)),
            )
            .with_attribute(
                "request_timeout",
                bounded("Request timeout in seconds.", 300, 1, 3600),
            )
            .with_attribute("max_retries", bounded("Maximum number of retries.", 3, 1, 5))
            .with_attribute(
                "batch_size",
                bounded("Number of events per request.", 1, 1, 100),
            ),
    )
}

fn decode_filter(r: ResponseBody<'_>) -> Result<EventFilter, ProviderError> {
    Ok(EventFilter {
        tags: r.set("tags")?,
        event_type: r.set("event_type")?,
        routing_key: r.set("routing_key")?,
    })
}

fn empty_event_filters() -> EventFilters {
    EventFilters {
        included_event_filters: Tri::value(SetOf::new()),
        excluded_event_filters: Tri::value(SetOf::new()),
    }
}

impl Resource for Store {
    type Model = StoreModel;
    const TYPE_NAME: &'static str = "zentral_store";
    const ENDPOINT: &'static str = "stores/";
    const ID_KIND: IdKind = IdKind::Uuid;

    fn schema() -> Schema {
        Schema::v0()
            .with_description("Manages event stores.")
            .with_attribute("id", Attribute::string_id())
            .with_attribute(
                "name",
                Attribute::required_string().with_description("Name of the store."),
            )
            .with_attribute(
                "description",
                Attribute::optional_string()
                    .with_description("Description of the store.")
                    .with_default(json!("")),
            )
            .with_attribute(
                "admin_console",
                Attribute::optional_bool()
                    .with_description("Link the store in the admin console.")
                    .with_default(json!(false)),
            )
            .with_block("event_filters", event_filters_block())
            .with_attribute(
                "backend",
                Attribute::required_string()
                    .with_description("Store backend: HTTP, KINESIS or SPLUNK.")
                    .with_validator(Validator::one_of(BACKENDS.map(|(backend, _)| backend))),
            )
            .with_block("http", http_block())
            .with_block("kinesis", kinesis_block())
            .with_block("splunk", splunk_block())
            .with_constraints(Constraint::backend("backend", &BACKENDS))
    }

    fn to_request(model: &StoreModel) -> Result<Value, ProviderError> {
        RequestBody::new()
            .with("name", &model.name, NullPolicy::Omit)
            .with("description", &model.description, NullPolicy::Omit)
            .with("admin_console", &model.admin_console, NullPolicy::Omit)
            .with("event_filters", &model.event_filters, NullPolicy::Omit)
            .with("backend", &model.backend, NullPolicy::Omit)
            .with_object("http_kwargs", &model.http, NullPolicy::SendNull, |h| {
                RequestBody::new()
                    .with("endpoint_url", &h.endpoint_url, NullPolicy::Omit)
                    .with("username", &h.username, NullPolicy::SendNull)
                    .with("password", &h.password, NullPolicy::SendNull)
                    .with("headers", &h.headers, NullPolicy::Omit)
                    .with("concurrency", &h.concurrency, NullPolicy::Omit)
                    .with("request_timeout", &h.request_timeout, NullPolicy::Omit)
                    .with("max_retries", &h.max_retries, NullPolicy::Omit)
                    .with("verify_tls", &h.verify_tls, NullPolicy::Omit)
            })
            .with_object("kinesis_kwargs", &model.kinesis, NullPolicy::SendNull, |k| {
                RequestBody::new()
                    .with("region_name", &k.region_name, NullPolicy::Omit)
                    .with("stream", &k.stream, NullPolicy::Omit)
                    .with("aws_access_key_id", &k.aws_access_key_id, NullPolicy::SendNull)
                    .with(
                        "aws_secret_access_key",
                        &k.aws_secret_access_key,
                        NullPolicy::SendNull,
                    )
                    .with("assume_role_arn", &k.assume_role_arn, NullPolicy::SendNull)
                    .with("batch_size", &k.batch_size, NullPolicy::Omit)
                    .with(
                        "serialization_format",
                        &k.serialization_format,
                        NullPolicy::Omit,
                    )
            })
            .with_object("splunk_kwargs", &model.splunk, NullPolicy::SendNull, |s| {
                RequestBody::new()
                    .with("hec_url", &s.hec_url, NullPolicy::Omit)
                    .with("hec_token", &s.hec_token, NullPolicy::Omit)
                    .with("hec_index", &s.hec_index, NullPolicy::SendNull)
                    .with("hec_source", &s.hec_source, NullPolicy::SendNull)
                    .with(
                        "computer_name_as_host_sources",
                        &s.computer_name_as_host_sources,
                        NullPolicy::Omit,
                    )
                    .with("custom_host_field", &s.custom_host_field, NullPolicy::SendNull)
                    .with("serial_number_field", &s.serial_number_field, NullPolicy::Omit)
                    .with("verify_tls", &s.verify_tls, NullPolicy::Omit)
                    .with("request_timeout", &s.request_timeout, NullPolicy::Omit)
                    .with("max_retries", &s.max_retries, NullPolicy::Omit)
                    .with("batch_size", &s.batch_size, NullPolicy::Omit)
            })
            .build()
    }

    fn from_response(
        body: &Value,
        _input: Option<&StoreModel>,
    ) -> Result<StoreModel, ProviderError> {
        let r = ResponseBody::new(Self::TYPE_NAME, body)?;
        let event_filters = match r.object("event_filters", |f| {
            Ok(EventFilters {
                included_event_filters: f.object_set("included_event_filters", decode_filter)?,
                excluded_event_filters: f.object_set("excluded_event_filters", decode_filter)?,
            })
        })? {
            Tri::Value(filters) => filters,
            _ => empty_event_filters(),
        };
        Ok(StoreModel {
            id: r.required("id")?,
            name: r.required("name")?,
            description: r.required("description")?,
            admin_console: r.required("admin_console")?,
            event_filters: Tri::value(event_filters),
            backend: r.required("backend")?,
            http: r.object("http_kwargs", |h| {
                Ok(HttpBackend {
                    endpoint_url: h.required("endpoint_url")?,
                    username: h.optional("username")?,
                    password: h.optional("password")?,
                    headers: h.object_set("headers", |header| {
                        Ok(Header {
                            name: header.required("name")?,
                            value: header.required("value")?,
                        })
                    })?,
                    concurrency: h.required("concurrency")?,
                    request_timeout: h.required("request_timeout")?,
                    max_retries: h.required("max_retries")?,
                    verify_tls: h.required("verify_tls")?,
                })
            })?,
            kinesis: r.object("kinesis_kwargs", |k| {
                Ok(KinesisBackend {
                    region_name: k.required("region_name")?,
                    stream: k.required("stream")?,
                    aws_access_key_id: k.optional("aws_access_key_id")?,
                    aws_secret_access_key: k.optional("aws_secret_access_key")?,
                    assume_role_arn: k.optional("assume_role_arn")?,
                    batch_size: k.required("batch_size")?,
                    serialization_format: k.required("serialization_format")?,
                })
            })?,
            splunk: r.object("splunk_kwargs", |s| {
                Ok(SplunkBackend {
                    hec_url: s.required("hec_url")?,
                    hec_token: s.required("hec_token")?,
                    hec_index: s.optional("hec_index")?,
                    hec_source: s.optional("hec_source")?,
                    computer_name_as_host_sources: s.list("computer_name_as_host_sources")?,
                    custom_host_field: s.optional("custom_host_field")?,
                    serial_number_field: s.required("serial_number_field")?,
                    verify_tls: s.required("verify_tls")?,
                    request_timeout: s.required("request_timeout")?,
                    max_retries: s.required("max_retries")?,
                    batch_size: s.required("batch_size")?,
                })
            })?,
        })
    }
}
