//! Remote REST client for the Zentral API.
//!
//! The [`ZentralApi`] trait is the seam between the lifecycle dispatchers and
//! the network. [`HttpClient`] implements it with `reqwest`; the in-memory
//! [`crate::testing::MockApi`] implements it for tests.
//!
//! Every call is a cooperative suspension point. Dropping the returned
//! future aborts the in-flight request, which is how host cancellation
//! reaches the network. No timeout is configured on the client: the host's
//! per-call deadline is the only one that applies.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Errors returned by the remote client, classified by HTTP outcome.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP 404.
    #[error("not found: {message}")]
    NotFound {
        /// Server message.
        message: String,
    },

    /// HTTP 400 with optional per-field messages.
    #[error("bad request: {message}")]
    BadRequest {
        /// Server message.
        message: String,
        /// Field name to error message.
        fields: BTreeMap<String, String>,
    },

    /// HTTP 401 or 403.
    #[error("unauthorized (HTTP {status}): {message}")]
    Unauthorized {
        /// HTTP status code.
        status: u16,
        /// Server message.
        message: String,
    },

    /// HTTP 409, or a 400 reporting a uniqueness violation.
    #[error("conflict: {message}")]
    Conflict {
        /// Server message.
        message: String,
    },

    /// Connection failure, HTTP 429 or HTTP 5xx.
    #[error("transient error: {message}")]
    Transient {
        /// Cause.
        message: String,
    },

    /// Any other non-success status.
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Server message.
        message: String,
    },

    /// The response body was not the expected JSON.
    #[error("undecodable response: {message}")]
    Decode {
        /// Cause.
        message: String,
    },

    /// The request URL could not be built.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ApiError {
    /// Whether the remote object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Operations the provider needs from the remote platform.
///
/// Paths are relative to the configured base URL and end with `/`.
#[async_trait]
pub trait ZentralApi: Send + Sync {
    /// `GET path`, returning the decoded object.
    async fn get(&self, path: &str) -> Result<Value, ApiError>;

    /// `GET path?query`, returning the list of objects.
    async fn list(&self, path: &str, query: &[(&str, String)]) -> Result<Vec<Value>, ApiError>;

    /// `POST path` with a JSON body, returning the created object.
    async fn post(&self, path: &str, body: &Value) -> Result<Value, ApiError>;

    /// `PUT path` with a JSON body, returning the updated object.
    async fn put(&self, path: &str, body: &Value) -> Result<Value, ApiError>;

    /// `DELETE path`.
    async fn delete(&self, path: &str) -> Result<(), ApiError>;
}

/// Settings for building an [`HttpClient`].
#[derive(Clone)]
pub struct ClientConfig {
    /// API root, ending with `/`.
    pub base_url: Url,
    /// API token.
    pub token: String,
    /// `User-Agent` header value.
    pub user_agent: String,
    /// Accept invalid TLS certificates.
    pub tls_insecure_skip_verify: bool,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url.as_str())
            .field("token", &"<redacted>")
            .field("user_agent", &self.user_agent)
            .field("tls_insecure_skip_verify", &self.tls_insecure_skip_verify)
            .finish()
    }
}

/// `reqwest`-backed implementation of [`ZentralApi`].
///
/// Cloning is cheap and clones share the connection pool.
#[derive(Clone)]
pub struct HttpClient {
    http: reqwest::Client,
    base_url: Url,
    authorization: String,
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    /// Build a client from its configuration.
    pub fn new(config: ClientConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent)
            .danger_accept_invalid_certs(config.tls_insecure_skip_verify)
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url,
            authorization: format!("Token {}", config.token),
        })
    }

    /// The API root this client talks to.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Option<Value>, ApiError> {
        let response = request
            .header(reqwest::header::AUTHORIZATION, &self.authorization)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| ApiError::Transient {
                message: e.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| ApiError::Transient {
            message: e.to_string(),
        })?;
        debug!(status = status.as_u16(), "remote response");

        if !status.is_success() {
            return Err(classify(status.as_u16(), &body));
        }
        if body.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| ApiError::Decode {
                message: e.to_string(),
            })
    }

    async fn send_object(&self, request: reqwest::RequestBuilder) -> Result<Value, ApiError> {
        match self.send(request).await? {
            Some(value) => Ok(value),
            None => Err(ApiError::Decode {
                message: "empty response body".to_string(),
            }),
        }
    }
}

#[async_trait]
impl ZentralApi for HttpClient {
    async fn get(&self, path: &str) -> Result<Value, ApiError> {
        let url = self.url(path)?;
        debug!(%url, "GET");
        self.send_object(self.http.get(url)).await
    }

    async fn list(&self, path: &str, query: &[(&str, String)]) -> Result<Vec<Value>, ApiError> {
        let mut url = self.url(path)?;
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }

        let mut items = Vec::new();
        let mut next = Some(url);
        while let Some(url) = next.take() {
            debug!(%url, "GET (list)");
            match self.send_object(self.http.get(url)).await? {
                Value::Array(page) => items.extend(page),
                // paginated endpoints wrap the items
                Value::Object(mut page) => {
                    match page.remove("results") {
                        Some(Value::Array(results)) => items.extend(results),
                        _ => {
                            return Err(ApiError::Decode {
                                message: "expected a list or a paginated object".to_string(),
                            })
                        },
                    }
                    if let Some(Value::String(link)) = page.remove("next") {
                        next = Some(Url::parse(&link)?);
                    }
                },
                other => {
                    return Err(ApiError::Decode {
                        message: format!("expected a list, got {}", other),
                    })
                },
            }
        }
        Ok(items)
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        let url = self.url(path)?;
        debug!(%url, "POST");
        self.send_object(self.http.post(url).json(body)).await
    }

    async fn put(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        let url = self.url(path)?;
        debug!(%url, "PUT");
        self.send_object(self.http.put(url).json(body)).await
    }

    async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let url = self.url(path)?;
        debug!(%url, "DELETE");
        self.send(self.http.delete(url)).await.map(|_| ())
    }
}

/// Classify a non-success HTTP response.
pub fn classify(status: u16, body: &str) -> ApiError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let message = parsed
        .as_ref()
        .and_then(detail_message)
        .unwrap_or_else(|| truncate(body));

    match status {
        404 => ApiError::NotFound { message },
        400 => {
            let fields = parsed.as_ref().map(field_errors).unwrap_or_default();
            let mut message = message;
            if message.is_empty() || parsed.as_ref().is_some_and(|v| detail_message(v).is_none())
            {
                message = fields
                    .iter()
                    .map(|(field, msg)| format!("{}: {}", field, msg))
                    .chain(non_field_errors(parsed.as_ref()))
                    .collect::<Vec<_>>()
                    .join("; ");
            }
            if message.contains("already exists") {
                ApiError::Conflict { message }
            } else {
                ApiError::BadRequest { message, fields }
            }
        },
        401 | 403 => ApiError::Unauthorized { status, message },
        409 => ApiError::Conflict { message },
        429 | 500..=599 => ApiError::Transient {
            message: format!("HTTP {}: {}", status, message),
        },
        _ => ApiError::Status { status, message },
    }
}

fn detail_message(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => map.get("detail").and_then(Value::as_str).map(str::to_string),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

fn non_field_errors(value: Option<&Value>) -> Vec<String> {
    match value.and_then(|v| v.get("non_field_errors")) {
        Some(v) => vec![flatten_messages(v)],
        None => Vec::new(),
    }
}

fn field_errors(value: &Value) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    if let Value::Object(map) = value {
        for (field, messages) in map {
            if field == "detail" || field == "non_field_errors" {
                continue;
            }
            fields.insert(field.clone(), flatten_messages(messages));
        }
    }
    fields
}

fn flatten_messages(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(flatten_messages)
            .collect::<Vec<_>>()
            .join(" "),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{}: {}", k, flatten_messages(v)))
            .collect::<Vec<_>>()
            .join("; "),
        other => other.to_string(),
    }
}

fn truncate(body: &str) -> String {
    body.chars().take(200).collect()
}
