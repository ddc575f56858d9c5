//! The provider root.
//!
//! [`ZentralProvider`] owns the registry of resource and data source
//! handlers and the single remote client shared by all of them. The client
//! is installed once by Configure and only read afterwards.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::client::{ClientConfig, HttpClient, ZentralApi};
use crate::data_source::DataSourceHandler;
use crate::error::ProviderError;
use crate::resource::ResourceHandler;
use crate::schema::{
    has_errors, Attribute, Diagnostic, ProviderSchema, Schema, Validator,
};
use crate::server::ProviderService;
use crate::types::{ImportedResource, PlanResult, ProviderMetadata, ServerCapabilities};
use crate::validation::{check_http_url, validate};
use crate::value::Tri;

/// Environment variable holding the API root.
pub const BASE_URL_ENV: &str = "ZTL_API_BASE_URL";

/// Environment variable holding the API token.
pub const TOKEN_ENV: &str = "ZTL_API_TOKEN";

/// `User-Agent` sent when the configuration does not set one.
pub const DEFAULT_USER_AGENT: &str = concat!("zentral-provider/", env!("CARGO_PKG_VERSION"));

/// Collection queried by the liveness check.
const LIVENESS_ENDPOINT: &str = "inventory/meta_business_units/";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    base_url: Tri<String>,
    token: Tri<String>,
    tls_insecure_skip_verify: Tri<bool>,
    user_agent: Tri<String>,
}

/// Resolved provider configuration.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// API root, ending with `/`.
    pub base_url: Url,
    /// API token.
    pub token: String,
    /// Accept invalid TLS certificates.
    pub tls_insecure_skip_verify: bool,
    /// `User-Agent` header value.
    pub user_agent: String,
}

impl ProviderConfig {
    /// The provider configuration schema.
    pub fn schema() -> Schema {
        Schema::v0()
            .with_description("Connection settings for the Zentral API")
            .with_attribute(
                "base_url",
                Attribute::optional_string()
                    .with_description(format!(
                        "Zentral API root, for example https://zentral.example.com/api/. \
                         Defaults to ${}.",
                        BASE_URL_ENV
                    ))
                    .with_validator(Validator::HttpUrl)
                    .with_validator(Validator::regex("/$", "must end with a slash")),
            )
            .with_attribute(
                "token",
                Attribute::optional_string()
                    .sensitive()
                    .with_description(format!("Zentral API token. Defaults to ${}.", TOKEN_ENV)),
            )
            .with_attribute(
                "tls_insecure_skip_verify",
                Attribute::optional_bool()
                    .with_description("Skip TLS certificate verification. Diagnostic use only."),
            )
            .with_attribute(
                "user_agent",
                Attribute::optional_string()
                    .with_description(format!("User-Agent header. Defaults to {}.", DEFAULT_USER_AGENT)),
            )
    }

    /// Resolve the configuration, falling back to `env` for the URL and token.
    pub fn resolve(
        config: &Value,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, Vec<Diagnostic>> {
        let mut diagnostics = validate(&Self::schema(), config);
        if has_errors(&diagnostics) {
            return Err(diagnostics);
        }

        let raw: RawConfig = match serde_json::from_value(config.clone()) {
            Ok(raw) => raw,
            Err(e) => return Err(vec![Diagnostic::error("Invalid provider configuration")
                .with_detail(e.to_string())]),
        };

        let base_url = setting(&raw.base_url, "base_url", BASE_URL_ENV, &env, &mut diagnostics)
            .and_then(|s| match check_http_url(&s) {
                Ok(url) if url.path().ends_with('/') => Some(url),
                Ok(_) => {
                    diagnostics.push(
                        Diagnostic::error("Invalid base URL")
                            .with_detail(format!("\"{}\" must end with a slash", s))
                            .with_attribute("base_url"),
                    );
                    None
                },
                Err(e) => {
                    diagnostics.push(
                        Diagnostic::error("Invalid base URL")
                            .with_detail(e)
                            .with_attribute("base_url"),
                    );
                    None
                },
            });
        let token = setting(&raw.token, "token", TOKEN_ENV, &env, &mut diagnostics)
            .filter(|t| !t.is_empty());

        if raw.tls_insecure_skip_verify.is_unknown() || raw.user_agent.is_unknown() {
            diagnostics.push(
                Diagnostic::error("Provider configuration is not known yet")
                    .with_detail("Provider settings must be known when the provider is configured"),
            );
        }

        match (base_url, token) {
            (Some(base_url), Some(token)) if !has_errors(&diagnostics) => Ok(Self {
                base_url,
                token,
                tls_insecure_skip_verify: raw.tls_insecure_skip_verify.get().unwrap_or(false),
                user_agent: raw
                    .user_agent
                    .into_option()
                    .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            }),
            (_, None) if !has_errors(&diagnostics) => Err(vec![Diagnostic::error(
                "Missing API token",
            )
            .with_detail(format!("Set token or the {} environment variable", TOKEN_ENV))
            .with_attribute("token")]),
            _ => Err(diagnostics),
        }
    }

    /// Settings for the HTTP client.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.base_url.clone(),
            token: self.token.clone(),
            user_agent: self.user_agent.clone(),
            tls_insecure_skip_verify: self.tls_insecure_skip_verify,
        }
    }
}

fn setting(
    value: &Tri<String>,
    attribute: &str,
    variable: &str,
    env: &impl Fn(&str) -> Option<String>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<String> {
    match value {
        Tri::Value(v) => Some(v.clone()),
        Tri::Unknown => {
            diagnostics.push(
                Diagnostic::error(format!("'{}' is not known yet", attribute))
                    .with_detail("Provider settings must be known when the provider is configured")
                    .with_attribute(attribute),
            );
            None
        },
        Tri::Null => match env(variable) {
            Some(v) => Some(v),
            None => {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", attribute))
                        .with_detail(format!(
                            "Set {} or the {} environment variable",
                            attribute, variable
                        ))
                        .with_attribute(attribute),
                );
                None
            },
        },
    }
}

/// The Zentral provider.
pub struct ZentralProvider {
    client: OnceLock<Arc<dyn ZentralApi>>,
    resources: BTreeMap<&'static str, Box<dyn ResourceHandler>>,
    data_sources: BTreeMap<&'static str, Box<dyn DataSourceHandler>>,
}

impl ZentralProvider {
    /// An unconfigured provider with every built-in resource and data source.
    pub fn new() -> Self {
        Self {
            client: OnceLock::new(),
            resources: crate::resources::resources()
                .into_iter()
                .map(|h| (h.type_name(), h))
                .collect(),
            data_sources: crate::resources::data_sources()
                .into_iter()
                .map(|h| (h.type_name(), h))
                .collect(),
        }
    }

    /// A provider already wired to the given client.
    pub fn with_client(api: Arc<dyn ZentralApi>) -> Self {
        let provider = Self::new();
        let _ = provider.client.set(api);
        provider
    }

    /// Whether a client is installed.
    pub fn is_configured(&self) -> bool {
        self.client.get().is_some()
    }

    fn api(&self) -> Result<&dyn ZentralApi, ProviderError> {
        self.client
            .get()
            .map(|api| api.as_ref())
            .ok_or(ProviderError::NotConfigured)
    }

    fn resource(&self, resource_type: &str) -> Result<&dyn ResourceHandler, ProviderError> {
        self.resources
            .get(resource_type)
            .map(|h| h.as_ref())
            .ok_or_else(|| ProviderError::UnknownResource(resource_type.to_string()))
    }

    fn data_source(&self, data_source_type: &str) -> Result<&dyn DataSourceHandler, ProviderError> {
        self.data_sources
            .get(data_source_type)
            .map(|h| h.as_ref())
            .ok_or_else(|| ProviderError::UnknownResource(data_source_type.to_string()))
    }
}

impl Default for ZentralProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ProviderService for ZentralProvider {
    fn schema(&self) -> ProviderSchema {
        let schema = ProviderSchema::new().with_provider_config(ProviderConfig::schema());
        let schema = self
            .resources
            .values()
            .fold(schema, |s, h| s.with_resource(h.type_name(), h.schema()));
        self.data_sources
            .values()
            .fold(schema, |s, h| s.with_data_source(h.type_name(), h.schema()))
    }

    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            resources: self.resources.keys().map(|k| k.to_string()).collect(),
            data_sources: self.data_sources.keys().map(|k| k.to_string()).collect(),
            capabilities: ServerCapabilities { plan_destroy: true },
        }
    }

    async fn validate_provider_config(
        &self,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(validate(&ProviderConfig::schema(), &config))
    }

    #[instrument(skip_all)]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        if self.is_configured() {
            return Err(ProviderError::Configuration(
                "the provider is already configured".to_string(),
            ));
        }

        let resolved = match ProviderConfig::resolve(&config, |name| std::env::var(name).ok()) {
            Ok(resolved) => resolved,
            Err(diagnostics) => return Ok(diagnostics),
        };
        if resolved.tls_insecure_skip_verify {
            warn!("TLS certificate verification is disabled");
        }

        let client = HttpClient::new(resolved.client_config())
            .map_err(|e| ProviderError::Configuration(format!("cannot build HTTP client: {}", e)))?;

        // surfaces bad URLs and rejected tokens before any resource operation
        debug!(base_url = %resolved.base_url, "checking API access");
        client
            .list(
                LIVENESS_ENDPOINT,
                &[("name", uuid::Uuid::new_v4().to_string())],
            )
            .await
            .map_err(|e| ProviderError::remote("zentral API", None, e))?;

        self.client
            .set(Arc::new(client))
            .map_err(|_| ProviderError::Configuration("the provider is already configured".to_string()))?;
        info!(base_url = %resolved.base_url, "provider configured");
        Ok(vec![])
    }

    async fn stop(&self) -> Result<(), ProviderError> {
        info!("provider stopping");
        Ok(())
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(self.resource(resource_type)?.validate(&config))
    }

    async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: i64,
        state: Value,
    ) -> Result<Value, ProviderError> {
        let current = self.resource(resource_type)?.schema().version as i64;
        if version == current {
            return Ok(state);
        }
        Err(ProviderError::FailedPrecondition(format!(
            "{}: cannot upgrade state from schema version {} to {}",
            resource_type, version, current
        )))
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let handler = self.resource(resource_type)?;
        let config = if config.is_null() {
            &proposed_state
        } else {
            &config
        };
        handler.plan(prior_state.as_ref(), config)
    }

    async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let handler = self.resource(resource_type)?;
        handler.create(self.api()?, &planned_state).await
    }

    async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Value, ProviderError> {
        let handler = self.resource(resource_type)?;
        handler.read(self.api()?, &current_state).await
    }

    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let handler = self.resource(resource_type)?;
        handler
            .update(self.api()?, &prior_state, &planned_state)
            .await
    }

    async fn delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        let handler = self.resource(resource_type)?;
        handler.delete(self.api()?, &current_state).await
    }

    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let handler = self.resource(resource_type)?;
        let state = handler.import(self.api()?, id).await?;
        Ok(vec![ImportedResource::new(resource_type, state)])
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(self.data_source(data_source_type)?.validate(&config))
    }

    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let handler = self.data_source(data_source_type)?;
        handler.read(self.api()?, &config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockApi;
    use serde_json::json;
    use std::collections::HashMap;

    fn provider_config(base_url: &str, token: &str) -> Value {
        json!({"base_url": base_url, "token": token})
    }

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_resolve_from_config() {
        let config = ProviderConfig::resolve(
            &json!({"base_url": "https://zentral.example.com/api/", "token": "secret"}),
            env(&[]),
        )
        .unwrap();
        assert_eq!(config.base_url.as_str(), "https://zentral.example.com/api/");
        assert_eq!(config.token, "secret");
        assert!(!config.tls_insecure_skip_verify);
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn test_resolve_from_env() {
        let config = ProviderConfig::resolve(
            &json!({"tls_insecure_skip_verify": true, "user_agent": "ci"}),
            env(&[
                (BASE_URL_ENV, "http://localhost:8000/api/"),
                (TOKEN_ENV, "from-env"),
            ]),
        )
        .unwrap();
        assert_eq!(config.base_url.as_str(), "http://localhost:8000/api/");
        assert_eq!(config.token, "from-env");
        assert!(config.tls_insecure_skip_verify);
        assert_eq!(config.user_agent, "ci");
    }

    #[test]
    fn test_resolve_rejects_bad_urls() {
        let no_slash = ProviderConfig::resolve(
            &json!({"base_url": "https://zentral.example.com/api", "token": "t"}),
            env(&[]),
        )
        .unwrap_err();
        assert_eq!(no_slash[0].attribute.as_deref(), Some("base_url"));

        let env_no_slash = ProviderConfig::resolve(
            &json!({"token": "t"}),
            env(&[(BASE_URL_ENV, "https://zentral.example.com/api")]),
        )
        .unwrap_err();
        assert!(env_no_slash[0].detail.as_deref().unwrap().contains("slash"));

        let ftp = ProviderConfig::resolve(
            &json!({"base_url": "ftp://zentral.example.com/", "token": "t"}),
            env(&[]),
        )
        .unwrap_err();
        assert_eq!(ftp[0].attribute.as_deref(), Some("base_url"));
    }

    #[test]
    fn test_resolve_requires_token() {
        let missing =
            ProviderConfig::resolve(&json!({"base_url": "https://z.example.com/api/"}), env(&[]))
                .unwrap_err();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].attribute.as_deref(), Some("token"));

        let empty = ProviderConfig::resolve(
            &json!({"base_url": "https://z.example.com/api/", "token": ""}),
            env(&[]),
        )
        .unwrap_err();
        assert_eq!(empty[0].summary, "Missing API token");
    }

    #[test]
    fn test_resolve_rejects_unknown_values() {
        let err = ProviderConfig::resolve(
            &json!({"base_url": "https://z.example.com/api/", "token": crate::value::UNKNOWN_SENTINEL}),
            env(&[]),
        )
        .unwrap_err();
        assert_eq!(err[0].attribute.as_deref(), Some("token"));
    }

    #[test]
    fn test_token_is_sensitive() {
        let schema = ProviderConfig::schema();
        assert!(schema.block.attributes["token"].flags.sensitive);
        assert!(!schema.block.attributes["base_url"].flags.sensitive);
    }

    #[test]
    fn test_client_config_redacts_token() {
        let config = ProviderConfig::resolve(
            &provider_config("https://z.example.com/api/", "secret"),
            env(&[]),
        )
        .unwrap();
        let debug = format!("{:?}", config.client_config());
        assert!(!debug.contains("secret"));
    }

    #[tokio::test]
    async fn test_operations_before_configure() {
        let provider = ZentralProvider::new();
        assert!(!provider.is_configured());
        let err = provider
            .read("zentral_tag", json!({"id": 1, "name": "x"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured));

        // planning needs no client
        let plan = provider
            .plan("zentral_tag", None, json!({"name": "x"}), Value::Null)
            .await
            .unwrap();
        assert_eq!(plan.planned_state["name"], "x");
    }

    #[tokio::test]
    async fn test_configure_reports_diagnostics() {
        let provider = ZentralProvider::new();
        let diagnostics = provider
            .configure(json!({"base_url": "not a url", "token": "t"}))
            .await
            .unwrap();
        assert!(has_errors(&diagnostics));
        assert!(!provider.is_configured());
    }

    #[tokio::test]
    async fn test_second_configure_fails() {
        let provider = ZentralProvider::with_client(Arc::new(MockApi::new()));
        let err = provider
            .configure(provider_config("https://z.example.com/api/", "t"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_unknown_types() {
        let provider = ZentralProvider::with_client(Arc::new(MockApi::new()));
        assert!(matches!(
            provider.create("zentral_nope", json!({})).await,
            Err(ProviderError::UnknownResource(_))
        ));
        assert!(matches!(
            provider.read_data_source("zentral_nope", json!({})).await,
            Err(ProviderError::UnknownResource(_))
        ));
    }

    #[tokio::test]
    async fn test_upgrade_resource_state() {
        let provider = ZentralProvider::new();
        let state = json!({"id": 1, "name": "x", "color": "0079bf"});
        assert_eq!(
            provider
                .upgrade_resource_state("zentral_tag", 0, state.clone())
                .await
                .unwrap(),
            state
        );
        assert!(matches!(
            provider.upgrade_resource_state("zentral_tag", 1, state).await,
            Err(ProviderError::FailedPrecondition(_))
        ));
    }

    #[test]
    fn test_metadata_matches_schema() {
        let provider = ZentralProvider::new();
        let metadata = provider.metadata();
        let schema = provider.schema();
        assert_eq!(
            metadata.resources,
            schema.resources.keys().cloned().collect::<Vec<_>>()
        );
        assert_eq!(
            metadata.data_sources,
            schema.data_sources.keys().cloned().collect::<Vec<_>>()
        );
        assert!(metadata.capabilities.plan_destroy);
    }
}
