//! gRPC plumbing between the host and a [`ProviderService`].
//!
//! The host spawns the provider binary, reads the handshake line
//! `HEMMER_PROVIDER|<protocol>|<address>` from its stdout and then talks to the
//! `hemmer.provider.v1.Provider` service at that address. Every request body
//! is JSON carried as bytes.
//!
//! Failures of a provider operation travel back as diagnostics inside a
//! normal response. Only a request the provider cannot even decode is
//! answered with a gRPC error status.
//!
//! # Shutdown
//!
//! On SIGTERM or SIGINT the server stops accepting connections and gives
//! in-flight requests [`ServeOptions::shutdown_timeout`] to finish before
//! calling [`ProviderService::stop`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::net::TcpListener;
use tonic::transport::Server;
use tonic::{Request, Response, Status};
use tracing::{debug, info, instrument, warn};

use crate::error::ProviderError;
use crate::generated as pb;
use crate::schema::{
    has_errors, Block, BlockNestingMode, Diagnostic, DiagnosticSeverity, ProviderSchema, Schema,
};
use crate::types::{
    ImportedResource, PlanResult, ProviderMetadata, HANDSHAKE_PREFIX, PROTOCOL_VERSION,
};

/// The operations the host drives, in plain Rust and JSON types.
///
/// [`crate::ZentralProvider`] is the implementation served by the binary;
/// [`crate::testing::ProviderTester`] drives one without gRPC.
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    /// Provider, resource and data source schemas.
    fn schema(&self) -> ProviderSchema;

    /// Registered type names and server capabilities.
    fn metadata(&self) -> ProviderMetadata {
        let schema = self.schema();
        ProviderMetadata {
            resources: schema.resources.keys().cloned().collect(),
            data_sources: schema.data_sources.keys().cloned().collect(),
            capabilities: Default::default(),
        }
    }

    /// Check a provider configuration without applying it.
    async fn validate_provider_config(&self, config: Value)
        -> Result<Vec<Diagnostic>, ProviderError>;

    /// Apply the provider configuration. Error diagnostics leave the
    /// provider unconfigured.
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Release resources before the process exits.
    async fn stop(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    /// Check a resource configuration without calling the remote platform.
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Bring state written under an older schema version up to date.
    async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: i64,
        state: Value,
    ) -> Result<Value, ProviderError>;

    /// Plan a create (no prior state), an update, or a destroy (null config).
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError>;

    /// Create the remote object described by a planned state.
    async fn create(&self, resource_type: &str, planned_state: Value)
        -> Result<Value, ProviderError>;

    /// Refresh a state; `null` means the remote object is gone.
    async fn read(&self, resource_type: &str, current_state: Value)
        -> Result<Value, ProviderError>;

    /// Apply a planned state to an existing remote object.
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete a remote object. Deleting a missing object succeeds.
    async fn delete(&self, resource_type: &str, current_state: Value)
        -> Result<(), ProviderError>;

    /// Adopt an existing remote object given its id.
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError>;

    /// Check a data source configuration.
    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Look up a single remote object.
    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError>;
}

impl From<&Block> for pb::Block {
    fn from(block: &Block) -> Self {
        let json = |value: &Value| serde_json::to_vec(value).unwrap_or_default();
        Self {
            attributes: block
                .attributes
                .iter()
                .map(|(name, attr)| pb::Attribute {
                    name: name.clone(),
                    r#type: serde_json::to_vec(&attr.attr_type).unwrap_or_default(),
                    required: attr.flags.required,
                    optional: attr.flags.optional,
                    computed: attr.flags.computed,
                    sensitive: attr.flags.sensitive,
                    description: attr.description.clone().unwrap_or_default(),
                    force_new: attr.force_new,
                    default_value: attr.default.as_ref().map(json).unwrap_or_default(),
                })
                .collect(),
            block_types: block
                .blocks
                .iter()
                .map(|(name, nested)| pb::NestedBlock {
                    type_name: name.clone(),
                    block: Some((&nested.block).into()),
                    nesting_mode: match nested.nesting_mode {
                        BlockNestingMode::Single => pb::nested_block::NestingMode::Single,
                        BlockNestingMode::List => pb::nested_block::NestingMode::List,
                        BlockNestingMode::Set => pb::nested_block::NestingMode::Set,
                    } as i32,
                    min_items: nested.min_items as i32,
                    max_items: nested.max_items as i32,
                })
                .collect(),
            description: block.description.clone().unwrap_or_default(),
        }
    }
}

impl From<&Schema> for pb::Schema {
    fn from(schema: &Schema) -> Self {
        Self {
            version: schema.version as i64,
            block: Some((&schema.block).into()),
        }
    }
}

impl From<Diagnostic> for pb::Diagnostic {
    fn from(d: Diagnostic) -> Self {
        Self {
            severity: match d.severity {
                DiagnosticSeverity::Error => pb::diagnostic::Severity::Error,
                DiagnosticSeverity::Warning => pb::diagnostic::Severity::Warning,
            } as i32,
            summary: d.summary,
            detail: d.detail.unwrap_or_default(),
            attribute: d.attribute.unwrap_or_default(),
        }
    }
}

fn to_proto(diagnostics: Vec<Diagnostic>) -> Vec<pb::Diagnostic> {
    diagnostics.into_iter().map(Into::into).collect()
}

/// Decode a JSON request field. Empty bytes stand for `null`.
fn decode(field: &str, bytes: &[u8]) -> Result<Value, Status> {
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(bytes).map_err(|e| {
        warn!(field, error = %e, "undecodable request");
        Status::from(ProviderError::Serialization(e))
    })
}

fn encode(value: &Value) -> Vec<u8> {
    serde_json::to_vec(value).unwrap_or_default()
}

/// Log the outcome of an operation and split it into value and diagnostics.
fn report<T>(
    operation: &str,
    subject: &str,
    result: Result<T, ProviderError>,
) -> (Option<T>, Vec<pb::Diagnostic>) {
    match result {
        Ok(value) => {
            debug!(operation, subject, "done");
            (Some(value), Vec::new())
        },
        Err(e) => {
            warn!(operation, subject, error = %e, "failed");
            (None, to_proto(e.into_diagnostics()))
        },
    }
}

/// Log and convert the diagnostics of a validation-like operation.
fn checked(
    operation: &str,
    subject: &str,
    result: Result<Vec<Diagnostic>, ProviderError>,
) -> Vec<pb::Diagnostic> {
    match result {
        Ok(diagnostics) => {
            if has_errors(&diagnostics) {
                info!(operation, subject, count = diagnostics.len(), "configuration rejected");
            }
            to_proto(diagnostics)
        },
        Err(e) => report::<()>(operation, subject, Err(e)).1,
    }
}

/// Adapter from the generated gRPC service to a [`ProviderService`].
pub(crate) struct GrpcProvider<P> {
    provider: Arc<P>,
}

impl<P> GrpcProvider<P> {
    pub(crate) fn new(provider: Arc<P>) -> Self {
        Self { provider }
    }
}

#[tonic::async_trait]
impl<P: ProviderService> pb::provider_server::Provider for GrpcProvider<P> {
    async fn get_metadata(
        &self,
        _request: Request<pb::GetMetadataRequest>,
    ) -> Result<Response<pb::GetMetadataResponse>, Status> {
        let metadata = self.provider.metadata();
        Ok(Response::new(pb::GetMetadataResponse {
            server_capabilities: Some(pb::ServerCapabilities {
                plan_destroy: metadata.capabilities.plan_destroy,
            }),
            resources: metadata.resources,
            data_sources: metadata.data_sources,
            diagnostics: Vec::new(),
        }))
    }

    async fn get_schema(
        &self,
        _request: Request<pb::GetSchemaRequest>,
    ) -> Result<Response<pb::GetSchemaResponse>, Status> {
        let schema = self.provider.schema();
        debug!(
            resources = schema.resources.len(),
            data_sources = schema.data_sources.len(),
            "schema requested"
        );
        let convert = |schemas: &std::collections::BTreeMap<String, Schema>| {
            schemas
                .iter()
                .map(|(name, schema)| (name.clone(), schema.into()))
                .collect()
        };
        Ok(Response::new(pb::GetSchemaResponse {
            provider: Some((&schema.provider).into()),
            resources: convert(&schema.resources),
            data_sources: convert(&schema.data_sources),
            diagnostics: Vec::new(),
        }))
    }

    #[instrument(skip_all, name = "grpc.validate_provider_config")]
    async fn validate_provider_config(
        &self,
        request: Request<pb::ValidateProviderConfigRequest>,
    ) -> Result<Response<pb::ValidateProviderConfigResponse>, Status> {
        let config = decode("config", &request.into_inner().config)?;
        let result = self.provider.validate_provider_config(config).await;
        Ok(Response::new(pb::ValidateProviderConfigResponse {
            diagnostics: checked("validate_provider_config", "provider", result),
        }))
    }

    #[instrument(skip_all, name = "grpc.configure")]
    async fn configure(
        &self,
        request: Request<pb::ConfigureRequest>,
    ) -> Result<Response<pb::ConfigureResponse>, Status> {
        let config = decode("config", &request.into_inner().config)?;
        let result = self.provider.configure(config).await;
        Ok(Response::new(pb::ConfigureResponse {
            diagnostics: checked("configure", "provider", result),
        }))
    }

    #[instrument(skip_all, name = "grpc.stop")]
    async fn stop(
        &self,
        _request: Request<pb::StopRequest>,
    ) -> Result<Response<pb::StopResponse>, Status> {
        let error = match self.provider.stop().await {
            Ok(()) => String::new(),
            Err(e) => {
                warn!(error = %e, "stop failed");
                e.to_string()
            },
        };
        Ok(Response::new(pb::StopResponse { error }))
    }

    #[instrument(skip_all, name = "grpc.validate_resource_config", fields(resource_type))]
    async fn validate_resource_config(
        &self,
        request: Request<pb::ValidateResourceConfigRequest>,
    ) -> Result<Response<pb::ValidateResourceConfigResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());
        let config = decode("config", &req.config)?;
        let result = self
            .provider
            .validate_resource_config(&req.resource_type, config)
            .await;
        Ok(Response::new(pb::ValidateResourceConfigResponse {
            diagnostics: checked("validate_resource_config", &req.resource_type, result),
        }))
    }

    #[instrument(skip_all, name = "grpc.upgrade_resource_state", fields(resource_type))]
    async fn upgrade_resource_state(
        &self,
        request: Request<pb::UpgradeResourceStateRequest>,
    ) -> Result<Response<pb::UpgradeResourceStateResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());
        let state = decode("raw_state", &req.raw_state)?;
        let result = self
            .provider
            .upgrade_resource_state(&req.resource_type, req.version, state)
            .await;
        let (upgraded, diagnostics) = report("upgrade_resource_state", &req.resource_type, result);
        Ok(Response::new(pb::UpgradeResourceStateResponse {
            upgraded_state: upgraded.as_ref().map(encode).unwrap_or_default(),
            diagnostics,
        }))
    }

    #[instrument(skip_all, name = "grpc.plan", fields(resource_type))]
    async fn plan(
        &self,
        request: Request<pb::PlanRequest>,
    ) -> Result<Response<pb::PlanResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());
        let prior_state = Some(decode("prior_state", &req.prior_state)?).filter(|s| !s.is_null());
        let proposed_state = decode("proposed_state", &req.proposed_state)?;
        let config = decode("config", &req.config)?;

        let result = self
            .provider
            .plan(&req.resource_type, prior_state, proposed_state, config)
            .await;
        let (plan, diagnostics) = report("plan", &req.resource_type, result);
        let response = match plan {
            Some(plan) => {
                debug!(
                    changes = plan.changes.len(),
                    requires_replace = plan.requires_replace,
                    "planned"
                );
                pb::PlanResponse {
                    planned_state: encode(&plan.planned_state),
                    changes: plan.changes.into_iter().map(Into::into).collect(),
                    requires_replace: plan.requires_replace,
                    diagnostics,
                }
            },
            None => pb::PlanResponse {
                diagnostics,
                ..Default::default()
            },
        };
        Ok(Response::new(response))
    }

    #[instrument(skip_all, name = "grpc.create", fields(resource_type))]
    async fn create(
        &self,
        request: Request<pb::CreateRequest>,
    ) -> Result<Response<pb::CreateResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());
        let planned_state = decode("planned_state", &req.planned_state)?;
        let result = self.provider.create(&req.resource_type, planned_state).await;
        let (state, diagnostics) = report("create", &req.resource_type, result);
        Ok(Response::new(pb::CreateResponse {
            state: state.as_ref().map(encode).unwrap_or_default(),
            diagnostics,
        }))
    }

    #[instrument(skip_all, name = "grpc.read", fields(resource_type))]
    async fn read(
        &self,
        request: Request<pb::ReadRequest>,
    ) -> Result<Response<pb::ReadResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());
        let current_state = decode("current_state", &req.current_state)?;
        let result = self.provider.read(&req.resource_type, current_state).await;
        let (state, diagnostics) = report("read", &req.resource_type, result);
        if state.as_ref().is_some_and(Value::is_null) {
            info!("remote object is gone, reporting drift");
        }
        Ok(Response::new(pb::ReadResponse {
            state: state.as_ref().map(encode).unwrap_or_default(),
            diagnostics,
        }))
    }

    #[instrument(skip_all, name = "grpc.update", fields(resource_type))]
    async fn update(
        &self,
        request: Request<pb::UpdateRequest>,
    ) -> Result<Response<pb::UpdateResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());
        let prior_state = decode("prior_state", &req.prior_state)?;
        let planned_state = decode("planned_state", &req.planned_state)?;
        let result = self
            .provider
            .update(&req.resource_type, prior_state, planned_state)
            .await;
        let (state, diagnostics) = report("update", &req.resource_type, result);
        Ok(Response::new(pb::UpdateResponse {
            state: state.as_ref().map(encode).unwrap_or_default(),
            diagnostics,
        }))
    }

    #[instrument(skip_all, name = "grpc.delete", fields(resource_type))]
    async fn delete(
        &self,
        request: Request<pb::DeleteRequest>,
    ) -> Result<Response<pb::DeleteResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());
        let current_state = decode("current_state", &req.current_state)?;
        let result = self.provider.delete(&req.resource_type, current_state).await;
        let (_, diagnostics) = report("delete", &req.resource_type, result);
        Ok(Response::new(pb::DeleteResponse { diagnostics }))
    }

    #[instrument(skip_all, name = "grpc.import_resource_state", fields(resource_type, id))]
    async fn import_resource_state(
        &self,
        request: Request<pb::ImportResourceStateRequest>,
    ) -> Result<Response<pb::ImportResourceStateResponse>, Status> {
        let req = request.into_inner();
        let span = tracing::Span::current();
        span.record("resource_type", req.resource_type.as_str());
        span.record("id", req.id.as_str());
        let result = self
            .provider
            .import_resource(&req.resource_type, &req.id)
            .await;
        let (imported, diagnostics) = report("import", &req.resource_type, result);
        Ok(Response::new(pb::ImportResourceStateResponse {
            imported: imported
                .unwrap_or_default()
                .into_iter()
                .map(|r| pb::ImportedResource {
                    state: encode(&r.state),
                    resource_type: r.resource_type,
                })
                .collect(),
            diagnostics,
        }))
    }

    #[instrument(skip_all, name = "grpc.validate_data_source_config", fields(data_source_type))]
    async fn validate_data_source_config(
        &self,
        request: Request<pb::ValidateDataSourceConfigRequest>,
    ) -> Result<Response<pb::ValidateDataSourceConfigResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("data_source_type", req.data_source_type.as_str());
        let config = decode("config", &req.config)?;
        let result = self
            .provider
            .validate_data_source_config(&req.data_source_type, config)
            .await;
        Ok(Response::new(pb::ValidateDataSourceConfigResponse {
            diagnostics: checked("validate_data_source_config", &req.data_source_type, result),
        }))
    }

    #[instrument(skip_all, name = "grpc.read_data_source", fields(data_source_type))]
    async fn read_data_source(
        &self,
        request: Request<pb::ReadDataSourceRequest>,
    ) -> Result<Response<pb::ReadDataSourceResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("data_source_type", req.data_source_type.as_str());
        let config = decode("config", &req.config)?;
        let result = self
            .provider
            .read_data_source(&req.data_source_type, config)
            .await;
        let (state, diagnostics) = report("read_data_source", &req.data_source_type, result);
        Ok(Response::new(pb::ReadDataSourceResponse {
            state: state.as_ref().map(encode).unwrap_or_default(),
            diagnostics,
        }))
    }
}

/// Server settings.
#[derive(Debug, Clone)]
pub struct ServeOptions {
    /// How long in-flight requests may run after a shutdown signal.
    /// Default: 30 seconds.
    pub shutdown_timeout: Duration,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl ServeOptions {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the shutdown timeout.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

/// Resolve on SIGTERM or SIGINT (CTRL+C on Windows).
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).expect("Failed to install SIGTERM handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("Failed to install SIGINT handler");

        let name = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        };
        info!(signal = name, "shutting down");
    }

    #[cfg(windows)]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C handler");
        info!(signal = "CTRL+C", "shutting down");
    }

    #[cfg(not(any(unix, windows)))]
    std::future::pending::<()>().await;
}

/// Serve the provider on a free loopback port until a shutdown signal.
///
/// Prints the handshake line on stdout once the port is bound.
pub async fn serve<P: ProviderService>(provider: P) -> Result<(), ProviderError> {
    serve_with_options(provider, ServeOptions::default()).await
}

/// Like [`serve`] with custom [`ServeOptions`].
pub async fn serve_with_options<P: ProviderService>(
    provider: P,
    options: ServeOptions,
) -> Result<(), ProviderError> {
    serve_on(provider, SocketAddr::from(([127, 0, 0, 1], 0)), options).await
}

/// Serve the provider on a given address (port 0 picks a free one).
pub async fn serve_on<P: ProviderService>(
    provider: P,
    addr: SocketAddr,
    options: ServeOptions,
) -> Result<(), ProviderError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ProviderError::Configuration(format!("cannot bind {}: {}", addr, e)))?;
    let addr = listener
        .local_addr()
        .map_err(|e| ProviderError::Configuration(format!("cannot read bound address: {}", e)))?;

    println!("{}", handshake(addr));
    info!(address = %addr, "serving");

    let provider = Arc::new(provider);
    let (signalled_tx, signalled_rx) = tokio::sync::oneshot::channel::<()>();
    let server = Server::builder()
        .add_service(pb::provider_server::ProviderServer::new(GrpcProvider::new(
            Arc::clone(&provider),
        )))
        .serve_with_incoming_shutdown(
            tokio_stream::wrappers::TcpListenerStream::new(listener),
            async move {
                shutdown_signal().await;
                let _ = signalled_tx.send(());
            },
        );
    tokio::pin!(server);

    // the drain deadline starts with the signal, not with the server
    tokio::select! {
        result = &mut server => result?,
        _ = signalled_rx => {
            match tokio::time::timeout(options.shutdown_timeout, &mut server).await {
                Ok(result) => result?,
                Err(_) => warn!(
                    timeout = ?options.shutdown_timeout,
                    "in-flight requests did not finish in time"
                ),
            }
        },
    }

    if let Err(e) = provider.stop().await {
        warn!(error = %e, "provider stop failed");
    }
    info!("shutdown complete");
    Ok(())
}

/// The line announcing the listening address to the host.
pub fn handshake(addr: SocketAddr) -> String {
    format!("{}|{}|{}", HANDSHAKE_PREFIX, PROTOCOL_VERSION, addr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ZentralProvider;
    use crate::schema::{Attribute, NestedBlock};
    use crate::testing::MockApi;
    use pb::provider_server::Provider;
    use serde_json::json;

    fn grpc() -> (Arc<MockApi>, GrpcProvider<ZentralProvider>) {
        let api = Arc::new(MockApi::new());
        let provider = ZentralProvider::with_client(api.clone());
        (api, GrpcProvider::new(Arc::new(provider)))
    }

    fn bytes(value: Value) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    #[test]
    fn test_schema_to_proto() {
        let schema = Schema::v0()
            .with_attribute("id", Attribute::numeric_id())
            .with_attribute("token", Attribute::required_string().sensitive())
            .with_attribute("color", Attribute::optional_string().with_default(json!("0079bf")))
            .with_block(
                "headers",
                NestedBlock::set(Block::new().with_attribute("name", Attribute::required_string()))
                    .with_min_items(1),
            );

        let proto = pb::Schema::from(&schema);
        let block = proto.block.unwrap();
        let names: Vec<_> = block.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["color", "id", "token"]);

        let token = &block.attributes[2];
        assert!(token.required && token.sensitive);

        let color = &block.attributes[0];
        assert!(color.optional && color.computed);
        assert_eq!(color.default_value, b"\"0079bf\"".to_vec());

        let headers = &block.block_types[0];
        assert_eq!(headers.type_name, "headers");
        assert_eq!(
            headers.nesting_mode,
            pb::nested_block::NestingMode::Set as i32
        );
        assert_eq!(headers.min_items, 1);
    }

    #[test]
    fn test_handshake_line() {
        let addr = SocketAddr::from(([127, 0, 0, 1], 50051));
        assert_eq!(handshake(addr), "HEMMER_PROVIDER|1|127.0.0.1:50051");
    }

    #[test]
    fn test_serve_options() {
        let options = ServeOptions::new().with_shutdown_timeout(Duration::from_secs(5));
        assert_eq!(options.shutdown_timeout, Duration::from_secs(5));
        assert_eq!(
            ServeOptions::default().shutdown_timeout,
            Duration::from_secs(30)
        );
    }

    #[tokio::test]
    async fn test_schema_lists_every_type() {
        let (_, grpc) = grpc();
        let schema = grpc
            .get_schema(Request::new(pb::GetSchemaRequest {}))
            .await
            .unwrap()
            .into_inner();
        let token = schema
            .provider
            .unwrap()
            .block
            .unwrap()
            .attributes
            .into_iter()
            .find(|a| a.name == "token")
            .unwrap();
        assert!(token.sensitive);
        assert!(schema.resources.contains_key("zentral_store"));
        assert!(schema.data_sources.contains_key("zentral_osquery_pack"));
    }

    #[tokio::test]
    async fn test_plan_and_create_over_grpc() {
        let (api, grpc) = grpc();
        let config = bytes(json!({"name": "laptops"}));
        let plan = grpc
            .plan(Request::new(pb::PlanRequest {
                resource_type: "zentral_tag".to_string(),
                proposed_state: config.clone(),
                config,
                ..Default::default()
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(plan.diagnostics.is_empty());
        assert!(!plan.changes.is_empty());

        let created = grpc
            .create(Request::new(pb::CreateRequest {
                resource_type: "zentral_tag".to_string(),
                planned_state: plan.planned_state,
            }))
            .await
            .unwrap()
            .into_inner();
        let state: Value = serde_json::from_slice(&created.state).unwrap();
        assert_eq!(state["color"], "0079bf");
        assert_eq!(api.count("inventory/tags/"), 1);
    }

    #[tokio::test]
    async fn test_read_drift_is_null_state() {
        let (_, grpc) = grpc();
        let read = grpc
            .read(Request::new(pb::ReadRequest {
                resource_type: "zentral_tag".to_string(),
                current_state: bytes(json!({"id": 42, "name": "gone"})),
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(read.diagnostics.is_empty());
        assert_eq!(read.state, b"null".to_vec());
    }

    #[tokio::test]
    async fn test_errors_become_diagnostics() {
        let (_, grpc) = grpc();
        let plan = grpc
            .plan(Request::new(pb::PlanRequest {
                resource_type: "zentral_tag".to_string(),
                proposed_state: bytes(json!({"color": "red"})),
                config: bytes(json!({"color": "red"})),
                ..Default::default()
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(plan.planned_state.is_empty());
        assert!(plan
            .diagnostics
            .iter()
            .any(|d| d.attribute == "name"
                && d.severity == pb::diagnostic::Severity::Error as i32));

        let imported = grpc
            .import_resource_state(Request::new(pb::ImportResourceStateRequest {
                resource_type: "zentral_mdm_artifact".to_string(),
                id: "12".to_string(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(imported.imported.is_empty());
        assert_eq!(imported.diagnostics.len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_json_is_rejected() {
        let (_, grpc) = grpc();
        let status = grpc
            .create(Request::new(pb::CreateRequest {
                resource_type: "zentral_tag".to_string(),
                planned_state: b"{not json".to_vec(),
            }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);
    }
}
