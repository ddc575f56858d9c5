//! Zentral provider
//!
//! Exposes the REST API of a [Zentral](https://github.com/zentralopensource/zentral)
//! server as declarative resources and data sources for the Hemmer host. The
//! host spawns the binary as a plugin and drives it over gRPC; the provider
//! translates every operation into calls against the Zentral API.
//!
//! # Layers
//!
//! - [`value`]: tri-state attribute values (value, null, unknown) and sets
//! - [`schema`] and [`validation`]: declared attributes and configuration checks
//! - [`plan`]: planned states, defaults and plan modifiers
//! - [`codec`]: request and response bodies of the REST API
//! - [`resource`] and [`data_source`]: the lifecycle operations shared by all entities
//! - [`resources`]: the entities themselves
//! - [`provider`]: configuration, the API client and the entity registry
//! - [`server`]: the gRPC service and the handshake
//!
//! # Running
//!
//! ```text
//! ZTL_API_BASE_URL=https://zentral.example.com/api/ ZTL_API_TOKEN=… zentral-provider
//! ```
//!
//! On startup the provider prints the handshake line on stdout:
//!
//! ```text
//! HEMMER_PROVIDER|1|127.0.0.1:50051
//! ```
//!
//! # Testing
//!
//! [`testing::MockApi`] stands in for a Zentral server and
//! [`testing::ProviderTester`] drives the provider without gRPC:
//!
//! ```
//! use std::sync::Arc;
//! use zentral_provider::testing::{MockApi, ProviderTester};
//! use zentral_provider::ZentralProvider;
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let tester = ProviderTester::new(ZentralProvider::with_client(Arc::new(MockApi::new())));
//! let state = tester
//!     .lifecycle_create(
//!         "zentral_mdm_blueprint",
//!         json!({"name": "Default", "collect_apps": "ALL"}),
//!     )
//!     .await
//!     .unwrap();
//! assert_eq!(state["collect_apps"], "ALL");
//! assert_eq!(state["inventory_interval"], 86400);
//! # });
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod codec;
pub mod data_source;
pub mod error;
pub mod logging;
pub mod plan;
pub mod provider;
pub mod resource;
pub mod resources;
pub mod schema;
pub mod server;
pub mod testing;
pub mod types;
pub mod validation;
pub mod value;

#[allow(missing_docs)]
#[allow(clippy::all)]
pub mod generated;

pub use client::{ApiError, ClientConfig, HttpClient, ZentralApi};
pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::{ProviderConfig, ZentralProvider};
pub use resource::{IdKind, Resource, ResourceHandler};
pub use schema::ProviderSchema;
pub use server::{
    handshake, serve, serve_on, serve_with_options, ProviderService, ServeOptions,
};
pub use types::{
    AttributeChange, ImportedResource, PlanResult, ProviderMetadata, ServerCapabilities,
    HANDSHAKE_PREFIX, PROTOCOL_VERSION,
};
pub use validation::{is_valid, validate, validate_result};
pub use value::{SetOf, Tri};

pub use async_trait::async_trait;

pub use serde_json;
pub use tonic;
pub use tracing;
