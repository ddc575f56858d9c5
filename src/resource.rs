//! Resource lifecycle dispatch.
//!
//! Each entity implements [`Resource`]: its schema plus the two codec
//! functions. [`Lifecycle`] wraps a `Resource` into a [`ResourceHandler`],
//! the object-safe form the provider registers, and supplies the five
//! operations on top of a shared [`ZentralApi`] client.
//!
//! The operations follow the same rules for every entity:
//!
//! - configuration is validated before any remote call
//! - the resulting state is always decoded from the server's reply
//! - a Read that finds nothing returns `null` so the host can plan re-creation
//! - a Delete that finds nothing succeeds
//! - Update never changes the id
//! - no state containing unknown values is ever returned

use crate::client::ZentralApi;
use crate::codec::read_file_content;
use crate::error::ProviderError;
use crate::plan;
use crate::schema::{has_errors, Diagnostic, Schema};
use crate::types::PlanResult;
use crate::validation::validate;
use crate::value::{contains_unknown, is_unknown, UNKNOWN_SENTINEL};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::marker::PhantomData;
use tracing::{debug, info, instrument, warn};

/// How the server identifies objects of an entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    /// Server-assigned 64-bit integer.
    Numeric,
    /// Server-assigned UUID string.
    Uuid,
}

impl IdKind {
    /// Parse an import token into the JSON id stored in state.
    pub fn parse(self, token: &str) -> Result<Value, ProviderError> {
        match self {
            IdKind::Numeric => {
                if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(ProviderError::InvalidRequest(format!(
                        "\"{}\" is not a valid numeric id",
                        token
                    )));
                }
                token.parse::<i64>().map(Value::from).map_err(|e| {
                    ProviderError::InvalidRequest(format!(
                        "\"{}\" is not a valid numeric id: {}",
                        token, e
                    ))
                })
            },
            IdKind::Uuid => uuid::Uuid::parse_str(token)
                .map(|uuid| Value::String(uuid.hyphenated().to_string()))
                .map_err(|e| {
                    ProviderError::InvalidRequest(format!("\"{}\" is not a valid UUID: {}", token, e))
                }),
        }
    }
}

/// An entity type managed through the remote REST API.
pub trait Resource: Send + Sync + 'static {
    /// Typed, tri-state representation of one instance.
    type Model: Serialize + DeserializeOwned + Default + Send + Sync;

    /// Host type name, e.g. `zentral_mdm_blueprint`.
    const TYPE_NAME: &'static str;
    /// Collection path relative to the API root, ending with `/`.
    const ENDPOINT: &'static str;
    /// Identity kind of the entity.
    const ID_KIND: IdKind;
    /// Natural keys accepted by the data source, in addition to `id`.
    const LOOKUP_KEYS: &'static [&'static str] = &["name"];
    /// Attributes holding a local file path, each paired with the request
    /// key that receives the file contents.
    const FILE_INPUTS: &'static [(&'static str, &'static str)] = &[];

    /// The declared schema.
    fn schema() -> Schema;

    /// Encode a model into the request body.
    fn to_request(model: &Self::Model) -> Result<Value, ProviderError>;

    /// Decode a response body.
    ///
    /// `input` is the model the request was built from, or the prior state on
    /// Read, so client-side values the server does not return can be carried
    /// over.
    fn from_response(body: &Value, input: Option<&Self::Model>)
        -> Result<Self::Model, ProviderError>;

    /// Checks on a decoded configuration that the schema cannot express.
    fn validate_config(_model: &Self::Model) -> Vec<Diagnostic> {
        Vec::new()
    }

    /// Extra checks that compare the prior state with the planned update.
    fn validate_update(_prior: &Self::Model, _planned: &Self::Model) -> Vec<Diagnostic> {
        Vec::new()
    }
}

/// Object-safe resource operations as registered with the provider.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    /// Host type name.
    fn type_name(&self) -> &'static str;

    /// Collection path relative to the API root.
    fn endpoint(&self) -> &'static str;

    /// Identity kind.
    fn id_kind(&self) -> IdKind;

    /// The declared schema.
    fn schema(&self) -> Schema;

    /// Validate a configuration.
    fn validate(&self, config: &Value) -> Vec<Diagnostic>;

    /// Compute the planned state; `prior` is `None` on create.
    fn plan(&self, prior: Option<&Value>, config: &Value) -> Result<PlanResult, ProviderError>;

    /// Create the remote object from the planned state.
    async fn create(&self, api: &dyn ZentralApi, planned: &Value) -> Result<Value, ProviderError>;

    /// Refresh the state; returns `null` when the remote object is gone.
    async fn read(&self, api: &dyn ZentralApi, state: &Value) -> Result<Value, ProviderError>;

    /// Update the remote object identified by the prior state.
    async fn update(
        &self,
        api: &dyn ZentralApi,
        prior: &Value,
        planned: &Value,
    ) -> Result<Value, ProviderError>;

    /// Delete the remote object.
    async fn delete(&self, api: &dyn ZentralApi, state: &Value) -> Result<(), ProviderError>;

    /// Import an existing remote object by its id.
    async fn import(&self, api: &dyn ZentralApi, id: &str) -> Result<Value, ProviderError>;
}

/// Generic dispatcher implementing [`ResourceHandler`] for a [`Resource`].
pub struct Lifecycle<R>(PhantomData<fn() -> R>);

impl<R: Resource> Lifecycle<R> {
    /// Create the dispatcher.
    pub fn new() -> Self {
        Self(PhantomData)
    }

    /// Create a boxed dispatcher for registration.
    pub fn boxed() -> Box<dyn ResourceHandler> {
        Box::new(Self::new())
    }

    fn path(id: &str) -> String {
        format!("{}{}/", R::ENDPOINT, id)
    }

    fn diagnostics(config: &Value) -> Vec<Diagnostic> {
        let mut diagnostics = validate(&R::schema(), config);
        if !has_errors(&diagnostics) {
            match Self::decode(config) {
                Ok(model) => diagnostics.extend(R::validate_config(&model)),
                Err(e) => diagnostics
                    .push(Diagnostic::error("Invalid configuration").with_detail(e.message())),
            }
        }
        diagnostics
    }

    fn check(config: &Value) -> Result<(), ProviderError> {
        let diagnostics = Self::diagnostics(config);
        if has_errors(&diagnostics) {
            return Err(ProviderError::Diagnostics(diagnostics));
        }
        Ok(())
    }

    fn decode(value: &Value) -> Result<R::Model, ProviderError> {
        serde_json::from_value(value.clone()).map_err(|e| {
            ProviderError::InvalidRequest(format!("{}: invalid state document: {}", R::TYPE_NAME, e))
        })
    }

    fn encode(model: &R::Model) -> Result<Value, ProviderError> {
        let state = serde_json::to_value(model)?;
        if contains_unknown(&state) {
            return Err(ProviderError::CodecMismatch(format!(
                "{}: decoded state still contains unknown values",
                R::TYPE_NAME
            )));
        }
        Ok(state)
    }

    async fn request(model: &R::Model, planned: &Value) -> Result<Value, ProviderError> {
        let mut body = R::to_request(model)?;
        for (attribute, key) in R::FILE_INPUTS {
            if let Some(path) = planned.get(*attribute).and_then(Value::as_str) {
                let content = read_file_content(attribute, path).await?;
                if let Some(fields) = body.as_object_mut() {
                    fields.insert((*key).to_string(), Value::String(content));
                }
            }
        }
        Ok(body)
    }

    fn id_of(state: &Value) -> Result<String, ProviderError> {
        match state.get("id") {
            Some(Value::Number(n)) if R::ID_KIND == IdKind::Numeric => Ok(n.to_string()),
            Some(Value::String(s)) if R::ID_KIND == IdKind::Uuid && s != UNKNOWN_SENTINEL => {
                Ok(s.clone())
            },
            _ => Err(ProviderError::FailedPrecondition(format!(
                "{}: state has no id",
                R::TYPE_NAME
            ))),
        }
    }

    async fn fetch(
        api: &dyn ZentralApi,
        id: &str,
        input: Option<&R::Model>,
    ) -> Result<Value, ProviderError> {
        match api.get(&Self::path(id)).await {
            Ok(response) => Self::encode(&R::from_response(&response, input)?),
            Err(e) if e.is_not_found() => {
                warn!(id, "remote object is gone, dropping it from state");
                Ok(Value::Null)
            },
            Err(e) => Err(ProviderError::remote(R::TYPE_NAME, Some(id), e)),
        }
    }
}

impl<R: Resource> Default for Lifecycle<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<R: Resource> ResourceHandler for Lifecycle<R> {
    fn type_name(&self) -> &'static str {
        R::TYPE_NAME
    }

    fn endpoint(&self) -> &'static str {
        R::ENDPOINT
    }

    fn id_kind(&self) -> IdKind {
        R::ID_KIND
    }

    fn schema(&self) -> Schema {
        R::schema()
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        Self::diagnostics(config)
    }

    fn plan(&self, prior: Option<&Value>, config: &Value) -> Result<PlanResult, ProviderError> {
        let prior = prior.filter(|p| !p.is_null());
        if !config.is_null() {
            Self::check(config)?;
        }

        let result = plan::plan(&R::schema(), prior, config);

        if let (Some(prior), false) = (prior, result.planned_state.is_null()) {
            let diagnostics = R::validate_update(
                &Self::decode(prior)?,
                &Self::decode(&result.planned_state)?,
            );
            if has_errors(&diagnostics) {
                return Err(ProviderError::Diagnostics(diagnostics));
            }
        }
        Ok(result)
    }

    #[instrument(skip_all, fields(resource_type = R::TYPE_NAME))]
    async fn create(&self, api: &dyn ZentralApi, planned: &Value) -> Result<Value, ProviderError> {
        Self::check(planned)?;
        let model = Self::decode(planned)?;
        let body = Self::request(&model, planned).await?;

        let response = api
            .post(R::ENDPOINT, &body)
            .await
            .map_err(|e| ProviderError::remote(R::TYPE_NAME, None, e))?;

        let state = Self::encode(&R::from_response(&response, Some(&model))?)?;
        info!(id = %state["id"], "created");
        Ok(state)
    }

    #[instrument(skip_all, fields(resource_type = R::TYPE_NAME))]
    async fn read(&self, api: &dyn ZentralApi, state: &Value) -> Result<Value, ProviderError> {
        let id = Self::id_of(state)?;
        let prior = Self::decode(state)?;
        debug!(%id, "refreshing");
        Self::fetch(api, &id, Some(&prior)).await
    }

    #[instrument(skip_all, fields(resource_type = R::TYPE_NAME))]
    async fn update(
        &self,
        api: &dyn ZentralApi,
        prior: &Value,
        planned: &Value,
    ) -> Result<Value, ProviderError> {
        Self::check(planned)?;
        let id = Self::id_of(prior)?;
        match planned.get("id") {
            Some(planned_id) if !planned_id.is_null() && !is_unknown(planned_id) => {
                if Self::id_of(planned)? != id {
                    return Err(ProviderError::FailedPrecondition(format!(
                        "{}: the id cannot be changed from {} to {}",
                        R::TYPE_NAME,
                        id,
                        planned_id
                    )));
                }
            },
            _ => {},
        }

        let prior_model = Self::decode(prior)?;
        let model = Self::decode(planned)?;
        let diagnostics = R::validate_update(&prior_model, &model);
        if has_errors(&diagnostics) {
            return Err(ProviderError::Diagnostics(diagnostics));
        }
        let body = Self::request(&model, planned).await?;

        let response = api
            .put(&Self::path(&id), &body)
            .await
            .map_err(|e| ProviderError::remote(R::TYPE_NAME, Some(&id), e))?;

        let state = Self::encode(&R::from_response(&response, Some(&model))?)?;
        if Self::id_of(&state)? != id {
            return Err(ProviderError::FailedPrecondition(format!(
                "{}: the server re-identified {} as {}",
                R::TYPE_NAME,
                id,
                state["id"]
            )));
        }
        info!(%id, "updated");
        Ok(state)
    }

    #[instrument(skip_all, fields(resource_type = R::TYPE_NAME))]
    async fn delete(&self, api: &dyn ZentralApi, state: &Value) -> Result<(), ProviderError> {
        let id = Self::id_of(state)?;
        match api.delete(&Self::path(&id)).await {
            Ok(()) => {
                info!(%id, "deleted");
                Ok(())
            },
            Err(e) if e.is_not_found() => {
                info!(%id, "already deleted");
                Ok(())
            },
            Err(e) => Err(ProviderError::remote(R::TYPE_NAME, Some(&id), e)),
        }
    }

    #[instrument(skip_all, fields(resource_type = R::TYPE_NAME))]
    async fn import(&self, api: &dyn ZentralApi, id: &str) -> Result<Value, ProviderError> {
        let parsed = R::ID_KIND.parse(id)?;
        let minimal = json!({ "id": parsed });
        let state = self.read(api, &minimal).await?;
        if state.is_null() {
            return Err(ProviderError::NotFound(format!(
                "{} {} does not exist",
                R::TYPE_NAME,
                id
            )));
        }
        info!(%id, "imported");
        Ok(state)
    }
}
