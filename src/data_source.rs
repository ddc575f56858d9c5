//! Read-only data source lookups.
//!
//! [`Lookup`] turns any [`Resource`] into a data source that finds exactly one
//! remote object either by `id` or by one of the entity's natural keys.

use crate::client::ZentralApi;
use crate::error::ProviderError;
use crate::resource::{IdKind, Resource};
use crate::schema::{
    has_errors, Attribute, AttributeFlags, Block, Constraint, Diagnostic, NestedBlock, Schema,
};
use crate::validation::validate;
use async_trait::async_trait;
use serde_json::Value;
use std::marker::PhantomData;
use tracing::{debug, instrument};

/// Object-safe data source operations as registered with the provider.
#[async_trait]
pub trait DataSourceHandler: Send + Sync {
    /// Host type name.
    fn type_name(&self) -> &'static str;

    /// The declared schema.
    fn schema(&self) -> Schema;

    /// Validate a lookup configuration.
    fn validate(&self, config: &Value) -> Vec<Diagnostic>;

    /// Find the single matching object and return its full state.
    async fn read(&self, api: &dyn ZentralApi, config: &Value) -> Result<Value, ProviderError>;
}

/// Data source looking up a [`Resource`] by id or natural key.
pub struct Lookup<R>(PhantomData<fn() -> R>);

impl<R: Resource> Lookup<R> {
    /// Create the lookup.
    pub fn new() -> Self {
        Self(PhantomData)
    }

    /// Create a boxed lookup for registration.
    pub fn boxed() -> Box<dyn DataSourceHandler> {
        Box::new(Self::new())
    }

    fn keys() -> impl Iterator<Item = &'static str> {
        std::iter::once("id").chain(R::LOOKUP_KEYS.iter().copied())
    }

    fn decode(&self, body: &Value) -> Result<Value, ProviderError> {
        Ok(serde_json::to_value(R::from_response(body, None)?)?)
    }
}

impl<R: Resource> Default for Lookup<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// The resource schema with every attribute computed, except the lookup keys
/// which become optional+computed.
fn lookup_schema(resource: Schema, keys: &[&str]) -> Schema {
    let mut block = computed_block(resource.block);
    for key in keys {
        if let Some(attr) = block.attributes.get_mut(*key) {
            attr.flags = AttributeFlags {
                sensitive: attr.flags.sensitive,
                ..AttributeFlags::optional_computed()
            };
        }
    }
    block.constraints = vec![Constraint::exactly_one_of(keys.iter().copied())];
    Schema {
        version: resource.version,
        block,
    }
}

fn computed_block(block: Block) -> Block {
    Block {
        attributes: block
            .attributes
            .into_iter()
            .map(|(name, attr)| {
                let mut computed = Attribute::new(
                    attr.attr_type,
                    AttributeFlags {
                        sensitive: attr.flags.sensitive,
                        ..AttributeFlags::computed()
                    },
                );
                computed.description = attr.description;
                (name, computed)
            })
            .collect(),
        blocks: block
            .blocks
            .into_iter()
            .map(|(name, nested)| {
                (
                    name,
                    NestedBlock {
                        block: computed_block(nested.block),
                        nesting_mode: nested.nesting_mode,
                        min_items: 0,
                        max_items: 0,
                        computed: false,
                    },
                )
            })
            .collect(),
        constraints: Vec::new(),
        description: block.description,
    }
}

#[async_trait]
impl<R: Resource> DataSourceHandler for Lookup<R> {
    fn type_name(&self) -> &'static str {
        R::TYPE_NAME
    }

    fn schema(&self) -> Schema {
        lookup_schema(R::schema(), &Self::keys().collect::<Vec<_>>())
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let mut diagnostics = validate(&self.schema(), config);
        if R::ID_KIND == IdKind::Uuid {
            if let Some(Value::String(id)) = config.get("id") {
                if uuid::Uuid::parse_str(id).is_err() {
                    diagnostics.push(
                        Diagnostic::error("Invalid UUID for attribute 'id'")
                            .with_detail(format!("\"{}\" is not a valid UUID", id))
                            .with_attribute("id"),
                    );
                }
            }
        }
        diagnostics
    }

    #[instrument(skip_all, fields(data_source_type = R::TYPE_NAME))]
    async fn read(&self, api: &dyn ZentralApi, config: &Value) -> Result<Value, ProviderError> {
        let diagnostics = self.validate(config);
        if has_errors(&diagnostics) {
            return Err(ProviderError::Diagnostics(diagnostics));
        }

        if let Some(id) = config.get("id").filter(|v| !v.is_null()) {
            let id = match id {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            debug!(%id, "lookup by id");
            let path = format!("{}{}/", R::ENDPOINT, id);
            return match api.get(&path).await {
                Ok(body) => self.decode(&body),
                Err(e) => Err(ProviderError::remote(R::TYPE_NAME, Some(&id), e)),
            };
        }

        let (key, wanted) = R::LOOKUP_KEYS
            .iter()
            .find_map(|key| {
                config
                    .get(*key)
                    .filter(|v| !v.is_null())
                    .map(|v| (*key, v.clone()))
            })
            .ok_or_else(|| {
                ProviderError::InvalidRequest(format!(
                    "{}: one of {} must be set",
                    R::TYPE_NAME,
                    Self::keys().collect::<Vec<_>>().join(", ")
                ))
            })?;

        let filter = match &wanted {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        debug!(key, value = %filter, "lookup by natural key");
        let candidates = api
            .list(R::ENDPOINT, &[(key, filter.clone())])
            .await
            .map_err(|e| ProviderError::remote(R::TYPE_NAME, None, e))?;

        // the server may ignore unknown filters
        let mut matches = candidates.iter().filter(|c| c.get(key) == Some(&wanted));
        match (matches.next(), matches.next()) {
            (Some(found), None) => self.decode(found),
            (None, _) => Err(ProviderError::NotFound(format!(
                "{}: no object with {} = {}",
                R::TYPE_NAME,
                key,
                wanted
            ))),
            (Some(_), Some(_)) => Err(ProviderError::InvalidRequest(format!(
                "{}: {} = {} is ambiguous, {} objects match",
                R::TYPE_NAME,
                key,
                wanted,
                2 + matches.count()
            ))),
        }
    }
}
