//! Testing utilities for the provider.
//!
//! [`MockApi`] is an in-memory stand-in for the remote platform and
//! [`ProviderTester`] drives a [`ProviderService`] without spinning up a gRPC
//! server.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use zentral_provider::testing::{MockApi, ProviderTester};
//! use zentral_provider::ZentralProvider;
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let api = Arc::new(MockApi::new());
//! let tester = ProviderTester::new(ZentralProvider::with_client(api.clone()));
//!
//! let state = tester
//!     .lifecycle_create("zentral_tag", json!({"name": "laptops"}))
//!     .await
//!     .unwrap();
//! assert_eq!(state["color"], "0079bf");
//! # });
//! ```

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::client::{ApiError, ZentralApi};
use crate::error::ProviderError;
use crate::resource::IdKind;
use crate::schema::{Diagnostic, ProviderSchema};
use crate::server::ProviderService;
use crate::types::{ImportedResource, PlanResult};

/// A request received by [`MockApi`].
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    /// HTTP method.
    pub method: &'static str,
    /// Path relative to the API root.
    pub path: String,
    /// JSON body of POST and PUT requests.
    pub body: Option<Value>,
}

/// Server-side processing applied to every stored object.
pub type WriteHook = fn(&mut Map<String, Value>);

#[derive(Default)]
struct Collection {
    id_kind: Option<IdKind>,
    next_id: i64,
    objects: Vec<Value>,
    on_write: Option<WriteHook>,
}

impl Collection {
    fn position(&self, id: &str) -> Option<usize> {
        self.objects
            .iter()
            .position(|o| o.get("id").map(id_string).as_deref() == Some(id))
    }

    fn assign_id(&mut self) -> Value {
        match self.id_kind {
            Some(IdKind::Uuid) => Value::String(uuid::Uuid::new_v4().to_string()),
            _ => {
                self.next_id += 1;
                Value::from(self.next_id)
            },
        }
    }
}

#[derive(Default)]
struct State {
    collections: BTreeMap<String, Collection>,
    calls: Vec<Call>,
    failures: VecDeque<ApiError>,
}

/// In-memory implementation of [`ZentralApi`].
///
/// Each registered endpoint is a collection of JSON objects. POST stores the
/// body with a server-assigned id (a counter starting at 1, or a random UUID)
/// and echoes it, PUT replaces the object keeping its id, GET and DELETE
/// answer 404 for unknown ids and list filters on field equality. Every
/// request is recorded.
pub struct MockApi {
    state: Mutex<State>,
}

impl MockApi {
    /// A platform serving every endpoint of the built-in resources.
    pub fn new() -> Self {
        let handlers = crate::resources::resources();
        Self::with_id_kinds(handlers.iter().map(|h| (h.endpoint(), h.id_kind())))
            .with_write_hook("osquery/packs/", slugify_name)
    }

    /// A platform serving only the given endpoints.
    pub fn with_id_kinds<'a>(endpoints: impl IntoIterator<Item = (&'a str, IdKind)>) -> Self {
        let collections = endpoints
            .into_iter()
            .map(|(endpoint, kind)| {
                (
                    endpoint.to_string(),
                    Collection {
                        id_kind: Some(kind),
                        ..Collection::default()
                    },
                )
            })
            .collect();
        Self {
            state: Mutex::new(State {
                collections,
                ..State::default()
            }),
        }
    }

    /// Process objects written to an endpoint the way the server would.
    pub fn with_write_hook(self, endpoint: &str, hook: WriteHook) -> Self {
        self.lock()
            .collections
            .entry(endpoint.to_string())
            .or_default()
            .on_write = Some(hook);
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // a panicking test must not poison the others
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Store an object as is; numeric ids advance the id counter.
    pub fn insert(&self, endpoint: &str, object: Value) {
        let mut state = self.lock();
        let collection = state.collections.entry(endpoint.to_string()).or_default();
        if let Some(id) = object.get("id").and_then(Value::as_i64) {
            collection.next_id = collection.next_id.max(id);
        }
        collection.objects.push(object);
    }

    /// Delete an object behind the provider's back.
    pub fn remove(&self, endpoint: &str, id: &str) -> Option<Value> {
        let mut state = self.lock();
        let collection = state.collections.get_mut(endpoint)?;
        let index = collection.position(id)?;
        Some(collection.objects.remove(index))
    }

    /// Modify an object behind the provider's back.
    pub fn patch(&self, endpoint: &str, id: &str, fields: Value) -> bool {
        let mut state = self.lock();
        let Some(collection) = state.collections.get_mut(endpoint) else {
            return false;
        };
        let Some(index) = collection.position(id) else {
            return false;
        };
        match (&mut collection.objects[index], fields) {
            (Value::Object(object), Value::Object(fields)) => {
                object.extend(fields);
                true
            },
            _ => false,
        }
    }

    /// The stored object, if any.
    pub fn object(&self, endpoint: &str, id: &str) -> Option<Value> {
        let state = self.lock();
        let collection = state.collections.get(endpoint)?;
        collection
            .position(id)
            .map(|index| collection.objects[index].clone())
    }

    /// Number of objects stored under an endpoint.
    pub fn count(&self, endpoint: &str) -> usize {
        self.lock()
            .collections
            .get(endpoint)
            .map_or(0, |c| c.objects.len())
    }

    /// Fail the next request with the given error.
    pub fn fail_next(&self, error: ApiError) {
        self.lock().failures.push_back(error);
    }

    /// All requests received so far.
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// The body of the most recent request with the given method.
    pub fn last_body(&self, method: &str) -> Option<Value> {
        self.lock()
            .calls
            .iter()
            .rev()
            .find(|c| c.method == method)
            .and_then(|c| c.body.clone())
    }

    fn begin(
        &self,
        method: &'static str,
        path: &str,
        body: Option<&Value>,
    ) -> Result<MutexGuard<'_, State>, ApiError> {
        let mut state = self.lock();
        state.calls.push(Call {
            method,
            path: path.to_string(),
            body: body.cloned(),
        });
        match state.failures.pop_front() {
            Some(error) => Err(error),
            None => Ok(state),
        }
    }
}

/// The server derives pack slugs from their names.
fn slugify_name(object: &mut Map<String, Value>) {
    let Some(name) = object.get("name").and_then(Value::as_str) else {
        return;
    };
    let slug = name
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    object.insert("slug".to_string(), Value::String(slug));
}

fn id_string(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn not_found(path: &str) -> ApiError {
    ApiError::NotFound {
        message: format!("{} not found", path),
    }
}

/// Split `collection/id/` into the registered collection and the id.
fn split_item<'s>(state: &'s mut State, path: &str) -> Option<(&'s mut Collection, String)> {
    let (endpoint, rest) = state
        .collections
        .keys()
        .filter_map(|e| path.strip_prefix(e.as_str()).map(|rest| (e.clone(), rest)))
        .max_by_key(|(e, _)| e.len())?;
    let id = rest.strip_suffix('/')?;
    if id.is_empty() || id.contains('/') {
        return None;
    }
    let id = id.to_string();
    state.collections.get_mut(&endpoint).map(|c| (c, id))
}

#[async_trait]
impl ZentralApi for MockApi {
    async fn get(&self, path: &str) -> Result<Value, ApiError> {
        let mut state = self.begin("GET", path, None)?;
        let (collection, id) = split_item(&mut state, path).ok_or_else(|| not_found(path))?;
        let index = collection.position(&id).ok_or_else(|| not_found(path))?;
        Ok(collection.objects[index].clone())
    }

    async fn list(&self, path: &str, query: &[(&str, String)]) -> Result<Vec<Value>, ApiError> {
        let state = self.begin("GET", path, None)?;
        let collection = state.collections.get(path).ok_or_else(|| not_found(path))?;
        Ok(collection
            .objects
            .iter()
            .filter(|object| {
                // like the real API, filters on unknown fields are ignored
                query.iter().all(|(key, wanted)| match object.get(*key) {
                    Some(value) => id_string(value) == *wanted,
                    None => true,
                })
            })
            .cloned()
            .collect())
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        let mut state = self.begin("POST", path, Some(body))?;
        let collection = state
            .collections
            .get_mut(path)
            .ok_or_else(|| not_found(path))?;
        let Value::Object(fields) = body else {
            return Err(ApiError::BadRequest {
                message: "expected a JSON object".to_string(),
                fields: BTreeMap::new(),
            });
        };
        let mut object = fields.clone();
        object.insert("id".to_string(), collection.assign_id());
        if let Some(hook) = collection.on_write {
            hook(&mut object);
        }
        let object = Value::Object(object);
        collection.objects.push(object.clone());
        Ok(object)
    }

    async fn put(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        let mut state = self.begin("PUT", path, Some(body))?;
        let (collection, id) = split_item(&mut state, path).ok_or_else(|| not_found(path))?;
        let index = collection.position(&id).ok_or_else(|| not_found(path))?;
        let Value::Object(fields) = body else {
            return Err(ApiError::BadRequest {
                message: "expected a JSON object".to_string(),
                fields: BTreeMap::new(),
            });
        };
        let mut object = fields.clone();
        if let Some(existing) = collection.objects[index].get("id") {
            object.insert("id".to_string(), existing.clone());
        }
        if let Some(hook) = collection.on_write {
            hook(&mut object);
        }
        let object = Value::Object(object);
        collection.objects[index] = object.clone();
        Ok(object)
    }

    async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let mut state = self.begin("DELETE", path, None)?;
        let (collection, id) = split_item(&mut state, path).ok_or_else(|| not_found(path))?;
        let index = collection.position(&id).ok_or_else(|| not_found(path))?;
        collection.objects.remove(index);
        Ok(())
    }
}

impl Default for MockApi {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives a [`ProviderService`] the way the host would, minus gRPC.
///
/// Validation helpers turn error diagnostics into [`TestError`]; everything
/// else returns the provider's own result.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Wrap a provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// The wrapped provider, for calls the harness does not cover.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Announced schemas.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Configure the provider; error diagnostics fail.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        only_warnings(self.provider.configure(config).await?)
    }

    /// Validate a resource configuration; error diagnostics fail.
    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        only_warnings(
            self.provider
                .validate_resource_config(resource_type, config)
                .await?,
        )
    }

    /// Validate a data source configuration; error diagnostics fail.
    pub async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        only_warnings(
            self.provider
                .validate_data_source_config(data_source_type, config)
                .await?,
        )
    }

    /// Plan a create. The config doubles as the proposed state.
    pub async fn plan_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, None, config.clone(), config)
            .await
    }

    /// Plan an update of `prior_state` towards `config`.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), config.clone(), config)
            .await
    }

    /// Plan the destruction of `prior_state`.
    pub async fn plan_destroy(
        &self,
        resource_type: &str,
        prior_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), Value::Null, Value::Null)
            .await
    }

    /// Create from a planned state.
    pub async fn create(
        &self,
        resource_type: &str,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned).await
    }

    /// Refresh a state.
    pub async fn read(&self, resource_type: &str, state: Value) -> Result<Value, ProviderError> {
        self.provider.read(resource_type, state).await
    }

    /// Apply a planned state over `prior_state`.
    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .update(resource_type, prior_state, planned)
            .await
    }

    /// Delete the object behind a state.
    pub async fn delete(&self, resource_type: &str, state: Value) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, state).await
    }

    /// Import by id.
    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    /// Look up a data source.
    pub async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .read_data_source(data_source_type, config)
            .await
    }

    /// Plan, create, then read back. Returns the refreshed state.
    pub async fn lifecycle_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self.plan_create(resource_type, config).await?;
        let state = self.create(resource_type, plan.planned_state).await?;
        self.read(resource_type, state).await
    }

    /// Plan, update, then read back. Returns the refreshed state.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self
            .plan_update(resource_type, prior_state.clone(), config)
            .await?;
        let state = self
            .update(resource_type, prior_state, plan.planned_state)
            .await?;
        self.read(resource_type, state).await
    }

    /// Plan the destruction, then delete.
    pub async fn lifecycle_delete(
        &self,
        resource_type: &str,
        state: Value,
    ) -> Result<(), ProviderError> {
        self.plan_destroy(resource_type, state.clone()).await?;
        self.delete(resource_type, state).await
    }

    /// Plan and create, then panic unless reading the object back yields the
    /// created state and planning the same config again changes nothing.
    /// Returns the created state.
    pub async fn assert_round_trip(&self, resource_type: &str, config: Value) -> Value {
        let plan = self
            .plan_create(resource_type, config.clone())
            .await
            .unwrap_or_else(|e| panic!("{}: plan failed: {}", resource_type, e));
        let created = self
            .create(resource_type, plan.planned_state)
            .await
            .unwrap_or_else(|e| panic!("{}: create failed: {}", resource_type, e));
        let refreshed = self
            .read(resource_type, created.clone())
            .await
            .unwrap_or_else(|e| panic!("{}: read failed: {}", resource_type, e));
        assert_eq!(refreshed, created, "{}: read back a different state", resource_type);

        let replan = self
            .plan_update(resource_type, refreshed, config)
            .await
            .unwrap_or_else(|e| panic!("{}: re-plan failed: {}", resource_type, e));
        assert!(
            replan.changes.is_empty(),
            "{}: re-plan should be empty, changes: {:?}",
            resource_type,
            changed_paths(&replan)
        );
        created
    }
}

/// Failure of a [`ProviderTester`] validation helper.
#[derive(Debug, thiserror::Error)]
pub enum TestError {
    /// Error diagnostics, warnings dropped.
    #[error("rejected:{}", render(.0))]
    Diagnostics(Vec<Diagnostic>),
    /// Any other provider failure.
    #[error(transparent)]
    Provider(ProviderError),
}

impl From<ProviderError> for TestError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::Diagnostics(diagnostics) => Self::Diagnostics(diagnostics),
            other => Self::Provider(other),
        }
    }
}

fn render(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| {
            let mut line = format!("\n  {}", d.summary);
            if let Some(detail) = &d.detail {
                line.push_str(&format!(": {}", detail));
            }
            if let Some(attribute) = &d.attribute {
                line.push_str(&format!(" (at {})", attribute));
            }
            line
        })
        .collect()
}

fn only_warnings(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics.into_iter().filter(Diagnostic::is_error).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

fn changed_paths(plan: &PlanResult) -> Vec<&str> {
    plan.changes.iter().map(|c| c.path.as_str()).collect()
}

/// Panics if the plan changes anything.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        plan.changes.is_empty(),
        "plan should be empty, changes: {:?}",
        changed_paths(plan)
    );
}

/// Panics unless the plan changes `path`.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    assert!(
        plan.changes.iter().any(|c| c.path == path),
        "plan should change '{}', changes: {:?}",
        path,
        changed_paths(plan)
    );
}

/// Panics if the plan replaces the object.
pub fn assert_plan_updates_in_place(plan: &PlanResult) {
    assert!(!plan.requires_replace, "plan should update in place");
}

/// Panics on any error diagnostic.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors: Vec<_> = diagnostics.iter().filter(|d| d.is_error()).collect();
    assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
}

/// Panics unless `result` failed with an error diagnostic on `attribute`.
pub fn assert_rejects_attribute<T: std::fmt::Debug>(
    result: Result<T, ProviderError>,
    attribute: &str,
) {
    match result {
        Err(ProviderError::Diagnostics(diagnostics)) => assert!(
            diagnostics
                .iter()
                .any(|d| d.is_error() && d.attribute.as_deref() == Some(attribute)),
            "'{}' should be rejected, got {:?}",
            attribute,
            diagnostics
        ),
        other => panic!("'{}' should be rejected, got {:?}", attribute, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ZentralProvider;
    use serde_json::json;
    use std::sync::Arc;

    fn tester() -> (Arc<MockApi>, ProviderTester<ZentralProvider>) {
        let api = Arc::new(MockApi::new());
        let tester = ProviderTester::new(ZentralProvider::with_client(api.clone()));
        (api, tester)
    }

    #[tokio::test]
    async fn test_mock_assigns_numeric_ids() {
        let api = MockApi::with_id_kinds([("things/", IdKind::Numeric)]);
        let first = api.post("things/", &json!({"name": "a"})).await.unwrap();
        let second = api.post("things/", &json!({"name": "b"})).await.unwrap();
        assert_eq!(first["id"], 1);
        assert_eq!(second["id"], 2);
        assert_eq!(api.get("things/2/").await.unwrap()["name"], "b");
        assert!(api.get("things/3/").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_mock_assigns_uuids() {
        let api = MockApi::with_id_kinds([("things/", IdKind::Uuid)]);
        let created = api.post("things/", &json!({"name": "a"})).await.unwrap();
        let id = created["id"].as_str().unwrap();
        assert!(uuid::Uuid::parse_str(id).is_ok());
        assert_eq!(api.get(&format!("things/{}/", id)).await.unwrap(), created);
    }

    #[tokio::test]
    async fn test_mock_put_keeps_id_and_delete_404s() {
        let api = MockApi::with_id_kinds([("things/", IdKind::Numeric)]);
        api.post("things/", &json!({"name": "a"})).await.unwrap();
        let updated = api
            .put("things/1/", &json!({"id": 99, "name": "b"}))
            .await
            .unwrap();
        assert_eq!(updated, json!({"id": 1, "name": "b"}));

        api.delete("things/1/").await.unwrap();
        assert!(api.delete("things/1/").await.unwrap_err().is_not_found());
        assert_eq!(api.count("things/"), 0);
    }

    #[tokio::test]
    async fn test_mock_list_filters() {
        let api = MockApi::with_id_kinds([("things/", IdKind::Numeric)]);
        api.insert("things/", json!({"id": 4, "name": "a"}));
        api.insert("things/", json!({"id": 5, "name": "b"}));

        let found = api
            .list("things/", &[("name", "b".to_string())])
            .await
            .unwrap();
        assert_eq!(found, vec![json!({"id": 5, "name": "b"})]);

        let ignored = api
            .list("things/", &[("color", "red".to_string())])
            .await
            .unwrap();
        assert_eq!(ignored.len(), 2);

        // inserted ids advance the counter
        let created = api.post("things/", &json!({"name": "c"})).await.unwrap();
        assert_eq!(created["id"], 6);
    }

    #[tokio::test]
    async fn test_mock_failures_and_recording() {
        let api = MockApi::with_id_kinds([("things/", IdKind::Numeric)]);
        api.fail_next(ApiError::Conflict {
            message: "name already exists".to_string(),
        });
        assert!(matches!(
            api.post("things/", &json!({"name": "a"})).await,
            Err(ApiError::Conflict { .. })
        ));
        api.post("things/", &json!({"name": "a"})).await.unwrap();

        let calls = api.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].method, "POST");
        assert_eq!(calls[1].path, "things/");
        assert_eq!(api.last_body("POST"), Some(json!({"name": "a"})));
    }

    #[tokio::test]
    async fn test_mock_write_hook() {
        let api = MockApi::with_id_kinds([("packs/", IdKind::Numeric)])
            .with_write_hook("packs/", slugify_name);
        let created = api
            .post("packs/", &json!({"name": "Compliance Checks (macOS)"}))
            .await
            .unwrap();
        assert_eq!(created["slug"], "compliance-checks-macos");
    }

    #[test]
    fn test_mock_serves_every_resource() {
        let api = MockApi::new();
        for handler in crate::resources::resources() {
            assert_eq!(api.count(handler.endpoint()), 0);
            assert!(api.lock().collections.contains_key(handler.endpoint()));
        }
    }

    #[tokio::test]
    async fn test_tester_update_then_destroy() {
        let (api, tester) = tester();
        let state = tester
            .lifecycle_create("zentral_tag", json!({"name": "laptops"}))
            .await
            .unwrap();

        let plan = tester
            .plan_update("zentral_tag", state.clone(), json!({"name": "desktops"}))
            .await
            .unwrap();
        assert_plan_changes_attribute(&plan, "name");
        assert_plan_updates_in_place(&plan);
        assert!(plan.changes.iter().all(|c| c.path != "id"));

        let state = tester
            .lifecycle_update(
                "zentral_tag",
                state,
                json!({"name": "desktops", "color": "ff0000"}),
            )
            .await
            .unwrap();
        assert_eq!(state["color"], "ff0000");

        let plan = tester
            .plan_destroy("zentral_tag", state.clone())
            .await
            .unwrap();
        assert!(plan.is_destroy());
        tester.lifecycle_delete("zentral_tag", state).await.unwrap();
        assert_eq!(api.count("inventory/tags/"), 0);
    }

    #[tokio::test]
    async fn test_validation_errors_keep_only_errors() {
        let (_, tester) = tester();
        let err = tester
            .validate_resource_config("zentral_tag", json!({"color": "red"}))
            .await
            .unwrap_err();
        let TestError::Diagnostics(diagnostics) = &err else {
            panic!("unexpected {}", err);
        };
        assert!(diagnostics.iter().all(Diagnostic::is_error));
        assert!(diagnostics
            .iter()
            .any(|d| d.attribute.as_deref() == Some("name")));
        assert!(err.to_string().contains("(at name)"));

        tester
            .validate_data_source_config("zentral_tag", json!({"name": "laptops"}))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_assert_rejects_attribute() {
        let (_, tester) = tester();
        let result = tester
            .plan_create("zentral_tag", json!({"name": "x", "color": "red"}))
            .await;
        assert_rejects_attribute(result, "color");
    }

    #[test]
    #[should_panic(expected = "unexpected errors")]
    fn test_assert_no_errors_fails() {
        assert_no_errors(&[
            Diagnostic::warning("TLS verification disabled"),
            Diagnostic::error("Missing required attribute"),
        ]);
    }
}
