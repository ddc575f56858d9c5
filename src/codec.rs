//! Building request bodies from entity models and reading entity models
//! back from response bodies.
//!
//! Every entity codec is written with [`RequestBody`] and [`ResponseBody`]:
//!
//! ```
//! use zentral_provider::codec::{NullPolicy, RequestBody, ResponseBody, COLLECTION_OPTS};
//! use zentral_provider::value::Tri;
//! use serde_json::json;
//!
//! let body = RequestBody::new()
//!     .with("name", &Tri::value("laptops".to_string()), NullPolicy::Omit)
//!     .with("filevault_config", &Tri::<i64>::Null, NullPolicy::SendNull)
//!     .with_enum("collect_apps", &Tri::value("ALL".to_string()), &COLLECTION_OPTS)
//!     .build()
//!     .unwrap();
//! assert_eq!(body, json!({"name": "laptops", "filevault_config": null, "collect_apps": 2}));
//!
//! let response = ResponseBody::new("zentral_mdm_blueprint", &body).unwrap();
//! let apps = response.required_enum("collect_apps", &COLLECTION_OPTS).unwrap();
//! assert_eq!(apps.as_str(), Some("ALL"));
//! ```

use crate::error::ProviderError;
use crate::schema::Diagnostic;
use crate::value::{SetOf, Tri};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

/// What to send for an attribute whose model value is null.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullPolicy {
    /// Leave the key out of the body.
    Omit,
    /// Send an explicit JSON `null`.
    SendNull,
}

/// A string enum carried as an integer code on the wire.
#[derive(Debug, Clone, Copy)]
pub struct EnumTable {
    /// Name used in error messages.
    pub name: &'static str,
    /// `(label, code)` pairs.
    pub entries: &'static [(&'static str, i64)],
}

impl EnumTable {
    /// The code for a label.
    pub fn encode(&self, label: &str) -> Option<i64> {
        self.entries
            .iter()
            .find(|(l, _)| *l == label)
            .map(|(_, code)| *code)
    }

    /// The label for a code.
    pub fn decode(&self, code: i64) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(_, c)| *c == code)
            .map(|(label, _)| *label)
    }

    /// All labels, in declaration order.
    pub fn labels(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(label, _)| *label)
    }
}

/// Inventory collection options of a blueprint.
pub const COLLECTION_OPTS: EnumTable = EnumTable {
    name: "collection option",
    entries: &[("NO", 0), ("MANAGED_ONLY", 1), ("ALL", 2)],
};

/// Builder for a JSON request body.
///
/// Unknown values are always omitted. The first encoding error is kept and
/// returned by [`RequestBody::build`].
#[derive(Debug, Default)]
pub struct RequestBody {
    fields: Map<String, Value>,
    error: Option<ProviderError>,
}

impl RequestBody {
    /// An empty body.
    pub fn new() -> Self {
        Self::default()
    }

    fn fail(&mut self, err: ProviderError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    /// Add a field.
    pub fn with<T: Serialize>(mut self, key: &str, value: &Tri<T>, policy: NullPolicy) -> Self {
        match value {
            Tri::Value(v) => match serde_json::to_value(v) {
                Ok(encoded) => {
                    self.fields.insert(key.to_string(), encoded);
                },
                Err(e) => self.fail(e.into()),
            },
            Tri::Null if policy == NullPolicy::SendNull => {
                self.fields.insert(key.to_string(), Value::Null);
            },
            Tri::Null | Tri::Unknown => {},
        }
        self
    }

    /// Add a string enum field, translated to its integer code.
    ///
    /// Null enums are omitted.
    pub fn with_enum(mut self, key: &str, value: &Tri<String>, table: &EnumTable) -> Self {
        if let Tri::Value(label) = value {
            match table.encode(label) {
                Some(code) => {
                    self.fields.insert(key.to_string(), Value::from(code));
                },
                None => self.fail(ProviderError::Diagnostics(vec![Diagnostic::error(
                    format!("Invalid {} \"{}\"", table.name, label),
                )
                .with_detail(format!(
                    "Value must be one of: {}",
                    table.labels().collect::<Vec<_>>().join(", ")
                ))
                .with_attribute(key)])),
            }
        }
        self
    }

    /// Add a nested object encoded with its own builder.
    pub fn with_object<M>(
        mut self,
        key: &str,
        value: &Tri<M>,
        policy: NullPolicy,
        encode: impl FnOnce(&M) -> RequestBody,
    ) -> Self {
        match value {
            Tri::Value(inner) => match encode(inner).build() {
                Ok(encoded) => {
                    self.fields.insert(key.to_string(), encoded);
                },
                Err(e) => self.fail(e),
            },
            Tri::Null if policy == NullPolicy::SendNull => {
                self.fields.insert(key.to_string(), Value::Null);
            },
            Tri::Null | Tri::Unknown => {},
        }
        self
    }

    /// Finish the body.
    pub fn build(self) -> Result<Value, ProviderError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(Value::Object(self.fields)),
        }
    }
}

/// Reader over a JSON response object.
#[derive(Debug, Clone, Copy)]
pub struct ResponseBody<'a> {
    entity: &'a str,
    fields: &'a Map<String, Value>,
}

impl<'a> ResponseBody<'a> {
    /// Wrap a response; anything but an object is a codec mismatch.
    pub fn new(entity: &'a str, body: &'a Value) -> Result<Self, ProviderError> {
        match body {
            Value::Object(fields) => Ok(Self { entity, fields }),
            other => Err(ProviderError::CodecMismatch(format!(
                "{}: expected a JSON object in the response, got {}",
                entity, other
            ))),
        }
    }

    fn mismatch(&self, key: &str, detail: impl std::fmt::Display) -> ProviderError {
        ProviderError::CodecMismatch(format!(
            "{}: cannot decode field \"{}\": {}",
            self.entity, key, detail
        ))
    }

    fn present(&self, key: &str) -> Option<&'a Value> {
        self.fields.get(key).filter(|v| !v.is_null())
    }

    fn decode<T: DeserializeOwned>(&self, key: &str, value: &Value) -> Result<T, ProviderError> {
        serde_json::from_value(value.clone()).map_err(|e| self.mismatch(key, e))
    }

    /// The raw value of a field, if present and non-null.
    pub fn raw(&self, key: &str) -> Option<&'a Value> {
        self.present(key)
    }

    /// A field the server always returns.
    pub fn required<T: DeserializeOwned>(&self, key: &str) -> Result<Tri<T>, ProviderError> {
        match self.present(key) {
            Some(v) => self.decode(key, v).map(Tri::Value),
            None => Err(self.mismatch(key, "missing required field")),
        }
    }

    /// A nullable field; absent and `null` both decode to null.
    pub fn optional<T: DeserializeOwned>(&self, key: &str) -> Result<Tri<T>, ProviderError> {
        match self.present(key) {
            Some(v) => self.decode(key, v).map(Tri::Value),
            None => Ok(Tri::Null),
        }
    }

    /// A set field; absent and `null` decode to the empty set.
    pub fn set<T: DeserializeOwned>(&self, key: &str) -> Result<Tri<SetOf<T>>, ProviderError> {
        match self.present(key) {
            Some(v) => self.decode(key, v).map(Tri::Value),
            None => Ok(Tri::Value(SetOf::new())),
        }
    }

    /// A list field; absent and `null` decode to the empty list.
    pub fn list<T: DeserializeOwned>(&self, key: &str) -> Result<Tri<Vec<T>>, ProviderError> {
        match self.present(key) {
            Some(v) => self.decode(key, v).map(Tri::Value),
            None => Ok(Tri::Value(Vec::new())),
        }
    }

    /// An integer-coded enum the server always returns.
    pub fn required_enum(&self, key: &str, table: &EnumTable) -> Result<Tri<String>, ProviderError> {
        match self.optional_enum(key, table)? {
            Tri::Null => Err(self.mismatch(key, "missing required field")),
            other => Ok(other),
        }
    }

    /// A nullable integer-coded enum.
    pub fn optional_enum(&self, key: &str, table: &EnumTable) -> Result<Tri<String>, ProviderError> {
        let Some(raw) = self.present(key) else {
            return Ok(Tri::Null);
        };
        let code = raw
            .as_i64()
            .ok_or_else(|| self.mismatch(key, format!("expected integer {}", table.name)))?;
        table
            .decode(code)
            .map(|label| Tri::Value(label.to_string()))
            .ok_or_else(|| self.mismatch(key, format!("unknown {} code {}", table.name, code)))
    }

    /// A nullable nested object decoded with its own reader.
    pub fn object<M>(
        &self,
        key: &str,
        decode: impl FnOnce(ResponseBody<'a>) -> Result<M, ProviderError>,
    ) -> Result<Tri<M>, ProviderError> {
        match self.present(key) {
            Some(v) => {
                let nested = ResponseBody::new(self.entity, v)
                    .map_err(|_| self.mismatch(key, "expected an object"))?;
                decode(nested).map(Tri::Value)
            },
            None => Ok(Tri::Null),
        }
    }

    /// A set of nested objects, each decoded with its own reader.
    ///
    /// Absent and `null` decode to the empty set.
    pub fn object_set<M>(
        &self,
        key: &str,
        decode: impl Fn(ResponseBody<'a>) -> Result<M, ProviderError>,
    ) -> Result<Tri<SetOf<M>>, ProviderError> {
        let Some(raw) = self.present(key) else {
            return Ok(Tri::Value(SetOf::new()));
        };
        let items = raw
            .as_array()
            .ok_or_else(|| self.mismatch(key, "expected an array"))?;
        items
            .iter()
            .map(|item| {
                let nested = ResponseBody::new(self.entity, item)
                    .map_err(|_| self.mismatch(key, "expected an array of objects"))?;
                decode(nested)
            })
            .collect::<Result<SetOf<M>, _>>()
            .map(Tri::Value)
    }
}

/// Read a local file whose contents are sent in place of its path.
///
/// Failures are reported against `attribute`.
pub async fn read_file_content(attribute: &str, path: &str) -> Result<String, ProviderError> {
    tokio::fs::read_to_string(path).await.map_err(|e| {
        ProviderError::Diagnostics(vec![Diagnostic::error(format!(
            "Could not read file \"{}\"",
            path
        ))
        .with_detail(e.to_string())
        .with_attribute(attribute)])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_null_policy() {
        let body = RequestBody::new()
            .with("omitted", &Tri::<String>::Null, NullPolicy::Omit)
            .with("sent", &Tri::<i64>::Null, NullPolicy::SendNull)
            .with("unknown", &Tri::<i64>::Unknown, NullPolicy::SendNull)
            .build()
            .unwrap();
        assert_eq!(body, json!({"sent": null}));
    }

    #[test]
    fn test_sets_are_sorted() {
        let ids: SetOf<i64> = vec![3, 1, 2].into();
        let body = RequestBody::new()
            .with("ids", &Tri::value(ids), NullPolicy::Omit)
            .build()
            .unwrap();
        assert_eq!(body, json!({"ids": [1, 2, 3]}));
    }

    #[test]
    fn test_enum_table() {
        assert_eq!(COLLECTION_OPTS.encode("MANAGED_ONLY"), Some(1));
        assert_eq!(COLLECTION_OPTS.decode(2), Some("ALL"));
        assert_eq!(COLLECTION_OPTS.decode(7), None);
        assert_eq!(
            COLLECTION_OPTS.labels().collect::<Vec<_>>(),
            vec!["NO", "MANAGED_ONLY", "ALL"]
        );
    }

    #[test]
    fn test_invalid_enum_label_fails_build() {
        let result = RequestBody::new()
            .with_enum("collect_apps", &Tri::value("SOME".to_string()), &COLLECTION_OPTS)
            .build();
        match result {
            Err(ProviderError::Diagnostics(d)) => {
                assert_eq!(d[0].attribute, Some("collect_apps".to_string()))
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_nested_object() {
        #[derive(Debug)]
        struct Challenge {
            challenge: Tri<String>,
        }

        let value = Tri::value(Challenge {
            challenge: "Yolo".into(),
        });
        let body = RequestBody::new()
            .with_object("static_challenge_kwargs", &value, NullPolicy::SendNull, |c| {
                RequestBody::new().with("challenge", &c.challenge, NullPolicy::Omit)
            })
            .with_object(
                "okta_ca_kwargs",
                &Tri::<Challenge>::Null,
                NullPolicy::SendNull,
                |c| RequestBody::new().with("challenge", &c.challenge, NullPolicy::Omit),
            )
            .build()
            .unwrap();
        assert_eq!(
            body,
            json!({"static_challenge_kwargs": {"challenge": "Yolo"}, "okta_ca_kwargs": null})
        );

        let response = ResponseBody::new("issuer", &body).unwrap();
        let decoded = response
            .object("static_challenge_kwargs", |r| r.required::<String>("challenge"))
            .unwrap();
        assert_eq!(decoded, Tri::value(Tri::value("Yolo".to_string())));
        let missing = response
            .object("okta_ca_kwargs", |r| r.required::<String>("challenge"))
            .unwrap();
        assert!(missing.is_null());
    }

    #[test]
    fn test_object_set() {
        let body = json!({"headers": [{"name": "X-Yolo", "value": "fomo"}], "broken": [1]});
        let r = ResponseBody::new("zentral_store", &body).unwrap();

        let headers = r
            .object_set("headers", |h| h.required::<String>("name"))
            .unwrap();
        assert_eq!(headers, Tri::value(SetOf::from(vec![Tri::value("X-Yolo".to_string())])));
        assert_eq!(
            r.object_set("absent", |h| h.required::<String>("name")).unwrap(),
            Tri::value(SetOf::new())
        );
        assert!(matches!(
            r.object_set("broken", |h| h.required::<String>("name")),
            Err(ProviderError::CodecMismatch(_))
        ));
    }

    #[test]
    fn test_response_defaults() {
        let body = json!({"id": 4, "name": "a", "description": null});
        let r = ResponseBody::new("zentral_tag", &body).unwrap();

        assert_eq!(r.required::<i64>("id").unwrap(), Tri::value(4));
        assert!(r.optional::<String>("description").unwrap().is_null());
        assert!(r.optional::<String>("absent").unwrap().is_null());
        assert_eq!(r.set::<i64>("absent").unwrap(), Tri::value(SetOf::new()));
        assert_eq!(r.list::<String>("absent").unwrap(), Tri::value(Vec::new()));
    }

    #[test]
    fn test_response_mismatches() {
        let body = json!({"id": "four", "collect_apps": 9});
        let r = ResponseBody::new("zentral_mdm_blueprint", &body).unwrap();

        assert!(matches!(
            r.required::<i64>("id"),
            Err(ProviderError::CodecMismatch(_))
        ));
        assert!(matches!(
            r.required::<String>("name"),
            Err(ProviderError::CodecMismatch(_))
        ));
        assert!(matches!(
            r.required_enum("collect_apps", &COLLECTION_OPTS),
            Err(ProviderError::CodecMismatch(_))
        ));
        assert!(matches!(
            ResponseBody::new("zentral_tag", &json!([1])),
            Err(ProviderError::CodecMismatch(_))
        ));
    }

    #[tokio::test]
    async fn test_read_file_content() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "<html>hello</html>").unwrap();
        let path = file.path().to_string_lossy().to_string();

        assert_eq!(
            read_file_content("html_file", &path).await.unwrap(),
            "<html>hello</html>"
        );

        let err = read_file_content("html_file", "/nonexistent/view.html")
            .await
            .unwrap_err();
        match err {
            ProviderError::Diagnostics(d) => {
                assert_eq!(d[0].attribute, Some("html_file".to_string()))
            },
            other => panic!("unexpected {:?}", other),
        }
    }
}
