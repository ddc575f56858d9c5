//! Tri-state attribute values.
//!
//! Every attribute the host exchanges with the provider is either a concrete
//! value, null, or unknown ("known after apply"). [`Tri`] carries that state
//! through the typed entity models, and [`SetOf`] gives sets their
//! membership-only equality.
//!
//! # Wire encoding
//!
//! Plans and states travel as JSON. A concrete value is its plain JSON form,
//! null is JSON `null` (or an absent key), and unknown is the string
//! [`UNKNOWN_SENTINEL`].
//!
//! ```
//! use zentral_provider::value::{Tri, UNKNOWN_SENTINEL};
//! use serde_json::json;
//!
//! let name: Tri<String> = serde_json::from_value(json!("laptops")).unwrap();
//! assert_eq!(name, Tri::value("laptops".to_string()));
//!
//! let id: Tri<i64> = serde_json::from_value(json!(UNKNOWN_SENTINEL)).unwrap();
//! assert!(id.is_unknown());
//! ```

use std::cmp::Ordering;

use serde::de::{DeserializeOwned, Error as _};
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// JSON encoding of an unknown value in plans and configs.
pub const UNKNOWN_SENTINEL: &str = "74D93920-ED26-11E3-AC10-0800200C9A66";

/// Returns `true` if the JSON value is the unknown sentinel.
pub fn is_unknown(value: &Value) -> bool {
    matches!(value, Value::String(s) if s == UNKNOWN_SENTINEL)
}

/// Returns `true` if the JSON value contains the unknown sentinel anywhere.
pub fn contains_unknown(value: &Value) -> bool {
    match value {
        Value::String(_) => is_unknown(value),
        Value::Array(items) => items.iter().any(contains_unknown),
        Value::Object(map) => map.values().any(contains_unknown),
        _ => false,
    }
}

/// The unknown sentinel as a JSON value.
pub fn unknown() -> Value {
    Value::String(UNKNOWN_SENTINEL.to_string())
}

/// A value that may also be null or unknown.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tri<T> {
    /// A concrete value.
    Value(T),
    /// Explicitly absent.
    Null,
    /// To be computed during apply. Never persisted in state.
    Unknown,
}

/// A string attribute.
pub type StringValue = Tri<String>;
/// A 64-bit integer attribute.
pub type Int64Value = Tri<i64>;
/// A boolean attribute.
pub type BoolValue = Tri<bool>;
/// An ordered list attribute.
pub type ListValue<T> = Tri<Vec<T>>;
/// An unordered set attribute.
pub type SetValue<T> = Tri<SetOf<T>>;

impl<T> Default for Tri<T> {
    fn default() -> Self {
        Tri::Null
    }
}

impl<T> Tri<T> {
    /// Wrap a concrete value.
    pub fn value(value: T) -> Self {
        Tri::Value(value)
    }

    /// The null state.
    pub fn null() -> Self {
        Tri::Null
    }

    /// The unknown state.
    pub fn unknown() -> Self {
        Tri::Unknown
    }

    /// Whether this is the null state.
    pub fn is_null(&self) -> bool {
        matches!(self, Tri::Null)
    }

    /// Whether this is the unknown state.
    pub fn is_unknown(&self) -> bool {
        matches!(self, Tri::Unknown)
    }

    /// Whether a concrete value is present.
    pub fn has_value(&self) -> bool {
        matches!(self, Tri::Value(_))
    }

    /// Borrow the concrete value, if any.
    pub fn as_ref(&self) -> Option<&T> {
        match self {
            Tri::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Take the concrete value, if any.
    pub fn into_option(self) -> Option<T> {
        match self {
            Tri::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Map the concrete value, preserving null and unknown.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Tri<U> {
        match self {
            Tri::Value(v) => Tri::Value(f(v)),
            Tri::Null => Tri::Null,
            Tri::Unknown => Tri::Unknown,
        }
    }
}

impl<T: Clone> Tri<T> {
    /// Clone out the concrete value, if any.
    pub fn get(&self) -> Option<T> {
        self.as_ref().cloned()
    }
}

impl Tri<String> {
    /// Borrow the concrete string, if any.
    pub fn as_str(&self) -> Option<&str> {
        self.as_ref().map(String::as_str)
    }
}

impl<T> From<T> for Tri<T> {
    fn from(value: T) -> Self {
        Tri::Value(value)
    }
}

impl From<&str> for Tri<String> {
    fn from(value: &str) -> Self {
        Tri::Value(value.to_string())
    }
}

impl<T: Serialize> Serialize for Tri<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Tri::Value(v) => v.serialize(serializer),
            Tri::Null => serializer.serialize_none(),
            Tri::Unknown => serializer.serialize_str(UNKNOWN_SENTINEL),
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Tri<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        if raw.is_null() {
            return Ok(Tri::Null);
        }
        if is_unknown(&raw) {
            return Ok(Tri::Unknown);
        }
        serde_json::from_value(raw)
            .map(Tri::Value)
            .map_err(D::Error::custom)
    }
}

/// An unordered collection compared by membership.
///
/// Equality is multiset equality; serialization always emits the elements in
/// a canonical order so requests and states are deterministic.
#[derive(Debug, Clone, Default)]
pub struct SetOf<T>(Vec<T>);

impl<T> SetOf<T> {
    /// An empty set.
    pub fn new() -> Self {
        SetOf(Vec::new())
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set has no elements.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the elements in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.0.iter()
    }
}

impl<T: PartialEq> SetOf<T> {
    /// Whether the set contains the element.
    pub fn contains(&self, item: &T) -> bool {
        self.0.contains(item)
    }
}

impl<T> From<Vec<T>> for SetOf<T> {
    fn from(items: Vec<T>) -> Self {
        SetOf(items)
    }
}

impl<T> FromIterator<T> for SetOf<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        SetOf(iter.into_iter().collect())
    }
}

impl<'a, T> IntoIterator for &'a SetOf<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<T: PartialEq> PartialEq for SetOf<T> {
    fn eq(&self, other: &Self) -> bool {
        multiset_eq(&self.0, &other.0, |a, b| a == b)
    }
}

impl<T: Eq> Eq for SetOf<T> {}

impl<T: Serialize> Serialize for SetOf<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut items = self
            .0
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(S::Error::custom)?;
        items.sort_by(canonical_cmp);
        items.serialize(serializer)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for SetOf<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<T>::deserialize(deserializer).map(SetOf)
    }
}

/// Multiset equality over two slices using the given element equality.
pub fn multiset_eq<T>(a: &[T], b: &[T], eq: impl Fn(&T, &T) -> bool) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut used = vec![false; b.len()];
    'outer: for item in a {
        for (i, candidate) in b.iter().enumerate() {
            if !used[i] && eq(item, candidate) {
                used[i] = true;
                continue 'outer;
            }
        }
        return false;
    }
    true
}

/// Total order over JSON values used to normalize set element order.
///
/// Null < bool < number < string < array < object; numbers compare
/// numerically, strings lexically, containers element-wise.
pub fn canonical_cmp(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => {
                let x = x.as_f64().unwrap_or_default();
                let y = y.as_f64().unwrap_or_default();
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            },
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y.iter())
            .map(|(x, y)| canonical_cmp(x, y))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (Value::Object(x), Value::Object(y)) => {
            // serde_json maps iterate in key order
            x.iter()
                .zip(y.iter())
                .map(|((kx, vx), (ky, vy))| kx.cmp(ky).then_with(|| canonical_cmp(vx, vy)))
                .find(|o| *o != Ordering::Equal)
                .unwrap_or_else(|| x.len().cmp(&y.len()))
        },
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct Sample {
        name: Tri<String>,
        count: Tri<i64>,
        tags: Tri<SetOf<String>>,
    }

    #[test]
    fn test_tri_state_predicates() {
        let v: Tri<i64> = Tri::value(3);
        assert!(v.has_value() && !v.is_null() && !v.is_unknown());
        assert_eq!(v.get(), Some(3));

        let n: Tri<i64> = Tri::null();
        assert!(n.is_null());
        assert_eq!(n.get(), None);

        let u: Tri<i64> = Tri::unknown();
        assert!(u.is_unknown());
        assert_eq!(u.get(), None);
    }

    #[test]
    fn test_null_unknown_and_values_are_distinct() {
        assert_ne!(Tri::<i64>::Null, Tri::Unknown);
        assert_ne!(Tri::<i64>::Null, Tri::Value(0));
        assert_ne!(Tri::<i64>::Unknown, Tri::Value(0));
        assert_ne!(
            Tri::<SetOf<String>>::Null,
            Tri::Value(SetOf::new()),
            "a null set is not an empty set"
        );
    }

    #[test]
    fn test_deserialize_missing_fields_as_null() {
        let sample: Sample = serde_json::from_value(json!({"name": "a"})).unwrap();
        assert_eq!(sample.name, Tri::value("a".to_string()));
        assert!(sample.count.is_null());
        assert!(sample.tags.is_null());
    }

    #[test]
    fn test_unknown_sentinel_roundtrip() {
        let sample: Sample =
            serde_json::from_value(json!({"count": UNKNOWN_SENTINEL, "tags": null})).unwrap();
        assert!(sample.count.is_unknown());

        let back = serde_json::to_value(&sample).unwrap();
        assert_eq!(back["count"], json!(UNKNOWN_SENTINEL));
        assert_eq!(back["name"], Value::Null);
        assert!(contains_unknown(&back));
    }

    #[test]
    fn test_set_equality_ignores_order() {
        let a: SetOf<String> = vec!["b".to_string(), "a".to_string()].into();
        let b: SetOf<String> = vec!["a".to_string(), "b".to_string()].into();
        assert_eq!(a, b);

        let c: SetOf<String> = vec!["a".to_string(), "a".to_string()].into();
        assert_ne!(a, c);
    }

    #[test]
    fn test_set_serializes_in_canonical_order() {
        let set: SetOf<i64> = vec![10, 2, 33].into();
        assert_eq!(serde_json::to_value(&set).unwrap(), json!([2, 10, 33]));

        let set: SetOf<String> = vec!["macOS".to_string(), "iOS".to_string()].into();
        assert_eq!(serde_json::to_value(&set).unwrap(), json!(["iOS", "macOS"]));
    }

    #[test]
    fn test_canonical_cmp_objects() {
        let a = json!({"name": "a", "value": "2"});
        let b = json!({"name": "b", "value": "1"});
        assert_eq!(canonical_cmp(&a, &b), Ordering::Less);
        assert_eq!(canonical_cmp(&b, &a), Ordering::Greater);
        assert_eq!(canonical_cmp(&a, &a), Ordering::Equal);
    }
}
