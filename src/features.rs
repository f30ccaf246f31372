//! Feature vectors handed over by the feature-extraction component.
//!
//! A feature vector maps feature names to nullable numbers. Only an absent
//! or null entry counts as missing: zero is an ordinary value.

use crate::error::InputError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Nullable numeric features for one entity at one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, Value>", into = "BTreeMap<String, Option<f64>>")]
pub struct FeatureVector {
    values: BTreeMap<String, Option<f64>>,
}

impl FeatureVector {
    /// Creates an empty feature vector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a vector from `(name, value)` pairs, rejecting non-finite values.
    pub fn from_pairs<I, K>(pairs: I) -> Result<Self, InputError>
    where
        I: IntoIterator<Item = (K, Option<f64>)>,
        K: Into<String>,
    {
        let mut vector = Self::new();
        for (name, value) in pairs {
            match value {
                Some(v) => vector.set(name, v)?,
                None => vector.set_missing(name),
            }
        }
        Ok(vector)
    }

    /// Parses a JSON object of `name -> number | null`.
    ///
    /// Any other value kind is a contract violation and fails fast.
    pub fn from_json(value: &Value) -> Result<Self, InputError> {
        match value {
            Value::Object(map) => Self::try_from(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect::<BTreeMap<_, _>>(),
            ),
            other => Err(InputError::MalformedBatch(format!(
                "features must be an object, got {}",
                json_kind(other)
            ))),
        }
    }

    /// Sets a present value.
    pub fn set(&mut self, name: impl Into<String>, value: f64) -> Result<(), InputError> {
        let name = name.into();
        if !value.is_finite() {
            return Err(InputError::NonFiniteFeature { name, value });
        }
        self.values.insert(name, Some(value));
        Ok(())
    }

    /// Records a feature as known but missing (null).
    pub fn set_missing(&mut self, name: impl Into<String>) {
        self.values.insert(name.into(), None);
    }

    /// Returns the value if present and non-null.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied().flatten()
    }

    /// True if the feature has a non-null value (zero counts as available).
    pub fn is_available(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Number of entries, null ones included.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<f64>)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl TryFrom<BTreeMap<String, Value>> for FeatureVector {
    type Error = InputError;

    fn try_from(map: BTreeMap<String, Value>) -> Result<Self, Self::Error> {
        let mut values = BTreeMap::new();
        for (name, value) in map {
            let parsed = match value {
                Value::Null => None,
                Value::Number(n) => match n.as_f64() {
                    Some(v) if v.is_finite() => Some(v),
                    _ => {
                        return Err(InputError::NonNumericFeature {
                            name,
                            kind: "out-of-range number",
                        })
                    }
                },
                other => {
                    return Err(InputError::NonNumericFeature {
                        name,
                        kind: json_kind(&other),
                    })
                }
            };
            values.insert(name, parsed);
        }
        Ok(Self { values })
    }
}

impl From<FeatureVector> for BTreeMap<String, Option<f64>> {
    fn from(vector: FeatureVector) -> Self {
        vector.values
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_zero_is_available() {
        let fv = FeatureVector::from_pairs([("major_deviations", Some(0.0))]).unwrap();
        assert!(fv.is_available("major_deviations"));
        assert_eq!(fv.get("major_deviations"), Some(0.0));
    }

    #[test]
    fn test_null_and_absent_are_missing() {
        let fv = FeatureVector::from_json(&json!({ "a": null, "b": 3 })).unwrap();
        assert!(!fv.is_available("a"));
        assert!(!fv.is_available("c"));
        assert_eq!(fv.get("b"), Some(3.0));
        assert_eq!(fv.len(), 2);
    }

    #[test]
    fn test_wrong_kind_fails_fast() {
        let err = FeatureVector::from_json(&json!({ "sae_overdue_days": "three" })).unwrap_err();
        assert_eq!(
            err,
            InputError::NonNumericFeature {
                name: "sae_overdue_days".to_string(),
                kind: "string",
            }
        );

        let err = FeatureVector::from_json(&json!([1, 2])).unwrap_err();
        assert!(matches!(err, InputError::MalformedBatch(_)));
    }

    #[test]
    fn test_non_finite_rejected() {
        let mut fv = FeatureVector::new();
        assert!(fv.set("x", f64::NAN).is_err());
        assert!(fv.set("x", f64::INFINITY).is_err());
        assert!(fv.is_empty());
    }

    #[test]
    fn test_serde_round_trip_rejects_bool() {
        let parsed: Result<FeatureVector, _> = serde_json::from_str(r#"{"x": true}"#);
        assert!(parsed.is_err());

        let parsed: FeatureVector = serde_json::from_str(r#"{"x": 1.5, "y": null}"#).unwrap();
        assert_eq!(parsed.get("x"), Some(1.5));
        assert_eq!(serde_json::to_string(&parsed).unwrap(), r#"{"x":1.5,"y":null}"#);
    }
}
