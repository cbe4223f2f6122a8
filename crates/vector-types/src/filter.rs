//! Payload filters.
//!
//! The shape follows the store's boolean filter JSON so a `Filter` can be sent
//! over the wire as-is. `Filter::matches` evaluates the same semantics locally.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::point::Payload;

/// Boolean combination of field conditions.
///
/// A payload passes when every `must` condition holds, no `must_not`
/// condition holds, and at least one `should` condition holds (if any are given).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub must: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub should: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub must_not: Vec<Condition>,
}

impl Filter {
    pub fn must(conditions: impl IntoIterator<Item = Condition>) -> Self {
        Self {
            must: conditions.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn should(conditions: impl IntoIterator<Item = Condition>) -> Self {
        Self {
            should: conditions.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn must_not(conditions: impl IntoIterator<Item = Condition>) -> Self {
        Self {
            must_not: conditions.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.must.is_empty() && self.should.is_empty() && self.must_not.is_empty()
    }

    pub fn matches(&self, payload: &Payload) -> bool {
        self.must.iter().all(|c| c.matches(payload))
            && !self.must_not.iter().any(|c| c.matches(payload))
            && (self.should.is_empty() || self.should.iter().any(|c| c.matches(payload)))
    }
}

/// A predicate on one payload field. Nested fields use dotted keys (`a.b`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub key: String,
    #[serde(flatten)]
    pub predicate: Predicate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    Match(MatchValue),
    Range(Range),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchValue {
    pub value: Value,
}

/// Numeric bounds; unset bounds are open.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Range {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gt: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gte: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lt: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lte: Option<f64>,
}

impl Range {
    fn contains(&self, x: f64) -> bool {
        self.gt.map_or(true, |b| x > b)
            && self.gte.map_or(true, |b| x >= b)
            && self.lt.map_or(true, |b| x < b)
            && self.lte.map_or(true, |b| x <= b)
    }
}

impl Condition {
    /// Exact match on a keyword, integer or boolean field.
    pub fn matches_value(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            predicate: Predicate::Match(MatchValue {
                value: value.into(),
            }),
        }
    }

    pub fn range(key: impl Into<String>, range: Range) -> Self {
        Self {
            key: key.into(),
            predicate: Predicate::Range(range),
        }
    }

    /// Evaluate against a payload. Array fields match when any element does.
    pub fn matches(&self, payload: &Payload) -> bool {
        let Some(field) = lookup(payload, &self.key) else {
            return false;
        };
        let candidates: Vec<&Value> = match field {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        };
        candidates.into_iter().any(|v| match &self.predicate {
            Predicate::Match(m) => *v == m.value,
            Predicate::Range(r) => v.as_f64().is_some_and(|x| r.contains(x)),
        })
    }
}

fn lookup<'a>(payload: &'a Payload, key: &str) -> Option<&'a Value> {
    let mut parts = key.split('.');
    let mut current = payload.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Payload {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_match_condition() {
        let filter = Filter::must([Condition::matches_value("city", "London")]);
        assert!(filter.matches(&payload(json!({"city": "London"}))));
        assert!(!filter.matches(&payload(json!({"city": "Berlin"}))));
        assert!(!filter.matches(&payload(json!({}))));
    }

    #[test]
    fn test_match_any_array_element() {
        let filter = Filter::must([Condition::matches_value("group", 3)]);
        assert!(filter.matches(&payload(json!({"group": [1, 3, 5]}))));
        assert!(!filter.matches(&payload(json!({"group": [2, 4]}))));
    }

    #[test]
    fn test_range_condition() {
        let range = Range {
            gte: Some(10.0),
            lt: Some(20.0),
            ..Default::default()
        };
        let filter = Filter::must([Condition::range("price", range)]);
        assert!(filter.matches(&payload(json!({"price": 10}))));
        assert!(filter.matches(&payload(json!({"price": 19.5}))));
        assert!(!filter.matches(&payload(json!({"price": 20}))));
        assert!(!filter.matches(&payload(json!({"price": "cheap"}))));
    }

    #[test]
    fn test_should_and_must_not() {
        let mut filter = Filter::should([
            Condition::matches_value("city", "London"),
            Condition::matches_value("city", "Paris"),
        ]);
        filter.must_not.push(Condition::matches_value("closed", true));

        assert!(filter.matches(&payload(json!({"city": "Paris"}))));
        assert!(!filter.matches(&payload(json!({"city": "Rome"}))));
        assert!(!filter.matches(&payload(json!({"city": "London", "closed": true}))));
    }

    #[test]
    fn test_nested_key() {
        let filter = Filter::must([Condition::matches_value("store.country", "UK")]);
        assert!(filter.matches(&payload(json!({"store": {"country": "UK"}}))));
        assert!(!filter.matches(&payload(json!({"store": "UK"}))));
    }

    #[test]
    fn test_wire_shape() {
        let filter = Filter::must([Condition::matches_value("city", "London")]);
        let value = serde_json::to_value(&filter).unwrap();
        assert_eq!(
            value,
            json!({"must": [{"key": "city", "match": {"value": "London"}}]})
        );

        let parsed: Filter = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, filter);
    }
}
