//! Release targeting predicates and matching logic
//!
//! A strategy is an OR-of-AND tree of label clauses plus optional
//! namespace/cluster scoping:
//! - `labelsOr`: at least one clause must be fully satisfied (if any exist)
//! - `labelsAnd`: every clause must be satisfied
//! - `namespace` / `clusterId`: must equal the instance's scoping labels
//!
//! The empty predicate matches every instance. Parsing rejects malformed
//! trees so that matching itself never fails.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use bscp_common::{BscpError, BscpResult, CLUSTER_LABEL, EMPTY_STRATEGY, NAMESPACE_LABEL};

/// A conjunction of `label == value` requirements.
pub type Clause = BTreeMap<String, String>;

/// Anything that can decide whether an instance's labels are targeted.
pub trait LabelMatcher: Send + Sync {
    fn matches(&self, labels: &HashMap<String, String>) -> bool;
}

/// Typed targeting predicate stored on strategies and releases.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Predicate {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels_or: Vec<Clause>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels_and: Vec<Clause>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<String>,
}

impl Predicate {
    /// The match-all predicate.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.labels_or.is_empty()
            && self.labels_and.is_empty()
            && self.namespace.is_none()
            && self.cluster_id.is_none()
    }

    /// Parse a caller-supplied clause tree.
    ///
    /// `null`, `""` and `{}` all normalize to the empty predicate. Anything
    /// other than an object of string-to-string clauses is `InvalidInput`.
    pub fn parse(value: &serde_json::Value) -> BscpResult<Self> {
        match value {
            serde_json::Value::Null => Ok(Self::empty()),
            serde_json::Value::String(s) if s.trim().is_empty() => Ok(Self::empty()),
            serde_json::Value::String(s) => Self::parse_str(s),
            serde_json::Value::Object(_) => {
                let predicate: Predicate = serde_json::from_value(value.clone())
                    .map_err(|e| BscpError::InvalidInput(format!("invalid strategy: {}", e)))?;
                predicate.check()?;
                Ok(predicate.normalized())
            }
            other => Err(BscpError::InvalidInput(format!(
                "invalid strategy: expected an object, found {}",
                json_type(other)
            ))),
        }
    }

    /// Parse the stored (serialized) form.
    pub fn parse_str(stored: &str) -> BscpResult<Self> {
        let trimmed = stored.trim();
        if trimmed.is_empty() || trimmed == EMPTY_STRATEGY {
            return Ok(Self::empty());
        }
        let value: serde_json::Value = serde_json::from_str(trimmed)
            .map_err(|e| BscpError::InvalidInput(format!("invalid strategy: {}", e)))?;
        if value.is_string() {
            return Err(BscpError::InvalidInput(
                "invalid strategy: nested string encoding".to_string(),
            ));
        }
        Self::parse(&value)
    }

    /// Serialized form; the empty predicate is always `{}`.
    pub fn to_stored(&self) -> String {
        if self.is_empty() {
            return EMPTY_STRATEGY.to_string();
        }
        serde_json::to_string(self).unwrap_or_else(|_| EMPTY_STRATEGY.to_string())
    }

    fn check(&self) -> BscpResult<()> {
        let keys = self
            .labels_or
            .iter()
            .chain(self.labels_and.iter())
            .flat_map(|clause| clause.keys());
        for key in keys {
            if key.trim().is_empty() {
                return Err(BscpError::InvalidInput(
                    "invalid strategy: empty label key".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn normalized(mut self) -> Self {
        self.namespace = self.namespace.filter(|ns| !ns.is_empty());
        self.cluster_id = self.cluster_id.filter(|c| !c.is_empty());
        self
    }
}

/// Every pair of the clause is present and equal in `labels`.
fn clause_satisfied(clause: &Clause, labels: &HashMap<String, String>) -> bool {
    clause
        .iter()
        .all(|(key, value)| labels.get(key).is_some_and(|v| v == value))
}

impl LabelMatcher for Predicate {
    fn matches(&self, labels: &HashMap<String, String>) -> bool {
        if self.is_empty() {
            return true;
        }
        if let Some(namespace) = &self.namespace
            && labels.get(NAMESPACE_LABEL) != Some(namespace)
        {
            return false;
        }
        if let Some(cluster) = &self.cluster_id
            && labels.get(CLUSTER_LABEL) != Some(cluster)
        {
            return false;
        }

        let any_or = self.labels_or.is_empty()
            || self
                .labels_or
                .iter()
                .any(|clause| clause_satisfied(clause, labels));
        let all_and = self
            .labels_and
            .iter()
            .all(|clause| clause_satisfied(clause, labels));

        any_or && all_and
    }
}

fn json_type(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn labels(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_empty_predicate_matches_everything() {
        let predicate = Predicate::parse(&json!({})).unwrap();
        assert!(predicate.is_empty());
        assert!(predicate.matches(&HashMap::new()));
        assert!(predicate.matches(&labels(&[("zone", "sz")])));
        assert_eq!(predicate.to_stored(), "{}");

        assert!(Predicate::parse_str("").unwrap().is_empty());
        assert!(Predicate::parse(&json!(null)).unwrap().is_empty());
    }

    #[test]
    fn test_labels_or_needs_one_full_clause() {
        let predicate = Predicate::parse(&json!({
            "labelsOr": [{"zone": "gz", "set": "1"}, {"zone": "sh"}]
        }))
        .unwrap();

        assert!(predicate.matches(&labels(&[("zone", "gz"), ("set", "1")])));
        assert!(predicate.matches(&labels(&[("zone", "sh")])));
        assert!(!predicate.matches(&labels(&[("zone", "gz")])));
        assert!(!predicate.matches(&HashMap::new()));
    }

    #[test]
    fn test_labels_and_needs_every_clause() {
        let predicate = Predicate::parse(&json!({
            "labelsOr": [{"zone": "gz"}],
            "labelsAnd": [{"env": "prod"}, {"tier": "web"}]
        }))
        .unwrap();

        assert!(predicate.matches(&labels(&[("zone", "gz"), ("env", "prod"), ("tier", "web")])));
        assert!(!predicate.matches(&labels(&[("zone", "gz"), ("env", "prod")])));
        assert!(!predicate.matches(&labels(&[("env", "prod"), ("tier", "web")])));
    }

    #[test]
    fn test_namespace_scoping() {
        let predicate = Predicate::parse(&json!({"namespace": "blue"})).unwrap();

        assert!(predicate.matches(&labels(&[("namespace", "blue")])));
        assert!(!predicate.matches(&labels(&[("namespace", "green")])));
        assert!(!predicate.matches(&HashMap::new()));
    }

    #[test]
    fn test_empty_scoping_is_normalized_away() {
        let predicate = Predicate::parse(&json!({"namespace": "", "clusterId": ""})).unwrap();
        assert!(predicate.is_empty());
    }

    #[test]
    fn test_rejects_non_string_values() {
        let err = Predicate::parse(&json!({"labelsOr": [{"replicas": 3}]})).unwrap_err();
        assert_eq!(err.kind(), bscp_common::ErrorKind::InvalidInput);

        assert!(Predicate::parse(&json!({"labelsAnd": ["zone"]})).is_err());
        assert!(Predicate::parse(&json!([1, 2])).is_err());
        assert!(Predicate::parse(&json!({"labelsOr": [{"": "x"}]})).is_err());
        assert!(Predicate::parse(&json!({"unknown": []})).is_err());
    }

    #[test]
    fn test_stored_round_trip_keeps_meaning() {
        let predicate = Predicate::parse(&json!({"labelsOr": [{"zone": "gz"}]})).unwrap();
        let stored = predicate.to_stored();
        assert_eq!(Predicate::parse_str(&stored).unwrap(), predicate);
    }

    fn arb_labels() -> impl Strategy<Value = HashMap<String, String>> {
        proptest::collection::hash_map("[a-c]", "[x-z]", 0..4)
    }

    fn arb_clause() -> impl Strategy<Value = Clause> {
        proptest::collection::btree_map("[a-c]", "[x-z]", 0..3)
    }

    fn arb_predicate() -> impl Strategy<Value = Predicate> {
        (
            proptest::collection::vec(arb_clause(), 0..3),
            proptest::collection::vec(arb_clause(), 0..3),
        )
            .prop_map(|(labels_or, labels_and)| Predicate {
                labels_or,
                labels_and,
                ..Default::default()
            })
    }

    proptest! {
        #[test]
        fn prop_adding_labels_never_unmatches(
            predicate in arb_predicate(),
            base in arb_labels(),
            value in "[x-z]",
        ) {
            let mut extended = base.clone();
            extended.entry("d".to_string()).or_insert(value);

            if predicate.matches(&base) {
                prop_assert!(predicate.matches(&extended));
            }
        }

        #[test]
        fn prop_empty_matches_any_labels(base in arb_labels()) {
            prop_assert!(Predicate::empty().matches(&base));
        }
    }
}
