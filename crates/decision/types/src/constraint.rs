use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Key of the constraint synthesized when a request declares none.
pub const ABSENCE_KEY: &str = "absence";
/// Value of the synthesized absence constraint.
pub const ABSENCE_VALUE: &str = "true";

/// A declared key/value condition under which a decision is made.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    key: String,
    value: String,
    declared_at: DateTime<Utc>,
}

impl Constraint {
    pub fn new(
        key: impl Into<String>,
        value: impl Into<String>,
        declared_at: DateTime<Utc>,
    ) -> Result<Self, TypeError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(TypeError::EmptyConstraintKey);
        }

        Ok(Self {
            key,
            value: value.into(),
            declared_at,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn declared_at(&self) -> DateTime<Utc> {
        self.declared_at
    }
}

/// The bundle of constraints attached to exactly one decision request.
///
/// A set may be empty while it travels with a request; the decision engine
/// replaces an empty set with [`ConstraintSet::absence`] before commit, so a
/// committed set is never empty. Ordering is by key, which keeps hashing
/// deterministic.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct ConstraintSet {
    constraints: BTreeMap<String, Constraint>,
}

impl ConstraintSet {
    /// An explicitly empty set. Present as a value, never a missing parameter.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a set from already-validated constraints, rejecting duplicate keys.
    pub fn from_constraints(
        constraints: impl IntoIterator<Item = Constraint>,
    ) -> Result<Self, TypeError> {
        let mut map = BTreeMap::new();
        for constraint in constraints {
            if map.contains_key(&constraint.key) {
                return Err(TypeError::DuplicateConstraint(constraint.key));
            }
            map.insert(constraint.key.clone(), constraint);
        }
        Ok(Self { constraints: map })
    }

    /// Build a set from a transport-level `key -> value` mapping, stamping every
    /// constraint with the same declaration time.
    pub fn declare<K, V>(
        pairs: impl IntoIterator<Item = (K, V)>,
        declared_at: DateTime<Utc>,
    ) -> Result<Self, TypeError>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let constraints = pairs
            .into_iter()
            .map(|(key, value)| Constraint::new(key, value, declared_at))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_constraints(constraints)
    }

    /// The synthesized set recording that no constraints were declared.
    pub fn absence(declared_at: DateTime<Utc>) -> Self {
        let constraint = Constraint {
            key: ABSENCE_KEY.to_string(),
            value: ABSENCE_VALUE.to_string(),
            declared_at,
        };
        let mut constraints = BTreeMap::new();
        constraints.insert(constraint.key.clone(), constraint);
        Self { constraints }
    }

    /// Whether this set is exactly the synthesized absence record.
    pub fn is_absence(&self) -> bool {
        self.constraints.len() == 1
            && self
                .constraints
                .get(ABSENCE_KEY)
                .is_some_and(|c| c.value == ABSENCE_VALUE)
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn get(&self, key: &str) -> Option<&Constraint> {
        self.constraints.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.constraints.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_is_rejected() {
        let error = Constraint::new("  ", "x", Utc::now()).unwrap_err();
        assert_eq!(error, TypeError::EmptyConstraintKey);
    }

    #[test]
    fn declare_orders_keys_and_stamps_time() {
        let at = Utc::now();
        let set = ConstraintSet::declare([("region", "eu"), ("budget", "100")], at).unwrap();

        assert_eq!(set.keys().collect::<Vec<_>>(), vec!["budget", "region"]);
        assert!(set.iter().all(|c| c.declared_at() == at));
        assert!(!set.is_absence());
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let at = Utc::now();
        let error = ConstraintSet::from_constraints([
            Constraint::new("k", "1", at).unwrap(),
            Constraint::new("k", "2", at).unwrap(),
        ])
        .unwrap_err();
        assert_eq!(error, TypeError::DuplicateConstraint("k".into()));
    }

    #[test]
    fn absence_set_is_a_single_explicit_constraint() {
        let set = ConstraintSet::absence(Utc::now());
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(ABSENCE_KEY).map(Constraint::value), Some("true"));
        assert!(set.is_absence());
    }

    #[test]
    fn declared_absence_key_with_other_value_is_not_synthesized_absence() {
        let set = ConstraintSet::declare([(ABSENCE_KEY, "false")], Utc::now()).unwrap();
        assert!(!set.is_absence());
    }
}
