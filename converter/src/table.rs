// table.rs — Symbol table shared by all reading stages
//
// An insertion-ordered map from symbol name to `Value`. Several consumers
// depend on order (record binding takes keys by prefix in table order, the
// output map lists grids in table order), so re-binding a key keeps its
// original position.

use std::collections::HashMap;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::ConvertError;

/// A value read from one of the header files.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Raw text; numeric interpretation is left to the consumer.
    Scalar(String),
    StringList(Vec<String>),
    /// Declared by a record schema, not yet given a value.
    Unset,
}

impl Value {
    pub fn scalar(s: impl Into<String>) -> Self {
        Value::Scalar(s.into())
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Value::Unset)
    }

    fn shape(&self) -> &'static str {
        match self {
            Value::Scalar(_) => "scalar",
            Value::StringList(_) => "list",
            Value::Unset => "unset",
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct VariableTable {
    entries: Vec<(String, Value)>,
    index: HashMap<String, usize>,
}

impl VariableTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `key`, replacing any earlier value in place.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        match self.index.get(&key) {
            Some(&pos) => self.entries[pos].1 = value,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.index.get(key).map(|&pos| &self.entries[pos].1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Keys starting with `prefix`, in table order.
    pub fn keys_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .map(|(k, _)| k.as_str())
            .filter(move |k| k.starts_with(prefix))
    }

    /// Keys still waiting for a value.
    pub fn unset_keys(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|(_, v)| v.is_unset())
            .map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // ── Typed accessors used by the descriptor emitters ──

    /// The scalar text bound at `key`.
    ///
    /// Absent and `Unset` keys are `MissingField`; a list is `InvalidField`.
    pub fn scalar(&self, descriptor: &'static str, key: &str) -> Result<&str, ConvertError> {
        match self.get(key) {
            Some(Value::Scalar(s)) => Ok(s),
            Some(other @ Value::StringList(_)) => Err(wrong_shape(key, other, "scalar")),
            Some(Value::Unset) | None => Err(ConvertError::MissingField {
                descriptor,
                key: key.to_string(),
            }),
        }
    }

    pub fn string_list(
        &self,
        descriptor: &'static str,
        key: &str,
    ) -> Result<&[String], ConvertError> {
        match self.get(key) {
            Some(Value::StringList(items)) => Ok(items),
            Some(other @ Value::Scalar(_)) => Err(wrong_shape(key, other, "list")),
            Some(Value::Unset) | None => Err(ConvertError::MissingField {
                descriptor,
                key: key.to_string(),
            }),
        }
    }

    /// A scalar parsed as a non-negative integer.
    pub fn count(&self, descriptor: &'static str, key: &str) -> Result<usize, ConvertError> {
        let text = self.scalar(descriptor, key)?;
        text.trim().parse().map_err(|_| ConvertError::InvalidField {
            key: key.to_string(),
            value: text.to_string(),
            reason: "expected a non-negative integer".to_string(),
        })
    }
}

fn wrong_shape(key: &str, value: &Value, expected: &str) -> ConvertError {
    ConvertError::InvalidField {
        key: key.to_string(),
        value: format!("<{}>", value.shape()),
        reason: format!("expected a {}", expected),
    }
}

impl Serialize for VariableTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}
