//! Identifier indices: dense, first-seen integer codes for raw values.

use crate::error::{DataError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Bijection between the raw values of one field and `[0, len)`.
///
/// Codes are assigned in first-seen order starting at 0. Once built, an
/// index is only read; looking up a value it has never seen is an
/// [`DataError::UnknownValue`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdIndex {
    field: String,
    values: Vec<String>,
    codes: HashMap<String, u32>,
}

impl IdIndex {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            values: Vec::new(),
            codes: HashMap::new(),
        }
    }

    /// Builds an index over `values`, keeping the first occurrence of each.
    pub fn from_values<'a, I>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut index = Self::new(field);
        for value in values {
            index.insert(value);
        }
        index
    }

    /// Returns the code of `value`, assigning the next one if it is new.
    pub fn insert(&mut self, value: &str) -> u32 {
        if let Some(&code) = self.codes.get(value) {
            return code;
        }
        let code = self.values.len() as u32;
        self.values.push(value.to_string());
        self.codes.insert(value.to_string(), code);
        code
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn get(&self, value: &str) -> Option<u32> {
        self.codes.get(value).copied()
    }

    pub fn encode(&self, value: &str) -> Result<u32> {
        self.get(value).ok_or_else(|| DataError::UnknownValue {
            field: self.field.clone(),
            value: value.to_string(),
        })
    }

    pub fn decode(&self, code: u32) -> Option<&str> {
        self.values.get(code as usize).map(String::as_str)
    }

    /// Number of distinct values, which is the field's cardinality.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_seen_order() {
        let index = IdIndex::from_values("isbn", ["b", "a", "b", "c", "a"]);
        assert_eq!(index.len(), 3);
        assert_eq!(index.get("b"), Some(0));
        assert_eq!(index.get("a"), Some(1));
        assert_eq!(index.get("c"), Some(2));
    }

    #[test]
    fn test_round_trip() {
        let raw = ["u9", "u3", "u9", "u1", "u7", "u3"];
        let index = IdIndex::from_values("user_id", raw);
        for v in raw {
            let code = index.encode(v).unwrap();
            assert_eq!(index.decode(code), Some(v));
        }
        for code in 0..index.len() as u32 {
            let v = index.decode(code).unwrap();
            assert_eq!(index.encode(v).unwrap(), code);
        }
    }

    #[test]
    fn test_unknown_value() {
        let index = IdIndex::from_values("publisher", ["x"]);
        let err = index.encode("y").unwrap_err();
        assert!(matches!(
            err,
            DataError::UnknownValue { ref field, ref value } if field == "publisher" && value == "y"
        ));
        assert_eq!(index.decode(5), None);
    }
}
