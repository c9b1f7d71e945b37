//! Records, string-keyed collections of values.
use crate::error::KestrelError;
use std::collections::{
    hash_map::{IntoIter, Iter},
    HashMap,
};

/// Represents possible types of values in a [`Record`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    /// A single floating-point value, typically a metric.
    Scalar(f32),

    /// A text value.
    String(String),
}

/// A container of key-value pairs.
#[derive(Debug, Default, Clone)]
pub struct Record(HashMap<String, RecordValue>);

impl Record {
    /// Creates an empty record.
    pub fn empty() -> Self {
        Self(HashMap::new())
    }

    /// Creates a record containing a single scalar value.
    pub fn from_scalar(name: impl Into<String>, value: f32) -> Self {
        Self(HashMap::from([(name.into(), RecordValue::Scalar(value))]))
    }

    /// Creates a record from a slice of key-value pairs.
    pub fn from_slice<K: Into<String> + Clone>(s: &[(K, RecordValue)]) -> Self {
        Self(
            s.iter()
                .map(|(k, v)| (k.clone().into(), v.clone()))
                .collect(),
        )
    }

    /// Inserts a key-value pair.
    pub fn insert(&mut self, k: impl Into<String>, v: RecordValue) {
        self.0.insert(k.into(), v);
    }

    /// Returns an iterator over the key-value pairs.
    pub fn iter(&self) -> Iter<'_, String, RecordValue> {
        self.0.iter()
    }

    /// Returns an iterator that consumes the record.
    pub fn into_iter_in_record(self) -> IntoIter<String, RecordValue> {
        self.0.into_iter()
    }

    /// Gets a reference to the value of the given key.
    pub fn get(&self, k: &str) -> Option<&RecordValue> {
        self.0.get(k)
    }

    /// Merges two records. Values of `record` win on duplicate keys.
    pub fn merge(self, record: Record) -> Self {
        Record(self.0.into_iter().chain(record.0).collect())
    }

    /// Gets a scalar value.
    pub fn get_scalar(&self, k: &str) -> Result<f32, KestrelError> {
        match self.0.get(k) {
            Some(RecordValue::Scalar(v)) => Ok(*v),
            Some(_) => Err(KestrelError::RecordValueTypeError("Scalar".to_string())),
            None => Err(KestrelError::RecordKeyError(k.to_string())),
        }
    }

    /// Gets a string value.
    pub fn get_string(&self, k: &str) -> Result<String, KestrelError> {
        match self.0.get(k) {
            Some(RecordValue::String(s)) => Ok(s.clone()),
            Some(_) => Err(KestrelError::RecordValueTypeError("String".to_string())),
            None => Err(KestrelError::RecordKeyError(k.to_string())),
        }
    }

    /// Returns `true` if the record has no entry.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_and_typed_access() {
        let a = Record::from_scalar("loss", 1.0);
        let b = Record::from_slice(&[
            ("loss", RecordValue::Scalar(2.0)),
            ("tag", RecordValue::String("dqn".into())),
        ]);
        let r = a.merge(b);
        assert_eq!(r.get_scalar("loss"), Ok(2.0));
        assert_eq!(r.get_string("tag"), Ok("dqn".to_string()));
        assert_eq!(
            r.get_scalar("tag"),
            Err(KestrelError::RecordValueTypeError("Scalar".to_string()))
        );
        assert_eq!(
            r.get_scalar("missing"),
            Err(KestrelError::RecordKeyError("missing".to_string()))
        );
    }
}
