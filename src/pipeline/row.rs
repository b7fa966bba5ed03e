//! Dynamic row/value model for pipeline stages.
//!
//! Stages operate on field names, so rows are small ordered maps rather than
//! fixed structs. Values are deliberately minimal: text, finite-or-not
//! numbers, and null. Missing fields read as null, which lets predicates and
//! expressions absorb per-record anomalies instead of erroring.

use std::collections::BTreeMap;

/// A single cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Num(f64),
    Null,
}

impl Value {
    pub fn str(s: impl Into<String>) -> Value {
        Value::Str(s.into())
    }

    /// The value as a finite number, if it is one.
    pub fn as_num(&self) -> Option<f64> {
        match self {
            Value::Num(v) if v.is_finite() => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Hashable grouping key for this value.
    ///
    /// Numbers key on their bit pattern so grouping is deterministic without
    /// requiring `Eq` on `f64`.
    pub fn key_atom(&self) -> KeyAtom {
        match self {
            Value::Str(s) => KeyAtom::Str(s.clone()),
            Value::Num(v) => KeyAtom::Bits(v.to_bits()),
            Value::Null => KeyAtom::Null,
        }
    }
}

/// One component of a group-key tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyAtom {
    Str(String),
    Bits(u64),
    Null,
}

const NULL: Value = Value::Null;

/// A pipeline row: an ordered map from field name to value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    fields: BTreeMap<String, Value>,
}

impl Row {
    pub fn new() -> Row {
        Row::default()
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.fields.insert(field.into(), value);
    }

    /// The value of `field`, or null if the row does not carry it.
    pub fn get(&self, field: &str) -> &Value {
        self.fields.get(field).unwrap_or(&NULL)
    }

    pub fn num(&self, field: &str) -> Option<f64> {
        self.get(field).as_num()
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        self.get(field).as_text()
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    pub fn group_key(&self, fields: &[String]) -> Vec<KeyAtom> {
        fields.iter().map(|f| self.get(f).key_atom()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_field_reads_as_null() {
        let row = Row::new();
        assert!(row.get("absent").is_null());
        assert_eq!(row.num("absent"), None);
    }

    #[test]
    fn non_finite_numbers_are_not_numbers() {
        let mut row = Row::new();
        row.set("x", Value::Num(f64::NAN));
        assert_eq!(row.num("x"), None);
    }

    #[test]
    fn group_keys_distinguish_text_and_numbers() {
        let mut a = Row::new();
        a.set("k", Value::str("1"));
        let mut b = Row::new();
        b.set("k", Value::Num(1.0));
        let fields = vec!["k".to_string()];
        assert_ne!(a.group_key(&fields), b.group_key(&fields));
    }
}
