//! Documents exchanged with the remote store.

use std::collections::BTreeMap;

/// Name of the unique document id field. Adding a document whose id already
/// exists replaces the stored one.
pub const ID_FIELD: &str = "id";

/// A stored field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Binary(Vec<u8>),
    Float(f64),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            FieldValue::Binary(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            FieldValue::Float(value) => Some(*value),
            _ => None,
        }
    }

    /// Empty text or bytes count as an absent value.
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Text(text) => text.is_empty(),
            FieldValue::Binary(bytes) => bytes.is_empty(),
            FieldValue::Float(_) => false,
        }
    }
}

/// A flat field-name to value map with a mandatory id.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    fields: BTreeMap<String, FieldValue>,
}

impl Document {
    pub fn new(id: impl Into<String>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(ID_FIELD.to_string(), FieldValue::Text(id.into()));
        Self { fields }
    }

    /// Builder-style field insertion.
    pub fn with(mut self, field: impl Into<String>, value: FieldValue) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: FieldValue) {
        self.fields.insert(field.into(), value);
    }

    pub fn id(&self) -> Option<&str> {
        self.text(ID_FIELD)
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(FieldValue::as_text)
    }

    pub fn binary(&self, field: &str) -> Option<&[u8]> {
        self.get(field).and_then(FieldValue::as_binary)
    }

    pub fn float(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(FieldValue::as_float)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_accessors() {
        let doc = Document::new("s-1")
            .with("uid", FieldValue::Text("1".to_string()))
            .with("blob", FieldValue::Binary(vec![1, 2]))
            .with("ts", FieldValue::Float(12.5));

        assert_eq!(doc.id(), Some("s-1"));
        assert_eq!(doc.text("uid"), Some("1"));
        assert_eq!(doc.binary("blob"), Some(&[1u8, 2][..]));
        assert_eq!(doc.float("ts"), Some(12.5));
        assert_eq!(doc.text("blob"), None);
        assert_eq!(doc.fields().count(), 4);
    }

    #[test]
    fn test_empty_values() {
        assert!(FieldValue::Text(String::new()).is_empty());
        assert!(FieldValue::Binary(vec![]).is_empty());
        assert!(!FieldValue::Float(0.0).is_empty());
    }
}
