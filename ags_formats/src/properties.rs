use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Declared type of a custom property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    Boolean,
    Integer,
    String,
}

impl PropertyType {
    /// Booleans and integers share the numeric accessors.
    pub fn is_text(self) -> bool {
        matches!(self, PropertyType::String)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDesc {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: PropertyType,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub default_value: String,
}

impl PropertyDesc {
    pub fn new(
        name: impl Into<String>,
        ty: PropertyType,
        default_value: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            ty,
            description: String::new(),
            default_value: default_value.into(),
        }
    }
}

/// Game-wide property declarations, looked up without regard to case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<PropertyDesc>", into = "Vec<PropertyDesc>")]
pub struct PropertySchema {
    entries: BTreeMap<String, PropertyDesc>,
}

impl PropertySchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, desc: PropertyDesc) -> Option<PropertyDesc> {
        self.entries.insert(desc.name.to_ascii_lowercase(), desc)
    }

    pub fn find(&self, name: &str) -> Option<&PropertyDesc> {
        self.entries.get(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertyDesc> {
        self.entries.values()
    }
}

impl From<Vec<PropertyDesc>> for PropertySchema {
    fn from(descs: Vec<PropertyDesc>) -> Self {
        let mut schema = PropertySchema::new();
        for desc in descs {
            schema.insert(desc);
        }
        schema
    }
}

impl From<PropertySchema> for Vec<PropertyDesc> {
    fn from(schema: PropertySchema) -> Self {
        schema.entries.into_values().collect()
    }
}

/// String map with case-insensitive keys. The first spelling written for a
/// key is the one kept for display and serialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct StringIMap {
    entries: BTreeMap<String, (String, String)>,
}

impl StringIMap {
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(&key.to_ascii_lowercase())
            .map(|(_, value)| value.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(&key.to_ascii_lowercase())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let key = key.into();
        let value = value.into();
        match self.entries.get_mut(&key.to_ascii_lowercase()) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.entries.insert(key.to_ascii_lowercase(), (key, value));
                None
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries
            .remove(&key.to_ascii_lowercase())
            .map(|(_, value)| value)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .values()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

impl From<BTreeMap<String, String>> for StringIMap {
    fn from(map: BTreeMap<String, String>) -> Self {
        let mut out = StringIMap::new();
        for (key, value) in map {
            out.insert(key, value);
        }
        out
    }
}

impl From<StringIMap> for BTreeMap<String, String> {
    fn from(map: StringIMap) -> Self {
        map.entries.into_values().collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for StringIMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut out = StringIMap::new();
        for (key, value) in iter {
            out.insert(key, value);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn imap_keeps_first_spelling() {
        let mut map = StringIMap::new();
        map.insert("Weight", "3");
        assert_eq!(map.insert("WEIGHT", "4"), Some("3".to_string()));
        assert_eq!(map.get("weight"), Some("4"));
        assert_eq!(map.iter().collect::<Vec<_>>(), vec![("Weight", "4")]);
    }

    #[test]
    fn schema_deserializes_from_list() {
        let json = r#"[{"name":"Locked","type":"boolean","default_value":"0"},
                       {"name":"Label","type":"string"}]"#;
        let schema: PropertySchema = serde_json::from_str(json).unwrap();
        assert_eq!(schema.len(), 2);
        assert_eq!(schema.find("LOCKED").map(|d| d.ty), Some(PropertyType::Boolean));
        assert_eq!(schema.find("label").map(|d| d.default_value.as_str()), Some(""));
    }
}
