//! Safe accessors over a resource's property bag
//!
//! A [`PropertyReader`] owns a property map and hands out typed values by
//! removing keys. Whatever is left unread ends up in the "extra" bag of the
//! decoded resource. Every failure names the resource and the property path.

use sam_translator_common::{Map, Result, TransformError, Value};

/// Consuming reader over a property map
#[derive(Debug, Clone)]
pub struct PropertyReader {
    logical_id: String,
    prefix: String,
    properties: Map,
}

impl PropertyReader {
    pub fn new(logical_id: &str, properties: Map) -> Self {
        Self {
            logical_id: logical_id.to_string(),
            prefix: String::new(),
            properties,
        }
    }

    /// Reader over a nested map, reporting paths relative to this reader
    pub fn nested(&self, path: &str, properties: Map) -> Self {
        Self {
            logical_id: self.logical_id.clone(),
            prefix: format!("{}.", self.path(path)),
            properties,
        }
    }

    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    /// Full property path for a key of this reader
    pub fn path(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Build an error for a key of this reader
    pub fn error(&self, key: &str, reason: impl Into<String>) -> TransformError {
        TransformError::invalid_property(&self.logical_id, self.path(key), reason)
    }

    /// Remaining keys, in order
    pub fn keys(&self) -> Vec<String> {
        self.properties.keys().cloned().collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    /// Take a value. Explicit nulls count as absent.
    pub fn optional(&mut self, key: &str) -> Option<Value> {
        match self.properties.remove(key) {
            Some(Value::Null) | None => None,
            Some(value) => Some(value),
        }
    }

    pub fn required(&mut self, key: &str) -> Result<Value> {
        self.optional(key)
            .ok_or_else(|| self.error(key, "is required"))
    }

    /// Take a literal string
    pub fn optional_string(&mut self, key: &str) -> Result<Option<String>> {
        match self.optional(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(other) => Err(self.error(
                key,
                format!("must be a string, found {}", other.type_name()),
            )),
        }
    }

    pub fn required_string(&mut self, key: &str) -> Result<String> {
        self.optional_string(key)?
            .ok_or_else(|| self.error(key, "is required"))
    }

    pub fn optional_bool(&mut self, key: &str) -> Result<Option<bool>> {
        match self.optional(key) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(b)),
            Some(Value::String(s)) if s.eq_ignore_ascii_case("true") => Ok(Some(true)),
            Some(Value::String(s)) if s.eq_ignore_ascii_case("false") => Ok(Some(false)),
            Some(other) => Err(self.error(
                key,
                format!("must be a boolean, found {}", other.type_name()),
            )),
        }
    }

    pub fn optional_map(&mut self, key: &str) -> Result<Option<Map>> {
        match self.optional(key) {
            None => Ok(None),
            Some(Value::Map(map)) => Ok(Some(map)),
            Some(other) => Err(self.error(
                key,
                format!("must be a map, found {}", other.type_name()),
            )),
        }
    }

    pub fn optional_list(&mut self, key: &str) -> Result<Option<Vec<Value>>> {
        match self.optional(key) {
            None => Ok(None),
            Some(Value::List(items)) => Ok(Some(items)),
            Some(other) => Err(self.error(
                key,
                format!("must be a list, found {}", other.type_name()),
            )),
        }
    }

    /// Take a string or a list of strings
    pub fn string_list(&mut self, key: &str) -> Result<Vec<String>> {
        match self.optional(key) {
            None => Ok(Vec::new()),
            Some(Value::String(s)) => Ok(vec![s]),
            Some(Value::List(items)) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| match item {
                    Value::String(s) => Ok(s),
                    other => Err(self.error(
                        &format!("{}[{}]", key, i),
                        format!("must be a string, found {}", other.type_name()),
                    )),
                })
                .collect(),
            Some(other) => Err(self.error(
                key,
                format!("must be a string or a list of strings, found {}", other.type_name()),
            )),
        }
    }

    /// Reader over a nested map property
    pub fn optional_reader(&mut self, key: &str) -> Result<Option<PropertyReader>> {
        Ok(self
            .optional_map(key)?
            .map(|map| self.nested(key, map)))
    }

    pub fn required_reader(&mut self, key: &str) -> Result<PropertyReader> {
        self.optional_reader(key)?
            .ok_or_else(|| self.error(key, "is required"))
    }

    /// Take a reference to another resource in the template.
    ///
    /// Accepts `Ref: Id`, `Fn::GetAtt: [Id, ...]` or a bare logical id.
    pub fn optional_logical_id(&mut self, key: &str) -> Result<Option<String>> {
        match self.optional(key) {
            None => Ok(None),
            Some(value) => logical_id_of(&value)
                .map(|id| Some(id.to_string()))
                .ok_or_else(|| {
                    self.error(
                        key,
                        "must reference a resource in this template (Ref or logical id)",
                    )
                }),
        }
    }

    /// Take a map of named entries, decoding each with its own reader
    pub fn named_entries(&mut self, key: &str) -> Result<Vec<(String, PropertyReader)>> {
        let Some(map) = self.optional_map(key)? else {
            return Ok(Vec::new());
        };
        let mut entries = Vec::with_capacity(map.len());
        for (name, value) in map {
            let path = format!("{}.{}", key, name);
            match value {
                Value::Map(entry) => entries.push((name, self.nested(&path, entry))),
                other => {
                    return Err(self.error(
                        &path,
                        format!("must be a map, found {}", other.type_name()),
                    ))
                }
            }
        }
        Ok(entries)
    }

    /// Unconsumed properties
    pub fn into_extra(self) -> Map {
        self.properties
    }
}

/// Logical id targeted by a `Ref`, a `GetAtt` or a bare string
pub fn logical_id_of(value: &Value) -> Option<&str> {
    match value {
        Value::String(id) => Some(id),
        Value::Intrinsic(intrinsic) => intrinsic.target(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sam_translator_common::map_from_json;
    use serde_json::json;

    fn reader(json: serde_json::Value) -> PropertyReader {
        PropertyReader::new("MyFunction", map_from_json(json))
    }

    #[test]
    fn test_required_reports_path() {
        let mut props = reader(json!({"Events": {"Get": {"Properties": {}}}}));
        let mut events = props.required_reader("Events").unwrap();
        let mut get = events.required_reader("Get").unwrap();
        let mut inner = get.required_reader("Properties").unwrap();

        let err = inner.required_string("Path").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("[MyFunction]"), "{}", message);
        assert!(message.contains("Events.Get.Properties.Path"), "{}", message);
    }

    #[test]
    fn test_type_mismatch_is_reported() {
        let mut props = reader(json!({"Handler": 3}));
        assert!(props.optional_string("Handler").is_err());
    }

    #[test]
    fn test_extra_keeps_unread_keys() {
        let mut props = reader(json!({"Handler": "index.handler", "Custom": 1}));
        props.optional_string("Handler").unwrap();
        let extra = props.into_extra();
        assert_eq!(extra.len(), 1);
        assert!(extra.contains_key("Custom"));
    }

    #[test]
    fn test_logical_id_forms() {
        let mut props = reader(json!({
            "A": {"Ref": "MyApi"},
            "B": "OtherApi",
            "C": {"Fn::GetAtt": ["Table", "Arn"]},
            "D": ["not", "a", "ref"]
        }));
        assert_eq!(props.optional_logical_id("A").unwrap().as_deref(), Some("MyApi"));
        assert_eq!(props.optional_logical_id("B").unwrap().as_deref(), Some("OtherApi"));
        assert_eq!(props.optional_logical_id("C").unwrap().as_deref(), Some("Table"));
        assert!(props.optional_logical_id("D").is_err());
    }

    #[test]
    fn test_string_list_accepts_single_string() {
        let mut props = reader(json!({"Scopes": "read", "Many": ["a", "b"]}));
        assert_eq!(props.string_list("Scopes").unwrap(), vec!["read"]);
        assert_eq!(props.string_list("Many").unwrap(), vec!["a", "b"]);
        assert!(props.string_list("Missing").unwrap().is_empty());
    }
}
