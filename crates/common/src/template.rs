//! Template document model
//!
//! A [`Template`] is built fresh from parsed input, threaded through the
//! transformation by mutable reference and handed back as output.

use crate::value::{Map, Value};
use crate::{Result, TransformError};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// Transform marker identifying serverless templates
pub const SERVERLESS_TRANSFORM: &str = "AWS::Serverless-2016-10-31";

const FORMAT_VERSION: &str = "AWSTemplateFormatVersion";
const DESCRIPTION: &str = "Description";
const TRANSFORM: &str = "Transform";
const GLOBALS: &str = "Globals";
const PARAMETERS: &str = "Parameters";
const MAPPINGS: &str = "Mappings";
const CONDITIONS: &str = "Conditions";
const RESOURCES: &str = "Resources";
const OUTPUTS: &str = "Outputs";
const METADATA: &str = "Metadata";

/// In-memory template
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Template {
    pub format_version: Option<Value>,
    pub description: Option<Value>,
    pub transform: Option<Value>,
    /// Per-kind default property bags (`Globals` section)
    pub globals: Map,
    pub parameters: Map,
    pub mappings: Map,
    pub conditions: Map,
    /// Resources keyed by logical id
    pub resources: BTreeMap<String, Resource>,
    pub outputs: Map,
    pub metadata: Map,
    /// Any other top-level section, passed through untouched
    pub extra: Map,
}

/// A single resource entry
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Resource {
    /// Resource type tag, e.g. `AWS::Serverless::Function`
    pub kind: String,
    pub properties: Map,
    pub condition: Option<String>,
    pub depends_on: Vec<String>,
    pub metadata: Option<Value>,
    pub deletion_policy: Option<Value>,
    pub update_replace_policy: Option<Value>,
    /// Other resource attributes (`UpdatePolicy`, `CreationPolicy`, ...)
    pub extra: Map,
}

impl Resource {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Default::default()
        }
    }

    pub fn with_properties(mut self, properties: Map) -> Self {
        self.properties = properties;
        self
    }

    /// Set a property, skipping `None`
    pub fn with_optional(mut self, key: &str, value: Option<Value>) -> Self {
        if let Some(value) = value {
            self.properties.insert(key.to_string(), value);
        }
        self
    }

    pub fn with_property(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn with_depends_on(mut self, logical_id: impl Into<String>) -> Self {
        let logical_id = logical_id.into();
        if !self.depends_on.contains(&logical_id) {
            self.depends_on.push(logical_id);
        }
        self
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Decode a resource entry
    pub fn from_value(logical_id: &str, value: Value) -> Result<Self> {
        let mut map = value.into_map().ok_or_else(|| {
            TransformError::InvalidTemplate(format!(
                "Resource '{}' must be a map",
                logical_id
            ))
        })?;

        let kind = match map.remove("Type") {
            Some(Value::String(kind)) => kind,
            _ => {
                return Err(TransformError::InvalidTemplate(format!(
                    "Resource '{}' is missing a string 'Type'",
                    logical_id
                )))
            }
        };

        let properties = match map.remove("Properties") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Map(properties)) => properties,
            Some(other) => {
                return Err(TransformError::InvalidTemplate(format!(
                    "Resource '{}' has Properties of type {}, expected a map",
                    logical_id,
                    other.type_name()
                )))
            }
        };

        let condition = match map.remove("Condition") {
            None => None,
            Some(Value::String(condition)) => Some(condition),
            Some(other) => {
                return Err(TransformError::InvalidTemplate(format!(
                    "Resource '{}' has a Condition of type {}, expected a string",
                    logical_id,
                    other.type_name()
                )))
            }
        };

        let depends_on = match map.remove("DependsOn") {
            None => Vec::new(),
            Some(Value::String(single)) => vec![single],
            Some(Value::List(items)) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s),
                    other => Err(TransformError::InvalidTemplate(format!(
                        "Resource '{}' has a DependsOn entry of type {}",
                        logical_id,
                        other.type_name()
                    ))),
                })
                .collect::<Result<Vec<_>>>()?,
            Some(other) => {
                return Err(TransformError::InvalidTemplate(format!(
                    "Resource '{}' has a DependsOn of type {}",
                    logical_id,
                    other.type_name()
                )))
            }
        };

        Ok(Self {
            kind,
            properties,
            condition,
            depends_on,
            metadata: map.remove("Metadata"),
            deletion_policy: map.remove("DeletionPolicy"),
            update_replace_policy: map.remove("UpdateReplacePolicy"),
            extra: map,
        })
    }

    /// Encode back into a template entry
    pub fn to_value(&self) -> Value {
        let mut map = self.extra.clone();
        map.insert("Type".to_string(), Value::String(self.kind.clone()));
        if !self.properties.is_empty() {
            map.insert(
                "Properties".to_string(),
                Value::Map(self.properties.clone()),
            );
        }
        if let Some(condition) = &self.condition {
            map.insert("Condition".to_string(), Value::String(condition.clone()));
        }
        if !self.depends_on.is_empty() {
            map.insert(
                "DependsOn".to_string(),
                Value::List(self.depends_on.iter().cloned().map(Value::String).collect()),
            );
        }
        if let Some(metadata) = &self.metadata {
            map.insert("Metadata".to_string(), metadata.clone());
        }
        if let Some(policy) = &self.deletion_policy {
            map.insert("DeletionPolicy".to_string(), policy.clone());
        }
        if let Some(policy) = &self.update_replace_policy {
            map.insert("UpdateReplacePolicy".to_string(), policy.clone());
        }
        Value::Map(map)
    }
}

impl Template {
    /// Decode a whole document tree
    pub fn from_value(value: Value) -> Result<Self> {
        let mut map = value.into_map().ok_or_else(|| {
            TransformError::InvalidTemplate("template root must be a map".to_string())
        })?;

        let resources = match map.remove(RESOURCES) {
            Some(Value::Map(resources)) => resources
                .into_iter()
                .map(|(logical_id, value)| {
                    Resource::from_value(&logical_id, value).map(|r| (logical_id, r))
                })
                .collect::<Result<BTreeMap<_, _>>>()?,
            Some(other) => {
                return Err(TransformError::InvalidTemplate(format!(
                    "'Resources' must be a map, found {}",
                    other.type_name()
                )))
            }
            None => {
                return Err(TransformError::InvalidTemplate(
                    "'Resources' section is required".to_string(),
                ))
            }
        };

        Ok(Self {
            format_version: map.remove(FORMAT_VERSION),
            description: map.remove(DESCRIPTION),
            transform: map.remove(TRANSFORM),
            globals: take_section(&mut map, GLOBALS)?,
            parameters: take_section(&mut map, PARAMETERS)?,
            mappings: take_section(&mut map, MAPPINGS)?,
            conditions: take_section(&mut map, CONDITIONS)?,
            resources,
            outputs: take_section(&mut map, OUTPUTS)?,
            metadata: take_section(&mut map, METADATA)?,
            extra: map,
        })
    }

    /// Encode the document, every section included
    pub fn to_value(&self) -> Value {
        let mut map = self.extra.clone();
        let mut put = |key: &str, value: Option<Value>| {
            if let Some(value) = value {
                map.insert(key.to_string(), value);
            }
        };
        put(FORMAT_VERSION, self.format_version.clone());
        put(DESCRIPTION, self.description.clone());
        put(TRANSFORM, self.transform.clone());
        put(GLOBALS, non_empty(&self.globals));
        put(PARAMETERS, non_empty(&self.parameters));
        put(MAPPINGS, non_empty(&self.mappings));
        put(CONDITIONS, non_empty(&self.conditions));
        put(OUTPUTS, non_empty(&self.outputs));
        put(METADATA, non_empty(&self.metadata));
        map.insert(
            RESOURCES.to_string(),
            Value::Map(
                self.resources
                    .iter()
                    .map(|(id, resource)| (id.clone(), resource.to_value()))
                    .collect(),
            ),
        );
        Value::Map(map)
    }

    /// Whether the transform marker names the serverless transform
    pub fn has_serverless_transform(&self) -> bool {
        match &self.transform {
            Some(Value::String(name)) => name == SERVERLESS_TRANSFORM,
            Some(Value::List(names)) => names
                .iter()
                .any(|n| n.as_str() == Some(SERVERLESS_TRANSFORM)),
            _ => false,
        }
    }

    /// Drop the serverless marker, keeping any other declared transforms
    pub fn remove_serverless_transform(&mut self) {
        self.transform = match self.transform.take() {
            Some(Value::String(name)) if name == SERVERLESS_TRANSFORM => None,
            Some(Value::List(names)) => {
                let remaining: Vec<Value> = names
                    .into_iter()
                    .filter(|n| n.as_str() != Some(SERVERLESS_TRANSFORM))
                    .collect();
                if remaining.is_empty() {
                    None
                } else {
                    Some(Value::List(remaining))
                }
            }
            other => other,
        };
    }

    /// Resources of one kind, ordered by logical id
    pub fn resources_of_kind(&self, kind: &str) -> Vec<(&String, &Resource)> {
        self.resources
            .iter()
            .filter(|(_, resource)| resource.kind == kind)
            .collect()
    }
}

impl Serialize for Template {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

fn take_section(map: &mut Map, key: &str) -> Result<Map> {
    match map.remove(key) {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Map(section)) => Ok(section),
        Some(other) => Err(TransformError::InvalidTemplate(format!(
            "'{}' must be a map, found {}",
            key,
            other.type_name()
        ))),
    }
}

fn non_empty(map: &Map) -> Option<Value> {
    if map.is_empty() {
        None
    } else {
        Some(Value::Map(map.clone()))
    }
}
