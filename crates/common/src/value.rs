//! Recursive document tree
//!
//! Templates are arbitrary trees of null/bool/number/string/list/map nodes.
//! The three intrinsic functions the translator rewrites (`Ref`, `Fn::Sub` and
//! `Fn::GetAtt`) are lifted into an explicit [`Intrinsic`] variant whenever a
//! tree is built, so expansion and serialization never have to sniff map shapes.
//! Every other intrinsic function (`Fn::Join`, `Fn::If`, ...) stays a plain map.

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Number;
use std::collections::BTreeMap;

/// Ordered map node. Ordering keeps serialized output canonical.
pub type Map = BTreeMap<String, Value>;

/// A node in a template document
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    List(Vec<Value>),
    Map(Map),
    Intrinsic(Box<Intrinsic>),
}

/// Intrinsic placeholders resolved during expansion or at deployment time
#[derive(Debug, Clone, PartialEq)]
pub enum Intrinsic {
    /// `{"Ref": name}`
    Ref(String),

    /// `{"Fn::Sub": template}` or `{"Fn::Sub": [template, variables]}`
    Sub {
        template: String,
        variables: Option<Map>,
    },

    /// `{"Fn::GetAtt": [resource, attribute]}`
    GetAtt { resource: String, attribute: String },
}

impl Intrinsic {
    pub const REF: &'static str = "Ref";
    pub const SUB: &'static str = "Fn::Sub";
    pub const GET_ATT: &'static str = "Fn::GetAtt";

    /// Recognize the single entry of a one-key map as an intrinsic
    fn recognize(key: &str, value: &Value) -> Option<Self> {
        match (key, value) {
            (Self::REF, Value::String(name)) => Some(Intrinsic::Ref(name.clone())),
            (Self::SUB, Value::String(template)) => Some(Intrinsic::Sub {
                template: template.clone(),
                variables: None,
            }),
            (Self::SUB, Value::List(items)) => match items.as_slice() {
                [Value::String(template), Value::Map(variables)] => Some(Intrinsic::Sub {
                    template: template.clone(),
                    variables: Some(variables.clone()),
                }),
                _ => None,
            },
            (Self::GET_ATT, Value::List(items)) => match items.as_slice() {
                [Value::String(resource), Value::String(attribute)] => Some(Intrinsic::GetAtt {
                    resource: resource.clone(),
                    attribute: attribute.clone(),
                }),
                _ => None,
            },
            (Self::GET_ATT, Value::String(dotted)) => {
                dotted
                    .split_once('.')
                    .map(|(resource, attribute)| Intrinsic::GetAtt {
                        resource: resource.to_string(),
                        attribute: attribute.to_string(),
                    })
            }
            _ => None,
        }
    }

    /// Name of the intrinsic function, as written in a template
    pub fn function_name(&self) -> &'static str {
        match self {
            Intrinsic::Ref(_) => Self::REF,
            Intrinsic::Sub { .. } => Self::SUB,
            Intrinsic::GetAtt { .. } => Self::GET_ATT,
        }
    }

    /// Logical id of the resource this intrinsic points at, if any
    pub fn target(&self) -> Option<&str> {
        match self {
            Intrinsic::Ref(name) => Some(name),
            Intrinsic::GetAtt { resource, .. } => Some(resource),
            Intrinsic::Sub { .. } => None,
        }
    }
}

impl Serialize for Intrinsic {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            Intrinsic::Ref(name) => map.serialize_entry(Self::REF, name)?,
            Intrinsic::Sub {
                template,
                variables: None,
            } => map.serialize_entry(Self::SUB, template)?,
            Intrinsic::Sub {
                template,
                variables: Some(variables),
            } => map.serialize_entry(Self::SUB, &(template, variables))?,
            Intrinsic::GetAtt {
                resource,
                attribute,
            } => map.serialize_entry(Self::GET_ATT, &[resource, attribute])?,
        }
        map.end()
    }
}

impl Value {
    /// Build a map node, lifting recognized intrinsics
    pub fn from_map(map: Map) -> Self {
        if map.len() == 1 {
            if let Some(intrinsic) = map
                .iter()
                .next()
                .and_then(|(key, value)| Intrinsic::recognize(key, value))
            {
                return Value::Intrinsic(Box::new(intrinsic));
            }
        }
        Value::Map(map)
    }

    /// `{"Ref": name}`
    pub fn reference(name: impl Into<String>) -> Self {
        Value::Intrinsic(Box::new(Intrinsic::Ref(name.into())))
    }

    /// `{"Fn::GetAtt": [resource, attribute]}`
    pub fn get_att(resource: impl Into<String>, attribute: impl Into<String>) -> Self {
        Value::Intrinsic(Box::new(Intrinsic::GetAtt {
            resource: resource.into(),
            attribute: attribute.into(),
        }))
    }

    /// `{"Fn::Sub": template}`
    pub fn sub(template: impl Into<String>) -> Self {
        Value::Intrinsic(Box::new(Intrinsic::Sub {
            template: template.into(),
            variables: None,
        }))
    }

    /// `{"Fn::Sub": [template, variables]}`
    pub fn sub_with(template: impl Into<String>, variables: Map) -> Self {
        Value::Intrinsic(Box::new(Intrinsic::Sub {
            template: template.into(),
            variables: Some(variables),
        }))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Vec<Value>> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut Map> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn into_map(self) -> Option<Map> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_intrinsic(&self) -> Option<&Intrinsic> {
        match self {
            Value::Intrinsic(intrinsic) => Some(intrinsic),
            _ => None,
        }
    }

    /// Logical id named by a `Ref`, if this node is one
    pub fn ref_target(&self) -> Option<&str> {
        match self.as_intrinsic() {
            Some(Intrinsic::Ref(name)) => Some(name),
            _ => None,
        }
    }

    /// Look up a key on a map node
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map().and_then(|map| map.get(key))
    }

    /// Short description of the node kind for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Intrinsic(_) => "intrinsic function",
        }
    }

    /// Visit this node and every descendant, parents before children
    pub fn walk_mut(&mut self, visit: &mut dyn FnMut(&mut Value)) {
        visit(self);
        match self {
            Value::List(items) => {
                for item in items.iter_mut() {
                    item.walk_mut(visit);
                }
            }
            Value::Map(map) => {
                for item in map.values_mut() {
                    item.walk_mut(visit);
                }
            }
            Value::Intrinsic(intrinsic) => {
                if let Intrinsic::Sub {
                    variables: Some(variables),
                    ..
                } = intrinsic.as_mut()
                {
                    for item in variables.values_mut() {
                        item.walk_mut(visit);
                    }
                }
            }
            _ => {}
        }
    }

    /// Canonical JSON text. Map keys are ordered, so equal trees give equal text.
    pub fn to_canonical_json(&self) -> String {
        // Keys are always strings, so serialization cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => n.serialize(serializer),
            Value::String(s) => serializer.serialize_str(s),
            Value::List(items) => serializer.collect_seq(items),
            Value::Map(map) => serializer.collect_map(map),
            Value::Intrinsic(intrinsic) => intrinsic.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(object) => Value::from_map(
                object
                    .into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::from_map(map)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Intrinsic> for Value {
    fn from(intrinsic: Intrinsic) -> Self {
        Value::Intrinsic(Box::new(intrinsic))
    }
}

/// Build a map from a JSON literal, lifting intrinsics on the way.
///
/// Non-object literals yield an empty map.
pub fn map_from_json(json: serde_json::Value) -> Map {
    match json {
        serde_json::Value::Object(object) => object
            .into_iter()
            .map(|(key, value)| (key, Value::from(value)))
            .collect(),
        _ => Map::new(),
    }
}
