//! Template loading from JSON or YAML text
//!
//! YAML templates may use the short-form intrinsic tags (`!Ref`, `!GetAtt`,
//! `!Sub`, ...). They are expanded into their long-form maps while the tree is
//! built, so the rest of the pipeline only ever sees one representation.

use sam_translator_common::{Map, Result, Template, TransformError, Value};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Input syntax of a template document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateFormat {
    Json,
    Yaml,
}

impl TemplateFormat {
    /// Guess the syntax from the first meaningful character
    pub fn detect(content: &str) -> Self {
        if content.trim_start().starts_with('{') {
            TemplateFormat::Json
        } else {
            TemplateFormat::Yaml
        }
    }
}

/// Loads templates into the document model
pub struct TemplateLoader;

impl TemplateLoader {
    /// Load a template from a file path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Template> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            TransformError::InvalidTemplate(format!(
                "Failed to read template file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_str(&content)
    }

    /// Load a template, detecting JSON or YAML syntax
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Template> {
        let format = TemplateFormat::detect(content);
        debug!(?format, "loading template");
        match format {
            TemplateFormat::Json => Self::from_json(content),
            TemplateFormat::Yaml => Self::from_yaml(content),
        }
    }

    /// Load a JSON template
    pub fn from_json(json: &str) -> Result<Template> {
        let raw: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| TransformError::InvalidTemplate(format!("Failed to parse JSON: {}", e)))?;
        Template::from_value(Value::from(raw))
    }

    /// Load a YAML template, expanding short-form intrinsic tags
    pub fn from_yaml(yaml: &str) -> Result<Template> {
        let raw: serde_yaml::Value = serde_yaml::from_str(yaml)
            .map_err(|e| TransformError::InvalidTemplate(format!("Failed to parse YAML: {}", e)))?;
        Template::from_value(yaml_to_value(raw)?)
    }
}

/// Convert a YAML tree into the document model
pub fn yaml_to_value(yaml: serde_yaml::Value) -> Result<Value> {
    Ok(match yaml {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => Value::Number(yaml_number(&n)?),
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(items) => Value::List(
            items
                .into_iter()
                .map(yaml_to_value)
                .collect::<Result<Vec<_>>>()?,
        ),
        serde_yaml::Value::Mapping(mapping) => {
            let mut map = Map::new();
            for (key, value) in mapping {
                map.insert(yaml_key(key)?, yaml_to_value(value)?);
            }
            Value::from_map(map)
        }
        serde_yaml::Value::Tagged(tagged) => {
            let tag = tagged.tag.to_string();
            let name = tag.trim_start_matches('!');
            let inner = yaml_to_value(tagged.value)?;
            expand_short_form(name, inner)
        }
    })
}

/// `!Ref x` → `{"Ref": x}`, `!GetAtt a.b` → `{"Fn::GetAtt": [a, b]}`, `!Foo` → `{"Fn::Foo": ..}`
fn expand_short_form(name: &str, inner: Value) -> Value {
    let key = match name {
        "Ref" | "Condition" => name.to_string(),
        other => format!("Fn::{}", other),
    };
    let inner = match (name, inner) {
        ("GetAtt", Value::String(dotted)) => match dotted.split_once('.') {
            Some((resource, attribute)) => Value::List(vec![
                Value::String(resource.to_string()),
                Value::String(attribute.to_string()),
            ]),
            None => Value::String(dotted),
        },
        (_, inner) => inner,
    };
    let mut map = Map::new();
    map.insert(key, inner);
    Value::from_map(map)
}

fn yaml_key(key: serde_yaml::Value) -> Result<String> {
    match key {
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        other => Err(TransformError::InvalidTemplate(format!(
            "unsupported mapping key {:?}",
            other
        ))),
    }
}

fn yaml_number(n: &serde_yaml::Number) -> Result<serde_json::Number> {
    if let Some(i) = n.as_i64() {
        Ok(i.into())
    } else if let Some(u) = n.as_u64() {
        Ok(u.into())
    } else {
        n.as_f64()
            .and_then(serde_json::Number::from_f64)
            .ok_or_else(|| TransformError::InvalidTemplate(format!("unsupported number {}", n)))
    }
}
