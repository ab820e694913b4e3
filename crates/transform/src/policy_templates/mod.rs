//! Policy template catalog and expansion
//!
//! A policy template is a named, parameterized policy document. Templates are
//! loaded once from the catalog bundled with the crate and expanded by
//! substituting parameter values for the `Ref`s that name them.

use sam_translator_common::{Intrinsic, Map, Result, TransformError, Value};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Catalog bundled with the crate
const BUILTIN_CATALOG: &str = include_str!("catalog.json");

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Catalog {
    templates: BTreeMap<String, PolicyTemplate>,
}

/// A single catalog entry
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyTemplate {
    pub description: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, ParameterSpec>,
    pub definition: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ParameterSpec {
    #[serde(default)]
    pub description: String,
}

/// Immutable table of policy templates
#[derive(Debug, Clone)]
pub struct PolicyTemplateProcessor {
    templates: BTreeMap<String, PolicyTemplate>,
}

impl PolicyTemplateProcessor {
    /// Processor over the bundled catalog
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_CATALOG)
    }

    /// Processor over a catalog document
    pub fn from_json(content: &str) -> Result<Self> {
        let catalog: Catalog = serde_json::from_str(content)?;
        debug!(templates = catalog.templates.len(), "loaded policy template catalog");
        Ok(Self {
            templates: catalog.templates,
        })
    }

    pub fn has(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&PolicyTemplate> {
        self.templates.get(name)
    }

    /// Template names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    /// Expand a template into a policy document
    ///
    /// # Arguments
    /// * `name` - Catalog name, e.g. `S3ReadPolicy`
    /// * `parameters` - Map of parameter values
    ///
    /// # Returns
    /// * `Value` - Deep copy of the definition with every `Ref` to a
    ///   parameter replaced by its value, including inside `Fn::Sub` variables
    pub fn expand(&self, name: &str, parameters: &Value) -> Result<Value> {
        let template = self
            .templates
            .get(name)
            .ok_or_else(|| TransformError::UnknownMacro(name.to_string()))?;

        let empty = Map::new();
        let values = match parameters {
            Value::Map(map) => map,
            _ => &empty,
        };
        if let Some(missing) = template
            .parameters
            .keys()
            .find(|declared| !values.contains_key(declared.as_str()))
        {
            return Err(TransformError::MissingMacroParameter {
                template: name.to_string(),
                parameter: missing.clone(),
            });
        }

        Ok(substitute(&template.definition, values))
    }
}

fn substitute(node: &Value, values: &Map) -> Value {
    match node {
        Value::Intrinsic(intrinsic) => match intrinsic.as_ref() {
            Intrinsic::Ref(name) => match values.get(name) {
                Some(value) => value.clone(),
                None => node.clone(),
            },
            Intrinsic::Sub {
                template,
                variables: Some(variables),
            } => Value::sub_with(
                template.clone(),
                variables
                    .iter()
                    .map(|(key, value)| (key.clone(), substitute(value, values)))
                    .collect(),
            ),
            _ => node.clone(),
        },
        Value::List(items) => Value::List(items.iter().map(|item| substitute(item, values)).collect()),
        Value::Map(map) => Value::Map(
            map.iter()
                .map(|(key, value)| (key.clone(), substitute(value, values)))
                .collect(),
        ),
        scalar => scalar.clone(),
    }
}
