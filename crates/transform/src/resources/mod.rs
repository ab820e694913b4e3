//! Resource conversion
//!
//! Serverless resources are converted kind by kind in
//! [`ResourceKind::CONVERSION_ORDER`], and by logical id within a kind. Every
//! other resource is copied to the output untouched before conversion starts,
//! so converters can look at it (an S3 bucket an event targets, for example).
//!
//! A resource that fails to convert does not stop the others: failures are
//! collected and reported together once every resource has been attempted.

mod api;
mod application;
mod connector;
mod events;
mod function;
mod graphql;
mod http_api;
mod iam;
mod layer;
mod simple_table;
mod state_machine;

use crate::arn::ArnBuilder;
use crate::logical_id::LogicalIdGenerator;
use crate::plugins::PluginContext;
use crate::policy_templates::PolicyTemplateProcessor;
use sam_translator_common::{
    ConversionErrors, Intrinsic, Map, Resource, Result, Template, TransformError,
    TransformOptions, Value,
};
use sam_translator_parser::{ResourceKind, SamProperties};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

const SERVERLESS_PREFIX: &str = "AWS::Serverless::";

/// Everything a converter may look at
pub struct ConversionContext<'a> {
    pub options: &'a TransformOptions,
    pub arns: &'a ArnBuilder,
    pub policies: &'a PolicyTemplateProcessor,
    /// The template as it stood when conversion started
    pub source: &'a Template,
    /// Non-serverless resources plus everything converted so far
    pub output: &'a BTreeMap<String, Resource>,
}

impl ConversionContext<'_> {
    /// Type of a resource, preferring its converted form
    pub fn kind_of(&self, logical_id: &str) -> Option<&str> {
        self.output
            .get(logical_id)
            .or_else(|| self.source.resources.get(logical_id))
            .map(|resource| resource.kind.as_str())
    }
}

/// Result of converting one serverless resource
#[derive(Debug, Clone, Default)]
pub struct Converted {
    /// Generated resources; the first one is the primary resource
    pub resources: Vec<(String, Resource)>,
    /// Replacements for resources already in the output
    pub updates: Vec<(String, Resource)>,
}

impl Converted {
    pub fn new(logical_id: impl Into<String>, primary: Resource) -> Self {
        Self {
            resources: vec![(logical_id.into(), primary)],
            updates: Vec::new(),
        }
    }

    pub fn add(&mut self, logical_id: impl Into<String>, resource: Resource) {
        self.resources.push((logical_id.into(), resource));
    }

    pub fn update(&mut self, logical_id: impl Into<String>, resource: Resource) {
        self.updates.push((logical_id.into(), resource));
    }

    /// Generated resource by id
    pub fn get_mut(&mut self, logical_id: &str) -> Option<&mut Resource> {
        self.resources
            .iter_mut()
            .find(|(id, _)| id == logical_id)
            .map(|(_, resource)| resource)
    }

    fn primary_id(&self) -> Option<&str> {
        self.resources.first().map(|(id, _)| id.as_str())
    }
}

/// Build a map node from literal entries
pub(crate) fn object<const N: usize>(entries: [(&str, Value); N]) -> Value {
    Value::Map(
        entries
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect(),
    )
}

/// Convert a tag map into a CloudFormation tag list, led by an optional marker tag
pub(crate) fn tag_list(marker: Option<(&str, &str)>, tags: &Map) -> Value {
    let marker = marker.map(|(key, value)| {
        object([("Key", Value::from(key)), ("Value", Value::from(value))])
    });
    let rest = tags
        .iter()
        .map(|(key, value)| object([("Key", Value::from(key.as_str())), ("Value", value.clone())]));
    Value::List(marker.into_iter().chain(rest).collect())
}

/// Convert every serverless resource of a template in place.
///
/// # Returns
/// * `Ok(())` - Every resource converted; `template.resources` now holds the output
/// * `Err(TransformError::Conversion)` - One entry per failing resource
pub fn convert_resources(template: &mut Template, plugins: &PluginContext) -> Result<()> {
    let source = template.clone();
    let mut output: BTreeMap<String, Resource> = BTreeMap::new();
    let mut errors = ConversionErrors::new();
    let mut pending: BTreeMap<usize, Vec<&String>> = BTreeMap::new();

    for (logical_id, resource) in &source.resources {
        if let Err(err) = LogicalIdGenerator::validate(logical_id) {
            errors.push(logical_id.as_str(), err);
            continue;
        }
        match ResourceKind::from_type(&resource.kind) {
            Some(kind) => {
                let rank = ResourceKind::CONVERSION_ORDER
                    .iter()
                    .position(|k| *k == kind)
                    .unwrap_or_default();
                pending.entry(rank).or_default().push(logical_id);
            }
            None if resource.kind.starts_with(SERVERLESS_PREFIX) => errors.push(
                logical_id.as_str(),
                TransformError::InvalidTemplate(format!(
                    "Resource with id [{}] has unsupported type '{}'",
                    logical_id, resource.kind
                )),
            ),
            None => {
                output.insert(logical_id.clone(), resource.clone());
            }
        }
    }

    let mut renames: BTreeMap<String, String> = BTreeMap::new();
    for (rank, logical_ids) in pending {
        let kind = ResourceKind::CONVERSION_ORDER[rank];
        for logical_id in logical_ids {
            let resource = &source.resources[logical_id];
            let context = ConversionContext {
                options: &plugins.options,
                arns: &plugins.arns,
                policies: &plugins.policies,
                source: &source,
                output: &output,
            };
            let converted = convert_one(kind, logical_id, resource, &context).and_then(|converted| {
                check_identifiers(logical_id, &converted, &context)?;
                Ok(converted)
            });
            match converted {
                Ok(converted) => {
                    debug!(%logical_id, %kind, generated = converted.resources.len(), "converted resource");
                    if let Some(primary) = converted.primary_id() {
                        if primary != logical_id {
                            renames.insert(logical_id.clone(), primary.to_string());
                        }
                    }
                    let converted = propagate_attributes(logical_id, resource, converted, plugins);
                    output.extend(converted.resources);
                    output.extend(converted.updates);
                }
                Err(err) => errors.push(logical_id.as_str(), attribute(err, logical_id)),
            }
        }
    }

    errors.into_result()?;

    if !renames.is_empty() {
        rewrite_references(&mut output, &mut template.outputs, &renames);
    }
    info!(resources = output.len(), "converted template resources");
    template.resources = output;
    Ok(())
}

fn convert_one(
    kind: ResourceKind,
    logical_id: &str,
    resource: &Resource,
    context: &ConversionContext,
) -> Result<Converted> {
    match SamProperties::decode(kind, logical_id, resource.properties.clone())? {
        SamProperties::Function(props) => function::convert(logical_id, props, context),
        SamProperties::SimpleTable(props) => simple_table::convert(logical_id, props),
        SamProperties::LayerVersion(props) => layer::convert(logical_id, props),
        SamProperties::StateMachine(props) => state_machine::convert(logical_id, props, context),
        SamProperties::Api(props) => api::convert(logical_id, props, context),
        SamProperties::HttpApi(props) => http_api::convert(logical_id, props, context),
        SamProperties::Application(props) => application::convert(logical_id, props),
        SamProperties::GraphQLApi(props) => graphql::convert(logical_id, props, context),
        SamProperties::Connector(props) => connector::convert(logical_id, props, context),
    }
}

/// Every generated id must be valid and unused by any other resource
fn check_identifiers(
    logical_id: &str,
    converted: &Converted,
    context: &ConversionContext,
) -> Result<()> {
    let mut seen = HashSet::new();
    for (generated, _) in &converted.resources {
        LogicalIdGenerator::validate(generated)?;
        let taken_elsewhere = generated != logical_id
            && (context.output.contains_key(generated)
                || context.source.resources.contains_key(generated));
        if taken_elsewhere || !seen.insert(generated.as_str()) {
            return Err(TransformError::DuplicateIdentifier(generated.clone()));
        }
    }
    Ok(())
}

/// Attribute an error to a resource unless it already names it
fn attribute(err: TransformError, logical_id: &str) -> TransformError {
    match &err {
        TransformError::InvalidProperty { resource, .. } if resource == logical_id => err,
        _ => err.in_resource(logical_id),
    }
}

/// Carry resource attributes of the source onto the generated resources
fn propagate_attributes(
    logical_id: &str,
    source: &Resource,
    mut converted: Converted,
    plugins: &PluginContext,
) -> Converted {
    if let Some(condition) = &source.condition {
        for (_, resource) in converted.resources.iter_mut() {
            resource.condition.get_or_insert_with(|| condition.clone());
        }
    }

    let Some((_, primary)) = converted.resources.first_mut() else {
        return converted;
    };
    for dependency in &source.depends_on {
        if !primary.depends_on.contains(dependency) {
            primary.depends_on.push(dependency.clone());
        }
    }
    if source.deletion_policy.is_some() {
        primary.deletion_policy = source.deletion_policy.clone();
    }
    if source.update_replace_policy.is_some() {
        primary.update_replace_policy = source.update_replace_policy.clone();
    }
    for (key, value) in &source.extra {
        primary.extra.insert(key.clone(), value.clone());
    }

    primary.metadata = if plugins.options.pass_through_metadata {
        let mut metadata = source
            .metadata
            .as_ref()
            .and_then(Value::as_map)
            .cloned()
            .unwrap_or_default();
        metadata.insert("SamResourceId".to_string(), Value::from(logical_id));
        Some(Value::Map(metadata))
    } else {
        None
    };
    converted
}

/// Point `Ref`, `Fn::GetAtt`, `Fn::Sub` and `DependsOn` at renamed resources
fn rewrite_references(
    resources: &mut BTreeMap<String, Resource>,
    outputs: &mut Map,
    renames: &BTreeMap<String, String>,
) {
    let mut rewrite = |value: &mut Value| {
        let Value::Intrinsic(intrinsic) = value else {
            return;
        };
        match intrinsic.as_mut() {
            Intrinsic::Ref(target) | Intrinsic::GetAtt { resource: target, .. } => {
                if let Some(renamed) = renames.get(target.as_str()) {
                    *target = renamed.clone();
                }
            }
            Intrinsic::Sub { template, .. } => {
                for (old, new) in renames {
                    *template = template
                        .replace(&format!("${{{}}}", old), &format!("${{{}}}", new))
                        .replace(&format!("${{{}.", old), &format!("${{{}.", new));
                }
            }
        }
    };

    for resource in resources.values_mut() {
        for value in resource.properties.values_mut() {
            value.walk_mut(&mut rewrite);
        }
        for dependency in resource.depends_on.iter_mut() {
            if let Some(renamed) = renames.get(dependency.as_str()) {
                *dependency = renamed.clone();
            }
        }
    }
    for value in outputs.values_mut() {
        value.walk_mut(&mut rewrite);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Arc;

    /// Convert a JSON template with the given options and render the result as JSON
    pub fn convert_template_with(
        json: serde_json::Value,
        options: TransformOptions,
    ) -> Result<serde_json::Value> {
        let plugins = PluginContext::new(
            options,
            Arc::new(PolicyTemplateProcessor::builtin().unwrap()),
        );
        let mut template = Template::from_value(Value::from(json))?;
        convert_resources(&mut template, &plugins)?;
        Ok(serde_json::to_value(&template)?)
    }

    pub fn convert_template(json: serde_json::Value) -> Result<serde_json::Value> {
        convert_template_with(json, TransformOptions::default())
    }
}
