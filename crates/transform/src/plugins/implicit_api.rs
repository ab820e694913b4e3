//! Implicit API creation
//!
//! Functions may declare `Api` or `HttpApi` events without naming the API
//! they belong to. Those routes are served by an API the translator creates.

use super::globals::GlobalsPlugin;
use super::{Plugin, PluginContext};
use sam_translator_common::{Map, Resource, Result, Template, Value};
use sam_translator_parser::model::HTTP_DEFAULT_STAGE;
use sam_translator_parser::ResourceKind;
use tracing::debug;

/// Logical id of the implicit REST API
pub const IMPLICIT_REST_API: &str = "ServerlessRestApi";

/// Logical id of the implicit HTTP API
pub const IMPLICIT_HTTP_API: &str = "ServerlessHttpApi";

const REST_DEFAULT_STAGE: &str = "Prod";

/// Creates the implicit REST or HTTP API when an unreferenced route exists
pub struct ImplicitApiPlugin {
    kind: ResourceKind,
}

impl ImplicitApiPlugin {
    pub fn rest() -> Self {
        Self {
            kind: ResourceKind::Api,
        }
    }

    pub fn http() -> Self {
        Self {
            kind: ResourceKind::HttpApi,
        }
    }

    fn logical_id(&self) -> &'static str {
        match self.kind {
            ResourceKind::HttpApi => IMPLICIT_HTTP_API,
            _ => IMPLICIT_REST_API,
        }
    }

    fn event_type(&self) -> &'static str {
        match self.kind {
            ResourceKind::HttpApi => "HttpApi",
            _ => "Api",
        }
    }

    fn reference_key(&self) -> &'static str {
        match self.kind {
            ResourceKind::HttpApi => "ApiId",
            _ => "RestApiId",
        }
    }

    fn default_stage(&self) -> &'static str {
        match self.kind {
            ResourceKind::HttpApi => HTTP_DEFAULT_STAGE,
            _ => REST_DEFAULT_STAGE,
        }
    }

    /// Whether any function declares a route of this kind without an API reference.
    ///
    /// Malformed events are ignored here; they are reported during conversion.
    fn has_unreferenced_route(&self, template: &Template) -> bool {
        template
            .resources_of_kind(ResourceKind::Function.type_name())
            .into_iter()
            .filter_map(|(_, function)| function.property("Events").and_then(Value::as_map))
            .flat_map(|events| events.values())
            .any(|event| {
                let is_route = event.get("Type").and_then(Value::as_str) == Some(self.event_type());
                let referenced = event
                    .get("Properties")
                    .and_then(|props| props.get(self.reference_key()))
                    .is_some_and(|api| !api.is_null());
                is_route && !referenced
            })
    }
}

impl Plugin for ImplicitApiPlugin {
    fn name(&self) -> &'static str {
        match self.kind {
            ResourceKind::HttpApi => "ImplicitHttpApiPlugin",
            _ => "ImplicitRestApiPlugin",
        }
    }

    fn priority(&self) -> u32 {
        match self.kind {
            ResourceKind::HttpApi => 310,
            _ => 300,
        }
    }

    fn before_transform(&self, template: &mut Template, _context: &PluginContext) -> Result<()> {
        let logical_id = self.logical_id();
        if template.resources.contains_key(logical_id) || !self.has_unreferenced_route(template) {
            return Ok(());
        }

        let mut properties = Map::new();
        if let Some(section) = GlobalsPlugin::section(template, self.kind)? {
            GlobalsPlugin::apply(section, &mut properties);
        }
        properties
            .entry("StageName".to_string())
            .or_insert_with(|| Value::from(self.default_stage()));

        debug!(%logical_id, "creating implicit API");
        template.resources.insert(
            logical_id.to_string(),
            Resource::new(self.kind.type_name()).with_properties(properties),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy_templates::PolicyTemplateProcessor;
    use sam_translator_common::TransformOptions;
    use serde_json::json;
    use std::sync::Arc;

    fn context() -> PluginContext {
        PluginContext::new(
            TransformOptions::default(),
            Arc::new(PolicyTemplateProcessor::builtin().unwrap()),
        )
    }

    fn function_with_event(event: serde_json::Value) -> Template {
        Template::from_value(Value::from(json!({
            "Resources": {
                "Fn": {
                    "Type": "AWS::Serverless::Function",
                    "Properties": {"Events": {"E": event}}
                }
            }
        })))
        .unwrap()
    }

    #[test]
    fn test_creates_rest_api_with_prod_stage() {
        let mut t = function_with_event(json!({
            "Type": "Api",
            "Properties": {"Path": "/users", "Method": "get"}
        }));
        ImplicitApiPlugin::rest().before_transform(&mut t, &context()).unwrap();

        let api = &t.resources[IMPLICIT_REST_API];
        assert_eq!(api.kind, "AWS::Serverless::Api");
        assert_eq!(api.property("StageName"), Some(&Value::from("Prod")));
    }

    #[test]
    fn test_creates_http_api_with_default_stage() {
        let mut t = function_with_event(json!({"Type": "HttpApi"}));
        ImplicitApiPlugin::http().before_transform(&mut t, &context()).unwrap();
        assert_eq!(
            t.resources[IMPLICIT_HTTP_API].property("StageName"),
            Some(&Value::from("$default"))
        );
        assert!(!t.resources.contains_key(IMPLICIT_REST_API));
    }

    #[test]
    fn test_referenced_routes_need_no_implicit_api() {
        let mut t = function_with_event(json!({
            "Type": "Api",
            "Properties": {"Path": "/", "Method": "get", "RestApiId": {"Ref": "MyApi"}}
        }));
        ImplicitApiPlugin::rest().before_transform(&mut t, &context()).unwrap();
        assert!(!t.resources.contains_key(IMPLICIT_REST_API));
    }

    #[test]
    fn test_idempotent() {
        let mut t = function_with_event(json!({
            "Type": "Api",
            "Properties": {"Path": "/", "Method": "get"}
        }));
        let plugin = ImplicitApiPlugin::rest();
        plugin.before_transform(&mut t, &context()).unwrap();
        t.resources
            .get_mut(IMPLICIT_REST_API)
            .unwrap()
            .properties
            .insert("Marker".into(), Value::Bool(true));
        plugin.before_transform(&mut t, &context()).unwrap();
        assert!(t.resources[IMPLICIT_REST_API].property("Marker").is_some());
    }

    #[test]
    fn test_api_globals_apply_to_implicit_api() {
        let mut t = function_with_event(json!({
            "Type": "Api",
            "Properties": {"Path": "/", "Method": "get"}
        }));
        t.globals = sam_translator_common::map_from_json(json!({
            "Api": {"TracingEnabled": true}
        }));
        ImplicitApiPlugin::rest().before_transform(&mut t, &context()).unwrap();
        assert_eq!(
            t.resources[IMPLICIT_REST_API].property("TracingEnabled"),
            Some(&Value::Bool(true))
        );
    }
}
