//! API definitions derived from function route events
//!
//! Routes declared on functions are collected per target API. An API without
//! a definition gets a generated one; an API with an inline definition gets
//! the missing routes merged in.

use super::implicit_api::{IMPLICIT_HTTP_API, IMPLICIT_REST_API};
use super::{Plugin, PluginContext};
use crate::logical_id::LogicalIdGenerator;
use crate::swagger::{
    api_key_scheme, aws_iam_scheme, security_scheme, ApiFlavor, ApiSpecEditor, HttpIntegration,
    API_KEY_SCHEME, AWS_IAM_SCHEME, DEFAULT_ROUTE,
};
use sam_translator_common::{Map, Result, Template, TransformError, Value};
use sam_translator_parser::model::{
    take_events, ApiAuth, ApiProperties, DefinitionSource, EventKind, HttpApiProperties, HttpCors,
    RestCors, RouteAuth,
};
use sam_translator_parser::{PropertyReader, ResourceKind};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// A route declared by a function event
#[derive(Debug, Clone)]
struct Route {
    function_id: String,
    alias: Option<String>,
    event_name: String,
    path: String,
    method: String,
    auth: Option<RouteAuth>,
    http: Option<HttpIntegration>,
}

/// Decoded API settings the generator needs
struct ApiSettings {
    flavor: ApiFlavor,
    definition: Option<DefinitionSource>,
    openapi3: bool,
    auth: Option<ApiAuth>,
    rest_cors: Option<RestCors>,
    http_cors: Option<HttpCors>,
}

/// Generates or extends API definitions from route events
pub struct ApiSpecPlugin;

impl ApiSpecPlugin {
    /// Routes per target API id, in function then event order
    fn collect_routes(template: &Template) -> (BTreeMap<String, Vec<Route>>, BTreeMap<String, Vec<Route>>) {
        let mut rest: BTreeMap<String, Vec<Route>> = BTreeMap::new();
        let mut http: BTreeMap<String, Vec<Route>> = BTreeMap::new();

        for (function_id, function) in
            template.resources_of_kind(ResourceKind::Function.type_name())
        {
            let Some(events) = function.property("Events") else {
                continue;
            };
            let mut only_events = Map::new();
            only_events.insert("Events".to_string(), events.clone());
            // Malformed events are reported when the function is converted
            let Ok(events) = take_events(&mut PropertyReader::new(function_id, only_events)) else {
                continue;
            };
            let alias = function
                .property("AutoPublishAlias")
                .and_then(Value::as_str)
                .map(str::to_string);

            for event in events {
                match event.kind {
                    EventKind::Api(api) => {
                        let target = api
                            .rest_api_id
                            .unwrap_or_else(|| IMPLICIT_REST_API.to_string());
                        rest.entry(target).or_default().push(Route {
                            function_id: function_id.clone(),
                            alias: alias.clone(),
                            event_name: event.name,
                            path: api.path,
                            method: api.method,
                            auth: api.auth,
                            http: None,
                        });
                    }
                    EventKind::HttpApi(route) => {
                        let target = route
                            .api_id
                            .unwrap_or_else(|| IMPLICIT_HTTP_API.to_string());
                        http.entry(target).or_default().push(Route {
                            function_id: function_id.clone(),
                            alias: alias.clone(),
                            event_name: event.name,
                            path: route.path.unwrap_or_else(|| DEFAULT_ROUTE.to_string()),
                            method: route.method.unwrap_or_else(|| "any".to_string()),
                            auth: route.auth,
                            http: Some(HttpIntegration {
                                payload_format_version: route.payload_format_version,
                                timeout_in_millis: route.timeout_in_millis,
                            }),
                        });
                    }
                    _ => {}
                }
            }
        }
        (rest, http)
    }

    fn decode_settings(template: &Template, api_id: &str, kind: ResourceKind) -> Option<ApiSettings> {
        let resource = template.resources.get(api_id)?;
        if resource.kind != kind.type_name() {
            return None;
        }
        let reader = PropertyReader::new(api_id, resource.properties.clone());
        // Decoding failures are reported when the API is converted
        match kind {
            ResourceKind::HttpApi => {
                let props = HttpApiProperties::decode(reader).ok()?;
                Some(ApiSettings {
                    flavor: ApiFlavor::Http,
                    definition: props.definition,
                    openapi3: true,
                    auth: props.auth,
                    rest_cors: None,
                    http_cors: props.cors,
                })
            }
            _ => {
                let props = ApiProperties::decode(reader).ok()?;
                Some(ApiSettings {
                    flavor: ApiFlavor::Rest,
                    openapi3: props.uses_openapi3(),
                    definition: props.definition,
                    auth: props.auth,
                    rest_cors: props.cors,
                    http_cors: None,
                })
            }
        }
    }

    /// Invocation URI for a route's function (or its published alias)
    fn integration_uri(route: &Route, context: &PluginContext) -> Value {
        let target = match &route.alias {
            Some(alias) => format!(
                "${{{}}}",
                LogicalIdGenerator::generate(&[&route.function_id, "Alias", alias])
            ),
            None => format!("${{{}.Arn}}", route.function_id),
        };
        Value::sub(context.arns.lambda_integration_uri(&target).to_string())
    }

    /// Security requirements of a route under the API's auth settings
    fn route_security(
        api_id: &str,
        route: &Route,
        auth: Option<&ApiAuth>,
        editor: &mut ApiSpecEditor,
    ) -> Result<Vec<(String, Vec<String>)>> {
        let route_auth = route.auth.clone().unwrap_or_default();
        let authorizer = route_auth
            .authorizer
            .clone()
            .or_else(|| auth.and_then(|a| a.default_authorizer.clone()));

        let mut requirements = Vec::new();
        match authorizer.as_deref() {
            None | Some(RouteAuth::NONE) => {}
            Some(AWS_IAM_SCHEME) => {
                editor.add_security_scheme(AWS_IAM_SCHEME, aws_iam_scheme());
                requirements.push((AWS_IAM_SCHEME.to_string(), Vec::new()));
            }
            Some(name) => {
                if auth.and_then(|a| a.authorizer(name)).is_none() {
                    return Err(TransformError::invalid_property(
                        &route.function_id,
                        format!("Events.{}.Properties.Auth.Authorizer", route.event_name),
                        format!("'{}' is not defined in the Auth of API '{}'", name, api_id),
                    ));
                }
                requirements.push((name.to_string(), route_auth.authorization_scopes.clone()));
            }
        }

        let api_key_required = route_auth
            .api_key_required
            .unwrap_or_else(|| auth.map(|a| a.api_key_required).unwrap_or(false));
        if api_key_required && editor.flavor() == ApiFlavor::Rest {
            editor.add_security_scheme(API_KEY_SCHEME, api_key_scheme());
            requirements.push((API_KEY_SCHEME.to_string(), Vec::new()));
        }
        Ok(requirements)
    }

    fn build_definition(
        api_id: &str,
        settings: ApiSettings,
        routes: &[Route],
        context: &PluginContext,
    ) -> Result<Option<Value>> {
        let mut editor = match settings.definition {
            None => match settings.flavor {
                ApiFlavor::Rest => ApiSpecEditor::new_rest(settings.openapi3),
                ApiFlavor::Http => ApiSpecEditor::new_http(),
            },
            Some(DefinitionSource::Body(body)) => {
                match ApiSpecEditor::from_document(settings.flavor, body) {
                    Some(editor) => editor,
                    None => {
                        warn!(%api_id, "DefinitionBody is not a literal definition, routes are not merged");
                        return Ok(None);
                    }
                }
            }
            Some(DefinitionSource::Uri(_)) => return Ok(None),
        };

        for route in routes {
            let uri = Self::integration_uri(route, context);
            let added =
                editor.add_lambda_integration(&route.path, &route.method, uri, route.http.as_ref());
            if !added {
                debug!(%api_id, path = %route.path, method = %route.method, "keeping existing operation");
                continue;
            }
            let requirements =
                Self::route_security(api_id, route, settings.auth.as_ref(), &mut editor)?;
            editor.add_security(&route.path, &route.method, &requirements);
        }

        if let Some(auth) = &settings.auth {
            for (name, config) in &auth.authorizers {
                editor.add_security_scheme(
                    name,
                    security_scheme(name, config, settings.flavor, &context.arns),
                );
            }
        }

        if let Some(cors) = &settings.rest_cors {
            for path in editor.path_names() {
                editor.add_rest_cors(&path, cors);
            }
        }
        match settings.http_cors {
            Some(HttpCors::Permissive) => editor.set_http_cors_permissive(),
            Some(HttpCors::Configured(configuration)) => editor.set_http_cors(configuration),
            None => {}
        }

        Ok(Some(editor.into_value()))
    }
}

impl Plugin for ApiSpecPlugin {
    fn name(&self) -> &'static str {
        "ApiSpecPlugin"
    }

    fn priority(&self) -> u32 {
        500
    }

    fn before_transform(&self, template: &mut Template, context: &PluginContext) -> Result<()> {
        let (mut rest_routes, mut http_routes) = Self::collect_routes(template);

        // Every API gets a definition, even without routes
        for (api_id, _) in template.resources_of_kind(ResourceKind::Api.type_name()) {
            rest_routes.entry(api_id.clone()).or_default();
        }
        for (api_id, _) in template.resources_of_kind(ResourceKind::HttpApi.type_name()) {
            http_routes.entry(api_id.clone()).or_default();
        }

        let targets = rest_routes
            .into_iter()
            .map(|(id, routes)| (id, routes, ResourceKind::Api))
            .chain(
                http_routes
                    .into_iter()
                    .map(|(id, routes)| (id, routes, ResourceKind::HttpApi)),
            );

        for (api_id, routes, kind) in targets {
            let Some(settings) = Self::decode_settings(template, &api_id, kind) else {
                continue;
            };
            let Some(definition) = Self::build_definition(&api_id, settings, &routes, context)?
            else {
                continue;
            };
            debug!(%api_id, routes = routes.len(), "updated API definition");
            if let Some(resource) = template.resources.get_mut(&api_id) {
                resource
                    .properties
                    .insert("DefinitionBody".to_string(), definition);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::ImplicitApiPlugin;
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

    fn run(json: serde_json::Value) -> serde_json::Value {
        let mut t = Template::from_value(Value::from(json)).unwrap();
        ImplicitApiPlugin::rest().before_transform(&mut t, &context()).unwrap();
        ImplicitApiPlugin::http().before_transform(&mut t, &context()).unwrap();
        ApiSpecPlugin.before_transform(&mut t, &context()).unwrap();
        serde_json::to_value(&t).unwrap()
    }

    #[test]
    fn test_rest_api_without_routes_gets_empty_definition() {
        let out = run(json!({
            "Resources": {
                "MyApi": {"Type": "AWS::Serverless::Api", "Properties": {"StageName": "prod"}}
            }
        }));
        let body = &out["Resources"]["MyApi"]["Properties"]["DefinitionBody"];
        assert_eq!(body["swagger"], "2.0");
        assert_eq!(body["paths"], json!({}));
    }

    #[test]
    fn test_rest_api_with_uri_is_left_alone() {
        let out = run(json!({
            "Resources": {
                "MyApi": {
                    "Type": "AWS::Serverless::Api",
                    "Properties": {"StageName": "prod", "DefinitionUri": "s3://bucket/api.yaml"}
                }
            }
        }));
        assert!(out["Resources"]["MyApi"]["Properties"]
            .get("DefinitionBody")
            .is_none());
    }

    #[test]
    fn test_generates_implicit_rest_definition() {
        let out = run(json!({
            "Resources": {
                "UsersFunction": {
                    "Type": "AWS::Serverless::Function",
                    "Properties": {
                        "Events": {"List": {"Type": "Api", "Properties": {"Path": "/users", "Method": "GET"}}}
                    }
                }
            }
        }));
        let body = &out["Resources"]["ServerlessRestApi"]["Properties"]["DefinitionBody"];
        assert_eq!(body["swagger"], "2.0");
        let integration = &body["paths"]["/users"]["get"]["x-amazon-apigateway-integration"];
        assert_eq!(integration["type"], "aws_proxy");
        assert!(integration["uri"]["Fn::Sub"]
            .as_str()
            .unwrap()
            .contains("${UsersFunction.Arn}"));
    }

    #[test]
    fn test_alias_integration() {
        let out = run(json!({
            "Resources": {
                "Fn": {
                    "Type": "AWS::Serverless::Function",
                    "Properties": {
                        "AutoPublishAlias": "live",
                        "Events": {"E": {"Type": "HttpApi"}}
                    }
                }
            }
        }));
        let body = &out["Resources"]["ServerlessHttpApi"]["Properties"]["DefinitionBody"];
        let uri = body["paths"]["$default"]["x-amazon-apigateway-any-method"]
            ["x-amazon-apigateway-integration"]["uri"]["Fn::Sub"]
            .as_str()
            .unwrap();
        assert!(uri.contains("${FnAliaslive}"), "{}", uri);
    }

    #[test]
    fn test_merges_into_existing_body() {
        let out = run(json!({
            "Resources": {
                "MyApi": {
                    "Type": "AWS::Serverless::Api",
                    "Properties": {
                        "StageName": "dev",
                        "DefinitionBody": {
                            "openapi": "3.0.1",
                            "paths": {"/users": {"get": {"x-keep": 1}}}
                        }
                    }
                },
                "Fn": {
                    "Type": "AWS::Serverless::Function",
                    "Properties": {
                        "Events": {
                            "Get": {"Type": "Api", "Properties": {"Path": "/users", "Method": "get", "RestApiId": {"Ref": "MyApi"}}},
                            "Post": {"Type": "Api", "Properties": {"Path": "/users", "Method": "post", "RestApiId": {"Ref": "MyApi"}}}
                        }
                    }
                }
            }
        }));
        let paths = &out["Resources"]["MyApi"]["Properties"]["DefinitionBody"]["paths"]["/users"];
        assert_eq!(paths["get"], json!({"x-keep": 1}));
        assert!(paths["post"]["x-amazon-apigateway-integration"].is_object());
        assert!(out["Resources"].get("ServerlessRestApi").is_none());
    }

    #[test]
    fn test_default_authorizer_and_opt_out() {
        let out = run(json!({
            "Resources": {
                "MyApi": {
                    "Type": "AWS::Serverless::Api",
                    "Properties": {
                        "StageName": "prod",
                        "Auth": {
                            "DefaultAuthorizer": "Cognito",
                            "Authorizers": {"Cognito": {"UserPoolArn": "arn:aws:cognito-idp:us-east-1:123456789012:userpool/p"}}
                        }
                    }
                },
                "Fn": {
                    "Type": "AWS::Serverless::Function",
                    "Properties": {
                        "Events": {
                            "Secure": {"Type": "Api", "Properties": {"Path": "/secure", "Method": "get", "RestApiId": {"Ref": "MyApi"}, "Auth": {"AuthorizationScopes": ["read"]}}},
                            "Open": {"Type": "Api", "Properties": {"Path": "/open", "Method": "get", "RestApiId": {"Ref": "MyApi"}, "Auth": {"Authorizer": "NONE"}}}
                        }
                    }
                }
            }
        }));
        let body = &out["Resources"]["MyApi"]["Properties"]["DefinitionBody"];
        assert_eq!(body["paths"]["/secure"]["get"]["security"], json!([{"Cognito": ["read"]}]));
        assert!(body["paths"]["/open"]["get"].get("security").is_none());
        assert_eq!(
            body["securityDefinitions"]["Cognito"]["x-amazon-apigateway-authtype"],
            "cognito_user_pools"
        );
    }

    #[test]
    fn test_undefined_route_authorizer_fails() {
        let mut t = Template::from_value(Value::from(json!({
            "Resources": {
                "Fn": {
                    "Type": "AWS::Serverless::Function",
                    "Properties": {
                        "Events": {"E": {"Type": "Api", "Properties": {"Path": "/", "Method": "get", "Auth": {"Authorizer": "Missing"}}}}
                    }
                }
            }
        })))
        .unwrap();
        ImplicitApiPlugin::rest().before_transform(&mut t, &context()).unwrap();
        let err = ApiSpecPlugin.before_transform(&mut t, &context()).unwrap_err();
        assert!(err.to_string().contains("Missing"));
    }
}
