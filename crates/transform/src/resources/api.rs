//! `AWS::Serverless::Api` conversion
//!
//! A REST API becomes the API itself, a deployment whose id tracks the
//! definition, and the stage that deployment is published to.

use super::{object, tag_list, ConversionContext, Converted};
use crate::logical_id::LogicalIdGenerator;
use sam_translator_common::{Map, Resource, Result, TransformError, Value};
use sam_translator_parser::model::{ApiAuth, ApiProperties, DefinitionSource, S3Location};
use tracing::debug;

/// Stage the deployment itself is created with. The real stage is a separate resource.
const DEPLOYMENT_STAGE: &str = "Stage";

pub fn convert(
    logical_id: &str,
    props: ApiProperties,
    context: &ConversionContext,
) -> Result<Converted> {
    let (body_key, body, fingerprint) = match &props.definition {
        Some(DefinitionSource::Body(body)) => ("Body", body.clone(), body.to_canonical_json()),
        Some(DefinitionSource::Uri(location)) => (
            "BodyS3Location",
            s3_location(location),
            location.fingerprint(),
        ),
        None => {
            return Err(TransformError::invalid_property(
                logical_id,
                "DefinitionBody",
                "or DefinitionUri is required",
            ))
        }
    };

    let endpoint = props.endpoint_configuration.clone().map(|endpoint| match endpoint {
        Value::String(kind) => object([("Types", Value::List(vec![Value::from(kind)]))]),
        other => other,
    });
    let tags = props.tags.as_ref().map(|tags| match tags {
        Value::Map(map) => tag_list(None, map),
        other => other.clone(),
    });

    let endpoint_type = endpoint
        .as_ref()
        .and_then(|endpoint| endpoint.get("Types"))
        .and_then(Value::as_list)
        .and_then(|types| types.first())
        .cloned();

    let mut api = Resource::new("AWS::ApiGateway::RestApi")
        .with_property(body_key, body)
        .with_optional("Name", props.name.clone())
        .with_optional("Description", props.description.clone())
        .with_optional("EndpointConfiguration", endpoint)
        .with_optional(
            "Parameters",
            endpoint_type.map(|kind| object([("endpointConfigurationTypes", kind)])),
        )
        .with_optional("BinaryMediaTypes", props.binary_media_types.clone())
        .with_optional("MinimumCompressionSize", props.minimum_compression_size.clone())
        .with_optional("Tags", tags.clone());
    for (key, value) in &props.extra {
        api.properties
            .entry(key.clone())
            .or_insert_with(|| value.clone());
    }

    let deployment_id = LogicalIdGenerator::generate_api_deployment_id(logical_id, &fingerprint);
    let stage_id = match props.stage_name.as_str() {
        Some(stage) => LogicalIdGenerator::generate(&[logical_id, stage, "Stage"]),
        None => LogicalIdGenerator::generate(&[logical_id, "Stage"]),
    };
    debug!(%logical_id, %deployment_id, %stage_id, "converting REST API");

    let mut converted = Converted::new(logical_id, api);
    converted.add(
        deployment_id.clone(),
        Resource::new("AWS::ApiGateway::Deployment")
            .with_property("RestApiId", Value::reference(logical_id))
            .with_property(
                "Description",
                format!("RestApi deployment id: {}", LogicalIdGenerator::digest(&fingerprint)),
            )
            .with_property("StageName", DEPLOYMENT_STAGE),
    );
    converted.add(
        stage_id,
        Resource::new("AWS::ApiGateway::Stage")
            .with_property("DeploymentId", Value::reference(deployment_id.as_str()))
            .with_property("RestApiId", Value::reference(logical_id))
            .with_property("StageName", props.stage_name.clone())
            .with_optional("Variables", props.variables.clone())
            .with_optional("MethodSettings", props.method_settings.clone())
            .with_optional("TracingEnabled", props.tracing_enabled.clone())
            .with_optional("CacheClusterEnabled", props.cache_cluster_enabled.clone())
            .with_optional("CacheClusterSize", props.cache_cluster_size.clone())
            .with_optional("AccessLogSetting", props.access_log_setting.clone())
            .with_optional("Tags", tags),
    );

    if let Some(auth) = &props.auth {
        authorizer_permissions(logical_id, auth, context, &mut converted);
    }
    Ok(converted)
}

fn s3_location(location: &S3Location) -> Value {
    let mut map = Map::new();
    map.insert("Bucket".to_string(), location.bucket.clone());
    map.insert("Key".to_string(), location.key.clone());
    if let Some(version) = &location.version {
        map.insert("Version".to_string(), version.clone());
    }
    Value::Map(map)
}

/// Let API Gateway invoke the function behind every Lambda authorizer
pub(super) fn authorizer_permissions(
    api_id: &str,
    auth: &ApiAuth,
    context: &ConversionContext,
    converted: &mut Converted,
) {
    for (name, authorizer) in &auth.authorizers {
        let Some(function_arn) = authorizer.lambda_arn() else {
            continue;
        };
        let mut variables = Map::new();
        variables.insert("__ApiId__".to_string(), Value::reference(api_id));
        let source_arn = context.arns.execute_api_authorizers("${__ApiId__}").to_string();
        converted.add(
            LogicalIdGenerator::generate(&[api_id, name, "AuthorizerPermission"]),
            Resource::new("AWS::Lambda::Permission")
                .with_property("Action", "lambda:InvokeFunction")
                .with_property("FunctionName", function_arn.clone())
                .with_property("Principal", "apigateway.amazonaws.com")
                .with_property("SourceArn", Value::sub_with(source_arn, variables)),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::convert_template;
    use super::*;
    use serde_json::json;

    fn api(properties: serde_json::Value) -> Result<serde_json::Value> {
        convert_template(json!({
            "Resources": {"MyApi": {"Type": "AWS::Serverless::Api", "Properties": properties}}
        }))
    }

    fn deployment_id(out: &serde_json::Value) -> String {
        out["Resources"]
            .as_object()
            .unwrap()
            .iter()
            .find(|(_, r)| r["Type"] == "AWS::ApiGateway::Deployment")
            .map(|(id, _)| id.clone())
            .unwrap()
    }

    #[test]
    fn test_rest_api_with_stage() {
        let out = api(json!({
            "StageName": "Prod",
            "DefinitionBody": {"swagger": "2.0", "paths": {}}
        }))
        .unwrap();
        let resources = &out["Resources"];
        assert_eq!(resources["MyApi"]["Type"], "AWS::ApiGateway::RestApi");
        assert_eq!(resources["MyApi"]["Properties"]["Body"]["swagger"], "2.0");

        let deployment = deployment_id(&out);
        assert!(deployment.starts_with("MyApiDeployment"));
        assert_eq!(deployment.len(), "MyApiDeployment".len() + 8);
        assert_eq!(resources[&deployment]["Properties"]["StageName"], "Stage");

        let stage = &resources["MyApiProdStage"]["Properties"];
        assert_eq!(stage["StageName"], "Prod");
        assert_eq!(stage["DeploymentId"], json!({"Ref": deployment}));
    }

    #[test]
    fn test_deployment_tracks_definition() {
        let first = api(json!({"StageName": "Prod", "DefinitionBody": {"paths": {"/a": {}}}})).unwrap();
        let same = api(json!({"StageName": "Prod", "DefinitionBody": {"paths": {"/a": {}}}})).unwrap();
        let changed = api(json!({"StageName": "Prod", "DefinitionBody": {"paths": {"/b": {}}}})).unwrap();
        assert_eq!(deployment_id(&first), deployment_id(&same));
        assert_ne!(deployment_id(&first), deployment_id(&changed));
    }

    #[test]
    fn test_definition_uri() {
        let out = api(json!({"StageName": "Prod", "DefinitionUri": "s3://bucket/api.yaml"})).unwrap();
        assert_eq!(
            out["Resources"]["MyApi"]["Properties"]["BodyS3Location"],
            json!({"Bucket": "bucket", "Key": "api.yaml"})
        );
    }

    #[test]
    fn test_definition_required() {
        let err = api(json!({"StageName": "Prod"})).unwrap_err();
        assert!(err.to_string().contains("DefinitionBody"));
    }

    #[test]
    fn test_regional_endpoint() {
        let out = api(json!({
            "StageName": "Prod",
            "DefinitionBody": {},
            "EndpointConfiguration": "REGIONAL"
        }))
        .unwrap();
        let props = &out["Resources"]["MyApi"]["Properties"];
        assert_eq!(props["EndpointConfiguration"], json!({"Types": ["REGIONAL"]}));
        assert_eq!(props["Parameters"], json!({"endpointConfigurationTypes": "REGIONAL"}));
    }

    #[test]
    fn test_lambda_authorizer_permission() {
        let out = api(json!({
            "StageName": "Prod",
            "DefinitionBody": {},
            "Auth": {"Authorizers": {"Token": {"FunctionArn": {"Fn::GetAtt": ["AuthFn", "Arn"]}}}}
        }))
        .unwrap();
        let permission = &out["Resources"]["MyApiTokenAuthorizerPermission"]["Properties"];
        assert_eq!(permission["FunctionName"], json!({"Fn::GetAtt": ["AuthFn", "Arn"]}));
        assert_eq!(
            permission["SourceArn"],
            json!({"Fn::Sub": [
                "arn:aws:execute-api:us-east-1:123456789012:${__ApiId__}/authorizers/*",
                {"__ApiId__": {"Ref": "MyApi"}}
            ]})
        );
    }
}
