//! `AWS::Serverless::HttpApi` conversion

use super::api::authorizer_permissions;
use super::{ConversionContext, Converted};
use crate::logical_id::LogicalIdGenerator;
use sam_translator_common::{Map, Resource, Result, TransformError, Value};
use sam_translator_parser::model::{DefinitionSource, HttpApiProperties, HTTP_DEFAULT_STAGE};

pub fn convert(
    logical_id: &str,
    props: HttpApiProperties,
    context: &ConversionContext,
) -> Result<Converted> {
    let mut api = Resource::new("AWS::ApiGatewayV2::Api");
    api = match &props.definition {
        Some(DefinitionSource::Body(body)) => api.with_property("Body", body.clone()),
        Some(DefinitionSource::Uri(location)) => {
            let mut s3 = Map::new();
            s3.insert("Bucket".to_string(), location.bucket.clone());
            s3.insert("Key".to_string(), location.key.clone());
            if let Some(version) = &location.version {
                s3.insert("Version".to_string(), version.clone());
            }
            api.with_property("BodyS3Location", Value::Map(s3))
        }
        None => {
            return Err(TransformError::invalid_property(
                logical_id,
                "DefinitionBody",
                "or DefinitionUri is required",
            ))
        }
    };
    api = api
        .with_optional("Name", props.name.clone())
        .with_optional("Description", props.description.clone())
        .with_optional("FailOnWarnings", props.fail_on_warnings.clone())
        .with_optional(
            "DisableExecuteApiEndpoint",
            props.disable_execute_api_endpoint.clone(),
        );
    // V2 tags are a plain map
    let mut tags = props.tags.clone().unwrap_or_default();
    tags.insert("httpapi:createdBy".to_string(), Value::from("SAM"));
    api = api.with_property("Tags", Value::Map(tags.clone()));
    for (key, value) in &props.extra {
        api.properties
            .entry(key.clone())
            .or_insert_with(|| value.clone());
    }

    let stage_id = match props.stage_name.as_str() {
        Some(HTTP_DEFAULT_STAGE) => LogicalIdGenerator::generate(&[logical_id, "ApiGatewayDefaultStage"]),
        Some(stage) => LogicalIdGenerator::generate(&[logical_id, stage, "Stage"]),
        None => LogicalIdGenerator::generate(&[logical_id, "Stage"]),
    };

    let mut converted = Converted::new(logical_id, api);
    converted.add(
        stage_id,
        Resource::new("AWS::ApiGatewayV2::Stage")
            .with_property("ApiId", Value::reference(logical_id))
            .with_property("StageName", props.stage_name.clone())
            .with_property("AutoDeploy", true)
            .with_optional("StageVariables", props.stage_variables.clone())
            .with_optional("AccessLogSettings", props.access_log_settings.clone())
            .with_optional("DefaultRouteSettings", props.default_route_settings.clone())
            .with_optional("RouteSettings", props.route_settings.clone())
            .with_property("Tags", Value::Map(tags)),
    );

    if let Some(auth) = &props.auth {
        authorizer_permissions(logical_id, auth, context, &mut converted);
    }
    Ok(converted)
}
