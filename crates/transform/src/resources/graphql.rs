//! `AWS::Serverless::GraphQLApi` conversion
//!
//! One AppSync API plus its schema, keys, data sources, pipeline functions and
//! resolvers. Every resolver runs as a pipeline over the declared functions.

use super::iam;
use super::{object, tag_list, ConversionContext, Converted};
use crate::logical_id::LogicalIdGenerator;
use sam_translator_common::{Map, Resource, Result, Value};
use sam_translator_parser::model::{
    DataSource, DataSourceKind, GraphQLApiProperties, GraphQLSchema, S3Location,
};

const LOGS_POLICY: &str = "service-role/AWSAppSyncPushToCloudWatchLogs";
const APPSYNC_SERVICE: &str = "appsync.amazonaws.com";
const DYNAMODB_ACTIONS: &[&str] = &[
    "dynamodb:GetItem",
    "dynamodb:PutItem",
    "dynamodb:DeleteItem",
    "dynamodb:UpdateItem",
    "dynamodb:Query",
    "dynamodb:Scan",
    "dynamodb:BatchGetItem",
    "dynamodb:BatchWriteItem",
];

/// SAM auth setting names and the AppSync properties they map to
const AUTH_SETTINGS: &[(&str, &str)] = &[
    ("UserPool", "UserPoolConfig"),
    ("OpenIDConnect", "OpenIDConnectConfig"),
    ("LambdaAuthorizer", "LambdaAuthorizerConfig"),
    ("Additional", "AdditionalAuthenticationProviders"),
];

pub fn convert(
    logical_id: &str,
    props: GraphQLApiProperties,
    context: &ConversionContext,
) -> Result<Converted> {
    let api_id = Value::get_att(logical_id, "ApiId");

    let mut api = Resource::new("AWS::AppSync::GraphQLApi")
        .with_property(
            "Name",
            props.name.clone().unwrap_or_else(|| Value::from(logical_id)),
        )
        .with_property("AuthenticationType", props.auth.auth_type.clone())
        .with_optional("XrayEnabled", props.xray_enabled.clone());
    for (setting, property) in AUTH_SETTINGS {
        if let Some(value) = props.auth.settings.get(*setting) {
            api = api.with_property(property, value.clone());
        }
    }
    if let Some(tags) = &props.tags {
        api = api.with_property("Tags", tag_list(None, tags));
    }
    let logs_role_id = LogicalIdGenerator::generate(&[logical_id, "CloudWatchRole"]);
    let mut create_logs_role = false;
    if let Some(logging) = &props.logging {
        let role_arn = match logging.get("CloudWatchLogsRoleArn") {
            Some(arn) => arn.clone(),
            None => {
                create_logs_role = true;
                Value::get_att(&logs_role_id, "Arn")
            }
        };
        let mut config = Map::new();
        config.insert("CloudWatchLogsRoleArn".to_string(), role_arn);
        config.insert(
            "FieldLogLevel".to_string(),
            logging
                .get("FieldLogLevel")
                .cloned()
                .unwrap_or_else(|| Value::from("ALL")),
        );
        if let Some(exclude) = logging.get("ExcludeVerboseContent") {
            config.insert("ExcludeVerboseContent".to_string(), exclude.clone());
        }
        api = api.with_property("LogConfig", Value::Map(config));
    }
    for (key, value) in &props.extra {
        api.properties
            .entry(key.clone())
            .or_insert_with(|| value.clone());
    }

    let mut converted = Converted::new(logical_id, api);

    if create_logs_role {
        let managed = vec![Value::from(
            context.arns.aws_managed_policy(LOGS_POLICY).to_string(),
        )];
        converted.add(logs_role_id, iam::role(APPSYNC_SERVICE, managed, Vec::new()));
    }

    let schema_id = LogicalIdGenerator::generate(&[logical_id, "Schema"]);
    let schema = Resource::new("AWS::AppSync::GraphQLSchema").with_property("ApiId", api_id.clone());
    let schema = match &props.schema {
        GraphQLSchema::Inline(definition) => schema.with_property("Definition", definition.clone()),
        GraphQLSchema::Uri(location) => {
            schema.with_property("DefinitionS3Location", s3_uri(location))
        }
    };
    converted.add(schema_id.clone(), schema);

    for (name, settings) in &props.api_keys {
        let mut key = Resource::new("AWS::AppSync::ApiKey").with_property("ApiId", api_id.clone());
        for (setting, value) in settings {
            key.properties.insert(setting.clone(), value.clone());
        }
        converted.add(LogicalIdGenerator::generate(&[logical_id, name, "ApiKey"]), key);
    }

    for source in &props.data_sources {
        data_source(logical_id, &api_id, source, context, &mut converted);
    }

    for (name, function) in &props.functions {
        let source_id = LogicalIdGenerator::generate(&[logical_id, &function.data_source, "DataSource"]);
        converted.add(
            LogicalIdGenerator::generate(&[logical_id, name]),
            Resource::new("AWS::AppSync::FunctionConfiguration")
                .with_property("ApiId", api_id.clone())
                .with_property("Name", name.as_str())
                .with_property("DataSourceName", Value::get_att(&source_id, "Name"))
                .with_optional("Runtime", function.runtime.clone())
                .with_optional("Code", function.code.clone())
                .with_optional("CodeS3Location", function.code_uri.clone())
                .with_optional("Description", function.description.clone()),
        );
    }

    for resolver in &props.resolvers {
        let functions = resolver
            .pipeline
            .iter()
            .map(|name| {
                Value::get_att(&LogicalIdGenerator::generate(&[logical_id, name]), "FunctionId")
            })
            .collect();
        converted.add(
            LogicalIdGenerator::generate(&[
                logical_id,
                &resolver.type_name,
                &resolver.field_name,
                "Resolver",
            ]),
            Resource::new("AWS::AppSync::Resolver")
                .with_property("ApiId", api_id.clone())
                .with_property("TypeName", resolver.type_name.as_str())
                .with_property("FieldName", resolver.field_name.as_str())
                .with_property("Kind", "PIPELINE")
                .with_property("PipelineConfig", object([("Functions", Value::List(functions))]))
                .with_optional("Runtime", resolver.runtime.clone())
                .with_optional("Code", resolver.code.clone())
                .with_optional("CodeS3Location", resolver.code_uri.clone())
                .with_depends_on(schema_id.clone()),
        );
    }

    Ok(converted)
}

fn data_source(
    api_logical_id: &str,
    api_id: &Value,
    source: &DataSource,
    context: &ConversionContext,
    converted: &mut Converted,
) {
    let source_id = LogicalIdGenerator::generate(&[api_logical_id, &source.name, "DataSource"]);
    let role_id = LogicalIdGenerator::generate(&[api_logical_id, &source.name, "DataSourceRole"]);

    let (kind, config_key, config, statement) = match &source.kind {
        DataSourceKind::DynamoDb {
            table_name,
            table_arn,
        } => {
            let table_arn = table_arn.clone().unwrap_or_else(|| {
                let mut variables = Map::new();
                variables.insert("__TableName__".to_string(), table_name.clone());
                Value::sub_with(
                    context.arns.dynamodb_table("${__TableName__}").to_string(),
                    variables,
                )
            });
            let config = object([
                ("TableName", table_name.clone()),
                ("AwsRegion", Value::reference("AWS::Region")),
            ]);
            let statement = iam::allow(DYNAMODB_ACTIONS, table_arn);
            ("AMAZON_DYNAMODB", "DynamoDBConfig", config, statement)
        }
        DataSourceKind::Lambda { function_arn } => (
            "AWS_LAMBDA",
            "LambdaConfig",
            object([("LambdaFunctionArn", function_arn.clone())]),
            iam::allow(&["lambda:InvokeFunction"], function_arn.clone()),
        ),
    };

    let service_role = match &source.service_role_arn {
        Some(arn) => arn.clone(),
        None => {
            let policy = iam::inline_policy(
                &LogicalIdGenerator::generate(&[api_logical_id, &source.name, "DataSourcePolicy"]),
                iam::policy_document(vec![statement]),
            );
            converted.add(
                role_id.clone(),
                iam::role(APPSYNC_SERVICE, Vec::new(), vec![policy]),
            );
            Value::get_att(&role_id, "Arn")
        }
    };

    converted.add(
        source_id,
        Resource::new("AWS::AppSync::DataSource")
            .with_property("ApiId", api_id.clone())
            .with_property("Name", source.name.as_str())
            .with_property("Type", kind)
            .with_property(config_key, config)
            .with_property("ServiceRoleArn", service_role)
            .with_optional("Description", source.description.clone()),
    );
}

/// `s3://bucket/key`, joined at deploy time when either part is an expression
fn s3_uri(location: &S3Location) -> Value {
    match (location.bucket.as_str(), location.key.as_str()) {
        (Some(bucket), Some(key)) => Value::from(format!("s3://{}/{}", bucket, key)),
        _ => object([(
            "Fn::Join",
            Value::List(vec![
                Value::from(""),
                Value::List(vec![
                    Value::from("s3://"),
                    location.bucket.clone(),
                    Value::from("/"),
                    location.key.clone(),
                ]),
            ]),
        )]),
    }
}
