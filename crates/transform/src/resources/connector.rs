//! `AWS::Serverless::Connector` conversion
//!
//! A connector grants its source `Read` and/or `Write` access to each
//! destination. Sources with an execution role get a managed policy on that
//! role; services that cannot carry a role are granted access through the
//! destination's resource policy instead.

use super::iam;
use super::{object, ConversionContext, Converted};
use crate::logical_id::LogicalIdGenerator;
use sam_translator_common::{Intrinsic, Map, Resource, Result, TransformError, Value};
use sam_translator_parser::model::{ConnectorEndpoint, ConnectorPermission, ConnectorProperties};
use tracing::debug;

const FUNCTION: &str = "AWS::Lambda::Function";
const STATE_MACHINE: &str = "AWS::StepFunctions::StateMachine";
const TABLE: &str = "AWS::DynamoDB::Table";
const BUCKET: &str = "AWS::S3::Bucket";
const QUEUE: &str = "AWS::SQS::Queue";
const TOPIC: &str = "AWS::SNS::Topic";
const EVENT_BUS: &str = "AWS::Events::EventBus";
const RULE: &str = "AWS::Events::Rule";
const REST_API: &str = "AWS::ApiGateway::RestApi";
const HTTP_API: &str = "AWS::ApiGatewayV2::Api";

/// A connector endpoint with the attributes policies are written against
#[derive(Debug, Clone)]
struct Endpoint {
    kind: String,
    arn: Option<Value>,
    role_name: Option<Value>,
    queue_url: Option<Value>,
    /// Logical id when the endpoint is declared in the template
    logical_id: Option<String>,
}

pub fn convert(
    logical_id: &str,
    props: ConnectorProperties,
    context: &ConversionContext,
) -> Result<Converted> {
    let source = resolve(logical_id, "Source", &props.source, context)?;
    let many = props.destinations.len() > 1;

    let mut generated: Vec<(String, Resource)> = Vec::new();
    for (index, destination) in props.destinations.iter().enumerate() {
        let property = if many {
            format!("Destination[{}]", index)
        } else {
            "Destination".to_string()
        };
        let destination = resolve(logical_id, &property, destination, context)?;
        let suffix = if many {
            format!("Destination{}", index)
        } else {
            String::new()
        };
        debug!(%logical_id, source = %source.kind, destination = %destination.kind, "connecting");

        let resource = if let Some(role_name) = &source.role_name {
            let statements = role_statements(logical_id, &destination, &props.permissions)?;
            let id = LogicalIdGenerator::generate(&[logical_id, "Policy", &suffix]);
            let policy = Resource::new("AWS::IAM::ManagedPolicy")
                .with_property("PolicyDocument", iam::policy_document(statements))
                .with_property("Roles", Value::List(vec![role_name.clone()]));
            (id, policy)
        } else {
            resource_policy(logical_id, &source, &destination, &props.permissions, &suffix, context)?
        };
        generated.push(resource);
    }

    let mut generated = generated.into_iter();
    let Some((primary_id, primary)) = generated.next() else {
        return Err(TransformError::invalid_property(
            logical_id,
            "Destination",
            "must not be empty",
        ));
    };
    let mut converted = Converted::new(primary_id, primary);
    for (id, resource) in generated {
        converted.add(id, resource);
    }
    Ok(converted)
}

fn resolve(
    connector_id: &str,
    property: &str,
    endpoint: &ConnectorEndpoint,
    context: &ConversionContext,
) -> Result<Endpoint> {
    match endpoint {
        ConnectorEndpoint::Resource(id) => {
            let Some(kind) = context.kind_of(id) else {
                return Err(TransformError::invalid_property(
                    connector_id,
                    format!("{}.Id", property),
                    format!("'{}' is not a resource in this template", id),
                ));
            };
            Ok(from_resource(id, kind, context))
        }
        ConnectorEndpoint::External { kind, attributes } => Ok(Endpoint {
            kind: kind.clone(),
            arn: attributes.get("Arn").cloned(),
            role_name: attributes.get("RoleName").cloned(),
            queue_url: attributes.get("QueueUrl").cloned(),
            logical_id: None,
        }),
    }
}

fn from_resource(id: &str, kind: &str, context: &ConversionContext) -> Endpoint {
    let arn = match kind {
        TOPIC | STATE_MACHINE => Some(Value::reference(id)),
        REST_API | HTTP_API => None,
        _ => Some(Value::get_att(id, "Arn")),
    };
    let role_name = match kind {
        FUNCTION => role_of(id, "Role", context),
        STATE_MACHINE => role_of(id, "RoleArn", context),
        _ => None,
    };
    let queue_url = (kind == QUEUE).then(|| Value::reference(id));
    Endpoint {
        kind: kind.to_string(),
        arn,
        role_name,
        queue_url,
        logical_id: Some(id.to_string()),
    }
}

/// Name of the role behind a `GetAtt <Role>.Arn` role property
fn role_of(id: &str, property: &str, context: &ConversionContext) -> Option<Value> {
    let resource = context.output.get(id)?;
    match resource.property(property) {
        Some(Value::Intrinsic(intrinsic)) => match intrinsic.as_ref() {
            Intrinsic::GetAtt { resource, attribute } if attribute == "Arn" => {
                Some(Value::reference(resource.as_str()))
            }
            _ => None,
        },
        _ => None,
    }
}

fn unsupported(connector_id: &str, source: &Endpoint, destination: &Endpoint) -> TransformError {
    TransformError::invalid_property(
        connector_id,
        "Destination",
        format!(
            "connecting {} to {} is not supported",
            source.kind, destination.kind
        ),
    )
}

fn required_arn(connector_id: &str, endpoint: &Endpoint) -> Result<Value> {
    endpoint.arn.clone().ok_or_else(|| {
        TransformError::invalid_property(
            connector_id,
            "Destination",
            format!("{} needs an Arn", endpoint.kind),
        )
    })
}

fn sub_arn(arn: &Value, suffix: &str) -> Value {
    let mut variables = Map::new();
    variables.insert("DestinationArn".to_string(), arn.clone());
    Value::sub_with(format!("${{DestinationArn}}{}", suffix), variables)
}

/// Actions per permission for a destination type
fn actions(kind: &str, permission: ConnectorPermission) -> Option<&'static [&'static str]> {
    use ConnectorPermission::{Read, Write};
    let actions: &'static [&'static str] = match (kind, permission) {
        (TABLE, Read) => &[
            "dynamodb:GetItem",
            "dynamodb:Query",
            "dynamodb:Scan",
            "dynamodb:BatchGetItem",
            "dynamodb:ConditionCheckItem",
            "dynamodb:PartiQLSelect",
        ],
        (TABLE, Write) => &[
            "dynamodb:PutItem",
            "dynamodb:UpdateItem",
            "dynamodb:DeleteItem",
            "dynamodb:BatchWriteItem",
            "dynamodb:PartiQLDelete",
            "dynamodb:PartiQLInsert",
            "dynamodb:PartiQLUpdate",
        ],
        (BUCKET, Read) => &[
            "s3:GetObject",
            "s3:GetObjectAcl",
            "s3:GetObjectLegalHold",
            "s3:GetObjectRetention",
            "s3:GetObjectTorrent",
            "s3:GetObjectVersion",
            "s3:GetObjectVersionAcl",
            "s3:GetObjectVersionForReplication",
            "s3:GetObjectVersionTorrent",
            "s3:ListBucket",
            "s3:ListBucketMultipartUploads",
            "s3:ListBucketVersions",
            "s3:ListMultipartUploadParts",
        ],
        (BUCKET, Write) => &[
            "s3:AbortMultipartUpload",
            "s3:DeleteObject",
            "s3:DeleteObjectVersion",
            "s3:PutObject",
            "s3:PutObjectLegalHold",
            "s3:PutObjectRetention",
            "s3:RestoreObject",
        ],
        (QUEUE, Read) => &["sqs:ReceiveMessage", "sqs:GetQueueAttributes"],
        (QUEUE, Write) => &[
            "sqs:DeleteMessage",
            "sqs:SendMessage",
            "sqs:ChangeMessageVisibility",
            "sqs:PurgeQueue",
        ],
        (TOPIC, Write) => &["sns:Publish"],
        (FUNCTION, Write) => &["lambda:InvokeAsync", "lambda:InvokeFunction"],
        (STATE_MACHINE, Read) => &["states:DescribeStateMachine", "states:ListExecutions"],
        (STATE_MACHINE, Write) => &["states:StartExecution", "states:StartSyncExecution"],
        (EVENT_BUS, Write) => &["events:PutEvents"],
        _ => return None,
    };
    Some(actions)
}

fn role_statements(
    connector_id: &str,
    destination: &Endpoint,
    permissions: &[ConnectorPermission],
) -> Result<Vec<Value>> {
    let arn = required_arn(connector_id, destination)?;
    let resources = match destination.kind.as_str() {
        TABLE => Value::List(vec![arn.clone(), sub_arn(&arn, "/index/*")]),
        BUCKET => Value::List(vec![arn.clone(), sub_arn(&arn, "/*")]),
        _ => Value::List(vec![arn]),
    };

    let mut statements = Vec::new();
    for permission in permissions {
        let Some(granted) = actions(&destination.kind, *permission) else {
            return Err(TransformError::invalid_property(
                connector_id,
                "Permissions",
                format!(
                    "{:?} is not supported for destination {}",
                    permission, destination.kind
                ),
            ));
        };
        statements.push(iam::allow(granted, resources.clone()));
    }
    Ok(statements)
}

fn resource_policy(
    connector_id: &str,
    source: &Endpoint,
    destination: &Endpoint,
    permissions: &[ConnectorPermission],
    suffix: &str,
    context: &ConversionContext,
) -> Result<(String, Resource)> {
    let principal = match source.kind.as_str() {
        TOPIC => "sns.amazonaws.com",
        RULE => "events.amazonaws.com",
        REST_API | HTTP_API => "apigateway.amazonaws.com",
        _ => return Err(unsupported(connector_id, source, destination)),
    };
    if !matches!(permissions, [ConnectorPermission::Write]) {
        return Err(TransformError::invalid_property(
            connector_id,
            "Permissions",
            format!("only Write is supported from {}", source.kind),
        ));
    }
    let source_arn = match (&source.arn, source.kind.as_str(), &source.logical_id) {
        (Some(arn), _, _) => arn.clone(),
        (None, REST_API | HTTP_API, Some(api_id)) => {
            let mut variables = Map::new();
            variables.insert("__ApiId__".to_string(), Value::reference(api_id.as_str()));
            Value::sub_with(
                context.arns.execute_api("${__ApiId__}", "*", "*", "/*").to_string(),
                variables,
            )
        }
        _ => {
            return Err(TransformError::invalid_property(
                connector_id,
                "Source",
                format!("{} needs an Arn", source.kind),
            ))
        }
    };

    match destination.kind.as_str() {
        FUNCTION => {
            let id = LogicalIdGenerator::generate(&[connector_id, "WriteLambdaPermission", suffix]);
            let permission = Resource::new("AWS::Lambda::Permission")
                .with_property("Action", "lambda:InvokeFunction")
                .with_property("FunctionName", required_arn(connector_id, destination)?)
                .with_property("Principal", principal)
                .with_property("SourceArn", source_arn);
            Ok((id, permission))
        }
        QUEUE if principal != "apigateway.amazonaws.com" => {
            let queue_url = destination.queue_url.clone().ok_or_else(|| {
                TransformError::invalid_property(connector_id, "Destination", "queue needs a QueueUrl")
            })?;
            let statement = object([
                ("Effect", Value::from("Allow")),
                ("Action", Value::from("sqs:SendMessage")),
                ("Resource", required_arn(connector_id, destination)?),
                ("Principal", object([("Service", Value::from(principal))])),
                (
                    "Condition",
                    object([("ArnEquals", object([("aws:SourceArn", source_arn)]))]),
                ),
            ]);
            let id = LogicalIdGenerator::generate(&[connector_id, "QueuePolicy", suffix]);
            let policy = Resource::new("AWS::SQS::QueuePolicy")
                .with_property("Queues", Value::List(vec![queue_url]))
                .with_property("PolicyDocument", iam::policy_document(vec![statement]));
            Ok((id, policy))
        }
        _ => Err(unsupported(connector_id, source, destination)),
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::convert_template;
    use serde_json::json;

    fn with_connector(connector: serde_json::Value, resources: serde_json::Value) -> serde_json::Value {
        let mut template = json!({"Resources": resources});
        template["Resources"]["Conn"] = json!({"Type": "AWS::Serverless::Connector", "Properties": connector});
        template
    }

    fn function() -> serde_json::Value {
        json!({
            "Type": "AWS::Serverless::Function",
            "Properties": {"Handler": "index.handler", "Runtime": "python3.12", "CodeUri": "s3://b/k"}
        })
    }

    #[test]
    fn test_function_to_table() {
        let out = convert_template(with_connector(
            json!({"Source": {"Id": "Fn"}, "Destination": {"Id": "Table"}, "Permissions": ["Read", "Write"]}),
            json!({"Fn": function(), "Table": {"Type": "AWS::Serverless::SimpleTable"}}),
        ))
        .unwrap();
        let policy = &out["Resources"]["ConnPolicy"];
        assert_eq!(policy["Type"], "AWS::IAM::ManagedPolicy");
        assert_eq!(policy["Properties"]["Roles"], json!([{"Ref": "FnRole"}]));
        let statements = policy["Properties"]["PolicyDocument"]["Statement"].as_array().unwrap();
        assert_eq!(statements.len(), 2);
        assert_eq!(
            statements[0]["Resource"],
            json!([
                {"Fn::GetAtt": ["Table", "Arn"]},
                {"Fn::Sub": ["${DestinationArn}/index/*", {"DestinationArn": {"Fn::GetAtt": ["Table", "Arn"]}}]}
            ])
        );
        assert!(out["Resources"].get("Conn").is_none());
    }

    #[test]
    fn test_topic_to_function_permission() {
        let out = convert_template(with_connector(
            json!({"Source": {"Id": "Topic"}, "Destination": {"Id": "Fn"}, "Permissions": ["Write"]}),
            json!({"Fn": function(), "Topic": {"Type": "AWS::SNS::Topic"}}),
        ))
        .unwrap();
        let permission = &out["Resources"]["ConnWriteLambdaPermission"]["Properties"];
        assert_eq!(permission["Principal"], "sns.amazonaws.com");
        assert_eq!(permission["SourceArn"], json!({"Ref": "Topic"}));
        assert_eq!(permission["FunctionName"], json!({"Fn::GetAtt": ["Fn", "Arn"]}));
    }

    #[test]
    fn test_rule_to_queue_policy() {
        let out = convert_template(with_connector(
            json!({"Source": {"Id": "Rule"}, "Destination": {"Id": "Queue"}, "Permissions": ["Write"]}),
            json!({"Rule": {"Type": "AWS::Events::Rule"}, "Queue": {"Type": "AWS::SQS::Queue"}}),
        ))
        .unwrap();
        let policy = &out["Resources"]["ConnQueuePolicy"]["Properties"];
        assert_eq!(policy["Queues"], json!([{"Ref": "Queue"}]));
        assert_eq!(
            policy["PolicyDocument"]["Statement"][0]["Condition"]["ArnEquals"]["aws:SourceArn"],
            json!({"Fn::GetAtt": ["Rule", "Arn"]})
        );
    }

    #[test]
    fn test_multiple_destinations() {
        let out = convert_template(with_connector(
            json!({
                "Source": {"Id": "Fn"},
                "Destination": [{"Id": "Queue"}, {"Id": "Topic"}],
                "Permissions": ["Write"]
            }),
            json!({"Fn": function(), "Queue": {"Type": "AWS::SQS::Queue"}, "Topic": {"Type": "AWS::SNS::Topic"}}),
        ))
        .unwrap();
        assert!(out["Resources"].get("ConnPolicyDestination0").is_some());
        assert_eq!(
            out["Resources"]["ConnPolicyDestination1"]["Properties"]["PolicyDocument"]["Statement"][0]["Action"],
            json!(["sns:Publish"])
        );
    }

    #[test]
    fn test_unsupported_pair() {
        let err = convert_template(with_connector(
            json!({"Source": {"Id": "Queue"}, "Destination": {"Id": "Topic"}, "Permissions": ["Write"]}),
            json!({"Queue": {"Type": "AWS::SQS::Queue"}, "Topic": {"Type": "AWS::SNS::Topic"}}),
        ))
        .unwrap_err();
        assert!(err.to_string().contains("not supported"));
    }

    #[test]
    fn test_read_on_topic_rejected() {
        let err = convert_template(with_connector(
            json!({"Source": {"Id": "Fn"}, "Destination": {"Id": "Topic"}, "Permissions": ["Read"]}),
            json!({"Fn": function(), "Topic": {"Type": "AWS::SNS::Topic"}}),
        ))
        .unwrap_err();
        assert!(err.to_string().contains("Permissions"));
    }

    #[test]
    fn test_unknown_endpoint() {
        let err = convert_template(with_connector(
            json!({"Source": {"Id": "Missing"}, "Destination": {"Id": "Topic"}, "Permissions": ["Write"]}),
            json!({"Topic": {"Type": "AWS::SNS::Topic"}}),
        ))
        .unwrap_err();
        assert!(err.to_string().contains("Source.Id"));
    }
}
