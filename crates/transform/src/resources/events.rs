//! Function event sources
//!
//! Each event becomes the resource that delivers it (subscription, mapping,
//! rule, ...) plus an `AWS::Lambda::Permission` when the source service
//! invokes the function itself.

use super::{ConversionContext, Converted};
use crate::logical_id::LogicalIdGenerator;
use crate::plugins::{IMPLICIT_HTTP_API, IMPLICIT_REST_API};
use sam_translator_common::{Map, Resource, Result, TransformError, Value};
use sam_translator_parser::model::{
    EventKind, EventSource, LogsEvent, RuleEvent, S3Event, ScheduleEvent, SnsEvent, SqsEvent,
    StreamEvent,
};
use sam_translator_parser::ResourceKind;

/// Managed policies polling event sources need on the execution role
pub const SQS_EXECUTION_POLICY: &str = "service-role/AWSLambdaSQSQueueExecutionRole";
pub const KINESIS_EXECUTION_POLICY: &str = "service-role/AWSLambdaKinesisExecutionRole";
pub const DYNAMODB_EXECUTION_POLICY: &str = "service-role/AWSLambdaDynamoDBExecutionRole";

const PERMISSION_TYPE: &str = "AWS::Lambda::Permission";

/// The function (or alias) events are delivered to
pub struct EventTarget<'a> {
    pub function_id: &'a str,
    /// Function or alias ARN
    pub arn: Value,
}

/// Convert every event of a function.
///
/// # Returns
/// * Managed policy names the execution role needs for polled sources
pub fn convert(
    target: &EventTarget,
    events: &[EventSource],
    context: &ConversionContext,
    converted: &mut Converted,
) -> Result<Vec<&'static str>> {
    let mut managed = Vec::new();
    for event in events {
        let ids = EventIds::new(target.function_id, &event.name);
        match &event.kind {
            EventKind::Api(api) => {
                let api_id = route_api(
                    target,
                    &event.name,
                    api.rest_api_id.as_deref(),
                    ResourceKind::Api,
                    "RestApiId",
                    context,
                )?;
                let method = route_method(&api.method);
                converted.add(
                    ids.permission(),
                    api_permission(target, &api_id, &method, &api.path, context),
                );
            }
            EventKind::HttpApi(route) => {
                let api_id = route_api(
                    target,
                    &event.name,
                    route.api_id.as_deref(),
                    ResourceKind::HttpApi,
                    "ApiId",
                    context,
                )?;
                let (method, path) = match (&route.method, &route.path) {
                    (Some(method), Some(path)) => (route_method(method), path.clone()),
                    _ => ("*".to_string(), "/*".to_string()),
                };
                converted.add(
                    ids.permission(),
                    api_permission(target, &api_id, &method, &path, context),
                );
            }
            EventKind::S3(s3) => s3_event(target, &event.name, &ids, s3, context, converted)?,
            EventKind::Sns(sns) => sns_event(target, &ids, sns, converted),
            EventKind::Sqs(sqs) => {
                converted.add(ids.source(), sqs_mapping(target, sqs));
                managed.push(SQS_EXECUTION_POLICY);
            }
            EventKind::Kinesis(stream) => {
                converted.add(ids.source(), stream_mapping(target, stream));
                managed.push(KINESIS_EXECUTION_POLICY);
            }
            EventKind::DynamoDb(stream) => {
                converted.add(ids.source(), stream_mapping(target, stream));
                managed.push(DYNAMODB_EXECUTION_POLICY);
            }
            EventKind::Schedule(schedule) => {
                converted.add(ids.source(), schedule_rule(schedule, ids.target(), &target.arn));
                converted.add(ids.permission(), rule_permission(target, &ids.source()));
            }
            EventKind::EventBridgeRule(rule) => {
                converted.add(ids.source(), event_rule(rule, ids.target(), &target.arn));
                converted.add(ids.permission(), rule_permission(target, &ids.source()));
            }
            EventKind::CloudWatchLogs(logs) => {
                logs_subscription(target, &ids, logs, context, converted)
            }
        }
    }
    managed.sort_unstable();
    managed.dedup();
    Ok(managed)
}

/// Logical ids derived from a function and one of its events
struct EventIds {
    source: String,
}

impl EventIds {
    fn new(function_id: &str, event_name: &str) -> Self {
        Self {
            source: LogicalIdGenerator::generate(&[function_id, event_name]),
        }
    }

    /// The delivering resource (mapping, rule, subscription, ...)
    fn source(&self) -> String {
        self.source.clone()
    }

    fn permission(&self) -> String {
        LogicalIdGenerator::generate(&[&self.source, "Permission"])
    }

    /// `Id` of the rule target
    fn target(&self) -> String {
        LogicalIdGenerator::generate(&[&self.source, "LambdaTarget"])
    }
}

/// Resolve the API a route belongs to, checking an explicit reference
fn route_api(
    target: &EventTarget,
    event_name: &str,
    explicit: Option<&str>,
    kind: ResourceKind,
    property: &str,
    context: &ConversionContext,
) -> Result<String> {
    let Some(api_id) = explicit else {
        return Ok(match kind {
            ResourceKind::HttpApi => IMPLICIT_HTTP_API.to_string(),
            _ => IMPLICIT_REST_API.to_string(),
        });
    };
    let declared = context
        .source
        .resources
        .get(api_id)
        .map(|resource| resource.kind.as_str());
    if declared != Some(kind.type_name()) {
        return Err(TransformError::invalid_property(
            target.function_id,
            format!("Events.{}.Properties.{}", event_name, property),
            format!("must reference an {} in this template", kind.type_name()),
        ));
    }
    Ok(api_id.to_string())
}

fn route_method(method: &str) -> String {
    if method.eq_ignore_ascii_case("any") {
        "*".to_string()
    } else {
        method.to_uppercase()
    }
}

/// Path with every `{parameter}` segment widened to `*`
fn wildcard_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if segment.starts_with('{') && segment.ends_with('}') {
                "*"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn permission(target: &EventTarget, principal: &str) -> Resource {
    Resource::new(PERMISSION_TYPE)
        .with_property("Action", "lambda:InvokeFunction")
        .with_property("FunctionName", target.arn.clone())
        .with_property("Principal", principal)
}

fn api_permission(
    target: &EventTarget,
    api_id: &str,
    method: &str,
    path: &str,
    context: &ConversionContext,
) -> Resource {
    let mut variables = Map::new();
    variables.insert("__ApiId__".to_string(), Value::reference(api_id));
    let source_arn = context
        .arns
        .execute_api("${__ApiId__}", "*", method, &wildcard_path(path));
    permission(target, "apigateway.amazonaws.com")
        .with_property("SourceArn", Value::sub_with(source_arn.to_string(), variables))
}

fn rule_permission(target: &EventTarget, rule_id: &str) -> Resource {
    permission(target, "events.amazonaws.com")
        .with_property("SourceArn", Value::get_att(rule_id, "Arn"))
}

fn s3_event(
    target: &EventTarget,
    event_name: &str,
    ids: &EventIds,
    s3: &S3Event,
    context: &ConversionContext,
    converted: &mut Converted,
) -> Result<()> {
    let existing = converted
        .updates
        .iter()
        .rev()
        .find(|(id, _)| *id == s3.bucket)
        .map(|(_, bucket)| bucket)
        .or_else(|| context.output.get(&s3.bucket))
        .filter(|bucket| bucket.kind == "AWS::S3::Bucket")
        .cloned();
    let Some(mut bucket) = existing else {
        return Err(TransformError::invalid_property(
            target.function_id,
            format!("Events.{}.Properties.Bucket", event_name),
            format!("'{}' is not an AWS::S3::Bucket in this template", s3.bucket),
        ));
    };

    let permission_id = ids.permission();
    converted.add(
        permission_id.clone(),
        permission(target, "s3.amazonaws.com")
            .with_property("SourceAccount", Value::reference("AWS::AccountId")),
    );

    let event_names = match &s3.events {
        Value::List(items) => items.clone(),
        single => vec![single.clone()],
    };
    let configurations: Vec<Value> = event_names
        .into_iter()
        .map(|name| {
            let mut configuration = Map::new();
            configuration.insert("Event".to_string(), name);
            configuration.insert("Function".to_string(), target.arn.clone());
            if let Some(filter) = &s3.filter {
                configuration.insert("Filter".to_string(), filter.clone());
            }
            Value::Map(configuration)
        })
        .collect();

    let notification = bucket
        .properties
        .entry("NotificationConfiguration".to_string())
        .or_insert_with(|| Value::Map(Map::new()));
    if let Some(notification) = notification.as_map_mut() {
        let lambda = notification
            .entry("LambdaConfigurations".to_string())
            .or_insert_with(|| Value::List(Vec::new()));
        match lambda {
            Value::List(existing) => existing.extend(configurations),
            other => {
                let mut merged = vec![other.clone()];
                merged.extend(configurations);
                *other = Value::List(merged);
            }
        }
    }
    bucket = bucket.with_depends_on(permission_id);

    converted.updates.retain(|(id, _)| *id != s3.bucket);
    converted.update(s3.bucket.clone(), bucket);
    Ok(())
}

fn sns_event(target: &EventTarget, ids: &EventIds, sns: &SnsEvent, converted: &mut Converted) {
    converted.add(
        ids.source(),
        Resource::new("AWS::SNS::Subscription")
            .with_property("Protocol", "lambda")
            .with_property("Endpoint", target.arn.clone())
            .with_property("TopicArn", sns.topic.clone())
            .with_optional("FilterPolicy", sns.filter_policy.clone())
            .with_optional("Region", sns.region.clone()),
    );
    converted.add(
        ids.permission(),
        permission(target, "sns.amazonaws.com").with_property("SourceArn", sns.topic.clone()),
    );
}

fn sqs_mapping(target: &EventTarget, sqs: &SqsEvent) -> Resource {
    Resource::new("AWS::Lambda::EventSourceMapping")
        .with_property("EventSourceArn", sqs.queue.clone())
        .with_property("FunctionName", target.arn.clone())
        .with_optional("BatchSize", sqs.batch_size.clone())
        .with_optional("Enabled", sqs.enabled.clone())
        .with_optional(
            "MaximumBatchingWindowInSeconds",
            sqs.maximum_batching_window.clone(),
        )
}

fn stream_mapping(target: &EventTarget, stream: &StreamEvent) -> Resource {
    Resource::new("AWS::Lambda::EventSourceMapping")
        .with_property("EventSourceArn", stream.stream.clone())
        .with_property("FunctionName", target.arn.clone())
        .with_property("StartingPosition", stream.starting_position.clone())
        .with_optional("BatchSize", stream.batch_size.clone())
        .with_optional("Enabled", stream.enabled.clone())
        .with_optional(
            "MaximumBatchingWindowInSeconds",
            stream.maximum_batching_window.clone(),
        )
}

fn rule_target(target_id: String, arn: &Value, input: Option<Value>, input_path: Option<Value>) -> Value {
    let mut entry = Map::new();
    entry.insert("Arn".to_string(), arn.clone());
    entry.insert("Id".to_string(), Value::from(target_id));
    if let Some(input) = input {
        entry.insert("Input".to_string(), input);
    }
    if let Some(input_path) = input_path {
        entry.insert("InputPath".to_string(), input_path);
    }
    Value::List(vec![Value::Map(entry)])
}

/// `AWS::Events::Rule` on a schedule expression
pub fn schedule_rule(schedule: &ScheduleEvent, target_id: String, arn: &Value) -> Resource {
    let state = schedule
        .enabled
        .map(|enabled| Value::from(if enabled { "ENABLED" } else { "DISABLED" }));
    Resource::new("AWS::Events::Rule")
        .with_property("ScheduleExpression", schedule.schedule.clone())
        .with_optional("Name", schedule.name.clone())
        .with_optional("Description", schedule.description.clone())
        .with_optional("State", state)
        .with_property("Targets", rule_target(target_id, arn, schedule.input.clone(), None))
}

/// `AWS::Events::Rule` on an event pattern
pub fn event_rule(rule: &RuleEvent, target_id: String, arn: &Value) -> Resource {
    Resource::new("AWS::Events::Rule")
        .with_property("EventPattern", rule.pattern.clone())
        .with_optional("EventBusName", rule.event_bus_name.clone())
        .with_property(
            "Targets",
            rule_target(target_id, arn, rule.input.clone(), rule.input_path.clone()),
        )
}

fn logs_subscription(
    target: &EventTarget,
    ids: &EventIds,
    logs: &LogsEvent,
    context: &ConversionContext,
    converted: &mut Converted,
) {
    let permission_id = ids.permission();
    let mut variables = Map::new();
    variables.insert("__LogGroupName__".to_string(), logs.log_group_name.clone());
    let source_arn = context.arns.log_group("${__LogGroupName__}").to_string();
    converted.add(
        permission_id.clone(),
        permission(target, "logs.amazonaws.com")
            .with_property("SourceArn", Value::sub_with(source_arn, variables)),
    );
    converted.add(
        ids.source(),
        Resource::new("AWS::Logs::SubscriptionFilter")
            .with_property("DestinationArn", target.arn.clone())
            .with_property("FilterPattern", logs.filter_pattern.clone())
            .with_property("LogGroupName", logs.log_group_name.clone())
            .with_depends_on(permission_id),
    );
}

#[cfg(test)]
mod tests {
    use super::super::testing::convert_template;
    use super::*;
    use serde_json::json;

    fn function_with_events(events: serde_json::Value, extra: serde_json::Value) -> serde_json::Value {
        let mut template = json!({
            "Resources": {
                "Fn": {
                    "Type": "AWS::Serverless::Function",
                    "Properties": {
                        "Handler": "index.handler",
                        "Runtime": "nodejs20.x",
                        "CodeUri": "s3://bucket/code.zip",
                        "Events": events
                    }
                }
            }
        });
        for (id, resource) in extra.as_object().unwrap() {
            template["Resources"][id] = resource.clone();
        }
        template
    }

    #[test]
    fn test_wildcard_path() {
        assert_eq!(wildcard_path("/users/{id}/orders"), "/users/*/orders");
        assert_eq!(wildcard_path("/"), "/");
        assert_eq!(route_method("any"), "*");
        assert_eq!(route_method("post"), "POST");
    }

    #[test]
    fn test_api_event_permission() {
        let out = convert_template(function_with_events(
            json!({"GetUser": {"Type": "Api", "Properties": {"Path": "/users/{id}", "Method": "get"}}}),
            json!({}),
        ))
        .unwrap();
        let permission = &out["Resources"]["FnGetUserPermission"]["Properties"];
        assert_eq!(permission["Principal"], "apigateway.amazonaws.com");
        assert_eq!(permission["FunctionName"], json!({"Fn::GetAtt": ["Fn", "Arn"]}));
        assert_eq!(
            permission["SourceArn"],
            json!({"Fn::Sub": [
                "arn:aws:execute-api:us-east-1:123456789012:${__ApiId__}/*/GET/users/*",
                {"__ApiId__": {"Ref": "ServerlessRestApi"}}
            ]})
        );
    }

    #[test]
    fn test_api_event_rejects_foreign_api() {
        let err = convert_template(function_with_events(
            json!({"Get": {"Type": "Api", "Properties": {"Path": "/", "Method": "get", "RestApiId": {"Ref": "Queue"}}}}),
            json!({"Queue": {"Type": "AWS::SQS::Queue"}}),
        ))
        .unwrap_err();
        assert!(err.to_string().contains("Events.Get.Properties.RestApiId"));
    }

    #[test]
    fn test_s3_event_updates_bucket() {
        let out = convert_template(function_with_events(
            json!({"Upload": {"Type": "S3", "Properties": {"Bucket": {"Ref": "Uploads"}, "Events": "s3:ObjectCreated:*"}}}),
            json!({"Uploads": {"Type": "AWS::S3::Bucket"}}),
        ))
        .unwrap();
        let bucket = &out["Resources"]["Uploads"];
        assert_eq!(bucket["DependsOn"], json!(["FnUploadPermission"]));
        assert_eq!(
            bucket["Properties"]["NotificationConfiguration"]["LambdaConfigurations"],
            json!([{"Event": "s3:ObjectCreated:*", "Function": {"Fn::GetAtt": ["Fn", "Arn"]}}])
        );
        assert_eq!(
            out["Resources"]["FnUploadPermission"]["Properties"]["SourceAccount"],
            json!({"Ref": "AWS::AccountId"})
        );
    }

    #[test]
    fn test_s3_event_requires_bucket_in_template() {
        let err = convert_template(function_with_events(
            json!({"Upload": {"Type": "S3", "Properties": {"Bucket": {"Ref": "Missing"}, "Events": "s3:ObjectCreated:*"}}}),
            json!({}),
        ))
        .unwrap_err();
        assert!(err.to_string().contains("Events.Upload.Properties.Bucket"));
    }

    #[test]
    fn test_polled_sources_add_managed_policies() {
        let out = convert_template(function_with_events(
            json!({
                "Jobs": {"Type": "SQS", "Properties": {"Queue": {"Fn::GetAtt": ["Queue", "Arn"]}, "BatchSize": 5}},
                "Changes": {"Type": "DynamoDB", "Properties": {"Stream": {"Fn::GetAtt": ["Table", "StreamArn"]}, "StartingPosition": "LATEST"}}
            }),
            json!({}),
        ))
        .unwrap();
        assert_eq!(out["Resources"]["FnJobs"]["Type"], "AWS::Lambda::EventSourceMapping");
        assert_eq!(out["Resources"]["FnChanges"]["Properties"]["StartingPosition"], "LATEST");
        let managed = out["Resources"]["FnRole"]["Properties"]["ManagedPolicyArns"]
            .as_array()
            .unwrap()
            .clone();
        assert!(managed.contains(&json!(
            "arn:aws:iam::aws:policy/service-role/AWSLambdaSQSQueueExecutionRole"
        )));
        assert!(managed.contains(&json!(
            "arn:aws:iam::aws:policy/service-role/AWSLambdaDynamoDBExecutionRole"
        )));
    }

    #[test]
    fn test_schedule_rule_targets_function() {
        let out = convert_template(function_with_events(
            json!({"Nightly": {"Type": "Schedule", "Properties": {"Schedule": "rate(1 day)", "Enabled": false}}}),
            json!({}),
        ))
        .unwrap();
        let rule = &out["Resources"]["FnNightly"]["Properties"];
        assert_eq!(rule["State"], "DISABLED");
        assert_eq!(rule["Targets"][0]["Id"], "FnNightlyLambdaTarget");
        assert_eq!(
            out["Resources"]["FnNightlyPermission"]["Properties"]["SourceArn"],
            json!({"Fn::GetAtt": ["FnNightly", "Arn"]})
        );
    }

    #[test]
    fn test_logs_subscription_waits_for_permission() {
        let out = convert_template(function_with_events(
            json!({"Logs": {"Type": "CloudWatchLogs", "Properties": {"LogGroupName": "app", "FilterPattern": "ERROR"}}}),
            json!({}),
        ))
        .unwrap();
        assert_eq!(out["Resources"]["FnLogs"]["DependsOn"], json!(["FnLogsPermission"]));
    }
}
