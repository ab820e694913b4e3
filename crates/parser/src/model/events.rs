//! Event source declarations on functions and state machines

use crate::PropertyReader;
use sam_translator_common::{Result, Value};

/// A named event declared under `Events`
#[derive(Debug, Clone, PartialEq)]
pub struct EventSource {
    pub name: String,
    pub kind: EventKind,
}

/// Decoded event, one variant per supported `Type`
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    Api(ApiEvent),
    HttpApi(HttpApiEvent),
    S3(S3Event),
    Sns(SnsEvent),
    Sqs(SqsEvent),
    Kinesis(StreamEvent),
    DynamoDb(StreamEvent),
    Schedule(ScheduleEvent),
    EventBridgeRule(RuleEvent),
    CloudWatchLogs(LogsEvent),
}

impl EventKind {
    /// The `Type` string the event was declared with
    pub fn type_name(&self) -> &'static str {
        match self {
            EventKind::Api(_) => "Api",
            EventKind::HttpApi(_) => "HttpApi",
            EventKind::S3(_) => "S3",
            EventKind::Sns(_) => "SNS",
            EventKind::Sqs(_) => "SQS",
            EventKind::Kinesis(_) => "Kinesis",
            EventKind::DynamoDb(_) => "DynamoDB",
            EventKind::Schedule(_) => "Schedule",
            EventKind::EventBridgeRule(_) => "EventBridgeRule",
            EventKind::CloudWatchLogs(_) => "CloudWatchLogs",
        }
    }
}

/// Per-route auth override
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteAuth {
    /// Authorizer name, or `NONE` to opt out of the API default
    pub authorizer: Option<String>,
    pub authorization_scopes: Vec<String>,
    pub api_key_required: Option<bool>,
}

impl RouteAuth {
    pub const NONE: &'static str = "NONE";

    fn take(reader: &mut PropertyReader) -> Result<Option<Self>> {
        let Some(mut auth) = reader.optional_reader("Auth")? else {
            return Ok(None);
        };
        Ok(Some(Self {
            authorizer: auth.optional_string("Authorizer")?,
            authorization_scopes: auth.string_list("AuthorizationScopes")?,
            api_key_required: auth.optional_bool("ApiKeyRequired")?,
        }))
    }
}

/// REST route bound to the function
#[derive(Debug, Clone, PartialEq)]
pub struct ApiEvent {
    pub path: String,
    /// Lower-cased HTTP method (`any` for every method)
    pub method: String,
    /// Explicit API, `None` for the implicit one
    pub rest_api_id: Option<String>,
    pub auth: Option<RouteAuth>,
    pub request_parameters: Option<Value>,
}

/// HTTP API route bound to the function
#[derive(Debug, Clone, PartialEq)]
pub struct HttpApiEvent {
    /// `None` together with `method` means the `$default` route
    pub path: Option<String>,
    pub method: Option<String>,
    pub api_id: Option<String>,
    pub auth: Option<RouteAuth>,
    pub payload_format_version: Option<String>,
    pub timeout_in_millis: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct S3Event {
    /// Logical id of an `AWS::S3::Bucket` in the same template
    pub bucket: String,
    pub events: Value,
    pub filter: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SnsEvent {
    pub topic: Value,
    pub filter_policy: Option<Value>,
    pub region: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqsEvent {
    pub queue: Value,
    pub batch_size: Option<Value>,
    pub enabled: Option<Value>,
    pub maximum_batching_window: Option<Value>,
}

/// Kinesis or DynamoDB stream
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEvent {
    pub stream: Value,
    pub starting_position: Value,
    pub batch_size: Option<Value>,
    pub enabled: Option<Value>,
    pub maximum_batching_window: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleEvent {
    pub schedule: Value,
    pub name: Option<Value>,
    pub description: Option<Value>,
    pub enabled: Option<bool>,
    pub input: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleEvent {
    pub pattern: Value,
    pub event_bus_name: Option<Value>,
    pub input: Option<Value>,
    pub input_path: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogsEvent {
    pub log_group_name: Value,
    pub filter_pattern: Value,
}

/// Decode the `Events` property of a resource
pub fn take_events(reader: &mut PropertyReader) -> Result<Vec<EventSource>> {
    let mut events = Vec::new();
    for (name, mut entry) in reader.named_entries("Events")? {
        let event_type = entry.required_string("Type")?;
        let mut props = match entry.optional_reader("Properties")? {
            Some(props) => props,
            None => entry.nested("Properties", Default::default()),
        };
        let kind = decode_event(&event_type, &mut props)
            .ok_or_else(|| entry.error("Type", format!("'{}' is not a supported event type", event_type)))??;
        events.push(EventSource { name, kind });
    }
    Ok(events)
}

fn decode_event(event_type: &str, props: &mut PropertyReader) -> Option<Result<EventKind>> {
    let decoded = match event_type {
        "Api" => api_event(props).map(EventKind::Api),
        "HttpApi" => http_api_event(props).map(EventKind::HttpApi),
        "S3" => s3_event(props).map(EventKind::S3),
        "SNS" => sns_event(props).map(EventKind::Sns),
        "SQS" => sqs_event(props).map(EventKind::Sqs),
        "Kinesis" => stream_event(props).map(EventKind::Kinesis),
        "DynamoDB" => stream_event(props).map(EventKind::DynamoDb),
        "Schedule" => schedule_event(props).map(EventKind::Schedule),
        "EventBridgeRule" | "CloudWatchEvent" => rule_event(props).map(EventKind::EventBridgeRule),
        "CloudWatchLogs" => logs_event(props).map(EventKind::CloudWatchLogs),
        _ => return None,
    };
    Some(decoded)
}

fn api_event(props: &mut PropertyReader) -> Result<ApiEvent> {
    Ok(ApiEvent {
        path: props.required_string("Path")?,
        method: props.required_string("Method")?.to_lowercase(),
        rest_api_id: props.optional_logical_id("RestApiId")?,
        auth: RouteAuth::take(props)?,
        request_parameters: props.optional("RequestParameters"),
    })
}

fn http_api_event(props: &mut PropertyReader) -> Result<HttpApiEvent> {
    let path = props.optional_string("Path")?;
    let method = props.optional_string("Method")?.map(|m| m.to_lowercase());
    if path.is_some() != method.is_some() {
        return Err(props.error("Path", "and Method must be declared together"));
    }
    Ok(HttpApiEvent {
        path,
        method,
        api_id: props.optional_logical_id("ApiId")?,
        auth: RouteAuth::take(props)?,
        payload_format_version: props.optional_string("PayloadFormatVersion")?,
        timeout_in_millis: props.optional("TimeoutInMillis"),
    })
}

fn s3_event(props: &mut PropertyReader) -> Result<S3Event> {
    let bucket = match props.optional("Bucket") {
        Some(value) => value
            .ref_target()
            .map(str::to_string)
            .ok_or_else(|| props.error("Bucket", "must be a Ref to a bucket in this template"))?,
        None => return Err(props.error("Bucket", "is required")),
    };
    Ok(S3Event {
        bucket,
        events: props.required("Events")?,
        filter: props.optional("Filter"),
    })
}

fn sns_event(props: &mut PropertyReader) -> Result<SnsEvent> {
    Ok(SnsEvent {
        topic: props.required("Topic")?,
        filter_policy: props.optional("FilterPolicy"),
        region: props.optional("Region"),
    })
}

fn sqs_event(props: &mut PropertyReader) -> Result<SqsEvent> {
    Ok(SqsEvent {
        queue: props.required("Queue")?,
        batch_size: props.optional("BatchSize"),
        enabled: props.optional("Enabled"),
        maximum_batching_window: props.optional("MaximumBatchingWindowInSeconds"),
    })
}

fn stream_event(props: &mut PropertyReader) -> Result<StreamEvent> {
    Ok(StreamEvent {
        stream: props.required("Stream")?,
        starting_position: props.required("StartingPosition")?,
        batch_size: props.optional("BatchSize"),
        enabled: props.optional("Enabled"),
        maximum_batching_window: props.optional("MaximumBatchingWindowInSeconds"),
    })
}

fn schedule_event(props: &mut PropertyReader) -> Result<ScheduleEvent> {
    Ok(ScheduleEvent {
        schedule: props.required("Schedule")?,
        name: props.optional("Name"),
        description: props.optional("Description"),
        enabled: props.optional_bool("Enabled")?,
        input: props.optional("Input"),
    })
}

fn rule_event(props: &mut PropertyReader) -> Result<RuleEvent> {
    Ok(RuleEvent {
        pattern: props.required("Pattern")?,
        event_bus_name: props.optional("EventBusName"),
        input: props.optional("Input"),
        input_path: props.optional("InputPath"),
    })
}

fn logs_event(props: &mut PropertyReader) -> Result<LogsEvent> {
    Ok(LogsEvent {
        log_group_name: props.required("LogGroupName")?,
        filter_pattern: props.required("FilterPattern")?,
    })
}
