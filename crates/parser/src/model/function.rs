//! `AWS::Serverless::Function` properties

use super::events::{take_events, EventSource};
use super::location::S3Location;
use crate::PropertyReader;
use sam_translator_common::{Map, Result, Value};

/// Decoded function properties
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionProperties {
    pub handler: Option<String>,
    pub runtime: Option<String>,
    pub code: CodeLocation,
    pub function_name: Option<Value>,
    pub description: Option<Value>,
    pub memory_size: Option<Value>,
    pub timeout: Option<Value>,
    /// Existing execution role; suppresses role generation
    pub role: Option<Value>,
    pub policies: Vec<PolicyEntry>,
    pub environment: Option<Value>,
    pub vpc_config: Option<Value>,
    pub events: Vec<EventSource>,
    pub tags: Map,
    pub layers: Option<Value>,
    pub tracing: Option<String>,
    pub kms_key_arn: Option<Value>,
    pub dead_letter_queue: Option<DeadLetterQueue>,
    pub reserved_concurrent_executions: Option<Value>,
    pub auto_publish_alias: Option<String>,
    pub provisioned_concurrency: Option<Value>,
    pub deployment_preference: Option<DeploymentPreference>,
    pub architectures: Option<Value>,
    pub ephemeral_storage: Option<Value>,
    pub permissions_boundary: Option<Value>,
    pub assume_role_policy: Option<Value>,
    pub url_config: Option<FunctionUrlConfig>,
    /// Properties passed straight onto the generated function
    pub extra: Map,
}

/// Where the function code lives
#[derive(Debug, Clone, PartialEq)]
pub enum CodeLocation {
    S3(S3Location),
    Inline(Value),
    Image(Value),
}

/// One entry of `Policies`
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyEntry {
    /// Managed policy name or ARN
    Managed(Value),
    /// Inline policy document
    Document(Map),
    /// A policy template that was never expanded
    Template { name: String, parameters: Value },
}

impl PolicyEntry {
    fn decode(value: Value) -> Self {
        match value {
            Value::Map(map) if !map.contains_key("Statement") && map.len() == 1 => {
                let (name, parameters) = map
                    .into_iter()
                    .next()
                    .unwrap_or_default();
                PolicyEntry::Template { name, parameters }
            }
            Value::Map(map) => PolicyEntry::Document(map),
            other => PolicyEntry::Managed(other),
        }
    }
}

/// Decode `Policies`: a single name, a single document or a list of either
pub fn take_policies(reader: &mut PropertyReader) -> Result<Vec<PolicyEntry>> {
    Ok(match reader.optional("Policies") {
        None => Vec::new(),
        Some(Value::List(items)) => items.into_iter().map(PolicyEntry::decode).collect(),
        Some(single) => vec![PolicyEntry::decode(single)],
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeadLetterKind {
    Sqs,
    Sns,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeadLetterQueue {
    pub kind: DeadLetterKind,
    pub target_arn: Value,
}

/// Gradual deployment through CodeDeploy
#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentPreference {
    pub deployment_type: Value,
    pub enabled: bool,
    pub alarms: Option<Value>,
    pub hooks: Option<Map>,
    pub role: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionUrlConfig {
    /// `NONE` or `AWS_IAM`
    pub auth_type: String,
    pub cors: Option<Value>,
    pub invoke_mode: Option<Value>,
}

impl FunctionProperties {
    pub fn decode(mut reader: PropertyReader) -> Result<Self> {
        let package_type = reader.optional_string("PackageType")?;
        let is_image = package_type.as_deref() == Some("Image");
        let code = take_code(&mut reader, is_image)?;

        let handler = reader.optional_string("Handler")?;
        let runtime = reader.optional_string("Runtime")?;
        if !is_image {
            if handler.is_none() {
                return Err(reader.error("Handler", "is required"));
            }
            if runtime.is_none() {
                return Err(reader.error("Runtime", "is required"));
            }
        }

        let dead_letter_queue = take_dead_letter_queue(&mut reader)?;
        let deployment_preference = take_deployment_preference(&mut reader)?;
        let url_config = take_url_config(&mut reader)?;
        let events = take_events(&mut reader)?;
        let policies = take_policies(&mut reader)?;

        Ok(Self {
            handler,
            runtime,
            code,
            function_name: reader.optional("FunctionName"),
            description: reader.optional("Description"),
            memory_size: reader.optional("MemorySize"),
            timeout: reader.optional("Timeout"),
            role: reader.optional("Role"),
            policies,
            environment: reader.optional("Environment"),
            vpc_config: reader.optional("VpcConfig"),
            events,
            tags: reader.optional_map("Tags")?.unwrap_or_default(),
            layers: reader.optional("Layers"),
            tracing: reader.optional_string("Tracing")?,
            kms_key_arn: reader.optional("KmsKeyArn"),
            dead_letter_queue,
            reserved_concurrent_executions: reader.optional("ReservedConcurrentExecutions"),
            auto_publish_alias: reader.optional_string("AutoPublishAlias")?,
            provisioned_concurrency: reader.optional("ProvisionedConcurrencyConfig"),
            deployment_preference,
            architectures: reader.optional("Architectures"),
            ephemeral_storage: reader.optional("EphemeralStorage"),
            permissions_boundary: reader.optional("PermissionsBoundary"),
            assume_role_policy: reader.optional("AssumeRolePolicyDocument"),
            url_config,
            extra: reader.into_extra(),
        })
    }

    /// Whether requests reach the function through a published alias
    pub fn publishes_alias(&self) -> bool {
        self.auto_publish_alias.is_some()
    }
}

fn take_code(reader: &mut PropertyReader, is_image: bool) -> Result<CodeLocation> {
    if is_image {
        return reader
            .required("ImageUri")
            .map(CodeLocation::Image);
    }
    if let Some(inline) = reader.optional("InlineCode") {
        return Ok(CodeLocation::Inline(inline));
    }
    match reader.optional("CodeUri") {
        Some(other) => S3Location::from_value(reader, "CodeUri", other).map(CodeLocation::S3),
        None => Err(reader.error(
            "CodeUri",
            "is required (or InlineCode, or ImageUri with PackageType Image)",
        )),
    }
}

fn take_dead_letter_queue(reader: &mut PropertyReader) -> Result<Option<DeadLetterQueue>> {
    let Some(mut dlq) = reader.optional_reader("DeadLetterQueue")? else {
        return Ok(None);
    };
    let kind = match dlq.required_string("Type")?.as_str() {
        "SQS" => DeadLetterKind::Sqs,
        "SNS" => DeadLetterKind::Sns,
        other => {
            return Err(dlq.error("Type", format!("must be SQS or SNS, found '{}'", other)));
        }
    };
    Ok(Some(DeadLetterQueue {
        kind,
        target_arn: dlq.required("TargetArn")?,
    }))
}

fn take_deployment_preference(reader: &mut PropertyReader) -> Result<Option<DeploymentPreference>> {
    let Some(mut pref) = reader.optional_reader("DeploymentPreference")? else {
        return Ok(None);
    };
    Ok(Some(DeploymentPreference {
        deployment_type: pref.required("Type")?,
        enabled: pref.optional_bool("Enabled")?.unwrap_or(true),
        alarms: pref.optional("Alarms"),
        hooks: pref.optional_map("Hooks")?,
        role: pref.optional("Role"),
    }))
}

fn take_url_config(reader: &mut PropertyReader) -> Result<Option<FunctionUrlConfig>> {
    let Some(mut url) = reader.optional_reader("FunctionUrlConfig")? else {
        return Ok(None);
    };
    let auth_type = url.required_string("AuthType")?;
    if auth_type != "NONE" && auth_type != "AWS_IAM" {
        return Err(url.error("AuthType", format!("must be NONE or AWS_IAM, found '{}'", auth_type)));
    }
    Ok(Some(FunctionUrlConfig {
        auth_type,
        cors: url.optional("Cors"),
        invoke_mode: url.optional("InvokeMode"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sam_translator_common::map_from_json;
    use serde_json::json;

    fn decode(json: serde_json::Value) -> Result<FunctionProperties> {
        FunctionProperties::decode(PropertyReader::new("MyFunction", map_from_json(json)))
    }

    #[test]
    fn test_decode_minimal_function() {
        let props = decode(json!({
            "Handler": "index.handler",
            "Runtime": "python3.12",
            "CodeUri": "s3://bucket/code.zip",
            "Custom": true
        }))
        .unwrap();

        assert_eq!(props.handler.as_deref(), Some("index.handler"));
        match &props.code {
            CodeLocation::S3(location) => assert_eq!(location.key, Value::from("code.zip")),
            other => panic!("expected S3 code, got {:?}", other),
        }
        assert!(props.extra.contains_key("Custom"));
        assert!(props.policies.is_empty());
    }

    #[test]
    fn test_handler_required_for_zip_packages() {
        let err = decode(json!({"Runtime": "nodejs20.x", "InlineCode": "exports.h = 1"})).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("[MyFunction]"), "{}", message);
        assert!(message.contains("Handler"), "{}", message);
    }

    #[test]
    fn test_code_location_required() {
        let err = decode(json!({"Handler": "a.b", "Runtime": "python3.12"})).unwrap_err();
        assert!(err.to_string().contains("CodeUri"));
    }

    #[test]
    fn test_image_package_needs_no_handler() {
        let props = decode(json!({
            "PackageType": "Image",
            "ImageUri": "123456789012.dkr.ecr.us-east-1.amazonaws.com/app:latest"
        }))
        .unwrap();
        assert!(matches!(props.code, CodeLocation::Image(_)));
        assert!(props.handler.is_none());
    }

    #[test]
    fn test_policy_shapes() {
        let props = decode(json!({
            "Handler": "a.b",
            "Runtime": "python3.12",
            "InlineCode": "x",
            "Policies": [
                "AmazonS3ReadOnlyAccess",
                {"Statement": [{"Effect": "Allow", "Action": "s3:*", "Resource": "*"}]},
                {"NotATemplate": {"X": 1}}
            ]
        }))
        .unwrap();

        assert!(matches!(props.policies[0], PolicyEntry::Managed(_)));
        assert!(matches!(props.policies[1], PolicyEntry::Document(_)));
        match &props.policies[2] {
            PolicyEntry::Template { name, .. } => assert_eq!(name, "NotATemplate"),
            other => panic!("expected template, got {:?}", other),
        }
    }

    #[test]
    fn test_single_policy_string() {
        let props = decode(json!({
            "Handler": "a.b",
            "Runtime": "python3.12",
            "InlineCode": "x",
            "Policies": "AWSLambdaExecute"
        }))
        .unwrap();
        assert_eq!(props.policies.len(), 1);
    }

    #[test]
    fn test_dead_letter_queue_type_checked() {
        let err = decode(json!({
            "Handler": "a.b",
            "Runtime": "python3.12",
            "InlineCode": "x",
            "DeadLetterQueue": {"Type": "Kafka", "TargetArn": "arn"}
        }))
        .unwrap_err();
        assert!(err.to_string().contains("DeadLetterQueue.Type"));
    }
}
