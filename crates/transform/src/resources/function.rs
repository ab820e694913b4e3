//! `AWS::Serverless::Function` conversion

use super::events::{self, EventTarget};
use super::iam;
use super::{object, tag_list, ConversionContext, Converted};
use crate::logical_id::LogicalIdGenerator;
use sam_translator_common::{Map, Resource, Result, TransformError, Value};
use sam_translator_parser::model::{
    CodeLocation, DeadLetterKind, DeploymentPreference, FunctionProperties, FunctionUrlConfig,
};
use tracing::debug;

pub const BASIC_EXECUTION_POLICY: &str = "service-role/AWSLambdaBasicExecutionRole";
pub const XRAY_POLICY: &str = "AWSXrayWriteOnlyAccess";
pub const VPC_ACCESS_POLICY: &str = "service-role/AWSLambdaVPCAccessExecutionRole";
const CODEDEPLOY_POLICY: &str = "service-role/AWSCodeDeployRoleForLambda";

/// Shared CodeDeploy application of every gradually deployed function
pub const DEPLOYMENT_APPLICATION: &str = "ServerlessDeploymentApplication";
/// Shared service role of the deployment groups
pub const DEPLOYMENT_ROLE: &str = "CodeDeployServiceRole";

const FUNCTION_TYPE: &str = "AWS::Lambda::Function";
const CREATED_BY: (&str, &str) = ("lambda:createdBy", "SAM");

pub fn convert(
    logical_id: &str,
    props: FunctionProperties,
    context: &ConversionContext,
) -> Result<Converted> {
    if props.role.is_some() && !props.policies.is_empty() {
        return Err(TransformError::invalid_property(
            logical_id,
            "Role",
            "cannot be combined with Policies",
        ));
    }

    let role_id = LogicalIdGenerator::generate(&[logical_id, "Role"]);
    let role_arn = props
        .role
        .clone()
        .unwrap_or_else(|| Value::get_att(&role_id, "Arn"));

    let function = function_resource(&props, role_arn);
    let mut converted = Converted::new(logical_id, function.clone());

    let alias_id = match &props.auto_publish_alias {
        Some(alias) => Some(publish_alias(logical_id, alias, &props, &function, &mut converted)?),
        None => {
            if props.provisioned_concurrency.is_some() {
                return Err(TransformError::invalid_property(
                    logical_id,
                    "ProvisionedConcurrencyConfig",
                    "requires AutoPublishAlias",
                ));
            }
            None
        }
    };

    if let Some(preference) = &props.deployment_preference {
        let Some(alias_id) = &alias_id else {
            return Err(TransformError::invalid_property(
                logical_id,
                "DeploymentPreference",
                "requires AutoPublishAlias",
            ));
        };
        if preference.enabled {
            gradual_deployment(logical_id, alias_id, preference, context, &mut converted);
        }
    }

    let target = EventTarget {
        function_id: logical_id,
        arn: match &alias_id {
            Some(alias_id) => Value::reference(alias_id.as_str()),
            None => Value::get_att(logical_id, "Arn"),
        },
    };

    if let Some(url) = &props.url_config {
        function_url(logical_id, url, &props, &mut converted);
    }

    let event_policies = events::convert(&target, &props.events, context, &mut converted)?;

    if props.role.is_none() {
        let role = execution_role(logical_id, &props, &event_policies, context)?;
        converted.add(role_id, role);
    }

    Ok(converted)
}

fn function_resource(props: &FunctionProperties, role_arn: Value) -> Resource {
    let (code, package_type) = match &props.code {
        CodeLocation::S3(location) => {
            let mut code = Map::new();
            code.insert("S3Bucket".to_string(), location.bucket.clone());
            code.insert("S3Key".to_string(), location.key.clone());
            if let Some(version) = &location.version {
                code.insert("S3ObjectVersion".to_string(), version.clone());
            }
            (Value::Map(code), None)
        }
        CodeLocation::Inline(source) => (object([("ZipFile", source.clone())]), None),
        CodeLocation::Image(uri) => (
            object([("ImageUri", uri.clone())]),
            Some(Value::from("Image")),
        ),
    };

    let tracing = props
        .tracing
        .as_ref()
        .map(|mode| object([("Mode", Value::from(mode.as_str()))]));
    let dead_letter = props
        .dead_letter_queue
        .as_ref()
        .map(|dlq| object([("TargetArn", dlq.target_arn.clone())]));

    let mut function = Resource::new(FUNCTION_TYPE)
        .with_property("Code", code)
        .with_optional("PackageType", package_type)
        .with_optional("Handler", props.handler.clone().map(Value::from))
        .with_optional("Runtime", props.runtime.clone().map(Value::from))
        .with_property("Role", role_arn)
        .with_optional("FunctionName", props.function_name.clone())
        .with_optional("Description", props.description.clone())
        .with_optional("MemorySize", props.memory_size.clone())
        .with_optional("Timeout", props.timeout.clone())
        .with_optional("Environment", props.environment.clone())
        .with_optional("VpcConfig", props.vpc_config.clone())
        .with_optional("Layers", props.layers.clone())
        .with_optional("TracingConfig", tracing)
        .with_optional("KmsKeyArn", props.kms_key_arn.clone())
        .with_optional("DeadLetterConfig", dead_letter)
        .with_optional(
            "ReservedConcurrentExecutions",
            props.reserved_concurrent_executions.clone(),
        )
        .with_optional("Architectures", props.architectures.clone())
        .with_optional("EphemeralStorage", props.ephemeral_storage.clone())
        .with_property("Tags", tag_list(Some(CREATED_BY), &props.tags));

    for (key, value) in &props.extra {
        function
            .properties
            .entry(key.clone())
            .or_insert_with(|| value.clone());
    }
    function
}

/// Version and alias published on every code or configuration change.
///
/// Returns the alias logical id.
fn publish_alias(
    logical_id: &str,
    alias: &str,
    props: &FunctionProperties,
    function: &Resource,
    converted: &mut Converted,
) -> Result<String> {
    if alias.is_empty() || !alias.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(TransformError::invalid_property(
            logical_id,
            "AutoPublishAlias",
            format!("'{}' must be alphanumeric", alias),
        ));
    }

    let content = Value::Map(function.properties.clone()).to_canonical_json();
    let version_id = LogicalIdGenerator::generate_hashed(&content, &[logical_id, "Version"]);
    let alias_id = LogicalIdGenerator::generate(&[logical_id, "Alias", alias]);
    debug!(%logical_id, %version_id, %alias_id, "publishing alias");

    let mut version = Resource::new("AWS::Lambda::Version")
        .with_property("FunctionName", Value::reference(logical_id));
    version.deletion_policy = Some(Value::from("Retain"));
    converted.add(version_id.clone(), version);

    converted.add(
        alias_id.clone(),
        Resource::new("AWS::Lambda::Alias")
            .with_property("Name", alias)
            .with_property("FunctionName", Value::reference(logical_id))
            .with_property("FunctionVersion", Value::get_att(&version_id, "Version"))
            .with_optional(
                "ProvisionedConcurrencyConfig",
                props.provisioned_concurrency.clone(),
            ),
    );
    Ok(alias_id)
}

fn gradual_deployment(
    logical_id: &str,
    alias_id: &str,
    preference: &DeploymentPreference,
    context: &ConversionContext,
    converted: &mut Converted,
) {
    if !context.output.contains_key(DEPLOYMENT_APPLICATION) {
        converted.add(
            DEPLOYMENT_APPLICATION,
            Resource::new("AWS::CodeDeploy::Application").with_property("ComputePlatform", "Lambda"),
        );
    }

    let service_role = match &preference.role {
        Some(role) => role.clone(),
        None => {
            if !context.output.contains_key(DEPLOYMENT_ROLE) {
                let managed = vec![Value::from(
                    context.arns.aws_managed_policy(CODEDEPLOY_POLICY).to_string(),
                )];
                converted.add(
                    DEPLOYMENT_ROLE,
                    iam::role("codedeploy.amazonaws.com", managed, Vec::new()),
                );
            }
            Value::get_att(DEPLOYMENT_ROLE, "Arn")
        }
    };

    let mut config_name = Map::new();
    config_name.insert("ConfigName".to_string(), preference.deployment_type.clone());
    let alarms = preference.alarms.as_ref().map(|alarms| {
        let names = match alarms {
            Value::List(items) => items.clone(),
            single => vec![single.clone()],
        };
        object([
            ("Enabled", Value::Bool(true)),
            (
                "Alarms",
                Value::List(
                    names
                        .into_iter()
                        .map(|name| object([("Name", name)]))
                        .collect(),
                ),
            ),
        ])
    });

    let group_id = LogicalIdGenerator::generate(&[logical_id, "DeploymentGroup"]);
    converted.add(
        group_id.clone(),
        Resource::new("AWS::CodeDeploy::DeploymentGroup")
            .with_property("ApplicationName", Value::reference(DEPLOYMENT_APPLICATION))
            .with_property(
                "DeploymentConfigName",
                Value::sub_with("CodeDeployDefault.Lambda${ConfigName}", config_name),
            )
            .with_property(
                "DeploymentStyle",
                object([
                    ("DeploymentType", Value::from("BLUE_GREEN")),
                    ("DeploymentOption", Value::from("WITH_TRAFFIC_CONTROL")),
                ]),
            )
            .with_property(
                "AutoRollbackConfiguration",
                object([
                    ("Enabled", Value::Bool(true)),
                    (
                        "Events",
                        Value::List(vec![
                            Value::from("DEPLOYMENT_FAILURE"),
                            Value::from("DEPLOYMENT_STOP_ON_ALARM"),
                            Value::from("DEPLOYMENT_STOP_ON_REQUEST"),
                        ]),
                    ),
                ]),
            )
            .with_property("ServiceRoleArn", service_role)
            .with_optional("AlarmConfiguration", alarms),
    );

    let mut update = Map::new();
    update.insert(
        "ApplicationName".to_string(),
        Value::reference(DEPLOYMENT_APPLICATION),
    );
    update.insert(
        "DeploymentGroupName".to_string(),
        Value::reference(group_id.as_str()),
    );
    let hooks = preference.hooks.clone().unwrap_or_default();
    if let Some(pre) = hooks.get("PreTraffic") {
        update.insert("BeforeAllowTrafficHook".to_string(), pre.clone());
    }
    if let Some(post) = hooks.get("PostTraffic") {
        update.insert("AfterAllowTrafficHook".to_string(), post.clone());
    }
    if let Some(alias) = converted.get_mut(alias_id) {
        alias.extra.insert(
            "UpdatePolicy".to_string(),
            object([("CodeDeployLambdaAliasUpdate", Value::Map(update))]),
        );
    }
}

fn function_url(
    logical_id: &str,
    url: &FunctionUrlConfig,
    props: &FunctionProperties,
    converted: &mut Converted,
) {
    let url_id = LogicalIdGenerator::generate(&[logical_id, "Url"]);
    converted.add(
        url_id.clone(),
        Resource::new("AWS::Lambda::Url")
            .with_property("TargetFunctionArn", Value::reference(logical_id))
            .with_optional(
                "Qualifier",
                props.auto_publish_alias.clone().map(Value::from),
            )
            .with_property("AuthType", url.auth_type.as_str())
            .with_optional("Cors", url.cors.clone())
            .with_optional("InvokeMode", url.invoke_mode.clone()),
    );

    if url.auth_type == "NONE" {
        let mut permission = Resource::new("AWS::Lambda::Permission")
            .with_property("Action", "lambda:InvokeFunctionUrl")
            .with_property("FunctionName", Value::reference(logical_id))
            .with_property("Principal", "*")
            .with_property("FunctionUrlAuthType", "NONE")
            .with_optional(
                "Qualifier",
                props.auto_publish_alias.clone().map(Value::from),
            );
        permission = permission.with_depends_on(url_id);
        converted.add(
            LogicalIdGenerator::generate(&[logical_id, "UrlPublicPermissions"]),
            permission,
        );
    }
}

fn execution_role(
    logical_id: &str,
    props: &FunctionProperties,
    event_policies: &[&str],
    context: &ConversionContext,
) -> Result<Resource> {
    let arns = context.arns;
    let mut managed: Vec<Value> = Vec::new();
    let mut push_managed = |policy: Value| {
        if !managed.contains(&policy) {
            managed.push(policy);
        }
    };

    push_managed(Value::from(arns.aws_managed_policy(BASIC_EXECUTION_POLICY).to_string()));
    if props.tracing.as_deref() == Some("Active") {
        push_managed(Value::from(arns.aws_managed_policy(XRAY_POLICY).to_string()));
    }
    if props.vpc_config.is_some() {
        push_managed(Value::from(arns.aws_managed_policy(VPC_ACCESS_POLICY).to_string()));
    }
    for policy in event_policies {
        push_managed(Value::from(arns.aws_managed_policy(policy).to_string()));
    }

    let (policy_arns, mut inline) = iam::role_policies(logical_id, &props.policies, context)?;
    for policy in policy_arns {
        push_managed(policy);
    }

    if let Some(dlq) = &props.dead_letter_queue {
        let action = match dlq.kind {
            DeadLetterKind::Sqs => "sqs:SendMessage",
            DeadLetterKind::Sns => "sns:Publish",
        };
        inline.push(iam::inline_policy(
            &LogicalIdGenerator::generate(&[logical_id, "DeadLetterQueuePolicy"]),
            iam::policy_document(vec![iam::allow(&[action], dlq.target_arn.clone())]),
        ));
    }

    let trust = props
        .assume_role_policy
        .clone()
        .unwrap_or_else(|| iam::trust_policy("lambda.amazonaws.com"));
    Ok(iam::role_with_trust(trust, managed, inline)
        .with_optional("PermissionsBoundary", props.permissions_boundary.clone())
        .with_property("Tags", tag_list(Some(CREATED_BY), &props.tags)))
}

#[cfg(test)]
mod tests {
    use super::super::testing::convert_template;
    use super::*;
    use sam_translator_common::Partition;
    use serde_json::json;

    fn single_function(properties: serde_json::Value) -> serde_json::Value {
        json!({"Resources": {"Fn": {"Type": "AWS::Serverless::Function", "Properties": properties}}})
    }

    fn base() -> serde_json::Value {
        json!({"Handler": "index.handler", "Runtime": "python3.12", "CodeUri": "s3://bucket/code.zip"})
    }

    fn with(extra: serde_json::Value) -> serde_json::Value {
        let mut props = base();
        for (k, v) in extra.as_object().unwrap() {
            props[k] = v.clone();
        }
        single_function(props)
    }

    #[test]
    fn test_minimal_function_gets_role() {
        let out = convert_template(single_function(base())).unwrap();
        let function = &out["Resources"]["Fn"];
        assert_eq!(function["Type"], "AWS::Lambda::Function");
        assert_eq!(function["Properties"]["Code"], json!({"S3Bucket": "bucket", "S3Key": "code.zip"}));
        assert_eq!(function["Properties"]["Role"], json!({"Fn::GetAtt": ["FnRole", "Arn"]}));
        assert_eq!(
            function["Properties"]["Tags"],
            json!([{"Key": "lambda:createdBy", "Value": "SAM"}])
        );

        let role = &out["Resources"]["FnRole"];
        assert_eq!(role["Type"], "AWS::IAM::Role");
        assert_eq!(
            role["Properties"]["ManagedPolicyArns"],
            json!(["arn:aws:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole"])
        );
        assert_eq!(out["Resources"].as_object().unwrap().len(), 2);
    }

    #[test]
    fn test_explicit_role_suppresses_generation() {
        let out = convert_template(with(json!({"Role": "arn:aws:iam::123456789012:role/existing"}))).unwrap();
        assert!(out["Resources"].get("FnRole").is_none());
        assert_eq!(out["Resources"]["Fn"]["Properties"]["Role"], "arn:aws:iam::123456789012:role/existing");
    }

    #[test]
    fn test_policies_become_role_entries() {
        let out = convert_template(with(json!({
            "Tracing": "Active",
            "Policies": [
                "AmazonS3ReadOnlyAccess",
                {"Statement": [{"Effect": "Allow", "Action": "s3:GetObject", "Resource": "*"}]},
                {"SQSPollerPolicy": {"QueueName": "jobs"}}
            ]
        })))
        .unwrap();
        let role = &out["Resources"]["FnRole"]["Properties"];
        let managed = role["ManagedPolicyArns"].as_array().unwrap();
        assert!(managed.contains(&json!("arn:aws:iam::aws:policy/AWSXrayWriteOnlyAccess")));
        assert!(managed.contains(&json!("arn:aws:iam::aws:policy/AmazonS3ReadOnlyAccess")));
        let inline = role["Policies"].as_array().unwrap();
        assert_eq!(inline.len(), 2);
        assert_eq!(inline[0]["PolicyName"], "FnRolePolicy1");
        assert!(!inline[1]["PolicyDocument"]["Statement"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_policy_template_fails() {
        let err = convert_template(with(json!({"Policies": [{"NoSuchPolicy": {}}]}))).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Fn"));
        assert!(message.contains("NoSuchPolicy"));
    }

    #[test]
    fn test_missing_code_names_resource() {
        let err = convert_template(single_function(json!({"Runtime": "python3.12"}))).unwrap_err();
        assert!(err.to_string().contains("[Fn]"));
    }

    #[test]
    fn test_auto_publish_alias() {
        let out = convert_template(with(json!({"AutoPublishAlias": "live"}))).unwrap();
        let resources = out["Resources"].as_object().unwrap();
        let version_id = resources
            .keys()
            .find(|id| id.starts_with("FnVersion"))
            .unwrap()
            .clone();
        assert_eq!(version_id.len(), "FnVersion".len() + 8);
        assert_eq!(resources[&version_id]["DeletionPolicy"], "Retain");

        let alias = &resources["FnAliaslive"];
        assert_eq!(alias["Type"], "AWS::Lambda::Alias");
        assert_eq!(
            alias["Properties"]["FunctionVersion"],
            json!({"Fn::GetAtt": [version_id, "Version"]})
        );
    }

    #[test]
    fn test_version_changes_with_code() {
        let first = convert_template(with(json!({"AutoPublishAlias": "live"}))).unwrap();
        let mut changed = with(json!({"AutoPublishAlias": "live"}));
        changed["Resources"]["Fn"]["Properties"]["CodeUri"] = json!("s3://bucket/code-v2.zip");
        let second = convert_template(changed).unwrap();
        let version = |out: &serde_json::Value| {
            out["Resources"]
                .as_object()
                .unwrap()
                .keys()
                .find(|id| id.starts_with("FnVersion"))
                .cloned()
        };
        assert_ne!(version(&first), version(&second));
    }

    #[test]
    fn test_invalid_alias_name() {
        let err = convert_template(with(json!({"AutoPublishAlias": "my-alias"}))).unwrap_err();
        assert!(err.to_string().contains("AutoPublishAlias"));
    }

    #[test]
    fn test_deployment_preference() {
        let out = convert_template(with(json!({
            "AutoPublishAlias": "live",
            "DeploymentPreference": {"Type": "Canary10Percent5Minutes", "Hooks": {"PreTraffic": {"Ref": "PreHook"}}}
        })))
        .unwrap();
        let resources = &out["Resources"];
        assert_eq!(resources[DEPLOYMENT_APPLICATION]["Type"], "AWS::CodeDeploy::Application");
        assert_eq!(resources[DEPLOYMENT_ROLE]["Type"], "AWS::IAM::Role");
        assert_eq!(
            resources["FnDeploymentGroup"]["Properties"]["DeploymentConfigName"],
            json!({"Fn::Sub": ["CodeDeployDefault.Lambda${ConfigName}", {"ConfigName": "Canary10Percent5Minutes"}]})
        );
        let update = &resources["FnAliaslive"]["UpdatePolicy"]["CodeDeployLambdaAliasUpdate"];
        assert_eq!(update["DeploymentGroupName"], json!({"Ref": "FnDeploymentGroup"}));
        assert_eq!(update["BeforeAllowTrafficHook"], json!({"Ref": "PreHook"}));
    }

    #[test]
    fn test_deployment_preference_requires_alias() {
        let err = convert_template(with(json!({"DeploymentPreference": {"Type": "AllAtOnce"}}))).unwrap_err();
        assert!(err.to_string().contains("DeploymentPreference"));
    }

    #[test]
    fn test_public_function_url() {
        let out = convert_template(with(json!({"FunctionUrlConfig": {"AuthType": "NONE"}}))).unwrap();
        assert_eq!(out["Resources"]["FnUrl"]["Type"], "AWS::Lambda::Url");
        let permission = &out["Resources"]["FnUrlPublicPermissions"]["Properties"];
        assert_eq!(permission["Action"], "lambda:InvokeFunctionUrl");
        assert_eq!(permission["FunctionUrlAuthType"], "NONE");
    }

    #[test]
    fn test_image_function() {
        let out = convert_template(single_function(json!({
            "PackageType": "Image",
            "ImageUri": "123456789012.dkr.ecr.us-east-1.amazonaws.com/app:latest"
        })))
        .unwrap();
        let props = &out["Resources"]["Fn"]["Properties"];
        assert_eq!(props["PackageType"], "Image");
        assert!(props.get("Handler").is_none());
    }

    #[test]
    fn test_dead_letter_queue_policy() {
        let out = convert_template(with(json!({
            "DeadLetterQueue": {"Type": "SQS", "TargetArn": {"Fn::GetAtt": ["Dlq", "Arn"]}}
        })))
        .unwrap();
        assert_eq!(
            out["Resources"]["Fn"]["Properties"]["DeadLetterConfig"],
            json!({"TargetArn": {"Fn::GetAtt": ["Dlq", "Arn"]}})
        );
        let inline = &out["Resources"]["FnRole"]["Properties"]["Policies"][0];
        assert_eq!(inline["PolicyDocument"]["Statement"][0]["Action"], json!(["sqs:SendMessage"]));
    }

    #[test]
    fn test_china_partition_policies() {
        let out = super::super::testing::convert_template_with(
            single_function(base()),
            sam_translator_common::TransformOptions::new("cn-north-1"),
        )
        .unwrap();
        let managed = &out["Resources"]["FnRole"]["Properties"]["ManagedPolicyArns"][0];
        assert!(managed.as_str().unwrap().starts_with("arn:aws-cn:"));
        assert_eq!(Partition::from_region("cn-north-1"), Partition::AwsCn);
    }
}
