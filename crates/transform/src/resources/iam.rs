//! IAM documents shared by converters

use super::{object, ConversionContext};
use crate::arn::ArnBuilder;
use crate::logical_id::LogicalIdGenerator;
use sam_translator_common::{Resource, Result, Value};
use sam_translator_parser::model::PolicyEntry;

pub const POLICY_VERSION: &str = "2012-10-17";
pub const ROLE_TYPE: &str = "AWS::IAM::Role";

/// Trust policy letting one service principal assume a role
pub fn trust_policy(service: &str) -> Value {
    policy_document(vec![object([
        ("Effect", Value::from("Allow")),
        ("Action", Value::List(vec![Value::from("sts:AssumeRole")])),
        (
            "Principal",
            object([("Service", Value::List(vec![Value::from(service)]))]),
        ),
    ])])
}

pub fn policy_document(statements: Vec<Value>) -> Value {
    object([
        ("Version", Value::from(POLICY_VERSION)),
        ("Statement", Value::List(statements)),
    ])
}

/// `Allow` statement over one resource expression
pub fn allow(actions: &[&str], resource: Value) -> Value {
    object([
        ("Effect", Value::from("Allow")),
        (
            "Action",
            Value::List(actions.iter().map(|a| Value::from(*a)).collect()),
        ),
        ("Resource", resource),
    ])
}

/// Named inline policy entry of a role
pub fn inline_policy(name: &str, document: Value) -> Value {
    object([
        ("PolicyName", Value::from(name)),
        ("PolicyDocument", document),
    ])
}

/// A managed policy reference; bare names resolve to AWS managed policies
pub fn managed_policy_arn(arns: &ArnBuilder, policy: &Value) -> Value {
    match policy.as_str() {
        Some(name) if !name.starts_with("arn:") => {
            Value::from(arns.aws_managed_policy(name).to_string())
        }
        _ => policy.clone(),
    }
}

/// Managed policy ARNs and inline policies of a role, from `Policies`.
///
/// Inline policies are named after the owner and their position in the list.
/// Templates expand through the policy template catalog.
pub fn role_policies(
    owner_id: &str,
    policies: &[PolicyEntry],
    context: &ConversionContext,
) -> Result<(Vec<Value>, Vec<Value>)> {
    let mut managed = Vec::new();
    let mut inline = Vec::new();
    for (index, entry) in policies.iter().enumerate() {
        let name = LogicalIdGenerator::generate(&[owner_id, "RolePolicy", &index.to_string()]);
        match entry {
            PolicyEntry::Managed(policy) => managed.push(managed_policy_arn(context.arns, policy)),
            PolicyEntry::Document(document) => {
                inline.push(inline_policy(&name, Value::Map(document.clone())))
            }
            PolicyEntry::Template { name: template, parameters } => {
                let document = context.policies.expand(template, parameters)?;
                inline.push(inline_policy(&name, document));
            }
        }
    }
    Ok((managed, inline))
}

/// Role assumed by `service`
pub fn role(service: &str, managed: Vec<Value>, inline: Vec<Value>) -> Resource {
    role_with_trust(trust_policy(service), managed, inline)
}

pub fn role_with_trust(trust: Value, managed: Vec<Value>, inline: Vec<Value>) -> Resource {
    let mut resource = Resource::new(ROLE_TYPE).with_property("AssumeRolePolicyDocument", trust);
    if !managed.is_empty() {
        resource = resource.with_property("ManagedPolicyArns", Value::List(managed));
    }
    if !inline.is_empty() {
        resource = resource.with_property("Policies", Value::List(inline));
    }
    resource
}

#[cfg(test)]
mod tests {
    use super::*;
    use sam_translator_common::Partition;

    #[test]
    fn test_trust_policy_names_service() {
        let trust = trust_policy("lambda.amazonaws.com");
        let statement = &trust.get("Statement").unwrap().as_list().unwrap()[0];
        assert_eq!(
            statement.get("Principal").and_then(|p| p.get("Service")),
            Some(&Value::List(vec![Value::from("lambda.amazonaws.com")]))
        );
    }

    #[test]
    fn test_managed_policy_names_expand() {
        let arns = ArnBuilder::new(Partition::AwsCn, "cn-north-1", "123456789012");
        assert_eq!(
            managed_policy_arn(&arns, &Value::from("AmazonS3ReadOnlyAccess")),
            Value::from("arn:aws-cn:iam::aws:policy/AmazonS3ReadOnlyAccess")
        );
        let explicit = Value::from("arn:aws:iam::123456789012:policy/Mine");
        assert_eq!(managed_policy_arn(&arns, &explicit), explicit);
        let reference = Value::reference("PolicyParam");
        assert_eq!(managed_policy_arn(&arns, &reference), reference);
    }

    #[test]
    fn test_role_omits_empty_lists() {
        let role = role("states.amazonaws.com", Vec::new(), Vec::new());
        assert!(role.property("ManagedPolicyArns").is_none());
        assert!(role.property("Policies").is_none());
    }
}
