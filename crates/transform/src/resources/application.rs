//! `AWS::Serverless::Application` conversion

use super::{tag_list, Converted};
use sam_translator_common::{Resource, Result};
use sam_translator_parser::model::ApplicationProperties;

const CREATED_BY: (&str, &str) = ("serverlessrepo:createdBy", "SAM");

pub fn convert(logical_id: &str, props: ApplicationProperties) -> Result<Converted> {
    let mut stack = Resource::new("AWS::CloudFormation::Stack")
        .with_property("TemplateURL", props.template_url)
        .with_optional("Parameters", props.parameters)
        .with_optional("NotificationARNs", props.notification_arns)
        .with_optional("TimeoutInMinutes", props.timeout_in_minutes)
        .with_property(
            "Tags",
            tag_list(Some(CREATED_BY), &props.tags.unwrap_or_default()),
        );
    for (key, value) in props.extra {
        stack.properties.entry(key).or_insert(value);
    }
    Ok(Converted::new(logical_id, stack))
}

#[cfg(test)]
mod tests {
    use super::super::testing::convert_template;
    use serde_json::json;

    #[test]
    fn test_nested_stack() {
        let out = convert_template(json!({
            "Resources": {
                "Shared": {
                    "Type": "AWS::Serverless::Application",
                    "Properties": {
                        "Location": "https://s3.amazonaws.com/bucket/shared.yaml",
                        "Parameters": {"Env": "prod"},
                        "Tags": {"team": "core"}
                    }
                }
            }
        }))
        .unwrap();
        let stack = &out["Resources"]["Shared"];
        assert_eq!(stack["Type"], "AWS::CloudFormation::Stack");
        assert_eq!(stack["Properties"]["TemplateURL"], "https://s3.amazonaws.com/bucket/shared.yaml");
        assert_eq!(stack["Properties"]["Parameters"], json!({"Env": "prod"}));
        assert_eq!(
            stack["Properties"]["Tags"],
            json!([
                {"Key": "serverlessrepo:createdBy", "Value": "SAM"},
                {"Key": "team", "Value": "core"}
            ])
        );
    }
}
