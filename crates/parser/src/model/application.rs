//! `AWS::Serverless::Application` properties

use crate::PropertyReader;
use sam_translator_common::{Map, Result, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationProperties {
    /// Template URL of the nested stack
    pub template_url: Value,
    pub parameters: Option<Value>,
    pub notification_arns: Option<Value>,
    pub tags: Option<Map>,
    pub timeout_in_minutes: Option<Value>,
    pub extra: Map,
}

impl ApplicationProperties {
    pub fn decode(mut reader: PropertyReader) -> Result<Self> {
        let template_url = match reader.required("Location")? {
            Value::Map(map) if map.contains_key("ApplicationId") => {
                return Err(reader.error(
                    "Location",
                    "refers to a Serverless Application Repository application, \
                     which needs network access to resolve; use a template URL instead",
                ))
            }
            Value::List(_) => {
                return Err(reader.error("Location", "must be a template URL"));
            }
            location => location,
        };
        Ok(Self {
            template_url,
            parameters: reader.optional("Parameters"),
            notification_arns: reader.optional("NotificationARNs"),
            tags: reader.optional_map("Tags")?,
            timeout_in_minutes: reader.optional("TimeoutInMinutes"),
            extra: reader.into_extra(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sam_translator_common::map_from_json;
    use serde_json::json;

    #[test]
    fn test_repository_location_rejected() {
        let err = ApplicationProperties::decode(PropertyReader::new(
            "App",
            map_from_json(json!({
                "Location": {"ApplicationId": "arn:aws:serverlessrepo:us-east-1:1:applications/x", "SemanticVersion": "1.0.0"}
            })),
        ))
        .unwrap_err();
        assert!(err.to_string().contains("[App]"));
    }

    #[test]
    fn test_url_location() {
        let props = ApplicationProperties::decode(PropertyReader::new(
            "App",
            map_from_json(json!({"Location": "https://s3.amazonaws.com/bucket/template.yaml"})),
        ))
        .unwrap();
        assert!(props.template_url.as_str().is_some());
    }
}
