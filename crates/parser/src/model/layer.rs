//! `AWS::Serverless::LayerVersion` properties

use super::location::S3Location;
use crate::PropertyReader;
use sam_translator_common::{Map, Result, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct LayerVersionProperties {
    pub content: S3Location,
    pub layer_name: Option<Value>,
    pub description: Option<Value>,
    pub compatible_runtimes: Option<Value>,
    pub compatible_architectures: Option<Value>,
    pub license_info: Option<Value>,
    pub retention_policy: RetentionPolicy,
    pub extra: Map,
}

/// What happens to old layer versions when a new one is published
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RetentionPolicy {
    #[default]
    Retain,
    Delete,
}

impl RetentionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetentionPolicy::Retain => "Retain",
            RetentionPolicy::Delete => "Delete",
        }
    }
}

impl LayerVersionProperties {
    pub fn decode(mut reader: PropertyReader) -> Result<Self> {
        let content = S3Location::take(&mut reader, "ContentUri")?
            .ok_or_else(|| reader.error("ContentUri", "is required"))?;
        let retention_policy = match reader.optional_string("RetentionPolicy")? {
            None => RetentionPolicy::default(),
            Some(policy) if policy.eq_ignore_ascii_case("retain") => RetentionPolicy::Retain,
            Some(policy) if policy.eq_ignore_ascii_case("delete") => RetentionPolicy::Delete,
            Some(other) => {
                return Err(reader.error(
                    "RetentionPolicy",
                    format!("must be Retain or Delete, found '{}'", other),
                ))
            }
        };
        Ok(Self {
            content,
            layer_name: reader.optional("LayerName"),
            description: reader.optional("Description"),
            compatible_runtimes: reader.optional("CompatibleRuntimes"),
            compatible_architectures: reader.optional("CompatibleArchitectures"),
            license_info: reader.optional("LicenseInfo"),
            retention_policy,
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
    fn test_retention_defaults_to_retain() {
        let props = LayerVersionProperties::decode(PropertyReader::new(
            "Deps",
            map_from_json(json!({"ContentUri": "s3://bucket/layer.zip"})),
        ))
        .unwrap();
        assert_eq!(props.retention_policy, RetentionPolicy::Retain);
    }

    #[test]
    fn test_content_uri_required() {
        let err = LayerVersionProperties::decode(PropertyReader::new("Deps", Map::new())).unwrap_err();
        assert!(err.to_string().contains("ContentUri"));
    }
}
