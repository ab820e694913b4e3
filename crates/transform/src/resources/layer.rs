//! `AWS::Serverless::LayerVersion` conversion
//!
//! The generated layer version gets a content-hashed logical id, so a new
//! version is published whenever the artifact changes. References to the
//! serverless id are rewritten once conversion finishes.

use super::Converted;
use crate::logical_id::LogicalIdGenerator;
use sam_translator_common::{Map, Resource, Result, Value};
use sam_translator_parser::model::LayerVersionProperties;

pub fn convert(logical_id: &str, props: LayerVersionProperties) -> Result<Converted> {
    let layer_id = LogicalIdGenerator::generate_hashed(&props.content.fingerprint(), &[logical_id]);

    let mut content = Map::new();
    content.insert("S3Bucket".to_string(), props.content.bucket);
    content.insert("S3Key".to_string(), props.content.key);
    if let Some(version) = props.content.version {
        content.insert("S3ObjectVersion".to_string(), version);
    }

    let mut layer = Resource::new("AWS::Lambda::LayerVersion")
        .with_property("Content", Value::Map(content))
        .with_property(
            "LayerName",
            props.layer_name.unwrap_or_else(|| Value::from(logical_id)),
        )
        .with_optional("Description", props.description)
        .with_optional("CompatibleRuntimes", props.compatible_runtimes)
        .with_optional("CompatibleArchitectures", props.compatible_architectures)
        .with_optional("LicenseInfo", props.license_info);
    for (key, value) in props.extra {
        layer.properties.entry(key).or_insert(value);
    }
    layer.deletion_policy = Some(Value::from(props.retention_policy.as_str()));

    Ok(Converted::new(layer_id, layer))
}

#[cfg(test)]
mod tests {
    use super::super::testing::convert_template;
    use serde_json::json;

    fn layer(properties: serde_json::Value) -> serde_json::Value {
        convert_template(json!({
            "Resources": {"Deps": {"Type": "AWS::Serverless::LayerVersion", "Properties": properties}}
        }))
        .unwrap()
    }

    fn only_resource(out: &serde_json::Value) -> (String, serde_json::Value) {
        let resources = out["Resources"].as_object().unwrap();
        assert_eq!(resources.len(), 1);
        let (id, resource) = resources.iter().next().unwrap();
        (id.clone(), resource.clone())
    }

    #[test]
    fn test_layer_version() {
        let (id, resource) = only_resource(&layer(json!({
            "ContentUri": "s3://bucket/layer.zip",
            "CompatibleRuntimes": ["python3.12"],
            "RetentionPolicy": "Delete"
        })));
        assert!(id.starts_with("Deps"));
        assert_eq!(resource["Type"], "AWS::Lambda::LayerVersion");
        assert_eq!(resource["DeletionPolicy"], "Delete");
        assert_eq!(resource["Properties"]["LayerName"], "Deps");
        assert_eq!(
            resource["Properties"]["Content"],
            json!({"S3Bucket": "bucket", "S3Key": "layer.zip"})
        );
    }

    #[test]
    fn test_id_tracks_content() {
        let (first, _) = only_resource(&layer(json!({"ContentUri": "s3://bucket/v1.zip"})));
        let (again, _) = only_resource(&layer(json!({"ContentUri": "s3://bucket/v1.zip"})));
        let (second, _) = only_resource(&layer(json!({"ContentUri": "s3://bucket/v2.zip"})));
        assert_eq!(first, again);
        assert_ne!(first, second);
    }
}
