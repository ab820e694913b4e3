//! Integration tests for template loading and resource decoding

use sam_translator_common::{Intrinsic, Value};
use sam_translator_parser::model::{CodeLocation, EventKind, PolicyEntry};
use sam_translator_parser::{ResourceKind, SamProperties, TemplateLoader};
use std::path::PathBuf;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

#[test]
fn test_load_yaml_fixture() {
    let template = TemplateLoader::from_file(fixture("app.yaml")).unwrap();

    assert!(template.has_serverless_transform());
    assert_eq!(template.resources.len(), 3);
    assert!(template.globals.contains_key("Function"));
    assert!(template.parameters.contains_key("Stage"));
    assert_eq!(template.resources["Alarm"].condition.as_deref(), Some("IsProd"));

    let output = &template.outputs["FunctionArn"];
    assert_eq!(
        output.get("Value"),
        Some(&Value::get_att("UsersFunction", "Arn"))
    );
}

#[test]
fn test_short_form_sub_survives_loading() {
    let template = TemplateLoader::from_file(fixture("app.yaml")).unwrap();
    let name = &template.resources["Alarm"].properties["AlarmName"];
    match name.as_intrinsic() {
        Some(Intrinsic::Sub { template, .. }) => assert_eq!(template, "${AWS::StackName}-errors"),
        other => panic!("expected Fn::Sub, got {:?}", other),
    }
}

#[test]
fn test_decode_function_from_fixture() {
    let template = TemplateLoader::from_file(fixture("app.yaml")).unwrap();
    let resource = &template.resources["UsersFunction"];
    let kind = ResourceKind::from_type(&resource.kind).unwrap();
    assert_eq!(kind, ResourceKind::Function);

    // Runtime comes from Globals, which have not been merged yet
    let err = SamProperties::decode(kind, "UsersFunction", resource.properties.clone()).unwrap_err();
    assert!(err.to_string().contains("Runtime"));

    let mut properties = resource.properties.clone();
    properties.insert("Runtime".to_string(), Value::from("python3.12"));
    let SamProperties::Function(function) =
        SamProperties::decode(kind, "UsersFunction", properties).unwrap()
    else {
        panic!("expected function properties");
    };

    assert!(matches!(function.code, CodeLocation::S3(_)));
    assert!(matches!(
        function.policies.as_slice(),
        [PolicyEntry::Template { name, .. }] if name == "DynamoDBReadPolicy"
    ));
    assert!(matches!(function.events[0].kind, EventKind::Api(_)));
}

#[test]
fn test_json_and_yaml_agree() {
    let yaml = TemplateLoader::from_str("Resources:\n  T:\n    Type: AWS::SNS::Topic\n").unwrap();
    let json = TemplateLoader::from_str(r#"{"Resources": {"T": {"Type": "AWS::SNS::Topic"}}}"#).unwrap();
    assert_eq!(yaml, json);
}

#[test]
fn test_resources_must_be_present() {
    let err = TemplateLoader::from_str("Outputs: {}").unwrap_err();
    assert!(err.to_string().contains("Resources"));
}
