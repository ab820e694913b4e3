//! End-to-end translation of SAM templates

use sam_translator_common::{Partition, Template, TransformError, TransformOptions, Value};
use sam_translator_parser::{load_template, TemplateLoader};
use sam_translator_transform::{translate, ArnBuilder, Translator};
use serde_json::json;
use std::path::PathBuf;

fn fixture(name: &str) -> Template {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    load_template(&path).unwrap()
}

fn translate_fixture(name: &str) -> serde_json::Value {
    let output = translate(fixture(name), TransformOptions::default()).unwrap();
    serde_json::to_value(&output).unwrap()
}

fn ids_of_type(output: &serde_json::Value, kind: &str) -> Vec<String> {
    output["Resources"]
        .as_object()
        .unwrap()
        .iter()
        .filter(|(_, resource)| resource["Type"] == kind)
        .map(|(id, _)| id.clone())
        .collect()
}

#[test]
fn test_function_gets_execution_role() {
    let output = translate_fixture("hello_function.yaml");
    let resources = output["Resources"].as_object().unwrap();

    assert_eq!(resources.len(), 2);
    assert_eq!(resources["HelloFunction"]["Type"], "AWS::Lambda::Function");
    assert_eq!(resources["HelloFunctionRole"]["Type"], "AWS::IAM::Role");
    assert_eq!(
        resources["HelloFunction"]["Properties"]["Role"],
        json!({"Fn::GetAtt": ["HelloFunctionRole", "Arn"]})
    );
    assert!(output.get("Transform").is_none());
    assert_eq!(output["Outputs"]["HelloArn"]["Value"], json!({"Fn::GetAtt": ["HelloFunction", "Arn"]}));
}

#[test]
fn test_route_event_creates_implicit_rest_api() {
    let output = translate_fixture("rest_route.yaml");
    let resources = &output["Resources"];

    let api = &resources["ServerlessRestApi"];
    assert_eq!(api["Type"], "AWS::ApiGateway::RestApi");
    let integration = &api["Properties"]["Body"]["paths"]["/users"]["get"]
        ["x-amazon-apigateway-integration"];
    assert_eq!(integration["type"], "aws_proxy");
    assert_eq!(
        integration["uri"],
        json!({"Fn::Sub": "arn:aws:apigateway:us-east-1:lambda:path/2015-03-31/functions/${UsersFunction.Arn}/invocations"})
    );

    assert_eq!(resources["ServerlessRestApiProdStage"]["Properties"]["StageName"], "Prod");
    assert_eq!(ids_of_type(&output, "AWS::ApiGateway::Deployment").len(), 1);
    assert_eq!(
        resources["UsersFunctionListUsersPermission"]["Type"],
        "AWS::Lambda::Permission"
    );
    // globals were merged and removed
    assert_eq!(resources["UsersFunction"]["Properties"]["Runtime"], "nodejs20.x");
    assert_eq!(resources["UsersFunction"]["Properties"]["Timeout"], 10);
    assert!(output.get("Globals").is_none());
}

#[test]
fn test_policy_templates_expand() {
    let output = translate_fixture("policies.yaml");
    let role = &output["Resources"]["ReaderFunctionRole"]["Properties"];

    let inline = role["Policies"].as_array().unwrap();
    assert_eq!(inline.len(), 1);
    let statements = inline[0]["PolicyDocument"]["Statement"].as_array().unwrap();
    assert!(!statements.is_empty());

    let managed = role["ManagedPolicyArns"].as_array().unwrap();
    assert_eq!(
        managed,
        &vec![json!("arn:aws:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole")]
    );
}

#[test]
fn test_china_region_partition() {
    let options = TransformOptions::new("cn-north-1");
    assert_eq!(options.partition, Partition::AwsCn);
    assert!(ArnBuilder::from_options(&options)
        .lambda_function("f")
        .to_string()
        .starts_with("arn:aws-cn:"));

    let output = translate(fixture("rest_route.yaml"), options).unwrap();
    let output = serde_json::to_value(&output).unwrap();
    let role = &output["Resources"]["UsersFunctionRole"]["Properties"];
    for arn in role["ManagedPolicyArns"].as_array().unwrap() {
        assert!(arn.as_str().unwrap().starts_with("arn:aws-cn:"));
    }
    let uri = &output["Resources"]["ServerlessRestApi"]["Properties"]["Body"]["paths"]["/users"]["get"]
        ["x-amazon-apigateway-integration"]["uri"]["Fn::Sub"];
    assert!(uri.as_str().unwrap().starts_with("arn:aws-cn:apigateway:cn-north-1:"));
}

#[test]
fn test_failing_resource_is_named() {
    let err = translate(fixture("broken.yaml"), TransformOptions::default()).unwrap_err();
    match &err {
        TransformError::Conversion(errors) => {
            assert_eq!(errors.logical_ids(), vec!["NoHandler"]);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(err.to_string().contains("NoHandler"));
}

#[test]
fn test_full_application() {
    let output = translate_fixture("full_app.yaml");
    let resources = output["Resources"].as_object().unwrap();

    assert!(resources.values().all(|resource| !resource["Type"]
        .as_str()
        .unwrap()
        .starts_with("AWS::Serverless::")));

    // layer renamed and every reference followed
    let layers = ids_of_type(&output, "AWS::Lambda::LayerVersion");
    assert_eq!(layers.len(), 1);
    assert!(layers[0].starts_with("Deps"));
    assert_eq!(
        resources["CreateOrder"]["Properties"]["Layers"],
        json!([{"Ref": layers[0]}])
    );
    assert_eq!(output["Outputs"]["LayerArn"]["Value"], json!({"Ref": layers[0]}));

    // explicit REST API with the route merged and CORS applied
    let body = &resources["OrdersApi"]["Properties"]["Body"];
    assert!(body["paths"]["/orders"]["post"].is_object());
    assert!(body["paths"]["/orders"]["options"].is_object());
    assert!(resources.contains_key("OrdersApiStage"));
    assert_eq!(
        body["paths"]["/orders"]["post"]["x-amazon-apigateway-integration"]["uri"],
        json!({"Fn::Sub": "arn:aws:apigateway:us-east-1:lambda:path/2015-03-31/functions/${CreateOrderAliaslive}/invocations"})
    );

    // implicit HTTP API on the $default stage
    assert_eq!(resources["ServerlessHttpApi"]["Type"], "AWS::ApiGatewayV2::Api");
    assert_eq!(
        resources["ServerlessHttpApiApiGatewayDefaultStage"]["Properties"]["StageName"],
        "$default"
    );

    // globals applied to every function
    for function in ["CreateOrder", "ListOrders"] {
        assert_eq!(resources[function]["Properties"]["MemorySize"], 256);
        assert_eq!(resources[function]["Properties"]["TracingConfig"], json!({"Mode": "Active"}));
    }

    // state machine schedule and connector policy
    assert_eq!(resources["NightlyEvery"]["Type"], "AWS::Events::Rule");
    assert_eq!(
        resources["WriteOrdersPolicy"]["Properties"]["Roles"],
        json!([{"Ref": "ListOrdersRole"}])
    );
}

#[test]
fn test_translation_is_deterministic() {
    let first = serde_json::to_string(&translate_fixture("full_app.yaml")).unwrap();
    let second = serde_json::to_string(&translate_fixture("full_app.yaml")).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_json_and_yaml_inputs_agree() {
    let yaml = translate_fixture("rest_route.yaml");
    let json_text = serde_json::to_string(&serde_json::to_value(fixture("rest_route.yaml")).unwrap()).unwrap();
    let from_json = TemplateLoader::from_str(&json_text).unwrap();
    let output = translate(from_json, TransformOptions::default()).unwrap();
    assert_eq!(serde_json::to_value(&output).unwrap(), yaml);
}

#[test]
fn test_hook_failure_aborts_before_conversion() {
    let template = Template::from_value(Value::from(json!({
        "Globals": {"Unknown": {"Anything": 1}},
        "Resources": {"Table": {"Type": "AWS::Serverless::SimpleTable"}}
    })))
    .unwrap();
    let err = Translator::new(TransformOptions::default())
        .unwrap()
        .transform(template)
        .unwrap_err();
    assert!(matches!(err, TransformError::PipelineHook { .. }));
}

#[test]
fn test_kinds_convert_in_order() {
    // the connector sees the table and function in their converted form
    let template = Template::from_value(Value::from(json!({
        "Resources": {
            "AConnector": {
                "Type": "AWS::Serverless::Connector",
                "Properties": {
                    "Source": {"Id": "ZFunction"},
                    "Destination": {"Id": "ZTable"},
                    "Permissions": ["Write"]
                }
            },
            "ZFunction": {
                "Type": "AWS::Serverless::Function",
                "Properties": {"Handler": "h", "Runtime": "python3.12", "CodeUri": "s3://b/k"}
            },
            "ZTable": {"Type": "AWS::Serverless::SimpleTable"}
        }
    })))
    .unwrap();
    let output = translate(template, TransformOptions::default()).unwrap();
    assert_eq!(output.resources["AConnectorPolicy"].kind, "AWS::IAM::ManagedPolicy");
}

#[test]
fn test_rest_api_without_routes_translates() {
    let template = Template::from_value(Value::from(json!({
        "Transform": "AWS::Serverless-2016-10-31",
        "Resources": {
            "MyApi": {"Type": "AWS::Serverless::Api", "Properties": {"StageName": "prod"}}
        }
    })))
    .unwrap();
    let output = serde_json::to_value(translate(template, TransformOptions::default()).unwrap())
        .unwrap();

    let api = &output["Resources"]["MyApi"];
    assert_eq!(api["Type"], "AWS::ApiGateway::RestApi");
    assert_eq!(api["Properties"]["Body"]["swagger"], "2.0");
    assert_eq!(api["Properties"]["Body"]["paths"], json!({}));
    assert_eq!(ids_of_type(&output, "AWS::ApiGateway::Stage").len(), 1);
    assert_eq!(ids_of_type(&output, "AWS::ApiGateway::Deployment").len(), 1);
}

#[test]
fn test_http_api_without_routes_translates() {
    let template = Template::from_value(Value::from(json!({
        "Transform": "AWS::Serverless-2016-10-31",
        "Resources": {
            "MyHttpApi": {"Type": "AWS::Serverless::HttpApi"}
        }
    })))
    .unwrap();
    let output = serde_json::to_value(translate(template, TransformOptions::default()).unwrap())
        .unwrap();

    let api = &output["Resources"]["MyHttpApi"];
    assert_eq!(api["Type"], "AWS::ApiGatewayV2::Api");
    assert_eq!(api["Properties"]["Body"]["openapi"], "3.0.1");
    assert_eq!(api["Properties"]["Body"]["paths"], json!({}));
    assert_eq!(ids_of_type(&output, "AWS::ApiGatewayV2::Stage").len(), 1);
}
