//! Security scheme objects for API authorizers

use super::ApiFlavor;
use crate::arn::ArnBuilder;
use sam_translator_common::{Map, Value};
use sam_translator_parser::model::{AuthorizerConfig, LambdaAuthorizerKind};
use tracing::warn;

/// Scheme name used for IAM-authorized operations
pub const AWS_IAM_SCHEME: &str = "AWS_IAM";

/// Scheme name used for operations requiring an API key
pub const API_KEY_SCHEME: &str = "api_key";

const AUTHTYPE: &str = "x-amazon-apigateway-authtype";
const AUTHORIZER: &str = "x-amazon-apigateway-authorizer";

fn header_scheme(header: &str) -> Map {
    let mut scheme = Map::new();
    scheme.insert("type".to_string(), Value::from("apiKey"));
    scheme.insert("name".to_string(), Value::from(header));
    scheme.insert("in".to_string(), Value::from("header"));
    scheme
}

/// `x-api-key` header scheme
pub fn api_key_scheme() -> Value {
    Value::Map(header_scheme("x-api-key"))
}

/// SigV4 signed request scheme
pub fn aws_iam_scheme() -> Value {
    let mut scheme = header_scheme("Authorization");
    scheme.insert(AUTHTYPE.to_string(), Value::from("awsSigv4"));
    Value::Map(scheme)
}

/// Invocation URI of an authorizer function, as an `Fn::Sub`
fn authorizer_uri(function_arn: &Value, arns: &ArnBuilder) -> Value {
    let mut variables = Map::new();
    variables.insert("__FunctionArn__".to_string(), function_arn.clone());
    Value::sub_with(
        arns.lambda_integration_uri("${__FunctionArn__}").to_string(),
        variables,
    )
}

/// Identity sources of a request authorizer, in API Gateway syntax
fn request_identity_sources(identity: Option<&Map>, flavor: ApiFlavor) -> Vec<String> {
    let sections: [(&str, &str); 4] = match flavor {
        ApiFlavor::Rest => [
            ("Headers", "method.request.header."),
            ("QueryStrings", "method.request.querystring."),
            ("StageVariables", "stageVariables."),
            ("Context", "context."),
        ],
        ApiFlavor::Http => [
            ("Headers", "$request.header."),
            ("QueryStrings", "$request.querystring."),
            ("StageVariables", "$stageVariables."),
            ("Context", "$context."),
        ],
    };

    let Some(identity) = identity else {
        return Vec::new();
    };
    sections
        .iter()
        .flat_map(|(key, prefix)| {
            identity
                .get(*key)
                .and_then(Value::as_list)
                .into_iter()
                .flatten()
                .filter_map(Value::as_str)
                .map(move |name| format!("{}{}", prefix, name))
        })
        .collect()
}

/// Build the security scheme for one declared authorizer
///
/// # Arguments
/// * `name` - Authorizer name, used for diagnostics
/// * `config` - Decoded authorizer configuration
/// * `flavor` - REST and HTTP APIs use different authorizer shapes
/// * `arns` - Builder for the authorizer function's invocation URI
pub fn security_scheme(
    name: &str,
    config: &AuthorizerConfig,
    flavor: ApiFlavor,
    arns: &ArnBuilder,
) -> Value {
    match config {
        AuthorizerConfig::UserPool {
            user_pool_arn,
            header,
        } => {
            let mut authorizer = Map::new();
            authorizer.insert("type".to_string(), Value::from("cognito_user_pools"));
            let providers = match user_pool_arn {
                Value::List(arns) => arns.clone(),
                single => vec![single.clone()],
            };
            authorizer.insert("providerARNs".to_string(), Value::List(providers));

            let mut scheme = header_scheme(header);
            scheme.insert(AUTHTYPE.to_string(), Value::from("cognito_user_pools"));
            scheme.insert(AUTHORIZER.to_string(), Value::Map(authorizer));
            Value::Map(scheme)
        }
        AuthorizerConfig::Lambda {
            kind,
            function_arn,
            identity,
            payload_format_version,
        } => {
            let mut authorizer = Map::new();
            authorizer.insert(
                "authorizerUri".to_string(),
                authorizer_uri(function_arn, arns),
            );

            let header = identity
                .as_ref()
                .and_then(|i| i.get("Header"))
                .and_then(Value::as_str)
                .unwrap_or("Authorization")
                .to_string();

            match (flavor, kind) {
                (ApiFlavor::Rest, LambdaAuthorizerKind::Token) => {
                    authorizer.insert("type".to_string(), Value::from("token"));
                    if let Some(ttl) = identity.as_ref().and_then(|i| i.get("ReauthorizeEvery")) {
                        authorizer.insert("authorizerResultTtlInSeconds".to_string(), ttl.clone());
                    }
                }
                (ApiFlavor::Rest, LambdaAuthorizerKind::Request) => {
                    authorizer.insert("type".to_string(), Value::from("request"));
                    let sources = request_identity_sources(identity.as_ref(), flavor);
                    if !sources.is_empty() {
                        authorizer.insert(
                            "identitySource".to_string(),
                            Value::from(sources.join(", ")),
                        );
                    }
                }
                (ApiFlavor::Http, _) => {
                    authorizer.insert("type".to_string(), Value::from("request"));
                    authorizer.insert(
                        "authorizerPayloadFormatVersion".to_string(),
                        Value::from(payload_format_version.as_deref().unwrap_or("2.0")),
                    );
                    let mut sources = request_identity_sources(identity.as_ref(), flavor);
                    if sources.is_empty() {
                        sources.push(format!("$request.header.{}", header));
                    }
                    authorizer.insert(
                        "identitySource".to_string(),
                        Value::List(sources.into_iter().map(Value::from).collect()),
                    );
                }
            }

            let mut scheme = header_scheme(&header);
            if flavor == ApiFlavor::Rest {
                scheme.insert(AUTHTYPE.to_string(), Value::from("custom"));
            }
            scheme.insert(AUTHORIZER.to_string(), Value::Map(authorizer));
            Value::Map(scheme)
        }
        AuthorizerConfig::Jwt {
            issuer,
            audience,
            identity_source,
        } => {
            let mut jwt = Map::new();
            if let Some(issuer) = issuer {
                jwt.insert("issuer".to_string(), issuer.clone());
            }
            if let Some(audience) = audience {
                jwt.insert("audience".to_string(), audience.clone());
            }

            let mut authorizer = Map::new();
            authorizer.insert("type".to_string(), Value::from("jwt"));
            authorizer.insert("jwtConfiguration".to_string(), Value::Map(jwt));
            authorizer.insert(
                "identitySource".to_string(),
                Value::from(identity_source.as_str()),
            );

            let mut scheme = Map::new();
            scheme.insert("type".to_string(), Value::from("oauth2"));
            scheme.insert(AUTHORIZER.to_string(), Value::Map(authorizer));
            Value::Map(scheme)
        }
        AuthorizerConfig::Unrecognized(_) => {
            warn!(
                authorizer = name,
                "falling back to an API key scheme for unrecognized authorizer"
            );
            api_key_scheme()
        }
    }
}
