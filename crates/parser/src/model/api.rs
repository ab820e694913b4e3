//! `AWS::Serverless::Api` and `AWS::Serverless::HttpApi` properties

use super::location::S3Location;
use crate::PropertyReader;
use sam_translator_common::{Map, Result, Value};
use tracing::warn;

/// Where an API definition comes from
#[derive(Debug, Clone, PartialEq)]
pub enum DefinitionSource {
    /// Inline `DefinitionBody`
    Body(Value),
    /// External `DefinitionUri`
    Uri(S3Location),
}

/// REST API properties
#[derive(Debug, Clone, PartialEq)]
pub struct ApiProperties {
    pub stage_name: Value,
    pub definition: Option<DefinitionSource>,
    pub name: Option<Value>,
    pub description: Option<Value>,
    pub cors: Option<RestCors>,
    pub auth: Option<ApiAuth>,
    pub open_api_version: Option<String>,
    pub variables: Option<Value>,
    pub endpoint_configuration: Option<Value>,
    pub method_settings: Option<Value>,
    pub tracing_enabled: Option<Value>,
    pub binary_media_types: Option<Value>,
    pub minimum_compression_size: Option<Value>,
    pub cache_cluster_enabled: Option<Value>,
    pub cache_cluster_size: Option<Value>,
    pub access_log_setting: Option<Value>,
    pub tags: Option<Value>,
    pub extra: Map,
}

/// HTTP API properties
#[derive(Debug, Clone, PartialEq)]
pub struct HttpApiProperties {
    pub stage_name: Value,
    pub definition: Option<DefinitionSource>,
    pub name: Option<Value>,
    pub description: Option<Value>,
    pub cors: Option<HttpCors>,
    pub auth: Option<ApiAuth>,
    pub stage_variables: Option<Value>,
    pub access_log_settings: Option<Value>,
    pub default_route_settings: Option<Value>,
    pub route_settings: Option<Value>,
    pub fail_on_warnings: Option<Value>,
    pub disable_execute_api_endpoint: Option<Value>,
    pub tags: Option<Map>,
    pub extra: Map,
}

/// Stage name of the implicit HTTP API and the default for explicit ones
pub const HTTP_DEFAULT_STAGE: &str = "$default";

/// REST CORS settings. A bare string is shorthand for `AllowOrigin`.
#[derive(Debug, Clone, PartialEq)]
pub struct RestCors {
    pub allow_origin: Value,
    pub allow_methods: Option<Value>,
    pub allow_headers: Option<Value>,
    pub max_age: Option<Value>,
    pub allow_credentials: bool,
}

/// HTTP API CORS: `true` for permissive defaults, or an explicit configuration
#[derive(Debug, Clone, PartialEq)]
pub enum HttpCors {
    Permissive,
    Configured(Map),
}

/// `Auth` block of an API
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiAuth {
    pub default_authorizer: Option<String>,
    pub api_key_required: bool,
    /// Authorizers keyed by name, in name order
    pub authorizers: Vec<(String, AuthorizerConfig)>,
}

impl ApiAuth {
    pub fn authorizer(&self, name: &str) -> Option<&AuthorizerConfig> {
        self.authorizers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, config)| config)
    }
}

/// Identity source style of a Lambda authorizer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LambdaAuthorizerKind {
    Token,
    Request,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthorizerConfig {
    UserPool {
        user_pool_arn: Value,
        header: String,
    },
    Lambda {
        kind: LambdaAuthorizerKind,
        function_arn: Value,
        identity: Option<Map>,
        payload_format_version: Option<String>,
    },
    Jwt {
        issuer: Option<Value>,
        audience: Option<Value>,
        identity_source: String,
    },
    /// Configuration shape that matched none of the above
    Unrecognized(Map),
}

impl AuthorizerConfig {
    /// Function backing a Lambda authorizer
    pub fn lambda_arn(&self) -> Option<&Value> {
        match self {
            AuthorizerConfig::Lambda { function_arn, .. } => Some(function_arn),
            _ => None,
        }
    }
}

impl ApiProperties {
    pub fn decode(mut reader: PropertyReader) -> Result<Self> {
        let stage_name = reader.required("StageName")?;
        let definition = take_definition(&mut reader)?;
        let cors = take_rest_cors(&mut reader)?;
        let auth = take_auth(&mut reader)?;
        Ok(Self {
            stage_name,
            definition,
            name: reader.optional("Name"),
            description: reader.optional("Description"),
            cors,
            auth,
            open_api_version: reader.optional_string("OpenApiVersion")?,
            variables: reader.optional("Variables"),
            endpoint_configuration: reader.optional("EndpointConfiguration"),
            method_settings: reader.optional("MethodSettings"),
            tracing_enabled: reader.optional("TracingEnabled"),
            binary_media_types: reader.optional("BinaryMediaTypes"),
            minimum_compression_size: reader.optional("MinimumCompressionSize"),
            cache_cluster_enabled: reader.optional("CacheClusterEnabled"),
            cache_cluster_size: reader.optional("CacheClusterSize"),
            access_log_setting: reader.optional("AccessLogSetting"),
            tags: reader.optional("Tags"),
            extra: reader.into_extra(),
        })
    }

    /// Whether the generated document should be OpenAPI 3 instead of swagger 2
    pub fn uses_openapi3(&self) -> bool {
        self.open_api_version
            .as_deref()
            .map(|v| v.starts_with('3'))
            .unwrap_or(false)
    }
}

impl HttpApiProperties {
    pub fn decode(mut reader: PropertyReader) -> Result<Self> {
        let stage_name = reader
            .optional("StageName")
            .unwrap_or_else(|| Value::from(HTTP_DEFAULT_STAGE));
        let definition = take_definition(&mut reader)?;
        let cors = match reader.optional("CorsConfiguration") {
            None | Some(Value::Bool(false)) => None,
            Some(Value::Bool(true)) => Some(HttpCors::Permissive),
            Some(Value::Map(map)) => Some(HttpCors::Configured(map)),
            Some(other) => {
                return Err(reader.error(
                    "CorsConfiguration",
                    format!("must be a boolean or a map, found {}", other.type_name()),
                ))
            }
        };
        let auth = take_auth(&mut reader)?;
        Ok(Self {
            stage_name,
            definition,
            name: reader.optional("Name"),
            description: reader.optional("Description"),
            cors,
            auth,
            stage_variables: reader.optional("StageVariables"),
            access_log_settings: reader.optional("AccessLogSettings"),
            default_route_settings: reader.optional("DefaultRouteSettings"),
            route_settings: reader.optional("RouteSettings"),
            fail_on_warnings: reader.optional("FailOnWarnings"),
            disable_execute_api_endpoint: reader.optional("DisableExecuteApiEndpoint"),
            tags: reader.optional_map("Tags")?,
            extra: reader.into_extra(),
        })
    }
}

fn take_definition(reader: &mut PropertyReader) -> Result<Option<DefinitionSource>> {
    let body = reader.optional("DefinitionBody");
    let uri = S3Location::take(reader, "DefinitionUri")?;
    match (body, uri) {
        (Some(_), Some(_)) => Err(reader.error(
            "DefinitionBody",
            "cannot be combined with DefinitionUri",
        )),
        (Some(body), None) => Ok(Some(DefinitionSource::Body(body))),
        (None, Some(uri)) => Ok(Some(DefinitionSource::Uri(uri))),
        (None, None) => Ok(None),
    }
}

fn take_rest_cors(reader: &mut PropertyReader) -> Result<Option<RestCors>> {
    match reader.optional("Cors") {
        None => Ok(None),
        Some(Value::Map(map)) => {
            let mut cors = reader.nested("Cors", map);
            Ok(Some(RestCors {
                allow_origin: cors.required("AllowOrigin")?,
                allow_methods: cors.optional("AllowMethods"),
                allow_headers: cors.optional("AllowHeaders"),
                max_age: cors.optional("MaxAge"),
                allow_credentials: cors.optional_bool("AllowCredentials")?.unwrap_or(false),
            }))
        }
        Some(origin) => Ok(Some(RestCors {
            allow_origin: origin,
            allow_methods: None,
            allow_headers: None,
            max_age: None,
            allow_credentials: false,
        })),
    }
}

fn take_auth(reader: &mut PropertyReader) -> Result<Option<ApiAuth>> {
    let Some(mut auth) = reader.optional_reader("Auth")? else {
        return Ok(None);
    };
    let default_authorizer = auth.optional_string("DefaultAuthorizer")?;
    let api_key_required = auth.optional_bool("ApiKeyRequired")?.unwrap_or(false);
    let mut authorizers = Vec::new();
    for (name, config) in auth.named_entries("Authorizers")? {
        authorizers.push((name.clone(), decode_authorizer(&name, config)?));
    }

    if let Some(default) = &default_authorizer {
        let known = default == "AWS_IAM" || authorizers.iter().any(|(n, _)| n == default);
        if !known {
            return Err(auth.error(
                "DefaultAuthorizer",
                format!("'{}' is not defined in Authorizers", default),
            ));
        }
    }

    Ok(Some(ApiAuth {
        default_authorizer,
        api_key_required,
        authorizers,
    }))
}

fn decode_authorizer(name: &str, mut config: PropertyReader) -> Result<AuthorizerConfig> {
    if let Some(user_pool_arn) = config.optional("UserPoolArn") {
        let header = config
            .optional_reader("Identity")?
            .map(|mut identity| identity.optional_string("Header"))
            .transpose()?
            .flatten()
            .unwrap_or_else(|| "Authorization".to_string());
        return Ok(AuthorizerConfig::UserPool {
            user_pool_arn,
            header,
        });
    }

    if let Some(function_arn) = config.optional("FunctionArn") {
        let kind = match config.optional_string("FunctionPayloadType")?.as_deref() {
            None | Some("TOKEN") => LambdaAuthorizerKind::Token,
            Some("REQUEST") => LambdaAuthorizerKind::Request,
            Some(other) => {
                return Err(config.error(
                    "FunctionPayloadType",
                    format!("must be TOKEN or REQUEST, found '{}'", other),
                ))
            }
        };
        return Ok(AuthorizerConfig::Lambda {
            kind,
            function_arn,
            identity: config.optional_map("Identity")?,
            payload_format_version: config.optional_string("AuthorizerPayloadFormatVersion")?,
        });
    }

    if let Some(mut jwt) = config.optional_reader("JwtConfiguration")? {
        return Ok(AuthorizerConfig::Jwt {
            issuer: jwt.optional("issuer"),
            audience: jwt.optional("audience"),
            identity_source: config
                .optional_string("IdentitySource")?
                .unwrap_or_else(|| "$request.header.Authorization".to_string()),
        });
    }

    warn!(authorizer = name, "unrecognized authorizer configuration");
    Ok(AuthorizerConfig::Unrecognized(config.into_extra()))
}
