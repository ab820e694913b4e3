//! API definition documents
//!
//! [`ApiSpecEditor`] builds or extends the OpenAPI/Swagger body of a REST or
//! HTTP API. Edits only ever add: an operation that already exists in the
//! document is left as written.

mod security;

pub use security::{api_key_scheme, aws_iam_scheme, security_scheme, API_KEY_SCHEME, AWS_IAM_SCHEME};

use sam_translator_common::{Map, Value};
use sam_translator_parser::model::RestCors;

pub const SWAGGER_VERSION: &str = "2.0";
pub const OPENAPI_VERSION: &str = "3.0.1";

const SWAGGER: &str = "swagger";
const OPENAPI: &str = "openapi";
const PATHS: &str = "paths";
const INTEGRATION: &str = "x-amazon-apigateway-integration";
const ANY_METHOD: &str = "x-amazon-apigateway-any-method";
/// Methods an `any` operation answers
const ALL_METHODS: [&str; 7] = ["DELETE", "GET", "HEAD", "OPTIONS", "PATCH", "POST", "PUT"];
const HTTP_CORS: &str = "x-amazon-apigateway-cors";

/// Route key of the catch-all route of an HTTP API
pub const DEFAULT_ROUTE: &str = "$default";

/// Which API product the document describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiFlavor {
    Rest,
    Http,
}

/// HTTP-only integration settings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpIntegration {
    pub payload_format_version: Option<String>,
    pub timeout_in_millis: Option<Value>,
}

/// Editor over one API definition document
#[derive(Debug, Clone, PartialEq)]
pub struct ApiSpecEditor {
    flavor: ApiFlavor,
    openapi3: bool,
    document: Map,
}

impl ApiSpecEditor {
    /// Empty REST definition; Swagger 2.0 unless `openapi3`
    pub fn new_rest(openapi3: bool) -> Self {
        let version_key = if openapi3 { OPENAPI } else { SWAGGER };
        let version = if openapi3 {
            OPENAPI_VERSION
        } else {
            SWAGGER_VERSION
        };
        Self::with_version(ApiFlavor::Rest, openapi3, version_key, version)
    }

    /// Empty HTTP API definition, always OpenAPI 3
    pub fn new_http() -> Self {
        Self::with_version(ApiFlavor::Http, true, OPENAPI, OPENAPI_VERSION)
    }

    fn with_version(flavor: ApiFlavor, openapi3: bool, key: &str, version: &str) -> Self {
        let mut info = Map::new();
        info.insert("version".to_string(), Value::from("1.0"));
        info.insert("title".to_string(), Value::reference("AWS::StackName"));

        let mut document = Map::new();
        document.insert(key.to_string(), Value::from(version));
        document.insert("info".to_string(), Value::Map(info));
        document.insert(PATHS.to_string(), Value::Map(Map::new()));
        Self {
            flavor,
            openapi3,
            document,
        }
    }

    /// Wrap an existing inline definition.
    ///
    /// The format is taken from the document's own version key. Returns `None`
    /// when the body is not a literal definition (e.g. an `Fn::Transform`).
    pub fn from_document(flavor: ApiFlavor, body: Value) -> Option<Self> {
        let mut document = body.into_map()?;
        let openapi3 = if document.contains_key(OPENAPI) {
            true
        } else if document.contains_key(SWAGGER) {
            false
        } else {
            return None;
        };
        match document.get(PATHS) {
            None => {
                document.insert(PATHS.to_string(), Value::Map(Map::new()));
            }
            Some(Value::Map(_)) => {}
            Some(_) => return None,
        }
        Some(Self {
            flavor,
            openapi3,
            document,
        })
    }

    pub fn flavor(&self) -> ApiFlavor {
        self.flavor
    }

    pub fn is_openapi3(&self) -> bool {
        self.openapi3
    }

    /// Operation key for an event method (`any` becomes the catch-all key)
    pub fn operation_key(method: &str) -> String {
        let method = method.to_lowercase();
        if method == "any" {
            ANY_METHOD.to_string()
        } else {
            method
        }
    }

    pub fn has_path(&self, path: &str) -> bool {
        self.paths().map(|p| p.contains_key(path)).unwrap_or(false)
    }

    pub fn has_operation(&self, path: &str, method: &str) -> bool {
        self.paths()
            .and_then(|p| p.get(path))
            .and_then(|item| item.get(&Self::operation_key(method)))
            .is_some()
    }

    /// Operation keys declared under a path
    pub fn methods(&self, path: &str) -> Vec<String> {
        self.paths()
            .and_then(|p| p.get(path))
            .and_then(Value::as_map)
            .map(|item| item.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Paths in document order
    pub fn path_names(&self) -> Vec<String> {
        self.paths()
            .map(|p| p.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn paths(&self) -> Option<&Map> {
        self.document.get(PATHS).and_then(Value::as_map)
    }

    fn path_item_mut(&mut self, path: &str) -> Option<&mut Map> {
        self.document
            .entry(PATHS.to_string())
            .or_insert_with(|| Value::Map(Map::new()))
            .as_map_mut()?
            .entry(path.to_string())
            .or_insert_with(|| Value::Map(Map::new()))
            .as_map_mut()
    }

    fn operation_mut(&mut self, path: &str, method: &str) -> Option<&mut Map> {
        self.path_item_mut(path)?
            .get_mut(&Self::operation_key(method))
            .and_then(Value::as_map_mut)
    }

    /// Add a Lambda proxy operation unless the document already has one.
    ///
    /// Returns whether the operation was added.
    pub fn add_lambda_integration(
        &mut self,
        path: &str,
        method: &str,
        integration_uri: Value,
        http: Option<&HttpIntegration>,
    ) -> bool {
        if self.has_operation(path, method) {
            return false;
        }

        let mut integration = Map::new();
        integration.insert("type".to_string(), Value::from("aws_proxy"));
        integration.insert("httpMethod".to_string(), Value::from("POST"));
        integration.insert("uri".to_string(), integration_uri);
        if self.flavor == ApiFlavor::Http {
            let http = http.cloned().unwrap_or_default();
            integration.insert(
                "payloadFormatVersion".to_string(),
                Value::from(http.payload_format_version.unwrap_or_else(|| "2.0".to_string())),
            );
            if let Some(timeout) = http.timeout_in_millis {
                integration.insert("timeoutInMillis".to_string(), timeout);
            }
        }

        let mut ok = Map::new();
        ok.insert("description".to_string(), Value::from("OK"));
        let mut responses = Map::new();
        responses.insert("200".to_string(), Value::Map(ok));

        let mut operation = Map::new();
        operation.insert(INTEGRATION.to_string(), Value::Map(integration));
        operation.insert("responses".to_string(), Value::Map(responses));
        let parameters = self.path_parameters(path);
        if !parameters.is_empty() {
            operation.insert("parameters".to_string(), Value::List(parameters));
        }

        let key = Self::operation_key(method);
        match self.path_item_mut(path) {
            Some(item) => {
                item.insert(key, Value::Map(operation));
                true
            }
            None => false,
        }
    }

    /// `in: path` parameters for every `{name}` or `{name+}` segment
    fn path_parameters(&self, path: &str) -> Vec<Value> {
        path.split('/')
            .filter_map(|segment| segment.strip_prefix('{')?.strip_suffix('}'))
            .map(|name| name.trim_end_matches('+'))
            .filter(|name| !name.is_empty())
            .map(|name| {
                let mut parameter = Map::new();
                parameter.insert("name".to_string(), Value::from(name));
                parameter.insert("in".to_string(), Value::from("path"));
                parameter.insert("required".to_string(), Value::Bool(true));
                if self.openapi3 {
                    let mut schema = Map::new();
                    schema.insert("type".to_string(), Value::from("string"));
                    parameter.insert("schema".to_string(), Value::Map(schema));
                } else {
                    parameter.insert("type".to_string(), Value::from("string"));
                }
                Value::Map(parameter)
            })
            .collect()
    }

    /// Set the security requirement of an operation
    ///
    /// # Arguments
    /// * `requirements` - Scheme names with their scopes, e.g. `[("MyCognito", ["read"])]`
    pub fn add_security(&mut self, path: &str, method: &str, requirements: &[(String, Vec<String>)]) {
        if requirements.is_empty() {
            return;
        }
        let Some(operation) = self.operation_mut(path, method) else {
            return;
        };
        let list = requirements
            .iter()
            .map(|(name, scopes)| {
                let mut requirement = Map::new();
                requirement.insert(
                    name.clone(),
                    Value::List(scopes.iter().cloned().map(Value::from).collect()),
                );
                Value::Map(requirement)
            })
            .collect();
        operation.insert("security".to_string(), Value::List(list));
    }

    /// Register a security scheme unless one of that name exists
    pub fn add_security_scheme(&mut self, name: &str, scheme: Value) {
        let section = if self.openapi3 {
            let components = self
                .document
                .entry("components".to_string())
                .or_insert_with(|| Value::Map(Map::new()));
            let Some(components) = components.as_map_mut() else {
                return;
            };
            components
                .entry("securitySchemes".to_string())
                .or_insert_with(|| Value::Map(Map::new()))
        } else {
            self.document
                .entry("securityDefinitions".to_string())
                .or_insert_with(|| Value::Map(Map::new()))
        };
        if let Some(section) = section.as_map_mut() {
            section.entry(name.to_string()).or_insert(scheme);
        }
    }

    /// Add an `options` mock operation answering CORS preflight requests
    pub fn add_rest_cors(&mut self, path: &str, cors: &RestCors) {
        if self.has_operation(path, "options") {
            return;
        }

        let allow_methods = cors.allow_methods.clone().unwrap_or_else(|| {
            let mut methods: Vec<String> = self
                .methods(path)
                .iter()
                .flat_map(|m| {
                    if m == ANY_METHOD {
                        ALL_METHODS.iter().map(|m| m.to_string()).collect()
                    } else {
                        vec![m.to_uppercase()]
                    }
                })
                .collect();
            methods.push("OPTIONS".to_string());
            methods.sort();
            methods.dedup();
            Value::from(format!("'{}'", methods.join(",")))
        });

        let mut headers = Map::new();
        let mut response_parameters = Map::new();
        let mut allow = |name: &str, value: Option<Value>| {
            if let Some(value) = value {
                let mut header = Map::new();
                header.insert("type".to_string(), Value::from("string"));
                headers.insert(name.to_string(), Value::Map(header));
                response_parameters
                    .insert(format!("method.response.header.{}", name), value);
            }
        };
        allow("Access-Control-Allow-Origin", Some(cors.allow_origin.clone()));
        allow("Access-Control-Allow-Methods", Some(allow_methods));
        allow("Access-Control-Allow-Headers", cors.allow_headers.clone());
        allow("Access-Control-Max-Age", cors.max_age.clone());
        allow(
            "Access-Control-Allow-Credentials",
            cors.allow_credentials.then(|| Value::from("'true'")),
        );

        let mut default_response = Map::new();
        default_response.insert("statusCode".to_string(), Value::from("200"));
        default_response.insert(
            "responseParameters".to_string(),
            Value::Map(response_parameters),
        );
        default_response.insert("responseTemplates".to_string(), {
            let mut templates = Map::new();
            templates.insert("application/json".to_string(), Value::from("{}\n"));
            Value::Map(templates)
        });
        let mut integration_responses = Map::new();
        integration_responses.insert("default".to_string(), Value::Map(default_response));

        let mut request_templates = Map::new();
        request_templates.insert(
            "application/json".to_string(),
            Value::from("{\n  \"statusCode\" : 200\n}\n"),
        );

        let mut integration = Map::new();
        integration.insert("type".to_string(), Value::from("mock"));
        integration.insert("requestTemplates".to_string(), Value::Map(request_templates));
        integration.insert("responses".to_string(), Value::Map(integration_responses));
        integration.insert("passthroughBehavior".to_string(), Value::from("when_no_match"));

        let mut ok = Map::new();
        ok.insert("description".to_string(), Value::from("Default response for CORS method"));
        ok.insert("headers".to_string(), Value::Map(headers));
        let mut responses = Map::new();
        responses.insert("200".to_string(), Value::Map(ok));

        let mut operation = Map::new();
        operation.insert("summary".to_string(), Value::from("CORS support"));
        operation.insert(INTEGRATION.to_string(), Value::Map(integration));
        operation.insert("responses".to_string(), Value::Map(responses));
        if !self.openapi3 {
            operation.insert(
                "consumes".to_string(),
                Value::List(vec![Value::from("application/json")]),
            );
            operation.insert(
                "produces".to_string(),
                Value::List(vec![Value::from("application/json")]),
            );
        }

        if let Some(item) = self.path_item_mut(path) {
            item.insert("options".to_string(), Value::Map(operation));
        }
    }

    /// Set the top-level CORS extension of an HTTP API
    pub fn set_http_cors(&mut self, configuration: Map) {
        let cors = configuration
            .into_iter()
            .map(|(key, value)| (lower_first(&key), value))
            .collect();
        self.document
            .insert(HTTP_CORS.to_string(), Value::Map(cors));
    }

    /// Permissive CORS for an HTTP API (`CorsConfiguration: true`)
    pub fn set_http_cors_permissive(&mut self) {
        let any = || Value::List(vec![Value::from("*")]);
        let mut cors = Map::new();
        cors.insert("AllowOrigins".to_string(), any());
        cors.insert("AllowHeaders".to_string(), any());
        cors.insert("AllowMethods".to_string(), any());
        self.set_http_cors(cors);
    }

    pub fn into_value(self) -> Value {
        Value::Map(self.document)
    }
}

fn lower_first(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
