//! `AWS::Serverless::GraphQLApi` properties

use super::location::S3Location;
use crate::PropertyReader;
use sam_translator_common::{Map, Result, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct GraphQLApiProperties {
    pub name: Option<Value>,
    pub schema: GraphQLSchema,
    pub auth: GraphQLAuth,
    pub api_keys: Vec<(String, Map)>,
    /// `Some` when logging is enabled; carries the raw configuration
    pub logging: Option<Map>,
    pub xray_enabled: Option<Value>,
    pub data_sources: Vec<DataSource>,
    pub functions: Vec<(String, PipelineFunction)>,
    pub resolvers: Vec<Resolver>,
    pub tags: Option<Map>,
    pub extra: Map,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GraphQLSchema {
    Inline(Value),
    Uri(S3Location),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphQLAuth {
    pub auth_type: Value,
    pub settings: Map,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DataSourceKind {
    DynamoDb { table_name: Value, table_arn: Option<Value> },
    Lambda { function_arn: Value },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataSource {
    pub name: String,
    pub kind: DataSourceKind,
    pub service_role_arn: Option<Value>,
    pub description: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineFunction {
    pub data_source: String,
    pub runtime: Option<Value>,
    pub code: Option<Value>,
    pub code_uri: Option<Value>,
    pub description: Option<Value>,
}

/// Resolver for one field of one type
#[derive(Debug, Clone, PartialEq)]
pub struct Resolver {
    pub type_name: String,
    pub field_name: String,
    /// Pipeline function names, in execution order
    pub pipeline: Vec<String>,
    pub runtime: Option<Value>,
    pub code: Option<Value>,
    pub code_uri: Option<Value>,
}

impl GraphQLApiProperties {
    pub fn decode(mut reader: PropertyReader) -> Result<Self> {
        let schema = match (
            reader.optional("SchemaInline"),
            S3Location::take(&mut reader, "SchemaUri")?,
        ) {
            (Some(_), Some(_)) => {
                return Err(reader.error("SchemaInline", "cannot be combined with SchemaUri"))
            }
            (Some(inline), None) => GraphQLSchema::Inline(inline),
            (None, Some(uri)) => GraphQLSchema::Uri(uri),
            (None, None) => return Err(reader.error("SchemaInline", "or SchemaUri is required")),
        };

        let mut auth_reader = reader.required_reader("Auth")?;
        let auth = GraphQLAuth {
            auth_type: auth_reader.required("Type")?,
            settings: auth_reader.into_extra(),
        };

        let api_keys = reader
            .named_entries("ApiKeys")?
            .into_iter()
            .map(|(name, key)| (name, key.into_extra()))
            .collect();

        let logging = match reader.optional("Logging") {
            None | Some(Value::Bool(false)) => None,
            Some(Value::Bool(true)) => Some(Map::new()),
            Some(Value::Map(map)) => Some(map),
            Some(other) => {
                return Err(reader.error(
                    "Logging",
                    format!("must be a boolean or a map, found {}", other.type_name()),
                ))
            }
        };

        let data_sources = take_data_sources(&mut reader)?;
        let mut functions = Vec::new();
        for (name, mut function) in reader.named_entries("Functions")? {
            let data_source = function.required_string("DataSource")?;
            if !data_sources.iter().any(|ds| ds.name == data_source) {
                return Err(function.error(
                    "DataSource",
                    format!("'{}' is not declared in DataSources", data_source),
                ));
            }
            functions.push((
                name,
                PipelineFunction {
                    data_source,
                    runtime: function.optional("Runtime"),
                    code: function.optional("InlineCode"),
                    code_uri: function.optional("CodeUri"),
                    description: function.optional("Description"),
                },
            ));
        }

        let resolvers = take_resolvers(&mut reader, &functions)?;

        Ok(Self {
            name: reader.optional("Name"),
            schema,
            auth,
            api_keys,
            logging,
            xray_enabled: reader.optional("XrayEnabled"),
            data_sources,
            functions,
            resolvers,
            tags: reader.optional_map("Tags")?,
            extra: reader.into_extra(),
        })
    }
}

fn take_data_sources(reader: &mut PropertyReader) -> Result<Vec<DataSource>> {
    let Some(mut sources) = reader.optional_reader("DataSources")? else {
        return Ok(Vec::new());
    };
    let mut decoded = Vec::new();
    for (name, mut source) in sources.named_entries("DynamoDb")? {
        decoded.push(DataSource {
            name,
            kind: DataSourceKind::DynamoDb {
                table_name: source.required("TableName")?,
                table_arn: source.optional("TableArn"),
            },
            service_role_arn: source.optional("ServiceRoleArn"),
            description: source.optional("Description"),
        });
    }
    for (name, mut source) in sources.named_entries("Lambda")? {
        decoded.push(DataSource {
            name,
            kind: DataSourceKind::Lambda {
                function_arn: source.required("FunctionArn")?,
            },
            service_role_arn: source.optional("ServiceRoleArn"),
            description: source.optional("Description"),
        });
    }
    Ok(decoded)
}

fn take_resolvers(
    reader: &mut PropertyReader,
    functions: &[(String, PipelineFunction)],
) -> Result<Vec<Resolver>> {
    let mut resolvers = Vec::new();
    for (type_name, mut fields) in reader.named_entries("Resolvers")? {
        for field_name in fields.keys() {
            let mut resolver = fields.required_reader(&field_name)?;
            let pipeline = resolver.string_list("Pipeline")?;
            if let Some(missing) = pipeline
                .iter()
                .find(|name| !functions.iter().any(|(f, _)| f == *name))
            {
                return Err(resolver.error(
                    "Pipeline",
                    format!("references undeclared function '{}'", missing),
                ));
            }
            resolvers.push(Resolver {
                type_name: type_name.clone(),
                field_name: resolver
                    .optional_string("FieldName")?
                    .unwrap_or_else(|| field_name.clone()),
                pipeline,
                runtime: resolver.optional("Runtime"),
                code: resolver.optional("InlineCode"),
                code_uri: resolver.optional("CodeUri"),
            });
        }
    }
    Ok(resolvers)
}
