//! `AWS::Serverless::SimpleTable` properties

use crate::PropertyReader;
use sam_translator_common::{Map, Result, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct SimpleTableProperties {
    pub primary_key: PrimaryKey,
    pub provisioned_throughput: Option<Value>,
    pub table_name: Option<Value>,
    pub tags: Option<Map>,
    pub sse_specification: Option<Value>,
    pub extra: Map,
}

/// Hash key of the table
#[derive(Debug, Clone, PartialEq)]
pub struct PrimaryKey {
    pub name: Value,
    pub attribute_type: AttributeType,
}

impl Default for PrimaryKey {
    fn default() -> Self {
        Self {
            name: Value::from("id"),
            attribute_type: AttributeType::String,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    String,
    Number,
    Binary,
}

impl AttributeType {
    /// DynamoDB attribute type letter
    pub fn code(&self) -> &'static str {
        match self {
            AttributeType::String => "S",
            AttributeType::Number => "N",
            AttributeType::Binary => "B",
        }
    }
}

impl SimpleTableProperties {
    pub fn decode(mut reader: PropertyReader) -> Result<Self> {
        let primary_key = match reader.optional_reader("PrimaryKey")? {
            None => PrimaryKey::default(),
            Some(mut key) => {
                let name = key.required("Name")?;
                let attribute_type = match key.required_string("Type")?.as_str() {
                    "String" => AttributeType::String,
                    "Number" => AttributeType::Number,
                    "Binary" => AttributeType::Binary,
                    other => {
                        return Err(key.error(
                            "Type",
                            format!("must be String, Number or Binary, found '{}'", other),
                        ))
                    }
                };
                PrimaryKey {
                    name,
                    attribute_type,
                }
            }
        };
        Ok(Self {
            primary_key,
            provisioned_throughput: reader.optional("ProvisionedThroughput"),
            table_name: reader.optional("TableName"),
            tags: reader.optional_map("Tags")?,
            sse_specification: reader.optional("SSESpecification"),
            extra: reader.into_extra(),
        })
    }
}
