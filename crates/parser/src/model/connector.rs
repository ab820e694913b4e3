//! `AWS::Serverless::Connector` properties

use crate::PropertyReader;
use sam_translator_common::{Map, Result, Value};

/// Access a connector grants from its source to its destinations
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConnectorPermission {
    Read,
    Write,
}

/// One end of a connector
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectorEndpoint {
    /// Resource declared in this template
    Resource(String),
    /// Resource described by explicit attributes (`Type`, `Arn`, `RoleName`, ...)
    External { kind: String, attributes: Map },
}

impl ConnectorEndpoint {
    fn decode(reader: &PropertyReader, key: &str, value: Value) -> Result<Self> {
        let Value::Map(map) = value else {
            return Err(reader.error(key, "must be a map with Id or Type"));
        };
        let mut endpoint = reader.nested(key, map);
        if let Some(id) = endpoint.optional_string("Id")? {
            return Ok(ConnectorEndpoint::Resource(id));
        }
        let kind = endpoint
            .optional_string("Type")?
            .ok_or_else(|| endpoint.error("Id", "or Type is required"))?;
        Ok(ConnectorEndpoint::External {
            kind,
            attributes: endpoint.into_extra(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectorProperties {
    pub source: ConnectorEndpoint,
    pub destinations: Vec<ConnectorEndpoint>,
    pub permissions: Vec<ConnectorPermission>,
    pub extra: Map,
}

impl ConnectorProperties {
    pub fn decode(mut reader: PropertyReader) -> Result<Self> {
        let source_value = reader.required("Source")?;
        let source = ConnectorEndpoint::decode(&reader, "Source", source_value)?;

        let destinations = match reader.required("Destination")? {
            Value::List(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| {
                    ConnectorEndpoint::decode(&reader, &format!("Destination[{}]", i), item)
                })
                .collect::<Result<Vec<_>>>()?,
            single => vec![ConnectorEndpoint::decode(&reader, "Destination", single)?],
        };
        if destinations.is_empty() {
            return Err(reader.error("Destination", "must not be empty"));
        }

        let mut permissions = Vec::new();
        for permission in reader.string_list("Permissions")? {
            let decoded = match permission.as_str() {
                "Read" => ConnectorPermission::Read,
                "Write" => ConnectorPermission::Write,
                other => {
                    return Err(reader.error(
                        "Permissions",
                        format!("must contain only Read or Write, found '{}'", other),
                    ))
                }
            };
            if !permissions.contains(&decoded) {
                permissions.push(decoded);
            }
        }
        if permissions.is_empty() {
            return Err(reader.error("Permissions", "is required"));
        }
        permissions.sort();

        Ok(Self {
            source,
            destinations,
            permissions,
            extra: reader.into_extra(),
        })
    }
}
