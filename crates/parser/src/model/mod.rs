//! Typed serverless resource model
//!
//! Each serverless resource kind decodes its property bag into a struct with
//! named fields plus an `extra` map of whatever was not recognized.

mod api;
mod application;
mod connector;
mod events;
mod function;
mod graphql;
mod layer;
mod location;
mod state_machine;
mod table;

pub use api::{
    ApiAuth, ApiProperties, AuthorizerConfig, DefinitionSource, HttpApiProperties, HttpCors,
    LambdaAuthorizerKind, RestCors, HTTP_DEFAULT_STAGE,
};
pub use application::ApplicationProperties;
pub use connector::{ConnectorEndpoint, ConnectorPermission, ConnectorProperties};
pub use events::{
    take_events, ApiEvent, EventKind, EventSource, HttpApiEvent, LogsEvent, RouteAuth, RuleEvent,
    S3Event, ScheduleEvent, SnsEvent, SqsEvent, StreamEvent,
};
pub use function::{
    take_policies, CodeLocation, DeadLetterKind, DeadLetterQueue, DeploymentPreference,
    FunctionProperties, FunctionUrlConfig, PolicyEntry,
};
pub use graphql::{
    DataSource, DataSourceKind, GraphQLApiProperties, GraphQLAuth, GraphQLSchema,
    PipelineFunction, Resolver,
};
pub use layer::{LayerVersionProperties, RetentionPolicy};
pub use location::S3Location;
pub use state_machine::{StateMachineDefinition, StateMachineProperties};
pub use table::{AttributeType, PrimaryKey, SimpleTableProperties};

use crate::PropertyReader;
use sam_translator_common::{Map, Result};
use std::fmt;

/// Serverless resource kinds the translator converts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Function,
    SimpleTable,
    LayerVersion,
    StateMachine,
    Api,
    HttpApi,
    Application,
    GraphQLApi,
    Connector,
}

impl ResourceKind {
    /// Kinds in the order they are converted. Connectors always come last.
    pub const CONVERSION_ORDER: [ResourceKind; 9] = [
        ResourceKind::Function,
        ResourceKind::SimpleTable,
        ResourceKind::LayerVersion,
        ResourceKind::StateMachine,
        ResourceKind::Api,
        ResourceKind::HttpApi,
        ResourceKind::Application,
        ResourceKind::GraphQLApi,
        ResourceKind::Connector,
    ];

    pub fn type_name(&self) -> &'static str {
        match self {
            ResourceKind::Function => "AWS::Serverless::Function",
            ResourceKind::SimpleTable => "AWS::Serverless::SimpleTable",
            ResourceKind::LayerVersion => "AWS::Serverless::LayerVersion",
            ResourceKind::StateMachine => "AWS::Serverless::StateMachine",
            ResourceKind::Api => "AWS::Serverless::Api",
            ResourceKind::HttpApi => "AWS::Serverless::HttpApi",
            ResourceKind::Application => "AWS::Serverless::Application",
            ResourceKind::GraphQLApi => "AWS::Serverless::GraphQLApi",
            ResourceKind::Connector => "AWS::Serverless::Connector",
        }
    }

    pub fn from_type(type_name: &str) -> Option<Self> {
        Self::CONVERSION_ORDER
            .into_iter()
            .find(|kind| kind.type_name() == type_name)
    }

    /// Key of this kind's section under `Globals`, if it has one
    pub fn globals_section(&self) -> Option<&'static str> {
        match self {
            ResourceKind::Function => Some("Function"),
            ResourceKind::Api => Some("Api"),
            ResourceKind::HttpApi => Some("HttpApi"),
            ResourceKind::SimpleTable => Some("SimpleTable"),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Decoded properties of one serverless resource
#[derive(Debug, Clone, PartialEq)]
pub enum SamProperties {
    Function(FunctionProperties),
    SimpleTable(SimpleTableProperties),
    LayerVersion(LayerVersionProperties),
    StateMachine(StateMachineProperties),
    Api(ApiProperties),
    HttpApi(HttpApiProperties),
    Application(ApplicationProperties),
    GraphQLApi(GraphQLApiProperties),
    Connector(ConnectorProperties),
}

impl SamProperties {
    /// Decode a property bag according to its kind
    pub fn decode(kind: ResourceKind, logical_id: &str, properties: Map) -> Result<Self> {
        let reader = PropertyReader::new(logical_id, properties);
        Ok(match kind {
            ResourceKind::Function => SamProperties::Function(FunctionProperties::decode(reader)?),
            ResourceKind::SimpleTable => {
                SamProperties::SimpleTable(SimpleTableProperties::decode(reader)?)
            }
            ResourceKind::LayerVersion => {
                SamProperties::LayerVersion(LayerVersionProperties::decode(reader)?)
            }
            ResourceKind::StateMachine => {
                SamProperties::StateMachine(StateMachineProperties::decode(reader)?)
            }
            ResourceKind::Api => SamProperties::Api(ApiProperties::decode(reader)?),
            ResourceKind::HttpApi => SamProperties::HttpApi(HttpApiProperties::decode(reader)?),
            ResourceKind::Application => {
                SamProperties::Application(ApplicationProperties::decode(reader)?)
            }
            ResourceKind::GraphQLApi => {
                SamProperties::GraphQLApi(GraphQLApiProperties::decode(reader)?)
            }
            ResourceKind::Connector => {
                SamProperties::Connector(ConnectorProperties::decode(reader)?)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names_round_trip() {
        for kind in ResourceKind::CONVERSION_ORDER {
            assert_eq!(ResourceKind::from_type(kind.type_name()), Some(kind));
        }
        assert_eq!(ResourceKind::from_type("AWS::Lambda::Function"), None);
    }

    #[test]
    fn test_connectors_convert_last() {
        assert_eq!(
            ResourceKind::CONVERSION_ORDER.last(),
            Some(&ResourceKind::Connector)
        );
        assert_eq!(ResourceKind::CONVERSION_ORDER[0], ResourceKind::Function);
    }
}
