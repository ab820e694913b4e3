//! `AWS::Serverless::StateMachine` properties

use super::events::{take_events, EventKind, EventSource};
use super::function::{take_policies, PolicyEntry};
use super::location::S3Location;
use crate::PropertyReader;
use sam_translator_common::{Map, Result, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct StateMachineProperties {
    pub definition: StateMachineDefinition,
    pub definition_substitutions: Option<Map>,
    pub role: Option<Value>,
    pub policies: Vec<PolicyEntry>,
    pub name: Option<Value>,
    pub machine_type: Option<Value>,
    pub logging: Option<Value>,
    pub tracing: Option<Value>,
    pub tags: Map,
    pub permissions_boundary: Option<Value>,
    pub events: Vec<EventSource>,
    pub extra: Map,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StateMachineDefinition {
    Inline(Value),
    Uri(S3Location),
}

impl StateMachineProperties {
    pub fn decode(mut reader: PropertyReader) -> Result<Self> {
        let inline = reader.optional("Definition");
        let uri = S3Location::take(&mut reader, "DefinitionUri")?;
        let definition = match (inline, uri) {
            (Some(_), Some(_)) => {
                return Err(reader.error("Definition", "cannot be combined with DefinitionUri"))
            }
            (Some(inline), None) => StateMachineDefinition::Inline(inline),
            (None, Some(uri)) => StateMachineDefinition::Uri(uri),
            (None, None) => {
                return Err(reader.error("Definition", "or DefinitionUri is required"))
            }
        };

        let role = reader.optional("Role");
        let policies = take_policies(&mut reader)?;
        if role.is_some() && !policies.is_empty() {
            return Err(reader.error("Role", "cannot be combined with Policies"));
        }

        let events = take_events(&mut reader)?;
        for event in &events {
            if !matches!(event.kind, EventKind::Schedule(_) | EventKind::EventBridgeRule(_)) {
                return Err(reader.error(
                    &format!("Events.{}.Type", event.name),
                    format!("'{}' cannot start a state machine", event.kind.type_name()),
                ));
            }
        }

        Ok(Self {
            definition,
            definition_substitutions: reader.optional_map("DefinitionSubstitutions")?,
            role,
            policies,
            name: reader.optional("Name"),
            machine_type: reader.optional("Type"),
            logging: reader.optional("Logging"),
            tracing: reader.optional("Tracing"),
            tags: reader.optional_map("Tags")?.unwrap_or_default(),
            permissions_boundary: reader.optional("PermissionsBoundary"),
            events,
            extra: reader.into_extra(),
        })
    }
}
