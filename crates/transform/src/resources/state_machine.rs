//! `AWS::Serverless::StateMachine` conversion

use super::events::{event_rule, schedule_rule};
use super::iam;
use super::{object, tag_list, ConversionContext, Converted};
use crate::logical_id::LogicalIdGenerator;
use sam_translator_common::{Map, Resource, Result, Value};
use sam_translator_parser::model::{EventKind, StateMachineDefinition, StateMachineProperties};

const CREATED_BY: (&str, &str) = ("stateMachine:createdBy", "SAM");

pub fn convert(
    logical_id: &str,
    props: StateMachineProperties,
    context: &ConversionContext,
) -> Result<Converted> {
    let role_id = LogicalIdGenerator::generate(&[logical_id, "Role"]);
    let role_arn = props
        .role
        .clone()
        .unwrap_or_else(|| Value::get_att(&role_id, "Arn"));

    let mut machine = Resource::new("AWS::StepFunctions::StateMachine");
    machine = match &props.definition {
        StateMachineDefinition::Inline(definition) => {
            machine.with_property("Definition", definition.clone())
        }
        StateMachineDefinition::Uri(location) => {
            let mut s3 = Map::new();
            s3.insert("Bucket".to_string(), location.bucket.clone());
            s3.insert("Key".to_string(), location.key.clone());
            if let Some(version) = &location.version {
                s3.insert("Version".to_string(), version.clone());
            }
            machine.with_property("DefinitionS3Location", Value::Map(s3))
        }
    };
    machine = machine
        .with_optional(
            "DefinitionSubstitutions",
            props.definition_substitutions.clone().map(Value::Map),
        )
        .with_property("RoleArn", role_arn)
        .with_optional("StateMachineName", props.name.clone())
        .with_optional("StateMachineType", props.machine_type.clone())
        .with_optional("LoggingConfiguration", props.logging.clone())
        .with_optional("TracingConfiguration", props.tracing.clone())
        .with_property("Tags", tag_list(Some(CREATED_BY), &props.tags));
    for (key, value) in &props.extra {
        machine
            .properties
            .entry(key.clone())
            .or_insert_with(|| value.clone());
    }

    let mut converted = Converted::new(logical_id, machine);

    if props.role.is_none() {
        let (managed, inline) = iam::role_policies(logical_id, &props.policies, context)?;
        let role = iam::role("states.amazonaws.com", managed, inline)
            .with_optional("PermissionsBoundary", props.permissions_boundary.clone())
            .with_property("Tags", tag_list(Some(CREATED_BY), &props.tags));
        converted.add(role_id, role);
    }

    let machine_arn = Value::reference(logical_id);
    for event in &props.events {
        let rule_id = LogicalIdGenerator::generate(&[logical_id, &event.name]);
        let target_id = LogicalIdGenerator::generate(&[&rule_id, "StepFunctionsTarget"]);
        let events_role_id = LogicalIdGenerator::generate(&[&rule_id, "Role"]);
        let mut rule = match &event.kind {
            EventKind::Schedule(schedule) => schedule_rule(schedule, target_id, &machine_arn),
            EventKind::EventBridgeRule(pattern) => event_rule(pattern, target_id, &machine_arn),
            // rejected while decoding
            _ => continue,
        };
        attach_target_role(&mut rule, Value::get_att(&events_role_id, "Arn"));
        converted.add(rule_id, rule);

        let start_execution = iam::inline_policy(
            &LogicalIdGenerator::generate(&[logical_id, &event.name, "RoleStartExecutionPolicy"]),
            iam::policy_document(vec![iam::allow(
                &["states:StartExecution"],
                machine_arn.clone(),
            )]),
        );
        converted.add(
            events_role_id,
            iam::role("events.amazonaws.com", Vec::new(), vec![start_execution]),
        );
    }

    Ok(converted)
}

/// EventBridge needs a role to start executions
fn attach_target_role(rule: &mut Resource, role_arn: Value) {
    if let Some(Value::List(targets)) = rule.properties.get_mut("Targets") {
        for target in targets.iter_mut() {
            if let Some(target) = target.as_map_mut() {
                target.insert("RoleArn".to_string(), role_arn.clone());
            }
        }
    }
}
