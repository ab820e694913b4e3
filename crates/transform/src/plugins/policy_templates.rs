//! Policy template expansion in `Policies`

use super::{Plugin, PluginContext};
use crate::policy_templates::PolicyTemplateProcessor;
use sam_translator_common::{Result, Template, Value};
use sam_translator_parser::ResourceKind;
use tracing::debug;

/// Replaces `{TemplateName: {params}}` policy entries with expanded documents
pub struct PolicyTemplatePlugin;

impl PolicyTemplatePlugin {
    /// Expand one policy entry when it names a catalog template.
    ///
    /// Managed policy names, inline documents and unknown names pass through.
    fn expand_entry(processor: &PolicyTemplateProcessor, entry: Value) -> Result<Value> {
        let name = match entry.as_map() {
            Some(map) if map.len() == 1 => map.keys().next().cloned(),
            _ => None,
        };
        match name {
            Some(name) if processor.has(&name) => {
                let parameters = entry.get(&name).cloned().unwrap_or_default();
                processor.expand(&name, &parameters)
            }
            _ => Ok(entry),
        }
    }
}

impl Plugin for PolicyTemplatePlugin {
    fn name(&self) -> &'static str {
        "PolicyTemplatePlugin"
    }

    fn priority(&self) -> u32 {
        400
    }

    fn before_transform(&self, template: &mut Template, context: &PluginContext) -> Result<()> {
        let kinds = [
            ResourceKind::Function.type_name(),
            ResourceKind::StateMachine.type_name(),
        ];
        for (logical_id, resource) in template.resources.iter_mut() {
            if !kinds.contains(&resource.kind.as_str()) {
                continue;
            }
            let Some(policies) = resource.properties.remove("Policies") else {
                continue;
            };
            debug!(%logical_id, "expanding policy templates");
            let expand = |entry| {
                Self::expand_entry(&context.policies, entry).map_err(|e| e.in_resource(logical_id))
            };
            let expanded = match policies {
                Value::List(entries) => {
                    Value::List(entries.into_iter().map(expand).collect::<Result<_>>()?)
                }
                single => expand(single)?,
            };
            resource
                .properties
                .insert("Policies".to_string(), expanded);
        }
        Ok(())
    }
}
