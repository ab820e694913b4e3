//! `Globals` section merge

use super::{Plugin, PluginContext};
use sam_translator_common::{Map, Result, Template, TransformError, Value};
use sam_translator_parser::ResourceKind;
use tracing::debug;

/// Kinds that accept a `Globals` section
const GLOBAL_KINDS: [ResourceKind; 4] = [
    ResourceKind::Function,
    ResourceKind::Api,
    ResourceKind::HttpApi,
    ResourceKind::SimpleTable,
];

/// Fills properties missing on a resource from its kind's `Globals` section
pub struct GlobalsPlugin;

impl GlobalsPlugin {
    /// Validated `Globals` section for a kind, if the template declares one
    pub fn section(template: &Template, kind: ResourceKind) -> Result<Option<&Map>> {
        let Some(name) = kind.globals_section() else {
            return Ok(None);
        };
        match template.globals.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Map(section)) => Ok(Some(section)),
            Some(other) => Err(TransformError::InvalidTemplate(format!(
                "Globals.{} must be a map, found {}",
                name,
                other.type_name()
            ))),
        }
    }

    /// Copy every global property absent from `properties`
    pub fn apply(section: &Map, properties: &mut Map) {
        for (key, value) in section {
            properties
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }
}

impl Plugin for GlobalsPlugin {
    fn name(&self) -> &'static str {
        "GlobalsPlugin"
    }

    fn priority(&self) -> u32 {
        100
    }

    fn before_transform(&self, template: &mut Template, _context: &PluginContext) -> Result<()> {
        if let Some(unknown) = template.globals.keys().find(|section| {
            !GLOBAL_KINDS
                .iter()
                .any(|kind| kind.globals_section() == Some(section.as_str()))
        }) {
            return Err(TransformError::InvalidTemplate(format!(
                "'{}' is not a supported Globals section; supported sections are Function, Api, HttpApi and SimpleTable",
                unknown
            )));
        }

        for kind in GLOBAL_KINDS {
            let Some(section) = Self::section(template, kind)?.cloned() else {
                continue;
            };
            for (logical_id, resource) in template.resources.iter_mut() {
                if resource.kind == kind.type_name() {
                    debug!(%logical_id, %kind, "applying globals");
                    Self::apply(&section, &mut resource.properties);
                }
            }
        }
        Ok(())
    }

    fn after_transform(&self, template: &mut Template, _context: &PluginContext) -> Result<()> {
        template.globals.clear();
        Ok(())
    }
}
