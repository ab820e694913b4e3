//! Ordered transformation hooks
//!
//! Plugins run in ascending priority before and after resource conversion:
//!
//! | priority | plugin |
//! |---|---|
//! | 100 | [`GlobalsPlugin`] |
//! | 300 | [`ImplicitApiPlugin`] (REST) |
//! | 310 | [`ImplicitApiPlugin`] (HTTP) |
//! | 400 | [`PolicyTemplatePlugin`] |
//! | 500 | [`ApiSpecPlugin`] |
//!
//! The first failing hook aborts the whole transformation.

mod api_spec;
mod globals;
mod implicit_api;
mod policy_templates;

pub use api_spec::ApiSpecPlugin;
pub use globals::GlobalsPlugin;
pub use implicit_api::{ImplicitApiPlugin, IMPLICIT_HTTP_API, IMPLICIT_REST_API};
pub use policy_templates::PolicyTemplatePlugin;

use crate::arn::ArnBuilder;
use crate::policy_templates::PolicyTemplateProcessor;
use sam_translator_common::{HookPhase, Result, Template, TransformError, TransformOptions};
use std::sync::Arc;
use tracing::debug;

/// Read-only state shared by hooks and converters during one call
#[derive(Debug, Clone)]
pub struct PluginContext {
    pub options: TransformOptions,
    pub arns: ArnBuilder,
    pub policies: Arc<PolicyTemplateProcessor>,
}

impl PluginContext {
    pub fn new(options: TransformOptions, policies: Arc<PolicyTemplateProcessor>) -> Self {
        Self {
            arns: ArnBuilder::from_options(&options),
            options,
            policies,
        }
    }
}

/// A transformation hook
#[cfg_attr(test, mockall::automock)]
pub trait Plugin {
    fn name(&self) -> &'static str;

    /// Lower runs first
    fn priority(&self) -> u32;

    fn before_transform(&self, _template: &mut Template, _context: &PluginContext) -> Result<()> {
        Ok(())
    }

    fn after_transform(&self, _template: &mut Template, _context: &PluginContext) -> Result<()> {
        Ok(())
    }
}

/// Plugins sorted by priority
pub struct Pipeline {
    plugins: Vec<Box<dyn Plugin>>,
}

impl Pipeline {
    /// Build a pipeline. Plugins of equal priority keep their given order.
    pub fn new(mut plugins: Vec<Box<dyn Plugin>>) -> Self {
        plugins.sort_by_key(|plugin| plugin.priority());
        Self { plugins }
    }

    /// The standard set of hooks
    pub fn builtin() -> Self {
        Self::new(vec![
            Box::new(GlobalsPlugin),
            Box::new(ImplicitApiPlugin::rest()),
            Box::new(ImplicitApiPlugin::http()),
            Box::new(PolicyTemplatePlugin),
            Box::new(ApiSpecPlugin),
        ])
    }

    /// Plugin names in execution order
    pub fn names(&self) -> Vec<&'static str> {
        self.plugins.iter().map(|plugin| plugin.name()).collect()
    }

    pub fn run_before(&self, template: &mut Template, context: &PluginContext) -> Result<()> {
        self.run(HookPhase::Before, template, context)
    }

    pub fn run_after(&self, template: &mut Template, context: &PluginContext) -> Result<()> {
        self.run(HookPhase::After, template, context)
    }

    fn run(&self, phase: HookPhase, template: &mut Template, context: &PluginContext) -> Result<()> {
        for plugin in &self.plugins {
            debug!(plugin = plugin.name(), %phase, "running hook");
            let outcome = match phase {
                HookPhase::Before => plugin.before_transform(template, context),
                HookPhase::After => plugin.after_transform(template, context),
            };
            outcome.map_err(|source| TransformError::PipelineHook {
                plugin: plugin.name().to_string(),
                phase,
                source: Box::new(source),
            })?;
        }
        Ok(())
    }
}
