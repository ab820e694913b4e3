//! SAM template translation
//!
//! This crate turns a template using the `AWS::Serverless-2016-10-31`
//! transform into a plain CloudFormation template:
//! - plugin hooks normalize the input (globals, implicit APIs, policy
//!   templates, API definitions)
//! - every `AWS::Serverless::*` resource is converted into the resources
//!   that implement it
//! - after hooks run and the transform marker is removed

pub mod arn;
pub mod logical_id;
pub mod plugins;
pub mod policy_templates;
pub mod resources;
pub mod swagger;

pub use arn::{Arn, ArnBuilder};
pub use logical_id::LogicalIdGenerator;
pub use plugins::{Pipeline, Plugin, PluginContext};
pub use policy_templates::PolicyTemplateProcessor;

use sam_translator_common::{Result, Template, TransformOptions};
use std::sync::Arc;
use tracing::{info, warn};

/// Template translator
///
/// Holds the plugin pipeline and the policy template catalog; one translator
/// can transform any number of templates.
pub struct Translator {
    pipeline: Pipeline,
    context: PluginContext,
}

impl Translator {
    /// Create a translator with the builtin plugins and policy templates
    pub fn new(options: TransformOptions) -> Result<Self> {
        let policies = Arc::new(PolicyTemplateProcessor::builtin()?);
        Ok(Self {
            pipeline: Pipeline::builtin(),
            context: PluginContext::new(options, policies),
        })
    }

    /// Replace the plugin pipeline
    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn options(&self) -> &TransformOptions {
        &self.context.options
    }

    /// Transform a template.
    ///
    /// # Returns
    /// * `Ok(Template)` - CloudFormation template without serverless resources
    /// * `Err(TransformError::PipelineHook)` - A hook failed; nothing was converted
    /// * `Err(TransformError::Conversion)` - One or more resources failed to convert
    pub fn transform(&self, mut template: Template) -> Result<Template> {
        if !template.has_serverless_transform() {
            warn!("template does not declare the serverless transform, translating anyway");
        }

        self.pipeline.run_before(&mut template, &self.context)?;
        resources::convert_resources(&mut template, &self.context)?;
        self.pipeline.run_after(&mut template, &self.context)?;

        template.remove_serverless_transform();
        template.globals.clear();
        info!(resources = template.resources.len(), "template transformed");
        Ok(template)
    }
}

/// Transform a template with the builtin plugins
pub fn translate(template: Template, options: TransformOptions) -> Result<Template> {
    Translator::new(options)?.transform(template)
}
