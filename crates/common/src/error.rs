//! Error taxonomy for template transformation
//!
//! Pipeline hook failures abort a transformation immediately. Resource
//! conversion failures are collected in [`ConversionErrors`] and reported
//! together once every resource has been attempted.

use std::fmt;
use thiserror::Error;

/// Errors that can occur while loading or transforming a template
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Resource with id [{resource}] is invalid. Property '{property}' {reason}")]
    InvalidProperty {
        resource: String,
        property: String,
        reason: String,
    },

    #[error("Unknown policy template '{0}'")]
    UnknownMacro(String),

    #[error("Policy template '{template}' is missing required parameter '{parameter}'")]
    MissingMacroParameter { template: String, parameter: String },

    #[error("Invalid ARN '{input}': {reason}")]
    InvalidAddress { input: String, reason: String },

    #[error("Invalid logical id '{logical_id}': {reason}")]
    InvalidIdentifier { logical_id: String, reason: String },

    #[error("Logical id '{0}' is already used by another resource")]
    DuplicateIdentifier(String),

    #[error("Resource with id [{logical_id}] could not be converted: {source}")]
    ResourceConversion {
        logical_id: String,
        source: Box<TransformError>,
    },

    #[error("Plugin '{plugin}' failed in {phase} hook: {source}")]
    PipelineHook {
        plugin: String,
        phase: HookPhase,
        source: Box<TransformError>,
    },

    #[error(transparent)]
    Conversion(#[from] ConversionErrors),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl TransformError {
    /// Shorthand for [`TransformError::InvalidProperty`]
    pub fn invalid_property(
        resource: impl Into<String>,
        property: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        TransformError::InvalidProperty {
            resource: resource.into(),
            property: property.into(),
            reason: reason.into(),
        }
    }

    /// Attribute this error to a resource.
    ///
    /// Errors that already name the same resource are returned as-is.
    pub fn in_resource(self, logical_id: &str) -> Self {
        let already_named = matches!(
            &self,
            TransformError::ResourceConversion { logical_id: existing, .. } if existing == logical_id
        );
        if already_named {
            return self;
        }
        TransformError::ResourceConversion {
            logical_id: logical_id.to_string(),
            source: Box::new(self),
        }
    }
}

/// Which side of resource conversion a plugin hook ran on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    Before,
    After,
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookPhase::Before => write!(f, "before-transform"),
            HookPhase::After => write!(f, "after-transform"),
        }
    }
}

/// Per-resource failures collected during the conversion pass
#[derive(Debug, Default)]
pub struct ConversionErrors {
    errors: Vec<(String, TransformError)>,
}

impl ConversionErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure for a logical id, in encounter order
    pub fn push(&mut self, logical_id: impl Into<String>, error: TransformError) {
        self.errors.push((logical_id.into(), error));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TransformError)> {
        self.errors.iter().map(|(id, err)| (id.as_str(), err))
    }

    /// Failing logical ids, in the order they were recorded
    pub fn logical_ids(&self) -> Vec<&str> {
        self.errors.iter().map(|(id, _)| id.as_str()).collect()
    }

    /// `Ok(())` when nothing failed, otherwise the composite error
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(TransformError::Conversion(self))
        }
    }
}

impl fmt::Display for ConversionErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Transformation failed with {} error(s) in resource(s) [{}]",
            self.errors.len(),
            self.logical_ids().join(", ")
        )?;
        for (logical_id, error) in &self.errors {
            write!(f, "\n  - [{}] {}", logical_id, error)?;
        }
        Ok(())
    }
}

impl std::error::Error for ConversionErrors {}

/// Result type for transformation operations
pub type Result<T> = std::result::Result<T, TransformError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_names_every_resource() {
        let mut errors = ConversionErrors::new();
        errors.push(
            "FunctionA",
            TransformError::invalid_property("FunctionA", "Handler", "is required"),
        );
        errors.push("TableB", TransformError::DuplicateIdentifier("TableB".into()));

        let message = errors.to_string();
        assert!(message.contains("2 error(s)"));
        assert!(message.contains("[FunctionA, TableB]"));
        assert!(message.contains("Property 'Handler' is required"));
    }

    #[test]
    fn test_empty_aggregate_is_ok() {
        assert!(ConversionErrors::new().into_result().is_ok());
    }

    #[test]
    fn test_in_resource_does_not_double_wrap() {
        let err = TransformError::UnknownMacro("Nope".into())
            .in_resource("MyFunction")
            .in_resource("MyFunction");
        match err {
            TransformError::ResourceConversion { source, .. } => {
                assert!(matches!(*source, TransformError::UnknownMacro(_)));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
