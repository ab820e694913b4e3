//! Per-call transformation options
//!
//! Options can be built in code or loaded from a YAML options file.

use crate::{Partition, Result, TransformError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_ACCOUNT_ID: &str = "123456789012";
pub const DEFAULT_STACK_NAME: &str = "sam-app";

/// Immutable settings for a single transformation call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformOptions {
    /// Region the stack is deployed to
    pub region: String,
    /// Account owning the stack
    pub account_id: String,
    /// Stack name
    pub stack_name: String,
    /// Partition used for every ARN built during the call
    pub partition: Partition,
    /// Copy resource `Metadata` onto generated resources
    pub pass_through_metadata: bool,
}

impl TransformOptions {
    /// Options for a region, with the partition derived from it
    pub fn new(region: impl Into<String>) -> Self {
        let region = region.into();
        Self {
            partition: Partition::from_region(&region),
            region,
            account_id: DEFAULT_ACCOUNT_ID.to_string(),
            stack_name: DEFAULT_STACK_NAME.to_string(),
            pass_through_metadata: false,
        }
    }

    pub fn with_account_id(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = account_id.into();
        self
    }

    pub fn with_stack_name(mut self, stack_name: impl Into<String>) -> Self {
        self.stack_name = stack_name.into();
        self
    }

    /// Override the partition derived from the region
    pub fn with_partition(mut self, partition: Partition) -> Self {
        self.partition = partition;
        self
    }

    pub fn with_pass_through_metadata(mut self, enabled: bool) -> Self {
        self.pass_through_metadata = enabled;
        self
    }
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self::new(DEFAULT_REGION)
    }
}

/// Options as written in a YAML options file. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionsFile {
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub stack_name: Option<String>,
    #[serde(default)]
    pub partition: Option<Partition>,
    #[serde(default)]
    pub pass_through_metadata: Option<bool>,
}

impl OptionsFile {
    /// Load an options file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        serde_yaml::from_str(&content).map_err(|e| {
            TransformError::Config(format!(
                "Failed to parse options file {:?}: {}",
                path, e
            ))
        })
    }

    /// Resolve into options, filling gaps with defaults.
    ///
    /// The partition is derived from the region unless set explicitly.
    pub fn into_options(self) -> TransformOptions {
        let mut options =
            TransformOptions::new(self.region.unwrap_or_else(|| DEFAULT_REGION.to_string()));
        if let Some(account_id) = self.account_id {
            options = options.with_account_id(account_id);
        }
        if let Some(stack_name) = self.stack_name {
            options = options.with_stack_name(stack_name);
        }
        if let Some(partition) = self.partition {
            options = options.with_partition(partition);
        }
        options.with_pass_through_metadata(self.pass_through_metadata.unwrap_or(false))
    }
}
