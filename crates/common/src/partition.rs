//! Region to partition lookup
//!
//! The engine never performs this lookup itself; callers resolve the partition
//! once and hand it over inside [`crate::TransformOptions`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Top-level grouping of AWS regions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Partition {
    /// Public commercial regions
    #[default]
    #[serde(rename = "aws")]
    Aws,

    /// China regions
    #[serde(rename = "aws-cn")]
    AwsCn,

    /// GovCloud regions
    #[serde(rename = "aws-us-gov")]
    AwsUsGov,
}

impl Partition {
    /// Derive the partition a region belongs to
    ///
    /// # Examples
    /// ```
    /// use sam_translator_common::Partition;
    ///
    /// assert_eq!(Partition::from_region("cn-north-1"), Partition::AwsCn);
    /// assert_eq!(Partition::from_region("us-gov-west-1"), Partition::AwsUsGov);
    /// assert_eq!(Partition::from_region("eu-west-1"), Partition::Aws);
    /// ```
    pub fn from_region(region: &str) -> Self {
        if region.starts_with("cn-") {
            Partition::AwsCn
        } else if region.starts_with("us-gov-") {
            Partition::AwsUsGov
        } else {
            Partition::Aws
        }
    }

    /// Identifier used as the first ARN field
    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::Aws => "aws",
            Partition::AwsCn => "aws-cn",
            Partition::AwsUsGov => "aws-us-gov",
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Partition {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "aws" => Ok(Partition::Aws),
            "aws-cn" => Ok(Partition::AwsCn),
            "aws-us-gov" => Ok(Partition::AwsUsGov),
            other => Err(format!(
                "unknown partition '{}' (expected aws, aws-cn or aws-us-gov)",
                other
            )),
        }
    }
}
