//! Common types and utilities for the SAM translator
//!
//! This crate contains the document model, the error taxonomy and the
//! per-call options shared by the parser, the transformation engine and the CLI.

mod error;
mod options;
mod partition;
mod template;
pub mod value;

pub use error::{ConversionErrors, HookPhase, Result, TransformError};
pub use options::{
    OptionsFile, TransformOptions, DEFAULT_ACCOUNT_ID, DEFAULT_REGION, DEFAULT_STACK_NAME,
};
pub use partition::Partition;
pub use template::{Resource, Template, SERVERLESS_TRANSFORM};
pub use value::{map_from_json, Intrinsic, Map, Value};
