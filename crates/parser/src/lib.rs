//! Template parsing for the SAM translator
//!
//! This crate turns template text into the shared document model and decodes
//! serverless resource property bags into typed structs.
//!
//! ## Loading
//!
//! Templates may be JSON or YAML. YAML short-form intrinsic tags are expanded
//! while loading:
//! - `!Ref x` → `{"Ref": x}`
//! - `!GetAtt a.b` → `{"Fn::GetAtt": [a, b]}`
//! - `!Sub s`, `!Join [..]`, ... → `{"Fn::Sub": s}`, `{"Fn::Join": [..]}`, ...
//!
//! ## Decoding
//!
//! Every serverless kind has a properties struct decoded through a
//! [`PropertyReader`]. Decoding failures name the resource and the property
//! path that was wrong.

mod loader;
pub mod model;
mod properties;

pub use loader::{yaml_to_value, TemplateFormat, TemplateLoader};
pub use model::{ResourceKind, SamProperties};
pub use properties::{logical_id_of, PropertyReader};

use sam_translator_common::{Result, Template};
use std::path::Path;

/// Load a template from disk
///
/// # Arguments
/// * `path` - Path to a JSON or YAML template
///
/// # Returns
/// * `Template` - The parsed document
pub fn load_template<P: AsRef<Path>>(path: P) -> Result<Template> {
    TemplateLoader::from_file(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_template_missing_file() {
        let err = load_template("/definitely/not/here.yaml").unwrap_err();
        assert!(err.to_string().contains("Failed to read template file"));
    }
}
