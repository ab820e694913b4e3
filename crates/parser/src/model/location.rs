//! Artifact locations (`CodeUri`, `ContentUri`, `DefinitionUri`, ...)

use crate::PropertyReader;
use sam_translator_common::{Result, Value};

/// An object in S3
#[derive(Debug, Clone, PartialEq)]
pub struct S3Location {
    pub bucket: Value,
    pub key: Value,
    pub version: Option<Value>,
}

impl S3Location {
    /// Decode `s3://bucket/key` or `{Bucket, Key, Version}`.
    ///
    /// Local paths are rejected: artifacts must be packaged before transforming.
    pub fn take(reader: &mut PropertyReader, key: &str) -> Result<Option<Self>> {
        match reader.optional(key) {
            None => Ok(None),
            Some(value) => Self::from_value(reader, key, value).map(Some),
        }
    }

    /// Decode an already-taken value, reporting errors against `key`
    pub fn from_value(reader: &PropertyReader, key: &str, value: Value) -> Result<Self> {
        match value {
            Value::String(uri) => Self::parse_uri(&uri).ok_or_else(|| {
                reader.error(
                    key,
                    format!("'{}' is not an S3 URI of the form s3://bucket/key", uri),
                )
            }),
            Value::Map(map) => {
                let mut location = reader.nested(key, map);
                Ok(Self {
                    bucket: location.required("Bucket")?,
                    key: location.required("Key")?,
                    version: location.optional("Version"),
                })
            }
            other => Err(reader.error(
                key,
                format!(
                    "must be an S3 URI or a map with Bucket and Key, found {}",
                    other.type_name()
                ),
            )),
        }
    }

    /// Parse `s3://bucket/key[?versionId=v]`
    pub fn parse_uri(uri: &str) -> Option<Self> {
        let rest = uri.strip_prefix("s3://")?;
        let (bucket, key) = rest.split_once('/')?;
        if bucket.is_empty() || key.is_empty() {
            return None;
        }
        let (key, version) = match key.split_once("?versionId=") {
            Some((key, version)) => (key, Some(Value::from(version))),
            None => (key, None),
        };
        Some(Self {
            bucket: Value::from(bucket),
            key: Value::from(key),
            version,
        })
    }

    /// Canonical text identifying the artifact, used for content hashing
    pub fn fingerprint(&self) -> String {
        format!(
            "{}/{}/{}",
            self.bucket.to_canonical_json(),
            self.key.to_canonical_json(),
            self.version
                .as_ref()
                .map(Value::to_canonical_json)
                .unwrap_or_default()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uri() {
        let location = S3Location::parse_uri("s3://artifacts/app/code.zip?versionId=3").unwrap();
        assert_eq!(location.bucket, Value::from("artifacts"));
        assert_eq!(location.key, Value::from("app/code.zip"));
        assert_eq!(location.version, Some(Value::from("3")));
    }

    #[test]
    fn test_rejects_local_paths() {
        assert!(S3Location::parse_uri("./src").is_none());
        assert!(S3Location::parse_uri("s3://bucket-only").is_none());
    }
}
