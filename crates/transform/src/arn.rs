//! Resource address (ARN) building and parsing
//!
//! An ARN is `arn:<partition>:<service>:<region>:<account>:<resource>`. The
//! resource path may itself contain colons, so parsing splits off the first
//! five fields and keeps the remainder intact.

use sam_translator_common::{Partition, Result, TransformError, TransformOptions};
use std::fmt;
use std::str::FromStr;

const PREFIX: &str = "arn";

/// A parsed ARN
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arn {
    pub partition: String,
    pub service: String,
    pub region: String,
    pub account_id: String,
    pub resource: String,
}

impl Arn {
    pub fn new(
        partition: impl Into<String>,
        service: impl Into<String>,
        region: impl Into<String>,
        account_id: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            partition: partition.into(),
            service: service.into(),
            region: region.into(),
            account_id: account_id.into(),
            resource: resource.into(),
        }
    }

    /// Parse an ARN string
    pub fn parse(input: &str) -> Result<Self> {
        input.parse()
    }
}

impl fmt::Display for Arn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}:{}",
            PREFIX, self.partition, self.service, self.region, self.account_id, self.resource
        )
    }
}

impl FromStr for Arn {
    type Err = TransformError;

    fn from_str(input: &str) -> Result<Self> {
        let invalid = |reason: &str| TransformError::InvalidAddress {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        if input.is_empty() {
            return Err(invalid("empty string"));
        }
        let mut fields = input.splitn(6, ':');
        if fields.next() != Some(PREFIX) {
            return Err(invalid("must start with 'arn:'"));
        }
        let fields: Vec<&str> = fields.collect();
        let [partition, service, region, account_id, resource] = fields.as_slice() else {
            return Err(invalid(&format!(
                "expected 5 fields after 'arn:', found {}",
                fields.len()
            )));
        };
        if partition.is_empty() || service.is_empty() {
            return Err(invalid("partition and service must not be empty"));
        }
        Ok(Arn::new(*partition, *service, *region, *account_id, *resource))
    }
}

/// Builds ARNs for one partition, region and account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArnBuilder {
    partition: Partition,
    region: String,
    account_id: String,
}

impl ArnBuilder {
    pub fn new(partition: Partition, region: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            partition,
            region: region.into(),
            account_id: account_id.into(),
        }
    }

    pub fn from_options(options: &TransformOptions) -> Self {
        Self::new(options.partition, &options.region, &options.account_id)
    }

    pub fn partition(&self) -> Partition {
        self.partition
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Regional ARN in this builder's account
    pub fn build(&self, service: &str, resource: &str) -> Arn {
        Arn::new(
            self.partition.as_str(),
            service,
            &self.region,
            &self.account_id,
            resource,
        )
    }

    /// ARN with empty region and account segments (IAM, S3, ...)
    pub fn build_global(&self, service: &str, resource: &str) -> Arn {
        Arn::new(self.partition.as_str(), service, "", "", resource)
    }

    /// ARN with an empty account segment
    pub fn build_without_account(&self, service: &str, resource: &str) -> Arn {
        Arn::new(self.partition.as_str(), service, &self.region, "", resource)
    }

    pub fn lambda_function(&self, name: &str) -> Arn {
        self.build("lambda", &format!("function:{}", name))
    }

    pub fn lambda_layer(&self, name: &str) -> Arn {
        self.build("lambda", &format!("layer:{}", name))
    }

    /// Invocation URI API Gateway uses for Lambda proxy integrations
    pub fn lambda_integration_uri(&self, function_arn: &str) -> Arn {
        Arn::new(
            self.partition.as_str(),
            "apigateway",
            &self.region,
            "lambda",
            format!("path/2015-03-31/functions/{}/invocations", function_arn),
        )
    }

    /// `execute-api` ARN for a route, used as permission source
    pub fn execute_api(&self, api_id: &str, stage: &str, method: &str, path: &str) -> Arn {
        self.build(
            "execute-api",
            &format!("{}/{}/{}{}", api_id, stage, method, path),
        )
    }

    /// `execute-api` ARN for an authorizer of an API
    pub fn execute_api_authorizers(&self, api_id: &str) -> Arn {
        self.build("execute-api", &format!("{}/authorizers/*", api_id))
    }

    /// Management-plane API Gateway resource, such as `/restapis/abc`
    pub fn api_gateway_resource(&self, path: &str) -> Arn {
        self.build_without_account("apigateway", path)
    }

    pub fn api_gateway_stage(&self, api_id: &str, stage: &str) -> Arn {
        self.api_gateway_resource(&format!("/restapis/{}/stages/{}", api_id, stage))
    }

    pub fn iam_role(&self, name: &str) -> Arn {
        Arn::new(self.partition.as_str(), "iam", "", &self.account_id, format!("role/{}", name))
    }

    pub fn iam_policy(&self, name: &str) -> Arn {
        Arn::new(self.partition.as_str(), "iam", "", &self.account_id, format!("policy/{}", name))
    }

    /// Policy managed by AWS, e.g. `service-role/AWSLambdaBasicExecutionRole`
    pub fn aws_managed_policy(&self, name: &str) -> Arn {
        Arn::new(self.partition.as_str(), "iam", "", "aws", format!("policy/{}", name))
    }

    pub fn s3_bucket(&self, bucket: &str) -> Arn {
        self.build_global("s3", bucket)
    }

    pub fn s3_object(&self, bucket: &str, key: &str) -> Arn {
        self.build_global("s3", &format!("{}/{}", bucket, key))
    }

    pub fn dynamodb_table(&self, table: &str) -> Arn {
        self.build("dynamodb", &format!("table/{}", table))
    }

    pub fn dynamodb_index(&self, table: &str, index: &str) -> Arn {
        self.build("dynamodb", &format!("table/{}/index/{}", table, index))
    }

    pub fn dynamodb_stream(&self, table: &str, label: &str) -> Arn {
        self.build("dynamodb", &format!("table/{}/stream/{}", table, label))
    }

    pub fn sns_topic(&self, name: &str) -> Arn {
        self.build("sns", name)
    }

    pub fn sqs_queue(&self, name: &str) -> Arn {
        self.build("sqs", name)
    }

    pub fn kinesis_stream(&self, name: &str) -> Arn {
        self.build("kinesis", &format!("stream/{}", name))
    }

    pub fn state_machine(&self, name: &str) -> Arn {
        self.build("states", &format!("stateMachine:{}", name))
    }

    pub fn events_rule(&self, name: &str) -> Arn {
        self.build("events", &format!("rule/{}", name))
    }

    pub fn event_bus(&self, name: &str) -> Arn {
        self.build("events", &format!("event-bus/{}", name))
    }

    pub fn log_group(&self, name: &str) -> Arn {
        self.build("logs", &format!("log-group:{}:*", name))
    }

    pub fn cloudwatch_alarm(&self, name: &str) -> Arn {
        self.build("cloudwatch", &format!("alarm:{}", name))
    }

    pub fn secret(&self, name: &str) -> Arn {
        self.build("secretsmanager", &format!("secret:{}", name))
    }

    pub fn kms_key(&self, key_id: &str) -> Arn {
        self.build("kms", &format!("key/{}", key_id))
    }

    pub fn kms_alias(&self, alias: &str) -> Arn {
        self.build("kms", &format!("alias/{}", alias))
    }

    pub fn cognito_user_pool(&self, pool_id: &str) -> Arn {
        self.build("cognito-idp", &format!("userpool/{}", pool_id))
    }

    pub fn codedeploy_application(&self, name: &str) -> Arn {
        self.build("codedeploy", &format!("application:{}", name))
    }

    pub fn codedeploy_deployment_group(&self, application: &str, group: &str) -> Arn {
        self.build(
            "codedeploy",
            &format!("deploymentgroup:{}/{}", application, group),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn builder(region: &str) -> ArnBuilder {
        ArnBuilder::new(Partition::from_region(region), region, "123456789012")
    }

    #[test]
    fn test_build_lambda_function() {
        let arn = builder("us-east-1").lambda_function("MyFunction");
        assert_eq!(
            arn.to_string(),
            "arn:aws:lambda:us-east-1:123456789012:function:MyFunction"
        );
    }

    #[test]
    fn test_china_partition() {
        let arn = builder("cn-north-1").sqs_queue("jobs");
        assert!(arn.to_string().starts_with("arn:aws-cn:"));
    }

    #[test]
    fn test_global_services_omit_region_and_account() {
        let b = builder("eu-west-1");
        assert_eq!(b.s3_bucket("my-bucket").to_string(), "arn:aws:s3:::my-bucket");
        assert_eq!(
            b.aws_managed_policy("service-role/AWSLambdaBasicExecutionRole").to_string(),
            "arn:aws:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole"
        );
        assert_eq!(b.iam_role("r").to_string(), "arn:aws:iam::123456789012:role/r");
    }

    #[test]
    fn test_parse_keeps_colons_in_resource() {
        let arn: Arn = "arn:aws:lambda:us-east-1:123456789012:function:fn:live"
            .parse()
            .unwrap();
        assert_eq!(arn.service, "lambda");
        assert_eq!(arn.resource, "function:fn:live");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(Arn::parse("").is_err());
        assert!(Arn::parse("arn:aws:s3").is_err());
        assert!(Arn::parse("urn:aws:s3:::bucket").is_err());

        let err = Arn::parse("arn:aws:s3:us-east-1").unwrap_err();
        assert!(matches!(err, TransformError::InvalidAddress { .. }));
    }

    #[test]
    fn test_integration_uri() {
        let uri = builder("us-west-2").lambda_integration_uri("${MyFunction.Arn}");
        assert_eq!(
            uri.to_string(),
            "arn:aws:apigateway:us-west-2:lambda:path/2015-03-31/functions/${MyFunction.Arn}/invocations"
        );
    }

    proptest! {
        #[test]
        fn prop_build_parse_round_trip(
            partition in "aws(-[a-z]{2,3})?",
            service in "[a-z][a-z0-9-]{0,15}",
            region in "([a-z]{2}-[a-z]{4,9}-[0-9])?",
            account in "([0-9]{12}|aws)?",
            resource in "[A-Za-z0-9/:._*${}-]{1,60}",
        ) {
            let built = Arn::new(&partition, &service, &region, &account, &resource);
            let parsed = Arn::parse(&built.to_string()).unwrap();
            prop_assert_eq!(parsed, built);
        }
    }
}
