//! `AWS::Serverless::SimpleTable` conversion

use super::{object, tag_list, Converted};
use sam_translator_common::{Resource, Result, Value};
use sam_translator_parser::model::SimpleTableProperties;

pub fn convert(logical_id: &str, props: SimpleTableProperties) -> Result<Converted> {
    let key = &props.primary_key;
    let mut table = Resource::new("AWS::DynamoDB::Table")
        .with_property(
            "AttributeDefinitions",
            Value::List(vec![object([
                ("AttributeName", key.name.clone()),
                ("AttributeType", Value::from(key.attribute_type.code())),
            ])]),
        )
        .with_property(
            "KeySchema",
            Value::List(vec![object([
                ("AttributeName", key.name.clone()),
                ("KeyType", Value::from("HASH")),
            ])]),
        )
        .with_optional("TableName", props.table_name)
        .with_optional("SSESpecification", props.sse_specification);

    table = match props.provisioned_throughput {
        Some(throughput) => table.with_property("ProvisionedThroughput", throughput),
        None => table.with_property("BillingMode", "PAY_PER_REQUEST"),
    };
    if let Some(tags) = props.tags.filter(|tags| !tags.is_empty()) {
        table = table.with_property("Tags", tag_list(None, &tags));
    }
    for (key, value) in props.extra {
        table.properties.entry(key).or_insert(value);
    }

    Ok(Converted::new(logical_id, table))
}
