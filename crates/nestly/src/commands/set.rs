//! `nestly set`: write one device field.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use nestly_core::{EntityRef, Nest};

use crate::cli::{GlobalOpts, SetArgs};
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct SetResult<'a> {
    device_type: &'a str,
    device_id: &'a str,
    field: &'a str,
    value: Value,
    /// Raw response body from the API.
    response: String,
}

/// JSON when it parses (`72`, `true`, `"heat"`), otherwise the raw text
/// as a string (`heat`).
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned()))
}

pub async fn handle(args: &SetArgs, nest: &Nest, global: &GlobalOpts) -> Result<(), CliError> {
    let value = parse_value(&args.value);

    let target = match args.device_type {
        Some(ref device_type) => EntityRef::new(device_type.as_str(), args.device_id.as_str()),
        None => {
            debug!(device_id = %args.device_id, "resolving device type from a fresh snapshot");
            super::hydrate(nest).await?;
            nest.store()
                .locate_device(&args.device_id)
                .ok_or_else(|| CliError::NotFound {
                    resource_type: "device".into(),
                    identifier: args.device_id.clone(),
                    list_command: "devices".into(),
                })?
        }
    };

    let response = nest.mutate(&target, &args.field, &value).await?;

    let result = SetResult {
        device_type: &target.device_type,
        device_id: &target.device_id,
        field: &args.field,
        value,
        response,
    };
    let out = output::render_single(
        global.output,
        &result,
        |r| format!("✓ {}/{} {} = {}", r.device_type, r.device_id, r.field, r.value),
        |r| r.response.clone(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn values_parse_as_json_first() {
        assert_eq!(parse_value("72"), json!(72));
        assert_eq!(parse_value("71.5"), json!(71.5));
        assert_eq!(parse_value("true"), json!(true));
        assert_eq!(parse_value("\"heat\""), json!("heat"));
    }

    #[test]
    fn bare_words_become_strings() {
        assert_eq!(parse_value("heat-cool"), json!("heat-cool"));
        assert_eq!(parse_value("away mode"), json!("away mode"));
    }
}
