//! Field projection from type payloads and member sub-resources
//!
//! A type payload looks like:
//!
//! ```json
//! { "pokemon": [ { "pokemon": { "name": "bulbasaur", "url": "https://…/pokemon/1/" }, "slot": 1 } ] }
//! ```
//!
//! Projections keep member order and duplicates exactly as received.

use crate::error::{Error, Result};
use crate::types::{MemberList, RawPayload, SubResourcePayload};
use serde_json::Value;

/// Field retained from each member sub-resource
pub const FORMS_FIELD: &str = "forms";

/// Member names, in payload order
pub fn extract_names(payload: &RawPayload) -> Result<MemberList> {
    extract_member_field(payload, "name")
}

/// Member sub-resource URLs, in payload order
pub fn extract_urls(payload: &RawPayload) -> Result<MemberList> {
    extract_member_field(payload, "url")
}

fn extract_member_field(payload: &RawPayload, field: &str) -> Result<MemberList> {
    let members = payload
        .as_value()
        .get("pokemon")
        .ok_or_else(|| Error::malformed("pokemon", "is missing"))?
        .as_array()
        .ok_or_else(|| Error::malformed("pokemon", "is not an array"))?;

    members
        .iter()
        .enumerate()
        .map(|(i, member)| {
            let path = format!("pokemon[{i}].pokemon.{field}");
            member
                .get("pokemon")
                .and_then(Value::as_object)
                .ok_or_else(|| Error::malformed(format!("pokemon[{i}].pokemon"), "is missing"))?
                .get(field)
                .ok_or_else(|| Error::malformed(path.clone(), "is missing"))?
                .as_str()
                .map(str::to_owned)
                .ok_or_else(|| Error::malformed(path, "is not a string"))
        })
        .collect()
}

/// Project a single top-level field out of a sub-resource body
pub fn extract_field(body: &Value, field: &str) -> Result<SubResourcePayload> {
    body.get(field)
        .cloned()
        .map(SubResourcePayload)
        .ok_or_else(|| Error::malformed(field, "is missing"))
}
