// src/models/claim.rs
//! Claims: schema-bound sets of asserted field values owned by a DID.
//!
//! A claim is built exactly once from a schema, a raw field map and an
//! owner identifier, and is immutable afterwards; a changed-field
//! requirement produces a new claim. Raw fields arrive as strings (the
//! rendering layer hands them over verbatim) and are validated and
//! type-coerced here, at the boundary, so the rest of the core never deals
//! with loosely-typed contents.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::models::schema::SchemaDescriptor;

/// A schema-bound set of asserted field values, owned by an identifier.
///
/// Wire shape (camelCase) matches the attester's expectation:
/// `{"cTypeHash": "0x…", "contents": {…}, "owner": "did:…"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    /// Raw content hash of the schema this claim is bound to.
    #[serde(rename = "cTypeHash")]
    pub ctype_hash: String,

    /// Validated field values; strings, or numbers where the schema
    /// declares `type: "number"`.
    pub contents: Map<String, Value>,

    /// DID of the claim owner, embedded verbatim.
    pub owner: String,
}

impl Claim {
    /// Binds raw field values to a schema and an owner identifier.
    ///
    /// Validation happens in this order:
    /// 1. empty-string fields are dropped;
    /// 2. fields declared `type: "number"` are numerically parsed, and
    ///    dropped (never an error) when the value does not parse;
    /// 3. any remaining key not declared in `schema.properties` is fatal,
    ///    since published schemas carry `additionalProperties: false`.
    ///
    /// Building twice from identical inputs yields an identical claim;
    /// idempotence holds at the claim level only (credentials draw fresh
    /// nonces per construction).
    pub fn from_schema_and_contents<'a, I>(
        schema: &SchemaDescriptor,
        raw_fields: I,
        owner: &str,
    ) -> Result<Claim>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut contents = Map::new();

        for (field, raw_value) in raw_fields {
            if raw_value.is_empty() {
                continue;
            }

            let declared = schema.properties.get(field);

            let value = match declared {
                Some(spec) if spec.is_number() => match coerce_number(raw_value) {
                    Some(number) => Value::Number(number),
                    None => {
                        log::debug!(
                            "dropping field {:?}: {:?} is not a number",
                            field,
                            raw_value
                        );
                        continue;
                    }
                },
                _ => Value::String(raw_value.to_string()),
            };

            if declared.is_none() && !schema.additional_properties {
                return Err(Error::UndeclaredField {
                    schema: schema.id.clone(),
                    field: field.to_string(),
                });
            }

            contents.insert(field.to_string(), value);
        }

        Ok(Claim {
            ctype_hash: schema.ctype_hash().to_string(),
            contents,
            owner: owner.to_string(),
        })
    }
}

/// Parses a textual field value into a JSON number, rejecting NaN and
/// infinities, which have no JSON representation.
fn coerce_number(raw: &str) -> Option<serde_json::Number> {
    let parsed: f64 = raw.trim().parse().ok()?;
    serde_json::Number::from_f64(parsed)
}
